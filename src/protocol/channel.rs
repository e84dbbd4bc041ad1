//! The channel side of the bus engines - what a command byte under ATN
//! means, where received bytes go and where sent bytes come from.  None of
//! this touches the bus, so the IEC and IEEE-488 engines share it.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

#[allow(unused_imports)]
use crate::fmt::{debug, error, info, trace, warn};

use super::{AtnCommand, BusState, DeviceState, IecData, IecFlags};
use crate::buffers::{BufferHandler, FreeFlags};
use crate::constants::ERROR_CHANNEL;
use crate::drive::Drive;
use crate::fileops::{DiskChange, Storage};
use crate::signals::Keys;

/// Act on a command byte received under ATN, returning the engine's next
/// state.
pub(super) fn dispatch_atn<S>(data: &mut IecData, cmd: u8, drive: &mut Drive, storage: &mut S) -> BusState
where
    S: Storage + ?Sized,
{
    match AtnCommand::decode(cmd, drive.device_address) {
        AtnCommand::Unlisten => unaddress(data, DeviceState::Listen),
        AtnCommand::Untalk => unaddress(data, DeviceState::Talk),
        AtnCommand::Listen => {
            data.device_state = DeviceState::Listen;
            BusState::ForMe
        }
        AtnCommand::Talk => {
            data.device_state = DeviceState::Talk;
            BusState::ForMe
        }
        AtnCommand::OtherDevice | AtnCommand::Unknown => BusState::NotForMe,
        AtnCommand::Data(_) | AtnCommand::Open(_) | AtnCommand::Close(_)
            if data.device_state == DeviceState::Idle =>
        {
            BusState::NotForMe
        }
        AtnCommand::Data(sa) => {
            data.secondary_address = sa;
            data.secondary_command = cmd;
            BusState::AtnFinish
        }
        AtnCommand::Open(sa) => {
            debug!("OPEN channel {}", sa);
            data.secondary_address = sa;
            data.secondary_command = cmd;
            drive.command.clear();
            BusState::AtnFinish
        }
        AtnCommand::Close(sa) => {
            debug!("CLOSE channel {}", sa);
            data.secondary_address = sa;
            data.secondary_command = cmd;
            if let Err(e) = drive.close_channel(sa, storage) {
                warn!("Close of channel {} failed: {}", sa, e.code());
            }
            BusState::ForMe
        }
    }
}

// UNLISTEN/UNTALK only end the command phase if we were addressed in the
// matching role.
fn unaddress(data: &mut IecData, role: DeviceState) -> BusState {
    if data.device_state == role {
        data.device_state = DeviceState::Idle;
        BusState::AtnFinish
    } else {
        BusState::ForMe
    }
}

/// Where bytes received as a listener go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum ListenTarget {
    /// A filename or DOS command, into the command buffer.
    Command,
    /// Data, into a write buffer.
    Buffer(usize),
    /// Data for a channel with nothing open for writing.
    Discard,
}

impl ListenTarget {
    pub(super) fn new(data: &IecData, drive: &Drive) -> Self {
        if data.receives_command() {
            return Self::Command;
        }
        match drive
            .find_buffer(data.secondary_address)
            .filter(|&idx| drive.buffer(idx).write)
        {
            Some(idx) => Self::Buffer(idx),
            None => {
                debug!("No write buffer on channel {}", data.secondary_address);
                Self::Discard
            }
        }
    }

    /// Store a received byte.  `data.flags` says whether it carried EOI.
    pub(super) fn store<S>(self, data: &mut IecData, byte: u8, drive: &mut Drive, storage: &mut S)
    where
        S: Storage + ?Sized,
    {
        let eoi = data.flags.contains(IecFlags::EOI_RECVD);
        match self {
            Self::Command => {
                if drive.command.push(byte).is_err() {
                    trace!("Command buffer full");
                }
                if eoi {
                    data.flags.insert(IecFlags::COMMAND_RECVD);
                }
            }
            Self::Buffer(idx) => {
                // Errors are left on the error channel for the host to read.
                // The listener carries on regardless, as the talker can't be
                // stopped mid-file.
                if drive.put_byte(idx, byte, storage).is_err() {
                    return;
                }
                if eoi && drive.buffer(idx).recordlen != 0 {
                    // End of a REL record
                    drive.buffer_mut(idx).mustflush = true;
                    if let Err(e) = drive.refill(idx, storage) {
                        warn!("REL record on channel {} not written: {}", data.secondary_address, e.code());
                    }
                }
            }
            Self::Discard => {}
        }
    }
}

/// The buffer a TALK sends from.
pub(super) fn talk_buffer(data: &IecData, drive: &Drive) -> Option<usize> {
    let idx = drive
        .find_buffer(data.secondary_address)
        .filter(|&idx| drive.buffer(idx).read);
    if idx.is_none() {
        debug!("No read buffer on channel {}", data.secondary_address);
    }
    idx
}

/// The next byte a talker sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct TalkByte {
    pub byte: u8,
    /// Mark the byte as the last.
    pub eoi: bool,
    /// The byte is the last in the buffer.
    last: bool,
}

/// Get the next byte to send from a buffer, refilling it if empty.  None
/// when there is nothing more to send.
pub(super) fn next_talk_byte<S>(drive: &mut Drive, storage: &mut S, idx: usize) -> Option<TalkByte>
where
    S: Storage + ?Sized,
{
    if drive.buffer(idx).remaining().is_empty() {
        let buf = drive.buffer(idx);
        if buf.sendeoi && buf.handler != BufferHandler::ErrorChannel {
            return None;
        }
        if drive.refill(idx, storage).is_err() || drive.buffer(idx).remaining().is_empty() {
            return None;
        }
    }

    let buf = drive.buffer(idx);
    let last = buf.position == buf.lastused;
    Some(TalkByte {
        byte: buf.data[buf.position as usize],
        eoi: last && buf.sendeoi,
        last,
    })
}

/// Move a buffer on once a byte has been sent.  Returns whether the talker
/// should carry on.
///
/// A read to EOF leaves the position on the last byte, so another TALK
/// repeats it, as a 1541 does.  The error channel and REL files carry on
/// past EOI - the error channel having reset to `00, OK`.
pub(super) fn talk_byte_sent<S>(drive: &mut Drive, storage: &mut S, idx: usize, sent: TalkByte) -> bool
where
    S: Storage + ?Sized,
{
    if !sent.last {
        drive.buffer_mut(idx).position += 1;
        return true;
    }
    let buf = drive.buffer(idx);
    if sent.eoi && buf.handler != BufferHandler::ErrorChannel && buf.recordlen == 0 {
        return false;
    }
    drive.refill(idx, storage).is_ok()
}

/// What the keys ask of an idle engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum IdleKeys {
    None,
    Sleep,
}

/// Act on key presses while idle - disk changes are passed to storage, a
/// long sleep key press is returned to the engine.
///
/// A short sleep key press only ever wakes the drive, so one while awake is
/// dropped.
pub(super) fn idle_keys<S>(drive: &mut Drive, storage: &mut S) -> IdleKeys
where
    S: Storage + ?Sized,
{
    let signals = drive.signals();
    let sleep = signals.take_keys(Keys::SLEEP | Keys::SLEEP_LONG);
    if sleep.contains(Keys::SLEEP_LONG) {
        info!("Going to sleep");
        drive.set_sleeping(true);
        return IdleKeys::Sleep;
    }
    if !sleep.is_empty() {
        debug!("Ignoring short sleep key press");
    }

    let keys = signals.take_keys(Keys::DISK_CHANGE);
    for (key, change) in [
        (Keys::NEXT, DiskChange::Next),
        (Keys::PREV, DiskChange::Prev),
        (Keys::HOME, DiskChange::Home),
    ] {
        if keys.contains(key) {
            debug!("Disk change {:?}", change);
            storage.change_disk(drive, change);
        }
    }
    IdleKeys::None
}

/// Whether a sleeping engine should wake.
pub(super) fn wake_requested(drive: &mut Drive) -> bool {
    if drive
        .signals()
        .take_keys(Keys::SLEEP | Keys::SLEEP_LONG)
        .is_empty()
    {
        return false;
    }
    info!("Waking up");
    drive.set_sleeping(false);
    true
}

/// First half of CLEANUP: re-initialise a changed medium, then hand a
/// received filename or command to the command parser.
pub(super) fn process_command<S>(data: &mut IecData, drive: &mut Drive, storage: &mut S)
where
    S: Storage + ?Sized,
{
    // A medium change is only acted on between commands
    if drive.signals().take_disk_changed() {
        info!("Medium changed");
        storage.reinit(drive);
    }

    if data.flags.contains(IecFlags::COMMAND_RECVD) {
        data.flags.remove(IecFlags::COMMAND_RECVD);
        if data.secondary_address == ERROR_CHANNEL {
            storage.parse_doscommand(drive);
        } else {
            storage.file_open(drive, data.secondary_address);
        }
    }
}

/// Second half of CLEANUP: forget the command and free scratch buffers.
pub(super) fn end_command_cycle<S>(drive: &mut Drive, storage: &mut S)
where
    S: Storage + ?Sized,
{
    drive.command.clear();
    if let Err(e) = drive.free_multiple(FreeFlags::LEFTOVER, storage) {
        warn!("Freeing leftover buffers failed: {}", e.code());
    }
    storage.bam_commit();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::ERROR_BUFFER;
    use crate::error::DosError;
    use crate::fileops::CommandParser;
    use crate::signals::LedState;
    use crate::test::{MockStorage, pattern, test_drive};

    fn addressed(state: DeviceState) -> IecData {
        let mut data = IecData::new();
        data.device_state = state;
        data
    }

    #[test]
    fn secondary_ignored_unless_addressed() {
        let mut drive = test_drive();
        let mut storage = MockStorage::new();
        let mut data = IecData::new();

        assert_eq!(dispatch_atn(&mut data, 0xf2, &mut drive, &mut storage), BusState::NotForMe);
        assert_eq!(dispatch_atn(&mut data, 0x28, &mut drive, &mut storage), BusState::ForMe);
        assert_eq!(dispatch_atn(&mut data, 0xf2, &mut drive, &mut storage), BusState::AtnFinish);
        assert_eq!(data.secondary_address, 2);
        assert_eq!(data.secondary_command, 0xf2);
    }

    #[test]
    fn unlisten_only_ends_listen() {
        let mut drive = test_drive();
        let mut storage = MockStorage::new();

        let mut data = addressed(DeviceState::Talk);
        assert_eq!(dispatch_atn(&mut data, 0x3f, &mut drive, &mut storage), BusState::ForMe);
        assert_eq!(data.device_state, DeviceState::Talk);

        let mut data = addressed(DeviceState::Listen);
        assert_eq!(dispatch_atn(&mut data, 0x3f, &mut drive, &mut storage), BusState::AtnFinish);
        assert_eq!(data.device_state, DeviceState::Idle);
    }

    #[test]
    fn close_frees_channel() {
        let mut drive = test_drive();
        let mut storage = MockStorage::with_file(b"F", &pattern(10));
        drive.command.extend_from_slice(b"F").unwrap();
        storage.file_open(&mut drive, 3);
        assert!(drive.find_buffer(3).is_some());

        let mut data = addressed(DeviceState::Listen);
        assert_eq!(dispatch_atn(&mut data, 0xe3, &mut drive, &mut storage), BusState::ForMe);
        assert!(drive.find_buffer(3).is_none());
        assert_eq!(storage.cleanups, 1);
    }

    #[test]
    fn command_bytes_collected_until_eoi() {
        let mut drive = test_drive();
        let mut storage = MockStorage::new();
        let mut data = IecData::new();
        data.secondary_address = 15;

        let target = ListenTarget::new(&data, &drive);
        assert_eq!(target, ListenTarget::Command);
        for &b in b"I0" {
            target.store(&mut data, b, &mut drive, &mut storage);
        }
        assert!(!data.flags.contains(IecFlags::COMMAND_RECVD));
        data.flags.insert(IecFlags::EOI_RECVD);
        target.store(&mut data, b':', &mut drive, &mut storage);

        assert!(data.flags.contains(IecFlags::COMMAND_RECVD));
        assert_eq!(drive.command.as_slice(), b"I0:");
    }

    #[test]
    fn data_without_write_buffer_is_discarded() {
        let drive = test_drive();
        let mut data = IecData::new();
        data.secondary_address = 4;
        data.secondary_command = 0x64;
        assert_eq!(ListenTarget::new(&data, &drive), ListenTarget::Discard);
    }

    #[test]
    fn talk_bytes_follow_sectors() {
        let data = pattern(300);
        let mut drive = test_drive();
        let mut storage = MockStorage::with_file(b"F", &data);
        drive.command.extend_from_slice(b"F").unwrap();
        storage.file_open(&mut drive, 0);
        let idx = drive.find_buffer(0).unwrap();

        let mut sent = Vec::new();
        while let Some(next) = next_talk_byte(&mut drive, &mut storage, idx) {
            sent.push((next.byte, next.eoi));
            if !talk_byte_sent(&mut drive, &mut storage, idx, next) {
                break;
            }
        }

        let expected: Vec<_> = data.iter().enumerate().map(|(i, &b)| (b, i == 299)).collect();
        assert_eq!(sent, expected);

        // A further read repeats the final byte
        let again = next_talk_byte(&mut drive, &mut storage, idx).unwrap();
        assert_eq!((again.byte, again.eoi), (data[299], true));
    }

    #[test]
    fn error_channel_reverts_to_ok() {
        let mut drive = test_drive();
        let mut storage = MockStorage::new();
        drive.set_error(DosError::FileNotFound);

        let mut message = Vec::new();
        loop {
            let next = next_talk_byte(&mut drive, &mut storage, ERROR_BUFFER).unwrap();
            message.push(next.byte);
            assert!(talk_byte_sent(&mut drive, &mut storage, ERROR_BUFFER, next));
            if next.eoi {
                break;
            }
        }

        assert_eq!(message, b"62,FILE NOT FOUND,00,00\r".to_vec());
        assert_eq!(drive.error().error, DosError::Ok);
        assert_eq!(drive.buffer(ERROR_BUFFER).remaining()[..2], *b"00");
    }

    #[test]
    fn sleep_and_disk_keys() {
        let mut drive = test_drive();
        let mut storage = MockStorage::new();

        drive.signals().press(Keys::PREV);
        assert_eq!(idle_keys(&mut drive, &mut storage), IdleKeys::None);
        assert_eq!(storage.disk_changes, vec![DiskChange::Prev]);

        assert!(!wake_requested(&mut drive));
        drive.signals().press(Keys::SLEEP_LONG);
        assert_eq!(idle_keys(&mut drive, &mut storage), IdleKeys::Sleep);
        drive.signals().press(Keys::SLEEP);
        assert!(wake_requested(&mut drive));
    }

    #[test]
    fn short_sleep_press_only_wakes() {
        let mut drive = test_drive();
        let mut storage = MockStorage::new();

        drive.signals().press(Keys::SLEEP);
        assert_eq!(idle_keys(&mut drive, &mut storage), IdleKeys::None);
        assert!(!drive.signals().leds().contains(LedState::SLEEP));
        // Consumed, so it can't abort a later fastloader
        assert!(drive.signals().pending_keys().is_empty());

        drive.signals().press(Keys::SLEEP_LONG);
        assert_eq!(idle_keys(&mut drive, &mut storage), IdleKeys::Sleep);
        drive.signals().press(Keys::SLEEP);
        assert!(wake_requested(&mut drive));
        assert!(!drive.signals().leds().contains(LedState::SLEEP));
    }

    #[test]
    fn failed_rel_record_flush_is_reported() {
        let mut drive = test_drive();
        let mut storage = MockStorage::new();
        drive.command.extend_from_slice(b"REL,W").unwrap();
        storage.file_open(&mut drive, 2);
        let idx = drive.find_buffer(2).unwrap();
        drive.buffer_mut(idx).recordlen = 4;
        storage.fail_flush = Some(DosError::WriteVerify);

        let mut data = IecData::new();
        data.secondary_address = 2;
        data.secondary_command = 0x62;
        let target = ListenTarget::new(&data, &drive);
        assert_eq!(target, ListenTarget::Buffer(idx));
        target.store(&mut data, 0x41, &mut drive, &mut storage);
        data.flags.insert(IecFlags::EOI_RECVD);
        target.store(&mut data, 0x42, &mut drive, &mut storage);

        assert_eq!(drive.error().error, DosError::WriteVerify);
        // Still bound, for the host to carry on or close
        assert_eq!(drive.find_buffer(2), Some(idx));
    }
}
