//! Action Replay 6, 1581 mode.
//!
//! Loads stream the file open on channel 0 as counted blocks.  Saves arrive
//! on channel 1 as counted blocks, each acknowledged with 0x00 if it was
//! stored or 0xff if it wasn't.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

#[allow(unused_imports)]
use crate::fmt::{debug, error, info, trace, warn};

use super::ll::ar6::{ar6_get_byte, ar6_send_byte};
use super::{Counted, FastloaderError, FileSource, receive_file, send_file};
use crate::bus::IecHal;
use crate::drive::Drive;
use crate::fileops::Storage;

const ACK_OK: u8 = 0x00;
const ACK_ERROR: u8 = 0xff;

pub(super) fn load_ar6_1581<B, S>(bus: &mut B, drive: &mut Drive, storage: &mut S) -> Result<(), FastloaderError>
where
    B: IecHal + ?Sized,
    S: Storage + ?Sized,
{
    let mut sender = Counted(|bus: &mut B, byte| ar6_send_byte(bus, byte));
    send_file(&mut sender, bus, drive, storage, FileSource::Channel(0))
}

pub(super) fn save_ar6_1581<B, S>(bus: &mut B, drive: &mut Drive, storage: &mut S) -> Result<(), FastloaderError>
where
    B: IecHal + ?Sized,
    S: Storage + ?Sized,
{
    receive_file(bus, drive, storage, 1, ar6_get_byte, |bus: &mut B, stored| {
        ar6_send_byte(bus, if stored { ACK_OK } else { ACK_ERROR })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::sim::{SimBus, sig};
    use crate::fastloader::ll::ar6::{AR6_GET_DEF, AR6_SEND_DEF};
    use crate::fastloader::{FastloaderId, run};
    use crate::fileops::CommandParser;
    use crate::test::{MockStorage, fl, pattern, test_drive};

    fn open(drive: &mut Drive, storage: &mut MockStorage, name: &[u8], secondary: u8) {
        drive.command.clear();
        drive.command.extend_from_slice(name).unwrap();
        storage.file_open(drive, secondary);
        drive.command.clear();
    }

    #[test]
    fn load_sends_counted_blocks() {
        let data = pattern(260);
        let mut storage = MockStorage::with_file(b"AR", &data);
        let mut drive = test_drive();
        open(&mut drive, &mut storage, b"AR", 0);

        let mut sim = SimBus::with_program(fl::recv_2bit_bytes(&AR6_SEND_DEF, sig::DATA, 263));
        run(FastloaderId::Ar6_1581Load, &mut sim, &mut drive, &mut storage);

        let mut expected = vec![254];
        expected.extend_from_slice(&data[..254]);
        expected.push(6);
        expected.extend_from_slice(&data[254..]);
        expected.push(0);
        assert_eq!(fl::decode_2bit_refs(&sim, &AR6_SEND_DEF, &sim.refs), expected);
    }

    #[test]
    fn save_acknowledges_blocks() {
        let mut storage = MockStorage::new();
        let mut drive = test_drive();
        open(&mut drive, &mut storage, b"SAVE", 1);

        let mut program = fl::send_2bit_bytes(&AR6_GET_DEF, sig::CLOCK, &[2, 0xaa, 0xbb]);
        program.extend(fl::recv_2bit_bytes(&AR6_SEND_DEF, sig::DATA, 1));
        program.extend(fl::send_2bit_bytes(&AR6_GET_DEF, sig::CLOCK, &[0]));
        let mut sim = SimBus::with_program(program);
        run(FastloaderId::Ar6_1581Save, &mut sim, &mut drive, &mut storage);

        assert_eq!(fl::decode_2bit_refs(&sim, &AR6_SEND_DEF, &sim.refs[3..4]), vec![ACK_OK]);
        assert_eq!(storage.file(b"SAVE").unwrap().data, vec![0xaa, 0xbb]);
    }

    #[test]
    fn atn_ends_load_mid_file() {
        let mut storage = MockStorage::with_file(b"AR", &pattern(600));
        let mut drive = test_drive();
        open(&mut drive, &mut storage, b"AR", 0);

        let mut program = fl::recv_2bit_bytes(&AR6_SEND_DEF, sig::DATA, 10);
        program.extend(fl::atn_after(20));
        let mut sim = SimBus::with_program(program);
        run(FastloaderId::Ar6_1581Load, &mut sim, &mut drive, &mut storage);

        fl::assert_loader_ended(&sim, &drive);
        assert!(drive.find_buffer(0).is_none());
    }

    #[test]
    fn atn_ends_save_before_ack() {
        let mut storage = MockStorage::new();
        let mut drive = test_drive();
        open(&mut drive, &mut storage, b"SAVE", 1);

        let mut program = fl::send_2bit_bytes(&AR6_GET_DEF, sig::CLOCK, &[2, 0xaa, 0xbb]);
        program.extend(fl::atn_after(5));
        let mut sim = SimBus::with_program(program);
        run(FastloaderId::Ar6_1581Save, &mut sim, &mut drive, &mut storage);

        fl::assert_loader_ended(&sim, &drive);
        assert!(drive.find_buffer(1).is_none());
    }
}
