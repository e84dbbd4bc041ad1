//! Fastloader support.
//!
//! A fastloader is third party drive code which replaces the standard bus
//! protocol with its own, much faster one.  The host uploads the drive code
//! and starts it with `M-E`, which the command parser recognises and turns
//! into a [`FastloaderId`] request.  Once the command cycle completes, the
//! bus engine calls [`run`], which hands the bus over to the matching
//! orchestrator until the protocol ends, the host asserts ATN, or the user
//! presses a key.
//!
//! Orchestrators come in two shapes:
//! - File streamers, which move a whole file sector by sector.  These share
//!   the transfer machine in this module ([`send_file`] and
//!   [`receive_file`]), and only supply their framing.
//! - Command loops, which receive small command blocks and read or write
//!   single sectors (GEOS, DreamLoad and friends).
//!
//! The wire level of every protocol lives in [`ll`].

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

pub mod ll;

mod ar6;
mod dolphin;
mod dreamload;
mod eload1;
mod epyx;
mod fc3;
mod geos;
mod gijoe;
mod mmzak;
mod n0sdos;
mod nippon;
mod turbodisk;
mod uload3;

#[allow(unused_imports)]
use crate::fmt::{debug, error, info, trace, warn};

use crate::bus::IecHal;
use crate::constants::{BUFFER_SIZE, COMMAND_BUFFER_SIZE};
use crate::drive::Drive;
use crate::error::DosError;
use crate::fileops::Storage;

/// The fastloaders pico2iec can run.
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FastloaderId {
    None,
    Turbodisk,
    Fc3Load,
    Fc3Save,
    Fc3Freezed,
    Fc3OldFreezedPal,
    Fc3OldFreezedNtsc,
    Dreamload,
    DreamloadOld,
    Uload3,
    GiJoe,
    Epyxcart,
    GeosS1_64,
    GeosS1_128,
    GeosS23_1541,
    GeosS23_1571,
    GeosS23_1581,
    WheelsS1_64,
    WheelsS1_128,
    WheelsS2,
    Wheels44S2,
    Wheels44S2_1581,
    Nippon,
    Ar6_1581Load,
    Ar6_1581Save,
    Eload1,
    MmZak,
    N0sdosFileread,
    DolphinBurstLoad,
    DolphinBurstSave,
}

/// Why a fastloader stopped early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FastloaderError {
    /// The host asserted ATN.  For most protocols this is also how the host
    /// ends the loader normally.
    Atn,
    /// The user pressed a disk change or sleep key.
    Keys,
    /// The host sent something the protocol doesn't allow.
    Protocol,
    /// Storage failed.  The error has been set on the error channel.
    Io(DosError),
}

impl From<DosError> for FastloaderError {
    fn from(e: DosError) -> Self {
        Self::Io(e)
    }
}

/// A filename, copied out of the command buffer before it is reused.
pub(crate) type Filename = heapless::Vec<u8, COMMAND_BUFFER_SIZE>;

/// Run a fastloader to completion.  The bus is left with every line
/// released, and the automatic ATN acknowledge enabled.
pub fn run<B, S>(id: FastloaderId, bus: &mut B, drive: &mut Drive, storage: &mut S)
where
    B: IecHal + ?Sized,
    S: Storage + ?Sized,
{
    info!("Fastloader {:?} starting", id);
    drive.detected_loader = id;

    // Several protocols use ATN as a data or strobe line
    bus.set_atn_ack(false);

    let result = match id {
        FastloaderId::None => Ok(()),
        FastloaderId::Turbodisk => turbodisk::load_turbodisk(bus, drive, storage),
        FastloaderId::Fc3Load
        | FastloaderId::Fc3Freezed
        | FastloaderId::Fc3OldFreezedPal
        | FastloaderId::Fc3OldFreezedNtsc => fc3::load_fc3(id, bus, drive, storage),
        FastloaderId::Fc3Save => fc3::save_fc3(bus, drive, storage),
        FastloaderId::Dreamload => dreamload::load_dreamload(false, bus, drive, storage),
        FastloaderId::DreamloadOld => dreamload::load_dreamload(true, bus, drive, storage),
        FastloaderId::Uload3 => uload3::load_uload3(bus, drive, storage),
        FastloaderId::GiJoe => gijoe::load_gijoe(bus, drive, storage),
        FastloaderId::Epyxcart => epyx::load_epyxcart(bus, drive, storage),
        FastloaderId::GeosS1_64
        | FastloaderId::GeosS1_128
        | FastloaderId::WheelsS1_64
        | FastloaderId::WheelsS1_128 => geos::load_geos_s1(id, bus, drive, storage),
        FastloaderId::GeosS23_1541
        | FastloaderId::GeosS23_1571
        | FastloaderId::GeosS23_1581
        | FastloaderId::WheelsS2
        | FastloaderId::Wheels44S2
        | FastloaderId::Wheels44S2_1581 => geos::load_geos_s23(id, bus, drive, storage),
        FastloaderId::Nippon => nippon::load_nippon(bus, drive, storage),
        FastloaderId::Ar6_1581Load => ar6::load_ar6_1581(bus, drive, storage),
        FastloaderId::Ar6_1581Save => ar6::save_ar6_1581(bus, drive, storage),
        FastloaderId::Eload1 => eload1::load_eload1(bus, drive, storage),
        FastloaderId::MmZak => mmzak::load_mmzak(bus, drive, storage),
        FastloaderId::N0sdosFileread => n0sdos::load_n0sdos_fileread(bus, drive, storage),
        FastloaderId::DolphinBurstLoad => dolphin::load_dolphin_burst(bus, drive, storage),
        FastloaderId::DolphinBurstSave => dolphin::save_dolphin_burst(bus, drive, storage),
    };

    match result {
        Ok(()) => info!("Fastloader {:?} finished", drive.detected_loader),
        Err(FastloaderError::Atn) => info!("Fastloader {:?} ended by ATN", drive.detected_loader),
        Err(e) => warn!("Fastloader {:?} aborted: {:?}", drive.detected_loader, e),
    }

    bus.release_all();
    bus.set_atn_ack(true);
    drive.detected_loader = FastloaderId::None;
}

/// Abort if the user has pressed a key.  The keys are left for the bus
/// engine to act on.
pub(crate) fn check_keys(drive: &Drive) -> Result<(), FastloaderError> {
    if drive.check_keys() {
        Err(FastloaderError::Keys)
    } else {
        Ok(())
    }
}

/// Copy a filename out of the command buffer.
pub(crate) fn command_name(drive: &Drive, start: usize, len: usize) -> Filename {
    let end = (start + len).min(drive.command.len());
    let start = start.min(end);
    // The source is no longer than the destination, so this can't fail
    Filename::from_slice(&drive.command[start..end]).unwrap_or_default()
}

/// Open a file for reading on `secondary`, via the command parser.  Returns
/// the buffer index.
pub(crate) fn open_file<S>(drive: &mut Drive, storage: &mut S, name: &[u8], secondary: u8) -> Result<usize, DosError>
where
    S: Storage + ?Sized,
{
    drive.command.clear();
    // A Filename is the size of the command buffer, so always fits
    let _ = drive.command.extend_from_slice(name);
    storage.file_open(drive, secondary);
    drive.command.clear();

    match drive.find_buffer(secondary) {
        Some(idx) if drive.buffer(idx).read => Ok(idx),
        _ => {
            let e = drive.error().error;
            Err(if e.is_ok() { DosError::FileNotFound } else { e })
        }
    }
}

/// Receive a filename of `len` bytes.  All of it is received, so the host
/// stays in step, but a name too long for the command buffer is refused.
pub(crate) fn receive_name<B, G>(bus: &mut B, len: usize, mut get: G) -> Result<Filename, FastloaderError>
where
    B: IecHal + ?Sized,
    G: FnMut(&mut B) -> Result<u8, FastloaderError>,
{
    let mut name = Filename::new();
    let mut fits = true;
    for _ in 0..len {
        let byte = get(bus)?;
        fits &= name.push(byte).is_ok();
    }
    if fits {
        Ok(name)
    } else {
        warn!("Filename of {} bytes too long", len);
        Err(FastloaderError::Protocol)
    }
}

/// A length as a protocol's count byte.  A sector with more data than a
/// count byte can describe is refused with 28, LONG BLOCK.
pub(crate) fn count_byte(len: usize) -> Result<u8, FastloaderError> {
    u8::try_from(len).map_err(|_| {
        warn!("{} bytes too long for a count byte", len);
        FastloaderError::Io(DosError::LongBlock)
    })
}

/// Read a sector into a buffer.  Errors are set on the error channel with
/// the track and sector.
pub(crate) fn read_sector<S>(drive: &mut Drive, storage: &mut S, idx: usize, track: u8, sector: u8) -> Result<(), DosError>
where
    S: Storage + ?Sized,
{
    let part = drive.current_part;
    let result = storage.read_sector(part, track, sector, &mut drive.buffer_mut(idx).data);
    match result {
        Ok(()) => drive.set_error(DosError::Ok),
        Err(e) => drive.set_error_ts(e, track, sector),
    }
    result
}

/// Write a buffer to a sector.  Errors are set on the error channel with
/// the track and sector.
pub(crate) fn write_sector<S>(drive: &mut Drive, storage: &mut S, idx: usize, track: u8, sector: u8) -> Result<(), DosError>
where
    S: Storage + ?Sized,
{
    let part = drive.current_part;
    let result = storage.write_sector(part, track, sector, &drive.buffer(idx).data);
    match result {
        Ok(()) => drive.set_error(DosError::Ok),
        Err(e) => drive.set_error_ts(e, track, sector),
    }
    result
}

/// Run `f` with a system buffer, which is freed however `f` ends.
pub(crate) fn with_buffer<R>(
    drive: &mut Drive,
    f: impl FnOnce(&mut Drive, usize) -> Result<R, FastloaderError>,
) -> Result<R, FastloaderError> {
    let idx = drive.alloc_buffer().ok_or(FastloaderError::Io(DosError::NoChannel))?;
    let result = f(drive, idx);
    drive.free_buffer(idx);
    result
}

/// Send a whole sector buffer with a byte sender.
pub(crate) fn send_block<B, F>(bus: &mut B, data: &[u8; BUFFER_SIZE], mut send: F) -> Result<(), FastloaderError>
where
    B: IecHal + ?Sized,
    F: FnMut(&mut B, u8) -> Result<(), FastloaderError>,
{
    data.iter().try_for_each(|&byte| send(bus, byte))
}

/// Receive a whole sector into a buffer with a byte receiver.
pub(crate) fn receive_block<B, G>(bus: &mut B, data: &mut [u8; BUFFER_SIZE], mut get: G) -> Result<(), FastloaderError>
where
    B: IecHal + ?Sized,
    G: FnMut(&mut B) -> Result<u8, FastloaderError>,
{
    for byte in data.iter_mut() {
        *byte = get(bus)?;
    }
    Ok(())
}

//
// File streaming
//

/// Where a streamed file comes from.
pub(crate) enum FileSource {
    /// Open this file on secondary address 0.
    Name(Filename),
    /// The file the host already has open on this channel.
    Channel(u8),
}

/// One sector of a file being sent.
pub(crate) struct Sector<'a> {
    /// The data bytes - the link bytes are never sent.
    pub data: &'a [u8],
    pub first: bool,
    pub last: bool,
}

/// The framing of a file streaming loader.
pub(crate) trait FileSender<B: IecHal + ?Sized> {
    /// Called before the file is opened.
    fn handshake(&mut self, _bus: &mut B) -> Result<(), FastloaderError> {
        Ok(())
    }

    fn send_sector(&mut self, bus: &mut B, sector: &Sector<'_>) -> Result<(), FastloaderError>;

    /// Called after the last sector.
    fn send_eof(&mut self, _bus: &mut B) -> Result<(), FastloaderError> {
        Ok(())
    }

    /// Tell the host the file couldn't be opened or read.
    fn send_error(&mut self, bus: &mut B, error: DosError) -> Result<(), FastloaderError>;
}

/// The most common framing: each sector is a count byte then the data, a
/// count of 0 ends the file and 0xff reports an error.
pub(crate) struct Counted<F>(pub F);

impl<B, F> FileSender<B> for Counted<F>
where
    B: IecHal + ?Sized,
    F: FnMut(&mut B, u8) -> Result<(), FastloaderError>,
{
    fn send_sector(&mut self, bus: &mut B, sector: &Sector<'_>) -> Result<(), FastloaderError> {
        if sector.data.is_empty() {
            return Ok(());
        }
        (self.0)(bus, count_byte(sector.data.len())?)?;
        sector.data.iter().try_for_each(|&byte| (self.0)(bus, byte))
    }

    fn send_eof(&mut self, bus: &mut B) -> Result<(), FastloaderError> {
        (self.0)(bus, 0)
    }

    fn send_error(&mut self, bus: &mut B, _error: DosError) -> Result<(), FastloaderError> {
        (self.0)(bus, 0xff)
    }
}

// States of the file streaming machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum SendState {
    Handshake,
    Transfer { idx: usize, first: bool },
    Refill { idx: usize },
    EofSend,
    ErrorAbort(DosError),
    Cleanup,
}

/// Stream a file to the host.  `refill` is called between sectors only, so
/// a file of N sectors is refilled N-1 times.  However the transfer ends,
/// the file's channel is closed.
pub(crate) fn send_file<B, S, F>(
    sender: &mut F,
    bus: &mut B,
    drive: &mut Drive,
    storage: &mut S,
    source: FileSource,
) -> Result<(), FastloaderError>
where
    B: IecHal + ?Sized,
    S: Storage + ?Sized,
    F: FileSender<B>,
{
    let mut state = SendState::Handshake;
    let mut result = Ok(());
    let mut channel = None;

    loop {
        trace!("File send state {:?}", state);
        state = match state {
            SendState::Handshake => match sender.handshake(bus) {
                Err(e) => {
                    result = Err(e);
                    SendState::Cleanup
                }
                Ok(()) => {
                    let opened = match &source {
                        FileSource::Name(name) => {
                            channel = Some(0);
                            open_file(drive, storage, name, 0)
                        }
                        FileSource::Channel(secondary) => {
                            channel = Some(*secondary);
                            match drive.find_buffer(*secondary) {
                                Some(idx) if drive.buffer(idx).read => Ok(idx),
                                _ => Err(DosError::FileNotOpen),
                            }
                        }
                    };
                    match opened {
                        Ok(idx) => SendState::Transfer { idx, first: true },
                        Err(e) => SendState::ErrorAbort(e),
                    }
                }
            },

            SendState::Transfer { idx, first } => {
                let sent = check_keys(drive).and_then(|()| {
                    let buf = drive.buffer(idx);
                    let sector = Sector {
                        data: buf.remaining(),
                        first,
                        last: buf.sendeoi,
                    };
                    sender.send_sector(bus, &sector).map(|()| sector.last)
                });
                match sent {
                    Ok(true) => SendState::EofSend,
                    Ok(false) => SendState::Refill { idx },
                    // The sector can't be sent, but the host can be told
                    Err(FastloaderError::Io(e)) => SendState::ErrorAbort(e),
                    Err(e) => {
                        result = Err(e);
                        SendState::Cleanup
                    }
                }
            }

            SendState::Refill { idx } => match drive.refill(idx, storage) {
                Ok(()) => SendState::Transfer { idx, first: false },
                Err(e) => SendState::ErrorAbort(e),
            },

            SendState::EofSend => {
                result = sender.send_eof(bus);
                SendState::Cleanup
            }

            SendState::ErrorAbort(e) => {
                warn!("File send failed: {}", e.code());
                drive.set_error(e);
                result = sender.send_error(bus, e).and(Err(FastloaderError::Io(e)));
                SendState::Cleanup
            }

            SendState::Cleanup => {
                if let Some(secondary) = channel
                    && let Err(e) = drive.close_channel(secondary, storage)
                {
                    warn!("Closing channel {} failed: {}", secondary, e.code());
                    if result.is_ok() {
                        result = Err(FastloaderError::Io(e));
                    }
                }
                return result;
            }
        };
    }
}

/// Receive a file from the host into the write buffer open on `secondary`.
/// The file arrives as blocks, each a count byte then the data, ended by a
/// count of 0.  `ack` is called after every block with whether it was
/// stored.  However the transfer ends, the channel is closed.
pub(crate) fn receive_file<B, S, G, A>(
    bus: &mut B,
    drive: &mut Drive,
    storage: &mut S,
    secondary: u8,
    mut get: G,
    mut ack: A,
) -> Result<(), FastloaderError>
where
    B: IecHal + ?Sized,
    S: Storage + ?Sized,
    G: FnMut(&mut B) -> Result<u8, FastloaderError>,
    A: FnMut(&mut B, bool) -> Result<(), FastloaderError>,
{
    let Some(idx) = drive.find_buffer(secondary).filter(|&idx| drive.buffer(idx).write) else {
        drive.set_error(DosError::FileNotOpen);
        return Err(FastloaderError::Io(DosError::FileNotOpen));
    };

    let mut result = Ok(());
    'blocks: loop {
        if let Err(e) = check_keys(drive) {
            result = Err(e);
            break;
        }
        let count = match get(bus) {
            Ok(count) => count,
            Err(e) => {
                result = Err(e);
                break;
            }
        };
        if count == 0 {
            break;
        }

        // Keep receiving after a storage error, so the host stays in step
        let mut stored = Ok(());
        for _ in 0..count {
            match get(bus) {
                Ok(byte) => {
                    if stored.is_ok() {
                        stored = drive.put_byte(idx, byte, storage);
                    }
                }
                Err(e) => {
                    result = Err(e);
                    break 'blocks;
                }
            }
        }

        if let Err(e) = ack(bus, stored.is_ok()) {
            result = Err(e);
            break;
        }
        if let Err(e) = stored {
            result = Err(FastloaderError::Io(e));
            break;
        }
    }

    let closed = drive.close_channel(secondary, storage);
    if result.is_ok() {
        result = closed.map_err(FastloaderError::Io);
    }
    result
}
