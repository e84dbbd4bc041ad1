//! Epyx FastLoad cartridge.
//!
//! Once started, the cartridge uploads a second stage of 256 bytes, which is
//! identified by its CRC-16 (seeded with 0xffff) against the known versions.  It then sends the filename, length
//! first and the name back to front, and gets the file back a sector at a
//! time: a count byte, then the sector's data back to front.  A zero count
//! ends the file, and 0xff reports an error.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

#[allow(unused_imports)]
use crate::fmt::{debug, error, info, trace, warn};

use super::ll::epyx::{epyx_get_byte, epyx_send_byte};
use super::{FastloaderError, FileSender, FileSource, Sector, count_byte, receive_name, send_file};
use crate::bus::IecHal;
use crate::drive::Drive;
use crate::error::DosError;
use crate::fileops::Storage;
use crate::util::crc::crc16_update;

const STAGE2_LEN: usize = 256;

/// CRCs of the known second stages.
const STAGE2_CRCS: &[u16] = &[0x5a01];

struct Epyx;

impl<B: IecHal + ?Sized> FileSender<B> for Epyx {
    fn send_sector(&mut self, bus: &mut B, sector: &Sector<'_>) -> Result<(), FastloaderError> {
        if sector.data.is_empty() {
            return Ok(());
        }
        epyx_send_byte(bus, count_byte(sector.data.len())?)?;
        sector
            .data
            .iter()
            .rev()
            .try_for_each(|&byte| epyx_send_byte(bus, byte))
    }

    fn send_eof(&mut self, bus: &mut B) -> Result<(), FastloaderError> {
        epyx_send_byte(bus, 0)
    }

    fn send_error(&mut self, bus: &mut B, _error: DosError) -> Result<(), FastloaderError> {
        epyx_send_byte(bus, 0xff)
    }
}

pub(super) fn load_epyxcart<B, S>(bus: &mut B, drive: &mut Drive, storage: &mut S) -> Result<(), FastloaderError>
where
    B: IecHal + ?Sized,
    S: Storage + ?Sized,
{
    let mut crc = 0xffff;
    for _ in 0..STAGE2_LEN {
        crc = crc16_update(crc, epyx_get_byte(bus)?);
    }
    if !STAGE2_CRCS.contains(&crc) {
        warn!("Unknown Epyx stage 2, CRC {:x}", crc);
        drive.set_error(DosError::UnknownDrivecode);
        return Err(FastloaderError::Protocol);
    }

    let len = epyx_get_byte(bus)? as usize;
    let mut name = receive_name(bus, len, epyx_get_byte)?;
    name.reverse();

    send_file(&mut Epyx, bus, drive, storage, FileSource::Name(name))
}
