//! Turbodisk.
//!
//! The host's drive code is started with the filename embedded in the
//! `M-E` command: its length at offset 9, the name from offset 10.  The
//! file is then sent a sector at a time, each sector preceded by a status
//! byte - 1 if more sectors follow, 0 for the last, which is also followed
//! by its length.  The load address is sent once, at the start of the first
//! sector.
//!
//! Turbodisk's timing is tight enough that it won't run off an unstable
//! clock, so that is checked first.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

#[allow(unused_imports)]
use crate::fmt::{debug, error, info, trace, warn};

use super::ll::turbodisk::turbodisk_byte;
use super::{FastloaderError, FileSender, FileSource, Sector, command_name, count_byte, send_file};
use crate::bus::IecHal;
use crate::drive::Drive;
use crate::error::DosError;
use crate::fileops::Storage;

// Where the filename sits in the M-E command.
const NAME_LEN_OFFSET: usize = 9;
const NAME_OFFSET: usize = 10;

const STATUS_MORE: u8 = 1;
const STATUS_LAST: u8 = 0;
const STATUS_ERROR: u8 = 0xff;

struct Turbodisk;

impl<B: IecHal + ?Sized> FileSender<B> for Turbodisk {
    fn handshake(&mut self, bus: &mut B) -> Result<(), FastloaderError> {
        // Busy until the first byte is ready
        bus.release_data();
        bus.set_clock();
        Ok(())
    }

    fn send_sector(&mut self, bus: &mut B, sector: &Sector<'_>) -> Result<(), FastloaderError> {
        turbodisk_byte(bus, if sector.last { STATUS_LAST } else { STATUS_MORE })?;

        let mut data = sector.data;
        if sector.first {
            let (address, rest) = data.split_at(data.len().min(2));
            for &byte in address {
                turbodisk_byte(bus, byte)?;
            }
            data = rest;
        }

        if sector.last {
            turbodisk_byte(bus, count_byte(data.len())?)?;
        }
        data.iter().try_for_each(|&byte| turbodisk_byte(bus, byte))
    }

    fn send_error(&mut self, bus: &mut B, _error: DosError) -> Result<(), FastloaderError> {
        turbodisk_byte(bus, STATUS_ERROR)
    }
}

pub(super) fn load_turbodisk<B, S>(bus: &mut B, drive: &mut Drive, storage: &mut S) -> Result<(), FastloaderError>
where
    B: IecHal + ?Sized,
    S: Storage + ?Sized,
{
    if !bus.clock_stable() {
        error!("Clock unstable, refusing to run Turbodisk");
        drive.set_error(DosError::ClockUnstable);
        return Err(FastloaderError::Io(DosError::ClockUnstable));
    }

    let len = drive.command.get(NAME_LEN_OFFSET).copied().unwrap_or(0) as usize;
    let name = command_name(drive, NAME_OFFSET, len);
    debug!("Turbodisk loading {} byte name", name.len());

    send_file(&mut Turbodisk, bus, drive, storage, FileSource::Name(name))
}
