//! Maniac Mansion and Zak McKracken.
//!
//! The games' sector loader sends a command byte, then a track and sector,
//! all bitwise with CLOCK as the strobe.  Reads return the sector followed
//! by the drive's error code; writes take the sector and return the error
//! code.  A sector that can't be read is sent as zeros.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

#[allow(unused_imports)]
use crate::fmt::{debug, error, info, trace, warn};

use super::ll::mmzak::{mmzak_read_byte, mmzak_send_byte};
use super::{
    FastloaderError, check_keys, read_sector, receive_block, send_block, with_buffer, write_sector,
};
use crate::bus::IecHal;
use crate::drive::Drive;
use crate::error::DosError;
use crate::fileops::Storage;

const CMD_QUIT: u8 = 0;
const CMD_READ: u8 = 1;
const CMD_WRITE: u8 = 2;

pub(super) fn load_mmzak<B, S>(bus: &mut B, drive: &mut Drive, storage: &mut S) -> Result<(), FastloaderError>
where
    B: IecHal + ?Sized,
    S: Storage + ?Sized,
{
    bus.release_all();

    with_buffer(drive, |drive, idx| loop {
        check_keys(drive)?;

        let cmd = mmzak_read_byte(bus)?;
        if cmd == CMD_QUIT {
            return Ok(());
        }
        let track = mmzak_read_byte(bus)?;
        let sector = mmzak_read_byte(bus)?;

        let status = match cmd {
            CMD_READ => {
                let status = match read_sector(drive, storage, idx, track, sector) {
                    Ok(()) => DosError::Ok,
                    Err(e) => {
                        drive.buffer_mut(idx).data.fill(0);
                        e
                    }
                };
                send_block(bus, &drive.buffer(idx).data, mmzak_send_byte)?;
                status
            }
            CMD_WRITE => {
                receive_block(bus, &mut drive.buffer_mut(idx).data, mmzak_read_byte)?;
                write_sector(drive, storage, idx, track, sector).err().unwrap_or(DosError::Ok)
            }
            _ => {
                warn!("Unknown MM/Zak command {}", cmd);
                return Err(FastloaderError::Protocol);
            }
        };
        mmzak_send_byte(bus, status.code())?;
    })
}
