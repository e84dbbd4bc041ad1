//! ULoad Model 3.
//!
//! A sector loader with a one byte command: 1 reads a sector, answered by a
//! status byte (0 for success, 0xff for an error) and, on success, the
//! sector; 2 writes a sector and is answered by a status byte.  Any other
//! command ends the loader.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

#[allow(unused_imports)]
use crate::fmt::{debug, error, info, trace, warn};

use super::ll::uload3::{uload3_get_byte, uload3_send_byte};
use super::{
    FastloaderError, check_keys, read_sector, receive_block, send_block, with_buffer, write_sector,
};
use crate::bus::IecHal;
use crate::drive::Drive;
use crate::fileops::Storage;

const CMD_READ: u8 = 1;
const CMD_WRITE: u8 = 2;

const STATUS_OK: u8 = 0;
const STATUS_ERROR: u8 = 0xff;

pub(super) fn load_uload3<B, S>(bus: &mut B, drive: &mut Drive, storage: &mut S) -> Result<(), FastloaderError>
where
    B: IecHal + ?Sized,
    S: Storage + ?Sized,
{
    with_buffer(drive, |drive, idx| loop {
        check_keys(drive)?;

        let cmd = uload3_get_byte(bus)?;
        if cmd != CMD_READ && cmd != CMD_WRITE {
            debug!("ULoad3 exit command {}", cmd);
            return Ok(());
        }
        let track = uload3_get_byte(bus)?;
        let sector = uload3_get_byte(bus)?;

        if cmd == CMD_READ {
            match read_sector(drive, storage, idx, track, sector) {
                Ok(()) => {
                    uload3_send_byte(bus, STATUS_OK)?;
                    send_block(bus, &drive.buffer(idx).data, uload3_send_byte)?;
                }
                Err(_) => uload3_send_byte(bus, STATUS_ERROR)?,
            }
        } else {
            receive_block(bus, &mut drive.buffer_mut(idx).data, uload3_get_byte)?;
            let status = match write_sector(drive, storage, idx, track, sector) {
                Ok(()) => STATUS_OK,
                Err(_) => STATUS_ERROR,
            };
            uload3_send_byte(bus, status)?;
        }
    })
}
