//! ELoad version 1.
//!
//! A file loader with a command byte: 1 is followed by a filename, length
//! first, and answered with the file as counted blocks.  Anything else ends
//! the loader.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

#[allow(unused_imports)]
use crate::fmt::{debug, error, info, trace, warn};

use super::ll::eload1::{eload1_get_byte, eload1_send_byte};
use super::{Counted, FastloaderError, FileSource, check_keys, receive_name, send_file};
use crate::bus::IecHal;
use crate::drive::Drive;
use crate::fileops::Storage;

const CMD_LOAD: u8 = 1;

pub(super) fn load_eload1<B, S>(bus: &mut B, drive: &mut Drive, storage: &mut S) -> Result<(), FastloaderError>
where
    B: IecHal + ?Sized,
    S: Storage + ?Sized,
{
    loop {
        check_keys(drive)?;

        let cmd = eload1_get_byte(bus)?;
        if cmd != CMD_LOAD {
            debug!("ELoad1 exit command {}", cmd);
            return Ok(());
        }

        let len = eload1_get_byte(bus)? as usize;
        let name = receive_name(bus, len, eload1_get_byte)?;

        let mut sender = Counted(|bus: &mut B, byte| eload1_send_byte(bus, byte));
        match send_file(&mut sender, bus, drive, storage, FileSource::Name(name)) {
            // The host has been sent the error, and may ask again
            Ok(()) | Err(FastloaderError::Io(_)) => {}
            Err(e) => return Err(e),
        }
    }
}
