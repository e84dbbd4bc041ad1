//! DolphinDOS burst transfers over the parallel cable.
//!
//! Burst load streams the file open on channel 0 as counted blocks.  Burst
//! save receives bytes into the file open on channel 1 until the host marks
//! the last one with EOI.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

#[allow(unused_imports)]
use crate::fmt::{debug, error, info, trace, warn};

use super::ll::dolphin::{dolphin_getc, dolphin_putc, dolphin_release};
use super::{Counted, FastloaderError, FileSource, check_keys, send_file};
use crate::bus::IecHal;
use crate::drive::Drive;
use crate::error::DosError;
use crate::fileops::Storage;

pub(super) fn load_dolphin_burst<B, S>(bus: &mut B, drive: &mut Drive, storage: &mut S) -> Result<(), FastloaderError>
where
    B: IecHal + ?Sized,
    S: Storage + ?Sized,
{
    if !drive.config.parallel_cable {
        warn!("Dolphin burst load without a parallel cable");
        return Err(FastloaderError::Protocol);
    }

    let mut sender = Counted(|bus: &mut B, byte| dolphin_putc(bus, byte));
    let result = send_file(&mut sender, bus, drive, storage, FileSource::Channel(0));
    dolphin_release(bus);
    result
}

pub(super) fn save_dolphin_burst<B, S>(bus: &mut B, drive: &mut Drive, storage: &mut S) -> Result<(), FastloaderError>
where
    B: IecHal + ?Sized,
    S: Storage + ?Sized,
{
    if !drive.config.parallel_cable {
        warn!("Dolphin burst save without a parallel cable");
        return Err(FastloaderError::Protocol);
    }

    let Some(idx) = drive.find_buffer(1).filter(|&idx| drive.buffer(idx).write) else {
        drive.set_error(DosError::FileNotOpen);
        return Err(FastloaderError::Io(DosError::FileNotOpen));
    };

    let mut result = Ok(());
    loop {
        if let Err(e) = check_keys(drive) {
            result = Err(e);
            break;
        }
        match dolphin_getc(bus) {
            Ok((byte, eoi)) => {
                if let Err(e) = drive.put_byte(idx, byte, storage) {
                    result = Err(FastloaderError::Io(e));
                    break;
                }
                if eoi {
                    break;
                }
            }
            Err(e) => {
                result = Err(e);
                break;
            }
        }
    }

    dolphin_release(bus);
    let closed = drive.close_channel(1, storage);
    if result.is_ok() {
        result = closed.map_err(FastloaderError::Io);
    }
    result
}
