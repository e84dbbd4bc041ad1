//! Nippon.
//!
//! A sector loader: the host sends a track and sector bitwise, strobed by
//! toggling ATN, and gets the sector back the same way.  Track 0 ends the
//! loader, as does a sector that can't be read - the error is left on the
//! error channel.
//!
//! With ATN as the strobe, the host can't end the loader with ATN.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

#[allow(unused_imports)]
use crate::fmt::{debug, error, info, trace, warn};

use super::ll::nippon::{nippon_read_byte, nippon_send_byte};
use super::{FastloaderError, check_keys, read_sector, send_block, with_buffer};
use crate::bus::IecHal;
use crate::drive::Drive;
use crate::fileops::Storage;

pub(super) fn load_nippon<B, S>(bus: &mut B, drive: &mut Drive, storage: &mut S) -> Result<(), FastloaderError>
where
    B: IecHal + ?Sized,
    S: Storage + ?Sized,
{
    bus.release_all();

    with_buffer(drive, |drive, idx| loop {
        check_keys(drive)?;

        let track = nippon_read_byte(bus)?;
        if track == 0 {
            return Ok(());
        }
        let sector = nippon_read_byte(bus)?;
        trace!("Nippon reading {} {}", track, sector);

        read_sector(drive, storage, idx, track, sector)?;
        send_block(bus, &drive.buffer(idx).data, nippon_send_byte)?;
    })
}
