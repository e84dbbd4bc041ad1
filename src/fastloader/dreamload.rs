//! DreamLoad.
//!
//! DreamLoad's host code sends jobcodes - a track and sector - by toggling
//! a strobe line with two bits riding on the other lines, and gets the
//! sector back as 256 strobed bytes.  Track 0 is reserved for control: sector
//! 0 ends the loader, and sector 1 asks the drive to re-read the disk after
//! a disk change.
//!
//! There's no way to tell the host a sector couldn't be read, so a read
//! error ends the loader, leaving the error on the error channel.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

#[allow(unused_imports)]
use crate::fmt::{debug, error, info, trace, warn};

use super::ll::dreamload::{dreamload_get_byte, dreamload_send_byte};
use super::{FastloaderError, check_keys, read_sector, send_block, with_buffer};
use crate::bus::IecHal;
use crate::drive::Drive;
use crate::fileops::Storage;

/// How long the host gives the user to swap disks before asking for a
/// re-read.
const DISK_CHANGE_DELAY_MS: u32 = 1_000;

pub(super) fn load_dreamload<B, S>(old: bool, bus: &mut B, drive: &mut Drive, storage: &mut S) -> Result<(), FastloaderError>
where
    B: IecHal + ?Sized,
    S: Storage + ?Sized,
{
    bus.release_all();

    with_buffer(drive, |drive, idx| loop {
        check_keys(drive)?;

        let track = dreamload_get_byte(bus, old)?;
        let sector = dreamload_get_byte(bus, old)?;
        trace!("DreamLoad job {} {}", track, sector);

        match (track, sector) {
            (0, 0) => return Ok(()),
            (0, 1) => {
                info!("DreamLoad disk change");
                bus.delay_ms(DISK_CHANGE_DELAY_MS);
                storage.reinit(drive);
            }
            (0, _) => debug!("Ignoring DreamLoad control job {}", sector),
            _ => {
                read_sector(drive, storage, idx, track, sector)?;
                send_block(bus, &drive.buffer(idx).data, |bus: &mut B, byte| {
                    dreamload_send_byte(bus, old, byte)
                })?;
            }
        }
    })
}
