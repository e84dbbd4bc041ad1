//! GEOS and Wheels.
//!
//! GEOS boots in stages.  Stage 1 uploads the stage 2 drive code, as a
//! 16 bit length then the code.  Stages 2 and 3 are the same protocol, a
//! loop of four byte command blocks - command, track, sector and a
//! parameter - which read and write whole sectors and report status.
//! Wheels is the same, with a couple of extra commands.
//!
//! The byte transfers and their timing are GEOS's own, but the command
//! blocks are not: the real drive code dispatches on job addresses within
//! the code the host uploaded, so it is replaced here by a fixed set of
//! command numbers.
//!
//! Status bytes are the drive's error code mapped to what the GEOS disk
//! driver expects: 1 for OK, code - 18 for the 2x read/write errors, and
//! 0x0b for anything else.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

#[allow(unused_imports)]
use crate::fmt::{debug, error, info, trace, warn};

use super::ll::Generic2Bit;
use super::ll::geos::{
    GEOS_S1_64_GET_DEF, GEOS_S1_128_GET_DEF, GeosTables, WHEELS_S1_64_GET_DEF,
    WHEELS_S1_128_GET_DEF, geos_get_byte, geos_send_byte,
};
use super::{
    FastloaderError, FastloaderId, check_keys, read_sector, receive_block, send_block, with_buffer,
    write_sector,
};
use crate::bus::IecHal;
use crate::config::DriveModel;
use crate::drive::Drive;
use crate::error::DosError;
use crate::fileops::Storage;

// Stage 2/3 command block numbers
const CMD_QUIT: u8 = 0;
const CMD_READ: u8 = 1;
const CMD_WRITE: u8 = 2;
const CMD_STATUS: u8 = 3;
const CMD_REINIT: u8 = 4;
const CMD_SET_ADDRESS: u8 = 5;
const CMD_DISK_FREE: u8 = 6;

/// The GEOS disk driver's view of a drive error.
fn geos_status(error: DosError) -> u8 {
    match error.code() {
        0 => 1,
        code @ 20..=29 => code - 18,
        _ => 0x0b,
    }
}

/// Stage 1: receive the stage 2 code, then carry on as stage 2.
pub(super) fn load_geos_s1<B, S>(id: FastloaderId, bus: &mut B, drive: &mut Drive, storage: &mut S) -> Result<(), FastloaderError>
where
    B: IecHal + ?Sized,
    S: Storage + ?Sized,
{
    let def: &Generic2Bit = match id {
        FastloaderId::GeosS1_128 => &GEOS_S1_128_GET_DEF,
        FastloaderId::WheelsS1_64 => &WHEELS_S1_64_GET_DEF,
        FastloaderId::WheelsS1_128 => &WHEELS_S1_128_GET_DEF,
        _ => &GEOS_S1_64_GET_DEF,
    };

    let lo = geos_get_byte(bus, def)?;
    let hi = geos_get_byte(bus, def)?;
    let len = u16::from_le_bytes([lo, hi]);
    debug!("GEOS stage 1 receiving {} bytes", len);

    // The drive code itself is of no interest
    for _ in 0..len {
        geos_get_byte(bus, def)?;
        check_keys(drive)?;
    }

    let wheels = matches!(id, FastloaderId::WheelsS1_64 | FastloaderId::WheelsS1_128);
    let next = match (wheels, drive.config.model) {
        (false, DriveModel::D1541) => FastloaderId::GeosS23_1541,
        (false, DriveModel::D1571) => FastloaderId::GeosS23_1571,
        (false, _) => FastloaderId::GeosS23_1581,
        (true, DriveModel::D1581 | DriveModel::CmdHd) => FastloaderId::Wheels44S2_1581,
        (true, _) => FastloaderId::WheelsS2,
    };
    info!("GEOS stage 1 complete, moving to {:?}", next);
    drive.detected_loader = next;

    load_geos_s23(next, bus, drive, storage)
}

/// Stages 2 and 3: the command loop.
pub(super) fn load_geos_s23<B, S>(id: FastloaderId, bus: &mut B, drive: &mut Drive, storage: &mut S) -> Result<(), FastloaderError>
where
    B: IecHal + ?Sized,
    S: Storage + ?Sized,
{
    let tables = match id {
        FastloaderId::GeosS23_1541 => GeosTables::for_model(DriveModel::D1541),
        FastloaderId::GeosS23_1571 => GeosTables::for_model(DriveModel::D1571),
        FastloaderId::GeosS23_1581 | FastloaderId::Wheels44S2_1581 => {
            GeosTables::for_model(DriveModel::D1581)
        }
        _ => GeosTables::for_model(drive.config.model),
    };
    let wheels = matches!(
        id,
        FastloaderId::WheelsS2 | FastloaderId::Wheels44S2 | FastloaderId::Wheels44S2_1581
    );
    let wheels44 = matches!(id, FastloaderId::Wheels44S2 | FastloaderId::Wheels44S2_1581);

    let send = |bus: &mut B, byte: u8| geos_send_byte(bus, tables.send, byte);
    let get = |bus: &mut B| geos_get_byte(bus, tables.get);

    with_buffer(drive, |drive, idx| loop {
        check_keys(drive)?;

        let mut command = [0u8; 4];
        for byte in command.iter_mut() {
            *byte = get(bus)?;
        }
        let [cmd, track, sector, param] = command;
        trace!("GEOS command {} {} {} {}", cmd, track, sector, param);

        match cmd {
            CMD_QUIT => return Ok(()),
            CMD_READ => {
                // The host always takes a whole sector, then the status.  A
                // failed read goes out as zeros rather than stale data.
                let status = match read_sector(drive, storage, idx, track, sector) {
                    Ok(()) => DosError::Ok,
                    Err(e) => {
                        drive.buffer_mut(idx).data.fill(0);
                        e
                    }
                };
                send_block(bus, &drive.buffer(idx).data, send)?;
                send(bus, geos_status(status))?;
            }
            CMD_WRITE => {
                receive_block(bus, &mut drive.buffer_mut(idx).data, get)?;
                let status = write_sector(drive, storage, idx, track, sector).err().unwrap_or(DosError::Ok);
                send(bus, geos_status(status))?;
            }
            CMD_STATUS => send(bus, geos_status(drive.error().error))?,
            CMD_REINIT => {
                storage.reinit(drive);
                send(bus, geos_status(drive.error().error))?;
            }
            CMD_SET_ADDRESS if wheels44 => {
                info!("Wheels setting device address {}", param);
                drive.device_address = param;
                send(bus, geos_status(DosError::Ok))?;
            }
            CMD_DISK_FREE if wheels => {
                let free = match storage.disk_free(drive.current_part) {
                    Ok(free) => free,
                    Err(e) => {
                        warn!("Wheels disk free failed: {}", e.code());
                        drive.set_error(e);
                        0
                    }
                };
                let [lo, hi] = free.to_le_bytes();
                send(bus, lo)?;
                send(bus, hi)?;
            }
            _ => {
                warn!("Unknown GEOS command {}", cmd);
                return Err(FastloaderError::Protocol);
            }
        }
    })
}
