//! GEOS and Wheels byte transfers.
//!
//! Stage 1 only receives (the stage 2 code), with a table depending on
//! whether the host is a 64 or a 128.  Stages 2 and 3 receive commands and
//! write data, and send read data and status, with tables depending on the
//! drive being emulated.  The host strobes CLOCK when sending and DATA when
//! receiving.
//!
//! The hold times of these tables were set empirically against real hosts,
//! and are deliberately not tidied.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

use super::{Generic2Bit, Llfl};
use crate::bus::{IecHal, IecLine};
use crate::config::DriveModel;
use crate::fastloader::FastloaderError;
use crate::util::time::us;

pub const GEOS_1541_SEND_DEF: Generic2Bit = Generic2Bit {
    pairtimes: [us(11), us(21), us(31), us(41)],
    clockbits: [3, 2, 7, 6],
    databits: [1, 0, 5, 4],
    eorvalue: 0x0f,
};

pub const GEOS_1541_GET_DEF: Generic2Bit = Generic2Bit {
    pairtimes: [us(15), us(29), us(40), us(53)],
    clockbits: [7, 6, 3, 2],
    databits: [5, 4, 1, 0],
    eorvalue: 0xff,
};

pub const GEOS_1571_SEND_DEF: Generic2Bit = Generic2Bit {
    pairtimes: [us(10), us(19), us(28), us(37)],
    clockbits: [3, 2, 7, 6],
    databits: [1, 0, 5, 4],
    eorvalue: 0x0f,
};

pub const GEOS_1571_GET_DEF: Generic2Bit = Generic2Bit {
    pairtimes: [us(13), us(24), us(34), us(45)],
    clockbits: [7, 6, 3, 2],
    databits: [5, 4, 1, 0],
    eorvalue: 0xff,
};

pub const GEOS_1581_SEND_DEF: Generic2Bit = Generic2Bit {
    pairtimes: [us(9), us(18), us(27), us(36)],
    clockbits: [3, 2, 7, 6],
    databits: [1, 0, 5, 4],
    eorvalue: 0x0f,
};

pub const GEOS_1581_GET_DEF: Generic2Bit = Generic2Bit {
    pairtimes: [us(12), us(22), us(32), us(42)],
    clockbits: [7, 6, 3, 2],
    databits: [5, 4, 1, 0],
    eorvalue: 0xff,
};

pub const GEOS_S1_64_GET_DEF: Generic2Bit = Generic2Bit {
    pairtimes: [us(15), us(25), us(35), us(45)],
    clockbits: [4, 6, 3, 2],
    databits: [5, 7, 1, 0],
    eorvalue: 0xff,
};

// A 128 in fast mode runs at twice the speed, but the stage 1 code runs in
// slow mode with the VIC off, so it's only a little faster
pub const GEOS_S1_128_GET_DEF: Generic2Bit = Generic2Bit {
    pairtimes: [us(13), us(22), us(31), us(40)],
    clockbits: [4, 6, 3, 2],
    databits: [5, 7, 1, 0],
    eorvalue: 0xff,
};

pub const WHEELS_S1_64_GET_DEF: Generic2Bit = Generic2Bit {
    pairtimes: [us(16), us(26), us(37), us(47)],
    clockbits: [7, 6, 3, 2],
    databits: [5, 4, 1, 0],
    eorvalue: 0xff,
};

pub const WHEELS_S1_128_GET_DEF: Generic2Bit = Generic2Bit {
    pairtimes: [us(14), us(23), us(33), us(42)],
    clockbits: [7, 6, 3, 2],
    databits: [5, 4, 1, 0],
    eorvalue: 0xff,
};

/// The send and get tables for stages 2 and 3.
#[derive(Debug, Clone, Copy)]
pub struct GeosTables {
    pub send: &'static Generic2Bit,
    pub get: &'static Generic2Bit,
}

impl GeosTables {
    pub const fn for_model(model: DriveModel) -> Self {
        match model {
            DriveModel::D1541 => Self {
                send: &GEOS_1541_SEND_DEF,
                get: &GEOS_1541_GET_DEF,
            },
            DriveModel::D1571 => Self {
                send: &GEOS_1571_SEND_DEF,
                get: &GEOS_1571_GET_DEF,
            },
            DriveModel::D1581 | DriveModel::CmdHd => Self {
                send: &GEOS_1581_SEND_DEF,
                get: &GEOS_1581_GET_DEF,
            },
        }
    }
}

pub fn geos_send_byte<B: IecHal + ?Sized>(bus: &mut B, def: &Generic2Bit, byte: u8) -> Result<(), FastloaderError> {
    Llfl::new(bus).strobed_load_2bit(IecLine::Data, def, byte)
}

pub fn geos_get_byte<B: IecHal + ?Sized>(bus: &mut B, def: &Generic2Bit) -> Result<u8, FastloaderError> {
    Llfl::new(bus).strobed_save_2bit(IecLine::Clock, def)
}
