//! Final Cartridge III byte transfers.
//!
//! All variants are strobed by the host on CLOCK.  The freezer variants
//! only differ in timing - the old freezer has separate PAL and NTSC
//! routines, as it was written for the host's clock speed.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

use super::{Generic2Bit, Llfl};
use crate::bus::{IecHal, IecLine};
use crate::fastloader::FastloaderError;
use crate::util::time::us;

/// Host to drive (save).
pub const FC3_GET_DEF: Generic2Bit = Generic2Bit {
    pairtimes: [us(17), us(30), us(42), us(52)],
    clockbits: [0, 1, 2, 3],
    databits: [4, 5, 6, 7],
    eorvalue: 0xff,
};

/// Drive to host (load).
pub const FC3_SEND_DEF: Generic2Bit = Generic2Bit {
    pairtimes: [us(12), us(22), us(32), us(42)],
    clockbits: [0, 2, 4, 6],
    databits: [1, 3, 5, 7],
    eorvalue: 0,
};

/// Drive to host (unfreeze).
pub const FC3_FREEZED_DEF: Generic2Bit = Generic2Bit {
    pairtimes: [us(14), us(26), us(38), us(50)],
    clockbits: [1, 3, 5, 7],
    databits: [0, 2, 4, 6],
    eorvalue: 0xff,
};

pub const FC3_OLDFREEZED_PAL_DEF: Generic2Bit = Generic2Bit {
    pairtimes: [us(15), us(28), us(41), us(54)],
    clockbits: [6, 4, 2, 0],
    databits: [7, 5, 3, 1],
    eorvalue: 0,
};

// NTSC hosts run slightly faster
pub const FC3_OLDFREEZED_NTSC_DEF: Generic2Bit = Generic2Bit {
    pairtimes: [us(14), us(27), us(39), us(51)],
    clockbits: [6, 4, 2, 0],
    databits: [7, 5, 3, 1],
    eorvalue: 0,
};

pub fn fc3_send_byte<B: IecHal + ?Sized>(bus: &mut B, def: &Generic2Bit, byte: u8) -> Result<(), FastloaderError> {
    Llfl::new(bus).strobed_load_2bit(IecLine::Clock, def, byte)
}

pub fn fc3_get_byte<B: IecHal + ?Sized>(bus: &mut B) -> Result<u8, FastloaderError> {
    Llfl::new(bus).strobed_save_2bit(IecLine::Clock, &FC3_GET_DEF)
}
