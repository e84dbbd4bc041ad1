//! Epyx FastLoad cartridge byte transfers.
//!
//! The cartridge uploads its second stage, then the filename, using the
//! get routine, and the file comes back with the send routine.  Both are
//! strobed by the host on CLOCK.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

use super::{Generic2Bit, Llfl};
use crate::bus::{IecHal, IecLine};
use crate::fastloader::FastloaderError;
use crate::util::time::us;

pub const EPYX_SEND_DEF: Generic2Bit = Generic2Bit {
    pairtimes: [us(10), us(20), us(30), us(40)],
    clockbits: [7, 6, 3, 2],
    databits: [5, 4, 1, 0],
    eorvalue: 0xff,
};

pub const EPYX_GET_DEF: Generic2Bit = Generic2Bit {
    pairtimes: [us(16), us(28), us(40), us(52)],
    clockbits: [7, 5, 3, 1],
    databits: [6, 4, 2, 0],
    eorvalue: 0xff,
};

pub fn epyx_send_byte<B: IecHal + ?Sized>(bus: &mut B, byte: u8) -> Result<(), FastloaderError> {
    Llfl::new(bus).strobed_load_2bit(IecLine::Clock, &EPYX_SEND_DEF, byte)
}

pub fn epyx_get_byte<B: IecHal + ?Sized>(bus: &mut B) -> Result<u8, FastloaderError> {
    Llfl::new(bus).strobed_save_2bit(IecLine::Clock, &EPYX_GET_DEF)
}
