//! ELoad version 1 byte transfers, strobed by the host on CLOCK in both
//! directions.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

use super::{Generic2Bit, Llfl};
use crate::bus::{IecHal, IecLine};
use crate::fastloader::FastloaderError;
use crate::util::time::us;

pub const ELOAD1_SEND_DEF: Generic2Bit = Generic2Bit {
    pairtimes: [us(12), us(24), us(36), us(48)],
    clockbits: [7, 5, 3, 1],
    databits: [6, 4, 2, 0],
    eorvalue: 0xff,
};

pub const ELOAD1_GET_DEF: Generic2Bit = Generic2Bit {
    pairtimes: [us(14), us(26), us(38), us(50)],
    clockbits: [0, 2, 4, 6],
    databits: [1, 3, 5, 7],
    eorvalue: 0xff,
};

pub fn eload1_send_byte<B: IecHal + ?Sized>(bus: &mut B, byte: u8) -> Result<(), FastloaderError> {
    Llfl::new(bus).strobed_load_2bit(IecLine::Clock, &ELOAD1_SEND_DEF, byte)
}

pub fn eload1_get_byte<B: IecHal + ?Sized>(bus: &mut B) -> Result<u8, FastloaderError> {
    Llfl::new(bus).strobed_save_2bit(IecLine::Clock, &ELOAD1_GET_DEF)
}
