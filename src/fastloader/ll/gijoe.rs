//! GI Joe loader byte transfers.  The host strobes DATA when receiving and
//! CLOCK when sending.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

use super::{Generic2Bit, Llfl};
use crate::bus::{IecHal, IecLine};
use crate::fastloader::FastloaderError;
use crate::util::time::us;

pub const GIJOE_SEND_DEF: Generic2Bit = Generic2Bit {
    pairtimes: [us(9), us(19), us(29), us(39)],
    clockbits: [7, 5, 3, 1],
    databits: [6, 4, 2, 0],
    eorvalue: 0xff,
};

pub const GIJOE_GET_DEF: Generic2Bit = Generic2Bit {
    pairtimes: [us(13), us(25), us(37), us(49)],
    clockbits: [0, 2, 4, 6],
    databits: [1, 3, 5, 7],
    eorvalue: 0,
};

pub fn gijoe_send_byte<B: IecHal + ?Sized>(bus: &mut B, byte: u8) -> Result<(), FastloaderError> {
    Llfl::new(bus).strobed_load_2bit(IecLine::Data, &GIJOE_SEND_DEF, byte)
}

pub fn gijoe_get_byte<B: IecHal + ?Sized>(bus: &mut B) -> Result<u8, FastloaderError> {
    Llfl::new(bus).strobed_save_2bit(IecLine::Clock, &GIJOE_GET_DEF)
}
