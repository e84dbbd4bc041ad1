//! ULoad Model 3 byte transfers.  The host strobes DATA when receiving and
//! CLOCK when sending.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

use super::{Generic2Bit, Llfl};
use crate::bus::{IecHal, IecLine};
use crate::fastloader::FastloaderError;
use crate::util::time::us;

pub const ULOAD3_SEND_DEF: Generic2Bit = Generic2Bit {
    pairtimes: [us(14), us(22), us(30), us(38)],
    clockbits: [0, 2, 4, 6],
    databits: [1, 3, 5, 7],
    eorvalue: 0,
};

pub const ULOAD3_GET_DEF: Generic2Bit = Generic2Bit {
    pairtimes: [us(14), us(24), us(34), us(44)],
    clockbits: [7, 6, 3, 2],
    databits: [5, 4, 1, 0],
    eorvalue: 0,
};

pub fn uload3_send_byte<B: IecHal + ?Sized>(bus: &mut B, byte: u8) -> Result<(), FastloaderError> {
    Llfl::new(bus).strobed_load_2bit(IecLine::Data, &ULOAD3_SEND_DEF, byte)
}

pub fn uload3_get_byte<B: IecHal + ?Sized>(bus: &mut B) -> Result<u8, FastloaderError> {
    Llfl::new(bus).strobed_save_2bit(IecLine::Clock, &ULOAD3_GET_DEF)
}
