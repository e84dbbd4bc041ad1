//! Action Replay 6 1581 byte transfers.  The host strobes DATA when
//! receiving and CLOCK when sending.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

use super::{Generic2Bit, Llfl};
use crate::bus::{IecHal, IecLine};
use crate::fastloader::FastloaderError;
use crate::util::time::us;

pub const AR6_SEND_DEF: Generic2Bit = Generic2Bit {
    pairtimes: [us(8), us(16), us(24), us(32)],
    clockbits: [0, 2, 4, 6],
    databits: [1, 3, 5, 7],
    eorvalue: 0,
};

pub const AR6_GET_DEF: Generic2Bit = Generic2Bit {
    pairtimes: [us(12), us(22), us(32), us(42)],
    clockbits: [7, 5, 3, 1],
    databits: [6, 4, 2, 0],
    eorvalue: 0,
};

pub fn ar6_send_byte<B: IecHal + ?Sized>(bus: &mut B, byte: u8) -> Result<(), FastloaderError> {
    Llfl::new(bus).strobed_load_2bit(IecLine::Data, &AR6_SEND_DEF, byte)
}

pub fn ar6_get_byte<B: IecHal + ?Sized>(bus: &mut B) -> Result<u8, FastloaderError> {
    Llfl::new(bus).strobed_save_2bit(IecLine::Clock, &AR6_GET_DEF)
}
