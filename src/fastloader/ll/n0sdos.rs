//! N0stalgia file read byte transfer, strobed by the host on CLOCK.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

use super::{Generic2Bit, Llfl};
use crate::bus::{IecHal, IecLine};
use crate::fastloader::FastloaderError;
use crate::util::time::us;

pub const N0SDOS_SEND_DEF: Generic2Bit = Generic2Bit {
    pairtimes: [us(10), us(22), us(34), us(46)],
    clockbits: [0, 1, 2, 3],
    databits: [4, 5, 6, 7],
    eorvalue: 0,
};

pub fn n0sdos_send_byte<B: IecHal + ?Sized>(bus: &mut B, byte: u8) -> Result<(), FastloaderError> {
    Llfl::new(bus).strobed_load_2bit(IecLine::Clock, &N0SDOS_SEND_DEF, byte)
}
