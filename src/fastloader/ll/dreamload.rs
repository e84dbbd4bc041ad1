//! DreamLoad transfers.
//!
//! Sector data goes to the host as 2 bit pairs, strobed by the host on
//! DATA.  Jobcodes (the track and sector to read) come from the host two
//! bits per strobe edge, most significant pair first: the current version
//! strobes with CLOCK and carries the bits on DATA and ATN, the old version
//! strobes with ATN and carries the bits on CLOCK and DATA.  Either way ATN
//! is part of the protocol, so can't be used to abort.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

use super::{AtnMode, Generic2Bit, Llfl, STROBE_SETTLE_NS};
use crate::bus::{IecBusLines, IecHal, IecLine};
use crate::fastloader::FastloaderError;
use crate::util::time::us;

pub const DREAMLOAD_SEND_DEF: Generic2Bit = Generic2Bit {
    pairtimes: [us(11), us(21), us(31), us(41)],
    clockbits: [7, 5, 3, 1],
    databits: [6, 4, 2, 0],
    eorvalue: 0xdc,
};

pub const DREAMLOAD_OLD_SEND_DEF: Generic2Bit = Generic2Bit {
    eorvalue: 0xac,
    ..DREAMLOAD_SEND_DEF
};

pub fn dreamload_send_byte<B: IecHal + ?Sized>(bus: &mut B, old: bool, byte: u8) -> Result<(), FastloaderError> {
    let def = if old {
        &DREAMLOAD_OLD_SEND_DEF
    } else {
        &DREAMLOAD_SEND_DEF
    };
    Llfl::new(bus).strobed_load_2bit(IecLine::Data, def, byte)
}

/// Receive a jobcode byte.
pub fn dreamload_get_byte<B: IecHal + ?Sized>(bus: &mut B, old: bool) -> Result<u8, FastloaderError> {
    let (strobe, high_bit, low_bit) = if old {
        (IecLine::Atn, IecBusLines::CLOCK, IecBusLines::DATA)
    } else {
        (IecLine::Clock, IecBusLines::DATA, IecBusLines::ATN)
    };

    let mut ll = Llfl::new(bus);
    let mut high = ll.bus().read_raw().contains(strobe.mask());
    let mut value = 0u8;
    for _ in 0..4 {
        ll.wait_toggle(strobe, high, AtnMode::NoAtnAbort)?;
        high = !high;
        let lines = ll.read_bus_at(STROBE_SETTLE_NS);
        value <<= 2;
        if lines.contains(high_bit) {
            value |= 0x02;
        }
        if lines.contains(low_bit) {
            value |= 0x01;
        }
    }
    Ok(value)
}
