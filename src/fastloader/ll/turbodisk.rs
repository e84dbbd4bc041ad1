//! Turbodisk byte transfer.
//!
//! The host pulses DATA for each byte.  The drive holds CLOCK between
//! bytes, so the host can tell when it's busy reading the next sector.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

use super::{AtnMode, Generic2Bit, Llfl, WaitMode};
use crate::bus::{IecHal, IecLine};
use crate::fastloader::FastloaderError;
use crate::util::time::us;

pub const TURBODISK_DEF: Generic2Bit = Generic2Bit {
    pairtimes: [us(31), us(60), us(89), us(118)],
    clockbits: [7, 5, 3, 1],
    databits: [6, 4, 2, 0],
    eorvalue: 0,
};

/// When the bus goes back to busy after a byte.
const BUSY_NS: u32 = us(147);

pub fn turbodisk_byte<B: IecHal + ?Sized>(bus: &mut B, byte: u8) -> Result<(), FastloaderError> {
    let mut ll = Llfl::new(bus);
    ll.wait_strobe(IecLine::Data, AtnMode::AtnAbort)?;
    ll.generic_load_2bit(&TURBODISK_DEF, byte);
    ll.set_clock_at(BUSY_NS, false, WaitMode::NoWait);
    ll.set_data_at(BUSY_NS, true, WaitMode::Wait);
    Ok(())
}
