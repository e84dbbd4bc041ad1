//! JiffyDOS byte transfers.
//!
//! JiffyDOS isn't a fastloader in the usual sense - it replaces the bit
//! loop of the standard protocol once the host has answered the detection
//! probe, so the bus engine calls these directly.  LOAD mode (secondary
//! 0x61) uses the same byte transfer started by a DATA pulse, so the host
//! can pull a whole sector with no per-byte acknowledge.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

use super::{AtnMode, Generic2Bit, Llfl, WaitMode};
use crate::bus::{IecBusLines, IecHal, IecLine};
use crate::fastloader::FastloaderError;
use crate::util::time::us;

/// Host to drive.  The host inverts every bit.
pub const JIFFY_RECEIVE_DEF: Generic2Bit = Generic2Bit {
    pairtimes: [us(18) + 500, us(31) + 500, us(42) + 500, us(55) + 500],
    clockbits: [4, 6, 3, 2],
    databits: [5, 7, 1, 0],
    eorvalue: 0xff,
};

/// Drive to host.
pub const JIFFY_SEND_DEF: Generic2Bit = Generic2Bit {
    pairtimes: [us(10), us(20), us(31), us(41)],
    clockbits: [0, 2, 4, 6],
    databits: [1, 3, 5, 7],
    eorvalue: 0,
};

/// When the host signals EOI (CLOCK) and ATN after a received byte.
const RECEIVE_EOI_SAMPLE_NS: u32 = us(67);

/// When the drive acknowledges a received byte.
const RECEIVE_ACK_NS: u32 = us(73);

/// When the drive signals EOI after a sent byte.
const SEND_EOI_NS: u32 = us(52);

/// How long the sent EOI marker is held once the host has acknowledged it.
const SEND_HOLD_US: u32 = 10;

/// Receive a byte.  Returns the byte and whether the host flagged it as the
/// last (EOI).  On ATN, DATA is left pulled, acknowledging it.
pub fn jiffy_receive<B: IecHal + ?Sized>(bus: &mut B) -> Result<(u8, bool), FastloaderError> {
    let mut ll = Llfl::new(bus);

    // Signal we're ready, and wait for the host to start
    ll.bus().release_data();
    if let Err(e) = ll.wait_clock(true, AtnMode::AtnAbort) {
        ll.bus().set_data();
        return Err(e);
    }

    let value = ll.generic_save_2bit(&JIFFY_RECEIVE_DEF);

    // The host then sets CLOCK for EOI, and may assert ATN
    let lines = ll.read_bus_at(RECEIVE_EOI_SAMPLE_NS);
    ll.set_data_at(RECEIVE_ACK_NS, false, WaitMode::Wait);
    if !lines.contains(IecBusLines::ATN) {
        return Err(FastloaderError::Atn);
    }
    Ok((value, lines.contains(IecBusLines::CLOCK)))
}

/// Send a byte.  The host starts each byte by releasing DATA - it holds
/// DATA between bytes, except in LOAD mode where it pulses it instead.
pub fn jiffy_send<B: IecHal + ?Sized>(bus: &mut B, byte: u8, eoi: bool, load: bool) -> Result<(), FastloaderError> {
    let mut ll = Llfl::new(bus);

    ll.bus().release_data();
    ll.bus().release_clock();
    ll.bus().delay_us(3);

    if load {
        ll.wait_strobe(IecLine::Data, AtnMode::AtnAbort)?;
    } else {
        ll.wait_data(true, AtnMode::AtnAbort)?;
    }
    ll.generic_load_2bit(&JIFFY_SEND_DEF, byte);

    // EOI is CLOCK released with DATA pulled, otherwise the reverse
    ll.set_clock_at(SEND_EOI_NS, eoi, WaitMode::NoWait);
    ll.set_data_at(SEND_EOI_NS, !eoi, WaitMode::Wait);

    if !load {
        ll.wait_data(false, AtnMode::AtnAbort)?;
        ll.bus().delay_us(SEND_HOLD_US);
    }
    Ok(())
}

/// End a LOAD mode transfer: DATA pulled with CLOCK released tells the host
/// there is no more, and it answers by asserting ATN.
pub fn jiffy_load_end<B: IecHal + ?Sized>(bus: &mut B) -> Result<(), FastloaderError> {
    let mut ll = Llfl::new(bus);
    ll.bus().release_clock();
    ll.bus().set_data();
    ll.wait_atn(false)
}
