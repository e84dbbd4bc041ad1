//! Sending bytes on the IEC bus, as a talker.
//!
//! To send a byte using the standard protocol:
//! - Release CLOCK to say we are ready to send.
//! - Wait for the listener to release DATA - it is ready for data.
//! - For the last byte, signal EOI by waiting for the listener to
//!   acknowledge it: DATA pulled, then released.
//! - Pull CLOCK, and send 8 bits, LSB first.  For each, set DATA to the bit
//!   (pulled is a 0), wait the setup time, release CLOCK for the hold time,
//!   then pull CLOCK and release DATA.
//! - Wait for the listener to acknowledge the byte by pulling DATA.
//!
//! If the listener pulls DATA before a bit it has gone away, and the
//! transfer ends.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

#[allow(unused_imports)]
use crate::fmt::{debug, error, info, trace, warn};

use super::read::check_atn;
use super::{BusError, IecData};
use crate::bus::{IecBusLines, IecHal, IecLine};
use crate::util::time::iec::{
    BETWEEN_BYTES_US, BIT_HOLD_US, BIT_HOLD_VC20_US, BIT_RELEASE_US, BIT_SETUP_US,
    TALK_READY_DELAY_US, TALK_START_US, TURNAROUND_CLOCK_US, TURNAROUND_RELEASE_US,
};

// Sample the bus until DATA reaches the requested level, checking ATN on
// every sample.
fn wait_data<B: IecHal + ?Sized>(bus: &mut B, data: &mut IecData, high: bool) -> Result<(), BusError> {
    loop {
        let lines = bus.read_raw();
        check_atn(data, lines)?;
        if lines.contains(IecBusLines::DATA) == high {
            return Ok(());
        }
    }
}

/// Take over the bus as talker, after the host has released ATN following
/// TALK.  The host is holding DATA and has released CLOCK.
pub(super) fn talk_turnaround<B: IecHal + ?Sized>(bus: &mut B) {
    bus.release_data();
    bus.delay_us(TURNAROUND_RELEASE_US);
    bus.set_clock();
    bus.delay_us(TURNAROUND_CLOCK_US);
}

/// Send a byte using the standard protocol, with EOI if `eoi` is set.
/// `vc20` selects the shorter bit hold time a VIC-20 needs.
pub(super) fn iec_putc<B: IecHal + ?Sized>(
    bus: &mut B,
    data: &mut IecData,
    byte: u8,
    eoi: bool,
    vc20: bool,
) -> Result<(), BusError> {
    let lines = bus.read_raw();
    check_atn(data, lines)?;

    bus.delay_us(TALK_READY_DELAY_US);

    // Ready to send
    bus.release_clock();
    wait_data(bus, data, true)?;

    if eoi {
        trace!("Sending EOI");
        wait_data(bus, data, false)?;
        wait_data(bus, data, true)?;
    }

    bus.set_clock();
    bus.delay_us(TALK_START_US);

    let hold = if vc20 { BIT_HOLD_VC20_US } else { BIT_HOLD_US };
    for bit in 0..8 {
        let lines = bus.read_raw();
        check_atn(data, lines)?;
        if !lines.contains(IecBusLines::DATA) {
            debug!("Listener pulled DATA during byte");
            bus.release_clock();
            return Err(BusError::NotListening);
        }

        bus.set_line(IecLine::Data, byte & (1 << bit) != 0);
        bus.delay_us(BIT_SETUP_US);
        bus.release_clock();
        bus.delay_us(hold);
        bus.set_clock();
        bus.release_data();
        bus.delay_us(BIT_RELEASE_US);
    }

    // Listener acknowledges the frame
    wait_data(bus, data, false)?;
    bus.delay_us(BETWEEN_BYTES_US);

    trace!("Sent {:x}", byte);
    Ok(())
}
