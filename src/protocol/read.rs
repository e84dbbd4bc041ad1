//! Receiving bytes on the IEC bus, as a listener.
//!
//! This is the bit loop a 1541 runs for every byte the host sends, under ATN
//! (commands) or not (filenames and data):
//! - Wait for the talker to release CLOCK - it is ready to send.
//! - Release DATA - we are ready to receive.
//! - Wait for CLOCK to be pulled.  If the talker takes longer than
//!   [`EOI_TIMEOUT_US`] it is signalling EOI, which we acknowledge by pulling
//!   DATA for [`EOI_ACK_US`], before carrying on waiting.
//! - Read 8 bits, LSB first, each valid on DATA while CLOCK is released.
//! - Acknowledge the byte by pulling DATA.
//!
//! Under ATN, a talker which holds CLOCK for [`JIFFY_DETECT_US`] before the
//! last bit is asking whether the addressed device speaks JiffyDOS.  If the
//! byte is LISTEN or TALK for us, we answer by pulsing DATA.
//!
//! ATN is checked on every sample - see [`check_atn`].

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

#[allow(unused_imports)]
use crate::fmt::{debug, error, info, trace, warn};

use super::{BusError, BusState, IecData, IecFlags};
use crate::bus::{IecBusLines, IecHal};
use crate::util::time::iec::{
    EOI_ACK_US, EOI_TIMEOUT_US, FRAME_ACK_DELAY_US, JIFFY_ACK_US, JIFFY_DETECT_US,
};

/// Check whether ATN has changed state, given a sample of the bus.
///
/// While receiving commands ([`BusState::AtnActive`]) the host releasing ATN
/// ends the command phase, and the engine moves on to
/// [`BusState::AtnProcess`].  At any other time the host asserting ATN
/// aborts what we are doing, and the engine moves to
/// [`BusState::FoundAtn`].
#[allow(clippy::inline_always)]
#[inline(always)]
pub(super) fn check_atn(data: &mut IecData, lines: IecBusLines) -> Result<(), BusError> {
    let atn_high = lines.contains(IecBusLines::ATN);
    if data.bus_state == BusState::AtnActive {
        if atn_high {
            data.set_state(BusState::AtnProcess);
            return Err(BusError::Atn);
        }
    } else if !atn_high {
        data.set_state(BusState::FoundAtn);
        return Err(BusError::Atn);
    }
    Ok(())
}

// Sample the bus until `line` reaches the requested level, checking ATN on
// every sample.
fn wait_line<B: IecHal + ?Sized>(
    bus: &mut B,
    data: &mut IecData,
    line: IecBusLines,
    high: bool,
) -> Result<(), BusError> {
    loop {
        let lines = bus.read_raw();
        check_atn(data, lines)?;
        if lines.contains(line) == high {
            return Ok(());
        }
    }
}

// As wait_line(), giving up after `us` microseconds.  Returns whether the
// line reached the level.
fn wait_line_timeout<B: IecHal + ?Sized>(
    bus: &mut B,
    data: &mut IecData,
    line: IecBusLines,
    high: bool,
    us: u32,
) -> Result<bool, BusError> {
    let timeout = bus.start_timeout(us);
    loop {
        let lines = bus.read_raw();
        check_atn(data, lines)?;
        if lines.contains(line) == high {
            return Ok(true);
        }
        if bus.has_timed_out(&timeout) {
            return Ok(false);
        }
    }
}

// Whether the first 7 bits of a command byte are LISTEN or TALK for us.  The
// top bit of both is 0, so 7 bits are enough to tell.
fn addresses_us(partial: u8, address: u8) -> bool {
    let cmd = partial >> 1;
    cmd == 0x20 | address || cmd == 0x40 | address
}

/// Receive a byte using the standard protocol.
///
/// On EOI, [`IecFlags::EOI_RECVD`] is set - the caller clears it.  On JiffyDOS
/// detection [`IecFlags::JIFFY_ACTIVE`] is set.  Returns
/// [`BusError::Atn`] if ATN changed state, with `data.bus_state` updated
/// accordingly.
pub(super) fn iec_getc<B: IecHal + ?Sized>(
    bus: &mut B,
    data: &mut IecData,
    address: u8,
    jiffy_enabled: bool,
) -> Result<u8, BusError> {
    // Talker ready to send
    wait_line(bus, data, IecBusLines::CLOCK, true)?;

    // Listener ready for data
    bus.release_data();

    if !wait_line_timeout(bus, data, IecBusLines::CLOCK, false, EOI_TIMEOUT_US)? {
        trace!("EOI");
        data.flags.insert(IecFlags::EOI_RECVD);
        bus.set_data();
        bus.delay_us(EOI_ACK_US);
        bus.release_data();
        wait_line(bus, data, IecBusLines::CLOCK, false)?;
    }

    let mut value = 0u8;
    for bit in 0..8 {
        if bit == 7 && jiffy_enabled && data.bus_state == BusState::AtnActive {
            if !wait_line_timeout(bus, data, IecBusLines::CLOCK, true, JIFFY_DETECT_US)?
                && addresses_us(value, address)
            {
                debug!("JiffyDOS detected");
                bus.set_data();
                bus.delay_us(JIFFY_ACK_US);
                bus.release_data();
                data.flags.insert(IecFlags::JIFFY_ACTIVE);
            }
        }

        // Bit is valid while CLOCK is released
        wait_line(bus, data, IecBusLines::CLOCK, true)?;
        let lines = bus.read_raw();
        value >>= 1;
        if lines.contains(IecBusLines::DATA) {
            value |= 0x80;
        }
        wait_line(bus, data, IecBusLines::CLOCK, false)?;
    }

    // Frame acknowledge
    bus.delay_us(FRAME_ACK_DELAY_US);
    bus.set_data();

    trace!("Received {:x}", value);
    Ok(value)
}
