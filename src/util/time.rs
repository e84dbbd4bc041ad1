//! This file implements the timing helpers and constants used by pico2iec.
//!
//! All bus timing is expressed against the nanosecond counter provided by
//! [`crate::bus::BusClock`].  The counter is a wrapping `u32`, so it wraps
//! every ~4.29s - all comparisons are therefore done on the wrapping
//! difference, which is valid for deadlines up to ~2.1s in the future.
//!
//! On the hardware we also need to block for sub-microsecond periods, which
//! embassy-time can't do given the RP tick rate of 1MHz, so the `block_ns!`
//! macro burns clock cycles instead.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

/// Nanoseconds per microsecond.
pub const NS_PER_US: u32 = 1_000;

/// Returns true if the wrapping timestamp `now` is at or after `deadline`.
#[allow(clippy::inline_always)]
#[inline(always)]
pub fn reached(now: u32, deadline: u32) -> bool {
    (now.wrapping_sub(deadline) as i32) >= 0
}

/// Convert microseconds to nanoseconds, for use with the bus clock.
#[allow(clippy::inline_always)]
#[inline(always)]
pub const fn us(us: u32) -> u32 {
    us * NS_PER_US
}

/// A one-shot deadline, armed by [`crate::bus::BusClock::start_timeout`] and
/// polled (non-blocking) by [`crate::bus::BusClock::has_timed_out`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Timeout {
    pub(crate) deadline: u32,
}

impl Timeout {
    /// Create a timeout expiring `ns` nanoseconds after `now`.
    pub const fn new(now: u32, ns: u32) -> Self {
        Self {
            deadline: now.wrapping_add(ns),
        }
    }

    /// Whether this timeout has expired at time `now`.
    pub fn expired(&self, now: u32) -> bool {
        reached(now, self.deadline)
    }
}

/// This function blocks for a specific number of nanoseconds.  This won't be
/// precise, as we're working with clock cycles, which take ~8ns on the Pico
/// and ~6 on the Pico 2, but it's better than using embassy-time, which can't
/// handle below the embassy-rp Pico tickrate of 1MHz.
#[cfg(feature = "rp")]
macro_rules! block_ns {
    ($ns:expr) => {{
        // Set clock frequency based on cargo features
        #[cfg(feature = "pico")]
        const CLOCK_FREQ_MHZ: u32 = 125;

        #[cfg(not(feature = "pico"))]
        const CLOCK_FREQ_MHZ: u32 = 150;

        // Calculate ns per cycle
        const NS_PER_CYCLE: u32 = 1000 / CLOCK_FREQ_MHZ;

        let cycles = ($ns as u32).div_ceil(NS_PER_CYCLE);

        // Use cortex_m assembly to burn that number of cycles
        cortex_m::asm::delay(cycles);
    }};
}
#[cfg(feature = "rp")]
pub(crate) use block_ns;

pub mod iec {
    //! IEC protocol timings, in microseconds unless stated otherwise.  These
    //! are the drive side of the protocol, as performed by a 1541 ROM.
    #![allow(dead_code)]

    /// Sample spacing used when debouncing the bus.
    pub const DEBOUNCE_US: u32 = 2;

    /// How long to keep waiting for CLOCK to be pulled after noticing ATN,
    /// to compensate for hosts which are slow to follow ATN with CLOCK.
    pub const ATN_RACE_WINDOW_US: u32 = 250;

    /// Without a CLOCK pull within this time of releasing DATA, the talker is
    /// signalling EOI.  A 1541 uses 256 ticks of its 1MHz timer, minus the
    /// loop overhead before the timer is armed.
    pub const EOI_TIMEOUT_US: u32 = 218;

    /// How long the listener acknowledges an EOI by pulling DATA.
    pub const EOI_ACK_US: u32 = 73;

    /// CLOCK held low this long before bit 7 of a byte under ATN is a
    /// JiffyDOS capability probe.
    pub const JIFFY_DETECT_US: u32 = 218;

    /// How long the JiffyDOS probe is acknowledged by pulling DATA.
    pub const JIFFY_ACK_US: u32 = 101;

    /// Delay before acknowledging a received byte.
    pub const FRAME_ACK_DELAY_US: u32 = 5;

    /// Minimum time DATA is held after acknowledging a received byte.
    pub const FRAME_ACK_HOLD_US: u32 = 50;

    /// Delay before a talker signals it's ready to send.
    pub const TALK_READY_DELAY_US: u32 = 60;

    /// Talker CLOCK hold after the listener is ready, before the first bit.
    pub const TALK_START_US: u32 = 40;

    /// Talker delay between the listener being ready and the first bit.
    pub const TALK_SETUP_US: u32 = 21;

    /// Bit setup time - DATA is valid this long before CLOCK is released.
    pub const BIT_SETUP_US: u32 = 70;

    /// Bit hold time - CLOCK stays released this long.
    pub const BIT_HOLD_US: u32 = 69;

    /// Bit hold time on a VIC-20, which samples faster.
    pub const BIT_HOLD_VC20_US: u32 = 34;

    /// Delay after releasing DATA at the end of a bit.
    pub const BIT_RELEASE_US: u32 = 5;

    /// Minimum time between bytes.
    pub const BETWEEN_BYTES_US: u32 = 100;

    /// Delay between releasing DATA and pulling CLOCK, when turning the bus
    /// around to TALK.
    pub const TURNAROUND_RELEASE_US: u32 = 50;

    /// Delay after pulling CLOCK, when turning the bus around to TALK.
    pub const TURNAROUND_CLOCK_US: u32 = 70;

    /// Gap a JiffyDOS talker leaves before its first byte after TALK.
    pub const JIFFY_TALK_DELAY_US: u32 = 360;
}

pub mod ieee {
    //! IEEE-488 protocol timings.
    #![allow(dead_code)]

    /// Timeout on every IEEE-488 handshake wait, in milliseconds.
    pub const IEEE_TIMEOUT_MS: u32 = 64;

    /// Settling time after placing a byte on the data bus, in microseconds.
    pub const DATA_SETTLE_US: u32 = 2;

    /// Time allowed for the bus to settle after switching direction, in
    /// microseconds.
    pub const DIRECTION_SETTLE_US: u32 = 5;
}
