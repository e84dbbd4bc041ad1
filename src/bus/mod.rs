//! The bus hardware abstraction.
//!
//! Everything above this module talks to the bus through these traits:
//! - [`BusClock`] supplies the nanosecond timebase, delays and timeouts.
//! - [`IecHal`] drives and samples the IEC serial bus lines (and the
//!   DolphinDOS parallel port, which is wired alongside it).
//! - [`IeeeHal`] drives and samples the IEEE-488 bus.
//!
//! All lines are open-collector.  A participant can only pull a line low or
//! release it, and the line is high only when every participant has
//! released it.  So code must never assume that because it released a line,
//! the line is high - it must read it.
//!
//! The RP hardware implementation lives in `infra::rp_bus`, and a simulated
//! bus used by the test suite lives in [`sim`].

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

#[cfg(test)]
pub(crate) mod sim;

use bitflags::bitflags;

use crate::config::IeeeDrivers;
use crate::util::time::iec::DEBOUNCE_US;
use crate::util::time::ieee::DIRECTION_SETTLE_US;
use crate::util::time::{NS_PER_US, Timeout, reached};

bitflags! {
    /// A snapshot of the IEC bus.  A set bit means that line is high, i.e.
    /// released by every participant.  The values match the IEC line masks
    /// used by OpenCBM.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct IecBusLines: u8 {
        const DATA = 0x01;
        const CLOCK = 0x02;
        const ATN = 0x04;
        const SRQ = 0x10;
    }
}

/// A single IEC bus line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IecLine {
    Data,
    Clock,
    Atn,
    Srq,
}

impl IecLine {
    /// The bit for this line within [`IecBusLines`].
    pub const fn mask(self) -> IecBusLines {
        match self {
            Self::Data => IecBusLines::DATA,
            Self::Clock => IecBusLines::CLOCK,
            Self::Atn => IecBusLines::ATN,
            Self::Srq => IecBusLines::SRQ,
        }
    }
}

bitflags! {
    /// A snapshot of the IEEE-488 control lines.  As for the IEC bus, a set
    /// bit means the line is high (inactive - IEEE-488 is active low).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct IeeeBusLines: u16 {
        const ATN = 0x0001;
        const NRFD = 0x0002;
        const NDAC = 0x0004;
        const DAV = 0x0008;
        const EOI = 0x0010;
        const IFC = 0x0020;
        const SRQ = 0x0040;
        const REN = 0x0080;
    }
}

/// A single IEEE-488 control line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IeeeLine {
    Atn,
    Nrfd,
    Ndac,
    Dav,
    Eoi,
    Ifc,
    Srq,
    Ren,
}

impl IeeeLine {
    /// The bit for this line within [`IeeeBusLines`].
    pub const fn mask(self) -> IeeeBusLines {
        match self {
            Self::Atn => IeeeBusLines::ATN,
            Self::Nrfd => IeeeBusLines::NRFD,
            Self::Ndac => IeeeBusLines::NDAC,
            Self::Dav => IeeeBusLines::DAV,
            Self::Eoi => IeeeBusLines::EOI,
            Self::Ifc => IeeeBusLines::IFC,
            Self::Srq => IeeeBusLines::SRQ,
            Self::Ren => IeeeBusLines::REN,
        }
    }
}

/// The timebase used by all bus code.
///
/// `now_ns()` is a free running, wrapping, nanosecond counter.  Delays are
/// busy-waits - they don't yield, as the bus protocols are strictly
/// synchronous.
pub trait BusClock {
    /// The current time in nanoseconds.
    fn now_ns(&mut self) -> u32;

    /// Block until the time is at or after `deadline`.
    fn wait_until(&mut self, deadline: u32) {
        while !reached(self.now_ns(), deadline) {}
    }

    /// Block for `ns` nanoseconds.
    fn delay_ns(&mut self, ns: u32) {
        let deadline = self.now_ns().wrapping_add(ns);
        self.wait_until(deadline);
    }

    /// Block for `us` microseconds.
    fn delay_us(&mut self, us: u32) {
        let mut us = us;
        while us > 1000 {
            self.delay_ns(1000 * NS_PER_US);
            us -= 1000;
        }
        self.delay_ns(us * NS_PER_US);
    }

    /// Block for `ms` milliseconds.  Long delays are never timing critical,
    /// so the idle hook is called every millisecond.
    fn delay_ms(&mut self, ms: u32) {
        for _ in 0..ms {
            self.delay_ns(1000 * NS_PER_US);
            self.idle();
        }
    }

    /// Arm a one-shot timeout `us` microseconds from now.
    fn start_timeout(&mut self, us: u32) -> Timeout {
        Timeout::new(self.now_ns(), us * NS_PER_US)
    }

    /// Non-blocking check of a timeout.
    fn has_timed_out(&mut self, timeout: &Timeout) -> bool {
        let now = self.now_ns();
        timeout.expired(now)
    }

    /// Disable or re-enable interrupts around timing critical code.
    fn interrupts(&mut self, _enabled: bool) {}

    /// Called from long, non timing critical waits - the hardware uses it to
    /// feed the watchdog.
    fn idle(&mut self) {}
}

/// IEC serial bus hardware.
///
/// "set" means pull the line low (active), "release" means let it float
/// high, and `get_x()` returns true if the line is active (low) - the same
/// conventions as the rest of pico2iec.
pub trait IecHal: BusClock {
    /// Pull a line low.
    fn pull(&mut self, line: IecLine);

    /// Release a line.
    fn release(&mut self, line: IecLine);

    /// Sample the bus once, with no filtering.
    fn read_raw(&mut self) -> IecBusLines;

    /// Enable or disable the automatic ATN acknowledge.  While enabled, the
    /// hardware pulls DATA as soon as ATN falls, which is quicker than any
    /// polling loop can manage.
    fn set_atn_ack(&mut self, enabled: bool);

    /// Write a byte to the parallel port.
    fn parallel_write(&mut self, _value: u8) {}

    /// Read a byte from the parallel port.
    fn parallel_read(&mut self) -> u8 {
        0xff
    }

    /// Switch the parallel port between input and output.
    fn parallel_output(&mut self, _enabled: bool) {}

    /// Pulse the parallel port handshake output.
    fn parallel_strobe(&mut self) {}

    /// Returns true, and clears the flag, if the host has strobed the
    /// parallel port handshake input since the last call.
    fn parallel_take_rxflag(&mut self) -> bool {
        false
    }

    /// Whether the MCU clock is stable enough for protocols with no timing
    /// slack.
    fn clock_stable(&mut self) -> bool {
        true
    }

    /// Read the bus, debounced - only returns once two samples 2us apart
    /// agree.  Use this for any decision that spans more than one sample.
    fn bus_read(&mut self) -> IecBusLines {
        loop {
            let first = self.read_raw();
            self.delay_us(DEBOUNCE_US);
            let second = self.read_raw();
            if first == second {
                return first;
            }
        }
    }

    /// Set a line to the given level - true means released (high).
    #[allow(clippy::inline_always)]
    #[inline(always)]
    fn set_line(&mut self, line: IecLine, high: bool) {
        if high {
            self.release(line);
        } else {
            self.pull(line);
        }
    }

    // DATA line control
    #[allow(clippy::inline_always)]
    #[inline(always)]
    fn set_data(&mut self) {
        self.pull(IecLine::Data);
    }

    #[allow(clippy::inline_always)]
    #[inline(always)]
    fn release_data(&mut self) {
        self.release(IecLine::Data);
    }

    #[allow(clippy::inline_always)]
    #[inline(always)]
    fn get_data(&mut self) -> bool {
        !self.read_raw().contains(IecBusLines::DATA)
    }

    // CLOCK line control
    #[allow(clippy::inline_always)]
    #[inline(always)]
    fn set_clock(&mut self) {
        self.pull(IecLine::Clock);
    }

    #[allow(clippy::inline_always)]
    #[inline(always)]
    fn release_clock(&mut self) {
        self.release(IecLine::Clock);
    }

    #[allow(clippy::inline_always)]
    #[inline(always)]
    fn get_clock(&mut self) -> bool {
        !self.read_raw().contains(IecBusLines::CLOCK)
    }

    // ATN is only ever read by a drive
    #[allow(clippy::inline_always)]
    #[inline(always)]
    fn get_atn(&mut self) -> bool {
        !self.read_raw().contains(IecBusLines::ATN)
    }

    // SRQ line control
    #[allow(clippy::inline_always)]
    #[inline(always)]
    fn set_srq(&mut self) {
        self.pull(IecLine::Srq);
    }

    #[allow(clippy::inline_always)]
    #[inline(always)]
    fn release_srq(&mut self) {
        self.release(IecLine::Srq);
    }

    /// Release every line the drive can drive.
    fn release_all(&mut self) {
        self.release(IecLine::Data);
        self.release(IecLine::Clock);
        self.release(IecLine::Srq);
    }
}

/// IEEE-488 bus hardware.
pub trait IeeeHal: BusClock {
    /// Pull a control line low (assert it).
    fn pull(&mut self, line: IeeeLine);

    /// Release a control line.
    fn release(&mut self, line: IeeeLine);

    /// Sample the control lines.
    fn read_lines(&mut self) -> IeeeBusLines;

    /// Read the data bus.  Returns the logical byte - the HAL handles the
    /// bus's inverted logic.
    fn read_data(&mut self) -> u8;

    /// Place a logical byte on the data bus.  Has no effect on the bus unless
    /// the data outputs are enabled.
    fn write_data(&mut self, value: u8);

    /// Enable or disable the data bus outputs.
    fn set_data_output(&mut self, enabled: bool);

    /// Drive the talk enable line of 75160/75161 bus drivers.
    fn set_talk_enable(&mut self, _talk: bool) {}

    /// The type of bus drivers fitted.
    fn drivers(&self) -> IeeeDrivers;

    /// Whether a control line is asserted (low).
    fn is_asserted(&mut self, line: IeeeLine) -> bool {
        !self.read_lines().contains(line.mask())
    }

    /// Switch the bus to talk.
    ///
    /// With 7516x drivers the talk enable line flips the direction of data,
    /// DAV, EOI, NRFD and NDAC together.  With direct wiring we release the
    /// listener handshake lines first, so there is no point at which we
    /// drive both handshake directions.
    fn enter_talk(&mut self) {
        match self.drivers() {
            IeeeDrivers::Sn7516x => {
                self.release(IeeeLine::Nrfd);
                self.release(IeeeLine::Ndac);
                self.set_talk_enable(true);
                self.set_data_output(true);
            }
            IeeeDrivers::Direct => {
                self.release(IeeeLine::Nrfd);
                self.release(IeeeLine::Ndac);
                self.delay_us(DIRECTION_SETTLE_US);
                self.set_data_output(true);
            }
        }
        self.release(IeeeLine::Dav);
        self.release(IeeeLine::Eoi);
    }

    /// Switch the bus to listen, or to the idle (not addressed) state.  The
    /// data outputs are disabled before anything else.
    fn enter_listen(&mut self) {
        self.set_data_output(false);
        self.release(IeeeLine::Dav);
        self.release(IeeeLine::Eoi);
        match self.drivers() {
            IeeeDrivers::Sn7516x => self.set_talk_enable(false),
            IeeeDrivers::Direct => self.delay_us(DIRECTION_SETTLE_US),
        }
    }
}

/// Busy-wait until `predicate` is true, unless `cancel` returns an error
/// first.  This is the standard bus wait: every blocking wait in the
/// protocol code must be cancellable (usually by ATN) or it can lock up the
/// bus.
pub fn poll_until<B, E>(
    bus: &mut B,
    mut predicate: impl FnMut(&mut B) -> bool,
    mut cancel: impl FnMut(&mut B) -> Option<E>,
) -> Result<(), E>
where
    B: ?Sized,
{
    loop {
        if predicate(bus) {
            return Ok(());
        }
        if let Some(e) = cancel(bus) {
            return Err(e);
        }
    }
}

/// As [`poll_until`], but gives up with `timeout_err` once `timeout_us`
/// microseconds have passed.
pub fn poll_until_timeout<B, E>(
    bus: &mut B,
    timeout_us: u32,
    timeout_err: E,
    mut predicate: impl FnMut(&mut B) -> bool,
    mut cancel: impl FnMut(&mut B) -> Option<E>,
) -> Result<(), E>
where
    B: BusClock + ?Sized,
{
    let timeout = bus.start_timeout(timeout_us);
    loop {
        if predicate(bus) {
            return Ok(());
        }
        if let Some(e) = cancel(bus) {
            return Err(e);
        }
        if bus.has_timed_out(&timeout) {
            return Err(timeout_err);
        }
    }
}
