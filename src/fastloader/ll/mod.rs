//! Low level fastloader support.
//!
//! Fastloader wire protocols are timed, not handshaked: once the host has
//! given a reference edge, each line change must happen at a fixed offset
//! from it.  [`Llfl`] is a session on the bus which captures that reference
//! and schedules line changes relative to it, and [`Generic2Bit`] describes
//! the common scheme of moving a byte as four CLOCK/DATA bit pairs.
//!
//! The per-protocol codecs in the submodules are leaf functions - they move
//! bytes and nothing else.  Buffers and storage are the orchestrators'
//! business.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

pub mod ar6;
pub mod dolphin;
pub mod dreamload;
pub mod eload1;
pub mod epyx;
pub mod fc3;
pub mod geos;
pub mod gijoe;
pub mod jiffy;
pub mod mmzak;
pub mod n0sdos;
pub mod nippon;
pub mod turbodisk;
pub mod uload3;

use super::FastloaderError;
use crate::bus::{IecBusLines, IecHal, IecLine};
use crate::util::time::reached;

/// Maximum number of scheduled events outstanding at once.
const MAX_PENDING_EVENTS: usize = 8;

/// How long the last bit pair of a strobed byte is held before the bus is
/// released.
pub const BYTE_HOLD_NS: u32 = 8_000;

/// Delay between a strobe edge and sampling DATA in bitwise transfers.
pub const STROBE_SETTLE_NS: u32 = 2_000;

/// How long the last bit of a bitwise send is held.
pub const STROBE_HOLD_NS: u32 = 20_000;

/// Whether a wait gives up when ATN is asserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AtnMode {
    AtnAbort,
    NoAtnAbort,
}

/// Whether scheduling a line change waits for it to happen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WaitMode {
    Wait,
    NoWait,
}

/// A byte moved as four CLOCK/DATA bit pairs.
///
/// At `pairtimes[n]` nanoseconds after the reference edge, CLOCK carries bit
/// `clockbits[n]` and DATA carries bit `databits[n]` of the byte XORed with
/// `eorvalue`.  A high line is a 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Generic2Bit {
    pub pairtimes: [u32; 4],
    pub clockbits: [u8; 4],
    pub databits: [u8; 4],
    pub eorvalue: u8,
}

impl Generic2Bit {
    /// Whether every bit of a byte appears exactly once.
    pub const fn is_complete(&self) -> bool {
        let mut seen = 0u8;
        let mut ii = 0;
        while ii < 4 {
            seen |= 1 << self.clockbits[ii];
            seen |= 1 << self.databits[ii];
            ii += 1;
        }
        seen == 0xff
    }
}

// A line change scheduled for later.
#[derive(Debug, Clone, Copy)]
struct Event {
    at: u32,
    line: IecLine,
    high: bool,
}

/// A low level fastloader session.
///
/// Creating one disables interrupts; dropping it carries out any line
/// changes still scheduled and re-enables them.  All offsets are in
/// nanoseconds from the reference, which is captured by the `wait_x()`
/// functions (or [`Llfl::set_reference`]).
pub struct Llfl<'a, B: IecHal + ?Sized> {
    bus: &'a mut B,
    reference: u32,
    pending: heapless::Vec<Event, MAX_PENDING_EVENTS>,
}

impl<'a, B: IecHal + ?Sized> Llfl<'a, B> {
    pub fn new(bus: &'a mut B) -> Self {
        bus.interrupts(false);
        let reference = bus.now_ns();
        Self {
            bus,
            reference,
            pending: heapless::Vec::new(),
        }
    }

    /// Direct access to the bus, for untimed line control.
    pub fn bus(&mut self) -> &mut B {
        self.bus
    }

    /// The captured reference time.
    pub fn reference(&self) -> u32 {
        self.reference
    }

    /// Use the current time as the reference.
    pub fn set_reference(&mut self) {
        self.reference = self.bus.now_ns();
    }

    //
    // Waits
    //

    // Wait for a line to reach a level, then capture the reference.
    fn wait_line(&mut self, line: IecLine, high: bool, atn: AtnMode) -> Result<(), FastloaderError> {
        loop {
            self.service();
            let lines = self.bus.read_raw();
            if atn == AtnMode::AtnAbort && !lines.contains(IecBusLines::ATN) {
                return Err(FastloaderError::Atn);
            }
            if lines.contains(line.mask()) == high {
                self.reference = self.bus.now_ns();
                return Ok(());
            }
        }
    }

    /// Wait for CLOCK to reach a level, and use that edge as the reference.
    pub fn wait_clock(&mut self, high: bool, atn: AtnMode) -> Result<(), FastloaderError> {
        self.wait_line(IecLine::Clock, high, atn)
    }

    /// Wait for DATA to reach a level, and use that edge as the reference.
    pub fn wait_data(&mut self, high: bool, atn: AtnMode) -> Result<(), FastloaderError> {
        self.wait_line(IecLine::Data, high, atn)
    }

    /// Wait for ATN to reach a level, and use that edge as the reference.
    /// Protocols which strobe with ATN can't abort on it.
    pub fn wait_atn(&mut self, high: bool) -> Result<(), FastloaderError> {
        self.wait_line(IecLine::Atn, high, AtnMode::NoAtnAbort)
    }

    /// Wait for the host to pulse a line - pull it low, then release it.
    /// The release is the reference.
    pub fn wait_strobe(&mut self, line: IecLine, atn: AtnMode) -> Result<(), FastloaderError> {
        self.wait_line(line, false, atn)?;
        self.wait_line(line, true, atn)
    }

    /// Wait for either edge of a line the host toggles, given its level
    /// before the edge.  The edge is the reference.
    pub fn wait_toggle(&mut self, line: IecLine, was_high: bool, atn: AtnMode) -> Result<(), FastloaderError> {
        self.wait_line(line, !was_high, atn)
    }

    /// Wait until `offset` after the reference.
    pub fn wait_until(&mut self, offset: u32) {
        let at = self.reference.wrapping_add(offset);
        self.flush_until(at);
        self.bus.wait_until(at);
    }

    //
    // Scheduled line changes
    //

    fn set_line_at(&mut self, line: IecLine, offset: u32, high: bool, wait: WaitMode) {
        let at = self.reference.wrapping_add(offset);
        match wait {
            WaitMode::Wait => {
                self.flush_until(at);
                self.bus.wait_until(at);
                self.bus.set_line(line, high);
            }
            WaitMode::NoWait => {
                if self.pending.is_full() {
                    self.fire_next();
                }
                let key = at.wrapping_sub(self.reference);
                let pos = self
                    .pending
                    .iter()
                    .position(|e| e.at.wrapping_sub(self.reference) > key)
                    .unwrap_or(self.pending.len());
                // Space was made above, so this can't fail
                let _ = self.pending.insert(pos, Event { at, line, high });
            }
        }
    }

    /// Set CLOCK to a level at `offset` after the reference.
    pub fn set_clock_at(&mut self, offset: u32, high: bool, wait: WaitMode) {
        self.set_line_at(IecLine::Clock, offset, high, wait);
    }

    /// Set DATA to a level at `offset` after the reference.
    pub fn set_data_at(&mut self, offset: u32, high: bool, wait: WaitMode) {
        self.set_line_at(IecLine::Data, offset, high, wait);
    }

    /// Set SRQ to a level at `offset` after the reference.
    pub fn set_srq_at(&mut self, offset: u32, high: bool, wait: WaitMode) {
        self.set_line_at(IecLine::Srq, offset, high, wait);
    }

    /// Sample the bus at `offset` after the reference.
    pub fn read_bus_at(&mut self, offset: u32) -> IecBusLines {
        self.wait_until(offset);
        self.bus.read_raw()
    }

    // Carry out any scheduled changes which are due.
    fn service(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let now = self.bus.now_ns();
        while let Some(first) = self.pending.first().copied() {
            if !reached(now, first.at) {
                break;
            }
            self.pending.remove(0);
            self.bus.set_line(first.line, first.high);
        }
    }

    // Carry out, on time, every scheduled change due at or before `at`.
    fn flush_until(&mut self, at: u32) {
        let key = at.wrapping_sub(self.reference);
        while let Some(first) = self.pending.first().copied() {
            if first.at.wrapping_sub(self.reference) > key {
                break;
            }
            self.fire_next();
        }
    }

    fn fire_next(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let event = self.pending.remove(0);
        self.bus.wait_until(event.at);
        self.bus.set_line(event.line, event.high);
    }

    //
    // Generic 2 bit transfers
    //

    /// Send a byte using a 2 bit table, timed from the reference.
    pub fn generic_load_2bit(&mut self, def: &Generic2Bit, byte: u8) {
        self.generic_load_2bit_from(def, byte, 0);
    }

    /// As [`Llfl::generic_load_2bit`], with every pair time moved on by
    /// `base` nanoseconds.
    pub fn generic_load_2bit_from(&mut self, def: &Generic2Bit, byte: u8, base: u32) {
        let value = byte ^ def.eorvalue;
        for ii in 0..4 {
            let at = base.wrapping_add(def.pairtimes[ii]);
            let clock = value & (1 << def.clockbits[ii]) != 0;
            let data = value & (1 << def.databits[ii]) != 0;
            self.set_clock_at(at, clock, WaitMode::NoWait);
            self.set_data_at(at, data, WaitMode::Wait);
        }
    }

    /// Receive a byte using a 2 bit table, timed from the reference.
    pub fn generic_save_2bit(&mut self, def: &Generic2Bit) -> u8 {
        self.generic_save_2bit_from(def, 0)
    }

    /// As [`Llfl::generic_save_2bit`], with every pair time moved on by
    /// `base` nanoseconds.
    pub fn generic_save_2bit_from(&mut self, def: &Generic2Bit, base: u32) -> u8 {
        let mut value = 0u8;
        for ii in 0..4 {
            let lines = self.read_bus_at(base.wrapping_add(def.pairtimes[ii]));
            if lines.contains(IecBusLines::CLOCK) {
                value |= 1 << def.clockbits[ii];
            }
            if lines.contains(IecBusLines::DATA) {
                value |= 1 << def.databits[ii];
            }
        }
        value ^ def.eorvalue
    }

    /// Release CLOCK and DATA at `offset`, ending a byte.
    pub fn idle_at(&mut self, offset: u32) {
        self.set_clock_at(offset, true, WaitMode::NoWait);
        self.set_data_at(offset, true, WaitMode::Wait);
    }

    /// Send a byte once the host strobes `line`, then release the bus.
    pub fn strobed_load_2bit(&mut self, line: IecLine, def: &Generic2Bit, byte: u8) -> Result<(), FastloaderError> {
        self.wait_strobe(line, AtnMode::AtnAbort)?;
        self.generic_load_2bit(def, byte);
        self.idle_at(def.pairtimes[3] + BYTE_HOLD_NS);
        Ok(())
    }

    /// Receive a byte once the host strobes `line`.  Returns once the host
    /// has released the bus again, so the next strobe can't be confused
    /// with the last bit pair.
    pub fn strobed_save_2bit(&mut self, line: IecLine, def: &Generic2Bit) -> Result<u8, FastloaderError> {
        self.wait_strobe(line, AtnMode::AtnAbort)?;
        let value = self.generic_save_2bit(def);
        self.wait_clock(true, AtnMode::AtnAbort)?;
        self.wait_data(true, AtnMode::AtnAbort)?;
        Ok(value)
    }

    //
    // Bitwise transfers
    //

    /// Receive a byte one bit per edge of a line the host toggles.  DATA is
    /// sampled shortly after each edge, high being a 1.
    pub fn toggled_read_byte(&mut self, strobe: IecLine, order: BitOrder, atn: AtnMode) -> Result<u8, FastloaderError> {
        let mut high = self.bus.read_raw().contains(strobe.mask());
        let mut value = 0u8;
        for bit in order.bits() {
            self.wait_toggle(strobe, high, atn)?;
            high = !high;
            if self.read_bus_at(STROBE_SETTLE_NS).contains(IecBusLines::DATA) {
                value |= 1 << bit;
            }
        }
        Ok(value)
    }

    /// Send a byte one bit per edge of a line the host toggles.  DATA is
    /// set straight after each edge, and released once the host has had
    /// time to sample the last bit.
    pub fn toggled_send_byte(&mut self, strobe: IecLine, order: BitOrder, byte: u8, atn: AtnMode) -> Result<(), FastloaderError> {
        let mut high = self.bus.read_raw().contains(strobe.mask());
        for bit in order.bits() {
            self.wait_toggle(strobe, high, atn)?;
            high = !high;
            self.bus.set_line(IecLine::Data, byte & (1 << bit) != 0);
        }
        self.set_data_at(STROBE_HOLD_NS, true, WaitMode::Wait);
        Ok(())
    }
}

/// Bit order of bitwise transfers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BitOrder {
    LsbFirst,
    MsbFirst,
}

impl BitOrder {
    fn bits(self) -> [u8; 8] {
        match self {
            Self::LsbFirst => [0, 1, 2, 3, 4, 5, 6, 7],
            Self::MsbFirst => [7, 6, 5, 4, 3, 2, 1, 0],
        }
    }
}

impl<B: IecHal + ?Sized> Drop for Llfl<'_, B> {
    fn drop(&mut self) {
        while !self.pending.is_empty() {
            self.fire_next();
        }
        self.bus.interrupts(true);
    }
}

/// The untimed handshakes most orchestrators use between timed transfers.
/// Both poll ATN, and abort if it is asserted.
pub(crate) fn wait_clock<B: IecHal + ?Sized>(bus: &mut B, active: bool) -> Result<(), FastloaderError> {
    crate::bus::poll_until(
        bus,
        |b| b.get_clock() == active,
        |b| b.get_atn().then_some(FastloaderError::Atn),
    )
}

pub(crate) fn wait_data<B: IecHal + ?Sized>(bus: &mut B, active: bool) -> Result<(), FastloaderError> {
    crate::bus::poll_until(
        bus,
        |b| b.get_data() == active,
        |b| b.get_atn().then_some(FastloaderError::Atn),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::sim::HostOp::*;
    use crate::bus::sim::{SimBus, sig};
    use crate::util::time::us;

    // Every 2 bit table any codec uses.
    fn all_tables() -> Vec<(&'static str, Generic2Bit)> {
        vec![
            ("jiffy receive", jiffy::JIFFY_RECEIVE_DEF),
            ("jiffy send", jiffy::JIFFY_SEND_DEF),
            ("turbodisk", turbodisk::TURBODISK_DEF),
            ("fc3 get", fc3::FC3_GET_DEF),
            ("fc3 send", fc3::FC3_SEND_DEF),
            ("fc3 freezed", fc3::FC3_FREEZED_DEF),
            ("fc3 old freezed pal", fc3::FC3_OLDFREEZED_PAL_DEF),
            ("fc3 old freezed ntsc", fc3::FC3_OLDFREEZED_NTSC_DEF),
            ("dreamload", dreamload::DREAMLOAD_SEND_DEF),
            ("dreamload old", dreamload::DREAMLOAD_OLD_SEND_DEF),
            ("uload3 send", uload3::ULOAD3_SEND_DEF),
            ("uload3 get", uload3::ULOAD3_GET_DEF),
            ("epyx send", epyx::EPYX_SEND_DEF),
            ("epyx get", epyx::EPYX_GET_DEF),
            ("geos 1541 send", geos::GEOS_1541_SEND_DEF),
            ("geos 1541 get", geos::GEOS_1541_GET_DEF),
            ("geos 1571 send", geos::GEOS_1571_SEND_DEF),
            ("geos 1571 get", geos::GEOS_1571_GET_DEF),
            ("geos 1581 send", geos::GEOS_1581_SEND_DEF),
            ("geos 1581 get", geos::GEOS_1581_GET_DEF),
            ("geos s1 64", geos::GEOS_S1_64_GET_DEF),
            ("geos s1 128", geos::GEOS_S1_128_GET_DEF),
            ("wheels s1 64", geos::WHEELS_S1_64_GET_DEF),
            ("wheels s1 128", geos::WHEELS_S1_128_GET_DEF),
            ("ar6 send", ar6::AR6_SEND_DEF),
            ("ar6 get", ar6::AR6_GET_DEF),
            ("eload1 send", eload1::ELOAD1_SEND_DEF),
            ("eload1 get", eload1::ELOAD1_GET_DEF),
            ("gijoe send", gijoe::GIJOE_SEND_DEF),
            ("gijoe get", gijoe::GIJOE_GET_DEF),
            ("n0sdos", n0sdos::N0SDOS_SEND_DEF),
        ]
    }

    // Encode a byte, returning the device's line changes as (offset from
    // reference, levels).
    fn encode(def: &Generic2Bit, byte: u8) -> Vec<(u64, u16)> {
        let mut sim = SimBus::new();
        let reference;
        {
            let mut ll = Llfl::new(&mut sim);
            ll.set_reference();
            reference = u64::from(ll.reference());
            ll.generic_load_2bit(def, byte);
        }
        sim.dev_trace
            .iter()
            .filter(|e| e.time >= reference)
            .map(|e| (e.time - reference, e.levels))
            .collect()
    }

    // Replay an encoded trace as the host, and decode it.  The receiver
    // samples 3us after each pair time, as a real receiver samples after the
    // sender has set up the pair.
    fn decode(def: &Generic2Bit, trace: &[(u64, u16)]) -> u8 {
        // CLOCK is pulled briefly as the sync edge, then replay starts from
        // both lines released, as the encoder's did.
        let mut ops = vec![
            Delay(5_000),
            MarkRef,
            Pull(sig::CLOCK),
            At(1_000),
            Release(sig::CLOCK),
        ];
        for &(offset, levels) in trace {
            ops.push(At(offset));
            for line in [sig::CLOCK, sig::DATA] {
                if levels & line == 0 {
                    ops.push(Pull(line));
                } else {
                    ops.push(Release(line));
                }
            }
        }
        let mut sim = SimBus::with_program(ops);
        let mut ll = Llfl::new(&mut sim);
        ll.wait_clock(false, AtnMode::AtnAbort).unwrap();
        ll.generic_save_2bit_from(def, us(3))
    }

    #[test]
    fn tables_cover_every_bit() {
        for (name, def) in all_tables() {
            assert!(def.is_complete(), "{name} table is incomplete");
            assert!(
                def.pairtimes.windows(2).all(|w| w[1] >= w[0] + us(8)),
                "{name} pairs too close"
            );
        }
    }

    #[test]
    fn two_bit_round_trip() {
        for (name, def) in all_tables() {
            for byte in 0..=255u8 {
                let trace = encode(&def, byte);
                assert_eq!(decode(&def, &trace), byte, "{name} failed for {byte:02x}");
            }
        }
    }

    #[test]
    fn session_disables_interrupts() {
        let mut sim = SimBus::new();
        {
            let mut ll = Llfl::new(&mut sim);
            ll.set_clock_at(us(50), false, WaitMode::NoWait);
            assert!(!ll.bus().interrupts_enabled());
        }
        // The scheduled change still happened, on time
        assert!(sim.interrupts_enabled());
        let pulses = sim.dev_pulses(sig::CLOCK);
        assert_eq!(pulses.len(), 1);
        assert!(pulses[0].0 >= 50_000);
    }

    #[test]
    fn wait_aborts_on_atn() {
        let mut sim = SimBus::with_program(vec![Delay(10_000), Pull(sig::ATN)]);
        let mut ll = Llfl::new(&mut sim);
        assert_eq!(
            ll.wait_data(false, AtnMode::AtnAbort),
            Err(FastloaderError::Atn)
        );
    }
}
