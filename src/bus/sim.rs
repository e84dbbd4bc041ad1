//! A simulated bus, used by the test suite.
//!
//! Time is virtual.  Every call the device code makes into the bus advances
//! it a little (a raw read costs 250ns, a timestamp 20ns), and the
//! `wait_until()` family jumps straight to the deadline.  This is enough to
//! make every busy-wait in the device code make progress, and to keep the
//! relative timing of device actions close to what the hardware does.
//!
//! The host (the C64, or PET) is a scripted program of [`HostOp`]s, run
//! whenever virtual time advances.  Ops which wait for a bus level resume
//! after a short reaction latency, like real host code would.
//!
//! Every change in bus level is recorded, so tests can decode what the
//! device sent by sampling the trace at the times the protocol defines.
//!
//! If virtual time passes the configured limit the simulation panics, so a
//! device stuck in a wait fails the test rather than hanging it.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

use std::vec::Vec;

use super::{BusClock, IecBusLines, IecHal, IecLine, IeeeBusLines, IeeeHal, IeeeLine};
use crate::config::IeeeDrivers;

/// Signal masks for the simulated lines.  The IEC and IEEE-488 buses share
/// ATN and SRQ - only one bus is used by any test.
pub(crate) mod sig {
    pub const ATN: u16 = 0x0001;
    pub const CLOCK: u16 = 0x0002;
    pub const DATA: u16 = 0x0004;
    pub const SRQ: u16 = 0x0008;
    pub const NRFD: u16 = 0x0010;
    pub const NDAC: u16 = 0x0020;
    pub const DAV: u16 = 0x0040;
    pub const EOI: u16 = 0x0080;
    pub const IFC: u16 = 0x0100;
    pub const REN: u16 = 0x0200;
}

/// Cost of a raw line read.
const READ_COST_NS: u64 = 250;

/// Cost of reading the clock, or of driving a line.
const CALL_COST_NS: u64 = 20;

/// Default reaction time of host code after it sees the level it waits for.
const HOST_LATENCY_NS: u64 = 2_000;

/// Default limit on virtual time.
const DEFAULT_LIMIT_NS: u64 = 3_000_000_000;

/// One step of the host program.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum HostOp {
    /// Pull lines low.
    Pull(u16),
    /// Release lines.
    Release(u16),
    /// Wait for a number of nanoseconds.
    Delay(u64),
    /// Wait until all of the lines are low.
    WaitLow(u16),
    /// Wait until all of the lines are high.
    WaitHigh(u16),
    /// Record the current time as the reference for `At`, and in the list
    /// of references tests decode against.
    MarkRef,
    /// Wait until this many nanoseconds after the last reference.
    At(u64),
    /// Receive one byte as a standard IEC listener, handling EOI.
    IecListen,
    /// Drive (Some) or stop driving (None) the data bus - IEEE-488 data, or
    /// the parallel port.
    HostData(Option<u8>),
    /// Capture the data bus and the EOI line, as an IEEE-488 listener does.
    CaptureData,
    /// Pulse the parallel port handshake into the device.
    Strobe,
    /// Wait for the device to strobe the parallel port, and capture the
    /// port value.
    WaitStrobe,
}

// Progress through a compound IecListen op.
#[derive(Debug, Clone, Copy, PartialEq)]
enum ListenPhase {
    WaitTalkerReady,
    Ready { since: u64 },
    EoiAck { since: u64 },
    WaitFirstBit,
    BitHigh { bit: u8 },
    BitLow { bit: u8 },
    Ack,
}

/// A recorded change of bus level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Edge {
    pub time: u64,
    /// Levels after the change - a set bit means high.
    pub levels: u16,
}

/// A byte received by the host, with whether it carried EOI.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Received {
    pub byte: u8,
    pub eoi: bool,
}

pub(crate) struct SimBus {
    now: u64,
    limit: u64,
    host_latency: u64,

    // Lines pulled low by each side
    host_pulls: u16,
    dev_pulls: u16,

    // Data bus / parallel port
    host_data: Option<u8>,
    dev_data: u8,
    dev_data_out: bool,
    dev_strobes: u32,
    seen_strobes: u32,
    rxflag: bool,

    atn_ack: bool,
    interrupts_enabled: bool,
    talk_enable: bool,
    clock_stable: bool,
    drivers: IeeeDrivers,

    // Host program state
    program: Vec<HostOp>,
    pc: usize,
    resume_at: u64,
    op_started: Option<u64>,
    reference: u64,
    listen: Option<(ListenPhase, u8, bool)>,

    // Records
    pub trace: Vec<Edge>,
    pub dev_trace: Vec<Edge>,
    pub refs: Vec<u64>,
    pub received: Vec<Received>,
}

impl SimBus {
    pub fn new() -> Self {
        Self {
            now: 0,
            limit: DEFAULT_LIMIT_NS,
            host_latency: HOST_LATENCY_NS,
            host_pulls: 0,
            dev_pulls: 0,
            host_data: None,
            dev_data: 0,
            dev_data_out: false,
            dev_strobes: 0,
            seen_strobes: 0,
            rxflag: false,
            atn_ack: false,
            interrupts_enabled: true,
            talk_enable: false,
            clock_stable: true,
            drivers: IeeeDrivers::Sn7516x,
            program: Vec::new(),
            pc: 0,
            resume_at: 0,
            op_started: None,
            reference: 0,
            listen: None,
            trace: vec![Edge {
                time: 0,
                levels: 0xffff,
            }],
            dev_trace: vec![Edge {
                time: 0,
                levels: 0xffff,
            }],
            refs: Vec::new(),
            received: Vec::new(),
        }
    }

    /// Create a simulated bus running the given host program.
    pub fn with_program(program: Vec<HostOp>) -> Self {
        let mut sim = Self::new();
        sim.program = program;
        sim
    }

    /// Append ops to the host program.
    pub fn push_ops(&mut self, ops: impl IntoIterator<Item = HostOp>) {
        self.program.extend(ops);
    }

    pub fn set_limit_ms(&mut self, ms: u64) {
        self.limit = self.now + ms * 1_000_000;
    }

    pub fn set_clock_stable(&mut self, stable: bool) {
        self.clock_stable = stable;
    }

    pub fn set_drivers(&mut self, drivers: IeeeDrivers) {
        self.drivers = drivers;
    }

    /// Current virtual time.
    pub fn now(&self) -> u64 {
        self.now
    }

    /// Whether the host program has run to completion.
    pub fn host_done(&self) -> bool {
        self.pc >= self.program.len()
    }

    /// Whether the device has interrupts enabled.
    pub fn interrupts_enabled(&self) -> bool {
        self.interrupts_enabled
    }

    /// Levels on the bus right now - a set bit means high.
    pub fn levels(&self) -> u16 {
        !(self.host_pulls | self.dev_pulls)
    }

    /// Lines the device is currently pulling low.
    pub fn dev_pulls(&self) -> u16 {
        self.dev_pulls
    }

    /// Whether `line` was high at time `t`, according to the trace.
    pub fn level_at(&self, t: u64, line: u16) -> bool {
        let idx = self.trace.partition_point(|e| e.time <= t);
        let edge = &self.trace[idx.saturating_sub(1)];
        edge.levels & line != 0
    }

    /// Periods (start, end) during which the device pulled `line` low.
    pub fn dev_pulses(&self, line: u16) -> Vec<(u64, u64)> {
        let mut pulses = Vec::new();
        let mut start = None;
        for edge in &self.dev_trace {
            let low = edge.levels & line == 0;
            match (low, start) {
                (true, None) => start = Some(edge.time),
                (false, Some(s)) => {
                    pulses.push((s, edge.time));
                    start = None;
                }
                _ => {}
            }
        }
        if let Some(s) = start {
            pulses.push((s, u64::MAX));
        }
        pulses
    }

    /// Bytes received by the host.
    pub fn received_bytes(&self) -> Vec<u8> {
        self.received.iter().map(|r| r.byte).collect()
    }

    /// Run the simulation forward, with the device idle, until the host
    /// program completes or `ms` milliseconds pass.
    pub fn run_host_for(&mut self, ms: u64) {
        let end = self.now + ms * 1_000_000;
        while !self.host_done() && self.now < end {
            let step = self.now + 1_000;
            self.advance_to(step);
        }
    }

    //
    // Time and host program execution
    //

    fn advance(&mut self, ns: u64) {
        self.advance_to(self.now + ns);
    }

    fn advance_to(&mut self, target: u64) {
        loop {
            self.run_host();
            if self.now >= target {
                break;
            }
            let next = match self.host_wake() {
                Some(wake) => wake.min(target),
                None => target,
            };
            self.now = next.max(self.now + 1);
            if self.now > self.limit {
                panic!(
                    "Simulation time limit exceeded at {}ns: host pc {}/{}, levels {:04x}",
                    self.now,
                    self.pc,
                    self.program.len(),
                    self.levels()
                );
            }
        }
    }

    // The time at which the host program next wants to run, if it is
    // waiting for a time rather than a bus level.
    fn host_wake(&self) -> Option<u64> {
        if self.host_done() {
            return None;
        }
        if self.resume_at > self.now {
            return Some(self.resume_at);
        }
        match &self.program[self.pc] {
            HostOp::Delay(ns) => self.op_started.map(|s| s + ns),
            HostOp::At(ns) => Some(self.reference + ns),
            HostOp::IecListen => match self.listen {
                Some((ListenPhase::Ready { since }, _, _)) => Some(since + 200_000),
                Some((ListenPhase::EoiAck { since }, _, _)) => Some(since + 60_000),
                _ => None,
            },
            _ => None,
        }
    }

    fn record(&mut self) {
        let levels = self.levels();
        if self.trace.last().map(|e| e.levels) != Some(levels) {
            self.trace.push(Edge {
                time: self.now,
                levels,
            });
        }
        let dev = !self.dev_pulls;
        if self.dev_trace.last().map(|e| e.levels) != Some(dev) {
            self.dev_trace.push(Edge {
                time: self.now,
                levels: dev,
            });
        }
    }

    fn host_pull(&mut self, mask: u16) {
        let atn_falling = mask & sig::ATN != 0 && self.levels() & sig::ATN != 0;
        self.host_pulls |= mask;
        if atn_falling && self.atn_ack {
            self.dev_pulls |= sig::DATA;
        }
        self.record();
    }

    fn host_release(&mut self, mask: u16) {
        self.host_pulls &= !mask;
        self.record();
    }

    fn is_low(&self, mask: u16) -> bool {
        self.levels() & mask == 0
    }

    fn is_high(&self, mask: u16) -> bool {
        self.levels() & mask == mask
    }

    fn finish_wait(&mut self) {
        self.resume_at = self.now + self.host_latency;
        self.pc += 1;
        self.op_started = None;
    }

    fn bus_data(&self) -> u8 {
        let host = self.host_data.unwrap_or(0);
        let dev = if self.dev_data_out { self.dev_data } else { 0 };
        host | dev
    }

    fn run_host(&mut self) {
        while !self.host_done() && self.now >= self.resume_at {
            let op = self.program[self.pc].clone();
            match op {
                HostOp::Pull(mask) => {
                    self.host_pull(mask);
                    self.pc += 1;
                }
                HostOp::Release(mask) => {
                    self.host_release(mask);
                    self.pc += 1;
                }
                HostOp::Delay(ns) => {
                    let started = *self.op_started.get_or_insert(self.now);
                    if self.now >= started + ns {
                        self.op_started = None;
                        self.pc += 1;
                    } else {
                        break;
                    }
                }
                HostOp::WaitLow(mask) => {
                    if self.is_low(mask) {
                        self.finish_wait();
                    } else {
                        break;
                    }
                }
                HostOp::WaitHigh(mask) => {
                    if self.is_high(mask) {
                        self.finish_wait();
                    } else {
                        break;
                    }
                }
                HostOp::MarkRef => {
                    self.reference = self.now;
                    self.refs.push(self.now);
                    self.pc += 1;
                }
                HostOp::At(ns) => {
                    if self.now >= self.reference + ns {
                        self.pc += 1;
                    } else {
                        break;
                    }
                }
                HostOp::IecListen => {
                    if !self.step_listen() {
                        break;
                    }
                }
                HostOp::HostData(value) => {
                    self.host_data = value;
                    self.pc += 1;
                }
                HostOp::CaptureData => {
                    let eoi = self.is_low(sig::EOI);
                    let byte = self.bus_data();
                    self.received.push(Received { byte, eoi });
                    self.pc += 1;
                }
                HostOp::Strobe => {
                    self.rxflag = true;
                    self.pc += 1;
                }
                HostOp::WaitStrobe => {
                    if self.dev_strobes > self.seen_strobes {
                        self.seen_strobes += 1;
                        let byte = self.bus_data();
                        self.received.push(Received { byte, eoi: false });
                        self.finish_wait();
                    } else {
                        break;
                    }
                }
            }
        }
    }

    // Runs the compound listener op as far as it can.  Returns true if it
    // made progress, and the host program should keep running.
    fn step_listen(&mut self) -> bool {
        let (phase, byte, eoi) = self
            .listen
            .unwrap_or((ListenPhase::WaitTalkerReady, 0, false));
        let next = match phase {
            ListenPhase::WaitTalkerReady => {
                if !self.is_high(sig::CLOCK) {
                    return false;
                }
                self.host_release(sig::DATA);
                Some((ListenPhase::Ready { since: self.now }, byte, eoi))
            }
            ListenPhase::Ready { since } => {
                if self.is_low(sig::CLOCK) {
                    Some((ListenPhase::BitHigh { bit: 0 }, byte, eoi))
                } else if self.now >= since + 200_000 {
                    self.host_pull(sig::DATA);
                    Some((ListenPhase::EoiAck { since: self.now }, byte, true))
                } else {
                    return false;
                }
            }
            ListenPhase::EoiAck { since } => {
                if self.now < since + 60_000 {
                    return false;
                }
                self.host_release(sig::DATA);
                Some((ListenPhase::WaitFirstBit, byte, eoi))
            }
            ListenPhase::WaitFirstBit => {
                if !self.is_low(sig::CLOCK) {
                    return false;
                }
                Some((ListenPhase::BitHigh { bit: 0 }, byte, eoi))
            }
            ListenPhase::BitHigh { bit } => {
                if !self.is_high(sig::CLOCK) {
                    return false;
                }
                let value = if self.is_high(sig::DATA) {
                    byte | (1 << bit)
                } else {
                    byte
                };
                Some((ListenPhase::BitLow { bit }, value, eoi))
            }
            ListenPhase::BitLow { bit } => {
                if !self.is_low(sig::CLOCK) {
                    return false;
                }
                if bit == 7 {
                    self.resume_at = self.now + self.host_latency;
                    Some((ListenPhase::Ack, byte, eoi))
                } else {
                    Some((ListenPhase::BitHigh { bit: bit + 1 }, byte, eoi))
                }
            }
            ListenPhase::Ack => {
                self.host_pull(sig::DATA);
                self.received.push(Received { byte, eoi });
                None
            }
        };
        match next {
            Some(state) => self.listen = Some(state),
            None => {
                self.listen = None;
                self.pc += 1;
            }
        }
        true
    }

    fn dev_pull(&mut self, mask: u16) {
        self.advance(CALL_COST_NS);
        self.dev_pulls |= mask;
        self.record();
    }

    fn dev_release(&mut self, mask: u16) {
        self.advance(CALL_COST_NS);
        self.dev_pulls &= !mask;
        self.record();
    }
}

fn iec_sig(line: IecLine) -> u16 {
    match line {
        IecLine::Atn => sig::ATN,
        IecLine::Clock => sig::CLOCK,
        IecLine::Data => sig::DATA,
        IecLine::Srq => sig::SRQ,
    }
}

fn ieee_sig(line: IeeeLine) -> u16 {
    match line {
        IeeeLine::Atn => sig::ATN,
        IeeeLine::Nrfd => sig::NRFD,
        IeeeLine::Ndac => sig::NDAC,
        IeeeLine::Dav => sig::DAV,
        IeeeLine::Eoi => sig::EOI,
        IeeeLine::Ifc => sig::IFC,
        IeeeLine::Srq => sig::SRQ,
        IeeeLine::Ren => sig::REN,
    }
}

impl BusClock for SimBus {
    fn now_ns(&mut self) -> u32 {
        self.advance(CALL_COST_NS);
        self.now as u32
    }

    fn wait_until(&mut self, deadline: u32) {
        let delta = deadline.wrapping_sub(self.now as u32) as i32;
        if delta > 0 {
            self.advance(delta as u64);
        } else {
            self.advance(CALL_COST_NS);
        }
    }

    fn interrupts(&mut self, enabled: bool) {
        self.interrupts_enabled = enabled;
    }
}

impl IecHal for SimBus {
    fn pull(&mut self, line: IecLine) {
        self.dev_pull(iec_sig(line));
    }

    fn release(&mut self, line: IecLine) {
        self.dev_release(iec_sig(line));
    }

    fn read_raw(&mut self) -> IecBusLines {
        self.advance(READ_COST_NS);
        let levels = self.levels();
        let mut lines = IecBusLines::empty();
        for (s, l) in [
            (sig::ATN, IecBusLines::ATN),
            (sig::CLOCK, IecBusLines::CLOCK),
            (sig::DATA, IecBusLines::DATA),
            (sig::SRQ, IecBusLines::SRQ),
        ] {
            if levels & s != 0 {
                lines |= l;
            }
        }
        lines
    }

    fn set_atn_ack(&mut self, enabled: bool) {
        self.atn_ack = enabled;
    }

    fn parallel_write(&mut self, value: u8) {
        self.advance(CALL_COST_NS);
        self.dev_data = value;
    }

    fn parallel_read(&mut self) -> u8 {
        self.advance(READ_COST_NS);
        self.bus_data()
    }

    fn parallel_output(&mut self, enabled: bool) {
        self.advance(CALL_COST_NS);
        self.dev_data_out = enabled;
    }

    fn parallel_strobe(&mut self) {
        self.advance(CALL_COST_NS);
        self.dev_strobes += 1;
    }

    fn parallel_take_rxflag(&mut self) -> bool {
        self.advance(CALL_COST_NS);
        core::mem::take(&mut self.rxflag)
    }

    fn clock_stable(&mut self) -> bool {
        self.clock_stable
    }
}

impl IeeeHal for SimBus {
    fn pull(&mut self, line: IeeeLine) {
        self.dev_pull(ieee_sig(line));
    }

    fn release(&mut self, line: IeeeLine) {
        self.dev_release(ieee_sig(line));
    }

    fn read_lines(&mut self) -> IeeeBusLines {
        self.advance(READ_COST_NS);
        let levels = self.levels();
        let mut lines = IeeeBusLines::empty();
        for (s, l) in [
            (sig::ATN, IeeeBusLines::ATN),
            (sig::NRFD, IeeeBusLines::NRFD),
            (sig::NDAC, IeeeBusLines::NDAC),
            (sig::DAV, IeeeBusLines::DAV),
            (sig::EOI, IeeeBusLines::EOI),
            (sig::IFC, IeeeBusLines::IFC),
            (sig::SRQ, IeeeBusLines::SRQ),
            (sig::REN, IeeeBusLines::REN),
        ] {
            if levels & s != 0 {
                lines |= l;
            }
        }
        lines
    }

    fn read_data(&mut self) -> u8 {
        self.advance(READ_COST_NS);
        self.bus_data()
    }

    fn write_data(&mut self, value: u8) {
        self.advance(CALL_COST_NS);
        self.dev_data = value;
    }

    fn set_data_output(&mut self, enabled: bool) {
        self.advance(CALL_COST_NS);
        self.dev_data_out = enabled;
    }

    fn set_talk_enable(&mut self, talk: bool) {
        self.talk_enable = talk;
    }

    fn drivers(&self) -> IeeeDrivers {
        self.drivers
    }
}

/// Builders for common host sequences.
pub(crate) mod host {
    use std::vec::Vec;

    use super::HostOp::{self, *};
    use super::sig;

    const US: u64 = 1_000;

    /// Assert ATN, as the C64 does before sending command bytes: release
    /// DATA, pull ATN and CLOCK, and wait for the device to acknowledge by
    /// pulling DATA.
    pub fn atn_start() -> Vec<HostOp> {
        vec![
            Release(sig::DATA),
            Pull(sig::ATN | sig::CLOCK),
            WaitLow(sig::DATA),
            Delay(100 * US),
        ]
    }

    /// Release ATN with the host remaining talker (after LISTEN).
    pub fn atn_end_listen() -> Vec<HostOp> {
        vec![Delay(20 * US), Release(sig::ATN), Delay(100 * US)]
    }

    /// Release ATN and then CLOCK, leaving the bus idle (after UNLISTEN or
    /// UNTALK).
    pub fn atn_end_unlisten() -> Vec<HostOp> {
        vec![Delay(20 * US), Release(sig::ATN), Delay(100 * US), Release(sig::CLOCK)]
    }

    /// Release ATN and turn the bus around, so the device becomes talker
    /// (after TALK).
    pub fn atn_end_talk() -> Vec<HostOp> {
        vec![
            Delay(20 * US),
            Pull(sig::DATA),
            Release(sig::ATN),
            Release(sig::CLOCK),
            WaitLow(sig::CLOCK),
        ]
    }

    /// Send one byte as a standard IEC talker.  With `eoi`, EOI is signalled
    /// by waiting for the listener's acknowledge.
    pub fn send_byte(byte: u8, eoi: bool) -> Vec<HostOp> {
        let mut ops = vec![Release(sig::CLOCK), WaitHigh(sig::DATA)];
        if eoi {
            ops.extend([WaitLow(sig::DATA), WaitHigh(sig::DATA), Delay(30 * US)]);
        } else {
            ops.push(Delay(40 * US));
        }
        ops.extend(send_bits(byte, false));
        ops.extend(frame_ack());
        ops
    }

    /// Send one byte without waiting for the listener's frame acknowledge,
    /// as a host does when nobody may be listening.
    pub fn send_byte_unacked(byte: u8) -> Vec<HostOp> {
        let mut ops = vec![Release(sig::CLOCK), WaitHigh(sig::DATA), Delay(40 * US)];
        ops.extend(send_bits(byte, false));
        ops
    }

    /// Send one byte, leaving `gap_us` between the listener being ready and
    /// the first bit, without waiting for any EOI acknowledge.
    pub fn send_byte_gap(byte: u8, gap_us: u64) -> Vec<HostOp> {
        let mut ops = vec![Release(sig::CLOCK), WaitHigh(sig::DATA), Delay(gap_us * US)];
        ops.extend(send_bits(byte, false));
        ops.extend(frame_ack());
        ops
    }

    /// Send one byte under ATN, with the JiffyDOS probe before bit 7.
    pub fn send_byte_jiffy_probe(byte: u8) -> Vec<HostOp> {
        let mut ops = vec![Release(sig::CLOCK), WaitHigh(sig::DATA), Delay(40 * US)];
        ops.extend(send_bits(byte, true));
        ops.extend(frame_ack());
        ops
    }

    // CLOCK low, then 8 bits LSB first.
    fn send_bits(byte: u8, jiffy_probe: bool) -> Vec<HostOp> {
        let mut ops = vec![Pull(sig::CLOCK), Delay(20 * US)];
        for bit in 0..8 {
            if bit == 7 && jiffy_probe {
                // Hold CLOCK low past the detection window, then wait for any
                // acknowledge pulse to finish.
                ops.extend([Delay(260 * US), WaitHigh(sig::DATA)]);
            }
            if byte & (1 << bit) != 0 {
                ops.push(Release(sig::DATA));
            } else {
                ops.push(Pull(sig::DATA));
            }
            ops.extend([
                Delay(20 * US),
                Release(sig::CLOCK),
                Delay(60 * US),
                Pull(sig::CLOCK),
                Release(sig::DATA),
                Delay(20 * US),
            ]);
        }
        ops
    }

    fn frame_ack() -> [HostOp; 2] {
        [WaitLow(sig::DATA), Delay(100 * US)]
    }

    /// Send a sequence of bytes under ATN.
    pub fn atn_bytes(bytes: &[u8]) -> Vec<HostOp> {
        let mut ops = atn_start();
        for &b in bytes {
            ops.extend(send_byte(b, false));
        }
        ops
    }

    /// Send a sequence of data bytes, with EOI on the last.
    pub fn data_bytes(bytes: &[u8]) -> Vec<HostOp> {
        let mut ops = Vec::new();
        for (i, &b) in bytes.iter().enumerate() {
            ops.extend(send_byte(b, i == bytes.len() - 1));
        }
        ops
    }

    /// Send one byte as an IEEE-488 talker.
    pub fn ieee_send(byte: u8, eoi: bool) -> Vec<HostOp> {
        let mut ops = vec![WaitHigh(sig::NRFD), HostData(Some(byte)), Delay(2 * US)];
        if eoi {
            ops.push(Pull(sig::EOI));
        }
        ops.extend([
            Pull(sig::DAV),
            WaitHigh(sig::NDAC),
            Release(sig::DAV | sig::EOI),
            HostData(None),
            WaitLow(sig::NDAC),
        ]);
        ops
    }

    /// Receive one byte as an IEEE-488 listener.
    pub fn ieee_listen() -> Vec<HostOp> {
        vec![
            Release(sig::NRFD),
            WaitLow(sig::DAV),
            CaptureData,
            Pull(sig::NRFD),
            Release(sig::NDAC),
            WaitHigh(sig::DAV),
            Pull(sig::NDAC),
        ]
    }
}
