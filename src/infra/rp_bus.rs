//! The RP hardware implementation of the bus traits.
//!
//! The bus lines are open-collector, 5V.  Each line the drive can drive has
//! two GPIOs: an input, seeing the line through a level shifter, and an
//! output feeding an inverting open-collector driver.  So setting the output
//! pin high pulls the bus line low.
//!
//! Timing uses the embassy time driver, which counts microseconds, for
//! anything at or above a couple of microseconds, and cycle counted spins for
//! the shorter delays the fastloaders use.
//!
//! The RP has no equivalent of the AVR ATN interrupt sd2iec style drives use
//! to acknowledge ATN in hardware, and the bus engine owns core 1 outright, so
//! the acknowledge is made in the read path instead: the first read which sees
//! ATN low pulls DATA.  The engine polls the bus continuously, so this is well
//! within the 1ms the host allows.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

#[allow(unused_imports)]
use crate::fmt::{debug, error, info, trace, warn};
use embassy_rp::gpio::{Flex, Input, Level, Output, Pull};
use embassy_time::Instant;

use super::gpio::{Gpio, IecPinConfig, IeeePinConfig, ParallelPinConfig, PinUnavailable};
use crate::bus::{BusClock, IecBusLines, IecHal, IecLine, IeeeBusLines, IeeeHal, IeeeLine};
use crate::config::IeeeDrivers;
use crate::signals::Signals;
use crate::util::time::{NS_PER_US, reached};

// Delays shorter than this are spun by counting cycles.
const SPIN_LIMIT_NS: u32 = 2 * NS_PER_US;

// Width of the pulse on the parallel port handshake output.
const STROBE_NS: u32 = 1000;

/// A bus line, driven through an inverting open-collector driver, with a
/// separate input.
pub struct Line {
    input: Flex<'static>,
    output: Flex<'static>,
}

impl Line {
    /// Create a new Line with the specified input and output pins
    pub fn new(input: Flex<'static>, output: Flex<'static>) -> Self {
        // The level shifters have their own pull-ups
        let mut input = input;
        input.set_as_input();
        input.set_pull(Pull::None);

        // Output low is the released state, as the driver inverts
        let mut output = output;
        output.set_low();
        output.set_as_output();

        Self { input, output }
    }

    /// Pull the bus line low - the output is inverted so high.
    #[allow(clippy::inline_always)]
    #[inline(always)]
    pub fn set(&mut self) {
        self.output.set_high();
    }

    /// Release the bus line - the output is inverted so low.
    #[allow(clippy::inline_always)]
    #[inline(always)]
    pub fn release(&mut self) {
        self.output.set_low();
    }

    /// Whether the bus line is high - released by everyone.
    #[allow(clippy::inline_always)]
    #[inline(always)]
    pub fn is_high(&self) -> bool {
        self.input.is_high()
    }
}

/// The timebase shared by both bus implementations.
pub struct RpClock {
    cycles_per_us: u32,
    signals: &'static Signals,
}

impl RpClock {
    pub fn new(signals: &'static Signals) -> Self {
        Self {
            cycles_per_us: embassy_rp::clocks::clk_sys_freq() / 1_000_000,
            signals,
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn now_ns(&self) -> u32 {
        // Wraps every 4.29s, which the wrapping comparisons handle
        (Instant::now().as_micros() as u32).wrapping_mul(NS_PER_US)
    }

    fn delay_ns(&self, ns: u32) {
        if ns <= SPIN_LIMIT_NS {
            cortex_m::asm::delay(ns * self.cycles_per_us / NS_PER_US);
            return;
        }
        let deadline = self.now_ns().wrapping_add(ns);
        while !reached(self.now_ns(), deadline) {}
    }

    fn interrupts(enabled: bool) {
        if enabled {
            // Safety: only re-enables what Llfl disabled, outside any
            // critical section.
            unsafe { cortex_m::interrupt::enable() };
        } else {
            cortex_m::interrupt::disable();
        }
    }

    // Let core 0 know we are still alive.
    #[allow(clippy::inline_always)]
    #[inline(always)]
    fn beat(&self) {
        self.signals.beat();
    }
}

// Implements BusClock for a bus object with an RpClock in `clock`.
macro_rules! impl_bus_clock {
    ($bus:ty) => {
        impl BusClock for $bus {
            fn now_ns(&mut self) -> u32 {
                self.clock.now_ns()
            }

            fn delay_ns(&mut self, ns: u32) {
                self.clock.delay_ns(ns);
            }

            fn interrupts(&mut self, enabled: bool) {
                RpClock::interrupts(enabled);
            }

            fn idle(&mut self) {
                self.clock.beat();
            }
        }
    };
}

/// The DolphinDOS parallel port.
pub struct ParallelPort {
    data: [Flex<'static>; 8],
    flag: Input<'static>,
    strobe: Output<'static>,
    flag_was_high: bool,
    rxflag: bool,
}

impl ParallelPort {
    pub fn new(gpio: &mut Gpio, pins: &ParallelPinConfig) -> Result<Self, PinUnavailable> {
        let mut data = gpio.take_flex_array(pins.d_io)?;
        for pin in &mut data {
            pin.set_as_input();
            pin.set_pull(Pull::Up);
        }
        Ok(Self {
            data,
            flag: gpio.take_input(pins.flag_in, Pull::Up)?,
            strobe: gpio.take_output(pins.strobe_out, Level::High)?,
            flag_was_high: true,
            rxflag: false,
        })
    }

    // Latch a falling edge of the host's handshake.
    #[allow(clippy::inline_always)]
    #[inline(always)]
    fn sample(&mut self) {
        let high = self.flag.is_high();
        if self.flag_was_high && !high {
            self.rxflag = true;
        }
        self.flag_was_high = high;
    }
}

/// The IEC bus.
pub struct RpIecBus {
    clock: RpClock,
    clock_line: Line,
    data: Line,
    atn: Input<'static>,
    srq: Line,
    parallel: Option<ParallelPort>,
    atn_ack: bool,
    atn_was_low: bool,
}

impl RpIecBus {
    pub fn new(
        gpio: &mut Gpio,
        pins: &IecPinConfig,
        parallel: Option<&ParallelPinConfig>,
        signals: &'static Signals,
    ) -> Result<Self, PinUnavailable> {
        let parallel = match parallel {
            Some(pins) => Some(ParallelPort::new(gpio, pins)?),
            None => None,
        };
        Ok(Self {
            clock: RpClock::new(signals),
            clock_line: Line::new(gpio.take_flex(pins.clock_in)?, gpio.take_flex(pins.clock_out)?),
            data: Line::new(gpio.take_flex(pins.data_in)?, gpio.take_flex(pins.data_out)?),
            atn: gpio.take_input(pins.atn_in, Pull::None)?,
            srq: Line::new(gpio.take_flex(pins.srq_in)?, gpio.take_flex(pins.srq_out)?),
            parallel,
            atn_ack: false,
            atn_was_low: false,
        })
    }

    pub fn has_parallel(&self) -> bool {
        self.parallel.is_some()
    }
}

impl_bus_clock!(RpIecBus);

impl IecHal for RpIecBus {
    #[allow(clippy::inline_always)]
    #[inline(always)]
    fn pull(&mut self, line: IecLine) {
        match line {
            IecLine::Data => self.data.set(),
            IecLine::Clock => self.clock_line.set(),
            IecLine::Srq => self.srq.set(),
            IecLine::Atn => {}
        }
    }

    #[allow(clippy::inline_always)]
    #[inline(always)]
    fn release(&mut self, line: IecLine) {
        match line {
            IecLine::Data => self.data.release(),
            IecLine::Clock => self.clock_line.release(),
            IecLine::Srq => self.srq.release(),
            IecLine::Atn => {}
        }
    }

    fn read_raw(&mut self) -> IecBusLines {
        self.clock.beat();

        let atn_low = self.atn.is_low();
        if atn_low && !self.atn_was_low && self.atn_ack {
            self.data.set();
        }
        self.atn_was_low = atn_low;

        if let Some(port) = self.parallel.as_mut() {
            port.sample();
        }

        let mut lines = IecBusLines::empty();
        lines.set(IecBusLines::ATN, !atn_low);
        lines.set(IecBusLines::CLOCK, self.clock_line.is_high());
        lines.set(IecBusLines::DATA, self.data.is_high());
        lines.set(IecBusLines::SRQ, self.srq.is_high());
        lines
    }

    fn set_atn_ack(&mut self, enabled: bool) {
        self.atn_ack = enabled;
    }

    fn parallel_write(&mut self, value: u8) {
        if let Some(port) = self.parallel.as_mut() {
            for (bit, pin) in port.data.iter_mut().enumerate() {
                pin.set_level(Level::from(value & (1 << bit) != 0));
            }
        }
    }

    fn parallel_read(&mut self) -> u8 {
        self.parallel.as_ref().map_or(0xff, |port| {
            port.data
                .iter()
                .enumerate()
                .fold(0, |acc, (bit, pin)| acc | (u8::from(pin.is_high()) << bit))
        })
    }

    fn parallel_output(&mut self, enabled: bool) {
        if let Some(port) = self.parallel.as_mut() {
            for pin in &mut port.data {
                if enabled {
                    pin.set_as_output();
                } else {
                    pin.set_as_input();
                }
            }
        }
    }

    fn parallel_strobe(&mut self) {
        if let Some(port) = self.parallel.as_mut() {
            port.strobe.set_low();
            self.clock.delay_ns(STROBE_NS);
            port.strobe.set_high();
        }
    }

    fn parallel_take_rxflag(&mut self) -> bool {
        self.parallel.as_mut().is_some_and(|port| {
            port.sample();
            core::mem::take(&mut port.rxflag)
        })
    }
}

/// The IEEE-488 bus.
pub struct RpIeeeBus {
    clock: RpClock,
    atn: Input<'static>,
    ifc: Input<'static>,
    nrfd: Line,
    ndac: Line,
    dav: Line,
    eoi: Line,
    srq: Output<'static>,
    talk_enable: Output<'static>,
    data: [Flex<'static>; 8],
    drivers: IeeeDrivers,
}

impl RpIeeeBus {
    pub fn new(
        gpio: &mut Gpio,
        pins: &IeeePinConfig,
        drivers: IeeeDrivers,
        signals: &'static Signals,
    ) -> Result<Self, PinUnavailable> {
        let mut data = gpio.take_flex_array(pins.d_io)?;
        for pin in &mut data {
            pin.set_as_input();
            pin.set_pull(Pull::None);
        }
        Ok(Self {
            clock: RpClock::new(signals),
            atn: gpio.take_input(pins.atn_in, Pull::None)?,
            ifc: gpio.take_input(pins.ifc_in, Pull::None)?,
            nrfd: Line::new(gpio.take_flex(pins.nrfd_in)?, gpio.take_flex(pins.nrfd_out)?),
            ndac: Line::new(gpio.take_flex(pins.ndac_in)?, gpio.take_flex(pins.ndac_out)?),
            dav: Line::new(gpio.take_flex(pins.dav_in)?, gpio.take_flex(pins.dav_out)?),
            eoi: Line::new(gpio.take_flex(pins.eoi_in)?, gpio.take_flex(pins.eoi_out)?),
            srq: gpio.take_output(pins.srq_out, Level::Low)?,
            talk_enable: gpio.take_output(pins.talk_enable, Level::Low)?,
            data,
            drivers,
        })
    }
}

impl_bus_clock!(RpIeeeBus);

impl IeeeHal for RpIeeeBus {
    fn pull(&mut self, line: IeeeLine) {
        match line {
            IeeeLine::Nrfd => self.nrfd.set(),
            IeeeLine::Ndac => self.ndac.set(),
            IeeeLine::Dav => self.dav.set(),
            IeeeLine::Eoi => self.eoi.set(),
            IeeeLine::Srq => self.srq.set_high(),
            IeeeLine::Atn | IeeeLine::Ifc | IeeeLine::Ren => {}
        }
    }

    fn release(&mut self, line: IeeeLine) {
        match line {
            IeeeLine::Nrfd => self.nrfd.release(),
            IeeeLine::Ndac => self.ndac.release(),
            IeeeLine::Dav => self.dav.release(),
            IeeeLine::Eoi => self.eoi.release(),
            IeeeLine::Srq => self.srq.set_low(),
            IeeeLine::Atn | IeeeLine::Ifc | IeeeLine::Ren => {}
        }
    }

    fn read_lines(&mut self) -> IeeeBusLines {
        self.clock.beat();

        // REN isn't wired, and SRQ is output only
        let mut lines = IeeeBusLines::SRQ | IeeeBusLines::REN;
        lines.set(IeeeBusLines::ATN, self.atn.is_high());
        lines.set(IeeeBusLines::IFC, self.ifc.is_high());
        lines.set(IeeeBusLines::NRFD, self.nrfd.is_high());
        lines.set(IeeeBusLines::NDAC, self.ndac.is_high());
        lines.set(IeeeBusLines::DAV, self.dav.is_high());
        lines.set(IeeeBusLines::EOI, self.eoi.is_high());
        lines
    }

    fn read_data(&mut self) -> u8 {
        // The data lines are active low
        !self
            .data
            .iter()
            .enumerate()
            .fold(0u8, |acc, (bit, pin)| acc | (u8::from(pin.is_high()) << bit))
    }

    fn write_data(&mut self, value: u8) {
        for (bit, pin) in self.data.iter_mut().enumerate() {
            pin.set_level(Level::from(value & (1 << bit) == 0));
        }
    }

    fn set_data_output(&mut self, enabled: bool) {
        for pin in &mut self.data {
            if enabled {
                pin.set_as_output();
            } else {
                pin.set_as_input();
            }
        }
    }

    fn set_talk_enable(&mut self, talk: bool) {
        self.talk_enable.set_level(Level::from(talk));
    }

    fn drivers(&self) -> IeeeDrivers {
        self.drivers
    }
}
