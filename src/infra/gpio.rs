//! This file handles GPIO pin allocation.
//!
//! The source code serves as the master list of pin assignments for the
//! hardware.  The IEC and IEEE-488 buses share the same level shifters, so
//! their pin assignments overlap - a firmware image only drives one of them.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

#[allow(unused_imports)]
use crate::fmt::{debug, error, info, trace, warn};
use embassy_rp::gpio::{AnyPin, Flex, Input, Level, Output, Pull};
use heapless::Vec;

/// Number of GPIOs the RP2040 and RP2350A have.
pub const NUM_PINS: usize = 30;

/// GPIO configurations for different boards.
pub mod config {
    use super::{IecPinConfig, IeeePinConfig, KeyPinConfig, ParallelPinConfig, PinConfig};

    /// Configuration for the v0.1 board.
    pub fn standard_v0_1() -> PinConfig {
        PinConfig {
            busy_led: 25,
            dirty_led: 10,
            keys: KeyPinConfig {
                next: 26,
                prev: 27,
                sleep: 28,
                card_detect: 15,
            },
            iec: IecPinConfig {
                clock_in: 19,
                clock_out: 11,
                data_in: 20,
                data_out: 13,
                atn_in: 17,
                srq_in: 16,
                srq_out: 14,
            },
            ieee: IeeePinConfig {
                atn_in: 17,
                ifc_in: 18,
                nrfd_in: 19,
                nrfd_out: 11,
                ndac_in: 20,
                ndac_out: 13,
                dav_in: 16,
                dav_out: 14,
                eoi_in: 21,
                eoi_out: 22,
                srq_out: 1,
                talk_enable: 0,
                d_io: [2, 3, 4, 5, 9, 8, 7, 6],
            },
            parallel: Some(ParallelPinConfig {
                d_io: [2, 3, 4, 5, 9, 8, 7, 6],
                flag_in: 21,
                strobe_out: 22,
            }),
        }
    }
}

/// Pin configuration for a board.
#[derive(Debug, Clone)]
pub struct PinConfig {
    pub busy_led: u8,
    pub dirty_led: u8,
    pub keys: KeyPinConfig,
    pub iec: IecPinConfig,
    pub ieee: IeeePinConfig,
    /// The DolphinDOS parallel port, if the board has one.
    pub parallel: Option<ParallelPinConfig>,
}

/// Default pin configuration
impl Default for PinConfig {
    fn default() -> Self {
        config::standard_v0_1()
    }
}

/// Key and card detect inputs.  All are active low.
#[derive(Debug, Clone)]
pub struct KeyPinConfig {
    pub next: u8,
    pub prev: u8,
    pub sleep: u8,
    pub card_detect: u8,
}

/// IEC bus pin configuration.  Each driven line has an input pin, and an
/// output pin feeding an inverting open-collector driver.  ATN is input only -
/// a drive never asserts it.
#[derive(Debug, Clone)]
pub struct IecPinConfig {
    pub clock_in: u8,
    pub clock_out: u8,
    pub data_in: u8,
    pub data_out: u8,
    pub atn_in: u8,
    pub srq_in: u8,
    pub srq_out: u8,
}

/// IEEE-488 bus pin configuration.
#[derive(Debug, Clone)]
pub struct IeeePinConfig {
    pub atn_in: u8,
    pub ifc_in: u8,
    pub nrfd_in: u8,
    pub nrfd_out: u8,
    pub ndac_in: u8,
    pub ndac_out: u8,
    pub dav_in: u8,
    pub dav_out: u8,
    pub eoi_in: u8,
    pub eoi_out: u8,
    pub srq_out: u8,
    pub talk_enable: u8,
    pub d_io: [u8; 8],
}

/// DolphinDOS parallel port pin configuration.
#[derive(Debug, Clone)]
pub struct ParallelPinConfig {
    pub d_io: [u8; 8],
    /// The host's handshake output (FLAG on the C64 side).
    pub flag_in: u8,
    /// Our handshake output (to the host's FLAG input).
    pub strobe_out: u8,
}

/// Returned when a pin is missing, or already in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PinUnavailable(pub u8);

/// Owns the GPIOs, and hands them out by number as the hardware objects are
/// built.
pub struct Gpio {
    pins: [Option<AnyPin>; NUM_PINS],
    config: PinConfig,
}

impl Gpio {
    pub fn new(pins: [AnyPin; NUM_PINS], config: PinConfig) -> Self {
        Self {
            pins: pins.map(Some),
            config,
        }
    }

    pub fn config(&self) -> &PinConfig {
        &self.config
    }

    /// Helper to take a pin by index
    fn take_pin(&mut self, index: u8) -> Result<AnyPin, PinUnavailable> {
        match self.pins.get_mut(usize::from(index)).and_then(Option::take) {
            Some(pin) => Ok(pin),
            None => {
                warn!("Pin {} unavailable", index);
                Err(PinUnavailable(index))
            }
        }
    }

    pub fn take_flex(&mut self, index: u8) -> Result<Flex<'static>, PinUnavailable> {
        self.take_pin(index).map(Flex::new)
    }

    pub fn take_output(&mut self, index: u8, level: Level) -> Result<Output<'static>, PinUnavailable> {
        self.take_pin(index).map(|pin| Output::new(pin, level))
    }

    pub fn take_input(&mut self, index: u8, pull: Pull) -> Result<Input<'static>, PinUnavailable> {
        self.take_pin(index).map(|pin| Input::new(pin, pull))
    }

    /// Take a group of pins, such as a data bus.
    pub fn take_flex_array<const N: usize>(
        &mut self,
        indexes: [u8; N],
    ) -> Result<[Flex<'static>; N], PinUnavailable> {
        let mut pins: Vec<Flex<'static>, N> = Vec::new();
        for index in indexes {
            let pin = self.take_flex(index)?;
            // Can't be full - there are N indexes
            let _ = pins.push(pin);
        }
        pins.into_array().map_err(|_| PinUnavailable(indexes[0]))
    }
}
