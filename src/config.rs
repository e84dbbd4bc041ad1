//! Drive configuration.
//!
//! The configuration is plain data, handed to the drive at start of day.
//! Where it comes from (compiled in defaults, or a configuration store) is
//! not this crate's concern.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

use crate::constants::{DEFAULT_DEVICE_ADDRESS, MAX_DEVICE_ADDRESS, MIN_DEVICE_ADDRESS};

/// The physical drive being emulated.  Some fastloaders upload different
/// drive code depending on the drive type, and select different timings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DriveModel {
    #[default]
    D1541,
    D1571,
    D1581,
    CmdHd,
}

/// How the IEEE-488 data and handshake lines are driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IeeeDrivers {
    /// 75160/75161 bus driver chips, with a dedicated talk enable line.
    #[default]
    Sn7516x,

    /// Lines wired straight to the GPIOs.  Direction changes are made by
    /// reconfiguring the pins, which must never leave two outputs driving
    /// against each other.
    Direct,
}

/// Drive configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DriveConfig {
    /// Device address on the bus, 4-30.
    pub device_address: u8,

    /// The drive type being emulated.
    pub model: DriveModel,

    /// Whether to respond to JiffyDOS capability probes.
    pub jiffy_enabled: bool,

    /// Use VIC-20 compatible (shorter) bit hold times when talking.
    pub vc20_mode: bool,

    /// Whether a DolphinDOS parallel cable is fitted.
    pub parallel_cable: bool,

    /// Whether the SRQ line is wired.
    pub srq_available: bool,

    /// IEEE-488 bus driver type.
    pub ieee_drivers: IeeeDrivers,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            device_address: DEFAULT_DEVICE_ADDRESS,
            model: DriveModel::default(),
            jiffy_enabled: true,
            vc20_mode: false,
            parallel_cable: false,
            srq_available: false,
            ieee_drivers: IeeeDrivers::default(),
        }
    }
}

impl DriveConfig {
    /// Returns a copy of this configuration using the specified device
    /// address, if it is valid.
    pub fn with_device_address(self, device_address: u8) -> Option<Self> {
        if is_valid_device_address(device_address) {
            Some(Self {
                device_address,
                ..self
            })
        } else {
            None
        }
    }
}

/// Whether `addr` is an address a drive may use.
pub fn is_valid_device_address(addr: u8) -> bool {
    (MIN_DEVICE_ADDRESS..=MAX_DEVICE_ADDRESS).contains(&addr)
}
