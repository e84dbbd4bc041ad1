//! Hardware infrastructure for the RP firmware.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

pub(crate) mod display;
pub(crate) mod gpio;
pub(crate) mod keys;
pub(crate) mod rp_bus;
pub(crate) mod watchdog;
