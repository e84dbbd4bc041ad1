//! Various utils for pico2iec.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

pub(crate) mod built;
pub(crate) mod crc;
pub(crate) mod time;
