//! Nippon Loader byte transfers.  One bit per ATN edge, least significant
//! first, carried on DATA.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

use super::{AtnMode, BitOrder, Llfl};
use crate::bus::{IecHal, IecLine};
use crate::fastloader::FastloaderError;

pub fn nippon_read_byte<B: IecHal + ?Sized>(bus: &mut B) -> Result<u8, FastloaderError> {
    Llfl::new(bus).toggled_read_byte(IecLine::Atn, BitOrder::LsbFirst, AtnMode::NoAtnAbort)
}

pub fn nippon_send_byte<B: IecHal + ?Sized>(bus: &mut B, byte: u8) -> Result<(), FastloaderError> {
    Llfl::new(bus).toggled_send_byte(IecLine::Atn, BitOrder::LsbFirst, byte, AtnMode::NoAtnAbort)
}
