//! DolphinDOS parallel byte transfers.
//!
//! Data goes over the 8 bit parallel cable, with the port's handshake lines
//! strobing each byte and CLOCK/DATA pacing the transfer.  These are
//! handshaked rather than timed, so need no low level session.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

use super::{wait_clock, wait_data};
use crate::bus::IecHal;
use crate::fastloader::FastloaderError;
use crate::util::time::iec::{EOI_ACK_US, EOI_TIMEOUT_US};

/// Send a byte.  The drive signals the byte is ready by releasing CLOCK,
/// and the host acknowledges it by pulling DATA once it's strobed.
pub fn dolphin_putc<B: IecHal + ?Sized>(bus: &mut B, byte: u8) -> Result<(), FastloaderError> {
    bus.release_clock();
    wait_data(bus, false)?;

    bus.parallel_output(true);
    bus.parallel_write(byte);
    bus.parallel_strobe();
    bus.set_clock();

    wait_data(bus, true)
}

/// Receive a byte.  Returns the byte and whether it carried EOI - which, as
/// in the serial protocol, the host signals by not sending for a while.
pub fn dolphin_getc<B: IecHal + ?Sized>(bus: &mut B) -> Result<(u8, bool), FastloaderError> {
    wait_clock(bus, false)?;
    bus.parallel_output(false);
    bus.release_data();

    let mut eoi = false;
    let timeout = bus.start_timeout(EOI_TIMEOUT_US);
    loop {
        if bus.parallel_take_rxflag() {
            break;
        }
        if bus.get_atn() {
            return Err(FastloaderError::Atn);
        }
        if !eoi && bus.has_timed_out(&timeout) {
            // Acknowledge EOI, and keep waiting for the byte
            eoi = true;
            bus.set_data();
            bus.delay_us(EOI_ACK_US);
            bus.release_data();
        }
    }

    let byte = bus.parallel_read();
    bus.set_data();
    Ok((byte, eoi))
}

/// Stop driving the parallel port.
pub fn dolphin_release<B: IecHal + ?Sized>(bus: &mut B) {
    bus.parallel_output(false);
}
