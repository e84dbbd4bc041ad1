//! pico2iec
//!
//! Firmware for a Raspberry Pi Pico based Commodore disk drive, in the style
//! of sd2iec.  The drive speaks the IEC serial bus (or, built with the `ieee`
//! feature, the PET's IEEE-488 bus), JiffyDOS, the DolphinDOS parallel
//! protocol, and the many fastloader protocols games and utilities upload to
//! the drive.
//!
//! The crate splits in two:
//! - The drive itself - bus engines, fastloaders, buffers and error channel -
//!   which is plain `no_std` code, reaching the hardware only through the
//!   traits in [`bus`], and the filesystem only through the traits in
//!   [`fileops`].  This builds and tests on the host, against a simulated
//!   bus.
//! - The RP hardware layer (the `rp` feature, selected by `pico` or
//!   `pico2`), which provides GPIO backed buses, the LED, key and watchdog
//!   tasks, and runs the bus engine on core 1.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

#![cfg_attr(not(test), no_std)]

// Provide some feature guidance when compiling the firmware.
#[cfg(all(feature = "pico", feature = "pico2"))]
compile_error!("Features 'pico' and 'pico2' cannot be enabled simultaneously");
#[cfg(all(feature = "rp", not(any(feature = "pico", feature = "pico2"))))]
compile_error!("Either 'pico' or 'pico2' feature must be enabled with 'rp'");

// Declare all of this library's modules.
pub mod buffers;
pub mod bus;
pub mod config;
pub mod constants;
pub mod drive;
pub mod error;
pub mod fastloader;
pub mod fileops;
mod fmt;
pub mod keys;
pub mod protocol;
pub mod signals;
mod util;

#[cfg(feature = "rp")]
pub mod entry;
#[cfg(feature = "rp")]
mod infra;
#[cfg(feature = "rp")]
mod task;

#[cfg(test)]
mod test;

// Extra binary information that picotool can read.
#[cfg(feature = "rp")]
#[unsafe(link_section = ".bi_entries")]
#[used]
pub static PICOTOOL_ENTRIES: [embassy_rp::binary_info::EntryAddr; 4] = [
    embassy_rp::binary_info::rp_program_name!(c"pico2iec by piers.rocks"),
    embassy_rp::binary_info::rp_program_description!(
        c"An SD card based Commodore disk drive, speaking IEC or IEEE-488, JiffyDOS and many fastloader protocols."
    ),
    embassy_rp::binary_info::rp_cargo_version!(),
    embassy_rp::binary_info::rp_program_build_attribute!(),
];

// A note about Statics
//
// The drive's state is deliberately not static.  The bus engine owns the
// Drive, and with it the buffers, on core 1, and is handed everything it
// needs by reference - which is also what lets the test suite build as many
// drives as it likes.
//
// The few statics there are live in the module that creates them:
// - SIGNALS (entry) - atomics shared by the engine and the core 0 tasks.
// - WATCHDOG (infra::watchdog) - a StaticCell, as the tasks need a 'static
//   reference to it.
// - CORE1_STACK (task) - a ConstStaticCell, taken once when core 1 starts.
