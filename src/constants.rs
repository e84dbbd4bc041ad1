//! This module contains constants for pico2iec.
//!
//! Protocol timing constants live in [`crate::util::time`].  This file holds
//! sizes and limits which several modules need to agree on.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

use static_assertions::const_assert;

//
// Buffers
//

/// Size of the data area of a single buffer - one CBM disk sector.
pub const BUFFER_SIZE: usize = 256;

/// Number of general purpose buffers available to channels and fastloaders.
pub const BUFFER_COUNT: usize = 6;

/// Index of the error channel buffer in the buffer pool.  This buffer is
/// always allocated, and always bound to secondary address 15.
pub const ERROR_BUFFER: usize = BUFFER_COUNT;

/// Total number of buffers in the pool, including the error channel buffer.
pub const TOTAL_BUFFERS: usize = BUFFER_COUNT + 1;

/// Size of the buffer into which filenames and DOS commands are received.
pub const COMMAND_BUFFER_SIZE: usize = 120;

/// Secondary address of the command/error channel.
pub const ERROR_CHANNEL: u8 = 15;

/// Secondary address used for buffers which belong to the firmware rather
/// than a channel.
pub const BUFFER_SEC_SYSTEM: u8 = 100;

/// Secondary address used by members of a linked (large) buffer which are
/// not currently the active member.
pub const BUFFER_SEC_CHAIN: u8 = 101;

/// Number of data bytes in a CBM file sector, after the two link bytes.
pub const SECTOR_PAYLOAD: usize = BUFFER_SIZE - 2;

const_assert!(BUFFER_COUNT >= 2);
const_assert!(TOTAL_BUFFERS <= 16);
const_assert!(COMMAND_BUFFER_SIZE >= 42);

//
// Device addressing
//

/// Default device address on the bus.
pub const DEFAULT_DEVICE_ADDRESS: u8 = 8;

/// Lowest device address a drive may use.
pub const MIN_DEVICE_ADDRESS: u8 = 4;

/// Highest device address a drive may use.
pub const MAX_DEVICE_ADDRESS: u8 = 30;

const_assert!(DEFAULT_DEVICE_ADDRESS >= MIN_DEVICE_ADDRESS);
const_assert!(DEFAULT_DEVICE_ADDRESS <= MAX_DEVICE_ADDRESS);

//
// Key handling
//

/// How often the key/card detect task samples the physical inputs, in ms.
/// Gives the 100Hz system tick.
pub const KEY_SAMPLE_INTERVAL_MS: u64 = 10;

/// Number of consecutive samples a key must be down to count as pressed.
pub const KEY_DEBOUNCE_SAMPLES: u8 = 3;

/// Number of samples the sleep key must be held for a long press.
pub const KEY_LONG_PRESS_SAMPLES: u16 = 200;

//
// Watchdog and task timers (hardware builds only)
//

#[cfg(feature = "rp")]
pub use rp::*;

#[cfg(feature = "rp")]
mod rp {
    use embassy_time::Duration;

    /// Watchdog hardware timeout - the device is reset if the watchdog task
    /// doesn't feed the hardware watchdog this often.
    pub const WATCHDOG_HW_TIMEOUT: Duration = Duration::from_secs(5);

    /// How often the watchdog task checks all policed tasks have been fed.
    pub const WATCHDOG_CHECK_INTERVAL: Duration = Duration::from_millis(1000);

    /// How often core 0 checks the bus engine's heartbeat.
    pub const BUS_WATCHDOG_FEED_INTERVAL: Duration = Duration::from_millis(100);

    /// How long the bus engine may go without a heartbeat before the device
    /// is reset.
    pub const BUS_ENGINE_WATCHDOG_TIMER: Duration = Duration::from_millis(2000);

    /// How long the status display and key tasks may go without feeding the
    /// watchdog.
    pub const TASK_WATCHDOG_TIMER: Duration = Duration::from_millis(1000);

    /// How long the status LED spends on and off when blinking.
    pub const STATUS_DISPLAY_BLINK_TIMER: Duration = Duration::from_millis(150);

    /// How long the status display task pauses between doing work.
    pub const STATUS_DISPLAY_TIMER: Duration = Duration::from_millis(50);

    /// Core 1 stack size.  The bus engine runs entirely on core 1.
    pub const CORE1_STACK_SIZE: usize = 16384;
}
