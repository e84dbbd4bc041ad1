//! State shared between the bus engine and the rest of the firmware.
//!
//! On the hardware the bus engine runs on core 1 and the key scanning and
//! LED tasks run on core 0, so everything here is atomic.  Nothing else is
//! shared between the cores - in particular the buffer pool is owned by the
//! bus engine alone.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

use bitflags::bitflags;
use portable_atomic::{AtomicU8, AtomicU32, Ordering};

bitflags! {
    /// Key presses, latched by the key scanning task until consumed.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Keys: u8 {
        /// Next disk image.
        const NEXT = 0x01;
        /// Previous disk image.
        const PREV = 0x02;
        /// First disk image.
        const HOME = 0x04;
        /// Short press of the sleep key.
        const SLEEP = 0x08;
        /// Long press of the sleep key.
        const SLEEP_LONG = 0x10;
    }
}

impl Keys {
    /// Keys which change the disk.
    pub const DISK_CHANGE: Keys = Keys::NEXT.union(Keys::PREV).union(Keys::HOME);

    /// Keys which abort a transfer in progress.
    pub const ABORT: Keys = Keys::DISK_CHANGE
        .union(Keys::SLEEP)
        .union(Keys::SLEEP_LONG);
}

/// State of the storage medium, as seen by the card detect input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum DiskState {
    /// Medium present and in use.
    Ok = 0,
    /// Medium was changed, and needs re-initialising.
    Changed = 1,
    /// No medium present.
    Removed = 2,
}

impl From<u8> for DiskState {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::Ok,
            1 => Self::Changed,
            _ => Self::Removed,
        }
    }
}

bitflags! {
    /// What the status LEDs should show.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LedState: u8 {
        /// At least one user buffer is allocated.
        const BUSY = 0x01;
        /// At least one buffer holds unwritten data.
        const DIRTY = 0x02;
        /// The current DOS error is a real error - the LED blinks.
        const ERROR = 0x04;
        /// The drive is asleep.
        const SLEEP = 0x08;
    }
}

impl LedState {
    /// The levels of the busy and dirty LEDs, given the phase of the blink
    /// timer.  An error blinks the dirty LED, and while asleep the busy LED
    /// blinks on its own.
    pub fn outputs(self, blink_on: bool) -> (bool, bool) {
        if self.contains(Self::SLEEP) {
            (blink_on, false)
        } else if self.contains(Self::ERROR) {
            (self.contains(Self::BUSY), blink_on)
        } else {
            (self.contains(Self::BUSY), self.contains(Self::DIRTY))
        }
    }
}

/// The shared signals.
pub struct Signals {
    keys: AtomicU8,
    disk_state: AtomicU8,
    leds: AtomicU8,
    heartbeat: AtomicU32,
}

impl Default for Signals {
    fn default() -> Self {
        Self::new()
    }
}

impl Signals {
    pub const fn new() -> Self {
        Self {
            keys: AtomicU8::new(0),
            disk_state: AtomicU8::new(DiskState::Ok as u8),
            leds: AtomicU8::new(0),
            heartbeat: AtomicU32::new(0),
        }
    }

    /// Latch key presses.  Called by the key scanning task.
    pub fn press(&self, keys: Keys) {
        self.keys.fetch_or(keys.bits(), Ordering::AcqRel);
    }

    /// Pending key presses, without consuming them.
    pub fn pending_keys(&self) -> Keys {
        Keys::from_bits_truncate(self.keys.load(Ordering::Acquire))
    }

    /// Consume the given key presses, returning those which were pending.
    pub fn take_keys(&self, keys: Keys) -> Keys {
        let prev = self.keys.fetch_and(!keys.bits(), Ordering::AcqRel);
        Keys::from_bits_truncate(prev) & keys
    }

    /// Set the medium state.  Called by the card detect task, and by the
    /// bus engine once it has handled a change.
    pub fn set_disk_state(&self, state: DiskState) {
        self.disk_state.store(state as u8, Ordering::Release);
    }

    pub fn disk_state(&self) -> DiskState {
        DiskState::from(self.disk_state.load(Ordering::Acquire))
    }

    /// If the medium has changed, mark the change handled and return true.
    pub fn take_disk_changed(&self) -> bool {
        self.disk_state
            .compare_exchange(
                DiskState::Changed as u8,
                DiskState::Ok as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    pub fn set_leds(&self, leds: LedState) {
        self.leds.store(leds.bits(), Ordering::Release);
    }

    pub fn leds(&self) -> LedState {
        LedState::from_bits_truncate(self.leds.load(Ordering::Acquire))
    }

    /// Show the bus engine is still running.  Only the bus engine calls
    /// this, so a load and store is enough.
    pub fn beat(&self) {
        let beat = self.heartbeat.load(Ordering::Relaxed);
        self.heartbeat.store(beat.wrapping_add(1), Ordering::Relaxed);
    }

    pub fn heartbeat(&self) -> u32 {
        self.heartbeat.load(Ordering::Relaxed)
    }
}
