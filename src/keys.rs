//! Key and card detect debouncing.
//!
//! The inputs are sampled at 100Hz by the key task.  A key counts once it
//! has been down for [`KEY_DEBOUNCE_SAMPLES`] samples, and is reported when
//! it is let go, so that pressing NEXT and PREV together can be reported as
//! HOME instead.  The sleep key is reported as a long press as soon as it has
//! been held for [`KEY_LONG_PRESS_SAMPLES`], and as a short press on release
//! otherwise.
//!
//! This is plain logic, so it is tested on the host - `infra::keys` owns the
//! pins.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

#[allow(unused_imports)]
use crate::fmt::{debug, error, info, trace, warn};

use crate::constants::{KEY_DEBOUNCE_SAMPLES, KEY_LONG_PRESS_SAMPLES};
use crate::signals::{DiskState, Keys};

/// One sample of the physical inputs.  `true` means pressed, or for
/// `card_present`, a card in the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawInputs {
    pub next: bool,
    pub prev: bool,
    pub sleep: bool,
    pub card_present: bool,
}

/// What a sample produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanResult {
    pub keys: Keys,
    pub disk: Option<DiskState>,
}

/// Debounce state for the keys and card detect.
#[derive(Debug)]
pub struct KeyScanner {
    next: u8,
    prev: u8,
    sleep: u16,
    // Set once the current press of the key group has been reported
    both_seen: bool,
    long_sent: bool,
    card_present: bool,
    card_count: u8,
}

impl Default for KeyScanner {
    fn default() -> Self {
        Self::new(true)
    }
}

impl KeyScanner {
    /// `card_present` is the state of the card detect input at boot.
    pub const fn new(card_present: bool) -> Self {
        Self {
            next: 0,
            prev: 0,
            sleep: 0,
            both_seen: false,
            long_sent: false,
            card_present,
            card_count: 0,
        }
    }

    fn debounced(count: u8) -> bool {
        count >= KEY_DEBOUNCE_SAMPLES
    }

    /// Process one sample.
    pub fn sample(&mut self, raw: RawInputs) -> ScanResult {
        let mut keys = Keys::empty();

        let next_was = Self::debounced(self.next);
        let prev_was = Self::debounced(self.prev);
        self.next = if raw.next { self.next.saturating_add(1) } else { 0 };
        self.prev = if raw.prev { self.prev.saturating_add(1) } else { 0 };
        let next_down = Self::debounced(self.next);
        let prev_down = Self::debounced(self.prev);

        if next_down && prev_down {
            self.both_seen = true;
        }
        let released = (next_was && !next_down) || (prev_was && !prev_down);
        if released && !next_down && !prev_down {
            if self.both_seen {
                keys |= Keys::HOME;
            } else if next_was {
                keys |= Keys::NEXT;
            } else {
                keys |= Keys::PREV;
            }
            self.both_seen = false;
        }

        if raw.sleep {
            self.sleep = self.sleep.saturating_add(1);
            if self.sleep >= KEY_LONG_PRESS_SAMPLES && !self.long_sent {
                keys |= Keys::SLEEP_LONG;
                self.long_sent = true;
            }
        } else {
            if self.sleep >= u16::from(KEY_DEBOUNCE_SAMPLES) && !self.long_sent {
                keys |= Keys::SLEEP;
            }
            self.sleep = 0;
            self.long_sent = false;
        }

        ScanResult {
            keys,
            disk: self.sample_card(raw.card_present),
        }
    }

    fn sample_card(&mut self, present: bool) -> Option<DiskState> {
        if present == self.card_present {
            self.card_count = 0;
            return None;
        }

        self.card_count += 1;
        if self.card_count < KEY_DEBOUNCE_SAMPLES {
            return None;
        }

        self.card_count = 0;
        self.card_present = present;
        if present {
            debug!("Card inserted");
            Some(DiskState::Changed)
        } else {
            debug!("Card removed");
            Some(DiskState::Removed)
        }
    }
}
