//! Handles displaying the drive's status on the LEDs.
//!
//! The bus engine decides what the LEDs should show (see
//! [`LedState`](crate::signals::LedState)) and publishes it in the shared
//! signals.  This task turns that into LED levels, including the blinking.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

#[allow(unused_imports)]
use crate::fmt::{debug, error, info, trace, warn};
use embassy_rp::gpio::{Level, Output};
use embassy_time::{Duration, Instant, Timer};

use super::watchdog::{TaskId, WatchdogType};
use crate::constants::{STATUS_DISPLAY_BLINK_TIMER, STATUS_DISPLAY_TIMER, TASK_WATCHDOG_TIMER};
use crate::signals::Signals;

/// Status display management.
pub struct StatusDisplay {
    busy: Output<'static>,
    dirty: Output<'static>,

    /// Last time the blink phase changed.
    last_toggle: Instant,

    /// Current blink phase.
    blink_on: bool,
}

impl StatusDisplay {
    /// Both LEDs start on, until the first update.
    pub fn new(busy: Output<'static>, dirty: Output<'static>) -> Self {
        let mut display = Self {
            busy,
            dirty,
            last_toggle: Instant::now(),
            blink_on: true,
        };
        display.busy.set_high();
        display.dirty.set_high();
        display
    }

    /// Update the LEDs, returning how long until they next need updating.
    pub fn do_work(&mut self, signals: &Signals) -> Duration {
        let elapsed = Instant::now().duration_since(self.last_toggle);
        let next = if elapsed >= STATUS_DISPLAY_BLINK_TIMER {
            self.blink_on = !self.blink_on;
            self.last_toggle = Instant::now();
            STATUS_DISPLAY_BLINK_TIMER
        } else {
            STATUS_DISPLAY_BLINK_TIMER - elapsed
        };

        let (busy, dirty) = signals.leds().outputs(self.blink_on);
        self.busy.set_level(Level::from(busy));
        self.dirty.set_level(Level::from(dirty));

        next
    }
}

/// Runs the status display.
#[embassy_executor::task]
pub async fn status_task(
    mut display: StatusDisplay,
    signals: &'static Signals,
    watchdog: &'static WatchdogType,
) -> ! {
    let id = TaskId::Display;
    watchdog.register_task(&id, TASK_WATCHDOG_TIMER).await;

    loop {
        watchdog.feed(&id).await;

        // Wake for the next blink, or often enough to follow changes of
        // state
        let next_update = display.do_work(signals);
        Timer::after(Duration::min(next_update, STATUS_DISPLAY_TIMER)).await;
    }
}
