//! Samples the keys and card detect switch at 100Hz.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

#[allow(unused_imports)]
use crate::fmt::{debug, error, info, trace, warn};
use embassy_rp::gpio::{Input, Pull};
use embassy_time::{Duration, Ticker};

use super::gpio::{Gpio, KeyPinConfig, PinUnavailable};
use super::watchdog::{TaskId, WatchdogType};
use crate::constants::{KEY_SAMPLE_INTERVAL_MS, TASK_WATCHDOG_TIMER};
use crate::keys::{KeyScanner, RawInputs};
use crate::signals::{DiskState, Signals};

/// The key inputs.  All active low.
pub struct KeyInputs {
    next: Input<'static>,
    prev: Input<'static>,
    sleep: Input<'static>,
    card_detect: Input<'static>,
}

impl KeyInputs {
    pub fn new(gpio: &mut Gpio, pins: &KeyPinConfig) -> Result<Self, PinUnavailable> {
        Ok(Self {
            next: gpio.take_input(pins.next, Pull::Up)?,
            prev: gpio.take_input(pins.prev, Pull::Up)?,
            sleep: gpio.take_input(pins.sleep, Pull::Up)?,
            card_detect: gpio.take_input(pins.card_detect, Pull::Up)?,
        })
    }

    fn read(&self) -> RawInputs {
        RawInputs {
            next: self.next.is_low(),
            prev: self.prev.is_low(),
            sleep: self.sleep.is_low(),
            card_present: self.card_detect.is_low(),
        }
    }
}

/// Runs the key scanner, publishing key presses and medium changes for the
/// bus engine.
#[embassy_executor::task]
pub async fn key_task(
    inputs: KeyInputs,
    signals: &'static Signals,
    watchdog: &'static WatchdogType,
) -> ! {
    let id = TaskId::Keys;
    watchdog.register_task(&id, TASK_WATCHDOG_TIMER).await;

    let first = inputs.read();
    if !first.card_present {
        info!("No card present");
        signals.set_disk_state(DiskState::Removed);
    }
    let mut scanner = KeyScanner::new(first.card_present);

    let mut ticker = Ticker::every(Duration::from_millis(KEY_SAMPLE_INTERVAL_MS));
    loop {
        ticker.next().await;
        watchdog.feed(&id).await;

        let result = scanner.sample(inputs.read());
        if !result.keys.is_empty() {
            debug!("Keys {:x}", result.keys.bits());
            signals.press(result.keys);
        }
        if let Some(state) = result.disk {
            signals.set_disk_state(state);
        }
    }
}
