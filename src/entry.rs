//! The firmware's start of day, on core 0.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

#[allow(unused_imports)]
use crate::fmt::{debug, error, info, trace, warn};
use embassy_executor::Spawner;
use embassy_rp::gpio::Level;
use embassy_time::Timer;

use crate::config::DriveConfig;
use crate::infra::display::{StatusDisplay, status_task};
use crate::infra::gpio::{Gpio, PinConfig, PinUnavailable};
use crate::infra::keys::{KeyInputs, key_task};
use crate::infra::watchdog::{bus_watch_task, create_watchdog, watchdog_task};
use crate::signals::Signals;
use crate::task::{core1_spawn, spawn_or_reboot};
use crate::util::built::log_fw_info;

#[cfg(not(feature = "ieee"))]
use crate::infra::rp_bus::RpIecBus;
#[cfg(feature = "ieee")]
use crate::infra::rp_bus::RpIeeeBus;

// The state shared between the bus engine on core 1 and the tasks on core 0.
static SIGNALS: Signals = Signals::new();

// A missing pin is a bug in the pin configuration - there's nothing to be
// done but stop.
fn pins_or_panic<T>(result: Result<T, PinUnavailable>, what: &str) -> T {
    match result {
        Ok(value) => value,
        Err(PinUnavailable(pin)) => {
            error!("{}: pin {} unavailable", what, pin);
            panic!("Invalid pin configuration");
        }
    }
}

/// Sets up the hardware and spawns the firmware's tasks.  Called by the
/// binary's main().
pub async fn common_main(spawner: Spawner, bin_name: &'static str) -> ! {
    let p = embassy_rp::init(Default::default());
    #[cfg_attr(feature = "ieee", allow(unused_mut))]
    let mut config = DriveConfig::default();

    let mut gpio = Gpio::new(
        [
            p.PIN_0.into(),
            p.PIN_1.into(),
            p.PIN_2.into(),
            p.PIN_3.into(),
            p.PIN_4.into(),
            p.PIN_5.into(),
            p.PIN_6.into(),
            p.PIN_7.into(),
            p.PIN_8.into(),
            p.PIN_9.into(),
            p.PIN_10.into(),
            p.PIN_11.into(),
            p.PIN_12.into(),
            p.PIN_13.into(),
            p.PIN_14.into(),
            p.PIN_15.into(),
            p.PIN_16.into(),
            p.PIN_17.into(),
            p.PIN_18.into(),
            p.PIN_19.into(),
            p.PIN_20.into(),
            p.PIN_21.into(),
            p.PIN_22.into(),
            p.PIN_23.into(),
            p.PIN_24.into(),
            p.PIN_25.into(),
            p.PIN_26.into(),
            p.PIN_27.into(),
            p.PIN_28.into(),
            p.PIN_29.into(),
        ],
        PinConfig::default(),
    );
    let pins = gpio.config().clone();

    // The watchdog comes first, so it polices everything after
    let watchdog = create_watchdog(p.WATCHDOG);
    spawn_or_reboot(spawner.spawn(watchdog_task(watchdog)), "Watchdog");

    // LEDs and keys
    let display = StatusDisplay::new(
        pins_or_panic(gpio.take_output(pins.busy_led, Level::High), "Busy LED"),
        pins_or_panic(gpio.take_output(pins.dirty_led, Level::High), "Dirty LED"),
    );
    spawn_or_reboot(spawner.spawn(status_task(display, &SIGNALS, watchdog)), "Status display");

    let keys = pins_or_panic(KeyInputs::new(&mut gpio, &pins.keys), "Keys");
    spawn_or_reboot(spawner.spawn(key_task(keys, &SIGNALS, watchdog)), "Keys");

    // The bus
    #[cfg(not(feature = "ieee"))]
    let bus = {
        let bus = pins_or_panic(
            RpIecBus::new(&mut gpio, &pins.iec, pins.parallel.as_ref(), &SIGNALS),
            "IEC bus",
        );
        config.parallel_cable = bus.has_parallel();
        config.srq_available = true;
        bus
    };
    #[cfg(feature = "ieee")]
    let bus = pins_or_panic(
        RpIeeeBus::new(&mut gpio, &pins.ieee, config.ieee_drivers, &SIGNALS),
        "IEEE-488 bus",
    );

    log_fw_info(bin_name, &config);

    spawn_or_reboot(spawner.spawn(bus_watch_task(watchdog, &SIGNALS)), "Bus watch");
    core1_spawn(p.CORE1, bus, config, &SIGNALS);

    // Everything else happens in the tasks
    loop {
        Timer::after_secs(3600).await;
    }
}
