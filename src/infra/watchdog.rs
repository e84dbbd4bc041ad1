//! Contains a multi-task capable watchdog, that ensures all expected tasks
//! are running, and resets the device if not.
//!
//! The bus engine runs on core 1 outside of any executor, so it can't feed
//! the watchdog itself.  Instead it advances a heartbeat in the shared
//! signals, and a task on core 0 feeds the watchdog on its behalf for as
//! long as the heartbeat keeps moving.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

#[allow(unused_imports)]
use crate::fmt::{debug, error, info, trace, warn};
use embassy_rp::peripherals::WATCHDOG as p_WATCHDOG;
use embassy_time::Timer;
use static_cell::StaticCell;
use task_watchdog::embassy_rp::{WatchdogRunner, watchdog_run};
use task_watchdog::{Id, WatchdogConfig};

use crate::constants::{
    BUS_ENGINE_WATCHDOG_TIMER, BUS_WATCHDOG_FEED_INTERVAL, WATCHDOG_CHECK_INTERVAL,
    WATCHDOG_HW_TIMEOUT,
};
use crate::signals::Signals;

// Create a type alias for the WatchdogRunner to make it easier to use.
pub type WatchdogType = WatchdogRunner<TaskId, NUM_TASK_IDS>;

// We use the WATCHDOG static to store the Watchdog object, so we can feed it
// from all of our tasks.
static WATCHDOG: StaticCell<WatchdogType> = StaticCell::new();

/// The tasks which are policed by the watchdog.
#[derive(Clone, Copy, PartialEq, Eq, defmt::Format)]
pub enum TaskId {
    /// The bus engine on core 1, via its heartbeat.
    BusEngine = 0,

    /// The status LED task.
    Display,

    /// The key and card detect task.
    Keys,

    /// The is the number of tasks which are policed by the watchdog.
    Num,
}
impl Id for TaskId {}
const NUM_TASK_IDS: usize = TaskId::Num as usize;

/// A helper function to create the watchdog.
pub fn create_watchdog(p_watchdog: p_WATCHDOG) -> &'static WatchdogType {
    let config = WatchdogConfig {
        hardware_timeout: WATCHDOG_HW_TIMEOUT,
        check_interval: WATCHDOG_CHECK_INTERVAL,
    };
    WATCHDOG.init(WatchdogRunner::new(p_watchdog, config))
}

/// A task to run the watchdog.
#[embassy_executor::task]
pub async fn watchdog_task(watchdog: &'static WatchdogType) -> ! {
    watchdog_run(watchdog.create_task()).await
}

/// Feeds the watchdog for the bus engine, as long as its heartbeat advances.
#[embassy_executor::task]
pub async fn bus_watch_task(watchdog: &'static WatchdogType, signals: &'static Signals) -> ! {
    let id = TaskId::BusEngine;
    watchdog.register_task(&id, BUS_ENGINE_WATCHDOG_TIMER).await;

    let mut last = signals.heartbeat();
    loop {
        Timer::after(BUS_WATCHDOG_FEED_INTERVAL).await;
        let beat = signals.heartbeat();
        if beat != last {
            watchdog.feed(&id).await;
            last = beat;
        }
    }
}
