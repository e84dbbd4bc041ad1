//! Implements task handling support, including dual core support.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

#[allow(unused_imports)]
use crate::fmt::{debug, error, info, trace, warn};
use embassy_rp::multicore::{Stack, spawn_core1 as rp_spawn_core1};
use embassy_rp::peripherals::CORE1;
use static_cell::ConstStaticCell;

use crate::config::DriveConfig;
use crate::constants::CORE1_STACK_SIZE;
use crate::drive::Drive;
use crate::fileops::NoMedium;
use crate::signals::Signals;

#[cfg(feature = "ieee")]
use crate::infra::rp_bus::RpIeeeBus as EngineBus;
#[cfg(feature = "ieee")]
use crate::protocol::ieee::IeeeEngine as Engine;
#[cfg(not(feature = "ieee"))]
use crate::infra::rp_bus::RpIecBus as EngineBus;
#[cfg(not(feature = "ieee"))]
use crate::protocol::iec::IecEngine as Engine;

// Threading and tasks model
//
// On the Pico we have 2 cores available - 0 and 1.
//
// Core 0 is the main core, and is where the main() function runs.  It runs
// the embassy executor, with everything which isn't the bus:
// - the status LED task
// - the key and card detect task
// - the watchdog task, and the task which watches the bus engine's heartbeat
//
// Core 1 runs the bus engine, and nothing else.  The bus protocols are
// strictly synchronous - every wait is a busy-wait on the bus lines, with
// microsecond timing - so the engine doesn't run under an executor at all.
// It owns the drive state and buffers outright, and talks to core 0 only
// through the atomics in Signals.

// A stack for core 1.  We will take it and use it mutably in core1_spawn.
static CORE1_STACK: ConstStaticCell<Stack<CORE1_STACK_SIZE>> = ConstStaticCell::new(Stack::new());

/// Start the bus engine on core 1.
pub fn core1_spawn(p_core1: CORE1, bus: EngineBus, config: DriveConfig, signals: &'static Signals) {
    rp_spawn_core1(p_core1, CORE1_STACK.take(), move || core1_main(bus, config, signals));
}

// Core 1's main function.
fn core1_main(mut bus: EngineBus, config: DriveConfig, signals: &'static Signals) -> ! {
    let core: u32 = embassy_rp::pac::SIO.cpuid().read();
    info!("Core{}: Bus engine starting", core);

    let mut drive = Drive::new(config, signals);
    let mut storage = NoMedium;
    Engine::new().run(&mut bus, &mut drive, &mut storage)
}

/// Method to spawn tasks on core 0.
///
/// Using the Spawner object to spawn can fail, because too many instances of
/// that task are already running.  By default only 1 is allowed at once, but
/// is configurable with e.g. #[embassy_executor::task(pool_size = 4).
///
/// We handle that by rebooting - but it shouldn't happen if tasks are only
/// spawned at start of day.
///
/// Example:
/// ```ignore
/// spawn_or_reboot(spawner.spawn(my_task()), "my_task");
/// ```
pub fn spawn_or_reboot<T, E: defmt::Format>(spawn_result: Result<T, E>, task_name: &str) {
    match spawn_result {
        Ok(_) => debug!("Spawned task {}", task_name),
        Err(e) => {
            error!("Failed to spawn task: {}, error: {}", task_name, e);
            cortex_m::peripheral::SCB::sys_reset();
        }
    }
}
