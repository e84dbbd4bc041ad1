//! This file implements the drive side of the Commodore IEC serial bus - the
//! state machine a 1541 runs to answer ATN, LISTEN and TALK.
//!
//! The engine is driven by [`IecEngine::step`], which performs one state's
//! worth of work and returns.  On the hardware [`IecEngine::run`] calls it
//! forever from core 1; tests call it against the simulated bus.
//!
//! ```text
//! Idle --ATN--> FoundAtn --> AtnActive --+--> ForMe ----> AtnActive (more bytes)
//!   ^                          ^         |             \-> AtnProcess
//!   |                          |         +--> NotForMe --> AtnFinish
//!   |                          |         \--> AtnFinish --> AtnProcess
//!   |                          |
//!   |                      FoundAtn <--ATN-- AtnProcess (LISTEN/TALK)
//!   |                                            |
//!   \------------------- Cleanup <---------------/
//! ```
//!
//! When the host asserts ATN in the middle of a transfer the byte routines
//! return [`BusError::Atn`] having already moved the engine to
//! [`BusState::FoundAtn`], so the next step picks up the new command.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

#[allow(unused_imports)]
use crate::fmt::{debug, error, info, trace, warn};

use super::channel::{
    IdleKeys, ListenTarget, dispatch_atn, end_command_cycle, idle_keys, next_talk_byte,
    process_command, talk_buffer, talk_byte_sent, wake_requested,
};
use super::read::iec_getc;
use super::write::{iec_putc, talk_turnaround};
use super::{BusError, BusState, DeviceState, IecData, IecFlags};
use crate::bus::{IecBusLines, IecHal};
use crate::drive::Drive;
use crate::fastloader::ll::dolphin::{dolphin_getc, dolphin_putc, dolphin_release};
use crate::fastloader::ll::jiffy::{jiffy_load_end, jiffy_receive, jiffy_send};
use crate::fastloader::{self, FastloaderError};
use crate::fileops::Storage;
use crate::util::time::iec::{ATN_RACE_WINDOW_US, JIFFY_TALK_DELAY_US};

/// Secondary address command byte for a JiffyDOS LOAD.
const JIFFY_LOAD_COMMAND: u8 = 0x61;

/// The IEC bus engine.
pub struct IecEngine {
    data: IecData,
}

impl Default for IecEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl IecEngine {
    pub const fn new() -> Self {
        Self {
            data: IecData::new(),
        }
    }

    pub fn data(&self) -> &IecData {
        &self.data
    }

    pub fn state(&self) -> BusState {
        self.data.bus_state
    }

    /// Release the bus and start again from [`BusState::Idle`].
    pub fn reset<B: IecHal + ?Sized>(&mut self, bus: &mut B) {
        bus.release_all();
        bus.set_atn_ack(true);
        self.data = IecData::new();
    }

    /// Run the engine forever.
    pub fn run<B, S>(&mut self, bus: &mut B, drive: &mut Drive, storage: &mut S) -> !
    where
        B: IecHal + ?Sized,
        S: Storage + ?Sized,
    {
        info!("IEC engine started, device {}", drive.device_address);
        self.reset(bus);
        loop {
            self.step(bus, drive, storage);
        }
    }

    /// Perform the work for the current state.
    pub fn step<B, S>(&mut self, bus: &mut B, drive: &mut Drive, storage: &mut S)
    where
        B: IecHal + ?Sized,
        S: Storage + ?Sized,
    {
        match self.data.bus_state {
            BusState::Sleep => self.sleep(bus, drive),
            BusState::Idle => self.idle(bus, drive, storage),
            BusState::FoundAtn => self.found_atn(bus),
            BusState::AtnActive => self.atn_active(bus, drive, storage),
            BusState::ForMe => {
                if bus.get_atn() {
                    self.data.set_state(BusState::AtnActive);
                } else {
                    self.data.set_state(BusState::AtnProcess);
                }
            }
            BusState::NotForMe => {
                // Stay off the bus until the host is done with ATN
                bus.set_atn_ack(false);
                bus.release_all();
                self.data.set_state(BusState::AtnFinish);
            }
            BusState::AtnFinish => self.atn_finish(bus, drive),
            BusState::AtnProcess => self.atn_process(bus, drive, storage),
            BusState::Cleanup => self.cleanup(bus, drive, storage),
        }
    }

    fn sleep<B: IecHal + ?Sized>(&mut self, bus: &mut B, drive: &mut Drive) {
        if wake_requested(drive) {
            bus.set_atn_ack(true);
            self.data.set_state(BusState::Idle);
        }
        bus.idle();
    }

    fn idle<B, S>(&mut self, bus: &mut B, drive: &mut Drive, storage: &mut S)
    where
        B: IecHal + ?Sized,
        S: Storage + ?Sized,
    {
        if bus.get_atn() {
            self.data.set_state(BusState::FoundAtn);
            return;
        }

        if idle_keys(drive, storage) == IdleKeys::Sleep {
            bus.set_atn_ack(false);
            bus.release_all();
            self.data.set_state(BusState::Sleep);
            return;
        }

        bus.idle();
    }

    fn found_atn<B: IecHal + ?Sized>(&mut self, bus: &mut B) {
        bus.set_data();
        bus.release_clock();
        self.data.flags.remove(
            IecFlags::EOI_RECVD
                | IecFlags::JIFFY_ACTIVE
                | IecFlags::JIFFY_LOAD
                | IecFlags::DOLPHIN_ACTIVE,
        );
        self.data.device_state = DeviceState::Idle;

        // The host pulls CLOCK shortly after ATN.  Give it a while, so the
        // first command byte's CLOCK release isn't mistaken for the one
        // before ATN.
        let timeout = bus.start_timeout(ATN_RACE_WINDOW_US);
        loop {
            let lines = bus.read_raw();
            if lines.contains(IecBusLines::ATN) {
                debug!("ATN released before any command");
                self.data.set_state(BusState::Cleanup);
                return;
            }
            if !lines.contains(IecBusLines::CLOCK) || bus.has_timed_out(&timeout) {
                break;
            }
        }
        self.data.set_state(BusState::AtnActive);
    }

    fn atn_active<B, S>(&mut self, bus: &mut B, drive: &mut Drive, storage: &mut S)
    where
        B: IecHal + ?Sized,
        S: Storage + ?Sized,
    {
        // On error the byte routine has already picked the next state
        let Ok(cmd) = iec_getc(
            bus,
            &mut self.data,
            drive.device_address,
            drive.config.jiffy_enabled,
        ) else {
            return;
        };
        debug!("ATN command {:x}", cmd);

        let next = dispatch_atn(&mut self.data, cmd, drive, storage);
        if next == BusState::AtnFinish
            && cmd == JIFFY_LOAD_COMMAND
            && self.data.device_state == DeviceState::Talk
            && self.data.flags.contains(IecFlags::JIFFY_ACTIVE)
        {
            debug!("JiffyDOS LOAD requested");
            self.data.flags.insert(IecFlags::JIFFY_LOAD);
            self.data.secondary_address = 0;
        }
        self.data.set_state(next);
    }

    fn atn_finish<B: IecHal + ?Sized>(&mut self, bus: &mut B, drive: &Drive) {
        while bus.get_atn() {}

        // The host strobes the parallel port during ATN if it speaks
        // DolphinDOS
        if bus.parallel_take_rxflag()
            && drive.config.parallel_cable
            && self.data.device_state != DeviceState::Idle
        {
            debug!("DolphinDOS parallel transfer");
            self.data.flags.insert(IecFlags::DOLPHIN_ACTIVE);
        }
        self.data.set_state(BusState::AtnProcess);
    }

    fn atn_process<B, S>(&mut self, bus: &mut B, drive: &mut Drive, storage: &mut S)
    where
        B: IecHal + ?Sized,
        S: Storage + ?Sized,
    {
        bus.set_atn_ack(true);

        let result = match self.data.device_state {
            DeviceState::Listen => self.listen_handler(bus, drive, storage),
            DeviceState::Talk => {
                talk_turnaround(bus);
                self.talk_handler(bus, drive, storage)
            }
            DeviceState::Idle => Ok(()),
        };

        if self.data.flags.contains(IecFlags::DOLPHIN_ACTIVE) {
            dolphin_release(bus);
        }

        match result {
            // Already in FoundAtn
            Err(BusError::Atn) => {}
            Err(e) => {
                debug!("Transfer ended: {:?}", e);
                self.data.set_state(BusState::Cleanup);
            }
            Ok(()) => self.data.set_state(BusState::Cleanup),
        }
    }

    fn cleanup<B, S>(&mut self, bus: &mut B, drive: &mut Drive, storage: &mut S)
    where
        B: IecHal + ?Sized,
        S: Storage + ?Sized,
    {
        bus.release_all();
        process_command(&mut self.data, drive, storage);
        if let Some(id) = drive.take_fastloader() {
            fastloader::run(id, bus, drive, storage);
        }
        end_command_cycle(drive, storage);
        self.data.set_state(BusState::Idle);
    }

    // A JiffyDOS or DolphinDOS byte routine failed.  ATN means the host
    // wants the bus.
    fn fastloader_error(&mut self, e: FastloaderError) -> BusError {
        if e == FastloaderError::Atn {
            self.data.set_state(BusState::FoundAtn);
        }
        e.into()
    }

    fn receive_byte<B: IecHal + ?Sized>(&mut self, bus: &mut B, drive: &Drive) -> Result<u8, BusError> {
        self.data.flags.remove(IecFlags::EOI_RECVD);

        let received = if self.data.flags.contains(IecFlags::JIFFY_ACTIVE) {
            jiffy_receive(bus)
        } else if self.data.flags.contains(IecFlags::DOLPHIN_ACTIVE) {
            dolphin_getc(bus)
        } else {
            return iec_getc(
                bus,
                &mut self.data,
                drive.device_address,
                drive.config.jiffy_enabled,
            );
        };

        match received {
            Ok((byte, eoi)) => {
                if eoi {
                    self.data.flags.insert(IecFlags::EOI_RECVD);
                }
                Ok(byte)
            }
            Err(e) => Err(self.fastloader_error(e)),
        }
    }

    fn send_byte<B: IecHal + ?Sized>(&mut self, bus: &mut B, vc20: bool, byte: u8, eoi: bool) -> Result<(), BusError> {
        let result = if self.data.flags.contains(IecFlags::JIFFY_ACTIVE) {
            jiffy_send(bus, byte, eoi, false)
        } else if self.data.flags.contains(IecFlags::DOLPHIN_ACTIVE) && !eoi {
            // The last byte goes serially, so it can carry EOI
            dolphin_putc(bus, byte)
        } else {
            return iec_putc(bus, &mut self.data, byte, eoi, vc20);
        };
        result.map_err(|e| self.fastloader_error(e))
    }

    /// Receive a filename or command, or data for an open file, until ATN.
    fn listen_handler<B, S>(&mut self, bus: &mut B, drive: &mut Drive, storage: &mut S) -> Result<(), BusError>
    where
        B: IecHal + ?Sized,
        S: Storage + ?Sized,
    {
        let target = ListenTarget::new(&self.data, drive);
        loop {
            let byte = self.receive_byte(bus, drive)?;
            target.store(&mut self.data, byte, drive, storage);
        }
    }

    /// Send the buffer open on the channel until EOI or ATN.
    fn talk_handler<B, S>(&mut self, bus: &mut B, drive: &mut Drive, storage: &mut S) -> Result<(), BusError>
    where
        B: IecHal + ?Sized,
        S: Storage + ?Sized,
    {
        let Some(idx) = talk_buffer(&self.data, drive) else {
            return Ok(());
        };

        if self.data.flags.contains(IecFlags::JIFFY_LOAD) {
            return self.jiffy_load(bus, drive, storage, idx);
        }

        if self.data.flags.contains(IecFlags::JIFFY_ACTIVE) {
            bus.delay_us(JIFFY_TALK_DELAY_US);
        }

        let vc20 = drive.config.vc20_mode;
        while let Some(next) = next_talk_byte(drive, storage, idx) {
            self.send_byte(bus, vc20, next.byte, next.eoi)?;
            if !talk_byte_sent(drive, storage, idx, next) {
                break;
            }
        }
        Ok(())
    }

    // JiffyDOS LOAD: each sector goes without per byte acknowledges, with
    // CLOCK held while the next is read.
    fn jiffy_load<B, S>(&mut self, bus: &mut B, drive: &mut Drive, storage: &mut S, idx: usize) -> Result<(), BusError>
    where
        B: IecHal + ?Sized,
        S: Storage + ?Sized,
    {
        debug!("JiffyDOS LOAD of channel {}", self.data.secondary_address);
        loop {
            let buf = drive.buffer(idx);
            let (start, end, sendeoi) = (buf.position as usize, buf.lastused as usize, buf.sendeoi);
            for pos in start..=end {
                let byte = drive.buffer(idx).data[pos];
                jiffy_send(bus, byte, sendeoi && pos == end, true)
                    .map_err(|e| self.fastloader_error(e))?;
            }
            drive.buffer_mut(idx).position = end as u8;

            if sendeoi {
                break;
            }

            bus.set_clock();
            let refilled = drive.refill(idx, storage);
            bus.release_clock();
            if refilled.is_err() {
                break;
            }
        }
        jiffy_load_end(bus).map_err(|e| self.fastloader_error(e))
    }
}
