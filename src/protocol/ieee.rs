//! This file implements the drive side of the IEEE-488 bus, for PET style
//! hardware.
//!
//! The command handling is the same as for the IEC bus - only the byte
//! transfer differs.  Each byte goes over the 8 bit data bus with the three
//! wire handshake:
//! - The listener releases NRFD when it is ready for data.
//! - The talker places the byte on the bus (asserting EOI if it is the last)
//!   and asserts DAV.
//! - The listener reads it, asserts NRFD, and releases NDAC to say it has
//!   the byte.
//! - The talker releases DAV, and the listener asserts NDAC again.
//!
//! Unlike the IEC bus every handshake wait has a timeout, and IFC resets the
//! engine at any point.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

#[allow(unused_imports)]
use crate::fmt::{debug, error, info, trace, warn};

use super::channel::{
    IdleKeys, ListenTarget, dispatch_atn, end_command_cycle, idle_keys, next_talk_byte,
    process_command, talk_buffer, talk_byte_sent, wake_requested,
};
use super::{BusError, BusState, DeviceState, IecData, IecFlags};
use crate::bus::{IeeeBusLines, IeeeHal, IeeeLine};
use crate::drive::Drive;
use crate::fileops::Storage;
use crate::util::time::ieee::{DATA_SETTLE_US, IEEE_TIMEOUT_MS};

// Check the bus for IFC or a change of ATN, as the IEC engine does for ATN.
fn check_bus(data: &mut IecData, lines: IeeeBusLines) -> Result<(), BusError> {
    if !lines.contains(IeeeBusLines::IFC) {
        data.set_state(BusState::Idle);
        return Err(BusError::InterfaceClear);
    }
    let atn_high = lines.contains(IeeeBusLines::ATN);
    if data.bus_state == BusState::AtnActive {
        if atn_high {
            data.set_state(BusState::AtnProcess);
            return Err(BusError::Atn);
        }
    } else if !atn_high {
        data.set_state(BusState::FoundAtn);
        return Err(BusError::Atn);
    }
    Ok(())
}

/// The IEEE-488 bus engine.
pub struct IeeeEngine {
    data: IecData,
}

impl Default for IeeeEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl IeeeEngine {
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
    pub fn reset<B: IeeeHal + ?Sized>(&mut self, bus: &mut B) {
        bus.enter_listen();
        for line in [IeeeLine::Nrfd, IeeeLine::Ndac, IeeeLine::Srq] {
            bus.release(line);
        }
        self.data = IecData::new();
    }

    /// Run the engine forever.
    pub fn run<B, S>(&mut self, bus: &mut B, drive: &mut Drive, storage: &mut S) -> !
    where
        B: IeeeHal + ?Sized,
        S: Storage + ?Sized,
    {
        info!("IEEE-488 engine started, device {}", drive.device_address);
        self.reset(bus);
        loop {
            self.step(bus, drive, storage);
        }
    }

    /// Perform the work for the current state.
    pub fn step<B, S>(&mut self, bus: &mut B, drive: &mut Drive, storage: &mut S)
    where
        B: IeeeHal + ?Sized,
        S: Storage + ?Sized,
    {
        match self.data.bus_state {
            BusState::Sleep => {
                if wake_requested(drive) {
                    self.data.set_state(BusState::Idle);
                }
                bus.idle();
            }
            BusState::Idle => self.idle(bus, drive, storage),
            BusState::FoundAtn => {
                // Every device takes part in the handshake under ATN
                bus.enter_listen();
                bus.pull(IeeeLine::Ndac);
                bus.pull(IeeeLine::Nrfd);
                self.data.flags.remove(IecFlags::EOI_RECVD);
                self.data.device_state = DeviceState::Idle;
                self.data.set_state(BusState::AtnActive);
            }
            BusState::AtnActive => match self.getc(bus) {
                Ok(cmd) => {
                    debug!("ATN command {:x}", cmd);
                    let next = dispatch_atn(&mut self.data, cmd, drive, storage);
                    self.data.set_state(next);
                }
                Err(e) => self.transfer_error(e, bus, drive),
            },
            BusState::ForMe => {
                if bus.is_asserted(IeeeLine::Atn) {
                    self.data.set_state(BusState::AtnActive);
                } else {
                    self.data.set_state(BusState::AtnProcess);
                }
            }
            BusState::NotForMe => {
                bus.release(IeeeLine::Nrfd);
                bus.release(IeeeLine::Ndac);
                self.data.set_state(BusState::AtnFinish);
            }
            BusState::AtnFinish => loop {
                let lines = bus.read_lines();
                if !lines.contains(IeeeBusLines::IFC) {
                    self.interface_clear(bus, drive);
                    break;
                }
                if lines.contains(IeeeBusLines::ATN) {
                    self.data.set_state(BusState::AtnProcess);
                    break;
                }
            },
            BusState::AtnProcess => self.atn_process(bus, drive, storage),
            BusState::Cleanup => {
                bus.enter_listen();
                bus.release(IeeeLine::Nrfd);
                bus.release(IeeeLine::Ndac);
                process_command(&mut self.data, drive, storage);
                end_command_cycle(drive, storage);
                self.data.set_state(BusState::Idle);
            }
        }
    }

    fn idle<B, S>(&mut self, bus: &mut B, drive: &mut Drive, storage: &mut S)
    where
        B: IeeeHal + ?Sized,
        S: Storage + ?Sized,
    {
        let lines = bus.read_lines();
        if !lines.contains(IeeeBusLines::IFC) {
            self.interface_clear(bus, drive);
            return;
        }
        if !lines.contains(IeeeBusLines::ATN) {
            self.data.set_state(BusState::FoundAtn);
            return;
        }

        if idle_keys(drive, storage) == IdleKeys::Sleep {
            self.reset(bus);
            self.data.set_state(BusState::Sleep);
            return;
        }

        bus.idle();
    }

    fn interface_clear<B: IeeeHal + ?Sized>(&mut self, bus: &mut B, drive: &mut Drive) {
        if self.data.bus_state != BusState::Idle || !drive.command.is_empty() {
            debug!("IFC");
        }
        self.reset(bus);
        drive.command.clear();
    }

    // Work out the next state after a failed transfer.
    fn transfer_error<B: IeeeHal + ?Sized>(&mut self, e: BusError, bus: &mut B, drive: &mut Drive) {
        match e {
            // check_bus() has picked the state
            BusError::Atn => {}
            BusError::InterfaceClear => self.interface_clear(bus, drive),
            _ => {
                debug!("Transfer ended: {:?}", e);
                self.data.set_state(BusState::Cleanup);
            }
        }
    }

    fn atn_process<B, S>(&mut self, bus: &mut B, drive: &mut Drive, storage: &mut S)
    where
        B: IeeeHal + ?Sized,
        S: Storage + ?Sized,
    {
        let result = match self.data.device_state {
            DeviceState::Listen => self.listen_handler(bus, drive, storage),
            DeviceState::Talk => {
                bus.enter_talk();
                let result = self.talk_handler(bus, drive, storage);
                bus.enter_listen();
                result
            }
            DeviceState::Idle => Ok(()),
        };

        match result {
            Ok(()) => self.data.set_state(BusState::Cleanup),
            Err(e) => self.transfer_error(e, bus, drive),
        }
    }

    // Sample the control lines until `line` reaches the requested level.
    fn wait_line<B: IeeeHal + ?Sized>(
        &mut self,
        bus: &mut B,
        line: IeeeBusLines,
        high: bool,
    ) -> Result<IeeeBusLines, BusError> {
        let timeout = bus.start_timeout(IEEE_TIMEOUT_MS * 1000);
        loop {
            let lines = bus.read_lines();
            check_bus(&mut self.data, lines)?;
            if lines.contains(line) == high {
                return Ok(lines);
            }
            if bus.has_timed_out(&timeout) {
                debug!("Handshake timeout waiting for {:x}", line.bits());
                return Err(BusError::Timeout);
            }
        }
    }

    /// Receive a byte as a listener.  NDAC is asserted on entry and exit.
    fn getc<B: IeeeHal + ?Sized>(&mut self, bus: &mut B) -> Result<u8, BusError> {
        self.data.flags.remove(IecFlags::EOI_RECVD);

        // Ready for data
        bus.release(IeeeLine::Nrfd);
        let lines = self.wait_line(bus, IeeeBusLines::DAV, false)?;

        let byte = bus.read_data();
        if !lines.contains(IeeeBusLines::EOI) {
            trace!("EOI");
            self.data.flags.insert(IecFlags::EOI_RECVD);
        }

        // Data accepted
        bus.pull(IeeeLine::Nrfd);
        bus.release(IeeeLine::Ndac);
        self.wait_line(bus, IeeeBusLines::DAV, true)?;
        bus.pull(IeeeLine::Ndac);

        trace!("Received {:x}", byte);
        Ok(byte)
    }

    /// Send a byte as a talker, asserting EOI with it if `eoi` is set.
    fn putc<B: IeeeHal + ?Sized>(&mut self, bus: &mut B, byte: u8, eoi: bool) -> Result<(), BusError> {
        // Listeners ready
        self.wait_line(bus, IeeeBusLines::NRFD, true)?;

        bus.write_data(byte);
        if eoi {
            bus.pull(IeeeLine::Eoi);
        }
        bus.delay_us(DATA_SETTLE_US);
        bus.pull(IeeeLine::Dav);

        let accepted = self.wait_line(bus, IeeeBusLines::NDAC, true);
        bus.release(IeeeLine::Dav);
        bus.release(IeeeLine::Eoi);
        accepted?;

        trace!("Sent {:x}", byte);
        Ok(())
    }

    fn listen_handler<B, S>(&mut self, bus: &mut B, drive: &mut Drive, storage: &mut S) -> Result<(), BusError>
    where
        B: IeeeHal + ?Sized,
        S: Storage + ?Sized,
    {
        let target = ListenTarget::new(&self.data, drive);
        loop {
            let byte = self.getc(bus)?;
            target.store(&mut self.data, byte, drive, storage);
        }
    }

    fn talk_handler<B, S>(&mut self, bus: &mut B, drive: &mut Drive, storage: &mut S) -> Result<(), BusError>
    where
        B: IeeeHal + ?Sized,
        S: Storage + ?Sized,
    {
        let Some(idx) = talk_buffer(&self.data, drive) else {
            return Ok(());
        };
        while let Some(next) = next_talk_byte(drive, storage, idx) {
            self.putc(bus, next.byte, next.eoi)?;
            if !talk_byte_sent(drive, storage, idx, next) {
                break;
            }
        }
        Ok(())
    }
}
