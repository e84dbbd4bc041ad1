//! This module implements the drive side of the standard bus protocols.
//!
//! - [`iec`] - the IEC serial bus state machine, including JiffyDOS and
//!   DolphinDOS parallel transfers, which hands over to a fastloader when the
//!   command parser recognises one.
//! - [`ieee`] - the IEEE-488 equivalent.
//!
//! Both share the ATN command decoding in this module, and the channel
//! handling in `channel`.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

mod channel;
pub mod iec;
pub mod ieee;
mod read;
mod write;

use bitflags::bitflags;

#[allow(unused_imports)]
use crate::fmt::{debug, error, info, trace, warn};

use crate::fastloader::FastloaderError;

/// Position of the bus state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusState {
    /// Waiting for ATN, handling key presses.
    Idle,
    /// ATN has just been asserted.
    FoundAtn,
    /// Receiving command bytes under ATN.
    AtnActive,
    /// A command byte addressed us.
    ForMe,
    /// A command byte addressed another device.
    NotForMe,
    /// Waiting for ATN to be released.
    AtnFinish,
    /// ATN has been released - LISTEN or TALK as addressed.
    AtnProcess,
    /// The transaction is over - process any received command.
    Cleanup,
    /// Ignoring the bus until woken by the sleep key.
    Sleep,
}

/// What this device has been addressed as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeviceState {
    Idle,
    Listen,
    Talk,
}

bitflags! {
    /// Per transaction flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct IecFlags: u8 {
        /// The last byte received carried EOI.
        const EOI_RECVD = 0x01;
        /// A complete filename or command has been received.
        const COMMAND_RECVD = 0x02;
        /// The host answered the JiffyDOS probe - transfers use JiffyDOS.
        const JIFFY_ACTIVE = 0x04;
        /// The host asked for a JiffyDOS LOAD (secondary 0x61).
        const JIFFY_LOAD = 0x08;
        /// The host strobed the parallel cable during ATN - transfers use
        /// DolphinDOS parallel.
        const DOLPHIN_ACTIVE = 0x10;
    }
}

/// The bus engine's state.  Reset to [`BusState::Idle`] at the end of every
/// command cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IecData {
    pub bus_state: BusState,
    pub device_state: DeviceState,

    /// The channel of the last secondary address command.
    pub secondary_address: u8,

    /// The last secondary address command byte, which says whether a LISTEN
    /// receives a filename (OPEN) or data.
    pub secondary_command: u8,

    pub flags: IecFlags,
}

impl Default for IecData {
    fn default() -> Self {
        Self::new()
    }
}

impl IecData {
    pub const fn new() -> Self {
        Self {
            bus_state: BusState::Idle,
            device_state: DeviceState::Idle,
            secondary_address: 0,
            secondary_command: 0,
            flags: IecFlags::empty(),
        }
    }

    /// Whether a LISTEN should receive a filename or DOS command, rather
    /// than data.
    pub fn receives_command(&self) -> bool {
        self.secondary_address == crate::constants::ERROR_CHANNEL
            || self.secondary_command & 0xf0 == 0xf0
    }

    pub(crate) fn set_state(&mut self, state: BusState) {
        if state != self.bus_state {
            trace!("Bus state {:?} -> {:?}", self.bus_state, state);
            self.bus_state = state;
        }
    }
}

/// Errors from byte level bus transfers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusError {
    /// ATN changed state - the host wants the bus.
    Atn,
    /// A handshake wait timed out (IEEE-488 only).
    Timeout,
    /// The host pulsed IFC, resetting the bus (IEEE-488 only).
    InterfaceClear,
    /// The listener pulled DATA during a byte - it has gone away.
    NotListening,
}

// JiffyDOS and DolphinDOS byte transfers share the fastloader error type.
impl From<FastloaderError> for BusError {
    fn from(e: FastloaderError) -> Self {
        match e {
            FastloaderError::Atn => Self::Atn,
            _ => Self::NotListening,
        }
    }
}

/// A command byte sent under ATN, as it applies to this device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AtnCommand {
    Unlisten,
    Untalk,
    /// LISTEN addressed to this device.
    Listen,
    /// TALK addressed to this device.
    Talk,
    /// LISTEN or TALK addressed to another device.
    OtherDevice,
    /// Secondary address for data transfer (0x60-0x6f).
    Data(u8),
    /// Close a channel (0xe0-0xef).
    Close(u8),
    /// Open a channel - a filename follows (0xf0-0xff).
    Open(u8),
    /// Anything else.
    Unknown,
}

impl AtnCommand {
    /// Decode a command byte for the device at `address`.
    pub fn decode(cmd: u8, address: u8) -> Self {
        match cmd {
            0x3f => Self::Unlisten,
            0x5f => Self::Untalk,
            0x20..=0x3e if cmd & 0x1f == address => Self::Listen,
            0x40..=0x5e if cmd & 0x1f == address => Self::Talk,
            0x20..=0x5e => Self::OtherDevice,
            _ if cmd & 0x60 == 0x60 => match cmd & 0xf0 {
                0xe0 => Self::Close(cmd & 0x0f),
                0xf0 => Self::Open(cmd & 0x0f),
                _ => Self::Data(cmd & 0x0f),
            },
            _ => Self::Unknown,
        }
    }
}
