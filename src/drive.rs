//! The drive context.
//!
//! Everything the bus engine and fastloaders mutate lives in one [`Drive`],
//! owned by the bus engine and passed by `&mut` to whatever needs it - the
//! command parser and storage collaborators included.  Nothing in here is
//! shared with the other core except through [`Signals`].

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

#[allow(unused_imports)]
use crate::fmt::{debug, error, info, trace, warn};

use crate::buffers::{Buffer, BufferHandler, BufferPool, FreeFlags};
use crate::config::DriveConfig;
use crate::constants::{COMMAND_BUFFER_SIZE, ERROR_BUFFER, ERROR_CHANNEL};
use crate::error::{DosError, ErrorStatus};
use crate::fastloader::FastloaderId;
use crate::fileops::FileOps;
use crate::signals::{Keys, LedState, Signals};

/// The drive's state.
pub struct Drive {
    pub config: DriveConfig,

    /// Our address on the bus.  Starts as the configured address, but can be
    /// changed at runtime (by a `U0>` command, or a Wheels fastloader).
    pub device_address: u8,

    /// The partition commands apply to by default.
    pub current_part: u8,

    pub buffers: BufferPool,

    /// The filename or command string received on the last LISTEN.
    pub command: heapless::Vec<u8, COMMAND_BUFFER_SIZE>,

    /// The fastloader currently running, if any.
    pub detected_loader: FastloaderId,

    error: ErrorStatus,
    pending_loader: Option<FastloaderId>,
    sleeping: bool,
    signals: &'static Signals,
}

impl Drive {
    pub fn new(config: DriveConfig, signals: &'static Signals) -> Self {
        let mut drive = Self {
            config,
            device_address: config.device_address,
            current_part: 0,
            buffers: BufferPool::new(),
            command: heapless::Vec::new(),
            detected_loader: FastloaderId::None,
            error: ErrorStatus::default(),
            pending_loader: None,
            sleeping: false,
            signals,
        };
        drive.set_error_status(ErrorStatus::default());
        drive
    }

    pub fn signals(&self) -> &'static Signals {
        self.signals
    }

    //
    // Error channel
    //

    /// The current error.
    pub fn error(&self) -> ErrorStatus {
        self.error
    }

    /// Set the current error, with track and sector 0.
    pub fn set_error(&mut self, error: DosError) {
        self.set_error_status(ErrorStatus::new(error));
    }

    /// Set the current error, with a track and sector.
    pub fn set_error_ts(&mut self, error: DosError, track: u8, sector: u8) {
        self.set_error_status(ErrorStatus::with_ts(error, track, sector));
    }

    // Render the error into the error channel buffer, ready to be read from
    // the start.
    fn set_error_status(&mut self, status: ErrorStatus) {
        if !status.error.is_ok() {
            debug!("Error status: {}", status.error.code());
        }
        self.error = status;
        let buf = self.buffers.get_mut(ERROR_BUFFER);
        let len = status.render(&mut buf.data);
        buf.position = 0;
        buf.lastused = len.saturating_sub(1) as u8;
        buf.sendeoi = true;
        self.sync_leds();
    }

    //
    // Buffers
    //

    /// Allocate a buffer.  Sets 70, NO CHANNEL if none are free.
    pub fn alloc_buffer(&mut self) -> Option<usize> {
        let idx = self.buffers.alloc();
        if idx.is_none() {
            self.set_error(DosError::NoChannel);
        }
        idx
    }

    /// Allocate a large buffer of `count` linked buffers.  Sets 70, NO
    /// CHANNEL if there aren't enough free.
    pub fn alloc_linked(&mut self, count: usize) -> Option<usize> {
        let idx = self.buffers.alloc_linked(count);
        if idx.is_none() {
            self.set_error(DosError::NoChannel);
        }
        idx
    }

    /// Bind a buffer to a channel.  Any other buffer already bound to that
    /// channel is cleaned up and freed first.
    ///
    /// The new buffer is bound even if cleaning up the old one fails, in
    /// which case the cleanup error is returned, and is on the error channel.
    pub fn bind_buffer<S>(&mut self, idx: usize, secondary: u8, storage: &mut S) -> Result<(), DosError>
    where
        S: FileOps + ?Sized,
    {
        let mut result = Ok(());
        if let Some(other) = self.buffers.find(secondary)
            && other != idx
            && other != ERROR_BUFFER
        {
            debug!("Channel {} rebound, freeing buffer {}", secondary, other);
            result = self.cleanup(other, storage);
            self.free_buffer(other);
        }
        self.buffers.get_mut(idx).secondary = secondary;
        self.sync_leds();
        result
    }

    /// The buffer bound to a channel.
    pub fn find_buffer(&self, secondary: u8) -> Option<usize> {
        self.buffers.find(secondary)
    }

    pub fn buffer(&self, idx: usize) -> &Buffer {
        self.buffers.get(idx)
    }

    pub fn buffer_mut(&mut self, idx: usize) -> &mut Buffer {
        self.buffers.get_mut(idx)
    }

    pub fn mark_dirty(&mut self, idx: usize) {
        if !self.buffers.get(idx).dirty {
            self.buffers.mark_dirty(idx);
            self.sync_leds();
        }
    }

    /// Move a buffer on to its next block of data, via its handler.  Storage
    /// errors are set as the current error as well as returned.
    pub fn refill<S>(&mut self, idx: usize, storage: &mut S) -> Result<(), DosError>
    where
        S: FileOps + ?Sized,
    {
        match self.buffers.get(idx).handler {
            BufferHandler::Dummy => {
                self.buffers.get_mut(idx).position = 0;
                Ok(())
            }
            BufferHandler::ErrorChannel => {
                // The host has read the whole message
                self.set_error(DosError::Ok);
                Ok(())
            }
            BufferHandler::Storage => {
                let result = storage.refill(self.buffers.get_mut(idx));
                match result {
                    Ok(()) => {
                        let buf = self.buffers.get_mut(idx);
                        buf.mustflush = false;
                        if buf.write {
                            self.buffers.mark_clean(idx);
                        }
                        self.sync_leds();
                        Ok(())
                    }
                    Err(e) => {
                        warn!("Buffer {} refill failed: {}", idx, e.code());
                        self.set_error(e);
                        Err(e)
                    }
                }
            }
        }
    }

    /// Append a byte to a write buffer.  A full buffer is only flushed when
    /// the next byte arrives, so closing a file which exactly fills its last
    /// sector never writes an empty one.
    pub fn put_byte<S>(&mut self, idx: usize, byte: u8, storage: &mut S) -> Result<(), DosError>
    where
        S: FileOps + ?Sized,
    {
        if self.buffers.get(idx).mustflush {
            self.refill(idx, storage)?;
        }
        let buf = self.buffers.get_mut(idx);
        buf.data[buf.position as usize] = byte;
        buf.lastused = buf.position;
        buf.position = buf.position.wrapping_add(1);
        if buf.position == 0 {
            buf.mustflush = true;
        }
        self.mark_dirty(idx);
        Ok(())
    }

    /// Flush and close a buffer via its handler.  Does not free it.
    pub fn cleanup<S>(&mut self, idx: usize, storage: &mut S) -> Result<(), DosError>
    where
        S: FileOps + ?Sized,
    {
        match self.buffers.get(idx).handler {
            BufferHandler::Dummy | BufferHandler::ErrorChannel => Ok(()),
            BufferHandler::Storage => {
                let result = storage.cleanup(self.buffers.get_mut(idx));
                if let Err(e) = result {
                    warn!("Buffer {} cleanup failed: {}", idx, e.code());
                    self.set_error(e);
                }
                self.buffers.mark_clean(idx);
                result
            }
        }
    }

    /// Return a buffer to the pool, without cleaning it up.
    pub fn free_buffer(&mut self, idx: usize) {
        self.buffers.release(idx);
        self.sync_leds();
    }

    /// Free every buffer `flags` selects.  Returns the first cleanup error,
    /// but frees everything regardless.
    pub fn free_multiple<S>(&mut self, flags: FreeFlags, storage: &mut S) -> Result<(), DosError>
    where
        S: FileOps + ?Sized,
    {
        let mut result = Ok(());
        for idx in self.buffers.select_multiple(flags) {
            if flags.contains(FreeFlags::CLEAN) {
                for member in self.buffers.chain(idx) {
                    if let Err(e) = self.cleanup(member, storage)
                        && result.is_ok()
                    {
                        result = Err(e);
                    }
                }
            }
            self.buffers.release(idx);
        }
        self.sync_leds();
        result
    }

    /// Close the buffer bound to a channel - cleanup then free.  Closing the
    /// error channel closes every user channel instead.
    pub fn close_channel<S>(&mut self, secondary: u8, storage: &mut S) -> Result<(), DosError>
    where
        S: FileOps + ?Sized,
    {
        if secondary == ERROR_CHANNEL {
            let result = self.free_multiple(FreeFlags::USER_CLEAN, storage);
            if result.is_ok() {
                self.set_error(DosError::Ok);
            }
            return result;
        }
        match self.buffers.find(secondary) {
            Some(idx) => {
                let result = self.cleanup(idx, storage);
                self.free_buffer(idx);
                result
            }
            None => Ok(()),
        }
    }

    //
    // Fastloaders
    //

    /// Ask the bus engine to run a fastloader once the current command has
    /// been processed.  Called by the command parser when it recognises
    /// fastloader drive code.
    pub fn request_fastloader(&mut self, id: FastloaderId) {
        debug!("Fastloader requested: {:?}", id);
        self.pending_loader = Some(id);
    }

    /// Take any pending fastloader request.
    pub fn take_fastloader(&mut self) -> Option<FastloaderId> {
        self.pending_loader.take()
    }

    /// Whether the user has pressed a key which should abort a transfer.
    /// The keys stay pending, for the bus engine to act on once idle.
    pub fn check_keys(&self) -> bool {
        self.signals.pending_keys().intersects(Keys::ABORT)
    }

    //
    // LEDs
    //

    pub fn set_sleeping(&mut self, sleeping: bool) {
        self.sleeping = sleeping;
        self.sync_leds();
    }

    /// Publish the LED state implied by the buffers, error and sleep state.
    pub fn sync_leds(&self) {
        let mut leds = self.buffers.led_state();
        if !self.error.error.is_ok() {
            leds |= LedState::ERROR;
        }
        if self.sleeping {
            leds |= LedState::SLEEP;
        }
        self.signals.set_leds(leds);
    }
}
