//! The buffer pool.
//!
//! A fixed pool of sector sized buffers, shared by channels (files opened by
//! the host), the error channel and fastloaders.  Each buffer is a 256 byte
//! data window with a cursor (`position`, `lastused`), ownership flags and a
//! handler which says who refills and cleans it up.
//!
//! Rules:
//! - At most one buffer is bound to a given channel (secondary address) at
//!   a time.  [`crate::drive::Drive::bind_buffer`] enforces this.
//! - The error channel buffer is always allocated, and always bound to
//!   secondary 15.
//! - A large buffer is a chain of linked buffers.  Only the active member of
//!   the chain is bound to the channel; the rest are parked on
//!   [`BUFFER_SEC_CHAIN`].
//!
//! Operations which need the storage collaborator (refill, cleanup) live on
//! the drive - this module only does the bookkeeping.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

use bitflags::bitflags;

#[allow(unused_imports)]
use crate::fmt::{debug, error, info, trace, warn};

use crate::constants::{
    BUFFER_SEC_CHAIN, BUFFER_SEC_SYSTEM, BUFFER_SIZE, ERROR_BUFFER, ERROR_CHANNEL, TOTAL_BUFFERS,
};
use crate::signals::LedState;

/// Who services a buffer's refill and cleanup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BufferHandler {
    /// Nothing behind the buffer - refill rewinds it, cleanup does nothing.
    /// Used for direct access and fastloader scratch buffers.
    Dummy,

    /// The error channel.  Refill resets the error to 00, OK.
    ErrorChannel,

    /// A file or directory on the storage collaborator.
    Storage,
}

/// Storage collaborator state for a buffer.  The bus engine never
/// interprets this.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StorageHandle {
    pub part: u8,
    pub track: u8,
    pub sector: u8,
    pub handle: u32,
}

/// A single buffer.
#[derive(Debug, Clone)]
pub struct Buffer {
    pub data: [u8; BUFFER_SIZE],

    /// Index of the next byte to transfer.
    pub position: u8,

    /// Index of the last valid byte.
    pub lastused: u8,

    /// The channel this buffer is bound to.
    pub secondary: u8,

    pub allocated: bool,
    pub read: bool,
    pub write: bool,

    /// Holds data not yet written to storage.
    pub dirty: bool,

    /// Survives the end of a command cycle.
    pub sticky: bool,

    /// The next refill must write the buffer out (REL records, and buffers
    /// the host has filled).
    pub mustflush: bool,

    /// This is the last sector of the file - the final byte is sent with EOI.
    pub sendeoi: bool,

    /// Record length of a REL file, 0 otherwise.
    pub recordlen: u8,

    pub handler: BufferHandler,
    pub storage: StorageHandle,

    /// Next member of a linked buffer chain.
    pub next: Option<u8>,

    /// First member of a linked buffer chain.
    pub first: Option<u8>,
}

impl Buffer {
    pub const fn new() -> Self {
        Self {
            data: [0; BUFFER_SIZE],
            position: 0,
            lastused: 0,
            secondary: BUFFER_SEC_SYSTEM,
            allocated: false,
            read: false,
            write: false,
            dirty: false,
            sticky: false,
            mustflush: false,
            sendeoi: false,
            recordlen: 0,
            handler: BufferHandler::Dummy,
            storage: StorageHandle {
                part: 0,
                track: 0,
                sector: 0,
                handle: 0,
            },
            next: None,
            first: None,
        }
    }

    // Reset to a freshly allocated state.
    fn reset(&mut self) {
        *self = Self::new();
        self.allocated = true;
    }

    /// The valid, untransferred bytes.
    pub fn remaining(&self) -> &[u8] {
        let start = self.position as usize;
        let end = self.lastused as usize + 1;
        if start >= end { &[] } else { &self.data[start..end] }
    }

    /// Place `data` in the buffer for reading, starting at position 0.
    pub fn fill(&mut self, data: &[u8], sendeoi: bool) {
        let len = data.len().min(BUFFER_SIZE);
        self.data[..len].copy_from_slice(&data[..len]);
        self.position = 0;
        self.lastused = len.saturating_sub(1) as u8;
        self.sendeoi = sendeoi;
    }
}

impl Default for Buffer {
    fn default() -> Self {
        Self::new()
    }
}

bitflags! {
    /// Which buffers [`BufferPool::select_multiple`] picks.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FreeFlags: u8 {
        /// Run each buffer's cleanup before freeing it.
        const CLEAN = 0x01;
        /// Leave sticky buffers alone.
        const UNSTICKY = 0x02;
        /// Only free buffers bound to a user channel.
        const USER = 0x04;
        /// Only free buffers not bound to any channel.
        const SYSTEM = 0x08;
    }
}

impl FreeFlags {
    /// Every buffer, without cleanup.
    pub const ALL: FreeFlags = FreeFlags::empty();

    /// Every buffer, cleaned up first.
    pub const ALL_CLEAN: FreeFlags = FreeFlags::CLEAN;

    /// User channel buffers, cleaned up first.
    pub const USER_CLEAN: FreeFlags = FreeFlags::USER.union(FreeFlags::CLEAN);

    /// Scratch buffers left over at the end of a command cycle.
    pub const LEFTOVER: FreeFlags = FreeFlags::UNSTICKY.union(FreeFlags::SYSTEM);
}

/// The pool.
pub struct BufferPool {
    buffers: [Buffer; TOTAL_BUFFERS],
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}

impl BufferPool {
    pub fn new() -> Self {
        let mut pool = Self {
            buffers: core::array::from_fn(|_| Buffer::new()),
        };
        let err = &mut pool.buffers[ERROR_BUFFER];
        err.reset();
        err.secondary = ERROR_CHANNEL;
        err.read = true;
        err.sticky = true;
        err.handler = BufferHandler::ErrorChannel;
        pool
    }

    pub fn get(&self, idx: usize) -> &Buffer {
        &self.buffers[idx]
    }

    pub fn get_mut(&mut self, idx: usize) -> &mut Buffer {
        &mut self.buffers[idx]
    }

    /// Allocate a buffer, bound to [`BUFFER_SEC_SYSTEM`] until the caller
    /// binds it.  Returns None if the pool is exhausted.
    pub fn alloc(&mut self) -> Option<usize> {
        let idx = (0..ERROR_BUFFER).find(|&i| !self.buffers[i].allocated)?;
        self.buffers[idx].reset();
        trace!("Allocated buffer {}", idx);
        Some(idx)
    }

    /// Allocate `count` buffers linked into a chain, for a large buffer.
    /// Returns the index of the first member, which is the active one.
    pub fn alloc_linked(&mut self, count: usize) -> Option<usize> {
        if count == 0 || self.free_count() < count {
            return None;
        }
        let mut first: Option<usize> = None;
        let mut prev: Option<usize> = None;
        for _ in 0..count {
            let idx = self.alloc()?;
            let head = *first.get_or_insert(idx);
            self.buffers[idx].first = Some(head as u8);
            self.buffers[idx].secondary = BUFFER_SEC_CHAIN;
            if let Some(p) = prev {
                self.buffers[p].next = Some(idx as u8);
            }
            prev = Some(idx);
        }
        let head = first?;
        self.buffers[head].secondary = BUFFER_SEC_SYSTEM;
        Some(head)
    }

    /// Make the `nth` member of the chain containing `current` the active
    /// one, moving the channel binding across.  Returns the new active index.
    pub fn switch_linked(&mut self, current: usize, nth: usize) -> Option<usize> {
        let first = self.buffers[current].first? as usize;
        let mut target = first;
        for _ in 0..nth {
            target = self.buffers[target].next? as usize;
        }
        if target != current {
            let secondary = self.buffers[current].secondary;
            self.buffers[current].secondary = BUFFER_SEC_CHAIN;
            self.buffers[target].secondary = secondary;
        }
        Some(target)
    }

    /// Members of the chain containing `idx`, in order.  A single buffer is
    /// a chain of one.
    pub fn chain(&self, idx: usize) -> heapless::Vec<usize, TOTAL_BUFFERS> {
        let mut members = heapless::Vec::new();
        let mut cur = match self.buffers[idx].first {
            Some(f) => Some(f as usize),
            None => Some(idx),
        };
        while let Some(i) = cur {
            // Capacity is the pool size, so this can't fail
            let _ = members.push(i);
            cur = self.buffers[i].next.map(usize::from);
        }
        members
    }

    /// Find the buffer bound to a channel.
    pub fn find(&self, secondary: u8) -> Option<usize> {
        self.buffers
            .iter()
            .position(|b| b.allocated && b.secondary == secondary)
    }

    /// Return a buffer (and the rest of its chain) to the pool.  The caller
    /// is responsible for any cleanup.  The error channel buffer is never
    /// freed.
    pub fn release(&mut self, idx: usize) {
        if idx == ERROR_BUFFER {
            return;
        }
        for member in self.chain(idx) {
            trace!("Freed buffer {}", member);
            self.buffers[member] = Buffer::new();
        }
    }

    /// Buffers a multiple free with `flags` would select.  Chains are
    /// represented by their first member only.
    pub fn select_multiple(&self, flags: FreeFlags) -> heapless::Vec<usize, TOTAL_BUFFERS> {
        let mut selected = heapless::Vec::new();
        for (idx, buf) in self.buffers.iter().enumerate() {
            if idx == ERROR_BUFFER || !buf.allocated {
                continue;
            }
            if buf.first.is_some_and(|f| f as usize != idx) {
                continue;
            }
            if flags.contains(FreeFlags::UNSTICKY) && buf.sticky {
                continue;
            }
            if flags.contains(FreeFlags::USER) && !self.is_user_chain(idx) {
                continue;
            }
            if flags.contains(FreeFlags::SYSTEM) && self.is_bound_chain(idx) {
                continue;
            }
            let _ = selected.push(idx);
        }
        selected
    }

    // Whether any member of a chain is bound to a user channel.
    fn is_user_chain(&self, idx: usize) -> bool {
        self.chain(idx).iter().any(|&i| {
            let sec = self.buffers[i].secondary;
            sec < ERROR_CHANNEL
        })
    }

    // Whether any member of a chain is bound to a channel.
    fn is_bound_chain(&self, idx: usize) -> bool {
        self.chain(idx)
            .iter()
            .any(|&i| self.buffers[i].secondary <= ERROR_CHANNEL)
    }

    /// Number of buffers available for allocation.
    pub fn free_count(&self) -> usize {
        (0..ERROR_BUFFER)
            .filter(|&i| !self.buffers[i].allocated)
            .count()
    }

    /// Mark a buffer as holding unwritten data.
    pub fn mark_dirty(&mut self, idx: usize) {
        self.buffers[idx].dirty = true;
    }

    /// Mark a buffer as written out.
    pub fn mark_clean(&mut self, idx: usize) {
        self.buffers[idx].dirty = false;
    }

    /// LED state implied by the pool.
    pub fn led_state(&self) -> LedState {
        let mut leds = LedState::empty();
        for (idx, buf) in self.buffers.iter().enumerate() {
            if idx == ERROR_BUFFER || !buf.allocated {
                continue;
            }
            if buf.secondary < ERROR_CHANNEL || buf.secondary == BUFFER_SEC_CHAIN {
                leds |= LedState::BUSY;
            }
            if buf.dirty {
                leds |= LedState::DIRTY;
            }
        }
        leds
    }
}
