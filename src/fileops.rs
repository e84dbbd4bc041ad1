//! The storage collaborators.
//!
//! The bus engine and fastloaders don't implement a filesystem or the DOS
//! command parser - they call out to these traits:
//! - [`FileOps`] - sector and file access on the current medium, including
//!   the refill/cleanup of buffers backed by storage.
//! - [`CommandParser`] - opening a file once its name has been received,
//!   and executing command channel strings.
//! - [`DiskControl`] - disk changes, re-initialisation after a hotplug, and
//!   committing cached BAM data.
//!
//! Firmware built without a storage layer uses [`NoMedium`].

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

#[allow(unused_imports)]
use crate::fmt::{debug, error, info, trace, warn};

use crate::buffers::Buffer;
use crate::constants::BUFFER_SIZE;
use crate::drive::Drive;
use crate::error::DosError;

/// Maximum length of a CBM filename.
pub const CBM_NAME_LENGTH: usize = 16;

/// A directory being read.  The state is private to the collaborator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Dir {
    pub part: u8,
    pub state: u32,
}

/// A directory entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: heapless::Vec<u8, CBM_NAME_LENGTH>,
    pub blocks: u16,
    pub file_type: u8,
}

impl DirEntry {
    /// Whether this entry's name matches a CBM pattern - `?` matches any
    /// single character, and `*` matches the rest of the name.
    pub fn matches(&self, pattern: &[u8]) -> bool {
        let mut name = self.name.iter();
        for &p in pattern {
            match p {
                b'*' => return true,
                b'?' => {
                    if name.next().is_none() {
                        return false;
                    }
                }
                c => {
                    if name.next() != Some(&c) {
                        return false;
                    }
                }
            }
        }
        name.next().is_none()
    }
}

/// Which way to change disk, in response to the disk change keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DiskChange {
    Next,
    Prev,
    Home,
}

/// Sector and file access on the current medium.
pub trait FileOps {
    /// Read an absolute sector.
    fn read_sector(
        &mut self,
        part: u8,
        track: u8,
        sector: u8,
        data: &mut [u8; BUFFER_SIZE],
    ) -> Result<(), DosError>;

    /// Write an absolute sector.
    fn write_sector(
        &mut self,
        part: u8,
        track: u8,
        sector: u8,
        data: &[u8; BUFFER_SIZE],
    ) -> Result<(), DosError>;

    /// Number of free blocks.
    fn disk_free(&mut self, part: u8) -> Result<u16, DosError>;

    /// Start reading the directory of a partition.
    fn opendir(&mut self, part: u8) -> Result<Dir, DosError>;

    /// Read the next directory entry, or None at the end.
    fn readdir(&mut self, dir: &mut Dir) -> Result<Option<DirEntry>, DosError>;

    /// Move a storage backed buffer on to its next sector.  For a read, the
    /// whole sector is loaded (link bytes at 0 and 1), `position` set to 2,
    /// `lastused` to the last data byte, and `sendeoi` set if it is the
    /// last sector.  For a write, the data from 2 to `lastused` is written
    /// out and the buffer emptied back to position 2.
    fn refill(&mut self, buf: &mut Buffer) -> Result<(), DosError>;

    /// Flush and close a storage backed buffer.
    fn cleanup(&mut self, buf: &mut Buffer) -> Result<(), DosError>;
}

/// The DOS command layer.
pub trait CommandParser {
    /// Open the file named in `drive.command` on channel `secondary`.  Errors
    /// are reported through `drive.set_error()`.
    fn file_open(&mut self, drive: &mut Drive, secondary: u8);

    /// Execute the command channel string in `drive.command`.  This is also
    /// where fastloader drive code is recognised, in which case the parser
    /// calls `drive.request_fastloader()`.
    fn parse_doscommand(&mut self, drive: &mut Drive);
}

/// Medium management.
pub trait DiskControl {
    /// Change disk in response to a key press.
    fn change_disk(&mut self, drive: &mut Drive, change: DiskChange);

    /// Re-initialise after the medium was changed underneath us.
    fn reinit(&mut self, drive: &mut Drive);

    /// Write any cached BAM data back to the medium.
    fn bam_commit(&mut self);
}

/// Everything the bus engine needs from the storage side.
pub trait Storage: FileOps + CommandParser + DiskControl {}

impl<T: FileOps + CommandParser + DiskControl> Storage for T {}

/// The storage collaborator for a drive with no medium.  Every access fails
/// with 74, DRIVE NOT READY.  The error channel still works, and `UI`/`UJ`
/// reset it to the version banner.
#[derive(Debug, Default)]
pub struct NoMedium;

impl FileOps for NoMedium {
    fn read_sector(
        &mut self,
        _part: u8,
        _track: u8,
        _sector: u8,
        _data: &mut [u8; BUFFER_SIZE],
    ) -> Result<(), DosError> {
        Err(DosError::DriveNotReady)
    }

    fn write_sector(
        &mut self,
        _part: u8,
        _track: u8,
        _sector: u8,
        _data: &[u8; BUFFER_SIZE],
    ) -> Result<(), DosError> {
        Err(DosError::DriveNotReady)
    }

    fn disk_free(&mut self, _part: u8) -> Result<u16, DosError> {
        Err(DosError::DriveNotReady)
    }

    fn opendir(&mut self, _part: u8) -> Result<Dir, DosError> {
        Err(DosError::DriveNotReady)
    }

    fn readdir(&mut self, _dir: &mut Dir) -> Result<Option<DirEntry>, DosError> {
        Err(DosError::DriveNotReady)
    }

    fn refill(&mut self, _buf: &mut Buffer) -> Result<(), DosError> {
        Err(DosError::DriveNotReady)
    }

    fn cleanup(&mut self, _buf: &mut Buffer) -> Result<(), DosError> {
        Ok(())
    }
}

impl CommandParser for NoMedium {
    fn file_open(&mut self, drive: &mut Drive, secondary: u8) {
        debug!("No medium: can't open file on channel {}", secondary);
        drive.set_error(DosError::DriveNotReady);
    }

    fn parse_doscommand(&mut self, drive: &mut Drive) {
        match drive.command.as_slice() {
            [] => {}
            [b'U', b'I' | b'J' | b'9' | b':', ..] => drive.set_error(DosError::DosVersion),
            [b'I', ..] => drive.set_error(DosError::DriveNotReady),
            _ => drive.set_error(DosError::SyntaxUnknown),
        }
    }
}

impl DiskControl for NoMedium {
    fn change_disk(&mut self, drive: &mut Drive, _change: DiskChange) {
        drive.set_error(DosError::DriveNotReady);
    }

    fn reinit(&mut self, drive: &mut Drive) {
        drive.set_error(DosError::DriveNotReady);
    }

    fn bam_commit(&mut self) {}
}
