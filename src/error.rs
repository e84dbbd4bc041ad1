//! CBM DOS error codes and the error channel message format.
//!
//! The current error is rendered into the error channel buffer as
//! `NN,MESSAGE,TT,SS\r`, which is what the host reads from secondary address
//! 15.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

use core::fmt::Write;

use crate::util::built::PKG_VERSION;

/// CBM DOS error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum DosError {
    Ok = 0,
    Scratched = 1,
    ReadNoHeader = 20,
    ReadNoSync = 21,
    ReadNoData = 22,
    ReadChecksum = 23,
    WriteVerify = 25,
    WriteProtect = 26,
    ReadHeaderChecksum = 27,
    LongBlock = 28,
    DiskIdMismatch = 29,
    SyntaxUnknown = 30,
    SyntaxUnable = 31,
    SyntaxTooLong = 32,
    SyntaxJoker = 33,
    SyntaxNoName = 34,
    FileNotFound39 = 39,
    RecordMissing = 50,
    RecordOverflow = 51,
    FileTooLarge = 52,
    WriteFileOpen = 60,
    FileNotOpen = 61,
    FileNotFound = 62,
    FileExists = 63,
    FileTypeMismatch = 64,
    NoBlock = 65,
    IllegalTs = 66,
    NoChannel = 70,
    DiskFull = 72,
    DosVersion = 73,
    DriveNotReady = 74,
    UnknownDrivecode = 98,
    ClockUnstable = 99,
}

impl DosError {
    /// The numeric error code.
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Whether this code indicates success.  00 and 01 are informational,
    /// as is the 73 version banner.
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok | Self::Scratched | Self::DosVersion)
    }

    /// The message text shown by the error channel.
    pub const fn message(self) -> &'static str {
        match self {
            Self::Ok => " OK",
            Self::Scratched => "FILES SCRATCHED",
            Self::ReadNoHeader
            | Self::ReadNoSync
            | Self::ReadNoData
            | Self::ReadChecksum
            | Self::ReadHeaderChecksum => "READ ERROR",
            Self::WriteVerify | Self::LongBlock => "WRITE ERROR",
            Self::WriteProtect => "WRITE PROTECT ON",
            Self::DiskIdMismatch => "DISK ID MISMATCH",
            Self::SyntaxUnknown
            | Self::SyntaxUnable
            | Self::SyntaxTooLong
            | Self::SyntaxJoker
            | Self::SyntaxNoName => "SYNTAX ERROR",
            Self::FileNotFound39 | Self::FileNotFound => "FILE NOT FOUND",
            Self::RecordMissing => "RECORD NOT PRESENT",
            Self::RecordOverflow => "OVERFLOW IN RECORD",
            Self::FileTooLarge => "FILE TOO LARGE",
            Self::WriteFileOpen => "WRITE FILE OPEN",
            Self::FileNotOpen => "FILE NOT OPEN",
            Self::FileExists => "FILE EXISTS",
            Self::FileTypeMismatch => "FILE TYPE MISMATCH",
            Self::NoBlock => "NO BLOCK",
            Self::IllegalTs => "ILLEGAL TRACK OR SECTOR",
            Self::NoChannel => "NO CHANNEL",
            Self::DiskFull => "DISK FULL",
            // Rendered specially, with the firmware version appended
            Self::DosVersion => "PICO2IEC V",
            Self::DriveNotReady => "DRIVE NOT READY",
            Self::UnknownDrivecode => "UNKNOWN DRIVECODE",
            Self::ClockUnstable => "CLOCK UNSTABLE",
        }
    }
}

/// The drive's current error state: the last error plus the track and
/// sector it relates to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ErrorStatus {
    pub error: DosError,
    pub track: u8,
    pub sector: u8,
}

impl Default for ErrorStatus {
    fn default() -> Self {
        Self::new(DosError::DosVersion)
    }
}

impl ErrorStatus {
    pub const fn new(error: DosError) -> Self {
        Self {
            error,
            track: 0,
            sector: 0,
        }
    }

    pub const fn with_ts(error: DosError, track: u8, sector: u8) -> Self {
        Self {
            error,
            track,
            sector,
        }
    }

    /// Render this status into `buf` in error channel format.  Returns the
    /// number of bytes written, truncating if `buf` is too small.
    pub fn render(&self, buf: &mut [u8]) -> usize {
        let mut w = SliceWriter { buf, len: 0 };
        // SliceWriter truncates rather than failing, so this can't error.
        let _ = write!(w, "{:02},{}", self.error.code(), self.error.message());
        if self.error == DosError::DosVersion {
            let _ = write!(w, "{}", PKG_VERSION);
        }
        let _ = write!(w, ",{:02},{:02}\r", self.track, self.sector);
        w.len
    }
}

// Writes into a byte slice, silently dropping anything which doesn't fit.
struct SliceWriter<'a> {
    buf: &'a mut [u8],
    len: usize,
}

impl Write for SliceWriter<'_> {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        for &b in s.as_bytes() {
            if self.len < self.buf.len() {
                self.buf[self.len] = b;
                self.len += 1;
            }
        }
        Ok(())
    }
}
