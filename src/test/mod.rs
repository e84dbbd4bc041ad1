//! Test objects for pico2iec.
//!
//! [`MockStorage`] stands in for the filesystem, command parser and disk
//! control collaborators, recording what the bus engine asked of it.  Files
//! are held in memory and served in CBM sector layout: two link bytes, then
//! up to 254 bytes of data per sector.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

use std::boxed::Box;
use std::collections::BTreeMap;
use std::vec::Vec;

use crate::buffers::{Buffer, BufferHandler};
use crate::config::DriveConfig;
use crate::constants::{BUFFER_SIZE, SECTOR_PAYLOAD};
use crate::drive::Drive;
use crate::error::DosError;
use crate::fastloader::FastloaderId;
use crate::fileops::{CommandParser, Dir, DirEntry, DiskChange, DiskControl, FileOps};
use crate::signals::Signals;

/// A drive with the default configuration and its own signals.
pub(crate) fn test_drive() -> Drive {
    let signals: &'static Signals = Box::leak(Box::new(Signals::new()));
    Drive::new(DriveConfig::default(), signals)
}

/// A file of `len` bytes with recognisable contents.
pub(crate) fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 + i / 256) as u8).collect()
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MockFile {
    pub name: Vec<u8>,
    pub data: Vec<u8>,
}

#[derive(Default)]
pub(crate) struct MockStorage {
    pub files: Vec<MockFile>,
    pub sectors: BTreeMap<(u8, u8), [u8; BUFFER_SIZE]>,
    pub write_protect: bool,
    pub free_blocks: u16,

    /// Command prefixes the parser treats as fastloader drive code.
    pub loader_commands: Vec<(Vec<u8>, FastloaderId)>,

    /// Fail the nth refill (counting from 0) with 22, READ ERROR.
    pub fail_refill_at: Option<usize>,
    /// Fail every flush of a write buffer with this error.
    pub fail_flush: Option<DosError>,
    /// Fail every cleanup with this error.
    pub fail_cleanup: Option<DosError>,

    // Records
    pub opened: Vec<(Vec<u8>, u8)>,
    pub commands: Vec<Vec<u8>>,
    pub refills: usize,
    pub cleanups: usize,
    pub disk_changes: Vec<DiskChange>,
    pub reinits: usize,
    pub bam_commits: usize,
}

impl MockStorage {
    pub fn new() -> Self {
        Self {
            free_blocks: 664,
            ..Default::default()
        }
    }

    pub fn with_file(name: &[u8], data: &[u8]) -> Self {
        let mut storage = Self::new();
        storage.add_file(name, data);
        storage
    }

    pub fn add_file(&mut self, name: &[u8], data: &[u8]) {
        self.files.push(MockFile {
            name: name.to_vec(),
            data: data.to_vec(),
        });
    }

    pub fn file(&self, name: &[u8]) -> Option<&MockFile> {
        self.files.iter().find(|f| f.name == name)
    }

    pub fn loader_command(&mut self, prefix: &[u8], id: FastloaderId) {
        self.loader_commands.push((prefix.to_vec(), id));
    }

    fn find(&self, pattern: &[u8]) -> Option<usize> {
        self.files.iter().position(|f| match pattern.split_last() {
            Some((b'*', prefix)) => f.name.starts_with(prefix),
            _ => f.name == pattern,
        })
    }

    // Load the nth sector of the buffer's file.
    fn load_sector(&self, buf: &mut Buffer, n: usize) {
        let file = &self.files[buf.storage.handle as usize];
        let start = (n * SECTOR_PAYLOAD).min(file.data.len());
        let end = (start + SECTOR_PAYLOAD).min(file.data.len());
        let len = end - start;
        buf.data[2..2 + len].copy_from_slice(&file.data[start..end]);
        buf.position = 2;
        buf.lastused = (1 + len) as u8;
        buf.sendeoi = end >= file.data.len();
        buf.storage.sector = n as u8;
        if buf.sendeoi {
            buf.data[0] = 0;
            buf.data[1] = buf.lastused;
        } else {
            buf.data[0] = 1;
            buf.data[1] = (n + 1) as u8;
        }
    }

    // Append a write buffer's data to its file, and empty the buffer.
    fn flush(&mut self, buf: &mut Buffer) {
        if buf.lastused >= 2 {
            let data = &buf.data[2..=buf.lastused as usize];
            self.files[buf.storage.handle as usize]
                .data
                .extend_from_slice(data);
        }
        buf.position = 2;
        buf.lastused = 1;
    }
}

impl FileOps for MockStorage {
    fn read_sector(
        &mut self,
        _part: u8,
        track: u8,
        sector: u8,
        data: &mut [u8; BUFFER_SIZE],
    ) -> Result<(), DosError> {
        if track == 0 || track > 80 {
            return Err(DosError::IllegalTs);
        }
        *data = self
            .sectors
            .get(&(track, sector))
            .copied()
            .unwrap_or([0; BUFFER_SIZE]);
        Ok(())
    }

    fn write_sector(
        &mut self,
        _part: u8,
        track: u8,
        sector: u8,
        data: &[u8; BUFFER_SIZE],
    ) -> Result<(), DosError> {
        if self.write_protect {
            return Err(DosError::WriteProtect);
        }
        if track == 0 || track > 80 {
            return Err(DosError::IllegalTs);
        }
        self.sectors.insert((track, sector), *data);
        Ok(())
    }

    fn disk_free(&mut self, _part: u8) -> Result<u16, DosError> {
        Ok(self.free_blocks)
    }

    fn opendir(&mut self, part: u8) -> Result<Dir, DosError> {
        Ok(Dir { part, state: 0 })
    }

    fn readdir(&mut self, dir: &mut Dir) -> Result<Option<DirEntry>, DosError> {
        let Some(file) = self.files.get(dir.state as usize) else {
            return Ok(None);
        };
        dir.state += 1;
        let len = file.name.len().min(16);
        Ok(Some(DirEntry {
            name: heapless::Vec::from_slice(&file.name[..len]).unwrap(),
            blocks: (file.data.len() / SECTOR_PAYLOAD + 1) as u16,
            file_type: 0x82,
        }))
    }

    fn refill(&mut self, buf: &mut Buffer) -> Result<(), DosError> {
        if buf.write {
            if let Some(e) = self.fail_flush {
                return Err(e);
            }
            self.flush(buf);
            return Ok(());
        }
        let count = self.refills;
        self.refills += 1;
        if self.fail_refill_at == Some(count) {
            return Err(DosError::ReadNoData);
        }
        let next = buf.storage.sector as usize + 1;
        self.load_sector(buf, next);
        Ok(())
    }

    fn cleanup(&mut self, buf: &mut Buffer) -> Result<(), DosError> {
        self.cleanups += 1;
        if let Some(e) = self.fail_cleanup {
            return Err(e);
        }
        if buf.write {
            self.flush(buf);
        }
        Ok(())
    }
}

impl CommandParser for MockStorage {
    fn file_open(&mut self, drive: &mut Drive, secondary: u8) {
        let command = drive.command.to_vec();
        self.opened.push((command.clone(), secondary));

        let mut parts = command.split(|&c| c == b',');
        let name = parts.next().unwrap_or(&[]).to_vec();
        let write = secondary == 1 || parts.any(|p| p == b"W");

        let Some(idx) = drive.alloc_buffer() else {
            return;
        };
        if write {
            self.files.push(MockFile {
                name,
                data: Vec::new(),
            });
            let buf = drive.buffer_mut(idx);
            buf.write = true;
            buf.handler = BufferHandler::Storage;
            buf.storage.handle = (self.files.len() - 1) as u32;
            buf.position = 2;
            buf.lastused = 1;
        } else {
            let Some(file) = self.find(&name) else {
                drive.free_buffer(idx);
                drive.set_error(DosError::FileNotFound);
                return;
            };
            let buf = drive.buffer_mut(idx);
            buf.read = true;
            buf.handler = BufferHandler::Storage;
            buf.storage.handle = file as u32;
            self.load_sector(buf, 0);
        }
        if drive.bind_buffer(idx, secondary, self).is_err() {
            // The error is already on the error channel
            return;
        }
        drive.set_error(DosError::Ok);
    }

    fn parse_doscommand(&mut self, drive: &mut Drive) {
        let command = drive.command.to_vec();
        let loader = self
            .loader_commands
            .iter()
            .find(|(prefix, _)| command.starts_with(prefix))
            .map(|(_, id)| *id);
        self.commands.push(command);
        if let Some(id) = loader {
            drive.request_fastloader(id);
        }
        drive.set_error(DosError::Ok);
    }
}

impl DiskControl for MockStorage {
    fn change_disk(&mut self, _drive: &mut Drive, change: DiskChange) {
        self.disk_changes.push(change);
    }

    fn reinit(&mut self, _drive: &mut Drive) {
        self.reinits += 1;
    }

    fn bam_commit(&mut self) {
        self.bam_commits += 1;
    }
}

/// Host sequences for driving the fastloader protocols on a [`SimBus`].
///
/// [`SimBus`]: crate::bus::sim::SimBus
pub(crate) mod fl {
    use std::vec::Vec;

    use crate::bus::sim::HostOp::{self, *};
    use crate::bus::sim::{SimBus, sig};
    use crate::drive::Drive;
    use crate::fastloader::FastloaderId;
    use crate::fastloader::ll::Generic2Bit;

    const US: u64 = 1_000;

    /// Pulse a line.  The release is marked as a reference.
    pub fn strobe(line: u16) -> Vec<HostOp> {
        vec![Pull(line), Delay(5 * US), MarkRef, Release(line)]
    }

    /// Strobe `line` and let the device send a byte with `def`.  The byte is
    /// decoded afterwards with [`decode_2bit`].
    pub fn recv_2bit(def: &Generic2Bit, line: u16) -> Vec<HostOp> {
        let mut ops = strobe(line);
        ops.push(At(u64::from(def.pairtimes[3]) + 18 * US));
        ops
    }

    /// Strobe `line` and send a byte to the device with `def`.  Each pair is
    /// set up 4us before the device samples it.
    pub fn send_2bit(def: &Generic2Bit, line: u16, byte: u8) -> Vec<HostOp> {
        let value = byte ^ def.eorvalue;
        let mut ops = strobe(line);
        for ii in 0..4 {
            ops.push(At(u64::from(def.pairtimes[ii]) - 4 * US));
            for (sig_line, bit) in [(sig::CLOCK, def.clockbits[ii]), (sig::DATA, def.databits[ii])] {
                if value & (1 << bit) != 0 {
                    ops.push(Release(sig_line));
                } else {
                    ops.push(Pull(sig_line));
                }
            }
        }
        ops.extend([
            At(u64::from(def.pairtimes[3]) + 6 * US),
            Release(sig::CLOCK | sig::DATA),
            Delay(15 * US),
        ]);
        ops
    }

    /// Send several bytes with [`send_2bit`].
    pub fn send_2bit_bytes(def: &Generic2Bit, line: u16, bytes: &[u8]) -> Vec<HostOp> {
        bytes.iter().flat_map(|&b| send_2bit(def, line, b)).collect()
    }

    /// Receive `count` bytes with [`recv_2bit`].
    pub fn recv_2bit_bytes(def: &Generic2Bit, line: u16, count: usize) -> Vec<HostOp> {
        (0..count).flat_map(|_| recv_2bit(def, line)).collect()
    }

    /// Decode the byte the device sent after the strobe marked `reference`,
    /// sampling 2us after each pair time.
    pub fn decode_2bit(sim: &SimBus, def: &Generic2Bit, reference: u64) -> u8 {
        let mut value = 0u8;
        for ii in 0..4 {
            let t = reference + u64::from(def.pairtimes[ii]) + 2 * US;
            if sim.level_at(t, sig::CLOCK) {
                value |= 1 << def.clockbits[ii];
            }
            if sim.level_at(t, sig::DATA) {
                value |= 1 << def.databits[ii];
            }
        }
        value ^ def.eorvalue
    }

    /// Decode the bytes sent after each of the given references.
    pub fn decode_2bit_refs(sim: &SimBus, def: &Generic2Bit, refs: &[u64]) -> Vec<u8> {
        refs.iter().map(|&r| decode_2bit(sim, def, r)).collect()
    }

    /// Send a byte one bit per toggle of `strobe`, which starts at
    /// `start_high`.  Bits are in the order given.
    pub fn toggle_send(strobe: u16, start_high: bool, bits: [u8; 8], byte: u8) -> Vec<HostOp> {
        let mut ops = Vec::new();
        let mut high = start_high;
        for bit in bits {
            ops.push(if byte & (1 << bit) != 0 {
                Release(sig::DATA)
            } else {
                Pull(sig::DATA)
            });
            ops.push(Delay(5 * US));
            ops.push(if high { Pull(strobe) } else { Release(strobe) });
            high = !high;
            ops.push(Delay(10 * US));
        }
        ops.push(Release(sig::DATA));
        ops
    }

    /// Toggle `strobe` eight times, for the device to send a bit after
    /// each.  Every toggle is marked as a reference, and the bits are
    /// decoded with [`decode_toggled`].
    pub fn toggle_recv(strobe: u16, start_high: bool) -> Vec<HostOp> {
        let mut ops = Vec::new();
        let mut high = start_high;
        for _ in 0..8 {
            ops.push(MarkRef);
            ops.push(if high { Pull(strobe) } else { Release(strobe) });
            high = !high;
            ops.push(Delay(10 * US));
        }
        ops.push(Delay(25 * US));
        ops
    }

    /// Wait `delay_us`, then assert ATN and hold it, as a host does to take
    /// the bus back from a fastloader.
    pub fn atn_after(delay_us: u64) -> Vec<HostOp> {
        vec![Delay(delay_us * US), Pull(sig::ATN), Delay(200 * US)]
    }

    /// Check a fastloader has handed the bus back: nothing pulled by the
    /// device, and no loader running.
    pub fn assert_loader_ended(sim: &SimBus, drive: &Drive) {
        assert_eq!(sim.dev_pulls(), 0, "device still pulling lines");
        assert_eq!(drive.detected_loader, FastloaderId::None);
        assert!(sim.interrupts_enabled());
    }

    /// Decode a byte sent bitwise, from the eight references marked by
    /// [`toggle_recv`].
    pub fn decode_toggled(sim: &SimBus, refs: &[u64], bits: [u8; 8]) -> u8 {
        refs.iter().zip(bits).fold(0u8, |value, (&r, bit)| {
            if sim.level_at(r + 5 * US, sig::DATA) {
                value | (1 << bit)
            } else {
                value
            }
        })
    }
}
