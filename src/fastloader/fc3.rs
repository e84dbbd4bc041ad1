//! Final Cartridge 3.
//!
//! FC3 loads the file the host already has open on channel 0, as blocks of
//! a two byte header then the sector's data.  The header is `01 ff` if more
//! blocks follow, and `00 nn` for the last, where `nn` is the offset of the
//! block's last byte.  `00 00` reports an error.  The freeze variants are
//! the same protocol with different timing.
//!
//! Saves arrive on channel 1, as counted blocks ending with a zero count.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

#[allow(unused_imports)]
use crate::fmt::{debug, error, info, trace, warn};

use super::ll::Generic2Bit;
use super::ll::fc3::{
    FC3_FREEZED_DEF, FC3_OLDFREEZED_NTSC_DEF, FC3_OLDFREEZED_PAL_DEF, FC3_SEND_DEF, fc3_get_byte,
    fc3_send_byte,
};
use super::{
    FastloaderError, FastloaderId, FileSender, FileSource, Sector, count_byte, receive_file, send_file,
};
use crate::bus::IecHal;
use crate::drive::Drive;
use crate::error::DosError;
use crate::fileops::Storage;

struct Fc3 {
    def: &'static Generic2Bit,
}

impl Fc3 {
    fn header<B: IecHal + ?Sized>(&self, bus: &mut B, header: [u8; 2]) -> Result<(), FastloaderError> {
        header.iter().try_for_each(|&byte| fc3_send_byte(bus, self.def, byte))
    }
}

impl<B: IecHal + ?Sized> FileSender<B> for Fc3 {
    fn send_sector(&mut self, bus: &mut B, sector: &Sector<'_>) -> Result<(), FastloaderError> {
        let header = if sector.last {
            [0, count_byte(sector.data.len() + 1)?]
        } else {
            [1, 0xff]
        };
        self.header(bus, header)?;
        sector
            .data
            .iter()
            .try_for_each(|&byte| fc3_send_byte(bus, self.def, byte))
    }

    fn send_error(&mut self, bus: &mut B, _error: DosError) -> Result<(), FastloaderError> {
        self.header(bus, [0, 0])
    }
}

pub(super) fn load_fc3<B, S>(id: FastloaderId, bus: &mut B, drive: &mut Drive, storage: &mut S) -> Result<(), FastloaderError>
where
    B: IecHal + ?Sized,
    S: Storage + ?Sized,
{
    let def = match id {
        FastloaderId::Fc3Freezed => &FC3_FREEZED_DEF,
        FastloaderId::Fc3OldFreezedPal => &FC3_OLDFREEZED_PAL_DEF,
        FastloaderId::Fc3OldFreezedNtsc => &FC3_OLDFREEZED_NTSC_DEF,
        _ => &FC3_SEND_DEF,
    };
    send_file(&mut Fc3 { def }, bus, drive, storage, FileSource::Channel(0))
}

pub(super) fn save_fc3<B, S>(bus: &mut B, drive: &mut Drive, storage: &mut S) -> Result<(), FastloaderError>
where
    B: IecHal + ?Sized,
    S: Storage + ?Sized,
{
    receive_file(bus, drive, storage, 1, fc3_get_byte, |_, _| Ok(()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::sim::{SimBus, sig};
    use crate::fastloader::ll::fc3::FC3_GET_DEF;
    use crate::fastloader::run;
    use crate::fileops::CommandParser;
    use crate::test::{MockStorage, fl, pattern, test_drive};

    fn open(drive: &mut Drive, storage: &mut MockStorage, name: &[u8], secondary: u8) {
        drive.command.clear();
        drive.command.extend_from_slice(name).unwrap();
        storage.file_open(drive, secondary);
        drive.command.clear();
    }

    #[test]
    fn load_sends_blocks() {
        let data = pattern(300);
        let mut storage = MockStorage::with_file(b"GAME", &data);
        let mut drive = test_drive();
        open(&mut drive, &mut storage, b"GAME", 0);

        let mut sim = SimBus::with_program(fl::recv_2bit_bytes(&FC3_SEND_DEF, sig::CLOCK, 304));
        run(FastloaderId::Fc3Load, &mut sim, &mut drive, &mut storage);

        let mut expected = vec![1, 0xff];
        expected.extend_from_slice(&data[..254]);
        expected.extend([0, 47]);
        expected.extend_from_slice(&data[254..]);
        assert_eq!(fl::decode_2bit_refs(&sim, &FC3_SEND_DEF, &sim.refs), expected);
        assert!(drive.find_buffer(0).is_none());
    }

    #[test]
    fn freezed_load_uses_its_own_timing() {
        let data = pattern(20);
        let mut storage = MockStorage::with_file(b"GAME", &data);
        let mut drive = test_drive();
        open(&mut drive, &mut storage, b"GAME", 0);

        let mut sim = SimBus::with_program(fl::recv_2bit_bytes(&FC3_FREEZED_DEF, sig::CLOCK, 22));
        run(FastloaderId::Fc3Freezed, &mut sim, &mut drive, &mut storage);

        let mut expected = vec![0, 21];
        expected.extend_from_slice(&data);
        assert_eq!(fl::decode_2bit_refs(&sim, &FC3_FREEZED_DEF, &sim.refs), expected);
    }

    #[test]
    fn load_without_open_file_sends_error_block() {
        let mut storage = MockStorage::new();
        let mut drive = test_drive();

        let mut sim = SimBus::with_program(fl::recv_2bit_bytes(&FC3_SEND_DEF, sig::CLOCK, 2));
        run(FastloaderId::Fc3Load, &mut sim, &mut drive, &mut storage);

        assert_eq!(fl::decode_2bit_refs(&sim, &FC3_SEND_DEF, &sim.refs), vec![0, 0]);
        assert_eq!(drive.error().error, DosError::FileNotOpen);
    }

    #[test]
    fn save_writes_file() {
        let mut storage = MockStorage::new();
        let mut drive = test_drive();
        open(&mut drive, &mut storage, b"SAVED", 1);

        let sim_bytes = [3, 0x01, 0x08, 0x42, 2, 0x43, 0x44, 0];
        let mut sim = SimBus::with_program(fl::send_2bit_bytes(&FC3_GET_DEF, sig::CLOCK, &sim_bytes));
        run(FastloaderId::Fc3Save, &mut sim, &mut drive, &mut storage);

        assert_eq!(storage.file(b"SAVED").unwrap().data, vec![0x01, 0x08, 0x42, 0x43, 0x44]);
        assert!(drive.find_buffer(1).is_none());
    }

    #[test]
    fn atn_ends_load_mid_file() {
        let mut storage = MockStorage::with_file(b"GAME", &pattern(600));
        let mut drive = test_drive();
        open(&mut drive, &mut storage, b"GAME", 0);

        let mut program = fl::recv_2bit_bytes(&FC3_SEND_DEF, sig::CLOCK, 10);
        program.extend(fl::atn_after(20));
        let mut sim = SimBus::with_program(program);
        run(FastloaderId::Fc3Load, &mut sim, &mut drive, &mut storage);

        fl::assert_loader_ended(&sim, &drive);
        assert!(drive.find_buffer(0).is_none());
    }

    #[test]
    fn atn_ends_save_mid_block() {
        let mut storage = MockStorage::new();
        let mut drive = test_drive();
        open(&mut drive, &mut storage, b"SAVED", 1);

        let mut program = fl::send_2bit_bytes(&FC3_GET_DEF, sig::CLOCK, &[10, 1, 2, 3]);
        program.extend(fl::atn_after(20));
        let mut sim = SimBus::with_program(program);
        run(FastloaderId::Fc3Save, &mut sim, &mut drive, &mut storage);

        fl::assert_loader_ended(&sim, &drive);
        assert!(drive.find_buffer(1).is_none());
    }
}
