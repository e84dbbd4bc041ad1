//! N0stalgia's file reader.
//!
//! The filename follows the 5 byte `M-E` command that starts the drive
//! code.  The file is sent as counted blocks, a zero count ending it and
//! 0xff reporting an error.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

#[allow(unused_imports)]
use crate::fmt::{debug, error, info, trace, warn};

use super::ll::n0sdos::n0sdos_send_byte;
use super::{Counted, FastloaderError, FileSource, command_name, send_file};
use crate::bus::IecHal;
use crate::constants::COMMAND_BUFFER_SIZE;
use crate::drive::Drive;
use crate::fileops::Storage;

const NAME_OFFSET: usize = 5;

pub(super) fn load_n0sdos_fileread<B, S>(bus: &mut B, drive: &mut Drive, storage: &mut S) -> Result<(), FastloaderError>
where
    B: IecHal + ?Sized,
    S: Storage + ?Sized,
{
    let name = command_name(drive, NAME_OFFSET, COMMAND_BUFFER_SIZE);
    let mut sender = Counted(|bus: &mut B, byte| n0sdos_send_byte(bus, byte));
    send_file(&mut sender, bus, drive, storage, FileSource::Name(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::sim::{SimBus, sig};
    use crate::error::DosError;
    use crate::fastloader::ll::n0sdos::N0SDOS_SEND_DEF;
    use crate::fastloader::{FastloaderId, run};
    use crate::test::{MockStorage, fl, pattern, test_drive};

    fn start(drive: &mut Drive, name: &[u8]) {
        drive.command.clear();
        drive.command.extend_from_slice(b"M-E\x00\x05").unwrap();
        drive.command.extend_from_slice(name).unwrap();
    }

    #[test]
    fn sends_named_file() {
        let data = pattern(30);
        let mut storage = MockStorage::with_file(b"DEMO", &data);
        let mut drive = test_drive();
        start(&mut drive, b"DEMO");

        let mut sim = SimBus::with_program(fl::recv_2bit_bytes(&N0SDOS_SEND_DEF, sig::CLOCK, 32));
        run(FastloaderId::N0sdosFileread, &mut sim, &mut drive, &mut storage);

        let mut expected = vec![30];
        expected.extend_from_slice(&data);
        expected.push(0);
        assert_eq!(fl::decode_2bit_refs(&sim, &N0SDOS_SEND_DEF, &sim.refs), expected);
        assert_eq!(storage.opened, vec![(b"DEMO".to_vec(), 0)]);
    }

    #[test]
    fn missing_file_sends_ff() {
        let mut storage = MockStorage::new();
        let mut drive = test_drive();
        start(&mut drive, b"GONE");

        let mut sim = SimBus::with_program(fl::recv_2bit_bytes(&N0SDOS_SEND_DEF, sig::CLOCK, 1));
        run(FastloaderId::N0sdosFileread, &mut sim, &mut drive, &mut storage);

        assert_eq!(fl::decode_2bit_refs(&sim, &N0SDOS_SEND_DEF, &sim.refs), vec![0xff]);
        assert_eq!(drive.error().error, DosError::FileNotFound);
    }

    #[test]
    fn atn_ends_loader_mid_file() {
        let mut storage = MockStorage::with_file(b"DEMO", &pattern(600));
        let mut drive = test_drive();
        start(&mut drive, b"DEMO");

        let mut program = fl::recv_2bit_bytes(&N0SDOS_SEND_DEF, sig::CLOCK, 10);
        program.extend(fl::atn_after(20));
        let mut sim = SimBus::with_program(program);
        run(FastloaderId::N0sdosFileread, &mut sim, &mut drive, &mut storage);

        fl::assert_loader_ended(&sim, &drive);
        assert!(drive.find_buffer(0).is_none());
        assert_eq!(storage.cleanups, 1);
    }
}
