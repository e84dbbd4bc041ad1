//! GI Joe.
//!
//! The loader asks for files by the first two characters of their name, and
//! gets the whole file back as an escaped byte stream: 0xac is the escape
//! character, sent twice to mean itself, and `ac ff` ends the file.  A file
//! which can't be loaded is answered with `fe fe ac f7`.  The host asserts
//! ATN when it's done.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

#[allow(unused_imports)]
use crate::fmt::{debug, error, info, trace, warn};

use super::ll::gijoe::{gijoe_get_byte, gijoe_send_byte};
use super::{FastloaderError, FileSender, FileSource, Filename, Sector, check_keys, send_file};
use crate::bus::IecHal;
use crate::drive::Drive;
use crate::error::DosError;
use crate::fileops::Storage;

const ESCAPE: u8 = 0xac;
const END: [u8; 2] = [ESCAPE, 0xff];
const ERROR: [u8; 4] = [0xfe, 0xfe, ESCAPE, 0xf7];

struct GiJoe;

impl GiJoe {
    fn send_all<B: IecHal + ?Sized>(bus: &mut B, bytes: &[u8]) -> Result<(), FastloaderError> {
        bytes.iter().try_for_each(|&byte| gijoe_send_byte(bus, byte))
    }
}

impl<B: IecHal + ?Sized> FileSender<B> for GiJoe {
    fn send_sector(&mut self, bus: &mut B, sector: &Sector<'_>) -> Result<(), FastloaderError> {
        for &byte in sector.data {
            if byte == ESCAPE {
                gijoe_send_byte(bus, ESCAPE)?;
            }
            gijoe_send_byte(bus, byte)?;
        }
        Ok(())
    }

    fn send_eof(&mut self, bus: &mut B) -> Result<(), FastloaderError> {
        Self::send_all(bus, &END)
    }

    fn send_error(&mut self, bus: &mut B, _error: DosError) -> Result<(), FastloaderError> {
        Self::send_all(bus, &ERROR)
    }
}

pub(super) fn load_gijoe<B, S>(bus: &mut B, drive: &mut Drive, storage: &mut S) -> Result<(), FastloaderError>
where
    B: IecHal + ?Sized,
    S: Storage + ?Sized,
{
    loop {
        check_keys(drive)?;

        // Two bytes and a wildcard always fit a Filename
        let mut name = Filename::new();
        for _ in 0..2 {
            match gijoe_get_byte(bus) {
                Ok(byte) => {
                    let _ = name.push(byte);
                }
                // The host is finished with us
                Err(FastloaderError::Atn) => return Ok(()),
                Err(e) => return Err(e),
            }
        }
        let _ = name.push(b'*');

        match send_file(&mut GiJoe, bus, drive, storage, FileSource::Name(name)) {
            // The host has been told, and may ask for another file
            Ok(()) | Err(FastloaderError::Io(_)) => {}
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::sim::HostOp::*;
    use crate::bus::sim::{SimBus, sig};
    use crate::fastloader::ll::gijoe::{GIJOE_GET_DEF, GIJOE_SEND_DEF};
    use crate::fastloader::{FastloaderId, run};
    use crate::test::{MockStorage, fl, test_drive};

    fn request(name: &[u8], replies: usize) -> Vec<crate::bus::sim::HostOp> {
        let mut ops = fl::send_2bit_bytes(&GIJOE_GET_DEF, sig::CLOCK, name);
        ops.extend(fl::recv_2bit_bytes(&GIJOE_SEND_DEF, sig::DATA, replies));
        ops
    }

    #[test]
    fn escapes_file_data() {
        let mut storage = MockStorage::with_file(b"ABCDE", &[1, ESCAPE, 2]);
        let mut drive = test_drive();

        let mut program = request(b"AB", 6);
        program.extend([Delay(20_000), Pull(sig::ATN)]);
        let mut sim = SimBus::with_program(program);
        run(FastloaderId::GiJoe, &mut sim, &mut drive, &mut storage);

        assert_eq!(
            fl::decode_2bit_refs(&sim, &GIJOE_SEND_DEF, &sim.refs[2..]),
            vec![1, ESCAPE, ESCAPE, 2, ESCAPE, 0xff]
        );
        assert_eq!(storage.opened, vec![(b"AB*".to_vec(), 0)]);
        assert!(drive.find_buffer(0).is_none());
    }

    #[test]
    fn missing_file_then_another() {
        let mut storage = MockStorage::with_file(b"XY", &[7]);
        let mut drive = test_drive();

        let mut program = request(b"QQ", 4);
        program.extend(request(b"XY", 3));
        program.extend([Delay(20_000), Pull(sig::ATN)]);
        let mut sim = SimBus::with_program(program);
        run(FastloaderId::GiJoe, &mut sim, &mut drive, &mut storage);

        assert_eq!(
            fl::decode_2bit_refs(&sim, &GIJOE_SEND_DEF, &sim.refs[2..6]),
            ERROR.to_vec()
        );
        assert_eq!(
            fl::decode_2bit_refs(&sim, &GIJOE_SEND_DEF, &sim.refs[8..]),
            vec![7, ESCAPE, 0xff]
        );
    }

    #[test]
    fn atn_ends_loader_mid_file() {
        let mut storage = MockStorage::with_file(b"BIG", &[0x11; 600]);
        let mut drive = test_drive();

        let mut program = request(b"BI", 10);
        program.extend(fl::atn_after(20));
        let mut sim = SimBus::with_program(program);
        run(FastloaderId::GiJoe, &mut sim, &mut drive, &mut storage);

        fl::assert_loader_ended(&sim, &drive);
        assert!(drive.find_buffer(0).is_none());
        assert_eq!(storage.cleanups, 1);
    }
}
