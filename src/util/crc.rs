//! CRC-16 as the AVR C library computes it (polynomial 0xa001, reflected),
//! which is what fastloader drive code is identified by.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

/// Fold one byte into a running CRC.
pub const fn crc16_update(crc: u16, byte: u8) -> u16 {
    let mut crc = crc ^ byte as u16;
    let mut bit = 0;
    while bit < 8 {
        crc = if crc & 1 != 0 { (crc >> 1) ^ 0xa001 } else { crc >> 1 };
        bit += 1;
    }
    crc
}

/// The CRC of a whole buffer, starting from `seed`.
pub fn crc16(seed: u16, data: &[u8]) -> u16 {
    data.iter().fold(seed, |crc, &byte| crc16_update(crc, byte))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_value() {
        // CRC-16/ARC of "123456789"
        assert_eq!(crc16(0, b"123456789"), 0xbb3d);
        // CRC-16/MODBUS, the same with an all ones seed
        assert_eq!(crc16(0xffff, b"123456789"), 0x4b37);
    }

    #[test]
    fn empty_is_seed() {
        assert_eq!(crc16(0xffff, &[]), 0xffff);
    }
}
