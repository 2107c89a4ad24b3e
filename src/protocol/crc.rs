//! # CRC-8 Implementation
//!
//! CRC-8 checksum used by the RCIO register protocol. This is the same
//! table the PX4IO firmware uses to check every SPI packet.
//!
//! **Polynomial**: 0x07 (x^8 + x^2 + x + 1)
//! **Initial Value**: 0x00
//! **Reflection / final XOR**: none

/// CRC-8 polynomial
const CRC8_POLY: u8 = 0x07;

/// Precomputed CRC8 lookup table for fast calculation
const CRC8_TABLE: [u8; 256] = generate_crc8_table();

/// Generate CRC8 lookup table at compile time
const fn generate_crc8_table() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;

    while i < 256 {
        let mut crc = i as u8;
        let mut j = 0;

        while j < 8 {
            if (crc & 0x80) != 0 {
                crc = (crc << 1) ^ CRC8_POLY;
            } else {
                crc <<= 1;
            }
            j += 1;
        }

        table[i] = crc;
        i += 1;
    }

    table
}

/// Feed one byte into a running CRC8 value
#[inline]
pub fn crc8_update(crc: u8, byte: u8) -> u8 {
    CRC8_TABLE[(crc ^ byte) as usize]
}

/// Calculate CRC8 checksum using lookup table
///
/// # Arguments
///
/// * `data` - Byte slice to calculate CRC for
///
/// # Returns
///
/// * `u8` - Calculated CRC8 checksum
///
/// # Examples
///
/// ```
/// use rcio_bridge::protocol::crc::crc8;
///
/// assert_eq!(crc8(b"123456789"), 0xF4);
/// ```
pub fn crc8(data: &[u8]) -> u8 {
    data.iter().fold(0, |crc, &byte| crc8_update(crc, byte))
}

/// Calculate CRC8 checksum bit by bit (slow, for verification)
#[cfg(test)]
fn crc8_slow(data: &[u8]) -> u8 {
    let mut crc: u8 = 0;

    for &byte in data {
        crc ^= byte;

        for _ in 0..8 {
            if (crc & 0x80) != 0 {
                crc = (crc << 1) ^ CRC8_POLY;
            } else {
                crc <<= 1;
            }
        }
    }

    crc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc8_empty() {
        assert_eq!(crc8(&[]), 0x00);
    }

    #[test]
    fn test_crc8_check_value() {
        // Standard CRC-8 check value for the ASCII string "123456789"
        assert_eq!(crc8(b"123456789"), 0xF4);
        assert_eq!(crc8_slow(b"123456789"), 0xF4);
    }

    #[test]
    fn test_crc8_table_matches_firmware_table() {
        // First and last entries of the table compiled into the IO firmware
        assert_eq!(&CRC8_TABLE[..8], &[0x00, 0x07, 0x0E, 0x09, 0x1C, 0x1B, 0x12, 0x15]);
        assert_eq!(&CRC8_TABLE[252..], &[0xFA, 0xFD, 0xF4, 0xF3]);
    }

    #[test]
    fn test_crc8_lookup_table_matches_slow() {
        let test_data = [
            vec![0x01, 0x02, 0x03],
            vec![0xFF, 0xFE, 0xFD],
            vec![0x10, 0x01, 0x02, 0x00],
            vec![0x00; 68],
            vec![0xAA, 0x55].repeat(32),
        ];

        for data in test_data.iter() {
            assert_eq!(crc8(data), crc8_slow(data), "CRC mismatch for data: {:?}", data);
        }
    }

    #[test]
    fn test_crc8_zero_byte_still_advances() {
        // A trailing zero byte changes the result, so a zeroed checksum slot
        // must be fed through the table rather than skipped.
        assert_ne!(crc8(&[0x41]), crc8(&[0x41, 0x00]));
    }

    #[test]
    fn test_crc8_changes_with_data() {
        assert_ne!(crc8(&[0x02, 0x01, 0x02, 0x00]), crc8(&[0x02, 0x01, 0x02, 0x01]));
    }
}
