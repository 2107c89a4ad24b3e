//! # RCIO Packet Codec
//!
//! Fixed-size frame exchanged with the co-processor on every transaction.
//!
//! ```text
//! byte 0      count_code   register count (bits 0-5) | opcode (bits 6-7)
//! byte 1      page
//! byte 2      offset
//! bytes 3-66  regs         32 x u16, little-endian
//! byte 67     crc          CRC-8 of bytes 0-67 with this byte zeroed
//! ```
//!
//! Register slots beyond `count` carry [`UNUSED_REGISTER`] on writes. They are
//! still covered by the checksum.

use bytes::{Buf, BufMut};

use super::crc::crc8_update;
use crate::error::{RcioError, Result};

/// Maximum number of registers in one transaction
pub const PKT_MAX_REGS: usize = 32;

/// Total frame size on the wire (68 bytes)
pub const FRAME_SIZE: usize = 3 + PKT_MAX_REGS * 2 + 1;

/// Byte position of the checksum
pub const CRC_INDEX: usize = FRAME_SIZE - 1;

/// Register count bits of `count_code`
pub const PKT_COUNT_MASK: u8 = 0x3F;

/// Opcode bits of `count_code`
pub const PKT_CODE_MASK: u8 = 0xC0;

/// Opcodes
pub const PKT_CODE_READ: u8 = 0x00;
pub const PKT_CODE_WRITE: u8 = 0x40;
pub const PKT_CODE_ERROR: u8 = 0x80;

/// Filler for register slots not used by a write
pub const UNUSED_REGISTER: u16 = 0x55AA;

/// Raw frame bytes
pub type Frame = [u8; FRAME_SIZE];

/// Compute the checksum of a frame with its checksum byte treated as zero
///
/// # Arguments
///
/// * `frame` - Complete frame; the current value at [`CRC_INDEX`] is ignored
///
/// # Returns
///
/// * `u8` - CRC-8 over all [`FRAME_SIZE`] bytes
pub fn compute_checksum(frame: &Frame) -> u8 {
    frame.iter().enumerate().fold(0, |crc, (i, &byte)| {
        crc8_update(crc, if i == CRC_INDEX { 0 } else { byte })
    })
}

/// Check the checksum byte of a received frame
///
/// # Errors
///
/// Returns `RcioError::Integrity` if the stored and recomputed values differ
pub fn verify_checksum(frame: &Frame) -> Result<()> {
    let expected = compute_checksum(frame);
    let received = frame[CRC_INDEX];

    if expected != received {
        return Err(RcioError::Integrity { expected, received });
    }

    Ok(())
}

/// Opcode bits of a frame
pub fn opcode(frame: &Frame) -> u8 {
    frame[0] & PKT_CODE_MASK
}

/// Whether the peripheral flagged this frame with the ERROR opcode
pub fn is_error(frame: &Frame) -> bool {
    opcode(frame) == PKT_CODE_ERROR
}

/// Register count carried in a frame
pub fn register_count(frame: &Frame) -> usize {
    (frame[0] & PKT_COUNT_MASK) as usize
}

/// Decoded view of a frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IoPacket {
    /// Register count and opcode
    pub count_code: u8,

    /// Register page
    pub page: u8,

    /// First register within the page
    pub offset: u8,

    /// Register payload; only the first `count()` entries are meaningful
    pub regs: [u16; PKT_MAX_REGS],

    /// Checksum byte as last encoded or received
    pub crc: u8,
}

impl Default for IoPacket {
    fn default() -> Self {
        Self {
            count_code: 0,
            page: 0,
            offset: 0,
            regs: [0; PKT_MAX_REGS],
            crc: 0,
        }
    }
}

impl IoPacket {
    /// Build a read request for `count` registers
    ///
    /// # Errors
    ///
    /// Returns `RcioError::InvalidArgument` if `count` exceeds [`PKT_MAX_REGS`]
    pub fn read_request(page: u8, offset: u8, count: usize) -> Result<Self> {
        check_count(count)?;

        Ok(Self {
            count_code: count as u8 | PKT_CODE_READ,
            page,
            offset,
            ..Self::default()
        })
    }

    /// Build a write request carrying `values`
    ///
    /// Slots past `values.len()` are padded with [`UNUSED_REGISTER`].
    ///
    /// # Errors
    ///
    /// Returns `RcioError::InvalidArgument` if more than [`PKT_MAX_REGS`] values are given
    pub fn write_request(page: u8, offset: u8, values: &[u16]) -> Result<Self> {
        check_count(values.len())?;

        let mut regs = [UNUSED_REGISTER; PKT_MAX_REGS];
        regs[..values.len()].copy_from_slice(values);

        Ok(Self {
            count_code: values.len() as u8 | PKT_CODE_WRITE,
            page,
            offset,
            regs,
            crc: 0,
        })
    }

    /// Register count field
    pub fn count(&self) -> usize {
        (self.count_code & PKT_COUNT_MASK) as usize
    }

    /// Opcode field
    pub fn code(&self) -> u8 {
        self.count_code & PKT_CODE_MASK
    }

    /// Whether this packet carries the ERROR opcode
    pub fn is_error(&self) -> bool {
        self.code() == PKT_CODE_ERROR
    }

    /// Serialize with a freshly computed checksum
    ///
    /// Also stores the checksum in `self.crc`.
    pub fn encode(&mut self) -> Frame {
        self.crc = 0;
        let mut frame = self.to_bytes();
        self.crc = compute_checksum(&frame);
        frame[CRC_INDEX] = self.crc;
        frame
    }

    /// Serialize as-is, keeping the current `crc` field
    pub fn to_bytes(&self) -> Frame {
        let mut frame = [0u8; FRAME_SIZE];
        let mut buf = &mut frame[..];

        buf.put_u8(self.count_code);
        buf.put_u8(self.page);
        buf.put_u8(self.offset);
        for &reg in &self.regs {
            buf.put_u16_le(reg);
        }
        buf.put_u8(self.crc);

        frame
    }

    /// Parse a frame without validating it
    pub fn decode(frame: &Frame) -> Self {
        let mut buf = &frame[..];

        let count_code = buf.get_u8();
        let page = buf.get_u8();
        let offset = buf.get_u8();
        let mut regs = [0u16; PKT_MAX_REGS];
        for reg in regs.iter_mut() {
            *reg = buf.get_u16_le();
        }
        let crc = buf.get_u8();

        Self {
            count_code,
            page,
            offset,
            regs,
            crc,
        }
    }
}

fn check_count(count: usize) -> Result<()> {
    if count > PKT_MAX_REGS {
        return Err(RcioError::InvalidArgument(format!(
            "register count {} exceeds maximum {}",
            count, PKT_MAX_REGS
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_size() {
        assert_eq!(FRAME_SIZE, 68);
        assert_eq!(CRC_INDEX, 67);
    }

    #[test]
    fn test_write_request_layout() {
        let mut packet = IoPacket::write_request(50, 15, &[0x1234, 0xABCD]).unwrap();
        let frame = packet.encode();

        assert_eq!(frame[0], 2 | PKT_CODE_WRITE);
        assert_eq!(frame[1], 50);
        assert_eq!(frame[2], 15);
        // Little-endian registers
        assert_eq!(&frame[3..7], &[0x34, 0x12, 0xCD, 0xAB]);
        // Padding from the third slot on
        assert_eq!(&frame[7..9], &[0xAA, 0x55]);
        assert_eq!(&frame[65..67], &[0xAA, 0x55]);
        assert_eq!(frame[CRC_INDEX], packet.crc);
    }

    #[test]
    fn test_write_request_pads_unused_slots() {
        let packet = IoPacket::write_request(1, 0, &[7]).unwrap();
        assert_eq!(packet.regs[0], 7);
        assert!(packet.regs[1..].iter().all(|&r| r == UNUSED_REGISTER));
    }

    #[test]
    fn test_full_write_request_has_no_padding() {
        let values: Vec<u16> = (0..PKT_MAX_REGS as u16).collect();
        let packet = IoPacket::write_request(1, 0, &values).unwrap();
        assert_eq!(packet.count(), PKT_MAX_REGS);
        assert_eq!(&packet.regs[..], &values[..]);
    }

    #[test]
    fn test_read_request_zeroed_payload() {
        let packet = IoPacket::read_request(4, 6, 16).unwrap();
        assert_eq!(packet.count(), 16);
        assert_eq!(packet.code(), PKT_CODE_READ);
        assert!(packet.regs.iter().all(|&r| r == 0));
    }

    #[test]
    fn test_too_many_registers_rejected() {
        assert!(matches!(
            IoPacket::read_request(1, 0, PKT_MAX_REGS + 1),
            Err(RcioError::InvalidArgument(_))
        ));
        assert!(matches!(
            IoPacket::write_request(1, 0, &[0u16; PKT_MAX_REGS + 1]),
            Err(RcioError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_checksum_ignores_stored_crc() {
        let mut packet = IoPacket::read_request(1, 2, 2).unwrap();
        let frame = packet.encode();

        let mut tampered = frame;
        tampered[CRC_INDEX] = !tampered[CRC_INDEX];

        assert_eq!(compute_checksum(&frame), compute_checksum(&tampered));
        assert!(verify_checksum(&frame).is_ok());
        assert!(matches!(
            verify_checksum(&tampered),
            Err(RcioError::Integrity { .. })
        ));
    }

    #[test]
    fn test_checksum_covers_padding() {
        let mut packet = IoPacket::write_request(1, 0, &[1]).unwrap();
        let mut frame = packet.encode();
        frame[40] ^= 0x01;
        assert!(verify_checksum(&frame).is_err());
    }

    #[test]
    fn test_decode_matches_encode() {
        let mut packet = IoPacket::write_request(4, 6, &[1500, 1000, 2000]).unwrap();
        let frame = packet.encode();
        assert_eq!(IoPacket::decode(&frame), packet);
    }

    #[test]
    fn test_frame_helpers() {
        let mut frame = IoPacket::read_request(1, 2, 6).unwrap().encode();
        assert_eq!(register_count(&frame), 6);
        assert_eq!(opcode(&frame), PKT_CODE_READ);
        assert!(!is_error(&frame));

        frame[0] = PKT_CODE_ERROR | 6;
        assert!(is_error(&frame));
        assert_eq!(register_count(&frame), 6);
    }

    #[test]
    fn test_write_request_carries_payload() {
        let packet = IoPacket::write_request(1, 0, &[10, 20, 30]).unwrap();
        assert_eq!(&packet.regs[..packet.count()], &[10, 20, 30]);
    }
}
