//! # RCIO Protocol Module
//!
//! Wire format of the register protocol spoken with the RCIO co-processor.
//!
//! This module handles:
//! - Fixed 68-byte packet layout (count/opcode, page, offset, 32 registers, CRC)
//! - CRC-8 checksum calculation over the full frame
//! - Opcode and register count helpers
//! - Firmware page and register map

pub mod crc;
pub mod packet;
pub mod registers;
