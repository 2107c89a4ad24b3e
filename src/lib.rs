//! # RCIO Bridge Library
//!
//! Talks to the RCIO co-processor of a flight controller over SPI.
//!
//! This library provides the register protocol (framing, CRC, read/write
//! transactions) and the rate-limited trackers that turn register pages into
//! RC channel values and device health.

pub mod config;
pub mod error;
pub mod interface;
pub mod poller;
pub mod protocol;
pub mod rc_input;
pub mod status;
pub mod telemetry;
pub mod transport;
