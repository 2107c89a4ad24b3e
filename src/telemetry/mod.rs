//! # Telemetry Module
//!
//! Records snapshots of the RC input and status caches to JSONL files.
//!
//! This module handles:
//! - Capturing a consistent view of both caches with a timestamp
//! - Formatting as JSONL (JSON Lines)
//! - Appending to a log file, creating its directory on demand

pub mod logger;

pub use logger::{DeviceSnapshot, SnapshotLogger};
