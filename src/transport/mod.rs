//! # SPI Transport Module
//!
//! Byte-level link to the RCIO co-processor.
//!
//! This module handles:
//! - The [`SpiTransfer`] seam the transaction engine is written against
//! - Opening a Linux `spidev` character device
//! - Half-duplex write-then-read exchanges over it
//!
//! Bus mode and clock are expected to be configured before the device is
//! opened (device tree or `spi-config`); only plain `write(2)`/`read(2)` are
//! issued here.

pub mod port_trait;

pub use port_trait::SpiTransfer;

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use tracing::{debug, info, warn};

use crate::error::{RcioError, Result};

/// Default spidev nodes to try (in order of preference)
const DEFAULT_DEVICE_PATHS: &[&str] = &[
    "/dev/spidev0.1", // Navio2 RCIO chip select
    "/dev/spidev0.0",
];

/// spidev-backed transport
pub struct SpidevTransport {
    /// Open device node
    file: File,
    /// Device path (e.g., /dev/spidev0.1)
    device_path: String,
}

impl std::fmt::Debug for SpidevTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpidevTransport")
            .field("device_path", &self.device_path)
            .finish_non_exhaustive()
    }
}

impl SpidevTransport {
    /// Open the first available default spidev node
    ///
    /// # Errors
    ///
    /// Returns error if none of the default device paths can be opened
    pub fn open() -> Result<Self> {
        Self::open_with_paths(DEFAULT_DEVICE_PATHS)
    }

    /// Open the first of `paths` that succeeds
    ///
    /// # Arguments
    ///
    /// * `paths` - Device paths to try (e.g., &["/dev/spidev0.1"])
    pub fn open_with_paths(paths: &[&str]) -> Result<Self> {
        for path in paths {
            debug!("Trying to open SPI device: {}", path);

            match Self::open_path(path) {
                Ok(transport) => {
                    info!("Opened RCIO SPI device at {}", path);
                    return Ok(transport);
                }
                Err(e) => {
                    warn!("Failed to open {}: {}", path, e);
                }
            }
        }

        Err(RcioError::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("no SPI device found (tried: {})", paths.join(", ")),
        )))
    }

    /// Open a specific spidev node for reading and writing
    pub fn open_path(path: &str) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| {
                RcioError::Io(io::Error::new(e.kind(), format!("Failed to open {}: {}", path, e)))
            })?;

        Ok(Self {
            file,
            device_path: path.to_string(),
        })
    }

    /// Path of the opened device node
    pub fn device_path(&self) -> &str {
        &self.device_path
    }
}

impl SpiTransfer for SpidevTransport {
    fn write_then_read(&mut self, tx: &[u8], rx: &mut [u8]) -> io::Result<()> {
        if !tx.is_empty() {
            self.file.write_all(tx)?;
        }
        if !rx.is_empty() {
            self.file.read_exact(rx)?;
        }
        Ok(())
    }
}
