//! # Register Interface
//!
//! Transaction engine for the RCIO register protocol.
//!
//! Every transaction is one blocking round trip: the request frame is
//! clocked out, the peripheral gets a short settle time, and the reply frame
//! is clocked back into the same buffer. A single mutex guards the transport
//! together with that buffer, so transactions issued from different threads
//! never interleave on the bus.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;
use tracing::debug;

use crate::error::{RcioError, Result};
use crate::protocol::packet::{self, Frame, IoPacket, FRAME_SIZE};
use crate::protocol::registers::RegisterAddress;
use crate::transport::SpiTransfer;

/// Delay before each bus phase; the firmware asks for 120-150 µs
pub const DEFAULT_SETTLE: Duration = Duration::from_micros(150);

/// Register-level access to the co-processor
///
/// The trackers are written against this trait rather than a concrete
/// engine.
#[cfg_attr(test, mockall::automock)]
pub trait RegisterAccess {
    /// Read `values.len()` consecutive registers starting at `page:offset`
    ///
    /// `values` is only written once the whole reply has been validated.
    fn read_registers(&self, page: u8, offset: u8, values: &mut [u16]) -> Result<usize>;

    /// Write `values` to consecutive registers starting at `page:offset`
    fn write_registers(&self, page: u8, offset: u8, values: &[u16]) -> Result<usize>;
}

/// Transport plus the one packet buffer all transactions share
struct Bus<T> {
    transport: T,
    buffer: Frame,
}

/// Transaction engine over an [`SpiTransfer`]
pub struct RegisterInterface<T: SpiTransfer> {
    bus: Mutex<Bus<T>>,
    settle: Duration,
}

impl<T: SpiTransfer> std::fmt::Debug for RegisterInterface<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterInterface")
            .field("settle", &self.settle)
            .finish_non_exhaustive()
    }
}

impl<T: SpiTransfer> RegisterInterface<T> {
    /// Create an engine with the default settle delay
    pub fn new(transport: T) -> Self {
        Self::with_settle(transport, DEFAULT_SETTLE)
    }

    /// Create an engine with a custom settle delay
    ///
    /// # Arguments
    ///
    /// * `transport` - SPI link to the co-processor
    /// * `settle` - Pause before transmitting and before receiving
    pub fn with_settle(transport: T, settle: Duration) -> Self {
        Self {
            bus: Mutex::new(Bus {
                transport,
                buffer: [0; FRAME_SIZE],
            }),
            settle,
        }
    }

    /// Write registers
    ///
    /// # Arguments
    ///
    /// * `page` - Register page
    /// * `offset` - First register within the page
    /// * `values` - Up to 32 register values
    ///
    /// # Returns
    ///
    /// * `Result<usize>` - Number of registers written
    ///
    /// # Errors
    ///
    /// - `InvalidArgument`: more than 32 values (nothing is sent)
    /// - `Transport`: the SPI exchange failed
    /// - `Integrity`: the reply failed its checksum
    /// - `DeviceRejected`: the co-processor answered with the ERROR opcode
    pub fn write(&self, page: u8, offset: u8, values: &[u16]) -> Result<usize> {
        let address = RegisterAddress::new(page, offset);
        let mut request = IoPacket::write_request(page, offset, values)?;

        let mut bus = self.lock();
        bus.buffer = request.encode();
        self.exchange(&mut bus)
            .inspect_err(|e| debug!("write {} failed: {}", address, e))?;

        if packet::is_error(&bus.buffer) {
            debug!("write {} rejected by device", address);
            return Err(RcioError::DeviceRejected { address });
        }

        Ok(values.len())
    }

    /// Read `count` registers
    ///
    /// # Errors
    ///
    /// Same as [`read_into`](Self::read_into)
    pub fn read(&self, page: u8, offset: u8, count: usize) -> Result<Vec<u16>> {
        let mut values = vec![0u16; count];
        self.read_into(page, offset, &mut values)?;
        Ok(values)
    }

    /// Read `values.len()` registers into `values`
    ///
    /// # Returns
    ///
    /// * `Result<usize>` - Number of registers read
    ///
    /// # Errors
    ///
    /// - `InvalidArgument`: more than 32 registers requested (nothing is sent)
    /// - `Transport`: the SPI exchange failed
    /// - `Integrity`: the reply failed its checksum
    /// - `DeviceRejected`: the co-processor answered with the ERROR opcode
    /// - `CountMismatch`: the reply carries a different register count
    pub fn read_into(&self, page: u8, offset: u8, values: &mut [u16]) -> Result<usize> {
        let count = values.len();
        let address = RegisterAddress::new(page, offset);
        let mut request = IoPacket::read_request(page, offset, count)?;

        let mut bus = self.lock();
        bus.buffer = request.encode();
        self.exchange(&mut bus)
            .inspect_err(|e| debug!("read {} failed: {}", address, e))?;

        let response = IoPacket::decode(&bus.buffer);

        if response.is_error() {
            debug!("read {} rejected by device", address);
            return Err(RcioError::DeviceRejected { address });
        }

        if response.count() != count {
            debug!(
                "read {} returned {} registers, expected {}",
                address,
                response.count(),
                count
            );
            return Err(RcioError::CountMismatch {
                expected: count,
                received: response.count(),
            });
        }

        values.copy_from_slice(&response.regs[..count]);
        Ok(count)
    }

    /// Consume the engine and return the transport
    pub fn into_inner(self) -> T {
        self.bus
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .transport
    }

    fn lock(&self) -> MutexGuard<'_, Bus<T>> {
        // The buffer is fully rewritten by every transaction, so a panic in
        // a previous holder leaves nothing to repair.
        self.bus.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Send the request in `bus.buffer` and replace it with the validated reply
    fn exchange(&self, bus: &mut Bus<T>) -> Result<()> {
        let Bus { transport, buffer } = bus;

        self.settle();
        transport
            .write_then_read(&buffer[..], &mut [])
            .map_err(RcioError::Transport)?;

        self.settle();
        transport
            .write_then_read(&[], &mut buffer[..])
            .map_err(RcioError::Transport)?;

        packet::verify_checksum(buffer)
    }

    fn settle(&self) {
        if !self.settle.is_zero() {
            thread::sleep(self.settle);
        }
    }
}

impl<T: SpiTransfer> RegisterAccess for RegisterInterface<T> {
    fn read_registers(&self, page: u8, offset: u8, values: &mut [u16]) -> Result<usize> {
        self.read_into(page, offset, values)
    }

    fn write_registers(&self, page: u8, offset: u8, values: &[u16]) -> Result<usize> {
        self.write(page, offset, values)
    }
}
