//! Trait abstraction for SPI bus operations to enable testing

use std::io;

/// Trait for the blocking SPI exchange primitive
///
/// Mirrors a kernel `spi_write_then_read`: transmit `tx`, then clock in
/// `rx.len()` bytes. Either side may be empty, in which case that phase is
/// skipped.
#[cfg_attr(test, mockall::automock)]
pub trait SpiTransfer: Send {
    /// Transmit `tx`, then receive into `rx`
    fn write_then_read(&mut self, tx: &[u8], rx: &mut [u8]) -> io::Result<()>;
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use crate::protocol::packet::{
        verify_checksum, Frame, IoPacket, FRAME_SIZE, PKT_CODE_ERROR, PKT_CODE_MASK, PKT_CODE_READ,
        PKT_CODE_WRITE, PKT_MAX_REGS,
    };
    use std::collections::{HashMap, HashSet, VecDeque};
    use std::sync::{Arc, Mutex};

    /// Fault applied to the response of one transaction
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Fault {
        /// Transmit phase fails
        TransmitError,
        /// Receive phase fails
        ReceiveError,
        /// Flip one bit of the response after the checksum is computed
        FlipBit { byte: usize, bit: u8 },
        /// Respond with the ERROR opcode (valid checksum)
        ErrorOpcode,
        /// Respond with a different register count (valid checksum)
        WrongCount(u8),
    }

    #[derive(Default)]
    struct SimState {
        registers: HashMap<(u8, u8), u16>,
        rejected_pages: HashSet<u8>,
        faults: VecDeque<Fault>,
        pending: Option<Frame>,
        requests: Vec<IoPacket>,
        receive_fault: bool,
    }

    /// Simulated RCIO peripheral
    ///
    /// Answers read and write requests from an in-memory register map, the
    /// way the firmware does: the request is clocked in, processed, and the
    /// reply is clocked out on the following receive phase. A receive with no
    /// request pending fails, so interleaved transactions surface as errors.
    #[derive(Clone, Default)]
    pub struct SimulatedIo {
        state: Arc<Mutex<SimState>>,
    }

    impl SimulatedIo {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_registers(&self, page: u8, offset: u8, values: &[u16]) {
            let mut state = self.state.lock().unwrap();
            for (i, &value) in values.iter().enumerate() {
                state.registers.insert((page, offset.wrapping_add(i as u8)), value);
            }
        }

        pub fn register(&self, page: u8, offset: u8) -> u16 {
            let state = self.state.lock().unwrap();
            state.registers.get(&(page, offset)).copied().unwrap_or(0)
        }

        /// Answer every request for `page` with the ERROR opcode
        pub fn reject_page(&self, page: u8) {
            self.state.lock().unwrap().rejected_pages.insert(page);
        }

        /// Queue a fault for the next transaction
        pub fn inject(&self, fault: Fault) {
            self.state.lock().unwrap().faults.push_back(fault);
        }

        /// Requests received so far
        pub fn requests(&self) -> Vec<IoPacket> {
            self.state.lock().unwrap().requests.clone()
        }

        /// Number of transactions started
        pub fn transaction_count(&self) -> usize {
            self.state.lock().unwrap().requests.len()
        }

        fn respond(state: &mut SimState, request: &IoPacket, fault: Option<Fault>) -> Frame {
            let count = request.count().min(PKT_MAX_REGS);
            let mut response = IoPacket {
                count_code: count as u8,
                page: request.page,
                offset: request.offset,
                ..IoPacket::default()
            };

            if state.rejected_pages.contains(&request.page) {
                response.count_code = PKT_CODE_ERROR;
            } else {
                match request.code() {
                    PKT_CODE_READ => {
                        for i in 0..count {
                            let key = (request.page, request.offset.wrapping_add(i as u8));
                            response.regs[i] = state.registers.get(&key).copied().unwrap_or(0);
                        }
                    }
                    PKT_CODE_WRITE => {
                        for i in 0..count {
                            let key = (request.page, request.offset.wrapping_add(i as u8));
                            state.registers.insert(key, request.regs[i]);
                        }
                    }
                    _ => response.count_code = PKT_CODE_ERROR,
                }
            }

            match fault {
                Some(Fault::ErrorOpcode) => {
                    response.count_code = (response.count_code & !PKT_CODE_MASK) | PKT_CODE_ERROR;
                }
                Some(Fault::WrongCount(n)) => {
                    response.count_code = (response.count_code & PKT_CODE_MASK) | n;
                }
                _ => {}
            }

            let mut frame = response.encode();
            if let Some(Fault::FlipBit { byte, bit }) = fault {
                frame[byte] ^= 1 << bit;
            }
            frame
        }
    }

    impl SpiTransfer for SimulatedIo {
        fn write_then_read(&mut self, tx: &[u8], rx: &mut [u8]) -> io::Result<()> {
            let mut state = self.state.lock().unwrap();

            if !tx.is_empty() {
                let frame: Frame = tx
                    .try_into()
                    .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "bad frame size"))?;
                let request = IoPacket::decode(&frame);
                state.requests.push(request.clone());

                let fault = state.faults.pop_front();
                if fault == Some(Fault::TransmitError) {
                    return Err(io::Error::new(io::ErrorKind::BrokenPipe, "Mock transmit error"));
                }
                state.receive_fault = fault == Some(Fault::ReceiveError);

                let corrupt_request = verify_checksum(&frame).is_err();
                let response = if corrupt_request {
                    let mut reply = IoPacket {
                        count_code: PKT_CODE_ERROR,
                        ..IoPacket::default()
                    };
                    reply.encode()
                } else {
                    Self::respond(&mut state, &request, fault)
                };
                state.pending = Some(response);
            }

            if !rx.is_empty() {
                let response = state.pending.take().ok_or_else(|| {
                    io::Error::new(io::ErrorKind::Other, "no request pending")
                })?;
                if std::mem::take(&mut state.receive_fault) {
                    return Err(io::Error::new(io::ErrorKind::TimedOut, "Mock receive error"));
                }
                if rx.len() != FRAME_SIZE {
                    return Err(io::Error::new(io::ErrorKind::InvalidInput, "bad frame size"));
                }
                rx.copy_from_slice(&response);
            }

            Ok(())
        }
    }
}
