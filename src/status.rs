//! # Status Tracker
//!
//! Health and identity of the co-processor.
//!
//! Two kinds of data live here:
//! - Health, polled every 200 ms: whether the device answers at all, whether
//!   its firmware finished initialising, and whether the PWM outputs report
//!   an alarm.
//! - Identity, fetched once by [`StatusTracker::probe`]: firmware CRC, board
//!   type and the git hash of the firmware build. The CRC is also refreshed on
//!   every health poll, so a reflashed co-processor is noticed.

use serde::Serialize;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::interface::RegisterAccess;
use crate::poller::{Clock, MonotonicClock, PollOutcome, RateLimit};
use crate::protocol::registers::{
    GIT_HASH_REGISTERS, PAGE_GIT_HASH, PAGE_SETUP, PAGE_STATUS, SETUP_CRC,
    STATUS_ALARMS_PWM_ERROR, STATUS_BOARD_TYPE, STATUS_FLAGS, STATUS_FLAGS_INIT_OK,
};

/// Minimum spacing between health polls
pub const STATUS_INTERVAL: Duration = Duration::from_millis(200);

/// Delay before the first health poll
pub const STATUS_INITIAL_DELAY: Duration = Duration::from_millis(20);

/// Board the co-processor firmware was built for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BoardType {
    Navio2,
    Edge,
    NewBoard1,
    NewBoard2,
    #[default]
    Unknown,
}

impl BoardType {
    /// Decode the board type register
    pub fn from_register(value: u16) -> Self {
        match value {
            0 => BoardType::Navio2,
            1 => BoardType::Edge,
            2 => BoardType::NewBoard1,
            3 => BoardType::NewBoard2,
            _ => BoardType::Unknown,
        }
    }

    /// Human-readable board name
    pub fn name(self) -> &'static str {
        match self {
            BoardType::Navio2 => "navio2",
            BoardType::Edge => "edge",
            BoardType::NewBoard1 => "new_board1",
            BoardType::NewBoard2 => "new_board2",
            BoardType::Unknown => "unknown board",
        }
    }
}

impl std::fmt::Display for BoardType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Cached status of the co-processor
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct StatusState {
    /// Last health poll got an answer
    pub alive: bool,

    /// Firmware reports it finished initialising
    pub init_ok: bool,

    /// No PWM alarm is raised
    pub pwm_ok: bool,

    /// CRC of the running firmware image
    pub firmware_crc: u32,

    pub board_type: BoardType,

    /// Firmware build identifier
    pub git_hash: String,
}

/// Which identity fields [`StatusTracker::probe`] managed to fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProbeReport {
    pub firmware_crc: bool,
    pub board_type: bool,
    pub git_hash: bool,
}

impl ProbeReport {
    pub fn all_ok(&self) -> bool {
        self.firmware_crc && self.board_type && self.git_hash
    }
}

/// Combine the two CRC registers, low half first
pub fn assemble_crc(low: u16, high: u16) -> u32 {
    (high as u32) << 16 | low as u32
}

/// Decode the git hash registers
///
/// Each register carries two ASCII bytes, first character in the low byte.
/// The string ends at the first NUL.
pub fn decode_git_hash(regs: &[u16]) -> String {
    let bytes: Vec<u8> = regs
        .iter()
        .flat_map(|reg| reg.to_le_bytes())
        .take_while(|&b| b != 0)
        .collect();

    String::from_utf8_lossy(&bytes).trim_end().to_string()
}

/// Read-only handle on a status cache
#[derive(Debug, Clone)]
pub struct StatusReader {
    cache: Arc<RwLock<StatusState>>,
}

impl StatusReader {
    /// Consistent copy of the whole cache
    pub fn snapshot(&self) -> StatusState {
        self.read().clone()
    }

    pub fn alive(&self) -> bool {
        self.read().alive
    }

    pub fn init_ok(&self) -> bool {
        self.read().init_ok
    }

    pub fn pwm_ok(&self) -> bool {
        self.read().pwm_ok
    }

    pub fn firmware_crc(&self) -> u32 {
        self.read().firmware_crc
    }

    pub fn board_type(&self) -> BoardType {
        self.read().board_type
    }

    pub fn board_name(&self) -> &'static str {
        self.read().board_type.name()
    }

    pub fn git_hash(&self) -> String {
        self.read().git_hash.clone()
    }

    fn read(&self) -> RwLockReadGuard<'_, StatusState> {
        self.cache.read().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Rate-limited poller for the status page
pub struct StatusTracker<C: Clock = MonotonicClock> {
    limit: RateLimit<C>,
    cache: Arc<RwLock<StatusState>>,
}

impl<C: Clock> StatusTracker<C> {
    /// Create a tracker with the default timing (first poll after 20 ms,
    /// then every 200 ms)
    pub fn new(clock: C) -> Self {
        Self::with_timing(clock, STATUS_INITIAL_DELAY, STATUS_INTERVAL)
    }

    /// Create a tracker with custom timing
    pub fn with_timing(clock: C, initial_delay: Duration, interval: Duration) -> Self {
        Self {
            limit: RateLimit::new(clock, initial_delay, interval),
            cache: Arc::new(RwLock::new(StatusState::default())),
        }
    }

    /// Handle for reading the cache from elsewhere
    pub fn reader(&self) -> StatusReader {
        StatusReader {
            cache: Arc::clone(&self.cache),
        }
    }

    /// Copy of the current cache
    pub fn snapshot(&self) -> StatusState {
        self.cache.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Fetch the identity registers once
    ///
    /// Firmware CRC, board type and git hash are fetched independently; a
    /// failure is logged and does not stop the remaining fetches.
    ///
    /// # Returns
    ///
    /// * `ProbeReport` - Which of the three fetches succeeded
    pub fn probe(&mut self, io: &impl RegisterAccess) -> ProbeReport {
        self.write().init_ok = false;

        let mut report = ProbeReport::default();

        match self.request_crc(io) {
            Ok(crc) => {
                info!("Firmware CRC: 0x{:x}", crc);
                report.firmware_crc = true;
            }
            Err(e) => warn!("Could not read firmware CRC: {}", e),
        }

        match self.request_board_type(io) {
            Ok(board) => {
                info!("Board type: {}", board);
                report.board_type = true;
            }
            Err(e) => warn!("Could not read board type: {}", e),
        }

        match self.request_git_hash(io) {
            Ok(hash) => {
                info!("Git hash: {}", hash);
                report.git_hash = true;
            }
            Err(e) => warn!("Could not read git hash: {}", e),
        }

        report
    }

    /// Poll if due and report whether the cache was updated
    pub fn refresh(&mut self, io: &impl RegisterAccess) -> bool {
        self.poll(io).updated()
    }

    /// Poll if due
    ///
    /// # Returns
    ///
    /// - `NotDue`: called before the deadline, the bus was not touched
    /// - `Updated`: health flags refreshed
    /// - `Failed`: the status read failed and the device is marked not alive
    pub fn poll(&mut self, io: &impl RegisterAccess) -> PollOutcome {
        let Some(now) = self.limit.due() else {
            return PollOutcome::NotDue;
        };

        // Flags and alarms are adjacent
        let mut regs = [0u16; 2];
        if let Err(e) = io.read_registers(PAGE_STATUS, STATUS_FLAGS, &mut regs) {
            debug!("Status poll failed: {}", e);
            let mut cache = self.write();
            if cache.alive {
                warn!("RCIO stopped responding: {}", e);
            }
            cache.alive = false;
            return PollOutcome::Failed;
        }

        if let Err(e) = self.request_crc(io) {
            warn!("Could not update firmware CRC: {}", e);
        }

        let (flags, alarms) = (regs[0], regs[1]);
        {
            let mut cache = self.write();
            if !cache.alive {
                info!("RCIO is alive");
            }
            cache.alive = true;
            cache.init_ok = flags & STATUS_FLAGS_INIT_OK != 0;
            cache.pwm_ok = alarms & STATUS_ALARMS_PWM_ERROR == 0;
        }

        self.limit.rearm(now);
        PollOutcome::Updated
    }

    fn request_crc(&self, io: &impl RegisterAccess) -> Result<u32> {
        let mut regs = [0u16; 2];
        io.read_registers(PAGE_SETUP, SETUP_CRC, &mut regs)?;

        let crc = assemble_crc(regs[0], regs[1]);
        self.write().firmware_crc = crc;
        Ok(crc)
    }

    fn request_board_type(&self, io: &impl RegisterAccess) -> Result<BoardType> {
        let mut reg = [0u16; 1];
        io.read_registers(PAGE_STATUS, STATUS_BOARD_TYPE, &mut reg)?;

        let board = BoardType::from_register(reg[0]);
        self.write().board_type = board;
        Ok(board)
    }

    fn request_git_hash(&self, io: &impl RegisterAccess) -> Result<String> {
        let mut regs = [0u16; GIT_HASH_REGISTERS];
        io.read_registers(PAGE_GIT_HASH, 0, &mut regs)?;

        let hash = decode_git_hash(&regs);
        self.write().git_hash = hash.clone();
        Ok(hash)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StatusState> {
        self.cache.write().unwrap_or_else(PoisonError::into_inner)
    }
}
