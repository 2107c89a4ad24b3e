//! # RC Input Tracker
//!
//! Polls the receiver status and raw channel registers of the co-processor
//! and keeps a filtered copy of the last known channel values.
//!
//! ## Filtering
//!
//! Each channel only accepts samples in `800..=2500`. Anything outside that
//! window is treated as a glitch: the channel keeps its previous value rather
//! than dropping to zero. Losing the receiver altogether (the RC_OK flag
//! clears) is different and zeroes every channel.
//!
//! ## Usage
//!
//! ```no_run
//! use rcio_bridge::interface::RegisterInterface;
//! use rcio_bridge::poller::MonotonicClock;
//! use rcio_bridge::rc_input::RcInputTracker;
//! use rcio_bridge::transport::SpidevTransport;
//!
//! let io = RegisterInterface::new(SpidevTransport::open()?);
//! let mut tracker = RcInputTracker::new(MonotonicClock);
//! let reader = tracker.reader();
//!
//! tracker.refresh(&io);
//! println!("throttle: {:?}", reader.channel(2));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use serde::Serialize;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{RcioError, Result};
use crate::interface::RegisterAccess;
use crate::poller::{Clock, MonotonicClock, PollOutcome, RateLimit};
use crate::protocol::registers::{
    PAGE_RAW_RC_INPUT, PAGE_STATUS, RAW_RC_BASE, STATUS_FLAGS, STATUS_FLAGS_RC_DSM,
    STATUS_FLAGS_RC_OK, STATUS_FLAGS_RC_PPM, STATUS_FLAGS_RC_SBUS, STATUS_FLAGS_RC_ST24,
};

/// Number of RC channels read on every poll
pub const RC_INPUT_CHANNELS: usize = 16;

/// Lowest accepted pulse width
pub const RC_VALUE_MIN: u16 = 800;

/// Highest accepted pulse width
pub const RC_VALUE_MAX: u16 = 2500;

/// Minimum spacing between polls
pub const RC_INPUT_INTERVAL: Duration = Duration::from_millis(10);

/// Channel values, one per RC channel
pub type RcChannels = [u16; RC_INPUT_CHANNELS];

/// Receiver protocol reported by the co-processor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RcInputSource {
    /// No receiver signal
    #[default]
    None,
    Ppm,
    Spektrum,
    Sbus,
    St24,
    Unknown,
}

impl RcInputSource {
    /// Classify the source from a status flags word that has RC_OK set
    ///
    /// Only one source is reported; the flags are checked in the order
    /// PPM, DSM, SBUS, ST24.
    pub fn from_status(flags: u16) -> Self {
        if flags & STATUS_FLAGS_RC_PPM != 0 {
            RcInputSource::Ppm
        } else if flags & STATUS_FLAGS_RC_DSM != 0 {
            RcInputSource::Spektrum
        } else if flags & STATUS_FLAGS_RC_SBUS != 0 {
            RcInputSource::Sbus
        } else if flags & STATUS_FLAGS_RC_ST24 != 0 {
            RcInputSource::St24
        } else {
            RcInputSource::Unknown
        }
    }
}

/// Cached RC input state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RcInputState {
    /// Last accepted value per channel
    pub channels: RcChannels,

    /// Whether the receiver was present on the last poll
    pub connected: bool,

    /// Receiver protocol seen on the last successful poll
    pub source: RcInputSource,
}

/// Whether a raw channel sample is within the accepted pulse width range
pub fn is_plausible(value: u16) -> bool {
    (RC_VALUE_MIN..=RC_VALUE_MAX).contains(&value)
}

/// Read-only handle on a tracker's cache
///
/// Cheap to clone and safe to use from any thread while the tracker keeps
/// polling.
#[derive(Debug, Clone)]
pub struct RcInputReader {
    cache: Arc<RwLock<RcInputState>>,
}

impl RcInputReader {
    /// Consistent copy of the whole cache
    pub fn snapshot(&self) -> RcInputState {
        *self.read()
    }

    /// Value of channel `index`, `None` past the last channel
    pub fn channel(&self, index: usize) -> Option<u16> {
        self.read().channels.get(index).copied()
    }

    pub fn channels(&self) -> RcChannels {
        self.read().channels
    }

    pub fn connected(&self) -> bool {
        self.read().connected
    }

    pub fn source(&self) -> RcInputSource {
        self.read().source
    }

    fn read(&self) -> RwLockReadGuard<'_, RcInputState> {
        self.cache.read().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Rate-limited poller for the RC input pages
pub struct RcInputTracker<C: Clock = MonotonicClock> {
    limit: RateLimit<C>,
    cache: Arc<RwLock<RcInputState>>,
}

impl<C: Clock> RcInputTracker<C> {
    /// Create a tracker with the default 10 ms interval
    ///
    /// The first poll is due one interval after creation.
    pub fn new(clock: C) -> Self {
        Self::with_timing(clock, RC_INPUT_INTERVAL, RC_INPUT_INTERVAL)
    }

    /// Create a tracker with custom timing
    ///
    /// # Arguments
    ///
    /// * `clock` - Time source
    /// * `initial_delay` - Delay before the first poll may run
    /// * `interval` - Minimum spacing between successful polls
    pub fn with_timing(clock: C, initial_delay: Duration, interval: Duration) -> Self {
        Self {
            limit: RateLimit::new(clock, initial_delay, interval),
            cache: Arc::new(RwLock::new(RcInputState::default())),
        }
    }

    /// Handle for reading the cache from elsewhere
    pub fn reader(&self) -> RcInputReader {
        RcInputReader {
            cache: Arc::clone(&self.cache),
        }
    }

    /// Copy of the current cache
    pub fn snapshot(&self) -> RcInputState {
        *self.cache.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Poll if due and report whether the cache was updated
    ///
    /// Returns `false` both when the call came too early and when a
    /// transaction failed; use [`poll`](Self::poll) to tell them apart.
    pub fn refresh(&mut self, io: &impl RegisterAccess) -> bool {
        self.poll(io).updated()
    }

    /// Poll if due
    ///
    /// # Returns
    ///
    /// - `NotDue`: called before the deadline, the bus was not touched
    /// - `Updated`: channels refreshed, or zeroed because the receiver is gone
    /// - `Failed`: a transaction failed; marked disconnected, channels kept
    pub fn poll(&mut self, io: &impl RegisterAccess) -> PollOutcome {
        let Some(now) = self.limit.due() else {
            return PollOutcome::NotDue;
        };

        match fetch_raw_values(io) {
            Ok((source, raw)) => {
                let mut cache = self.write();
                if !cache.connected {
                    info!("RC input connected ({:?})", source);
                }
                cache.connected = true;
                cache.source = source;
                for (cached, &value) in cache.channels.iter_mut().zip(raw.iter()) {
                    if is_plausible(value) {
                        *cached = value;
                    }
                }
            }
            Err(RcioError::NotConnected) => {
                let mut cache = self.write();
                if cache.connected {
                    warn!("RC input lost");
                }
                *cache = RcInputState::default();
            }
            Err(e) => {
                debug!("RC input poll failed: {}", e);
                let mut cache = self.write();
                if cache.connected {
                    warn!("RC input unavailable: {}", e);
                }
                cache.connected = false;
                return PollOutcome::Failed;
            }
        }

        self.limit.rearm(now);
        PollOutcome::Updated
    }

    fn write(&self) -> RwLockWriteGuard<'_, RcInputState> {
        self.cache.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Read the status flags and, if a receiver is present, all raw channels
///
/// # Errors
///
/// - `NotConnected`: the RC_OK flag is clear, channels were not read
/// - any transaction error from either read
fn fetch_raw_values(io: &impl RegisterAccess) -> Result<(RcInputSource, RcChannels)> {
    let mut status = [0u16; 1];
    io.read_registers(PAGE_STATUS, STATUS_FLAGS, &mut status)?;

    // No R/C input, don't try to fetch anything
    if status[0] & STATUS_FLAGS_RC_OK == 0 {
        return Err(RcioError::NotConnected);
    }

    let source = RcInputSource::from_status(status[0]);

    let mut raw = [0u16; RC_INPUT_CHANNELS];
    io.read_registers(PAGE_RAW_RC_INPUT, RAW_RC_BASE, &mut raw)?;

    Ok((source, raw))
}
