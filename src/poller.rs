//! # Register Poller
//!
//! Shared rate-limiting for the trackers.
//!
//! Trackers are called from an outside loop at whatever cadence it runs. A
//! [`RateLimit`] turns calls that arrive before the tracker's deadline into
//! no-ops so the bus is only touched at the tracker's own interval. Time comes
//! from an injected [`Clock`] so tests can step it by hand.

use std::time::{Duration, Instant};

/// Source of monotonic time
pub trait Clock: Send {
    fn now(&self) -> Instant;
}

/// [`Clock`] backed by [`Instant::now`]
#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Earliest instant the next poll may run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    pub fn new(at: Instant) -> Self {
        Self { at }
    }

    pub fn is_due(&self, now: Instant) -> bool {
        now >= self.at
    }

    /// Move the deadline to `now + interval`
    pub fn reset(&mut self, now: Instant, interval: Duration) {
        self.at = now + interval;
    }

    pub fn at(&self) -> Instant {
        self.at
    }
}

/// Result of one poll call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Called before the deadline; nothing was done
    NotDue,
    /// The cache now holds a fresh snapshot
    Updated,
    /// The bus was polled but a transaction failed; the deadline is left
    /// alone so the next call retries
    Failed,
}

impl PollOutcome {
    /// Whether the cache was updated
    pub fn updated(self) -> bool {
        self == PollOutcome::Updated
    }
}

/// Clock, deadline and interval of one tracker
#[derive(Debug)]
pub struct RateLimit<C: Clock> {
    clock: C,
    deadline: Deadline,
    interval: Duration,
}

impl<C: Clock> RateLimit<C> {
    /// Create a limiter whose first poll is due `initial_delay` from now
    ///
    /// # Arguments
    ///
    /// * `clock` - Time source
    /// * `initial_delay` - Delay before the first poll may run
    /// * `interval` - Minimum spacing between successful polls
    pub fn new(clock: C, initial_delay: Duration, interval: Duration) -> Self {
        let deadline = Deadline::new(clock.now() + initial_delay);
        Self {
            clock,
            deadline,
            interval,
        }
    }

    /// Current time if a poll is due, `None` otherwise
    pub fn due(&self) -> Option<Instant> {
        let now = self.clock.now();
        self.deadline.is_due(now).then_some(now)
    }

    /// Push the deadline one interval past `now`
    pub fn rearm(&mut self, now: Instant) {
        self.deadline.reset(now, self.interval);
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Clock that only moves when told to
    #[derive(Debug, Clone)]
    pub struct ManualClock {
        now: Arc<Mutex<Instant>>,
    }

    impl ManualClock {
        pub fn new() -> Self {
            Self {
                now: Arc::new(Mutex::new(Instant::now())),
            }
        }

        pub fn advance(&self, by: Duration) {
            *self.now.lock().unwrap() += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            *self.now.lock().unwrap()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mocks::ManualClock;
    use super::*;

    #[test]
    fn test_deadline_boundary_is_due() {
        let start = Instant::now();
        let mut deadline = Deadline::new(start);
        assert!(deadline.is_due(start));

        deadline.reset(start, Duration::from_millis(10));
        assert!(!deadline.is_due(start + Duration::from_millis(9)));
        assert!(deadline.is_due(start + Duration::from_millis(10)));
        assert_eq!(deadline.at(), start + Duration::from_millis(10));
    }

    #[test]
    fn test_rate_limit_initial_delay() {
        let clock = ManualClock::new();
        let limit = RateLimit::new(clock.clone(), Duration::from_millis(20), Duration::from_millis(200));

        assert!(limit.due().is_none());
        clock.advance(Duration::from_millis(20));
        assert!(limit.due().is_some());
    }

    #[test]
    fn test_rate_limit_rearm() {
        let clock = ManualClock::new();
        let mut limit = RateLimit::new(clock.clone(), Duration::ZERO, Duration::from_millis(10));

        let now = limit.due().unwrap();
        limit.rearm(now);
        assert!(limit.due().is_none());

        clock.advance(Duration::from_millis(5));
        assert!(limit.due().is_none());

        clock.advance(Duration::from_millis(5));
        assert_eq!(limit.due(), Some(now + Duration::from_millis(10)));
        assert_eq!(limit.interval(), Duration::from_millis(10));
    }

    #[test]
    fn test_poll_outcome_updated() {
        assert!(PollOutcome::Updated.updated());
        assert!(!PollOutcome::NotDue.updated());
        assert!(!PollOutcome::Failed.updated());
    }

    #[test]
    fn test_monotonic_clock_moves_forward() {
        let clock = MonotonicClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
