//! Wall-clock-aligned scheduling.
//!
//! A [`Cadence`] describes wake-ups on the boundaries `k * interval + offset`
//! since the Unix epoch. Every cycle the sleep is re-derived from the current
//! wall-clock time:
//!
//! ```text
//! sleep = interval - ((now - offset) mod interval)
//! ```
//!
//! so a slow scan delays the next wake-up to the following boundary instead
//! of shifting every later one. A start instant that is exactly on a boundary
//! sleeps a full interval, never zero.
//!
//! [`Scheduler`] alternates between sleeping and running one cycle. It has no
//! terminal state: it loops until a cycle fails, and the error is returned to
//! the caller.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crate::error::{ConfigError, Result};

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Interval and phase offset of a periodic schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cadence {
    interval: Duration,
    offset: Duration,
}

impl Cadence {
    /// Creates a cadence.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroInterval`] if `interval` is zero.
    pub fn new(interval: Duration, offset: Duration) -> Result<Self> {
        if interval.is_zero() {
            return Err(ConfigError::ZeroInterval.into());
        }
        Ok(Self { interval, offset })
    }

    /// Returns the time between wake-ups.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns the shift of each wake-up from the interval boundary.
    pub fn offset(&self) -> Duration {
        self.offset
    }

    /// Returns how long to sleep from `now` to reach the next boundary.
    ///
    /// The result is in `(0, interval]`. Instants before the Unix epoch are
    /// treated as the epoch.
    pub fn sleep_from(&self, now: SystemTime) -> Duration {
        let since_epoch = now.duration_since(UNIX_EPOCH).unwrap_or(Duration::ZERO);
        let interval = self.interval.as_nanos();
        // Euclidean (now - offset) mod interval without going negative.
        let phase = (since_epoch.as_nanos() % interval + interval
            - self.offset.as_nanos() % interval)
            % interval;
        self.interval - duration_from_nanos(phase)
    }
}

fn duration_from_nanos(nanos: u128) -> Duration {
    let secs = u64::try_from(nanos / NANOS_PER_SEC).unwrap_or(u64::MAX);
    let subsec = u32::try_from(nanos % NANOS_PER_SEC).unwrap_or(0);
    Duration::new(secs, subsec)
}

/// Source of wall-clock time and blocking sleep.
pub trait Clock {
    /// Returns the current wall-clock time.
    fn now(&self) -> SystemTime;

    /// Blocks the calling thread for `duration`.
    fn sleep(&self, duration: Duration);
}

/// The operating system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Runs a cycle on every boundary of a [`Cadence`].
#[derive(Debug)]
pub struct Scheduler<C = SystemClock> {
    cadence: Cadence,
    clock: C,
}

impl Scheduler<SystemClock> {
    /// Creates a scheduler driven by the system clock.
    pub fn new(cadence: Cadence) -> Self {
        Self::with_clock(cadence, SystemClock)
    }
}

impl<C: Clock> Scheduler<C> {
    /// Creates a scheduler driven by `clock`.
    pub fn with_clock(cadence: Cadence, clock: C) -> Self {
        Self { cadence, clock }
    }

    /// Returns the cadence.
    pub fn cadence(&self) -> Cadence {
        self.cadence
    }

    /// Returns the sleep needed from the clock's current time.
    pub fn next_sleep(&self) -> Duration {
        self.cadence.sleep_from(self.clock.now())
    }

    /// Sleeps until the next boundary, then runs `cycle` once.
    ///
    /// # Errors
    ///
    /// Returns whatever error `cycle` returns.
    pub fn tick<T, F>(&self, cycle: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        let sleep = self.next_sleep();
        tracing::info!(sleep = ?sleep, "sleeping until next boundary");
        self.clock.sleep(sleep);

        let started = Instant::now();
        let result = cycle();
        tracing::debug!(elapsed = ?started.elapsed(), ok = result.is_ok(), "cycle finished");
        result
    }

    /// Runs `cycle` on every boundary until it fails.
    ///
    /// # Errors
    ///
    /// Returns the first error produced by `cycle`; never returns otherwise.
    pub fn run<F>(&self, mut cycle: F) -> Result<()>
    where
        F: FnMut() -> Result<()>,
    {
        loop {
            self.tick(&mut cycle)?;
        }
    }

    /// Runs `cycle` on `cycles` consecutive boundaries.
    ///
    /// # Errors
    ///
    /// Returns the first error produced by `cycle`.
    pub fn run_for<F>(&self, cycles: u64, mut cycle: F) -> Result<()>
    where
        F: FnMut() -> Result<()>,
    {
        for _ in 0..cycles {
            self.tick(&mut cycle)?;
        }
        Ok(())
    }
}
