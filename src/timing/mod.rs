//! Presentation timestamps for A/V synchronization
//!
//! Video and audio are captured on independent threads, but their timestamps
//! must live in a single clock domain so the container can interleave them.
//! [`PTSClock`] is that domain; [`MediaTime`] is a point on it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A presentation timestamp with nanosecond resolution.
///
/// Values from video and audio samples are directly comparable as long as
/// both were stamped from the same clock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MediaTime(u64);

impl MediaTime {
    pub const ZERO: MediaTime = MediaTime(0);

    pub const fn from_nanos(nanos: u64) -> Self {
        MediaTime(nanos)
    }

    pub const fn from_micros(micros: u64) -> Self {
        MediaTime(micros.saturating_mul(1_000))
    }

    pub const fn from_millis(millis: u64) -> Self {
        MediaTime(millis.saturating_mul(1_000_000))
    }

    /// Negative and non-finite inputs clamp to zero.
    pub fn from_secs_f64(secs: f64) -> Self {
        if !secs.is_finite() || secs <= 0.0 {
            return MediaTime::ZERO;
        }
        MediaTime((secs * 1e9).round() as u64)
    }

    pub fn from_duration(duration: Duration) -> Self {
        MediaTime(u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX))
    }

    pub const fn as_nanos(&self) -> u64 {
        self.0
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.0 as f64 / 1e9
    }

    /// Offset of `self` relative to an earlier origin, or `None` if `self`
    /// precedes it.
    pub fn since(&self, origin: MediaTime) -> Option<Duration> {
        self.0.checked_sub(origin.0).map(Duration::from_nanos)
    }

    /// Like [`since`](Self::since) but clamps to zero.
    pub fn saturating_since(&self, origin: MediaTime) -> Duration {
        Duration::from_nanos(self.0.saturating_sub(origin.0))
    }
}

impl fmt::Display for MediaTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}s", self.as_secs_f64())
    }
}

/// Monotonic clock for presentation timestamps
///
/// Clone it into every capture thread; clones share the same origin.
#[derive(Debug, Clone)]
pub struct PTSClock {
    start: Arc<Instant>,
}

impl PTSClock {
    /// Create a new PTS clock with the current instant as time zero
    pub fn new() -> Self {
        Self {
            start: Arc::new(Instant::now()),
        }
    }

    /// Create a PTS clock from an existing start instant
    pub fn from_instant(start: Instant) -> Self {
        Self {
            start: Arc::new(start),
        }
    }

    /// Current timestamp on this clock
    #[inline]
    pub fn now(&self) -> MediaTime {
        MediaTime::from_duration(self.start.elapsed())
    }

    /// Elapsed seconds since clock creation
    #[inline]
    pub fn pts(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    /// Timestamp for a given instant; instants before the origin map to zero.
    #[inline]
    pub fn at(&self, instant: Instant) -> MediaTime {
        MediaTime::from_duration(instant.saturating_duration_since(*self.start))
    }

    pub fn start_instant(&self) -> Instant {
        *self.start
    }
}

impl Default for PTSClock {
    fn default() -> Self {
        Self::new()
    }
}
