//! Time sources for the rate limiter.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A source of "now" for admission decisions.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// The process monotonic clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
///
/// Time is expressed as an offset from a fixed origin captured at
/// construction. The offset may be moved backwards to simulate a
/// non-monotonic time source.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    /// The instant corresponding to offset zero.
    pub fn origin(&self) -> Instant {
        self.origin
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock();
        *offset += by;
    }

    /// Move the clock backward, stopping at the origin.
    pub fn rewind(&self, by: Duration) {
        let mut offset = self.offset.lock();
        *offset = offset.saturating_sub(by);
    }

    /// Jump to an absolute offset from the origin.
    pub fn set(&self, offset: Duration) {
        *self.offset.lock() = offset;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + *self.offset.lock()
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> Instant {
        (**self).now()
    }
}
