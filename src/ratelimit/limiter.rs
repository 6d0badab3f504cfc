//! Clock-driven rate limiter over a window store.

use std::time::Instant;
use tracing::trace;

use super::backend::AdmissionControl;
use super::clock::{Clock, SystemClock};
use super::key::ClientKey;
use super::policy::{Decision, Policy};
use super::store::WindowStore;

/// The rate limiter used by the service.
///
/// Pairs a [`WindowStore`] keyed by [`ClientKey`] with a time source, so
/// callers only supply the key. This struct is thread-safe and can be shared
/// across tasks behind an `Arc`.
pub struct RateLimiter<C = SystemClock> {
    store: WindowStore<ClientKey>,
    clock: C,
}

impl RateLimiter<SystemClock> {
    /// Create a rate limiter driven by the system clock.
    pub fn new(policy: Policy) -> Self {
        Self::with_clock(policy, SystemClock)
    }
}

impl<C: Clock> RateLimiter<C> {
    pub fn with_clock(policy: Policy, clock: C) -> Self {
        Self {
            store: WindowStore::new(policy),
            clock,
        }
    }

    /// Evaluate a request from `key` at the clock's current time.
    pub fn check(&self, key: &ClientKey) -> Decision {
        self.evaluate(key, self.clock.now())
    }

    /// Evaluate a request from `key` at an explicit instant.
    pub fn evaluate(&self, key: &ClientKey, now: Instant) -> Decision {
        self.store.evaluate(key, now)
    }

    /// Evict windows idle for longer than the policy's retention.
    ///
    /// Returns the number of evicted keys.
    pub fn sweep(&self) -> usize {
        let retention = self.store.policy().idle_retention();
        let now = self.clock.now();
        trace!(retention_ms = retention.as_millis() as u64, "Sweeping idle windows");
        self.store.sweep(now, retention)
    }

    pub fn policy(&self) -> &Policy {
        self.store.policy()
    }

    pub fn store(&self) -> &WindowStore<ClientKey> {
        &self.store
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Get the number of keys currently tracked.
    pub fn window_count(&self) -> usize {
        self.store.len()
    }

    /// Get the number of recorded requests for a key.
    ///
    /// Returns `None` if no window exists for the key.
    pub fn request_count(&self, key: &ClientKey) -> Option<usize> {
        self.store.request_count(key)
    }
}

impl Default for RateLimiter<SystemClock> {
    fn default() -> Self {
        Self::new(Policy::default())
    }
}

impl<C: Clock> AdmissionControl for RateLimiter<C> {
    fn check(&self, key: &ClientKey) -> Decision {
        self.store.evaluate(key, self.clock.now())
    }
}
