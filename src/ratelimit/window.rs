//! Per-key request window and the sliding-window admission step.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use super::policy::{Decision, Policy};

/// Timestamps of recently admitted requests for a single client key.
///
/// A window is only touched while its owning lock is held, so the
/// prune-count-append sequence in [`Window::admit`] is atomic with respect
/// to other requests for the same key.
#[derive(Debug)]
pub struct Window {
    /// Admitted request times in arrival order
    timestamps: VecDeque<Instant>,
    /// Whether `timestamps` is non-decreasing
    ordered: bool,
    /// Latest instant recorded by this window (creation or admission)
    last_active: Instant,
    /// Set once the window has been removed from its store
    evicted: bool,
}

impl Window {
    /// Create an empty window first seen at `now`.
    pub fn new(now: Instant) -> Self {
        Self {
            timestamps: VecDeque::new(),
            ordered: true,
            last_active: now,
            evicted: false,
        }
    }

    /// Discard every timestamp at least `window` older than `now`.
    ///
    /// Returns the number of discarded entries. Timestamps later than `now`
    /// are never discarded.
    pub fn prune(&mut self, now: Instant, window: Duration) -> usize {
        let before = self.timestamps.len();

        if self.ordered {
            // Entries behind the first retained one are no older than it.
            while let Some(&oldest) = self.timestamps.front() {
                if !is_expired(oldest, now, window) {
                    break;
                }
                self.timestamps.pop_front();
            }
        } else {
            self.timestamps.retain(|&t| !is_expired(t, now, window));
            self.ordered = is_sorted(&self.timestamps);
        }

        before - self.timestamps.len()
    }

    /// Run one admission step against `policy`.
    ///
    /// Prunes, then either records `now` and admits, or rejects without
    /// recording anything.
    pub fn admit(&mut self, now: Instant, policy: &Policy) -> Decision {
        self.prune(now, policy.window());

        if self.timestamps.len() >= policy.max_requests() {
            return Decision::Reject;
        }

        if self.timestamps.back().is_some_and(|&newest| now < newest) {
            self.ordered = false;
        }
        self.timestamps.push_back(now);
        if now > self.last_active {
            self.last_active = now;
        }

        Decision::Admit
    }

    /// How long this window has held no requests as of `now`.
    ///
    /// Prunes first. Returns `None` while any request is still inside the
    /// window. An emptied window counts as idle from the moment its newest
    /// request expired.
    pub fn idle_for(&mut self, now: Instant, window: Duration) -> Option<Duration> {
        self.prune(now, window);
        if !self.timestamps.is_empty() {
            return None;
        }

        let emptied_at = self.last_active.checked_add(window)?;
        Some(now.saturating_duration_since(emptied_at))
    }

    /// Number of retained timestamps, without pruning.
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Retained timestamps in arrival order.
    pub fn timestamps(&self) -> impl Iterator<Item = Instant> + '_ {
        self.timestamps.iter().copied()
    }

    pub fn is_evicted(&self) -> bool {
        self.evicted
    }

    pub(crate) fn mark_evicted(&mut self) {
        self.evicted = true;
    }
}

/// A timestamp expires once it is a full window old.
fn is_expired(t: Instant, now: Instant, window: Duration) -> bool {
    now.saturating_duration_since(t) >= window
}

fn is_sorted(timestamps: &VecDeque<Instant>) -> bool {
    timestamps
        .iter()
        .zip(timestamps.iter().skip(1))
        .all(|(a, b)| a <= b)
}
