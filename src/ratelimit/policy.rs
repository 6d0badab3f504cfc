//! Admission policy and decisions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::error::{GateError, Result};

/// Default number of requests admitted per window.
pub const DEFAULT_MAX_REQUESTS: usize = 10;
/// Default sliding window length.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(10);

/// Outcome of evaluating a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    /// The request may proceed
    Admit,
    /// The client is over its limit; the request must not proceed
    Reject,
}

impl Decision {
    /// Returns `true` for [`Decision::Admit`].
    pub fn is_admit(&self) -> bool {
        matches!(self, Decision::Admit)
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Admit => write!(f, "admit"),
            Decision::Reject => write!(f, "reject"),
        }
    }
}

/// Limits applied to every client key.
///
/// A policy is fixed once the store is built; there is no per-key override.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Policy {
    /// Maximum requests admitted within any window
    max_requests: usize,
    /// Length of the sliding window
    window: Duration,
    /// How long a window must have been empty before the sweep may evict it
    idle_retention: Duration,
}

impl Policy {
    /// Create a policy admitting `max_requests` per `window`.
    ///
    /// The idle retention defaults to one full window.
    pub fn new(max_requests: usize, window: Duration) -> Result<Self> {
        if max_requests == 0 {
            return Err(GateError::InvalidPolicy(
                "max_requests must be at least 1".to_string(),
            ));
        }
        if window.is_zero() {
            return Err(GateError::InvalidPolicy(
                "window duration must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            max_requests,
            window,
            idle_retention: window,
        })
    }

    /// Override how long an empty window is kept before eviction.
    pub fn with_idle_retention(mut self, idle_retention: Duration) -> Self {
        self.idle_retention = idle_retention;
        self
    }

    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn idle_retention(&self) -> Duration {
        self.idle_retention
    }
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            max_requests: DEFAULT_MAX_REQUESTS,
            window: DEFAULT_WINDOW,
            idle_retention: DEFAULT_WINDOW,
        }
    }
}
