//! Admission control trait consumed by the HTTP layer.

use super::key::ClientKey;
use super::policy::Decision;

/// Trait for anything that can admit or reject a request for a client.
///
/// The HTTP middleware and decision routes are written against this trait
/// rather than a concrete limiter.
pub trait AdmissionControl: Send + Sync {
    /// Decide whether one request from `key` may proceed right now.
    fn check(&self, key: &ClientKey) -> Decision;
}
