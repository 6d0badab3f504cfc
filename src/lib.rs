//! Windowgate - Sliding-Window Admission Control
//!
//! This crate decides, for each inbound request, whether a client may proceed
//! based on how many of its requests were admitted within a sliding time
//! window. State is held per client key with per-key locking, and idle keys
//! are evicted by a periodic sweep so memory stays bounded.

pub mod config;
pub mod error;
pub mod http;
pub mod ratelimit;
