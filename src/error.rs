//! Error types for the Windowgate service.

use thiserror::Error;

/// Main error type for Windowgate operations.
///
/// The admission decision itself never fails; these errors come from
/// configuration, policy construction and the HTTP listener.
#[derive(Error, Debug)]
pub enum GateError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A rate limit policy with an unusable limit or window
    #[error("Invalid policy: {0}")]
    InvalidPolicy(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Windowgate operations.
pub type Result<T> = std::result::Result<T, GateError>;
