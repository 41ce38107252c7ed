//! Error types for caldera-sink

use thiserror::Error;

/// Main error type for the caldera-sink library
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed record input (empty external id, mismatched queue kind)
    #[error("validation error: {0}")]
    Validation(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Network-level failure talking to the Caldera API
    #[error("transport error: {0}")]
    Transport(String),

    /// Non-success response from the Caldera API
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
}

/// Result type alias for caldera-sink
pub type Result<T> = std::result::Result<T, Error>;
