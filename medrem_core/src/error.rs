//! Error types for the medrem_core library.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for medrem_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid medicine, reminder or rule
    #[error("Validation error: {0}")]
    Validation(String),

    /// Lookup by id or id prefix found nothing
    #[error("Not found: {0}")]
    NotFound(String),

    /// Registry or record log could not be used as-is
    #[error("State error: {0}")]
    State(String),

    /// Export file written by an unknown format version
    #[error("Unsupported export version: {0}")]
    UnsupportedVersion(String),
}
