//! Error types for the harvester pipeline

use thiserror::Error;

/// Result type alias for harvester operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Main error type for the harvester pipeline
///
/// HTTP 401 is deliberately *not* represented here: an expired token is a
/// signal handled in-band (token refresh and retry of the same call), never
/// an error that propagates.
#[derive(Error, Debug)]
pub enum HarvestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Upstream returned an unexpected response: {0}")]
    Upstream(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    #[error("Token endpoint unreachable after {attempts} attempts")]
    CredentialsExhausted { attempts: u32 },

    #[error("Giving up after {attempts} attempts, last error: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    #[error("Operation cancelled")]
    Cancelled,
}

impl HarvestError {
    /// Whether the pipeline should treat this error as a clean shutdown
    /// rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, HarvestError::Cancelled)
    }
}
