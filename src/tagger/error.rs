//! Error types for the tagger engine.
//!
//! Every variant is locally recoverable; callers log and degrade to stale but
//! consistent state rather than propagating to the operator.

use thiserror::Error;

/// Errors surfaced by collaborators or by the engine itself.
#[derive(Debug, Error)]
pub enum TaggerError {
    /// A control or its label could not be looked up (node vanished mid-scan).
    #[error("Discovery error: {0}")]
    Discovery(String),

    /// Simulated activation of a control failed.
    #[error("Actuation error: {0}")]
    Actuation(String),

    /// Loading or saving persisted state failed.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// A scan cycle failed and was aborted.
    #[error("Scan error: {0}")]
    Scan(String),

    /// Malformed configuration or phrase table.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Submission sink rejected a record.
    #[error("Submission error: {0}")]
    Submission(String),

    /// JSON (de)serialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for tagger operations.
pub type TaggerResult<T> = Result<T, TaggerError>;
