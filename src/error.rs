//! Error types for the Empath engine

use thiserror::Error;

/// Errors that can occur while fusing readings or driving the engine
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid {source_kind} reading: {reason}")]
    InvalidReading { source_kind: String, reason: String },

    #[error("Duplicate {0} reading in a single cycle")]
    DuplicateSource(String),

    #[error("Unknown threshold: {0}")]
    UnknownThreshold(String),

    #[error("Invalid engine configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to parse cycle input: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Dispatch error: {0}")]
    DispatchError(String),
}
