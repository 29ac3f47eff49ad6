//! Error types for the habit engine
//!
//! Analytics functions are total and never fail. Errors only come from the
//! boundary: referential integrity of the supplied records, JSON input and
//! output, configuration loading and cache persistence.

use thiserror::Error;

/// Errors that can occur at the engine boundary
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Log {log_id} references unknown habit {habit_id}")]
    DataIntegrity { log_id: String, habit_id: String },

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Failed to parse input: {0}")]
    ParseError(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl EngineError {
    /// True when the error indicates corrupted upstream records rather than bad input
    pub fn is_integrity_fault(&self) -> bool {
        matches!(self, EngineError::DataIntegrity { .. })
    }
}
