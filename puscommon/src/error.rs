//! Error definitions for the PUS services

use thiserror::Error;

use crate::types::ReportId;

/// PUS service error types
#[derive(Error, Debug)]
pub enum PusError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Packet data field of {size} bytes exceeds {max}")]
    PacketTooLarge { size: usize, max: usize },

    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Event with ID {0} already exists")]
    DuplicateReport(ReportId),

    #[error("Event with ID {0} does not exist")]
    UnknownReport(ReportId),

    #[error("Invalid event report: {0}")]
    InvalidReport(String),
}

impl PusError {
    pub fn decode(msg: impl Into<String>) -> Self {
        PusError::Decode(msg.into())
    }
}

/// Result type alias for PUS operations
pub type PusResult<T> = Result<T, PusError>;
