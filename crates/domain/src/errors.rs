//! Error types used throughout the engine

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for datebook
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum DatebookError {
    /// The calendar service failed or refused the request.
    #[error("Backend error: {0}")]
    Backend(String),

    /// The engine shut down before the work finished.
    #[error("Operation cancelled")]
    Cancelled,

    /// Configuration could not be read or is invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// No such source, object or file.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed or out-of-range arguments.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Unknown or unusable timezone.
    #[error("Timezone error: {0}")]
    Timezone(String),

    /// Bug or broken internal invariant.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DatebookError {
    /// Cancellation is expected during teardown and must never be reported.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Stable label suitable for structured log fields.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Backend(_) => "backend",
            Self::Cancelled => "cancelled",
            Self::Config(_) => "config",
            Self::NotFound(_) => "not_found",
            Self::InvalidInput(_) => "invalid_input",
            Self::Timezone(_) => "timezone",
            Self::Internal(_) => "internal",
        }
    }
}

/// Result type alias for datebook operations
pub type Result<T> = std::result::Result<T, DatebookError>;
