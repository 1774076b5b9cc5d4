//! Error types and handling for `loopwork`.
//!
//! # Design
//!
//! - Uses `thiserror` for derive-based error types
//! - Corruption of persisted records is never an error (readers degrade to
//!   defaults), so there are no "corrupt file" variants here
//! - Outcome report failures carry the raw offending text for diagnostics
//! - Provides stable machine codes and recovery hints for the CLI

mod structured;

pub use structured::{StructuredError, find_similar_ids};

use std::path::PathBuf;
use thiserror::Error;

/// Primary error type for `loopwork` operations.
#[derive(Error, Debug)]
pub enum LoopError {
    // === Outcome Errors ===
    /// Report text could not be read as a structured object.
    #[error("Outcome parse error: {reason}")]
    OutcomeParse { reason: String, raw: String },

    /// Report parsed but failed field validation.
    #[error("Invalid {status} report: {}", format_validation_errors(.errors))]
    OutcomeValidation {
        status: String,
        errors: Vec<ValidationError>,
        raw: String,
    },

    // === Issue Errors ===
    /// Issue with the specified ID has no local record.
    #[error("Issue not found: {id}")]
    IssueNotFound { id: String },

    /// Status value is not part of the task vocabulary.
    #[error("Invalid status: {status}")]
    InvalidStatus { status: String },

    // === Remote Errors ===
    /// A remote tracker call failed.
    #[error("Remote tracker error for {id}: {reason}")]
    Remote { id: String, reason: String },

    // === Configuration Errors ===
    /// Configuration file or value error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// No state directory could be located.
    #[error("loopwork not initialized under '{path}'")]
    NotInitialized { path: PathBuf },

    // === I/O Errors ===
    /// File system I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Wrapped anyhow error (remote client implementations).
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// A single field validation error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// The field that failed validation.
    pub field: String,
    /// The reason for the validation failure.
    pub message: String,
}

impl ValidationError {
    /// Create a new validation error.
    #[must_use]
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl LoopError {
    /// Stable machine-readable code for this error.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::OutcomeParse { .. } => "OUTCOME_PARSE",
            Self::OutcomeValidation { .. } => "OUTCOME_INVALID",
            Self::IssueNotFound { .. } => "ISSUE_NOT_FOUND",
            Self::InvalidStatus { .. } => "INVALID_STATUS",
            Self::Remote { .. } => "REMOTE_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::NotInitialized { .. } => "NOT_INITIALIZED",
            Self::Io(_) => "IO_ERROR",
            Self::Json(_) | Self::Yaml(_) => "SERIALIZATION_ERROR",
            Self::Other(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether this error came from an execution report (retry candidate).
    #[must_use]
    pub const fn is_outcome_error(&self) -> bool {
        matches!(
            self,
            Self::OutcomeParse { .. } | Self::OutcomeValidation { .. }
        )
    }

    /// The raw report text that caused an outcome error.
    #[must_use]
    pub fn raw_text(&self) -> Option<&str> {
        match self {
            Self::OutcomeParse { raw, .. } | Self::OutcomeValidation { raw, .. } => Some(raw),
            _ => None,
        }
    }

    /// Field-level problems of a validation failure.
    #[must_use]
    pub fn validation_errors(&self) -> &[ValidationError] {
        match self {
            Self::OutcomeValidation { errors, .. } => errors,
            _ => &[],
        }
    }

    /// Human-friendly suggestion for fixing this error.
    #[must_use]
    pub const fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::NotInitialized { .. } => Some("Create a .loopwork directory or set LOOPWORK_DIR"),
            Self::InvalidStatus { .. } => {
                Some("Valid statuses: pending, ready, blocked, in_progress, done, failed")
            }
            Self::OutcomeParse { .. } => Some("Reports must be a JSON or YAML object"),
            Self::OutcomeValidation { .. } => {
                Some("Include every required field for the reported status")
            }
            _ => None,
        }
    }

    /// Get the exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::OutcomeParse { .. } | Self::OutcomeValidation { .. } => 2,
            _ => 1,
        }
    }
}

/// Result type using `LoopError`.
pub type Result<T> = std::result::Result<T, LoopError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LoopError::IssueNotFound {
            id: "MOB-123".to_string(),
        };
        assert_eq!(err.to_string(), "Issue not found: MOB-123");
    }

    #[test]
    fn test_validation_display_lists_every_field() {
        let err = LoopError::OutcomeValidation {
            status: "SUBTASK_COMPLETE".to_string(),
            errors: vec![
                ValidationError::new("commitHash", "required field missing"),
                ValidationError::new("filesModified", "expected an array of strings"),
            ],
            raw: "{}".to_string(),
        };
        let message = err.to_string();
        assert!(message.starts_with("Invalid SUBTASK_COMPLETE report"));
        assert!(message.contains("commitHash: required field missing"));
        assert!(message.contains("filesModified: expected an array of strings"));
    }

    #[test]
    fn test_raw_text_only_for_outcome_errors() {
        let err = LoopError::OutcomeParse {
            reason: "not an object".to_string(),
            raw: "hello".to_string(),
        };
        assert_eq!(err.raw_text(), Some("hello"));
        assert!(err.is_outcome_error());
        assert_eq!(err.exit_code(), 2);

        let err = LoopError::Config("bad".to_string());
        assert_eq!(err.raw_text(), None);
        assert!(!err.is_outcome_error());
        assert_eq!(err.code(), "CONFIG_ERROR");
    }

    #[test]
    fn test_validation_error_struct() {
        let err = ValidationError::new("timestamp", "required field missing");
        assert_eq!(err.to_string(), "timestamp: required field missing");
    }
}
