//! Error taxonomy for migration runs.
//!
//! Failures are split into two families. Fatal errors (an unreadable source,
//! a failed ID-map query, bad configuration, cancellation) unwind the
//! orchestrator. Everything else is counted against the entity that produced
//! it and surfaced through the run report.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Fatal
    SourceUnavailable,
    FkResolutionFailed,
    ConfigError,
    Cancelled,

    // Soft, counted per record or batch
    TableUnreadable,
    RecordMappingSkipped,
    BatchWriteFailed,
    FetchNotFound,
    FetchTransientFailure,

    // Target store
    StoreError,
}

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("legacy source unavailable at {path}: {reason}")]
    SourceUnavailable { path: String, reason: String },

    #[error("table {table} could not be read: {reason}")]
    TableUnreadable { table: String, reason: String },

    #[error("could not build {entity} id map: {reason}")]
    FkResolutionFailed { entity: String, reason: String },

    #[error("{entity} record skipped: {reason}")]
    RecordMappingSkipped { entity: String, reason: String },

    #[error("batch {index} of {entity} failed: {reason}")]
    BatchWriteFailed {
        entity: String,
        index: usize,
        reason: String,
    },

    #[error("not found: {url}")]
    FetchNotFound { url: String },

    #[error("fetch of {url} failed after {attempts} attempt(s): {last}")]
    FetchTransientFailure {
        url: String,
        attempts: u32,
        last: String,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("run aborted: {0}")]
    Aborted(String),

    #[error("target store error: {0}")]
    Store(String),
}

impl MigrationError {
    pub fn code(&self) -> ErrorCode {
        match self {
            MigrationError::SourceUnavailable { .. } => ErrorCode::SourceUnavailable,
            MigrationError::TableUnreadable { .. } => ErrorCode::TableUnreadable,
            MigrationError::FkResolutionFailed { .. } => ErrorCode::FkResolutionFailed,
            MigrationError::RecordMappingSkipped { .. } => ErrorCode::RecordMappingSkipped,
            MigrationError::BatchWriteFailed { .. } => ErrorCode::BatchWriteFailed,
            MigrationError::FetchNotFound { .. } => ErrorCode::FetchNotFound,
            MigrationError::FetchTransientFailure { .. } => ErrorCode::FetchTransientFailure,
            MigrationError::Config(_) => ErrorCode::ConfigError,
            MigrationError::Aborted(_) => ErrorCode::Cancelled,
            MigrationError::Store(_) => ErrorCode::StoreError,
        }
    }

    /// Fatal errors abort the whole run; the rest are counted and skipped.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            MigrationError::SourceUnavailable { .. }
                | MigrationError::FkResolutionFailed { .. }
                | MigrationError::Config(_)
                | MigrationError::Aborted(_)
        )
    }

    // Convenience constructors

    pub fn source_unavailable(path: impl std::fmt::Display, reason: impl std::fmt::Display) -> Self {
        Self::SourceUnavailable {
            path: path.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn table_unreadable(table: &str, reason: impl std::fmt::Display) -> Self {
        Self::TableUnreadable {
            table: table.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn fk_resolution(entity: impl std::fmt::Display, reason: impl std::fmt::Display) -> Self {
        Self::FkResolutionFailed {
            entity: entity.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn skipped(entity: impl std::fmt::Display, reason: impl Into<String>) -> Self {
        Self::RecordMappingSkipped {
            entity: entity.to_string(),
            reason: reason.into(),
        }
    }

    pub fn store(err: impl std::fmt::Display) -> Self {
        Self::Store(err.to_string())
    }
}

/// Captured error detail as it appears in the run report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorRecord {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
    /// Business keys of the offending records, when known.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keys: Vec<String>,
}

impl ErrorRecord {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            entity: None,
            keys: Vec::new(),
        }
    }

    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    pub fn with_keys(mut self, keys: Vec<String>) -> Self {
        self.keys = keys;
        self
    }
}

impl From<&MigrationError> for ErrorRecord {
    fn from(err: &MigrationError) -> Self {
        ErrorRecord::new(err.code(), err.to_string())
    }
}

/// Result type for migration operations.
pub type MigrationResult<T> = std::result::Result<T, MigrationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_split() {
        assert!(MigrationError::source_unavailable("x.db", "missing").is_fatal());
        assert!(MigrationError::fk_resolution("invoices", "query failed").is_fatal());
        assert!(MigrationError::Aborted("cancelled".into()).is_fatal());

        assert!(!MigrationError::skipped("companies", "no tax number").is_fatal());
        assert!(!MigrationError::table_unreadable("FIRME", "locked").is_fatal());
        assert!(
            !MigrationError::FetchNotFound {
                url: "http://x/1".into()
            }
            .is_fatal()
        );
    }

    #[test]
    fn test_code_serializes_screaming_snake() {
        let err = MigrationError::BatchWriteFailed {
            entity: "products".into(),
            index: 3,
            reason: "constraint".into(),
        };
        let record = ErrorRecord::from(&err).with_entity("products");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["code"], "BATCH_WRITE_FAILED");
        assert_eq!(json["entity"], "products");
        assert!(json.get("keys").is_none());
    }
}
