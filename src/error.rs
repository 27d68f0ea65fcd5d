//! Error types for KotaDB.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (2=db, 3=not_found, 4=validation, etc.)
//! - Context-aware recovery hints
//! - Structured JSON output for piped / non-TTY consumers

use std::path::PathBuf;
use thiserror::Error;

use crate::sync::SyncError;

/// Result type alias for KotaDB operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Database (exit 2)
    NotInitialized,
    DatabaseError,

    // Not Found (exit 3)
    FileNotFound,
    RepositoryNotFound,
    JobNotFound,

    // Validation (exit 4)
    InvalidArgument,

    // Sync (exit 6)
    SyncError,

    // Config (exit 7)
    ConfigError,

    // I/O (exit 8)
    IoError,
    JsonError,

    // Internal (exit 1)
    InternalError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::NotInitialized => "NOT_INITIALIZED",
            Self::DatabaseError => "DATABASE_ERROR",
            Self::FileNotFound => "FILE_NOT_FOUND",
            Self::RepositoryNotFound => "REPOSITORY_NOT_FOUND",
            Self::JobNotFound => "JOB_NOT_FOUND",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::SyncError => "SYNC_ERROR",
            Self::ConfigError => "CONFIG_ERROR",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Category-based exit code.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InternalError => 1,
            Self::NotInitialized | Self::DatabaseError => 2,
            Self::FileNotFound | Self::RepositoryNotFound | Self::JobNotFound => 3,
            Self::InvalidArgument => 4,
            Self::SyncError => 6,
            Self::ConfigError => 7,
            Self::IoError | Self::JsonError => 8,
        }
    }

    /// Whether a caller may reasonably retry the same call.
    ///
    /// Only lock contention on the database and bad input qualify.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::InvalidArgument | Self::DatabaseError)
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur in KotaDB operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Not initialized: no database at {path}")]
    NotInitialized { path: PathBuf },

    #[error("File not found: {id}")]
    FileNotFound { id: String },

    #[error("Repository not found: {id}")]
    RepositoryNotFound { id: String },

    #[error("Index job not found: {id}")]
    JobNotFound { id: String },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::NotInitialized { .. } => ErrorCode::NotInitialized,
            Self::Database(_) => ErrorCode::DatabaseError,
            Self::FileNotFound { .. } => ErrorCode::FileNotFound,
            Self::RepositoryNotFound { .. } => ErrorCode::RepositoryNotFound,
            Self::JobNotFound { .. } => ErrorCode::JobNotFound,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::Sync(_) => ErrorCode::SyncError,
            Self::Config(_) => ErrorCode::ConfigError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
            Self::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// Context-aware recovery hint.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::NotInitialized { .. } => {
                Some("Run `kota init` in the project root to create the database".to_string())
            }
            Self::FileNotFound { id } => Some(format!(
                "No indexed file with ID '{id}'. Use `kota recent` to list indexed files."
            )),
            Self::RepositoryNotFound { id } => Some(format!(
                "No repository '{id}'. Repositories are created by the indexer."
            )),
            Self::Sync(SyncError::ExportDirMissing(path)) => Some(format!(
                "Create {path} or run `kota sync export` once before watching."
            )),
            Self::Sync(SyncError::Database(msg)) if msg.contains("locked") => {
                Some("Another process holds the write lock; retry shortly.".to_string())
            }
            _ => None,
        }
    }

    /// Structured JSON representation for machine consumption.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "retryable": code.is_retryable(),
                "exit_code": code.exit_code(),
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_by_category() {
        assert_eq!(Error::FileNotFound { id: "f".into() }.exit_code(), 3);
        assert_eq!(Error::InvalidArgument("x".into()).exit_code(), 4);
        assert_eq!(Error::Config("x".into()).exit_code(), 7);
        assert_eq!(
            Error::Sync(SyncError::ExportDirMissing("/nope".into())).exit_code(),
            6
        );
    }

    #[test]
    fn test_structured_json_includes_hint() {
        let err = Error::NotInitialized {
            path: PathBuf::from("/tmp/kota.db"),
        };
        let json = err.to_structured_json();
        assert_eq!(json["error"]["code"], "NOT_INITIALIZED");
        assert_eq!(json["error"]["exit_code"], 2);
        assert!(json["error"]["hint"].as_str().unwrap().contains("kota init"));
    }
}
