//! Error types for the MMS backup engine
//!
//! Every failure the backup manager can report is a distinct variant so
//! callers can tell "nothing happened" apart from "live data was touched".

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for libmms - convenience wrapper around Result<T, BackupError>
pub type Result<T> = std::result::Result<T, BackupError>;

#[derive(Debug, Error)]
pub enum BackupError {
    /// The live database (or a document) could not be read at backup time.
    #[error("source unavailable: {}: {source}", .path.display())]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The backup root (or a restore destination) could not be written.
    #[error("write failed: {}: {source}", .path.display())]
    WriteFailure {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// No backup artifact with this identifier exists in the backup root.
    #[error("backup not found: {identifier}")]
    NotFound { identifier: String },

    /// Restore was called without the explicit acknowledgement flag.
    #[error("restore of {identifier} requires explicit confirmation")]
    ConfirmationRequired { identifier: String },

    /// The pre-restore safety copy could not be made; live data untouched.
    #[error("safety backup failed, restore aborted: {source}")]
    SafetyBackupFailed {
        #[source]
        source: Box<BackupError>,
    },

    /// The archive is corrupt or lacks an expected entry.
    #[error("cannot extract {identifier}: {reason}")]
    ExtractionFailure { identifier: String, reason: String },

    /// Restore failed after touching live data; the pre-restore state was put
    /// back. `safety_backup` is `None` when there was no live database to copy.
    #[error(
        "restore of {identifier} failed and was rolled back (safety backup: {}): {source}",
        .safety_backup.as_deref().unwrap_or("none")
    )]
    RestoreFailedRolledBack {
        identifier: String,
        safety_backup: Option<String>,
        #[source]
        source: Box<BackupError>,
    },

    /// Restore failed and so did the rollback. Manual recovery needed.
    #[error(
        "restore of {identifier} failed ({source}) and rollback failed ({rollback}); \
         recover manually (safety backup: {})",
        .safety_backup.as_deref().unwrap_or("none")
    )]
    RestoreFailedUnrecoverable {
        identifier: String,
        safety_backup: Option<String>,
        #[source]
        source: Box<BackupError>,
        rollback: Box<BackupError>,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// SQLite error while verifying a backup
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl BackupError {
    pub(crate) fn source_unavailable(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::SourceUnavailable {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn write_failure(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::WriteFailure {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            identifier: identifier.into(),
        }
    }

    pub(crate) fn extraction(identifier: impl Into<String>, reason: impl ToString) -> Self {
        Self::ExtractionFailure {
            identifier: identifier.into(),
            reason: reason.to_string(),
        }
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// True when live data may no longer match either the backup or the
    /// pre-restore state.
    pub fn is_unrecoverable(&self) -> bool {
        matches!(self, Self::RestoreFailedUnrecoverable { .. })
    }
}
