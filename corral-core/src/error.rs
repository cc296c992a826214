//! Error types for corral.
//!
//! All errors use `thiserror` for ergonomic error handling and proper error chains.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for corral operations.
pub type Result<T> = std::result::Result<T, CorralError>;

/// Main error type for corral.
#[derive(Error, Debug)]
pub enum CorralError {
    // Engine errors
    #[error("Container engine unavailable: {reason}. Is Docker running?")]
    EngineUnavailable { reason: String },

    #[error("Container engine command failed: {command}: {reason}")]
    EngineCommandFailed { command: String, reason: String },

    // Validation errors
    #[error("Validation failed: {reason}")]
    Validation { reason: String },

    #[error("Invalid backup manifest at {path:?}: {reason}")]
    InvalidManifest { path: PathBuf, reason: String },

    #[error("Backup bundle incomplete: missing {component}")]
    MissingBackupComponent { component: String },

    // Service errors
    #[error("Unknown service: {service}")]
    UnknownService { service: String },

    #[error("Failed to start native service {service}: {reason}")]
    NativeStartFailed { service: String, reason: String },

    #[error("Failed to stop native service {service}: {reason}")]
    NativeStopFailed { service: String, reason: String },

    // Lifecycle errors
    #[error("Failed to stop stack: {reason}")]
    StopFailed { reason: String },

    // Backup / restore errors
    #[error("Backup failed: {reason}")]
    BackupFailed { reason: String },

    #[error("Restore failed: {reason}")]
    RestoreFailed { reason: String },

    // Configuration errors
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    // File system errors
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CorralError {
    /// Create an Internal error from any error type.
    pub fn internal(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Internal(err.to_string())
    }
}
