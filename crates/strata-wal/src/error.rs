//! WAL error types.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use strata_common::ErrorClass;

/// Result type for WAL operations.
pub type WalResult<T> = Result<T, WalError>;

/// Errors that can occur during WAL operations.
#[derive(Debug, Error)]
pub enum WalError {
    /// I/O error during WAL operations.
    #[error("WAL I/O error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    /// The log file already exists.
    #[error("log file already exists: {path}")]
    FileExists { path: PathBuf },

    /// The log file does not exist.
    #[error("log file does not exist: {path}")]
    FileNotFound { path: PathBuf },

    /// The file is too short to hold the checksum header.
    #[error("log file too short: {len} bytes")]
    BadLogFile { len: u64 },

    /// The running checksum does not match the stored header.
    #[error("log checksum mismatch: header {stored:#010x}, computed {computed:#010x}")]
    ChecksumMismatch { stored: u32, computed: u32 },

    /// A log payload could not be decoded.
    #[error("failed to decode log record: {reason}")]
    Decode { reason: String },
}

impl WalError {
    /// Creates a decode error.
    pub fn decode(reason: impl Into<String>) -> Self {
        Self::Decode {
            reason: reason.into(),
        }
    }

    /// Returns true if this is a corruption error.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Self::ChecksumMismatch { .. } | Self::BadLogFile { .. } | Self::Decode { .. }
        )
    }

    /// Returns the error class. Every WAL failure is fatal to the engine.
    pub fn class(&self) -> ErrorClass {
        ErrorClass::Fatal
    }
}
