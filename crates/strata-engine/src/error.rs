//! Engine errors.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use strata_common::ErrorClass;
use strata_mvcc::MvccError;
use strata_storage::StorageError;
use strata_txn::TxnError;
use strata_wal::WalError;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors surfaced by the engine handle.
#[derive(Debug, Error)]
#[allow(missing_docs)] // Fields are documented by variant docs
pub enum EngineError {
    /// Version-layer failure.
    #[error(transparent)]
    Mvcc(#[from] MvccError),

    /// Storage failure.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Transaction status failure.
    #[error(transparent)]
    Txn(#[from] TxnError),

    /// Log failure.
    #[error(transparent)]
    Wal(#[from] WalError),

    /// I/O error outside the layered files.
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    /// The boot file already exists.
    #[error("boot file already exists: {path}")]
    BootExists { path: PathBuf },

    /// The boot file is missing.
    #[error("boot file does not exist: {path}")]
    BootMissing { path: PathBuf },

    /// Invalid configuration.
    #[error("configuration error: {message}")]
    Config { message: String },

    /// The configuration file could not be parsed.
    #[error("invalid configuration file: {source}")]
    ConfigParse {
        #[from]
        source: toml::de::Error,
    },

    /// The configuration could not be serialized.
    #[error("cannot serialize configuration: {source}")]
    ConfigSerialize {
        #[from]
        source: toml::ser::Error,
    },
}

impl EngineError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Returns true if the engine aborted the caller's transaction.
    pub fn is_concurrency_abort(&self) -> bool {
        matches!(self, Self::Mvcc(e) if e.is_concurrency_abort())
    }

    /// Returns the error class.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Mvcc(e) => e.class(),
            Self::Storage(e) => e.class(),
            Self::Txn(e) => e.class(),
            Self::Wal(e) => e.class(),
            _ => ErrorClass::Fatal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_common::types::Xid;

    #[test]
    fn test_class_passes_through() {
        let err: EngineError = MvccError::UnknownTransaction { xid: Xid::new(3) }.into();
        assert_eq!(err.class(), ErrorClass::Recoverable);
        assert!(!err.is_concurrency_abort());

        let err: EngineError = StorageError::MemTooSmall { pages: 1, min: 10 }.into();
        assert!(err.class().is_fatal());
        assert!(EngineError::config("bad").class().is_fatal());
    }
}
