//! Storage-layer errors.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use strata_common::types::Uid;
use strata_common::ErrorClass;
use strata_txn::TxnError;
use strata_wal::WalError;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur in the page, data-item and index layers.
#[derive(Debug, Error)]
#[allow(missing_docs)] // Fields are documented by variant docs
pub enum StorageError {
    /// I/O error during page read/write.
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    /// Log failure.
    #[error(transparent)]
    Wal(#[from] WalError),

    /// Transaction status failure.
    #[error(transparent)]
    Txn(#[from] TxnError),

    /// The data file already exists.
    #[error("data file already exists: {path}")]
    FileExists { path: PathBuf },

    /// The data file does not exist.
    #[error("data file does not exist: {path}")]
    FileNotFound { path: PathBuf },

    /// The memory budget holds fewer pages than the cache needs.
    #[error("memory too small: {pages} pages, at least {min} required")]
    MemTooSmall { pages: usize, min: usize },

    /// Every cache slot is referenced.
    #[error("cache is full ({capacity} resident entries)")]
    CacheFull { capacity: usize },

    /// The item does not fit in a page.
    #[error("data too large: {size} bytes exceeds maximum {max} bytes")]
    DataTooLarge { size: usize, max: usize },

    /// No page with enough free space could be found.
    #[error("database busy: no page with enough free space")]
    DatabaseBusy,

    /// No valid item lives at the uid.
    #[error("no data item at {uid}")]
    ItemNotFound { uid: Uid },

    /// The bytes at the uid do not form a data item.
    #[error("corrupt data item at {uid}: {reason}")]
    CorruptItem { uid: Uid, reason: String },

    /// Configuration error.
    #[error("configuration error: {message}")]
    Config { message: String },
}

impl StorageError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a corrupt item error.
    pub fn corrupt_item(uid: Uid, reason: impl Into<String>) -> Self {
        Self::CorruptItem {
            uid,
            reason: reason.into(),
        }
    }

    /// Returns true if this is a transient error that can be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::CacheFull { .. } | Self::DatabaseBusy)
    }

    /// Returns the error class.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Wal(e) => e.class(),
            Self::Txn(e) => e.class(),
            Self::CacheFull { .. }
            | Self::DataTooLarge { .. }
            | Self::DatabaseBusy
            | Self::ItemNotFound { .. } => ErrorClass::Recoverable,
            _ => ErrorClass::Fatal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_common::types::{PageNo, Xid};

    #[test]
    fn test_is_retryable() {
        assert!(StorageError::DatabaseBusy.is_retryable());
        assert!(StorageError::CacheFull { capacity: 10 }.is_retryable());
        assert!(!StorageError::config("x").is_retryable());
    }

    #[test]
    fn test_classes() {
        assert_eq!(
            StorageError::DataTooLarge { size: 9000, max: 8190 }.class(),
            ErrorClass::Recoverable
        );
        assert!(StorageError::MemTooSmall { pages: 2, min: 10 }.class().is_fatal());

        let deadlock: StorageError = TxnError::Deadlock {
            xid: Xid::new(1),
            uid: Uid::new(PageNo::new(2), 0),
        }
        .into();
        assert_eq!(deadlock.class(), ErrorClass::Concurrency);
    }
}
