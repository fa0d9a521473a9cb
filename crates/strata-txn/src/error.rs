//! Transaction-layer errors.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use strata_common::types::{Uid, Xid};
use strata_common::ErrorClass;

/// Result type for transaction-layer operations.
pub type TxnResult<T> = Result<T, TxnError>;

/// Errors raised by the status store and the lock table.
#[derive(Debug, Error)]
pub enum TxnError {
    /// I/O error on the status file.
    #[error("transaction file I/O error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    /// The status file already exists.
    #[error("transaction file already exists: {path}")]
    FileExists { path: PathBuf },

    /// The status file does not exist.
    #[error("transaction file does not exist: {path}")]
    FileNotFound { path: PathBuf },

    /// The stored counter disagrees with the file length.
    #[error("bad transaction file: header says {count} transactions, file holds {len} bytes")]
    BadXidFile { count: u64, len: u64 },

    /// The status byte is not one of the known values.
    #[error("bad status byte {byte:#04x} for transaction {xid}")]
    BadStatus { xid: Xid, byte: u8 },

    /// The transaction was never begun.
    #[error("unknown transaction {xid}")]
    UnknownXid { xid: Xid },

    /// Waiting for `uid` would close a cycle in the wait-for graph.
    #[error("deadlock: transaction {xid} waiting for {uid}")]
    Deadlock { xid: Xid, uid: Uid },
}

impl TxnError {
    /// Returns true if this is a deadlock.
    pub fn is_deadlock(&self) -> bool {
        matches!(self, Self::Deadlock { .. })
    }

    /// Returns the error class.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Deadlock { .. } => ErrorClass::Concurrency,
            Self::UnknownXid { .. } => ErrorClass::Recoverable,
            _ => ErrorClass::Fatal,
        }
    }
}
