//! Version-layer errors.

use thiserror::Error;

use strata_common::types::{Uid, Xid};
use strata_common::ErrorClass;
use strata_storage::StorageError;
use strata_txn::TxnError;

/// Result type for version-layer operations.
pub type MvccResult<T> = Result<T, MvccError>;

/// Errors raised by the version manager.
#[derive(Debug, Error)]
#[allow(missing_docs)] // Fields are documented by variant docs
pub enum MvccError {
    /// Storage failure.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Transaction status or lock failure.
    #[error(transparent)]
    Txn(#[from] TxnError),

    /// Waiting for the lock would close a cycle. The transaction has been
    /// aborted.
    #[error("deadlock: transaction {xid} waiting for {uid}; transaction aborted")]
    Deadlock { xid: Xid, uid: Uid },

    /// A transaction invisible to this one deleted the entry. The
    /// transaction has been aborted.
    #[error("concurrent update of {uid}; transaction {xid} aborted")]
    ConcurrentUpdate { xid: Xid, uid: Uid },

    /// No running transaction has this xid.
    #[error("unknown transaction {xid}")]
    UnknownTransaction { xid: Xid },

    /// The system transaction never commits or aborts.
    #[error("the system transaction cannot be ended")]
    SystemTransaction,
}

impl MvccError {
    /// Returns true if the transaction was aborted by the engine.
    pub fn is_concurrency_abort(&self) -> bool {
        matches!(self, Self::Deadlock { .. } | Self::ConcurrentUpdate { .. })
    }

    /// Returns the error class.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Storage(e) => e.class(),
            Self::Txn(e) => e.class(),
            Self::Deadlock { .. } | Self::ConcurrentUpdate { .. } => ErrorClass::Concurrency,
            Self::UnknownTransaction { .. } | Self::SystemTransaction => ErrorClass::Recoverable,
        }
    }
}
