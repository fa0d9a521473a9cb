//! Running transactions.

use std::collections::HashSet;
use std::fmt;

use parking_lot::Mutex;

use strata_common::types::{Uid, Xid};

use crate::error::MvccError;

/// Isolation level of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IsolationLevel {
    /// Sees every committed version at the time of each read.
    #[default]
    ReadCommitted,
    /// Sees only versions committed before the transaction began.
    RepeatableRead,
}

impl IsolationLevel {
    /// Returns true if the level needs a begin-time snapshot.
    pub fn uses_snapshot(self) -> bool {
        self == Self::RepeatableRead
    }
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadCommitted => write!(f, "READ COMMITTED"),
            Self::RepeatableRead => write!(f, "REPEATABLE READ"),
        }
    }
}

/// Why the engine aborted a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// A lock wait would have deadlocked.
    Deadlock {
        /// The contested entry.
        uid: Uid,
    },
    /// A version skip was detected.
    ConcurrentUpdate {
        /// The contested entry.
        uid: Uid,
    },
}

impl Failure {
    /// Converts to the error raised to the caller.
    pub fn to_error(self, xid: Xid) -> MvccError {
        match self {
            Self::Deadlock { uid } => MvccError::Deadlock { xid, uid },
            Self::ConcurrentUpdate { uid } => MvccError::ConcurrentUpdate { xid, uid },
        }
    }
}

#[derive(Debug, Default)]
struct TxnState {
    failure: Option<Failure>,
    auto_aborted: bool,
}

/// A running transaction.
#[derive(Debug)]
pub struct Transaction {
    xid: Xid,
    level: IsolationLevel,
    /// Transactions active when this one began. Empty under read committed.
    snapshot: HashSet<Xid>,
    state: Mutex<TxnState>,
}

impl Transaction {
    /// Creates a transaction. The snapshot is dropped under read committed.
    pub fn new(xid: Xid, level: IsolationLevel, snapshot: HashSet<Xid>) -> Self {
        Self {
            xid,
            level,
            snapshot: if level.uses_snapshot() {
                snapshot
            } else {
                HashSet::new()
            },
            state: Mutex::new(TxnState::default()),
        }
    }

    /// Returns the xid.
    pub fn xid(&self) -> Xid {
        self.xid
    }

    /// Returns the isolation level.
    pub fn level(&self) -> IsolationLevel {
        self.level
    }

    /// Returns true if `xid` was active when this transaction began.
    pub fn in_snapshot(&self, xid: Xid) -> bool {
        self.snapshot.contains(&xid)
    }

    /// Returns the recorded failure, if any.
    pub fn failure(&self) -> Option<Failure> {
        self.state.lock().failure
    }

    /// Fails with the recorded failure, if any.
    pub fn check(&self) -> Result<(), MvccError> {
        match self.failure() {
            Some(failure) => Err(failure.to_error(self.xid)),
            None => Ok(()),
        }
    }

    pub(crate) fn fail(&self, failure: Failure) {
        self.state.lock().failure = Some(failure);
    }

    /// Returns true if the engine already aborted this transaction.
    pub fn is_auto_aborted(&self) -> bool {
        self.state.lock().auto_aborted
    }

    pub(crate) fn set_auto_aborted(&self) {
        self.state.lock().auto_aborted = true;
    }
}
