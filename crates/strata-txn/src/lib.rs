//! # strata-txn
//!
//! Transaction bookkeeping for the Strata storage engine.
//!
//! This crate provides:
//!
//! - **Transaction Status Store**: a persistent, append-growing table
//!   mapping every xid ever begun to active, committed or aborted.
//!
//! - **Lock Table**: exclusive per-uid locks used for write-write
//!   conflicts, with blocking wait handles.
//!
//! - **Deadlock Detection**: a stamped depth-first search over the
//!   wait-for graph, run synchronously before a requester is allowed to
//!   block.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                     Version Manager                        │
//! │              (begin / commit / abort / delete)             │
//! └────────────────────────────────────────────────────────────┘
//!                │                              │
//!                ▼                              ▼
//! ┌──────────────────────────┐    ┌──────────────────────────┐
//! │    TransactionManager    │    │        LockTable         │
//! │  [count 8B][status 1B]*  │    │  x2u  u2x  wait  waitU   │
//! └──────────────────────────┘    └──────────────────────────┘
//!                                               │
//!                                               ▼
//!                                 ┌──────────────────────────┐
//!                                 │       WaitForGraph       │
//!                                 │   (stamped cycle DFS)    │
//!                                 └──────────────────────────┘
//! ```
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use strata_txn::TransactionManager;
//!
//! let tm = TransactionManager::create("/tmp/strata")?;
//! let xid = tm.begin()?;
//! assert!(tm.is_active(xid)?);
//! tm.commit(xid)?;
//! assert!(tm.is_committed(xid)?);
//! # Ok::<(), strata_txn::TxnError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Transaction status store.
///
/// This module provides:
/// - [`manager::TransactionManager`]: the `.xid` file
/// - [`manager::XidStatus`]: the per-transaction status byte
pub mod manager;

/// Lock table implementation.
///
/// This module provides:
/// - [`lock::LockTable`]: per-uid exclusive locks with wait queues
/// - [`lock::WaitHandle`]: what a blocked requester waits on
pub mod lock;

/// Deadlock detection.
///
/// This module provides:
/// - [`deadlock::WaitForGraph`]: a view over the lock table's maps
pub mod deadlock;

mod error;

// Re-export commonly used types

pub use error::{TxnError, TxnResult};
pub use manager::{TransactionManager, XidStatus};
pub use lock::{LockStats, LockTable, WaitHandle};
pub use deadlock::WaitForGraph;
