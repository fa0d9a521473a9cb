//! # strata-mvcc
//!
//! Multi-version concurrency control for the Strata storage engine.
//!
//! This crate implements:
//! - Versioned entries stamped with creating and deleting transactions
//! - Read committed and repeatable read visibility
//! - Write-write conflict handling through the lock table, with
//!   automatic abort on deadlock or version skip
//!
//! ## Example
//!
//! ```rust,ignore
//! use strata_mvcc::{IsolationLevel, VersionManager};
//!
//! let vm = VersionManager::new(tm, dm);
//! let xid = vm.begin(IsolationLevel::RepeatableRead)?;
//! let uid = vm.insert(xid, b"row")?;
//! assert_eq!(vm.read(xid, uid)?, Some(b"row".to_vec()));
//! vm.commit(xid)?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod entry;
pub mod error;
pub mod manager;
pub mod transaction;
pub mod visibility;

pub use entry::Entry;
pub use error::{MvccError, MvccResult};
pub use manager::VersionManager;
pub use transaction::{Failure, IsolationLevel, Transaction};
