//! # strata-engine
//!
//! An embeddable, single-node transactional storage engine.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Engine                              │
//! │  begin / commit / abort / read / insert / delete            │
//! │  create_index / load_index / boot data                      │
//! ├──────────────────────────────┬──────────────────────────────┤
//! │   VersionManager (mvcc)      │   BPlusTree (storage)        │
//! │   visibility + LockTable     │   nodes under xid 0          │
//! ├──────────────────────────────┴──────────────────────────────┤
//! │                  DataManager (storage)                      │
//! │        PageCache ─ PageIndex ─ DataItem ─ recovery          │
//! ├───────────────────┬───────────────────┬─────────────────────┤
//! │   <path>.db       │   <path>.log      │   <path>.xid        │
//! │   data pages      │   Logger (wal)    │   TransactionManager│
//! └───────────────────┴───────────────────┴─────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use strata_engine::{Engine, EngineConfig, IsolationLevel};
//!
//! let engine = Engine::create(EngineConfig::new("/tmp/strata/main"))?;
//! let xid = engine.begin(IsolationLevel::RepeatableRead)?;
//! let uid = engine.insert(xid, b"hello")?;
//! assert_eq!(engine.read(xid, uid)?, Some(b"hello".to_vec()));
//! engine.commit(xid)?;
//! engine.close()?;
//! # Ok::<(), strata_engine::EngineError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod boot;
pub mod config;
pub mod engine;
pub mod error;

pub use boot::BootFile;
pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{EngineError, EngineResult};

pub use strata_common::types::{Uid, Xid};
pub use strata_mvcc::IsolationLevel;
pub use strata_storage::BPlusTree;
