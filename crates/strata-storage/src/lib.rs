//! # strata-storage
//!
//! Paged storage for the Strata storage engine.
//!
//! This crate turns a data file and a write-ahead log into a store of
//! addressable, crash-safe byte strings ("data items"), and builds a
//! B+-tree index on top of them.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                       BPlusTree                         │
//! ├─────────────────────────────────────────────────────────┤
//! │                      DataManager                        │
//! │  ┌────────────────┐ ┌──────────────┐ ┌──────────────┐   │
//! │  │ RefCountCache  │ │  PageIndex   │ │    Logger    │   │
//! │  │  <DataItem>    │ │ (free space) │ │  (strata-wal)│   │
//! │  └───────┬────────┘ └──────────────┘ └──────────────┘   │
//! ├──────────┼──────────────────────────────────────────────┤
//! │          ▼          PageCache                           │
//! │            RefCountCache<Page> ──► PageFile (.db)       │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Key Components
//!
//! - [`RefCountCache`]: resources stay resident while referenced and are
//!   written back on the last release
//! - [`PageCache`]: the data file as a cache of 8 KB pages
//! - [`DataManager`]: insert/read of data items, logging and recovery
//! - [`DataItem`]: one item plus the `before`/`after` change bracket
//! - [`BPlusTree`]: `u64` key index stored as system data items

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod btree;
pub mod buffer;
pub mod cache;
pub mod error;
pub mod file;
pub mod free_space;
pub mod item;
pub mod manager;
pub mod page;
pub mod recovery;

pub use btree::BPlusTree;
pub use buffer::{PageCache, PageCacheConfig};
pub use cache::{CacheSource, RefCountCache};
pub use error::{StorageError, StorageResult};
pub use item::{DataItem, ItemUpdate};
pub use manager::{DataManager, DataManagerConfig};
pub use page::Page;
pub use recovery::RecoveryStats;
