//! # strata-wal
//!
//! Write-Ahead Log for the Strata storage engine.
//!
//! The log is a single append-only file. Every logical mutation of a data
//! page is appended here before the page may be written back.
//!
//! # File Format
//!
//! ```text
//! ┌──────────────────┬──────────┬──────────┬─────┬──────────────┐
//! │ running checksum │ record 0 │ record 1 │ ... │ bad tail ... │
//! │     4 bytes      │          │          │     │  (discarded) │
//! └──────────────────┴──────────┴──────────┴─────┴──────────────┘
//!
//! record = ┌──────────┬──────────┬─────────────────┐
//!          │ size (4) │ csum (4) │ payload (size)  │
//!          └──────────┴──────────┴─────────────────┘
//! ```
//!
//! The header checksum folds every byte of every complete record. It is
//! verified on open; a mismatch means the log is corrupt and the engine
//! refuses to start. Records that fail their own checksum (or are cut
//! short) at the end of the file form the bad tail, which is truncated.
//!
//! # Payloads
//!
//! - **Insert**: `[0][xid 8][page 4][offset 2][raw]`
//! - **Update**: `[1][xid 8][uid 8][old raw][new raw]`

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod logger;
pub mod record;

pub use config::{SyncPolicy, WalConfig};
pub use error::{WalError, WalResult};
pub use logger::Logger;
pub use record::{checksum, LogRecord, RecordHeader, RecordType};
