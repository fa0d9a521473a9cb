//! WAL record format.
//!
//! - [`header`]: the `[size][checksum]` frame around each payload and the
//!   checksum fold shared with the file header
//! - [`types`]: the insert and update payloads

pub mod header;
pub mod types;

pub use header::{checksum, RecordHeader, CHECKSUM_SEED};
pub use types::{LogRecord, RecordType};
