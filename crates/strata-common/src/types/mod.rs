//! Core types for Strata.

mod ids;

pub use ids::{PageNo, Uid, Xid};
