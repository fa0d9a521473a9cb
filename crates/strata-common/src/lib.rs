//! # strata-common
//!
//! Common types and constants for the Strata storage engine.
//!
//! This crate provides the foundational types used across every Strata
//! layer:
//!
//! - **Types**: Core identifiers (`PageNo`, `Uid`, `Xid`)
//! - **Errors**: The error classification shared by all layer errors
//! - **Constants**: Page geometry and reserved identifiers
//! - **Paths**: Derivation of the engine's file names from one prefix
//!
//! ## Example
//!
//! ```rust
//! use strata_common::types::{PageNo, Uid, Xid};
//!
//! let uid = Uid::new(PageNo::new(3), 42);
//! assert_eq!(uid.page_no(), PageNo::new(3));
//! assert_eq!(uid.offset(), 42);
//! assert!(Xid::SUPER.is_super());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod constants;
pub mod error;
pub mod path;
pub mod types;

// Re-export commonly used items at the crate root
pub use constants::*;
pub use error::ErrorClass;
pub use types::{PageNo, Uid, Xid};
