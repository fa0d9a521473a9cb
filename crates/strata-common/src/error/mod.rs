//! Error classification for Strata.
//!
//! Each layer defines its own error enum. They all report one of the
//! classes below so callers can decide how to react without matching on
//! every variant.

use std::fmt;

/// How a caller should treat an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Corrupt or missing files, invalid configuration. The engine must not
    /// keep running; no partial recovery is attempted.
    Fatal,
    /// The operation failed without mutating state and may be retried or
    /// reported to the user.
    Recoverable,
    /// The transaction was aborted by the engine (deadlock or version skip)
    /// and must not be used again.
    Concurrency,
}

impl ErrorClass {
    /// Returns true for fatal errors.
    #[inline]
    #[must_use]
    pub const fn is_fatal(self) -> bool {
        matches!(self, Self::Fatal)
    }

    /// Returns the class name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Fatal => "Fatal",
            Self::Recoverable => "Recoverable",
            Self::Concurrency => "Concurrency",
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
