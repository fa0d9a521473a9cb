//! Core identifier types for Strata.
//!
//! These types provide type-safe wrappers around numeric identifiers,
//! preventing accidental misuse of page numbers, item locators and
//! transaction ids.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Page number - identifies a page in the data file.
///
/// Page numbers start at 1. Page 1 is the metadata page and is never
/// handed out for ordinary data.
///
/// # Example
///
/// ```rust
/// use strata_common::types::PageNo;
///
/// let page = PageNo::new(42);
/// assert_eq!(page.as_u32(), 42);
/// assert_eq!(page.file_offset(), 41 * 8192);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct PageNo(u32);

impl PageNo {
    /// Invalid page number, used as a sentinel value.
    pub const INVALID: Self = Self(0);

    /// The metadata page.
    pub const META: Self = Self(1);

    /// Creates a new `PageNo` from a raw u32 value.
    #[inline]
    #[must_use]
    pub const fn new(no: u32) -> Self {
        Self(no)
    }

    /// Returns the raw u32 value.
    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Checks if this is a valid page number.
    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != Self::INVALID.0
    }

    /// Returns the byte offset of this page in the data file.
    #[inline]
    #[must_use]
    pub const fn file_offset(self) -> u64 {
        (self.0 as u64 - 1) * crate::constants::PAGE_SIZE as u64
    }
}

impl fmt::Debug for PageNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::INVALID {
            write!(f, "PageNo(INVALID)")
        } else {
            write!(f, "PageNo({})", self.0)
        }
    }
}

impl fmt::Display for PageNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for PageNo {
    #[inline]
    fn from(no: u32) -> Self {
        Self::new(no)
    }
}

impl From<PageNo> for u32 {
    #[inline]
    fn from(no: PageNo) -> Self {
        no.0
    }
}

/// Item locator - `(page number << 32) | in-page offset`.
///
/// A uid stays valid for as long as the item it points at is not
/// reclaimed.
///
/// # Example
///
/// ```rust
/// use strata_common::types::{PageNo, Uid};
///
/// let uid = Uid::new(PageNo::new(2), 10);
/// assert_eq!(uid.as_u64(), (2u64 << 32) | 10);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Uid(u64);

impl Uid {
    /// Null uid. No item lives on page 0.
    pub const NULL: Self = Self(0);

    /// Builds a uid from a page number and an in-page offset.
    #[inline]
    #[must_use]
    pub const fn new(page_no: PageNo, offset: u16) -> Self {
        Self(((page_no.as_u32() as u64) << 32) | offset as u64)
    }

    /// Wraps a raw u64 value.
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw u64 value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the page the item lives on.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn page_no(self) -> PageNo {
        PageNo::new((self.0 >> 32) as u32)
    }

    /// Returns the item's offset inside its page.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn offset(self) -> u16 {
        (self.0 & 0xFFFF) as u16
    }

    /// Returns true for the null uid.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Uid({}:{})", self.page_no().as_u32(), self.offset())
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.page_no().as_u32(), self.offset())
    }
}

impl From<u64> for Uid {
    #[inline]
    fn from(raw: u64) -> Self {
        Self::from_raw(raw)
    }
}

impl From<Uid> for u64 {
    #[inline]
    fn from(uid: Uid) -> Self {
        uid.0
    }
}

/// Transaction identifier.
///
/// Transaction ids are assigned monotonically starting at 1. Id 0 is the
/// system transaction: it is always committed and is used for index and
/// metadata writes.
///
/// # Example
///
/// ```rust
/// use strata_common::types::Xid;
///
/// let xid = Xid::new(1);
/// assert!(!xid.is_super());
/// assert!(Xid::new(2) > xid);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Xid(u64);

impl Xid {
    /// The system transaction.
    pub const SUPER: Self = Self(0);

    /// Creates a new `Xid` from a raw u64 value.
    #[inline]
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw u64 value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns true for the system transaction.
    #[inline]
    #[must_use]
    pub const fn is_super(self) -> bool {
        self.0 == Self::SUPER.0
    }
}

impl fmt::Debug for Xid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_super() {
            write!(f, "Xid(SUPER)")
        } else {
            write!(f, "Xid({})", self.0)
        }
    }
}

impl fmt::Display for Xid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Xid {
    #[inline]
    fn from(id: u64) -> Self {
        Self::new(id)
    }
}

impl From<Xid> for u64 {
    #[inline]
    fn from(xid: Xid) -> Self {
        xid.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_no() {
        let page = PageNo::new(42);
        assert_eq!(page.as_u32(), 42);
        assert!(page.is_valid());
        assert!(!PageNo::INVALID.is_valid());
        assert_eq!(PageNo::META.file_offset(), 0);
        assert_eq!(PageNo::new(3).file_offset(), 2 * 8192);
    }

    #[test]
    fn test_uid_parts() {
        let uid = Uid::new(PageNo::new(7), 0x1234);
        assert_eq!(uid.page_no(), PageNo::new(7));
        assert_eq!(uid.offset(), 0x1234);
        assert_eq!(Uid::from_raw(uid.as_u64()), uid);
        assert!(!uid.is_null());
        assert!(Uid::NULL.is_null());
        assert_eq!(uid.to_string(), "7:4660");
    }

    #[test]
    fn test_uid_high_page() {
        let uid = Uid::new(PageNo::new(u32::MAX), u16::MAX);
        assert_eq!(uid.page_no().as_u32(), u32::MAX);
        assert_eq!(uid.offset(), u16::MAX);
    }

    #[test]
    fn test_xid() {
        assert!(Xid::SUPER.is_super());
        assert!(!Xid::new(1).is_super());
        assert_eq!(format!("{:?}", Xid::SUPER), "Xid(SUPER)");
        assert_eq!(format!("{:?}", Xid::new(5)), "Xid(5)");
    }

    #[test]
    fn test_ordering() {
        assert!(PageNo::new(1) < PageNo::new(2));
        assert!(Xid::new(1) < Xid::new(2));
        assert!(Uid::new(PageNo::new(1), 500) < Uid::new(PageNo::new(2), 0));
    }
}
