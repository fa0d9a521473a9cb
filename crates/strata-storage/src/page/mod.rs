//! In-memory pages.
//!
//! A [`Page`] is the cached image of one `PAGE_SIZE` block of the data
//! file. Two layouts exist:
//!
//! - [`meta`]: page 1, carrying the open/close marker.
//! - [`data`]: every other page, a free-space offset followed by items.

pub mod data;
pub mod meta;

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use strata_common::constants::PAGE_SIZE;
use strata_common::types::PageNo;

/// A cached page.
///
/// The page data is guarded by its own lock; the dirty flag is atomic so
/// it can be raised without holding the data lock.
pub struct Page {
    /// Page number in the data file.
    page_no: PageNo,
    /// Page data buffer.
    data: RwLock<Vec<u8>>,
    /// Whether the page differs from its on-disk image.
    dirty: AtomicBool,
}

impl Page {
    /// Creates a clean page over `data`.
    pub fn new(page_no: PageNo, data: Vec<u8>) -> Self {
        debug_assert_eq!(data.len(), PAGE_SIZE);
        Self {
            page_no,
            data: RwLock::new(data),
            dirty: AtomicBool::new(false),
        }
    }

    /// Returns the page number.
    #[inline]
    pub fn page_no(&self) -> PageNo {
        self.page_no
    }

    /// Acquires a read lock on the page data.
    #[inline]
    pub fn read(&self) -> RwLockReadGuard<'_, Vec<u8>> {
        self.data.read()
    }

    /// Acquires a write lock on the page data.
    ///
    /// This does not mark the page dirty; callers that change bytes call
    /// [`Page::set_dirty`].
    #[inline]
    pub fn write(&self) -> RwLockWriteGuard<'_, Vec<u8>> {
        self.data.write()
    }

    /// Returns true if the page has unflushed changes.
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Sets or clears the dirty flag.
    #[inline]
    pub fn set_dirty(&self, dirty: bool) {
        self.dirty.store(dirty, Ordering::Release);
    }
}

impl std::fmt::Debug for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page")
            .field("page_no", &self.page_no)
            .field("dirty", &self.is_dirty())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dirty_flag() {
        let page = Page::new(PageNo::new(3), vec![0u8; PAGE_SIZE]);
        assert_eq!(page.page_no(), PageNo::new(3));
        assert!(!page.is_dirty());

        page.write()[10] = 7;
        page.set_dirty(true);
        assert!(page.is_dirty());
        assert_eq!(page.read()[10], 7);

        page.set_dirty(false);
        assert!(!page.is_dirty());
    }
}
