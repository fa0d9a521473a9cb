//! Free-space index.
//!
//! Pages are bucketed by free space in steps of `FREE_SPACE_THRESHOLD`
//! bytes. A selected page is taken out of the index, so only one inserter
//! writes to it at a time; the caller puts it back with its new free
//! space once done.

use parking_lot::Mutex;

use strata_common::constants::{FREE_SPACE_INTERVALS, FREE_SPACE_THRESHOLD};
use strata_common::types::PageNo;

/// A page and the free space it had when indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageInfo {
    /// The page.
    pub page_no: PageNo,
    /// Free bytes at indexing time.
    pub free_space: usize,
}

/// Buckets of pages by free space.
#[derive(Debug)]
pub struct PageIndex {
    buckets: Mutex<Vec<Vec<PageInfo>>>,
}

impl PageIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self {
            buckets: Mutex::new(vec![Vec::new(); FREE_SPACE_INTERVALS + 1]),
        }
    }

    /// Indexes `page_no` with `free_space` free bytes.
    pub fn add(&self, page_no: PageNo, free_space: usize) {
        let bucket = (free_space / FREE_SPACE_THRESHOLD).min(FREE_SPACE_INTERVALS);
        self.buckets.lock()[bucket].push(PageInfo {
            page_no,
            free_space,
        });
    }

    /// Removes and returns a page with at least `space` free bytes.
    ///
    /// The search starts one bucket above the one `space` falls into, so
    /// every page below the top bucket fits. Pages in the top bucket are
    /// checked individually.
    pub fn select(&self, space: usize) -> Option<PageInfo> {
        let mut bucket = (space / FREE_SPACE_THRESHOLD).min(FREE_SPACE_INTERVALS);
        if bucket < FREE_SPACE_INTERVALS {
            bucket += 1;
        }

        let mut buckets = self.buckets.lock();
        for list in &mut buckets[bucket..] {
            if let Some(pos) = list.iter().position(|info| info.free_space >= space) {
                return Some(list.remove(pos));
            }
        }
        None
    }

    /// Returns the number of indexed pages.
    pub fn len(&self) -> usize {
        self.buckets.lock().iter().map(Vec::len).sum()
    }

    /// Returns true if no page is indexed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for PageIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_common::constants::MAX_FREE_SPACE;

    #[test]
    fn test_select_removes() {
        let index = PageIndex::new();
        index.add(PageNo::new(2), MAX_FREE_SPACE);
        assert_eq!(index.len(), 1);

        let info = index.select(100).unwrap();
        assert_eq!(info.page_no, PageNo::new(2));
        assert!(index.is_empty());
        assert!(index.select(100).is_none());
    }

    #[test]
    fn test_select_skips_insufficient_pages() {
        let index = PageIndex::new();
        index.add(PageNo::new(2), 300);
        index.add(PageNo::new(3), 5000);

        // 300 bytes sit in bucket 1; a request for 250 starts at bucket 2.
        assert_eq!(index.select(250).unwrap().page_no, PageNo::new(3));
        assert_eq!(index.select(10).unwrap().page_no, PageNo::new(2));
    }

    #[test]
    fn test_selected_page_fits() {
        let index = PageIndex::new();
        for (n, free) in [(2u32, 100usize), (3, 409), (4, 1000), (5, 8000)] {
            index.add(PageNo::new(n), free);
        }
        while let Some(info) = index.select(400) {
            assert!(info.free_space >= 400);
        }
    }

    #[test]
    fn test_full_size_request_uses_top_bucket() {
        let index = PageIndex::new();
        index.add(PageNo::new(7), MAX_FREE_SPACE);
        assert_eq!(index.select(MAX_FREE_SPACE).unwrap().page_no, PageNo::new(7));
    }

    #[test]
    fn test_top_bucket_checks_each_page() {
        let index = PageIndex::new();
        index.add(PageNo::new(2), 8170);
        assert!(index.select(MAX_FREE_SPACE).is_none());
        assert_eq!(index.select(8170).unwrap().page_no, PageNo::new(2));
    }
}
