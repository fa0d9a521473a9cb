//! Ordinary data pages.
//!
//! ```text
//! ┌──────────┬────────┬────────┬─────┬────────────────────┐
//! │ FSO (2B) │ item 0 │ item 1 │ ... │     free space     │
//! └──────────┴────────┴────────┴─────┴────────────────────┘
//!                                    ^ FSO
//! ```
//!
//! Items are appended at the free-space offset (FSO) and never moved.

use bytes::{Buf, BufMut};

use strata_common::constants::{PAGE_FSO_SIZE, PAGE_SIZE};

use super::Page;

/// Returns a fresh, empty data-page image.
pub fn init_raw() -> Vec<u8> {
    let mut raw = vec![0u8; PAGE_SIZE];
    set_fso(&mut raw, PAGE_FSO_SIZE as u16);
    raw
}

/// Reads the free-space offset from a page image.
pub fn fso(raw: &[u8]) -> u16 {
    (&raw[..PAGE_FSO_SIZE]).get_u16()
}

fn set_fso(raw: &mut [u8], fso: u16) {
    (&mut raw[..PAGE_FSO_SIZE]).put_u16(fso);
}

/// Appends `item` at the free-space offset and returns its offset.
///
/// The caller checks that the item fits.
pub fn insert(page: &Page, item: &[u8]) -> u16 {
    let mut data = page.write();
    page.set_dirty(true);
    let offset = fso(&data);
    let start = offset as usize;
    data[start..start + item.len()].copy_from_slice(item);
    set_fso(&mut data, offset + item.len() as u16);
    offset
}

/// Returns the free-space offset of `page`.
pub fn page_fso(page: &Page) -> u16 {
    fso(&page.read())
}

/// Returns the number of free bytes in `page`.
pub fn free_space(page: &Page) -> usize {
    PAGE_SIZE - page_fso(page) as usize
}

/// Replays an insert: writes `item` at `offset` and raises the free-space
/// offset if the item ends past it.
pub fn recover_insert(page: &Page, item: &[u8], offset: u16) {
    let mut data = page.write();
    page.set_dirty(true);
    let start = offset as usize;
    data[start..start + item.len()].copy_from_slice(item);

    let end = offset + item.len() as u16;
    if fso(&data) < end {
        set_fso(&mut data, end);
    }
}

/// Replays an update: writes `item` at `offset`. The free-space offset is
/// left alone.
pub fn recover_update(page: &Page, item: &[u8], offset: u16) {
    let mut data = page.write();
    page.set_dirty(true);
    let start = offset as usize;
    data[start..start + item.len()].copy_from_slice(item);
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_common::constants::MAX_FREE_SPACE;
    use strata_common::types::PageNo;

    fn fresh() -> Page {
        Page::new(PageNo::new(2), init_raw())
    }

    #[test]
    fn test_fresh_page() {
        let page = fresh();
        assert_eq!(page_fso(&page), 2);
        assert_eq!(free_space(&page), MAX_FREE_SPACE);
    }

    #[test]
    fn test_insert_appends() {
        let page = fresh();
        assert_eq!(insert(&page, b"hello"), 2);
        assert_eq!(insert(&page, b"world"), 7);
        assert_eq!(page_fso(&page), 12);
        assert_eq!(&page.read()[2..12], b"helloworld");
        assert!(page.is_dirty());
    }

    #[test]
    fn test_recover_insert_raises_fso_only_forward() {
        let page = fresh();
        recover_insert(&page, b"abc", 10);
        assert_eq!(page_fso(&page), 13);

        // A replay below the FSO must not move it back.
        recover_insert(&page, b"xy", 2);
        assert_eq!(page_fso(&page), 13);
        assert_eq!(&page.read()[2..4], b"xy");
    }

    #[test]
    fn test_recover_update_keeps_fso() {
        let page = fresh();
        insert(&page, b"aaaa");
        recover_update(&page, b"bb", 3);
        assert_eq!(page_fso(&page), 6);
        assert_eq!(&page.read()[2..6], b"abba");
    }
}
