//! Page 1: the open/close marker.
//!
//! ```text
//! ┌──────────┬──────────────────┬───────────────────┬──────────┐
//! │  unused  │ open marker (8)  │ close marker (8)  │  unused  │
//! │ 0 .. 100 │    100 .. 108    │    108 .. 116     │          │
//! └──────────┴──────────────────┴───────────────────┴──────────┘
//! ```
//!
//! Every open writes fresh random bytes into the open marker; a clean
//! close copies them into the close marker. If the two differ on the next
//! open, the previous run did not shut down cleanly.

use rand::RngCore;

use strata_common::constants::{MARKER_LEN, MARKER_OFFSET, PAGE_SIZE};

use super::Page;

const OPEN: std::ops::Range<usize> = MARKER_OFFSET..MARKER_OFFSET + MARKER_LEN;
const CLOSE: std::ops::Range<usize> = MARKER_OFFSET + MARKER_LEN..MARKER_OFFSET + 2 * MARKER_LEN;

/// Returns a fresh page-1 image with a new open marker.
pub fn init_raw() -> Vec<u8> {
    let mut raw = vec![0u8; PAGE_SIZE];
    fill_open(&mut raw);
    raw
}

/// Writes a new random open marker.
pub fn set_open(page: &Page) {
    let mut data = page.write();
    fill_open(&mut data);
    page.set_dirty(true);
}

/// Copies the open marker into the close marker.
pub fn set_close(page: &Page) {
    let mut data = page.write();
    data.copy_within(OPEN, CLOSE.start);
    page.set_dirty(true);
}

/// Returns true if the last run closed cleanly.
pub fn check(page: &Page) -> bool {
    let data = page.read();
    data[OPEN] == data[CLOSE]
}

fn fill_open(raw: &mut [u8]) {
    rand::thread_rng().fill_bytes(&mut raw[OPEN]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_common::types::PageNo;

    #[test]
    fn test_open_close_cycle() {
        let page = Page::new(PageNo::META, init_raw());
        // A fresh page has a random open marker and a zero close marker.
        assert!(!check(&page));

        set_close(&page);
        assert!(check(&page));
        assert!(page.is_dirty());

        set_open(&page);
        assert!(!check(&page));
    }

    #[test]
    fn test_markers_do_not_touch_other_bytes() {
        let page = Page::new(PageNo::META, init_raw());
        set_close(&page);
        let data = page.read();
        assert!(data[..MARKER_OFFSET].iter().all(|&b| b == 0));
        assert!(data[MARKER_OFFSET + 2 * MARKER_LEN..].iter().all(|&b| b == 0));
    }
}
