//! System-wide constants for Strata.
//!
//! Every on-disk structure depends on these values; changing any of them
//! makes existing files unreadable.

// =============================================================================
// Page Constants
// =============================================================================

/// Page size in bytes (8 KB).
pub const PAGE_SIZE: usize = 8 * 1024;

/// Size of the free-space-offset header of an ordinary page.
pub const PAGE_FSO_SIZE: usize = 2;

/// Largest payload an ordinary page can hold.
pub const MAX_FREE_SPACE: usize = PAGE_SIZE - PAGE_FSO_SIZE;

/// Offset of the open marker on page 1.
pub const MARKER_OFFSET: usize = 100;

/// Length of the open/close marker on page 1.
pub const MARKER_LEN: usize = 8;

/// Minimum number of resident pages in the page cache.
pub const MIN_CACHE_PAGES: usize = 10;

/// Default memory budget for the page cache (64 MB).
pub const DEFAULT_MEMORY_BUDGET: usize = 64 * 1024 * 1024;

// =============================================================================
// Free-Space Index Constants
// =============================================================================

/// Number of free-space buckets.
pub const FREE_SPACE_INTERVALS: usize = 40;

/// Width of one free-space bucket in bytes.
pub const FREE_SPACE_THRESHOLD: usize = PAGE_SIZE / FREE_SPACE_INTERVALS;

// =============================================================================
// File Suffixes
// =============================================================================

/// Suffix of the data page file.
pub const DB_SUFFIX: &str = ".db";

/// Suffix of the write-ahead log.
pub const LOG_SUFFIX: &str = ".log";

/// Suffix of the transaction status file.
pub const XID_SUFFIX: &str = ".xid";

/// Suffix of the boot file.
pub const BOOT_SUFFIX: &str = ".bt";

/// Suffix of the boot file while it is being replaced.
pub const BOOT_TMP_SUFFIX: &str = ".bt_tmp";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_constants() {
        assert!(PAGE_SIZE.is_power_of_two());
        assert_eq!(MAX_FREE_SPACE, 8190);
        assert!(MARKER_OFFSET + 2 * MARKER_LEN < PAGE_SIZE);
    }

    #[test]
    fn test_free_space_threshold() {
        assert_eq!(FREE_SPACE_THRESHOLD, 204);
        assert!(FREE_SPACE_THRESHOLD * FREE_SPACE_INTERVALS <= PAGE_SIZE);
    }
}
