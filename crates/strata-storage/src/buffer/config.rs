//! Page cache configuration.

use strata_common::constants::{DEFAULT_MEMORY_BUDGET, MIN_CACHE_PAGES, PAGE_SIZE};

use crate::error::{StorageError, StorageResult};

/// Configuration for the page cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCacheConfig {
    /// Maximum number of resident pages.
    pub max_pages: usize,
}

impl PageCacheConfig {
    /// Creates a configuration holding at most `max_pages` pages.
    pub fn new(max_pages: usize) -> Self {
        Self { max_pages }
    }

    /// Creates a configuration from a memory budget in bytes.
    pub fn from_memory_size(memory_bytes: usize) -> Self {
        Self::new(memory_bytes / PAGE_SIZE)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> StorageResult<()> {
        if self.max_pages < MIN_CACHE_PAGES {
            return Err(StorageError::MemTooSmall {
                pages: self.max_pages,
                min: MIN_CACHE_PAGES,
            });
        }
        Ok(())
    }
}

impl Default for PageCacheConfig {
    fn default() -> Self {
        Self::from_memory_size(DEFAULT_MEMORY_BUDGET)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_memory_size() {
        let config = PageCacheConfig::from_memory_size(1 << 20);
        assert_eq!(config.max_pages, 128);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_too_small() {
        let config = PageCacheConfig::from_memory_size(9 * PAGE_SIZE);
        assert!(matches!(
            config.validate(),
            Err(StorageError::MemTooSmall { pages: 9, min: 10 })
        ));
        assert!(PageCacheConfig::new(10).validate().is_ok());
    }
}
