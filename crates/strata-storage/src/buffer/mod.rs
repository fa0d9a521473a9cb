//! The page cache.
//!
//! [`PageCache`] maps page numbers onto cached [`Page`]s through a
//! [`RefCountCache`]. A page is read from the data file on first use and
//! written back, if dirty, when its last reference is released.
//!
//! New pages are appended at the end of the file and written through
//! immediately, so the page count always matches the file length.

mod config;

pub use config::PageCacheConfig;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use tracing::debug;

use strata_common::constants::{DB_SUFFIX, PAGE_SIZE};
use strata_common::path::with_suffix;
use strata_common::types::PageNo;

use crate::cache::{CacheSource, RefCountCache};
use crate::error::StorageResult;
use crate::file::PageFile;
use crate::page::Page;

/// Reads and writes back pages for the cache.
struct PageSource {
    file: Arc<PageFile>,
}

impl CacheSource for PageSource {
    type Value = Page;

    fn load(&self, key: u64) -> StorageResult<Page> {
        #[allow(clippy::cast_possible_truncation)]
        let page_no = PageNo::new(key as u32);
        let data = self.file.read_page(page_no)?;
        Ok(Page::new(page_no, data))
    }

    fn evict(&self, _key: u64, page: &Page) -> StorageResult<()> {
        if page.is_dirty() {
            flush(&self.file, page)?;
        }
        Ok(())
    }
}

fn flush(file: &PageFile, page: &Page) -> StorageResult<()> {
    let data = page.read();
    file.write_page(page.page_no(), &data)?;
    page.set_dirty(false);
    Ok(())
}

/// Cache of data-file pages.
pub struct PageCache {
    cache: RefCountCache<PageSource>,
    file: Arc<PageFile>,
    /// Number of pages in the data file.
    page_count: AtomicU32,
}

impl PageCache {
    /// Creates a new, empty data file at `<prefix>.db`.
    pub fn create(prefix: impl AsRef<Path>, config: PageCacheConfig) -> StorageResult<Self> {
        config.validate()?;
        let file = PageFile::create(with_suffix(prefix.as_ref(), DB_SUFFIX))?;
        Ok(Self::with_file(file, config, 0))
    }

    /// Opens the existing data file at `<prefix>.db`.
    pub fn open(prefix: impl AsRef<Path>, config: PageCacheConfig) -> StorageResult<Self> {
        config.validate()?;
        let file = PageFile::open(with_suffix(prefix.as_ref(), DB_SUFFIX))?;
        #[allow(clippy::cast_possible_truncation)]
        let page_count = (file.len()? / PAGE_SIZE as u64) as u32;
        debug!(path = %file.path().display(), page_count, "opened data file");
        Ok(Self::with_file(file, config, page_count))
    }

    fn with_file(file: PageFile, config: PageCacheConfig, page_count: u32) -> Self {
        let file = Arc::new(file);
        Self {
            cache: RefCountCache::new(
                PageSource {
                    file: Arc::clone(&file),
                },
                config.max_pages,
            ),
            file,
            page_count: AtomicU32::new(page_count),
        }
    }

    /// Returns the path of the data file.
    pub fn path(&self) -> PathBuf {
        self.file.path().to_path_buf()
    }

    /// Appends a page holding `init` and returns its number.
    ///
    /// The page is written to disk before this returns; it is not cached.
    pub fn new_page(&self, init: &[u8]) -> StorageResult<PageNo> {
        let page_no = PageNo::new(self.page_count.fetch_add(1, Ordering::AcqRel) + 1);
        self.file.write_page(page_no, init)?;
        Ok(page_no)
    }

    /// Returns page `page_no`, taking a reference to it.
    pub fn get_page(&self, page_no: PageNo) -> StorageResult<Arc<Page>> {
        self.cache.get(u64::from(page_no.as_u32()))
    }

    /// Drops a reference taken by [`PageCache::get_page`].
    pub fn release(&self, page: &Page) -> StorageResult<()> {
        self.cache.release(u64::from(page.page_no().as_u32()))
    }

    /// Writes `page` to disk now.
    pub fn flush_page(&self, page: &Page) -> StorageResult<()> {
        flush(&self.file, page)
    }

    /// Cuts the data file down to `max_page` pages.
    pub fn truncate_to(&self, max_page: PageNo) -> StorageResult<()> {
        let len = u64::from(max_page.as_u32()) * PAGE_SIZE as u64;
        self.file.set_len(len)?;
        self.page_count.store(max_page.as_u32(), Ordering::Release);
        debug!(max_page = %max_page, "truncated data file");
        Ok(())
    }

    /// Returns the number of pages in the data file.
    pub fn page_count(&self) -> u32 {
        self.page_count.load(Ordering::Acquire)
    }

    /// Returns the number of resident pages.
    pub fn resident(&self) -> usize {
        self.cache.len()
    }

    /// Writes back every resident page and syncs the file.
    pub fn close(&self) -> StorageResult<()> {
        self.cache.close()?;
        self.file.sync()?;
        debug!(
            hit_ratio = self.cache.stats().hit_ratio(),
            "page cache closed"
        );
        Ok(())
    }
}

impl std::fmt::Debug for PageCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageCache")
            .field("path", &self.file.path())
            .field("page_count", &self.page_count())
            .field("resident", &self.resident())
            .field("hit_ratio", &self.cache.stats().hit_ratio())
            .finish()
    }
}
