//! The data manager.
//!
//! [`DataManager`] is the storage layer's front door. It owns the page
//! cache, the log and the free-space index, and hands out cached
//! [`DataItem`]s by uid.
//!
//! ```text
//!            ┌───────────────────────────────────────────┐
//!            │                DataManager                │
//!            │  insert(xid, data) ──► PageIndex.select    │
//!            │                    ──► Logger.append       │
//!            │                    ──► data::insert        │
//!            │  read(uid) ──► RefCountCache<DataItem>     │
//!            └───────┬───────────────────────┬───────────┘
//!                    ▼                       ▼
//!              PageCache (.db)          Logger (.log)
//! ```
//!
//! Every insert is logged before the page is touched, and the page is not
//! written back before its log record, so the log is always ahead of the
//! data file.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use strata_common::constants::{MAX_FREE_SPACE, PAGE_FSO_SIZE};
use strata_common::types::{PageNo, Uid, Xid};
use strata_txn::TransactionManager;
use strata_wal::{LogRecord, Logger, WalConfig};

use crate::buffer::{PageCache, PageCacheConfig};
use crate::cache::{CacheSource, RefCountCache};
use crate::error::{StorageError, StorageResult};
use crate::free_space::{PageIndex, PageInfo};
use crate::item::{wrap_raw, DataItem};
use crate::page::{data, meta, Page};
use crate::recovery::{self, RecoveryStats};

/// How many fresh pages an insert may create before giving up.
const INSERT_ATTEMPTS: usize = 5;

/// Configuration for the data manager.
#[derive(Debug, Clone, Default)]
pub struct DataManagerConfig {
    /// Page cache configuration.
    pub cache: PageCacheConfig,
    /// Log configuration.
    pub wal: WalConfig,
}

impl DataManagerConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the page cache configuration.
    #[must_use]
    pub fn with_cache(mut self, cache: PageCacheConfig) -> Self {
        self.cache = cache;
        self
    }

    /// Sets the log configuration.
    #[must_use]
    pub fn with_wal(mut self, wal: WalConfig) -> Self {
        self.wal = wal;
        self
    }
}

/// Loads data items out of cached pages.
struct ItemSource {
    page_cache: Arc<PageCache>,
    logger: Arc<Logger>,
}

impl CacheSource for ItemSource {
    type Value = DataItem;

    fn load(&self, key: u64) -> StorageResult<DataItem> {
        let uid = Uid::from_raw(key);
        let page_no = uid.page_no();
        if page_no.as_u32() <= PageNo::META.as_u32()
            || page_no.as_u32() > self.page_cache.page_count()
            || (uid.offset() as usize) < PAGE_FSO_SIZE
        {
            return Err(StorageError::ItemNotFound { uid });
        }

        let page = self.page_cache.get_page(page_no)?;
        match DataItem::parse(uid, Arc::clone(&page), Arc::clone(&self.logger)) {
            Ok(item) => Ok(item),
            Err(e) => {
                self.page_cache.release(&page)?;
                Err(e)
            }
        }
    }

    fn evict(&self, _key: u64, item: &DataItem) -> StorageResult<()> {
        self.page_cache.release(item.page())
    }
}

/// Owner of the data file and the log.
pub struct DataManager {
    page_cache: Arc<PageCache>,
    logger: Arc<Logger>,
    page_index: PageIndex,
    items: RefCountCache<ItemSource>,
    /// Page 1, referenced for the manager's whole lifetime.
    page_one: Arc<Page>,
    closed: AtomicBool,
}

impl DataManager {
    /// Creates a new data file and log at `prefix`.
    pub fn create(prefix: impl AsRef<Path>, config: DataManagerConfig) -> StorageResult<Self> {
        let prefix = prefix.as_ref();
        let page_cache = PageCache::create(prefix, config.cache)?;
        let logger = Logger::create(prefix, config.wal)?;

        let page_no = page_cache.new_page(&meta::init_raw())?;
        debug_assert_eq!(page_no, PageNo::META);
        let page_one = page_cache.get_page(PageNo::META)?;

        info!(prefix = %prefix.display(), "created data manager");
        Ok(Self::assemble(page_cache, logger, page_one))
    }

    /// Opens an existing data file and log, running recovery first.
    pub fn open(
        prefix: impl AsRef<Path>,
        config: DataManagerConfig,
        tm: &TransactionManager,
    ) -> StorageResult<(Self, RecoveryStats)> {
        let prefix = prefix.as_ref();
        let page_cache = PageCache::open(prefix, config.cache)?;
        let logger = Logger::open(prefix, config.wal)?;

        let page_one = page_cache.get_page(PageNo::META)?;
        if !meta::check(&page_one) {
            warn!(prefix = %prefix.display(), "previous run did not shut down cleanly");
        }
        let stats = recovery::recover(tm, &logger, &page_cache)?;

        let dm = Self::assemble(page_cache, logger, page_one);
        dm.fill_page_index()?;
        meta::set_open(&dm.page_one);
        dm.page_cache.flush_page(&dm.page_one)?;

        info!(
            prefix = %prefix.display(),
            pages = dm.page_cache.page_count(),
            "opened data manager"
        );
        Ok((dm, stats))
    }

    fn assemble(page_cache: PageCache, logger: Logger, page_one: Arc<Page>) -> Self {
        let page_cache = Arc::new(page_cache);
        let logger = Arc::new(logger);
        Self {
            items: RefCountCache::new(
                ItemSource {
                    page_cache: Arc::clone(&page_cache),
                    logger: Arc::clone(&logger),
                },
                0,
            ),
            page_cache,
            logger,
            page_index: PageIndex::new(),
            page_one,
            closed: AtomicBool::new(false),
        }
    }

    fn fill_page_index(&self) -> StorageResult<()> {
        for n in 2..=self.page_cache.page_count() {
            let page = self.page_cache.get_page(PageNo::new(n))?;
            self.page_index.add(page.page_no(), data::free_space(&page));
            self.page_cache.release(&page)?;
        }
        debug!(pages = self.page_index.len(), "filled free-space index");
        Ok(())
    }

    /// Returns the live item at `uid`, or `None` if it was removed.
    ///
    /// A returned item must be handed back with [`DataManager::release`].
    pub fn read(&self, uid: Uid) -> StorageResult<Option<Arc<DataItem>>> {
        let item = self.items.get(uid.as_u64())?;
        if item.is_valid() {
            Ok(Some(item))
        } else {
            self.items.release(uid.as_u64())?;
            Ok(None)
        }
    }

    /// Drops a reference taken by [`DataManager::read`].
    pub fn release(&self, item: &DataItem) -> StorageResult<()> {
        self.items.release(item.uid().as_u64())
    }

    /// Stores `data` as a new item written by `xid` and returns its uid.
    pub fn insert(&self, xid: Xid, data: &[u8]) -> StorageResult<Uid> {
        let raw = wrap_raw(data);
        if raw.len() > MAX_FREE_SPACE {
            return Err(StorageError::DataTooLarge {
                size: raw.len(),
                max: MAX_FREE_SPACE,
            });
        }

        let info = self.select_page(raw.len())?;
        let page = match self.page_cache.get_page(info.page_no) {
            Ok(page) => page,
            Err(e) => {
                self.page_index.add(info.page_no, info.free_space);
                return Err(e);
            }
        };

        let result = self.insert_into(&page, xid, &raw);
        self.page_index.add(page.page_no(), data::free_space(&page));
        self.page_cache.release(&page)?;
        result
    }

    fn select_page(&self, size: usize) -> StorageResult<PageInfo> {
        for _ in 0..INSERT_ATTEMPTS {
            if let Some(info) = self.page_index.select(size) {
                return Ok(info);
            }
            let page_no = self.page_cache.new_page(&data::init_raw())?;
            self.page_index.add(page_no, MAX_FREE_SPACE);
        }
        Err(StorageError::DatabaseBusy)
    }

    fn insert_into(&self, page: &Page, xid: Xid, raw: &[u8]) -> StorageResult<Uid> {
        let record = LogRecord::Insert {
            xid,
            page_no: page.page_no(),
            offset: data::page_fso(page),
            raw: raw.to_vec(),
        };
        self.logger.append(&record)?;
        let offset = data::insert(page, raw);
        Ok(Uid::new(page.page_no(), offset))
    }

    /// Returns the page cache.
    pub fn page_cache(&self) -> &PageCache {
        &self.page_cache
    }

    /// Returns the log.
    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    /// Returns the number of pages in the data file.
    pub fn page_count(&self) -> u32 {
        self.page_cache.page_count()
    }

    /// Writes back everything and records a clean shutdown.
    pub fn close(&self) -> StorageResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.items.close()?;
        self.logger.close()?;
        meta::set_close(&self.page_one);
        self.page_cache.release(&self.page_one)?;
        self.page_cache.close()?;
        info!("closed data manager");
        Ok(())
    }
}

impl std::fmt::Debug for DataManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataManager")
            .field("page_cache", &self.page_cache)
            .field("indexed_pages", &self.page_index.len())
            .field("items", &self.items)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use strata_wal::SyncPolicy;

    fn config() -> DataManagerConfig {
        DataManagerConfig::new()
            .with_cache(PageCacheConfig::new(64))
            .with_wal(WalConfig::new().with_sync_policy(SyncPolicy::Never))
    }

    fn create(dir: &tempfile::TempDir) -> (PathBuf, TransactionManager, DataManager) {
        let prefix = dir.path().join("dm");
        let tm = TransactionManager::create(&prefix).unwrap();
        let dm = DataManager::create(&prefix, config()).unwrap();
        (prefix, tm, dm)
    }

    #[test]
    fn test_insert_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let (_, _tm, dm) = create(&dir);

        let uid = dm.insert(Xid::SUPER, b"hello").unwrap();
        assert_eq!(uid.page_no(), PageNo::new(2));
        assert_eq!(uid.offset(), 2);

        let item = dm.read(uid).unwrap().unwrap();
        assert_eq!(item.data(), b"hello");
        dm.release(&item).unwrap();
        dm.close().unwrap();
    }

    #[test]
    fn test_inserts_fill_pages_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let (_, _tm, dm) = create(&dir);

        let big = vec![7u8; 3000];
        let uids: Vec<Uid> = (0..5).map(|_| dm.insert(Xid::SUPER, &big).unwrap()).collect();
        // Two 3003-byte items fit a page; the third spills.
        assert_eq!(uids[0].page_no(), uids[1].page_no());
        assert_ne!(uids[1].page_no(), uids[2].page_no());
        dm.close().unwrap();
    }

    #[test]
    fn test_data_too_large() {
        let dir = tempfile::tempdir().unwrap();
        let (_, _tm, dm) = create(&dir);

        let result = dm.insert(Xid::SUPER, &vec![0u8; MAX_FREE_SPACE]);
        assert!(matches!(result, Err(StorageError::DataTooLarge { .. })));

        // The largest payload that fits exactly.
        let fits = vec![1u8; MAX_FREE_SPACE - crate::item::ITEM_HEADER_SIZE];
        let uid = dm.insert(Xid::SUPER, &fits).unwrap();
        let item = dm.read(uid).unwrap().unwrap();
        assert_eq!(item.len(), fits.len());
        dm.release(&item).unwrap();
        dm.close().unwrap();
    }

    #[test]
    fn test_read_unknown_uid() {
        let dir = tempfile::tempdir().unwrap();
        let (_, _tm, dm) = create(&dir);
        let result = dm.read(Uid::new(PageNo::new(40), 2));
        assert!(matches!(result, Err(StorageError::ItemNotFound { .. })));
        dm.close().unwrap();
    }

    #[test]
    fn test_update_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let (prefix, tm, dm) = create(&dir);

        let xid = tm.begin().unwrap();
        let uid = dm.insert(xid, b"version-1").unwrap();
        let item = dm.read(uid).unwrap().unwrap();
        let mut update = item.before();
        update.write_at(8, b"2");
        update.after(xid).unwrap();
        dm.release(&item).unwrap();
        tm.commit(xid).unwrap();
        dm.close().unwrap();

        let (dm, stats) = DataManager::open(&prefix, config(), &tm).unwrap();
        assert_eq!(stats.records, 2);
        let item = dm.read(uid).unwrap().unwrap();
        assert_eq!(item.data(), b"version-2");
        dm.release(&item).unwrap();
        dm.close().unwrap();
    }

    #[test]
    fn test_crash_rolls_back_active_insert() {
        let dir = tempfile::tempdir().unwrap();
        let (prefix, tm, dm) = create(&dir);

        let committed = tm.begin().unwrap();
        let kept = dm.insert(committed, b"kept").unwrap();
        tm.commit(committed).unwrap();

        let active = tm.begin().unwrap();
        let lost = dm.insert(active, b"lost").unwrap();
        // Simulate a crash: nothing is closed, dirty pages never reach disk.
        drop(dm);

        let (dm, stats) = DataManager::open(&prefix, config(), &tm).unwrap();
        assert_eq!(stats.aborted, 1);
        assert!(tm.is_aborted(active).unwrap());

        let item = dm.read(kept).unwrap().unwrap();
        assert_eq!(item.data(), b"kept");
        dm.release(&item).unwrap();
        assert!(dm.read(lost).unwrap().is_none());
        dm.close().unwrap();
    }

    #[test]
    fn test_free_space_reused_after_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let (prefix, tm, dm) = create(&dir);
        let first = dm.insert(Xid::SUPER, b"a").unwrap();
        dm.close().unwrap();

        let (dm, _) = DataManager::open(&prefix, config(), &tm).unwrap();
        let second = dm.insert(Xid::SUPER, b"b").unwrap();
        assert_eq!(first.page_no(), second.page_no());
        assert_eq!(second.offset(), first.offset() + 4);
        dm.close().unwrap();
    }
}
