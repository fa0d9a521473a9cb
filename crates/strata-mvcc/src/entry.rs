//! Versioned entries.
//!
//! An entry is the payload of a data item, prefixed with the creating and
//! deleting transactions:
//!
//! ```text
//! ┌───────────┬───────────┬───────────┐
//! │ xmin (8)  │ xmax (8)  │   data    │
//! └───────────┴───────────┴───────────┘
//! ```
//!
//! `xmax == 0` means the entry has not been deleted.

use std::sync::Arc;

use bytes::{Buf, BufMut};

use strata_common::types::{Uid, Xid};
use strata_storage::{CacheSource, DataItem, DataManager, StorageError, StorageResult};

const XMIN_OFFSET: usize = 0;
const XMAX_OFFSET: usize = 8;
const DATA_OFFSET: usize = 16;

/// Builds the payload of a new entry created by `xid`.
pub fn wrap_raw(xid: Xid, data: &[u8]) -> Vec<u8> {
    let mut raw = Vec::with_capacity(DATA_OFFSET + data.len());
    raw.put_u64(xid.as_u64());
    raw.put_u64(0);
    raw.put_slice(data);
    raw
}

/// A view of one entry.
pub struct Entry {
    uid: Uid,
    item: Arc<DataItem>,
}

impl Entry {
    /// Returns the entry's uid.
    pub fn uid(&self) -> Uid {
        self.uid
    }

    /// Returns `(xmin, xmax)` read under one lock.
    pub fn stamps(&self) -> (Xid, Xid) {
        self.item.read(|payload| {
            let xmin = (&payload[XMIN_OFFSET..XMAX_OFFSET]).get_u64();
            let xmax = (&payload[XMAX_OFFSET..DATA_OFFSET]).get_u64();
            (Xid::new(xmin), Xid::new(xmax))
        })
    }

    /// Returns the creating transaction.
    pub fn xmin(&self) -> Xid {
        self.stamps().0
    }

    /// Returns the deleting transaction, or xid 0.
    pub fn xmax(&self) -> Xid {
        self.stamps().1
    }

    /// Returns a copy of the user data.
    pub fn data(&self) -> Vec<u8> {
        self.item.read(|payload| payload[DATA_OFFSET..].to_vec())
    }

    /// Stamps `xid` as the deleting transaction.
    pub fn set_xmax(&self, xid: Xid) -> StorageResult<()> {
        let mut update = self.item.before();
        update.write_at(XMAX_OFFSET, &xid.as_u64().to_be_bytes());
        update.after(xid)
    }
}

impl std::fmt::Debug for Entry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (xmin, xmax) = self.stamps();
        f.debug_struct("Entry")
            .field("uid", &self.uid)
            .field("xmin", &xmin)
            .field("xmax", &xmax)
            .finish()
    }
}

/// Loads entries for the version manager's cache.
pub(crate) struct EntrySource {
    pub(crate) dm: Arc<DataManager>,
}

impl CacheSource for EntrySource {
    type Value = Entry;

    fn load(&self, key: u64) -> StorageResult<Entry> {
        let uid = Uid::from_raw(key);
        let item = self.dm.read(uid)?.ok_or(StorageError::ItemNotFound { uid })?;
        if item.len() < DATA_OFFSET {
            self.dm.release(&item)?;
            return Err(StorageError::corrupt_item(uid, "entry shorter than its header"));
        }
        Ok(Entry { uid, item })
    }

    fn evict(&self, _key: u64, entry: &Entry) -> StorageResult<()> {
        self.dm.release(&entry.item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_storage::{DataManagerConfig, RefCountCache};

    #[test]
    fn test_wrap_raw() {
        let raw = wrap_raw(Xid::new(7), b"row");
        assert_eq!(raw.len(), 19);
        assert_eq!(&raw[..8], &7u64.to_be_bytes());
        assert_eq!(&raw[8..16], &[0u8; 8]);
        assert_eq!(&raw[16..], b"row");
    }

    #[test]
    fn test_load_and_stamp() {
        let dir = tempfile::tempdir().unwrap();
        let dm = Arc::new(DataManager::create(dir.path().join("e"), DataManagerConfig::new()).unwrap());
        let uid = dm.insert(Xid::new(3), &wrap_raw(Xid::new(3), b"hello")).unwrap();

        let cache = RefCountCache::new(EntrySource { dm: Arc::clone(&dm) }, 0);
        let entry = cache.get(uid.as_u64()).unwrap();
        assert_eq!(entry.stamps(), (Xid::new(3), Xid::new(0)));
        assert_eq!(entry.data(), b"hello");

        entry.set_xmax(Xid::new(5)).unwrap();
        assert_eq!(entry.xmax(), Xid::new(5));
        assert_eq!(entry.xmin(), Xid::new(3));
        cache.release(uid.as_u64()).unwrap();
    }

    #[test]
    fn test_short_item_is_not_an_entry() {
        let dir = tempfile::tempdir().unwrap();
        let dm = Arc::new(DataManager::create(dir.path().join("e"), DataManagerConfig::new()).unwrap());
        let uid = dm.insert(Xid::SUPER, b"short").unwrap();

        let cache = RefCountCache::new(EntrySource { dm }, 0);
        assert!(matches!(
            cache.get(uid.as_u64()),
            Err(StorageError::CorruptItem { .. })
        ));
    }
}
