//! Data items.
//!
//! A data item is a length-prefixed byte string stored inside a data page
//! and addressed by its [`Uid`]:
//!
//! ```text
//! ┌───────────┬──────────┬────────────────┐
//! │ valid (1) │ size (2) │ payload (size) │
//! └───────────┴──────────┴────────────────┘
//! ```
//!
//! A valid flag of 0 means live; any other value marks the item removed.
//! Items never move or change size. In-place changes go through
//! [`DataItem::before`], which returns an [`ItemUpdate`] guard:
//!
//! ```text
//!   before() ──► snapshot old image ──► update(..) ──► after(xid)
//!                                          │              logs Update(old, new)
//!                                          └──► un_before() / drop
//!                                                 restores the old image
//! ```

use std::sync::Arc;

use bytes::{Buf, BufMut};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use strata_common::types::{Uid, Xid};
use strata_wal::{LogRecord, Logger};

use crate::error::{StorageError, StorageResult};
use crate::page::Page;

const VALID_OFFSET: usize = 0;
const SIZE_OFFSET: usize = 1;
/// Bytes in front of the payload.
pub const ITEM_HEADER_SIZE: usize = 3;

/// Builds the raw image of a live item holding `data`.
pub fn wrap_raw(data: &[u8]) -> Vec<u8> {
    let mut raw = Vec::with_capacity(ITEM_HEADER_SIZE + data.len());
    raw.put_u8(0);
    #[allow(clippy::cast_possible_truncation)]
    raw.put_u16(data.len() as u16);
    raw.put_slice(data);
    raw
}

/// Marks a raw item image removed.
pub fn set_raw_invalid(raw: &mut [u8]) {
    raw[VALID_OFFSET] = 1;
}

/// A data item resident in the cache.
pub struct DataItem {
    uid: Uid,
    /// The page holding the item. The item holds a page reference for as
    /// long as it is cached.
    page: Arc<Page>,
    /// Offset of the raw image in the page.
    offset: usize,
    /// Payload length.
    size: usize,
    lock: RwLock<()>,
    logger: Arc<Logger>,
}

impl DataItem {
    /// Parses the item at `uid` out of `page`.
    pub(crate) fn parse(uid: Uid, page: Arc<Page>, logger: Arc<Logger>) -> StorageResult<Self> {
        let offset = uid.offset() as usize;
        let size = {
            let data = page.read();
            if offset + ITEM_HEADER_SIZE > data.len() {
                return Err(StorageError::corrupt_item(uid, "header past end of page"));
            }
            let size = (&data[offset + SIZE_OFFSET..offset + ITEM_HEADER_SIZE]).get_u16();
            let size = size as usize;
            if offset + ITEM_HEADER_SIZE + size > data.len() {
                return Err(StorageError::corrupt_item(uid, "payload past end of page"));
            }
            size
        };
        Ok(Self {
            uid,
            page,
            offset,
            size,
            lock: RwLock::new(()),
            logger,
        })
    }

    /// Returns the item's uid.
    #[inline]
    pub fn uid(&self) -> Uid {
        self.uid
    }

    /// Returns the page holding the item.
    #[inline]
    pub fn page(&self) -> &Arc<Page> {
        &self.page
    }

    /// Returns the payload length.
    #[inline]
    pub fn len(&self) -> usize {
        self.size
    }

    /// Returns true if the payload is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    fn raw_range(&self) -> std::ops::Range<usize> {
        self.offset..self.offset + ITEM_HEADER_SIZE + self.size
    }

    fn payload_range(&self) -> std::ops::Range<usize> {
        self.offset + ITEM_HEADER_SIZE..self.offset + ITEM_HEADER_SIZE + self.size
    }

    /// Returns true if the item is live.
    pub fn is_valid(&self) -> bool {
        self.page.read()[self.offset + VALID_OFFSET] == 0
    }

    /// Takes the item's shared lock.
    pub fn read_lock(&self) -> RwLockReadGuard<'_, ()> {
        self.lock.read()
    }

    /// Runs `f` over the payload under the item's shared lock.
    pub fn read<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        let _guard = self.lock.read();
        let data = self.page.read();
        f(&data[self.payload_range()])
    }

    /// Returns a copy of the payload.
    pub fn data(&self) -> Vec<u8> {
        self.read(<[u8]>::to_vec)
    }

    /// Returns a copy of the whole raw image.
    pub fn raw(&self) -> Vec<u8> {
        let _guard = self.lock.read();
        self.page.read()[self.raw_range()].to_vec()
    }

    /// Starts an in-place change: takes the exclusive lock, marks the page
    /// dirty and snapshots the current image.
    pub fn before(&self) -> ItemUpdate<'_> {
        let guard = self.lock.write();
        self.page.set_dirty(true);
        let old_raw = self.page.read()[self.raw_range()].to_vec();
        ItemUpdate {
            item: self,
            _guard: guard,
            old_raw,
            done: false,
        }
    }
}

impl std::fmt::Debug for DataItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataItem")
            .field("uid", &self.uid)
            .field("size", &self.size)
            .finish()
    }
}

/// An in-progress change to a [`DataItem`].
///
/// Holds the item's exclusive lock. Dropping the guard without calling
/// [`ItemUpdate::after`] restores the old image.
#[must_use = "dropping an ItemUpdate discards the change"]
pub struct ItemUpdate<'a> {
    item: &'a DataItem,
    _guard: RwLockWriteGuard<'a, ()>,
    old_raw: Vec<u8>,
    done: bool,
}

impl ItemUpdate<'_> {
    /// Returns the payload as it was when the change started.
    pub fn old_data(&self) -> &[u8] {
        &self.old_raw[ITEM_HEADER_SIZE..]
    }

    /// Runs `f` over the mutable payload.
    pub fn update<R>(&mut self, f: impl FnOnce(&mut [u8]) -> R) -> R {
        let mut data = self.item.page.write();
        f(&mut data[self.item.payload_range()])
    }

    /// Overwrites the payload starting at `at`.
    pub fn write_at(&mut self, at: usize, bytes: &[u8]) {
        self.update(|payload| payload[at..at + bytes.len()].copy_from_slice(bytes));
    }

    /// Finishes the change: logs the old and new images under `xid` and
    /// releases the lock. If logging fails the old image is restored.
    pub fn after(mut self, xid: Xid) -> StorageResult<()> {
        let new_raw = self.item.page.read()[self.item.raw_range()].to_vec();
        let record = LogRecord::Update {
            xid,
            uid: self.item.uid,
            old_raw: self.old_raw.clone(),
            new_raw,
        };
        self.item.logger.append(&record)?;
        self.done = true;
        Ok(())
    }

    /// Abandons the change and restores the old image.
    pub fn un_before(mut self) {
        self.restore();
    }

    fn restore(&mut self) {
        if self.done {
            return;
        }
        let mut data = self.item.page.write();
        data[self.item.raw_range()].copy_from_slice(&self.old_raw);
        self.done = true;
    }
}

impl Drop for ItemUpdate<'_> {
    fn drop(&mut self) {
        self.restore();
    }
}
