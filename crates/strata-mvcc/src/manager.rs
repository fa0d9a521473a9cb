//! The version manager.
//!
//! [`VersionManager`] runs transactions over versioned entries. Inserts
//! stamp the creator; deletes stamp the deleter after taking the entry's
//! lock in the [`LockTable`]. Nothing is ever physically removed: whether
//! an entry exists for a transaction is decided at read time by the
//! visibility rules.
//!
//! ```text
//!   delete(xid, uid)
//!     │ visible? ──no──► false
//!     ▼
//!   LockTable::add ──deadlock──► auto-abort, Deadlock
//!     │ (may block until the holder finishes)
//!     ▼
//!   xmax == xid? ──yes──► false
//!     ▼
//!   version skip? ──yes──► auto-abort, ConcurrentUpdate
//!     ▼
//!   still visible? ──no──► false
//!     ▼
//!   xmax = xid ──► true
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use strata_common::types::{Uid, Xid};
use strata_storage::{DataManager, RefCountCache, StorageError};
use strata_txn::{LockTable, TransactionManager, TxnError};

use crate::entry::{self, Entry, EntrySource};
use crate::error::{MvccError, MvccResult};
use crate::transaction::{Failure, IsolationLevel, Transaction};
use crate::visibility;

/// Transaction front end over versioned entries.
pub struct VersionManager {
    tm: Arc<TransactionManager>,
    dm: Arc<DataManager>,
    entries: RefCountCache<EntrySource>,
    lock_table: LockTable,
    /// Running transactions, including the system transaction.
    active: Mutex<HashMap<Xid, Arc<Transaction>>>,
}

impl VersionManager {
    /// Creates a version manager over `tm` and `dm`.
    pub fn new(tm: Arc<TransactionManager>, dm: Arc<DataManager>) -> Self {
        let mut active = HashMap::new();
        active.insert(
            Xid::SUPER,
            Arc::new(Transaction::new(
                Xid::SUPER,
                IsolationLevel::ReadCommitted,
                HashSet::new(),
            )),
        );
        Self {
            entries: RefCountCache::new(
                EntrySource {
                    dm: Arc::clone(&dm),
                },
                0,
            ),
            tm,
            dm,
            lock_table: LockTable::new(),
            active: Mutex::new(active),
        }
    }

    /// Returns the lock table.
    pub fn lock_table(&self) -> &LockTable {
        &self.lock_table
    }

    /// Returns the number of running user transactions.
    pub fn active_count(&self) -> usize {
        self.active.lock().len().saturating_sub(1)
    }

    fn transaction(&self, xid: Xid) -> MvccResult<Arc<Transaction>> {
        self.active
            .lock()
            .get(&xid)
            .cloned()
            .ok_or(MvccError::UnknownTransaction { xid })
    }

    /// Loads an entry. `None` if no live item is at `uid`.
    fn load(&self, uid: Uid) -> MvccResult<Option<Arc<Entry>>> {
        match self.entries.get(uid.as_u64()) {
            Ok(entry) => Ok(Some(entry)),
            Err(StorageError::ItemNotFound { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Begins a transaction.
    pub fn begin(&self, level: IsolationLevel) -> MvccResult<Xid> {
        let mut active = self.active.lock();
        let xid = self.tm.begin()?;
        let snapshot = if level.uses_snapshot() {
            active.keys().copied().filter(|x| !x.is_super()).collect()
        } else {
            HashSet::new()
        };
        active.insert(xid, Arc::new(Transaction::new(xid, level, snapshot)));
        debug!(%xid, %level, "transaction started");
        Ok(xid)
    }

    /// Returns the data of the entry at `uid` if `xid` can see it.
    pub fn read(&self, xid: Xid, uid: Uid) -> MvccResult<Option<Vec<u8>>> {
        let t = self.transaction(xid)?;
        t.check()?;

        let Some(entry) = self.load(uid)? else {
            return Ok(None);
        };
        let (xmin, xmax) = entry.stamps();
        let result = visibility::is_visible(&self.tm, &t, xmin, xmax)
            .map(|visible| visible.then(|| entry.data()));
        self.entries.release(uid.as_u64())?;
        Ok(result?)
    }

    /// Stores `data` as a new entry created by `xid`.
    pub fn insert(&self, xid: Xid, data: &[u8]) -> MvccResult<Uid> {
        let t = self.transaction(xid)?;
        t.check()?;
        Ok(self.dm.insert(xid, &entry::wrap_raw(xid, data))?)
    }

    /// Deletes the entry at `uid` on behalf of `xid`.
    ///
    /// Returns false if the entry is not visible or already deleted by
    /// `xid`. May block while another transaction holds the entry. Fails,
    /// aborting the transaction, on deadlock or version skip.
    pub fn delete(&self, xid: Xid, uid: Uid) -> MvccResult<bool> {
        let t = self.transaction(xid)?;
        t.check()?;

        let Some(entry) = self.load(uid)? else {
            return Ok(false);
        };
        let result = self.delete_entry(&t, &entry);
        self.entries.release(uid.as_u64())?;
        result
    }

    fn delete_entry(&self, t: &Transaction, entry: &Entry) -> MvccResult<bool> {
        let xid = t.xid();
        let uid = entry.uid();
        let (xmin, xmax) = entry.stamps();
        if !visibility::is_visible(&self.tm, t, xmin, xmax)? {
            return Ok(false);
        }

        match self.lock_table.add(xid, uid) {
            Ok(Some(handle)) => handle.wait(),
            Ok(None) => {}
            Err(TxnError::Deadlock { .. }) => {
                return Err(self.auto_abort(t, Failure::Deadlock { uid }));
            }
            Err(e) => return Err(e.into()),
        }

        let (xmin, xmax) = entry.stamps();
        if xmax == xid {
            return Ok(false);
        }
        if visibility::is_version_skip(&self.tm, t, xmax)? {
            return Err(self.auto_abort(t, Failure::ConcurrentUpdate { uid }));
        }
        if !visibility::is_visible(&self.tm, t, xmin, xmax)? {
            return Ok(false);
        }

        entry.set_xmax(xid)?;
        Ok(true)
    }

    /// Records `failure`, aborts `t` and returns the error to raise.
    fn auto_abort(&self, t: &Transaction, failure: Failure) -> MvccError {
        warn!(xid = %t.xid(), ?failure, "aborting transaction");
        t.fail(failure);
        if let Err(e) = self.intern_abort(t.xid(), true) {
            return e;
        }
        failure.to_error(t.xid())
    }

    /// Commits `xid`. Fails with the recorded error if the engine aborted
    /// the transaction.
    pub fn commit(&self, xid: Xid) -> MvccResult<()> {
        if xid.is_super() {
            return Err(MvccError::SystemTransaction);
        }
        let t = self.transaction(xid)?;
        t.check()?;

        self.active.lock().remove(&xid);
        self.lock_table.remove(xid);
        self.tm.commit(xid)?;
        debug!(%xid, "transaction committed");
        Ok(())
    }

    /// Aborts `xid`.
    pub fn abort(&self, xid: Xid) -> MvccResult<()> {
        self.intern_abort(xid, false)
    }

    /// A manual abort forgets the transaction; an automatic one keeps it so
    /// later calls see its failure. Cleanup runs once either way.
    fn intern_abort(&self, xid: Xid, auto: bool) -> MvccResult<()> {
        if xid.is_super() {
            return Err(MvccError::SystemTransaction);
        }
        let t = {
            let mut active = self.active.lock();
            if auto {
                active.get(&xid).cloned()
            } else {
                active.remove(&xid)
            }
        }
        .ok_or(MvccError::UnknownTransaction { xid })?;

        if t.is_auto_aborted() {
            return Ok(());
        }
        if auto {
            t.set_auto_aborted();
        }
        self.lock_table.remove(xid);
        self.tm.abort(xid)?;
        debug!(%xid, auto, "transaction aborted");
        Ok(())
    }

    /// Releases every cached entry.
    pub fn close(&self) -> MvccResult<()> {
        Ok(self.entries.close()?)
    }
}

impl std::fmt::Debug for VersionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionManager")
            .field("active", &self.active_count())
            .field("entries", &self.entries)
            .finish()
    }
}
