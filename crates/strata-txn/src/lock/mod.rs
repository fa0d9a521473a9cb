//! Lock table for write-write conflicts.
//!
//! Every lock is exclusive and keyed by uid. The table keeps four
//! relations under one mutex:
//!
//! ```text
//! x2u        xid → uids it holds
//! u2x        uid → xid holding it
//! wait       uid → queue of xids waiting for it
//! wait_lock  xid → handle the waiting xid is blocked on
//! wait_u     xid → uid it is waiting for
//! ```
//!
//! A request for a held uid enqueues the requester and runs deadlock
//! detection before anyone blocks. If granting the wait would close a
//! cycle, the request is withdrawn and fails; the requester never sleeps
//! inside a deadlock.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use tracing::debug;

use strata_common::types::{Uid, Xid};

use crate::deadlock::WaitForGraph;
use crate::error::{TxnError, TxnResult};

/// What a blocked requester waits on until the lock is handed over.
#[derive(Debug, Default)]
pub struct WaitHandle {
    granted: Mutex<bool>,
    cond: Condvar,
}

impl WaitHandle {
    fn new() -> Self {
        Self::default()
    }

    fn grant(&self) {
        let mut granted = self.granted.lock();
        *granted = true;
        self.cond.notify_all();
    }

    /// Blocks the calling thread until the lock is granted.
    pub fn wait(&self) {
        let mut granted = self.granted.lock();
        while !*granted {
            self.cond.wait(&mut granted);
        }
    }

    /// Returns true once the lock has been handed over.
    pub fn is_granted(&self) -> bool {
        *self.granted.lock()
    }
}

/// Statistics about the lock table.
#[derive(Debug, Default)]
pub struct LockStats {
    /// Locks granted immediately.
    pub acquisitions: AtomicU64,
    /// Requests that had to wait.
    pub waits: AtomicU64,
    /// Requests refused because of a deadlock.
    pub deadlocks: AtomicU64,
    /// Locks handed to a waiter on release.
    pub handoffs: AtomicU64,
}

impl LockStats {
    fn record(counter: &AtomicU64) {
        counter.fetch_add(1, AtomicOrdering::Relaxed);
    }

    /// Returns the number of deadlocks detected so far.
    pub fn deadlock_count(&self) -> u64 {
        self.deadlocks.load(AtomicOrdering::Relaxed)
    }
}

#[derive(Default)]
struct LockState {
    x2u: HashMap<Xid, Vec<Uid>>,
    u2x: HashMap<Uid, Xid>,
    wait: HashMap<Uid, VecDeque<Xid>>,
    wait_lock: HashMap<Xid, Arc<WaitHandle>>,
    wait_u: HashMap<Xid, Uid>,
}

impl LockState {
    fn holds(&self, xid: Xid, uid: Uid) -> bool {
        self.x2u.get(&xid).is_some_and(|uids| uids.contains(&uid))
    }

    fn has_deadlock(&self) -> bool {
        WaitForGraph::new(&self.x2u, &self.u2x, &self.wait_u).has_cycle()
    }

    fn withdraw(&mut self, xid: Xid, uid: Uid) {
        self.wait_u.remove(&xid);
        if let Some(queue) = self.wait.get_mut(&uid) {
            queue.retain(|&w| w != xid);
            if queue.is_empty() {
                self.wait.remove(&uid);
            }
        }
    }

    /// Hands `uid` to the first queued xid that is still waiting.
    fn select_new_holder(&mut self, uid: Uid) -> bool {
        self.u2x.remove(&uid);
        let Some(queue) = self.wait.get_mut(&uid) else {
            return false;
        };

        let mut handed = false;
        while let Some(xid) = queue.pop_front() {
            let Some(handle) = self.wait_lock.remove(&xid) else {
                continue;
            };
            self.u2x.insert(uid, xid);
            self.x2u.entry(xid).or_default().push(uid);
            self.wait_u.remove(&xid);
            handle.grant();
            handed = true;
            break;
        }

        if queue.is_empty() {
            self.wait.remove(&uid);
        }
        handed
    }
}

/// The lock table.
pub struct LockTable {
    inner: Mutex<LockState>,
    stats: LockStats,
}

impl LockTable {
    /// Creates an empty lock table.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(LockState::default()),
            stats: LockStats::default(),
        }
    }

    /// Requests the lock on `uid` for `xid`.
    ///
    /// Returns `Ok(None)` if the lock is held now, `Ok(Some(handle))` if
    /// the caller must [`WaitHandle::wait`] for it, and
    /// [`TxnError::Deadlock`] if waiting would deadlock. A refused request
    /// leaves no trace in the table.
    pub fn add(&self, xid: Xid, uid: Uid) -> TxnResult<Option<Arc<WaitHandle>>> {
        let mut state = self.inner.lock();

        if state.holds(xid, uid) {
            return Ok(None);
        }
        if !state.u2x.contains_key(&uid) {
            state.u2x.insert(uid, xid);
            state.x2u.entry(xid).or_default().push(uid);
            LockStats::record(&self.stats.acquisitions);
            return Ok(None);
        }

        state.wait_u.insert(xid, uid);
        state.wait.entry(uid).or_default().push_back(xid);

        if state.has_deadlock() {
            state.withdraw(xid, uid);
            LockStats::record(&self.stats.deadlocks);
            debug!(%xid, %uid, "deadlock detected, request refused");
            return Err(TxnError::Deadlock { xid, uid });
        }

        let handle = Arc::new(WaitHandle::new());
        state.wait_lock.insert(xid, Arc::clone(&handle));
        LockStats::record(&self.stats.waits);
        Ok(Some(handle))
    }

    /// Releases everything `xid` holds and forgets its wait state.
    pub fn remove(&self, xid: Xid) {
        let mut state = self.inner.lock();

        if let Some(uids) = state.x2u.remove(&xid) {
            for uid in uids {
                if state.select_new_holder(uid) {
                    LockStats::record(&self.stats.handoffs);
                }
            }
        }
        if let Some(uid) = state.wait_u.remove(&xid) {
            if let Some(queue) = state.wait.get_mut(&uid) {
                queue.retain(|&w| w != xid);
                if queue.is_empty() {
                    state.wait.remove(&uid);
                }
            }
        }
        state.wait_lock.remove(&xid);
    }

    /// Returns the xid currently holding `uid`.
    pub fn holder(&self, uid: Uid) -> Option<Xid> {
        self.inner.lock().u2x.get(&uid).copied()
    }

    #[cfg(test)]
    fn held_by(&self, xid: Xid) -> Vec<Uid> {
        self.inner
            .lock()
            .x2u
            .get(&xid)
            .cloned()
            .unwrap_or_default()
    }

    /// Returns true if `xid` is waiting for a lock.
    pub fn is_waiting(&self, xid: Xid) -> bool {
        self.inner.lock().wait_lock.contains_key(&xid)
    }

    /// Returns statistics about the lock table.
    pub fn stats(&self) -> &LockStats {
        &self.stats
    }
}

impl Default for LockTable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LockTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("LockTable")
            .field("held", &state.u2x.len())
            .field("waiting", &state.wait_lock.len())
            .finish()
    }
}
