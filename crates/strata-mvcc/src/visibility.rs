//! Visibility rules.
//!
//! Read committed: an entry is visible if
//!
//! - I created it and have not deleted it, or
//! - its creator committed, and it is not deleted or its deleter is
//!   another transaction that has not committed.
//!
//! Repeatable read: an entry is visible if
//!
//! - I created it and have not deleted it, or
//! - its creator committed, began before me and was not in my snapshot,
//!   and it is not deleted, or deleted by me, or its deleter has not
//!   committed, began after me, or was in my snapshot.
//!
//! The two levels differ on an entry I deleted myself: read committed
//! hides it at once, repeatable read keeps showing it to me.
//!
//! Xid 0 is always committed and is never in a snapshot.

use strata_common::types::Xid;
use strata_txn::{TransactionManager, TxnResult};

use crate::transaction::{IsolationLevel, Transaction};

/// Returns true if an entry stamped `(xmin, xmax)` is visible to `t`.
pub fn is_visible(
    tm: &TransactionManager,
    t: &Transaction,
    xmin: Xid,
    xmax: Xid,
) -> TxnResult<bool> {
    match t.level() {
        IsolationLevel::ReadCommitted => read_committed(tm, t, xmin, xmax),
        IsolationLevel::RepeatableRead => repeatable_read(tm, t, xmin, xmax),
    }
}

fn is_deleted(xmax: Xid) -> bool {
    xmax != Xid::new(0)
}

fn read_committed(tm: &TransactionManager, t: &Transaction, xmin: Xid, xmax: Xid) -> TxnResult<bool> {
    let me = t.xid();
    if xmin == me && !is_deleted(xmax) {
        return Ok(true);
    }
    if !tm.is_committed(xmin)? {
        return Ok(false);
    }
    if !is_deleted(xmax) {
        return Ok(true);
    }
    Ok(xmax != me && !tm.is_committed(xmax)?)
}

fn repeatable_read(tm: &TransactionManager, t: &Transaction, xmin: Xid, xmax: Xid) -> TxnResult<bool> {
    let me = t.xid();
    if xmin == me && !is_deleted(xmax) {
        return Ok(true);
    }
    if !tm.is_committed(xmin)? || xmin >= me || t.in_snapshot(xmin) {
        return Ok(false);
    }
    // Unlike read committed, my own delete does not hide the entry from
    // me: a repeatable-read transaction keeps reading the version it
    // started with.
    if !is_deleted(xmax) || xmax == me {
        return Ok(true);
    }
    Ok(!tm.is_committed(xmax)? || xmax > me || t.in_snapshot(xmax))
}

/// Returns true if deleting an entry last deleted by `xmax` would skip a
/// version `t` cannot see. Always false under read committed.
pub fn is_version_skip(tm: &TransactionManager, t: &Transaction, xmax: Xid) -> TxnResult<bool> {
    if t.level() == IsolationLevel::ReadCommitted || !is_deleted(xmax) {
        return Ok(false);
    }
    Ok(tm.is_committed(xmax)? && (xmax > t.xid() || t.in_snapshot(xmax)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    struct Fixture {
        _dir: tempfile::TempDir,
        tm: TransactionManager,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let tm = TransactionManager::create(dir.path().join("v")).unwrap();
        Fixture { _dir: dir, tm }
    }

    fn txn(xid: Xid, level: IsolationLevel, snapshot: &[Xid]) -> Transaction {
        Transaction::new(xid, level, snapshot.iter().copied().collect::<HashSet<_>>())
    }

    const NONE: Xid = Xid::new(0);

    #[test]
    fn test_read_committed() {
        let fx = fixture();
        let x1 = fx.tm.begin().unwrap();
        let x2 = fx.tm.begin().unwrap();
        let x3 = fx.tm.begin().unwrap();
        fx.tm.commit(x1).unwrap();
        let t2 = txn(x2, IsolationLevel::ReadCommitted, &[]);

        // Own uncommitted insert.
        assert!(is_visible(&fx.tm, &t2, x2, NONE).unwrap());
        // Another active transaction's insert.
        assert!(!is_visible(&fx.tm, &t2, x3, NONE).unwrap());
        // Committed insert, deleted by an active transaction.
        assert!(is_visible(&fx.tm, &t2, x1, x3).unwrap());
        // Deleted by me.
        assert!(!is_visible(&fx.tm, &t2, x1, x2).unwrap());

        fx.tm.commit(x3).unwrap();
        assert!(!is_visible(&fx.tm, &t2, x1, x3).unwrap());
        assert!(is_visible(&fx.tm, &t2, x3, NONE).unwrap());
    }

    #[test]
    fn test_repeatable_read() {
        let fx = fixture();
        let x1 = fx.tm.begin().unwrap();
        let x2 = fx.tm.begin().unwrap();
        let x3 = fx.tm.begin().unwrap();
        fx.tm.commit(x1).unwrap();
        let t3 = txn(x3, IsolationLevel::RepeatableRead, &[x2]);

        assert!(is_visible(&fx.tm, &t3, x1, NONE).unwrap());

        // x2 was running when x3 began: its commit stays invisible.
        fx.tm.commit(x2).unwrap();
        assert!(!is_visible(&fx.tm, &t3, x2, NONE).unwrap());
        // ... and so does its delete.
        assert!(is_visible(&fx.tm, &t3, x1, x2).unwrap());

        // A later transaction's committed insert is invisible too.
        let x4 = fx.tm.begin().unwrap();
        fx.tm.commit(x4).unwrap();
        assert!(!is_visible(&fx.tm, &t3, x4, NONE).unwrap());
        assert!(is_visible(&fx.tm, &t3, x1, x4).unwrap());

        // Deleted by me stays visible.
        assert!(is_visible(&fx.tm, &t3, x1, x3).unwrap());
    }

    #[test]
    fn test_system_transaction_always_visible() {
        let fx = fixture();
        let x1 = fx.tm.begin().unwrap();
        for level in [IsolationLevel::ReadCommitted, IsolationLevel::RepeatableRead] {
            let t = txn(x1, level, &[]);
            assert!(is_visible(&fx.tm, &t, Xid::SUPER, NONE).unwrap());
        }
    }

    #[test]
    fn test_version_skip() {
        let fx = fixture();
        let x1 = fx.tm.begin().unwrap();
        let x2 = fx.tm.begin().unwrap();
        let rr = txn(x1, IsolationLevel::RepeatableRead, &[]);
        let rc = txn(x1, IsolationLevel::ReadCommitted, &[]);

        assert!(!is_version_skip(&fx.tm, &rr, NONE).unwrap());
        assert!(!is_version_skip(&fx.tm, &rr, x2).unwrap());

        fx.tm.commit(x2).unwrap();
        assert!(is_version_skip(&fx.tm, &rr, x2).unwrap());
        assert!(!is_version_skip(&fx.tm, &rc, x2).unwrap());
    }
}
