//! Lock waits and deadlock detection across threads.

mod common;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use strata_engine::IsolationLevel;

use common::{committed_row, create, read_fresh};

#[test]
fn test_deadlock_breaks_one_transaction() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(create(dir.path()));
    let a = committed_row(&engine, b"a");
    let b = committed_row(&engine, b"b");

    let t1 = engine.begin(IsolationLevel::ReadCommitted).unwrap();
    let t2 = engine.begin(IsolationLevel::ReadCommitted).unwrap();
    assert!(engine.delete(t1, a).unwrap());
    assert!(engine.delete(t2, b).unwrap());

    let waiter = {
        let engine = Arc::clone(&engine);
        thread::spawn(move || engine.delete(t1, b))
    };
    while !engine.lock_table().is_waiting(t1) {
        thread::sleep(Duration::from_millis(1));
    }

    let err = engine.delete(t2, a).unwrap_err();
    assert!(err.is_concurrency_abort());
    assert_eq!(engine.lock_table().stats().deadlock_count(), 1);

    assert!(waiter.join().unwrap().unwrap());
    engine.commit(t1).unwrap();
    engine.abort(t2).unwrap();

    assert_eq!(read_fresh(&engine, a), None);
    assert_eq!(read_fresh(&engine, b), None);
    engine.close().unwrap();
}

#[test]
fn test_waiter_proceeds_after_abort() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(create(dir.path()));
    let uid = committed_row(&engine, b"row");

    let t1 = engine.begin(IsolationLevel::ReadCommitted).unwrap();
    let t2 = engine.begin(IsolationLevel::ReadCommitted).unwrap();
    assert!(engine.delete(t1, uid).unwrap());

    let waiter = {
        let engine = Arc::clone(&engine);
        thread::spawn(move || engine.delete(t2, uid))
    };
    while !engine.lock_table().is_waiting(t2) {
        thread::sleep(Duration::from_millis(1));
    }
    engine.abort(t1).unwrap();

    assert!(waiter.join().unwrap().unwrap());
    engine.commit(t2).unwrap();
    assert_eq!(read_fresh(&engine, uid), None);
    engine.close().unwrap();
}
