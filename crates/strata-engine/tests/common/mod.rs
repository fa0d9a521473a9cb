//! Shared helpers for the integration tests.

#![allow(dead_code)]

use std::path::Path;

use strata_engine::{Engine, EngineConfig, IsolationLevel, Uid};
use tracing_subscriber::EnvFilter;

/// Installs a test-friendly subscriber once per binary. Set `RUST_LOG` to
/// see engine logs.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A small configuration rooted in `dir`.
pub fn config(dir: &Path) -> EngineConfig {
    EngineConfig::new(dir.join("db"))
        .with_memory_bytes(256 * 1024)
        .with_sync_writes(false)
}

/// Creates a fresh engine in `dir`.
pub fn create(dir: &Path) -> Engine {
    init_logging();
    Engine::create(config(dir)).unwrap()
}

/// Opens the engine in `dir`, running recovery.
pub fn reopen(dir: &Path) -> Engine {
    init_logging();
    Engine::open(config(dir)).unwrap()
}

/// Inserts `data` in its own committed transaction.
pub fn committed_row(engine: &Engine, data: &[u8]) -> Uid {
    let xid = engine.begin(IsolationLevel::ReadCommitted).unwrap();
    let uid = engine.insert(xid, data).unwrap();
    engine.commit(xid).unwrap();
    uid
}

/// Reads `uid` in a fresh read-committed transaction.
pub fn read_fresh(engine: &Engine, uid: Uid) -> Option<Vec<u8>> {
    let xid = engine.begin(IsolationLevel::ReadCommitted).unwrap();
    let data = engine.read(xid, uid).unwrap();
    engine.commit(xid).unwrap();
    data
}
