//! The engine handle.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use strata_common::constants::{BOOT_SUFFIX, DB_SUFFIX, LOG_SUFFIX, XID_SUFFIX};
use strata_common::path::with_suffix;
use strata_common::types::{Uid, Xid};
use strata_mvcc::{IsolationLevel, VersionManager};
use strata_storage::{BPlusTree, DataManager, RecoveryStats};
use strata_txn::{LockTable, TransactionManager};

use crate::boot::BootFile;
use crate::config::EngineConfig;
use crate::error::EngineResult;

/// An open storage engine.
///
/// All methods take `&self`; share the handle across threads with an
/// `Arc`.
pub struct Engine {
    config: EngineConfig,
    tm: Arc<TransactionManager>,
    dm: Arc<DataManager>,
    vm: VersionManager,
    boot: BootFile,
    recovery: RecoveryStats,
    closed: AtomicBool,
}

impl Engine {
    /// Creates a new engine. Fails if any of its files exists.
    ///
    /// On failure, files created by this call are removed again.
    pub fn create(config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        let fresh: Vec<PathBuf> = [XID_SUFFIX, DB_SUFFIX, LOG_SUFFIX, BOOT_SUFFIX]
            .into_iter()
            .map(|suffix| with_suffix(&config.path, suffix))
            .filter(|path| !path.exists())
            .collect();

        match Self::create_files(&config) {
            Ok((tm, dm, boot)) => {
                info!(path = %config.path.display(), "engine created");
                Ok(Self::assemble(config, tm, dm, boot, RecoveryStats::default()))
            }
            Err(e) => {
                remove_created(&fresh);
                Err(e)
            }
        }
    }

    fn create_files(
        config: &EngineConfig,
    ) -> EngineResult<(Arc<TransactionManager>, Arc<DataManager>, BootFile)> {
        let prefix = config.path.as_path();
        let tm = Arc::new(TransactionManager::create(prefix)?);
        let dm = Arc::new(DataManager::create(prefix, config.data_manager_config())?);
        let boot = BootFile::create(prefix)?;
        Ok((tm, dm, boot))
    }

    /// Opens an existing engine, recovering from the log first.
    pub fn open(config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        let prefix = config.path.as_path();
        let tm = Arc::new(TransactionManager::open(prefix)?);
        let (dm, recovery) = DataManager::open(prefix, config.data_manager_config(), &tm)?;
        let boot = BootFile::open(prefix)?;

        info!(
            path = %prefix.display(),
            redone = recovery.redone,
            undone = recovery.undone,
            "engine opened"
        );
        Ok(Self::assemble(config, tm, Arc::new(dm), boot, recovery))
    }

    fn assemble(
        config: EngineConfig,
        tm: Arc<TransactionManager>,
        dm: Arc<DataManager>,
        boot: BootFile,
        recovery: RecoveryStats,
    ) -> Self {
        let vm = VersionManager::new(Arc::clone(&tm), Arc::clone(&dm));
        Self {
            config,
            tm,
            dm,
            vm,
            boot,
            recovery,
            closed: AtomicBool::new(false),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns what recovery did when this engine was opened.
    pub fn recovery_stats(&self) -> RecoveryStats {
        self.recovery
    }

    /// Returns the transaction status store.
    pub fn transactions(&self) -> &TransactionManager {
        &self.tm
    }

    /// Returns the data manager.
    pub fn data_manager(&self) -> &Arc<DataManager> {
        &self.dm
    }

    /// Returns the lock table guarding deletes.
    pub fn lock_table(&self) -> &LockTable {
        self.vm.lock_table()
    }

    /// Begins a transaction.
    pub fn begin(&self, level: IsolationLevel) -> EngineResult<Xid> {
        Ok(self.vm.begin(level)?)
    }

    /// Commits a transaction.
    pub fn commit(&self, xid: Xid) -> EngineResult<()> {
        Ok(self.vm.commit(xid)?)
    }

    /// Aborts a transaction.
    pub fn abort(&self, xid: Xid) -> EngineResult<()> {
        Ok(self.vm.abort(xid)?)
    }

    /// Reads the record at `uid` as seen by `xid`.
    pub fn read(&self, xid: Xid, uid: Uid) -> EngineResult<Option<Vec<u8>>> {
        Ok(self.vm.read(xid, uid)?)
    }

    /// Inserts a record.
    pub fn insert(&self, xid: Xid, data: &[u8]) -> EngineResult<Uid> {
        Ok(self.vm.insert(xid, data)?)
    }

    /// Deletes the record at `uid`.
    pub fn delete(&self, xid: Xid, uid: Uid) -> EngineResult<bool> {
        Ok(self.vm.delete(xid, uid)?)
    }

    /// Creates an empty index and returns its boot uid.
    pub fn create_index(&self) -> EngineResult<Uid> {
        Ok(BPlusTree::create(&self.dm)?)
    }

    /// Attaches to the index whose boot uid is `boot_uid`.
    pub fn load_index(&self, boot_uid: Uid) -> EngineResult<BPlusTree> {
        Ok(BPlusTree::load(boot_uid, Arc::clone(&self.dm))?)
    }

    /// Returns the bytes stored in the boot file.
    pub fn boot_data(&self) -> EngineResult<Vec<u8>> {
        self.boot.load()
    }

    /// Atomically replaces the bytes stored in the boot file.
    pub fn set_boot_data(&self, data: &[u8]) -> EngineResult<()> {
        self.boot.update(data)
    }

    /// Flushes and closes every layer.
    pub fn close(&self) -> EngineResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.vm.close()?;
        self.dm.close()?;
        self.tm.close()?;
        info!(path = %self.config.path.display(), "engine closed");
        Ok(())
    }
}

fn remove_created(paths: &[PathBuf]) {
    for path in paths {
        match fs::remove_file(path) {
            Ok(()) => debug!(path = %path.display(), "removed file of failed create"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "could not remove file"),
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("path", &self.config.path)
            .field("vm", &self.vm)
            .field("dm", &self.dm)
            .finish()
    }
}
