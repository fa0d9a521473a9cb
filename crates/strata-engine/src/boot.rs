//! The boot file.
//!
//! A small file holding caller-defined bytes, typically the boot uid of
//! the first index. It is replaced atomically: new content goes to
//! `<path>.bt_tmp`, is synced, then renamed over `<path>.bt`, so a reader
//! never sees a half-written file.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, warn};

use strata_common::constants::{BOOT_SUFFIX, BOOT_TMP_SUFFIX};
use strata_common::path::with_suffix;

use crate::error::{EngineError, EngineResult};

/// The boot file.
#[derive(Debug)]
pub struct BootFile {
    path: PathBuf,
    tmp: PathBuf,
    /// Serializes updates.
    lock: Mutex<()>,
}

impl BootFile {
    fn paths(prefix: &Path) -> (PathBuf, PathBuf) {
        (
            with_suffix(prefix, BOOT_SUFFIX),
            with_suffix(prefix, BOOT_TMP_SUFFIX),
        )
    }

    /// Creates an empty boot file at `<prefix>.bt`.
    pub fn create(prefix: impl AsRef<Path>) -> EngineResult<Self> {
        let (path, tmp) = Self::paths(prefix.as_ref());
        remove_stale(&tmp)?;
        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => EngineError::BootExists { path: path.clone() },
                _ => e.into(),
            })?
            .sync_all()?;
        Ok(Self {
            path,
            tmp,
            lock: Mutex::new(()),
        })
    }

    /// Opens the boot file at `<prefix>.bt`.
    pub fn open(prefix: impl AsRef<Path>) -> EngineResult<Self> {
        let (path, tmp) = Self::paths(prefix.as_ref());
        remove_stale(&tmp)?;
        if !path.exists() {
            return Err(EngineError::BootMissing { path });
        }
        Ok(Self {
            path,
            tmp,
            lock: Mutex::new(()),
        })
    }

    /// Returns the path of the boot file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the whole file.
    pub fn load(&self) -> EngineResult<Vec<u8>> {
        let _guard = self.lock.lock();
        Ok(fs::read(&self.path)?)
    }

    /// Replaces the file's content with `data`.
    pub fn update(&self, data: &[u8]) -> EngineResult<()> {
        let _guard = self.lock.lock();
        let mut file = File::create(&self.tmp)?;
        file.write_all(data)?;
        file.sync_all()?;
        drop(file);
        fs::rename(&self.tmp, &self.path)?;
        debug!(path = %self.path.display(), len = data.len(), "boot file updated");
        Ok(())
    }
}

/// A temp file left behind by an interrupted update is never valid: the
/// rename that would have published it did not happen.
fn remove_stale(tmp: &Path) -> EngineResult<()> {
    match fs::remove_file(tmp) {
        Ok(()) => {
            warn!(path = %tmp.display(), "removed stale boot temp file");
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
