//! Transaction status store.
//!
//! The `.xid` file records the fate of every transaction ever begun:
//!
//! ```text
//! ┌──────────────┬────────┬────────┬─────┬────────┐
//! │ count (8 B)  │ xid 1  │ xid 2  │ ... │ xid n  │
//! └──────────────┴────────┴────────┴─────┴────────┘
//!                  1 byte per transaction
//! ```
//!
//! # Transaction States
//!
//! ```text
//! ┌───────┐    begin()    ┌────────┐
//! │ Start │──────────────▶│ Active │
//! └───────┘               └────────┘
//!                              │
//!                    ┌────────┴────────┐
//!                    │                 │
//!               commit()           abort()
//!                    │                 │
//!                    ▼                 ▼
//!             ┌───────────┐     ┌──────────┐
//!             │ Committed │     │ Aborted  │
//!             └───────────┘     └──────────┘
//! ```
//!
//! Xid 0 is the system transaction. It has no byte in the file and is
//! always committed.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use bytes::{Buf, BufMut};
use parking_lot::Mutex;
use tracing::debug;

use strata_common::constants::XID_SUFFIX;
use strata_common::path::with_suffix;
use strata_common::types::Xid;

use crate::error::{TxnError, TxnResult};

/// Length of the counter header.
const HEADER_LEN: u64 = 8;

/// The status of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum XidStatus {
    /// Begun and not yet finished.
    Active = 0,
    /// Committed.
    Committed = 1,
    /// Aborted, either by the caller, by the engine or by recovery.
    Aborted = 2,
}

impl XidStatus {
    /// Returns the on-disk byte.
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Parses an on-disk byte.
    pub fn from_u8(xid: Xid, byte: u8) -> TxnResult<Self> {
        match byte {
            0 => Ok(Self::Active),
            1 => Ok(Self::Committed),
            2 => Ok(Self::Aborted),
            _ => Err(TxnError::BadStatus { xid, byte }),
        }
    }
}

impl fmt::Display for XidStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            XidStatus::Active => write!(f, "Active"),
            XidStatus::Committed => write!(f, "Committed"),
            XidStatus::Aborted => write!(f, "Aborted"),
        }
    }
}

struct XidFile {
    file: File,
    counter: u64,
}

impl XidFile {
    fn position(xid: Xid) -> u64 {
        HEADER_LEN + (xid.as_u64() - 1)
    }

    fn check_known(&self, xid: Xid) -> TxnResult<()> {
        if xid.as_u64() > self.counter {
            return Err(TxnError::UnknownXid { xid });
        }
        Ok(())
    }

    fn write_status(&mut self, xid: Xid, status: XidStatus) -> TxnResult<()> {
        self.file.seek(SeekFrom::Start(Self::position(xid)))?;
        self.file.write_all(&[status.as_u8()])?;
        self.file.sync_data()?;
        Ok(())
    }

    fn read_status(&mut self, xid: Xid) -> TxnResult<XidStatus> {
        self.check_known(xid)?;
        let mut byte = [0u8; 1];
        self.file.seek(SeekFrom::Start(Self::position(xid)))?;
        self.file.read_exact(&mut byte)?;
        XidStatus::from_u8(xid, byte[0])
    }

    fn write_counter(&mut self) -> TxnResult<()> {
        let mut header = Vec::with_capacity(HEADER_LEN as usize);
        header.put_u64(self.counter);
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&header)?;
        self.file.sync_data()?;
        Ok(())
    }
}

/// The persistent transaction status table.
pub struct TransactionManager {
    path: PathBuf,
    inner: Mutex<XidFile>,
}

impl TransactionManager {
    /// Creates `<prefix>.xid` with a zero counter. Fails if it exists.
    pub fn create(prefix: impl AsRef<Path>) -> TxnResult<Self> {
        let path = with_suffix(prefix.as_ref(), XID_SUFFIX);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::AlreadyExists => TxnError::FileExists { path: path.clone() },
                _ => TxnError::Io { source: e },
            })?;

        let mut xid_file = XidFile { file, counter: 0 };
        xid_file.write_counter()?;
        debug!(path = %path.display(), "created transaction file");

        Ok(Self {
            path,
            inner: Mutex::new(xid_file),
        })
    }

    /// Opens `<prefix>.xid` and checks the counter against the length.
    pub fn open(prefix: impl AsRef<Path>) -> TxnResult<Self> {
        let path = with_suffix(prefix.as_ref(), XID_SUFFIX);
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => TxnError::FileNotFound { path: path.clone() },
                _ => TxnError::Io { source: e },
            })?;

        let len = file.metadata()?.len();
        if len < HEADER_LEN {
            return Err(TxnError::BadXidFile { count: 0, len });
        }

        let mut header = [0u8; HEADER_LEN as usize];
        file.read_exact(&mut header)?;
        let counter = (&header[..]).get_u64();
        if HEADER_LEN.checked_add(counter) != Some(len) {
            return Err(TxnError::BadXidFile { count: counter, len });
        }

        Ok(Self {
            path,
            inner: Mutex::new(XidFile { file, counter }),
        })
    }

    /// Returns the path of the status file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Begins a new transaction and returns its xid.
    pub fn begin(&self) -> TxnResult<Xid> {
        let mut inner = self.inner.lock();
        let xid = Xid::new(inner.counter + 1);
        inner.write_status(xid, XidStatus::Active)?;
        inner.counter += 1;
        inner.write_counter()?;
        Ok(xid)
    }

    /// Marks `xid` committed.
    pub fn commit(&self, xid: Xid) -> TxnResult<()> {
        self.finish(xid, XidStatus::Committed)
    }

    /// Marks `xid` aborted.
    pub fn abort(&self, xid: Xid) -> TxnResult<()> {
        self.finish(xid, XidStatus::Aborted)
    }

    fn finish(&self, xid: Xid, status: XidStatus) -> TxnResult<()> {
        if xid.is_super() {
            return Ok(());
        }
        let mut inner = self.inner.lock();
        inner.check_known(xid)?;
        inner.write_status(xid, status)
    }

    /// Returns the status of `xid`.
    pub fn status(&self, xid: Xid) -> TxnResult<XidStatus> {
        if xid.is_super() {
            return Ok(XidStatus::Committed);
        }
        self.inner.lock().read_status(xid)
    }

    /// Returns true if `xid` is active.
    pub fn is_active(&self, xid: Xid) -> TxnResult<bool> {
        Ok(self.status(xid)? == XidStatus::Active)
    }

    /// Returns true if `xid` is committed. Always true for xid 0.
    pub fn is_committed(&self, xid: Xid) -> TxnResult<bool> {
        Ok(self.status(xid)? == XidStatus::Committed)
    }

    /// Returns true if `xid` is aborted.
    pub fn is_aborted(&self, xid: Xid) -> TxnResult<bool> {
        Ok(self.status(xid)? == XidStatus::Aborted)
    }

    /// Returns the number of transactions ever begun.
    pub fn count(&self) -> u64 {
        self.inner.lock().counter
    }

    /// Flushes the file.
    pub fn close(&self) -> TxnResult<()> {
        self.inner.lock().file.sync_all()?;
        Ok(())
    }
}

impl fmt::Debug for TransactionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionManager")
            .field("path", &self.path)
            .field("count", &self.count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_commit_abort() {
        let dir = tempfile::tempdir().unwrap();
        let tm = TransactionManager::create(dir.path().join("t")).unwrap();

        let x1 = tm.begin().unwrap();
        let x2 = tm.begin().unwrap();
        assert_eq!(x1, Xid::new(1));
        assert_eq!(x2, Xid::new(2));
        assert!(tm.is_active(x1).unwrap());

        tm.commit(x1).unwrap();
        tm.abort(x2).unwrap();
        assert!(tm.is_committed(x1).unwrap());
        assert!(!tm.is_active(x1).unwrap());
        assert!(tm.is_aborted(x2).unwrap());
        assert_eq!(tm.count(), 2);
    }

    #[test]
    fn test_super_xid_is_committed() {
        let dir = tempfile::tempdir().unwrap();
        let tm = TransactionManager::create(dir.path().join("t")).unwrap();
        assert!(tm.is_committed(Xid::SUPER).unwrap());
        assert!(!tm.is_active(Xid::SUPER).unwrap());
        assert!(!tm.is_aborted(Xid::SUPER).unwrap());
        tm.abort(Xid::SUPER).unwrap();
        assert!(tm.is_committed(Xid::SUPER).unwrap());
    }

    #[test]
    fn test_file_layout_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("t");
        {
            let tm = TransactionManager::create(&prefix).unwrap();
            let x1 = tm.begin().unwrap();
            tm.begin().unwrap();
            tm.commit(x1).unwrap();
            tm.close().unwrap();
        }

        let bytes = std::fs::read(with_suffix(&prefix, XID_SUFFIX)).unwrap();
        assert_eq!(bytes.len(), 10);
        assert_eq!(&bytes[..8], &2u64.to_be_bytes());
        assert_eq!(&bytes[8..], &[1, 0]);

        let tm = TransactionManager::open(&prefix).unwrap();
        assert_eq!(tm.count(), 2);
        assert!(tm.is_committed(Xid::new(1)).unwrap());
        assert!(tm.is_active(Xid::new(2)).unwrap());
        assert_eq!(tm.begin().unwrap(), Xid::new(3));
    }

    #[test]
    fn test_length_mismatch_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("t");
        {
            let tm = TransactionManager::create(&prefix).unwrap();
            tm.begin().unwrap();
        }
        let path = with_suffix(&prefix, XID_SUFFIX);
        let mut bytes = std::fs::read(&path).unwrap();
        bytes.push(0);
        std::fs::write(&path, &bytes).unwrap();

        let err = TransactionManager::open(&prefix).unwrap_err();
        assert!(matches!(err, TxnError::BadXidFile { count: 1, len: 10 }));
        assert!(err.class().is_fatal());
    }

    #[test]
    fn test_unknown_xid() {
        let dir = tempfile::tempdir().unwrap();
        let tm = TransactionManager::create(dir.path().join("t")).unwrap();
        assert!(matches!(
            tm.is_active(Xid::new(5)),
            Err(TxnError::UnknownXid { .. })
        ));
        assert!(tm.commit(Xid::new(1)).is_err());
    }

    #[test]
    fn test_create_twice_fails() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("t");
        TransactionManager::create(&prefix).unwrap();
        assert!(matches!(
            TransactionManager::create(&prefix),
            Err(TxnError::FileExists { .. })
        ));
        assert!(matches!(
            TransactionManager::open(dir.path().join("missing")),
            Err(TxnError::FileNotFound { .. })
        ));
    }

    #[test]
    fn test_status_display() {
        assert_eq!(XidStatus::Active.to_string(), "Active");
        assert!(XidStatus::from_u8(Xid::new(1), 9).is_err());
    }
}
