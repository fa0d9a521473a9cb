//! Page-granular file I/O.
//!
//! [`PageFile`] wraps the data file behind a mutex and addresses it in
//! whole pages: page `n` lives at byte `(n - 1) * PAGE_SIZE`.

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use strata_common::constants::PAGE_SIZE;
use strata_common::types::PageNo;

use crate::error::{StorageError, StorageResult};

/// The data file.
pub struct PageFile {
    /// The underlying file, wrapped in a mutex for thread-safe access.
    file: Mutex<File>,
    /// The file path.
    path: PathBuf,
}

impl PageFile {
    /// Creates a new empty file. Fails if it exists.
    pub fn create(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => StorageError::FileExists { path: path.clone() },
                _ => StorageError::Io { source: e },
            })?;
        Ok(Self {
            file: Mutex::new(file),
            path,
        })
    }

    /// Opens an existing file.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => StorageError::FileNotFound { path: path.clone() },
                _ => StorageError::Io { source: e },
            })?;
        Ok(Self {
            file: Mutex::new(file),
            path,
        })
    }

    /// Returns the file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the file length in bytes.
    pub fn len(&self) -> StorageResult<u64> {
        Ok(self.file.lock().metadata()?.len())
    }

    /// Returns true if the file holds no pages.
    pub fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Reads one page. Bytes past the end of the file read as zero.
    pub fn read_page(&self, page_no: PageNo) -> StorageResult<Vec<u8>> {
        let mut buf = vec![0u8; PAGE_SIZE];
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(page_no.file_offset()))?;

        let mut filled = 0;
        while filled < buf.len() {
            match file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(buf)
    }

    /// Writes one page and forces it to disk.
    pub fn write_page(&self, page_no: PageNo, data: &[u8]) -> StorageResult<()> {
        debug_assert_eq!(data.len(), PAGE_SIZE);
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(page_no.file_offset()))?;
        file.write_all(data)?;
        file.sync_data()?;
        Ok(())
    }

    /// Sets the file length.
    pub fn set_len(&self, len: u64) -> StorageResult<()> {
        let file = self.file.lock();
        file.set_len(len)?;
        file.sync_all()?;
        Ok(())
    }

    /// Flushes all data and metadata.
    pub fn sync(&self) -> StorageResult<()> {
        self.file.lock().sync_all()?;
        Ok(())
    }
}

impl std::fmt::Debug for PageFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageFile").field("path", &self.path).finish()
    }
}
