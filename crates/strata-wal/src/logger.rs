//! The log file.
//!
//! [`Logger`] appends framed records, keeps the running checksum header in
//! step with them, and offers a restartable forward iterator for recovery.
//! All file access goes through one mutex, so concurrent appends never
//! interleave their checksum updates.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, warn};

use strata_common::constants::LOG_SUFFIX;
use strata_common::path::with_suffix;

use crate::config::WalConfig;
use crate::error::{WalError, WalResult};
use crate::record::header::{checksum, RecordHeader};
use crate::record::types::LogRecord;

/// Size of the running checksum header.
const HEADER_SIZE: u64 = 4;

struct LogFile {
    file: File,
    /// Read cursor for [`Logger::next`].
    position: u64,
    file_size: u64,
    x_checksum: u32,
}

impl LogFile {
    /// Reads the complete record at the cursor, or `None` at the end of
    /// the valid prefix.
    fn read_record(&mut self) -> WalResult<Option<Vec<u8>>> {
        let header_end = self.position + RecordHeader::SIZE as u64;
        if header_end > self.file_size {
            return Ok(None);
        }

        let mut head = [0u8; RecordHeader::SIZE];
        self.file.seek(SeekFrom::Start(self.position))?;
        self.file.read_exact(&mut head)?;
        let header = RecordHeader::deserialize(&head[..]);

        if header_end + u64::from(header.size) > self.file_size {
            return Ok(None);
        }

        let mut record = vec![0u8; RecordHeader::SIZE + header.size as usize];
        record[..RecordHeader::SIZE].copy_from_slice(&head);
        self.file.read_exact(&mut record[RecordHeader::SIZE..])?;

        if !header.verify(&record[RecordHeader::SIZE..]) {
            return Ok(None);
        }

        self.position += record.len() as u64;
        Ok(Some(record))
    }

    fn write_header(&mut self) -> WalResult<()> {
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&self.x_checksum.to_be_bytes())?;
        Ok(())
    }
}

/// Append-only, checksummed log.
///
/// # Example
///
/// ```rust,no_run
/// use strata_wal::{Logger, WalConfig};
///
/// let logger = Logger::create("/tmp/strata", WalConfig::default())?;
/// logger.log(b"payload")?;
/// logger.rewind();
/// assert_eq!(logger.next()?.as_deref(), Some(&b"payload"[..]));
/// # Ok::<(), strata_wal::WalError>(())
/// ```
pub struct Logger {
    path: PathBuf,
    config: WalConfig,
    inner: Mutex<LogFile>,
}

impl Logger {
    /// Creates a new log at `<prefix>.log`. Fails if the file exists.
    pub fn create(prefix: impl AsRef<Path>, config: WalConfig) -> WalResult<Self> {
        let path = with_suffix(prefix.as_ref(), LOG_SUFFIX);
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::AlreadyExists => WalError::FileExists { path: path.clone() },
                _ => WalError::Io { source: e },
            })?;

        file.write_all(&0u32.to_be_bytes())?;
        file.sync_all()?;
        debug!(path = %path.display(), "created log file");

        Ok(Self {
            path,
            config,
            inner: Mutex::new(LogFile {
                file,
                position: HEADER_SIZE,
                file_size: HEADER_SIZE,
                x_checksum: 0,
            }),
        })
    }

    /// Opens an existing log at `<prefix>.log`.
    ///
    /// Replays every verifiable record to recompute the running checksum.
    /// A mismatch with the stored header is fatal. Otherwise the bad tail
    /// is truncated and the cursor rewinds to the first record.
    pub fn open(prefix: impl AsRef<Path>, config: WalConfig) -> WalResult<Self> {
        let path = with_suffix(prefix.as_ref(), LOG_SUFFIX);
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => WalError::FileNotFound { path: path.clone() },
                _ => WalError::Io { source: e },
            })?;

        let file_size = file.metadata()?.len();
        if file_size < HEADER_SIZE {
            return Err(WalError::BadLogFile { len: file_size });
        }

        let mut head = [0u8; HEADER_SIZE as usize];
        file.seek(SeekFrom::Start(0))?;
        file.read_exact(&mut head)?;
        let stored = u32::from_be_bytes(head);

        let mut log = LogFile {
            file,
            position: HEADER_SIZE,
            file_size,
            x_checksum: stored,
        };

        let mut computed = 0u32;
        while let Some(record) = log.read_record()? {
            computed = checksum(computed, &record);
        }
        if computed != stored {
            return Err(WalError::ChecksumMismatch { stored, computed });
        }

        let valid = log.position;
        let logger = Self {
            path,
            config,
            inner: Mutex::new(log),
        };
        if valid < file_size {
            warn!(
                path = %logger.path.display(),
                valid,
                discarded = file_size - valid,
                "truncating bad tail of log"
            );
            logger.truncate(valid)?;
        }
        logger.rewind();
        Ok(logger)
    }

    /// Returns the path of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends `payload` as a new record and updates the checksum header.
    pub fn log(&self, payload: &[u8]) -> WalResult<()> {
        let record = RecordHeader::wrap(payload);
        let mut log = self.inner.lock();

        let end = log.file_size;
        log.file.seek(SeekFrom::Start(end))?;
        log.file.write_all(&record)?;
        log.file_size += record.len() as u64;

        log.x_checksum = checksum(log.x_checksum, &record);
        log.write_header()?;

        if self.config.syncs_every_write() {
            log.file.sync_data()?;
        }
        Ok(())
    }

    /// Encodes and appends a [`LogRecord`].
    pub fn append(&self, record: &LogRecord) -> WalResult<()> {
        self.log(&record.encode())
    }

    /// Returns the payload of the next record, or `None` at the end.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&self) -> WalResult<Option<Vec<u8>>> {
        let mut log = self.inner.lock();
        Ok(log
            .read_record()?
            .map(|mut record| record.split_off(RecordHeader::SIZE)))
    }

    /// Decodes the next record, or `None` at the end.
    pub fn next_record(&self) -> WalResult<Option<LogRecord>> {
        self.next()?.map(|payload| LogRecord::decode(&payload)).transpose()
    }

    /// Moves the cursor back to the first record.
    pub fn rewind(&self) {
        self.inner.lock().position = HEADER_SIZE;
    }

    /// Truncates the file to `len` bytes.
    pub fn truncate(&self, len: u64) -> WalResult<()> {
        let mut log = self.inner.lock();
        log.file.set_len(len)?;
        log.file.sync_all()?;
        log.file_size = len;
        log.position = log.position.min(len);
        Ok(())
    }

    /// Returns the current file length.
    pub fn len(&self) -> u64 {
        self.inner.lock().file_size
    }

    /// Returns true if the log holds no records.
    pub fn is_empty(&self) -> bool {
        self.len() <= HEADER_SIZE
    }

    #[cfg(test)]
    fn running_checksum(&self) -> u32 {
        self.inner.lock().x_checksum
    }

    /// Flushes the file.
    pub fn close(&self) -> WalResult<()> {
        self.inner.lock().file.sync_all()?;
        Ok(())
    }
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("path", &self.path)
            .field("len", &self.len())
            .finish()
    }
}
