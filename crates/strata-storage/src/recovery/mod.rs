//! Crash recovery.
//!
//! Recovery replays the log against the data file in three steps:
//!
//! 1. **Truncate**: cut the data file to the highest page any record
//!    touches (at least page 1). Pages past that were never referenced by
//!    a logged change.
//! 2. **Redo**: scan forward and reapply every record whose transaction is
//!    no longer active. Inserts are replayed with
//!    [`data::recover_insert`], updates by writing the new image.
//! 3. **Undo**: for each still-active transaction, walk its records
//!    backwards. Inserts are undone by replaying the image with the valid
//!    flag cleared; updates by writing the old image. The transaction is
//!    then marked aborted.
//!
//! Every step is idempotent, so a crash during recovery is recovered by
//! running it again.

use std::collections::HashMap;

use tracing::{debug, info};

use strata_common::types::{PageNo, Xid};
use strata_txn::TransactionManager;
use strata_wal::{LogRecord, Logger};

use crate::buffer::PageCache;
use crate::error::StorageResult;
use crate::item::set_raw_invalid;
use crate::page::data;

/// What a recovery run did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryStats {
    /// Records in the log.
    pub records: usize,
    /// Records reapplied.
    pub redone: usize,
    /// Records rolled back.
    pub undone: usize,
    /// Transactions marked aborted.
    pub aborted: usize,
    /// Page count after truncation.
    pub max_page: u32,
}

/// Brings the data file in line with the log.
pub fn recover(
    tm: &TransactionManager,
    logger: &Logger,
    page_cache: &PageCache,
) -> StorageResult<RecoveryStats> {
    info!("recovery started");
    let mut stats = RecoveryStats::default();

    logger.rewind();
    let mut max_page = 1u32;
    while let Some(record) = logger.next_record()? {
        stats.records += 1;
        max_page = max_page.max(record.page_no().as_u32());
    }
    page_cache.truncate_to(PageNo::new(max_page))?;
    stats.max_page = max_page;
    debug!(max_page, records = stats.records, "truncated data file");

    redo(tm, logger, page_cache, &mut stats)?;
    undo(tm, logger, page_cache, &mut stats)?;

    info!(
        redone = stats.redone,
        undone = stats.undone,
        aborted = stats.aborted,
        "recovery complete"
    );
    Ok(stats)
}

fn redo(
    tm: &TransactionManager,
    logger: &Logger,
    page_cache: &PageCache,
    stats: &mut RecoveryStats,
) -> StorageResult<()> {
    logger.rewind();
    while let Some(record) = logger.next_record()? {
        if tm.is_active(record.xid())? {
            continue;
        }
        match &record {
            LogRecord::Insert {
                page_no,
                offset,
                raw,
                ..
            } => apply(page_cache, *page_no, |page| {
                data::recover_insert(page, raw, *offset);
            })?,
            LogRecord::Update { uid, new_raw, .. } => {
                apply(page_cache, uid.page_no(), |page| {
                    data::recover_update(page, new_raw, uid.offset());
                })?;
            }
        }
        stats.redone += 1;
    }
    Ok(())
}

fn undo(
    tm: &TransactionManager,
    logger: &Logger,
    page_cache: &PageCache,
    stats: &mut RecoveryStats,
) -> StorageResult<()> {
    let mut active: HashMap<Xid, Vec<LogRecord>> = HashMap::new();
    logger.rewind();
    while let Some(record) = logger.next_record()? {
        if tm.is_active(record.xid())? {
            active.entry(record.xid()).or_default().push(record);
        }
    }

    for (xid, records) in active {
        for record in records.into_iter().rev() {
            match record {
                LogRecord::Insert {
                    page_no,
                    offset,
                    mut raw,
                    ..
                } => {
                    set_raw_invalid(&mut raw);
                    apply(page_cache, page_no, |page| {
                        data::recover_insert(page, &raw, offset);
                    })?;
                }
                LogRecord::Update { uid, old_raw, .. } => {
                    apply(page_cache, uid.page_no(), |page| {
                        data::recover_update(page, &old_raw, uid.offset());
                    })?;
                }
            }
            stats.undone += 1;
        }
        tm.abort(xid)?;
        stats.aborted += 1;
        debug!(%xid, "rolled back unfinished transaction");
    }
    Ok(())
}

fn apply(
    page_cache: &PageCache,
    page_no: PageNo,
    f: impl FnOnce(&crate::page::Page),
) -> StorageResult<()> {
    let page = page_cache.get_page(page_no)?;
    f(&page);
    page_cache.release(&page)
}
