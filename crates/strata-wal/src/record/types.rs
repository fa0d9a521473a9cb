//! WAL payload types.
//!
//! The data layer writes two kinds of payload. Both carry raw data-item
//! images so recovery can replay them without consulting any higher layer.

use bytes::{Buf, BufMut};
use strata_common::types::{PageNo, Uid, Xid};

use crate::error::{WalError, WalResult};

/// Payload type identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RecordType {
    /// A new data item was written into a page.
    Insert = 0,
    /// An existing data item was overwritten in place.
    Update = 1,
}

impl RecordType {
    /// Converts the record type to a u8.
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Creates a record type from a u8.
    pub fn from_u8(value: u8) -> WalResult<Self> {
        match value {
            0 => Ok(Self::Insert),
            1 => Ok(Self::Update),
            _ => Err(WalError::decode(format!("unknown record type: {value}"))),
        }
    }
}

/// A decoded log payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogRecord {
    /// `raw` was written at `offset` of `page_no`. `offset` is the page's
    /// free-space offset before the write.
    Insert {
        /// Writing transaction.
        xid: Xid,
        /// Target page.
        page_no: PageNo,
        /// In-page offset of the new item.
        offset: u16,
        /// Complete data-item image.
        raw: Vec<u8>,
    },
    /// The item at `uid` changed from `old_raw` to `new_raw`.
    Update {
        /// Writing transaction.
        xid: Xid,
        /// Location of the item.
        uid: Uid,
        /// Image before the change.
        old_raw: Vec<u8>,
        /// Image after the change. Same length as `old_raw`.
        new_raw: Vec<u8>,
    },
}

impl LogRecord {
    const INSERT_HEADER: usize = 1 + 8 + 4 + 2;
    const UPDATE_HEADER: usize = 1 + 8 + 8;

    /// Returns the payload type.
    pub fn record_type(&self) -> RecordType {
        match self {
            Self::Insert { .. } => RecordType::Insert,
            Self::Update { .. } => RecordType::Update,
        }
    }

    /// Returns the transaction that wrote this record.
    pub fn xid(&self) -> Xid {
        match self {
            Self::Insert { xid, .. } | Self::Update { xid, .. } => *xid,
        }
    }

    /// Returns the page this record touches.
    pub fn page_no(&self) -> PageNo {
        match self {
            Self::Insert { page_no, .. } => *page_no,
            Self::Update { uid, .. } => uid.page_no(),
        }
    }

    /// Encodes the payload.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Self::Insert {
                xid,
                page_no,
                offset,
                raw,
            } => {
                let mut buf = Vec::with_capacity(Self::INSERT_HEADER + raw.len());
                buf.put_u8(RecordType::Insert.as_u8());
                buf.put_u64(xid.as_u64());
                buf.put_u32(page_no.as_u32());
                buf.put_u16(*offset);
                buf.put_slice(raw);
                buf
            }
            Self::Update {
                xid,
                uid,
                old_raw,
                new_raw,
            } => {
                let mut buf =
                    Vec::with_capacity(Self::UPDATE_HEADER + old_raw.len() + new_raw.len());
                buf.put_u8(RecordType::Update.as_u8());
                buf.put_u64(xid.as_u64());
                buf.put_u64(uid.as_u64());
                buf.put_slice(old_raw);
                buf.put_slice(new_raw);
                buf
            }
        }
    }

    /// Decodes a payload produced by [`LogRecord::encode`].
    pub fn decode(payload: &[u8]) -> WalResult<Self> {
        let (&tag, _) = payload
            .split_first()
            .ok_or_else(|| WalError::decode("empty payload"))?;

        match RecordType::from_u8(tag)? {
            RecordType::Insert => {
                if payload.len() < Self::INSERT_HEADER {
                    return Err(WalError::decode(format!(
                        "insert record too short: {} bytes",
                        payload.len()
                    )));
                }
                let mut buf = &payload[1..];
                let xid = Xid::new(buf.get_u64());
                let page_no = PageNo::new(buf.get_u32());
                let offset = buf.get_u16();
                Ok(Self::Insert {
                    xid,
                    page_no,
                    offset,
                    raw: buf.to_vec(),
                })
            }
            RecordType::Update => {
                let images = payload.len().saturating_sub(Self::UPDATE_HEADER);
                if payload.len() < Self::UPDATE_HEADER || images % 2 != 0 {
                    return Err(WalError::decode(format!(
                        "malformed update record: {} bytes",
                        payload.len()
                    )));
                }
                let mut buf = &payload[1..];
                let xid = Xid::new(buf.get_u64());
                let uid = Uid::from_raw(buf.get_u64());
                let (old_raw, new_raw) = buf.split_at(images / 2);
                Ok(Self::Update {
                    xid,
                    uid,
                    old_raw: old_raw.to_vec(),
                    new_raw: new_raw.to_vec(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_layout() {
        let record = LogRecord::Insert {
            xid: Xid::new(9),
            page_no: PageNo::new(3),
            offset: 2,
            raw: vec![0, 0, 1, 0xAA],
        };
        let bytes = record.encode();
        assert_eq!(bytes[0], 0);
        assert_eq!(&bytes[1..9], &9u64.to_be_bytes());
        assert_eq!(&bytes[9..13], &3u32.to_be_bytes());
        assert_eq!(&bytes[13..15], &2u16.to_be_bytes());
        assert_eq!(&bytes[15..], &[0, 0, 1, 0xAA]);

        assert_eq!(LogRecord::decode(&bytes).unwrap(), record);
        assert_eq!(record.page_no(), PageNo::new(3));
    }

    #[test]
    fn test_update_splits_images() {
        let uid = Uid::new(PageNo::new(5), 100);
        let record = LogRecord::Update {
            xid: Xid::new(4),
            uid,
            old_raw: vec![1, 2, 3],
            new_raw: vec![4, 5, 6],
        };
        let decoded = LogRecord::decode(&record.encode()).unwrap();
        match decoded {
            LogRecord::Update {
                old_raw, new_raw, ..
            } => {
                assert_eq!(old_raw, vec![1, 2, 3]);
                assert_eq!(new_raw, vec![4, 5, 6]);
            }
            other => panic!("unexpected record: {other:?}"),
        }
        assert_eq!(record.page_no(), PageNo::new(5));
        assert_eq!(record.xid(), Xid::new(4));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(LogRecord::decode(&[]).is_err());
        assert!(LogRecord::decode(&[7, 0, 0]).is_err());
        assert!(LogRecord::decode(&[0, 1, 2]).is_err());
        // Odd image length.
        let mut bad = vec![1u8];
        bad.extend_from_slice(&[0; 16]);
        bad.push(1);
        assert!(LogRecord::decode(&bad).is_err());
    }
}
