//! WAL record header.
//!
//! Each record is preceded by an 8-byte header: the payload length and
//! the checksum of the payload.

use bytes::{Buf, BufMut};

/// Seed of the checksum fold.
pub const CHECKSUM_SEED: i32 = 13331;

/// Folds `bytes` into the running checksum `acc`.
///
/// Each byte is treated as signed and the arithmetic wraps at 32 bits, so
/// the value is stable across platforms.
///
/// ```rust
/// use strata_wal::checksum;
///
/// assert_eq!(checksum(0, &[]), 0);
/// assert_eq!(checksum(0, &[1]), 1);
/// assert_eq!(checksum(0, &[1, 2]), 13331 + 2);
/// ```
pub fn checksum(acc: u32, bytes: &[u8]) -> u32 {
    let folded = bytes.iter().fold(acc as i32, |acc, &b| {
        acc.wrapping_mul(CHECKSUM_SEED).wrapping_add(i32::from(b as i8))
    });
    folded as u32
}

/// WAL record header (8 bytes).
///
/// Layout:
/// - size: 4 bytes (payload length)
/// - checksum: 4 bytes (checksum of the payload)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    /// Length of the payload in bytes.
    pub size: u32,
    /// Checksum of the payload.
    pub checksum: u32,
}

impl RecordHeader {
    /// Size of the header in bytes.
    pub const SIZE: usize = 8;

    /// Builds the header for `payload`.
    pub fn for_payload(payload: &[u8]) -> Self {
        Self {
            size: payload.len() as u32,
            checksum: checksum(0, payload),
        }
    }

    /// Serializes the header to bytes.
    pub fn serialize(&self, buf: &mut impl BufMut) {
        buf.put_u32(self.size);
        buf.put_u32(self.checksum);
    }

    /// Deserializes a header. The caller guarantees at least 8 bytes.
    pub fn deserialize(mut buf: impl Buf) -> Self {
        let size = buf.get_u32();
        let checksum = buf.get_u32();
        Self { size, checksum }
    }

    /// Returns true if `payload` matches the stored checksum.
    pub fn verify(&self, payload: &[u8]) -> bool {
        checksum(0, payload) == self.checksum
    }

    /// Wraps `payload` into a complete record.
    pub fn wrap(payload: &[u8]) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::SIZE + payload.len());
        Self::for_payload(payload).serialize(&mut buf);
        buf.extend_from_slice(payload);
        buf
    }
}
