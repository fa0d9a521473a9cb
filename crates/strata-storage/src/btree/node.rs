//! Node images.
//!
//! ```text
//! ┌──────────┬───────────┬─────────────┬──────────────┬──────────────┬─────┐
//! │ leaf (1) │ nkeys (2) │ sibling (8) │ son 0 │ key 0 │ son 1 │ key 1 │ ... │
//! └──────────┴───────────┴─────────────┴──────────────┴──────────────┴─────┘
//! ```
//!
//! A node has room for `2 * BALANCE + 1` pairs: one spare slot absorbs the
//! insert that triggers a split. In a leaf, `son` is the indexed uid; in an
//! internal node it is the child node's uid.

use bytes::{Buf, BufMut};

/// Half the maximum number of keys in a node.
pub const BALANCE: usize = 32;

const LEAF_OFFSET: usize = 0;
const NKEYS_OFFSET: usize = 1;
const SIBLING_OFFSET: usize = 3;
const HEADER_SIZE: usize = 11;
const PAIR_SIZE: usize = 16;

/// Size of a node item payload.
pub const NODE_SIZE: usize = HEADER_SIZE + PAIR_SIZE * (2 * BALANCE + 1);

/// Where a search continues after one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Next {
    /// Descend into this child.
    Child(u64),
    /// The key lies past this node; continue at its sibling.
    Sibling(u64),
}

/// An owned copy of a node's bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct NodeImage {
    raw: Vec<u8>,
}

impl NodeImage {
    /// Returns an empty leaf with no sibling.
    pub fn new_leaf() -> Self {
        let mut image = Self {
            raw: vec![0u8; NODE_SIZE],
        };
        image.set_leaf(true);
        image
    }

    /// Returns an internal root over two children.
    ///
    /// `left` holds every key up to `key`; `right` holds the rest.
    pub fn new_root(left: u64, right: u64, key: u64) -> Self {
        let mut image = Self {
            raw: vec![0u8; NODE_SIZE],
        };
        image.set_leaf(false);
        image.set_nkeys(2);
        image.set_son(0, left);
        image.set_key(0, key);
        image.set_son(1, right);
        image.set_key(1, u64::MAX);
        image
    }

    /// Wraps bytes read from a node item.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        debug_assert_eq!(bytes.len(), NODE_SIZE);
        Self {
            raw: bytes.to_vec(),
        }
    }

    /// Returns the node bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }

    /// Returns true for a leaf.
    pub fn is_leaf(&self) -> bool {
        self.raw[LEAF_OFFSET] == 1
    }

    fn set_leaf(&mut self, leaf: bool) {
        self.raw[LEAF_OFFSET] = u8::from(leaf);
    }

    /// Returns the number of keys.
    pub fn nkeys(&self) -> usize {
        (&self.raw[NKEYS_OFFSET..SIBLING_OFFSET]).get_u16() as usize
    }

    fn set_nkeys(&mut self, nkeys: usize) {
        #[allow(clippy::cast_possible_truncation)]
        (&mut self.raw[NKEYS_OFFSET..SIBLING_OFFSET]).put_u16(nkeys as u16);
    }

    /// Returns the right sibling, 0 if none.
    pub fn sibling(&self) -> u64 {
        (&self.raw[SIBLING_OFFSET..HEADER_SIZE]).get_u64()
    }

    /// Sets the right sibling.
    pub fn set_sibling(&mut self, sibling: u64) {
        (&mut self.raw[SIBLING_OFFSET..HEADER_SIZE]).put_u64(sibling);
    }

    fn pair_offset(kth: usize) -> usize {
        HEADER_SIZE + kth * PAIR_SIZE
    }

    /// Returns the `kth` son.
    pub fn son(&self, kth: usize) -> u64 {
        let at = Self::pair_offset(kth);
        (&self.raw[at..at + 8]).get_u64()
    }

    fn set_son(&mut self, kth: usize, son: u64) {
        let at = Self::pair_offset(kth);
        (&mut self.raw[at..at + 8]).put_u64(son);
    }

    /// Returns the `kth` key.
    pub fn key(&self, kth: usize) -> u64 {
        let at = Self::pair_offset(kth) + 8;
        (&self.raw[at..at + 8]).get_u64()
    }

    fn set_key(&mut self, kth: usize, key: u64) {
        let at = Self::pair_offset(kth) + 8;
        (&mut self.raw[at..at + 8]).put_u64(key);
    }

    /// Moves pairs `kth..` one slot right.
    fn shift_from(&mut self, kth: usize) {
        let start = Self::pair_offset(kth);
        let end = Self::pair_offset(self.nkeys());
        self.raw.copy_within(start..end, start + PAIR_SIZE);
    }

    /// Picks the child to descend into for `key`: the first child whose
    /// key is ≥ `key`, or the sibling if there is none.
    pub fn search_next(&self, key: u64) -> Next {
        (0..self.nkeys())
            .find(|&i| key <= self.key(i))
            .map_or(Next::Sibling(self.sibling()), |i| Next::Child(self.son(i)))
    }

    /// Collects the sons of every key in `[lo, hi]`.
    ///
    /// Returns the sibling to continue at if the range may extend past
    /// this node, 0 otherwise.
    pub fn search_range(&self, lo: u64, hi: u64, out: &mut Vec<u64>) -> u64 {
        let nkeys = self.nkeys();
        let mut kth = (0..nkeys).find(|&i| self.key(i) >= lo).unwrap_or(nkeys);
        while kth < nkeys && self.key(kth) <= hi {
            out.push(self.son(kth));
            kth += 1;
        }
        if kth == nkeys {
            self.sibling()
        } else {
            0
        }
    }

    /// Inserts `(son, key)` in key order.
    ///
    /// Returns false when the key belongs past this node and a sibling
    /// exists; the caller then retries at the sibling.
    ///
    /// In an internal node the new son is the right half of a split
    /// child. The split child keeps its slot with `key` as its new upper
    /// bound, and the new son takes over the old bound.
    pub fn insert(&mut self, son: u64, key: u64) -> bool {
        let nkeys = self.nkeys();
        let kth = (0..nkeys).find(|&i| self.key(i) >= key).unwrap_or(nkeys);
        if kth == nkeys && self.sibling() != 0 {
            return false;
        }

        if self.is_leaf() {
            self.shift_from(kth);
            self.set_key(kth, key);
            self.set_son(kth, son);
        } else {
            let bound = self.key(kth);
            self.set_key(kth, key);
            self.shift_from(kth + 1);
            self.set_key(kth + 1, bound);
            self.set_son(kth + 1, son);
        }
        self.set_nkeys(nkeys + 1);
        true
    }

    /// Returns true once the node has reached `2 * BALANCE` keys.
    pub fn needs_split(&self) -> bool {
        self.nkeys() == 2 * BALANCE
    }

    /// Moves the upper `BALANCE` pairs into a new node.
    ///
    /// The new node inherits this node's sibling; the caller points this
    /// node's sibling at the new node once it has a uid. Returns the new
    /// node and its first key.
    pub fn split(&mut self) -> (NodeImage, u64) {
        let mut right = Self {
            raw: vec![0u8; NODE_SIZE],
        };
        right.set_leaf(self.is_leaf());
        right.set_nkeys(BALANCE);
        right.set_sibling(self.sibling());

        let from = Self::pair_offset(BALANCE);
        let to = Self::pair_offset(2 * BALANCE);
        right.raw[HEADER_SIZE..HEADER_SIZE + (to - from)].copy_from_slice(&self.raw[from..to]);

        self.set_nkeys(BALANCE);
        let key = right.key(0);
        (right, key)
    }
}

impl std::fmt::Debug for NodeImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let pairs: Vec<(u64, u64)> = (0..self.nkeys()).map(|i| (self.son(i), self.key(i))).collect();
        f.debug_struct("NodeImage")
            .field("leaf", &self.is_leaf())
            .field("sibling", &self.sibling())
            .field("pairs", &pairs)
            .finish()
    }
}
