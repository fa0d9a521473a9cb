//! Persistent B+-tree index.
//!
//! Maps `u64` keys to item uids. Every node is a data item written under
//! the system transaction, so structural changes are durable and visible
//! at once and never rolled back with a user transaction.
//!
//! ## Architecture
//!
//! ```text
//!   boot item ──► root uid
//!                   │
//!            ┌──────▼──────────────────────┐
//!            │ internal [c0|k0][c1|k1]...  │   child i holds keys ≤ k_i
//!            └──┬──────────────┬───────────┘
//!               ▼              ▼
//!        ┌────────────┐   ┌────────────┐
//!        │ leaf       │──►│ leaf       │──► 0     sibling chain
//!        │ [uid|key]..│   │ [uid|key]..│
//!        └────────────┘   └────────────┘
//! ```
//!
//! The root is reachable only through the boot item, which is updated in
//! place when the root splits. A node that fills up splits into two
//! siblings and hands the right half's first key to its parent. Readers
//! that land on a node whose key range has moved right follow the sibling
//! pointer instead of restarting from the root.

mod node;
mod tree;

pub use node::{Next, NodeImage, BALANCE, NODE_SIZE};
pub use tree::BPlusTree;
