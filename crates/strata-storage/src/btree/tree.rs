//! The tree.

use std::sync::Arc;

use bytes::Buf;
use parking_lot::Mutex;
use tracing::debug;

use strata_common::types::{Uid, Xid};

use super::node::{Next, NodeImage};
use crate::error::{StorageError, StorageResult};
use crate::item::DataItem;
use crate::manager::DataManager;

/// A split that must be recorded in the parent.
#[derive(Debug, Clone, Copy)]
struct Split {
    /// The new right node.
    son: u64,
    /// Its first key.
    key: u64,
}

enum NodeInsert {
    /// The key belongs to the node's sibling.
    Sibling(u64),
    /// Inserted; the node may have split.
    Done(Option<Split>),
}

/// A B+-tree over `u64` keys.
pub struct BPlusTree {
    dm: Arc<DataManager>,
    boot_uid: Uid,
    /// Holds the root uid. Referenced for the tree's whole lifetime.
    boot: Arc<DataItem>,
    boot_lock: Mutex<()>,
}

impl BPlusTree {
    /// Creates an empty tree and returns the uid of its boot item.
    pub fn create(dm: &DataManager) -> StorageResult<Uid> {
        let root = dm.insert(Xid::SUPER, NodeImage::new_leaf().as_bytes())?;
        let boot_uid = dm.insert(Xid::SUPER, &root.as_u64().to_be_bytes())?;
        debug!(%boot_uid, %root, "created tree");
        Ok(boot_uid)
    }

    /// Attaches to the tree whose boot item is `boot_uid`.
    pub fn load(boot_uid: Uid, dm: Arc<DataManager>) -> StorageResult<Self> {
        let boot = dm
            .read(boot_uid)?
            .ok_or(StorageError::ItemNotFound { uid: boot_uid })?;
        Ok(Self {
            dm,
            boot_uid,
            boot,
            boot_lock: Mutex::new(()),
        })
    }

    /// Returns the uid of the boot item.
    pub fn boot_uid(&self) -> Uid {
        self.boot_uid
    }

    /// Returns the current root.
    pub fn root_uid(&self) -> Uid {
        let _guard = self.boot_lock.lock();
        Uid::from_raw(self.boot.read(|data| (&data[..8]).get_u64()))
    }

    fn update_root(&self, left: Uid, right: u64, right_key: u64) -> StorageResult<()> {
        let _guard = self.boot_lock.lock();
        let root = NodeImage::new_root(left.as_u64(), right, right_key);
        let new_root = self.dm.insert(Xid::SUPER, root.as_bytes())?;

        let mut update = self.boot.before();
        update.write_at(0, &new_root.as_u64().to_be_bytes());
        update.after(Xid::SUPER)?;
        debug!(%new_root, "root split");
        Ok(())
    }

    fn read_node(&self, uid: Uid) -> StorageResult<Arc<DataItem>> {
        self.dm.read(uid)?.ok_or(StorageError::ItemNotFound { uid })
    }

    /// Returns a consistent copy of the node at `uid`.
    fn snapshot(&self, uid: Uid) -> StorageResult<NodeImage> {
        let item = self.read_node(uid)?;
        let image = item.read(NodeImage::from_bytes);
        self.dm.release(&item)?;
        Ok(image)
    }

    /// Finds the child of internal node `uid` that covers `key`, moving
    /// right along siblings if the key has moved out of this node.
    fn search_next(&self, mut uid: Uid, key: u64) -> StorageResult<Uid> {
        loop {
            let node = self.snapshot(uid)?;
            match node.search_next(key) {
                Next::Child(son) => return Ok(Uid::from_raw(son)),
                Next::Sibling(0) => {
                    return Err(StorageError::corrupt_item(uid, "key past the right edge"))
                }
                Next::Sibling(sibling) => uid = Uid::from_raw(sibling),
            }
        }
    }

    fn search_leaf(&self, mut uid: Uid, key: u64) -> StorageResult<Uid> {
        loop {
            if self.snapshot(uid)?.is_leaf() {
                return Ok(uid);
            }
            uid = self.search_next(uid, key)?;
        }
    }

    /// Returns every uid indexed under `key`.
    pub fn search(&self, key: u64) -> StorageResult<Vec<Uid>> {
        self.search_range(key, key)
    }

    /// Returns every uid with a key in `[lo, hi]`, in key order.
    pub fn search_range(&self, lo: u64, hi: u64) -> StorageResult<Vec<Uid>> {
        let mut leaf = self.search_leaf(self.root_uid(), lo)?;
        let mut sons = Vec::new();
        loop {
            let sibling = self.snapshot(leaf)?.search_range(lo, hi, &mut sons);
            if sibling == 0 {
                break;
            }
            leaf = Uid::from_raw(sibling);
        }
        Ok(sons.into_iter().map(Uid::from_raw).collect())
    }

    /// Indexes `uid` under `key`.
    pub fn insert(&self, key: u64, uid: Uid) -> StorageResult<()> {
        let root = self.root_uid();
        if let Some(split) = self.insert_at(root, uid.as_u64(), key)? {
            self.update_root(root, split.son, split.key)?;
        }
        Ok(())
    }

    fn insert_at(&self, uid: Uid, son: u64, key: u64) -> StorageResult<Option<Split>> {
        if self.snapshot(uid)?.is_leaf() {
            return self.insert_and_split(uid, son, key);
        }
        let next = self.search_next(uid, key)?;
        match self.insert_at(next, son, key)? {
            Some(split) => self.insert_and_split(uid, split.son, split.key),
            None => Ok(None),
        }
    }

    fn insert_and_split(&self, mut uid: Uid, son: u64, key: u64) -> StorageResult<Option<Split>> {
        loop {
            let item = self.read_node(uid)?;
            let result = self.insert_into_node(&item, son, key);
            self.dm.release(&item)?;
            match result? {
                NodeInsert::Sibling(sibling) => uid = Uid::from_raw(sibling),
                NodeInsert::Done(split) => return Ok(split),
            }
        }
    }

    fn insert_into_node(&self, item: &DataItem, son: u64, key: u64) -> StorageResult<NodeInsert> {
        let mut update = item.before();
        let mut node = NodeImage::from_bytes(update.old_data());
        if !node.insert(son, key) {
            update.un_before();
            return Ok(NodeInsert::Sibling(node.sibling()));
        }

        let split = if node.needs_split() {
            let (right, right_key) = node.split();
            let right_uid = self.dm.insert(Xid::SUPER, right.as_bytes())?;
            node.set_sibling(right_uid.as_u64());
            Some(Split {
                son: right_uid.as_u64(),
                key: right_key,
            })
        } else {
            None
        };

        update.write_at(0, node.as_bytes());
        update.after(Xid::SUPER)?;
        Ok(NodeInsert::Done(split))
    }

    /// Returns the number of levels from the root to the leaves.
    pub fn depth(&self) -> StorageResult<usize> {
        let mut uid = self.root_uid();
        let mut depth = 1;
        loop {
            let node = self.snapshot(uid)?;
            if node.is_leaf() {
                return Ok(depth);
            }
            uid = Uid::from_raw(node.son(0));
            depth += 1;
        }
    }

    /// Releases the boot item.
    pub fn close(&self) -> StorageResult<()> {
        self.dm.release(&self.boot)
    }
}

impl std::fmt::Debug for BPlusTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BPlusTree")
            .field("boot_uid", &self.boot_uid)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::btree::BALANCE;
    use crate::buffer::PageCacheConfig;
    use crate::manager::DataManagerConfig;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::SeedableRng;
    use strata_common::types::PageNo;
    use strata_wal::{SyncPolicy, WalConfig};

    fn setup() -> (tempfile::TempDir, Arc<DataManager>) {
        let dir = tempfile::tempdir().unwrap();
        let config = DataManagerConfig::new()
            .with_cache(PageCacheConfig::new(256))
            .with_wal(WalConfig::new().with_sync_policy(SyncPolicy::Never));
        let dm = DataManager::create(dir.path().join("bt"), config).unwrap();
        (dir, Arc::new(dm))
    }

    fn uid(n: u64) -> Uid {
        Uid::new(PageNo::new(1000), n as u16)
    }

    #[test]
    fn test_empty_tree() {
        let (_dir, dm) = setup();
        let boot = BPlusTree::create(&dm).unwrap();
        let tree = BPlusTree::load(boot, Arc::clone(&dm)).unwrap();
        assert_eq!(tree.depth().unwrap(), 1);
        assert!(tree.search(5).unwrap().is_empty());
        assert!(tree.search_range(0, u64::MAX).unwrap().is_empty());
        tree.close().unwrap();
    }

    #[test]
    fn test_insert_and_search() {
        let (_dir, dm) = setup();
        let tree = BPlusTree::load(BPlusTree::create(&dm).unwrap(), Arc::clone(&dm)).unwrap();
        for k in [10u64, 30, 20] {
            tree.insert(k, uid(k)).unwrap();
        }
        assert_eq!(tree.search(20).unwrap(), vec![uid(20)]);
        assert!(tree.search(25).unwrap().is_empty());
        assert_eq!(tree.search_range(15, 30).unwrap(), vec![uid(20), uid(30)]);
    }

    #[test]
    fn test_leaf_split_grows_root() {
        let (_dir, dm) = setup();
        let tree = BPlusTree::load(BPlusTree::create(&dm).unwrap(), Arc::clone(&dm)).unwrap();
        let root_before = tree.root_uid();

        for k in 0..(2 * BALANCE as u64 - 1) {
            tree.insert(k, uid(k)).unwrap();
        }
        assert_eq!(tree.depth().unwrap(), 1);
        assert_eq!(tree.root_uid(), root_before);

        tree.insert(2 * BALANCE as u64 - 1, uid(2 * BALANCE as u64 - 1)).unwrap();
        tree.insert(2 * BALANCE as u64, uid(2 * BALANCE as u64)).unwrap();
        assert_eq!(tree.depth().unwrap(), 2);
        assert_ne!(tree.root_uid(), root_before);

        let all = tree.search_range(0, u64::MAX).unwrap();
        assert_eq!(all.len(), 2 * BALANCE + 1);
    }

    #[test]
    fn test_random_inserts_come_back_sorted() {
        let (_dir, dm) = setup();
        let tree = BPlusTree::load(BPlusTree::create(&dm).unwrap(), Arc::clone(&dm)).unwrap();

        let mut keys: Vec<u64> = (0..3000).collect();
        keys.shuffle(&mut StdRng::seed_from_u64(7));
        for &k in &keys {
            tree.insert(k, Uid::from_raw(k + 1)).unwrap();
        }

        let all = tree.search_range(0, u64::MAX).unwrap();
        let expected: Vec<Uid> = (0..3000).map(|k| Uid::from_raw(k + 1)).collect();
        assert_eq!(all, expected);
        assert!(tree.depth().unwrap() >= 2);

        for k in [0u64, 1, 63, 64, 1500, 2999] {
            assert_eq!(tree.search(k).unwrap(), vec![Uid::from_raw(k + 1)]);
        }
        assert_eq!(tree.search_range(100, 104).unwrap().len(), 5);
    }

    #[test]
    fn test_duplicate_keys() {
        let (_dir, dm) = setup();
        let tree = BPlusTree::load(BPlusTree::create(&dm).unwrap(), Arc::clone(&dm)).unwrap();
        for n in 0..200u64 {
            tree.insert(n % 3, Uid::from_raw(n + 1)).unwrap();
        }
        assert_eq!(tree.search(1).unwrap().len(), 67);
        assert_eq!(tree.search_range(0, 2).unwrap().len(), 200);
    }

    #[test]
    fn test_concurrent_inserts() {
        const THREADS: u64 = 4;
        const PER_THREAD: u64 = 1500;

        let (_dir, dm) = setup();
        let boot = BPlusTree::create(&dm).unwrap();
        let tree = Arc::new(BPlusTree::load(boot, Arc::clone(&dm)).unwrap());

        let handles: Vec<_> = (0..THREADS)
            .map(|t| {
                let tree = Arc::clone(&tree);
                std::thread::spawn(move || {
                    for i in 0..PER_THREAD {
                        let k = i * THREADS + t;
                        tree.insert(k, Uid::from_raw(k + 1)).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let total = THREADS * PER_THREAD;
        let all = tree.search_range(0, u64::MAX).unwrap();
        let expected: Vec<Uid> = (0..total).map(|k| Uid::from_raw(k + 1)).collect();
        assert_eq!(all, expected);
        for k in [0, 1, THREADS, total / 2, total - 1] {
            assert_eq!(tree.search(k).unwrap(), vec![Uid::from_raw(k + 1)]);
        }
        tree.close().unwrap();
    }

    #[test]
    fn test_tree_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("bt");
        let config = DataManagerConfig::new().with_cache(PageCacheConfig::new(64));
        let tm = strata_txn::TransactionManager::create(&prefix).unwrap();

        let dm = Arc::new(DataManager::create(&prefix, config.clone()).unwrap());
        let boot = BPlusTree::create(&dm).unwrap();
        let tree = BPlusTree::load(boot, Arc::clone(&dm)).unwrap();
        for k in 0..200u64 {
            tree.insert(k, Uid::from_raw(k + 1)).unwrap();
        }
        tree.close().unwrap();
        dm.close().unwrap();
        drop(tree);

        let (dm, _) = DataManager::open(&prefix, config, &tm).unwrap();
        let tree = BPlusTree::load(boot, Arc::new(dm)).unwrap();
        assert_eq!(tree.search_range(0, u64::MAX).unwrap().len(), 200);
        assert_eq!(tree.search(123).unwrap(), vec![Uid::from_raw(124)]);
    }
}
