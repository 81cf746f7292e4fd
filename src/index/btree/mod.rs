//! Order-16 B+-tree, persisted through the buffer pool.
//!
//! Keys compare byte-lexicographically (`Vec<u8>` / `Ord`). Leaves are
//! linked left-to-right for forward range scans; internal nodes hold
//! separator keys only, never values. Splits are preemptive: a full node
//! is split on the way down before a new key would be inserted into it,
//! so `insert` never has to recurse back up.

mod node;

use std::sync::Arc;

use parking_lot::Mutex;

use crate::buffer::BufferPoolManager;
use crate::common::config::BTREE_SPLIT_AT;
use crate::common::{PageId, Result};
use node::{BTreeNode, InternalNode, LeafNode};

/// Midpoint used to divide an overflowing node's keys between the node
/// kept in place and its newly allocated right sibling.
const SPLIT_MIDPOINT: usize = crate::common::config::BTREE_ORDER / 2;

/// A B+-tree index, backed by pages obtained from a [`BufferPoolManager`].
///
/// `BTree` holds the manager behind an `Arc` rather than a lifetime-bound
/// reference so it can sit inside the transactional engine alongside the
/// manager itself without a self-referential struct.
pub struct BTree {
    bpm: Arc<BufferPoolManager>,
    root: Mutex<PageId>,
}

impl BTree {
    /// Create a brand new, empty tree (a single empty leaf as root).
    pub fn create(bpm: Arc<BufferPoolManager>) -> Result<Self> {
        let mut guard = bpm.new_page()?;
        let root_id = guard.page_id();
        let leaf = LeafNode::new(root_id);
        leaf.write_to_page(&mut guard);
        drop(guard);

        Ok(Self {
            bpm,
            root: Mutex::new(root_id),
        })
    }

    /// Open a tree whose root is already on disk at `root_id`.
    pub fn open(bpm: Arc<BufferPoolManager>, root_id: PageId) -> Self {
        Self {
            bpm,
            root: Mutex::new(root_id),
        }
    }

    pub fn root_id(&self) -> PageId {
        *self.root.lock()
    }

    fn load_node(&self, page_id: PageId) -> Result<BTreeNode> {
        let guard = self.bpm.fetch_page_read(page_id)?;
        BTreeNode::read_from(&guard)
    }

    fn store_node(&self, node: &BTreeNode) -> Result<()> {
        let mut guard = self.bpm.fetch_page_write(node.page_id())?;
        node.write_to(&mut guard);
        Ok(())
    }

    fn node_key_count(&self, page_id: PageId) -> Result<usize> {
        Ok(self.load_node(page_id)?.key_count())
    }

    /// Search for `key`, returning its value if present.
    pub fn search(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let mut current = self.root_id();
        loop {
            match self.load_node(current)? {
                BTreeNode::Leaf(leaf) => {
                    return Ok(leaf
                        .keys
                        .binary_search_by(|k| k.as_slice().cmp(key))
                        .ok()
                        .map(|i| leaf.values[i].clone()));
                }
                BTreeNode::Internal(internal) => {
                    current = internal.children[find_child_index(&internal.keys, key)];
                }
            }
        }
    }

    fn find_leaf(&self, key: &[u8]) -> Result<LeafNode> {
        let mut current = self.root_id();
        loop {
            match self.load_node(current)? {
                BTreeNode::Leaf(leaf) => return Ok(leaf),
                BTreeNode::Internal(internal) => {
                    current = internal.children[find_child_index(&internal.keys, key)];
                }
            }
        }
    }

    /// Scan all (key, value) pairs with `start <= key <= end`, in key order.
    /// Stops descending leaves as soon as keys run past `end`.
    pub fn range_scan(&self, start: &[u8], end: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut results = Vec::new();
        let mut leaf = self.find_leaf(start)?;

        loop {
            for (key, value) in leaf.keys.iter().zip(leaf.values.iter()) {
                if key.as_slice() > end {
                    return Ok(results);
                }
                if key.as_slice() >= start {
                    results.push((key.clone(), value.clone()));
                }
            }

            if !leaf.next_leaf.is_valid() {
                return Ok(results);
            }
            leaf = match self.load_node(leaf.next_leaf)? {
                BTreeNode::Leaf(l) => l,
                BTreeNode::Internal(_) => return Ok(results),
            };
        }
    }

    /// Insert `key` with `value`, overwriting any existing value for `key`.
    pub fn insert(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.maybe_split_root()?;

        let mut current = self.root_id();
        loop {
            match self.load_node(current)? {
                BTreeNode::Leaf(mut leaf) => {
                    match leaf.keys.binary_search_by(|k| k.as_slice().cmp(key)) {
                        Ok(i) => leaf.values[i] = value.to_vec(),
                        Err(i) => {
                            leaf.keys.insert(i, key.to_vec());
                            leaf.values.insert(i, value.to_vec());
                        }
                    }
                    return self.store_node(&BTreeNode::Leaf(leaf));
                }
                BTreeNode::Internal(mut internal) => {
                    let mut idx = find_child_index(&internal.keys, key);
                    if self.node_key_count(internal.children[idx])? >= BTREE_SPLIT_AT {
                        self.split_child(&mut internal, idx)?;
                        self.store_node(&BTreeNode::Internal(internal.clone()))?;
                        idx = find_child_index(&internal.keys, key);
                    }
                    current = internal.children[idx];
                }
            }
        }
    }

    /// Delete `key` if present. Best-effort: removes the key from its leaf
    /// but never merges or rebalances underflowed nodes.
    pub fn delete(&self, key: &[u8]) -> Result<bool> {
        let mut current = self.root_id();
        loop {
            match self.load_node(current)? {
                BTreeNode::Leaf(mut leaf) => {
                    return match leaf.keys.binary_search_by(|k| k.as_slice().cmp(key)) {
                        Ok(i) => {
                            leaf.keys.remove(i);
                            leaf.values.remove(i);
                            self.store_node(&BTreeNode::Leaf(leaf))?;
                            Ok(true)
                        }
                        Err(_) => Ok(false),
                    };
                }
                BTreeNode::Internal(internal) => {
                    current = internal.children[find_child_index(&internal.keys, key)];
                }
            }
        }
    }

    /// If the root is full, wrap it in a fresh internal root and split it,
    /// so the main descent loop never has to deal with a full root.
    fn maybe_split_root(&self) -> Result<()> {
        let root_id = self.root_id();
        if self.node_key_count(root_id)? < BTREE_SPLIT_AT {
            return Ok(());
        }

        let mut new_root_guard = self.bpm.new_page()?;
        let new_root_id = new_root_guard.page_id();
        let mut new_root = InternalNode {
            page_id: new_root_id,
            keys: Vec::new(),
            children: vec![root_id],
        };
        new_root.write_to_page(&mut new_root_guard);
        drop(new_root_guard);

        self.split_child(&mut new_root, 0)?;
        self.store_node(&BTreeNode::Internal(new_root))?;
        *self.root.lock() = new_root_id;
        Ok(())
    }

    /// Split `parent.children[child_index]` (already known to be full) into
    /// two siblings and insert the promoted key and new child pointer into
    /// `parent`. `parent` is mutated in place; the caller stores it.
    fn split_child(&self, parent: &mut InternalNode, child_index: usize) -> Result<()> {
        let child_id = parent.children[child_index];
        let (left, right, promoted) = match self.load_node(child_id)? {
            BTreeNode::Leaf(leaf) => {
                let (left, right, promoted) = split_leaf(leaf, &self.bpm)?;
                (BTreeNode::Leaf(left), BTreeNode::Leaf(right), promoted)
            }
            BTreeNode::Internal(internal) => {
                let (left, right, promoted) = split_internal(internal, &self.bpm)?;
                (
                    BTreeNode::Internal(left),
                    BTreeNode::Internal(right),
                    promoted,
                )
            }
        };

        let right_id = right.page_id();
        self.store_node(&left)?;
        self.store_node(&right)?;

        parent.keys.insert(child_index, promoted);
        parent.children.insert(child_index + 1, right_id);
        Ok(())
    }
}

/// First child index whose subtree may contain `key`: the count of
/// separator keys that are `<= key`. Equal keys route right, matching the
/// convention that a promoted separator equals the smallest key in the
/// right sibling it was split off from.
fn find_child_index(keys: &[Vec<u8>], key: &[u8]) -> usize {
    keys.partition_point(|k| k.as_slice() <= key)
}

fn split_leaf(mut left: LeafNode, bpm: &BufferPoolManager) -> Result<(LeafNode, LeafNode, Vec<u8>)> {
    let mut right_guard = bpm.new_page()?;
    let right_id = right_guard.page_id();

    let right_keys = left.keys.split_off(SPLIT_MIDPOINT);
    let right_values = left.values.split_off(SPLIT_MIDPOINT);
    let promoted = right_keys[0].clone();

    let right = LeafNode {
        page_id: right_id,
        keys: right_keys,
        values: right_values,
        next_leaf: left.next_leaf,
    };
    left.next_leaf = right_id;

    right.write_to_page(&mut right_guard);
    drop(right_guard);

    Ok((left, right, promoted))
}

fn split_internal(
    mut left: InternalNode,
    bpm: &BufferPoolManager,
) -> Result<(InternalNode, InternalNode, Vec<u8>)> {
    let mut right_guard = bpm.new_page()?;
    let right_id = right_guard.page_id();

    let promoted = left.keys[SPLIT_MIDPOINT].clone();
    let right_keys = left.keys.split_off(SPLIT_MIDPOINT + 1);
    left.keys.pop(); // drop the promoted key from the left side
    let right_children = left.children.split_off(SPLIT_MIDPOINT + 1);

    let right = InternalNode {
        page_id: right_id,
        keys: right_keys,
        children: right_children,
    };

    right.write_to_page(&mut right_guard);
    drop(right_guard);

    Ok((left, right, promoted))
}

// `node::{Leaf,Internal}Node::write_to` is private to `node`; these thin
// wrappers let this module write directly into a freshly-allocated guard
// without exposing the on-disk layout outside `node.rs`.
impl LeafNode {
    fn write_to_page(&self, page: &mut crate::storage::page::Page) {
        BTreeNode::Leaf(self.clone()).write_to(page);
    }
}

impl InternalNode {
    fn write_to_page(&self, page: &mut crate::storage::page::Page) {
        BTreeNode::Internal(self.clone()).write_to(page);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::DiskManager;
    use tempfile::tempdir;

    fn create_test_tree(pool_size: usize) -> (BTree, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        let dm = DiskManager::create(&path).unwrap();
        let bpm = Arc::new(BufferPoolManager::new(pool_size, dm));
        let tree = BTree::create(bpm).unwrap();
        (tree, dir)
    }

    #[test]
    fn test_insert_and_search() {
        let (tree, _dir) = create_test_tree(32);
        tree.insert(b"hello", b"world").unwrap();
        tree.insert(b"foo", b"bar").unwrap();

        assert_eq!(tree.search(b"hello").unwrap(), Some(b"world".to_vec()));
        assert_eq!(tree.search(b"foo").unwrap(), Some(b"bar".to_vec()));
        assert_eq!(tree.search(b"missing").unwrap(), None);
    }

    #[test]
    fn test_overwrite_existing_key() {
        let (tree, _dir) = create_test_tree(32);
        tree.insert(b"k", b"v1").unwrap();
        tree.insert(b"k", b"v2").unwrap();
        assert_eq!(tree.search(b"k").unwrap(), Some(b"v2".to_vec()));
    }

    #[test]
    fn test_delete() {
        let (tree, _dir) = create_test_tree(32);
        tree.insert(b"k", b"v").unwrap();
        assert!(tree.delete(b"k").unwrap());
        assert_eq!(tree.search(b"k").unwrap(), None);
        assert!(!tree.delete(b"k").unwrap());
    }

    #[test]
    fn test_range_scan_ordered() {
        let (tree, _dir) = create_test_tree(64);
        for i in 0..20u32 {
            let key = format!("key{:03}", i);
            tree.insert(key.as_bytes(), format!("val{i}").as_bytes())
                .unwrap();
        }

        let results = tree.range_scan(b"key005", b"key010").unwrap();
        let keys: Vec<String> = results
            .iter()
            .map(|(k, _)| String::from_utf8(k.clone()).unwrap())
            .collect();
        assert_eq!(
            keys,
            vec!["key005", "key006", "key007", "key008", "key009", "key010"]
        );
    }

    #[test]
    fn test_insert_forces_splits_and_stays_searchable() {
        // Order 16 splits at 15 keys; insert enough to force several
        // leaf splits and at least one root split.
        let (tree, _dir) = create_test_tree(256);
        let mut expected = Vec::new();
        for i in 0..500u32 {
            let key = format!("k{:05}", i);
            let value = format!("v{i}");
            tree.insert(key.as_bytes(), value.as_bytes()).unwrap();
            expected.push((key, value));
        }

        for (k, v) in &expected {
            assert_eq!(
                tree.search(k.as_bytes()).unwrap(),
                Some(v.as_bytes().to_vec()),
                "missing key {k}"
            );
        }

        let all = tree.range_scan(b"k00000", b"k99999").unwrap();
        assert_eq!(all.len(), 500);
        for (i, (k, v)) in all.iter().enumerate() {
            assert_eq!(k.as_slice(), expected[i].0.as_bytes());
            assert_eq!(v.as_slice(), expected[i].1.as_bytes());
        }
    }

    #[test]
    fn test_reopen_existing_root() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        let root_id;
        {
            let dm = DiskManager::create(&path).unwrap();
            let bpm = Arc::new(BufferPoolManager::new(16, dm));
            let tree = BTree::create(bpm.clone()).unwrap();
            tree.insert(b"persisted", b"value").unwrap();
            root_id = tree.root_id();
            bpm.flush_all_pages().unwrap();
        }
        {
            let dm = DiskManager::open(&path).unwrap();
            let bpm = Arc::new(BufferPoolManager::new(16, dm));
            let tree = BTree::open(bpm, root_id);
            assert_eq!(tree.search(b"persisted").unwrap(), Some(b"value".to_vec()));
        }
    }
}
