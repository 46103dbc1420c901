//! In-memory B-tree indexes.
//!
//! Nodes own their children, so the tree is strictly tree-shaped and needs
//! no interior mutability. Leaf splits copy the middle key up (it stays in
//! the right leaf), internal splits push it up. Duplicate keys are allowed;
//! each entry pairs a key with one row id.

pub mod manager;

use std::cmp::Ordering;

use chrono::NaiveDate;
use log::debug;

use crate::types::Value;

pub use manager::{IndexDefinition, IndexManager};

/// Default node capacity before a split.
pub const MAX_KEYS: usize = 4;

/// One component of a normalized index key. Text is lowercased at
/// normalization time, so index lookups are case-insensitive.
#[derive(Debug, Clone)]
pub enum KeyPart {
    Bool(bool),
    Int(i64),
    Float(f64),
    Date(NaiveDate),
    Text(String),
}

impl KeyPart {
    fn rank(&self) -> u8 {
        match self {
            KeyPart::Bool(_) => 0,
            KeyPart::Int(_) => 1,
            KeyPart::Float(_) => 1,
            KeyPart::Date(_) => 2,
            KeyPart::Text(_) => 3,
        }
    }
}

impl Ord for KeyPart {
    fn cmp(&self, other: &KeyPart) -> Ordering {
        use KeyPart::*;
        match (self, other) {
            (Bool(a), Bool(b)) => a.cmp(b),
            (Int(a), Int(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            (Int(a), Float(b)) => (*a as f64).total_cmp(b),
            (Float(a), Int(b)) => a.total_cmp(&(*b as f64)),
            (Date(a), Date(b)) => a.cmp(b),
            (Text(a), Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for KeyPart {
    fn partial_cmp(&self, other: &KeyPart) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for KeyPart {
    fn eq(&self, other: &KeyPart) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for KeyPart {}

/// Normalized key: one part per indexed column, in index column order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct IndexKey(pub Vec<KeyPart>);

impl IndexKey {
    /// Normalizes a tuple of values into a key. A NULL component means the
    /// row is not indexed at all, signalled by `None`.
    pub fn from_values<'a>(values: impl IntoIterator<Item = &'a Value>) -> Option<IndexKey> {
        let mut parts = Vec::new();
        for value in values {
            parts.push(match value {
                Value::Null => return None,
                Value::Bool(b) => KeyPart::Bool(*b),
                Value::Int(i) => KeyPart::Int(*i),
                Value::Float(f) => KeyPart::Float(*f),
                Value::Date(d) => KeyPart::Date(*d),
                Value::Text(s) => KeyPart::Text(s.to_lowercase()),
            });
        }
        Some(IndexKey(parts))
    }
}

#[derive(Debug)]
struct BTreeNode {
    leaf: bool,
    keys: Vec<IndexKey>,
    /// Row ids, leaf nodes only. Parallel to `keys`.
    row_ids: Vec<u64>,
    children: Vec<BTreeNode>,
}

impl BTreeNode {
    fn new_leaf() -> BTreeNode {
        BTreeNode {
            leaf: true,
            keys: Vec::new(),
            row_ids: Vec::new(),
            children: Vec::new(),
        }
    }
}

#[derive(Debug)]
pub struct BTreeIndex {
    root: BTreeNode,
    max_keys: usize,
    len: usize,
}

impl Default for BTreeIndex {
    fn default() -> BTreeIndex {
        BTreeIndex::new()
    }
}

impl BTreeIndex {
    pub fn new() -> BTreeIndex {
        BTreeIndex {
            root: BTreeNode::new_leaf(),
            max_keys: MAX_KEYS,
            len: 0,
        }
    }

    /// Number of entries currently stored.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn insert(&mut self, key: IndexKey, row_id: u64) {
        if self.root.keys.len() >= self.max_keys {
            debug!("btree: splitting root ({} keys)", self.root.keys.len());
            let old_root = std::mem::replace(&mut self.root, BTreeNode::new_leaf());
            self.root.leaf = false;
            self.root.children.push(old_root);
            Self::split_child_of(&mut self.root, 0);
        }
        let max = self.max_keys;
        Self::insert_non_full(&mut self.root, key, row_id, max);
        self.len += 1;
    }

    fn insert_non_full(node: &mut BTreeNode, key: IndexKey, row_id: u64, max_keys: usize) {
        if node.leaf {
            let pos = node.keys.partition_point(|k| k <= &key);
            node.keys.insert(pos, key);
            node.row_ids.insert(pos, row_id);
            return;
        }
        let mut child = node.keys.partition_point(|k| k <= &key);
        if node.children[child].keys.len() >= max_keys {
            debug!("btree: splitting child {} while descending", child);
            Self::split_child_of(node, child);
            if key > node.keys[child] {
                child += 1;
            }
        }
        Self::insert_non_full(&mut node.children[child], key, row_id, max_keys);
    }

    /// Splits the full child at `idx`. Leaf splits keep the middle key in
    /// the right sibling (copy-up), internal splits move it into the parent
    /// (push-up).
    fn split_child_of(parent: &mut BTreeNode, idx: usize) {
        let child = &mut parent.children[idx];
        let mid = child.keys.len() / 2;
        let mid_key = child.keys[mid].clone();
        let right = if child.leaf {
            let keys = child.keys.split_off(mid);
            let row_ids = child.row_ids.split_off(mid);
            BTreeNode {
                leaf: true,
                keys,
                row_ids,
                children: Vec::new(),
            }
        } else {
            let keys = child.keys.split_off(mid + 1);
            let children = child.children.split_off(mid + 1);
            child.keys.truncate(mid);
            BTreeNode {
                leaf: false,
                keys,
                row_ids: Vec::new(),
                children,
            }
        };
        parent.keys.insert(idx, mid_key);
        parent.children.insert(idx + 1, right);
    }

    /// Every row id stored under `key`, duplicates included.
    pub fn search(&self, key: &IndexKey) -> Vec<u64> {
        let mut out = Vec::new();
        Self::walk_range(&self.root, Some(key), Some(key), &mut out);
        out
    }

    /// In-order walk collecting leaf entries within `[min, max]` inclusive;
    /// an unbounded side is `None`.
    pub fn search_range(&self, min: Option<&IndexKey>, max: Option<&IndexKey>) -> Vec<u64> {
        let mut out = Vec::new();
        Self::walk_range(&self.root, min, max, &mut out);
        out
    }

    fn walk_range(
        node: &BTreeNode,
        min: Option<&IndexKey>,
        max: Option<&IndexKey>,
        out: &mut Vec<u64>,
    ) {
        if node.leaf {
            for (key, row_id) in node.keys.iter().zip(&node.row_ids) {
                let above = min.map_or(true, |m| key >= m);
                let below = max.map_or(true, |m| key <= m);
                if above && below {
                    out.push(*row_id);
                }
            }
            return;
        }
        for (i, sep) in node.keys.iter().enumerate() {
            // child i holds keys <= sep; skip it when the whole subtree is
            // below the lower bound
            if min.map_or(true, |m| sep >= m) {
                Self::walk_range(&node.children[i], min, max, out);
            }
            if let Some(m) = max {
                if sep > m {
                    return;
                }
            }
        }
        if let Some(last) = node.children.last() {
            Self::walk_range(last, min, max, out);
        }
    }

    /// Removes the leaf entry matching both key and row id exactly. Internal
    /// separator keys are left alone and nodes are never merged; indexes are
    /// rebuilt from durable rows on reload, so under-full nodes cannot
    /// outlive the process.
    pub fn delete(&mut self, key: &IndexKey, row_id: u64) -> bool {
        let removed = Self::delete_rec(&mut self.root, key, row_id);
        if removed {
            self.len -= 1;
        }
        removed
    }

    fn delete_rec(node: &mut BTreeNode, key: &IndexKey, row_id: u64) -> bool {
        if node.leaf {
            if let Some(pos) = node
                .keys
                .iter()
                .zip(&node.row_ids)
                .position(|(k, id)| k == key && *id == row_id)
            {
                node.keys.remove(pos);
                node.row_ids.remove(pos);
                return true;
            }
            return false;
        }
        // duplicates of a separator key may live in either adjacent child
        let keys = node.keys.clone();
        for (i, child) in node.children.iter_mut().enumerate() {
            let lower_ok = i == 0 || keys[i - 1] <= *key;
            let upper_ok = i == keys.len() || *key <= keys[i];
            if lower_ok && upper_ok && Self::delete_rec(child, key, row_id) {
                return true;
            }
        }
        false
    }
}
