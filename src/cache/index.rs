//! Bucketed binary search trees keyed by path hash.
//!
//! The table has a fixed number of buckets (a power of two); the bucket is the
//! low bits of the path hash. Each bucket is an unbalanced BST stored in a
//! shared node arena. Insertion goes left when the node key is `>=` the new
//! key and right otherwise, so equal keys start out on the left.
//!
//! # Rebalancing
//!
//! Inserts count left and right descents per bucket. When the difference
//! exceeds the rebalance threshold, the bucket gets one post-order pass that
//! single-rotates a node toward the key-space midpoint whenever the node and
//! one of its children both sit on the far side of it. This is an empirical
//! guard against sorted insertion orders, not a balance invariant.
//!
//! Rotations keep the in-order key sequence intact but may move an equal key
//! into a right subtree, so lookups that hit an equal key search both sides.
//!
//! All traversals use explicit stacks.

use super::entry::CacheEntry;

/// Default number of bucket bits (131072 buckets).
pub const DEFAULT_BUCKET_BITS: u32 = 17;

/// Default descent imbalance that triggers a bucket rebalance.
pub const REBALANCE_THRESHOLD: u64 = 100_000;

const KEY_MIDPOINT: u64 = 0x8000_0000_0000_0000;

#[derive(Debug, Clone)]
struct Node {
    entry: CacheEntry,
    left: Option<usize>,
    right: Option<usize>,
}

#[derive(Debug, Clone, Copy, Default)]
struct Descents {
    left: u64,
    right: u64,
}

impl Descents {
    fn imbalance(self) -> u64 {
        self.left.abs_diff(self.right)
    }
}

/// A place that holds a child link: a bucket root or one side of a node.
#[derive(Debug, Clone, Copy)]
enum Slot {
    Root(usize),
    Left(usize),
    Right(usize),
}

/// Hash table of per-bucket BSTs over a single node arena.
#[derive(Debug, Clone)]
pub struct BucketIndex {
    nodes: Vec<Node>,
    roots: Vec<Option<usize>>,
    descents: Vec<Descents>,
    mask: u64,
    rebalance_threshold: u64,
    rebalances: u64,
}

impl Default for BucketIndex {
    fn default() -> Self {
        Self::new(DEFAULT_BUCKET_BITS)
    }
}

impl BucketIndex {
    /// Create an empty index with `2^bucket_bits` buckets.
    ///
    /// # Panics
    ///
    /// Panics if `bucket_bits` is 32 or more.
    #[must_use]
    pub fn new(bucket_bits: u32) -> Self {
        assert!(bucket_bits < 32, "bucket_bits must be below 32");
        let buckets = 1usize << bucket_bits;
        Self {
            nodes: Vec::new(),
            roots: vec![None; buckets],
            descents: vec![Descents::default(); buckets],
            mask: (buckets as u64) - 1,
            rebalance_threshold: REBALANCE_THRESHOLD,
            rebalances: 0,
        }
    }

    /// Override the rebalance trigger.
    pub fn set_rebalance_threshold(&mut self, threshold: u64) {
        self.rebalance_threshold = threshold;
    }

    /// Number of buckets.
    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.roots.len()
    }

    /// Number of nodes, tombstones included.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of rebalance passes run so far.
    #[must_use]
    pub fn rebalances(&self) -> u64 {
        self.rebalances
    }

    /// Bucket index for a path hash.
    #[must_use]
    pub fn bucket_of(&self, path_hash: u64) -> usize {
        (path_hash & self.mask) as usize
    }

    /// Drop every node.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.roots.iter_mut().for_each(|r| *r = None);
        self.descents
            .iter_mut()
            .for_each(|d| *d = Descents::default());
    }

    /// Find the node holding `path` under `path_hash`.
    #[must_use]
    pub fn find(&self, path_hash: u64, path: &str) -> Option<usize> {
        let mut stack: Vec<usize> = self.roots[self.bucket_of(path_hash)].into_iter().collect();
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id];
            let key = node.entry.path_hash;
            if key == path_hash {
                if node.entry.path == path {
                    return Some(id);
                }
                stack.extend(node.right);
                stack.extend(node.left);
            } else if path_hash < key {
                stack.extend(node.left);
            } else {
                stack.extend(node.right);
            }
        }
        None
    }

    /// Shared access to a node's entry.
    #[must_use]
    pub fn entry(&self, id: usize) -> &CacheEntry {
        &self.nodes[id].entry
    }

    /// Mutable access to a node's entry. The key must not be changed.
    pub fn entry_mut(&mut self, id: usize) -> &mut CacheEntry {
        &mut self.nodes[id].entry
    }

    /// Insert a new leaf. Does not check for an existing entry with the same
    /// path; callers use [`find`](Self::find) first.
    pub fn insert(&mut self, entry: CacheEntry) -> usize {
        let key = entry.path_hash;
        let bucket = self.bucket_of(key);
        let id = self.nodes.len();
        self.nodes.push(Node {
            entry,
            left: None,
            right: None,
        });

        let Some(mut cur) = self.roots[bucket] else {
            self.roots[bucket] = Some(id);
            return id;
        };

        loop {
            if self.nodes[cur].entry.path_hash >= key {
                match self.nodes[cur].left {
                    Some(next) => {
                        cur = next;
                        self.descents[bucket].left += 1;
                    }
                    None => {
                        self.nodes[cur].left = Some(id);
                        break;
                    }
                }
            } else {
                match self.nodes[cur].right {
                    Some(next) => {
                        cur = next;
                        self.descents[bucket].right += 1;
                    }
                    None => {
                        self.nodes[cur].right = Some(id);
                        break;
                    }
                }
            }
        }

        if self.descents[bucket].imbalance() > self.rebalance_threshold {
            log::debug!(
                "Rebalancing hash cache bucket {} (left {}, right {})",
                bucket,
                self.descents[bucket].left,
                self.descents[bucket].right
            );
            self.rebalance(bucket);
            self.descents[bucket] = Descents::default();
            self.rebalances += 1;
        }
        id
    }

    fn get(&self, slot: Slot) -> Option<usize> {
        match slot {
            Slot::Root(bucket) => self.roots[bucket],
            Slot::Left(id) => self.nodes[id].left,
            Slot::Right(id) => self.nodes[id].right,
        }
    }

    fn set(&mut self, slot: Slot, value: Option<usize>) {
        match slot {
            Slot::Root(bucket) => self.roots[bucket] = value,
            Slot::Left(id) => self.nodes[id].left = value,
            Slot::Right(id) => self.nodes[id].right = value,
        }
    }

    /// Promote the left child of the node in `slot`.
    fn rotate_right(&mut self, slot: Slot, cur: usize) {
        let Some(pivot) = self.nodes[cur].left else {
            return;
        };
        self.nodes[cur].left = self.nodes[pivot].right;
        self.nodes[pivot].right = Some(cur);
        self.set(slot, Some(pivot));
    }

    /// Promote the right child of the node in `slot`.
    fn rotate_left(&mut self, slot: Slot, cur: usize) {
        let Some(pivot) = self.nodes[cur].right else {
            return;
        };
        self.nodes[cur].right = self.nodes[pivot].left;
        self.nodes[pivot].left = Some(cur);
        self.set(slot, Some(pivot));
    }

    /// One post-order midpoint-rotation pass over a bucket.
    pub fn rebalance(&mut self, bucket: usize) {
        let mut stack = vec![(Slot::Root(bucket), false)];
        while let Some((slot, children_done)) = stack.pop() {
            let Some(cur) = self.get(slot) else {
                continue;
            };
            let (left, right) = (self.nodes[cur].left, self.nodes[cur].right);
            if left.is_none() && right.is_none() {
                continue;
            }

            if !children_done {
                stack.push((slot, true));
                stack.push((Slot::Right(cur), false));
                stack.push((Slot::Left(cur), false));
                continue;
            }

            let key = self.nodes[cur].entry.path_hash;
            if key > KEY_MIDPOINT {
                if left.is_some_and(|l| self.nodes[l].entry.path_hash > KEY_MIDPOINT) {
                    self.rotate_right(slot, cur);
                }
            } else if key < KEY_MIDPOINT
                && right.is_some_and(|r| self.nodes[r].entry.path_hash < KEY_MIDPOINT)
            {
                self.rotate_left(slot, cur);
            }
        }
    }

    /// Iterate all entries (tombstones included) in bucket order, pre-order
    /// within each bucket.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            index: self,
            bucket: 0,
            stack: Vec::new(),
        }
    }

    /// Keys of one bucket in in-order sequence.
    #[must_use]
    pub fn in_order_keys(&self, bucket: usize) -> Vec<u64> {
        let mut keys = Vec::new();
        let mut stack = Vec::new();
        let mut cur = self.roots[bucket];
        while cur.is_some() || !stack.is_empty() {
            while let Some(id) = cur {
                stack.push(id);
                cur = self.nodes[id].left;
            }
            if let Some(id) = stack.pop() {
                keys.push(self.nodes[id].entry.path_hash);
                cur = self.nodes[id].right;
            }
        }
        keys
    }

    /// Height of one bucket's tree.
    #[must_use]
    pub fn depth(&self, bucket: usize) -> usize {
        let mut max = 0;
        let mut stack: Vec<(usize, usize)> =
            self.roots[bucket].into_iter().map(|id| (id, 1)).collect();
        while let Some((id, d)) = stack.pop() {
            max = max.max(d);
            let node = &self.nodes[id];
            stack.extend(node.left.map(|l| (l, d + 1)));
            stack.extend(node.right.map(|r| (r, d + 1)));
        }
        max
    }
}

/// Iterator over index entries in bucket order.
pub struct Iter<'a> {
    index: &'a BucketIndex,
    bucket: usize,
    stack: Vec<usize>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a CacheEntry;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(id) = self.stack.pop() {
                let node = &self.index.nodes[id];
                self.stack.extend(node.right);
                self.stack.extend(node.left);
                return Some(&node.entry);
            }
            if self.bucket >= self.index.roots.len() {
                return None;
            }
            self.stack.extend(self.index.roots[self.bucket]);
            self.bucket += 1;
        }
    }
}
