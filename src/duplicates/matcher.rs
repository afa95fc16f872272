//! The match tree: lazy escalation from size to partial hash to full hash.
//!
//! # How the tree works
//!
//! The tree is ordered by size as files arrive. Files of equal size are
//! possible duplicates and get their partial hashes compared; if those tie
//! and the file is larger than the partial prefix, full hashes decide. A
//! non-zero comparison routes the new file left or right, and an empty slot
//! on that side is where it is attached. An equal comparison stops descent
//! and reports the node's chain head as the match.
//!
//! This finds same-size candidates quickly while reading nothing for files
//! whose size is unique, and only the first prefix for files whose prefix is.
//!
//! Every hash goes through the [`HashCache`] when one is attached: the cache
//! is consulted once per record before the first hash is computed, and every
//! newly computed hash is written back.

use std::cmp::Ordering;
use std::path::PathBuf;

use super::chain::register_pair;
use super::checks::{check_conditions, PreCheck};
use crate::cache::{HashCache, Lookup};
use crate::scanner::path_utils::path_key;
use crate::scanner::{FileHasher, FileRecord, HashError, RecordId};

/// Index of a node in the match tree arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone, Copy)]
struct MatchNode {
    record: RecordId,
    left: Option<NodeId>,
    right: Option<NodeId>,
}

/// Run-mode flags that affect matching.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchOptions {
    /// Treat hard links to the same inode as duplicates
    pub consider_hardlinks: bool,
    /// Never match files on different devices
    pub one_file_system: bool,
    /// Never match files from the same traversal root
    pub isolate: bool,
    /// Never match files whose mode, owner or group differ
    pub permissions: bool,
    /// Trust partial hashes as final
    pub partial_only: bool,
}

/// What the matcher decided for a new record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// The record became a new distinct node.
    Inserted(NodeId),
    /// The record matches the chain head `of`, held by `node`.
    Duplicate {
        /// Head of the matched chain
        of: RecordId,
        /// Node holding the chain
        node: NodeId,
        /// The match is a hard link to the same inode
        hard_link: bool,
    },
    /// The record is a hard link to `of` and hard links are not considered
    /// duplicates; it was not inserted.
    HardLinkRejected {
        /// Record sharing the inode
        of: RecordId,
    },
}

/// Errors that abort a single classification.
#[derive(thiserror::Error, Debug)]
pub enum MatchError {
    /// A required hash could not be computed.
    #[error("Hashing failed for {path}: {source}")]
    Hash {
        /// File whose hash failed
        path: PathBuf,
        /// The underlying hasher error
        #[source]
        source: HashError,
    },
}

impl MatchError {
    /// Returns `true` if the failure was caused by cancellation.
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        matches!(
            self,
            Self::Hash {
                source: HashError::Interrupted(_),
                ..
            }
        )
    }
}

/// Counters collected while matching.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchStats {
    /// Node comparisons performed
    pub comparisons: u64,
    /// Partial hashes computed by reading files
    pub partial_hashes: u64,
    /// Full hashes computed by reading files
    pub full_hashes: u64,
    /// Cache lookups that supplied hashes
    pub cache_hits: u64,
    /// Cache lookups that found an outdated entry
    pub cache_stale: u64,
    /// Same-size pairs told apart by partial hash alone
    pub partial_eliminations: u64,
    /// Partial hashes promoted to full without reading
    pub small_file_promotions: u64,
    /// Hard-link pairs merged without reading
    pub hard_link_merges: u64,
    /// Same-size pairs ruled out by an exclusion
    pub excluded_pairs: u64,
}

enum Step {
    Route(Ordering),
    HardLink,
}

/// Incrementally built match tree with its hasher and optional hash cache.
pub struct Matcher {
    nodes: Vec<MatchNode>,
    root: Option<NodeId>,
    hasher: FileHasher,
    cache: Option<HashCache>,
    options: MatchOptions,
    stats: MatchStats,
}

impl std::fmt::Debug for Matcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Matcher")
            .field("nodes", &self.nodes.len())
            .field("hasher", &self.hasher)
            .field("cache", &self.cache.as_ref().map(HashCache::len))
            .field("options", &self.options)
            .field("stats", &self.stats)
            .finish()
    }
}

impl Matcher {
    /// Create an empty tree.
    #[must_use]
    pub fn new(hasher: FileHasher, options: MatchOptions) -> Self {
        Self {
            nodes: Vec::new(),
            root: None,
            hasher,
            cache: None,
            options,
            stats: MatchStats::default(),
        }
    }

    /// Attach a hash cache.
    #[must_use]
    pub fn with_cache(mut self, cache: HashCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// The attached hash cache, if any.
    #[must_use]
    pub fn cache(&self) -> Option<&HashCache> {
        self.cache.as_ref()
    }

    /// Mutable access to the attached hash cache.
    pub fn cache_mut(&mut self) -> Option<&mut HashCache> {
        self.cache.as_mut()
    }

    /// Counters collected so far.
    #[must_use]
    pub fn stats(&self) -> MatchStats {
        self.stats
    }

    /// Number of distinct nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if nothing has been inserted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Chain head held by `node`.
    #[must_use]
    pub fn head(&self, node: NodeId) -> RecordId {
        self.nodes[node.0].record
    }

    /// Classify `id` against everything seen so far.
    ///
    /// The record must already be in `records` and must not have been
    /// classified before.
    ///
    /// # Errors
    ///
    /// [`MatchError::Hash`] if a hash needed for a decision failed; the
    /// record is not inserted.
    ///
    /// # Panics
    ///
    /// Panics if `id` is out of bounds or already held by a node.
    pub fn classify(
        &mut self,
        records: &mut [FileRecord],
        id: RecordId,
    ) -> Result<Classification, MatchError> {
        let Some(mut cur) = self.root else {
            let node = self.push_node(id);
            self.root = Some(node);
            return Ok(Classification::Inserted(node));
        };

        loop {
            self.stats.comparisons += 1;
            let head = self.nodes[cur.0].record;
            let (node_rec, new_rec) = pair_mut(records, head, id);

            let ordering = match self.compare(node_rec, new_rec)? {
                Step::HardLink if self.options.consider_hardlinks => {
                    log::debug!(
                        "classify: '{}' is a hard link to '{}'",
                        new_rec.path.display(),
                        node_rec.path.display()
                    );
                    return Ok(Classification::Duplicate {
                        of: head,
                        node: cur,
                        hard_link: true,
                    });
                }
                Step::HardLink => {
                    log::debug!(
                        "classify: rejecting hard link '{}' to '{}'",
                        new_rec.path.display(),
                        node_rec.path.display()
                    );
                    return Ok(Classification::HardLinkRejected { of: head });
                }
                Step::Route(ordering) => ordering,
            };

            let next = match ordering {
                Ordering::Equal => {
                    log::debug!(
                        "classify: '{}' matches '{}'",
                        new_rec.path.display(),
                        node_rec.path.display()
                    );
                    return Ok(Classification::Duplicate {
                        of: head,
                        node: cur,
                        hard_link: false,
                    });
                }
                Ordering::Less => self.nodes[cur.0].left,
                Ordering::Greater => self.nodes[cur.0].right,
            };

            match next {
                Some(child) => cur = child,
                None => {
                    let node = self.push_node(id);
                    if ordering == Ordering::Less {
                        self.nodes[cur.0].left = Some(node);
                    } else {
                        self.nodes[cur.0].right = Some(node);
                    }
                    return Ok(Classification::Inserted(node));
                }
            }
        }
    }

    /// Add `id` to the chain held by `node`, keeping the node pointed at the
    /// chain head.
    pub fn register<F>(&mut self, records: &mut [FileRecord], node: NodeId, id: RecordId, order: F)
    where
        F: Fn(&FileRecord, &FileRecord) -> Ordering,
    {
        let head = self.nodes[node.0].record;
        self.nodes[node.0].record = register_pair(records, head, id, order);
    }

    fn push_node(&mut self, record: RecordId) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(MatchNode {
            record,
            left: None,
            right: None,
        });
        id
    }

    /// Compare the new record against a node's record, hashing as needed.
    fn compare(&mut self, node: &mut FileRecord, new: &mut FileRecord) -> Result<Step, MatchError> {
        let excluded = match check_conditions(node, new, &self.options) {
            PreCheck::Route(ordering) => return Ok(Step::Route(ordering)),
            PreCheck::HardLink => {
                if self.options.consider_hardlinks {
                    self.cross_copy_hashes(node, new);
                    self.stats.hard_link_merges += 1;
                }
                return Ok(Step::HardLink);
            }
            PreCheck::Excluded(reason) => {
                log::trace!(
                    "compare: '{}' and '{}' cannot match ({})",
                    new.path.display(),
                    node.path.display(),
                    reason
                );
                self.stats.excluded_pairs += 1;
                true
            }
            PreCheck::Compare => false,
        };

        self.ensure_partial(node)?;
        self.ensure_partial(new)?;
        let mut ordering = new.partial_hash.cmp(&node.partial_hash);

        let small = new.size.is_some_and(|s| s <= self.hasher.partial_size());
        if small || self.options.partial_only {
            log::trace!(
                "compare: {}: treating partial hash as full hash",
                if small { "small file" } else { "partial only mode" }
            );
            self.promote_partial(node);
            self.promote_partial(new);
        } else if ordering == Ordering::Equal {
            log::trace!("compare: partial hashes match, checking full hashes");
            self.ensure_full(node)?;
            self.ensure_full(new)?;
            ordering = new.full_hash.cmp(&node.full_hash);
        } else {
            self.stats.partial_eliminations += 1;
        }

        if excluded && ordering == Ordering::Equal {
            ordering = Ordering::Less;
        }
        Ok(Step::Route(ordering))
    }

    /// Look the record up in the cache once per run.
    fn consult_cache(&mut self, record: &mut FileRecord) {
        if record.cache_checked {
            return;
        }
        record.cache_checked = true;

        let Some(cache) = self.cache.as_mut() else {
            return;
        };
        let (Some(key), Some(meta)) = (path_key(&record.path), record.cache_meta()) else {
            return;
        };

        match cache.lookup_or_invalidate(key, &meta) {
            Lookup::Hit { partial, full } => {
                log::trace!("cache hit for '{}'", key);
                self.stats.cache_hits += 1;
                record.partial_hash.get_or_insert(partial);
                if record.full_hash.is_none() {
                    record.full_hash = full;
                }
            }
            Lookup::Stale => {
                self.stats.cache_stale += 1;
            }
            Lookup::Absent => {}
        }
    }

    fn write_back(&mut self, record: &FileRecord) {
        let Some(cache) = self.cache.as_mut() else {
            return;
        };
        if let (Some(key), Some(meta)) = (path_key(&record.path), record.cache_meta()) {
            cache.upsert(key, meta, record.partial_hash, record.full_hash);
        }
    }

    fn ensure_partial(&mut self, record: &mut FileRecord) -> Result<(), MatchError> {
        self.consult_cache(record);
        if record.partial_hash.is_some() {
            return Ok(());
        }
        let hash = self
            .hasher
            .hash(record, self.hasher.partial_size())
            .map_err(|source| MatchError::Hash {
                path: record.path.clone(),
                source,
            })?;
        record.partial_hash = Some(hash);
        self.stats.partial_hashes += 1;
        self.write_back(record);
        Ok(())
    }

    fn ensure_full(&mut self, record: &mut FileRecord) -> Result<(), MatchError> {
        self.consult_cache(record);
        if record.full_hash.is_some() {
            return Ok(());
        }
        let hash = self
            .hasher
            .hash(record, 0)
            .map_err(|source| MatchError::Hash {
                path: record.path.clone(),
                source,
            })?;
        record.full_hash = Some(hash);
        self.stats.full_hashes += 1;
        self.write_back(record);
        Ok(())
    }

    fn promote_partial(&mut self, record: &mut FileRecord) {
        if record.full_hash.is_none() && record.partial_hash.is_some() {
            record.full_hash = record.partial_hash;
            self.stats.small_file_promotions += 1;
            self.write_back(record);
        }
    }

    /// Hard links share content: copy whichever hash level either side has.
    fn cross_copy_hashes(&mut self, a: &mut FileRecord, b: &mut FileRecord) {
        fn copy_into(from: &FileRecord, to: &mut FileRecord) -> bool {
            if from.full_hash.is_some() {
                if to.full_hash.is_some() {
                    return false;
                }
                to.partial_hash = from.partial_hash;
                to.full_hash = from.full_hash;
                true
            } else if from.partial_hash.is_some() && to.partial_hash.is_none() {
                to.partial_hash = from.partial_hash;
                true
            } else {
                false
            }
        }

        self.consult_cache(a);
        self.consult_cache(b);
        if copy_into(a, b) {
            self.write_back(b);
        } else if copy_into(b, a) {
            self.write_back(a);
        }
    }
}

/// Borrow two distinct records mutably.
fn pair_mut(records: &mut [FileRecord], a: RecordId, b: RecordId) -> (&mut FileRecord, &mut FileRecord) {
    assert_ne!(a, b, "a record cannot be compared with itself");
    if a.0 < b.0 {
        let (lo, hi) = records.split_at_mut(b.0);
        (&mut lo[a.0], &mut hi[0])
    } else {
        let (lo, hi) = records.split_at_mut(a.0);
        (&mut hi[0], &mut lo[b.0])
    }
}
