//! Duplicate chains and the groups built from them.
//!
//! # Overview
//!
//! Every match-tree node points at one record, the head of its duplicate
//! chain. Further duplicates are linked through
//! [`FileRecord::next_duplicate`]. Only the head carries `has_duplicates`.
//!
//! # Ordering caveat
//!
//! A new duplicate is placed by walking the chain and comparing it pairwise
//! against each member: it goes in front of the first member it does not sort
//! after, or at the end. The chain is never re-sorted, so with a comparator
//! that is not consistent with arrival order the final chain can differ from
//! a global sort. Callers that need a global order use
//! [`DuplicateGroup::sorted_by`] on the finished group.
//!
//! # Example
//!
//! ```
//! use rdupes::duplicates::{register_pair, collect_groups, ChainOrder};
//! use rdupes::scanner::{FileRecord, RecordId};
//! use std::path::PathBuf;
//!
//! let mut records = vec![
//!     FileRecord::new("/b", 10, 0),
//!     FileRecord::new("/a", 10, 0),
//! ];
//! let head = register_pair(&mut records, RecordId(0), RecordId(1), |a, b| {
//!     ChainOrder::Name.compare(a, b)
//! });
//! assert_eq!(head, RecordId(1));
//!
//! let groups = collect_groups(&records);
//! assert_eq!(groups.len(), 1);
//! assert_eq!(groups[0].paths(), vec![PathBuf::from("/a"), PathBuf::from("/b")]);
//! ```

use std::cmp::Ordering;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::scanner::{FileRecord, RecordId};

/// Built-in chain orderings.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ChainOrder {
    /// By path
    #[default]
    Name,
    /// By modification time, oldest first, then by path
    Time,
}

impl ChainOrder {
    /// Compare two records under this ordering.
    #[must_use]
    pub fn compare(self, a: &FileRecord, b: &FileRecord) -> Ordering {
        match self {
            Self::Name => a.path.cmp(&b.path),
            Self::Time => a.mtime.cmp(&b.mtime).then_with(|| a.path.cmp(&b.path)),
        }
    }
}

/// Insert `new` into the chain starting at `head` and return the (possibly
/// new) head.
///
/// # Panics
///
/// Panics if either id is out of bounds.
pub fn register_pair<F>(records: &mut [FileRecord], head: RecordId, new: RecordId, order: F) -> RecordId
where
    F: Fn(&FileRecord, &FileRecord) -> Ordering,
{
    log::debug!(
        "register_pair: '{}', '{}'",
        records[head.index()].path.display(),
        records[new.index()].path.display()
    );

    records[head.index()].has_duplicates = true;
    let mut back: Option<RecordId> = None;
    let mut cur = head;

    loop {
        if order(&records[new.index()], &records[cur.index()]) != Ordering::Greater {
            records[new.index()].next_duplicate = Some(cur);
            return match back {
                None => {
                    records[new.index()].has_duplicates = true;
                    records[cur.index()].has_duplicates = false;
                    new
                }
                Some(prev) => {
                    records[prev.index()].next_duplicate = Some(new);
                    head
                }
            };
        }

        match records[cur.index()].next_duplicate {
            Some(next) => {
                back = Some(cur);
                cur = next;
            }
            None => {
                records[cur.index()].next_duplicate = Some(new);
                return head;
            }
        }
    }
}

/// Iterate a chain from its head.
pub fn chain_members(records: &[FileRecord], head: RecordId) -> impl Iterator<Item = RecordId> + '_ {
    std::iter::successors(Some(head), move |id| records[id.index()].next_duplicate)
}

/// Confirmed duplicate group of files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateGroup {
    /// File size in bytes (shared by all files)
    pub size: u64,
    /// Full content hash of the head, when one was computed
    pub hash: Option<u64>,
    /// Files in chain order
    pub files: Vec<FileRecord>,
}

impl DuplicateGroup {
    /// Build a group by walking the chain at `head`.
    #[must_use]
    pub fn from_chain(records: &[FileRecord], head: RecordId) -> Self {
        let files: Vec<FileRecord> = chain_members(records, head)
            .map(|id| records[id.index()].clone())
            .collect();
        let first = &records[head.index()];
        Self {
            size: first.size.unwrap_or(0),
            hash: first.full_hash,
            files,
        }
    }

    /// Number of files in this group.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Check if this group is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Total size of all files in this group.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.size * self.files.len() as u64
    }

    /// Total wasted space (all copies minus one).
    #[must_use]
    pub fn wasted_space(&self) -> u64 {
        self.size * self.duplicate_count() as u64
    }

    /// Number of duplicate copies (total - 1 original).
    #[must_use]
    pub fn duplicate_count(&self) -> usize {
        self.files.len().saturating_sub(1)
    }

    /// Hash as hexadecimal string.
    #[must_use]
    pub fn hash_hex(&self) -> String {
        self.hash.map(|h| format!("{h:016x}")).unwrap_or_default()
    }

    /// Get just the paths of files in this group.
    #[must_use]
    pub fn paths(&self) -> Vec<PathBuf> {
        self.files.iter().map(|f| f.path.clone()).collect()
    }

    /// Stable-sort the group under `order`, giving a global order that the
    /// pairwise chain insertion does not guarantee.
    #[must_use]
    pub fn sorted_by<F>(mut self, order: F) -> Self
    where
        F: Fn(&FileRecord, &FileRecord) -> Ordering,
    {
        self.files.sort_by(|a, b| order(a, b));
        self
    }
}

/// Collect a group for every chain head, in arena order.
#[must_use]
pub fn collect_groups(records: &[FileRecord]) -> Vec<DuplicateGroup> {
    records
        .iter()
        .enumerate()
        .filter(|(_, r)| r.has_duplicates)
        .map(|(i, _)| DuplicateGroup::from_chain(records, RecordId(i)))
        .collect()
}
