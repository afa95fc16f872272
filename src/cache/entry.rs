//! Cache entry definitions.

use std::fmt;

/// Metadata snapshot used to decide whether a cached hash is still valid.
///
/// A cached entry is trusted only when all three fields are equal to the
/// current values for the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FileMeta {
    /// File size in bytes
    pub size: u64,
    /// Modification time in seconds since the Unix epoch
    pub mtime: i64,
    /// Inode number (0 when unknown)
    pub inode: u64,
}

/// How many hash levels an entry holds.
///
/// `Invalid` marks a tombstone: the entry stays in the index until the next
/// save but is never returned as a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum HashCount {
    /// Tombstone
    #[default]
    Invalid = 0,
    /// Partial hash only
    Partial = 1,
    /// Partial and full hash
    Full = 2,
}

impl HashCount {
    /// Parse the on-disk value. Tombstones are never written, so `0` is
    /// rejected along with anything above `2`.
    #[must_use]
    pub fn from_stored(value: u32) -> Option<Self> {
        match value {
            1 => Some(Self::Partial),
            2 => Some(Self::Full),
            _ => None,
        }
    }

    /// Numeric value as stored in the database file.
    #[must_use]
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl fmt::LowerHex for HashCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.as_u8(), f)
    }
}

/// Hash values returned by a cache hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachedHashes {
    /// Digest of the file prefix
    pub partial: u64,
    /// Digest of the whole file, if it was ever computed
    pub full: Option<u64>,
}

/// A single path's record in the hash cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Literal path string, compared on every lookup
    pub path: String,
    /// Lossy digest of the normalized path; the index key
    pub path_hash: u64,
    /// Metadata at the time the hashes were computed
    pub meta: FileMeta,
    /// Partial hash (meaningful unless tombstoned)
    pub partial_hash: u64,
    /// Full hash (meaningful only with [`HashCount::Full`])
    pub full_hash: u64,
    /// Number of valid hash levels
    pub hash_count: HashCount,
}

impl CacheEntry {
    /// Build a live entry from a partial and an optional full hash.
    #[must_use]
    pub fn new(
        path: impl Into<String>,
        path_hash: u64,
        meta: FileMeta,
        partial: u64,
        full: Option<u64>,
    ) -> Self {
        Self {
            path: path.into(),
            path_hash,
            meta,
            partial_hash: partial,
            full_hash: full.unwrap_or(0),
            hash_count: if full.is_some() {
                HashCount::Full
            } else {
                HashCount::Partial
            },
        }
    }

    /// Returns `true` unless the entry has been tombstoned.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.hash_count != HashCount::Invalid
    }

    /// The stored hashes, or `None` for a tombstone.
    #[must_use]
    pub fn hashes(&self) -> Option<CachedHashes> {
        match self.hash_count {
            HashCount::Invalid => None,
            HashCount::Partial => Some(CachedHashes {
                partial: self.partial_hash,
                full: None,
            }),
            HashCount::Full => Some(CachedHashes {
                partial: self.partial_hash,
                full: Some(self.full_hash),
            }),
        }
    }

    /// Replace metadata and hashes. Returns `true` if anything changed.
    pub fn overwrite(&mut self, meta: FileMeta, partial: u64, full: Option<u64>) -> bool {
        let updated = Self::new(std::mem::take(&mut self.path), self.path_hash, meta, partial, full);
        let changed = updated.meta != self.meta
            || updated.hash_count != self.hash_count
            || updated.partial_hash != self.partial_hash
            || (updated.hash_count == HashCount::Full && updated.full_hash != self.full_hash);
        *self = updated;
        changed
    }
}
