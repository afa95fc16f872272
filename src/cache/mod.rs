//! Persistent hash cache.
//!
//! Stores previously computed partial and full hashes keyed by path so that
//! repeated runs skip rehashing unchanged files.
//!
//! # Architecture
//!
//! * [`database`]: The [`HashCache`] store: lookup, invalidation, load and save.
//! * [`index`]: Bucketed binary search trees keyed by path hash.
//! * [`format`]: The line-oriented on-disk format.
//! * [`entry`]: Data models stored in the cache.
//!
//! # Cache Invalidation
//!
//! Entries are validated using a combination of:
//! * File path (literal string, behind a lossy path-hash key)
//! * File size
//! * Modification time (mtime)
//! * Inode
//!
//! If any of these attributes change, the entry is tombstoned and the file is
//! rehashed. Tombstones are dropped the next time the database is saved.

pub mod database;
pub mod entry;
pub mod format;
pub mod index;

pub use database::{CacheError, CacheResult, HashCache, LoadStatus, Lookup, SaveStatus};
pub use entry::{CacheEntry, CachedHashes, FileMeta, HashCount};
