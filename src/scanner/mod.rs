//! File records, traversal and content hashing.
//!
//! # Architecture
//!
//! - [`walker`]: Directory traversal producing [`FileRecord`]s
//! - [`hasher`]: Chunked partial/full file hashing with prefix resume
//! - [`hardlink`]: Device/inode identity used by the hard-link pre-check
//! - [`path_utils`]: Path normalization and path hashing for cache keys
//!
//! # Example
//!
//! ```no_run
//! use rdupes::scanner::{Walker, WalkerConfig};
//! use std::path::PathBuf;
//!
//! let config = WalkerConfig {
//!     recurse: true,
//!     ..Default::default()
//! };
//!
//! let walker = Walker::new(vec![PathBuf::from(".")], config);
//! for record in walker.walk() {
//!     match record {
//!         Ok(file) => println!("{}: {:?} bytes", file.path.display(), file.size),
//!         Err(e) => eprintln!("Warning: {}", e),
//!     }
//! }
//! ```

pub mod hardlink;
pub mod hasher;
pub mod path_utils;
pub mod walker;

use std::fs::Metadata;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

pub use hardlink::FileIdentity;
pub use hasher::{FileHasher, HashAlgorithm, HasherConfig, DEFAULT_CHUNK_SIZE, PARTIAL_HASH_SIZE};
pub use walker::Walker;

use crate::cache::FileMeta;

/// Index of a [`FileRecord`] in the caller-owned record arena.
///
/// The matcher and the duplicate chains refer to records only through these
/// ids; the arena itself is never shrunk during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(pub usize);

impl RecordId {
    /// Position in the arena.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

/// One filesystem entry under consideration.
///
/// Created by traversal with path, size, mtime and identity filled in. The
/// hasher supplies hash values, the matcher sets the duplicate chain link and
/// flags, and the hash cache may pre-fill hashes on a hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Path as given by traversal
    pub path: PathBuf,
    /// File size in bytes; `None` when stat information is unusable
    pub size: Option<u64>,
    /// Modification time in seconds since the Unix epoch
    pub mtime: i64,
    /// Device and inode, when the platform exposes them
    pub identity: Option<FileIdentity>,
    /// Unix permission bits (0 on other platforms)
    pub mode: u32,
    /// Owning user id (0 on other platforms)
    pub uid: u32,
    /// Owning group id (0 on other platforms)
    pub gid: u32,
    /// Index of the traversal root this record came from
    pub user_order: usize,
    /// Digest of the first `partial_hash_size` bytes, once known
    pub partial_hash: Option<u64>,
    /// Digest of the whole file, once known
    pub full_hash: Option<u64>,
    /// Set only on the head record of a duplicate chain
    pub has_duplicates: bool,
    /// Next record in this record's duplicate chain
    pub next_duplicate: Option<RecordId>,
    /// The hash cache has already been consulted for this record
    pub cache_checked: bool,
}

impl FileRecord {
    /// Create a record with only path, size and mtime known.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, size: u64, mtime: i64) -> Self {
        Self {
            path: path.into(),
            size: Some(size),
            mtime,
            identity: None,
            mode: 0,
            uid: 0,
            gid: 0,
            user_order: 0,
            partial_hash: None,
            full_hash: None,
            has_duplicates: false,
            next_duplicate: None,
            cache_checked: false,
        }
    }

    /// Build a record from `stat` metadata.
    ///
    /// # Arguments
    ///
    /// * `path` - Path of the file
    /// * `metadata` - Metadata for the file (already resolved through symlinks if wanted)
    /// * `user_order` - Index of the traversal root
    #[must_use]
    pub fn from_metadata(path: impl Into<PathBuf>, metadata: &Metadata, user_order: usize) -> Self {
        let mut record = Self::new(path, metadata.len(), mtime_secs(metadata.modified().ok()));
        record.identity = FileIdentity::from_metadata(metadata);
        record.user_order = user_order;

        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            record.mode = metadata.mode();
            record.uid = metadata.uid();
            record.gid = metadata.gid();
        }

        record
    }

    /// Set the device/inode identity.
    #[must_use]
    pub fn with_identity(mut self, dev: u64, ino: u64) -> Self {
        self.identity = Some(FileIdentity { dev, ino });
        self
    }

    /// Set the traversal root index.
    #[must_use]
    pub fn with_user_order(mut self, user_order: usize) -> Self {
        self.user_order = user_order;
        self
    }

    /// Metadata snapshot used to validate hash cache entries.
    ///
    /// `None` when the size is unknown; such records are never cached.
    #[must_use]
    pub fn cache_meta(&self) -> Option<FileMeta> {
        self.size.map(|size| FileMeta {
            size,
            mtime: self.mtime,
            inode: self.identity.map_or(0, |id| id.ino),
        })
    }

    /// Returns `true` if both records refer to the same device and inode.
    #[must_use]
    pub fn is_same_inode(&self, other: &FileRecord) -> bool {
        matches!((self.identity, other.identity), (Some(a), Some(b)) if a == b)
    }
}

/// Convert an optional `SystemTime` to whole seconds since the epoch.
///
/// Times before the epoch become negative; unknown times become 0.
#[must_use]
pub fn mtime_secs(time: Option<SystemTime>) -> i64 {
    match time {
        Some(t) => match t.duration_since(UNIX_EPOCH) {
            Ok(d) => i64::try_from(d.as_secs()).unwrap_or(i64::MAX),
            Err(e) => -i64::try_from(e.duration().as_secs()).unwrap_or(i64::MAX),
        },
        None => 0,
    }
}

/// Configuration for directory walking.
#[derive(Debug, Clone, Default)]
pub struct WalkerConfig {
    /// Descend into subdirectories.
    pub recurse: bool,

    /// Follow symbolic links during traversal.
    pub follow_symlinks: bool,

    /// Keep zero-length files (skipped by default).
    pub include_empty: bool,
}

/// Errors that can occur during directory scanning.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// Permission was denied when accessing a file or directory.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The specified path was not found.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// An I/O error occurred while accessing a file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// Errors that can occur during file hashing.
///
/// None of these leave a partial result behind: the caller's record is only
/// updated after a successful hash.
#[derive(thiserror::Error, Debug)]
pub enum HashError {
    /// The record has no usable size, so no read was attempted.
    #[error("Unknown size, not hashing: {0}")]
    UnknownSize(PathBuf),

    /// The file could not be opened.
    #[error("Error opening {path}: {source}")]
    Open {
        /// Path of the file
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Seeking past the already-hashed prefix failed.
    #[error("Error seeking in {path}: {source}")]
    Seek {
        /// Path of the file
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A read failed or returned fewer bytes than the file size promised.
    #[error("Error reading from {path}: {source}")]
    Read {
        /// Path of the file
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Cancellation was requested while hashing.
    #[error("Hashing interrupted: {0}")]
    Interrupted(PathBuf),
}
