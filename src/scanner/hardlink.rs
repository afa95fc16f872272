//! Device/inode identity for hard-link detection.
//!
//! Two directory entries with the same device and inode are the same file on
//! disk. The matcher checks this before reading anything: depending on the run
//! configuration such a pair is either merged as a duplicate or rejected.
//!
//! # Platform Support
//!
//! - **Unix**: `(st_dev, st_ino)` from metadata
//! - **Other**: no identity; hard links are never detected
//!
//! # Example
//!
//! ```no_run
//! use rdupes::scanner::FileIdentity;
//!
//! let a = std::fs::metadata("file1.txt").unwrap();
//! let b = std::fs::metadata("hardlink_to_file1.txt").unwrap();
//! assert_eq!(FileIdentity::from_metadata(&a), FileIdentity::from_metadata(&b));
//! ```

use std::fs::Metadata;

/// Device + inode pair identifying the underlying file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FileIdentity {
    /// Device id (`st_dev`)
    pub dev: u64,
    /// Inode number (`st_ino`)
    pub ino: u64,
}

impl FileIdentity {
    /// Read the identity from file metadata.
    ///
    /// Returns `None` on platforms without stable inode numbers.
    #[cfg(unix)]
    #[must_use]
    pub fn from_metadata(metadata: &Metadata) -> Option<Self> {
        use std::os::unix::fs::MetadataExt;
        Some(Self {
            dev: metadata.dev(),
            ino: metadata.ino(),
        })
    }

    /// Read the identity from file metadata.
    ///
    /// Returns `None` on platforms without stable inode numbers.
    #[cfg(not(unix))]
    #[must_use]
    pub fn from_metadata(_metadata: &Metadata) -> Option<Self> {
        None
    }

    /// Check if hard-link detection is supported on this platform.
    #[must_use]
    pub const fn is_supported() -> bool {
        cfg!(unix)
    }
}
