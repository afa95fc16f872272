//! Path normalization and path hashing for hash database keys.
//!
//! The hash database is keyed by a 64-bit digest of the path. The digest is
//! computed over the NFC form so that a path reported in decomposed form (as
//! macOS does) and the same path in composed form land in the same bucket:
//!
//! - NFC: `café.txt` - 'é' is U+00E9 (single code point)
//! - NFD: `café.txt` - 'e' U+0065 + combining acute accent U+0301
//!
//! The digest is lossy. Lookups always compare the literal path as well.
//!
//! # Example
//!
//! ```
//! use rdupes::scanner::path_utils::path_hash;
//!
//! assert_eq!(path_hash("café.txt"), path_hash("cafe\u{0301}.txt"));
//! assert_ne!(path_hash("a.txt"), path_hash("b.txt"));
//! ```

use std::borrow::Cow;
use std::path::Path;

use unicode_normalization::{is_nfc_quick, IsNormalized, UnicodeNormalization};
use xxhash_rust::xxh64::xxh64;

/// Normalize a path string to NFC, borrowing when it is already NFC.
#[must_use]
pub fn normalize_path_str(s: &str) -> Cow<'_, str> {
    if is_nfc_quick(s.chars()) == IsNormalized::Yes {
        Cow::Borrowed(s)
    } else {
        Cow::Owned(s.nfc().collect())
    }
}

/// The textual key under which a path is stored in the hash database.
///
/// Returns `None` for paths that are not valid UTF-8 or that contain a line
/// break. The database is one entry per line, so such paths are never cached.
#[must_use]
pub fn path_key(path: &Path) -> Option<&str> {
    path.to_str().filter(|s| is_storable(s))
}

/// Returns `true` if `path` can be written as a single database line.
#[must_use]
pub fn is_storable(path: &str) -> bool {
    !path.is_empty() && !path.contains(['\n', '\r'])
}

/// 64-bit hash of the NFC-normalized path.
///
/// Independent of the content hash algorithm: the key space must not change
/// when the user switches algorithms.
#[must_use]
pub fn path_hash(path: &str) -> u64 {
    xxh64(normalize_path_str(path).as_bytes(), 0)
}
