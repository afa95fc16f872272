//! On-disk hash database format.
//!
//! ```text
//! jdupes hashdb:1,<algorithm id>,<timestamp hex>
//! <count>,<partial:016x>,<full:016x>,<mtime:08x>,<size:08x>,<inode:016x>,<path>
//! ```
//!
//! Field widths are minimums. Readers split on the first six commas, so a
//! path may itself contain commas and a size wider than eight hex digits
//! still parses. Lines are `\n` terminated; paths cannot contain newlines.

use std::fmt::Write as _;

use super::entry::{CacheEntry, FileMeta, HashCount};
use crate::scanner::path_utils::path_hash;

/// Header magic preceding the `:`.
pub const MAGIC: &str = "jdupes hashdb";

/// Format version written by this crate.
pub const VERSION: u32 = 1;

/// Length of the fixed-width prefix (six fields and their commas) when every
/// value fits the minimum width.
pub const FIXED_PREFIX_LEN: usize = 71;

/// Parsed header line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Format version
    pub version: u32,
    /// Content hash algorithm id
    pub algorithm: u32,
    /// Seconds since the Unix epoch at which the file was written
    pub timestamp: u64,
}

/// Why a header could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderProblem {
    /// Missing or wrong magic
    Magic,
    /// A field is missing or not a number
    Field(&'static str),
}

impl std::fmt::Display for HeaderProblem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Magic => write!(f, "missing '{MAGIC}' magic"),
            Self::Field(name) => write!(f, "bad {name} field"),
        }
    }
}

/// Render the header line, newline included.
#[must_use]
pub fn format_header(header: &Header) -> String {
    format!(
        "{MAGIC}:{},{},{:08x}\n",
        header.version, header.algorithm, header.timestamp
    )
}

/// Parse a header line (trailing newline optional).
///
/// # Errors
///
/// Returns the first problem found.
pub fn parse_header(line: &str) -> Result<Header, HeaderProblem> {
    let line = line.trim_end_matches(['\n', '\r']);
    let (magic, rest) = line.split_once(':').ok_or(HeaderProblem::Magic)?;
    if magic != MAGIC {
        return Err(HeaderProblem::Magic);
    }

    let mut fields = rest.split(',');
    let version = fields
        .next()
        .and_then(|f| f.trim().parse::<u32>().ok())
        .ok_or(HeaderProblem::Field("version"))?;
    let algorithm = fields
        .next()
        .and_then(|f| f.trim().parse::<u32>().ok())
        .ok_or(HeaderProblem::Field("algorithm"))?;
    // The timestamp is informational only
    let timestamp = fields
        .next()
        .and_then(|f| u64::from_str_radix(f.trim(), 16).ok())
        .unwrap_or(0);

    Ok(Header {
        version,
        algorithm,
        timestamp,
    })
}

/// Append one entry line, newline included. Tombstones produce nothing.
pub fn format_entry(out: &mut String, entry: &CacheEntry) {
    if !entry.is_live() {
        return;
    }
    let _ = writeln!(
        out,
        "{:x},{:016x},{:016x},{:08x},{:08x},{:016x},{}",
        entry.hash_count,
        entry.partial_hash,
        entry.full_hash,
        entry.meta.mtime,
        entry.meta.size,
        entry.meta.inode,
        entry.path
    );
}

/// Parse one data line (without its newline) into a live entry.
///
/// Returns `None` if the line is malformed.
#[must_use]
pub fn parse_entry(line: &str) -> Option<CacheEntry> {
    if line.len() < FIXED_PREFIX_LEN {
        return None;
    }

    let mut fields = line.splitn(7, ',');
    let count = u32::from_str_radix(fields.next()?, 16).ok()?;
    let hash_count = HashCount::from_stored(count)?;
    let partial_hash = u64::from_str_radix(fields.next()?, 16).ok()?;
    let full_field = u64::from_str_radix(fields.next()?, 16).ok()?;
    let mtime = u64::from_str_radix(fields.next()?, 16).ok()? as i64;
    let size = u64::from_str_radix(fields.next()?, 16).ok()?;
    let inode = u64::from_str_radix(fields.next()?, 16).ok()?;
    let path = fields.next()?;
    if path.is_empty() {
        return None;
    }

    let full_hash = if hash_count == HashCount::Full {
        full_field
    } else {
        0
    };

    Some(CacheEntry {
        path: path.to_string(),
        path_hash: path_hash(path),
        meta: FileMeta { size, mtime, inode },
        partial_hash,
        full_hash,
        hash_count,
    })
}
