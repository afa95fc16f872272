//! Command-line interface definitions for rdupes.
//!
//! # Example
//!
//! ```bash
//! # Find duplicates in two directory trees
//! rdupes -r ~/Photos /mnt/backup/Photos
//!
//! # Keep a hash database so the next run skips unchanged files
//! rdupes -r -y . ~/Downloads
//!
//! # Exit with status 255 as soon as any duplicate exists
//! rdupes -r -e ~/project
//! ```

use clap::Parser;
use std::path::PathBuf;

use crate::config::{default_hash_db_path, Config};
use crate::duplicates::ChainOrder;
use crate::scanner::HashAlgorithm;

/// Find duplicate files by content.
///
/// Files are compared by size first, then by a hash of their first 4 KiB,
/// then by a hash of their whole content, and finally byte for byte.
#[derive(Debug, Parser)]
#[command(name = "rdupes")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Directories (or files) to scan
    #[arg(value_name = "DIRS", required = true)]
    pub paths: Vec<PathBuf>,

    /// Recurse into subdirectories
    #[arg(short, long)]
    pub recurse: bool,

    /// Treat hard links to the same file as duplicates
    #[arg(short = 'H', long)]
    pub hard_links: bool,

    /// Do not match files on different filesystems
    #[arg(short = '1', long)]
    pub one_file_system: bool,

    /// Never match files found under the same command-line directory
    #[arg(short = 'I', long)]
    pub isolate: bool,

    /// Do not match files whose permissions or owner differ
    #[arg(short, long)]
    pub permissions: bool,

    /// Exit with status 255 on the first duplicate found
    #[arg(short = 'e', long)]
    pub error_on_dupe: bool,

    /// Match on the partial hash only (DANGEROUS: may report non-duplicates)
    #[arg(short = 'T', long)]
    pub partial_only: bool,

    /// Skip byte-for-byte confirmation of hash matches
    #[arg(short = 'Q', long)]
    pub quick: bool,

    /// Ordering of files within each group
    #[arg(short, long, value_enum)]
    pub order: Option<ChainOrder>,

    /// Hash database file; `.` uses the default location
    #[arg(short = 'y', long, value_name = "PATH")]
    pub hash_db: Option<PathBuf>,

    /// Bytes per read (e.g. 64KiB); rounded up to a multiple of 4 KiB
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub chunk_size: Option<u64>,

    /// Hash algorithm
    #[arg(long, value_enum)]
    pub algorithm: Option<HashAlgorithm>,

    /// Consider zero-length files
    #[arg(short = 'z', long)]
    pub zero_match: bool,

    /// Follow symbolic links
    #[arg(short = 's', long)]
    pub symlinks: bool,

    /// Abort on the first file that cannot be read
    #[arg(long)]
    pub strict: bool,

    /// Configuration file (TOML)
    #[arg(long, value_name = "FILE", env = "RDUPES_CONFIG")]
    pub config: Option<PathBuf>,

    /// Do not show progress
    #[arg(long)]
    pub no_progress: bool,

    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Cli {
    /// Apply command-line overrides on top of a loaded configuration.
    ///
    /// Boolean flags can only switch a setting on.
    pub fn apply_to(&self, config: &mut Config) {
        config.recurse |= self.recurse;
        config.consider_hardlinks |= self.hard_links;
        config.one_file_system |= self.one_file_system;
        config.isolate |= self.isolate;
        config.permissions |= self.permissions;
        config.stop_on_first |= self.error_on_dupe;
        config.partial_only |= self.partial_only;
        config.quick |= self.quick;
        config.include_empty |= self.zero_match;
        config.follow_symlinks |= self.symlinks;
        config.strict |= self.strict;

        if let Some(order) = self.order {
            config.order = order;
        }
        if let Some(algorithm) = self.algorithm {
            config.hash_algorithm = algorithm;
        }
        if let Some(size) = self.chunk_size {
            config.chunk_size = usize::try_from(size).unwrap_or(usize::MAX);
        }
        if let Some(ref path) = self.hash_db {
            config.hash_db = if path.as_os_str() == "." {
                default_hash_db_path()
            } else {
                Some(path.clone())
            };
        }
    }
}

/// Parse a human-readable size string (e.g., "64KiB", "1M") into bytes.
///
/// # Examples
///
/// ```
/// use rdupes::cli::parse_size;
///
/// assert_eq!(parse_size("4096").unwrap(), 4096);
/// assert_eq!(parse_size("64KiB").unwrap(), 65_536);
/// assert_eq!(parse_size("1MB").unwrap(), 1_000_000);
/// ```
/// # Errors
///
/// Returns an error if the string is empty, contains an invalid number,
/// or an unknown size suffix.
pub fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("Size cannot be empty".to_string());
    }

    let (num_str, suffix) = match s.find(|c: char| !c.is_ascii_digit() && c != '.') {
        Some(idx) => (&s[..idx], s[idx..].trim().to_uppercase()),
        None => (s, String::new()),
    };

    let num: f64 = num_str
        .parse()
        .map_err(|_| format!("Invalid number: '{num_str}'"))?;

    let multiplier: u64 = match suffix.as_str() {
        "" | "B" => 1,
        "KB" | "K" => 1_000,
        "KIB" => 1_024,
        "MB" | "M" => 1_000_000,
        "MIB" => 1_048_576,
        "GB" | "G" => 1_000_000_000,
        "GIB" => 1_073_741_824,
        _ => return Err(format!("Unknown size suffix: '{suffix}'")),
    };

    Ok((num * multiplier as f64) as u64)
}
