//! Path-keyed persistent store of partial/full hashes.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use super::entry::{CacheEntry, CachedHashes, FileMeta, HashCount};
use super::format::{self, Header, VERSION};
use super::index::{BucketIndex, DEFAULT_BUCKET_BITS};
use crate::scanner::path_utils::{is_storable, path_hash};
use crate::scanner::HashAlgorithm;

/// Errors that can occur while loading or saving the hash database.
#[derive(thiserror::Error, Debug)]
pub enum CacheError {
    /// The header line is missing or malformed.
    #[error("Bad hash database header: {0}")]
    Header(String),

    /// The file was written in a format version this build cannot read.
    #[error("Unsupported hash database version {0}")]
    Version(u32),

    /// A data line could not be parsed.
    #[error("Bad line {line} in hash database: '{content}'")]
    Line {
        /// 1-based line number (the header is line 1)
        line: usize,
        /// The offending line
        content: String,
    },

    /// Reading or writing the database failed.
    #[error("Hash database I/O error: {0}")]
    Io(#[from] io::Error),

    /// The database file could not be opened or created.
    #[error("Cannot open hash database {path}: {source}")]
    Open {
        /// Database path
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

/// Result type alias for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Result of a cache lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    /// A live entry with matching metadata.
    Hit {
        /// Stored partial hash
        partial: u64,
        /// Stored full hash, if any
        full: Option<u64>,
    },
    /// An entry exists but can no longer be trusted.
    Stale,
    /// No entry for this path.
    Absent,
}

/// Outcome of a successful load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    /// Entries were read from the database.
    Loaded(usize),
    /// No database file existed; one will be written on save.
    Created,
    /// The file was written with another hash algorithm and was ignored.
    AlgorithmMismatch {
        /// Algorithm id found in the header
        found: u32,
    },
}

/// Outcome of a save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveStatus {
    /// Nothing changed since load; nothing was written.
    Clean,
    /// This many live entries were written.
    Written(usize),
}

/// In-memory hash cache with load/save to the line-oriented database format.
///
/// # Lifecycle
///
/// Load once before matching, mutate through
/// [`lookup_or_invalidate`](Self::lookup_or_invalidate) and
/// [`upsert`](Self::upsert), save once at the end. Saving only writes when
/// something changed and drops tombstoned entries.
///
/// # Example
///
/// ```
/// use rdupes::cache::{FileMeta, HashCache, Lookup};
/// use rdupes::scanner::HashAlgorithm;
///
/// let mut cache = HashCache::new(HashAlgorithm::Xxh64);
/// let meta = FileMeta { size: 10, mtime: 1, inode: 2 };
///
/// cache.upsert("/tmp/a", meta, Some(0xaa), None);
/// assert_eq!(
///     cache.lookup_or_invalidate("/tmp/a", &meta),
///     Lookup::Hit { partial: 0xaa, full: None }
/// );
///
/// let touched = FileMeta { mtime: 5, ..meta };
/// assert_eq!(cache.lookup_or_invalidate("/tmp/a", &touched), Lookup::Stale);
/// ```
#[derive(Debug, Clone)]
pub struct HashCache {
    index: BucketIndex,
    algorithm: HashAlgorithm,
    dirty: bool,
}

impl HashCache {
    /// Create an empty cache for the given content hash algorithm.
    #[must_use]
    pub fn new(algorithm: HashAlgorithm) -> Self {
        Self::with_bucket_bits(algorithm, DEFAULT_BUCKET_BITS)
    }

    /// Create an empty cache with `2^bits` buckets.
    #[must_use]
    pub fn with_bucket_bits(algorithm: HashAlgorithm, bits: u32) -> Self {
        Self {
            index: BucketIndex::new(bits),
            algorithm,
            dirty: false,
        }
    }

    /// Override the descent imbalance that triggers a bucket rebalance.
    #[must_use]
    pub fn with_rebalance_threshold(mut self, threshold: u64) -> Self {
        self.index.set_rebalance_threshold(threshold);
        self
    }

    /// Create a cache and load it from `path`, downgrading load problems to
    /// warnings. Corrupt or mismatched databases yield an empty cache.
    #[must_use]
    pub fn open(path: &Path, algorithm: HashAlgorithm) -> Self {
        let mut cache = Self::new(algorithm);
        match cache.load_path(path) {
            Ok(LoadStatus::Loaded(n)) => {
                log::info!("Loaded {} entries from hash database {}", n, path.display());
            }
            Ok(_) => {}
            Err(e) => {
                log::warn!("{}; continuing with an empty hash database", e);
            }
        }
        cache
    }

    /// The content hash algorithm this cache holds hashes for.
    #[must_use]
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Returns `true` if the cache changed since the last load or save.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Number of live (non-tombstoned) entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries().count()
    }

    /// Returns `true` if there are no live entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries().next().is_none()
    }

    /// Live entries in bucket order.
    pub fn entries(&self) -> impl Iterator<Item = &CacheEntry> + '_ {
        self.index.iter().filter(|e| e.is_live())
    }

    /// Number of rebalance passes run so far.
    #[must_use]
    pub fn rebalances(&self) -> u64 {
        self.index.rebalances()
    }

    /// Look up cached hashes for `path`, tombstoning the entry if `meta` no
    /// longer matches what was recorded.
    pub fn lookup_or_invalidate(&mut self, path: &str, meta: &FileMeta) -> Lookup {
        let key = path_hash(path);
        let Some(id) = self.index.find(key, path) else {
            return Lookup::Absent;
        };

        let entry = self.index.entry_mut(id);
        if entry.meta != *meta {
            log::debug!(
                "Hash cache: invalidating '{}' (size {}→{}, mtime {}→{}, inode {}→{})",
                path,
                entry.meta.size,
                meta.size,
                entry.meta.mtime,
                meta.mtime,
                entry.meta.inode,
                meta.inode
            );
            if entry.hash_count != HashCount::Invalid {
                entry.hash_count = HashCount::Invalid;
                self.dirty = true;
            }
            return Lookup::Stale;
        }

        match entry.hashes() {
            Some(CachedHashes { partial, full }) => Lookup::Hit { partial, full },
            None => Lookup::Stale,
        }
    }

    /// Record hashes for `path`. Without a partial hash, or for a path that
    /// cannot be stored on one line, this does nothing.
    ///
    /// Returns `true` if the store changed.
    pub fn upsert(
        &mut self,
        path: &str,
        meta: FileMeta,
        partial: Option<u64>,
        full: Option<u64>,
    ) -> bool {
        let Some(partial) = partial else {
            return false;
        };
        if !is_storable(path) {
            log::debug!("Hash cache: not storing {:?}", path);
            return false;
        }

        let key = path_hash(path);
        let changed = match self.index.find(key, path) {
            Some(id) => self.index.entry_mut(id).overwrite(meta, partial, full),
            None => {
                self.index
                    .insert(CacheEntry::new(path, key, meta, partial, full));
                true
            }
        };
        if changed {
            log::trace!("Hash cache: stored '{}'", path);
            self.dirty = true;
        }
        changed
    }

    /// Replace the contents with the database read from `reader`.
    ///
    /// On any error the cache is left empty.
    ///
    /// # Errors
    ///
    /// [`CacheError::Header`], [`CacheError::Version`], [`CacheError::Line`]
    /// or [`CacheError::Io`].
    pub fn load<R: BufRead>(&mut self, reader: R) -> CacheResult<LoadStatus> {
        self.index.clear();
        self.dirty = false;
        let result = self.load_inner(reader);
        if result.is_err() {
            self.index.clear();
        }
        result
    }

    fn load_inner<R: BufRead>(&mut self, mut reader: R) -> CacheResult<LoadStatus> {
        let mut buf = Vec::new();
        if !read_line(&mut reader, &mut buf)? {
            return Err(CacheError::Header("empty file".to_string()));
        }
        let header_line = std::str::from_utf8(&buf)
            .map_err(|_| CacheError::Header("not valid UTF-8".to_string()))?;
        let header =
            format::parse_header(header_line).map_err(|p| CacheError::Header(p.to_string()))?;
        if header.version != VERSION {
            return Err(CacheError::Version(header.version));
        }
        if header.algorithm != self.algorithm.id() {
            log::warn!(
                "Hash database uses a different hash algorithm (id {}) than selected ({}); not loading",
                header.algorithm,
                self.algorithm
            );
            return Ok(LoadStatus::AlgorithmMismatch {
                found: header.algorithm,
            });
        }

        let mut count = 0;
        let mut line_no = 1;
        while read_line(&mut reader, &mut buf)? {
            line_no += 1;
            let entry = std::str::from_utf8(&buf)
                .ok()
                .and_then(format::parse_entry)
                .ok_or_else(|| CacheError::Line {
                    line: line_no,
                    content: String::from_utf8_lossy(&buf).into_owned(),
                })?;
            match self.index.find(entry.path_hash, &entry.path) {
                Some(id) => *self.index.entry_mut(id) = entry,
                None => {
                    self.index.insert(entry);
                }
            }
            count += 1;
        }
        log::debug!("Hash database: read {} entries", count);
        Ok(LoadStatus::Loaded(count))
    }

    /// Load from a file. A missing file is not an error.
    ///
    /// # Errors
    ///
    /// See [`load`](Self::load); also [`CacheError::Open`].
    pub fn load_path(&mut self, path: &Path) -> CacheResult<LoadStatus> {
        match File::open(path) {
            Ok(file) => self.load(BufReader::new(file)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::warn!("Creating a new hash database '{}'", path.display());
                self.index.clear();
                self.dirty = false;
                Ok(LoadStatus::Created)
            }
            Err(source) => Err(CacheError::Open {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Write the header and every live entry, regardless of the dirty flag.
    ///
    /// # Errors
    ///
    /// [`CacheError::Io`] if writing fails.
    pub fn dump<W: Write>(&self, mut writer: W) -> CacheResult<usize> {
        let header = Header {
            version: VERSION,
            algorithm: self.algorithm.id(),
            timestamp: u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0),
        };
        writer.write_all(format::format_header(&header).as_bytes())?;

        let mut count = 0;
        let mut line = String::new();
        for entry in self.entries() {
            line.clear();
            format::format_entry(&mut line, entry);
            writer.write_all(line.as_bytes())?;
            count += 1;
        }
        writer.flush()?;
        Ok(count)
    }

    /// Write the database if it changed, then mark it clean.
    ///
    /// # Errors
    ///
    /// [`CacheError::Io`] if writing fails; the cache stays dirty.
    pub fn save<W: Write>(&mut self, writer: W) -> CacheResult<SaveStatus> {
        if !self.dirty {
            return Ok(SaveStatus::Clean);
        }
        let count = self.dump(writer)?;
        self.dirty = false;
        Ok(SaveStatus::Written(count))
    }

    /// Save to a file only when dirty.
    ///
    /// The database is written to a sibling temporary file which then
    /// replaces `path`, so a failed write leaves the previous file intact.
    ///
    /// # Errors
    ///
    /// [`CacheError::Open`] or [`CacheError::Io`].
    pub fn save_path(&mut self, path: &Path) -> CacheResult<SaveStatus> {
        if !self.dirty {
            log::debug!("Hash database unchanged; not saving");
            return Ok(SaveStatus::Clean);
        }
        let tmp_path = temp_path_for(path);
        let file = File::create(&tmp_path).map_err(|source| CacheError::Open {
            path: tmp_path.clone(),
            source,
        })?;

        let count = match self.dump(BufWriter::new(file)) {
            Ok(count) => count,
            Err(e) => {
                let _ = fs::remove_file(&tmp_path);
                return Err(e);
            }
        };
        if let Err(source) = fs::rename(&tmp_path, path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(CacheError::Open {
                path: path.to_path_buf(),
                source,
            });
        }
        self.dirty = false;

        log::info!("Wrote {} entries to hash database {}", count, path.display());
        Ok(SaveStatus::Written(count))
    }
}

/// Read one `\n`-terminated line into `buf` without the terminator.
///
/// Any `\r` is kept as part of the line. Returns `false` at end of input.
fn read_line<R: BufRead>(reader: &mut R, buf: &mut Vec<u8>) -> io::Result<bool> {
    buf.clear();
    if reader.read_until(b'\n', buf)? == 0 {
        return Ok(false);
    }
    if buf.last() == Some(&b'\n') {
        buf.pop();
    }
    Ok(true)
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
