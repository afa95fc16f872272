//! Chunked partial/full file hasher with prefix resume.
//!
//! # Overview
//!
//! The hash is only a fast exclusion filter; byte-for-byte confirmation is
//! the backstop against collisions, so there is no benefit in a stronger
//! function. Digests are 64-bit and block-chained:
//!
//! ```text
//! h0 = 0
//! h(i+1) = H(block(i), seed = h(i))      blocks are PARTIAL_HASH_SIZE bytes
//! ```
//!
//! The state after the first block is the partial hash. A file that already
//! carries a partial hash can therefore skip its first block and continue from
//! that value, and the result equals a fresh whole-file hash.
//!
//! # Example
//!
//! ```no_run
//! use rdupes::scanner::{FileHasher, FileRecord, HasherConfig};
//!
//! let mut hasher = FileHasher::new(HasherConfig::default());
//! let mut record = FileRecord::new("big.iso", 10_000_000, 0);
//!
//! let partial = hasher.hash(&record, 4096).unwrap();
//! record.partial_hash = Some(partial);
//! // Reads from byte 4096 onwards only
//! let full = hasher.hash(&record, 0).unwrap();
//! ```

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::xxh3_64_with_seed;
use xxhash_rust::xxh64::xxh64;

use super::{FileRecord, HashError};
use crate::progress::{percent_of, ProgressSink, ProgressTicker, DEFAULT_TICK_INTERVAL};
use crate::signal::CancelToken;

/// Length of the prefix covered by the partial hash, in bytes.
pub const PARTIAL_HASH_SIZE: u64 = 4096;

/// Default read chunk size, in bytes.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Content hash function.
///
/// The numeric id is written into the hash database header; a database
/// written with another algorithm is never loaded.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// xxHash64
    #[default]
    Xxh64,
    /// XXH3, 64-bit variant
    Xxh3,
}

impl HashAlgorithm {
    /// Identifier stored in the hash database header.
    #[must_use]
    pub fn id(self) -> u32 {
        match self {
            Self::Xxh64 => 0,
            Self::Xxh3 => 1,
        }
    }

    /// Look up an algorithm by its database identifier.
    #[must_use]
    pub fn from_id(id: u32) -> Option<Self> {
        match id {
            0 => Some(Self::Xxh64),
            1 => Some(Self::Xxh3),
            _ => None,
        }
    }

    /// Short name for logs and config files.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Xxh64 => "xxh64",
            Self::Xxh3 => "xxh3",
        }
    }

    fn block(self, data: &[u8], seed: u64) -> u64 {
        match self {
            Self::Xxh64 => xxh64(data, seed),
            Self::Xxh3 => xxh3_64_with_seed(data, seed),
        }
    }

    /// Digest an in-memory buffer exactly as [`FileHasher::hash`] digests a file.
    ///
    /// # Example
    ///
    /// ```
    /// use rdupes::scanner::{HashAlgorithm, PARTIAL_HASH_SIZE};
    ///
    /// let a = HashAlgorithm::Xxh64.digest(b"hello", PARTIAL_HASH_SIZE);
    /// let b = HashAlgorithm::Xxh64.digest(b"hello", PARTIAL_HASH_SIZE);
    /// assert_eq!(a, b);
    /// ```
    #[must_use]
    pub fn digest(self, data: &[u8], block_size: u64) -> u64 {
        if data.is_empty() {
            return self.block(&[], 0);
        }
        let block_size = usize::try_from(block_size.max(1)).unwrap_or(usize::MAX);
        data.chunks(block_size)
            .fold(0, |seed, block| self.block(block, seed))
    }
}

impl std::fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Hasher settings fixed for the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HasherConfig {
    /// Content hash function
    pub algorithm: HashAlgorithm,
    /// Prefix length covered by the partial hash (also the chain block size)
    pub partial_size: u64,
    /// Read chunk size; rounded up to a multiple of `partial_size`
    pub chunk_size: usize,
    /// Minimum interval between progress reports
    pub tick_interval: Duration,
}

impl Default for HasherConfig {
    fn default() -> Self {
        Self {
            algorithm: HashAlgorithm::default(),
            partial_size: PARTIAL_HASH_SIZE,
            chunk_size: DEFAULT_CHUNK_SIZE,
            tick_interval: DEFAULT_TICK_INTERVAL,
        }
    }
}

/// Streaming file hasher owning a reusable read buffer.
pub struct FileHasher {
    algorithm: HashAlgorithm,
    partial_size: u64,
    buffer: Vec<u8>,
    cancel: Option<CancelToken>,
    progress: Option<Arc<dyn ProgressSink>>,
    ticker: ProgressTicker,
}

impl std::fmt::Debug for FileHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileHasher")
            .field("algorithm", &self.algorithm)
            .field("partial_size", &self.partial_size)
            .field("chunk_size", &self.buffer.len())
            .field("cancel", &self.cancel)
            .field("progress", &self.progress.as_ref().map(|_| "<sink>"))
            .finish()
    }
}

impl FileHasher {
    /// Create a hasher. The read buffer is allocated here, once.
    #[must_use]
    pub fn new(config: HasherConfig) -> Self {
        let partial_size = config.partial_size.max(1);
        let block = usize::try_from(partial_size).unwrap_or(usize::MAX);
        let chunk_size = config.chunk_size.max(block).div_ceil(block) * block;
        Self {
            algorithm: config.algorithm,
            partial_size,
            buffer: vec![0u8; chunk_size],
            cancel: None,
            progress: None,
            ticker: ProgressTicker::new(config.tick_interval),
        }
    }

    /// Poll this token at every chunk boundary.
    #[must_use]
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Report per-file progress to this sink when the ticker rings.
    #[must_use]
    pub fn with_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = Some(sink);
        self
    }

    /// The content hash function in use.
    #[must_use]
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Prefix length covered by partial hashes.
    #[must_use]
    pub fn partial_size(&self) -> u64 {
        self.partial_size
    }

    /// Effective read chunk size.
    #[must_use]
    pub fn chunk_size(&self) -> usize {
        self.buffer.len()
    }

    /// Hash up to `max_bytes` of a file; `0` means the whole file.
    ///
    /// Resumes from `record.partial_hash` when present. The record is not
    /// modified; committing the digest is the caller's job.
    ///
    /// # Errors
    ///
    /// [`HashError`] on unknown size, open/seek/read failure, a short read,
    /// or cancellation.
    pub fn hash(&mut self, record: &FileRecord, max_bytes: u64) -> Result<u64, HashError> {
        log::trace!("hash('{}', {})", record.path.display(), max_bytes);

        let Some(size) = record.size else {
            log::trace!("not hashing {}: stat info is bad", record.path.display());
            return Err(HashError::UnknownSize(record.path.clone()));
        };

        let mut remaining = if max_bytes > 0 && size > max_bytes {
            max_bytes
        } else {
            size
        };

        let mut state = 0u64;
        let mut offset = 0u64;
        if let Some(partial) = record.partial_hash {
            if (max_bytes != 0 && max_bytes <= self.partial_size) || size <= self.partial_size {
                log::trace!("partial hash already covers the request, not reading");
                return Ok(partial);
            }
            state = partial;
            offset = self.partial_size;
            remaining -= self.partial_size;
        }

        let mut file = File::open(&record.path).map_err(|source| HashError::Open {
            path: record.path.clone(),
            source,
        })?;

        if offset > 0 {
            file.seek(SeekFrom::Start(offset))
                .map_err(|source| HashError::Seek {
                    path: record.path.clone(),
                    source,
                })?;
        } else if remaining == 0 {
            return Ok(self.algorithm.digest(&[], self.partial_size));
        }

        let block = usize::try_from(self.partial_size).unwrap_or(usize::MAX);
        let mut consumed = offset;
        while remaining > 0 {
            if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
                return Err(HashError::Interrupted(record.path.clone()));
            }

            let want = usize::try_from(remaining)
                .unwrap_or(usize::MAX)
                .min(self.buffer.len());
            let chunk = &mut self.buffer[..want];
            file.read_exact(chunk).map_err(|source| HashError::Read {
                path: record.path.clone(),
                source,
            })?;

            for piece in chunk.chunks(block) {
                state = self.algorithm.block(piece, state);
            }

            remaining -= want as u64;
            consumed += want as u64;

            if self.ticker.ring() {
                if let Some(ref sink) = self.progress {
                    sink.on_phase_progress("hashing", percent_of(consumed, size));
                }
            }
        }

        log::trace!(
            "hash('{}') = {:016x}",
            record.path.display(),
            state
        );
        Ok(state)
    }
}
