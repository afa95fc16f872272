//! Run driver: feeds records into the match tree and collects the results.
//!
//! # Overview
//!
//! The [`DuplicateFinder`] owns the record arena for one run. Each record
//! handed to [`DuplicateFinder::push`] is classified by the [`Matcher`]; a
//! reported match is confirmed byte for byte (unless quick mode is on) and
//! then registered into the node's duplicate chain. [`DuplicateFinder::finish`]
//! saves the hash database if it changed and builds the duplicate groups.
//!
//! # Example
//!
//! ```no_run
//! use rdupes::duplicates::{DuplicateFinder, FinderConfig};
//! use rdupes::scanner::{Walker, WalkerConfig};
//! use std::path::PathBuf;
//!
//! let walker = Walker::new(vec![PathBuf::from(".")], WalkerConfig::default());
//! let mut finder = DuplicateFinder::new(FinderConfig::default());
//! finder.run(walker.walk()).unwrap();
//!
//! let report = finder.finish().unwrap();
//! for group in &report.groups {
//!     for path in group.paths() {
//!         println!("{}", path.display());
//!     }
//!     println!();
//! }
//! println!("Reclaimable space: {}", report.summary.reclaimable_display());
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytesize::ByteSize;

use super::chain::{collect_groups, ChainOrder, DuplicateGroup};
use super::confirm::{Confirmation, Confirmer};
use super::matcher::{Classification, MatchError, MatchOptions, MatchStats, Matcher};
use crate::cache::{CacheError, HashCache, SaveStatus};
use crate::progress::ProgressSink;
use crate::scanner::{FileHasher, FileRecord, HasherConfig, RecordId, ScanError, PARTIAL_HASH_SIZE};
use crate::signal::CancelToken;

/// Configuration for a duplicate finding run.
#[derive(Clone, Default)]
pub struct FinderConfig {
    /// Matching flags
    pub options: MatchOptions,
    /// Duplicate chain ordering
    pub order: ChainOrder,
    /// End the run at the first confirmed duplicate
    pub stop_on_first: bool,
    /// Skip byte-for-byte confirmation
    pub quick: bool,
    /// Abort on the first file that cannot be hashed
    pub strict: bool,
    /// Hasher parameters
    pub hasher: HasherConfig,
    /// Hash database file, if any
    pub hash_db: Option<PathBuf>,
    /// Cancellation token polled during hashing and confirmation
    pub cancel: Option<CancelToken>,
    /// Progress sink
    pub progress: Option<Arc<dyn ProgressSink>>,
}

impl std::fmt::Debug for FinderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FinderConfig")
            .field("options", &self.options)
            .field("order", &self.order)
            .field("stop_on_first", &self.stop_on_first)
            .field("quick", &self.quick)
            .field("strict", &self.strict)
            .field("hasher", &self.hasher)
            .field("hash_db", &self.hash_db)
            .field("cancel", &self.cancel)
            .field("progress", &self.progress.as_ref().map(|_| "<sink>"))
            .finish()
    }
}

impl FinderConfig {
    /// Set the matching flags.
    #[must_use]
    pub fn with_options(mut self, options: MatchOptions) -> Self {
        self.options = options;
        self
    }

    /// Set the duplicate chain ordering.
    #[must_use]
    pub fn with_order(mut self, order: ChainOrder) -> Self {
        self.order = order;
        self
    }

    /// Stop at the first confirmed duplicate.
    #[must_use]
    pub fn with_stop_on_first(mut self, enabled: bool) -> Self {
        self.stop_on_first = enabled;
        self
    }

    /// Skip byte-for-byte confirmation.
    #[must_use]
    pub fn with_quick(mut self, enabled: bool) -> Self {
        self.quick = enabled;
        self
    }

    /// Abort on hash failures instead of skipping the file.
    #[must_use]
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Set the hasher parameters.
    #[must_use]
    pub fn with_hasher_config(mut self, hasher: HasherConfig) -> Self {
        self.hasher = hasher;
        self
    }

    /// Use a hash database at `path`.
    #[must_use]
    pub fn with_hash_db(mut self, path: impl Into<PathBuf>) -> Self {
        self.hash_db = Some(path.into());
        self
    }

    /// Set the cancellation token.
    #[must_use]
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Set the progress sink.
    #[must_use]
    pub fn with_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = Some(sink);
        self
    }
}

/// Summary statistics from a run.
#[derive(Debug, Clone, Default)]
pub struct ScanSummary {
    /// Total number of files handed to the matcher
    pub total_files: usize,
    /// Total size of those files in bytes
    pub total_size: u64,
    /// Number of duplicate groups
    pub duplicate_groups: usize,
    /// Total number of duplicate files (excluding the first of each group)
    pub duplicate_files: usize,
    /// Space taken by the duplicate files
    pub reclaimable_space: u64,
    /// Hash matches rejected by byte comparison
    pub unconfirmed_matches: usize,
    /// Hard links skipped because hard links are not considered duplicates
    pub hard_links_skipped: usize,
    /// Traversal errors passed to [`DuplicateFinder::run`]
    pub scan_errors: usize,
    /// Files that could not be hashed
    pub failed_files: Vec<PathBuf>,
    /// Hash database entries written at the end of the run
    pub cache_entries_saved: Option<usize>,
    /// Matcher counters
    pub match_stats: MatchStats,
    /// Duration of the run
    pub scan_duration: Duration,
    /// Whether the run was interrupted
    pub interrupted: bool,
}

impl ScanSummary {
    /// Returns `true` if some files were skipped because of errors.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.scan_errors > 0 || !self.failed_files.is_empty()
    }

    /// Format reclaimable space as human-readable string.
    #[must_use]
    pub fn reclaimable_display(&self) -> String {
        ByteSize::b(self.reclaimable_space).to_string()
    }

    /// Format total size as human-readable string.
    #[must_use]
    pub fn total_size_display(&self) -> String {
        ByteSize::b(self.total_size).to_string()
    }
}

/// What happened to a record handed to [`DuplicateFinder::push`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    /// No match so far; the file is now a distinct node.
    Distinct,
    /// Registered as a duplicate of the chain headed by `of`.
    Duplicate {
        /// Chain head at the time of the match
        of: RecordId,
    },
    /// A hard link that was not considered a duplicate.
    HardLinkSkipped,
    /// Hashes matched but the bytes did not.
    Unconfirmed {
        /// Record the hashes matched
        of: RecordId,
    },
    /// The file could not be hashed and was skipped.
    Failed,
    /// First duplicate found in stop-on-first mode; no more files are taken.
    Stopped {
        /// Record the new file duplicates
        existing: RecordId,
    },
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Every record was processed.
    Completed,
    /// Stop-on-first mode found a duplicate pair.
    Stopped {
        /// File already in the tree
        existing: PathBuf,
        /// File that duplicated it
        new: PathBuf,
    },
}

/// Everything a run produced.
#[derive(Debug, Clone)]
pub struct FinderReport {
    /// Duplicate groups in chain order
    pub groups: Vec<DuplicateGroup>,
    /// Run statistics
    pub summary: ScanSummary,
    /// How the run ended
    pub outcome: Outcome,
}

/// Errors that end a run.
#[derive(thiserror::Error, Debug)]
pub enum FinderError {
    /// The run was interrupted by the user (Ctrl+C).
    #[error("Scan interrupted by user")]
    Interrupted,

    /// A file could not be hashed in strict mode.
    #[error(transparent)]
    Match(#[from] MatchError),

    /// A traversal error in strict mode.
    #[error(transparent)]
    Scan(#[from] ScanError),

    /// The hash database could not be written in strict mode.
    #[error("Hash database error: {0}")]
    Cache(#[from] CacheError),
}

/// Incremental duplicate finder for one run.
pub struct DuplicateFinder {
    records: Vec<FileRecord>,
    matcher: Matcher,
    confirmer: Option<Confirmer>,
    order: ChainOrder,
    stop_on_first: bool,
    strict: bool,
    hash_db: Option<PathBuf>,
    cancel: Option<CancelToken>,
    progress: Option<Arc<dyn ProgressSink>>,
    stopped: Option<(RecordId, RecordId)>,
    summary: ScanSummary,
    started: Instant,
}

impl std::fmt::Debug for DuplicateFinder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuplicateFinder")
            .field("records", &self.records.len())
            .field("matcher", &self.matcher)
            .field("confirmer", &self.confirmer)
            .field("order", &self.order)
            .field("hash_db", &self.hash_db)
            .field("stopped", &self.stopped)
            .finish_non_exhaustive()
    }
}

impl DuplicateFinder {
    /// Create a finder and load the hash database, if one is configured.
    ///
    /// The database format does not record the partial prefix length, so a
    /// database is only used with the standard prefix length; any other
    /// length disables it with a warning.
    #[must_use]
    pub fn new(config: FinderConfig) -> Self {
        let mut hasher = FileHasher::new(config.hasher);
        if let Some(ref token) = config.cancel {
            hasher = hasher.with_cancel_token(token.clone());
        }
        if let Some(ref sink) = config.progress {
            hasher = hasher.with_progress(Arc::clone(sink));
        }

        let mut hash_db = config.hash_db;
        if hash_db.is_some() && hasher.partial_size() != PARTIAL_HASH_SIZE {
            log::warn!(
                "Hash database disabled: partial hash size {} differs from the stored size {}",
                hasher.partial_size(),
                PARTIAL_HASH_SIZE
            );
            hash_db = None;
        }

        let algorithm = hasher.algorithm();
        let mut matcher = Matcher::new(hasher, config.options);
        if let Some(ref path) = hash_db {
            matcher = matcher.with_cache(HashCache::open(path, algorithm));
        }

        let confirmer = (!config.quick).then(|| {
            let mut confirmer = Confirmer::new(config.hasher.chunk_size, config.hasher.tick_interval);
            if let Some(ref token) = config.cancel {
                confirmer = confirmer.with_cancel_token(token.clone());
            }
            if let Some(ref sink) = config.progress {
                confirmer = confirmer.with_progress(Arc::clone(sink));
            }
            confirmer
        });

        Self {
            records: Vec::new(),
            matcher,
            confirmer,
            order: config.order,
            stop_on_first: config.stop_on_first,
            strict: config.strict,
            hash_db,
            cancel: config.cancel,
            progress: config.progress,
            stopped: None,
            summary: ScanSummary::default(),
            started: Instant::now(),
        }
    }

    /// Records handed to the finder so far, in arrival order.
    #[must_use]
    pub fn records(&self) -> &[FileRecord] {
        &self.records
    }

    /// The hash database in use, if any.
    #[must_use]
    pub fn cache(&self) -> Option<&HashCache> {
        self.matcher.cache()
    }

    /// Classify one record and register it if it is a confirmed duplicate.
    ///
    /// # Errors
    ///
    /// - [`FinderError::Interrupted`] if cancellation was requested; the
    ///   hash database is saved first.
    /// - [`FinderError::Match`] if the file cannot be hashed in strict mode.
    pub fn push(&mut self, record: FileRecord) -> Result<FileStatus, FinderError> {
        if let Some((existing, _)) = self.stopped {
            return Ok(FileStatus::Stopped { existing });
        }
        if self.is_cancelled() {
            return Err(self.interrupt());
        }

        self.summary.total_files += 1;
        self.summary.total_size += record.size.unwrap_or(0);
        if let Some(ref sink) = self.progress {
            sink.on_file(self.summary.total_files, &record.path.to_string_lossy());
        }

        let id = RecordId(self.records.len());
        self.records.push(record);

        let classification = match self.matcher.classify(&mut self.records, id) {
            Ok(c) => c,
            Err(e) if e.is_interrupted() => return Err(self.interrupt()),
            Err(e) if self.strict => return Err(e.into()),
            Err(e) => {
                log::warn!("Skipping file: {}", e);
                self.summary.failed_files.push(self.records[id.index()].path.clone());
                return Ok(FileStatus::Failed);
            }
        };

        match classification {
            Classification::Inserted(_) => Ok(FileStatus::Distinct),
            Classification::HardLinkRejected { .. } => {
                self.summary.hard_links_skipped += 1;
                Ok(FileStatus::HardLinkSkipped)
            }
            Classification::Duplicate {
                of,
                node,
                hard_link,
            } => {
                if !hard_link {
                    if let Some(confirmer) = self.confirmer.as_mut() {
                        let (a, b) = (&self.records[of.index()], &self.records[id.index()]);
                        let size = b.size.unwrap_or(0);
                        if confirmer.confirm(&a.path, &b.path, size) == Confirmation::Different {
                            if self.is_cancelled() {
                                return Err(self.interrupt());
                            }
                            log::info!(
                                "Hashes match but contents differ: '{}' and '{}'",
                                a.path.display(),
                                b.path.display()
                            );
                            self.summary.unconfirmed_matches += 1;
                            return Ok(FileStatus::Unconfirmed { of });
                        }
                    }
                }

                if self.stop_on_first {
                    log::debug!(
                        "Stopping at first duplicate: '{}'",
                        self.records[id.index()].path.display()
                    );
                    self.stopped = Some((of, id));
                    return Ok(FileStatus::Stopped { existing: of });
                }

                let order = self.order;
                self.matcher
                    .register(&mut self.records, node, id, |a, b| order.compare(a, b));
                Ok(FileStatus::Duplicate { of })
            }
        }
    }

    /// Feed every item of a traversal into the finder.
    ///
    /// Traversal errors are logged and counted (or returned in strict
    /// mode). Iteration ends early when stop-on-first mode finds a pair.
    ///
    /// # Errors
    ///
    /// See [`DuplicateFinder::push`]. Also returns
    /// [`FinderError::Interrupted`] if cancellation cut the traversal short.
    pub fn run<I>(&mut self, items: I) -> Result<(), FinderError>
    where
        I: IntoIterator<Item = Result<FileRecord, ScanError>>,
    {
        for item in items {
            match item {
                Ok(record) => {
                    if let FileStatus::Stopped { .. } = self.push(record)? {
                        break;
                    }
                }
                Err(e) if self.strict => return Err(e.into()),
                Err(e) => {
                    log::warn!("{}", e);
                    self.summary.scan_errors += 1;
                }
            }
        }

        if self.is_cancelled() {
            return Err(self.interrupt());
        }
        Ok(())
    }

    /// Save the hash database and build the report.
    ///
    /// # Errors
    ///
    /// [`FinderError::Cache`] if the database cannot be written in strict
    /// mode; otherwise a write failure is logged as a warning.
    pub fn finish(mut self) -> Result<FinderReport, FinderError> {
        match self.save_cache() {
            Ok(()) => {}
            Err(e) if self.strict => return Err(e.into()),
            Err(e) => log::warn!("{}", e),
        }

        let outcome = match self.stopped {
            Some((existing, new)) => Outcome::Stopped {
                existing: self.records[existing.index()].path.clone(),
                new: self.records[new.index()].path.clone(),
            },
            None => Outcome::Completed,
        };

        let groups = collect_groups(&self.records);
        self.summary.duplicate_groups = groups.len();
        self.summary.duplicate_files = groups.iter().map(DuplicateGroup::duplicate_count).sum();
        self.summary.reclaimable_space = groups.iter().map(DuplicateGroup::wasted_space).sum();
        self.summary.match_stats = self.matcher.stats();
        self.summary.scan_duration = self.started.elapsed();

        log_stats(&self.summary);
        if let Some(ref sink) = self.progress {
            sink.on_finish();
        }

        Ok(FinderReport {
            groups,
            summary: self.summary,
            outcome,
        })
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelToken::is_cancelled)
    }

    /// Mark the run interrupted and keep whatever hashes were computed.
    fn interrupt(&mut self) -> FinderError {
        self.summary.interrupted = true;
        if let Err(e) = self.save_cache() {
            log::warn!("{}", e);
        }
        FinderError::Interrupted
    }

    fn save_cache(&mut self) -> Result<(), CacheError> {
        let (Some(path), Some(cache)) = (self.hash_db.as_ref(), self.matcher.cache_mut()) else {
            return Ok(());
        };
        match cache.save_path(path)? {
            SaveStatus::Clean => {}
            SaveStatus::Written(n) => self.summary.cache_entries_saved = Some(n),
        }
        Ok(())
    }
}

fn log_stats(summary: &ScanSummary) {
    let stats = &summary.match_stats;
    log::debug!(
        "{} files ({}), {} comparisons, {} partial hashes, {} full hashes, {} cache hits, {} stale",
        summary.total_files,
        summary.total_size_display(),
        stats.comparisons,
        stats.partial_hashes,
        stats.full_hashes,
        stats.cache_hits,
        stats.cache_stale
    );
    log::debug!(
        "{} partial eliminations, {} small file promotions, {} hard link merges, {} excluded pairs",
        stats.partial_eliminations,
        stats.small_file_promotions,
        stats.hard_link_merges,
        stats.excluded_pairs
    );
    log::info!(
        "Found {} duplicate groups ({} files, {} reclaimable) in {:.2?}",
        summary.duplicate_groups,
        summary.duplicate_files,
        summary.reclaimable_display(),
        summary.scan_duration
    );
}
