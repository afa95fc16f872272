//! Progress reporting: a polled ticker and an `indicatif` renderer.
//!
//! The hasher and the confirmer do not push progress on every chunk. They ask
//! a [`ProgressTicker`] whether its interval has elapsed (the "alarm ring") and
//! only then report a percentage to the [`ProgressSink`].

use std::sync::Mutex;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};

/// Default interval between progress reports.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Receiver of progress updates.
///
/// Implementations must be cheap; they are called from inside the chunk loop.
pub trait ProgressSink: Send + Sync {
    /// Called when a running phase reaches `percent` of the current file.
    ///
    /// # Arguments
    ///
    /// * `phase` - `"hashing"` or `"confirm"`
    /// * `percent` - Bytes consumed relative to the file size (0-100)
    fn on_phase_progress(&self, phase: &str, percent: u8);

    /// Called once per record handed to the matcher.
    fn on_file(&self, _count: usize, _path: &str) {}

    /// Called when the run is complete.
    fn on_finish(&self) {}
}

/// Timer-driven tick, polled at chunk boundaries.
#[derive(Debug, Clone)]
pub struct ProgressTicker {
    interval: Duration,
    last: Instant,
}

impl ProgressTicker {
    /// Create a ticker that rings at most once per `interval`.
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Instant::now(),
        }
    }

    /// Returns `true` (and rearms) when the interval has elapsed.
    ///
    /// A zero interval rings on every poll.
    pub fn ring(&mut self) -> bool {
        let now = Instant::now();
        if now.duration_since(self.last) >= self.interval {
            self.last = now;
            true
        } else {
            false
        }
    }
}

impl Default for ProgressTicker {
    fn default() -> Self {
        Self::new(DEFAULT_TICK_INTERVAL)
    }
}

/// Compute `consumed * 100 / total`, clamped to 100. A zero total is 100%.
#[must_use]
pub fn percent_of(consumed: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    let pct = (u128::from(consumed) * 100) / u128::from(total);
    pct.min(100) as u8
}

/// Progress reporter using an `indicatif` spinner.
///
/// Shows the number of files examined and, while a large file is being read,
/// the phase and percentage.
pub struct Progress {
    bar: Option<ProgressBar>,
    files: Mutex<usize>,
}

impl Progress {
    /// Create a new progress reporter. When `quiet` is set nothing is drawn.
    ///
    /// # Examples
    ///
    /// ```
    /// use rdupes::progress::Progress;
    ///
    /// let progress = Progress::new(true);
    /// ```
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        let bar = if quiet {
            None
        } else {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner())
                    .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ "),
            );
            pb.enable_steady_tick(Duration::from_millis(100));
            Some(pb)
        };
        Self {
            bar,
            files: Mutex::new(0),
        }
    }

    fn file_count(&self) -> usize {
        self.files.lock().map(|n| *n).unwrap_or(0)
    }
}

impl ProgressSink for Progress {
    fn on_phase_progress(&self, phase: &str, percent: u8) {
        if let Some(ref pb) = self.bar {
            pb.set_message(format!(
                "{} files, {} {}%",
                self.file_count(),
                phase,
                percent
            ));
        }
    }

    fn on_file(&self, count: usize, path: &str) {
        if let Ok(mut files) = self.files.lock() {
            *files = count;
        }
        if let Some(ref pb) = self.bar {
            pb.set_message(format!("{} files, {}", count, truncate_path(path, 40)));
        }
    }

    fn on_finish(&self) {
        if let Some(ref pb) = self.bar {
            pb.finish_and_clear();
        }
    }
}

/// Truncate a path for display in the progress line.
fn truncate_path(path: &str, max_len: usize) -> String {
    if path.chars().count() <= max_len {
        return path.to_string();
    }

    let file_name = std::path::Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let name_len = file_name.chars().count();
    if name_len >= max_len {
        let tail: String = file_name.chars().skip(name_len + 3 - max_len).collect();
        return format!("...{}", tail);
    }

    format!(".../{}", file_name)
}
