//! Byte-for-byte confirmation of files already believed identical.
//!
//! Hash equality is only a filter. Before a pair is registered as duplicates
//! the finder can read both files in lockstep and compare every byte.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::progress::{percent_of, ProgressSink, ProgressTicker};
use crate::signal::CancelToken;

/// Outcome of a byte comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    /// Both files have identical content.
    Same,
    /// Contents differ, or the comparison could not be completed.
    Different,
}

/// Lockstep file comparer with reusable scratch buffers.
pub struct Confirmer {
    left: Vec<u8>,
    right: Vec<u8>,
    ticker: ProgressTicker,
    cancel: Option<CancelToken>,
    progress: Option<Arc<dyn ProgressSink>>,
}

impl std::fmt::Debug for Confirmer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Confirmer")
            .field("chunk_size", &self.left.len())
            .field("cancel", &self.cancel.is_some())
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

impl Confirmer {
    /// Create a confirmer reading `chunk_size` bytes per side at a time.
    #[must_use]
    pub fn new(chunk_size: usize, tick_interval: Duration) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            left: vec![0; chunk_size],
            right: vec![0; chunk_size],
            ticker: ProgressTicker::new(tick_interval),
            cancel: None,
            progress: None,
        }
    }

    /// Abort comparisons when `token` is cancelled.
    #[must_use]
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Report progress to `sink`.
    #[must_use]
    pub fn with_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = Some(sink);
        self
    }

    /// Compare two files of (supposedly) `size` bytes.
    ///
    /// An open or read failure, a length mismatch, or cancellation all
    /// yield [`Confirmation::Different`].
    pub fn confirm(&mut self, a: &Path, b: &Path, size: u64) -> Confirmation {
        log::trace!("confirm('{}', '{}')", a.display(), b.display());

        let (mut fa, mut fb) = match (File::open(a), File::open(b)) {
            (Ok(fa), Ok(fb)) => (fa, fb),
            (Err(e), _) | (_, Err(e)) => {
                log::warn!(
                    "Cannot open '{}' or '{}' for confirmation: {}",
                    a.display(),
                    b.display(),
                    e
                );
                return Confirmation::Different;
            }
        };

        let mut consumed = 0u64;
        loop {
            if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
                log::debug!("confirm: interrupted");
                return Confirmation::Different;
            }

            let (r1, r2) = match (read_full(&mut fa, &mut self.left), read_full(&mut fb, &mut self.right)) {
                (Ok(r1), Ok(r2)) => (r1, r2),
                (Err(e), _) | (_, Err(e)) => {
                    log::warn!("Read error during confirmation: {}", e);
                    return Confirmation::Different;
                }
            };

            if r1 != r2 || self.left[..r1] != self.right[..r2] {
                log::debug!(
                    "confirm: '{}' and '{}' differ near offset {}",
                    a.display(),
                    b.display(),
                    consumed
                );
                return Confirmation::Different;
            }
            if r1 == 0 {
                return Confirmation::Same;
            }

            consumed += r1 as u64;
            if self.ticker.ring() {
                if let Some(ref sink) = self.progress {
                    sink.on_phase_progress("confirm", percent_of(consumed, size));
                }
            }
        }
    }
}

/// Fill `buf` as far as the reader allows; returns the bytes read (short only at EOF).
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
