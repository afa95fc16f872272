//! Directory walker built on `walkdir`.
//!
//! # Overview
//!
//! [`Walker`] turns the command-line roots into a stream of [`FileRecord`]s,
//! in the order the matcher will see them. Each record carries the index of
//! the root it came from (`user_order`), which the isolate check and the
//! chain ordering use.
//!
//! Only regular files are yielded. Children are visited in file-name order so
//! that two runs over the same tree build the same tree in the matcher.
//!
//! # Example
//!
//! ```no_run
//! use rdupes::scanner::{Walker, WalkerConfig};
//! use std::path::PathBuf;
//!
//! let walker = Walker::new(vec![PathBuf::from(".")], WalkerConfig::default());
//! let files: Vec<_> = walker.walk().filter_map(Result::ok).collect();
//! println!("Found {} files", files.len());
//! ```

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::{FileRecord, ScanError, WalkerConfig};
use crate::signal::CancelToken;

/// Directory walker over one or more roots.
#[derive(Debug)]
pub struct Walker {
    roots: Vec<PathBuf>,
    config: WalkerConfig,
    cancel: Option<CancelToken>,
}

impl Walker {
    /// Create a walker for the given roots.
    ///
    /// # Arguments
    ///
    /// * `roots` - Directories (or single files) to scan, in command-line order
    /// * `config` - Walker configuration options
    #[must_use]
    pub fn new(roots: Vec<PathBuf>, config: WalkerConfig) -> Self {
        Self {
            roots,
            config,
            cancel: None,
        }
    }

    /// Stop yielding entries once this token is cancelled.
    #[must_use]
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelToken::is_cancelled)
    }

    /// Walk every root in order, yielding file records.
    ///
    /// Errors are yielded as [`ScanError`] values rather than stopping
    /// iteration.
    pub fn walk(&self) -> impl Iterator<Item = Result<FileRecord, ScanError>> + '_ {
        self.roots
            .iter()
            .enumerate()
            .flat_map(move |(order, root)| self.walk_root(root, order))
    }

    fn walk_root<'a>(
        &'a self,
        root: &'a Path,
        order: usize,
    ) -> impl Iterator<Item = Result<FileRecord, ScanError>> + 'a {
        let mut walk_dir = WalkDir::new(root)
            .follow_links(self.config.follow_symlinks)
            .sort_by_file_name();
        if !self.config.recurse {
            walk_dir = walk_dir.max_depth(1);
        }

        walk_dir
            .into_iter()
            .take_while(move |_| {
                if self.is_cancelled() {
                    log::debug!("Walker: cancellation requested, stopping iteration");
                    false
                } else {
                    true
                }
            })
            .filter_map(move |entry_result| match entry_result {
                Ok(entry) => {
                    let file_type = entry.file_type();
                    if file_type.is_dir() {
                        return None;
                    }
                    if file_type.is_symlink() && !self.config.follow_symlinks {
                        log::trace!("Skipping symlink: {}", entry.path().display());
                        return None;
                    }

                    let metadata = match entry.metadata() {
                        Ok(m) => m,
                        Err(e) => {
                            let path = entry.path().to_path_buf();
                            return Some(Err(self.handle_walk_error(path, e)));
                        }
                    };
                    if !metadata.is_file() {
                        log::trace!("Skipping non-regular file: {}", entry.path().display());
                        return None;
                    }
                    if metadata.len() == 0 && !self.config.include_empty {
                        log::debug!("Skipping empty file: {}", entry.path().display());
                        return None;
                    }

                    Some(Ok(FileRecord::from_metadata(
                        entry.into_path(),
                        &metadata,
                        order,
                    )))
                }
                Err(e) => {
                    let path = e
                        .path()
                        .map_or_else(|| root.to_path_buf(), Path::to_path_buf);
                    Some(Err(self.handle_walk_error(path, e)))
                }
            })
    }

    fn handle_walk_error(&self, path: PathBuf, error: walkdir::Error) -> ScanError {
        use std::io::ErrorKind;

        if let Some(ancestor) = error.loop_ancestor() {
            log::warn!(
                "Symlink loop: {} points back to {}",
                path.display(),
                ancestor.display()
            );
        }

        match error.io_error().map(std::io::Error::kind) {
            Some(ErrorKind::PermissionDenied) => {
                log::warn!("Permission denied: {}", path.display());
                ScanError::PermissionDenied(path)
            }
            Some(ErrorKind::NotFound) => {
                log::debug!("File not found (may have been deleted): {}", path.display());
                ScanError::NotFound(path)
            }
            _ => {
                log::warn!("I/O error for {}: {}", path.display(), error);
                ScanError::Io {
                    path,
                    source: std::io::Error::other(error.to_string()),
                }
            }
        }
    }
}
