//! Exit codes.

use crate::duplicates::{FinderReport, Outcome};

/// Exit codes for the rdupes binary.
///
/// - 0: Success (completed normally, duplicates found)
/// - 1: General error (unexpected failure)
/// - 2: No duplicates found (completed normally, no duplicates)
/// - 3: Partial success (duplicates found, but some files were unreadable)
/// - 130: Interrupted by user (Ctrl+C)
/// - 255: A duplicate was found in stop-on-first mode (`-e`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    /// Success: duplicates were found.
    Success = 0,
    /// General error: an unexpected error occurred.
    GeneralError = 1,
    /// No duplicates: the run completed without finding any.
    NoDuplicates = 2,
    /// Partial success: duplicates were found but some files could not be
    /// scanned or hashed.
    PartialSuccess = 3,
    /// Interrupted: the run was interrupted by the user.
    Interrupted = 130,
    /// Stop-on-first mode found a duplicate.
    DuplicateFound = 255,
}

impl ExitCode {
    /// Get the numeric exit code.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Get the machine-readable code prefix.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "RD000",
            Self::GeneralError => "RD001",
            Self::NoDuplicates => "RD002",
            Self::PartialSuccess => "RD003",
            Self::Interrupted => "RD130",
            Self::DuplicateFound => "RD255",
        }
    }

    /// Exit code for a finished run.
    #[must_use]
    pub fn from_report(report: &FinderReport) -> Self {
        if let Outcome::Stopped { .. } = report.outcome {
            Self::DuplicateFound
        } else if report.summary.interrupted {
            Self::Interrupted
        } else if report.groups.is_empty() {
            Self::NoDuplicates
        } else if report.summary.has_errors() {
            Self::PartialSuccess
        } else {
            Self::Success
        }
    }
}
