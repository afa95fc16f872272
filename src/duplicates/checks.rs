//! Metadata pre-checks run before any file content is read.

use std::cmp::Ordering;

use super::matcher::MatchOptions;
use crate::scanner::FileRecord;

/// Why a same-size pair may never be reported as duplicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exclusion {
    /// Both files came from the same traversal root (isolate mode)
    SameRoot,
    /// The files live on different devices (one-filesystem mode)
    CrossFilesystem,
    /// Mode, owner or group differ (permissions mode)
    Permissions,
}

impl std::fmt::Display for Exclusion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SameRoot => f.write_str("same root"),
            Self::CrossFilesystem => f.write_str("different filesystems"),
            Self::Permissions => f.write_str("permissions differ"),
        }
    }
}

/// Result of comparing two records by metadata alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreCheck {
    /// Same size and nothing rules the pair out; compare content
    Compare,
    /// Sizes differ; route the new file by this ordering (new vs node)
    Route(Ordering),
    /// Same size but can never match; content still decides the route
    Excluded(Exclusion),
    /// Same device and inode
    HardLink,
}

/// Compare a tree node's record against a newly arriving record.
///
/// Sizes are compared first and never cause I/O. The hard-link check comes
/// last so that isolate mode still separates links within one root.
#[must_use]
pub fn check_conditions(node: &FileRecord, new: &FileRecord, options: &MatchOptions) -> PreCheck {
    match new.size.cmp(&node.size) {
        Ordering::Equal => {}
        other => return PreCheck::Route(other),
    }

    if options.isolate && node.user_order == new.user_order {
        return PreCheck::Excluded(Exclusion::SameRoot);
    }

    if options.one_file_system {
        if let (Some(a), Some(b)) = (node.identity, new.identity) {
            if a.dev != b.dev {
                return PreCheck::Excluded(Exclusion::CrossFilesystem);
            }
        }
    }

    if options.permissions
        && (node.mode != new.mode || node.uid != new.uid || node.gid != new.gid)
    {
        return PreCheck::Excluded(Exclusion::Permissions);
    }

    if node.is_same_inode(new) {
        return PreCheck::HardLink;
    }

    PreCheck::Compare
}
