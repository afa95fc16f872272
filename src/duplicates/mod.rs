//! Duplicate detection.
//!
//! This module provides:
//! - Metadata pre-checks that route files by size without I/O ([`checks`])
//! - The match tree with lazy partial/full hash escalation ([`matcher`])
//! - Ordered duplicate chains and the groups built from them ([`chain`])
//! - Byte-for-byte confirmation of hash matches ([`confirm`])
//! - The run driver that ties them together ([`finder`])

pub mod chain;
pub mod checks;
pub mod confirm;
pub mod finder;
pub mod matcher;

pub use chain::{chain_members, collect_groups, register_pair, ChainOrder, DuplicateGroup};
pub use checks::{check_conditions, Exclusion, PreCheck};
pub use confirm::{Confirmation, Confirmer};
pub use finder::{
    DuplicateFinder, FileStatus, FinderConfig, FinderError, FinderReport, Outcome, ScanSummary,
};
pub use matcher::{Classification, MatchError, MatchOptions, MatchStats, Matcher, NodeId};
