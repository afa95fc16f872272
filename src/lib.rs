//! rdupes - duplicate file finder
//!
//! Finds duplicate files by content while reading as little as possible:
//! files are compared by size, then by a hash of their first 4 KiB, then by
//! a hash of their whole content, and finally byte for byte. An optional hash
//! database lets repeated runs skip rehashing unchanged files.
//!
//! # Modules
//!
//! - [`scanner`]: File records, traversal and the chunked hasher
//! - [`cache`]: The persistent hash database
//! - [`duplicates`]: Match tree, duplicate chains, confirmation and run driver
//! - [`config`], [`cli`], [`logging`], [`error`], [`signal`], [`progress`]:
//!   The binary's shell

pub mod cache;
pub mod cli;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod logging;
pub mod progress;
pub mod scanner;
pub mod signal;

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::Context;

use cli::Cli;
use config::Config;
use duplicates::{DuplicateFinder, FinderReport, Outcome};
use error::ExitCode;
use progress::Progress;
use scanner::Walker;

/// Run the binary with parsed arguments.
///
/// # Errors
///
/// Configuration, signal handler and fatal run errors. An interrupted run
/// returns [`duplicates::FinderError::Interrupted`].
pub fn run_app(cli: Cli) -> anyhow::Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet);

    let mut config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    cli.apply_to(&mut config);
    config.validate()?;
    log::debug!("Configuration: {:?}", config);

    let token = signal::install_handler().context("Failed to install signal handler")?;

    if let Some(parent) = config.hash_db.as_ref().and_then(|p| p.parent()) {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create hash database directory {}", parent.display())
            })?;
        }
    }

    let mut finder_config = config.finder_config().with_cancel_token(token.clone());
    if !cli.quiet && !cli.no_progress {
        finder_config = finder_config.with_progress(Arc::new(Progress::new(false)));
    }

    let walker = Walker::new(cli.paths.clone(), config.walker_config()).with_cancel_token(token);
    let mut finder = DuplicateFinder::new(finder_config);
    finder.run(walker.walk())?;
    let report = finder.finish()?;

    print_report(&report, &mut io::stdout().lock()).context("Failed to write output")?;
    Ok(ExitCode::from_report(&report))
}

/// Print groups as one path per line with a blank line after each group.
///
/// # Errors
///
/// Write failures on `out`.
pub fn print_report<W: Write>(report: &FinderReport, out: &mut W) -> io::Result<()> {
    if let Outcome::Stopped { ref existing, ref new } = report.outcome {
        writeln!(out, "Duplicate found, stopping:")?;
        writeln!(out, "{}", existing.display())?;
        writeln!(out, "{}", new.display())?;
        return Ok(());
    }

    for group in &report.groups {
        for file in &group.files {
            writeln!(out, "{}", file.path.display())?;
        }
        writeln!(out)?;
    }
    Ok(())
}
