//! Logging setup for rdupes.
//!
//! Uses the `log` facade with an `env_logger` backend. The level comes from
//! (highest priority first):
//!
//! 1. The `RUST_LOG` environment variable
//! 2. `--quiet` (errors only) or `-v`/`-vv` (debug/trace)
//! 3. Default: warnings, so that normal output is just the duplicate list
//!
//! Log output goes to stderr; duplicate groups go to stdout.
//!
//! # Example
//!
//! ```rust,no_run
//! use rdupes::logging::init_logging;
//!
//! init_logging(1, false);
//! log::debug!("matcher ready");
//! ```

use env_logger::Builder;
use log::LevelFilter;
use std::env;
use std::io::Write;

/// Initialize the logger from the CLI verbosity flags.
///
/// Calling this more than once is harmless; later calls are ignored.
///
/// # Arguments
///
/// * `verbose` - Verbosity count from CLI (0=warn, 1=debug, 2+=trace)
/// * `quiet` - If true, only show errors (overridden by RUST_LOG)
pub fn init_logging(verbose: u8, quiet: bool) {
    let use_env = env::var("RUST_LOG").is_ok();

    let mut builder = Builder::new();
    if use_env {
        builder.parse_default_env();
    } else {
        builder.filter_level(determine_level(verbose, quiet));
    }

    builder.format(move |buf, record| {
        let level = record.level();
        let style = buf.default_level_style(level);
        if verbose >= 1 {
            writeln!(
                buf,
                "{} {style}{:<5}{style:#} [{}] {}",
                buf.timestamp_millis(),
                level,
                record.module_path().unwrap_or("unknown"),
                record.args()
            )
        } else {
            writeln!(buf, "{style}{:<5}{style:#} {}", level, record.args())
        }
    });

    if builder.try_init().is_ok() {
        log::debug!("Logging initialized at level {}", log::max_level());
    }
}

/// Map the CLI flags to a level filter.
fn determine_level(verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}
