//! Cooperative cancellation for long-running hashing and confirmation.
//!
//! The core never blocks on signals. It polls a [`CancelToken`] at chunk
//! boundaries inside the hasher and the confirmation routine, so an interrupt
//! takes effect after at most one chunk read.
//!
//! # Usage
//!
//! ```rust,no_run
//! use rdupes::signal::install_handler;
//!
//! let token = install_handler().expect("Failed to install signal handler");
//!
//! // Hand clones to the hasher, confirmer and walker
//! let for_hasher = token.clone();
//!
//! if token.is_cancelled() {
//!     return;
//! }
//! ```
//!
//! When Ctrl+C is pressed the token is set, a short notice is printed to
//! stderr, and the binary exits with code 130 once the current chunk is done.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

/// Exit code for SIGINT (Ctrl+C) interruption: 128 + SIGINT.
pub const EXIT_CODE_INTERRUPTED: i32 = 130;

/// Shared cancellation flag.
///
/// Clones share the same underlying flag, so the signal handler thread can
/// set it while the single matching thread polls it.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns `true` once cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Request cancellation. Every clone observes it.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Clear the flag so the token can be reused (tests, repeated runs).
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Error type for signal handler installation.
#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    /// Failed to install the Ctrl+C handler.
    #[error("Failed to install signal handler: {0}")]
    InstallFailed(#[from] ctrlc::Error),
}

static GLOBAL_TOKEN: OnceLock<CancelToken> = OnceLock::new();

/// Install a Ctrl+C handler that cancels the returned token.
///
/// Calling this more than once returns the already-installed token with its
/// flag reset, so tests that call `run_app()` repeatedly do not fail on
/// handler registration.
///
/// # Errors
///
/// Returns [`SignalError::InstallFailed`] only when the handler could not be
/// registered and no token was installed earlier in this process.
pub fn install_handler() -> Result<CancelToken, SignalError> {
    if let Some(token) = GLOBAL_TOKEN.get() {
        token.reset();
        return Ok(token.clone());
    }

    let token = CancelToken::new();
    let flag = token.clone();

    match ctrlc::set_handler(move || {
        flag.cancel();
        let _ = writeln!(std::io::stderr(), "\nInterrupted. Finishing current chunk...");
        let _ = std::io::stderr().flush();
        log::info!("Cancellation requested by signal");
    }) {
        Ok(()) => {
            let _ = GLOBAL_TOKEN.set(token.clone());
            Ok(token)
        }
        Err(ctrlc::Error::MultipleHandlers) => {
            // Registered elsewhere in this process; manual cancellation still works.
            log::debug!("Ctrl+C handler already registered, using unhooked token");
            let fallback = GLOBAL_TOKEN.get_or_init(CancelToken::new).clone();
            fallback.reset();
            Ok(fallback)
        }
        Err(e) => Err(SignalError::InstallFailed(e)),
    }
}
