//! Layered application configuration.
//!
//! Settings are merged with `figment`, later layers overriding earlier ones:
//!
//! 1. Built-in defaults ([`Config::default`])
//! 2. TOML config file (`--config`, or the platform config directory)
//! 3. Environment variables prefixed with `RDUPES_` (e.g. `RDUPES_CHUNK_SIZE`)
//! 4. Command-line flags (applied by the binary)

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::duplicates::{ChainOrder, FinderConfig, MatchOptions};
use crate::scanner::{HashAlgorithm, HasherConfig, WalkerConfig, DEFAULT_CHUNK_SIZE, PARTIAL_HASH_SIZE};

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "RDUPES_";

/// Errors from loading or validating configuration.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// A layer could not be read or did not match the schema.
    #[error("Invalid configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    /// A value is out of range.
    #[error("Invalid value for {field}: {reason}")]
    Invalid {
        /// Offending field
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Bytes read per I/O call while hashing and confirming
    pub chunk_size: usize,
    /// Length of the hashed prefix used as a quick filter
    pub partial_hash_size: u64,
    /// Hash algorithm
    pub hash_algorithm: HashAlgorithm,
    /// Hash database file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash_db: Option<PathBuf>,
    /// Treat hard links as duplicates
    pub consider_hardlinks: bool,
    /// Never match across filesystems
    pub one_file_system: bool,
    /// Never match files under the same root
    pub isolate: bool,
    /// Never match files with different permissions or owners
    pub permissions: bool,
    /// Stop at the first duplicate
    pub stop_on_first: bool,
    /// Trust partial hashes
    pub partial_only: bool,
    /// Skip byte-for-byte confirmation
    pub quick: bool,
    /// Ordering within a duplicate group
    pub order: ChainOrder,
    /// Abort on unreadable files
    pub strict: bool,
    /// Consider zero-length files
    pub include_empty: bool,
    /// Follow symbolic links
    pub follow_symlinks: bool,
    /// Descend into subdirectories
    pub recurse: bool,
    /// Minimum time between progress updates
    pub progress_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            partial_hash_size: PARTIAL_HASH_SIZE,
            hash_algorithm: HashAlgorithm::default(),
            hash_db: None,
            consider_hardlinks: false,
            one_file_system: false,
            isolate: false,
            permissions: false,
            stop_on_first: false,
            partial_only: false,
            quick: false,
            order: ChainOrder::default(),
            strict: false,
            include_empty: false,
            follow_symlinks: false,
            recurse: false,
            progress_interval_ms: 1000,
        }
    }
}

impl Config {
    /// Load defaults, the config file and the environment.
    ///
    /// `file` overrides the default config location. A missing file is not
    /// an error.
    ///
    /// # Errors
    ///
    /// [`ConfigError`] if a layer cannot be parsed or a value is invalid.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        match file.map(Path::to_path_buf).or_else(default_config_path) {
            Some(path) => {
                log::debug!("Reading configuration from {}", path.display());
                figment = figment.merge(Toml::file(path));
            }
            None => log::debug!("No configuration file location"),
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX));

        let config: Self = figment.extract().map_err(Box::new)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::Invalid {
                field: "chunk_size",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.partial_hash_size == 0 {
            return Err(ConfigError::Invalid {
                field: "partial_hash_size",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Matching flags.
    #[must_use]
    pub fn match_options(&self) -> MatchOptions {
        MatchOptions {
            consider_hardlinks: self.consider_hardlinks,
            one_file_system: self.one_file_system,
            isolate: self.isolate,
            permissions: self.permissions,
            partial_only: self.partial_only,
        }
    }

    /// Hasher parameters.
    #[must_use]
    pub fn hasher_config(&self) -> HasherConfig {
        HasherConfig {
            algorithm: self.hash_algorithm,
            partial_size: self.partial_hash_size,
            chunk_size: self.chunk_size,
            tick_interval: Duration::from_millis(self.progress_interval_ms),
        }
    }

    /// Traversal settings.
    #[must_use]
    pub fn walker_config(&self) -> WalkerConfig {
        WalkerConfig {
            recurse: self.recurse,
            follow_symlinks: self.follow_symlinks,
            include_empty: self.include_empty,
        }
    }

    /// Finder settings; cancellation and progress are attached by the caller.
    #[must_use]
    pub fn finder_config(&self) -> FinderConfig {
        let mut config = FinderConfig::default()
            .with_options(self.match_options())
            .with_order(self.order)
            .with_stop_on_first(self.stop_on_first)
            .with_quick(self.quick)
            .with_strict(self.strict)
            .with_hasher_config(self.hasher_config());
        if let Some(ref path) = self.hash_db {
            config = config.with_hash_db(path);
        }
        config
    }
}

/// Platform config file location (e.g. `~/.config/rdupes/config.toml`).
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "rdupes").map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Platform hash database location (e.g. `~/.cache/rdupes/hashdb.txt`).
#[must_use]
pub fn default_hash_db_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "rdupes").map(|dirs| dirs.cache_dir().join("hashdb.txt"))
}
