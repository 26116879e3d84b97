//! Service configuration from `shelf.toml`.
//!
//! The file is optional. A missing or blank file gives `Config::default()`,
//! and any subset of keys may be set. Keys we do not know are reported with
//! a warning, since they are usually typos.
use serde::Deserialize;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

use crate::batch::DEFAULT_CHUNK_SIZE;
use crate::feed::DEFAULT_MAX_FEED_SIZE;

/// SEC-014: Largest config file we are willing to read (1 MB)
const MAX_FILE_SIZE: u64 = 1_048_576;

const KNOWN_KEYS: &[&str] = &[
    "database_path",
    "listen_addr",
    "user_agent",
    "chunk_size",
    "schedule_interval_minutes",
    "max_feed_bytes",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large (max 1 MB)")]
    TooLarge,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite database file (`:memory:` for a throwaway database)
    pub database_path: String,

    /// Address the HTTP trigger listens on
    pub listen_addr: String,

    pub user_agent: String,

    /// Feeds processed concurrently per chunk. Values below 1 are treated as 1.
    pub chunk_size: usize,

    /// Minutes between scheduled batch runs. 0 = scheduler disabled.
    pub schedule_interval_minutes: u64,

    /// Largest feed body accepted, in bytes
    pub max_feed_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: "shelf.db".to_string(),
            listen_addr: "127.0.0.1:8787".to_string(),
            user_agent: format!("shelf-rss-batch/{}", env!("CARGO_PKG_VERSION")),
            chunk_size: DEFAULT_CHUNK_SIZE,
            schedule_interval_minutes: 60,
            max_feed_bytes: DEFAULT_MAX_FEED_SIZE,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::TooLarge`] - file is over 1 MB
    /// - [`ConfigError::Parse`] - invalid TOML or a value of the wrong type
    /// - [`ConfigError::Io`] - the file exists but cannot be read
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let Some(content) = read_capped(path)? else {
            tracing::debug!(path = %path.display(), "No config file found, using defaults");
            return Ok(Self::default());
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        let table: toml::Table = toml::from_str(&content)?;
        for key in table.keys().filter(|k| !KNOWN_KEYS.contains(&k.as_str())) {
            tracing::warn!(key = %key, "Unknown key in config file, ignoring");
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(
            path = %path.display(),
            database = %config.database_path,
            chunk_size = config.chunk_size,
            schedule_minutes = config.schedule_interval_minutes,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Chunk size clamped to at least one feed
    pub fn effective_chunk_size(&self) -> usize {
        self.chunk_size.max(1)
    }
}

/// Read at most `MAX_FILE_SIZE` bytes. `Ok(None)` when the file does not exist.
fn read_capped(path: &Path) -> Result<Option<String>, ConfigError> {
    let file = match std::fs::File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let mut content = String::new();
    file.take(MAX_FILE_SIZE + 1).read_to_string(&mut content)?;
    if content.len() as u64 > MAX_FILE_SIZE {
        return Err(ConfigError::TooLarge);
    }
    Ok(Some(content))
}
