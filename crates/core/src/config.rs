//! Queue configuration via `queue.toml`
//!
//! Settings can be built in code with the `with_*` methods or loaded from a
//! TOML file next to the queue data. Unknown durability strings are rejected
//! at load time rather than on first commit.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Config file name placed next to the queue data file.
pub const CONFIG_FILE_NAME: &str = "queue.toml";

/// Table used when none is configured.
pub const DEFAULT_TABLE: &str = "queue";

/// How hard each commit pushes data to disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DurabilityMode {
    /// fsync on every commit, zero data loss
    #[default]
    Always,
    /// Commits become durable with the next fsync; a crash may lose the
    /// most recent commits but never corrupts the store
    Standard,
}

impl From<DurabilityMode> for redb::Durability {
    fn from(mode: DurabilityMode) -> Self {
        match mode {
            DurabilityMode::Always => redb::Durability::Immediate,
            DurabilityMode::Standard => redb::Durability::Eventual,
        }
    }
}

/// Queue configuration loaded from `queue.toml`.
///
/// # Example
///
/// ```toml
/// # Table holding the queue entries
/// table = "queue"
///
/// # "always" (default) = fsync every commit
/// # "standard" = eventual fsync, may lose the last commits on crash
/// durability = "always"
///
/// # Bound for the blocking queue; omit for unbounded
/// # capacity = 10000
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// redb table holding the entries
    #[serde(default = "default_table")]
    pub table: String,
    /// Commit durability
    #[serde(default)]
    pub durability: DurabilityMode,
    /// redb page cache size in bytes (engine default when absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_size: Option<usize>,
    /// Capacity of the blocking queue (unbounded when absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<u64>,
}

fn default_table() -> String {
    DEFAULT_TABLE.to_string()
}

impl Default for QueueConfig {
    fn default() -> Self {
        QueueConfig {
            table: default_table(),
            durability: DurabilityMode::Always,
            cache_size: None,
            capacity: None,
        }
    }
}

impl QueueConfig {
    /// Create config for testing
    ///
    /// Skips the per-commit fsync and uses a small page cache.
    pub fn for_testing() -> Self {
        QueueConfig {
            durability: DurabilityMode::Standard,
            cache_size: Some(4 * 1024 * 1024),
            ..Default::default()
        }
    }

    /// Set the table name
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Set durability mode
    pub fn with_durability(mut self, mode: DurabilityMode) -> Self {
        self.durability = mode;
        self
    }

    /// Set the page cache size in bytes
    pub fn with_cache_size(mut self, bytes: usize) -> Self {
        self.cache_size = Some(bytes);
        self
    }

    /// Set the blocking queue capacity
    pub fn with_capacity(mut self, capacity: u64) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.table.is_empty() {
            return Err(Error::InvalidConfig("table name must not be empty".into()));
        }
        if self.cache_size == Some(0) {
            return Err(Error::InvalidConfig("cache_size must be positive".into()));
        }
        if self.capacity == Some(0) {
            return Err(Error::InvalidConfig("capacity must be positive".into()));
        }
        Ok(())
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# Strata queue configuration
#
# Table holding the queue entries
table = "queue"

# Durability mode: "always" (default) or "standard"
#   "always"   = fsync every commit, zero data loss
#   "standard" = eventual fsync, may lose the most recent commits on crash
durability = "always"

# Page cache size in bytes (engine default when omitted)
# cache_size = 16777216

# Capacity of the blocking queue (unbounded when omitted)
# capacity = 10000
"#
    }

    /// Parse and validate config from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: QueueConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content).map_err(|e| match e {
            Error::InvalidConfig(detail) => {
                Error::InvalidConfig(format!("{}: {}", path.display(), detail))
            }
            other => other,
        })
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns `Ok(())` whether the file was created or already existed.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml())?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
