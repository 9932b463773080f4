//! TOML configuration.
//!
//! ```toml
//! [db]
//! path = "./data/hsearch.sqlite"
//!
//! [search]
//! target_kind = "collection"
//! max_depth = 2
//! language = "en"
//! page_size = 25
//! degrade_on_graph_error = true
//!
//! [cache]
//! ttl_secs = 86400
//! clear_scope = "session"
//!
//! [log]
//! level = "info"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub search: SearchConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    /// Kind of entity a search returns (e.g. the collection-item kind).
    pub target_kind: String,
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Fall back to direct hits when the graph cannot be read.
    #[serde(default = "default_true")]
    pub degrade_on_graph_error: bool,
}

fn default_max_depth() -> usize {
    2
}
fn default_language() -> String {
    "en".to_string()
}
fn default_page_size() -> usize {
    25
}
fn default_true() -> bool {
    true
}

/// Which cache entries an unfiltered search removes.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ClearScope {
    /// Only the searching session's entry.
    #[default]
    Session,
    /// Every session's entry.
    All,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default)]
    pub clear_scope: ClearScope,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            clear_scope: ClearScope::default(),
        }
    }
}

fn default_ttl_secs() -> u64 {
    24 * 60 * 60
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    /// `tracing_subscriber::EnvFilter` directive. `RUST_LOG` takes precedence.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.search.target_kind.trim().is_empty() {
        anyhow::bail!("search.target_kind must not be empty");
    }

    if config.search.language.trim().is_empty() {
        anyhow::bail!("search.language must not be empty");
    }

    if config.search.page_size == 0 {
        anyhow::bail!("search.page_size must be >= 1");
    }

    if config.cache.ttl_secs == 0 {
        anyhow::bail!("cache.ttl_secs must be > 0");
    }

    Ok(())
}
