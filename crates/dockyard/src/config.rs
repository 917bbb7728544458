//! Configuration for dockyard
//!
//! Loaded from JSON. Every field has a default, so a partial file (or no file
//! at all) is fine.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::{CacheStore, CACHE_TTL_MS};

/// Public mirror of the templates document
pub const DEFAULT_SOURCE: &str =
  "https://raw.githubusercontent.com/Lissy93/portainer-templates/main/templates.json";

/// Overrides `source` from the config file
pub const SOURCE_ENV: &str = "DOCKYARD_SOURCE";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
  /// URL or file path of the templates document
  #[serde(default = "default_source")]
  pub source: String,
  /// Cache directory; platform cache dir when unset
  #[serde(default)]
  pub cache_dir: Option<PathBuf>,
  #[serde(default = "default_cache_ttl_ms")]
  pub cache_ttl_ms: i64,
  /// Quiet period before a typed filter is applied in `browse`
  #[serde(default = "default_debounce_ms")]
  pub debounce_ms: u64,
  /// Pause after each enrichment lookup
  #[serde(default = "default_request_delay_ms")]
  pub request_delay_ms: u64,
  #[serde(default = "default_user_agent")]
  pub user_agent: String,
  /// Limit on any one HTTP request
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

fn default_source() -> String {
  DEFAULT_SOURCE.to_string()
}
fn default_cache_ttl_ms() -> i64 {
  CACHE_TTL_MS
}
fn default_debounce_ms() -> u64 {
  150
}
fn default_request_delay_ms() -> u64 {
  500
}
fn default_user_agent() -> String {
  format!("dockyard/{}", env!("CARGO_PKG_VERSION"))
}
fn default_timeout_secs() -> u64 {
  10
}

impl Default for Config {
  fn default() -> Self {
    Self {
      source: default_source(),
      cache_dir: None,
      cache_ttl_ms: default_cache_ttl_ms(),
      debounce_ms: default_debounce_ms(),
      request_delay_ms: default_request_delay_ms(),
      user_agent: default_user_agent(),
      timeout_secs: default_timeout_secs(),
    }
  }
}

impl Config {
  pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
      .with_context(|| format!("failed to read config file {}", path.display()))?;
    let config: Config = serde_json::from_str(&content)
      .with_context(|| format!("invalid config file {}", path.display()))?;
    Ok(config)
  }

  /// Explicit path, else the first existing candidate, else defaults.
  /// `DOCKYARD_SOURCE` is applied on top.
  pub fn load(explicit: Option<&Path>) -> Result<Self> {
    let mut config = match explicit {
      Some(path) => Self::load_from_file(path)?,
      None => match Self::candidate_paths().into_iter().find(|p| p.exists()) {
        Some(path) => Self::load_from_file(path)?,
        None => Config::default(),
      },
    };

    if let Ok(source) = std::env::var(SOURCE_ENV) {
      if !source.trim().is_empty() {
        config.source = source;
      }
    }

    Ok(config)
  }

  fn candidate_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("dockyard.json"), PathBuf::from(".dockyard.json")];
    if let Some(config_dir) = dirs::config_dir() {
      paths.push(config_dir.join("dockyard").join("config.json"));
    }
    paths
  }

  pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
    let content = serde_json::to_string_pretty(self)?;
    std::fs::write(path, content)?;
    Ok(())
  }

  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.timeout_secs)
  }

  /// The cache this configuration describes
  pub fn cache_store(&self) -> CacheStore {
    let dir = self.cache_dir.clone().unwrap_or_else(CacheStore::default_dir);
    CacheStore::new(dir).with_ttl(self.cache_ttl_ms)
  }
}
