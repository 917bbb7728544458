//! Expiring on-disk snapshot of the templates document.
//!
//! The cache is an optimization, never a correctness requirement: unreadable,
//! expired or unparsable entries read as a miss, and failed writes are dropped.
//! Nothing else in the crate touches the cache file.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use crate::template::Document;

/// One hour
pub const CACHE_TTL_MS: i64 = 3_600_000;

pub const CACHE_FILE: &str = "templates-cache.json";

/// Overrides the cache directory (tests, sandboxes)
pub const CACHE_DIR_ENV: &str = "DOCKYARD_CACHE_DIR";

/// Source of "now" in epoch milliseconds
pub trait Clock: Send + Sync {
  fn now_millis(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now_millis(&self) -> i64 {
    chrono::Utc::now().timestamp_millis()
  }
}

/// A clock that only moves when told to
#[derive(Debug, Default)]
pub struct ManualClock {
  now: AtomicI64,
}

impl ManualClock {
  pub fn at(now: i64) -> Self {
    Self { now: AtomicI64::new(now) }
  }

  pub fn set(&self, now: i64) {
    self.now.store(now, Ordering::SeqCst);
  }

  pub fn advance(&self, millis: i64) {
    self.now.fetch_add(millis, Ordering::SeqCst);
  }
}

impl Clock for ManualClock {
  fn now_millis(&self) -> i64 {
    self.now.load(Ordering::SeqCst)
  }
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
  data: Document,
  timestamp: i64,
}

#[derive(Clone)]
pub struct CacheStore {
  path: PathBuf,
  ttl_ms: i64,
  clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for CacheStore {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("CacheStore").field("path", &self.path).field("ttl_ms", &self.ttl_ms).finish()
  }
}

impl CacheStore {
  /// A cache whose file lives in `dir`
  pub fn new(dir: impl Into<PathBuf>) -> Self {
    Self { path: dir.into().join(CACHE_FILE), ttl_ms: CACHE_TTL_MS, clock: Arc::new(SystemClock) }
  }

  pub fn with_ttl(mut self, ttl_ms: i64) -> Self {
    self.ttl_ms = ttl_ms;
    self
  }

  pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
    self.clock = clock;
    self
  }

  /// `$DOCKYARD_CACHE_DIR`, else the platform cache dir (`~/.cache/dockyard` on Linux)
  pub fn default_dir() -> PathBuf {
    if let Ok(custom) = std::env::var(CACHE_DIR_ENV) {
      return PathBuf::from(custom);
    }
    dirs::cache_dir().unwrap_or_else(std::env::temp_dir).join("dockyard")
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn ttl_ms(&self) -> i64 {
    self.ttl_ms
  }

  /// The cached document, if present, fresh and parsable
  pub fn read(&self) -> Option<Document> {
    let entry = self.read_entry()?;
    let age = self.clock.now_millis() - entry.timestamp;

    if age > self.ttl_ms {
      tracing::debug!(age_ms = age, "cache entry expired, removing");
      let _ = fs::remove_file(&self.path);
      return None;
    }

    if let Err(e) = entry.data.templates() {
      tracing::debug!(error = %e, "cached document has the wrong shape");
      return None;
    }

    Some(entry.data)
  }

  /// Store `document` stamped with the current time. Failures are swallowed.
  pub fn write(&self, document: &Document) {
    if let Err(e) = self.try_write(document) {
      tracing::debug!(path = %self.path.display(), error = %e, "could not write template cache");
    }
  }

  fn try_write(&self, document: &Document) -> anyhow::Result<()> {
    if let Some(parent) = self.path.parent() {
      fs::create_dir_all(parent)?;
    }
    let entry = CacheEntry { data: document.clone(), timestamp: self.clock.now_millis() };
    fs::write(&self.path, serde_json::to_vec(&entry)?)?;
    Ok(())
  }

  /// Age of the stored entry in milliseconds, fresh or not
  pub fn age_millis(&self) -> Option<i64> {
    self.read_entry().map(|entry| self.clock.now_millis() - entry.timestamp)
  }

  /// Remove the entry; returns whether there was one
  pub fn clear(&self) -> std::io::Result<bool> {
    match fs::remove_file(&self.path) {
      Ok(()) => Ok(true),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
      Err(e) => Err(e),
    }
  }

  fn read_entry(&self) -> Option<CacheEntry> {
    let raw = fs::read(&self.path).ok()?;
    match serde_json::from_slice(&raw) {
      Ok(entry) => Some(entry),
      Err(e) => {
        tracing::debug!(error = %e, "ignoring unparsable cache entry");
        None
      }
    }
  }
}
