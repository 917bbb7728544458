//! Fetches the templates document, stale-while-revalidate.
//!
//! A cache hit is served immediately while a background task re-fetches the
//! document; a successful re-fetch overwrites the cache and is pushed to
//! subscribers. A failed re-fetch is logged at debug level and otherwise ignored.
//! A cache miss fetches in the foreground and propagates typed errors.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::cache::CacheStore;
use crate::error::{CatalogError, Result};
use crate::template::Document;

/// Where the raw document text comes from
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentSource: Send + Sync {
  async fn fetch(&self) -> Result<String>;
}

/// `GET` over HTTP(S)
pub struct HttpSource {
  client: reqwest::Client,
  url: String,
  user_agent: String,
}

impl HttpSource {
  /// `timeout` bounds the whole request, body included
  pub fn new(url: impl Into<String>, user_agent: impl Into<String>, timeout: Duration) -> Self {
    Self { client: http_client(timeout), url: url.into(), user_agent: user_agent.into() }
  }
}

/// HTTP client whose requests give up after `timeout`
pub fn http_client(timeout: Duration) -> reqwest::Client {
  reqwest::Client::builder().timeout(timeout).build().unwrap_or_else(|e| {
    tracing::warn!(error = %e, "could not configure HTTP client, using defaults");
    reqwest::Client::new()
  })
}

#[async_trait]
impl DocumentSource for HttpSource {
  async fn fetch(&self) -> Result<String> {
    let response = self
      .client
      .get(&self.url)
      .header("User-Agent", &self.user_agent)
      .header("Accept", "application/json")
      .send()
      .await
      .map_err(|e| CatalogError::transport(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
      return Err(CatalogError::network(status.as_u16()));
    }

    response.text().await.map_err(|e| CatalogError::transport(e.to_string()))
  }
}

/// A document on the local filesystem
pub struct FileSource {
  path: PathBuf,
}

impl FileSource {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }
}

#[async_trait]
impl DocumentSource for FileSource {
  async fn fetch(&self) -> Result<String> {
    tokio::fs::read_to_string(&self.path)
      .await
      .map_err(|e| CatalogError::io(format!("{}: {e}", self.path.display())))
  }
}

/// Pick a source for a configured location: `http(s)://` URLs go over the
/// network, `file://` URLs and anything else are read from disk.
pub fn source_for(location: &str, user_agent: &str, timeout: Duration) -> Arc<dyn DocumentSource> {
  if location.starts_with("http://") || location.starts_with("https://") {
    return Arc::new(HttpSource::new(location, user_agent, timeout));
  }

  let path = url::Url::parse(location)
    .ok()
    .filter(|u| u.scheme() == "file")
    .and_then(|u| u.to_file_path().ok())
    .unwrap_or_else(|| PathBuf::from(location));
  Arc::new(FileSource::new(path))
}

/// Where a served document came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
  Cache,
  Network,
}

/// Result of `load`
#[derive(Debug)]
pub struct Loaded {
  pub document: Document,
  pub origin: Origin,
  /// Background re-fetch started on a cache hit
  pub revalidation: Option<JoinHandle<()>>,
}

pub type Snapshot = Option<Arc<Document>>;

#[derive(Clone)]
pub struct TemplateLoader {
  source: Arc<dyn DocumentSource>,
  cache: CacheStore,
  updates: Arc<watch::Sender<Snapshot>>,
}

impl TemplateLoader {
  pub fn new(source: Arc<dyn DocumentSource>, cache: CacheStore) -> Self {
    let (updates, _) = watch::channel(None);
    Self { source, cache, updates: Arc::new(updates) }
  }

  pub fn cache(&self) -> &CacheStore {
    &self.cache
  }

  /// Newer snapshots produced by background revalidation
  pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
    self.updates.subscribe()
  }

  /// Serve from cache when possible (and revalidate), else fetch.
  ///
  /// Must be called from within a tokio runtime.
  pub async fn load(&self) -> Result<Loaded> {
    if let Some(document) = self.cache.read() {
      tracing::debug!("serving templates from cache, revalidating in background");
      let revalidation = self.spawn_revalidation();
      return Ok(Loaded { document, origin: Origin::Cache, revalidation: Some(revalidation) });
    }

    let document = self.refresh().await?;
    Ok(Loaded { document, origin: Origin::Network, revalidation: None })
  }

  /// Fetch ignoring the cache; a success is written back to it
  pub async fn refresh(&self) -> Result<Document> {
    let document = self.fetch_document().await?;
    self.cache.write(&document);
    Ok(document)
  }

  async fn fetch_document(&self) -> Result<Document> {
    let text = self.source.fetch().await?;
    Document::from_json(&text)
  }

  fn spawn_revalidation(&self) -> JoinHandle<()> {
    let loader = self.clone();
    tokio::spawn(async move {
      match loader.refresh().await {
        Ok(document) => {
          tracing::debug!("background revalidation produced a fresh document");
          loader.updates.send_replace(Some(Arc::new(document)));
        }
        Err(e) => tracing::debug!(error = %e, "background revalidation failed"),
      }
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::ManualClock;
  use mockito::Server;
  use serde_json::json;
  use tempfile::TempDir;

  const FRESH: &str = r#"{"templates": [{"title": "Nginx"}, {"title": "Redis"}]}"#;
  const TIMEOUT: Duration = Duration::from_secs(5);

  fn cached_doc() -> Document {
    Document::from_value(json!({"templates": [{"title": "Old"}]}))
  }

  fn cache_in(dir: &TempDir) -> CacheStore {
    CacheStore::new(dir.path()).with_clock(Arc::new(ManualClock::at(1_000)))
  }

  fn mock_returning(result: Result<String>, times: usize) -> Arc<MockDocumentSource> {
    let mut source = MockDocumentSource::new();
    source.expect_fetch().times(times).returning(move || result.clone());
    Arc::new(source)
  }

  #[tokio::test]
  async fn test_cache_miss_fetches_and_writes_cache() {
    let dir = TempDir::new().unwrap();
    let cache = cache_in(&dir);
    let loader = TemplateLoader::new(mock_returning(Ok(FRESH.to_string()), 1), cache.clone());

    let loaded = loader.load().await.unwrap();
    assert_eq!(loaded.origin, Origin::Network);
    assert!(loaded.revalidation.is_none());
    assert_eq!(loaded.document.templates().unwrap().len(), 2);
    assert_eq!(cache.read(), Some(loaded.document));
  }

  #[tokio::test]
  async fn test_cache_miss_propagates_network_error() {
    let dir = TempDir::new().unwrap();
    let cache = cache_in(&dir);
    let loader = TemplateLoader::new(mock_returning(Err(CatalogError::network(500)), 1), cache.clone());

    let err = loader.load().await.unwrap_err();
    assert_eq!(err, CatalogError::network(500));
    assert!(cache.read().is_none());
  }

  #[tokio::test]
  async fn test_cache_miss_parse_and_shape_errors() {
    let dir = TempDir::new().unwrap();
    let loader = TemplateLoader::new(mock_returning(Ok("<html>".to_string()), 1), cache_in(&dir));
    assert!(matches!(loader.load().await.unwrap_err(), CatalogError::Parse { .. }));

    let loader = TemplateLoader::new(mock_returning(Ok(r#"{"items": []}"#.to_string()), 1), cache_in(&dir));
    assert!(matches!(loader.load().await.unwrap_err(), CatalogError::Shape { .. }));
  }

  #[tokio::test]
  async fn test_cache_hit_serves_cached_then_publishes_fresh() {
    let dir = TempDir::new().unwrap();
    let cache = cache_in(&dir);
    cache.write(&cached_doc());

    let loader = TemplateLoader::new(mock_returning(Ok(FRESH.to_string()), 1), cache.clone());
    let mut updates = loader.subscribe();

    let loaded = loader.load().await.unwrap();
    assert_eq!(loaded.origin, Origin::Cache);
    assert_eq!(loaded.document, cached_doc());

    loaded.revalidation.unwrap().await.unwrap();
    assert!(updates.has_changed().unwrap());
    let fresh = updates.borrow_and_update().clone().unwrap();
    assert_eq!(fresh.templates().unwrap().len(), 2);
    assert_eq!(cache.read().as_ref(), Some(fresh.as_ref()));
  }

  #[tokio::test]
  async fn test_failed_revalidation_is_silent() {
    let dir = TempDir::new().unwrap();
    let cache = cache_in(&dir);
    cache.write(&cached_doc());

    let loader = TemplateLoader::new(mock_returning(Err(CatalogError::network(502)), 1), cache.clone());
    let updates = loader.subscribe();

    let loaded = loader.load().await.unwrap();
    loaded.revalidation.unwrap().await.unwrap();

    assert_eq!(loaded.document, cached_doc());
    assert!(!updates.has_changed().unwrap());
    assert_eq!(cache.read(), Some(cached_doc()));
  }

  #[tokio::test]
  async fn test_refresh_bypasses_cache() {
    let dir = TempDir::new().unwrap();
    let cache = cache_in(&dir);
    cache.write(&cached_doc());

    let loader = TemplateLoader::new(mock_returning(Ok(FRESH.to_string()), 1), cache.clone());
    let document = loader.refresh().await.unwrap();
    assert_eq!(document.templates().unwrap().len(), 2);
    assert_eq!(cache.read(), Some(document));
  }

  #[tokio::test]
  async fn test_http_source_success() {
    let mut server = Server::new_async().await;
    let _mock = server
      .mock("GET", "/templates.json")
      .with_status(200)
      .with_header("content-type", "application/json")
      .with_body(FRESH)
      .create_async()
      .await;

    let source = HttpSource::new(format!("{}/templates.json", server.url()), "dockyard-test", TIMEOUT);
    assert_eq!(source.fetch().await.unwrap(), FRESH);
  }

  #[tokio::test]
  async fn test_http_source_status_error() {
    let mut server = Server::new_async().await;
    let _mock = server.mock("GET", "/templates.json").with_status(404).create_async().await;

    let source = HttpSource::new(format!("{}/templates.json", server.url()), "dockyard-test", TIMEOUT);
    match source.fetch().await {
      Err(CatalogError::Network { status }) => assert_eq!(status, 404),
      other => panic!("Expected Network error, got: {other:?}"),
    }
  }

  #[tokio::test]
  async fn test_http_source_unreachable() {
    let source = HttpSource::new("http://127.0.0.1:1/templates.json", "dockyard-test", TIMEOUT);
    assert!(matches!(source.fetch().await, Err(CatalogError::Transport { .. })));
  }

  #[tokio::test]
  async fn test_http_source_gives_up_on_silent_server() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let _server = tokio::spawn(async move {
      let mut held = Vec::new();
      while let Ok((stream, _)) = listener.accept().await {
        held.push(stream);
      }
    });

    let source = HttpSource::new(format!("http://{addr}/templates.json"), "dockyard-test", Duration::from_millis(200));
    let result = tokio::time::timeout(Duration::from_secs(5), source.fetch()).await.expect("fetch should end");
    assert!(matches!(result, Err(CatalogError::Transport { .. })), "got {result:?}");
  }

  #[tokio::test]
  async fn test_file_source_and_source_for() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("templates.json");
    std::fs::write(&path, FRESH).unwrap();

    let plain = source_for(path.to_str().unwrap(), "ua", TIMEOUT);
    assert_eq!(plain.fetch().await.unwrap(), FRESH);

    let file_url = url::Url::from_file_path(&path).unwrap();
    let via_url = source_for(file_url.as_str(), "ua", TIMEOUT);
    assert_eq!(via_url.fetch().await.unwrap(), FRESH);

    let missing = source_for(dir.path().join("nope.json").to_str().unwrap(), "ua", TIMEOUT);
    assert!(matches!(missing.fetch().await, Err(CatalogError::Io { .. })));
  }
}
