//! Docker Hub and GitHub metadata for a templates document.
//!
//! Each template with a Docker Hub image gets a `metadata` block (pulls,
//! stars, repository figures). Lookups that fail are reported and skipped;
//! one bad template never aborts the run.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use std::time::Duration;

use crate::error::{CatalogError, Result};
use crate::loader::http_client;
use crate::template::{DockerMetadata, Document, GithubMetadata, Metadata};

pub const DOCKER_HUB_API: &str = "https://hub.docker.com";
pub const GITHUB_API: &str = "https://api.github.com";
pub const GITHUB_TOKEN_ENV: &str = "GITHUB_TOKEN";

const OTHER_REGISTRIES: [&str; 5] = ["ghcr.io", "gcr.io", "quay.io", "mcr.microsoft.com", "lscr.io"];

static GITHUB_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
  [r#"github\.com/([^/\s]+)/([^/\s\)"]+)"#, r#"https?://([^/]+)\.github\.io/([^/\s\)"]+)"#]
    .iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
});

/// A Docker Hub image reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
  pub namespace: String,
  pub name: String,
  pub tag: String,
}

impl ImageRef {
  pub fn is_official(&self) -> bool {
    self.namespace == "library"
  }

  pub fn hub_url(&self) -> String {
    if self.is_official() {
      format!("https://hub.docker.com/_/{}", self.name)
    } else {
      format!("https://hub.docker.com/r/{}/{}", self.namespace, self.name)
    }
  }
}

/// Split `image` into namespace, name and tag; `None` for other registries
pub fn parse_image_name(image: &str) -> Option<ImageRef> {
  let image = image.trim();
  if image.is_empty() || OTHER_REGISTRIES.iter().any(|r| image.contains(r)) {
    return None;
  }
  if let Some((first, _)) = image.split_once('/') {
    if first.contains('.') {
      return None;
    }
  }

  let (repository, tag) = match image.rsplit_once(':') {
    Some((repository, tag)) => (repository, tag),
    None => (image, "latest"),
  };
  let (namespace, name) = repository.split_once('/').unwrap_or(("library", repository));

  Some(ImageRef { namespace: namespace.to_string(), name: name.to_string(), tag: tag.to_string() })
}

/// `1.2M`, `3.4K`, or the plain number
pub fn format_number(n: u64) -> String {
  if n >= 1_000_000 {
    format!("{:.1}M", n as f64 / 1_000_000.0)
  } else if n >= 1_000 {
    format!("{:.1}K", n as f64 / 1_000.0)
  } else {
    n.to_string()
  }
}

/// Owner and repository named by a GitHub link in `description`, falling
/// back to `linuxserver/docker-<name>` for linuxserver images
pub fn extract_github_repo(description: &str, image: &str) -> Option<(String, String)> {
  for re in GITHUB_PATTERNS.iter() {
    if let Some(caps) = re.captures(description) {
      let owner = caps[1].to_string();
      let repo = caps[2].trim_end_matches('/');
      let repo = repo.strip_suffix(".git").unwrap_or(repo).trim_end_matches('/');
      return Some((owner, repo.to_string()));
    }
  }

  parse_image_name(image)
    .filter(|image| image.namespace == "linuxserver")
    .map(|image| ("linuxserver".to_string(), format!("docker-{}", image.name)))
}

/// Docker Hub repository figures
#[derive(Debug, Clone, PartialEq)]
pub struct HubInfo {
  pub description: String,
  pub metadata: DockerMetadata,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
  pub enriched: usize,
  pub total: usize,
}

pub struct Enricher {
  client: reqwest::Client,
  docker_api: String,
  github_api: String,
  github_token: Option<String>,
  user_agent: String,
  delay: Duration,
}

impl Enricher {
  pub fn new(user_agent: impl Into<String>, delay: Duration, timeout: Duration) -> Self {
    Self {
      client: http_client(timeout),
      docker_api: DOCKER_HUB_API.to_string(),
      github_api: GITHUB_API.to_string(),
      github_token: std::env::var(GITHUB_TOKEN_ENV).ok().filter(|t| !t.is_empty()),
      user_agent: user_agent.into(),
      delay,
    }
  }

  /// Point both lookups at other hosts
  pub fn with_endpoints(mut self, docker_api: impl Into<String>, github_api: impl Into<String>) -> Self {
    self.docker_api = docker_api.into().trim_end_matches('/').to_string();
    self.github_api = github_api.into().trim_end_matches('/').to_string();
    self
  }

  pub fn with_token(mut self, token: Option<String>) -> Self {
    self.github_token = token;
    self
  }

  /// GET `url` as JSON; `None` on 404, failures and bad payloads
  async fn get_json(&self, url: &str, authorize: bool) -> Option<Value> {
    let mut request = self.client.get(url).header("User-Agent", &self.user_agent);
    if authorize {
      if let Some(token) = &self.github_token {
        request = request.header("Authorization", format!("token {token}"));
      }
    }

    let response = match request.send().await {
      Ok(response) => response,
      Err(e) => {
        lookout::warn!("  Request failed for {url}: {e}");
        return None;
      }
    };

    let status = response.status();
    if status == reqwest::StatusCode::NOT_FOUND {
      tracing::debug!(url, "not found");
      return None;
    }
    if !status.is_success() {
      lookout::warn!("  HTTP {} for {url}", status.as_u16());
      return None;
    }

    response.json::<Value>().await.ok()
  }

  async fn pause(&self) {
    if !self.delay.is_zero() {
      tokio::time::sleep(self.delay).await;
    }
  }

  pub async fn docker_hub(&self, image: &ImageRef) -> Option<HubInfo> {
    let url = format!("{}/v2/repositories/{}/{}/", self.docker_api, image.namespace, image.name);
    let data = self.get_json(&url, false).await?;

    let pulls = data.get("pull_count").and_then(Value::as_u64).unwrap_or(0);
    Some(HubInfo {
      description: text_field(&data, "description"),
      metadata: DockerMetadata {
        pulls,
        pulls_formatted: format_number(pulls),
        stars: data.get("star_count").and_then(Value::as_u64).unwrap_or(0),
        hub_url: image.hub_url(),
        last_updated: text_field(&data, "last_updated"),
        is_official: image.is_official(),
      },
    })
  }

  pub async fn github(&self, owner: &str, repo: &str) -> Option<GithubMetadata> {
    let url = format!("{}/repos/{owner}/{repo}", self.github_api);
    let data = self.get_json(&url, true).await?;

    let count = |key: &str| data.get(key).and_then(Value::as_u64).unwrap_or(0);
    Some(GithubMetadata {
      url: text_field(&data, "html_url"),
      stars: count("stargazers_count"),
      forks: count("forks_count"),
      issues: count("open_issues_count"),
      updated: text_field(&data, "updated_at"),
      license: data
        .get("license")
        .and_then(|l| l.get("spdx_id"))
        .and_then(Value::as_str)
        .map(str::to_string),
    })
  }

  /// Add a `metadata` block to one template object; returns whether one was added
  pub async fn enrich_template(&self, template: &mut Map<String, Value>) -> bool {
    let image = template.get("image").and_then(Value::as_str).unwrap_or("").to_string();
    let Some(image_ref) = parse_image_name(&image) else {
      return false;
    };

    lookout::verbose!("  Fetching: {}/{}", image_ref.namespace, image_ref.name);

    let hub = self.docker_hub(&image_ref).await;
    self.pause().await;

    let mut metadata = Metadata::default();
    let mut hub_description = String::new();
    if let Some(hub) = hub {
      let has_description = template.get("description").and_then(Value::as_str).is_some_and(|d| !d.is_empty());
      if !hub.description.is_empty() && !has_description {
        template.insert("description".to_string(), Value::String(hub.description.clone()));
      }
      hub_description = hub.description;
      metadata.docker = Some(hub.metadata);
    }

    if let Some((owner, repo)) = extract_github_repo(&hub_description, &image) {
      metadata.github = self.github(&owner, &repo).await;
      self.pause().await;
    }

    if metadata.is_empty() {
      return false;
    }
    match serde_json::to_value(&metadata) {
      Ok(value) => {
        template.insert("metadata".to_string(), value);
        true
      }
      Err(e) => {
        tracing::debug!(error = %e, "could not serialize metadata");
        false
      }
    }
  }

  /// Enrich every template of `document` and stamp `enriched_at`
  pub async fn enrich_document(&self, document: Document) -> Result<(Document, Summary)> {
    let total = document.templates()?.len();
    let mut value = document.into_value();
    let mut summary = Summary { enriched: 0, total };

    let templates = value
      .get_mut("templates")
      .and_then(Value::as_array_mut)
      .ok_or_else(|| CatalogError::shape("document has no templates array"))?;

    for (i, template) in templates.iter_mut().enumerate() {
      let Some(object) = template.as_object_mut() else {
        lookout::warn!("[{}/{total}] skipped: not an object", i + 1);
        continue;
      };
      let title = ["title", "name"]
        .iter()
        .find_map(|key| object.get(*key).and_then(Value::as_str))
        .unwrap_or("Unknown")
        .to_string();
      lookout::info!("[{}/{total}] {title}", i + 1);

      if self.enrich_template(object).await {
        summary.enriched += 1;
      }
    }

    if let Some(root) = value.as_object_mut() {
      root.insert("enriched_at".to_string(), Value::String(chrono::Utc::now().to_rfc3339()));
    }

    Ok((Document::from_value(value), summary))
  }
}

fn text_field(data: &Value, key: &str) -> String {
  data.get(key).and_then(Value::as_str).unwrap_or("").to_string()
}
