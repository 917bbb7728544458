//! Template document and record schema.
//!
//! Records arrive semi-structured, so every field is optional here and the
//! defaulting rules live in the accessors below rather than at the call sites:
//!
//! - `name` falls back to `title`, then to `template`
//! - an unknown or missing `type` displays as a container
//! - an env entry with neither `default` nor `preset` is required
//!
//! Fields this schema does not know about are kept in `extra` so a document can
//! be rewritten (by the enricher) without losing data. A field of the wrong
//! type is dropped on its own (see `Template::read`); the rest of its record
//! survives.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::error::{CatalogError, Result};

/// Name used when a record has neither `name` nor `title`
pub const FALLBACK_NAME: &str = "template";

/// The raw templates document: `{ "templates": [ ... ] }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(Value);

impl Document {
  /// Parse and shape-check a document
  pub fn from_json(text: &str) -> Result<Self> {
    let value: Value = serde_json::from_str(text).map_err(|e| CatalogError::parse(e.to_string()))?;
    let document = Self(value);
    document.templates()?;
    Ok(document)
  }

  /// Wrap an already-parsed value without checking its shape
  pub fn from_value(value: Value) -> Self {
    Self(value)
  }

  /// The `templates` sequence, or a shape error when it is missing or not an array
  pub fn templates(&self) -> Result<&[Value]> {
    match self.0.get("templates") {
      Some(Value::Array(items)) => Ok(items),
      Some(other) => Err(CatalogError::shape(format!(
        "`templates` must be a sequence, found {}",
        json_kind(other)
      ))),
      None => Err(CatalogError::shape("document has no `templates` sequence")),
    }
  }

  pub fn value(&self) -> &Value {
    &self.0
  }

  pub fn into_value(self) -> Value {
    self.0
  }

  pub fn to_json_pretty(&self) -> String {
    serde_json::to_string_pretty(&self.0).unwrap_or_else(|_| "{}".to_string())
  }
}

fn json_kind(value: &Value) -> &'static str {
  match value {
    Value::Null => "null",
    Value::Bool(_) => "a boolean",
    Value::Number(_) => "a number",
    Value::String(_) => "a string",
    Value::Array(_) => "a sequence",
    Value::Object(_) => "an object",
  }
}

/// Deployment kind, mapped from the raw `type` integer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateType {
  Container,
  Stack,
  Compose,
}

impl TemplateType {
  /// Unknown or missing values display as a container
  pub fn from_raw(raw: Option<i64>) -> Self {
    match raw {
      Some(2) => TemplateType::Stack,
      Some(3) => TemplateType::Compose,
      _ => TemplateType::Container,
    }
  }

  pub fn label(self) -> &'static str {
    match self {
      TemplateType::Container => "Container",
      TemplateType::Stack => "Stack",
      TemplateType::Compose => "Compose",
    }
  }
}

impl fmt::Display for TemplateType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.label())
  }
}

/// A port mapping, written either as a number or as `"8080:80/tcp"`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PortSpec {
  Number(u64),
  Text(String),
}

impl fmt::Display for PortSpec {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      PortSpec::Number(n) => write!(f, "{n}"),
      PortSpec::Text(s) => f.write_str(s),
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Volume {
  #[serde(default)]
  pub container: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub bind: Option<String>,
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

impl Volume {
  /// `bind:container`, or the bare container path
  pub fn mapping(&self) -> String {
    match self.bind.as_deref().filter(|b| !b.is_empty()) {
      Some(bind) => format!("{bind}:{}", self.container),
      None => self.container.clone(),
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvVar {
  #[serde(default)]
  pub name: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub label: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub default: Option<Value>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub preset: Option<Value>,
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

impl EnvVar {
  /// The value a generated artifact should carry: `default`, else `preset`
  pub fn value(&self) -> Option<String> {
    self.default.as_ref().and_then(scalar_text).or_else(|| self.preset.as_ref().and_then(scalar_text))
  }

  /// Neither `default` nor `preset` supplies a value
  pub fn is_required(&self) -> bool {
    self.value().is_none()
  }

  pub fn display_label(&self) -> &str {
    self.label.as_deref().filter(|l| !l.is_empty()).unwrap_or(&self.name)
  }
}

/// Text of a scalar env value. Empty strings, `false` and `null` count as absent.
fn scalar_text(value: &Value) -> Option<String> {
  match value {
    Value::String(s) if !s.is_empty() => Some(s.clone()),
    Value::Number(n) => Some(n.to_string()),
    Value::Bool(true) => Some("true".to_string()),
    _ => None,
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Repository {
  #[serde(default)]
  pub url: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub stackfile: Option<String>,
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

/// Docker Hub figures added by the enricher
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DockerMetadata {
  pub pulls: u64,
  pub pulls_formatted: String,
  pub stars: u64,
  pub hub_url: String,
  pub last_updated: String,
  pub is_official: bool,
}

/// GitHub figures added by the enricher
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GithubMetadata {
  pub url: String,
  pub stars: u64,
  pub forks: u64,
  pub issues: u64,
  pub updated: String,
  pub license: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub docker: Option<DockerMetadata>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub github: Option<GithubMetadata>,
}

impl Metadata {
  pub fn is_empty(&self) -> bool {
    self.docker.is_none() && self.github.is_none()
  }
}

/// One deployable unit from the document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Template {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub title: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub image: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub logo: Option<String>,
  #[serde(
    rename = "type",
    default,
    deserialize_with = "lenient_int",
    skip_serializing_if = "Option::is_none"
  )]
  pub template_type: Option<i64>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub categories: Vec<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub platform: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub privileged: Option<bool>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub network: Option<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub ports: Vec<PortSpec>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub volumes: Vec<Volume>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub env: Vec<EnvVar>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub restart_policy: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub hostname: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub command: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub maintainer: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub repository: Option<Repository>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub note: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub metadata: Option<Metadata>,
  #[serde(flatten)]
  pub extra: Map<String, Value>,

  /// Lowercase search blob, filled in by the indexer
  #[serde(skip)]
  pub search_text: String,
}

/// Accept `1` as well as `"1"` for integer fields; anything else is treated as absent
fn lenient_int<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
  D: Deserializer<'de>,
{
  let value = Option::<Value>::deserialize(deserializer)?;
  Ok(match value {
    Some(Value::Number(n)) => n.as_i64(),
    Some(Value::String(s)) => s.trim().parse().ok(),
    _ => None,
  })
}

/// A record field that was dropped because it could not be read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
  pub field: String,
  pub reason: String,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
  value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl Template {
  pub fn from_value(value: Value) -> std::result::Result<Self, serde_json::Error> {
    serde_json::from_value(value)
  }

  /// Read a raw record one field at a time. Unreadable fields are left at
  /// their defaults and reported; only a non-object is rejected outright.
  pub fn read(value: Value) -> std::result::Result<(Self, Vec<FieldError>), String> {
    let Value::Object(object) = value else {
      return Err(format!("expected an object, found {}", json_kind(&value)));
    };

    if let Ok(template) = Self::from_value(Value::Object(object.clone())) {
      return Ok((template, Vec::new()));
    }

    let mut errors = Vec::new();
    let mut readable = Map::new();
    for (field, raw) in object {
      let single = Map::from_iter([(field.clone(), raw.clone())]);
      match Self::from_value(Value::Object(single)) {
        Ok(_) => {
          readable.insert(field, raw);
        }
        Err(e) => errors.push(FieldError { field, reason: e.to_string() }),
      }
    }

    let template = Self::from_value(Value::Object(readable)).map_err(|e| e.to_string())?;
    Ok((template, errors))
  }

  pub fn title(&self) -> Option<&str> {
    non_empty(&self.title)
  }

  pub fn image(&self) -> Option<&str> {
    non_empty(&self.image)
  }

  /// Deep-link identifier: `name`, else `title`, else the fallback literal
  pub fn slug(&self) -> &str {
    non_empty(&self.name).or_else(|| self.title()).unwrap_or(FALLBACK_NAME)
  }

  /// What a human should see: `title`, else `name`, else the fallback literal
  pub fn display_name(&self) -> &str {
    self.title().or_else(|| non_empty(&self.name)).unwrap_or(FALLBACK_NAME)
  }

  pub fn kind(&self) -> TemplateType {
    TemplateType::from_raw(self.template_type)
  }

  pub fn primary_category(&self) -> Option<&str> {
    self.categories.first().map(String::as_str)
  }

  pub fn is_privileged(&self) -> bool {
    self.privileged.unwrap_or(false)
  }

  pub fn uses_host_network(&self) -> bool {
    self.network.as_deref() == Some("host")
  }

  pub fn required_env(&self) -> impl Iterator<Item = &EnvVar> {
    self.env.iter().filter(|e| e.is_required())
  }
}
