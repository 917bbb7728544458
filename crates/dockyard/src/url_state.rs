//! Shareable query strings for the current filters and view.
//!
//! Only non-default values are written, so an untouched view serializes to an
//! empty string. Reading is tolerant: unknown keys and unparsable values are
//! skipped rather than rejected.

use std::fmt;
use std::str::FromStr;
use url::form_urlencoded;

use crate::error::{CatalogError, Result};
use crate::query::{Criteria, SortKey};
use crate::template::Template;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ViewMode {
  #[default]
  Grid,
  List,
  Compact,
}

impl ViewMode {
  pub const ALL: [ViewMode; 3] = [ViewMode::Grid, ViewMode::List, ViewMode::Compact];

  pub fn as_str(self) -> &'static str {
    match self {
      ViewMode::Grid => "grid",
      ViewMode::List => "list",
      ViewMode::Compact => "compact",
    }
  }
}

impl fmt::Display for ViewMode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for ViewMode {
  type Err = String;

  fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
    ViewMode::ALL
      .into_iter()
      .find(|mode| mode.as_str() == s.trim())
      .ok_or_else(|| format!("unknown view '{s}' (expected grid, list or compact)"))
  }
}

/// Query string for `criteria` and `view`, without a leading `?`
pub fn serialize(criteria: &Criteria, view: ViewMode) -> String {
  let mut out = form_urlencoded::Serializer::new(String::new());

  if !criteria.text.is_empty() {
    out.append_pair("q", &criteria.text);
  }
  if !criteria.category.is_empty() {
    out.append_pair("category", &criteria.category);
  }
  if let Some(template_type) = criteria.template_type {
    out.append_pair("type", &template_type.to_string());
  }
  if criteria.sort != SortKey::default() {
    out.append_pair("sort", criteria.sort.as_str());
  }
  if view != ViewMode::default() {
    out.append_pair("view", view.as_str());
  }

  out.finish()
}

fn pairs(query: &str) -> form_urlencoded::Parse<'_> {
  form_urlencoded::parse(query.trim().trim_start_matches('?').as_bytes())
}

/// Criteria and view from a query string. Never fails.
pub fn deserialize(query: &str) -> (Criteria, ViewMode) {
  let mut criteria = Criteria::default();
  let mut view = ViewMode::default();

  for (key, value) in pairs(query) {
    match key.as_ref() {
      "q" => criteria.text = value.into_owned(),
      "category" | "cat" => criteria.category = value.into_owned(),
      "type" => {
        if let Ok(t) = value.trim().parse() {
          criteria.template_type = Some(t);
        }
      }
      "sort" => {
        if let Ok(sort) = value.parse() {
          criteria.sort = sort;
        }
      }
      "view" => view = value.parse().unwrap_or_default(),
      _ => {}
    }
  }

  (criteria, view)
}

/// The `name` deep-link parameter, if present and non-empty
pub fn deep_link_name(query: &str) -> Option<String> {
  pairs(query)
    .find(|(key, _)| key == "name")
    .map(|(_, value)| value.trim().to_string())
    .filter(|name| !name.is_empty())
}

/// Case-insensitive match on `name` first, then on `title`
pub fn find_by_name<'a>(records: &'a [Template], name: &str) -> Result<&'a Template> {
  let wanted = name.trim().to_lowercase();
  let matches = |field: &Option<String>| field.as_deref().is_some_and(|v| v.trim().to_lowercase() == wanted);

  records
    .iter()
    .find(|t| matches(&t.name))
    .or_else(|| records.iter().find(|t| matches(&t.title)))
    .ok_or_else(|| CatalogError::not_found(name.trim()))
}

/// Resolve a `name=` deep link against `records`
pub fn resolve_deep_link<'a>(records: &'a [Template], query: &str) -> Result<&'a Template> {
  match deep_link_name(query) {
    Some(name) => find_by_name(records, &name),
    None => Err(CatalogError::not_found("")),
  }
}

/// The one shareable location of a session; every change replaces it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Location {
  query: String,
  replacements: usize,
}

impl Location {
  pub fn new(query: impl Into<String>) -> Self {
    Self { query: query.into(), replacements: 0 }
  }

  /// Overwrite the current entry (history replacement, no new entry)
  pub fn replace(&mut self, criteria: &Criteria, view: ViewMode) -> bool {
    let next = serialize(criteria, view);
    if next == self.query {
      return false;
    }
    self.query = next;
    self.replacements += 1;
    true
  }

  pub fn query(&self) -> &str {
    &self.query
  }

  pub fn replacements(&self) -> usize {
    self.replacements
  }

  /// `?query`, or an empty string for the default view
  pub fn href(&self) -> String {
    if self.query.is_empty() {
      String::new()
    } else {
      format!("?{}", self.query)
    }
  }
}
