//! Application state shared by the front ends.
//!
//! Created at startup, its index is replaced wholesale on every reload. Each
//! change bumps a generation counter on a `watch` channel: the renderer
//! subscribes to that single "state changed" signal instead of being wired
//! to individual setters.

use std::collections::BTreeSet;
use tokio::sync::watch;

use crate::error::Result;
use crate::indexer::{self, Index, Warning};
use crate::query::{self, Criteria, SortKey};
use crate::render::{self, RenderedDetail, RenderedList};
use crate::template::{Document, Template};
use crate::url_state::{self, Location, ViewMode};

pub struct AppState {
  index: Index,
  criteria: Criteria,
  view: ViewMode,
  location: Location,
  warnings_dismissed: bool,
  changes: watch::Sender<u64>,
}

impl Default for AppState {
  fn default() -> Self {
    Self::new(Criteria::default(), ViewMode::default())
  }
}

impl AppState {
  pub fn new(criteria: Criteria, view: ViewMode) -> Self {
    let (changes, _) = watch::channel(0);
    let mut location = Location::default();
    location.replace(&criteria, view);
    Self { index: Index::default(), criteria, view, location, warnings_dismissed: false, changes }
  }

  /// Initial criteria and view from a shareable query string
  pub fn from_query(query: &str) -> Self {
    let (criteria, view) = url_state::deserialize(query);
    Self::new(criteria, view)
  }

  pub fn subscribe(&self) -> watch::Receiver<u64> {
    self.changes.subscribe()
  }

  pub fn generation(&self) -> u64 {
    *self.changes.borrow()
  }

  fn notify(&self) {
    self.changes.send_modify(|generation| *generation += 1);
  }

  /// Re-index from `document`, replacing records, categories and warnings
  pub fn apply_document(&mut self, document: &Document) -> Result<()> {
    self.index = indexer::index(document)?;
    self.warnings_dismissed = false;
    self.notify();
    Ok(())
  }

  /// Replace the criteria; returns whether anything changed
  pub fn set_criteria(&mut self, criteria: Criteria) -> bool {
    if criteria == self.criteria {
      return false;
    }
    self.criteria = criteria;
    self.location.replace(&self.criteria, self.view);
    self.notify();
    true
  }

  pub fn set_text(&mut self, text: &str) -> bool {
    self.set_criteria(Criteria { text: text.trim().to_string(), ..self.criteria.clone() })
  }

  pub fn set_category(&mut self, category: &str) -> bool {
    self.set_criteria(Criteria { category: category.trim().to_string(), ..self.criteria.clone() })
  }

  pub fn set_type(&mut self, template_type: Option<i64>) -> bool {
    self.set_criteria(Criteria { template_type, ..self.criteria.clone() })
  }

  pub fn set_sort(&mut self, sort: SortKey) -> bool {
    self.set_criteria(Criteria { sort, ..self.criteria.clone() })
  }

  pub fn set_view(&mut self, view: ViewMode) -> bool {
    if view == self.view {
      return false;
    }
    self.view = view;
    self.location.replace(&self.criteria, self.view);
    self.notify();
    true
  }

  /// Back to the default criteria and view
  pub fn reset(&mut self) -> bool {
    let view_changed = self.set_view(ViewMode::default());
    self.set_criteria(Criteria::default()) || view_changed
  }

  pub fn index(&self) -> &Index {
    &self.index
  }

  pub fn records(&self) -> &[Template] {
    &self.index.records
  }

  pub fn categories(&self) -> &BTreeSet<String> {
    &self.index.categories
  }

  pub fn criteria(&self) -> &Criteria {
    &self.criteria
  }

  pub fn view(&self) -> ViewMode {
    self.view
  }

  pub fn location(&self) -> &Location {
    &self.location
  }

  /// Pending validation warnings; empty once dismissed until the next reload
  pub fn warnings(&self) -> &[Warning] {
    if self.warnings_dismissed {
      &[]
    } else {
      &self.index.warnings
    }
  }

  pub fn dismiss_warnings(&mut self) {
    self.warnings_dismissed = true;
  }

  pub fn results(&self) -> Vec<&Template> {
    query::query(&self.index.records, &self.criteria)
  }

  pub fn rendered(&self) -> RenderedList {
    render::render(&self.results())
  }

  /// Detail view for a deep-linked name
  pub fn select(&self, name: &str) -> Result<RenderedDetail> {
    url_state::find_by_name(&self.index.records, name).map(render::render_detail)
  }
}
