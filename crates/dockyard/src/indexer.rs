//! One pass over a document: typed records, search text, categories, warnings.

use std::collections::BTreeSet;
use std::fmt;

use crate::error::Result;
use crate::template::{Document, Template, TemplateType};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WarningKind {
  MissingTitle,
  MissingImage,
  Privileged,
  /// A field (or, with no field, the whole record) could not be read and was
  /// left at its default
  Malformed { field: Option<String>, reason: String },
}

/// Informational finding about one record. Never excludes the record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
  /// 1-based position in the document
  pub position: usize,
  /// Display name when the record has one
  pub subject: Option<String>,
  pub kind: WarningKind,
}

impl Warning {
  /// `#3`, or `#3 (Redis)` when the record is named
  pub fn locator(&self) -> String {
    match &self.subject {
      Some(subject) => format!("#{} ({subject})", self.position),
      None => format!("#{}", self.position),
    }
  }
}

impl fmt::Display for Warning {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let what = match &self.kind {
      WarningKind::MissingTitle => "has no title".to_string(),
      WarningKind::MissingImage => "is a container template without an image".to_string(),
      WarningKind::Privileged => "runs privileged".to_string(),
      WarningKind::Malformed { field: Some(field), reason } => format!("has an unreadable `{field}` field: {reason}"),
      WarningKind::Malformed { field: None, reason } => format!("could not be read: {reason}"),
    };
    write!(f, "Template {} {what}", self.locator())
  }
}

#[derive(Debug, Clone, Default)]
pub struct Index {
  pub records: Vec<Template>,
  pub categories: BTreeSet<String>,
  pub warnings: Vec<Warning>,
}

impl Index {
  pub fn len(&self) -> usize {
    self.records.len()
  }

  pub fn is_empty(&self) -> bool {
    self.records.is_empty()
  }
}

/// Index every record of `document`, in document order
pub fn index(document: &Document) -> Result<Index> {
  let raw_records = document.templates()?;
  let mut index = Index { records: Vec::with_capacity(raw_records.len()), ..Index::default() };

  for (i, raw) in raw_records.iter().enumerate() {
    let position = i + 1;
    let (mut template, unreadable) = match Template::read(raw.clone()) {
      Ok((template, errors)) => {
        let unreadable: Vec<WarningKind> = errors
          .into_iter()
          .map(|e| WarningKind::Malformed { field: Some(e.field), reason: e.reason })
          .collect();
        (template, unreadable)
      }
      Err(reason) => (Template::default(), vec![WarningKind::Malformed { field: None, reason }]),
    };

    let subject = subject_of(&template);
    index
      .warnings
      .extend(unreadable.into_iter().map(|kind| Warning { position, subject: subject.clone(), kind }));

    template.search_text = search_text(&template);
    index.categories.extend(template.categories.iter().cloned());
    index.warnings.extend(validate(&template, position));
    index.records.push(template);
  }

  tracing::debug!(
    records = index.records.len(),
    categories = index.categories.len(),
    warnings = index.warnings.len(),
    "indexed templates"
  );

  Ok(index)
}

/// Lowercase blob of everything the text filter may match
pub fn search_text(template: &Template) -> String {
  let mut parts: Vec<&str> = Vec::new();

  for field in [&template.title, &template.name, &template.description, &template.image, &template.platform] {
    if let Some(value) = field.as_deref() {
      parts.push(value);
    }
  }
  parts.extend(template.categories.iter().map(String::as_str));
  for env in &template.env {
    parts.push(&env.name);
    parts.extend(env.label.as_deref());
    parts.extend(env.description.as_deref());
  }

  parts.retain(|p| !p.is_empty());
  parts.join(" ").to_lowercase()
}

fn subject_of(template: &Template) -> Option<String> {
  template.title().map(str::to_string).or_else(|| template.name.clone())
}

fn validate(template: &Template, position: usize) -> Vec<Warning> {
  let subject = subject_of(template);
  let warning = |kind| Warning { position, subject: subject.clone(), kind };
  let mut warnings = Vec::new();

  if template.title().is_none() {
    warnings.push(warning(WarningKind::MissingTitle));
  }
  if template.template_type == Some(1) && template.image().is_none() {
    warnings.push(warning(WarningKind::MissingImage));
  }
  if template.is_privileged() {
    warnings.push(warning(WarningKind::Privileged));
  }

  warnings
}

/// Count of records per display type, in Container/Stack/Compose order
pub fn type_counts(records: &[Template]) -> [(TemplateType, usize); 3] {
  let count = |kind| records.iter().filter(|t| t.kind() == kind).count();
  [
    (TemplateType::Container, count(TemplateType::Container)),
    (TemplateType::Stack, count(TemplateType::Stack)),
    (TemplateType::Compose, count(TemplateType::Compose)),
  ]
}
