//! Display structures for the list and detail views.
//!
//! Pure projection from records to what a front end prints; no formatting
//! decisions beyond labels live here (see `display` for the terminal side).

use serde::Serialize;
use std::fmt;

use crate::artifact;
use crate::template::{Metadata, Template};

/// Port count above which a template is flagged
pub const MANY_PORTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
  Low,
  Medium,
  High,
}

impl fmt::Display for Severity {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Severity::Low => "low",
      Severity::Medium => "medium",
      Severity::High => "high",
    })
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskKind {
  Privileged,
  HostNetwork,
  ManyPorts,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Risk {
  pub kind: RiskKind,
  pub severity: Severity,
  pub label: String,
}

/// Security-relevant settings of a template, most severe first
pub fn risks(template: &Template) -> Vec<Risk> {
  let mut risks = Vec::new();

  if template.is_privileged() {
    risks.push(Risk {
      kind: RiskKind::Privileged,
      severity: Severity::High,
      label: "privileged".to_string(),
    });
  }
  if template.uses_host_network() {
    risks.push(Risk {
      kind: RiskKind::HostNetwork,
      severity: Severity::Medium,
      label: "host network".to_string(),
    });
  }
  if template.ports.len() > MANY_PORTS {
    risks.push(Risk {
      kind: RiskKind::ManyPorts,
      severity: Severity::Low,
      label: format!("{} ports", template.ports.len()),
    });
  }

  risks
}

/// Popularity figures shown next to a card
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Popularity {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub pulls: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub docker_stars: Option<u64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub github_stars: Option<u64>,
  pub official: bool,
}

impl Popularity {
  fn from_metadata(metadata: &Metadata) -> Option<Self> {
    if metadata.is_empty() {
      return None;
    }
    Some(Self {
      pulls: metadata.docker.as_ref().map(|d| d.pulls_formatted.clone()),
      docker_stars: metadata.docker.as_ref().map(|d| d.stars),
      github_stars: metadata.github.as_ref().map(|g| g.stars),
      official: metadata.docker.as_ref().is_some_and(|d| d.is_official),
    })
  }
}

/// One entry of the list view
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Card {
  pub title: String,
  pub slug: String,
  pub category: Option<String>,
  pub type_label: &'static str,
  pub platform: Option<String>,
  pub description: Option<String>,
  pub risks: Vec<Risk>,
  pub env_count: usize,
  pub volume_count: usize,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub popularity: Option<Popularity>,
}

impl Card {
  pub fn highest_severity(&self) -> Option<Severity> {
    self.risks.iter().map(|r| r.severity).max()
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RenderedList {
  pub cards: Vec<Card>,
  pub total: usize,
}

impl RenderedList {
  pub fn is_empty(&self) -> bool {
    self.cards.is_empty()
  }
}

pub fn card(template: &Template) -> Card {
  Card {
    title: template.display_name().to_string(),
    slug: template.slug().to_string(),
    category: template.primary_category().map(str::to_string),
    type_label: template.kind().label(),
    platform: template.platform.clone().filter(|p| !p.is_empty()),
    description: template.description.clone().filter(|d| !d.trim().is_empty()),
    risks: risks(template),
    env_count: template.env.len(),
    volume_count: template.volumes.len(),
    popularity: template.metadata.as_ref().and_then(Popularity::from_metadata),
  }
}

pub fn render(records: &[&Template]) -> RenderedList {
  RenderedList { cards: records.iter().map(|t| card(t)).collect(), total: records.len() }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvLine {
  pub name: String,
  pub label: String,
  pub description: Option<String>,
  pub value: Option<String>,
  pub required: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedDetail {
  pub card: Card,
  pub categories: Vec<String>,
  pub image: Option<String>,
  pub ports: Vec<String>,
  pub volumes: Vec<String>,
  pub env: Vec<EnvLine>,
  pub repository: Option<String>,
  pub maintainer: Option<String>,
  pub note: Option<String>,
  pub run_command: String,
  pub compose_file: String,
}

impl RenderedDetail {
  pub fn required_env_count(&self) -> usize {
    self.env.iter().filter(|e| e.required).count()
  }
}

pub fn render_detail(template: &Template) -> RenderedDetail {
  RenderedDetail {
    card: card(template),
    categories: template.categories.clone(),
    image: template.image().map(str::to_string),
    ports: template.ports.iter().map(ToString::to_string).collect(),
    volumes: template.volumes.iter().map(|v| v.mapping()).collect(),
    env: template
      .env
      .iter()
      .map(|e| EnvLine {
        name: e.name.clone(),
        label: e.display_label().to_string(),
        description: e.description.clone(),
        value: e.value(),
        required: e.is_required(),
      })
      .collect(),
    repository: template.repository.as_ref().filter(|r| !r.url.is_empty()).map(|r| match &r.stackfile {
      Some(stackfile) => format!("{} ({stackfile})", r.url),
      None => r.url.clone(),
    }),
    maintainer: template.maintainer.clone(),
    note: template.note.clone(),
    run_command: artifact::to_run_command(template),
    compose_file: artifact::to_compose_file(template),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn template(value: serde_json::Value) -> Template {
    Template::from_value(value).unwrap()
  }

  #[test]
  fn test_card_fields() {
    let t = template(json!({
      "title": "Redis",
      "type": 1,
      "image": "redis:latest",
      "categories": ["Database", "Cache"],
      "platform": "linux",
      "description": "In-memory store",
      "env": [{"name": "A"}, {"name": "B", "default": "1"}],
      "volumes": [{"container": "/data"}]
    }));
    let card = card(&t);

    assert_eq!(card.title, "Redis");
    assert_eq!(card.category.as_deref(), Some("Database"));
    assert_eq!(card.type_label, "Container");
    assert_eq!(card.platform.as_deref(), Some("linux"));
    assert_eq!(card.env_count, 2);
    assert_eq!(card.volume_count, 1);
    assert!(card.risks.is_empty());
    assert_eq!(card.highest_severity(), None);
  }

  #[test]
  fn test_type_labels() {
    assert_eq!(card(&template(json!({"type": 2}))).type_label, "Stack");
    assert_eq!(card(&template(json!({"type": 3}))).type_label, "Compose");
    assert_eq!(card(&template(json!({"type": 42}))).type_label, "Container");
  }

  #[test]
  fn test_risk_indicators() {
    let t = template(json!({"privileged": true, "network": "host", "ports": [1, 2, 3, 4]}));
    let risks = risks(&t);
    let kinds: Vec<_> = risks.iter().map(|r| (r.kind, r.severity)).collect();
    assert_eq!(
      kinds,
      vec![
        (RiskKind::Privileged, Severity::High),
        (RiskKind::HostNetwork, Severity::Medium),
        (RiskKind::ManyPorts, Severity::Low)
      ]
    );
    assert_eq!(card(&t).highest_severity(), Some(Severity::High));
  }

  #[test]
  fn test_three_ports_is_not_a_risk() {
    let t = template(json!({"ports": [1, 2, 3], "network": "bridge"}));
    assert!(risks(&t).is_empty());
  }

  #[test]
  fn test_popularity_from_metadata() {
    let t = template(json!({
      "title": "Nginx",
      "metadata": {
        "docker": {"pulls": 1500000, "pulls_formatted": "1.5M", "stars": 20000, "hub_url": "https://hub.docker.com/_/nginx", "is_official": true},
        "github": {"url": "https://github.com/nginx/nginx", "stars": 25000, "forks": 1, "issues": 2}
      }
    }));
    let popularity = card(&t).popularity.unwrap();
    assert_eq!(popularity.pulls.as_deref(), Some("1.5M"));
    assert_eq!(popularity.github_stars, Some(25000));
    assert!(popularity.official);
  }

  #[test]
  fn test_render_list() {
    let a = template(json!({"title": "A"}));
    let b = template(json!({"title": "B"}));
    let list = render(&[&a, &b]);
    assert_eq!(list.total, 2);
    assert_eq!(list.cards[1].title, "B");
    assert!(render(&[]).is_empty());
  }

  #[test]
  fn test_render_detail() {
    let t = template(json!({
      "title": "Wiki",
      "name": "wiki",
      "type": 2,
      "env": [{"name": "DB_PASS", "label": "Database password"}, {"name": "PORT", "default": "80"}],
      "repository": {"url": "https://github.com/example/stacks", "stackfile": "wiki/docker-compose.yml"},
      "note": "Change the password"
    }));
    let detail = render_detail(&t);

    assert_eq!(detail.card.type_label, "Stack");
    assert_eq!(detail.required_env_count(), 1);
    assert_eq!(detail.env[0].label, "Database password");
    assert_eq!(detail.env[1].value.as_deref(), Some("80"));
    assert_eq!(
      detail.repository.as_deref(),
      Some("https://github.com/example/stacks (wiki/docker-compose.yml)")
    );
    assert!(detail.run_command.starts_with("docker run -d"));
    assert!(detail.compose_file.contains("wiki:"));
  }
}
