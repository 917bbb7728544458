//! Terminal formatting of rendered lists and details

use colored::*;
use console::{measure_text_width, pad_str, truncate_str, Alignment};

use crate::indexer::Warning;
use crate::render::{Card, RenderedDetail, RenderedList, Risk, Severity};
use crate::url_state::ViewMode;

const GRID_CELL_WIDTH: usize = 38;
const GRID_GUTTER: &str = "  ";

/// Wrap text to fit within a specified width
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
  let mut lines = Vec::new();

  for paragraph in text.split('\n') {
    if paragraph.trim().is_empty() {
      lines.push(String::new());
      continue;
    }

    let mut current_line = String::new();
    for word in paragraph.split_whitespace() {
      if current_line.is_empty() {
        current_line = word.to_string();
      } else if current_line.len() + 1 + word.len() <= width {
        current_line.push(' ');
        current_line.push_str(word);
      } else {
        lines.push(current_line);
        current_line = word.to_string();
      }
    }

    if !current_line.is_empty() {
      lines.push(current_line);
    }
  }

  lines
}

fn risk_badge(risk: &Risk) -> ColoredString {
  let text = format!("⚠ {}", risk.label);
  match risk.severity {
    Severity::High => text.bright_red().bold(),
    Severity::Medium => text.yellow(),
    Severity::Low => text.blue(),
  }
}

fn risk_line(card: &Card) -> Option<String> {
  if card.risks.is_empty() {
    return None;
  }
  Some(card.risks.iter().map(|r| risk_badge(r).to_string()).collect::<Vec<_>>().join(" "))
}

/// `[Web] · Container · linux`
fn meta_line(card: &Card) -> String {
  let mut parts = Vec::new();
  if let Some(category) = &card.category {
    parts.push(format!("[{}]", category).cyan().to_string());
  }
  parts.push(card.type_label.magenta().to_string());
  if let Some(platform) = &card.platform {
    parts.push(platform.dimmed().to_string());
  }
  parts.join(" · ")
}

/// `env 2 · volumes 1 · ↓ 1.5M · ★ 120`
fn counts_line(card: &Card) -> String {
  let mut parts = vec![format!("env {}", card.env_count), format!("volumes {}", card.volume_count)];
  if let Some(popularity) = &card.popularity {
    if let Some(pulls) = &popularity.pulls {
      parts.push(format!("↓ {pulls}"));
    }
    if let Some(stars) = popularity.github_stars.or(popularity.docker_stars) {
      parts.push(format!("★ {stars}"));
    }
    if popularity.official {
      parts.push("official".green().to_string());
    }
  }
  parts.join(" · ").dimmed().to_string()
}

fn grid_cell(card: &Card) -> Vec<String> {
  let width = GRID_CELL_WIDTH;
  let mut lines = vec![
    truncate_str(&card.title, width, "…").bold().to_string(),
    truncate_str(&meta_line(card), width, "…").to_string(),
  ];

  let description = card.description.as_deref().unwrap_or("");
  let mut wrapped = wrap_text(description, width).into_iter().filter(|l| !l.is_empty());
  for _ in 0..2 {
    let line = wrapped.next().unwrap_or_default();
    lines.push(truncate_str(&line, width, "…").to_string());
  }

  lines.push(risk_line(card).map(|l| truncate_str(&l, width, "…").to_string()).unwrap_or_default());
  lines.push(counts_line(card));
  lines
}

fn format_grid(list: &RenderedList, width: usize) -> String {
  let columns = (width / (GRID_CELL_WIDTH + GRID_GUTTER.len())).max(1);
  let mut out = String::new();

  for row in list.cards.chunks(columns) {
    let cells: Vec<Vec<String>> = row.iter().map(grid_cell).collect();
    let height = cells.iter().map(Vec::len).max().unwrap_or(0);

    for line in 0..height {
      let joined = cells
        .iter()
        .map(|cell| {
          let text = cell.get(line).map(String::as_str).unwrap_or("");
          pad_str(text, GRID_CELL_WIDTH, Alignment::Left, None).into_owned()
        })
        .collect::<Vec<_>>()
        .join(GRID_GUTTER);
      out.push_str(joined.trim_end());
      out.push('\n');
    }
    out.push('\n');
  }

  out
}

fn format_list_view(list: &RenderedList, width: usize) -> String {
  let mut out = String::new();

  for card in &list.cards {
    out.push_str(&format!("{} {}\n", card.title.bold(), format!("({})", card.slug).dimmed()));
    out.push_str(&format!("  {}\n", meta_line(card)));
    if let Some(description) = &card.description {
      for line in wrap_text(description, width.saturating_sub(2).max(20)) {
        out.push_str(&format!("  {line}\n"));
      }
    }
    if let Some(risks) = risk_line(card) {
      out.push_str(&format!("  {risks}\n"));
    }
    out.push_str(&format!("  {}\n\n", counts_line(card)));
  }

  out
}

fn format_compact(list: &RenderedList) -> String {
  let slug_width = list.cards.iter().map(|c| measure_text_width(&c.slug)).max().unwrap_or(0);
  let title_width = list.cards.iter().map(|c| measure_text_width(&c.title)).max().unwrap_or(0);

  let mut out = String::new();
  for card in &list.cards {
    let flag = match card.highest_severity() {
      Some(Severity::High) => "!".bright_red().bold().to_string(),
      Some(Severity::Medium) => "!".yellow().to_string(),
      Some(Severity::Low) => "·".blue().to_string(),
      None => " ".to_string(),
    };
    let line = format!(
      "{flag} {}  {}  {:<9}  {}",
      pad_str(&card.slug, slug_width, Alignment::Left, None),
      pad_str(&card.title, title_width, Alignment::Left, None),
      card.type_label,
      card.category.as_deref().unwrap_or("-"),
    );
    out.push_str(line.trim_end());
    out.push('\n');
  }
  out
}

/// Render a filtered list for the terminal in the chosen view mode
pub fn format_list(list: &RenderedList, view: ViewMode, width: usize) -> String {
  if list.is_empty() {
    return format!("{}\n", "No templates match the current filters.".yellow());
  }

  match view {
    ViewMode::Grid => format_grid(list, width),
    ViewMode::List => format_list_view(list, width),
    ViewMode::Compact => format_compact(list),
  }
}

/// `12 of 340 templates`
pub fn format_summary(shown: usize, total: usize) -> String {
  let noun = if total == 1 { "template" } else { "templates" };
  if shown == total {
    format!("{total} {noun}")
  } else {
    format!("{shown} of {total} {noun}")
  }
}

fn section(out: &mut String, title: &str) {
  out.push_str(&format!("\n{}\n", title.blue().bold()));
}

/// Render one template's detail view
pub fn format_detail(detail: &RenderedDetail, width: usize) -> String {
  let card = &detail.card;
  let mut out = String::new();
  let border = "=".repeat(width.min(80));

  out.push_str(&format!("{border}\n{}\n{border}\n", card.title.bold()));
  out.push_str(&format!("{}\n", meta_line(card)));
  if let Some(image) = &detail.image {
    out.push_str(&format!("image: {}\n", image.cyan()));
  }
  if let Some(description) = &card.description {
    out.push('\n');
    for line in wrap_text(description, width.min(80)) {
      out.push_str(&format!("{line}\n"));
    }
  }
  if let Some(risks) = risk_line(card) {
    out.push_str(&format!("\n{risks}\n"));
  }

  if detail.categories.len() > 1 {
    section(&mut out, "Categories");
    out.push_str(&format!("  {}\n", detail.categories.join(", ")));
  }

  if !detail.ports.is_empty() {
    section(&mut out, "Ports");
    for port in &detail.ports {
      out.push_str(&format!("  {port}\n"));
    }
  }

  if !detail.volumes.is_empty() {
    section(&mut out, "Volumes");
    for volume in &detail.volumes {
      out.push_str(&format!("  {volume}\n"));
    }
  }

  if !detail.env.is_empty() {
    section(
      &mut out,
      &format!("Environment ({} required)", detail.required_env_count()),
    );
    for env in &detail.env {
      let value = match (&env.value, env.required) {
        (Some(value), _) => value.clone(),
        (None, true) => "required".red().to_string(),
        (None, false) => String::new(),
      };
      out.push_str(&format!("  {} = {}", env.name.bold(), value));
      if env.label != env.name {
        out.push_str(&format!("  {}", env.label.dimmed()));
      }
      out.push('\n');
    }
  }

  if let Some(popularity) = &card.popularity {
    section(&mut out, "Popularity");
    out.push_str(&format!("  {}\n", counts_line(card)));
    if popularity.official {
      out.push_str("  Docker official image\n");
    }
  }

  for (title, value) in [
    ("Repository", &detail.repository),
    ("Maintainer", &detail.maintainer),
    ("Note", &detail.note),
  ] {
    if let Some(value) = value {
      section(&mut out, title);
      for line in wrap_text(value, width.min(80).saturating_sub(2)) {
        out.push_str(&format!("  {line}\n"));
      }
    }
  }

  section(&mut out, "docker run");
  out.push_str(&detail.run_command);
  out.push('\n');

  section(&mut out, "docker-compose.yml");
  out.push_str(&detail.compose_file);

  out
}

/// Body of the dismissible warnings banner
pub fn format_warnings(warnings: &[Warning], limit: usize) -> String {
  let mut lines = vec![format!(
    "{} validation warning{}",
    warnings.len(),
    if warnings.len() == 1 { "" } else { "s" }
  )];
  lines.extend(warnings.iter().take(limit).map(|w| format!("  {w}")));
  if warnings.len() > limit {
    lines.push(format!("  … and {} more", warnings.len() - limit));
  }
  lines.join("\n")
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::indexer::WarningKind;
  use crate::render::{card, render, render_detail};
  use crate::template::Template;
  use serde_json::json;
  use serial_test::serial;

  fn templates() -> Vec<Template> {
    vec![
      Template::from_value(json!({"title": "Nginx", "name": "nginx", "categories": ["Web"], "description": "Fast web server"})).unwrap(),
      Template::from_value(json!({"title": "Home Assistant", "name": "home-assistant", "privileged": true, "network": "host"})).unwrap(),
    ]
  }

  fn plain<T>(f: impl FnOnce() -> T) -> T {
    colored::control::set_override(false);
    let out = f();
    colored::control::unset_override();
    out
  }

  #[test]
  fn test_wrap_text() {
    let lines = wrap_text("one two three four five", 9);
    assert_eq!(lines, vec!["one two", "three", "four five"]);
    assert_eq!(wrap_text("a\n\nb", 10), vec!["a", "", "b"]);
  }

  #[test]
  #[serial]
  fn test_compact_view_one_line_per_card() {
    let records = templates();
    let refs: Vec<&Template> = records.iter().collect();
    let out = plain(|| format_list(&render(&refs), ViewMode::Compact, 80));

    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("  nginx"));
    assert!(lines[1].starts_with("! home-assistant"));
    assert!(lines[0].contains("Web"));
  }

  #[test]
  #[serial]
  fn test_grid_view_lays_out_columns() {
    let records = templates();
    let refs: Vec<&Template> = records.iter().collect();
    let out = plain(|| format_list(&render(&refs), ViewMode::Grid, 120));

    let first = out.lines().next().unwrap();
    assert!(first.starts_with("Nginx"));
    assert!(first.contains("Home Assistant"));
    assert!(out.contains("⚠ privileged"));
  }

  #[test]
  #[serial]
  fn test_list_view_includes_descriptions() {
    let records = templates();
    let refs: Vec<&Template> = records.iter().collect();
    let out = plain(|| format_list(&render(&refs), ViewMode::List, 80));
    assert!(out.contains("Nginx (nginx)"));
    assert!(out.contains("  Fast web server"));
    assert!(out.contains("⚠ host network"));
  }

  #[test]
  #[serial]
  fn test_empty_list_message() {
    let out = plain(|| format_list(&RenderedList::default(), ViewMode::Grid, 80));
    assert!(out.contains("No templates match"));
  }

  #[test]
  #[serial]
  fn test_detail_sections() {
    let template = Template::from_value(json!({
      "title": "Postgres",
      "image": "postgres:16",
      "categories": ["Database", "SQL"],
      "ports": ["5432:5432"],
      "env": [{"name": "POSTGRES_PASSWORD", "label": "Password"}],
      "maintainer": "someone"
    }))
    .unwrap();
    let out = plain(|| format_detail(&render_detail(&template), 80));

    assert!(out.contains("image: postgres:16"));
    assert!(out.contains("Categories\n  Database, SQL"));
    assert!(out.contains("Environment (1 required)"));
    assert!(out.contains("POSTGRES_PASSWORD = required  Password"));
    assert!(out.contains("Maintainer\n  someone"));
    assert!(out.contains("docker run -d"));
    assert!(out.contains("services:"));
  }

  #[test]
  fn test_summary() {
    assert_eq!(format_summary(3, 3), "3 templates");
    assert_eq!(format_summary(1, 10), "1 of 10 templates");
    assert_eq!(format_summary(1, 1), "1 template");
  }

  #[test]
  fn test_warnings_banner_truncates() {
    let warnings: Vec<Warning> = (1..=5)
      .map(|position| Warning { position, subject: None, kind: WarningKind::MissingTitle })
      .collect();
    let text = format_warnings(&warnings, 3);
    assert!(text.starts_with("5 validation warnings"));
    assert!(text.contains("Template #3 has no title"));
    assert!(!text.contains("#4"));
    assert!(text.ends_with("… and 2 more"));
  }

  #[test]
  #[serial]
  fn test_card_popularity_in_counts() {
    let template = Template::from_value(json!({
      "title": "Nginx",
      "metadata": {"docker": {"pulls": 10, "pulls_formatted": "10", "stars": 3, "hub_url": "x", "is_official": true}}
    }))
    .unwrap();
    let line = plain(|| counts_line(&card(&template)));
    assert_eq!(line, "env 0 · volumes 0 · ↓ 10 · ★ 3 · official");
  }
}
