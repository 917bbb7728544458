use anyhow::{Context as _, Result};
use clap::Args;
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::display;
use crate::enrich::Enricher;
use crate::indexer;
use crate::loader::{self, Loaded, Origin, TemplateLoader};
use crate::query::{Criteria, SortKey};
use crate::render::RenderedDetail;
use crate::state::AppState;
use crate::template::{Document, Template};
use crate::url_state::{self, ViewMode};

/// Warnings shown in the banner before it is cut short
pub const WARNING_LIMIT: usize = 10;

/// Filter flags shared by `list` and `link`
#[derive(Args, Debug, Clone, Default)]
pub struct Filters {
  /// Free-text filter (every word must match)
  #[arg(short = 'q', long = "query")]
  pub text: Option<String>,
  /// Only templates in this category (exact match)
  #[arg(short, long)]
  pub category: Option<String>,
  /// Only templates of this type (1 = container, 2 = stack, 3 = compose)
  #[arg(short = 't', long = "type")]
  pub template_type: Option<i64>,
  /// Sort order: name-asc, name-desc or category
  #[arg(short, long)]
  pub sort: Option<SortKey>,
  /// View mode: grid, list or compact
  #[arg(short, long)]
  pub view: Option<ViewMode>,
  /// Start from a shared query string (flags override its values)
  #[arg(long)]
  pub link: Option<String>,
}

impl Filters {
  /// Criteria and view from `--link`, overridden by explicit flags
  pub fn resolve(&self) -> (Criteria, ViewMode) {
    let (mut criteria, mut view) = url_state::deserialize(self.link.as_deref().unwrap_or(""));

    if let Some(text) = &self.text {
      criteria.text = text.trim().to_string();
    }
    if let Some(category) = &self.category {
      criteria.category = category.clone();
    }
    if self.template_type.is_some() {
      criteria.template_type = self.template_type;
    }
    if let Some(sort) = self.sort {
      criteria.sort = sort;
    }
    if let Some(selected) = self.view {
      view = selected;
    }

    (criteria, view)
  }
}

/// What every command needs to reach the templates
pub struct Context {
  pub config: Config,
  /// Skip the cache and fetch now
  pub refresh: bool,
}

impl Context {
  pub fn new(config: Config, refresh: bool) -> Self {
    Self { config, refresh }
  }

  pub fn loader(&self) -> TemplateLoader {
    let source = loader::source_for(&self.config.source, &self.config.user_agent, self.config.timeout());
    TemplateLoader::new(source, self.config.cache_store())
  }

  /// Load through `loader`, honoring `--refresh`
  pub async fn load(&self, loader: &TemplateLoader) -> Result<Loaded> {
    let loaded = if self.refresh {
      let document = loader.refresh().await;
      document.map(|document| Loaded { document, origin: Origin::Network, revalidation: None })
    } else {
      loader.load().await
    };

    let loaded = loaded.with_context(|| format!("Failed to load templates from {}", self.config.source))?;
    tracing::debug!(origin = ?loaded.origin, "templates loaded");
    Ok(loaded)
  }

  /// Load and index into a fresh state seeded with `criteria` and `view`
  pub async fn load_state(&self, criteria: Criteria, view: ViewMode) -> Result<(AppState, Option<JoinHandle<()>>)> {
    let loaded = self.load(&self.loader()).await?;
    let mut state = AppState::new(criteria, view);
    state.apply_document(&loaded.document).context("Templates document is malformed")?;
    Ok((state, loaded.revalidation))
  }
}

/// Let a background refresh finish so the cache is current for the next run
async fn settle(revalidation: Option<JoinHandle<()>>) {
  if let Some(handle) = revalidation {
    if let Err(e) = handle.await {
      tracing::debug!(error = %e, "revalidation task did not complete");
    }
  }
}

pub fn print_warnings(state: &AppState) {
  let warnings = state.warnings();
  if !warnings.is_empty() {
    lookout::notice(&display::format_warnings(warnings, WARNING_LIMIT));
  }
}

/// Print the filtered list
pub async fn list(ctx: &Context, filters: &Filters, show_warnings: bool) -> Result<()> {
  let (criteria, view) = filters.resolve();
  let (state, revalidation) = ctx.load_state(criteria, view).await?;

  if show_warnings {
    print_warnings(&state);
  }

  let rendered = state.rendered();
  print!("{}", display::format_list(&rendered, state.view(), lookout::terminal_width()));
  lookout::info!("{}", display::format_summary(rendered.total, state.records().len()));
  if !state.location().query().is_empty() {
    lookout::verbose!("link: {}", state.location().href());
  }

  settle(revalidation).await;
  Ok(())
}

/// Look a template up by name or title, or by a `name=` query string
fn select(state: &AppState, name: &str) -> Result<RenderedDetail> {
  let name = if name.contains('=') {
    url_state::deep_link_name(name).unwrap_or_default()
  } else {
    name.trim().to_string()
  };
  Ok(state.select(&name)?)
}

async fn with_template<F>(ctx: &Context, name: &str, print: F) -> Result<()>
where
  F: FnOnce(&RenderedDetail),
{
  let (state, revalidation) = ctx.load_state(Criteria::default(), ViewMode::default()).await?;
  let detail = select(&state, name)?;
  print(&detail);
  settle(revalidation).await;
  Ok(())
}

/// Detail view of one template
pub async fn show(ctx: &Context, name: &str) -> Result<()> {
  with_template(ctx, name, |detail| {
    print!("{}", display::format_detail(detail, lookout::terminal_width()));
  })
  .await
}

/// `docker run` command for one template
pub async fn run(ctx: &Context, name: &str) -> Result<()> {
  with_template(ctx, name, |detail| println!("{}", detail.run_command)).await
}

/// Compose file for one template
pub async fn compose(ctx: &Context, name: &str) -> Result<()> {
  with_template(ctx, name, |detail| print!("{}", detail.compose_file)).await
}

/// Every category with the number of templates in it
pub async fn categories(ctx: &Context) -> Result<()> {
  let (state, revalidation) = ctx.load_state(Criteria::default(), ViewMode::default()).await?;

  let counts = category_counts(state.records());
  if counts.is_empty() {
    lookout::info!("No categories found");
  }
  for (category, count) in counts {
    println!("{} {}", category, format!("({count})").dimmed());
  }

  let types = indexer::type_counts(state.records());
  let summary = types.iter().map(|(kind, count)| format!("{count} {kind}")).collect::<Vec<_>>().join(", ");
  lookout::verbose!("{summary}");

  settle(revalidation).await;
  Ok(())
}

/// Categories in display order with their record counts
pub fn category_counts(records: &[Template]) -> Vec<(String, usize)> {
  let mut counts = std::collections::BTreeMap::<&str, usize>::new();
  for record in records {
    for category in &record.categories {
      *counts.entry(category.as_str()).or_default() += 1;
    }
  }
  counts.into_iter().map(|(category, count)| (category.to_string(), count)).collect()
}

/// Print the shareable query string for a set of filters
pub fn link(filters: &Filters) -> Result<()> {
  let (criteria, view) = filters.resolve();
  let query = url_state::serialize(&criteria, view);
  if query.is_empty() {
    lookout::info!("Default view; nothing to share");
  } else {
    println!("?{query}");
  }
  Ok(())
}

/// Add Docker Hub and GitHub metadata to a templates file
pub async fn enrich(config: &Config, file: &Path, output: Option<&Path>) -> Result<()> {
  lookout::info!("Loading templates from {}", file.display());
  let text = tokio::fs::read_to_string(file)
    .await
    .with_context(|| format!("Failed to read {}", file.display()))?;
  let document = Document::from_json(&text).with_context(|| format!("{} is not a templates document", file.display()))?;
  lookout::info!("Found {} templates to process", document.templates()?.len());

  let enricher = Enricher::new(&config.user_agent, Duration::from_millis(config.request_delay_ms), config.timeout());
  let (document, summary) = enricher.enrich_document(document).await?;

  let target: PathBuf = output.unwrap_or(file).to_path_buf();
  lookout::info!("Writing enriched data to {}", target.display());
  tokio::fs::write(&target, format!("{}\n", document.to_json_pretty()))
    .await
    .with_context(|| format!("Failed to write {}", target.display()))?;

  lookout::success!("Enriched {}/{} templates", summary.enriched, summary.total);
  Ok(())
}

/// Remove the cached templates document
pub fn clear_cache(config: &Config) -> Result<()> {
  let cache = config.cache_store();
  let removed = cache.clear().with_context(|| format!("Failed to remove {}", cache.path().display()))?;
  if removed {
    lookout::success!("Removed cache {}", cache.path().display());
  } else {
    lookout::info!("No cache at {}", cache.path().display());
  }
  Ok(())
}
