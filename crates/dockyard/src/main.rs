use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use dockyard::browse;
use dockyard::commands::{self, Context, Filters};
use dockyard::config::Config;

#[derive(Parser)]
#[command(name = "dockyard")]
#[command(about = "Dockyard - container template catalog\nSearch, inspect and deploy Portainer-style templates")]
#[command(version)]
struct Cli {
  /// Templates document URL or file (overrides config and DOCKYARD_SOURCE)
  #[arg(long, global = true)]
  source: Option<String>,

  /// Config file to use instead of the default locations
  #[arg(long, global = true)]
  config: Option<PathBuf>,

  /// Ignore the cache and fetch the templates now
  #[arg(long, global = true)]
  refresh: bool,

  /// Show debug output
  #[arg(long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// List templates matching the filters
  List {
    #[command(flatten)]
    filters: Filters,
    /// Don't print the validation warnings banner
    #[arg(long)]
    no_warnings: bool,
  },
  /// Show one template in detail
  Show {
    /// Template name or title, or a `name=` link
    name: String,
  },
  /// Print the `docker run` command for a template
  Run {
    /// Template name or title
    name: String,
  },
  /// Print a docker-compose.yml for a template
  Compose {
    /// Template name or title
    name: String,
  },
  /// List all categories
  Categories,
  /// Print the shareable query string for a set of filters
  Link {
    #[command(flatten)]
    filters: Filters,
  },
  /// Browse the catalog interactively
  Browse {
    /// Start from a shared query string
    #[arg(long)]
    link: Option<String>,
  },
  /// Add Docker Hub and GitHub metadata to a templates file
  Enrich {
    /// Templates file to enrich
    file: PathBuf,
    /// Write here instead of overwriting FILE
    #[arg(short, long)]
    output: Option<PathBuf>,
  },
  /// Manage the local templates cache
  Cache {
    #[command(subcommand)]
    action: CacheAction,
  },
}

#[derive(Subcommand)]
enum CacheAction {
  /// Remove the cached templates document
  Clear,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
  let cli = Cli::parse();
  lookout::init_tracing(cli.verbose);
  lookout::set_verbose(cli.verbose);

  if let Err(e) = run(cli).await {
    lookout::error!("{e:#}");
    std::process::exit(1);
  }
}

async fn run(cli: Cli) -> Result<()> {
  let mut config = Config::load(cli.config.as_deref())?;
  if let Some(source) = cli.source {
    config.source = source;
  }
  let ctx = Context::new(config, cli.refresh);

  match cli.command {
    Commands::List { filters, no_warnings } => {
      commands::list(&ctx, &filters, !no_warnings).await?;
    }
    Commands::Show { name } => {
      commands::show(&ctx, &name).await?;
    }
    Commands::Run { name } => {
      commands::run(&ctx, &name).await?;
    }
    Commands::Compose { name } => {
      commands::compose(&ctx, &name).await?;
    }
    Commands::Categories => {
      commands::categories(&ctx).await?;
    }
    Commands::Link { filters } => {
      commands::link(&filters)?;
    }
    Commands::Browse { link } => {
      let input = tokio::io::BufReader::new(tokio::io::stdin());
      browse::run(&ctx, link.as_deref(), input, std::io::stdout()).await?;
    }
    Commands::Enrich { file, output } => {
      commands::enrich(&ctx.config, &file, output.as_deref()).await?;
    }
    Commands::Cache { action: CacheAction::Clear } => {
      commands::clear_cache(&ctx.config)?;
    }
  }

  Ok(())
}
