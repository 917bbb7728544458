//! Interactive catalog session.
//!
//! Plain lines are free-text filters, applied after the debounce window so a
//! burst of edits results in one query. Lines starting with `:` are commands.
//! A fresh document from background revalidation re-runs index, query and
//! render without user input.

use anyhow::Result;
use std::io::Write;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::time::Instant;

use crate::commands::{Context, WARNING_LIMIT};
use crate::display;
use crate::loader::TemplateLoader;
use crate::query::SortKey;
use crate::state::AppState;
use crate::url_state::ViewMode;

pub const HELP: &str = "\
Type words to filter; every word must match.
  :cat [NAME]       filter by category (no name clears)
  :type [1|2|3]     filter by type (no value clears)
  :sort KEY         name-asc, name-desc or category
  :view MODE        grid, list or compact
  :show NAME        template details
  :run NAME         docker run command
  :compose NAME     docker-compose.yml
  :categories       list categories
  :link             shareable query string
  :dismiss          hide validation warnings
  :retry            fetch the templates again
  :reset            clear all filters
  :help             this text
  :quit             leave";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
  Search(String),
  Category(String),
  Type(Option<i64>),
  Sort(SortKey),
  View(ViewMode),
  Show(String),
  Run(String),
  Compose(String),
  Categories,
  Link,
  Dismiss,
  Retry,
  Reset,
  Help,
  Quit,
}

/// Parse one input line
pub fn parse_command(line: &str) -> std::result::Result<Command, String> {
  let line = line.trim();
  let Some(rest) = line.strip_prefix(':') else {
    return Ok(Command::Search(line.to_string()));
  };

  let (word, arg) = match rest.trim().split_once(char::is_whitespace) {
    Some((word, arg)) => (word, arg.trim()),
    None => (rest.trim(), ""),
  };

  let required = |what: &str| {
    if arg.is_empty() {
      Err(format!(":{word} needs {what}"))
    } else {
      Ok(arg.to_string())
    }
  };

  match word {
    "cat" | "category" => Ok(Command::Category(arg.to_string())),
    "type" => {
      if arg.is_empty() {
        Ok(Command::Type(None))
      } else {
        arg.parse().map(|t| Command::Type(Some(t))).map_err(|_| format!("'{arg}' is not a template type"))
      }
    }
    "sort" => required("a sort key")?.parse().map(Command::Sort),
    "view" => required("a view mode")?.parse().map(Command::View),
    "show" => required("a template name").map(Command::Show),
    "run" => required("a template name").map(Command::Run),
    "compose" => required("a template name").map(Command::Compose),
    "categories" => Ok(Command::Categories),
    "link" => Ok(Command::Link),
    "dismiss" => Ok(Command::Dismiss),
    "retry" => Ok(Command::Retry),
    "reset" => Ok(Command::Reset),
    "help" | "h" | "?" => Ok(Command::Help),
    "quit" | "q" | "exit" => Ok(Command::Quit),
    other => Err(format!("unknown command ':{other}' (try :help)")),
  }
}

/// One interactive session writing to `out`
pub struct Session<W: Write> {
  state: AppState,
  loader: TemplateLoader,
  out: W,
  width: usize,
}

impl<W: Write> Session<W> {
  pub fn new(state: AppState, loader: TemplateLoader, out: W, width: usize) -> Self {
    Self { state, loader, out, width }
  }

  pub fn state(&self) -> &AppState {
    &self.state
  }

  pub fn into_output(self) -> W {
    self.out
  }

  fn report_load_error(&mut self, error: &anyhow::Error) -> Result<()> {
    lookout::error!("{error:#}");
    writeln!(self.out, "Templates could not be loaded. Type :retry to try again.")?;
    Ok(())
  }

  /// Warnings banner, list and summary for the current state
  pub fn render(&mut self) -> Result<()> {
    let warnings = self.state.warnings();
    if !warnings.is_empty() {
      let border = lookout::banner_line(60, '-');
      writeln!(self.out, "{border}\n{}\n(:dismiss to hide)\n{border}", display::format_warnings(warnings, WARNING_LIMIT))?;
    }

    let rendered = self.state.rendered();
    write!(self.out, "{}", display::format_list(&rendered, self.state.view(), self.width))?;
    writeln!(self.out, "{}", display::format_summary(rendered.total, self.state.records().len()))?;
    Ok(())
  }

  /// Run one command; `false` ends the session
  pub async fn execute(&mut self, command: Command) -> Result<bool> {
    match command {
      Command::Search(text) => {
        self.state.set_text(&text);
      }
      Command::Category(category) => {
        self.state.set_category(&category);
      }
      Command::Type(template_type) => {
        self.state.set_type(template_type);
      }
      Command::Sort(sort) => {
        self.state.set_sort(sort);
      }
      Command::View(view) => {
        self.state.set_view(view);
      }
      Command::Show(name) => match self.state.select(&name) {
        Ok(detail) => write!(self.out, "{}", display::format_detail(&detail, self.width))?,
        Err(e) => lookout::warn!("{e}"),
      },
      Command::Run(name) => match self.state.select(&name) {
        Ok(detail) => writeln!(self.out, "{}", detail.run_command)?,
        Err(e) => lookout::warn!("{e}"),
      },
      Command::Compose(name) => match self.state.select(&name) {
        Ok(detail) => write!(self.out, "{}", detail.compose_file)?,
        Err(e) => lookout::warn!("{e}"),
      },
      Command::Categories => {
        for category in self.state.categories() {
          writeln!(self.out, "{category}")?;
        }
      }
      Command::Link => {
        let href = self.state.location().href();
        writeln!(self.out, "{}", if href.is_empty() { "(default view)" } else { href.as_str() })?;
      }
      Command::Dismiss => self.state.dismiss_warnings(),
      Command::Retry => match self.loader.refresh().await {
        Ok(document) => {
          if let Err(e) = self.state.apply_document(&document) {
            self.report_load_error(&e.into())?;
          }
        }
        Err(e) => self.report_load_error(&e.into())?,
      },
      Command::Reset => {
        self.state.reset();
      }
      Command::Help => writeln!(self.out, "{HELP}")?,
      Command::Quit => return Ok(false),
    }
    Ok(true)
  }
}

/// Run the interactive session until `:quit` or end of input
pub async fn run<R, W>(ctx: &Context, link: Option<&str>, input: R, out: W) -> Result<W>
where
  R: AsyncBufRead + Unpin,
  W: Write,
{
  let loader = ctx.loader();
  let mut updates = loader.subscribe();
  let state = AppState::from_query(link.unwrap_or(""));
  let mut changes = state.subscribe();
  let debounce = Duration::from_millis(ctx.config.debounce_ms);

  let mut session = Session::new(state, loader.clone(), out, lookout::terminal_width());

  match ctx.load(&loader).await {
    Ok(loaded) => {
      if let Err(e) = session.state.apply_document(&loaded.document) {
        session.report_load_error(&e.into())?;
      }
    }
    Err(e) => session.report_load_error(&e)?,
  }
  changes.borrow_and_update();
  session.render()?;

  let mut lines = input.lines();
  let mut pending: Option<String> = None;
  let mut deadline: Option<Instant> = None;

  loop {
    let mut keep_going = true;

    tokio::select! {
      line = lines.next_line() => {
        match line? {
          Some(line) => match parse_command(&line) {
            Ok(Command::Search(text)) => {
              pending = Some(text);
              deadline = Some(Instant::now() + debounce);
            }
            Ok(command) => {
              if let Some(text) = pending.take() {
                deadline = None;
                session.execute(Command::Search(text)).await?;
              }
              keep_going = session.execute(command).await?;
            }
            Err(message) => lookout::warn!("{message}"),
          },
          None => {
            if let Some(text) = pending.take() {
              session.execute(Command::Search(text)).await?;
            }
            keep_going = false;
          }
        }
      }
      _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
        deadline = None;
        if let Some(text) = pending.take() {
          session.execute(Command::Search(text)).await?;
        }
      }
      Ok(()) = updates.changed() => {
        let snapshot = updates.borrow_and_update().clone();
        if let Some(document) = snapshot {
          tracing::debug!("applying revalidated templates");
          if let Err(e) = session.state.apply_document(&document) {
            tracing::debug!(error = %e, "revalidated document rejected");
          }
        }
      }
    }

    if changes.has_changed().unwrap_or(false) {
      changes.borrow_and_update();
      session.render()?;
    }

    if !keep_going {
      break;
    }
  }

  Ok(session.into_output())
}
