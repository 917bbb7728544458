//! Terminal output for the dockyard tools.
//!
//! ## Features
//!
//! - Prefixed log lines on stderr (`[info]`, `[warn]`, `[error]`, `[ok]`, `[verb]`)
//! - Multi-line messages keep the prefix on every line
//! - Banners for notices that should stand out (warning summaries, detail headers)
//! - One-call `tracing` subscriber setup for the binaries
//!
//! Stdout is left alone so command output can be piped.

use colored::*;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

static QUIET: AtomicBool = AtomicBool::new(false);
static VERBOSE: AtomicBool = AtomicBool::new(false);

/// Log level of a prefixed line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
  Verbose,
  Info,
  Warn,
  Error,
  Success,
}

impl Level {
  pub fn tag(self) -> &'static str {
    match self {
      Level::Verbose => "verb",
      Level::Info => "info",
      Level::Warn => "warn",
      Level::Error => "error",
      Level::Success => "ok",
    }
  }

  fn color(self) -> Color {
    match self {
      Level::Verbose => Color::Cyan,
      Level::Info => Color::Blue,
      Level::Warn => Color::Yellow,
      Level::Error => Color::Red,
      Level::Success => Color::Green,
    }
  }

  /// Errors are printed even when output is silenced
  fn always_shown(self) -> bool {
    matches!(self, Level::Error)
  }
}

/// Silence everything but errors (used by `--quiet` style flags and tests)
pub fn set_quiet(quiet: bool) {
  QUIET.store(quiet, Ordering::Relaxed);
}

pub fn is_quiet() -> bool {
  QUIET.load(Ordering::Relaxed)
}

/// Show `[verb]` lines (off by default)
pub fn set_verbose(verbose: bool) {
  VERBOSE.store(verbose, Ordering::Relaxed);
}

pub fn is_verbose() -> bool {
  VERBOSE.load(Ordering::Relaxed)
}

/// Format the colored, padded prefix for a level
pub fn prefix(level: Level) -> String {
  let tag = level.tag();
  let pad = 7usize.saturating_sub(tag.len() + 2);
  format!("[{}]{:<pad$}", tag.color(level.color()).bold(), "", pad = pad)
}

/// Prefix every line of `message` for the given level
pub fn format_lines(level: Level, message: &str) -> Vec<String> {
  let prefix = prefix(level);
  message.lines().map(|line| format!("{prefix} {line}")).collect()
}

/// Write a message to stderr with the level prefix on every line
pub fn emit(level: Level, message: &str) {
  if is_quiet() && !level.always_shown() {
    return;
  }
  if level == Level::Verbose && !is_verbose() {
    return;
  }
  for line in format_lines(level, message) {
    eprintln!("{line}");
  }
}

pub fn verbose(message: &str) {
  emit(Level::Verbose, message);
}

/// General information
pub fn info(message: &str) {
  emit(Level::Info, message);
}

/// Something needs attention but the operation goes on
pub fn warn(message: &str) {
  emit(Level::Warn, message);
}

/// Something went wrong
pub fn error(message: &str) {
  emit(Level::Error, message);
}

pub fn success(message: &str) {
  emit(Level::Success, message);
}

/// A border line of `length` copies of `ch`
pub fn banner_line(length: usize, ch: char) -> String {
  ch.to_string().repeat(length)
}

/// Print `message` between two border lines through `log_fn`
pub fn as_banner<F>(log_fn: F, message: &str, width: Option<usize>, border_char: Option<char>)
where
  F: Fn(&str),
{
  let width = width.unwrap_or(50);
  let border = banner_line(width, border_char.unwrap_or('='));

  log_fn(&border);
  for line in message.lines() {
    log_fn(line);
  }
  log_fn(&border);
}

/// Width of the attached terminal, or 80 when stdout is not a tty
pub fn terminal_width() -> usize {
  let term = console::Term::stdout();
  if term.is_term() {
    term.size().1 as usize
  } else {
    80
  }
}

/// Yellow banner on stderr, used for aggregated warnings
pub fn notice(message: &str) {
  if is_quiet() {
    return;
  }
  as_banner(|msg| eprintln!("{}", msg.yellow().bold()), message, Some(60), Some('-'));
}

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` wins when set; otherwise `verbose` turns on debug events for the
/// dockyard crates and everything else stays at `warn`.
pub fn init_tracing(verbose: bool) {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
    if verbose {
      EnvFilter::new("dockyard=debug,lookout=debug,warn")
    } else {
      EnvFilter::new("warn")
    }
  });

  // A second init (tests, repeated runs in one process) is not an error for us.
  let _ = tracing_subscriber::registry()
    .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
    .with(filter)
    .try_init();
}

#[macro_export]
macro_rules! info {
  ($($arg:tt)*) => {
    $crate::info(&format!($($arg)*))
  };
}

#[macro_export]
macro_rules! warn {
  ($($arg:tt)*) => {
    $crate::warn(&format!($($arg)*))
  };
}

#[macro_export]
macro_rules! error {
  ($($arg:tt)*) => {
    $crate::error(&format!($($arg)*))
  };
}

#[macro_export]
macro_rules! success {
  ($($arg:tt)*) => {
    $crate::success(&format!($($arg)*))
  };
}

#[macro_export]
macro_rules! verbose {
  ($($arg:tt)*) => {
    $crate::verbose(&format!($($arg)*))
  };
}
