use thiserror::Error;

/// Failures surfaced by the catalog pipeline.
///
/// Every variant is terminal for the operation that raised it and never for
/// the process: callers show the message and offer a retry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
  #[error("Template source answered with HTTP {status}")]
  Network { status: u16 },

  #[error("Could not reach template source: {message}")]
  Transport { message: String },

  #[error("Template document is not valid JSON: {message}")]
  Parse { message: String },

  #[error("Template document has an unexpected shape: {message}")]
  Shape { message: String },

  #[error("No template named '{name}'")]
  NotFound { name: String },

  #[error("Could not read template source: {message}")]
  Io { message: String },
}

impl CatalogError {
  pub fn network(status: u16) -> Self {
    Self::Network { status }
  }

  pub fn transport(message: impl Into<String>) -> Self {
    Self::Transport { message: message.into() }
  }

  pub fn parse(message: impl Into<String>) -> Self {
    Self::Parse { message: message.into() }
  }

  pub fn shape(message: impl Into<String>) -> Self {
    Self::Shape { message: message.into() }
  }

  pub fn not_found(name: impl Into<String>) -> Self {
    Self::NotFound { name: name.into() }
  }

  pub fn io(message: impl Into<String>) -> Self {
    Self::Io { message: message.into() }
  }

  /// Fetch failures of either kind (status or transport)
  pub fn is_network(&self) -> bool {
    matches!(self, Self::Network { .. } | Self::Transport { .. })
  }
}

pub type Result<T> = std::result::Result<T, CatalogError>;
