//! Dockyard - container template catalog
//!
//! Loads a Portainer-style templates document (with a local expiring cache),
//! indexes it for search, filters and sorts it, and renders list and detail
//! views together with ready-to-paste `docker run` and Compose snippets.

pub mod artifact;
pub mod browse;
pub mod cache;
pub mod commands;
pub mod config;
pub mod display;
pub mod enrich;
pub mod error;
pub mod indexer;
pub mod loader;
pub mod query;
pub mod render;
pub mod state;
pub mod template;
pub mod url_state;

pub use error::{CatalogError, Result};
pub use query::{Criteria, SortKey};
pub use template::{Document, Template};
pub use url_state::ViewMode;
