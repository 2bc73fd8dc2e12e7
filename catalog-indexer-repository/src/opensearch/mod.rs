//! OpenSearch implementation of the search backend.
//!
//! This module provides a concrete implementation of `SearchBackend`
//! using OpenSearch as the backend, plus the index mappings it creates.

mod index_config;
mod provider;

pub use index_config::{get_index_settings, IndexFamily};
pub use provider::OpenSearchBackend;
