//! # Catalog Indexer Repository
//!
//! This crate provides the transport to the document search backend and the
//! lifecycle of its versioned indices. It includes definitions for errors and
//! the backend trait, an OpenSearch implementation, an in-memory
//! implementation, the `BackendClient` used by the synchronizer and the
//! `IndexVersionManager` that performs blue/green alias cutovers.

pub mod client;
pub mod config;
pub mod errors;
pub mod interfaces;
pub mod memory;
pub mod opensearch;
pub mod types;
pub mod utils;
pub mod versions;

pub use client::BackendClient;
pub use config::BackendConfig;
pub use errors::SearchBackendError;
pub use interfaces::SearchBackend;
pub use memory::InMemoryBackend;
pub use opensearch::{get_index_settings, IndexFamily, OpenSearchBackend};
pub use types::{AliasAction, IndexVersions};
pub use versions::IndexVersionManager;
