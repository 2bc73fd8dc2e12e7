//! Search backend trait definition.
//!
//! This module defines the thin transport to the document search backend,
//! allowing for different implementations (OpenSearch, in-memory, mocks).

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::SearchBackendError;
use crate::types::AliasAction;

/// Abstracts the underlying document search backend.
///
/// Implementations are injected into `BackendClient`, which adds availability
/// checks, id validation and logging on top. Every name argument may be a
/// physical index name or an alias that resolves to exactly one index.
///
/// All methods return `Result<T, SearchBackendError>` for consistent error
/// handling across implementations.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Check that the backend answers.
    async fn ping(&self) -> Result<(), SearchBackendError>;

    /// Whether a physical index (or alias) with this name exists.
    async fn index_exists(&self, index: &str) -> Result<bool, SearchBackendError>;

    /// Create a physical index with the given settings/mappings body.
    ///
    /// Creating an index that already exists is not an error.
    async fn create_index(&self, index: &str, body: &Value) -> Result<(), SearchBackendError>;

    /// Delete a physical index. Deleting a missing index is not an error.
    async fn delete_index(&self, index: &str) -> Result<(), SearchBackendError>;

    /// List physical index names matching a pattern with a trailing `*`
    /// wildcard (e.g. `wyvr_product_1_v*`).
    async fn list_indices(&self, pattern: &str) -> Result<Vec<String>, SearchBackendError>;

    /// Physical indices the alias currently points to (empty if the alias does
    /// not exist).
    async fn alias_targets(&self, alias: &str) -> Result<Vec<String>, SearchBackendError>;

    /// Apply all alias actions as one request that succeeds or fails as a whole.
    async fn update_aliases(&self, actions: &[AliasAction]) -> Result<(), SearchBackendError>;

    /// Store `body` under `id`, overwriting any previous document with that id.
    async fn index_document(
        &self,
        index: &str,
        id: &str,
        body: &Value,
    ) -> Result<(), SearchBackendError>;

    /// Fetch the stored source of a document, `None` if absent.
    async fn get_document(&self, index: &str, id: &str)
        -> Result<Option<Value>, SearchBackendError>;

    /// Delete a document. Returns `false` if it did not exist.
    async fn delete_document(&self, index: &str, id: &str) -> Result<bool, SearchBackendError>;

    /// Read every document source of an index, paginating through result
    /// sets larger than `page_size`.
    async fn scan_documents(
        &self,
        index: &str,
        page_size: usize,
    ) -> Result<Vec<Value>, SearchBackendError>;

    /// Number of documents in an index.
    async fn count_documents(&self, index: &str) -> Result<u64, SearchBackendError>;
}
