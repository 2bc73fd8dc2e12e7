//! Backend client.
//!
//! This module provides the handle the synchronizer uses for every backend
//! call. It adds the "not configured" short-circuit, id validation and
//! create-if-missing on top of a `SearchBackend`.
//!
//! # Note on Writes
//!
//! There is no separate create: `upsert` creates the target index when it is
//! missing and overwrites any document with the same id.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::BackendConfig;
use crate::errors::SearchBackendError;
use crate::interfaces::SearchBackend;
use crate::opensearch::{get_index_settings, IndexFamily, OpenSearchBackend};
use crate::types::AliasAction;
use crate::utils::{document_id, version_pattern};

/// The main handle for interacting with the search backend.
///
/// Cloning is cheap; clones share the same backend. A client without a backend
/// is "not configured": every call fails with `SearchBackendError::NotConfigured`
/// and `is_available` is always `false`.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use catalog_indexer_repository::{BackendClient, BackendConfig, InMemoryBackend};
///
/// let client = BackendClient::new(Arc::new(InMemoryBackend::new()), BackendConfig::default());
/// assert!(client.is_configured());
/// assert!(!BackendClient::unconfigured().is_configured());
/// ```
#[derive(Clone)]
pub struct BackendClient {
    backend: Option<Arc<dyn SearchBackend>>,
    config: BackendConfig,
}

impl BackendClient {
    /// Create a client over an existing backend.
    pub fn new(backend: Arc<dyn SearchBackend>, config: BackendConfig) -> Self {
        Self {
            backend: Some(backend),
            config,
        }
    }

    /// A client with no backend.
    pub fn unconfigured() -> Self {
        Self {
            backend: None,
            config: BackendConfig::default(),
        }
    }

    /// Build an OpenSearch-backed client from configuration.
    ///
    /// A missing url or an url that cannot be turned into a transport yields an
    /// unconfigured client; the reason is logged.
    pub fn from_config(config: &BackendConfig) -> Self {
        if !config.is_configured() {
            info!("No search backend configured, synchronization is disabled");
            return Self::unconfigured();
        }
        match OpenSearchBackend::new(config) {
            Ok(backend) => Self::new(Arc::new(backend), config.clone()),
            Err(e) => {
                warn!(error = %e, "Failed to create search backend, synchronization is disabled");
                Self::unconfigured()
            }
        }
    }

    pub fn is_configured(&self) -> bool {
        self.backend.is_some()
    }

    fn backend(&self) -> Result<&Arc<dyn SearchBackend>, SearchBackendError> {
        self.backend.as_ref().ok_or(SearchBackendError::NotConfigured)
    }

    /// Ping the backend. Failures are logged with `context` and reported as
    /// `false`.
    pub async fn is_available(&self, context: &str) -> bool {
        let Some(backend) = self.backend.as_ref() else {
            debug!(context, "Search backend not configured");
            return false;
        };
        match backend.ping().await {
            Ok(()) => true,
            Err(e) => {
                warn!(context, error = %e, "Search backend unavailable");
                false
            }
        }
    }

    pub async fn index_exists(&self, index: &str) -> Result<bool, SearchBackendError> {
        self.backend()?.index_exists(index).await
    }

    /// Create `index` with the settings of `family` unless it already exists.
    pub async fn ensure_index(
        &self,
        index: &str,
        family: IndexFamily,
    ) -> Result<(), SearchBackendError> {
        let backend = self.backend()?;
        if backend.index_exists(index).await? {
            return Ok(());
        }
        backend
            .create_index(index, &get_index_settings(family))
            .await
    }

    /// Write a document, creating the index first if it is missing.
    ///
    /// # Returns
    ///
    /// * `Ok(id)` - The document id that was written
    /// * `Err(SearchBackendError::ValidationError)` - If the body has no `id`;
    ///   nothing is written
    /// * `Err(SearchBackendError)` - If the write fails
    pub async fn upsert(
        &self,
        index: &str,
        family: IndexFamily,
        body: &Value,
    ) -> Result<String, SearchBackendError> {
        let backend = self.backend()?;
        let id = match document_id(body) {
            Ok(id) => id,
            Err(e) => {
                warn!(index = %index, "Rejected document without id");
                return Err(e);
            }
        };
        self.ensure_index(index, family).await?;
        backend.index_document(index, &id, body).await?;
        Ok(id)
    }

    /// Fetch a stored document; a missing index reads as a missing document.
    pub async fn get_document(
        &self,
        index: &str,
        id: &str,
    ) -> Result<Option<Value>, SearchBackendError> {
        let backend = self.backend()?;
        if !backend.index_exists(index).await? {
            return Ok(None);
        }
        backend.get_document(index, id).await
    }

    /// Delete a document by id. Returns `false` when it (or its index) did not
    /// exist.
    pub async fn delete_document(&self, index: &str, id: &str) -> Result<bool, SearchBackendError> {
        let backend = self.backend()?;
        if !backend.index_exists(index).await? {
            return Ok(false);
        }
        backend.delete_document(index, id).await
    }

    /// Read every document of `index` page by page.
    pub async fn scan(&self, index: &str) -> Result<Vec<Value>, SearchBackendError> {
        let backend = self.backend()?;
        if !backend.index_exists(index).await? {
            return Ok(Vec::new());
        }
        backend
            .scan_documents(index, self.config.scroll_page_size)
            .await
    }

    pub async fn count(&self, index: &str) -> Result<u64, SearchBackendError> {
        let backend = self.backend()?;
        if !backend.index_exists(index).await? {
            return Ok(0);
        }
        backend.count_documents(index).await
    }

    /// Delete a physical index.
    pub async fn destroy_index(&self, index: &str) -> Result<(), SearchBackendError> {
        self.backend()?.delete_index(index).await
    }

    /// Every physical `<alias>_v*` index, unsorted.
    pub async fn list_versions(&self, alias: &str) -> Result<Vec<String>, SearchBackendError> {
        self.backend()?.list_indices(&version_pattern(alias)).await
    }

    pub async fn alias_targets(&self, alias: &str) -> Result<Vec<String>, SearchBackendError> {
        self.backend()?.alias_targets(alias).await
    }

    pub async fn update_aliases(&self, actions: &[AliasAction]) -> Result<(), SearchBackendError> {
        self.backend()?.update_aliases(actions).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryBackend;
    use catalog_indexer_shared::EntityKind;
    use serde_json::json;

    const FAMILY: IndexFamily = IndexFamily::Entity(EntityKind::Product);

    fn client() -> (Arc<InMemoryBackend>, BackendClient) {
        let backend = Arc::new(InMemoryBackend::new());
        let client = BackendClient::new(backend.clone(), BackendConfig::default());
        (backend, client)
    }

    #[tokio::test]
    async fn test_upsert_creates_index_and_overwrites() {
        let (backend, client) = client();
        client
            .upsert("wyvr_product_1_v1", FAMILY, &json!({"id": 7, "name": "a"}))
            .await
            .unwrap();
        client
            .upsert("wyvr_product_1_v1", FAMILY, &json!({"id": 7, "name": "b"}))
            .await
            .unwrap();

        let docs = backend.documents("wyvr_product_1_v1").await;
        assert_eq!(docs, vec![json!({"id": 7, "name": "b"})]);
    }

    #[tokio::test]
    async fn test_upsert_without_id_is_rejected() {
        let (backend, client) = client();
        let result = client
            .upsert("wyvr_product_1_v1", FAMILY, &json!({"name": "no id"}))
            .await;
        assert!(matches!(result, Err(SearchBackendError::ValidationError(_))));
        assert!(backend.index_names().await.is_empty());
    }

    #[tokio::test]
    async fn test_reads_on_missing_index() {
        let (_, client) = client();
        assert_eq!(client.get_document("missing", "1").await.unwrap(), None);
        assert!(!client.delete_document("missing", "1").await.unwrap());
        assert!(client.scan("missing").await.unwrap().is_empty());
        assert_eq!(client.count("missing").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unconfigured_client() {
        let client = BackendClient::unconfigured();
        assert!(!client.is_available("test").await);
        let result = client.upsert("x", FAMILY, &json!({"id": 1})).await;
        assert!(matches!(result, Err(SearchBackendError::NotConfigured)));
    }

    #[tokio::test]
    async fn test_from_config_without_url() {
        let client = BackendClient::from_config(&BackendConfig::default());
        assert!(!client.is_configured());
    }
}
