//! OpenSearch backend implementation.
//!
//! This module provides the concrete implementation of `SearchBackend`
//! using the OpenSearch Rust crate.

use async_trait::async_trait;
use opensearch::{
    http::response::Response,
    http::transport::{SingleNodeConnectionPool, TransportBuilder},
    indices::{
        IndicesCreateParts, IndicesDeleteParts, IndicesExistsParts, IndicesGetAliasParts,
        IndicesGetParts,
    },
    ClearScrollParts, CountParts, DeleteParts, GetParts, IndexParts, OpenSearch, ScrollParts,
    SearchParts,
};
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::config::BackendConfig;
use crate::errors::SearchBackendError;
use crate::interfaces::SearchBackend;
use crate::types::AliasAction;

/// How long a scroll context is kept alive between pages.
const SCROLL_KEEP_ALIVE: &str = "1m";

/// OpenSearch backend implementation.
///
/// # Example
///
/// ```ignore
/// use catalog_indexer_repository::{BackendConfig, OpenSearchBackend};
///
/// let backend = OpenSearchBackend::new(&BackendConfig::with_url("http://localhost:9200"))?;
/// backend.index_document("wyvr_product_1", "7", &json!({"id": 7})).await?;
/// ```
pub struct OpenSearchBackend {
    client: OpenSearch,
}

impl OpenSearchBackend {
    /// Create a new OpenSearch backend for the configured URL.
    ///
    /// No request is sent here; reachability is checked by `ping`.
    ///
    /// # Returns
    ///
    /// * `Ok(OpenSearchBackend)` - A new backend instance
    /// * `Err(SearchBackendError)` - If the url is missing or invalid
    pub fn new(config: &BackendConfig) -> Result<Self, SearchBackendError> {
        let url = config
            .url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or(SearchBackendError::NotConfigured)?;
        let parsed_url =
            Url::parse(url).map_err(|e| SearchBackendError::connection(e.to_string()))?;

        let conn_pool = SingleNodeConnectionPool::new(parsed_url);
        let transport = TransportBuilder::new(conn_pool)
            .disable_proxy()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| SearchBackendError::connection(e.to_string()))?;

        info!(
            url = %url,
            timeout_secs = config.request_timeout.as_secs(),
            "Created OpenSearch backend"
        );

        Ok(Self {
            client: OpenSearch::new(transport),
        })
    }

    /// Turn a non-success response into an error, logging the body.
    async fn check(
        response: Response,
        operation: &str,
        make_error: fn(String) -> SearchBackendError,
    ) -> Result<Response, SearchBackendError> {
        let status = response.status_code();
        if status.is_success() {
            return Ok(response);
        }
        let error_body = response.text().await.unwrap_or_default();
        error!(status = %status, body = %error_body, operation, "OpenSearch request failed");
        Err(make_error(format!(
            "{} failed with status {}: {}",
            operation, status, error_body
        )))
    }

    async fn json(response: Response) -> Result<Value, SearchBackendError> {
        response
            .json::<Value>()
            .await
            .map_err(|e| SearchBackendError::parse(e.to_string()))
    }

    /// Collect the `_source` of every hit in a search/scroll response.
    fn hit_sources(body: &Value) -> Vec<Value> {
        body["hits"]["hits"]
            .as_array()
            .map(|hits| {
                hits.iter()
                    .filter_map(|hit| hit.get("_source").cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Index names are the top-level keys of get-index and get-alias responses.
    fn object_keys(body: &Value) -> Vec<String> {
        body.as_object()
            .map(|map| map.keys().cloned().collect())
            .unwrap_or_default()
    }

    async fn clear_scroll(&self, scroll_id: &str) {
        let result = self
            .client
            .clear_scroll(ClearScrollParts::None)
            .body(json!({ "scroll_id": [scroll_id] }))
            .send()
            .await;
        if let Err(e) = result {
            warn!(error = %e, "Failed to clear scroll context");
        }
    }
}

#[async_trait]
impl SearchBackend for OpenSearchBackend {
    async fn ping(&self) -> Result<(), SearchBackendError> {
        let response = self
            .client
            .ping()
            .send()
            .await
            .map_err(|e| SearchBackendError::connection(e.to_string()))?;
        Self::check(response, "ping", SearchBackendError::connection).await?;
        Ok(())
    }

    async fn index_exists(&self, index: &str) -> Result<bool, SearchBackendError> {
        let response = self
            .client
            .indices()
            .exists(IndicesExistsParts::Index(&[index]))
            .send()
            .await
            .map_err(|e| SearchBackendError::connection(e.to_string()))?;
        let status = response.status_code();
        if status.as_u16() == 404 {
            return Ok(false);
        }
        Self::check(response, "index exists", SearchBackendError::index_management).await?;
        Ok(true)
    }

    async fn create_index(&self, index: &str, body: &Value) -> Result<(), SearchBackendError> {
        let response = self
            .client
            .indices()
            .create(IndicesCreateParts::Index(index))
            .body(body.clone())
            .send()
            .await
            .map_err(|e| SearchBackendError::index_management(e.to_string()))?;

        let status = response.status_code();
        if status.as_u16() == 400 {
            let error_body = response.text().await.unwrap_or_default();
            if error_body.contains("resource_already_exists_exception") {
                debug!(index = %index, "Index already exists");
                return Ok(());
            }
            error!(status = %status, body = %error_body, "Create index failed");
            return Err(SearchBackendError::index_management(format!(
                "Create index {} failed with status {}: {}",
                index, status, error_body
            )));
        }
        Self::check(response, "create index", SearchBackendError::index_management).await?;
        info!(index = %index, "Created index");
        Ok(())
    }

    async fn delete_index(&self, index: &str) -> Result<(), SearchBackendError> {
        let response = self
            .client
            .indices()
            .delete(IndicesDeleteParts::Index(&[index]))
            .send()
            .await
            .map_err(|e| SearchBackendError::index_management(e.to_string()))?;
        if response.status_code().as_u16() == 404 {
            return Ok(());
        }
        Self::check(response, "delete index", SearchBackendError::index_management).await?;
        info!(index = %index, "Deleted index");
        Ok(())
    }

    async fn list_indices(&self, pattern: &str) -> Result<Vec<String>, SearchBackendError> {
        let response = self
            .client
            .indices()
            .get(IndicesGetParts::Index(&[pattern]))
            .send()
            .await
            .map_err(|e| SearchBackendError::connection(e.to_string()))?;
        if response.status_code().as_u16() == 404 {
            return Ok(Vec::new());
        }
        let response = Self::check(response, "get indices", SearchBackendError::read).await?;
        let mut names = Self::object_keys(&Self::json(response).await?);
        names.sort();
        Ok(names)
    }

    async fn alias_targets(&self, alias: &str) -> Result<Vec<String>, SearchBackendError> {
        let response = self
            .client
            .indices()
            .get_alias(IndicesGetAliasParts::Name(&[alias]))
            .send()
            .await
            .map_err(|e| SearchBackendError::connection(e.to_string()))?;
        if response.status_code().as_u16() == 404 {
            return Ok(Vec::new());
        }
        let response = Self::check(response, "get alias", SearchBackendError::alias).await?;
        let mut names = Self::object_keys(&Self::json(response).await?);
        names.sort();
        Ok(names)
    }

    async fn update_aliases(&self, actions: &[AliasAction]) -> Result<(), SearchBackendError> {
        let actions: Vec<Value> = actions.iter().map(AliasAction::to_body).collect();
        let response = self
            .client
            .indices()
            .update_aliases()
            .body(json!({ "actions": actions }))
            .send()
            .await
            .map_err(|e| SearchBackendError::alias(e.to_string()))?;
        Self::check(response, "update aliases", SearchBackendError::alias).await?;
        Ok(())
    }

    async fn index_document(
        &self,
        index: &str,
        id: &str,
        body: &Value,
    ) -> Result<(), SearchBackendError> {
        let response = self
            .client
            .index(IndexParts::IndexId(index, id))
            .body(body.clone())
            .send()
            .await
            .map_err(|e| SearchBackendError::index(e.to_string()))?;
        Self::check(response, "index document", SearchBackendError::index).await?;
        debug!(index = %index, doc_id = %id, "Document indexed");
        Ok(())
    }

    async fn get_document(
        &self,
        index: &str,
        id: &str,
    ) -> Result<Option<Value>, SearchBackendError> {
        let response = self
            .client
            .get(GetParts::IndexId(index, id))
            .send()
            .await
            .map_err(|e| SearchBackendError::read(e.to_string()))?;
        if response.status_code().as_u16() == 404 {
            return Ok(None);
        }
        let response = Self::check(response, "get document", SearchBackendError::read).await?;
        let body = Self::json(response).await?;
        Ok(body.get("_source").cloned())
    }

    async fn delete_document(&self, index: &str, id: &str) -> Result<bool, SearchBackendError> {
        let response = self
            .client
            .delete(DeleteParts::IndexId(index, id))
            .send()
            .await
            .map_err(|e| SearchBackendError::delete(e.to_string()))?;

        // 404 is acceptable - document may not exist
        if response.status_code().as_u16() == 404 {
            return Ok(false);
        }
        Self::check(response, "delete document", SearchBackendError::delete).await?;
        debug!(index = %index, doc_id = %id, "Document deleted");
        Ok(true)
    }

    async fn scan_documents(
        &self,
        index: &str,
        page_size: usize,
    ) -> Result<Vec<Value>, SearchBackendError> {
        let response = self
            .client
            .search(SearchParts::Index(&[index]))
            .scroll(SCROLL_KEEP_ALIVE)
            .size(page_size.max(1) as i64)
            .body(json!({
                "query": { "match_all": {} },
                "sort": ["_doc"]
            }))
            .send()
            .await
            .map_err(|e| SearchBackendError::read(e.to_string()))?;
        if response.status_code().as_u16() == 404 {
            return Ok(Vec::new());
        }
        let response = Self::check(response, "search", SearchBackendError::read).await?;
        let mut body = Self::json(response).await?;
        let mut documents = Vec::new();

        loop {
            let page = Self::hit_sources(&body);
            let scroll_id = body["_scroll_id"].as_str().map(str::to_string);
            if page.is_empty() {
                if let Some(scroll_id) = scroll_id {
                    self.clear_scroll(&scroll_id).await;
                }
                break;
            }
            documents.extend(page);

            let Some(scroll_id) = scroll_id else {
                break;
            };
            let response = self
                .client
                .scroll(ScrollParts::None)
                .body(json!({
                    "scroll": SCROLL_KEEP_ALIVE,
                    "scroll_id": scroll_id
                }))
                .send()
                .await
                .map_err(|e| SearchBackendError::read(e.to_string()))?;
            let response = Self::check(response, "scroll", SearchBackendError::read).await?;
            body = Self::json(response).await?;
        }

        debug!(index = %index, count = documents.len(), "Scanned index");
        Ok(documents)
    }

    async fn count_documents(&self, index: &str) -> Result<u64, SearchBackendError> {
        let response = self
            .client
            .count(CountParts::Index(&[index]))
            .send()
            .await
            .map_err(|e| SearchBackendError::read(e.to_string()))?;
        if response.status_code().as_u16() == 404 {
            return Ok(0);
        }
        let response = Self::check(response, "count", SearchBackendError::read).await?;
        let body = Self::json(response).await?;
        body["count"]
            .as_u64()
            .ok_or_else(|| SearchBackendError::parse("count response has no count"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_requires_url() {
        let result = OpenSearchBackend::new(&BackendConfig::default());
        assert!(matches!(result, Err(SearchBackendError::NotConfigured)));
    }

    #[test]
    fn test_new_rejects_invalid_url() {
        let result = OpenSearchBackend::new(&BackendConfig::with_url("not a url"));
        assert!(matches!(result, Err(SearchBackendError::ConnectionError(_))));
    }

    #[test]
    fn test_hit_sources() {
        let body = json!({
            "_scroll_id": "abc",
            "hits": {"hits": [
                {"_id": "1", "_source": {"id": 1}},
                {"_id": "2"},
                {"_id": "3", "_source": {"id": 3}}
            ]}
        });
        let sources = OpenSearchBackend::hit_sources(&body);
        assert_eq!(sources, vec![json!({"id": 1}), json!({"id": 3})]);
        assert!(OpenSearchBackend::hit_sources(&json!({})).is_empty());
    }

    #[test]
    fn test_object_keys() {
        let body = json!({
            "wyvr_product_1_v2": {"aliases": {"wyvr_product_1": {}}},
            "wyvr_product_1_v1": {"aliases": {}}
        });
        let mut keys = OpenSearchBackend::object_keys(&body);
        keys.sort();
        assert_eq!(keys, vec!["wyvr_product_1_v1", "wyvr_product_1_v2"]);
    }
}
