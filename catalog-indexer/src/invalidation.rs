//! Pending invalidation queue.
//!
//! Entries are stored in one global index with the document id `scope:key`,
//! so queueing the same key again replaces the pending entry. The `*:*`
//! sentinel tells the downstream cache layer to discard everything.

use catalog_indexer_repository::{BackendClient, IndexFamily, SearchBackendError};
use catalog_indexer_shared::{InvalidationAction, InvalidationPlan, PendingInvalidation};
use serde_json::Value;
use tracing::{debug, error, warn};

/// Writer (and reader, for consumers) of the invalidation queue.
#[derive(Clone)]
pub struct InvalidationQueue {
    client: BackendClient,
    index: String,
}

impl InvalidationQueue {
    pub fn new(client: BackendClient, index: impl Into<String>) -> Self {
        Self {
            client,
            index: index.into(),
        }
    }

    /// Queue a regeneration of `key`.
    pub async fn upsert(&self, scope: &str, key: &str) -> bool {
        self.set(scope, key, InvalidationAction::Upsert).await
    }

    /// Queue a purge of `key`.
    pub async fn delete(&self, scope: &str, key: &str) -> bool {
        self.set(scope, key, InvalidationAction::Delete).await
    }

    /// Queue an entry. Blank scopes or keys are ignored.
    ///
    /// Returns whether the entry was written; failures are logged.
    pub async fn set(&self, scope: &str, key: &str, action: InvalidationAction) -> bool {
        if scope.trim().is_empty() || key.trim().is_empty() {
            debug!(scope, key, "Ignoring invalidation without scope or key");
            return false;
        }
        let entry = PendingInvalidation::new(scope, key, action);
        match self.write(&entry).await {
            Ok(()) => {
                debug!(scope, key, action = action.as_str(), "Queued invalidation");
                true
            }
            Err(e) => {
                error!(scope, key, action = action.as_str(), error = %e, "Failed to queue invalidation");
                false
            }
        }
    }

    /// Replace the whole queue with the clear-all sentinel.
    ///
    /// Every previously queued entry is superseded by the sentinel, so the
    /// queue index is dropped first and the sentinel is its only entry.
    pub async fn all(&self, reason: &str) -> bool {
        if reason.trim().is_empty() {
            error!("Clear all requested without a reason");
            return false;
        }
        warn!(reason, "Clearing all caches");
        if let Err(e) = self.client.destroy_index(&self.index).await {
            error!(reason, error = %e, "Failed to drop invalidation queue");
            return false;
        }
        match self.write(&PendingInvalidation::clear_all()).await {
            Ok(()) => true,
            Err(e) => {
                error!(reason, error = %e, "Failed to queue clear all");
                false
            }
        }
    }

    async fn write(&self, entry: &PendingInvalidation) -> Result<(), SearchBackendError> {
        let mut body = serde_json::to_value(entry)?;
        if let Value::Object(map) = &mut body {
            map.insert("id".to_string(), Value::String(entry.document_id()));
        }
        self.client
            .upsert(&self.index, IndexFamily::Clear, &body)
            .await?;
        Ok(())
    }

    /// Every pending entry. Unparseable documents are skipped.
    pub async fn pending(&self) -> Result<Vec<PendingInvalidation>, SearchBackendError> {
        let documents = self.client.scan(&self.index).await?;
        Ok(documents
            .into_iter()
            .filter_map(|body| match serde_json::from_value::<PendingInvalidation>(body) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(error = %e, "Skipping malformed invalidation entry");
                    None
                }
            })
            .collect())
    }

    /// How a consumer has to act on the current queue.
    pub async fn plan(&self) -> Result<InvalidationPlan, SearchBackendError> {
        Ok(InvalidationPlan::from_entries(self.pending().await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_indexer_repository::{BackendConfig, InMemoryBackend};
    use std::sync::Arc;

    fn queue() -> InvalidationQueue {
        let client = BackendClient::new(Arc::new(InMemoryBackend::new()), BackendConfig::default());
        InvalidationQueue::new(client, "wyvr_clear")
    }

    #[tokio::test]
    async fn test_same_key_collapses() {
        let queue = queue();
        assert!(queue.upsert("product", "blue-shoe").await);
        assert!(queue.upsert("product", "blue-shoe").await);
        assert!(queue.delete("product", "blue-shoe").await);
        assert!(queue.upsert("page", "blue-shoe").await);

        let mut pending = queue.pending().await.unwrap();
        pending.sort_by(|a, b| a.scope.cmp(&b.scope));
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].scope, "page");
        assert_eq!(pending[1].action, InvalidationAction::Delete);
    }

    #[tokio::test]
    async fn test_blank_key_is_ignored() {
        let queue = queue();
        assert!(!queue.upsert("product", "").await);
        assert!(!queue.upsert("", "blue-shoe").await);
        assert!(queue.pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_all_needs_reason() {
        let queue = queue();
        assert!(!queue.all("  ").await);
        assert!(queue.pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unconfigured_queue_is_noop() {
        let queue = InvalidationQueue::new(BackendClient::unconfigured(), "wyvr_clear");
        assert!(!queue.upsert("product", "blue-shoe").await);
        assert!(!queue.all("deploy").await);
    }
}
