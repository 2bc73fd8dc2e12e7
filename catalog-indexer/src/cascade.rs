//! Secondary effects of entity writes.
//!
//! A written leaf product obliges its composite parents to be re-synced and
//! the categories it is (or was) a member of to be recomputed. Parents are
//! deferred through a marker index during incremental syncs so a burst of
//! child changes re-syncs each parent once.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use catalog_indexer_repository::{BackendClient, IndexFamily, SearchBackendError};
use catalog_indexer_shared::{EntityId, SearchDocument, TenantId};
use serde_json::json;
use tracing::{debug, info};

use crate::config::IndexNames;
use crate::errors::{SourceError, SyncError};
use crate::source::CatalogSource;

/// Recomputes derived aggregates (category listings) for a tenant.
#[async_trait]
pub trait AggregateRecompute: Send + Sync {
    /// Recompute the given aggregates. Returns how many were written.
    async fn recompute(
        &self,
        tenant: TenantId,
        aggregate_ids: &BTreeSet<EntityId>,
    ) -> Result<usize, SyncError>;
}

/// Id-only marker indices.
///
/// Markers are documents `{id}` so marking the same id twice keeps one marker.
#[derive(Clone)]
pub struct MarkerIndex {
    client: BackendClient,
}

impl MarkerIndex {
    pub fn new(client: BackendClient) -> Self {
        Self { client }
    }

    /// Write markers for `ids` into `index`.
    pub async fn mark(&self, index: &str, ids: &[EntityId]) -> Result<usize, SearchBackendError> {
        for id in ids {
            self.client
                .upsert(index, IndexFamily::Marker, &json!({ "id": id }))
                .await?;
        }
        Ok(ids.len())
    }

    /// Read every marker, then drop the index.
    ///
    /// Marks made after the drop land in a freshly created index and are
    /// picked up by the next drain.
    pub async fn drain(&self, index: &str) -> Result<Vec<EntityId>, SearchBackendError> {
        if !self.client.index_exists(index).await? {
            return Ok(Vec::new());
        }
        let ids: BTreeSet<EntityId> = self
            .client
            .scan(index)
            .await?
            .iter()
            .filter_map(|marker| marker.get("id").and_then(|id| id.as_u64()))
            .collect();
        self.client.destroy_index(index).await?;
        debug!(index = %index, count = ids.len(), "Drained marker index");
        Ok(ids.into_iter().collect())
    }
}

/// Cascade obligations of one written entity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CascadeObligations {
    /// Composite parents that must be re-synced.
    pub parent_ids: Vec<EntityId>,
    /// Aggregates whose listing must be recomputed.
    pub aggregate_ids: BTreeSet<EntityId>,
}

/// Computes and records cascade obligations.
#[derive(Clone)]
pub struct CascadeResolver {
    source: Arc<dyn CatalogSource>,
    markers: MarkerIndex,
    names: IndexNames,
}

impl CascadeResolver {
    pub fn new(source: Arc<dyn CatalogSource>, client: BackendClient, names: IndexNames) -> Self {
        Self {
            source,
            markers: MarkerIndex::new(client),
            names,
        }
    }

    /// Aggregates affected by replacing `previous` with `fresh`: the union of
    /// the old and the new membership.
    pub fn affected_aggregates(
        previous: Option<&SearchDocument>,
        fresh: &SearchDocument,
    ) -> BTreeSet<EntityId> {
        previous
            .map(|doc| doc.category_ids.clone())
            .unwrap_or_default()
            .into_iter()
            .chain(fresh.category_ids.iter().copied())
            .collect()
    }

    /// Obligations of writing `fresh` over `previous`.
    ///
    /// Parents are looked up only when `with_parents` is set; full rebuilds
    /// visit every composite anyway.
    pub async fn obligations(
        &self,
        tenant: TenantId,
        previous: Option<&SearchDocument>,
        fresh: &SearchDocument,
        with_parents: bool,
    ) -> Result<CascadeObligations, SourceError> {
        let parent_ids = if with_parents {
            self.parents(tenant, fresh.id).await?
        } else {
            Vec::new()
        };
        Ok(CascadeObligations {
            parent_ids,
            aggregate_ids: Self::affected_aggregates(previous, fresh),
        })
    }

    /// Composite parents of a leaf product.
    pub async fn parents(
        &self,
        tenant: TenantId,
        child: EntityId,
    ) -> Result<Vec<EntityId>, SourceError> {
        let mut parents = self.source.parent_ids(tenant, child).await?;
        parents.retain(|parent| *parent != child);
        parents.sort_unstable();
        parents.dedup();
        Ok(parents)
    }

    /// Defer a parent re-sync until the next parent sweep.
    pub async fn defer_parents(
        &self,
        tenant: TenantId,
        parents: &[EntityId],
    ) -> Result<usize, SearchBackendError> {
        if parents.is_empty() {
            return Ok(0);
        }
        self.markers
            .mark(&self.names.pending_parents(tenant), parents)
            .await
    }

    /// Take every deferred parent of a tenant.
    pub async fn take_pending_parents(
        &self,
        tenant: TenantId,
    ) -> Result<Vec<EntityId>, SearchBackendError> {
        self.markers.drain(&self.names.pending_parents(tenant)).await
    }

    /// Queue aggregates for an out-of-band recompute.
    pub async fn mark_for_recompute(
        &self,
        tenant: TenantId,
        aggregate_ids: &[EntityId],
    ) -> Result<usize, SearchBackendError> {
        let marked = self
            .markers
            .mark(&self.names.cache_pending(tenant), aggregate_ids)
            .await?;
        info!(tenant = %tenant, count = marked, "Marked aggregates for recompute");
        Ok(marked)
    }

    /// Take every aggregate queued for recompute.
    pub async fn take_marked_aggregates(
        &self,
        tenant: TenantId,
    ) -> Result<Vec<EntityId>, SearchBackendError> {
        self.markers.drain(&self.names.cache_pending(tenant)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_indexer_repository::{BackendConfig, InMemoryBackend};
    use catalog_indexer_shared::EntityKind;

    fn doc(categories: &[EntityId]) -> SearchDocument {
        let mut doc = SearchDocument::new(7, EntityKind::Product, json!({}));
        doc.category_ids = categories.to_vec();
        doc
    }

    #[test]
    fn test_affected_aggregates_union() {
        let affected = CascadeResolver::affected_aggregates(Some(&doc(&[9, 4])), &doc(&[4, 5]));
        assert_eq!(affected, BTreeSet::from([4, 5, 9]));

        let removed = CascadeResolver::affected_aggregates(Some(&doc(&[9])), &doc(&[]));
        assert_eq!(removed, BTreeSet::from([9]));

        let first_write = CascadeResolver::affected_aggregates(None, &doc(&[2]));
        assert_eq!(first_write, BTreeSet::from([2]));
    }

    #[tokio::test]
    async fn test_marker_drain_is_read_then_destroy() {
        let backend = Arc::new(InMemoryBackend::new());
        let client = BackendClient::new(backend.clone(), BackendConfig::default());
        let markers = MarkerIndex::new(client);

        markers.mark("markers", &[3, 5, 3]).await.unwrap();
        assert_eq!(markers.drain("markers").await.unwrap(), vec![3, 5]);
        assert!(backend.index_names().await.is_empty());
        assert!(markers.drain("markers").await.unwrap().is_empty());

        markers.mark("markers", &[8]).await.unwrap();
        assert_eq!(markers.drain("markers").await.unwrap(), vec![8]);
    }
}
