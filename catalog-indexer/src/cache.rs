//! Category listing cache.
//!
//! One document per cacheable category: `{id, url, products}` where
//! `products` are the stored payloads of the category's visible members.
//! Listings are built from the already-synced product documents, not from the
//! system-of-record.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use catalog_indexer_repository::{BackendClient, IndexFamily, IndexVersionManager, IndexVersions};
use catalog_indexer_shared::{CategoryRecord, EntityId, EntityKind, TenantId};
use serde_json::{json, Value};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::cascade::{AggregateRecompute, CascadeResolver};
use crate::config::IndexNames;
use crate::engine::{measure, SyncContext, SyncReport, TenantOutcome};
use crate::errors::SyncError;
use crate::invalidation::InvalidationQueue;
use crate::source::CatalogSource;
use crate::tenants::TenantIterator;

/// Payload fields that embed other products. Listings never carry them.
const STRIPPED_FIELDS: [&str; 3] = ["cross_sell_products", "upsell_products", "related_products"];

const CACHE_SCOPE: &str = "category";

pub struct CategoryListingCache {
    source: Arc<dyn CatalogSource>,
    client: BackendClient,
    versions: IndexVersionManager,
    tenants: Arc<TenantIterator>,
    queue: InvalidationQueue,
    cascade: CascadeResolver,
    names: IndexNames,
}

impl CategoryListingCache {
    pub fn new(source: Arc<dyn CatalogSource>, ctx: &SyncContext) -> Self {
        Self {
            source,
            client: ctx.client.clone(),
            versions: ctx.versions.clone(),
            tenants: ctx.tenants.clone(),
            queue: ctx.queue.clone(),
            cascade: ctx.cascade.clone(),
            names: ctx.names.clone(),
        }
    }

    /// Rebuild every tenant's listings into a new generation.
    #[instrument(skip(self), fields(run_id = %Uuid::new_v4()))]
    pub async fn update_all(&self, reason: &str) -> SyncReport {
        if reason.trim().is_empty() {
            error!("Cache rebuild requested without a trigger reason");
            return SyncReport::skipped(reason);
        }
        let label = format!("cache update_all \"{}\"", reason);
        measure(&label, async {
            if !self.client.is_available(reason).await {
                return SyncReport::skipped(reason);
            }
            let run = self
                .tenants
                .for_each(reason, |tenant| self.rebuild_tenant(tenant.id))
                .await;
            let mut report = SyncReport::new(reason);
            for (_, outcome) in run.completed {
                report.absorb(outcome);
            }
            for (tenant, _) in run.failed {
                report.tenant_failed(tenant);
            }
            report
        })
        .await
    }

    /// Queue categories for the next `sweep_marked`.
    pub async fn mark_for_recompute(
        &self,
        tenant: TenantId,
        category_ids: &[EntityId],
    ) -> Result<usize, SyncError> {
        Ok(self.cascade.mark_for_recompute(tenant, category_ids).await?)
    }

    /// Recompute every category queued through `mark_for_recompute`.
    #[instrument(skip(self), fields(run_id = %Uuid::new_v4()))]
    pub async fn sweep_marked(&self) -> SyncReport {
        let trigger = "cache sweep";
        if !self.client.is_available(trigger).await {
            return SyncReport::skipped(trigger);
        }
        let run = self
            .tenants
            .for_each(trigger, |tenant| self.sweep_tenant(tenant.id))
            .await;
        let mut report = SyncReport::new(trigger);
        for (_, outcome) in run.completed {
            report.absorb(outcome);
        }
        for (tenant, _) in run.failed {
            report.tenant_failed(tenant);
        }
        report
    }

    async fn sweep_tenant(&self, tenant: TenantId) -> Result<TenantOutcome, SyncError> {
        let mut outcome = TenantOutcome::new(tenant);
        let marked: BTreeSet<EntityId> = self
            .cascade
            .take_marked_aggregates(tenant)
            .await?
            .into_iter()
            .collect();
        if !marked.is_empty() {
            outcome.aggregates_recomputed = self.recompute(tenant, &marked).await?;
            outcome.affected_aggregates = marked;
        }
        Ok(outcome)
    }

    async fn rebuild_tenant(&self, tenant: TenantId) -> Result<TenantOutcome, SyncError> {
        let versions = self
            .versions
            .resolve_for_write(&self.names.cache_alias(tenant), true)
            .await;
        let index = self.prepare(&versions).await?;

        let ids = self.source.category_ids(tenant).await?;
        let mut outcome = TenantOutcome::new(tenant);
        outcome.aggregates_recomputed = self.write_listings(tenant, &index, &ids).await?;

        if !versions.discovered {
            warn!(tenant = %tenant, index = %index, "Versions unknown, listings written without cutover");
            outcome.cutover_failed = true;
        } else if versions.has_live_target()
            && self
                .versions
                .cutover(&versions, IndexFamily::Cache)
                .await
                .is_err()
        {
            outcome.cutover_failed = true;
        }
        info!(tenant = %tenant, count = outcome.aggregates_recomputed, "Rebuilt category listings");
        Ok(outcome)
    }

    /// Create the generation and point the alias at it if nothing is live.
    async fn prepare(&self, versions: &IndexVersions) -> Result<String, SyncError> {
        let index = versions.index_name();
        self.client.ensure_index(&index, IndexFamily::Cache).await?;
        if versions.needs_early_cutover() {
            self.versions.cutover(versions, IndexFamily::Cache).await?;
        }
        Ok(index)
    }

    /// Stored product payloads of a tenant keyed by id, without embedded
    /// products.
    async fn product_snapshot(&self, tenant: TenantId) -> Result<HashMap<EntityId, Value>, SyncError> {
        let alias = self.names.entity_alias(EntityKind::Product, tenant);
        let mut products = HashMap::new();
        for doc in self.client.scan(&alias).await? {
            let Some(id) = doc.get("id").and_then(Value::as_u64) else {
                continue;
            };
            let Some(Value::Object(mut payload)) = doc.get(EntityKind::Product.as_str()).cloned()
            else {
                continue;
            };
            if payload.is_empty() {
                continue;
            }
            for field in STRIPPED_FIELDS {
                payload.remove(field);
            }
            products.insert(id, Value::Object(payload));
        }
        debug!(tenant = %tenant, count = products.len(), "Loaded product snapshot");
        Ok(products)
    }

    async fn write_listings(
        &self,
        tenant: TenantId,
        index: &str,
        ids: &[EntityId],
    ) -> Result<usize, SyncError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let products = self.product_snapshot(tenant).await?;
        let categories = self.source.categories(tenant, ids).await?;

        let mut written = 0;
        for category in &categories {
            match self.write_listing(tenant, index, category, &products).await {
                Ok(true) => written += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!(tenant = %tenant, category = ?category.id, error = %e, "Failed to write category listing")
                }
            }
        }
        Ok(written)
    }

    /// Write one listing. Categories without id or url path are not cacheable.
    async fn write_listing(
        &self,
        tenant: TenantId,
        index: &str,
        category: &CategoryRecord,
        products: &HashMap<EntityId, Value>,
    ) -> Result<bool, SyncError> {
        let Some(id) = category.id else {
            return Ok(false);
        };
        let Some(url) = category
            .url_path
            .as_deref()
            .map(str::to_lowercase)
            .filter(|url| !url.is_empty())
        else {
            debug!(tenant = %tenant, category = id, "Skipping category without url path");
            return Ok(false);
        };

        let members: Vec<Value> = self
            .source
            .category_members(tenant, id)
            .await?
            .iter()
            .filter_map(|member| products.get(&member.id).cloned())
            .collect();

        self.client
            .upsert(
                index,
                IndexFamily::Cache,
                &json!({ "id": id, "url": url, "products": members }),
            )
            .await?;
        self.queue.upsert(CACHE_SCOPE, &url).await;
        Ok(true)
    }
}

#[async_trait]
impl AggregateRecompute for CategoryListingCache {
    /// Recompute listings in the live generation.
    async fn recompute(
        &self,
        tenant: TenantId,
        aggregate_ids: &BTreeSet<EntityId>,
    ) -> Result<usize, SyncError> {
        if aggregate_ids.is_empty() {
            return Ok(0);
        }
        let versions = self
            .versions
            .resolve_for_write(&self.names.cache_alias(tenant), false)
            .await;
        let index = self.prepare(&versions).await?;
        let ids: Vec<EntityId> = aggregate_ids.iter().copied().collect();
        let written = self.write_listings(tenant, &index, &ids).await?;
        debug!(tenant = %tenant, requested = ids.len(), written, "Recomputed category listings");
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_indexer_repository::{BackendConfig, InMemoryBackend};
    use catalog_indexer_shared::{ProductRecord, Tenant};
    use serde_json::Map;

    use crate::config::SyncConfig;
    use crate::source::{CatalogSnapshot, SnapshotCatalog};

    fn category(id: EntityId, url_path: Option<&str>) -> CategoryRecord {
        CategoryRecord {
            id: Some(id),
            name: Some("Shoes".to_string()),
            url_path: url_path.map(str::to_string),
            updated_at: None,
            data: Map::new(),
        }
    }

    async fn setup() -> (Arc<InMemoryBackend>, CategoryListingCache) {
        let backend = Arc::new(InMemoryBackend::new());
        let client = BackendClient::new(backend.clone(), BackendConfig::default());
        let mut shoe = ProductRecord::new(42, "BLUE-SHOE");
        shoe.category_ids = vec![9, 10];
        let catalog = Arc::new(SnapshotCatalog::new(CatalogSnapshot {
            tenants: vec![Tenant::new(1, "default")],
            products: vec![shoe],
            categories: vec![category(9, Some("Men/Shoes")), category(10, None)],
            ..CatalogSnapshot::default()
        }));
        let ctx = SyncContext::new(client.clone(), catalog.clone(), catalog.clone(), &SyncConfig::default());

        client
            .upsert(
                "wyvr_product_1_v1",
                IndexFamily::Entity(EntityKind::Product),
                &json!({
                    "id": 42,
                    "product": {"sku": "BLUE-SHOE", "related_products": [{"sku": "CAP"}]},
                    "indexed_at": "2024-05-01T10:00:00Z"
                }),
            )
            .await
            .unwrap();
        client
            .update_aliases(&[catalog_indexer_repository::AliasAction::add(
                "wyvr_product_1_v1",
                "wyvr_product_1",
            )])
            .await
            .unwrap();
        (backend, CategoryListingCache::new(catalog, &ctx))
    }

    #[tokio::test]
    async fn test_listing_strips_embedded_products() {
        let (backend, cache) = setup().await;

        let written = cache
            .recompute(TenantId(1), &BTreeSet::from([9, 10]))
            .await
            .unwrap();
        assert_eq!(written, 1);

        let listings = backend.documents("wyvr_cache_1").await;
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0]["url"], "men/shoes");
        assert_eq!(listings[0]["products"][0]["sku"], "BLUE-SHOE");
        assert!(listings[0]["products"][0].get("related_products").is_none());

        let plan = cache.queue.pending().await.unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].key, "men/shoes");
    }

    #[tokio::test]
    async fn test_full_rebuild_cuts_over() {
        let (backend, cache) = setup().await;

        let first = cache.update_all("test").await;
        assert_eq!(first.aggregates_recomputed, 1);
        let second = cache.update_all("test").await;
        assert!(second.cutover_failed.is_empty());

        let names = backend.index_names().await;
        assert!(names.contains(&"wyvr_cache_1_v2".to_string()));
        assert!(!names.contains(&"wyvr_cache_1_v1".to_string()));
        assert_eq!(backend.documents("wyvr_cache_1").await.len(), 1);
    }

    #[tokio::test]
    async fn test_marked_categories_are_swept_once() {
        let (_, cache) = setup().await;
        cache.mark_for_recompute(TenantId(1), &[9, 9]).await.unwrap();

        let report = cache.sweep_marked().await;
        assert_eq!(report.aggregates_recomputed, 1);
        assert_eq!(cache.sweep_marked().await.aggregates_recomputed, 0);
    }
}
