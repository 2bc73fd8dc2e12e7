//! A system-of-record backed by an in-process catalog snapshot.
//!
//! The snapshot is plain JSON (see `CatalogSnapshot`) and can be mutated at
//! runtime, which is how the binary and the tests simulate admin edits.

use std::path::Path;

use async_trait::async_trait;
use catalog_indexer_shared::{
    assigned_to, BlockRecord, CategoryRecord, EntityId, MemberSummary, PageRecord, ProductRecord,
    Tenant, TenantId,
};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::info;

use super::{CatalogSource, TenantRegistry};
use crate::errors::SourceError;

/// One raw config value. `tenant: None` is the default scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigEntry {
    #[serde(default)]
    pub tenant: Option<TenantId>,
    pub path: String,
    pub value: String,
}

/// Serializable content of a catalog.
///
/// Products and categories are shared by every tenant; pages and blocks carry
/// their own store assignment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    #[serde(default)]
    pub tenants: Vec<Tenant>,
    #[serde(default)]
    pub products: Vec<ProductRecord>,
    #[serde(default)]
    pub categories: Vec<CategoryRecord>,
    #[serde(default)]
    pub pages: Vec<PageRecord>,
    #[serde(default)]
    pub blocks: Vec<BlockRecord>,
    #[serde(default)]
    pub config: Vec<ConfigEntry>,
}

/// `CatalogSource` and `TenantRegistry` over a `CatalogSnapshot`.
#[derive(Debug, Default)]
pub struct SnapshotCatalog {
    snapshot: RwLock<CatalogSnapshot>,
}

fn pick<T: Clone>(records: &[T], ids: &[EntityId], id: impl Fn(&T) -> Option<EntityId>) -> Vec<T> {
    ids.iter()
        .filter_map(|wanted| records.iter().find(|r| id(r) == Some(*wanted)))
        .cloned()
        .collect()
}

fn upsert_by_id<T>(records: &mut Vec<T>, record: T, id: impl Fn(&T) -> Option<EntityId>) {
    let key = id(&record);
    let position = records
        .iter()
        .position(|existing| key.is_some() && id(existing) == key);
    match position {
        Some(index) => records[index] = record,
        None => records.push(record),
    }
}

impl SnapshotCatalog {
    pub fn new(snapshot: CatalogSnapshot) -> Self {
        Self {
            snapshot: RwLock::new(snapshot),
        }
    }

    /// Parse a snapshot from JSON.
    pub fn from_json(json: &str) -> Result<Self, SourceError> {
        let snapshot: CatalogSnapshot =
            serde_json::from_str(json).map_err(|e| SourceError::invalid(e.to_string()))?;
        Ok(Self::new(snapshot))
    }

    /// Read and parse a snapshot file.
    pub async fn load(path: &Path) -> Result<Self, SourceError> {
        let json = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| SourceError::unavailable(format!("{}: {}", path.display(), e)))?;
        let catalog = Self::from_json(&json)?;
        {
            let snapshot = catalog.snapshot.read().await;
            info!(
                path = %path.display(),
                tenants = snapshot.tenants.len(),
                products = snapshot.products.len(),
                categories = snapshot.categories.len(),
                pages = snapshot.pages.len(),
                blocks = snapshot.blocks.len(),
                "Loaded catalog snapshot"
            );
        }
        Ok(catalog)
    }

    pub async fn snapshot(&self) -> CatalogSnapshot {
        self.snapshot.read().await.clone()
    }

    pub async fn set_tenants(&self, tenants: Vec<Tenant>) {
        self.snapshot.write().await.tenants = tenants;
    }

    /// Insert or replace a product by id.
    pub async fn upsert_product(&self, product: ProductRecord) {
        upsert_by_id(&mut self.snapshot.write().await.products, product, |p| p.id);
    }

    pub async fn remove_product(&self, id: EntityId) {
        self.snapshot
            .write()
            .await
            .products
            .retain(|p| p.id != Some(id));
    }

    /// Insert or replace a category by id.
    pub async fn upsert_category(&self, category: CategoryRecord) {
        upsert_by_id(&mut self.snapshot.write().await.categories, category, |c| c.id);
    }

    /// Insert or replace a page by id.
    pub async fn upsert_page(&self, page: PageRecord) {
        upsert_by_id(&mut self.snapshot.write().await.pages, page, |p| p.id);
    }

    pub async fn remove_page(&self, id: EntityId) {
        self.snapshot.write().await.pages.retain(|p| p.id != Some(id));
    }

    /// Insert or replace a block by id.
    pub async fn upsert_block(&self, block: BlockRecord) {
        upsert_by_id(&mut self.snapshot.write().await.blocks, block, |b| b.id);
    }

    /// Set a config value for a tenant (`None`: default scope).
    pub async fn set_config(&self, tenant: Option<TenantId>, path: &str, value: &str) {
        let mut snapshot = self.snapshot.write().await;
        snapshot
            .config
            .retain(|entry| !(entry.tenant == tenant && entry.path == path));
        snapshot.config.push(ConfigEntry {
            tenant,
            path: path.to_string(),
            value: value.to_string(),
        });
    }
}

#[async_trait]
impl TenantRegistry for SnapshotCatalog {
    async fn tenants(&self) -> Result<Vec<Tenant>, SourceError> {
        Ok(self.snapshot.read().await.tenants.clone())
    }
}

#[async_trait]
impl CatalogSource for SnapshotCatalog {
    async fn product_ids(&self, _tenant: TenantId) -> Result<Vec<EntityId>, SourceError> {
        Ok(self
            .snapshot
            .read()
            .await
            .products
            .iter()
            .filter_map(|p| p.id)
            .collect())
    }

    async fn products(
        &self,
        _tenant: TenantId,
        ids: &[EntityId],
    ) -> Result<Vec<ProductRecord>, SourceError> {
        Ok(pick(&self.snapshot.read().await.products, ids, |p| p.id))
    }

    async fn product_by_sku(
        &self,
        _tenant: TenantId,
        sku: &str,
    ) -> Result<Option<ProductRecord>, SourceError> {
        Ok(self
            .snapshot
            .read()
            .await
            .products
            .iter()
            .find(|p| p.sku.as_deref() == Some(sku))
            .cloned())
    }

    async fn parent_ids(
        &self,
        _tenant: TenantId,
        child: EntityId,
    ) -> Result<Vec<EntityId>, SourceError> {
        Ok(self
            .snapshot
            .read()
            .await
            .products
            .iter()
            .filter(|p| p.is_composite() && p.child_ids.contains(&child))
            .filter_map(|p| p.id)
            .collect())
    }

    async fn category_ids(&self, _tenant: TenantId) -> Result<Vec<EntityId>, SourceError> {
        Ok(self
            .snapshot
            .read()
            .await
            .categories
            .iter()
            .filter_map(|c| c.id)
            .collect())
    }

    async fn categories(
        &self,
        _tenant: TenantId,
        ids: &[EntityId],
    ) -> Result<Vec<CategoryRecord>, SourceError> {
        Ok(pick(&self.snapshot.read().await.categories, ids, |c| c.id))
    }

    async fn category_members(
        &self,
        _tenant: TenantId,
        category: EntityId,
    ) -> Result<Vec<MemberSummary>, SourceError> {
        Ok(self
            .snapshot
            .read()
            .await
            .products
            .iter()
            .filter(|p| p.enabled && p.visible && p.category_ids.contains(&category))
            .filter_map(|p| {
                p.id.map(|id| MemberSummary {
                    id,
                    sku: p.sku.clone(),
                })
            })
            .collect())
    }

    async fn page_ids(&self, tenant: TenantId) -> Result<Vec<EntityId>, SourceError> {
        Ok(self
            .snapshot
            .read()
            .await
            .pages
            .iter()
            .filter(|p| assigned_to(&p.store_ids, tenant))
            .filter_map(|p| p.id)
            .collect())
    }

    async fn pages(
        &self,
        tenant: TenantId,
        ids: &[EntityId],
    ) -> Result<Vec<PageRecord>, SourceError> {
        let snapshot = self.snapshot.read().await;
        Ok(pick(&snapshot.pages, ids, |p| p.id)
            .into_iter()
            .filter(|p| assigned_to(&p.store_ids, tenant))
            .collect())
    }

    async fn block_ids(&self, tenant: TenantId) -> Result<Vec<EntityId>, SourceError> {
        Ok(self
            .snapshot
            .read()
            .await
            .blocks
            .iter()
            .filter(|b| assigned_to(&b.store_ids, tenant))
            .filter_map(|b| b.id)
            .collect())
    }

    async fn blocks(
        &self,
        tenant: TenantId,
        ids: &[EntityId],
    ) -> Result<Vec<BlockRecord>, SourceError> {
        let snapshot = self.snapshot.read().await;
        Ok(pick(&snapshot.blocks, ids, |b| b.id)
            .into_iter()
            .filter(|b| assigned_to(&b.store_ids, tenant))
            .collect())
    }

    async fn config_value(
        &self,
        tenant: TenantId,
        path: &str,
    ) -> Result<Option<String>, SourceError> {
        let snapshot = self.snapshot.read().await;
        let scoped = |scope: Option<TenantId>| {
            snapshot
                .config
                .iter()
                .find(|entry| entry.tenant == scope && entry.path == path)
                .map(|entry| entry.value.clone())
        };
        Ok(scoped(Some(tenant)).or_else(|| scoped(None)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> SnapshotCatalog {
        SnapshotCatalog::from_json(
            r#"{
                "tenants": [{"id": 1, "code": "default"}],
                "products": [
                    {"id": 7, "sku": "S-7", "category_ids": [9]},
                    {"id": 8, "sku": "S-8", "category_ids": [9], "visible": false},
                    {"id": 3, "sku": "C-3", "type_id": "configurable", "child_ids": [7]}
                ],
                "pages": [
                    {"id": 1, "identifier": "home", "store_ids": [0]},
                    {"id": 2, "identifier": "de-only", "store_ids": [2]}
                ],
                "config": [
                    {"path": "wyvr/product/index_attributes", "value": "name"},
                    {"tenant": 1, "path": "wyvr/product/index_attributes", "value": "name,sku"}
                ]
            }"#,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_parent_links_and_members() {
        let catalog = catalog();
        assert_eq!(catalog.parent_ids(TenantId(1), 7).await.unwrap(), vec![3]);
        assert!(catalog.parent_ids(TenantId(1), 3).await.unwrap().is_empty());

        let members = catalog.category_members(TenantId(1), 9).await.unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].id, 7);
    }

    #[tokio::test]
    async fn test_page_store_assignment() {
        let catalog = catalog();
        assert_eq!(catalog.page_ids(TenantId(1)).await.unwrap(), vec![1]);
        assert_eq!(catalog.page_ids(TenantId(2)).await.unwrap(), vec![1, 2]);
        assert!(catalog.pages(TenantId(1), &[2]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_config_scope_fallback() {
        let catalog = catalog();
        let path = "wyvr/product/index_attributes";
        assert_eq!(
            catalog.config_value(TenantId(1), path).await.unwrap().as_deref(),
            Some("name,sku")
        );
        assert_eq!(
            catalog.config_value(TenantId(4), path).await.unwrap().as_deref(),
            Some("name")
        );
    }

    #[tokio::test]
    async fn test_mutations() {
        let catalog = catalog();
        let mut product = ProductRecord::new(7, "S-7");
        product.category_ids = vec![];
        catalog.upsert_product(product).await;
        assert!(catalog.category_members(TenantId(1), 9).await.unwrap().is_empty());

        catalog.remove_product(3).await;
        assert!(catalog.parent_ids(TenantId(1), 7).await.unwrap().is_empty());
    }
}
