//! System-of-record adapter.
//!
//! The synchronizer only reads from the system-of-record: tenants, entity
//! snapshots, parent links and raw per-tenant config values. Attribute typing,
//! price rules and stock lookup are the adapter's job.

mod snapshot;

pub use snapshot::{CatalogSnapshot, SnapshotCatalog};

use async_trait::async_trait;
use catalog_indexer_shared::{
    BlockRecord, CategoryRecord, EntityId, MemberSummary, PageRecord, ProductRecord, Tenant,
    TenantId,
};

use crate::errors::SourceError;

/// Supplies the tenants to synchronize.
#[async_trait]
pub trait TenantRegistry: Send + Sync {
    async fn tenants(&self) -> Result<Vec<Tenant>, SourceError>;
}

/// Read access to the catalog of the system-of-record.
///
/// Every lookup is scoped to one tenant. Records are best-effort current
/// snapshots; ids that do not exist are simply missing from the result.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Ids of every product of the tenant.
    async fn product_ids(&self, tenant: TenantId) -> Result<Vec<EntityId>, SourceError>;

    async fn products(
        &self,
        tenant: TenantId,
        ids: &[EntityId],
    ) -> Result<Vec<ProductRecord>, SourceError>;

    async fn product_by_sku(
        &self,
        tenant: TenantId,
        sku: &str,
    ) -> Result<Option<ProductRecord>, SourceError>;

    /// Composite products the given product is a child of.
    async fn parent_ids(
        &self,
        tenant: TenantId,
        child: EntityId,
    ) -> Result<Vec<EntityId>, SourceError>;

    async fn category_ids(&self, tenant: TenantId) -> Result<Vec<EntityId>, SourceError>;

    async fn categories(
        &self,
        tenant: TenantId,
        ids: &[EntityId],
    ) -> Result<Vec<CategoryRecord>, SourceError>;

    /// Visible, enabled products assigned to a category.
    async fn category_members(
        &self,
        tenant: TenantId,
        category: EntityId,
    ) -> Result<Vec<MemberSummary>, SourceError>;

    /// Ids of every page assigned to the tenant (directly or via tenant `0`).
    async fn page_ids(&self, tenant: TenantId) -> Result<Vec<EntityId>, SourceError>;

    async fn pages(&self, tenant: TenantId, ids: &[EntityId])
        -> Result<Vec<PageRecord>, SourceError>;

    /// Ids of every block assigned to the tenant (directly or via tenant `0`).
    async fn block_ids(&self, tenant: TenantId) -> Result<Vec<EntityId>, SourceError>;

    async fn blocks(
        &self,
        tenant: TenantId,
        ids: &[EntityId],
    ) -> Result<Vec<BlockRecord>, SourceError>;

    /// Raw config value of the tenant, falling back to the default scope.
    async fn config_value(
        &self,
        tenant: TenantId,
        path: &str,
    ) -> Result<Option<String>, SourceError>;
}
