//! Dependency initialization and wiring for the catalog synchronizer.

use std::sync::Arc;

use catalog_indexer_repository::BackendClient;
use tracing::info;

use super::SyncConfig;
use crate::cache::CategoryListingCache;
use crate::engine::{
    BlockAdapter, BlockSync, CategoryAdapter, CategorySync, PageAdapter, PageSync,
    ProductAdapter, ProductSync, SyncContext,
};
use crate::invalidation::InvalidationQueue;
use crate::settings::SettingsSync;
use crate::source::{CatalogSource, SnapshotCatalog, TenantRegistry};
use crate::IndexingError;

/// Container for all initialized dependencies.
pub struct Dependencies {
    pub config: SyncConfig,
    pub context: SyncContext,
    pub products: Arc<ProductSync>,
    pub categories: Arc<CategorySync>,
    pub pages: Arc<PageSync>,
    pub blocks: Arc<BlockSync>,
    pub cache: Arc<CategoryListingCache>,
    pub settings: Arc<SettingsSync>,
}

impl Dependencies {
    /// Initialize every dependency from environment variables, reading the
    /// system-of-record from the snapshot at `CATALOG_SNAPSHOT_PATH`.
    ///
    /// See [`SyncConfig::from_env`] for the variables.
    ///
    /// # Returns
    ///
    /// * `Ok(Dependencies)` - Initialized dependencies
    /// * `Err(IndexingError)` - If no snapshot is configured or it cannot be loaded
    pub async fn from_env() -> Result<Self, IndexingError> {
        let config = SyncConfig::from_env();
        let path = config
            .snapshot_path
            .clone()
            .ok_or_else(|| IndexingError::config("CATALOG_SNAPSHOT_PATH is not set"))?;
        let catalog = Arc::new(SnapshotCatalog::load(&path).await?);

        info!(
            opensearch_url = ?config.backend.url,
            index_prefix = %config.names.prefix(),
            ignored_tenants = ?config.ignored_tenants,
            tenant_concurrency = config.tenant_concurrency,
            batch_size = config.batch_size,
            "Initializing dependencies"
        );

        let client = BackendClient::from_config(&config.backend);
        Ok(Self::new(config, client, catalog.clone(), catalog))
    }

    /// Wire every engine around `client`.
    ///
    /// Product writes recompute the affected category listings.
    pub fn new(
        config: SyncConfig,
        client: BackendClient,
        source: Arc<dyn CatalogSource>,
        registry: Arc<dyn TenantRegistry>,
    ) -> Self {
        let context = SyncContext::new(client, source.clone(), registry, &config);
        let cache = Arc::new(CategoryListingCache::new(source.clone(), &context));

        let products = ProductSync::new(ProductAdapter::new(source.clone()), context.clone())
            .with_aggregates(cache.clone());
        let categories = CategorySync::new(CategoryAdapter::new(source.clone()), context.clone());
        let pages = PageSync::new(PageAdapter::new(source.clone()), context.clone());
        let blocks = BlockSync::new(BlockAdapter::new(source.clone()), context.clone());
        let settings = Arc::new(SettingsSync::new(source, &context));

        Self {
            config,
            context,
            products: Arc::new(products),
            categories: Arc::new(categories),
            pages: Arc::new(pages),
            blocks: Arc::new(blocks),
            cache,
            settings,
        }
    }

    pub fn queue(&self) -> &InvalidationQueue {
        &self.context.queue
    }
}
