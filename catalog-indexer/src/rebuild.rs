//! Scheduled full rebuild of every index.

use std::sync::Arc;

use tracing::{info, warn};

use crate::cache::CategoryListingCache;
use crate::config::Dependencies;
use crate::engine::{BlockSync, CategorySync, PageSync, ProductSync, SyncReport};
use crate::settings::SettingsSync;
use crate::tenants::TenantIterator;

/// Runs the rebuild steps in dependency order: listings are built from the
/// product documents, so products go before the cache.
#[derive(Clone)]
pub struct CronRebuild {
    tenants: Arc<TenantIterator>,
    settings: Arc<SettingsSync>,
    categories: Arc<CategorySync>,
    products: Arc<ProductSync>,
    pages: Arc<PageSync>,
    blocks: Arc<BlockSync>,
    cache: Arc<CategoryListingCache>,
}

impl CronRebuild {
    pub fn new(deps: &Dependencies) -> Self {
        Self {
            tenants: deps.context.tenants.clone(),
            settings: deps.settings.clone(),
            categories: deps.categories.clone(),
            products: deps.products.clone(),
            pages: deps.pages.clone(),
            blocks: deps.blocks.clone(),
            cache: deps.cache.clone(),
        }
    }

    /// Rebuild everything, then run both sweeps. Returns one report per step.
    ///
    /// The tenant list is read again for every rebuild.
    pub async fn rebuild(&self) -> Vec<SyncReport> {
        self.tenants.refresh().await;
        let mut reports = vec![
            self.rebuild_settings().await,
            self.rebuild_categories().await,
            self.rebuild_products().await,
        ];
        reports.extend(self.rebuild_pages().await);
        reports.push(self.rebuild_cache().await);
        reports.push(self.products.sweep_pending_parents().await);
        reports.push(self.cache.sweep_marked().await);

        let failed = reports.iter().filter(|report| report.has_failures()).count();
        if failed > 0 {
            warn!(steps = reports.len(), failed, "Rebuild finished with failures");
        } else {
            info!(steps = reports.len(), "Rebuild finished");
        }
        reports
    }

    pub async fn rebuild_settings(&self) -> SyncReport {
        self.settings.update_all("cron config").await
    }

    pub async fn rebuild_categories(&self) -> SyncReport {
        self.categories.update_all("cron categories").await
    }

    pub async fn rebuild_products(&self) -> SyncReport {
        self.products.update_all("cron products").await
    }

    /// Pages and blocks.
    pub async fn rebuild_pages(&self) -> [SyncReport; 2] {
        [
            self.pages.update_all("cron pages").await,
            self.blocks.update_all("cron blocks").await,
        ]
    }

    pub async fn rebuild_cache(&self) -> SyncReport {
        self.cache.update_all("cron cache").await
    }
}
