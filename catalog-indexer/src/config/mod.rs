//! Configuration and dependency initialization for the catalog synchronizer.

mod dependencies;

pub use dependencies::Dependencies;

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use catalog_indexer_repository::BackendConfig;
use catalog_indexer_shared::{EntityKind, TenantId};
use tracing::warn;

/// Default prefix of every index name.
pub const DEFAULT_INDEX_PREFIX: &str = "wyvr";

/// Per-tenant config path listing the product attributes used as search tokens.
pub const PRODUCT_INDEX_ATTRIBUTES: &str = "wyvr/product/index_attributes";
/// Per-tenant config path listing the category attributes used as search tokens.
pub const CATEGORY_INDEX_ATTRIBUTES: &str = "wyvr/category/index_attributes";
/// Per-tenant config path listing the page attributes used as search tokens.
pub const PAGE_INDEX_ATTRIBUTES: &str = "wyvr/page/index_attributes";
/// Newline-separated config paths exported into the settings index.
pub const SETTINGS_INCLUDED_PATHS: &str = "wyvr/settings/included_paths";

/// Configuration of the synchronizer.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Backend connection settings. An unset url disables synchronization.
    pub backend: BackendConfig,
    /// Index naming.
    pub names: IndexNames,
    /// Tenants that are never synchronized.
    pub ignored_tenants: Vec<TenantId>,
    /// How many tenants are synchronized at the same time.
    ///
    /// Defaults to 1 (sequential).
    pub tenant_concurrency: usize,
    /// How many entities are fetched from the system-of-record at once.
    ///
    /// Defaults to 100.
    pub batch_size: usize,
    /// JSON snapshot of the system-of-record loaded by the binary.
    pub snapshot_path: Option<PathBuf>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            names: IndexNames::default(),
            ignored_tenants: Vec::new(),
            tenant_concurrency: 1,
            batch_size: 100,
            snapshot_path: None,
        }
    }
}

impl SyncConfig {
    /// Load configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `OPENSEARCH_URL`: backend url (unset: synchronization disabled)
    /// - `OPENSEARCH_TIMEOUT_SECS`: per-request timeout (default: 30)
    /// - `SCROLL_PAGE_SIZE`: documents per scroll page (default: 500)
    /// - `INDEX_PREFIX`: index name prefix (default: "wyvr")
    /// - `IGNORED_TENANTS`: comma-separated tenant ids
    /// - `TENANT_CONCURRENCY`: tenants synchronized in parallel (default: 1)
    /// - `SYNC_BATCH_SIZE`: entities fetched per batch (default: 100)
    /// - `CATALOG_SNAPSHOT_PATH`: system-of-record snapshot for the binary
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let number = |key: &str, default: usize| -> usize {
            match lookup(key) {
                None => default,
                Some(raw) => match raw.trim().parse::<usize>() {
                    Ok(value) if value > 0 => value,
                    _ => {
                        warn!(key, value = %raw, default, "Invalid number, using default");
                        default
                    }
                },
            }
        };

        let backend = BackendConfig {
            url: lookup("OPENSEARCH_URL").filter(|url| !url.trim().is_empty()),
            request_timeout: Duration::from_secs(number(
                "OPENSEARCH_TIMEOUT_SECS",
                defaults.backend.request_timeout.as_secs() as usize,
            ) as u64),
            scroll_page_size: number("SCROLL_PAGE_SIZE", defaults.backend.scroll_page_size),
        };

        let prefix = lookup("INDEX_PREFIX")
            .map(|prefix| prefix.trim().to_string())
            .filter(|prefix| !prefix.is_empty())
            .unwrap_or_else(|| DEFAULT_INDEX_PREFIX.to_string());

        Self {
            backend,
            names: IndexNames::new(prefix),
            ignored_tenants: lookup("IGNORED_TENANTS")
                .map(|raw| parse_tenant_list(&raw))
                .unwrap_or_default(),
            tenant_concurrency: number("TENANT_CONCURRENCY", defaults.tenant_concurrency),
            batch_size: number("SYNC_BATCH_SIZE", defaults.batch_size),
            snapshot_path: lookup("CATALOG_SNAPSHOT_PATH").map(PathBuf::from),
        }
    }
}

/// Parse a comma-separated tenant id list, skipping entries that are not ids.
pub fn parse_tenant_list(raw: &str) -> Vec<TenantId> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| match entry.parse::<u32>() {
            Ok(id) => Some(TenantId(id)),
            Err(_) => {
                warn!(entry, "Ignoring invalid tenant id");
                None
            }
        })
        .collect()
}

/// Names of every index the synchronizer manages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexNames {
    prefix: String,
}

impl Default for IndexNames {
    fn default() -> Self {
        Self::new(DEFAULT_INDEX_PREFIX)
    }
}

impl IndexNames {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Alias of one entity kind of one tenant, e.g. `wyvr_product_1`.
    pub fn entity_alias(&self, kind: EntityKind, tenant: TenantId) -> String {
        format!("{}_{}_{}", self.prefix, kind.as_str(), tenant)
    }

    /// Alias of the category listing cache of a tenant.
    pub fn cache_alias(&self, tenant: TenantId) -> String {
        format!("{}_cache_{}", self.prefix, tenant)
    }

    /// Alias of the global settings index.
    pub fn settings_alias(&self) -> String {
        format!("{}_settings", self.prefix)
    }

    /// The global invalidation queue index.
    pub fn clear_index(&self) -> String {
        format!("{}_clear", self.prefix)
    }

    /// Marker index of composite parents awaiting a forced re-sync.
    pub fn pending_parents(&self, tenant: TenantId) -> String {
        format!("{}_pending_parents_{}", self.prefix, tenant)
    }

    /// Marker index of categories awaiting a listing recompute.
    pub fn cache_pending(&self, tenant: TenantId) -> String {
        format!("{}_cache_pending_{}", self.prefix, tenant)
    }
}
