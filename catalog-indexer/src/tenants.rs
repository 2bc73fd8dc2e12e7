//! Tenant enumeration with per-tenant failure isolation.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use catalog_indexer_shared::{Tenant, TenantId};
use futures::stream::{self, StreamExt};
use tokio::sync::RwLock;
use tracing::{debug, error, warn};

use crate::errors::{SourceError, SyncError};
use crate::source::TenantRegistry;

/// Outcome of running one callback over every tenant.
#[derive(Debug)]
pub struct TenantRun<T> {
    pub completed: Vec<(TenantId, T)>,
    pub failed: Vec<(TenantId, SyncError)>,
}

impl<T> Default for TenantRun<T> {
    fn default() -> Self {
        Self {
            completed: Vec::new(),
            failed: Vec::new(),
        }
    }
}

impl<T> TenantRun<T> {
    pub fn visited(&self) -> usize {
        self.completed.len() + self.failed.len()
    }
}

/// Enumerates the tenants to synchronize.
///
/// The tenant list is read from the registry once and cached until `refresh`.
/// Tenants flagged as ignored by the registry or listed in the configured
/// ignore list are never visited.
pub struct TenantIterator {
    registry: Arc<dyn TenantRegistry>,
    ignored: HashSet<TenantId>,
    concurrency: usize,
    cache: RwLock<Option<Vec<Tenant>>>,
}

impl TenantIterator {
    pub fn new(registry: Arc<dyn TenantRegistry>, ignored: Vec<TenantId>, concurrency: usize) -> Self {
        Self {
            registry,
            ignored: ignored.into_iter().collect(),
            concurrency: concurrency.max(1),
            cache: RwLock::new(None),
        }
    }

    /// The non-ignored tenants.
    pub async fn tenants(&self) -> Result<Vec<Tenant>, SourceError> {
        if let Some(tenants) = self.cache.read().await.as_ref() {
            return Ok(tenants.clone());
        }
        let mut cache = self.cache.write().await;
        if let Some(tenants) = cache.as_ref() {
            return Ok(tenants.clone());
        }
        let tenants: Vec<Tenant> = self
            .registry
            .tenants()
            .await?
            .into_iter()
            .filter(|tenant| {
                let skip = tenant.ignored || self.ignored.contains(&tenant.id);
                if skip {
                    debug!(tenant = %tenant.id, "Skipping ignored tenant");
                }
                !skip
            })
            .collect();
        *cache = Some(tenants.clone());
        Ok(tenants)
    }

    /// Drop the cached tenant list; the next call reads the registry again.
    pub async fn refresh(&self) {
        *self.cache.write().await = None;
    }

    /// Run `callback` once per tenant.
    ///
    /// A failing callback is logged and recorded; the remaining tenants are
    /// still visited. Up to the configured concurrency callbacks run at once,
    /// in no particular order.
    pub async fn for_each<T, F, Fut>(&self, label: &str, callback: F) -> TenantRun<T>
    where
        F: Fn(Tenant) -> Fut,
        Fut: Future<Output = Result<T, SyncError>>,
    {
        let tenants = match self.tenants().await {
            Ok(tenants) => tenants,
            Err(e) => {
                error!(label, error = %e, "Failed to load tenants");
                return TenantRun::default();
            }
        };

        let results: Vec<(TenantId, Result<T, SyncError>)> = stream::iter(tenants)
            .map(|tenant| {
                let id = tenant.id;
                let run = callback(tenant);
                async move { (id, run.await) }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut run = TenantRun::default();
        for (tenant, result) in results {
            match result {
                Ok(value) => run.completed.push((tenant, value)),
                Err(e) => {
                    warn!(label, tenant = %tenant, error = %e, "Tenant run failed");
                    run.failed.push((tenant, e));
                }
            }
        }
        run
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct MockRegistry {
        tenants: Vec<Tenant>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TenantRegistry for MockRegistry {
        async fn tenants(&self) -> Result<Vec<Tenant>, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.tenants.clone())
        }
    }

    fn registry() -> Arc<MockRegistry> {
        Arc::new(MockRegistry {
            tenants: vec![
                Tenant::new(1, "default"),
                Tenant::new(2, "de").ignored(),
                Tenant::new(3, "fr"),
                Tenant::new(4, "it"),
            ],
            calls: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn test_ignored_tenants_are_never_visited() {
        let iterator = TenantIterator::new(registry(), vec![TenantId(4)], 1);
        let visited = Mutex::new(Vec::new());
        let run = iterator
            .for_each("test", |tenant| {
                visited.lock().unwrap().push(tenant.id);
                async { Ok(()) }
            })
            .await;

        assert_eq!(run.visited(), 2);
        let mut visited = visited.into_inner().unwrap();
        visited.sort();
        assert_eq!(visited, vec![TenantId(1), TenantId(3)]);
    }

    #[tokio::test]
    async fn test_failure_is_isolated() {
        let iterator = TenantIterator::new(registry(), vec![], 1);
        let run = iterator
            .for_each("test", |tenant| async move {
                if tenant.id == TenantId(1) {
                    Err(SyncError::invalid("boom"))
                } else {
                    Ok(tenant.id.0)
                }
            })
            .await;

        assert_eq!(run.failed.len(), 1);
        assert_eq!(run.failed[0].0, TenantId(1));
        let mut completed: Vec<u32> = run.completed.iter().map(|(_, v)| *v).collect();
        completed.sort();
        assert_eq!(completed, vec![3, 4]);
    }

    #[tokio::test]
    async fn test_tenant_list_is_cached() {
        let registry = registry();
        let iterator = TenantIterator::new(registry.clone(), vec![], 2);
        iterator.tenants().await.unwrap();
        iterator.tenants().await.unwrap();
        assert_eq!(registry.calls.load(Ordering::SeqCst), 1);

        iterator.refresh().await;
        iterator.tenants().await.unwrap();
        assert_eq!(registry.calls.load(Ordering::SeqCst), 2);
    }
}
