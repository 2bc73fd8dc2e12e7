//! Entity synchronization.
//!
//! `EntitySyncEngine` drives one entity kind through its per-tenant index
//! generations. An `EntityAdapter` supplies the kind specifics: how the
//! working set is read from the system-of-record and how a record becomes a
//! `SearchDocument`.
//!
//! ## Runs
//!
//! Every trigger visits each non-ignored tenant in isolation:
//!
//! 1. **Resolve** the generation (full rebuild: a new one; otherwise the live one)
//! 2. **Cut over early** if the alias points nowhere yet
//! 3. **Sync** the working set batch by batch (fetch, compare, write, cascade, invalidate)
//! 4. **Cut over** after a complete full rebuild
//! 5. **Recompute** the affected aggregates

mod block;
mod category;
mod page;
mod product;
mod report;

pub use block::BlockAdapter;
pub use category::CategoryAdapter;
pub use page::PageAdapter;
pub use product::ProductAdapter;
pub use report::{measure, CancelHandle, SyncMode, SyncReport, TenantOutcome};

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use catalog_indexer_repository::{BackendClient, IndexFamily, IndexVersionManager};
use catalog_indexer_shared::{EntityId, EntityKind, SearchDocument, TenantId};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::cascade::{AggregateRecompute, CascadeObligations, CascadeResolver};
use crate::config::{IndexNames, SyncConfig};
use crate::detect::ChangeDetector;
use crate::errors::{SourceError, SyncError};
use crate::invalidation::InvalidationQueue;
use crate::notify::{Listeners, SyncEvent, SyncListener};
use crate::source::{CatalogSource, TenantRegistry};
use crate::tenants::{TenantIterator, TenantRun};

pub type ProductSync = EntitySyncEngine<ProductAdapter>;
pub type CategorySync = EntitySyncEngine<CategoryAdapter>;
pub type PageSync = EntitySyncEngine<PageAdapter>;
pub type BlockSync = EntitySyncEngine<BlockAdapter>;

/// Which entities a run visits in each tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Every entity of the kind.
    All,
    /// Exactly these ids.
    Ids(Vec<EntityId>),
    /// The entity with this natural key (e.g. a product sku).
    Key(String),
}

/// Kind-specific half of the synchronization.
#[async_trait]
pub trait EntityAdapter: Send + Sync {
    type Record: Send + Sync;

    const KIND: EntityKind;

    /// Whether entities of this kind can be children of composites.
    const HAS_PARENTS: bool = false;

    /// Every id of the kind in the tenant.
    async fn ids(&self, tenant: TenantId) -> Result<Vec<EntityId>, SourceError>;

    async fn fetch(
        &self,
        tenant: TenantId,
        ids: &[EntityId],
    ) -> Result<Vec<Self::Record>, SourceError>;

    /// Look a record up by its natural key.
    async fn fetch_by_key(
        &self,
        _tenant: TenantId,
        _key: &str,
    ) -> Result<Option<Self::Record>, SourceError> {
        Ok(None)
    }

    fn id_of(record: &Self::Record) -> Option<EntityId>;

    /// The key the downstream cache layer knows the entity by.
    fn natural_key_of(record: &Self::Record) -> Option<String>;

    /// Compose the document of a record.
    async fn build(
        &self,
        tenant: TenantId,
        record: &Self::Record,
    ) -> Result<SearchDocument, SyncError>;
}

/// Collaborators shared by every engine.
#[derive(Clone)]
pub struct SyncContext {
    pub client: BackendClient,
    pub versions: IndexVersionManager,
    pub tenants: Arc<TenantIterator>,
    pub queue: InvalidationQueue,
    pub cascade: CascadeResolver,
    pub names: IndexNames,
    pub batch_size: usize,
}

impl SyncContext {
    pub fn new(
        client: BackendClient,
        source: Arc<dyn CatalogSource>,
        registry: Arc<dyn TenantRegistry>,
        config: &SyncConfig,
    ) -> Self {
        let names = config.names.clone();
        Self {
            versions: IndexVersionManager::new(client.clone()),
            tenants: Arc::new(TenantIterator::new(
                registry,
                config.ignored_tenants.clone(),
                config.tenant_concurrency,
            )),
            queue: InvalidationQueue::new(client.clone(), names.clear_index()),
            cascade: CascadeResolver::new(source, client.clone(), names.clone()),
            names,
            batch_size: config.batch_size,
            client,
        }
    }
}

/// Synchronizes one entity kind into every tenant's index.
///
/// Trigger methods never fail: they return a `SyncReport` and log every
/// skipped entity, failed tenant and discarded generation.
pub struct EntitySyncEngine<A: EntityAdapter> {
    adapter: A,
    ctx: SyncContext,
    aggregates: Option<Arc<dyn AggregateRecompute>>,
    detector: ChangeDetector,
    listeners: Listeners,
    cancel: CancelHandle,
}

impl<A: EntityAdapter> EntitySyncEngine<A> {
    pub fn new(adapter: A, ctx: SyncContext) -> Self {
        Self {
            adapter,
            ctx,
            aggregates: None,
            detector: ChangeDetector,
            listeners: Listeners::default(),
            cancel: CancelHandle::default(),
        }
    }

    /// Recompute affected aggregates through `aggregates` after each run.
    pub fn with_aggregates(mut self, aggregates: Arc<dyn AggregateRecompute>) -> Self {
        self.aggregates = Some(aggregates);
        self
    }

    pub fn register_listener(&self, listener: Arc<dyn SyncListener>) {
        self.listeners.register(listener);
    }

    /// Handle to interrupt running and future runs of this engine.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn alias(&self, tenant: TenantId) -> String {
        self.ctx.names.entity_alias(A::KIND, tenant)
    }

    fn family() -> IndexFamily {
        IndexFamily::Entity(A::KIND)
    }

    /// Rebuild every tenant's index into a new generation.
    #[instrument(skip(self), fields(kind = %A::KIND, run_id = %Uuid::new_v4()))]
    pub async fn update_all(&self, reason: &str) -> SyncReport {
        if reason.trim().is_empty() {
            error!("Full rebuild requested without a trigger reason");
            return SyncReport::skipped(reason);
        }
        let label = format!("{} update_all \"{}\"", A::KIND, reason);
        measure(&label, self.run(reason, SyncMode::Full, Selection::All)).await
    }

    /// Incrementally sync one entity.
    pub async fn update_single(&self, id: EntityId) -> SyncReport {
        self.update_many(&[id]).await
    }

    /// Incrementally sync the given entities.
    #[instrument(skip(self, ids), fields(kind = %A::KIND, count = ids.len(), run_id = %Uuid::new_v4()))]
    pub async fn update_many(&self, ids: &[EntityId]) -> SyncReport {
        let label = format!("{} update {:?}", A::KIND, ids);
        measure(
            &label,
            self.run("update", SyncMode::Incremental, Selection::Ids(ids.to_vec())),
        )
        .await
    }

    /// Sync the given entities into the live generation even if unchanged.
    #[instrument(skip(self, ids), fields(kind = %A::KIND, count = ids.len(), run_id = %Uuid::new_v4()))]
    pub async fn update_forced(&self, ids: &[EntityId], reason: &str) -> SyncReport {
        self.run(reason, SyncMode::Forced, Selection::Ids(ids.to_vec()))
            .await
    }

    /// Remove an entity from every tenant's live generation.
    #[instrument(skip(self), fields(kind = %A::KIND, run_id = %Uuid::new_v4()))]
    pub async fn delete(&self, id: EntityId) -> SyncReport {
        let trigger = format!("delete {}", id);
        if !self.ctx.client.is_available(&trigger).await {
            return SyncReport::skipped(trigger);
        }
        let run = self
            .ctx
            .tenants
            .for_each(&trigger, move |tenant| self.delete_in_tenant(tenant.id, id))
            .await;
        Self::report(&trigger, run)
    }

    pub(crate) async fn run(&self, trigger: &str, mode: SyncMode, selection: Selection) -> SyncReport {
        if matches!(&selection, Selection::Ids(ids) if ids.is_empty()) {
            return SyncReport::new(trigger);
        }
        if !self.ctx.client.is_available(trigger).await {
            return SyncReport::skipped(trigger);
        }
        if self.cancel.is_cancelled() {
            warn!(kind = %A::KIND, trigger, "Engine is cancelled, nothing will be written until the cancel handle is reset");
        }
        let selection = &selection;
        let run = self
            .ctx
            .tenants
            .for_each(trigger, move |tenant| self.sync_tenant(tenant.id, mode, selection))
            .await;
        let report = Self::report(trigger, run);
        info!(
            kind = %A::KIND,
            trigger,
            mode = mode.as_str(),
            tenants = report.tenants_visited,
            written = report.written,
            unchanged = report.unchanged,
            invalid = report.invalid,
            failed = report.failed,
            "Sync finished"
        );
        report
    }

    fn report(trigger: &str, run: TenantRun<TenantOutcome>) -> SyncReport {
        let mut report = SyncReport::new(trigger);
        for (_, outcome) in run.completed {
            report.absorb(outcome);
        }
        for (tenant, _) in run.failed {
            report.tenant_failed(tenant);
        }
        report
    }

    /// One tenant's run. Errors here fail the tenant, not the trigger.
    pub(crate) async fn sync_tenant(
        &self,
        tenant: TenantId,
        mode: SyncMode,
        selection: &Selection,
    ) -> Result<TenantOutcome, SyncError> {
        let family = Self::family();
        let versions = self
            .ctx
            .versions
            .resolve_for_write(&self.alias(tenant), mode.is_full())
            .await;
        let index = versions.index_name();
        self.ctx.client.ensure_index(&index, family).await?;

        // Nothing is live yet: point the alias before the first write.
        let early_cutover = versions.needs_early_cutover();
        if early_cutover {
            self.ctx.versions.cutover(&versions, family).await?;
        }

        let mut outcome = TenantOutcome::new(tenant);
        match selection {
            Selection::Key(key) => match self.adapter.fetch_by_key(tenant, key).await? {
                Some(record) => {
                    self.sync_record(tenant, &index, mode, &record, &mut outcome)
                        .await
                }
                None => {
                    debug!(kind = %A::KIND, tenant = %tenant, key = %key, "No entity with this key");
                    outcome.missing += 1;
                }
            },
            Selection::All | Selection::Ids(_) => {
                let ids = match selection {
                    Selection::Ids(ids) => ids.clone(),
                    _ => self.adapter.ids(tenant).await?,
                };
                self.sync_ids(tenant, &index, mode, &ids, &mut outcome).await;
            }
        }

        if mode.is_full() && !versions.discovered {
            warn!(kind = %A::KIND, tenant = %tenant, index = %index, "Versions unknown, rebuild written without cutover");
            outcome.cutover_failed = true;
        } else if mode.is_full() && !early_cutover {
            if outcome.interrupted {
                warn!(kind = %A::KIND, tenant = %tenant, index = %index, "Rebuild interrupted, discarding generation");
                if let Err(e) = self.ctx.client.destroy_index(&index).await {
                    warn!(index = %index, error = %e, "Failed to drop discarded generation");
                }
            } else if self.ctx.versions.cutover(&versions, family).await.is_err() {
                outcome.cutover_failed = true;
            }
        }

        self.recompute_aggregates(tenant, &mut outcome).await;
        Ok(outcome)
    }

    async fn sync_ids(
        &self,
        tenant: TenantId,
        index: &str,
        mode: SyncMode,
        ids: &[EntityId],
        outcome: &mut TenantOutcome,
    ) {
        if ids.is_empty() {
            debug!(kind = %A::KIND, tenant = %tenant, "No entities to sync");
            return;
        }
        for batch in ids.chunks(self.ctx.batch_size.max(1)) {
            if self.cancel.is_cancelled() {
                outcome.interrupted = true;
                return;
            }
            let records = match self.adapter.fetch(tenant, batch).await {
                Ok(records) => records,
                Err(e) => {
                    warn!(kind = %A::KIND, tenant = %tenant, count = batch.len(), error = %e, "Failed to fetch batch");
                    outcome.failed += batch.len();
                    continue;
                }
            };
            let found: HashSet<EntityId> = records.iter().filter_map(A::id_of).collect();
            outcome.missing += batch.iter().filter(|id| !found.contains(id)).count();

            for record in &records {
                if self.cancel.is_cancelled() {
                    outcome.interrupted = true;
                    return;
                }
                self.sync_record(tenant, index, mode, record, outcome).await;
            }
        }
    }

    /// Sync one record, classifying its failure.
    async fn sync_record(
        &self,
        tenant: TenantId,
        index: &str,
        mode: SyncMode,
        record: &A::Record,
        outcome: &mut TenantOutcome,
    ) {
        let Some(id) = A::id_of(record) else {
            warn!(kind = %A::KIND, tenant = %tenant, "Skipping entity without id");
            outcome.invalid += 1;
            return;
        };
        if let Err(e) = self.write_record(tenant, index, mode, record, outcome).await {
            if e.is_invalid() {
                warn!(kind = %A::KIND, tenant = %tenant, id, error = %e, "Skipping invalid entity");
                outcome.invalid += 1;
            } else {
                warn!(kind = %A::KIND, tenant = %tenant, id, error = %e, "Failed to sync entity");
                outcome.failed += 1;
            }
        }
    }

    async fn write_record(
        &self,
        tenant: TenantId,
        index: &str,
        mode: SyncMode,
        record: &A::Record,
        outcome: &mut TenantOutcome,
    ) -> Result<(), SyncError> {
        let fresh = self.adapter.build(tenant, record).await?;
        // A new generation is empty; there is nothing stored to compare with.
        let stored = if mode.is_full() {
            None
        } else {
            self.stored_document(index, fresh.id).await?
        };
        if mode == SyncMode::Incremental && !self.detector.has_changed(stored.as_ref(), &fresh) {
            debug!(kind = %A::KIND, tenant = %tenant, id = fresh.id, "Entity unchanged");
            outcome.unchanged += 1;
            return Ok(());
        }

        self.ctx
            .client
            .upsert(index, Self::family(), &fresh.to_body()?)
            .await?;
        outcome.written += 1;

        let with_parents = A::HAS_PARENTS && !mode.is_full();
        let obligations = match self
            .ctx
            .cascade
            .obligations(tenant, stored.as_ref(), &fresh, with_parents)
            .await
        {
            Ok(obligations) => obligations,
            Err(e) => {
                warn!(kind = %A::KIND, tenant = %tenant, id = fresh.id, error = %e, "Failed to resolve parents");
                CascadeObligations {
                    parent_ids: Vec::new(),
                    aggregate_ids: CascadeResolver::affected_aggregates(stored.as_ref(), &fresh),
                }
            }
        };
        if !obligations.parent_ids.is_empty() {
            match self
                .ctx
                .cascade
                .defer_parents(tenant, &obligations.parent_ids)
                .await
            {
                Ok(_) => outcome
                    .parents_deferred
                    .extend(obligations.parent_ids.iter().copied()),
                Err(e) => {
                    warn!(tenant = %tenant, id = fresh.id, error = %e, "Failed to defer parent re-sync")
                }
            }
        }
        outcome
            .affected_aggregates
            .extend(obligations.aggregate_ids.iter().copied());

        if let Some(key) = fresh.natural_key() {
            if self.ctx.queue.upsert(A::KIND.as_str(), key).await {
                outcome.invalidations += 1;
            }
        }

        self.listeners.notify(&SyncEvent {
            kind: A::KIND,
            tenant,
            id: fresh.id,
            natural_key: fresh.natural_key().map(str::to_string),
            mode,
            affected_aggregates: obligations.aggregate_ids.into_iter().collect(),
        });
        Ok(())
    }

    /// The stored document of `id`; unparseable documents count as absent.
    async fn stored_document(
        &self,
        index: &str,
        id: EntityId,
    ) -> Result<Option<SearchDocument>, SyncError> {
        let Some(body) = self.ctx.client.get_document(index, &id.to_string()).await? else {
            return Ok(None);
        };
        match SearchDocument::from_body(body) {
            Ok(doc) => Ok(Some(doc)),
            Err(e) => {
                warn!(index = %index, id, error = %e, "Ignoring unparseable stored document");
                Ok(None)
            }
        }
    }

    async fn delete_in_tenant(
        &self,
        tenant: TenantId,
        id: EntityId,
    ) -> Result<TenantOutcome, SyncError> {
        let mut outcome = TenantOutcome::new(tenant);
        let versions = self
            .ctx
            .versions
            .resolve_for_write(&self.alias(tenant), false)
            .await;
        let index = versions.index_name();
        let stored = self.stored_document(&index, id).await?;

        // The backend deletes by id, the cache layer needs the natural key.
        let source_key = match self.adapter.fetch(tenant, &[id]).await {
            Ok(records) => records
                .iter()
                .find(|record| A::id_of(record) == Some(id))
                .and_then(A::natural_key_of),
            Err(e) => {
                warn!(kind = %A::KIND, tenant = %tenant, id, error = %e, "Failed to look up natural key");
                None
            }
        };
        let key = source_key
            .filter(|key| !key.is_empty())
            .or_else(|| stored.as_ref().and_then(|doc| doc.natural_key().map(str::to_string)));

        if self
            .ctx
            .client
            .delete_document(&index, &id.to_string())
            .await?
        {
            outcome.deleted += 1;
        }
        match key {
            Some(key) => {
                if self.ctx.queue.delete(A::KIND.as_str(), &key).await {
                    outcome.invalidations += 1;
                }
            }
            None => debug!(kind = %A::KIND, tenant = %tenant, id, "Deleted entity has no natural key"),
        }

        if let Some(stored) = &stored {
            outcome
                .affected_aggregates
                .extend(stored.category_ids.iter().copied());
        }
        self.recompute_aggregates(tenant, &mut outcome).await;
        Ok(outcome)
    }

    async fn recompute_aggregates(&self, tenant: TenantId, outcome: &mut TenantOutcome) {
        if outcome.affected_aggregates.is_empty() {
            return;
        }
        let Some(aggregates) = &self.aggregates else {
            return;
        };
        match aggregates
            .recompute(tenant, &outcome.affected_aggregates)
            .await
        {
            Ok(count) => outcome.aggregates_recomputed += count,
            Err(e) => {
                warn!(tenant = %tenant, error = %e, "Failed to recompute affected aggregates")
            }
        }
    }
}
