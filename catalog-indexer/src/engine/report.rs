//! Run bookkeeping: modes, reports, cancellation and timing.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use catalog_indexer_shared::{EntityId, TenantId};
use tracing::info;

/// How a run treats the index generation and unchanged entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Write every entity into a fresh generation, then cut the alias over.
    Full,
    /// Write changed entities into the live generation.
    Incremental,
    /// Write the given entities into the live generation even if unchanged.
    Forced,
}

impl SyncMode {
    pub fn is_full(&self) -> bool {
        matches!(self, SyncMode::Full)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncMode::Full => "full",
            SyncMode::Incremental => "incremental",
            SyncMode::Forced => "forced",
        }
    }
}

/// Outcome of one trigger.
///
/// Triggers never fail; everything that went wrong is counted here and was
/// logged where it happened.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub trigger: String,
    /// The backend was not configured or unreachable; nothing was attempted.
    pub skipped: bool,
    pub tenants_visited: usize,
    pub tenants_failed: Vec<TenantId>,
    pub written: usize,
    pub unchanged: usize,
    /// Requested ids the system-of-record does not know.
    pub missing: usize,
    /// Entities rejected for lack of an identifier.
    pub invalid: usize,
    /// Entities whose fetch, build or write failed.
    pub failed: usize,
    pub deleted: usize,
    pub invalidations: usize,
    pub parents_deferred: BTreeSet<EntityId>,
    pub affected_aggregates: BTreeSet<EntityId>,
    pub aggregates_recomputed: usize,
    /// A full rebuild whose alias cutover failed.
    pub cutover_failed: Vec<TenantId>,
    /// The run was cancelled before every entity was visited.
    pub interrupted: bool,
}

impl SyncReport {
    pub fn new(trigger: impl Into<String>) -> Self {
        Self {
            trigger: trigger.into(),
            ..Self::default()
        }
    }

    pub fn skipped(trigger: impl Into<String>) -> Self {
        Self {
            skipped: true,
            ..Self::new(trigger)
        }
    }

    /// Fold the outcome of one tenant into this report.
    pub fn absorb(&mut self, outcome: TenantOutcome) {
        self.tenants_visited += 1;
        self.written += outcome.written;
        self.unchanged += outcome.unchanged;
        self.missing += outcome.missing;
        self.invalid += outcome.invalid;
        self.failed += outcome.failed;
        self.deleted += outcome.deleted;
        self.invalidations += outcome.invalidations;
        self.parents_deferred.extend(outcome.parents_deferred);
        self.affected_aggregates.extend(outcome.affected_aggregates);
        self.aggregates_recomputed += outcome.aggregates_recomputed;
        if outcome.cutover_failed {
            self.cutover_failed.push(outcome.tenant);
        }
        self.interrupted |= outcome.interrupted;
    }

    /// Record a tenant whose run failed as a whole.
    pub fn tenant_failed(&mut self, tenant: TenantId) {
        self.tenants_visited += 1;
        self.tenants_failed.push(tenant);
    }

    /// Whether anything failed, short of the backend being unavailable.
    pub fn has_failures(&self) -> bool {
        !self.tenants_failed.is_empty()
            || !self.cutover_failed.is_empty()
            || self.failed > 0
            || self.invalid > 0
    }
}

/// Counters of one tenant's run.
#[derive(Debug, Clone, Default)]
pub struct TenantOutcome {
    pub tenant: TenantId,
    pub written: usize,
    pub unchanged: usize,
    pub missing: usize,
    pub invalid: usize,
    pub failed: usize,
    pub deleted: usize,
    pub invalidations: usize,
    pub parents_deferred: BTreeSet<EntityId>,
    pub affected_aggregates: BTreeSet<EntityId>,
    pub aggregates_recomputed: usize,
    pub cutover_failed: bool,
    pub interrupted: bool,
}

impl TenantOutcome {
    pub fn new(tenant: TenantId) -> Self {
        Self {
            tenant,
            ..Self::default()
        }
    }
}

/// Cooperative cancellation of long runs.
///
/// Engines check the handle between entities. A cancelled handle stays
/// cancelled until `reset`.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Await `future` and log how long it took.
pub async fn measure<F: Future>(label: &str, future: F) -> F::Output {
    let started = Instant::now();
    let output = future.await;
    info!(
        label,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Finished"
    );
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absorb_tenant_outcomes() {
        let mut report = SyncReport::new("cron products");
        let mut first = TenantOutcome::new(TenantId(1));
        first.written = 2;
        first.affected_aggregates.insert(9);
        let mut second = TenantOutcome::new(TenantId(2));
        second.unchanged = 1;
        second.affected_aggregates.insert(9);
        second.cutover_failed = true;

        report.absorb(first);
        report.absorb(second);
        report.tenant_failed(TenantId(3));

        assert_eq!(report.tenants_visited, 3);
        assert_eq!(report.written, 2);
        assert_eq!(report.unchanged, 1);
        assert_eq!(report.affected_aggregates, BTreeSet::from([9]));
        assert_eq!(report.cutover_failed, vec![TenantId(2)]);
        assert_eq!(report.tenants_failed, vec![TenantId(3)]);
        assert!(report.has_failures());
    }

    #[test]
    fn test_cancel_handle_is_shared() {
        let handle = CancelHandle::default();
        let clone = handle.clone();
        clone.cancel();
        assert!(handle.is_cancelled());
        handle.reset();
        assert!(!clone.is_cancelled());
    }

    #[tokio::test]
    async fn test_measure_returns_output() {
        assert_eq!(measure("test", async { 42 }).await, 42);
    }
}
