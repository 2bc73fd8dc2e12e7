//! Settings index: one global generation holding one document per tenant.

use std::sync::Arc;

use catalog_indexer_repository::{BackendClient, IndexFamily, IndexVersionManager};
use catalog_indexer_shared::TenantId;
use serde_json::{json, Map, Value};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::config::{IndexNames, SETTINGS_INCLUDED_PATHS};
use crate::engine::{measure, SyncContext, SyncReport, TenantOutcome};
use crate::errors::SyncError;
use crate::source::CatalogSource;
use crate::tenants::TenantIterator;

pub struct SettingsSync {
    source: Arc<dyn CatalogSource>,
    client: BackendClient,
    versions: IndexVersionManager,
    tenants: Arc<TenantIterator>,
    names: IndexNames,
}

impl SettingsSync {
    pub fn new(source: Arc<dyn CatalogSource>, ctx: &SyncContext) -> Self {
        Self {
            source,
            client: ctx.client.clone(),
            versions: ctx.versions.clone(),
            tenants: ctx.tenants.clone(),
            names: ctx.names.clone(),
        }
    }

    /// Write every tenant's settings into a new generation, then cut over.
    #[instrument(skip(self), fields(run_id = %Uuid::new_v4()))]
    pub async fn update_all(&self, reason: &str) -> SyncReport {
        if reason.trim().is_empty() {
            error!("Settings rebuild requested without a trigger reason");
            return SyncReport::skipped(reason);
        }
        let label = format!("settings update_all \"{}\"", reason);
        measure(&label, self.rebuild(reason)).await
    }

    async fn rebuild(&self, reason: &str) -> SyncReport {
        if !self.client.is_available(reason).await {
            return SyncReport::skipped(reason);
        }
        let versions = self
            .versions
            .resolve_for_write(&self.names.settings_alias(), true)
            .await;
        let index = versions.index_name();
        let index = index.as_str();
        let early_cutover = versions.needs_early_cutover();
        let early_cutover_failed = early_cutover
            && self
                .versions
                .cutover(&versions, IndexFamily::Settings)
                .await
                .is_err();

        let run = self
            .tenants
            .for_each(reason, |tenant| async move {
                let value = self.tenant_settings(tenant.id).await?;
                self.client
                    .upsert(
                        index,
                        IndexFamily::Settings,
                        &json!({ "id": tenant.id, "value": value }),
                    )
                    .await
                    .map_err(SyncError::from)?;
                let mut outcome = TenantOutcome::new(tenant.id);
                outcome.written = 1;
                Ok::<_, SyncError>(outcome)
            })
            .await;

        let mut report = SyncReport::new(reason);
        for (_, outcome) in run.completed {
            report.absorb(outcome);
        }
        for (tenant, _) in run.failed {
            report.tenant_failed(tenant);
        }

        if early_cutover {
            if early_cutover_failed {
                report.cutover_failed.push(TenantId::ALL);
            }
            return report;
        }
        if !versions.discovered {
            warn!(index = %index, "Versions unknown, settings written without cutover");
            report.cutover_failed.push(TenantId::ALL);
            return report;
        }
        // Readers keep the previous settings if no tenant could be written.
        if report.written == 0 {
            warn!(index = %index, "No settings written, keeping previous generation");
            if let Err(e) = self.client.destroy_index(index).await {
                warn!(index = %index, error = %e, "Failed to drop empty settings generation");
            }
            return report;
        }
        if self
            .versions
            .cutover(&versions, IndexFamily::Settings)
            .await
            .is_err()
        {
            report.cutover_failed.push(TenantId::ALL);
        }
        info!(index = %index, tenants = report.written, "Settings rebuilt");
        report
    }

    /// The nested settings object of a tenant. Tenants without included paths
    /// get `null`.
    async fn tenant_settings(&self, tenant: TenantId) -> Result<Value, SyncError> {
        let Some(included) = self
            .source
            .config_value(tenant, SETTINGS_INCLUDED_PATHS)
            .await?
        else {
            return Ok(Value::Null);
        };
        let paths: Vec<&str> = included
            .lines()
            .map(str::trim)
            .filter(|path| !path.is_empty())
            .collect();
        if paths.is_empty() {
            warn!(tenant = %tenant, "No settings paths configured");
            return Ok(Value::Null);
        }

        let mut settings = Map::new();
        for path in paths {
            let value = self.source.config_value(tenant, path).await?;
            insert_path(&mut settings, path, value.map(Value::String).unwrap_or(Value::Null));
        }
        Ok(Value::Object(settings))
    }
}

/// Insert `value` at the `/`-separated `path`, creating intermediate objects.
///
/// A value already stored along the path is replaced by an object.
pub(crate) fn insert_path(root: &mut Map<String, Value>, path: &str, value: Value) {
    let mut segments = path.split('/').filter(|segment| !segment.is_empty());
    let Some(mut key) = segments.next() else {
        return;
    };
    let mut node = root;
    for next in segments {
        let entry = node
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        let Value::Object(child) = entry else {
            return;
        };
        node = child;
        key = next;
    }
    node.insert(key.to_string(), value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_indexer_repository::{BackendConfig, InMemoryBackend};
    use catalog_indexer_shared::Tenant;

    use crate::config::SyncConfig;
    use crate::source::{CatalogSnapshot, SnapshotCatalog};

    #[test]
    fn test_insert_path_nests_segments() {
        let mut root = Map::new();
        insert_path(&mut root, "general/locale/code", json!("de_DE"));
        insert_path(&mut root, "general/locale/timezone", json!("Europe/Berlin"));
        insert_path(&mut root, "web", json!("x"));

        assert_eq!(
            Value::Object(root),
            json!({
                "general": {"locale": {"code": "de_DE", "timezone": "Europe/Berlin"}},
                "web": "x"
            })
        );
    }

    #[tokio::test]
    async fn test_settings_generation_per_run() {
        let backend = Arc::new(InMemoryBackend::new());
        let client = BackendClient::new(backend.clone(), BackendConfig::default());
        let catalog = Arc::new(SnapshotCatalog::new(CatalogSnapshot {
            tenants: vec![Tenant::new(1, "default"), Tenant::new(2, "en")],
            ..CatalogSnapshot::default()
        }));
        catalog
            .set_config(None, SETTINGS_INCLUDED_PATHS, "general/locale/code\n\nweb/seo")
            .await;
        catalog.set_config(None, "general/locale/code", "de_DE").await;
        catalog
            .set_config(Some(TenantId(2)), "general/locale/code", "en_US")
            .await;
        let ctx = SyncContext::new(client, catalog.clone(), catalog.clone(), &SyncConfig::default());
        let settings = SettingsSync::new(catalog, &ctx);

        let report = settings.update_all("config save").await;
        assert_eq!(report.written, 2);
        settings.update_all("config save").await;

        let docs = backend.documents("wyvr_settings").await;
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0]["value"]["general"]["locale"]["code"], "de_DE");
        assert_eq!(docs[1]["value"]["general"]["locale"]["code"], "en_US");
        assert_eq!(docs[1]["value"]["web"]["seo"], Value::Null);
        assert_eq!(backend.index_names().await, vec!["wyvr_settings_v2".to_string()]);
    }

    #[tokio::test]
    async fn test_settings_without_reason_are_skipped() {
        let catalog = Arc::new(SnapshotCatalog::default());
        let ctx = SyncContext::new(
            BackendClient::unconfigured(),
            catalog.clone(),
            catalog.clone(),
            &SyncConfig::default(),
        );
        assert!(SettingsSync::new(catalog, &ctx).update_all(" ").await.skipped);
    }
}
