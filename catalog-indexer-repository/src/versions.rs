//! Index version lifecycle.
//!
//! Every logical alias is backed by physical generations `<alias>_v<N>`.
//! Full rebuilds write into a fresh generation and swap the alias over in a
//! single alias request once the generation is complete; incremental syncs
//! keep writing into the live generation.

use tracing::{debug, info, instrument, warn};

use crate::client::BackendClient;
use crate::errors::SearchBackendError;
use crate::opensearch::IndexFamily;
use crate::types::{AliasAction, IndexVersions};
use crate::utils::parse_version;

/// Resolves write targets and performs alias cutovers.
#[derive(Clone)]
pub struct IndexVersionManager {
    client: BackendClient,
}

impl IndexVersionManager {
    pub fn new(client: BackendClient) -> Self {
        Self { client }
    }

    /// Resolve the generation to write into.
    ///
    /// With `force_new_generation` the result is one past the highest existing
    /// generation. Otherwise it is the generation the alias points to, falling
    /// back to the highest existing one. Without any generation it is `1`.
    ///
    /// Backend failures are logged and yield `IndexVersions::undiscovered`.
    #[instrument(skip(self), fields(alias = %alias))]
    pub async fn resolve_for_write(&self, alias: &str, force_new_generation: bool) -> IndexVersions {
        match self.try_resolve(alias, force_new_generation).await {
            Ok(versions) => {
                debug!(
                    version = versions.version,
                    previous = ?versions.previous_targets,
                    "Resolved index version"
                );
                versions
            }
            Err(e) => {
                warn!(error = %e, "Version discovery failed, writing into the first generation without cutover");
                IndexVersions::undiscovered(alias)
            }
        }
    }

    async fn try_resolve(
        &self,
        alias: &str,
        force_new_generation: bool,
    ) -> Result<IndexVersions, SearchBackendError> {
        let mut generations: Vec<(u32, String)> = self
            .client
            .list_versions(alias)
            .await?
            .into_iter()
            .filter_map(|index| parse_version(alias, &index).map(|v| (v, index)))
            .collect();
        generations.sort();

        let mut previous_targets = self.client.alias_targets(alias).await?;
        previous_targets.sort();

        let highest = generations.last().map(|(v, _)| *v);
        let live = previous_targets
            .iter()
            .filter_map(|index| parse_version(alias, index))
            .max();

        let version = match (highest, force_new_generation) {
            (None, _) => 1,
            (Some(highest), true) => highest + 1,
            (Some(highest), false) => live.unwrap_or(highest),
        };

        Ok(IndexVersions {
            alias: alias.to_string(),
            version,
            previous_targets,
            all_versions: generations.into_iter().map(|(_, index)| index).collect(),
            discovered: true,
        })
    }

    /// Point the alias at the resolved generation and prune the others.
    ///
    /// The add and every removal go out as one alias request. Superseded
    /// generations are deleted only after it succeeded; a failed request
    /// leaves the previous generation live and deletes nothing. Undiscovered
    /// versions are refused, since their removals would be incomplete.
    #[instrument(skip(self, versions), fields(alias = %versions.alias, version = versions.version))]
    pub async fn cutover(
        &self,
        versions: &IndexVersions,
        family: IndexFamily,
    ) -> Result<(), SearchBackendError> {
        if !versions.discovered {
            return Err(SearchBackendError::alias(format!(
                "alias {} was not discovered, refusing to move it",
                versions.alias
            )));
        }
        let target = versions.index_name();
        self.client.ensure_index(&target, family).await?;

        let mut actions = vec![AliasAction::add(&target, &versions.alias)];
        actions.extend(
            versions
                .previous_targets
                .iter()
                .filter(|index| **index != target)
                .map(|index| AliasAction::remove(index, &versions.alias)),
        );

        if let Err(e) = self.client.update_aliases(&actions).await {
            warn!(error = %e, target = %target, "Alias cutover failed, previous generation stays live");
            return Err(e);
        }
        info!(target = %target, "Alias cut over");

        for index in versions.all_versions.iter().filter(|index| **index != target) {
            match self.client.destroy_index(index).await {
                Ok(()) => debug!(index = %index, "Removed superseded generation"),
                Err(e) => warn!(index = %index, error = %e, "Failed to remove superseded generation"),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendConfig;
    use crate::memory::InMemoryBackend;
    use crate::interfaces::SearchBackend;
    use catalog_indexer_shared::EntityKind;
    use serde_json::json;
    use std::sync::Arc;

    const ALIAS: &str = "wyvr_product_1";
    const FAMILY: IndexFamily = IndexFamily::Entity(EntityKind::Product);

    fn manager() -> (Arc<InMemoryBackend>, IndexVersionManager) {
        let backend = Arc::new(InMemoryBackend::new());
        let client = BackendClient::new(backend.clone(), BackendConfig::default());
        (backend, IndexVersionManager::new(client))
    }

    #[tokio::test]
    async fn test_resolve_without_generations() {
        let (_, manager) = manager();
        for force in [true, false] {
            let versions = manager.resolve_for_write(ALIAS, force).await;
            assert_eq!(versions, IndexVersions::initial(ALIAS));
        }
    }

    #[tokio::test]
    async fn test_resolve_full_and_incremental() {
        let (backend, manager) = manager();
        for name in ["wyvr_product_1_v1", "wyvr_product_1_v2", "wyvr_product_10_v7"] {
            backend.create_index(name, &json!({})).await.unwrap();
        }
        backend
            .update_aliases(&[AliasAction::add("wyvr_product_1_v1", ALIAS)])
            .await
            .unwrap();

        let full = manager.resolve_for_write(ALIAS, true).await;
        assert_eq!(full.version, 3);
        assert_eq!(full.previous_targets, vec!["wyvr_product_1_v1"]);
        assert_eq!(full.all_versions, vec!["wyvr_product_1_v1", "wyvr_product_1_v2"]);

        // v2 was leaked by a failed cutover; incremental writes follow the alias.
        let incremental = manager.resolve_for_write(ALIAS, false).await;
        assert_eq!(incremental.version, 1);
    }

    #[tokio::test]
    async fn test_resolve_when_unavailable() {
        let (backend, manager) = manager();
        backend.create_index("wyvr_product_1_v4", &json!({})).await.unwrap();
        backend.set_available(false);
        let versions = manager.resolve_for_write(ALIAS, true).await;
        assert_eq!(versions, IndexVersions::undiscovered(ALIAS));
    }

    #[tokio::test]
    async fn test_undiscovered_alias_is_never_moved() {
        let (backend, manager) = manager();
        backend.create_index("wyvr_product_1_v2", &json!({})).await.unwrap();
        backend
            .update_aliases(&[AliasAction::add("wyvr_product_1_v2", ALIAS)])
            .await
            .unwrap();
        backend.fail_alias_reads(1);

        let versions = manager.resolve_for_write(ALIAS, false).await;
        assert_eq!(versions, IndexVersions::undiscovered(ALIAS));
        assert!(manager.cutover(&versions, FAMILY).await.is_err());

        assert_eq!(backend.alias_targets(ALIAS).await.unwrap(), vec!["wyvr_product_1_v2"]);
        assert_eq!(backend.index_names().await, vec!["wyvr_product_1_v2"]);
    }

    #[tokio::test]
    async fn test_cutover_swaps_and_prunes() {
        let (backend, manager) = manager();
        backend.create_index("wyvr_product_1_v1", &json!({})).await.unwrap();
        backend
            .update_aliases(&[AliasAction::add("wyvr_product_1_v1", ALIAS)])
            .await
            .unwrap();

        let versions = manager.resolve_for_write(ALIAS, true).await;
        manager.cutover(&versions, FAMILY).await.unwrap();

        assert_eq!(backend.alias_targets(ALIAS).await.unwrap(), vec!["wyvr_product_1_v2"]);
        assert_eq!(backend.index_names().await, vec!["wyvr_product_1_v2"]);
    }

    #[tokio::test]
    async fn test_failed_cutover_keeps_previous_generation() {
        let (backend, manager) = manager();
        backend.create_index("wyvr_product_1_v1", &json!({})).await.unwrap();
        backend
            .update_aliases(&[AliasAction::add("wyvr_product_1_v1", ALIAS)])
            .await
            .unwrap();
        backend.fail_alias_updates(true);

        let versions = manager.resolve_for_write(ALIAS, true).await;
        assert!(manager.cutover(&versions, FAMILY).await.is_err());

        assert_eq!(backend.alias_targets(ALIAS).await.unwrap(), vec!["wyvr_product_1_v1"]);
        assert_eq!(
            backend.index_names().await,
            vec!["wyvr_product_1_v1", "wyvr_product_1_v2"]
        );
    }
}
