//! Request and state types for backend operations.

use serde_json::{json, Value};

/// One action of an atomic alias update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AliasAction {
    /// Point `alias` at `index`.
    Add { index: String, alias: String },
    /// Remove `alias` from `index`.
    Remove { index: String, alias: String },
}

impl AliasAction {
    pub fn add(index: impl Into<String>, alias: impl Into<String>) -> Self {
        Self::Add {
            index: index.into(),
            alias: alias.into(),
        }
    }

    pub fn remove(index: impl Into<String>, alias: impl Into<String>) -> Self {
        Self::Remove {
            index: index.into(),
            alias: alias.into(),
        }
    }

    /// The action as it appears in an `_aliases` request body.
    pub fn to_body(&self) -> Value {
        match self {
            AliasAction::Add { index, alias } => json!({"add": {"index": index, "alias": alias}}),
            AliasAction::Remove { index, alias } => {
                json!({"remove": {"index": index, "alias": alias}})
            }
        }
    }
}

/// Version state of one alias, resolved before a write.
///
/// `version` is the generation to write into; `previous_targets` are the
/// physical indices the alias pointed to at resolve time and `all_versions`
/// every physical `<alias>_v<N>` index that existed then.
///
/// `discovered` is `false` when the backend could not be read. The alias
/// must not be moved from such a state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexVersions {
    pub alias: String,
    pub version: u32,
    pub previous_targets: Vec<String>,
    pub all_versions: Vec<String>,
    pub discovered: bool,
}

impl IndexVersions {
    /// The zero state: first generation, nothing to remove or prune.
    pub fn initial(alias: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            version: 1,
            previous_targets: Vec::new(),
            all_versions: Vec::new(),
            discovered: true,
        }
    }

    /// Fallback when discovery failed: write into the first generation and
    /// leave the alias alone.
    pub fn undiscovered(alias: impl Into<String>) -> Self {
        Self {
            discovered: false,
            ..Self::initial(alias)
        }
    }

    /// Physical index name of the resolved generation.
    pub fn index_name(&self) -> String {
        crate::utils::versioned_index_name(&self.alias, self.version)
    }

    /// Whether the alias pointed anywhere at resolve time.
    pub fn has_live_target(&self) -> bool {
        !self.previous_targets.is_empty()
    }

    /// Whether the alias is known to point nowhere, so the new generation
    /// can go live before its first write.
    pub fn needs_early_cutover(&self) -> bool {
        self.discovered && self.previous_targets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alias_action_body() {
        let add = AliasAction::add("wyvr_product_1_v2", "wyvr_product_1");
        assert_eq!(
            add.to_body(),
            json!({"add": {"index": "wyvr_product_1_v2", "alias": "wyvr_product_1"}})
        );
        let remove = AliasAction::remove("wyvr_product_1_v1", "wyvr_product_1");
        assert_eq!(remove.to_body()["remove"]["index"], "wyvr_product_1_v1");
    }

    #[test]
    fn test_initial_versions() {
        let versions = IndexVersions::initial("wyvr_page_2");
        assert_eq!(versions.index_name(), "wyvr_page_2_v1");
        assert!(!versions.has_live_target());
        assert!(versions.needs_early_cutover());
    }

    #[test]
    fn test_undiscovered_versions_never_cut_over_early() {
        let versions = IndexVersions::undiscovered("wyvr_page_2");
        assert_eq!(versions.index_name(), "wyvr_page_2_v1");
        assert!(!versions.discovered);
        assert!(!versions.needs_early_cutover());
    }
}
