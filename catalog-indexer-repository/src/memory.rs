//! In-process search backend.
//!
//! `InMemoryBackend` keeps indices and aliases in a single mutex-guarded map so
//! every call, alias updates included, is atomic with respect to every other.
//! It is used by the binary when no cluster is wanted and by tests, which can
//! toggle availability and make alias reads or updates fail.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::errors::SearchBackendError;
use crate::interfaces::SearchBackend;
use crate::types::AliasAction;

#[derive(Debug, Default, Clone)]
struct State {
    /// Physical index name -> documents by id.
    indices: BTreeMap<String, BTreeMap<String, Value>>,
    /// Alias -> physical indices it points to.
    aliases: BTreeMap<String, BTreeSet<String>>,
}

impl State {
    /// Indices a read through `name` covers.
    fn read_targets(&self, name: &str) -> Vec<String> {
        if self.indices.contains_key(name) {
            return vec![name.to_string()];
        }
        self.aliases
            .get(name)
            .map(|targets| targets.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// The single index a write or point read through `name` goes to.
    ///
    /// `Ok(None)` means nothing by that name exists yet.
    fn single_target(&self, name: &str) -> Result<Option<String>, SearchBackendError> {
        if self.indices.contains_key(name) {
            return Ok(Some(name.to_string()));
        }
        match self.aliases.get(name) {
            None => Ok(None),
            Some(targets) if targets.len() == 1 => Ok(targets.iter().next().cloned()),
            Some(targets) => Err(SearchBackendError::validation(format!(
                "alias {} points to {} indices",
                name,
                targets.len()
            ))),
        }
    }
}

fn matches_pattern(name: &str, pattern: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => name.starts_with(prefix),
        None => name == pattern,
    }
}

/// Alias-aware in-memory implementation of `SearchBackend`.
#[derive(Debug)]
pub struct InMemoryBackend {
    state: Mutex<State>,
    available: AtomicBool,
    fail_alias_updates: AtomicBool,
    failing_alias_reads: AtomicUsize,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            available: AtomicBool::new(true),
            fail_alias_updates: AtomicBool::new(false),
            failing_alias_reads: AtomicUsize::new(0),
        }
    }

    /// While unavailable every call fails with a connection error.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Make every `update_aliases` call fail without applying any action.
    pub fn fail_alias_updates(&self, fail: bool) {
        self.fail_alias_updates.store(fail, Ordering::SeqCst);
    }

    /// Make the next `count` `alias_targets` calls fail.
    pub fn fail_alias_reads(&self, count: usize) {
        self.failing_alias_reads.store(count, Ordering::SeqCst);
    }

    /// Names of all physical indices, sorted.
    pub async fn index_names(&self) -> Vec<String> {
        self.state.lock().await.indices.keys().cloned().collect()
    }

    /// Every document reachable through `name`, sorted by id.
    pub async fn documents(&self, name: &str) -> Vec<Value> {
        let state = self.state.lock().await;
        state
            .read_targets(name)
            .iter()
            .filter_map(|index| state.indices.get(index))
            .flat_map(|docs| docs.values().cloned())
            .collect()
    }

    fn check_available(&self) -> Result<(), SearchBackendError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(SearchBackendError::connection("in-memory backend is unavailable"))
        }
    }
}

#[async_trait]
impl SearchBackend for InMemoryBackend {
    async fn ping(&self) -> Result<(), SearchBackendError> {
        self.check_available()
    }

    async fn index_exists(&self, index: &str) -> Result<bool, SearchBackendError> {
        self.check_available()?;
        let state = self.state.lock().await;
        Ok(state.indices.contains_key(index) || state.aliases.contains_key(index))
    }

    async fn create_index(&self, index: &str, _body: &Value) -> Result<(), SearchBackendError> {
        self.check_available()?;
        let mut state = self.state.lock().await;
        if state.aliases.contains_key(index) {
            return Err(SearchBackendError::index_management(format!(
                "{} is an alias",
                index
            )));
        }
        state.indices.entry(index.to_string()).or_default();
        Ok(())
    }

    async fn delete_index(&self, index: &str) -> Result<(), SearchBackendError> {
        self.check_available()?;
        let mut state = self.state.lock().await;
        state.indices.remove(index);
        for targets in state.aliases.values_mut() {
            targets.remove(index);
        }
        state.aliases.retain(|_, targets| !targets.is_empty());
        Ok(())
    }

    async fn list_indices(&self, pattern: &str) -> Result<Vec<String>, SearchBackendError> {
        self.check_available()?;
        let state = self.state.lock().await;
        Ok(state
            .indices
            .keys()
            .filter(|name| matches_pattern(name, pattern))
            .cloned()
            .collect())
    }

    async fn alias_targets(&self, alias: &str) -> Result<Vec<String>, SearchBackendError> {
        self.check_available()?;
        let failing = self
            .failing_alias_reads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failing.is_ok() {
            return Err(SearchBackendError::alias(format!("failed to read alias {}", alias)));
        }
        let state = self.state.lock().await;
        Ok(state
            .aliases
            .get(alias)
            .map(|targets| targets.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn update_aliases(&self, actions: &[AliasAction]) -> Result<(), SearchBackendError> {
        self.check_available()?;
        if self.fail_alias_updates.load(Ordering::SeqCst) {
            return Err(SearchBackendError::alias("alias update rejected"));
        }
        let mut state = self.state.lock().await;
        // Applied to a copy so a rejected action leaves every alias untouched.
        let mut next = state.aliases.clone();
        for action in actions {
            match action {
                AliasAction::Add { index, alias } => {
                    if !state.indices.contains_key(index) {
                        return Err(SearchBackendError::alias(format!(
                            "no such index: {}",
                            index
                        )));
                    }
                    next.entry(alias.clone()).or_default().insert(index.clone());
                }
                AliasAction::Remove { index, alias } => {
                    let removed = next
                        .get_mut(alias)
                        .map(|targets| targets.remove(index))
                        .unwrap_or(false);
                    if !removed {
                        return Err(SearchBackendError::alias(format!(
                            "alias {} does not point to {}",
                            alias, index
                        )));
                    }
                }
            }
        }
        next.retain(|_, targets| !targets.is_empty());
        state.aliases = next;
        Ok(())
    }

    async fn index_document(
        &self,
        index: &str,
        id: &str,
        body: &Value,
    ) -> Result<(), SearchBackendError> {
        self.check_available()?;
        let mut state = self.state.lock().await;
        let target = state
            .single_target(index)?
            .unwrap_or_else(|| index.to_string());
        state
            .indices
            .entry(target)
            .or_default()
            .insert(id.to_string(), body.clone());
        Ok(())
    }

    async fn get_document(
        &self,
        index: &str,
        id: &str,
    ) -> Result<Option<Value>, SearchBackendError> {
        self.check_available()?;
        let state = self.state.lock().await;
        let Some(target) = state.single_target(index)? else {
            return Ok(None);
        };
        Ok(state
            .indices
            .get(&target)
            .and_then(|docs| docs.get(id))
            .cloned())
    }

    async fn delete_document(&self, index: &str, id: &str) -> Result<bool, SearchBackendError> {
        self.check_available()?;
        let mut state = self.state.lock().await;
        let Some(target) = state.single_target(index)? else {
            return Ok(false);
        };
        Ok(state
            .indices
            .get_mut(&target)
            .map(|docs| docs.remove(id).is_some())
            .unwrap_or(false))
    }

    async fn scan_documents(
        &self,
        index: &str,
        _page_size: usize,
    ) -> Result<Vec<Value>, SearchBackendError> {
        self.check_available()?;
        Ok(self.documents(index).await)
    }

    async fn count_documents(&self, index: &str) -> Result<u64, SearchBackendError> {
        self.check_available()?;
        let state = self.state.lock().await;
        Ok(state
            .read_targets(index)
            .iter()
            .filter_map(|name| state.indices.get(name))
            .map(|docs| docs.len() as u64)
            .sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_alias_resolution() {
        let backend = InMemoryBackend::new();
        backend.create_index("shop_v1", &json!({})).await.unwrap();
        backend
            .index_document("shop_v1", "1", &json!({"id": 1}))
            .await
            .unwrap();
        backend
            .update_aliases(&[AliasAction::add("shop_v1", "shop")])
            .await
            .unwrap();

        assert_eq!(backend.count_documents("shop").await.unwrap(), 1);
        assert!(backend.get_document("shop", "1").await.unwrap().is_some());
        assert_eq!(backend.alias_targets("shop").await.unwrap(), vec!["shop_v1"]);
    }

    #[tokio::test]
    async fn test_update_aliases_is_all_or_nothing() {
        let backend = InMemoryBackend::new();
        backend.create_index("shop_v1", &json!({})).await.unwrap();
        backend
            .update_aliases(&[AliasAction::add("shop_v1", "shop")])
            .await
            .unwrap();

        let result = backend
            .update_aliases(&[
                AliasAction::remove("shop_v1", "shop"),
                AliasAction::add("shop_v9", "shop"),
            ])
            .await;
        assert!(matches!(result, Err(SearchBackendError::AliasError(_))));
        assert_eq!(backend.alias_targets("shop").await.unwrap(), vec!["shop_v1"]);
    }

    #[tokio::test]
    async fn test_list_indices_pattern() {
        let backend = InMemoryBackend::new();
        for name in ["shop_v1", "shop_v2", "shop_pages_v1"] {
            backend.create_index(name, &json!({})).await.unwrap();
        }
        assert_eq!(
            backend.list_indices("shop_v*").await.unwrap(),
            vec!["shop_v1", "shop_v2"]
        );
    }

    #[tokio::test]
    async fn test_delete_index_drops_alias() {
        let backend = InMemoryBackend::new();
        backend.create_index("shop_v1", &json!({})).await.unwrap();
        backend
            .update_aliases(&[AliasAction::add("shop_v1", "shop")])
            .await
            .unwrap();
        backend.delete_index("shop_v1").await.unwrap();
        assert!(backend.alias_targets("shop").await.unwrap().is_empty());
        assert!(!backend.index_exists("shop").await.unwrap());
    }

    #[tokio::test]
    async fn test_unavailable() {
        let backend = InMemoryBackend::new();
        backend.set_available(false);
        assert!(backend.ping().await.unwrap_err().is_unavailable());
        backend.set_available(true);
        assert!(backend.ping().await.is_ok());
    }
}
