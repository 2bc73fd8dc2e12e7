//! Notification contract for external subscribers.
//!
//! Engines call every registered listener synchronously after an entity was
//! written. Listeners must not block; the engine does not know who listens.

use std::sync::{Arc, PoisonError, RwLock};

use catalog_indexer_shared::{EntityId, EntityKind, TenantId};

use crate::engine::SyncMode;

/// An entity was written into a tenant's index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncEvent {
    pub kind: EntityKind,
    pub tenant: TenantId,
    pub id: EntityId,
    pub natural_key: Option<String>,
    pub mode: SyncMode,
    /// Aggregates affected by this write (old and new membership).
    pub affected_aggregates: Vec<EntityId>,
}

pub trait SyncListener: Send + Sync {
    fn on_entity_synced(&self, event: &SyncEvent);
}

/// The set of listeners of one engine. Listeners can be added at any time.
#[derive(Clone, Default)]
pub struct Listeners {
    inner: Arc<RwLock<Vec<Arc<dyn SyncListener>>>>,
}

impl Listeners {
    // A listener that panicked elsewhere leaves the list itself intact.
    pub fn register(&self, listener: Arc<dyn SyncListener>) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    pub fn notify(&self, event: &SyncEvent) {
        let listeners = self
            .inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for listener in listeners {
            listener.on_entity_synced(event);
        }
    }

    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<SyncEvent>>,
    }

    impl SyncListener for Recorder {
        fn on_entity_synced(&self, event: &SyncEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }

    #[test]
    fn test_every_listener_is_notified() {
        let listeners = Listeners::default();
        let first = Arc::new(Recorder::default());
        let second = Arc::new(Recorder::default());
        listeners.register(first.clone());
        listeners.register(second.clone());

        let event = SyncEvent {
            kind: EntityKind::Product,
            tenant: TenantId(1),
            id: 7,
            natural_key: Some("blue-shoe".to_string()),
            mode: SyncMode::Incremental,
            affected_aggregates: vec![9],
        };
        listeners.notify(&event);

        assert_eq!(listeners.len(), 2);
        assert_eq!(first.events.lock().unwrap().as_slice(), &[event.clone()]);
        assert_eq!(second.events.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_poisoned_list_still_registers_and_notifies() {
        let listeners = Listeners::default();
        let inner = listeners.inner.clone();
        let _ = std::thread::spawn(move || {
            let _guard = inner.write().unwrap();
            panic!("listener registration panicked");
        })
        .join();
        assert!(listeners.inner.is_poisoned());

        let recorder = Arc::new(Recorder::default());
        listeners.register(recorder.clone());
        listeners.notify(&SyncEvent {
            kind: EntityKind::Page,
            tenant: TenantId(2),
            id: 5,
            natural_key: Some("home".to_string()),
            mode: SyncMode::Forced,
            affected_aggregates: Vec::new(),
        });

        assert_eq!(listeners.len(), 1);
        assert_eq!(recorder.events.lock().unwrap().len(), 1);
    }
}
