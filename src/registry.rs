//! The per-wiring-pass result registry.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use slab::Slab;

type SlotListener = Box<dyn FnMut(&Value) + Send>;

struct RegistryInner {
    values: RwLock<HashMap<String, Value>>,
    listeners: Mutex<HashMap<String, Slab<SlotListener>>>,
}

/// One addressable result slot per calculation id.
///
/// A registry is scoped to a single wiring pass — one per open editing
/// context — never a process-wide singleton, so concurrently open documents
/// cannot cross-contaminate calculation results. Slots are created empty
/// before any node computes, and each slot mirrors its node's latest value
/// for the lifetime of the pass.
///
/// This is cheap to clone — all data is behind `Arc`.
#[derive(Clone)]
pub struct ResultRegistry {
    inner: Arc<RegistryInner>,
}

impl ResultRegistry {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                values: RwLock::new(HashMap::new()),
                listeners: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Create an empty slot for `id` so references resolve to a real, if
    /// empty, placeholder before the node computes.
    pub(crate) fn create_slot(&self, id: &str) {
        self.inner
            .values
            .write()
            .entry(id.to_string())
            .or_insert(Value::Null);
        self.inner
            .listeners
            .lock()
            .entry(id.to_string())
            .or_default();
    }

    /// Read a calculation's latest value.
    ///
    /// Returns `None` for an id unknown to this pass, and `Value::Null` for a
    /// slot that has not been computed yet.
    pub fn get(&self, id: &str) -> Option<Value> {
        self.inner.values.read().get(id).cloned()
    }

    /// Ids of every slot in this pass.
    pub fn ids(&self) -> Vec<String> {
        self.inner.values.read().keys().cloned().collect()
    }

    /// Store a value and synchronously notify the slot's subscribers.
    ///
    /// Writes to unknown ids are ignored.
    pub(crate) fn set(&self, id: &str, value: Value) {
        {
            let mut values = self.inner.values.write();
            let Some(slot) = values.get_mut(id) else {
                return;
            };
            *slot = value.clone();
        }
        let mut listeners = self.inner.listeners.lock();
        if let Some(slot_listeners) = listeners.get_mut(id) {
            for (_, listener) in slot_listeners.iter_mut() {
                listener(&value);
            }
        }
    }

    /// Subscribe to changes of one calculation's value.
    ///
    /// Returns `None` for an id unknown to this pass. The subscriber is
    /// invoked synchronously whenever the slot updates; it may read the
    /// registry or replace the snapshot, but must not subscribe or
    /// unsubscribe from within a notification.
    pub fn subscribe(
        &self,
        id: &str,
        subscriber: impl FnMut(&Value) + Send + 'static,
    ) -> Option<RegistrySubscription> {
        let mut listeners = self.inner.listeners.lock();
        let slot_listeners = listeners.get_mut(id)?;
        let key = slot_listeners.insert(Box::new(subscriber));
        Some(RegistrySubscription {
            inner: self.inner.clone(),
            id: id.to_string(),
            key,
        })
    }
}

/// Handle for detaching a registry subscriber.
pub struct RegistrySubscription {
    inner: Arc<RegistryInner>,
    id: String,
    key: usize,
}

impl RegistrySubscription {
    /// Detach the subscriber.
    pub fn unsubscribe(self) {
        if let Some(slot_listeners) = self.inner.listeners.lock().get_mut(&self.id) {
            slot_listeners.try_remove(self.key);
        }
    }
}
