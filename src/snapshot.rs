//! The snapshot store: the current document plus replacement notification.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use slab::Slab;

use crate::error::CalcError;

type Listener = Box<dyn FnMut(&Value, &Value) -> Result<(), CalcError> + Send>;

struct StoreInner {
    current: RwLock<Arc<Value>>,
    listeners: Mutex<Slab<Listener>>,
    queued: Mutex<VecDeque<Value>>,
    notifying: AtomicBool,
}

/// Holds the current document and notifies listeners when it is replaced.
///
/// The store never merges: [`replace`](SnapshotStore::replace) swaps the
/// whole document. The engine reads snapshots and subscribes to replacements;
/// only the hosting layer calls `replace`, and only with a complete value.
///
/// This is cheap to clone — all data is behind `Arc`.
#[derive(Clone)]
pub struct SnapshotStore {
    inner: Arc<StoreInner>,
}

impl SnapshotStore {
    /// Create a store holding an initial document.
    pub fn new(initial: Value) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                current: RwLock::new(Arc::new(initial)),
                listeners: Mutex::new(Slab::new()),
                queued: Mutex::new(VecDeque::new()),
                notifying: AtomicBool::new(false),
            }),
        }
    }

    /// Read the current snapshot.
    pub fn current(&self) -> Arc<Value> {
        self.inner.current.read().clone()
    }

    /// Replace the document wholesale and synchronously notify listeners
    /// with `(old, new)`.
    ///
    /// The first listener error aborts the notification pass and is returned
    /// to the caller; the mutation site is where calculation failures
    /// surface.
    ///
    /// A `replace` arriving while a notification pass is already running on
    /// this stack (a listener or downstream subscriber replacing the
    /// document) is queued and applied after the current pass completes, so
    /// listeners never observe a partially propagated intermediate state.
    /// Queued replacements are dropped if an earlier pass fails.
    pub fn replace(&self, new: Value) -> Result<(), CalcError> {
        self.inner.queued.lock().push_back(new);
        if self.inner.notifying.swap(true, Ordering::AcqRel) {
            // A pass further up the stack drains the queue.
            return Ok(());
        }
        let result = self.drain();
        if result.is_err() {
            self.inner.queued.lock().clear();
        }
        self.inner.notifying.store(false, Ordering::Release);
        result
    }

    fn drain(&self) -> Result<(), CalcError> {
        loop {
            let Some(next) = self.inner.queued.lock().pop_front() else {
                return Ok(());
            };
            let new = Arc::new(next);
            let old = {
                let mut current = self.inner.current.write();
                std::mem::replace(&mut *current, new.clone())
            };
            tracing::debug!(listeners = self.inner.listeners.lock().len(), "snapshot replaced");
            let mut listeners = self.inner.listeners.lock();
            for (_, listener) in listeners.iter_mut() {
                listener(&old, &new)?;
            }
        }
    }

    /// Subscribe to replacements.
    ///
    /// The listener is invoked synchronously from `replace` with the old and
    /// new snapshot. Listeners may call `replace` (the call is queued) but
    /// must not subscribe or unsubscribe from within a notification.
    ///
    /// Dropping the returned handle does not detach the listener; teardown is
    /// explicit via [`SnapshotSubscription::unsubscribe`].
    pub fn subscribe(
        &self,
        listener: impl FnMut(&Value, &Value) -> Result<(), CalcError> + Send + 'static,
    ) -> SnapshotSubscription {
        let key = self.inner.listeners.lock().insert(Box::new(listener));
        SnapshotSubscription {
            inner: self.inner.clone(),
            key,
        }
    }
}

/// Handle for detaching a snapshot listener.
pub struct SnapshotSubscription {
    inner: Arc<StoreInner>,
    key: usize,
}

impl SnapshotSubscription {
    /// Detach the listener. Idempotent by construction: the handle is
    /// consumed.
    pub fn unsubscribe(self) {
        self.inner.listeners.lock().try_remove(self.key);
    }
}
