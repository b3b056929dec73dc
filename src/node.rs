//! The live computation node behind one calculation.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use slab::Slab;

use crate::definition::CompiledBody;
use crate::error::CalcError;
use crate::path::FieldPath;

/// A dependency source bound at wiring time.
///
/// Field sources re-resolve their path against the current snapshot on every
/// recomputation; upstream sources read the referenced node's value directly.
/// Binding to the live node rather than a registry copy is what keeps a chain
/// of calculations consistent within one propagation pass.
#[derive(Clone)]
pub enum BoundSource {
    /// Read a field path from the current snapshot.
    Field(FieldPath),
    /// Read another calculation's live node.
    Upstream(Arc<CalcNode>),
}

struct NodeState {
    mounted: bool,
    value: Value,
    last_tick: u64,
}

/// The reactive node holding one calculation's current result.
///
/// Lifecycle: created unmounted, mounting performs the first computation,
/// unmounting tears tracking down. There is no error state — a body failure
/// propagates out of the call that triggered the recomputation and the node
/// keeps its previous value.
pub struct CalcNode {
    id: String,
    sources: Vec<BoundSource>,
    body: CompiledBody,
    state: Mutex<NodeState>,
    subscribers: Mutex<Slab<Box<dyn FnMut(&Value) + Send>>>,
}

impl CalcNode {
    pub(crate) fn new(id: String, sources: Vec<BoundSource>, body: CompiledBody) -> Arc<Self> {
        Arc::new(Self {
            id,
            sources,
            body,
            state: Mutex::new(NodeState {
                mounted: false,
                value: Value::Null,
                last_tick: 0,
            }),
            subscribers: Mutex::new(Slab::new()),
        })
    }

    /// The calculation id this node computes.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The node's current value (`Null` before the first computation).
    pub fn value(&self) -> Value {
        self.state.lock().value.clone()
    }

    /// Whether the node is currently mounted.
    pub fn is_mounted(&self) -> bool {
        self.state.lock().mounted
    }

    pub(crate) fn subscribe(&self, subscriber: impl FnMut(&Value) + Send + 'static) -> usize {
        self.subscribers.lock().insert(Box::new(subscriber))
    }

    /// Begin tracking and perform the first computation.
    pub(crate) fn mount(&self, snapshot: &Value) -> Result<(), CalcError> {
        self.state.lock().mounted = true;
        self.recompute(snapshot, 0)
    }

    /// Stop tracking. The node keeps its last value but no longer recomputes,
    /// and its subscribers are detached.
    pub(crate) fn unmount(&self) {
        self.state.lock().mounted = false;
        self.subscribers.lock().clear();
    }

    /// True when any bound source changed between the two snapshots: a field
    /// source resolving differently, or an upstream node that recomputed in
    /// this propagation pass.
    pub(crate) fn is_dirty(&self, old: &Value, new: &Value, tick: u64) -> bool {
        self.sources.iter().any(|source| match source {
            BoundSource::Field(path) => path.resolve_in(old) != path.resolve_in(new),
            BoundSource::Upstream(node) => node.recomputed_at(tick),
        })
    }

    pub(crate) fn recomputed_at(&self, tick: u64) -> bool {
        self.state.lock().last_tick == tick
    }

    /// Read every source, call the body with the values in declaration
    /// order, store the result, and synchronously notify subscribers.
    pub(crate) fn recompute(&self, snapshot: &Value, tick: u64) -> Result<(), CalcError> {
        let args: Vec<Value> = self
            .sources
            .iter()
            .map(|source| source.read(snapshot))
            .collect();
        let value = self.body.call(&args)?;
        {
            let mut state = self.state.lock();
            state.value = value.clone();
            state.last_tick = tick;
        }
        let mut subscribers = self.subscribers.lock();
        for (_, subscriber) in subscribers.iter_mut() {
            subscriber(&value);
        }
        Ok(())
    }
}

impl BoundSource {
    fn read(&self, snapshot: &Value) -> Value {
        match self {
            BoundSource::Field(path) => path
                .resolve_in(snapshot)
                .cloned()
                .unwrap_or(Value::Null),
            BoundSource::Upstream(node) => node.value(),
        }
    }
}
