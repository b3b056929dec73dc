//! The graph wiring routine: definitions in, live graph out.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::Value;

use crate::definition::{CalcDefinition, CompiledBody, Dependency};
use crate::error::CalcError;
use crate::node::{BoundSource, CalcNode};
use crate::registry::ResultRegistry;
use crate::snapshot::{SnapshotStore, SnapshotSubscription};

/// Wire an ordered list of calculation definitions into a live graph.
///
/// Definitions are processed in the given order, which must be dependency
/// order: every `calc:` reference must name a definition declared earlier in
/// the list. The routine validates before building anything — duplicate ids,
/// unknown references, forward references, dependency cycles, and textual
/// bodies that fail to compile all abort the pass before any node is mounted.
///
/// For each definition the routine binds dependencies (calculation
/// references bind to the live upstream node, never a registry copy), builds
/// a [`CalcNode`], mirrors it into its [`ResultRegistry`] slot, mounts it
/// (the first computation), and re-reads the node's value into the slot once
/// more in case a subscription delivers asynchronously in some future
/// transport. A body error during a first computation aborts the remaining
/// definitions fail-fast; nodes wired earlier in the same pass are discarded
/// with it — the store listener is installed only after every mount
/// succeeds, so a failed pass leaves no live subscriptions behind.
///
/// On success, one snapshot listener drives propagation: every replacement
/// walks the nodes in wiring order and recomputes exactly those whose field
/// sources resolved differently or whose upstream nodes recomputed in the
/// same pass. Each affected node recomputes exactly once per replacement, in
/// dependency order, so downstream calculations always observe same-pass
/// upstream values.
pub fn wire(
    store: &SnapshotStore,
    definitions: Vec<CalcDefinition>,
) -> Result<WiredGraph, CalcError> {
    let parsed: Vec<Vec<Dependency>> = definitions.iter().map(CalcDefinition::dependencies).collect();
    validate(&definitions, &parsed)?;

    let bodies: Vec<CompiledBody> = definitions
        .iter()
        .zip(&parsed)
        .map(|(def, deps)| {
            def.body.compile(deps.len()).map_err(|source| CalcError::Compile {
                id: def.id.clone(),
                source,
            })
        })
        .collect::<Result<_, _>>()?;

    tracing::debug!(definitions = definitions.len(), "wiring calculation graph");

    let registry = ResultRegistry::new();
    for def in &definitions {
        registry.create_slot(&def.id);
    }

    let snapshot = store.current();
    let mut nodes: HashMap<String, Arc<CalcNode>> = HashMap::new();
    let mut ordered: Vec<Arc<CalcNode>> = Vec::with_capacity(definitions.len());
    for ((def, deps), body) in definitions.iter().zip(parsed).zip(bodies) {
        let sources = deps
            .into_iter()
            .map(|dep| match dep {
                Dependency::Field(path) => BoundSource::Field(path),
                // Validation guarantees the upstream node is already built.
                Dependency::Calc(id) => BoundSource::Upstream(nodes[&id].clone()),
            })
            .collect();
        let node = CalcNode::new(def.id.clone(), sources, body);

        let slot = registry.clone();
        let slot_id = def.id.clone();
        node.subscribe(move |value| slot.set(&slot_id, value.clone()));

        node.mount(&snapshot)?;
        registry.set(&def.id, node.value());
        tracing::trace!(id = %def.id, "calculation mounted");

        nodes.insert(def.id.clone(), node.clone());
        ordered.push(node);
    }

    let handles = ordered
        .iter()
        .map(|node| TeardownHandle { node: node.clone() })
        .collect();

    let ticks = AtomicU64::new(0);
    let subscription = store.subscribe(move |old, new| {
        let tick = ticks.fetch_add(1, Ordering::Relaxed) + 1;
        propagate(&ordered, old, new, tick)
    });

    Ok(WiredGraph {
        registry,
        handles,
        subscription,
    })
}

fn propagate(nodes: &[Arc<CalcNode>], old: &Value, new: &Value, tick: u64) -> Result<(), CalcError> {
    for node in nodes {
        if !node.is_mounted() {
            continue;
        }
        if node.is_dirty(old, new, tick) {
            tracing::trace!(id = node.id(), tick, "recomputing");
            node.recompute(new, tick)?;
        }
    }
    Ok(())
}

fn validate(definitions: &[CalcDefinition], parsed: &[Vec<Dependency>]) -> Result<(), CalcError> {
    let mut position: HashMap<&str, usize> = HashMap::new();
    for (index, def) in definitions.iter().enumerate() {
        if position.insert(def.id.as_str(), index).is_some() {
            return Err(CalcError::DuplicateId { id: def.id.clone() });
        }
    }

    for (index, def) in definitions.iter().enumerate() {
        for dep in &parsed[index] {
            let Dependency::Calc(target) = dep else {
                continue;
            };
            if !position.contains_key(target.as_str()) {
                return Err(CalcError::UnknownCalc {
                    id: def.id.clone(),
                    dependency: target.clone(),
                });
            }
        }
    }

    if let Some(path) = find_cycle(definitions, parsed, &position) {
        return Err(CalcError::Cycle { path });
    }

    // Acyclic forward references are still rejected: binding one would read
    // a slot that is not live within a propagation pass.
    for (index, def) in definitions.iter().enumerate() {
        for dep in &parsed[index] {
            let Dependency::Calc(target) = dep else {
                continue;
            };
            if position[target.as_str()] >= index {
                return Err(CalcError::OutOfOrder {
                    id: def.id.clone(),
                    dependency: target.clone(),
                });
            }
        }
    }

    Ok(())
}

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

fn find_cycle(
    definitions: &[CalcDefinition],
    parsed: &[Vec<Dependency>],
    position: &HashMap<&str, usize>,
) -> Option<Vec<String>> {
    let mut marks = vec![Mark::Unvisited; definitions.len()];
    let mut stack = Vec::new();
    for start in 0..definitions.len() {
        if marks[start] == Mark::Unvisited {
            if let Some(path) = visit(start, definitions, parsed, position, &mut marks, &mut stack)
            {
                return Some(path);
            }
        }
    }
    None
}

fn visit(
    index: usize,
    definitions: &[CalcDefinition],
    parsed: &[Vec<Dependency>],
    position: &HashMap<&str, usize>,
    marks: &mut Vec<Mark>,
    stack: &mut Vec<usize>,
) -> Option<Vec<String>> {
    marks[index] = Mark::InProgress;
    stack.push(index);
    for dep in &parsed[index] {
        let Dependency::Calc(target) = dep else {
            continue;
        };
        let target = position[target.as_str()];
        match marks[target] {
            Mark::InProgress => {
                let from = stack.iter().position(|&i| i == target).unwrap_or(0);
                let mut path: Vec<String> = stack[from..]
                    .iter()
                    .map(|&i| definitions[i].id.clone())
                    .collect();
                path.push(definitions[target].id.clone());
                return Some(path);
            }
            Mark::Unvisited => {
                if let Some(path) = visit(target, definitions, parsed, position, marks, stack) {
                    return Some(path);
                }
            }
            Mark::Done => {}
        }
    }
    stack.pop();
    marks[index] = Mark::Done;
    None
}

/// A live, wired calculation graph.
///
/// Owns the nodes and registry it created. Re-wiring (a recipe context
/// switch) is done by [`teardown`](WiredGraph::teardown) and a fresh
/// [`wire`] call with definitions bound to the new context.
pub struct WiredGraph {
    registry: ResultRegistry,
    handles: Vec<TeardownHandle>,
    subscription: SnapshotSubscription,
}

impl WiredGraph {
    /// The registry holding this pass's results (cheap to clone).
    pub fn registry(&self) -> ResultRegistry {
        self.registry.clone()
    }

    /// Take the per-definition teardown handles, in wiring order.
    ///
    /// Tearing down an upstream calculation freezes its last value for any
    /// dependents left mounted. The graph-level snapshot listener remains
    /// installed until [`teardown`](WiredGraph::teardown) runs.
    pub fn take_handles(&mut self) -> Vec<TeardownHandle> {
        std::mem::take(&mut self.handles)
    }

    /// Tear down every remaining node and detach from the snapshot store.
    pub fn teardown(self) {
        for handle in self.handles {
            handle.teardown();
        }
        self.subscription.unsubscribe();
    }
}

/// Handle that unsubscribes and unmounts one calculation's node.
pub struct TeardownHandle {
    node: Arc<CalcNode>,
}

impl TeardownHandle {
    /// Id of the calculation this handle tears down.
    pub fn id(&self) -> &str {
        self.node.id()
    }

    /// Unsubscribe the node from its registry slot and unmount it. The
    /// node's slot keeps its last value.
    pub fn teardown(self) {
        self.node.unmount();
    }
}
