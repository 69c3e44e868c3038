//! Hydration Scheduler
//!
//! The scheduler decides which node hydrates next and applies the outcomes.
//! It never calls a hydrator itself: it hands out an [`Invocation`] and the
//! store runs it outside the state lock, then reports back.
//!
//! # Algorithm
//!
//! Every change to a node's outcome (assignment, commit, inherited error)
//! marks its direct dependents dirty and everything further downstream
//! maybe-dirty. Then, scanning in topological order:
//!
//! 1. A dirty node with a settled failed dependency inherits that failure
//! 2. Skip nodes whose dependencies are still dirty or loading
//! 3. A maybe-dirty node whose dependencies all settled without touching it
//!    becomes clean; nothing upstream actually changed for it
//! 4. A dirty node waits if a dependency never resolved
//! 5. Otherwise its dependency snapshot is checked against the cache, and on
//!    a miss the hydrator is launched with a fresh version
//!
//! Results carry the version they were launched with. Only a result whose
//! version still matches the node is committed; anything else is stale.
//!
//! External mutations and async completions are queued as [`Event`]s and
//! applied only once no synchronously-ready hydration remains, so a pass is
//! never interleaved with another mutation.

use std::collections::{HashMap, VecDeque};

use serde_json::Value;
use tracing::{debug, trace, warn};

use super::cache::{CacheController, Snapshot};
use super::hydrator::{HydrationResult, Hydrator};
use crate::config::GraphConfig;
use crate::graph::{DirtyState, Graph, HydrationError, NodeError};
use crate::handle::{NodeStatus, NodeView};
use crate::path::DataPath;

/// A queued mutation.
#[derive(Debug)]
pub(crate) enum Event {
    /// Direct assignment from a handle.
    Assign { node: usize, value: Value },

    /// Path-addressed update, applied to whatever value the node holds when
    /// the event is applied.
    Update {
        node: usize,
        path: DataPath,
        value: Value,
    },

    /// An async hydration finished.
    Settled {
        node: usize,
        version: u64,
        result: HydrationResult,
    },
}

/// A hydrator call the store must perform.
#[derive(Debug)]
pub(crate) struct Invocation {
    pub node: usize,
    pub name: String,
    pub version: u64,
    pub hydrator: Hydrator,
    pub args: Snapshot,
}

/// Result of one drain step.
#[derive(Debug)]
pub(crate) enum Step {
    Invoke(Invocation),
    Applied,
    Idle,
}

pub(crate) struct Scheduler {
    graph: Graph,
    cache: CacheController,
    queue: VecDeque<Event>,
    /// Snapshot each outstanding attempt was launched with, by node.
    attempts: HashMap<usize, (u64, Snapshot)>,
    draining: bool,
    in_flight: usize,
    label: String,
}

impl Scheduler {
    pub fn new(graph: Graph, config: &GraphConfig) -> Self {
        Self {
            graph,
            cache: CacheController::new(),
            queue: VecDeque::new(),
            attempts: HashMap::new(),
            draining: false,
            in_flight: 0,
            label: config.label.clone(),
        }
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn push(&mut self, event: Event) {
        self.queue.push_back(event);
    }

    /// Claims the drain loop. Returns false if another caller already runs it.
    pub fn begin_drain(&mut self) -> bool {
        if self.draining {
            return false;
        }
        self.draining = true;
        true
    }

    /// No pass running, nothing queued and no task outstanding.
    pub fn is_idle(&self) -> bool {
        !self.draining && self.queue.is_empty() && self.in_flight == 0
    }

    pub fn cache_hits(&self) -> u64 {
        self.cache.hits()
    }

    /// Advances the drain loop by one step. Returning [`Step::Idle`] releases
    /// the loop.
    pub fn next_step(&mut self, changed: &mut Vec<usize>) -> Step {
        if let Some(invocation) = self.next_ready(changed) {
            return Step::Invoke(invocation);
        }
        match self.queue.pop_front() {
            Some(event) => {
                self.apply(event, changed);
                Step::Applied
            }
            None => {
                self.draining = false;
                Step::Idle
            }
        }
    }

    fn apply(&mut self, event: Event, changed: &mut Vec<usize>) {
        match event {
            Event::Assign { node, value } => self.assign(node, value, changed),
            Event::Update { node, path, value } => {
                let slot = self.graph.slot(node);
                match slot.value.as_ref().and_then(|current| path.replace(current, value)) {
                    Some(updated) => self.assign(node, updated, changed),
                    None => warn!(
                        graph = %self.label,
                        node = %slot.name,
                        path = ?path,
                        "path no longer resolves, dropping update"
                    ),
                }
            }
            Event::Settled {
                node,
                version,
                result,
            } => {
                self.in_flight = self.in_flight.saturating_sub(1);
                self.commit(node, version, result, changed);
            }
        }
    }

    fn assign(&mut self, node: usize, value: Value, changed: &mut Vec<usize>) {
        let slot = self.graph.slot_mut(node);
        slot.value = Some(value);
        slot.error = None;
        slot.loading = false;
        slot.version += 1;
        slot.mark_clean();
        debug!(graph = %self.label, node = %slot.name, version = slot.version, "assigned");

        self.attempts.remove(&node);
        changed.push(node);
        self.graph.mark_changed(node);
    }

    /// Finds the next node to hydrate, settling everything that needs no
    /// hydrator call along the way.
    fn next_ready(&mut self, changed: &mut Vec<usize>) -> Option<Invocation> {
        for pos in 0..self.graph.order().len() {
            let node = self.graph.order()[pos];
            let slot = self.graph.slot(node);
            if slot.dirty == DirtyState::Clean {
                continue;
            }
            // A settled failure upstream decides the outcome even while a
            // sibling dependency is still loading.
            if slot.dirty == DirtyState::Dirty && slot.hydrator.is_some() {
                if let Some((origin, source)) = self.failed_dependency(node) {
                    self.graph.slot_mut(node).mark_clean();
                    self.inherit(node, origin, source, changed);
                    continue;
                }
            }
            if slot
                .deps
                .iter()
                .any(|&dep| self.graph.slot(dep).is_unsettled())
            {
                continue;
            }
            if slot.dirty == DirtyState::MaybeDirty || slot.hydrator.is_none() {
                self.graph.slot_mut(node).mark_clean();
                continue;
            }

            self.graph.slot_mut(node).mark_clean();
            if let Some(invocation) = self.evaluate(node, changed) {
                return Some(invocation);
            }
        }
        None
    }

    fn evaluate(&mut self, node: usize, changed: &mut Vec<usize>) -> Option<Invocation> {
        let slot = self.graph.slot(node);

        let snapshot: Option<Snapshot> = slot
            .deps
            .iter()
            .map(|&dep| self.graph.slot(dep).value.clone())
            .collect();
        let Some(snapshot) = snapshot else {
            trace!(graph = %self.label, node = %slot.name, "waiting on unresolved dependency");
            return None;
        };

        let has_outcome = slot.value.is_some() || slot.error.is_some();
        if has_outcome && self.cache.is_fresh(node, slot.cache, &snapshot) {
            trace!(graph = %self.label, node = %slot.name, "snapshot unchanged, skipping hydration");
            let slot = self.graph.slot_mut(node);
            if slot.loading {
                // Supersede the attempt launched for a snapshot we moved away from.
                slot.loading = false;
                slot.version += 1;
                self.attempts.remove(&node);
                changed.push(node);
            }
            return None;
        }

        let slot = self.graph.slot_mut(node);
        let hydrator = slot.hydrator.clone()?;
        slot.version += 1;
        slot.hydrations += 1;
        let version = slot.version;
        let name = slot.name.clone();
        debug!(graph = %self.label, node = %name, version, "launching hydration");

        self.attempts.insert(node, (version, snapshot.clone()));
        Some(Invocation {
            node,
            name,
            version,
            hydrator,
            args: snapshot,
        })
    }

    /// The first settled dependency failure, as `(origin, source)`.
    fn failed_dependency(&self, node: usize) -> Option<(String, HydrationError)> {
        self.graph.slot(node).deps.iter().find_map(|&dep| {
            let dep = self.graph.slot(dep);
            if dep.is_unsettled() {
                return None;
            }
            dep.error.as_ref().map(|err| match err {
                NodeError::Hydration(source) => (dep.name.clone(), source.clone()),
                NodeError::Inherited { origin, source } => (origin.clone(), source.clone()),
            })
        })
    }

    fn inherit(
        &mut self,
        node: usize,
        origin: String,
        source: HydrationError,
        changed: &mut Vec<usize>,
    ) {
        let slot = self.graph.slot_mut(node);
        debug!(graph = %self.label, node = %slot.name, origin = %origin, "inheriting dependency failure");
        slot.error = Some(NodeError::Inherited { origin, source });
        slot.loading = false;
        slot.version += 1;

        self.attempts.remove(&node);
        self.cache.invalidate(node);
        changed.push(node);
        self.graph.mark_changed(node);
    }

    /// Marks an attempt as outstanding on the async runtime.
    pub fn begin_loading(&mut self, node: usize, version: u64, changed: &mut Vec<usize>) {
        self.in_flight += 1;
        let slot = self.graph.slot_mut(node);
        if slot.version == version {
            slot.loading = true;
            changed.push(node);
        }
    }

    /// Applies a hydration result if it is still current.
    pub fn commit(
        &mut self,
        node: usize,
        version: u64,
        result: HydrationResult,
        changed: &mut Vec<usize>,
    ) {
        let slot = self.graph.slot_mut(node);
        if slot.version != version {
            debug!(
                graph = %self.label,
                node = %slot.name,
                version,
                current = slot.version,
                "discarding stale hydration result"
            );
            return;
        }

        slot.loading = false;
        match result {
            Ok(value) => {
                slot.value = Some(value);
                slot.error = None;
                slot.version += 1;
                debug!(graph = %self.label, node = %slot.name, version = slot.version, "hydrated");
            }
            Err(err) => {
                warn!(graph = %self.label, node = %slot.name, error = %err, "hydration failed");
                slot.error = Some(NodeError::Hydration(err));
            }
        }
        let cache_enabled = slot.cache;

        if let Some((_, snapshot)) = self.attempts.remove(&node).filter(|(v, _)| *v == version) {
            self.cache.record(node, cache_enabled, snapshot);
        }
        changed.push(node);
        self.graph.mark_changed(node);
    }

    pub fn view(&self, node: usize) -> NodeView {
        let slot = self.graph.slot(node);
        let status = if slot.loading {
            NodeStatus::Loading
        } else if slot.error.is_some() {
            NodeStatus::Errored
        } else if slot.value.is_some() {
            NodeStatus::Resolved
        } else {
            NodeStatus::Unresolved
        };

        NodeView {
            name: slot.name.clone(),
            value: slot.value.clone(),
            error: slot.error.clone(),
            loading: slot.loading,
            version: slot.version,
            status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeDef;
    use serde_json::json;

    fn scheduler(defs: Vec<NodeDef>) -> Scheduler {
        let config = GraphConfig::default();
        let graph = Graph::build(defs, config.default_cache).unwrap();
        Scheduler::new(graph, &config)
    }

    fn idx(s: &Scheduler, name: &str) -> usize {
        s.graph().index_of(name).unwrap()
    }

    /// Runs sync invocations inline until the scheduler goes idle. Returns
    /// the names invoked, in order.
    fn run(s: &mut Scheduler) -> Vec<String> {
        let mut invoked = Vec::new();
        assert!(s.begin_drain());
        loop {
            let mut changed = Vec::new();
            match s.next_step(&mut changed) {
                Step::Invoke(inv) => {
                    invoked.push(inv.name.clone());
                    let result = match inv.hydrator.call(&inv.args) {
                        crate::hydrate::Hydration::Ready(result) => result,
                        other => panic!("expected ready hydration, got {other:?}"),
                    };
                    s.commit(inv.node, inv.version, result, &mut changed);
                }
                Step::Applied => {}
                Step::Idle => return invoked,
            }
        }
    }

    fn chain() -> Vec<NodeDef> {
        vec![
            NodeDef::new("a"),
            NodeDef::new("b")
                .depends_on(["a"])
                .hydrate(|deps| Ok(json!(deps[0].as_i64().unwrap_or(0) + 1))),
            NodeDef::new("c")
                .depends_on(["b"])
                .hydrate(|deps| Ok(json!(deps[0].as_i64().unwrap_or(0) * 10))),
        ]
    }

    #[test]
    fn unresolved_leaf_blocks_dependents() {
        let mut s = scheduler(chain());
        assert!(run(&mut s).is_empty());
        assert_eq!(s.view(idx(&s, "c")).status, NodeStatus::Unresolved);
    }

    #[test]
    fn assignment_hydrates_chain_in_order() {
        let mut s = scheduler(chain());
        run(&mut s);

        let a = idx(&s, "a");
        s.push(Event::Assign { node: a, value: json!(1) });
        assert_eq!(run(&mut s), vec!["b", "c"]);
        assert_eq!(s.view(idx(&s, "c")).value, Some(json!(20)));
        assert!(s.is_idle());
    }

    #[test]
    fn stale_commit_is_discarded() {
        let mut s = scheduler(chain());
        let b = idx(&s, "b");
        let mut changed = Vec::new();

        s.commit(b, 99, Ok(json!("late")), &mut changed);
        assert!(changed.is_empty());
        assert_eq!(s.view(b).value, None);
    }

    #[test]
    fn settled_event_releases_in_flight() {
        let mut s = scheduler(chain());
        run(&mut s);
        let a = idx(&s, "a");
        let b = idx(&s, "b");

        s.push(Event::Assign { node: a, value: json!(1) });
        assert!(s.begin_drain());
        let mut changed = Vec::new();
        assert!(matches!(s.next_step(&mut changed), Step::Applied));
        let inv = match s.next_step(&mut changed) {
            Step::Invoke(inv) => inv,
            other => panic!("expected invocation, got {other:?}"),
        };
        s.begin_loading(inv.node, inv.version, &mut changed);
        assert!(s.view(b).loading);
        assert!(matches!(s.next_step(&mut changed), Step::Idle));
        assert!(!s.is_idle());

        s.push(Event::Settled {
            node: b,
            version: inv.version,
            result: Ok(json!(2)),
        });
        run(&mut s);
        assert!(s.is_idle());
        assert_eq!(s.view(b).status, NodeStatus::Resolved);
        assert_eq!(s.view(idx(&s, "c")).value, Some(json!(20)));
    }

    #[test]
    fn queued_updates_apply_to_current_value() {
        let mut s = scheduler(vec![NodeDef::new("form").initial(json!({ "a": 0, "b": 0 }))]);
        run(&mut s);
        let form = idx(&s, "form");

        s.push(Event::Update {
            node: form,
            path: DataPath::parse("a").unwrap(),
            value: json!(1),
        });
        s.push(Event::Update {
            node: form,
            path: DataPath::parse("b").unwrap(),
            value: json!(2),
        });
        run(&mut s);
        assert_eq!(s.view(form).value, Some(json!({ "a": 1, "b": 2 })));
    }

    #[test]
    fn update_is_dropped_once_path_disappears() {
        let mut s = scheduler(vec![NodeDef::new("form").initial(json!({ "a": 0 }))]);
        run(&mut s);
        let form = idx(&s, "form");
        let version = s.view(form).version;

        s.push(Event::Assign { node: form, value: json!("reset") });
        s.push(Event::Update {
            node: form,
            path: DataPath::parse("a").unwrap(),
            value: json!(1),
        });
        run(&mut s);
        assert_eq!(s.view(form).value, Some(json!("reset")));
        assert_eq!(s.view(form).version, version + 1);
    }
}
