//! Graph Nodes
//!
//! This module defines node definitions as declared by a wizard and the
//! per-node state the scheduler keeps for them.

use serde_json::Value;
use smallvec::SmallVec;

use super::error::NodeError;
use crate::hydrate::{Hydration, HydrationResult, Hydrator};

/// Dependency or dependent index list. Most wizard nodes have a handful.
pub(crate) type EdgeList = SmallVec<[usize; 4]>;

/// Declaration of a single data node.
///
/// # Example
///
/// ```rust
/// use hydragraph_core::NodeDef;
/// use serde_json::json;
///
/// let input = NodeDef::new("input");
/// let output = NodeDef::new("output")
///     .depends_on(["input"])
///     .hydrate(|deps| Ok(json!(deps[0]["name"].as_str().unwrap_or("").to_uppercase())));
/// # let _ = (input, output);
/// ```
#[derive(Debug, Clone)]
pub struct NodeDef {
    pub(crate) name: String,
    pub(crate) deps: Vec<String>,
    pub(crate) hydrator: Option<Hydrator>,
    pub(crate) cache: Option<bool>,
    pub(crate) initial: Option<Value>,
}

impl NodeDef {
    /// A leaf node with no dependencies and no hydrator.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            deps: Vec::new(),
            hydrator: None,
            cache: None,
            initial: None,
        }
    }

    /// Appends dependencies, in the order their values reach the hydrator.
    pub fn depends_on<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.deps.extend(deps.into_iter().map(Into::into));
        self
    }

    /// Sets the hydrator.
    pub fn hydrator(mut self, hydrator: Hydrator) -> Self {
        self.hydrator = Some(hydrator);
        self
    }

    /// Sets a hydrator that may answer now or later.
    pub fn hydrate_with<F>(self, f: F) -> Self
    where
        F: Fn(&[Value]) -> Hydration + Send + Sync + 'static,
    {
        self.hydrator(Hydrator::new(f))
    }

    /// Sets a synchronous hydrator.
    pub fn hydrate<F>(self, f: F) -> Self
    where
        F: Fn(&[Value]) -> HydrationResult + Send + Sync + 'static,
    {
        self.hydrator(Hydrator::sync(f))
    }

    /// Sets an asynchronous hydrator.
    pub fn hydrate_async<F, Fut>(self, f: F) -> Self
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = HydrationResult> + Send + 'static,
    {
        self.hydrator(Hydrator::from_async(f))
    }

    /// Enables or disables snapshot caching. Unset nodes use the graph default.
    pub fn cache(mut self, enabled: bool) -> Self {
        self.cache = Some(enabled);
        self
    }

    /// Seeds the node with a value before the first resolution pass.
    pub fn initial(mut self, value: impl Into<Value>) -> Self {
        self.initial = Some(value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn deps(&self) -> &[String] {
        &self.deps
    }

    pub fn is_leaf(&self) -> bool {
        self.hydrator.is_none()
    }
}

/// Dirty state of a node within a propagation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirtyState {
    /// Nothing upstream is pending.
    Clean,

    /// Something upstream is being recomputed; wait for it to settle before
    /// deciding whether this node has to run.
    MaybeDirty,

    /// A direct dependency produced a new outcome. Re-hydrate once every
    /// dependency has settled.
    Dirty,
}

/// Scheduler-side state of a node.
#[derive(Debug)]
pub(crate) struct NodeSlot {
    pub name: String,
    pub deps: EdgeList,
    pub dependents: EdgeList,
    pub hydrator: Option<Hydrator>,
    pub cache: bool,

    pub value: Option<Value>,
    pub error: Option<NodeError>,
    pub loading: bool,
    pub version: u64,
    pub dirty: DirtyState,

    /// Number of hydrator invocations so far.
    pub hydrations: u64,
}

impl NodeSlot {
    pub fn new(def: NodeDef, deps: EdgeList, cache: bool) -> Self {
        // Derived nodes start dirty so the initial pass resolves them.
        let dirty = if def.hydrator.is_some() {
            DirtyState::Dirty
        } else {
            DirtyState::Clean
        };

        Self {
            name: def.name,
            deps,
            dependents: EdgeList::new(),
            hydrator: def.hydrator,
            cache,
            value: def.initial,
            error: None,
            loading: false,
            version: 0,
            dirty,
            hydrations: 0,
        }
    }

    /// True while something upstream may still change this node.
    pub fn is_unsettled(&self) -> bool {
        self.loading || self.dirty != DirtyState::Clean
    }

    pub fn mark_clean(&mut self) {
        self.dirty = DirtyState::Clean;
    }

    pub fn mark_maybe_dirty(&mut self) {
        if self.dirty == DirtyState::Clean {
            self.dirty = DirtyState::MaybeDirty;
        }
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = DirtyState::Dirty;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn leaf_starts_clean() {
        let slot = NodeSlot::new(NodeDef::new("input"), EdgeList::new(), true);
        assert_eq!(slot.dirty, DirtyState::Clean);
        assert!(slot.value.is_none());
    }

    #[test]
    fn derived_starts_dirty() {
        let def = NodeDef::new("output")
            .depends_on(["input"])
            .hydrate(|_| Ok(json!(1)));
        assert!(!def.is_leaf());
        let slot = NodeSlot::new(def, EdgeList::new(), true);
        assert_eq!(slot.dirty, DirtyState::Dirty);
    }

    #[test]
    fn initial_value_is_seeded() {
        let slot = NodeSlot::new(
            NodeDef::new("form").initial(json!({ "replicas": 3 })),
            EdgeList::new(),
            true,
        );
        assert_eq!(slot.value, Some(json!({ "replicas": 3 })));
    }

    #[test]
    fn dirty_state_transitions() {
        let mut slot = NodeSlot::new(NodeDef::new("input"), EdgeList::new(), true);

        slot.mark_maybe_dirty();
        assert_eq!(slot.dirty, DirtyState::MaybeDirty);

        slot.mark_dirty();
        assert_eq!(slot.dirty, DirtyState::Dirty);

        // Maybe-dirty never downgrades dirty.
        slot.mark_maybe_dirty();
        assert_eq!(slot.dirty, DirtyState::Dirty);

        slot.mark_clean();
        assert!(!slot.is_unsettled());
    }
}
