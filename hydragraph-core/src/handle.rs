//! Node handles.
//!
//! A [`NodeHandle`] is what wizard steps hold: it reads the node's current
//! state and writes to it. Handles are cheap to clone and keep the graph
//! alive.

use std::sync::Arc;

use serde_json::Value;

use crate::graph::{GraphError, GraphResult, NodeError};
use crate::hydrate::scheduler::Event;
use crate::path::DataPath;
use crate::store::GraphStore;
use crate::subscriber::{Subscriber, Subscription};

/// Where a node is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    /// Never resolved and nothing in flight.
    Unresolved,
    /// An attempt for the current version is outstanding.
    Loading,
    /// Holds a value and no error.
    Resolved,
    /// Own or inherited failure recorded.
    Errored,
}

/// Point-in-time copy of a node's state, handed to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeView {
    pub name: String,
    pub value: Option<Value>,
    pub error: Option<NodeError>,
    pub loading: bool,
    pub version: u64,
    pub status: NodeStatus,
}

/// Handle to one node of a [`GraphStore`].
#[derive(Clone)]
pub struct NodeHandle {
    store: GraphStore,
    node: usize,
    name: Arc<str>,
}

impl NodeHandle {
    pub(crate) fn new(store: GraphStore, node: usize, name: &str) -> Self {
        Self {
            store,
            node,
            name: Arc::from(name),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The last successfully resolved value, or `None` if the node never
    /// resolved. A refresh in flight keeps returning the previous value.
    pub fn display_value(&self) -> Option<Value> {
        self.with_slot(|slot| slot.value.clone())
    }

    /// The failure recorded for this node, own or inherited.
    pub fn error(&self) -> Option<NodeError> {
        self.with_slot(|slot| slot.error.clone())
    }

    /// True while a hydration attempt for the current version is outstanding.
    pub fn is_loading(&self) -> bool {
        self.with_slot(|slot| slot.loading)
    }

    pub fn version(&self) -> u64 {
        self.with_slot(|slot| slot.version)
    }

    /// How many times this node's hydrator has been invoked. Always zero for
    /// leaf nodes.
    pub fn hydrations(&self) -> u64 {
        self.with_slot(|slot| slot.hydrations)
    }

    pub fn status(&self) -> NodeStatus {
        self.view().status
    }

    pub fn view(&self) -> NodeView {
        self.store.inner.scheduler.lock().view(self.node)
    }

    /// Overwrites the value, clears the error and propagates to dependents.
    ///
    /// On a node with a hydrator this is a manual override that holds until a
    /// dependency change forces re-hydration. Called from inside a hydrator
    /// or a subscriber, the assignment is queued until the current pass
    /// completes.
    pub fn assign(&self, value: impl Into<Value>) {
        self.store.push(Event::Assign {
            node: self.node,
            value: value.into(),
        });
    }

    /// Replaces the value at `path` inside the node's value and assigns the
    /// result. The previous value itself is not mutated.
    ///
    /// Fails with [`GraphError::PathNotFound`] if the node has no value or the
    /// path does not exist in it. Like [`assign`](Self::assign), the update
    /// may be queued; it is then applied to the value current at that point,
    /// so queued updates to different paths all land.
    pub fn update_data(&self, path: &str, value: impl Into<Value>) -> GraphResult<()> {
        let not_found = || GraphError::path_not_found(self.name(), path);

        let parsed = DataPath::parse(path).ok_or_else(not_found)?;
        let resolves = self.with_slot(|slot| {
            slot.value
                .as_ref()
                .is_some_and(|current| parsed.get(current).is_some())
        });
        if !resolves {
            return Err(not_found());
        }

        self.store.push(Event::Update {
            node: self.node,
            path: parsed,
            value: value.into(),
        });
        Ok(())
    }

    /// Calls `f` after every change to this node's value, error or loading
    /// flag. The callback stays registered while the returned guard lives.
    pub fn subscribe<F>(&self, f: F) -> Subscription
    where
        F: Fn(&NodeView) + Send + Sync + 'static,
    {
        let id = self.store.inner.subscribe(self.node, Subscriber::new(f));
        Subscription::new(id, self.node, Arc::downgrade(&self.store.inner))
    }

    /// Resolves once the node has no outstanding attempt for its current
    /// version.
    pub async fn loaded(&self) {
        let node = self.node;
        self.store
            .wait_until(|scheduler| !scheduler.graph().slot(node).loading)
            .await;
    }

    fn with_slot<T>(&self, f: impl FnOnce(&crate::graph::NodeSlot) -> T) -> T {
        let scheduler = self.store.inner.scheduler.lock();
        f(scheduler.graph().slot(self.node))
    }
}

impl std::fmt::Debug for NodeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeHandle")
            .field("name", &self.name)
            .field("status", &self.status())
            .finish()
    }
}
