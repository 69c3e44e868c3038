//! Graph Store
//!
//! The store owns one wizard's graph. It validates the definitions, runs the
//! initial resolution pass, and drives every later pass.
//!
//! # Execution model
//!
//! All state lives behind one mutex. Whoever first queues an event while no
//! pass is running becomes the drain loop and keeps going until nothing is
//! ready or queued; everyone else just queues. Hydrators and subscriber
//! callbacks always run with the lock released, so they may read handles or
//! queue mutations freely.
//!
//! Pending hydrations are spawned on the ambient tokio runtime. The spawned
//! task holds only a weak reference to the store: once the wizard drops its
//! store, late results are dropped with it.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::pin::pin;
use std::sync::Arc;

use futures_util::FutureExt;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::{trace, warn};

use crate::config::GraphConfig;
use crate::graph::{panic_message, Graph, GraphError, GraphResult, HydrationError, NodeDef};
use crate::handle::NodeHandle;
use crate::hydrate::scheduler::{Event, Invocation, Scheduler, Step};
use crate::hydrate::Hydration;
use crate::subscriber::{Subscriber, SubscriberId};

/// Shared state behind every clone of a [`GraphStore`] and its handles.
pub(crate) struct StoreInner {
    pub(crate) scheduler: Mutex<Scheduler>,
    subscribers: Mutex<HashMap<usize, Vec<Arc<Subscriber>>>>,
    idle: Notify,
}

impl StoreInner {
    pub(crate) fn subscribe(&self, node: usize, subscriber: Subscriber) -> SubscriberId {
        let id = subscriber.id();
        self.subscribers
            .lock()
            .entry(node)
            .or_default()
            .push(Arc::new(subscriber));
        id
    }

    pub(crate) fn unsubscribe(&self, node: usize, id: SubscriberId) {
        let mut subscribers = self.subscribers.lock();
        if let Some(list) = subscribers.get_mut(&node) {
            list.retain(|s| s.id() != id);
            if list.is_empty() {
                subscribers.remove(&node);
            }
        }
    }
}

/// The dependency graph of one wizard instance.
///
/// Cloning is cheap; clones share the same graph.
///
/// # Example
///
/// ```rust
/// use hydragraph_core::{GraphStore, NodeDef};
/// use serde_json::json;
///
/// let store = GraphStore::register([
///     NodeDef::new("input"),
///     NodeDef::new("output")
///         .depends_on(["input"])
///         .hydrate(|deps| Ok(json!(deps[0]["name"].as_str().unwrap_or("").to_uppercase()))),
/// ])
/// .unwrap();
///
/// store.get("input").unwrap().assign(json!({ "name": "abc" }));
/// assert_eq!(store.get("output").unwrap().display_value(), Some(json!("ABC")));
/// ```
#[derive(Clone)]
pub struct GraphStore {
    pub(crate) inner: Arc<StoreInner>,
}

impl GraphStore {
    /// Builds a graph with the default configuration and runs the initial
    /// resolution pass.
    pub fn register<I>(defs: I) -> GraphResult<Self>
    where
        I: IntoIterator<Item = NodeDef>,
    {
        Self::with_config(GraphConfig::default(), defs)
    }

    /// Builds a graph with an explicit configuration and runs the initial
    /// resolution pass.
    ///
    /// Async hydrators reached by the initial pass need a tokio runtime.
    pub fn with_config<I>(config: GraphConfig, defs: I) -> GraphResult<Self>
    where
        I: IntoIterator<Item = NodeDef>,
    {
        let graph = Graph::build(defs.into_iter().collect(), config.default_cache)?;
        let store = Self {
            inner: Arc::new(StoreInner {
                scheduler: Mutex::new(Scheduler::new(graph, &config)),
                subscribers: Mutex::new(HashMap::new()),
                idle: Notify::new(),
            }),
        };
        store.drain();
        Ok(store)
    }

    /// Returns the handle for a node.
    pub fn get(&self, name: &str) -> GraphResult<NodeHandle> {
        let node = self
            .inner
            .scheduler
            .lock()
            .graph()
            .index_of(name)
            .ok_or_else(|| GraphError::unknown_node(name))?;
        Ok(NodeHandle::new(self.clone(), node, name))
    }

    /// Node names in declaration order.
    pub fn names(&self) -> Vec<String> {
        self.inner
            .scheduler
            .lock()
            .graph()
            .names()
            .map(str::to_string)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.scheduler.lock().graph().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn label(&self) -> String {
        self.inner.scheduler.lock().label().to_string()
    }

    /// Number of hydrations skipped because a snapshot was unchanged.
    pub fn cache_hits(&self) -> u64 {
        self.inner.scheduler.lock().cache_hits()
    }

    /// Resolves once no pass is running, nothing is queued and no hydration
    /// task is outstanding, stale ones included.
    pub async fn settled(&self) {
        loop {
            let mut notified = pin!(self.inner.idle.notified());
            notified.as_mut().enable();
            if self.inner.scheduler.lock().is_idle() {
                return;
            }
            notified.await;
        }
    }

    /// Resolves once `check` holds after a pass.
    pub(crate) async fn wait_until<F>(&self, mut check: F)
    where
        F: FnMut(&Scheduler) -> bool,
    {
        loop {
            let mut notified = pin!(self.inner.idle.notified());
            notified.as_mut().enable();
            if check(&*self.inner.scheduler.lock()) {
                return;
            }
            notified.await;
        }
    }

    /// Queues an event and drains unless a drain is already running.
    pub(crate) fn push(&self, event: Event) {
        self.inner.scheduler.lock().push(event);
        self.drain();
    }

    fn drain(&self) {
        if !self.inner.scheduler.lock().begin_drain() {
            return;
        }

        loop {
            let mut changed = Vec::new();
            let step = self.inner.scheduler.lock().next_step(&mut changed);
            self.notify(changed);
            match step {
                Step::Invoke(invocation) => self.invoke(invocation),
                Step::Applied => {}
                Step::Idle => break,
            }
        }

        self.inner.idle.notify_waiters();
    }

    fn invoke(&self, invocation: Invocation) {
        let Invocation {
            node,
            name,
            version,
            hydrator,
            args,
        } = invocation;

        let hydration = panic::catch_unwind(AssertUnwindSafe(|| hydrator.call(&args)))
            .unwrap_or_else(|payload| Hydration::Ready(Err(HydrationError::from_panic(payload))));

        let mut changed = Vec::new();
        match hydration {
            Hydration::Ready(result) => {
                self.inner
                    .scheduler
                    .lock()
                    .commit(node, version, result, &mut changed);
            }
            Hydration::Pending(future) => match tokio::runtime::Handle::try_current() {
                Ok(runtime) => {
                    self.inner
                        .scheduler
                        .lock()
                        .begin_loading(node, version, &mut changed);

                    let store = Arc::downgrade(&self.inner);
                    runtime.spawn(async move {
                        let result = AssertUnwindSafe(future)
                            .catch_unwind()
                            .await
                            .unwrap_or_else(|payload| Err(HydrationError::from_panic(payload)));

                        match store.upgrade() {
                            Some(inner) => GraphStore { inner }.push(Event::Settled {
                                node,
                                version,
                                result,
                            }),
                            None => trace!(node = %name, version, "store dropped, discarding result"),
                        }
                    });
                }
                Err(_) => {
                    let mut scheduler = self.inner.scheduler.lock();
                    warn!(graph = %scheduler.label(), node = %name, "no async runtime for pending hydration");
                    scheduler.commit(
                        node,
                        version,
                        Err(HydrationError::new("no async runtime available to drive hydration")),
                        &mut changed,
                    );
                }
            },
        }
        self.notify(changed);
    }

    /// Calls subscribers of every changed node, outside all locks. A panicking
    /// subscriber is logged and skipped; the pass carries on.
    fn notify(&self, mut changed: Vec<usize>) {
        if changed.is_empty() {
            return;
        }
        changed.sort_unstable();
        changed.dedup();

        for node in changed {
            let subscribers = match self.inner.subscribers.lock().get(&node) {
                Some(list) => list.clone(),
                None => continue,
            };
            let view = self.inner.scheduler.lock().view(node);
            for subscriber in subscribers {
                if let Err(payload) =
                    panic::catch_unwind(AssertUnwindSafe(|| subscriber.notify(&view)))
                {
                    warn!(
                        node = %view.name,
                        subscriber = ?subscriber.id(),
                        panic = %panic_message(&*payload),
                        "subscriber panicked"
                    );
                }
            }
        }
    }
}

impl std::fmt::Debug for GraphStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let scheduler = self.inner.scheduler.lock();
        f.debug_struct("GraphStore")
            .field("label", &scheduler.label())
            .field("nodes", &scheduler.graph().len())
            .field("idle", &scheduler.is_idle())
            .finish()
    }
}
