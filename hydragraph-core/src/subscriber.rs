//! Change subscriptions.
//!
//! A UI layer subscribes per node and re-renders when notified. Callbacks run
//! after the change has been committed and outside every internal lock, so
//! they may read any node or queue further mutations.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Weak;

use crate::handle::NodeView;
use crate::store::StoreInner;

/// Unique identifier for a subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// A registered change callback.
pub(crate) struct Subscriber {
    id: SubscriberId,
    notify: Box<dyn Fn(&NodeView) + Send + Sync>,
}

impl Subscriber {
    pub fn new<F>(notify: F) -> Self
    where
        F: Fn(&NodeView) + Send + Sync + 'static,
    {
        Self {
            id: SubscriberId::new(),
            notify: Box::new(notify),
        }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn notify(&self, view: &NodeView) {
        (self.notify)(view);
    }
}

/// Keeps a subscription alive.
///
/// Dropping this guard unsubscribes the callback.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: SubscriberId,
    node: usize,
    store: Weak<StoreInner>,
}

impl Subscription {
    pub(crate) fn new(id: SubscriberId, node: usize, store: Weak<StoreInner>) -> Self {
        Self { id, node, store }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(store) = self.store.upgrade() {
            store.unsubscribe(self.node, self.id);
        }
    }
}
