//! Snapshot cache.
//!
//! For every cache-enabled node we remember the dependency values that
//! produced its current outcome. A new pass whose snapshot compares equal
//! (structurally, via `Value`'s `PartialEq`) skips the hydrator.

use std::collections::HashMap;

use serde_json::Value;
use smallvec::SmallVec;

/// Resolved dependency values in declaration order.
pub type Snapshot = SmallVec<[Value; 4]>;

/// Per-node memo of "last snapshot that produced the current outcome".
#[derive(Debug, Default)]
pub struct CacheController {
    snapshots: HashMap<usize, Snapshot>,
    hits: u64,
}

impl CacheController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when the hydrator can be skipped for `snapshot`.
    ///
    /// Nodes with caching disabled are never fresh.
    pub fn is_fresh(&mut self, node: usize, cache_enabled: bool, snapshot: &Snapshot) -> bool {
        if !cache_enabled {
            return false;
        }
        let fresh = self.snapshots.get(&node) == Some(snapshot);
        if fresh {
            self.hits += 1;
        }
        fresh
    }

    /// Records the snapshot behind a committed outcome.
    pub fn record(&mut self, node: usize, cache_enabled: bool, snapshot: Snapshot) {
        if cache_enabled {
            self.snapshots.insert(node, snapshot);
        }
    }

    /// Forgets the snapshot so the next pass always hydrates.
    pub fn invalidate(&mut self, node: usize) {
        self.snapshots.remove(&node);
    }

    /// Number of hydrations skipped so far.
    pub fn hits(&self) -> u64 {
        self.hits
    }
}
