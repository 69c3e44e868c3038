//! Hydration
//!
//! Everything that decides when and how a derived node recomputes:
//!
//! - `hydrator`: the function type a node declares
//! - `cache`: snapshot memoization that skips redundant calls
//! - `scheduler`: ordering, staleness arbitration and error propagation

pub(crate) mod cache;
mod hydrator;
pub(crate) mod scheduler;

pub use cache::Snapshot;
pub use hydrator::{Hydration, HydrationResult, Hydrator};
