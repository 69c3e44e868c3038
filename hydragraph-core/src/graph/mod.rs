//! Dependency Graph
//!
//! This module holds the static structure of a wizard's data: node
//! definitions, the validated node table, and the error taxonomy.
//!
//! # Overview
//!
//! The graph is a directed acyclic graph where:
//!
//! - Nodes are named pieces of wizard data, either leaves (assigned directly)
//!   or derived (computed by a hydrator)
//! - Edges are dependencies: if B lists A in its deps, there is an edge A -> B
//!
//! Validation happens once, at registration. Duplicate names, unknown
//! dependencies and cycles are all rejected before any hydrator runs.
//!
//! # Design Decisions
//!
//! 1. Nodes live in an insertion-ordered map and are addressed by index, so
//!    lookups by name and traversals by edge are both cheap.
//!
//! 2. Both forward (deps) and reverse (dependents) edges are stored so
//!    invalidation can walk downstream without searching.

mod error;
mod node;
mod topology;

pub use error::{GraphError, GraphResult, HydrationError, NodeError};
pub use node::{DirtyState, NodeDef};
pub(crate) use error::panic_message;
pub(crate) use node::NodeSlot;
pub(crate) use topology::Graph;
