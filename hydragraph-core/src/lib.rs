//! Hydragraph Core
//!
//! A dependency graph engine for wizard-style forms. Each wizard declares a
//! set of named data nodes; derived nodes compute their value from other
//! nodes through a possibly asynchronous hydrator. The engine keeps the graph
//! consistent as the user edits:
//!
//! - Hydrators run in dependency order, once per change
//! - Unchanged dependency snapshots skip the hydrator
//! - Results that arrive after a newer attempt started are discarded
//! - A failure is recorded on the node and inherited by everything
//!   downstream, whose hydrators are not invoked until it clears
//!
//! # Architecture
//!
//! - `graph`: definitions, validation and topological order
//! - `hydrate`: hydrators, snapshot cache and the scheduler
//! - `store`: the per-wizard [`GraphStore`]
//! - `handle`: [`NodeHandle`], the read/write surface for wizard steps
//! - `path`: path-addressed partial updates
//! - `subscriber`: change notifications for the UI layer
//!
//! # Example
//!
//! ```rust
//! use hydragraph_core::{GraphStore, NodeDef};
//! use serde_json::json;
//!
//! let store = GraphStore::register([
//!     NodeDef::new("input"),
//!     NodeDef::new("output")
//!         .depends_on(["input"])
//!         .hydrate(|deps| {
//!             let name = deps[0]["name"].as_str().ok_or("missing name")?;
//!             Ok(json!(name.to_uppercase()))
//!         }),
//! ])?;
//!
//! let input = store.get("input")?;
//! let output = store.get("output")?;
//!
//! input.assign(json!({ "name": "abc" }));
//! assert_eq!(output.display_value(), Some(json!("ABC")));
//! assert!(!output.is_loading());
//! # Ok::<(), hydragraph_core::GraphError>(())
//! ```

pub mod config;
pub mod graph;
pub mod handle;
pub mod hydrate;
pub mod path;
pub mod store;
pub mod subscriber;

pub use config::GraphConfig;
pub use graph::{GraphError, GraphResult, HydrationError, NodeDef, NodeError};
pub use handle::{NodeHandle, NodeStatus, NodeView};
pub use hydrate::{Hydration, HydrationResult, Hydrator};
pub use store::GraphStore;
pub use subscriber::{SubscriberId, Subscription};
