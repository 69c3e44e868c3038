//! Error types for graph operations
//!
//! Registration and lookup failures are returned as [`GraphError`] and abort
//! wizard setup. Hydration failures never escape the graph: they are recorded
//! on the failing node as a [`NodeError`] and inherited by its dependents.

use serde_json::Value;
use thiserror::Error;

/// Result type for graph operations
pub type GraphResult<T> = Result<T, GraphError>;

/// Errors returned synchronously by the graph.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum GraphError {
    /// The dependency relation contains a cycle.
    #[error("dependency cycle detected: {}", .cycle.join(" -> "))]
    Cycle {
        /// Node names along the cycle, first name repeated at the end.
        cycle: Vec<String>,
    },

    /// A node declares a dependency that is not part of the definitions.
    #[error("node '{node}' depends on unknown node '{dependency}'")]
    UnknownDependency {
        /// The node that declared the dependency
        node: String,
        /// The missing dependency
        dependency: String,
    },

    /// Lookup of a node that does not exist.
    #[error("unknown node '{name}'")]
    UnknownNode {
        /// The requested name
        name: String,
    },

    /// Two definitions share the same name.
    #[error("duplicate node '{name}'")]
    DuplicateNode {
        /// The duplicated name
        name: String,
    },

    /// `update_data` addressed a path that does not exist in the node's value.
    #[error("path '{path}' not found in value of node '{node}'")]
    PathNotFound {
        /// The node being updated
        node: String,
        /// The path as given by the caller
        path: String,
    },
}

impl GraphError {
    /// Creates a cycle error from the names along the cycle.
    pub fn cycle(cycle: Vec<String>) -> Self {
        Self::Cycle { cycle }
    }

    /// Creates an unknown dependency error.
    pub fn unknown_dependency(node: impl Into<String>, dependency: impl Into<String>) -> Self {
        Self::UnknownDependency {
            node: node.into(),
            dependency: dependency.into(),
        }
    }

    /// Creates an unknown node error.
    pub fn unknown_node(name: impl Into<String>) -> Self {
        Self::UnknownNode { name: name.into() }
    }

    /// Creates a duplicate node error.
    pub fn duplicate_node(name: impl Into<String>) -> Self {
        Self::DuplicateNode { name: name.into() }
    }

    /// Creates a path not found error.
    pub fn path_not_found(node: impl Into<String>, path: impl Into<String>) -> Self {
        Self::PathNotFound {
            node: node.into(),
            path: path.into(),
        }
    }
}

/// Failure reported by a hydrator.
///
/// The message is what gets rendered; `detail` carries whatever structured
/// payload the hydrator attached (for example a remote API error body).
#[derive(Debug, Error, Clone, PartialEq)]
#[error("{message}")]
pub struct HydrationError {
    message: String,
    detail: Option<Value>,
}

impl HydrationError {
    /// Creates an error with a message and no payload.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            detail: None,
        }
    }

    /// Attaches a structured payload.
    pub fn with_detail(mut self, detail: impl Into<Value>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Builds an error from a caught panic payload.
    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        Self::new(format!("hydrator panicked: {}", panic_message(&*payload)))
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn detail(&self) -> Option<&Value> {
        self.detail.as_ref()
    }
}

impl From<String> for HydrationError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for HydrationError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<serde_json::Error> for HydrationError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(err.to_string())
    }
}

/// The error currently recorded on a node.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum NodeError {
    /// The node's own hydrator failed.
    #[error("hydration failed: {0}")]
    Hydration(HydrationError),

    /// An ancestor failed; this node's hydrator was not invoked.
    #[error("dependency '{origin}' failed: {source}")]
    Inherited {
        /// Name of the node whose hydrator failed
        origin: String,
        /// The ancestor's failure
        source: HydrationError,
    },
}

impl NodeError {
    /// The underlying hydrator failure, own or inherited.
    pub fn hydration_error(&self) -> &HydrationError {
        match self {
            Self::Hydration(err) => err,
            Self::Inherited { source, .. } => source,
        }
    }

    /// Name of the node that originally failed, if this error was inherited.
    pub fn origin(&self) -> Option<&str> {
        match self {
            Self::Hydration(_) => None,
            Self::Inherited { origin, .. } => Some(origin),
        }
    }

    pub fn is_inherited(&self) -> bool {
        matches!(self, Self::Inherited { .. })
    }
}

/// Extracts the message of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
