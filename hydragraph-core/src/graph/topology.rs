//! Graph topology.
//!
//! Builds the node table from definitions, validates it, and answers the
//! ordering questions the scheduler asks.
//!
//! # Algorithm
//!
//! Validation runs in three steps:
//!
//! 1. Index every definition by name, rejecting duplicates
//! 2. Resolve every declared dependency to an index, rejecting unknown names
//! 3. Walk the graph depth-first with three-color marking to find cycles
//!
//! The evaluation order is then produced with Kahn's algorithm, using
//! declaration order to break ties so the order is deterministic.

use std::collections::{HashSet, VecDeque};

use indexmap::{IndexMap, IndexSet};

use super::error::{GraphError, GraphResult};
use super::node::{EdgeList, NodeDef, NodeSlot};

/// DFS color for cycle detection.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// The validated node table with its evaluation order.
#[derive(Debug)]
pub(crate) struct Graph {
    nodes: IndexMap<String, NodeSlot>,
    /// Node indices, dependencies before dependents.
    order: Vec<usize>,
}

impl Graph {
    /// Builds and validates the graph. `default_cache` applies to definitions
    /// that leave caching unset.
    pub fn build(defs: Vec<NodeDef>, default_cache: bool) -> GraphResult<Self> {
        let mut names: IndexSet<String> = IndexSet::with_capacity(defs.len());
        for def in &defs {
            if !names.insert(def.name.clone()) {
                return Err(GraphError::duplicate_node(&def.name));
            }
        }

        let mut nodes: IndexMap<String, NodeSlot> = IndexMap::with_capacity(defs.len());
        for def in defs {
            let mut deps = EdgeList::new();
            for dep in &def.deps {
                let idx = names
                    .get_index_of(dep)
                    .ok_or_else(|| GraphError::unknown_dependency(&def.name, dep))?;
                deps.push(idx);
            }
            let cache = def.cache.unwrap_or(default_cache);
            nodes.insert(def.name.clone(), NodeSlot::new(def, deps, cache));
        }

        // Reverse edges. A dependency listed twice still yields one edge.
        for idx in 0..nodes.len() {
            let deps: HashSet<usize> = nodes[idx].deps.iter().copied().collect();
            for dep in deps {
                nodes[dep].dependents.push(idx);
            }
        }
        for slot in nodes.values_mut() {
            slot.dependents.sort_unstable();
        }

        let mut graph = Self {
            nodes,
            order: Vec::new(),
        };
        graph.check_acyclic()?;
        graph.order = graph.topological_order();
        Ok(graph)
    }

    fn check_acyclic(&self) -> GraphResult<()> {
        let mut colors = vec![Color::White; self.nodes.len()];

        for idx in 0..self.nodes.len() {
            if colors[idx] == Color::White {
                if let Some(cycle) = self.dfs_find_cycle(idx, &mut colors) {
                    return Err(GraphError::cycle(cycle));
                }
            }
        }
        Ok(())
    }

    /// Depth-first walk from `root` along dependent edges. Uses an explicit
    /// stack of `(node, next dependent position)` frames, so long chains
    /// cannot overflow the call stack.
    fn dfs_find_cycle(&self, root: usize, colors: &mut [Color]) -> Option<Vec<String>> {
        let mut stack: Vec<(usize, usize)> = vec![(root, 0)];
        colors[root] = Color::Gray;

        while let Some(frame) = stack.last_mut() {
            let (idx, pos) = *frame;
            let Some(&next) = self.nodes[idx].dependents.get(pos) else {
                colors[idx] = Color::Black;
                stack.pop();
                continue;
            };
            frame.1 += 1;

            match colors[next] {
                Color::White => {
                    colors[next] = Color::Gray;
                    stack.push((next, 0));
                }
                Color::Gray => {
                    // Back edge: the cycle is the stack suffix starting at `next`.
                    let start = stack.iter().position(|&(i, _)| i == next).unwrap_or(0);
                    let mut cycle: Vec<String> = stack[start..]
                        .iter()
                        .map(|&(i, _)| self.nodes[i].name.clone())
                        .collect();
                    cycle.push(self.nodes[next].name.clone());
                    return Some(cycle);
                }
                Color::Black => {}
            }
        }
        None
    }

    /// Kahn's algorithm over the whole graph. Only called on acyclic graphs.
    fn topological_order(&self) -> Vec<usize> {
        let mut in_degree: Vec<usize> = self
            .nodes
            .values()
            .map(|slot| slot.deps.iter().collect::<HashSet<_>>().len())
            .collect();
        let mut queue: VecDeque<usize> = (0..self.nodes.len())
            .filter(|&idx| in_degree[idx] == 0)
            .collect();
        let mut result = Vec::with_capacity(self.nodes.len());

        while let Some(idx) = queue.pop_front() {
            result.push(idx);
            for &dependent in &self.nodes[idx].dependents {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    queue.push_back(dependent);
                }
            }
        }

        result
    }

    /// Marks a node's outcome as changed: direct dependents become dirty and
    /// everything further downstream becomes maybe-dirty.
    pub fn mark_changed(&mut self, idx: usize) {
        let mut visited = HashSet::new();
        let mut queue: VecDeque<usize> = VecDeque::new();

        for dependent in self.nodes[idx].dependents.clone() {
            self.nodes[dependent].mark_dirty();
            queue.push_back(dependent);
        }

        while let Some(next) = queue.pop_front() {
            if !visited.insert(next) {
                continue;
            }
            for dependent in self.nodes[next].dependents.clone() {
                self.nodes[dependent].mark_maybe_dirty();
                queue.push_back(dependent);
            }
        }
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.nodes.get_index_of(name)
    }

    pub fn order(&self) -> &[usize] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    pub fn slot(&self, idx: usize) -> &NodeSlot {
        &self.nodes[idx]
    }

    pub fn slot_mut(&mut self, idx: usize) -> &mut NodeSlot {
        &mut self.nodes[idx]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::DirtyState;
    use serde_json::json;

    fn derived(name: &str, deps: &[&str]) -> NodeDef {
        NodeDef::new(name)
            .depends_on(deps.iter().copied())
            .hydrate(|_| Ok(json!(null)))
    }

    fn position(graph: &Graph, name: &str) -> usize {
        let idx = graph.index_of(name).unwrap();
        graph.order().iter().position(|&i| i == idx).unwrap()
    }

    #[test]
    fn order_puts_dependencies_first() {
        // Declared out of order on purpose.
        let graph = Graph::build(
            vec![
                derived("summary", &["pods", "node"]),
                derived("pods", &["node"]),
                NodeDef::new("node"),
            ],
            true,
        )
        .unwrap();

        assert_eq!(graph.order().len(), 3);
        assert!(position(&graph, "node") < position(&graph, "pods"));
        assert!(position(&graph, "pods") < position(&graph, "summary"));
    }

    #[test]
    fn unknown_dependency_is_rejected() {
        let err = Graph::build(vec![derived("pods", &["node"])], true).unwrap_err();
        assert_eq!(err, GraphError::unknown_dependency("pods", "node"));
    }

    #[test]
    fn duplicate_name_is_rejected() {
        let err = Graph::build(vec![NodeDef::new("a"), NodeDef::new("a")], true).unwrap_err();
        assert_eq!(err, GraphError::duplicate_node("a"));
    }

    #[test]
    fn cycle_is_reported_with_path() {
        let err = Graph::build(
            vec![derived("a", &["c"]), derived("b", &["a"]), derived("c", &["b"])],
            true,
        )
        .unwrap_err();

        match err {
            GraphError::Cycle { cycle } => {
                assert_eq!(cycle.len(), 4);
                assert_eq!(cycle.first(), cycle.last());
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let err = Graph::build(vec![derived("a", &["a"])], true).unwrap_err();
        assert_eq!(err, GraphError::cycle(vec!["a".into(), "a".into()]));
    }

    #[test]
    fn long_chain_validates_without_deep_recursion() {
        let mut defs = vec![NodeDef::new("n0")];
        for i in 1..200_000 {
            let prev = format!("n{}", i - 1);
            defs.push(derived(&format!("n{i}"), &[prev.as_str()]));
        }

        let graph = Graph::build(defs, true).unwrap();
        assert_eq!(graph.order().len(), 200_000);
        assert_eq!(position(&graph, "n0"), 0);
    }

    #[test]
    fn cycle_at_end_of_long_chain_is_found() {
        let mut defs = vec![derived("n0", &["n4999"])];
        for i in 1..5_000 {
            let prev = format!("n{}", i - 1);
            defs.push(derived(&format!("n{i}"), &[prev.as_str()]));
        }

        match Graph::build(defs, true).unwrap_err() {
            GraphError::Cycle { cycle } => {
                assert_eq!(cycle.len(), 5_001);
                assert_eq!(cycle.first(), cycle.last());
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn repeated_dependency_is_one_edge() {
        let graph = Graph::build(vec![NodeDef::new("a"), derived("b", &["a", "a"])], true).unwrap();
        let a = graph.index_of("a").unwrap();
        assert_eq!(graph.slot(a).dependents.len(), 1);
        assert_eq!(graph.order().len(), 2);
    }

    #[test]
    fn cache_default_applies_when_unset() {
        let graph = Graph::build(
            vec![
                NodeDef::new("a"),
                derived("b", &["a"]),
                derived("c", &["a"]).cache(true),
            ],
            false,
        )
        .unwrap();
        assert!(!graph.slot(graph.index_of("b").unwrap()).cache);
        assert!(graph.slot(graph.index_of("c").unwrap()).cache);
    }

    #[test]
    fn mark_changed_propagates() {
        let mut graph = Graph::build(
            vec![NodeDef::new("a"), derived("b", &["a"]), derived("c", &["b"])],
            true,
        )
        .unwrap();
        for idx in 0..graph.len() {
            graph.slot_mut(idx).mark_clean();
        }

        graph.mark_changed(graph.index_of("a").unwrap());

        let b = graph.index_of("b").unwrap();
        let c = graph.index_of("c").unwrap();
        assert_eq!(graph.slot(b).dirty, DirtyState::Dirty);
        assert_eq!(graph.slot(c).dirty, DirtyState::MaybeDirty);
        assert_eq!(graph.slot(graph.index_of("a").unwrap()).dirty, DirtyState::Clean);
    }
}
