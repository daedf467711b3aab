//! Built-in filters.
//!
//! All of these are pure. The removal filters are monotonic: applying one to
//! its own output changes nothing.

use super::{FilterError, GraphFilter};
use crate::graph::{Graph, LinkKind};
use std::collections::{HashSet, VecDeque};

/// Remove the named nodes (and their links).
#[derive(Debug, Clone)]
pub struct RemoveNodes {
    names: HashSet<String>,
}

impl RemoveNodes {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }
}

impl GraphFilter for RemoveNodes {
    fn name(&self) -> &str {
        "remove-nodes"
    }

    fn apply(&self, graph: &Graph) -> Result<Graph, FilterError> {
        Ok(graph.retain_nodes(|n| !self.names.contains(&n.name)))
    }
}

/// Remove nodes flagged as missing (referenced but never defined).
#[derive(Debug, Clone, Copy, Default)]
pub struct HideMissing;

impl GraphFilter for HideMissing {
    fn name(&self) -> &str {
        "hide-missing"
    }

    fn apply(&self, graph: &Graph) -> Result<Graph, FilterError> {
        Ok(graph.retain_nodes(|n| !n.flags.missing))
    }
}

/// Drop weak links, keeping all nodes.
#[derive(Debug, Clone, Copy, Default)]
pub struct DropWeakLinks;

impl GraphFilter for DropWeakLinks {
    fn name(&self) -> &str {
        "drop-weak-links"
    }

    fn apply(&self, graph: &Graph) -> Result<Graph, FilterError> {
        Ok(graph.retain_links(|l| !matches!(l.kind, LinkKind::Weak)))
    }
}

/// Remove nodes with no links at all. The start node is always kept.
#[derive(Debug, Clone, Copy, Default)]
pub struct RemoveIsolated;

impl GraphFilter for RemoveIsolated {
    fn name(&self) -> &str {
        "remove-isolated"
    }

    fn apply(&self, graph: &Graph) -> Result<Graph, FilterError> {
        let connected: HashSet<&str> = graph
            .links()
            .iter()
            .flat_map(|l| [l.source.as_str(), l.target.as_str()])
            .collect();
        Ok(graph.retain_nodes(|n| n.flags.start || connected.contains(n.name.as_str())))
    }
}

/// Keep only the forward closure of the start node.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReachableFromStart;

impl GraphFilter for ReachableFromStart {
    fn name(&self) -> &str {
        "reachable-from-start"
    }

    fn apply(&self, graph: &Graph) -> Result<Graph, FilterError> {
        let start = graph
            .start()
            .ok_or_else(|| FilterError::new(self.name(), "graph has no start node"))?;

        let mut reached: HashSet<&str> = HashSet::new();
        let mut queue = VecDeque::from([start.name.as_str()]);
        while let Some(name) = queue.pop_front() {
            if !reached.insert(name) {
                continue;
            }
            for link in graph.outgoing(name) {
                queue.push_back(link.target.as_str());
            }
        }
        Ok(graph.retain_nodes(|n| reached.contains(n.name.as_str())))
    }
}

type FilterFn = dyn Fn(&Graph) -> Result<Graph, String> + Send + Sync;

/// A named closure used as a filter.
pub struct FnFilter {
    name: String,
    func: Box<FilterFn>,
}

impl FnFilter {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Graph) -> Result<Graph, String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Box::new(func),
        }
    }
}

impl GraphFilter for FnFilter {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, graph: &Graph) -> Result<Graph, FilterError> {
        (self.func)(graph).map_err(|message| FilterError::new(self.name.clone(), message))
    }
}
