//! Domain dependency graph.
//!
//! A [`Graph`] is an immutable-once-produced snapshot of the targets (nodes) and
//! dependencies (links) extracted from a build description. Node names are
//! unique within a snapshot; every link endpoint names an existing node.
//!
//! Filters never mutate a graph in place. They derive new snapshots through
//! [`Graph::retain_nodes`] and [`Graph::retain_links`], which preserve both
//! invariants by construction.

pub mod producer;

pub use producer::{GraphProducer, JsonGraphSource, SnapshotSource, SourceError};

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

/// Violations of the graph model invariants.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Duplicate node name '{0}'")]
    DuplicateNode(String),

    #[error("Link {source_name} -> {target} references unknown node '{missing}'")]
    UnknownNode {
        source_name: String,
        target: String,
        missing: String,
    },

    #[error("Start node '{0}' is not part of the graph")]
    UnknownStart(String),
}

/// Location of a node's definition in the build description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
}

/// Role flags carried by a node. Several may be set at once; [`NodeFlags::role`]
/// resolves them by precedence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeFlags {
    #[serde(default)]
    pub start: bool,
    #[serde(default)]
    pub main: bool,
    #[serde(default)]
    pub missing: bool,
}

impl NodeFlags {
    pub const PLAIN: NodeFlags = NodeFlags {
        start: false,
        main: false,
        missing: false,
    };

    /// Resolve the display role: start > main > missing > plain.
    pub fn role(self) -> NodeRole {
        if self.start {
            NodeRole::Start
        } else if self.main {
            NodeRole::Main
        } else if self.missing {
            NodeRole::Missing
        } else {
            NodeRole::Plain
        }
    }
}

/// Resolved role of a node, used for attribution and styling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeRole {
    Start,
    Main,
    Missing,
    Plain,
}

impl NodeRole {
    pub fn all() -> &'static [NodeRole] {
        &[
            NodeRole::Start,
            NodeRole::Main,
            NodeRole::Missing,
            NodeRole::Plain,
        ]
    }

    pub fn display_name(self) -> &'static str {
        match self {
            NodeRole::Start => "start",
            NodeRole::Main => "main",
            NodeRole::Missing => "missing",
            NodeRole::Plain => "plain",
        }
    }
}

/// A target in the build description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    #[serde(default)]
    pub flags: NodeFlags,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            flags: NodeFlags::PLAIN,
            description: None,
            location: None,
        }
    }

    pub fn with_flags(mut self, flags: NodeFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn main(mut self) -> Self {
        self.flags.main = true;
        self
    }

    pub fn missing(mut self) -> Self {
        self.flags.missing = true;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_location(mut self, file: impl Into<String>, line: u32) -> Self {
        self.location = Some(SourceLocation {
            file: file.into(),
            line,
        });
        self
    }

    pub fn role(&self) -> NodeRole {
        self.flags.role()
    }
}

/// What a link means. Closed set: attribution and rendering match on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LinkKind {
    /// Ordinary dependency.
    Plain,
    /// Optional/ordering-only dependency.
    Weak,
    /// Dependency introduced by a task invocation with parameters.
    Task {
        kind: String,
        #[serde(default)]
        params: BTreeMap<String, String>,
    },
    /// Dependency fanned out over nested directories.
    Bundle {
        #[serde(default)]
        directories: Vec<String>,
    },
}

impl LinkKind {
    pub fn is_weak(&self) -> bool {
        matches!(self, LinkKind::Weak)
    }
}

/// A dependency from `source` onto `target`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub source: String,
    pub target: String,
    #[serde(default = "default_link_kind")]
    pub kind: LinkKind,
}

fn default_link_kind() -> LinkKind {
    LinkKind::Plain
}

impl Link {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            kind: LinkKind::Plain,
        }
    }

    pub fn with_kind(mut self, kind: LinkKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn weak(self) -> Self {
        self.with_kind(LinkKind::Weak)
    }
}

/// Serialized form of a graph, validated on the way in.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct GraphData {
    name: String,
    #[serde(default)]
    nodes: Vec<Node>,
    #[serde(default)]
    links: Vec<Link>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    start: Option<String>,
}

/// Dependency graph snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "GraphData", into = "GraphData")]
pub struct Graph {
    name: String,
    nodes: Vec<Node>,
    /// Name → index into `nodes`.
    index: HashMap<String, usize>,
    links: Vec<Link>,
    start: Option<String>,
}

impl Graph {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: Vec::new(),
            index: HashMap::new(),
            links: Vec::new(),
            start: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a node. Node names must be unique within the graph.
    pub fn add_node(&mut self, node: Node) -> Result<(), GraphError> {
        if self.index.contains_key(&node.name) {
            return Err(GraphError::DuplicateNode(node.name));
        }
        self.index.insert(node.name.clone(), self.nodes.len());
        self.nodes.push(node);
        Ok(())
    }

    /// Add a link between two existing nodes.
    pub fn add_link(&mut self, link: Link) -> Result<(), GraphError> {
        for endpoint in [&link.source, &link.target] {
            if !self.index.contains_key(endpoint) {
                return Err(GraphError::UnknownNode {
                    source_name: link.source.clone(),
                    target: link.target.clone(),
                    missing: endpoint.clone(),
                });
            }
        }
        self.links.push(link);
        Ok(())
    }

    /// Mark an existing node as the start node. Also sets its start flag.
    pub fn set_start(&mut self, name: &str) -> Result<(), GraphError> {
        let idx = *self
            .index
            .get(name)
            .ok_or_else(|| GraphError::UnknownStart(name.to_string()))?;
        self.nodes[idx].flags.start = true;
        self.start = Some(name.to_string());
        Ok(())
    }

    pub fn start(&self) -> Option<&Node> {
        self.start.as_deref().and_then(|name| self.node(name))
    }

    pub fn node(&self, name: &str) -> Option<&Node> {
        self.index.get(name).map(|&idx| &self.nodes[idx])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn outgoing<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Link> + 'a {
        self.links.iter().filter(move |l| l.source == name)
    }

    pub fn incoming<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Link> + 'a {
        self.links.iter().filter(move |l| l.target == name)
    }

    pub fn out_degree(&self, name: &str) -> usize {
        self.outgoing(name).count()
    }

    pub fn in_degree(&self, name: &str) -> usize {
        self.incoming(name).count()
    }

    /// Derive a graph keeping only nodes matching `keep`.
    ///
    /// Links touching a removed node are dropped, and the start node is cleared
    /// if it was removed.
    pub fn retain_nodes(&self, mut keep: impl FnMut(&Node) -> bool) -> Graph {
        let mut out = Graph::new(self.name.clone());
        for node in &self.nodes {
            if keep(node) {
                out.index.insert(node.name.clone(), out.nodes.len());
                out.nodes.push(node.clone());
            }
        }
        out.links = self
            .links
            .iter()
            .filter(|l| out.index.contains_key(&l.source) && out.index.contains_key(&l.target))
            .cloned()
            .collect();
        out.start = self.start.clone().filter(|s| out.index.contains_key(s));
        out
    }

    /// Derive a graph keeping every node but only links matching `keep`.
    pub fn retain_links(&self, mut keep: impl FnMut(&Link) -> bool) -> Graph {
        let mut out = self.clone();
        out.links.retain(|l| keep(l));
        out
    }
}

impl TryFrom<GraphData> for Graph {
    type Error = GraphError;

    fn try_from(data: GraphData) -> Result<Self, Self::Error> {
        let mut graph = Graph::new(data.name);
        for node in data.nodes {
            graph.add_node(node)?;
        }
        for link in data.links {
            graph.add_link(link)?;
        }
        if let Some(start) = data.start {
            graph.set_start(&start)?;
        }
        Ok(graph)
    }
}

impl From<Graph> for GraphData {
    fn from(graph: Graph) -> Self {
        GraphData {
            name: graph.name,
            nodes: graph.nodes,
            links: graph.links,
            start: graph.start,
        }
    }
}
