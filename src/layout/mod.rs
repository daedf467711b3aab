//! Layout engine contract.
//!
//! A [`LayoutEngine`] takes an [`AttributedGraph`] and returns, per vertex, a
//! bounding rectangle and an outline curve, and per edge a routed path plus an
//! optional explicit arrival point (when absent the route's last point is the
//! arrival). The renderer makes no layout decisions; it only consumes this.
//!
//! [`LayeredLayout`] is the built-in rank-based engine.

pub mod curve;
mod layered;

pub use curve::{Curve, PathSegment};
pub use layered::LayeredLayout;

use crate::attribution::{AttributedEdge, AttributedGraph, AttributedVertex};
use egui::{Pos2, Rect};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LayoutError {
    #[error("Edge {source_name} -> {target} references unknown vertex '{missing}'")]
    MissingEndpoint {
        source_name: String,
        target: String,
        missing: String,
    },

    #[error("Layout engine failed: {0}")]
    Engine(String),
}

/// A positioned vertex.
#[derive(Debug, Clone, PartialEq)]
pub struct LaidOutNode {
    pub vertex: AttributedVertex,
    pub bounds: Rect,
    pub outline: Curve,
}

/// A routed edge.
#[derive(Debug, Clone, PartialEq)]
pub struct LaidOutLink {
    pub edge: AttributedEdge,
    pub route: Curve,
    /// Explicit arrival point; `None` means the end of `route`.
    pub arrival: Option<Pos2>,
}

impl LaidOutLink {
    pub fn arrival_point(&self) -> Pos2 {
        self.arrival.unwrap_or_else(|| self.route.end())
    }
}

/// Layout output for a whole graph.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LaidOutGraph {
    pub name: String,
    pub nodes: Vec<LaidOutNode>,
    pub links: Vec<LaidOutLink>,
}

impl LaidOutGraph {
    pub fn node(&self, name: &str) -> Option<&LaidOutNode> {
        self.nodes.iter().find(|n| n.vertex.name == name)
    }
}

/// Boundary to a layout algorithm. Invoked on the UI thread.
pub trait LayoutEngine {
    fn name(&self) -> &str;

    fn layout(&self, graph: &AttributedGraph) -> Result<LaidOutGraph, LayoutError>;
}

/// Spacing parameters for the built-in engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutSettings {
    /// Vertical gap between ranks.
    pub rank_separation: f32,
    /// Horizontal gap between nodes of a rank.
    pub node_separation: f32,
    pub margin: f32,
    pub min_node_width: f32,
    pub min_node_height: f32,
}

impl Default for LayoutSettings {
    fn default() -> Self {
        Self {
            rank_separation: 80.0,
            node_separation: 40.0,
            margin: 20.0,
            min_node_width: 60.0,
            min_node_height: 30.0,
        }
    }
}
