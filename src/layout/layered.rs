//! Rank-based layered layout.
//!
//! Ranks come from longest-path propagation along edges, capped at the vertex
//! count so cycles terminate. Ranks are stacked top to bottom and centered
//! horizontally; nodes keep graph order within a rank. Forward edges run from
//! the bottom of the source to the top of the target as a single cubic;
//! backward and same-rank edges loop around the right-hand side.

use super::{Curve, LaidOutGraph, LaidOutLink, LaidOutNode, LayoutEngine, LayoutError, LayoutSettings};
use crate::attribution::{AttrKey, AttributedGraph};
use crate::config::ShapeToken;
use egui::{Pos2, Rect, Vec2};
use std::collections::HashMap;

/// Horizontal reach of edges routed around the right-hand side.
const SIDE_LOOP_REACH: f32 = 40.0;

#[derive(Debug, Clone, Default)]
pub struct LayeredLayout {
    settings: LayoutSettings,
}

impl LayeredLayout {
    pub fn new(settings: LayoutSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &LayoutSettings {
        &self.settings
    }

    fn ranks(&self, graph: &AttributedGraph, index: &HashMap<&str, usize>) -> Vec<usize> {
        let mut rank = vec![0usize; graph.vertices.len()];
        for _ in 0..graph.vertices.len() {
            let mut changed = false;
            for edge in &graph.edges {
                let (Some(&from), Some(&to)) =
                    (index.get(edge.source.as_str()), index.get(edge.target.as_str()))
                else {
                    continue;
                };
                if from != to && rank[to] <= rank[from] {
                    rank[to] = rank[from] + 1;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
        // Cycles can push ranks up to the iteration cap; compact the gaps.
        let mut used: Vec<usize> = rank.clone();
        used.sort_unstable();
        used.dedup();
        rank.iter()
            .map(|r| used.binary_search(r).unwrap_or(0))
            .collect()
    }
}

impl LayoutEngine for LayeredLayout {
    fn name(&self) -> &str {
        "layered"
    }

    fn layout(&self, graph: &AttributedGraph) -> Result<LaidOutGraph, LayoutError> {
        let s = &self.settings;
        let index: HashMap<&str, usize> = graph
            .vertices
            .iter()
            .enumerate()
            .map(|(i, v)| (v.name.as_str(), i))
            .collect();

        for edge in &graph.edges {
            for endpoint in [&edge.source, &edge.target] {
                if !index.contains_key(endpoint.as_str()) {
                    return Err(LayoutError::MissingEndpoint {
                        source_name: edge.source.clone(),
                        target: edge.target.clone(),
                        missing: endpoint.clone(),
                    });
                }
            }
        }

        let rank = self.ranks(graph, &index);
        let rank_count = rank.iter().max().map_or(0, |r| r + 1);

        let sizes: Vec<Vec2> = graph
            .vertices
            .iter()
            .map(|v| {
                Vec2::new(
                    v.attrs.number(AttrKey::MinWidth).unwrap_or(0.0).max(s.min_node_width),
                    v.attrs.number(AttrKey::MinHeight).unwrap_or(0.0).max(s.min_node_height),
                )
            })
            .collect();

        let mut rows: Vec<Vec<usize>> = vec![Vec::new(); rank_count];
        for (i, &r) in rank.iter().enumerate() {
            rows[r].push(i);
        }
        let row_width = |row: &[usize]| -> f32 {
            let widths: f32 = row.iter().map(|&i| sizes[i].x).sum();
            widths + s.node_separation * row.len().saturating_sub(1) as f32
        };
        let widest = rows.iter().map(|r| row_width(r)).fold(0.0, f32::max);

        let mut bounds = vec![Rect::NOTHING; graph.vertices.len()];
        let mut y = s.margin;
        for row in &rows {
            let height = row.iter().map(|&i| sizes[i].y).fold(0.0, f32::max);
            let mut x = s.margin + (widest - row_width(row)) / 2.0;
            for &i in row {
                // Vertically centered within the rank band.
                let top = y + (height - sizes[i].y) / 2.0;
                bounds[i] = Rect::from_min_size(Pos2::new(x, top), sizes[i]);
                x += sizes[i].x + s.node_separation;
            }
            y += height + s.rank_separation;
        }

        let nodes = graph
            .vertices
            .iter()
            .zip(&bounds)
            .map(|(vertex, &rect)| LaidOutNode {
                vertex: vertex.clone(),
                bounds: rect,
                outline: outline(vertex.attrs.shape().unwrap_or(ShapeToken::Box), rect),
            })
            .collect();

        let links = graph
            .edges
            .iter()
            .map(|edge| {
                let from = index[edge.source.as_str()];
                let to = index[edge.target.as_str()];
                let (route, arrival) = route(bounds[from], bounds[to], rank[from] < rank[to], from == to);
                LaidOutLink {
                    edge: edge.clone(),
                    route,
                    arrival: Some(arrival),
                }
            })
            .collect();

        tracing::debug!(
            "Layered layout of '{}': {} ranks, {} nodes",
            graph.name,
            rank_count,
            graph.vertices.len()
        );

        Ok(LaidOutGraph {
            name: graph.name.clone(),
            nodes,
            links,
        })
    }
}

fn outline(shape: ShapeToken, rect: Rect) -> Curve {
    match shape {
        ShapeToken::Box => Curve::rect(rect),
        ShapeToken::RoundedBox => Curve::rounded_rect(rect, (rect.height() / 4.0).min(8.0)),
        ShapeToken::Ellipse => Curve::ellipse(rect),
        ShapeToken::Octagon => Curve::octagon(rect),
        ShapeToken::Diamond => Curve::diamond(rect),
    }
}

/// Route an edge; returns the path and its arrival point.
fn route(from: Rect, to: Rect, forward: bool, self_loop: bool) -> (Curve, Pos2) {
    if self_loop {
        let start = Pos2::new(from.right(), from.center().y - from.height() / 4.0);
        let end = Pos2::new(from.right(), from.center().y + from.height() / 4.0);
        let reach = Vec2::new(SIDE_LOOP_REACH, 0.0);
        let curve = Curve::open(start).cubic_to(start + reach, end + reach, end);
        return (curve, end);
    }
    if forward {
        let start = from.center_bottom();
        let end = to.center_top();
        let bend = Vec2::new(0.0, (end.y - start.y) / 2.0);
        let curve = Curve::open(start).cubic_to(start + bend, end - bend, end);
        (curve, end)
    } else {
        let start = from.right_center();
        let end = to.right_center();
        let reach = Vec2::new(SIDE_LOOP_REACH + (start.y - end.y).abs() * 0.1, 0.0);
        let curve = Curve::open(start).cubic_to(start + reach, end + reach, end);
        (curve, end)
    }
}
