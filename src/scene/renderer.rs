//! Laid-out graph → scene figures.

use super::geometry::{arrow_head, flatten};
use super::{BundleDirection, Scene, SceneBundle, SceneContent, SceneEdge, SceneNode};
use crate::attribution::{AttrKey, AttributedVertex};
use crate::config::{LinkStyleKind, Theme};
use crate::layout::{LaidOutGraph, LaidOutLink, LaidOutNode};
use egui::{Stroke, Vec2};
use std::collections::{HashMap, HashSet};
use std::thread::ThreadId;
use thiserror::Error;

/// Arrowhead length in scene units.
const ARROW_LENGTH: f32 = 10.0;
/// Arrowhead base width in scene units.
const ARROW_WIDTH: f32 = 7.0;
/// Length of a bundle connector.
const BUS_LENGTH: f32 = 28.0;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("Scene must be built on the UI thread")]
    WrongThread,

    #[error("Edge {source_name} -> {target} has no laid-out endpoint")]
    MissingEndpoint { source_name: String, target: String },

    #[error("Node '{0}' has an empty outline")]
    EmptyOutline(String),

    #[error("Unknown node '{0}'")]
    UnknownNode(String),
}

/// Builds scenes from layout output.
///
/// When bound to a thread with [`SceneRenderer::bound_to`], rendering from any
/// other thread fails with [`RenderError::WrongThread`].
pub struct SceneRenderer<'a> {
    theme: &'a dyn Theme,
    ui_thread: Option<ThreadId>,
}

impl<'a> SceneRenderer<'a> {
    pub fn new(theme: &'a dyn Theme) -> Self {
        Self {
            theme,
            ui_thread: None,
        }
    }

    pub fn bound_to(mut self, ui_thread: ThreadId) -> Self {
        self.ui_thread = Some(ui_thread);
        self
    }

    /// Build a fresh scene.
    pub fn render(&self, graph: &LaidOutGraph) -> Result<Scene, RenderError> {
        let mut scene = Scene::default();
        self.render_into(&mut scene, graph)?;
        Ok(scene)
    }

    /// Rebuild `scene` in place. Pan/zoom and the selection channel survive;
    /// on error the scene is left untouched.
    pub fn render_into(&self, scene: &mut Scene, graph: &LaidOutGraph) -> Result<(), RenderError> {
        self.check_thread()?;
        let content = self.build(graph)?;
        tracing::debug!(
            "Rendered '{}': {} nodes, {} edges, {} bundles",
            content.name,
            content.nodes.len(),
            content.edges.len(),
            content.bundles.len()
        );
        scene.replace_content(content);
        Ok(())
    }

    fn check_thread(&self) -> Result<(), RenderError> {
        match self.ui_thread {
            Some(id) if id != std::thread::current().id() => Err(RenderError::WrongThread),
            _ => Ok(()),
        }
    }

    fn build(&self, graph: &LaidOutGraph) -> Result<SceneContent, RenderError> {
        let nodes = graph
            .nodes
            .iter()
            .map(|n| self.node(n))
            .collect::<Result<Vec<_>, _>>()?;
        let by_name: HashMap<&str, &LaidOutNode> =
            graph.nodes.iter().map(|n| (n.vertex.name.as_str(), n)).collect();

        let mut out_degree: HashMap<&str, usize> = HashMap::new();
        let mut in_degree: HashMap<&str, usize> = HashMap::new();
        for link in &graph.links {
            let (source, target) = (link.edge.source.as_str(), link.edge.target.as_str());
            if !by_name.contains_key(source) || !by_name.contains_key(target) {
                return Err(RenderError::MissingEndpoint {
                    source_name: link.edge.source.clone(),
                    target: link.edge.target.clone(),
                });
            }
            *out_degree.entry(source).or_default() += 1;
            *in_degree.entry(target).or_default() += 1;
        }

        let mut bundles = Vec::new();
        let mut bundled_out = HashSet::new();
        let mut bundled_in = HashSet::new();
        for n in &graph.nodes {
            let name = n.vertex.name.as_str();
            let outs = out_degree.get(name).copied().unwrap_or(0);
            let ins = in_degree.get(name).copied().unwrap_or(0);
            if exceeds(&n.vertex, AttrKey::BundleOutThreshold, outs) {
                bundled_out.insert(name);
                bundles.push(self.bundle(n, BundleDirection::Out, outs));
            }
            if exceeds(&n.vertex, AttrKey::BundleInThreshold, ins) {
                bundled_in.insert(name);
                bundles.push(self.bundle(n, BundleDirection::In, ins));
            }
        }

        let edges = graph
            .links
            .iter()
            .filter(|l| {
                !bundled_out.contains(l.edge.source.as_str())
                    && !bundled_in.contains(l.edge.target.as_str())
            })
            .map(|l| self.edge(l))
            .collect();

        Ok(SceneContent {
            name: graph.name.clone(),
            nodes,
            edges,
            bundles,
            selection_color: self.theme.selection_color(),
        })
    }

    fn node(&self, laid_out: &LaidOutNode) -> Result<SceneNode, RenderError> {
        let vertex = &laid_out.vertex;
        let polygon = flatten(&laid_out.outline);
        if polygon.len() < 3 {
            return Err(RenderError::EmptyOutline(vertex.name.clone()));
        }
        let style = self.theme.node_style(vertex.role);
        let attrs = &vertex.attrs;
        let role_stroke = Stroke::new(
            attrs.number(AttrKey::LineWidth).unwrap_or(style.line_width),
            attrs.color(AttrKey::Foreground).unwrap_or(style.foreground),
        );
        Ok(SceneNode {
            name: vertex.name.clone(),
            role: vertex.role,
            polygon,
            bounds: laid_out.bounds,
            label: attrs
                .text(AttrKey::Label)
                .unwrap_or(vertex.name.as_str())
                .to_string(),
            description: attrs.text(AttrKey::Description).map(str::to_string),
            fill: attrs.color(AttrKey::Background).unwrap_or(style.background),
            stroke: role_stroke,
            role_stroke,
            selected: false,
        })
    }

    fn edge(&self, link: &LaidOutLink) -> SceneEdge {
        let attrs = &link.edge.attrs;
        let default = self.theme.link_style(LinkStyleKind::Plain);
        let stroke = Stroke::new(
            attrs.number(AttrKey::LineWidth).unwrap_or(default.line_width),
            attrs.color(AttrKey::Foreground).unwrap_or(default.color),
        );

        let mut points = flatten(&link.route);
        if let Some(arrival) = link.arrival {
            if points.last() != Some(&arrival) {
                points.push(arrival);
            }
        }
        let tip = points.last().copied().unwrap_or(link.route.start);
        let from = points
            .iter()
            .rev()
            .find(|p| **p != tip)
            .copied()
            .unwrap_or(tip - Vec2::DOWN);

        SceneEdge {
            source: link.edge.source.clone(),
            target: link.edge.target.clone(),
            points,
            label: attrs
                .text(AttrKey::Label)
                .filter(|l| !l.is_empty())
                .map(str::to_string),
            arrow: arrow_head(from, tip, ARROW_LENGTH, ARROW_WIDTH),
            stroke,
            dashed: attrs.flag(AttrKey::Dashed),
        }
    }

    fn bundle(&self, node: &LaidOutNode, direction: BundleDirection, links: usize) -> SceneBundle {
        let style = self.theme.link_style(LinkStyleKind::Bundle);
        let (start, end) = match direction {
            BundleDirection::Out => {
                let start = node.bounds.center_bottom();
                (start, start + Vec2::new(0.0, BUS_LENGTH))
            }
            BundleDirection::In => {
                let end = node.bounds.center_top();
                (end - Vec2::new(0.0, BUS_LENGTH), end)
            }
        };
        SceneBundle {
            node: node.vertex.name.clone(),
            direction,
            links,
            points: vec![start, end],
            arrow: arrow_head(start, end, ARROW_LENGTH, ARROW_WIDTH),
            label: format!("{}: {}", direction.as_str(), node.vertex.name),
            stroke: Stroke::new(style.line_width, style.color),
        }
    }
}

fn exceeds(vertex: &AttributedVertex, key: AttrKey, degree: usize) -> bool {
    vertex
        .attrs
        .count(key)
        .is_some_and(|threshold| degree > threshold)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribution::{ApproxTextMeasure, Attributor};
    use crate::config::{BundlingSettings, ThemeSettings};
    use crate::graph::{Graph, Link, Node};
    use crate::layout::{LayeredLayout, LayoutEngine};

    fn fan_out(n: usize) -> Graph {
        let mut g = Graph::new("fan");
        g.add_node(Node::new("hub")).unwrap();
        for i in 0..n {
            let name = format!("leaf{}", i);
            g.add_node(Node::new(name.clone())).unwrap();
            g.add_link(Link::new("hub", name)).unwrap();
        }
        g
    }

    fn laid_out(graph: &Graph, bundling: Option<BundlingSettings>) -> LaidOutGraph {
        let theme = ThemeSettings::default();
        let measure = ApproxTextMeasure::default();
        let attributed = Attributor::new(&theme, &measure, bundling).attribute(graph);
        LayeredLayout::default().layout(&attributed).unwrap()
    }

    fn bundling(out_threshold: usize) -> Option<BundlingSettings> {
        Some(BundlingSettings {
            enabled: true,
            in_threshold: 100,
            out_threshold,
        })
    }

    #[test]
    fn test_one_edge_per_link_at_threshold() {
        let theme = ThemeSettings::default();
        let scene = SceneRenderer::new(&theme)
            .render(&laid_out(&fan_out(3), bundling(3)))
            .unwrap();
        assert_eq!(scene.edges().len(), 3);
        assert!(scene.bundles().is_empty());
    }

    #[test]
    fn test_single_bundle_above_threshold() {
        let theme = ThemeSettings::default();
        for n in [4, 9, 20] {
            let scene = SceneRenderer::new(&theme)
                .render(&laid_out(&fan_out(n), bundling(3)))
                .unwrap();
            assert!(scene.edges().is_empty());
            assert_eq!(scene.bundles().len(), 1);
            let bus = &scene.bundles()[0];
            assert_eq!(bus.direction, BundleDirection::Out);
            assert_eq!(bus.label, "out: hub");
            assert_eq!(bus.links, n);
        }
    }

    fn fan_in(n: usize) -> Graph {
        let mut g = Graph::new("fan-in");
        g.add_node(Node::new("sink")).unwrap();
        for i in 0..n {
            let name = format!("src{}", i);
            g.add_node(Node::new(name.clone())).unwrap();
            g.add_link(Link::new(name, "sink")).unwrap();
        }
        g
    }

    fn both_ways(in_threshold: usize, out_threshold: usize) -> Option<BundlingSettings> {
        Some(BundlingSettings {
            enabled: true,
            in_threshold,
            out_threshold,
        })
    }

    #[test]
    fn test_single_in_bundle_above_threshold() {
        let theme = ThemeSettings::default();
        let scene = SceneRenderer::new(&theme)
            .render(&laid_out(&fan_in(5), both_ways(2, 100)))
            .unwrap();
        assert!(scene.edges().is_empty());
        assert_eq!(scene.bundles().len(), 1);
        let bus = &scene.bundles()[0];
        assert_eq!(bus.direction, BundleDirection::In);
        assert_eq!(bus.label, "in: sink");
        assert_eq!(bus.links, 5);
    }

    #[test]
    fn test_link_between_two_buses_is_not_drawn() {
        // hub fans out to four leaves and into sink; three sources also feed sink.
        let mut g = fan_out(4);
        g.add_node(Node::new("sink")).unwrap();
        g.add_link(Link::new("hub", "sink")).unwrap();
        for i in 0..3 {
            let name = format!("src{}", i);
            g.add_node(Node::new(name.clone())).unwrap();
            g.add_link(Link::new(name, "sink")).unwrap();
        }
        g.add_node(Node::new("other")).unwrap();
        g.add_link(Link::new("src0", "other")).unwrap();

        let theme = ThemeSettings::default();
        let scene = SceneRenderer::new(&theme)
            .render(&laid_out(&g, both_ways(2, 3)))
            .unwrap();

        let mut labels: Vec<_> = scene.bundles().iter().map(|b| b.label.as_str()).collect();
        labels.sort();
        assert_eq!(labels, vec!["in: sink", "out: hub"]);
        assert!(!scene.edges().iter().any(|e| e.source == "hub" && e.target == "sink"));
        assert_eq!(scene.edges().len(), 1);
        assert_eq!(scene.edges()[0].target, "other");
    }

    #[test]
    fn test_no_bundles_when_disabled() {
        let theme = ThemeSettings::default();
        let scene = SceneRenderer::new(&theme)
            .render(&laid_out(&fan_out(10), None))
            .unwrap();
        assert_eq!(scene.edges().len(), 10);
        assert!(scene.bundles().is_empty());
    }

    #[test]
    fn test_edge_anchors_and_arrow() {
        let theme = ThemeSettings::default();
        let layout = laid_out(&fan_out(1), None);
        let scene = SceneRenderer::new(&theme).render(&layout).unwrap();
        let edge = &scene.edges()[0];
        assert_eq!(edge.source_anchor(), Some(layout.links[0].route.start));
        assert_eq!(edge.target_anchor(), Some(layout.links[0].arrival_point()));
        assert_eq!(edge.arrow[0], layout.links[0].arrival_point());
        assert_eq!(edge.label, None);
    }

    #[test]
    fn test_link_override_beats_default() {
        let theme = ThemeSettings::default();
        let mut g = fan_out(2);
        g.add_link(Link::new("leaf0", "leaf1").weak()).unwrap();
        let scene = SceneRenderer::new(&theme).render(&laid_out(&g, None)).unwrap();
        let weak = scene.edges().iter().find(|e| e.source == "leaf0").unwrap();
        let plain = scene.edges().iter().find(|e| e.source == "hub").unwrap();
        assert!(weak.dashed);
        assert_eq!(weak.stroke.color, theme.link_style(LinkStyleKind::Weak).color);
        assert_eq!(plain.stroke.color, theme.link_style(LinkStyleKind::Plain).color);
        assert_eq!(plain.label.as_deref(), Some("1"));
    }

    #[test]
    fn test_wrong_thread_rejected_and_scene_untouched() {
        let theme = ThemeSettings::default();
        let layout = laid_out(&fan_out(2), None);
        let mut scene = SceneRenderer::new(&theme).render(&layout).unwrap();
        let other = std::thread::spawn(|| std::thread::current().id())
            .join()
            .unwrap();
        let err = SceneRenderer::new(&theme)
            .bound_to(other)
            .render_into(&mut scene, &laid_out(&fan_out(5), None))
            .unwrap_err();
        assert_eq!(err, RenderError::WrongThread);
        assert_eq!(scene.nodes().len(), 3);
    }

    #[test]
    fn test_missing_endpoint_fails_whole_render() {
        let theme = ThemeSettings::default();
        let mut layout = laid_out(&fan_out(2), None);
        layout.nodes.retain(|n| n.vertex.name != "leaf1");
        let err = SceneRenderer::new(&theme).render(&layout).unwrap_err();
        assert!(matches!(err, RenderError::MissingEndpoint { .. }));
    }
}
