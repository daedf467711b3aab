//! Attribution: turns a filtered domain graph into an attributed graph the
//! layout engine can consume.
//!
//! Every node and link goes through a role-specific match:
//!
//! | element | variants |
//! |---------|----------|
//! | node    | start, main, missing, plain |
//! | link    | plain, weak, task, bundle |
//!
//! Visual attributes come from the [`Theme`]; node min-width/min-height come
//! from measuring the label text, which has to happen on the UI thread when a
//! real font backend is used (see [`EguiTextMeasure`]).
//!
//! Attributed graphs are transient: one per render pass.

mod attrs;
mod measure;

pub use attrs::{AttrKey, AttrValue, Attributes};
pub use measure::{ApproxTextMeasure, EguiTextMeasure, TextMeasure};

use crate::config::{BundlingSettings, LinkStyleKind, Theme};
use crate::graph::{Graph, Link, LinkKind, Node, NodeRole};
use std::collections::HashMap;

/// Attributed node.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributedVertex {
    pub name: String,
    pub role: NodeRole,
    pub attrs: Attributes,
}

/// Attributed link.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributedEdge {
    pub source: String,
    pub target: String,
    pub style: LinkStyleKind,
    pub attrs: Attributes,
}

/// Graph annotated with layout/rendering attributes, 1:1 with the filtered
/// graph it was built from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributedGraph {
    pub name: String,
    pub vertices: Vec<AttributedVertex>,
    pub edges: Vec<AttributedEdge>,
}

impl AttributedGraph {
    pub fn vertex(&self, name: &str) -> Option<&AttributedVertex> {
        self.vertices.iter().find(|v| v.name == name)
    }
}

/// Builds [`AttributedGraph`]s.
pub struct Attributor<'a> {
    theme: &'a dyn Theme,
    measure: &'a dyn TextMeasure,
    bundling: Option<BundlingSettings>,
}

impl<'a> Attributor<'a> {
    /// `bundling` overrides the theme's bundling settings when given.
    pub fn new(
        theme: &'a dyn Theme,
        measure: &'a dyn TextMeasure,
        bundling: Option<BundlingSettings>,
    ) -> Self {
        Self {
            theme,
            measure,
            bundling,
        }
    }

    fn bundling(&self) -> BundlingSettings {
        self.bundling.unwrap_or_else(|| self.theme.bundling())
    }

    pub fn attribute(&self, graph: &Graph) -> AttributedGraph {
        let bundling = self.bundling();
        let vertices = graph
            .nodes()
            .iter()
            .map(|node| self.attribute_node(node, bundling))
            .collect();

        // Ordinals only where a source has more than one outgoing link.
        let mut out_degree: HashMap<&str, usize> = HashMap::new();
        for link in graph.links() {
            *out_degree.entry(link.source.as_str()).or_default() += 1;
        }
        let mut seen: HashMap<&str, usize> = HashMap::new();
        let edges = graph
            .links()
            .iter()
            .map(|link| {
                let ordinal = seen.entry(link.source.as_str()).or_default();
                *ordinal += 1;
                let label = if out_degree[link.source.as_str()] > 1 {
                    ordinal.to_string()
                } else {
                    String::new()
                };
                self.attribute_link(link, label)
            })
            .collect();

        tracing::debug!(
            "Attributed '{}': {} vertices, {} edges (bundling {})",
            graph.name(),
            graph.node_count(),
            graph.link_count(),
            if bundling.enabled { "on" } else { "off" }
        );

        AttributedGraph {
            name: graph.name().to_string(),
            vertices,
            edges,
        }
    }

    fn attribute_node(&self, node: &Node, bundling: BundlingSettings) -> AttributedVertex {
        let role = node.role();
        let style = self.theme.node_style(role);
        let mut attrs = Attributes::default();
        attrs.set(AttrKey::Shape, AttrValue::Shape(style.shape));
        attrs.set(AttrKey::Foreground, AttrValue::Color(style.foreground));
        attrs.set(AttrKey::Background, AttrValue::Color(style.background));
        attrs.set(AttrKey::LineWidth, AttrValue::Number(style.line_width));
        attrs.set(AttrKey::Label, AttrValue::Text(node.name.clone()));

        match role {
            NodeRole::Start => {
                attrs.set(AttrKey::Condition, AttrValue::Text("start".to_string()));
            }
            NodeRole::Main => {}
            NodeRole::Missing => {
                attrs.set(
                    AttrKey::Condition,
                    AttrValue::Text("undefined target".to_string()),
                );
            }
            NodeRole::Plain => {}
        }

        let description = match (&node.description, &node.location) {
            (Some(text), _) => Some(text.clone()),
            (None, Some(loc)) => Some(format!("{}:{}", loc.file, loc.line)),
            (None, None) => None,
        };
        if let Some(text) = description {
            attrs.set(AttrKey::Description, AttrValue::Text(text));
        }

        let text = self.measure.measure(&node.name, self.theme.font_size());
        let [pad_x, pad_y] = self.theme.label_padding();
        attrs.set(AttrKey::MinWidth, AttrValue::Number(text.x + pad_x * 2.0));
        attrs.set(AttrKey::MinHeight, AttrValue::Number(text.y + pad_y * 2.0));

        if bundling.enabled {
            attrs.set(
                AttrKey::BundleInThreshold,
                AttrValue::Count(bundling.in_threshold),
            );
            attrs.set(
                AttrKey::BundleOutThreshold,
                AttrValue::Count(bundling.out_threshold),
            );
        }

        AttributedVertex {
            name: node.name.clone(),
            role,
            attrs,
        }
    }

    fn attribute_link(&self, link: &Link, label: String) -> AttributedEdge {
        let mut attrs = Attributes::default();
        attrs.set(AttrKey::Label, AttrValue::Text(label));

        let style_kind = match &link.kind {
            LinkKind::Plain => LinkStyleKind::Plain,
            LinkKind::Weak => LinkStyleKind::Weak,
            LinkKind::Task { kind, params } => {
                let params = params
                    .iter()
                    .map(|(k, v)| format!("{}={}", k, v))
                    .collect::<Vec<_>>()
                    .join(", ");
                attrs.set(
                    AttrKey::Condition,
                    AttrValue::Text(format!("{}({})", kind, params)),
                );
                LinkStyleKind::Task
            }
            LinkKind::Bundle { directories } => {
                if !directories.is_empty() {
                    attrs.set(
                        AttrKey::Description,
                        AttrValue::Text(directories.join(", ")),
                    );
                }
                LinkStyleKind::Bundle
            }
        };

        let style = self.theme.link_style(style_kind);
        attrs.set(AttrKey::LineWidth, AttrValue::Number(style.line_width));
        if style_kind != LinkStyleKind::Plain {
            // Explicit override; plain links fall back to the default at render time.
            attrs.set(AttrKey::Foreground, AttrValue::Color(style.color));
        }
        if style.dashed {
            attrs.set(AttrKey::Dashed, AttrValue::Flag(true));
        }

        AttributedEdge {
            source: link.source.clone(),
            target: link.target.clone(),
            style: style_kind,
            attrs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ShapeToken, ThemeSettings};
    use std::collections::BTreeMap;

    fn graph() -> Graph {
        let mut g = Graph::new("g");
        g.add_node(Node::new("A").with_description("entry point")).unwrap();
        g.add_node(Node::new("B").main()).unwrap();
        g.add_node(Node::new("C").missing().with_location("build.xml", 42)).unwrap();
        g.add_node(Node::new("D")).unwrap();
        g.add_link(Link::new("A", "B")).unwrap();
        g.add_link(Link::new("A", "C").weak()).unwrap();
        g.add_link(
            Link::new("A", "D").with_kind(LinkKind::Task {
                kind: "antcall".into(),
                params: BTreeMap::from([("mode".to_string(), "fast".to_string())]),
            }),
        )
        .unwrap();
        g.add_link(Link::new("B", "D").with_kind(LinkKind::Bundle {
            directories: vec!["lib".into(), "app".into()],
        }))
        .unwrap();
        g.set_start("A").unwrap();
        g
    }

    fn attribute(bundling: Option<BundlingSettings>) -> AttributedGraph {
        let theme = ThemeSettings::default();
        let measure = ApproxTextMeasure::default();
        Attributor::new(&theme, &measure, bundling).attribute(&graph())
    }

    #[test]
    fn test_one_to_one_with_graph() {
        let ag = attribute(None);
        assert_eq!(ag.vertices.len(), 4);
        assert_eq!(ag.edges.len(), 4);
    }

    #[test]
    fn test_node_roles_map_to_theme_shapes() {
        let ag = attribute(None);
        assert_eq!(ag.vertex("A").unwrap().attrs.shape(), Some(ShapeToken::Octagon));
        assert_eq!(ag.vertex("B").unwrap().attrs.shape(), Some(ShapeToken::Ellipse));
        assert_eq!(ag.vertex("C").unwrap().attrs.shape(), Some(ShapeToken::Box));
        assert_eq!(ag.vertex("D").unwrap().attrs.shape(), Some(ShapeToken::RoundedBox));
    }

    #[test]
    fn test_descriptions_and_conditions() {
        let ag = attribute(None);
        let a = &ag.vertex("A").unwrap().attrs;
        assert_eq!(a.text(AttrKey::Description), Some("entry point"));
        let c = &ag.vertex("C").unwrap().attrs;
        assert_eq!(c.text(AttrKey::Description), Some("build.xml:42"));
        assert_eq!(c.text(AttrKey::Condition), Some("undefined target"));
        assert_eq!(ag.edges[2].attrs.text(AttrKey::Condition), Some("antcall(mode=fast)"));
        assert_eq!(ag.edges[3].attrs.text(AttrKey::Description), Some("lib, app"));
    }

    #[test]
    fn test_ordinal_labels_only_for_fan_out() {
        let ag = attribute(None);
        let labels: Vec<_> = ag
            .edges
            .iter()
            .map(|e| e.attrs.text(AttrKey::Label).unwrap_or_default().to_string())
            .collect();
        // A has three outgoing links, B exactly one.
        assert_eq!(labels, vec!["1", "2", "3", ""]);
    }

    #[test]
    fn test_link_overrides() {
        let ag = attribute(None);
        assert!(ag.edges[0].attrs.color(AttrKey::Foreground).is_none());
        assert!(ag.edges[1].attrs.flag(AttrKey::Dashed));
        assert_eq!(ag.edges[1].style, LinkStyleKind::Weak);
        assert!(ag.edges[2].attrs.color(AttrKey::Foreground).is_some());
        assert_eq!(ag.edges[3].style, LinkStyleKind::Bundle);
    }

    #[test]
    fn test_min_size_from_text_metrics() {
        let ag = attribute(None);
        let short = ag.vertex("A").unwrap().attrs.number(AttrKey::MinWidth).unwrap();
        let theme = ThemeSettings::default();
        let measure = ApproxTextMeasure::default();
        let mut g = Graph::new("long");
        g.add_node(Node::new("a-much-longer-target-name")).unwrap();
        let long = Attributor::new(&theme, &measure, None).attribute(&g);
        let long = long.vertices[0].attrs.number(AttrKey::MinWidth).unwrap();
        assert!(long > short);
        assert!(ag.vertex("A").unwrap().attrs.number(AttrKey::MinHeight).unwrap() > 0.0);
    }

    #[test]
    fn test_bundling_thresholds_only_when_enabled() {
        let off = attribute(None);
        assert!(off.vertices.iter().all(|v| v.attrs.count(AttrKey::BundleOutThreshold).is_none()));

        let on = attribute(Some(BundlingSettings {
            enabled: true,
            in_threshold: 2,
            out_threshold: 3,
        }));
        for v in &on.vertices {
            assert_eq!(v.attrs.count(AttrKey::BundleInThreshold), Some(2));
            assert_eq!(v.attrs.count(AttrKey::BundleOutThreshold), Some(3));
        }
    }
}
