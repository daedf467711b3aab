//! Interactive 2D scene built from a laid-out graph.
//!
//! A [`Scene`] owns plain shape primitives (node polygons, edge polylines with
//! arrowheads, bundle connectors), the current selection, and the [`Viewport`]
//! (pan + zoom). [`SceneRenderer`] builds or rebuilds scenes; [`paint`] draws
//! them with egui and turns pointer input into selection and viewport edits.
//!
//! All scene mutation happens on the UI thread.

pub mod geometry;
pub mod paint;
mod renderer;

pub use renderer::{RenderError, SceneRenderer};

use crate::dispatch::Dispatcher;
use crate::graph::NodeRole;
use egui::{Color32, Pos2, Rect, Stroke, Vec2};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Smallest zoom factor.
pub const MIN_ZOOM: f32 = 0.25;
/// Largest zoom factor.
pub const MAX_ZOOM: f32 = 3.0;
/// Multiplicative zoom step.
pub const ZOOM_STEP: f32 = 1.1;

/// Emitted after the selection set changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionChanged {
    /// Selected node names, sorted.
    pub selected: Vec<String>,
}

/// Pan and zoom state.
///
/// Scene coordinates map to screen coordinates as
/// `origin + pan + scene * zoom`, where `origin` is the top-left corner of the
/// widget the scene is painted into.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    zoom: f32,
    pan: Vec2,
    pending_focus: Option<Pos2>,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            pan: Vec2::ZERO,
            pending_focus: None,
        }
    }
}

impl Viewport {
    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn pan(&self) -> Vec2 {
        self.pan
    }

    pub fn set_zoom(&mut self, zoom: f32) {
        self.zoom = if zoom.is_finite() {
            zoom.clamp(MIN_ZOOM, MAX_ZOOM)
        } else {
            1.0
        };
    }

    pub fn zoom_in(&mut self) {
        self.set_zoom(self.zoom * ZOOM_STEP);
    }

    pub fn zoom_out(&mut self) {
        self.set_zoom(self.zoom / ZOOM_STEP);
    }

    pub fn reset_zoom(&mut self) {
        self.zoom = 1.0;
    }

    /// Apply `steps` zoom steps (negative zooms out) keeping the scene point
    /// under `anchor` fixed on screen.
    pub fn zoom_steps_at(&mut self, steps: i32, anchor: Pos2, origin: Pos2) {
        let fixed = self.to_scene(anchor, origin);
        self.set_zoom(self.zoom * ZOOM_STEP.powi(steps));
        self.pan = anchor - origin - fixed.to_vec2() * self.zoom;
    }

    pub fn pan_by(&mut self, delta: Vec2) {
        self.pan += delta;
    }

    /// Screen position to scene position.
    pub fn to_scene(&self, screen: Pos2, origin: Pos2) -> Pos2 {
        ((screen - origin - self.pan) / self.zoom).to_pos2()
    }

    /// Scene position to screen position.
    pub fn to_screen(&self, scene: Pos2, origin: Pos2) -> Pos2 {
        origin + self.pan + scene.to_vec2() * self.zoom
    }

    /// Center `scene_point` in the view on the next paint.
    pub fn request_focus(&mut self, scene_point: Pos2) {
        self.pending_focus = Some(scene_point);
    }

    pub fn has_pending_focus(&self) -> bool {
        self.pending_focus.is_some()
    }

    /// Apply a pending focus request against the widget rectangle. Returns
    /// whether one was applied.
    pub fn apply_pending_focus(&mut self, view: Rect) -> bool {
        let Some(point) = self.pending_focus.take() else {
            return false;
        };
        self.pan = view.size() / 2.0 - point.to_vec2() * self.zoom;
        true
    }

    /// Zoom so `bounds` fits `view` and center it. Takes effect on next paint.
    pub fn fit_to(&mut self, bounds: Rect, view: Rect) {
        if !bounds.is_positive() || !view.is_positive() {
            return;
        }
        let scale = (view.width() / bounds.width()).min(view.height() / bounds.height());
        self.set_zoom(scale);
        self.request_focus(bounds.center());
    }
}

/// A rendered node.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    pub name: String,
    pub role: NodeRole,
    /// Flattened outline, scene coordinates.
    pub polygon: Vec<Pos2>,
    pub bounds: Rect,
    pub label: String,
    pub description: Option<String>,
    pub fill: Color32,
    /// Current outline stroke; reflects selection.
    pub stroke: Stroke,
    /// Outline stroke for the node's role.
    pub role_stroke: Stroke,
    pub selected: bool,
}

/// A rendered link.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneEdge {
    pub source: String,
    pub target: String,
    /// Flattened route: first point is the source anchor, last the target anchor.
    pub points: Vec<Pos2>,
    pub label: Option<String>,
    pub arrow: [Pos2; 3],
    pub stroke: Stroke,
    pub dashed: bool,
}

impl SceneEdge {
    pub fn source_anchor(&self) -> Option<Pos2> {
        self.points.first().copied()
    }

    pub fn target_anchor(&self) -> Option<Pos2> {
        self.points.last().copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BundleDirection {
    In,
    Out,
}

impl BundleDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            BundleDirection::In => "in",
            BundleDirection::Out => "out",
        }
    }
}

/// One shared connector standing in for all links of a node in one direction.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneBundle {
    pub node: String,
    pub direction: BundleDirection,
    /// Number of links the bus replaces.
    pub links: usize,
    pub points: Vec<Pos2>,
    pub arrow: [Pos2; 3],
    /// `"<direction>: <node>"`.
    pub label: String,
    pub stroke: Stroke,
}

/// The interactive diagram.
pub struct Scene {
    name: String,
    nodes: Vec<SceneNode>,
    index: HashMap<String, usize>,
    edges: Vec<SceneEdge>,
    bundles: Vec<SceneBundle>,
    selection: BTreeSet<String>,
    selection_color: Color32,
    viewport: Viewport,
    selection_changed: Arc<Dispatcher<SelectionChanged>>,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new(Arc::new(Dispatcher::new("selection")))
    }
}

impl std::fmt::Debug for Scene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scene")
            .field("name", &self.name)
            .field("nodes", &self.nodes.len())
            .field("edges", &self.edges.len())
            .field("bundles", &self.bundles.len())
            .field("selection", &self.selection)
            .field("viewport", &self.viewport)
            .finish()
    }
}

impl Scene {
    /// Empty scene publishing selection changes on `selection_changed`.
    pub fn new(selection_changed: Arc<Dispatcher<SelectionChanged>>) -> Self {
        Self {
            name: String::new(),
            nodes: Vec::new(),
            index: HashMap::new(),
            edges: Vec::new(),
            bundles: Vec::new(),
            selection: BTreeSet::new(),
            selection_color: Color32::WHITE,
            viewport: Viewport::default(),
            selection_changed,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn nodes(&self) -> &[SceneNode] {
        &self.nodes
    }

    pub fn node(&self, name: &str) -> Option<&SceneNode> {
        self.index.get(name).map(|&i| &self.nodes[i])
    }

    pub fn edges(&self) -> &[SceneEdge] {
        &self.edges
    }

    pub fn bundles(&self) -> &[SceneBundle] {
        &self.bundles
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn viewport_mut(&mut self) -> &mut Viewport {
        &mut self.viewport
    }

    pub fn selection_channel(&self) -> &Arc<Dispatcher<SelectionChanged>> {
        &self.selection_changed
    }

    /// Selected node names, sorted.
    pub fn selection(&self) -> Vec<String> {
        self.selection.iter().cloned().collect()
    }

    pub fn is_selected(&self, name: &str) -> bool {
        self.selection.contains(name)
    }

    /// Select `name`. Without `add` every other node is deselected; with `add`
    /// it joins the selection, which is a no-op if already selected.
    ///
    /// Returns whether the selection changed.
    pub fn select(&mut self, name: &str, add: bool) -> Result<bool, RenderError> {
        if !self.index.contains_key(name) {
            return Err(RenderError::UnknownNode(name.to_string()));
        }
        let changed = if add {
            self.selection.insert(name.to_string())
        } else {
            let already_alone = self.selection.len() == 1 && self.selection.contains(name);
            if !already_alone {
                self.selection.clear();
                self.selection.insert(name.to_string());
            }
            !already_alone
        };
        if changed {
            self.selection_updated();
        }
        Ok(changed)
    }

    /// Remove `name` from the selection. Returns whether it was selected.
    pub fn deselect(&mut self, name: &str) -> bool {
        let changed = self.selection.remove(name);
        if changed {
            self.selection_updated();
        }
        changed
    }

    pub fn clear_selection(&mut self) -> bool {
        if self.selection.is_empty() {
            return false;
        }
        self.selection.clear();
        self.selection_updated();
        true
    }

    /// Pointer click at `scene_pos`: selects the node under it, or clears the
    /// selection when nothing is hit and `add` is off. Returns whether the
    /// selection changed.
    pub fn click_at(&mut self, scene_pos: Pos2, add: bool) -> bool {
        match self.node_at(scene_pos).map(|n| n.name.clone()) {
            Some(name) => match self.select(&name, add) {
                Ok(changed) => changed,
                Err(e) => {
                    tracing::warn!("Click selection failed: {}", e);
                    false
                }
            },
            None if !add => self.clear_selection(),
            None => false,
        }
    }

    /// Topmost node whose outline contains `scene_pos`.
    pub fn node_at(&self, scene_pos: Pos2) -> Option<&SceneNode> {
        self.nodes.iter().rev().find(|n| {
            n.bounds.contains(scene_pos) && geometry::polygon_contains(&n.polygon, scene_pos)
        })
    }

    /// Bounding box of every figure, or `None` for an empty scene.
    pub fn bounds(&self) -> Option<Rect> {
        let mut rect = Rect::NOTHING;
        for n in &self.nodes {
            rect = rect.union(n.bounds);
        }
        for p in self
            .edges
            .iter()
            .flat_map(|e| e.points.iter())
            .chain(self.bundles.iter().flat_map(|b| b.points.iter()))
        {
            rect.extend_with(*p);
        }
        rect.is_positive().then_some(rect)
    }

    /// Center the view on `name` at the current zoom, on the next paint.
    pub fn jump_to(&mut self, name: &str) -> Result<(), RenderError> {
        let center = self
            .node(name)
            .map(|n| n.bounds.center())
            .ok_or_else(|| RenderError::UnknownNode(name.to_string()))?;
        self.viewport.request_focus(center);
        Ok(())
    }

    /// Fit the whole diagram into `view`.
    pub fn fit_to(&mut self, view: Rect) {
        if let Some(bounds) = self.bounds() {
            self.viewport.fit_to(bounds, view);
        }
    }

    pub fn zoom_in(&mut self) {
        self.viewport.zoom_in();
    }

    pub fn zoom_out(&mut self) {
        self.viewport.zoom_out();
    }

    pub fn reset_zoom(&mut self) {
        self.viewport.reset_zoom();
    }

    pub fn pan_by(&mut self, delta: Vec2) {
        self.viewport.pan_by(delta);
    }

    /// Recolor nodes to match the selection set and notify observers.
    fn selection_updated(&mut self) {
        self.apply_selection_colors();
        let event = SelectionChanged {
            selected: self.selection(),
        };
        tracing::debug!("Selection changed: {:?}", event.selected);
        self.selection_changed.dispatch(&event);
    }

    fn apply_selection_colors(&mut self) {
        for node in &mut self.nodes {
            node.selected = self.selection.contains(&node.name);
            node.stroke = if node.selected {
                Stroke::new(node.role_stroke.width.max(1.0) + 1.0, self.selection_color)
            } else {
                node.role_stroke
            };
        }
    }

    /// Swap in freshly built content, keeping viewport and channel wiring.
    /// Selected names that no longer exist are dropped.
    pub(crate) fn replace_content(&mut self, content: SceneContent) {
        self.name = content.name;
        self.index = content
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.name.clone(), i))
            .collect();
        self.nodes = content.nodes;
        self.edges = content.edges;
        self.bundles = content.bundles;
        self.selection_color = content.selection_color;

        let before = self.selection.len();
        let index = &self.index;
        self.selection.retain(|name| index.contains_key(name));
        if self.selection.len() != before {
            self.selection_updated();
        } else {
            self.apply_selection_colors();
        }
    }
}

/// Figures produced by one render pass, before they are swapped into a scene.
#[derive(Debug, Default)]
pub(crate) struct SceneContent {
    pub name: String,
    pub nodes: Vec<SceneNode>,
    pub edges: Vec<SceneEdge>,
    pub bundles: Vec<SceneBundle>,
    pub selection_color: Color32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Mutex;

    fn node(name: &str, x: f32) -> SceneNode {
        let bounds = Rect::from_min_size(Pos2::new(x, 0.0), Vec2::new(40.0, 20.0));
        SceneNode {
            name: name.to_string(),
            role: NodeRole::Plain,
            polygon: vec![
                bounds.left_top(),
                bounds.right_top(),
                bounds.right_bottom(),
                bounds.left_bottom(),
            ],
            bounds,
            label: name.to_string(),
            description: None,
            fill: Color32::GRAY,
            stroke: Stroke::new(1.0, Color32::BLACK),
            role_stroke: Stroke::new(1.0, Color32::BLACK),
            selected: false,
        }
    }

    fn scene(names: &[&str]) -> Scene {
        let mut scene = Scene::default();
        scene.replace_content(SceneContent {
            name: "test".into(),
            nodes: names
                .iter()
                .enumerate()
                .map(|(i, n)| node(n, i as f32 * 100.0))
                .collect(),
            selection_color: Color32::YELLOW,
            ..Default::default()
        });
        scene
    }

    #[test]
    fn test_click_selects_and_clears() {
        let mut s = scene(&["a", "b"]);
        assert!(s.click_at(Pos2::new(10.0, 10.0), false));
        assert!(s.click_at(Pos2::new(110.0, 10.0), true));
        assert_eq!(s.selection(), vec!["a", "b"]);

        // Empty canvas with add held keeps the selection.
        assert!(!s.click_at(Pos2::new(60.0, 10.0), true));
        assert_eq!(s.selection().len(), 2);

        assert!(s.click_at(Pos2::new(60.0, 10.0), false));
        assert!(s.selection().is_empty());
        assert!(!s.click_at(Pos2::new(60.0, 10.0), false));
    }

    #[test]
    fn test_select_replaces_without_add() {
        let mut s = scene(&["a", "b", "c"]);
        s.select("a", false).unwrap();
        s.select("b", true).unwrap();
        assert_eq!(s.selection(), vec!["a", "b"]);
        s.select("c", false).unwrap();
        assert_eq!(s.selection(), vec!["c"]);
        assert!(s.node("c").unwrap().selected);
        assert!(!s.node("a").unwrap().selected);
        assert_eq!(s.node("c").unwrap().stroke.color, Color32::YELLOW);
        assert_eq!(s.node("a").unwrap().stroke, s.node("a").unwrap().role_stroke);
    }

    #[test]
    fn test_add_already_selected_is_noop() {
        let mut s = scene(&["a", "b"]);
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        s.selection_channel().subscribe(Arc::new(move |e: &SelectionChanged| {
            sink.lock().unwrap().push(e.selected.clone());
        }));

        assert!(s.select("a", true).unwrap());
        assert!(!s.select("a", true).unwrap());
        assert!(!s.select("a", false).unwrap());
        assert_eq!(events.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_unknown_node_rejected() {
        let mut s = scene(&["a"]);
        assert!(matches!(s.select("zzz", false), Err(RenderError::UnknownNode(_))));
        assert!(s.selection().is_empty());
        assert!(s.jump_to("zzz").is_err());
    }

    #[test]
    fn test_replace_content_drops_vanished_selection() {
        let mut s = scene(&["a", "b"]);
        s.select("a", false).unwrap();
        s.select("b", true).unwrap();
        let count = Arc::new(Mutex::new(0));
        let c = count.clone();
        s.selection_channel()
            .subscribe(Arc::new(move |_: &SelectionChanged| *c.lock().unwrap() += 1));
        s.viewport_mut().zoom_in();
        let zoom = s.viewport().zoom();

        s.replace_content(SceneContent {
            name: "next".into(),
            nodes: vec![node("b", 0.0)],
            ..Default::default()
        });
        assert_eq!(s.selection(), vec!["b"]);
        assert_eq!(*count.lock().unwrap(), 1);
        assert_eq!(s.viewport().zoom(), zoom);
        assert!(s.node("b").unwrap().selected);
    }

    #[test]
    fn test_node_at_uses_outline() {
        let s = scene(&["a", "b"]);
        assert_eq!(s.node_at(Pos2::new(10.0, 10.0)).map(|n| n.name.as_str()), Some("a"));
        assert_eq!(s.node_at(Pos2::new(110.0, 10.0)).map(|n| n.name.as_str()), Some("b"));
        assert!(s.node_at(Pos2::new(70.0, 10.0)).is_none());
    }

    #[test]
    fn test_jump_is_deferred_to_paint() {
        let mut s = scene(&["a", "b"]);
        s.jump_to("b").unwrap();
        assert_eq!(s.viewport().pan(), Vec2::ZERO);
        let view = Rect::from_min_size(Pos2::new(5.0, 5.0), Vec2::new(400.0, 300.0));
        assert!(s.viewport_mut().apply_pending_focus(view));
        let center = s.node("b").unwrap().bounds.center();
        assert_eq!(s.viewport().to_screen(center, view.min), view.center());
        assert!(!s.viewport_mut().apply_pending_focus(view));
    }

    #[test]
    fn test_coordinate_transforms_invert() {
        let mut vp = Viewport::default();
        vp.zoom_in();
        vp.zoom_in();
        vp.pan_by(Vec2::new(13.0, -7.0));
        let origin = Pos2::new(50.0, 20.0);
        let p = Pos2::new(120.0, 80.0);
        let back = vp.to_scene(vp.to_screen(p, origin), origin);
        assert!((back - p).length() < 1e-3);
    }

    #[test]
    fn test_zoom_anchor_stays_put() {
        let mut vp = Viewport::default();
        let origin = Pos2::ZERO;
        let anchor = Pos2::new(200.0, 100.0);
        let before = vp.to_scene(anchor, origin);
        vp.zoom_steps_at(3, anchor, origin);
        assert!((vp.to_scene(anchor, origin) - before).length() < 1e-3);
    }

    #[test]
    fn test_zoom_saturates_and_resets() {
        let mut vp = Viewport::default();
        for _ in 0..100 {
            vp.zoom_in();
        }
        assert_eq!(vp.zoom(), MAX_ZOOM);
        vp.zoom_in();
        assert_eq!(vp.zoom(), MAX_ZOOM);
        vp.reset_zoom();
        assert_eq!(vp.zoom(), 1.0);
    }

    proptest! {
        #[test]
        fn prop_zoom_stays_in_range(steps in proptest::collection::vec(-3i32..=3, 0..200)) {
            let mut vp = Viewport::default();
            for step in steps {
                match step {
                    0 => vp.reset_zoom(),
                    s if s > 0 => vp.zoom_in(),
                    _ => vp.zoom_out(),
                }
                prop_assert!(vp.zoom() >= MIN_ZOOM && vp.zoom() <= MAX_ZOOM);
            }
        }

        #[test]
        fn prop_select_without_add_leaves_one(picks in proptest::collection::vec((0usize..4, any::<bool>()), 1..40)) {
            let names = ["a", "b", "c", "d"];
            let mut s = scene(&names);
            for (i, add) in picks {
                s.select(names[i], add).unwrap();
                if !add {
                    prop_assert_eq!(s.selection(), vec![names[i].to_string()]);
                }
                prop_assert!(s.selection().iter().all(|n| s.node(n).is_some()));
            }
        }
    }
}
