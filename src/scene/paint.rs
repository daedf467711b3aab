//! Painting and pointer interaction for a [`Scene`].
//!
//! - Click on a node selects it; shift or ctrl/cmd adds to the selection
//! - Click on empty canvas clears the selection
//! - Drag pans, scroll zooms one step per notch around the pointer
//!
//! Pending "jump to node" requests are applied before anything is drawn.

use super::{Scene, SceneEdge};
use egui::{Align2, Color32, FontId, PointerButton, Pos2, Sense, Shape, Stroke, Ui, Vec2};

const BACKGROUND: Color32 = Color32::from_gray(30);
const DASH_LENGTH: f32 = 6.0;
const DASH_GAP: f32 = 4.0;

/// What happened during one paint.
pub struct PaintOutput {
    pub response: egui::Response,
    /// Node under the pointer, if any.
    pub hovered: Option<String>,
}

/// Paint `scene` into the remaining space of `ui`.
pub fn show(ui: &mut Ui, scene: &mut Scene, font_size: f32) -> PaintOutput {
    let size = ui.available_size_before_wrap();
    let (response, painter) = ui.allocate_painter(size, Sense::click_and_drag());
    let canvas = response.rect;
    painter.rect_filled(canvas, 0.0, BACKGROUND);

    scene.viewport_mut().apply_pending_focus(canvas);

    if response.dragged_by(PointerButton::Primary) || response.dragged_by(PointerButton::Middle) {
        scene.pan_by(response.drag_delta());
    }

    if let Some(pointer) = response.hover_pos() {
        let scroll = ui.input(|i| i.raw_scroll_delta.y);
        if scroll != 0.0 {
            let steps = if scroll > 0.0 { 1 } else { -1 };
            scene.viewport_mut().zoom_steps_at(steps, pointer, canvas.min);
        }
    }

    if response.clicked() {
        if let Some(pointer) = response.interact_pointer_pos() {
            let add = ui.input(|i| i.modifiers.shift || i.modifiers.command);
            let at = scene.viewport().to_scene(pointer, canvas.min);
            scene.click_at(at, add);
        }
    }

    let viewport = *scene.viewport();
    let zoom = viewport.zoom();
    let to_screen = |p: Pos2| viewport.to_screen(p, canvas.min);
    let scaled = |s: Stroke| Stroke::new(s.width * zoom, s.color);
    let painter = painter.with_clip_rect(canvas);

    for edge in scene.edges() {
        paint_edge(&painter, edge, &to_screen, scaled(edge.stroke), font_size * zoom);
    }

    for bundle in scene.bundles() {
        let points: Vec<Pos2> = bundle.points.iter().map(|&p| to_screen(p)).collect();
        painter.add(Shape::line(points, scaled(bundle.stroke)));
        painter.add(Shape::convex_polygon(
            bundle.arrow.iter().map(|&p| to_screen(p)).collect(),
            bundle.stroke.color,
            Stroke::NONE,
        ));
        if let Some(&anchor) = bundle.points.first() {
            painter.text(
                to_screen(anchor) + Vec2::new(6.0, 0.0),
                Align2::LEFT_CENTER,
                &bundle.label,
                FontId::proportional(font_size * 0.85 * zoom),
                bundle.stroke.color,
            );
        }
    }

    for node in scene.nodes() {
        let points: Vec<Pos2> = node.polygon.iter().map(|&p| to_screen(p)).collect();
        painter.add(Shape::convex_polygon(points, node.fill, scaled(node.stroke)));
        painter.text(
            to_screen(node.bounds.center()),
            Align2::CENTER_CENTER,
            &node.label,
            FontId::proportional(font_size * zoom),
            node.role_stroke.color,
        );
    }

    let hovered = response
        .hover_pos()
        .and_then(|p| scene.node_at(viewport.to_scene(p, canvas.min)))
        .map(|n| n.name.clone());

    PaintOutput { response, hovered }
}

fn paint_edge(
    painter: &egui::Painter,
    edge: &SceneEdge,
    to_screen: &impl Fn(Pos2) -> Pos2,
    stroke: Stroke,
    font_size: f32,
) {
    let points: Vec<Pos2> = edge.points.iter().map(|&p| to_screen(p)).collect();
    if edge.dashed {
        painter.extend(Shape::dashed_line(&points, stroke, DASH_LENGTH, DASH_GAP));
    } else {
        painter.add(Shape::line(points.clone(), stroke));
    }
    painter.add(Shape::convex_polygon(
        edge.arrow.iter().map(|&p| to_screen(p)).collect(),
        stroke.color,
        Stroke::NONE,
    ));
    if let Some(label) = &edge.label {
        if let Some(&mid) = points.get(points.len() / 2) {
            painter.text(
                mid + Vec2::new(4.0, 0.0),
                Align2::LEFT_CENTER,
                label,
                FontId::proportional(font_size * 0.85),
                stroke.color,
            );
        }
    }
}
