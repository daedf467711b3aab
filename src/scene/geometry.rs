//! Curve flattening and small polygon helpers.

use crate::layout::{Curve, PathSegment};
use egui::epaint::CubicBezierShape;
use egui::{Color32, Pos2, Stroke, Vec2};

/// Maximum distance between a flattened polyline and the true curve, in
/// scene units.
pub const FLATNESS_TOLERANCE: f32 = 0.5;

/// Upper bound on the points of one flattened curve.
pub const MAX_CURVE_POINTS: usize = 512;

/// Flatten `curve` into an ordered point list.
///
/// Straight segments contribute their end point; cubic segments are sampled at
/// [`FLATNESS_TOLERANCE`]. Consecutive duplicates are dropped and the result is
/// decimated down to [`MAX_CURVE_POINTS`], keeping both end points. A closed
/// curve does not repeat its start point at the end.
pub fn flatten(curve: &Curve) -> Vec<Pos2> {
    let mut points = vec![curve.start];
    let mut cursor = curve.start;
    for segment in &curve.segments {
        match *segment {
            PathSegment::LineTo(p) => push_distinct(&mut points, p),
            PathSegment::CubicTo(c1, c2, p) => {
                let shape = CubicBezierShape::from_points_stroke(
                    [cursor, c1, c2, p],
                    false,
                    Color32::TRANSPARENT,
                    Stroke::NONE,
                );
                // The flattened list starts with `cursor`, already present.
                for q in shape.flatten(Some(FLATNESS_TOLERANCE)).into_iter().skip(1) {
                    push_distinct(&mut points, q);
                }
            }
        }
        cursor = segment.end();
    }
    if curve.closed && points.len() > 1 && points.last() == points.first() {
        points.pop();
    }
    decimate(points, MAX_CURVE_POINTS)
}

fn push_distinct(points: &mut Vec<Pos2>, p: Pos2) {
    if points.last() != Some(&p) {
        points.push(p);
    }
}

fn decimate(points: Vec<Pos2>, max: usize) -> Vec<Pos2> {
    if points.len() <= max || max < 2 {
        return points;
    }
    let last = points.len() - 1;
    let step = last as f32 / (max - 1) as f32;
    (0..max)
        .map(|i| points[((i as f32 * step).round() as usize).min(last)])
        .collect()
}

/// Even-odd point-in-polygon test.
pub fn polygon_contains(polygon: &[Pos2], p: Pos2) -> bool {
    if polygon.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = polygon.len() - 1;
    for i in 0..polygon.len() {
        let (a, b) = (polygon[i], polygon[j]);
        if (a.y > p.y) != (b.y > p.y) && p.x < (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Filled arrowhead at `tip`, pointing along the direction `from -> tip`.
pub fn arrow_head(from: Pos2, tip: Pos2, length: f32, width: f32) -> [Pos2; 3] {
    let dir = (tip - from).normalized();
    let dir = if dir.is_finite() && dir != Vec2::ZERO {
        dir
    } else {
        Vec2::DOWN
    };
    let base = tip - dir * length;
    let normal = dir.rot90() * (width / 2.0);
    [tip, base + normal, base - normal]
}
