//! Path geometry emitted by layout engines.

use egui::{Pos2, Rect, Vec2};

/// Kappa for approximating a quarter ellipse with one cubic.
const KAPPA: f32 = 0.552_284_8;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathSegment {
    LineTo(Pos2),
    /// Cubic Bézier: two control points, then the end point.
    CubicTo(Pos2, Pos2, Pos2),
}

impl PathSegment {
    pub fn end(&self) -> Pos2 {
        match *self {
            PathSegment::LineTo(p) => p,
            PathSegment::CubicTo(_, _, p) => p,
        }
    }

    pub fn is_curved(&self) -> bool {
        matches!(self, PathSegment::CubicTo(..))
    }
}

/// A possibly curved path. Closed curves return to `start`.
#[derive(Debug, Clone, PartialEq)]
pub struct Curve {
    pub start: Pos2,
    pub segments: Vec<PathSegment>,
    pub closed: bool,
}

impl Curve {
    pub fn open(start: Pos2) -> Self {
        Self {
            start,
            segments: Vec::new(),
            closed: false,
        }
    }

    pub fn line_to(mut self, p: Pos2) -> Self {
        self.segments.push(PathSegment::LineTo(p));
        self
    }

    pub fn cubic_to(mut self, c1: Pos2, c2: Pos2, p: Pos2) -> Self {
        self.segments.push(PathSegment::CubicTo(c1, c2, p));
        self
    }

    pub fn close(mut self) -> Self {
        self.closed = true;
        self
    }

    /// Closed polygon through `points`.
    pub fn polygon(points: &[Pos2]) -> Self {
        let mut curve = Curve::open(points.first().copied().unwrap_or(Pos2::ZERO));
        for &p in points.iter().skip(1) {
            curve = curve.line_to(p);
        }
        curve.close()
    }

    pub fn end(&self) -> Pos2 {
        self.segments.last().map(|s| s.end()).unwrap_or(self.start)
    }

    pub fn is_curved(&self) -> bool {
        self.segments.iter().any(PathSegment::is_curved)
    }

    pub fn rect(rect: Rect) -> Self {
        Curve::polygon(&[
            rect.left_top(),
            rect.right_top(),
            rect.right_bottom(),
            rect.left_bottom(),
        ])
    }

    pub fn rounded_rect(rect: Rect, radius: f32) -> Self {
        let r = radius.min(rect.width() / 2.0).min(rect.height() / 2.0).max(0.0);
        let k = r * (1.0 - KAPPA);
        let (l, t, rt, b) = (rect.left(), rect.top(), rect.right(), rect.bottom());
        Curve::open(Pos2::new(l + r, t))
            .line_to(Pos2::new(rt - r, t))
            .cubic_to(Pos2::new(rt - k, t), Pos2::new(rt, t + k), Pos2::new(rt, t + r))
            .line_to(Pos2::new(rt, b - r))
            .cubic_to(Pos2::new(rt, b - k), Pos2::new(rt - k, b), Pos2::new(rt - r, b))
            .line_to(Pos2::new(l + r, b))
            .cubic_to(Pos2::new(l + k, b), Pos2::new(l, b - k), Pos2::new(l, b - r))
            .line_to(Pos2::new(l, t + r))
            .cubic_to(Pos2::new(l, t + k), Pos2::new(l + k, t), Pos2::new(l + r, t))
            .close()
    }

    pub fn ellipse(rect: Rect) -> Self {
        let c = rect.center();
        let Vec2 { x: rx, y: ry } = rect.size() / 2.0;
        let (kx, ky) = (rx * KAPPA, ry * KAPPA);
        Curve::open(Pos2::new(c.x + rx, c.y))
            .cubic_to(
                Pos2::new(c.x + rx, c.y + ky),
                Pos2::new(c.x + kx, c.y + ry),
                Pos2::new(c.x, c.y + ry),
            )
            .cubic_to(
                Pos2::new(c.x - kx, c.y + ry),
                Pos2::new(c.x - rx, c.y + ky),
                Pos2::new(c.x - rx, c.y),
            )
            .cubic_to(
                Pos2::new(c.x - rx, c.y - ky),
                Pos2::new(c.x - kx, c.y - ry),
                Pos2::new(c.x, c.y - ry),
            )
            .cubic_to(
                Pos2::new(c.x + kx, c.y - ry),
                Pos2::new(c.x + rx, c.y - ky),
                Pos2::new(c.x + rx, c.y),
            )
            .close()
    }

    pub fn octagon(rect: Rect) -> Self {
        let cut = rect.width().min(rect.height()) * 0.25;
        let (l, t, r, b) = (rect.left(), rect.top(), rect.right(), rect.bottom());
        Curve::polygon(&[
            Pos2::new(l + cut, t),
            Pos2::new(r - cut, t),
            Pos2::new(r, t + cut),
            Pos2::new(r, b - cut),
            Pos2::new(r - cut, b),
            Pos2::new(l + cut, b),
            Pos2::new(l, b - cut),
            Pos2::new(l, t + cut),
        ])
    }

    pub fn diamond(rect: Rect) -> Self {
        Curve::polygon(&[
            rect.center_top(),
            rect.right_center(),
            rect.center_bottom(),
            rect.left_center(),
        ])
    }
}
