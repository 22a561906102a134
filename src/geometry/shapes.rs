//! Silhouettes in their local frame: centred on the origin, unrotated.
//!
//! Rectangles, circles and ellipses have closed-form containment and ray
//! exits. Lines and sampled curves only answer containment; callers fall
//! back to bisection for their boundary.

use enum_dispatch::enum_dispatch;
use glam::{DVec2, dvec2};

use super::{point_in_polygon, point_to_segment_dist};

/// How close to a line counts as "on" it.
pub const LINE_TOLERANCE: f64 = 1e-6;

/// Samples used when an ellipse has to be treated as a polygon.
const OUTLINE_SAMPLES: usize = 64;

#[enum_dispatch]
pub trait Silhouette {
    /// Inside test for a point relative to the centre.
    fn contains_local(&self, p: DVec2, strict: bool) -> bool;

    /// Where the ray `from + t·dir` (t > 0) leaves the shape, for an interior
    /// `from`. `None` when there is no closed form.
    fn exit_local(&self, from: DVec2, dir: DVec2) -> Option<DVec2>;

    /// Outline vertices relative to the centre.
    fn outline_local(&self) -> Vec<DVec2>;

    /// Scale applied to diagonal anchors; round shapes put them on the perimeter.
    fn diagonal_factor(&self) -> f64 {
        1.0
    }

    /// Whether the outline encloses an area.
    fn is_closed(&self) -> bool {
        true
    }
}

#[enum_dispatch(Silhouette)]
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Rect(RectShape),
    Circle(CircleShape),
    Ellipse(EllipseShape),
    Line(LineShape),
    Curve(CurveShape),
}

impl Shape {
    pub fn name(&self) -> &'static str {
        match self {
            Shape::Rect(_) => "rectangle",
            Shape::Circle(_) => "circle",
            Shape::Ellipse(_) => "ellipse",
            Shape::Line(_) => "line",
            Shape::Curve(_) => "curve",
        }
    }
}

// ============================================================================
// Closed shapes
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct RectShape {
    pub half: DVec2,
}

impl Silhouette for RectShape {
    fn contains_local(&self, p: DVec2, strict: bool) -> bool {
        let (x, y) = (p.x.abs(), p.y.abs());
        if strict {
            x < self.half.x && y < self.half.y
        } else {
            x <= self.half.x && y <= self.half.y
        }
    }

    fn exit_local(&self, from: DVec2, dir: DVec2) -> Option<DVec2> {
        // slab method: the nearest face the ray reaches going forward
        let mut t_exit = f64::INFINITY;
        for (p, d, h) in [(from.x, dir.x, self.half.x), (from.y, dir.y, self.half.y)] {
            if d > 0.0 {
                t_exit = t_exit.min((h - p) / d);
            } else if d < 0.0 {
                t_exit = t_exit.min((-h - p) / d);
            }
        }
        t_exit.is_finite().then(|| from + dir * t_exit)
    }

    fn outline_local(&self) -> Vec<DVec2> {
        let h = self.half;
        vec![
            dvec2(-h.x, -h.y),
            dvec2(h.x, -h.y),
            dvec2(h.x, h.y),
            dvec2(-h.x, h.y),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CircleShape {
    pub radius: f64,
}

impl Silhouette for CircleShape {
    fn contains_local(&self, p: DVec2, strict: bool) -> bool {
        let d = p.length_squared();
        let r = self.radius * self.radius;
        if strict { d < r } else { d <= r }
    }

    fn exit_local(&self, from: DVec2, dir: DVec2) -> Option<DVec2> {
        ellipse_exit(dvec2(self.radius, self.radius), from, dir)
    }

    fn outline_local(&self) -> Vec<DVec2> {
        ellipse_outline(dvec2(self.radius, self.radius))
    }

    fn diagonal_factor(&self) -> f64 {
        std::f64::consts::FRAC_1_SQRT_2
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EllipseShape {
    pub radii: DVec2,
}

impl Silhouette for EllipseShape {
    fn contains_local(&self, p: DVec2, strict: bool) -> bool {
        if self.radii.x <= 0.0 || self.radii.y <= 0.0 {
            return !strict && p == DVec2::ZERO;
        }
        let q = p / self.radii;
        let v = q.length_squared();
        if strict { v < 1.0 } else { v <= 1.0 }
    }

    fn exit_local(&self, from: DVec2, dir: DVec2) -> Option<DVec2> {
        ellipse_exit(self.radii, from, dir)
    }

    fn outline_local(&self) -> Vec<DVec2> {
        ellipse_outline(self.radii)
    }

    fn diagonal_factor(&self) -> f64 {
        std::f64::consts::FRAC_1_SQRT_2
    }
}

/// Larger root of |(from + t·dir) / radii| = 1.
fn ellipse_exit(radii: DVec2, from: DVec2, dir: DVec2) -> Option<DVec2> {
    if radii.x <= 0.0 || radii.y <= 0.0 || dir == DVec2::ZERO {
        return None;
    }
    let p = from / radii;
    let d = dir / radii;
    let a = d.length_squared();
    let b = 2.0 * p.dot(d);
    let c = p.length_squared() - 1.0;
    let disc = b * b - 4.0 * a * c;
    if disc < 0.0 {
        return None;
    }
    let t = (-b + disc.sqrt()) / (2.0 * a);
    (t >= 0.0).then(|| from + dir * t)
}

fn ellipse_outline(radii: DVec2) -> Vec<DVec2> {
    (0..OUTLINE_SAMPLES)
        .map(|i| {
            let theta = std::f64::consts::TAU * i as f64 / OUTLINE_SAMPLES as f64;
            dvec2(radii.x * theta.cos(), radii.y * theta.sin())
        })
        .collect()
}

// ============================================================================
// Open shapes
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct LineShape {
    pub from: DVec2,
    pub to: DVec2,
}

impl Silhouette for LineShape {
    fn contains_local(&self, p: DVec2, strict: bool) -> bool {
        !strict && point_to_segment_dist(p, self.from, self.to) <= LINE_TOLERANCE
    }

    fn exit_local(&self, _from: DVec2, _dir: DVec2) -> Option<DVec2> {
        None
    }

    fn outline_local(&self) -> Vec<DVec2> {
        vec![self.from, self.to]
    }

    fn is_closed(&self) -> bool {
        false
    }
}

/// Sampled polyline; the area is the polygon closed by the chord.
#[derive(Debug, Clone, PartialEq)]
pub struct CurveShape {
    pub points: Vec<DVec2>,
}

impl Silhouette for CurveShape {
    fn contains_local(&self, p: DVec2, strict: bool) -> bool {
        let on_boundary = self
            .points
            .windows(2)
            .any(|w| point_to_segment_dist(p, w[0], w[1]) <= LINE_TOLERANCE);
        if on_boundary {
            return !strict;
        }
        point_in_polygon(p, &self.points)
    }

    fn exit_local(&self, _from: DVec2, _dir: DVec2) -> Option<DVec2> {
        None
    }

    fn outline_local(&self) -> Vec<DVec2> {
        self.points.clone()
    }

    fn is_closed(&self) -> bool {
        false
    }
}
