//! Geometry: bounding boxes, silhouettes and relationship resolution.
//!
//! - `shapes`: per-silhouette containment, ray exits and outlines
//! - `bbox`: [`BoundingBox`] with anchors, rotation, clipping, marquee tests
//! - `measure`: text measurement and its memo cache
//! - `resolve`: turns the scene graph into a [`ResolvedMap`]

pub mod bbox;
pub mod measure;
pub mod resolve;
pub mod shapes;

pub use bbox::BoundingBox;
pub use measure::{CharWidthMeasurer, MeasureCache, TextMeasurer, TextStyle};
pub use resolve::{ResolvedMap, Resolver, resolve_all};
pub use shapes::{Shape, Silhouette};

use glam::{DVec2, dvec2};

/// Axis-aligned rectangle, used for marquee selection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub min: DVec2,
    pub max: DVec2,
}

impl Rect {
    /// Rectangle spanned by two arbitrary corners.
    pub fn from_corners(a: DVec2, b: DVec2) -> Self {
        Rect {
            min: a.min(b),
            max: a.max(b),
        }
    }

    pub fn contains(&self, p: DVec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    pub fn corners(&self) -> [DVec2; 4] {
        [
            self.min,
            dvec2(self.max.x, self.min.y),
            self.max,
            dvec2(self.min.x, self.max.y),
        ]
    }

    pub fn edges(&self) -> [(DVec2, DVec2); 4] {
        let c = self.corners();
        [(c[0], c[1]), (c[1], c[2]), (c[2], c[3]), (c[3], c[0])]
    }
}

/// Distance from a point to a line segment (a→b).
pub fn point_to_segment_dist(point: DVec2, a: DVec2, b: DVec2) -> f64 {
    let seg = b - a;
    let pv = point - a;
    let len_sq = seg.length_squared();
    if len_sq < f64::EPSILON {
        return pv.length();
    }
    let t = (pv.dot(seg) / len_sq).clamp(0.0, 1.0);
    point.distance(a + seg * t)
}

/// Test if two line segments (a-b) and (c-d) intersect.
pub fn segments_intersect(a: DVec2, b: DVec2, c: DVec2, d: DVec2) -> bool {
    let cross = |o: DVec2, p: DVec2, q: DVec2| (p - o).perp_dot(q - o);
    let d1 = cross(c, d, a);
    let d2 = cross(c, d, b);
    let d3 = cross(a, b, c);
    let d4 = cross(a, b, d);
    if ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
    {
        return true;
    }
    // collinear: an endpoint lies on the other segment
    let on_segment = |p: DVec2, q: DVec2, r: DVec2| {
        r.x >= p.x.min(q.x) && r.x <= p.x.max(q.x) && r.y >= p.y.min(q.y) && r.y <= p.y.max(q.y)
    };
    (d1.abs() < 1e-10 && on_segment(c, d, a))
        || (d2.abs() < 1e-10 && on_segment(c, d, b))
        || (d3.abs() < 1e-10 && on_segment(a, b, c))
        || (d4.abs() < 1e-10 && on_segment(a, b, d))
}

/// Even-odd point-in-polygon test. The polygon is implicitly closed.
pub fn point_in_polygon(p: DVec2, polygon: &[DVec2]) -> bool {
    let n = polygon.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (a, b) = (polygon[i], polygon[j]);
        if (a.y > p.y) != (b.y > p.y) {
            let x = a.x + (p.y - a.y) * (b.x - a.x) / (b.y - a.y);
            if p.x < x {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Does a polyline touch a rectangle? Vertex containment or edge crossing.
pub fn polyline_intersects_rect(points: &[DVec2], closed: bool, rect: Rect) -> bool {
    if points.iter().any(|&p| rect.contains(p)) {
        return true;
    }
    let edges = rect.edges();
    let crosses = |a: DVec2, b: DVec2| edges.iter().any(|&(c, d)| segments_intersect(a, b, c, d));
    if points.windows(2).any(|w| crosses(w[0], w[1])) {
        return true;
    }
    match (closed, points.first(), points.last()) {
        (true, Some(&first), Some(&last)) if points.len() > 2 => crosses(last, first),
        _ => false,
    }
}
