//! Bounding boxes: concrete footprint of a resolved object.

use glam::{DVec2, dvec2};

use crate::model::Anchor;
use crate::settings::defaults::BISECT_TOLERANCE;
use crate::types::Angle;

use super::Rect;
use super::shapes::{
    CircleShape, CurveShape, EllipseShape, LineShape, RectShape, Shape, Silhouette,
};

/// Hard stop for bisection; the tolerance is normally reached in ~30 steps.
const MAX_BISECT_STEPS: usize = 200;

#[derive(Debug, Clone, PartialEq)]
pub struct BoundingBox {
    pub shape: Shape,
    /// Lower-left corner of the unrotated footprint.
    pub origin: DVec2,
    pub width: f64,
    pub height: f64,
    pub rotation: Angle,
    pub pivot: DVec2,
}

impl BoundingBox {
    fn centred(shape: Shape, center: DVec2, width: f64, height: f64) -> Self {
        BoundingBox {
            shape,
            origin: center - dvec2(width, height) / 2.0,
            width,
            height,
            rotation: Angle::ZERO,
            pivot: center,
        }
    }

    pub fn rect(center: DVec2, width: f64, height: f64) -> Self {
        let shape = RectShape {
            half: dvec2(width, height) / 2.0,
        };
        Self::centred(shape.into(), center, width, height)
    }

    pub fn circle(center: DVec2, radius: f64) -> Self {
        Self::centred(CircleShape { radius }.into(), center, 2.0 * radius, 2.0 * radius)
    }

    pub fn ellipse(center: DVec2, width: f64, height: f64) -> Self {
        let shape = EllipseShape {
            radii: dvec2(width, height) / 2.0,
        };
        Self::centred(shape.into(), center, width, height)
    }

    pub fn line(from: DVec2, to: DVec2) -> Self {
        let center = (from + to) / 2.0;
        let size = (to - from).abs();
        let shape = LineShape {
            from: from - center,
            to: to - center,
        };
        Self::centred(shape.into(), center, size.x, size.y)
    }

    /// Sampled polyline; `None` for fewer than two points.
    pub fn curve(points: &[DVec2]) -> Option<Self> {
        if points.len() < 2 {
            return None;
        }
        let (min, max) = points
            .iter()
            .fold((points[0], points[0]), |(lo, hi), &p| (lo.min(p), hi.max(p)));
        let center = (min + max) / 2.0;
        let shape = CurveShape {
            points: points.iter().map(|&p| p - center).collect(),
        };
        let size = max - min;
        Some(Self::centred(shape.into(), center, size.x, size.y))
    }

    /// Rotate rigidly about the pivot (the centre unless changed).
    pub fn rotated(self, rotation: Angle) -> Self {
        BoundingBox { rotation, ..self }
    }

    fn unrotated_center(&self) -> DVec2 {
        self.origin + dvec2(self.width, self.height) / 2.0
    }

    fn rotate_about_pivot(&self, p: DVec2, angle: Angle) -> DVec2 {
        if angle.0 == 0.0 {
            return p;
        }
        self.pivot + angle.unit().rotate(p - self.pivot)
    }

    /// Local (centred, unrotated) → world.
    pub fn to_world(&self, local: DVec2) -> DVec2 {
        self.rotate_about_pivot(self.unrotated_center() + local, self.rotation)
    }

    /// World → local (centred, unrotated).
    pub fn to_local(&self, world: DVec2) -> DVec2 {
        self.rotate_about_pivot(world, Angle(-self.rotation.0)) - self.unrotated_center()
    }

    pub fn center(&self) -> DVec2 {
        self.to_world(DVec2::ZERO)
    }

    pub fn anchor(&self, anchor: Anchor) -> DVec2 {
        let unit = anchor.unit();
        let factor = if anchor.is_diagonal() {
            self.shape.diagonal_factor()
        } else {
            1.0
        };
        let local = dvec2(unit.x * self.width / 2.0, unit.y * self.height / 2.0) * factor;
        self.to_world(local)
    }

    pub fn contains(&self, p: DVec2, strict: bool) -> bool {
        self.shape.contains_local(self.to_local(p), strict)
    }

    /// The sampled polyline of a curve (or a line's two ends), in world space.
    pub fn samples(&self) -> Vec<DVec2> {
        match &self.shape {
            Shape::Curve(c) => c.points.iter().map(|&p| self.to_world(p)).collect(),
            Shape::Line(l) => vec![self.to_world(l.from), self.to_world(l.to)],
            _ => Vec::new(),
        }
    }

    /// Where a ray from the centre towards `toward` first leaves the shape.
    pub fn boundary_point(&self, toward: DVec2) -> Option<DVec2> {
        let center = self.center();
        let dir = toward - center;
        if dir.length_squared() == 0.0 {
            return None;
        }
        let local_dir = self.to_local(toward) - self.to_local(center);
        if let Some(exit) = self.shape.exit_local(DVec2::ZERO, local_dir) {
            return Some(self.to_world(exit));
        }
        let reach = self.width + self.height + 1.0;
        let outside = center + dir.normalize() * reach;
        Some(self.bisect(center, outside))
    }

    /// Clip the segment `inner → outer` to this silhouette.
    ///
    /// Returns `inner` unchanged when it is not inside, `None` when both ends
    /// are inside, and the boundary crossing otherwise.
    pub fn clip_segment(&self, inner: DVec2, outer: DVec2) -> Option<DVec2> {
        if !self.contains(inner, false) {
            return Some(inner);
        }
        if self.contains(outer, false) {
            return None;
        }
        let from = self.to_local(inner);
        let dir = self.to_local(outer) - from;
        if let Some(exit) = self.shape.exit_local(from, dir) {
            return Some(self.to_world(exit));
        }
        Some(self.bisect(inner, outer))
    }

    /// Halve `inside → outside` until its squared length drops below the
    /// tolerance, then return the exterior end.
    pub fn bisect(&self, mut inside: DVec2, mut outside: DVec2) -> DVec2 {
        let mut steps = 0;
        while (outside - inside).length_squared() >= BISECT_TOLERANCE && steps < MAX_BISECT_STEPS {
            let mid = (inside + outside) / 2.0;
            if self.contains(mid, false) {
                inside = mid;
            } else {
                outside = mid;
            }
            steps += 1;
        }
        outside
    }

    /// Outline in world space.
    pub fn outline(&self) -> Vec<DVec2> {
        self.shape
            .outline_local()
            .into_iter()
            .map(|p| self.to_world(p))
            .collect()
    }

    /// Axis-aligned extent of the (possibly rotated) outline.
    pub fn extent(&self) -> Rect {
        let outline = self.outline();
        let first = outline.first().copied().unwrap_or_else(|| self.center());
        outline.iter().fold(Rect::from_corners(first, first), |r, &p| Rect {
            min: r.min.min(p),
            max: r.max.max(p),
        })
    }

    /// Marquee selection test.
    pub fn intersects_rect(&self, rect: Rect) -> bool {
        match &self.shape {
            Shape::Circle(c) => {
                let center = self.center();
                rect.contains(center)
                    || rect
                        .edges()
                        .iter()
                        .any(|&(a, b)| super::point_to_segment_dist(center, a, b) <= c.radius)
            }
            shape => {
                let closed = shape.is_closed();
                if super::polyline_intersects_rect(&self.outline(), closed, rect) {
                    return true;
                }
                closed && rect.corners().iter().any(|&p| self.contains(p, false))
            }
        }
    }
}
