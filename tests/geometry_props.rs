//! Property tests for resolved geometry.
//!
//! 1. Opposite side anchors of an upright box are exactly width/height apart.
//! 2. Rotation is rigid: distances between anchors survive it.
//! 3. Clipping leaves an outside start point alone.
//! 4. Clipping a segment that never leaves the shape yields nothing.
//! 5. A clipped point lies between the segment's ends.
//! 6. Sampled curves start and end on their end control points.

use diagrammar::draw::curve;
use diagrammar::model::Anchor;
use diagrammar::types::Angle;
use diagrammar::BoundingBox;
use glam::{DVec2, dvec2};
use proptest::prelude::*;

const EPS: f64 = 1e-7;

fn point() -> impl Strategy<Value = DVec2> {
    (-100.0f64..100.0, -100.0f64..100.0).prop_map(|(x, y)| dvec2(x, y))
}

fn bbox() -> impl Strategy<Value = BoundingBox> {
    (point(), 0.1f64..50.0, 0.1f64..50.0, -360.0f64..360.0)
        .prop_map(|(c, w, h, rot)| BoundingBox::rect(c, w, h).rotated(Angle(rot)))
}

/// A point strictly inside `b`, picked by fractions of its half-extents.
fn inside(b: &BoundingBox, fx: f64, fy: f64) -> DVec2 {
    b.to_world(dvec2(fx * b.width * 0.4, fy * b.height * 0.4))
}

/// A point well beyond `b`'s circumscribed circle.
fn outside(b: &BoundingBox, degrees: f64) -> DVec2 {
    b.center() + Angle(degrees).unit() * (b.width + b.height)
}

proptest! {
    #[test]
    fn upright_anchors_span_the_box(c in point(), w in 0.1f64..50.0, h in 0.1f64..50.0) {
        let b = BoundingBox::rect(c, w, h);
        let across = b.anchor(Anchor::East) - b.anchor(Anchor::West);
        let up = b.anchor(Anchor::North) - b.anchor(Anchor::South);
        prop_assert!((across.x - w).abs() < EPS && across.y.abs() < EPS, "{across:?}");
        prop_assert!((up.y - h).abs() < EPS && up.x.abs() < EPS, "{up:?}");
        prop_assert!((b.center() - c).length() < EPS);
    }
}

proptest! {
    #[test]
    fn rotation_is_rigid(b in bbox(), turn in -360.0f64..360.0) {
        let turned = b.clone().rotated(Angle(b.rotation.0 + turn));
        for (i, &p) in Anchor::ALL.iter().enumerate() {
            for &q in &Anchor::ALL[i + 1..] {
                let before = b.anchor(p).distance(b.anchor(q));
                let after = turned.anchor(p).distance(turned.anchor(q));
                prop_assert!((before - after).abs() < EPS, "{p:?}-{q:?}: {before} vs {after}");
            }
        }
    }
}

proptest! {
    #[test]
    fn outside_start_is_unclipped(b in bbox(), a in 0.0f64..360.0, end in point()) {
        let start = outside(&b, a);
        prop_assert_eq!(b.clip_segment(start, end), Some(start));
    }
}

proptest! {
    #[test]
    fn segment_inside_clips_to_nothing(
        b in bbox(),
        f in (-1.0f64..1.0, -1.0f64..1.0, -1.0f64..1.0, -1.0f64..1.0),
    ) {
        let (fx, fy, gx, gy) = f;
        prop_assert_eq!(b.clip_segment(inside(&b, fx, fy), inside(&b, gx, gy)), None);
    }
}

proptest! {
    #[test]
    fn clipped_point_is_on_the_segment(b in bbox(), fx in -1.0f64..1.0, fy in -1.0f64..1.0, a in 0.0f64..360.0) {
        let from = inside(&b, fx, fy);
        let to = outside(&b, a);
        let hit = b.clip_segment(from, to);
        prop_assert!(hit.is_some());
        let hit = hit.unwrap_or(from);
        let total = from.distance(to);
        prop_assert!(from.distance(hit) + hit.distance(to) - total < 1e-6);
        prop_assert!(hit.distance(to) < total);
    }
}

proptest! {
    #[test]
    fn samples_meet_the_end_points(
        start in point(),
        end in point(),
        out in 0.0f64..360.0,
        into in 0.0f64..360.0,
        steps in 1usize..200,
    ) {
        let cps = curve::control_points(start, end, Angle(out), Angle(into));
        let samples = curve::sample(&cps, steps);
        prop_assert_eq!(samples.len(), steps + 1);
        prop_assert!(samples[0].distance(start) < EPS);
        prop_assert!(samples[steps].distance(end) < EPS);
    }
}
