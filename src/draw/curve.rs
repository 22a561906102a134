//! Smooth connectors: `to[out=…, in=…]` curves.
//!
//! A curve has four control points: the two ends, plus one point on each end
//! pushed a third of the chord along the out/in angle. It is sampled by
//! repeated two-point blending (de Casteljau) and then trimmed so it starts
//! and stops at the silhouettes of the shapes it connects.

use glam::DVec2;

use crate::geometry::BoundingBox;
use crate::settings::{Settings, defaults::MAX_CURVE_STEPS};
use crate::types::Angle;

pub fn control_points(start: DVec2, end: DVec2, out: Angle, into: Angle) -> [DVec2; 4] {
    let third = start.distance(end) / 3.0;
    [start, start + out.unit() * third, end + into.unit() * third, end]
}

/// Point at `t` by blending neighbouring control points until one is left.
pub fn de_casteljau(points: &[DVec2], t: f64) -> DVec2 {
    let mut work = points.to_vec();
    for level in (1..work.len()).rev() {
        for i in 0..level {
            work[i] = work[i].lerp(work[i + 1], t);
        }
    }
    work.first().copied().unwrap_or(DVec2::ZERO)
}

/// Longer chords get proportionally more samples, never fewer than the
/// minimum and never more than [`MAX_CURVE_STEPS`].
pub fn step_count(chord: f64, settings: &Settings) -> usize {
    let proportional = (chord / settings.curve_step).ceil();
    let steps = if proportional.is_finite() && proportional > 0.0 {
        (proportional.min(MAX_CURVE_STEPS as f64) as usize).max(settings.min_curve_steps)
    } else {
        settings.min_curve_steps
    };
    steps.min(MAX_CURVE_STEPS)
}

/// `steps + 1` samples from `t = 0` to `t = 1`.
pub fn sample(points: &[DVec2], steps: usize) -> Vec<DVec2> {
    let steps = steps.max(1);
    (0..=steps)
        .map(|i| de_casteljau(points, i as f64 / steps as f64))
        .collect()
}

/// Drop the samples inside `start` and `end`, replacing each run with its
/// boundary crossing. Returns the input when trimming would leave no curve.
pub fn trim(samples: Vec<DVec2>, start: Option<&BoundingBox>, end: Option<&BoundingBox>) -> Vec<DVec2> {
    let mut trimmed = samples.clone();
    if let Some(shape) = start {
        trimmed = trim_front(trimmed, shape);
    }
    if let Some(shape) = end {
        trimmed.reverse();
        trimmed = trim_front(trimmed, shape);
        trimmed.reverse();
    }
    if trimmed.len() < 2 { samples } else { trimmed }
}

fn trim_front(samples: Vec<DVec2>, shape: &BoundingBox) -> Vec<DVec2> {
    let Some(first_out) = samples.iter().position(|&p| !shape.contains(p, false)) else {
        return Vec::new();
    };
    if first_out == 0 {
        return samples;
    }
    let (inside, outside) = (samples[first_out - 1], samples[first_out]);
    let crossing = shape.clip_segment(inside, outside).unwrap_or(outside);
    let mut out = Vec::with_capacity(samples.len() - first_out + 1);
    out.push(crossing);
    out.extend_from_slice(&samples[first_out..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::dvec2;

    #[test]
    fn endpoints_match_control_points() {
        let cps = control_points(DVec2::ZERO, dvec2(3.0, 0.0), Angle(30.0), Angle(150.0));
        assert_eq!(de_casteljau(&cps, 0.0), cps[0]);
        assert_eq!(de_casteljau(&cps, 1.0), cps[3]);
        let samples = sample(&cps, 20);
        assert_eq!(samples.len(), 21);
        assert_eq!(samples[0], cps[0]);
        assert_eq!(samples[20], cps[3]);
    }

    #[test]
    fn controls_sit_a_third_along_the_angles() {
        let cps = control_points(DVec2::ZERO, dvec2(3.0, 0.0), Angle(90.0), Angle(90.0));
        assert!((cps[1] - dvec2(0.0, 1.0)).length() < 1e-12);
        assert!((cps[2] - dvec2(3.0, 1.0)).length() < 1e-12);
        // symmetric arch peaks at three quarters of the control height
        assert!((de_casteljau(&cps, 0.5).y - 0.75).abs() < 1e-12);
    }

    #[test]
    fn step_count_scales_with_chord() {
        let settings = Settings::default();
        assert_eq!(step_count(0.05, &settings), 20);
        assert_eq!(step_count(1.0, &settings), 100);
        assert_eq!(step_count(0.0, &settings), 20);
    }

    #[test]
    fn tiny_steps_hit_the_cap() {
        let settings = Settings {
            curve_step: 1e-12,
            ..Settings::default()
        };
        assert_eq!(step_count(1e6, &settings), MAX_CURVE_STEPS);
    }

    #[test]
    fn trim_stops_at_the_silhouettes() {
        let a = BoundingBox::rect(DVec2::ZERO, 1.0, 1.0);
        let b = BoundingBox::rect(dvec2(4.0, 0.0), 1.0, 1.0);
        let line = sample(&[DVec2::ZERO, dvec2(4.0, 0.0)], 40);
        let trimmed = trim(line, Some(&a), Some(&b));
        assert!((trimmed[0] - dvec2(0.5, 0.0)).length() < 1e-9);
        assert!((trimmed[trimmed.len() - 1] - dvec2(3.5, 0.0)).length() < 1e-9);
    }

    #[test]
    fn trim_keeps_curve_inside_one_shape() {
        let big = BoundingBox::rect(DVec2::ZERO, 10.0, 10.0);
        let line = sample(&[DVec2::ZERO, dvec2(1.0, 0.0)], 10);
        assert_eq!(trim(line.clone(), Some(&big), None), line);
    }
}
