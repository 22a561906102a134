//! Path walker: path items → drawable segments.
//!
//! This module implements the small state machine that turns the ordered
//! items of a path into lines, curves, rectangles and arcs.
//!
//! # Key Concepts
//!
//! - **current position**: where the next segment starts. Set by every
//!   position item (`NodeName`, `Coordinate`, `Intersection`, `Cycle`).
//!
//! - **clip shape**: only a plain node reference (no anchor other than
//!   `center`, no shift) carries its bounding box along. Lines touching such a
//!   position stop at the node's silhouette instead of its centre.
//!
//! - **to_draw**: a segment item (`Line`, `Rectangle`, `Arc`) waits here until
//!   the next position item arrives; that position emits exactly one segment.
//!   A segment left waiting when the items run out is a structural error.
//!
//! - **marks**: `Point(id)` names the current position so later `NodeName`
//!   items in the same path can refer to it.
//!
//! # Annotations
//!
//! Labels sit at a fraction `t` of the line, where `t = 1` is the start. On a
//! straight line the position is `t·start + (1−t)·end`; on a curve it is the
//! sample at index `round((N−1)(1−t))`. Sloped labels follow the tangent and
//! are turned upright.

use std::collections::HashMap;

use glam::{DVec2, dvec2};

use crate::errors::{Error, Result};
use crate::geometry::{BoundingBox, ResolvedMap};
use crate::model::{Anchor, Annotate, ObjectId, PathItem};
use crate::settings::Settings;
use crate::types::Angle;

use super::curve;

/// Samples used to approximate an arc's extent.
const ARC_SAMPLES: usize = 32;

/// A label placed on a segment.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLabel {
    pub text: String,
    pub at: DVec2,
    /// Set for sloped labels.
    pub angle: Option<Angle>,
}

/// One drawable piece of a path, in world coordinates.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Line {
        from: DVec2,
        to: DVec2,
        labels: Vec<PlacedLabel>,
    },
    Curve {
        points: Vec<DVec2>,
        labels: Vec<PlacedLabel>,
    },
    Rectangle {
        from: DVec2,
        to: DVec2,
    },
    Arc {
        center: DVec2,
        radius: f64,
        start: Angle,
        end: Angle,
    },
}

impl Segment {
    pub fn kind(&self) -> &'static str {
        match self {
            Segment::Line { .. } => "line",
            Segment::Curve { .. } => "curve",
            Segment::Rectangle { .. } => "rectangle",
            Segment::Arc { .. } => "arc",
        }
    }

    /// Points covering the segment's extent.
    pub fn points(&self) -> Vec<DVec2> {
        match self {
            Segment::Line { from, to, .. } => vec![*from, *to],
            Segment::Curve { points, .. } => points.clone(),
            Segment::Rectangle { from, to } => {
                vec![*from, dvec2(to.x, from.y), *to, dvec2(from.x, to.y)]
            }
            Segment::Arc {
                center,
                radius,
                start,
                end,
            } => (0..=ARC_SAMPLES)
                .map(|i| {
                    let t = i as f64 / ARC_SAMPLES as f64;
                    let a = Angle(start.0 + (end.0 - start.0) * t);
                    *center + a.unit() * *radius
                })
                .collect(),
        }
    }

    pub fn labels(&self) -> &[PlacedLabel] {
        match self {
            Segment::Line { labels, .. } | Segment::Curve { labels, .. } => labels,
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Position<'a> {
    at: DVec2,
    clip: Option<&'a BoundingBox>,
}

impl Position<'_> {
    /// The point lines aim for: the shape's centre when clipping applies.
    fn aim(&self) -> DVec2 {
        self.clip.map(|b| b.center()).unwrap_or(self.at)
    }
}

pub struct PathWalker<'a> {
    resolved: &'a ResolvedMap,
    settings: &'a Settings,
    current: Option<Position<'a>>,
    start: Option<Position<'a>>,
    to_draw: Option<&'a PathItem>,
    marks: HashMap<ObjectId, DVec2>,
    segments: Vec<Segment>,
}

impl<'a> PathWalker<'a> {
    pub fn new(resolved: &'a ResolvedMap, settings: &'a Settings) -> Self {
        PathWalker {
            resolved,
            settings,
            current: None,
            start: None,
            to_draw: None,
            marks: HashMap::new(),
            segments: Vec::new(),
        }
    }

    pub fn walk(mut self, items: &'a [PathItem]) -> Result<Vec<Segment>> {
        for item in items {
            match item {
                PathItem::Line { .. } | PathItem::Rectangle | PathItem::Arc { .. } => {
                    if self.current.is_none() || self.to_draw.is_some() {
                        return Err(Error::structural(
                            "a line, rectangle or arc must follow a position",
                        ));
                    }
                    self.to_draw = Some(item);
                }
                PathItem::Point { id } => {
                    let Some(current) = self.current else {
                        return Err(Error::structural(format!(
                            "`{id}` marks a position before the path has one"
                        )));
                    };
                    self.marks.insert(id.clone(), current.at);
                }
                _ => {
                    let next = self.position(item)?;
                    if let (Some(segment), Some(from)) = (self.to_draw.take(), self.current) {
                        self.emit(segment, from, next)?;
                    }
                    if self.start.is_none() {
                        self.start = Some(next);
                    }
                    self.current = Some(next);
                }
            }
        }
        if self.to_draw.is_some() {
            return Err(Error::structural("the path ends with an unfinished segment"));
        }
        Ok(self.segments)
    }

    fn position(&self, item: &PathItem) -> Result<Position<'a>> {
        Ok(match item {
            PathItem::NodeName {
                name,
                anchor,
                xshift,
                yshift,
            } => {
                let shift = dvec2(xshift.unwrap_or(0.0), yshift.unwrap_or(0.0));
                if let Some(&mark) = self.marks.get(name) {
                    return Ok(Position {
                        at: mark + shift,
                        clip: None,
                    });
                }
                let bbox = self.resolved.lookup(name)?;
                let anchor = anchor.unwrap_or(Anchor::Center);
                let plain = anchor == Anchor::Center && xshift.is_none() && yshift.is_none();
                Position {
                    at: bbox.anchor(anchor) + shift,
                    clip: plain.then_some(bbox),
                }
            }
            PathItem::Coordinate { x, y, relative } => {
                let offset = dvec2(*x, *y);
                let at = if *relative {
                    let Some(current) = self.current else {
                        return Err(Error::structural(
                            "a relative coordinate needs a current position",
                        ));
                    };
                    current.at + offset
                } else {
                    offset
                };
                Position { at, clip: None }
            }
            PathItem::Intersection { first, second } => Position {
                at: dvec2(
                    self.resolved.anchor_point(first)?.x,
                    self.resolved.anchor_point(second)?.y,
                ),
                clip: None,
            },
            PathItem::Cycle => self
                .start
                .ok_or_else(|| Error::structural("`cycle` needs a start position"))?,
            other => {
                return Err(Error::structural(format!(
                    "{other:?} does not name a position"
                )));
            }
        })
    }

    fn emit(&mut self, item: &PathItem, from: Position<'a>, to: Position<'a>) -> Result<()> {
        let segment = match item {
            PathItem::Line {
                in_angle: None,
                out_angle: None,
                annotates,
            } => self.straight(from, to, annotates),
            PathItem::Line {
                in_angle,
                out_angle,
                annotates,
            } => {
                let out = out_angle.map(Angle).unwrap_or(self.settings.curve_out);
                let into = in_angle.map(Angle).unwrap_or(self.settings.curve_in);
                self.curved(from, to, out, into, annotates)
            }
            PathItem::Rectangle => Segment::Rectangle {
                from: from.at,
                to: to.at,
            },
            PathItem::Arc { start, end, radius } => {
                let start = Angle(*start);
                Segment::Arc {
                    center: from.at - start.unit() * *radius,
                    radius: *radius,
                    start,
                    end: Angle(*end),
                }
            }
            other => {
                return Err(Error::structural(format!("{other:?} is not a segment")));
            }
        };
        crate::log::trace!(kind = segment.kind(), "segment emitted");
        self.segments.push(segment);
        Ok(())
    }

    fn straight(&self, from: Position<'a>, to: Position<'a>, annotates: &[Annotate]) -> Segment {
        let (a, b) = (from.aim(), to.aim());
        let start = from
            .clip
            .and_then(|shape| shape.clip_segment(from.at, b))
            .unwrap_or(from.at);
        let end = to
            .clip
            .and_then(|shape| shape.clip_segment(to.at, a))
            .unwrap_or(to.at);
        let labels = annotates
            .iter()
            .map(|note| {
                let t = note.position.fraction();
                PlacedLabel {
                    text: note.text.clone(),
                    at: start * t + end * (1.0 - t),
                    angle: note.sloped.then(|| Angle::of_vector(end - start).upright()),
                }
            })
            .collect();
        Segment::Line {
            from: start,
            to: end,
            labels,
        }
    }

    fn curved(
        &self,
        from: Position<'a>,
        to: Position<'a>,
        out: Angle,
        into: Angle,
        annotates: &[Annotate],
    ) -> Segment {
        let cps = curve::control_points(from.at, to.at, out, into);
        let steps = curve::step_count(from.at.distance(to.at), self.settings);
        let points = curve::trim(curve::sample(&cps, steps), from.clip, to.clip);
        let last = points.len().saturating_sub(1);
        let labels = annotates
            .iter()
            .map(|note| {
                let t = note.position.fraction();
                let index = ((last as f64) * (1.0 - t)).round() as usize;
                let index = index.min(last);
                let tangent = if index < last {
                    points[index + 1] - points[index]
                } else if index > 0 {
                    points[index] - points[index - 1]
                } else {
                    DVec2::X
                };
                PlacedLabel {
                    text: note.text.clone(),
                    at: points[index],
                    angle: note.sloped.then(|| Angle::of_vector(tangent).upright()),
                }
            })
            .collect();
        Segment::Curve { points, labels }
    }
}

/// Walk a path's items against a resolution map.
pub fn walk<'a>(
    items: &'a [PathItem],
    resolved: &'a ResolvedMap,
    settings: &'a Settings,
) -> Result<Vec<Segment>> {
    PathWalker::new(resolved, settings).walk(items)
}

/// Where an arc segment ends.
pub fn arc_end(center: DVec2, radius: f64, end: Angle) -> DVec2 {
    center + end.unit() * radius
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AnnotatePosition;

    fn coord(x: f64, y: f64) -> PathItem {
        PathItem::Coordinate {
            x,
            y,
            relative: false,
        }
    }

    fn resolved_pair() -> ResolvedMap {
        let mut map = ResolvedMap::new();
        map.insert(ObjectId::new("a"), BoundingBox::rect(DVec2::ZERO, 1.0, 1.0));
        map.insert(
            ObjectId::new("b"),
            BoundingBox::rect(dvec2(4.0, 0.0), 1.0, 1.0),
        );
        map
    }

    fn close(a: DVec2, b: DVec2) -> bool {
        (a - b).length() < 1e-9
    }

    #[test]
    fn straight_line_is_clipped_at_both_ends() {
        let map = resolved_pair();
        let settings = Settings::default();
        let items = vec![PathItem::node("a"), PathItem::straight_line(), PathItem::node("b")];
        let segments = walk(&items, &map, &settings).unwrap();
        match &segments[..] {
            [Segment::Line { from, to, .. }] => {
                assert!(close(*from, dvec2(0.5, 0.0)));
                assert!(close(*to, dvec2(3.5, 0.0)));
            }
            other => panic!("expected one line, got {other:?}"),
        }
    }

    #[test]
    fn anchored_reference_is_not_clipped() {
        let map = resolved_pair();
        let settings = Settings::default();
        let items = vec![
            PathItem::NodeName {
                name: ObjectId::new("a"),
                anchor: Some(Anchor::North),
                xshift: None,
                yshift: None,
            },
            PathItem::straight_line(),
            coord(0.0, 3.0),
        ];
        let segments = walk(&items, &map, &settings).unwrap();
        assert_eq!(segments[0].points(), vec![dvec2(0.0, 0.5), dvec2(0.0, 3.0)]);
    }

    #[test]
    fn dangling_segment_is_structural() {
        let map = ResolvedMap::new();
        let settings = Settings::default();
        let items = vec![coord(0.0, 0.0), PathItem::straight_line()];
        assert!(matches!(
            walk(&items, &map, &settings),
            Err(Error::Structural { .. })
        ));
    }

    #[test]
    fn segment_without_start_is_structural() {
        let map = ResolvedMap::new();
        let settings = Settings::default();
        let items = vec![PathItem::straight_line(), coord(1.0, 0.0)];
        assert!(matches!(
            walk(&items, &map, &settings),
            Err(Error::Structural { .. })
        ));
    }

    #[test]
    fn relative_coordinates_and_cycle() {
        let map = ResolvedMap::new();
        let settings = Settings::default();
        let items = vec![
            coord(1.0, 1.0),
            PathItem::straight_line(),
            PathItem::Coordinate {
                x: 2.0,
                y: 0.0,
                relative: true,
            },
            PathItem::straight_line(),
            PathItem::Cycle,
        ];
        let segments = walk(&items, &map, &settings).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].points(), vec![dvec2(1.0, 1.0), dvec2(3.0, 1.0)]);
        assert_eq!(segments[1].points(), vec![dvec2(3.0, 1.0), dvec2(1.0, 1.0)]);
    }

    #[test]
    fn unknown_node_is_a_reference_error() {
        let map = ResolvedMap::new();
        let settings = Settings::default();
        let items = vec![PathItem::node("ghost")];
        assert!(matches!(
            walk(&items, &map, &settings),
            Err(Error::Reference { .. })
        ));
    }

    #[test]
    fn marks_are_visible_to_later_items() {
        let map = ResolvedMap::new();
        let settings = Settings::default();
        let items = vec![
            coord(2.0, 2.0),
            PathItem::Point {
                id: ObjectId::new("p"),
            },
            PathItem::straight_line(),
            coord(5.0, 2.0),
            PathItem::straight_line(),
            PathItem::node("p"),
        ];
        let segments = walk(&items, &map, &settings).unwrap();
        assert_eq!(segments[1].points(), vec![dvec2(5.0, 2.0), dvec2(2.0, 2.0)]);
    }

    #[test]
    fn labels_on_straight_lines() {
        let map = ResolvedMap::new();
        let settings = Settings::default();
        let note = |position, sloped| Annotate {
            text: "x".to_string(),
            position,
            sloped,
        };
        let items = vec![
            coord(4.0, 0.0),
            PathItem::Line {
                in_angle: None,
                out_angle: None,
                annotates: vec![
                    note(AnnotatePosition::NearStart, false),
                    note(AnnotatePosition::Midway, true),
                ],
            },
            coord(0.0, 0.0),
        ];
        let segments = walk(&items, &map, &settings).unwrap();
        let labels = segments[0].labels();
        assert!(close(labels[0].at, dvec2(3.2, 0.0)));
        assert_eq!(labels[0].angle, None);
        assert!(close(labels[1].at, dvec2(2.0, 0.0)));
        // pointing left (180°) reads upright at 0°
        assert_eq!(labels[1].angle, Some(Angle(0.0)));
    }

    #[test]
    fn curve_labels_index_into_samples() {
        let map = ResolvedMap::new();
        let settings = Settings::default();
        let items = vec![
            coord(0.0, 0.0),
            PathItem::Line {
                in_angle: Some(150.0),
                out_angle: Some(30.0),
                annotates: vec![Annotate {
                    text: "end".to_string(),
                    position: AnnotatePosition::AtEnd,
                    sloped: false,
                }],
            },
            coord(3.0, 0.0),
        ];
        let segments = walk(&items, &map, &settings).unwrap();
        let Segment::Curve { points, labels } = &segments[0] else {
            panic!("expected a curve");
        };
        assert_eq!(points.len(), 301);
        assert_eq!(points[0], DVec2::ZERO);
        assert!(close(labels[0].at, dvec2(3.0, 0.0)));
    }

    #[test]
    fn rectangle_and_arc() {
        let map = ResolvedMap::new();
        let settings = Settings::default();
        let items = vec![
            coord(0.0, 0.0),
            PathItem::Rectangle,
            coord(2.0, 1.0),
            PathItem::Arc {
                start: 0.0,
                end: 90.0,
                radius: 1.0,
            },
            coord(5.0, 5.0),
        ];
        let segments = walk(&items, &map, &settings).unwrap();
        assert_eq!(
            segments[0],
            Segment::Rectangle {
                from: DVec2::ZERO,
                to: dvec2(2.0, 1.0)
            }
        );
        match segments[1] {
            Segment::Arc { center, radius, .. } => {
                assert!(close(center, dvec2(1.0, 1.0)));
                assert_eq!(radius, 1.0);
                assert!(close(arc_end(center, radius, Angle(90.0)), dvec2(1.0, 2.0)));
            }
            ref other => panic!("expected an arc, got {other:?}"),
        }
    }
}
