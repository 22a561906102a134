//! Drawer: resolved scene → device-space drawing commands.
//!
//! The drawer needs concrete numbers, so it consumes a [`ResolvedMap`] from
//! the geometry resolver and walks every path again. Each object kind is
//! handled by a registered [`ObjectDrawer`]; coordinates are converted by a
//! [`Scaler`] whose origin is the top-left corner of the scene's extent.
//!
//! A failing pass returns the error and leaves the scene graph untouched.

pub mod curve;
pub mod path_walker;

use std::collections::HashMap;

use glam::{DVec2, dvec2};

use crate::errors::{Error, Result};
use crate::geometry::{BoundingBox, ResolvedMap, Shape};
use crate::model::{Dash, Object, ObjectKind};
use crate::scene::SceneGraph;
use crate::settings::Settings;
use crate::types::{Angle, Scaler};

pub use path_walker::{PathWalker, PlacedLabel, Segment};

/// Stroke in device units.
#[derive(Debug, Clone, PartialEq)]
pub struct Stroke {
    pub color: Option<String>,
    /// Points.
    pub width: f64,
    pub dash: Dash,
}

/// A device-space drawing primitive. y grows downward, angles clockwise.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Rectangle {
        center: DVec2,
        width: f64,
        height: f64,
        rotation: Angle,
        corner_radius: Option<f64>,
        stroke: Stroke,
        fill: Option<String>,
    },
    Ellipse {
        center: DVec2,
        rx: f64,
        ry: f64,
        rotation: Angle,
        stroke: Stroke,
        fill: Option<String>,
    },
    Polyline {
        points: Vec<DVec2>,
        stroke: Stroke,
    },
    Arc {
        center: DVec2,
        radius: f64,
        start: Angle,
        end: Angle,
        stroke: Stroke,
    },
    Text {
        at: DVec2,
        text: String,
        rotation: Angle,
        scale: f64,
        color: Option<String>,
    },
    Brace {
        from: DVec2,
        to: DVec2,
        stroke: Stroke,
    },
}

/// What an [`ObjectDrawer`] gets to work with.
pub struct DrawContext<'a> {
    pub resolved: &'a ResolvedMap,
    pub settings: &'a Settings,
    pub scaler: Scaler,
}

impl DrawContext<'_> {
    fn stroke(&self, obj: &Object) -> Stroke {
        Stroke {
            color: obj.style.color.clone(),
            width: obj.style.line_width.unwrap_or(self.settings.line_width),
            dash: obj.style.dash,
        }
    }

    fn label(&self, obj: &Object, at: DVec2, rotation: Angle) -> Option<DrawCommand> {
        let text = obj.text.as_deref().filter(|t| !t.is_empty())?;
        Some(DrawCommand::Text {
            at: self.scaler.point(at),
            text: text.to_string(),
            rotation: self.scaler.angle(rotation),
            scale: obj.style.scale,
            color: obj.style.color.clone(),
        })
    }
}

pub trait ObjectDrawer {
    fn draw(
        &self,
        obj: &Object,
        bbox: &BoundingBox,
        cx: &DrawContext<'_>,
        out: &mut Vec<DrawCommand>,
    ) -> Result<()>;
}

struct BoxDrawer;

impl ObjectDrawer for BoxDrawer {
    fn draw(
        &self,
        obj: &Object,
        bbox: &BoundingBox,
        cx: &DrawContext<'_>,
        out: &mut Vec<DrawCommand>,
    ) -> Result<()> {
        let center = cx.scaler.point(bbox.center());
        let rotation = cx.scaler.angle(bbox.rotation);
        let (width, height) = (cx.scaler.len(bbox.width), cx.scaler.len(bbox.height));
        out.push(match bbox.shape {
            Shape::Circle(_) | Shape::Ellipse(_) => DrawCommand::Ellipse {
                center,
                rx: width / 2.0,
                ry: height / 2.0,
                rotation,
                stroke: cx.stroke(obj),
                fill: obj.style.fill.clone(),
            },
            _ => DrawCommand::Rectangle {
                center,
                width,
                height,
                rotation,
                corner_radius: obj.style.rounded_corners.map(|r| cx.scaler.len(r)),
                stroke: cx.stroke(obj),
                fill: obj.style.fill.clone(),
            },
        });
        out.extend(cx.label(obj, bbox.center(), bbox.rotation));
        Ok(())
    }
}

struct TextDrawer;

impl ObjectDrawer for TextDrawer {
    fn draw(
        &self,
        obj: &Object,
        bbox: &BoundingBox,
        cx: &DrawContext<'_>,
        out: &mut Vec<DrawCommand>,
    ) -> Result<()> {
        out.extend(cx.label(obj, bbox.center(), bbox.rotation));
        Ok(())
    }
}

struct PathDrawer;

impl ObjectDrawer for PathDrawer {
    fn draw(
        &self,
        obj: &Object,
        _bbox: &BoundingBox,
        cx: &DrawContext<'_>,
        out: &mut Vec<DrawCommand>,
    ) -> Result<()> {
        let items = obj
            .path_items()
            .ok_or_else(|| Error::configuration(format!("{} is not a path", obj.id)))?;
        let stroke = cx.stroke(obj);
        for segment in path_walker::walk(items, cx.resolved, cx.settings)? {
            let s = &cx.scaler;
            out.push(match &segment {
                Segment::Line { from, to, .. } => DrawCommand::Polyline {
                    points: vec![s.point(*from), s.point(*to)],
                    stroke: stroke.clone(),
                },
                Segment::Curve { points, .. } => DrawCommand::Polyline {
                    points: points.iter().map(|&p| s.point(p)).collect(),
                    stroke: stroke.clone(),
                },
                Segment::Rectangle { from, to } => DrawCommand::Rectangle {
                    center: s.point((*from + *to) / 2.0),
                    width: s.len((to.x - from.x).abs()),
                    height: s.len((to.y - from.y).abs()),
                    rotation: Angle::ZERO,
                    corner_radius: obj.style.rounded_corners.map(|r| s.len(r)),
                    stroke: stroke.clone(),
                    fill: obj.style.fill.clone(),
                },
                Segment::Arc {
                    center,
                    radius,
                    start,
                    end,
                } => DrawCommand::Arc {
                    center: s.point(*center),
                    radius: s.len(*radius),
                    start: s.angle(*start),
                    end: s.angle(*end),
                    stroke: stroke.clone(),
                },
            });
            for label in segment.labels() {
                out.push(DrawCommand::Text {
                    at: s.point(label.at),
                    text: label.text.clone(),
                    rotation: s.angle(label.angle.unwrap_or(Angle::ZERO)),
                    scale: obj.style.scale,
                    color: obj.style.color.clone(),
                });
            }
        }
        Ok(())
    }
}

struct BraceDrawer;

impl ObjectDrawer for BraceDrawer {
    fn draw(
        &self,
        obj: &Object,
        bbox: &BoundingBox,
        cx: &DrawContext<'_>,
        out: &mut Vec<DrawCommand>,
    ) -> Result<()> {
        let [from, to] = match bbox.samples()[..] {
            [from, to] => [from, to],
            _ => return Err(Error::configuration(format!("{} has no brace line", obj.id))),
        };
        out.push(DrawCommand::Brace {
            from: cx.scaler.point(from),
            to: cx.scaler.point(to),
            stroke: cx.stroke(obj),
        });
        out.extend(cx.label(obj, (from + to) / 2.0, Angle::ZERO));
        Ok(())
    }
}

/// Registry of per-kind drawers.
pub struct Drawer {
    settings: Settings,
    drawers: HashMap<ObjectKind, Box<dyn ObjectDrawer>>,
}

impl Drawer {
    /// A drawer with nothing registered.
    pub fn empty(settings: &Settings) -> Self {
        Drawer {
            settings: settings.clone(),
            drawers: HashMap::new(),
        }
    }

    /// A drawer for every built-in object kind.
    pub fn new(settings: &Settings) -> Self {
        let mut drawer = Self::empty(settings);
        drawer.register(ObjectKind::Box, BoxDrawer);
        drawer.register(ObjectKind::Text, TextDrawer);
        drawer.register(ObjectKind::Path, PathDrawer);
        drawer.register(ObjectKind::Brace, BraceDrawer);
        drawer
    }

    pub fn register(&mut self, kind: ObjectKind, drawer: impl ObjectDrawer + 'static) {
        self.drawers.insert(kind, Box::new(drawer));
    }

    pub fn draw(&self, scene: &SceneGraph, resolved: &ResolvedMap) -> Result<Vec<DrawCommand>> {
        let cx = DrawContext {
            resolved,
            settings: &self.settings,
            scaler: self.settings.scaler().with_origin(top_left(resolved)),
        };
        let mut out = Vec::new();
        for obj in scene.iter() {
            let drawer = self.drawers.get(&obj.kind()).ok_or_else(|| {
                Error::configuration(format!("no drawer registered for {}", obj.kind().name()))
            })?;
            let bbox = resolved.lookup(&obj.id)?;
            drawer.draw(obj, bbox, &cx, &mut out)?;
        }
        crate::log::debug!(objects = scene.len(), commands = out.len(), "draw pass done");
        Ok(out)
    }
}

/// Top-left corner of everything resolved, in world coordinates.
fn top_left(resolved: &ResolvedMap) -> DVec2 {
    let mut extents = resolved.iter().map(|(_, b)| b.extent());
    let Some(first) = extents.next() else {
        return DVec2::ZERO;
    };
    let (min, max) = extents.fold((first.min, first.max), |(lo, hi), r| {
        (lo.min(r.min), hi.max(r.max))
    });
    dvec2(min.x, max.y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::resolve_all;
    use crate::model::{Body, BoxShape, ObjectId, PathItem, Relationship};
    use crate::scene::IdGen;

    fn two_boxes_and_a_path() -> SceneGraph {
        let mut scene = SceneGraph::new();
        let mut ids = IdGen::default();
        let a = ids.next_id();
        let b = ids.next_id();
        let mut first = Object::new(
            a.clone(),
            Body::Box {
                shape: BoxShape::Rectangle,
                placement: None,
            },
        );
        first.text = Some("hello".to_string());
        scene.push(first);
        scene.push(Object::new(
            b.clone(),
            Body::Box {
                shape: BoxShape::Circle,
                placement: Some(Relationship::AbsoluteCoordinate { x: 4.0, y: 0.0 }),
            },
        ));
        scene.push(Object::new(
            ids.next_id(),
            Body::Path {
                items: vec![PathItem::node(a), PathItem::straight_line(), PathItem::node(b)],
            },
        ));
        scene
    }

    #[test]
    fn draws_every_object() {
        let scene = two_boxes_and_a_path();
        let settings = Settings::default();
        let resolved = resolve_all(&scene, &settings).unwrap();
        let commands = Drawer::new(&settings).draw(&scene, &resolved).unwrap();
        assert!(matches!(commands[0], DrawCommand::Rectangle { .. }));
        assert!(matches!(commands[1], DrawCommand::Text { .. }));
        assert!(matches!(commands[2], DrawCommand::Ellipse { .. }));
        assert!(matches!(commands[3], DrawCommand::Polyline { .. }));
        assert_eq!(commands.len(), 4);
    }

    #[test]
    fn device_space_is_flipped_and_scaled() {
        let scene = two_boxes_and_a_path();
        let settings = Settings::default();
        let resolved = resolve_all(&scene, &settings).unwrap();
        let commands = Drawer::new(&settings).draw(&scene, &resolved).unwrap();
        let DrawCommand::Polyline { points, .. } = &commands[3] else {
            panic!("expected the connector");
        };
        // same world y, so same device y; left to right stays left to right
        assert!((points[0].y - points[1].y).abs() < 1e-9);
        assert!(points[0].x < points[1].x);
        assert!(points.iter().all(|p| p.x >= 0.0 && p.y >= 0.0));
    }

    #[test]
    fn missing_drawer_is_a_configuration_error() {
        let scene = two_boxes_and_a_path();
        let settings = Settings::default();
        let resolved = resolve_all(&scene, &settings).unwrap();
        let err = Drawer::empty(&settings).draw(&scene, &resolved).unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[test]
    fn stale_resolution_is_a_reference_error() {
        let mut scene = two_boxes_and_a_path();
        let settings = Settings::default();
        let resolved = resolve_all(&scene, &settings).unwrap();
        scene.push(Object::new(
            ObjectId::numbered(9),
            Body::Text { placement: None },
        ));
        let before = scene.clone();
        let err = Drawer::new(&settings).draw(&scene, &resolved).unwrap_err();
        assert!(matches!(err, Error::Reference { .. }));
        assert_eq!(scene, before);
    }
}
