//! Relationship resolution: scene graph → bounding boxes.
//!
//! Objects are resolved strictly in scene order, so a relationship can only
//! use objects that come before it. Paths are walked to find their extent.

use std::collections::HashMap;

use glam::{DVec2, dvec2};

use crate::draw::path_walker;
use crate::errors::{Error, Result};
use crate::model::{AnchorRef, Body, BoxShape, Object, ObjectId, Relationship};
use crate::scene::SceneGraph;
use crate::settings::Settings;
use crate::types::Angle;

use super::Rect;
use super::bbox::BoundingBox;
use super::measure::{CharWidthMeasurer, MeasureCache, TextMeasurer, TextStyle};

/// Bounding boxes for one resolution pass, in scene order.
#[derive(Debug, Clone, Default)]
pub struct ResolvedMap {
    boxes: HashMap<ObjectId, BoundingBox>,
    order: Vec<ObjectId>,
}

impl ResolvedMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: ObjectId, bbox: BoundingBox) {
        if self.boxes.insert(id.clone(), bbox).is_none() {
            self.order.push(id);
        }
    }

    pub fn get(&self, id: &ObjectId) -> Option<&BoundingBox> {
        self.boxes.get(id)
    }

    pub fn contains(&self, id: &ObjectId) -> bool {
        self.boxes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Boxes in resolution order.
    pub fn iter(&self) -> impl Iterator<Item = (&ObjectId, &BoundingBox)> {
        self.order
            .iter()
            .filter_map(|id| self.boxes.get(id).map(|b| (id, b)))
    }

    /// Marquee selection: every object touching `rect`, in resolution order.
    pub fn hits(&self, rect: Rect) -> Vec<ObjectId> {
        self.iter()
            .filter(|(_, b)| b.intersects_rect(rect))
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Look up a reference, failing with a `ReferenceError`.
    pub fn lookup(&self, id: &ObjectId) -> Result<&BoundingBox> {
        self.get(id)
            .ok_or_else(|| Error::reference(id.as_str(), "not resolved before it is used"))
    }

    pub fn anchor_point(&self, r: &AnchorRef) -> Result<DVec2> {
        Ok(self.lookup(&r.name)?.anchor(r.anchor))
    }

    /// The point a relationship denotes, ignoring the size of whatever is placed there.
    pub fn relationship_point(&self, rel: &Relationship, node_distance: f64) -> Result<DVec2> {
        Ok(match rel {
            Relationship::AbsoluteCoordinate { x, y } => dvec2(*x, *y),
            Relationship::NamedReference { name, anchor } => self.lookup(name)?.anchor(*anchor),
            Relationship::Intersection { first, second } => {
                dvec2(self.anchor_point(first)?.x, self.anchor_point(second)?.y)
            }
            Relationship::DirectionalOffset {
                direction,
                distance,
                from,
            } => {
                let d = distance.unwrap_or(node_distance);
                self.lookup(from)?.anchor(direction.anchor()) + direction.unit() * d
            }
        })
    }
}

pub struct Resolver {
    settings: Settings,
    measurer: Box<dyn TextMeasurer>,
    /// Set by [`Resolver::with_measurer`]; the default measurer follows settings.
    custom_measurer: bool,
    cache: MeasureCache,
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("measurer", &self.measurer)
            .field("cached", &self.cache.len())
            .finish()
    }
}

impl Resolver {
    pub fn new(settings: &Settings) -> Self {
        Resolver {
            settings: settings.clone(),
            measurer: Box::new(char_width_measurer(settings)),
            custom_measurer: false,
            cache: MeasureCache::new(),
        }
    }

    pub fn with_measurer(settings: &Settings, measurer: Box<dyn TextMeasurer>) -> Self {
        Resolver {
            settings: settings.clone(),
            measurer,
            custom_measurer: true,
            cache: MeasureCache::new(),
        }
    }

    /// Swap in new settings. Cached label sizes are dropped when they change.
    pub fn update_settings(&mut self, settings: &Settings) {
        if self.settings == *settings {
            return;
        }
        self.settings = settings.clone();
        if !self.custom_measurer {
            self.measurer = Box::new(char_width_measurer(settings));
        }
        self.cache.clear();
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn cache(&self) -> &MeasureCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut MeasureCache {
        &mut self.cache
    }

    /// Resolve every object in scene order.
    pub fn resolve_all(&mut self, scene: &SceneGraph) -> Result<ResolvedMap> {
        let mut map = ResolvedMap::new();
        for obj in scene.iter() {
            let bbox = self
                .resolve_object(obj, &map)
                .map_err(|e| explain_forward_reference(e, scene, &map))?;
            crate::log::debug!(id = %obj.id, center = ?bbox.center(), w = bbox.width, h = bbox.height, "resolved");
            map.insert(obj.id.clone(), bbox);
        }
        Ok(map)
    }

    fn resolve_object(&mut self, obj: &Object, map: &ResolvedMap) -> Result<BoundingBox> {
        match &obj.body {
            Body::Box { shape, placement } => self.place_node(obj, *shape, placement.as_ref(), map),
            Body::Text { placement } => {
                self.place_node(obj, BoxShape::Rectangle, placement.as_ref(), map)
            }
            Body::Brace { from, to } => {
                let distance = self.settings.node_distance.raw();
                let a = map.relationship_point(from, distance)?;
                let b = map.relationship_point(to, distance)?;
                Ok(BoundingBox::line(a, b))
            }
            Body::Path { items } => {
                let segments = path_walker::walk(items, map, &self.settings)?;
                let points: Vec<DVec2> = segments.iter().flat_map(|s| s.points()).collect();
                Ok(match BoundingBox::curve(&points) {
                    Some(curve) => curve,
                    None => {
                        let at = points.first().copied().unwrap_or(DVec2::ZERO);
                        BoundingBox::rect(at, 0.0, 0.0)
                    }
                })
            }
        }
    }

    /// Size a box or text from its label, then place it.
    fn place_node(
        &mut self,
        obj: &Object,
        shape: BoxShape,
        placement: Option<&Relationship>,
        map: &ResolvedMap,
    ) -> Result<BoundingBox> {
        let style = TextStyle {
            scale: obj.style.scale,
        };
        let text = obj.text.as_deref().unwrap_or("");
        let label = self.cache.measure(self.measurer.as_ref(), text, &style);
        let sep = 2.0 * self.settings.inner_sep.raw() * obj.style.scale;
        let min = dvec2(self.settings.min_width.raw(), self.settings.min_height.raw());
        let rotation = Angle(obj.style.rotate);

        let make = |center: DVec2| -> BoundingBox {
            let bbox = match shape {
                BoxShape::Rectangle => {
                    let size = (label + DVec2::splat(sep)).max(min);
                    BoundingBox::rect(center, size.x, size.y)
                }
                BoxShape::Circle => {
                    let d = (label.length() + sep).max(min.x).max(min.y);
                    BoundingBox::circle(center, d / 2.0)
                }
                BoxShape::Ellipse => {
                    let size = (label * std::f64::consts::SQRT_2 + DVec2::splat(sep)).max(min);
                    BoundingBox::ellipse(center, size.x, size.y)
                }
            };
            bbox.rotated(rotation)
        };

        let node_distance = self.settings.node_distance.raw();
        let center = match placement {
            None => DVec2::ZERO,
            Some(rel @ Relationship::DirectionalOffset { direction, .. }) => {
                let target = map.relationship_point(rel, node_distance)?;
                // our facing anchor lands on the target point
                let facing = direction.anchor().opposite();
                target - make(DVec2::ZERO).anchor(facing)
            }
            Some(rel) => map.relationship_point(rel, node_distance)?,
        };
        Ok(make(center))
    }
}

fn char_width_measurer(settings: &Settings) -> CharWidthMeasurer {
    CharWidthMeasurer {
        char_width: settings.char_width,
        char_height: settings.char_height,
    }
}

/// Reword "not resolved" for ids that exist further down the scene.
fn explain_forward_reference(err: Error, scene: &SceneGraph, map: &ResolvedMap) -> Error {
    match err {
        Error::Reference { name, span, .. } => {
            let id = ObjectId::new(name.as_str());
            let message = if map.contains(&id) {
                "not resolved before it is used".to_string()
            } else if scene.contains(&id) {
                "forward reference to an object defined later".to_string()
            } else {
                "no such object".to_string()
            };
            Error::Reference {
                name,
                message,
                span,
            }
        }
        other => other,
    }
}

/// Resolve a scene with a fresh resolver.
pub fn resolve_all(scene: &SceneGraph, settings: &Settings) -> Result<ResolvedMap> {
    Resolver::new(settings).resolve_all(scene)
}
