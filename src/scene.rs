//! The scene graph: ordered objects, id generation, cascading delete, paste
//! and snapshots.

use std::collections::{HashMap, HashSet};

use glam::{DVec2, dvec2};
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};
use crate::geometry::ResolvedMap;
use crate::model::{Body, Object, ObjectId, PathItem, Relationship};

/// Hands out `id0`, `id1`, … and never goes back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdGen {
    next: u64,
}

impl IdGen {
    pub fn starting_at(next: u64) -> Self {
        IdGen { next }
    }

    pub fn next_id(&mut self) -> ObjectId {
        let id = ObjectId::numbered(self.next);
        self.next += 1;
        id
    }

    /// The counter value the next id will get.
    pub fn peek(&self) -> u64 {
        self.next
    }

    /// Make sure later ids sort after `id`.
    pub fn bump_past(&mut self, id: &ObjectId) {
        if let Some(n) = id.number() {
            self.next = self.next.max(n + 1);
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneGraph {
    objects: Vec<Object>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, object: Object) {
        crate::log::trace!(id = %object.id, kind = object.kind().name(), "object added");
        self.objects.push(object);
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Object> {
        self.objects.iter()
    }

    pub fn objects(&self) -> &[Object] {
        &self.objects
    }

    pub fn find_by_id(&self, id: &ObjectId) -> Option<&Object> {
        self.objects.iter().find(|o| &o.id == id)
    }

    pub fn find_mut(&mut self, id: &ObjectId) -> Option<&mut Object> {
        self.objects.iter_mut().find(|o| &o.id == id)
    }

    pub fn contains(&self, id: &ObjectId) -> bool {
        self.find_by_id(id).is_some()
    }

    pub fn position(&self, id: &ObjectId) -> Option<usize> {
        self.objects.iter().position(|o| &o.id == id)
    }

    /// Remove `id` and, transitively, every object referring to a removed one.
    ///
    /// Returns the removed ids in scene order.
    pub fn delete_cascade(&mut self, id: &ObjectId) -> Result<Vec<ObjectId>> {
        if !self.contains(id) {
            return Err(Error::reference(id.as_str(), "no such object to delete"));
        }
        let mut doomed: HashSet<ObjectId> = HashSet::from([id.clone()]);
        loop {
            let before = doomed.len();
            for obj in &self.objects {
                if !doomed.contains(&obj.id) && obj.references().iter().any(|r| doomed.contains(*r)) {
                    doomed.insert(obj.id.clone());
                }
            }
            if doomed.len() == before {
                break;
            }
        }
        let removed: Vec<ObjectId> = self
            .objects
            .iter()
            .filter(|o| doomed.contains(&o.id))
            .map(|o| o.id.clone())
            .collect();
        self.objects.retain(|o| !doomed.contains(&o.id));
        crate::log::debug!(root = %id, removed = removed.len(), "cascading delete");
        Ok(removed)
    }

    /// Copy `objects` into the scene under fresh ids.
    ///
    /// References to objects outside the copied set are rejected when
    /// `resolved` is `None`, otherwise rewritten into absolute coordinates
    /// from that map. Afterwards every absolute coordinate is shifted so the
    /// first one lands on `at`. Nothing is added when an error is returned.
    pub fn paste_subgraph(
        &mut self,
        ids: &mut IdGen,
        objects: &[Object],
        at: DVec2,
        resolved: Option<&ResolvedMap>,
        node_distance: f64,
    ) -> Result<Vec<ObjectId>> {
        let remap: HashMap<ObjectId, ObjectId> = objects
            .iter()
            .map(|o| (o.id.clone(), ids.next_id()))
            .collect();

        let mut pasted = Vec::with_capacity(objects.len());
        for original in objects {
            let mut obj = original.clone();
            let external: Vec<&ObjectId> = original
                .references()
                .into_iter()
                .filter(|r| !remap.contains_key(*r))
                .collect();
            if let Some(first) = external.first() {
                let Some(map) = resolved else {
                    return Err(Error::reference(
                        first.as_str(),
                        "points outside the pasted objects",
                    ));
                };
                absolutize(&mut obj, map, &remap, node_distance)?;
            }
            obj.rename_references(&|id| remap.get(id).cloned());
            obj.id = remap
                .get(&original.id)
                .cloned()
                .ok_or_else(|| Error::reference(original.id.as_str(), "missing from paste map"))?;
            pasted.push(obj);
        }

        if let Some(first) = pasted.iter().find_map(first_absolute) {
            let delta = at - first;
            for obj in &mut pasted {
                translate(obj, delta);
            }
        }

        let new_ids = pasted.iter().map(|o| o.id.clone()).collect();
        for obj in pasted {
            self.push(obj);
        }
        Ok(new_ids)
    }

    pub fn snapshot(&self, ids: &IdGen) -> Snapshot {
        Snapshot {
            objects: self.objects.clone(),
            next_id: ids.peek(),
        }
    }

    /// Rebuild a scene and its id counter from a snapshot.
    pub fn restore(snapshot: Snapshot) -> (SceneGraph, IdGen) {
        let mut ids = IdGen::starting_at(snapshot.next_id);
        for obj in &snapshot.objects {
            ids.bump_past(&obj.id);
        }
        (
            SceneGraph {
                objects: snapshot.objects,
            },
            ids,
        )
    }
}

/// Rewrite every external reference of `obj` into an absolute coordinate.
fn absolutize(
    obj: &mut Object,
    map: &ResolvedMap,
    internal: &HashMap<ObjectId, ObjectId>,
    node_distance: f64,
) -> Result<()> {
    let is_external = |rel: &Relationship| rel.references().iter().any(|r| !internal.contains_key(*r));
    let own_center = map.get(&obj.id).map(|b| b.center());
    match &mut obj.body {
        Body::Box { placement, .. } | Body::Text { placement } => {
            if let Some(rel) = placement.as_mut().filter(|rel| is_external(rel)) {
                let p = match (&*rel, own_center) {
                    // the resolved box already accounts for our own extent
                    (Relationship::DirectionalOffset { .. }, Some(center)) => center,
                    _ => map.relationship_point(rel, node_distance)?,
                };
                *rel = Relationship::AbsoluteCoordinate { x: p.x, y: p.y };
            }
        }
        Body::Brace { from, to } => {
            for rel in [from, to] {
                if is_external(rel) {
                    let p = map.relationship_point(rel, node_distance)?;
                    *rel = Relationship::AbsoluteCoordinate { x: p.x, y: p.y };
                }
            }
        }
        Body::Path { items } => {
            let marks = PathItem::marks(items);
            for item in items {
                let external = item
                    .references()
                    .iter()
                    .any(|r| !internal.contains_key(*r) && !marks.contains(*r));
                if !external {
                    continue;
                }
                let p = match &*item {
                    PathItem::NodeName {
                        name,
                        anchor,
                        xshift,
                        yshift,
                    } => {
                        let bbox = map.lookup(name)?;
                        let base = match anchor {
                            Some(a) => bbox.anchor(*a),
                            None => bbox.center(),
                        };
                        base + dvec2(xshift.unwrap_or(0.0), yshift.unwrap_or(0.0))
                    }
                    PathItem::Intersection { first, second } => {
                        dvec2(map.anchor_point(first)?.x, map.anchor_point(second)?.y)
                    }
                    _ => continue,
                };
                *item = PathItem::Coordinate {
                    x: p.x,
                    y: p.y,
                    relative: false,
                };
            }
        }
    }
    Ok(())
}

fn first_absolute(obj: &Object) -> Option<DVec2> {
    let of_rel = |rel: &Relationship| match rel {
        Relationship::AbsoluteCoordinate { x, y } => Some(dvec2(*x, *y)),
        _ => None,
    };
    match &obj.body {
        Body::Box { placement, .. } | Body::Text { placement } => placement.as_ref().and_then(of_rel),
        Body::Brace { from, to } => of_rel(from).or_else(|| of_rel(to)),
        Body::Path { items } => items.iter().find_map(|item| match item {
            PathItem::Coordinate {
                x,
                y,
                relative: false,
            } => Some(dvec2(*x, *y)),
            _ => None,
        }),
    }
}

fn translate(obj: &mut Object, delta: DVec2) {
    let shift = |rel: &mut Relationship| {
        if let Relationship::AbsoluteCoordinate { x, y } = rel {
            *x += delta.x;
            *y += delta.y;
        }
    };
    match &mut obj.body {
        Body::Box { placement, .. } | Body::Text { placement } => {
            if let Some(rel) = placement {
                shift(rel);
            }
        }
        Body::Brace { from, to } => {
            shift(from);
            shift(to);
        }
        Body::Path { items } => {
            for item in items {
                if let PathItem::Coordinate {
                    x,
                    y,
                    relative: false,
                } = item
                {
                    *x += delta.x;
                    *y += delta.y;
                }
            }
        }
    }
}

/// Persisted state: the objects as plain attribute maps plus the id counter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub objects: Vec<Object>,
    pub next_id: u64,
}

impl Snapshot {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Snapshot> {
        serde_json::from_str(json)
    }
}
