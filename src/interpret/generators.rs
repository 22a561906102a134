//! Compound primitives built in several steps: grids and trees.
//!
//! Each step places its objects relative to objects from earlier steps, so
//! the result renders symbolically and resolves without forward references.

use std::collections::HashMap;

use crate::errors::{Error, Result};
use crate::model::{Body, BoxShape, Direction, Object, ObjectId, PathItem, Relationship};
use crate::scene::IdGen;
use crate::settings::Settings;

/// What a generator produced.
#[derive(Debug, Clone, Default)]
pub struct Generated {
    /// In scene order.
    pub objects: Vec<Object>,
    /// The objects later clauses and texts apply to.
    pub targets: Vec<ObjectId>,
}

impl Generated {
    fn add(&mut self, object: Object, target: bool) -> ObjectId {
        let id = object.id.clone();
        if target {
            self.targets.push(id.clone());
        }
        self.objects.push(object);
        id
    }
}

pub trait Generator {
    fn name(&self) -> &'static str;

    /// How many size numbers `there.is.a.NAME.of.…` takes.
    fn arity(&self) -> usize;

    fn generate(&self, size: &[usize], ids: &mut IdGen, settings: &Settings) -> Result<Generated>;
}

fn node(id: ObjectId, placement: Option<Relationship>) -> Object {
    Object::new(
        id,
        Body::Box {
            shape: BoxShape::Rectangle,
            placement,
        },
    )
}

fn offset(direction: Direction, distance: Option<f64>, from: &ObjectId) -> Option<Relationship> {
    Some(Relationship::DirectionalOffset {
        direction,
        distance,
        from: from.clone(),
    })
}

/// `there.is.a.grid.of.C.by.R`: rows of boxes, one row per step.
#[derive(Debug, Clone, Copy, Default)]
pub struct Grid;

impl Generator for Grid {
    fn name(&self) -> &'static str {
        "grid"
    }

    fn arity(&self) -> usize {
        2
    }

    fn generate(&self, size: &[usize], ids: &mut IdGen, _settings: &Settings) -> Result<Generated> {
        let &[cols, rows] = size else {
            return Err(Error::unsupported("grid", "a grid needs columns and rows"));
        };
        if cols == 0 || rows == 0 {
            return Err(Error::unsupported("grid", "a grid needs at least one cell"));
        }
        let mut out = Generated::default();
        let mut row_start: Option<ObjectId> = None;
        for _ in 0..rows {
            let first = ids.next_id();
            let placement = row_start
                .as_ref()
                .and_then(|above| offset(Direction::Below, None, above));
            let mut left = out.add(node(first, placement), true);
            row_start = Some(left.clone());
            for _ in 1..cols {
                let cell = node(ids.next_id(), offset(Direction::Right, None, &left));
                left = out.add(cell, true);
            }
        }
        Ok(out)
    }
}

/// `there.is.a.tree.of.N`: a binary tree filled level by level, with an edge
/// from every node to its parent.
#[derive(Debug, Clone, Copy, Default)]
pub struct Tree;

impl Generator for Tree {
    fn name(&self) -> &'static str {
        "tree"
    }

    fn arity(&self) -> usize {
        1
    }

    fn generate(&self, size: &[usize], ids: &mut IdGen, settings: &Settings) -> Result<Generated> {
        let &[count] = size else {
            return Err(Error::unsupported("tree", "a tree needs a node count"));
        };
        if count == 0 {
            return Err(Error::unsupported("tree", "a tree needs at least one node"));
        }
        // levels below the root; leaves are one node distance apart
        let height = usize::BITS - count.leading_zeros() - 1;
        let mut out = Generated::default();
        let mut nodes: Vec<ObjectId> = Vec::with_capacity(count);
        for i in 0..count {
            let id = ids.next_id();
            let placement = if i == 0 {
                None
            } else {
                let parent = &nodes[(i - 1) / 2];
                let depth = usize::BITS - (i + 1).leading_zeros() - 1;
                let spread = settings.node_distance.raw() * f64::from(1u32 << (height - depth));
                let direction = if i % 2 == 1 {
                    Direction::BelowLeft
                } else {
                    Direction::BelowRight
                };
                offset(direction, Some(spread / 2.0), parent)
            };
            nodes.push(out.add(node(id, placement), true));
        }
        for (i, child) in nodes.iter().enumerate().skip(1) {
            let parent = &nodes[(i - 1) / 2];
            let edge = Object::new(
                ids.next_id(),
                Body::Path {
                    items: vec![
                        PathItem::node(parent.clone()),
                        PathItem::straight_line(),
                        PathItem::node(child.clone()),
                    ],
                },
            );
            out.add(edge, false);
        }
        Ok(out)
    }
}

/// Generators by name.
#[derive(Default)]
pub struct Generators {
    by_name: HashMap<&'static str, Box<dyn Generator>>,
}

impl Generators {
    pub fn builtin() -> Self {
        let mut generators = Self::default();
        generators.register(Grid);
        generators.register(Tree);
        generators
    }

    pub fn register(&mut self, generator: impl Generator + 'static) {
        self.by_name.insert(generator.name(), Box::new(generator));
    }

    pub fn get(&self, name: &str) -> Option<&dyn Generator> {
        self.by_name.get(name).map(|g| g.as_ref())
    }
}

impl std::fmt::Debug for Generators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.by_name.keys().collect();
        names.sort();
        f.debug_list().entries(names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::resolve_all;
    use crate::model::{Anchor, ObjectKind};
    use crate::scene::SceneGraph;

    fn build(generator: &dyn Generator, size: &[usize]) -> (SceneGraph, Generated) {
        let mut ids = IdGen::default();
        let generated = generator
            .generate(size, &mut ids, &Settings::default())
            .unwrap();
        let mut scene = SceneGraph::new();
        for obj in generated.objects.iter().cloned() {
            scene.push(obj);
        }
        (scene, generated)
    }

    #[test]
    fn grid_cells_line_up() {
        let (scene, generated) = build(&Grid, &[3, 2]);
        assert_eq!(generated.targets.len(), 6);
        let map = resolve_all(&scene, &Settings::default()).unwrap();
        let cell = |n: u64| map.get(&ObjectId::numbered(n)).unwrap().center();
        // same row, same y; same column, same x
        assert!((cell(0).y - cell(2).y).abs() < 1e-9);
        assert!((cell(0).x - cell(3).x).abs() < 1e-9);
        assert!(cell(3).y < cell(0).y);
    }

    #[test]
    fn tree_edges_follow_nodes() {
        let (scene, generated) = build(&Tree, &[7]);
        assert_eq!(generated.targets.len(), 7);
        let paths = scene.iter().filter(|o| o.kind() == ObjectKind::Path).count();
        assert_eq!(paths, 6);
        let map = resolve_all(&scene, &Settings::default()).unwrap();
        let root = map.get(&ObjectId::numbered(0)).unwrap();
        let left = map.get(&ObjectId::numbered(1)).unwrap();
        let right = map.get(&ObjectId::numbered(2)).unwrap();
        assert!(left.center().x < root.center().x);
        assert!(right.center().x > root.center().x);
        assert!(left.anchor(Anchor::North).y < root.anchor(Anchor::South).y);
        // leaves don't overlap
        let leaves: Vec<f64> = (3..7)
            .map(|n| map.get(&ObjectId::numbered(n)).unwrap().center().x)
            .collect();
        assert!(leaves.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn degenerate_sizes_are_rejected() {
        let mut ids = IdGen::default();
        let settings = Settings::default();
        assert!(Grid.generate(&[0, 3], &mut ids, &settings).is_err());
        assert!(Tree.generate(&[0], &mut ids, &settings).is_err());
        assert!(Grid.generate(&[2], &mut ids, &settings).is_err());
    }
}
