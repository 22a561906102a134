//! Interpreter phases.
//!
//! What the next clause applies to is one tagged union instead of a handful
//! of loosely related flags, so "filtering while building a path" simply
//! cannot be expressed.

use crate::model::ObjectId;

/// Whether `and.…` clauses narrow the batch or write to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterMode {
    #[default]
    Mutate,
    Filter,
}

/// The object(s) clauses currently apply to.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Single(ObjectId),
    Batch(Vec<ObjectId>),
}

impl Target {
    pub fn ids(&self) -> &[ObjectId] {
        match self {
            Target::Single(id) => std::slice::from_ref(id),
            Target::Batch(ids) => ids,
        }
    }

    pub fn contains(&self, id: &ObjectId) -> bool {
        self.ids().contains(id)
    }

    /// Keep the targets `keep` accepts. A single target becomes a batch so an
    /// empty result is representable.
    pub fn retain(&mut self, mut keep: impl FnMut(&ObjectId) -> bool) {
        let mut ids = self.ids().to_vec();
        ids.retain(|id| keep(id));
        *self = Target::Batch(ids);
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Targeting {
        target: Target,
        mode: FilterMode,
        /// Next target for one-text-each assignment.
        cursor: usize,
    },
    BuildingPath {
        path: ObjectId,
        /// Index of the last `Line` item, for labels.
        line: Option<usize>,
    },
}

impl Phase {
    pub fn targeting(target: Target) -> Phase {
        Phase::Targeting {
            target,
            mode: FilterMode::Mutate,
            cursor: 0,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Targeting { .. } => "targeting",
            Phase::BuildingPath { .. } => "building path",
        }
    }

    /// Ids that attribute clauses write to; `None` when idle.
    pub fn targets(&self) -> Option<Vec<ObjectId>> {
        match self {
            Phase::Idle => None,
            Phase::Targeting { target, .. } => Some(target.ids().to_vec()),
            Phase::BuildingPath { path, .. } => Some(vec![path.clone()]),
        }
    }

    /// Whether the current phase refers to `id` in any way.
    pub fn mentions(&self, id: &ObjectId) -> bool {
        match self {
            Phase::Idle => false,
            Phase::Targeting { target, .. } => target.contains(id),
            Phase::BuildingPath { path, .. } => path == id,
        }
    }

    pub fn set_mode(&mut self, new: FilterMode) {
        if let Phase::Targeting { mode, .. } = self {
            *mode = new;
        }
    }

    pub fn mode(&self) -> FilterMode {
        match self {
            Phase::Targeting { mode, .. } => *mode,
            _ => FilterMode::Mutate,
        }
    }

    /// Take the next target for one-text-each assignment.
    ///
    /// Returns the id and whether more targets remain after it.
    pub fn next_in_turn(&mut self) -> Option<(ObjectId, bool)> {
        match self {
            Phase::Targeting { target, cursor, .. } => {
                let ids = target.ids();
                let id = ids.get(*cursor)?.clone();
                *cursor += 1;
                Some((id, *cursor < ids.len()))
            }
            Phase::BuildingPath { path, .. } => Some((path.clone(), false)),
            Phase::Idle => None,
        }
    }

    pub fn rewind(&mut self) {
        if let Phase::Targeting { cursor, .. } = self {
            *cursor = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(n: u64) -> Phase {
        Phase::targeting(Target::Batch((0..n).map(ObjectId::numbered).collect()))
    }

    #[test]
    fn idle_has_no_targets() {
        assert!(Phase::Idle.targets().is_none());
        assert_eq!(batch(2).targets().map(|t| t.len()), Some(2));
    }

    #[test]
    fn turns_run_out() {
        let mut phase = batch(2);
        assert_eq!(phase.next_in_turn(), Some((ObjectId::numbered(0), true)));
        assert_eq!(phase.next_in_turn(), Some((ObjectId::numbered(1), false)));
        assert_eq!(phase.next_in_turn(), None);
        phase.rewind();
        assert_eq!(phase.next_in_turn(), Some((ObjectId::numbered(0), true)));
    }

    #[test]
    fn retain_can_empty_a_single_target() {
        let mut target = Target::Single(ObjectId::numbered(4));
        target.retain(|_| false);
        assert_eq!(target, Target::Batch(vec![]));
    }

    #[test]
    fn mode_only_exists_while_targeting() {
        let mut phase = batch(1);
        phase.set_mode(FilterMode::Filter);
        assert_eq!(phase.mode(), FilterMode::Filter);
        let mut idle = Phase::Idle;
        idle.set_mode(FilterMode::Filter);
        assert_eq!(idle.mode(), FilterMode::Mutate);
    }
}
