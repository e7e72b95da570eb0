//! Structural identifier allocation for days, exercises and sets.
//!
//! # Responsibility
//! - Issue positive ids per structural kind for one edit session.
//! - Reconcile caller-supplied id batches into a collision-free sequence.
//!
//! # Invariants
//! - Issued ids are strictly increasing per kind and never reissued, even
//!   after the element they named is deleted.
//! - A freshly issued id is always greater than every id the allocator has
//!   observed for that kind.
//! - Accepted ids lie in `1..=MAX_ELEMENT_ID`. Counters are seeded at or
//!   below that bound, so `allocate` never overflows and allocation cannot
//!   fail. Passing the bound takes more than two billion allocations in one
//!   session; a structure carrying such an id is then rejected at save.

use super::structure::ProgramStructure;
use std::collections::HashSet;

/// Positive structural element id (day, exercise or set).
pub type ElementId = i64;

/// Largest id a structure may carry or a batch may keep.
///
/// Ids above it are rejected by validation, skipped when seeding and
/// reallocated by `reconcile`.
pub const MAX_ELEMENT_ID: ElementId = i32::MAX as ElementId;

/// Returns whether `id` is inside the accepted id space.
pub fn is_valid_element_id(id: ElementId) -> bool {
    (1..=MAX_ELEMENT_ID).contains(&id)
}

/// Structural kind an id is issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdKind {
    Day,
    Exercise,
    Set,
}

impl IdKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Exercise => "exercise",
            Self::Set => "set",
        }
    }
}

/// Per-session id counter for all three structural kinds.
///
/// Each counter stores the highest id issued or observed so far.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdAllocator {
    last_day: ElementId,
    last_exercise: ElementId,
    last_set: ElementId,
}

impl IdAllocator {
    /// Creates an allocator whose first issued id is `1` for every kind.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an allocator positioned after every id already present in
    /// `structure`, so new elements never collide with loaded ones.
    pub fn seeded_from(structure: &ProgramStructure) -> Self {
        let mut allocator = Self::new();
        for day in &structure.days {
            allocator.observe(IdKind::Day, day.id);
            for exercise in &day.exercises {
                allocator.observe(IdKind::Exercise, exercise.id);
                for set in &exercise.sets {
                    allocator.observe(IdKind::Set, set.id);
                }
            }
        }
        allocator
    }

    /// Issues the next id for `kind`.
    pub fn allocate(&mut self, kind: IdKind) -> ElementId {
        let counter = self.counter_mut(kind);
        *counter += 1;
        *counter
    }

    /// Records an externally supplied id so later allocations stay above it.
    ///
    /// Ids outside `1..=MAX_ELEMENT_ID` are ignored; they can never equal an
    /// allocated id below the bound, and a structure carrying them fails
    /// validation before it is stored.
    pub fn observe(&mut self, kind: IdKind, id: ElementId) {
        if !is_valid_element_id(id) {
            return;
        }
        let counter = self.counter_mut(kind);
        if id > *counter {
            *counter = id;
        }
    }

    /// Highest id issued or observed for `kind` (`0` when none).
    pub fn last_issued(&self, kind: IdKind) -> ElementId {
        match kind {
            IdKind::Day => self.last_day,
            IdKind::Exercise => self.last_exercise,
            IdKind::Set => self.last_set,
        }
    }

    /// Turns a batch of candidate ids into a sequence of distinct valid ids.
    ///
    /// # Contract
    /// - Output length equals input length and keeps input order.
    /// - A candidate survives only if it is present, inside
    ///   `1..=MAX_ELEMENT_ID`, and is the first occurrence of that value in
    ///   the batch.
    /// - Every other slot receives a freshly allocated id, which is greater
    ///   than all surviving candidates.
    pub fn reconcile(&mut self, kind: IdKind, candidates: &[Option<ElementId>]) -> Vec<ElementId> {
        let mut seen = HashSet::with_capacity(candidates.len());
        let kept: Vec<Option<ElementId>> = candidates
            .iter()
            .map(|candidate| match candidate {
                Some(id) if is_valid_element_id(*id) && seen.insert(*id) => Some(*id),
                _ => None,
            })
            .collect();

        for id in kept.iter().flatten() {
            self.observe(kind, *id);
        }

        kept.into_iter()
            .map(|slot| slot.unwrap_or_else(|| self.allocate(kind)))
            .collect()
    }

    fn counter_mut(&mut self, kind: IdKind) -> &mut ElementId {
        match kind {
            IdKind::Day => &mut self.last_day,
            IdKind::Exercise => &mut self.last_exercise,
            IdKind::Set => &mut self.last_set,
        }
    }
}
