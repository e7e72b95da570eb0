//! In-memory edit session over one program view.
//!
//! # Responsibility
//! - Hold the session-owned copy of a structure plus its id allocator.
//! - Gate structural edits behind an explicit `modify` request.
//! - Track the active day, the undo history and the membership the session
//!   has been saved into.
//!
//! # Invariants
//! - The session never writes to storage; saving goes through
//!   `VaultService`.
//! - Structural edits fail with `NotEditing` while in `Viewing`.
//! - Every edit replaces `structure` with a new value; a failed edit leaves
//!   structure, history and active day untouched.
//! - The allocator only moves forward, undo included.
//! - Undo history holds at most `MAX_UNDO_DEPTH` structures; the oldest is
//!   dropped first.

use super::{DeleteOutcome, ErrorKind};
use crate::model::ids::{ElementId, IdAllocator};
use crate::model::program::{Program, ProgramId};
use crate::model::structure::{
    sanitize_numeric_input, Day, ExercisePatch, ProgramStructure, SetField, StructureError,
};
use crate::model::vault::{ForkSnapshot, MembershipId, VaultEntry, VaultMembership};
use std::collections::VecDeque;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Number of previous structures kept for undo.
pub const MAX_UNDO_DEPTH: usize = 64;

/// Save-relevant phase of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Canonical or saved content, unmodified.
    Viewing,
    /// `modify` was requested; saves produce a fork.
    Editing,
}

/// Where the session's structure was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOrigin {
    /// Canonical program structure.
    Canonical,
    /// A fork membership's own snapshot.
    Fork,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Structural edit attempted while viewing.
    NotEditing,
    /// Session structure has no day to scope the edit to.
    NoActiveDay,
    Structure(StructureError),
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotEditing => ErrorKind::Conflict,
            Self::NoActiveDay => ErrorKind::NotFound,
            Self::Structure(err) if err.is_not_found() => ErrorKind::NotFound,
            Self::Structure(_) => ErrorKind::InvalidInput,
        }
    }
}

impl Display for SessionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotEditing => write!(f, "session is not in editing mode"),
            Self::NoActiveDay => write!(f, "session has no active day"),
            Self::Structure(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SessionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Structure(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StructureError> for SessionError {
    fn from(value: StructureError) -> Self {
        Self::Structure(value)
    }
}

pub type SessionResult<T> = Result<T, SessionError>;

/// Single-writer edit session for one user and one program instance.
#[derive(Debug, Clone)]
pub struct EditSession {
    program_id: ProgramId,
    origin: SessionOrigin,
    membership_id: Option<MembershipId>,
    display_name: String,
    state: SessionState,
    structure: ProgramStructure,
    history: VecDeque<ProgramStructure>,
    allocator: IdAllocator,
    active_day: Option<ElementId>,
}

impl EditSession {
    /// Opens a viewing session over a canonical program.
    pub fn from_program(program: &Program) -> Self {
        Self::open(
            program.id,
            SessionOrigin::Canonical,
            None,
            program.title.clone(),
            program.structure.clone(),
        )
    }

    /// Opens a viewing session over a saved membership.
    ///
    /// References load the canonical structure of `program`; forks load
    /// their own snapshot.
    pub fn from_membership(program: &Program, membership: &VaultMembership) -> Self {
        match &membership.entry {
            VaultEntry::Reference => Self::open(
                program.id,
                SessionOrigin::Canonical,
                Some(membership.id),
                program.title.clone(),
                program.structure.clone(),
            ),
            VaultEntry::Fork(snapshot) => Self::open(
                membership.program_id,
                SessionOrigin::Fork,
                Some(membership.id),
                snapshot.display_name.clone(),
                snapshot.structure.clone(),
            ),
        }
    }

    fn open(
        program_id: ProgramId,
        origin: SessionOrigin,
        membership_id: Option<MembershipId>,
        display_name: String,
        structure: ProgramStructure,
    ) -> Self {
        let allocator = IdAllocator::seeded_from(&structure);
        let active_day = structure.days.first().map(|day| day.id);
        Self {
            program_id,
            origin,
            membership_id,
            display_name,
            state: SessionState::Viewing,
            structure,
            history: VecDeque::new(),
            allocator,
            active_day,
        }
    }

    pub fn program_id(&self) -> ProgramId {
        self.program_id
    }

    pub fn origin(&self) -> SessionOrigin {
        self.origin
    }

    /// Membership this session saves into, once known.
    pub fn membership_id(&self) -> Option<MembershipId> {
        self.membership_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_editing(&self) -> bool {
        self.state == SessionState::Editing
    }

    pub fn structure(&self) -> &ProgramStructure {
        &self.structure
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn active_day_id(&self) -> Option<ElementId> {
        self.active_day
    }

    pub fn active_day(&self) -> Option<&Day> {
        self.active_day.and_then(|day_id| self.structure.day(day_id))
    }

    pub fn can_undo(&self) -> bool {
        !self.history.is_empty()
    }

    /// Builds the fork snapshot a save would persist.
    pub fn fork_snapshot(&self) -> ForkSnapshot {
        ForkSnapshot::new(&self.display_name, self.structure.clone())
    }

    /// Enters editing mode. Idempotent.
    pub fn modify(&mut self) {
        self.state = SessionState::Editing;
    }

    pub fn select_day(&mut self, day_id: ElementId) -> SessionResult<()> {
        if self.structure.day(day_id).is_none() {
            return Err(StructureError::DayNotFound(day_id).into());
        }
        self.active_day = Some(day_id);
        Ok(())
    }

    /// Appends a day and makes it active.
    pub fn add_day(&mut self) -> SessionResult<ElementId> {
        self.ensure_editing()?;
        let (next, day_id) = self.structure.with_day_added(&mut self.allocator);
        self.commit(next);
        self.active_day = Some(day_id);
        Ok(day_id)
    }

    pub fn delete_day(&mut self, day_id: ElementId) -> SessionResult<DeleteOutcome> {
        self.ensure_editing()?;
        match self.structure.without_day(day_id) {
            Ok(next) => {
                self.commit(next);
                Ok(DeleteOutcome::Deleted)
            }
            Err(StructureError::DayNotFound(_)) => Ok(DeleteOutcome::NotFound),
            Err(err) => Err(err.into()),
        }
    }

    /// Appends a new exercise with default sets to the active day.
    pub fn add_exercise(&mut self, muscle: &str, name: &str) -> SessionResult<ElementId> {
        self.ensure_editing()?;
        let day_id = self.require_active_day()?;
        let (next, exercise_id) =
            self.structure
                .with_exercise_added(&mut self.allocator, day_id, muscle, name)?;
        self.commit(next);
        Ok(exercise_id)
    }

    /// Removes an exercise from the active day; absent ids are a no-op.
    pub fn delete_exercise(&mut self, exercise_id: ElementId) -> SessionResult<DeleteOutcome> {
        self.ensure_editing()?;
        let day_id = self.require_active_day()?;
        match self.structure.without_exercise(day_id, exercise_id) {
            Ok(next) => {
                self.commit(next);
                Ok(DeleteOutcome::Deleted)
            }
            Err(StructureError::ExerciseNotFound { .. }) => Ok(DeleteOutcome::NotFound),
            Err(err) => Err(err.into()),
        }
    }

    pub fn update_exercise(
        &mut self,
        exercise_id: ElementId,
        patch: &ExercisePatch,
    ) -> SessionResult<()> {
        self.ensure_editing()?;
        let day_id = self.require_active_day()?;
        let next =
            self.structure
                .with_exercise_updated(&mut self.allocator, day_id, exercise_id, patch)?;
        self.commit(next);
        Ok(())
    }

    pub fn retarget_exercise(
        &mut self,
        exercise_id: ElementId,
        name: &str,
        muscle: &str,
    ) -> SessionResult<()> {
        self.ensure_editing()?;
        let day_id = self.require_active_day()?;
        let next = self
            .structure
            .with_exercise_retargeted(day_id, exercise_id, name, muscle)?;
        self.commit(next);
        Ok(())
    }

    pub fn add_set(&mut self, exercise_id: ElementId) -> SessionResult<ElementId> {
        self.ensure_editing()?;
        let day_id = self.require_active_day()?;
        let (next, set_id) =
            self.structure
                .with_set_added(&mut self.allocator, day_id, exercise_id)?;
        self.commit(next);
        Ok(set_id)
    }

    /// Removes a set; a missing set is a no-op, a missing exercise is not.
    pub fn delete_set(
        &mut self,
        exercise_id: ElementId,
        set_id: ElementId,
    ) -> SessionResult<DeleteOutcome> {
        self.ensure_editing()?;
        let day_id = self.require_active_day()?;
        match self.structure.without_set(day_id, exercise_id, set_id) {
            Ok(next) => {
                self.commit(next);
                Ok(DeleteOutcome::Deleted)
            }
            Err(StructureError::SetNotFound { .. }) => Ok(DeleteOutcome::NotFound),
            Err(err) => Err(err.into()),
        }
    }

    /// Stores raw keystroke input as weight after dropping non-digits.
    pub fn set_weight(
        &mut self,
        exercise_id: ElementId,
        set_id: ElementId,
        raw: &str,
    ) -> SessionResult<()> {
        self.set_value(exercise_id, set_id, SetField::Weight, raw)
    }

    /// Stores raw keystroke input as reps after dropping non-digits.
    pub fn set_reps(
        &mut self,
        exercise_id: ElementId,
        set_id: ElementId,
        raw: &str,
    ) -> SessionResult<()> {
        self.set_value(exercise_id, set_id, SetField::Reps, raw)
    }

    fn set_value(
        &mut self,
        exercise_id: ElementId,
        set_id: ElementId,
        field: SetField,
        raw: &str,
    ) -> SessionResult<()> {
        self.ensure_editing()?;
        let day_id = self.require_active_day()?;
        let value = sanitize_numeric_input(raw);
        let next = self
            .structure
            .with_set_value(day_id, exercise_id, set_id, field, &value)?;
        self.commit(next);
        Ok(())
    }

    /// Sets the fork display name; blank names resolve at save time.
    pub fn rename(&mut self, display_name: &str) -> SessionResult<()> {
        self.ensure_editing()?;
        self.display_name = display_name.to_string();
        Ok(())
    }

    /// Restores the structure before the latest successful edit.
    ///
    /// Returns `false` when there is nothing to undo.
    pub fn undo(&mut self) -> bool {
        match self.history.pop_back() {
            Some(previous) => {
                self.structure = previous;
                self.repair_active_day();
                true
            }
            None => false,
        }
    }

    /// Records the membership a save produced, so later saves update it.
    pub(crate) fn attach_membership(&mut self, membership: &VaultMembership) {
        self.membership_id = Some(membership.id);
        if membership.entry.is_fork() {
            self.origin = SessionOrigin::Fork;
        }
    }

    fn ensure_editing(&self) -> SessionResult<()> {
        if self.is_editing() {
            Ok(())
        } else {
            Err(SessionError::NotEditing)
        }
    }

    fn require_active_day(&self) -> SessionResult<ElementId> {
        self.active_day.ok_or(SessionError::NoActiveDay)
    }

    fn commit(&mut self, next: ProgramStructure) {
        let previous = std::mem::replace(&mut self.structure, next);
        if self.history.len() == MAX_UNDO_DEPTH {
            self.history.pop_front();
        }
        self.history.push_back(previous);
        self.repair_active_day();
    }

    fn repair_active_day(&mut self) {
        let still_present = self
            .active_day
            .is_some_and(|day_id| self.structure.day(day_id).is_some());
        if !still_present {
            self.active_day = self.structure.days.first().map(|day| day.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{EditSession, SessionError, SessionOrigin, SessionState, MAX_UNDO_DEPTH};
    use crate::model::program::{Program, ProgramDraft};
    use crate::model::structure::{Day, ProgramStructure};
    use crate::service::{DeleteOutcome, ErrorKind};

    fn program_with_days(day_ids: &[i64]) -> Program {
        let structure = ProgramStructure {
            days: day_ids
                .iter()
                .map(|id| Day {
                    id: *id,
                    exercises: Vec::new(),
                })
                .collect(),
        };
        Program::system(ProgramDraft {
            title: "Starter".to_string(),
            structure,
            ..ProgramDraft::default()
        })
        .unwrap()
    }

    #[test]
    fn edits_require_modify() {
        let program = program_with_days(&[1]);
        let mut session = EditSession::from_program(&program);
        assert_eq!(session.state(), SessionState::Viewing);
        assert_eq!(session.origin(), SessionOrigin::Canonical);

        let err = session.add_exercise("chest", "Bench Press").unwrap_err();
        assert_eq!(err, SessionError::NotEditing);
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(session.structure(), &program.structure);
    }

    #[test]
    fn deleting_active_day_moves_to_first_remaining() {
        let program = program_with_days(&[1, 2, 3]);
        let mut session = EditSession::from_program(&program);
        session.modify();
        session.select_day(2).unwrap();

        assert_eq!(session.delete_day(2).unwrap(), DeleteOutcome::Deleted);
        assert_eq!(session.active_day_id(), Some(1));
        assert_eq!(session.delete_day(2).unwrap(), DeleteOutcome::NotFound);
    }

    #[test]
    fn undo_restores_previous_structure_without_rewinding_ids() {
        let program = program_with_days(&[1]);
        let mut session = EditSession::from_program(&program);
        session.modify();

        let first = session.add_exercise("legs", "Squat").unwrap();
        assert!(session.undo());
        assert_eq!(session.structure(), &program.structure);

        let second = session.add_exercise("legs", "Squat").unwrap();
        assert!(second > first);
        assert!(session.undo());
        assert!(!session.undo());
    }

    #[test]
    fn keystroke_input_is_filtered_to_digits() {
        let program = program_with_days(&[1]);
        let mut session = EditSession::from_program(&program);
        session.modify();
        let exercise_id = session.add_exercise("back", "Row").unwrap();
        let set_id = session.active_day().unwrap().exercises[0].sets[0].id;

        session.set_weight(exercise_id, set_id, "6a0kg").unwrap();
        session.set_reps(exercise_id, set_id, " 8 ").unwrap();

        let set = &session.active_day().unwrap().exercises[0].sets[0];
        assert_eq!(set.weight, "60");
        assert_eq!(set.reps, "8");
    }

    #[test]
    fn edits_without_days_report_missing_active_day() {
        let program = program_with_days(&[]);
        let mut session = EditSession::from_program(&program);
        session.modify();
        let err = session.add_exercise("arms", "Curl").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn undo_history_keeps_only_the_latest_edits() {
        let program = program_with_days(&[1]);
        let mut session = EditSession::from_program(&program);
        session.modify();
        for _ in 0..MAX_UNDO_DEPTH + 10 {
            session.add_day().unwrap();
        }

        let mut undone = 0;
        while session.undo() {
            undone += 1;
        }
        assert_eq!(undone, MAX_UNDO_DEPTH);
        assert_eq!(session.structure().days.len(), 11);
    }
}
