//! Program structure document: days → exercises → sets.
//!
//! # Responsibility
//! - Define the nested, serializable workout structure shared by canonical
//!   programs and vault forks.
//! - Provide structural edits as value-returning operations: every edit
//!   produces a new `ProgramStructure` and leaves the receiver untouched.
//!
//! # Invariants
//! - Day ids are unique within one structure.
//! - Exercise ids are unique within one structure, not only within a day.
//! - Set ids are unique within their owning exercise.
//! - All ids lie in `1..=MAX_ELEMENT_ID`.
//! - Set `weight`/`reps` are empty or ASCII digits only.
//! - Edits key strictly by id, never by position.

use super::ids::{is_valid_element_id, ElementId, IdAllocator, IdKind, MAX_ELEMENT_ID};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Number of empty sets attached to a newly added exercise.
pub const DEFAULT_SET_COUNT: usize = 3;

static NON_DIGIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^0-9]+").expect("valid non-digit regex"));

/// Weight unit for one exercise.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeightUnit {
    #[default]
    #[serde(rename = "KG")]
    Kg,
    #[serde(rename = "LBS")]
    Lbs,
}

impl WeightUnit {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Kg => "KG",
            Self::Lbs => "LBS",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "KG" => Some(Self::Kg),
            "LBS" => Some(Self::Lbs),
            _ => None,
        }
    }
}

/// Numeric field of one set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetField {
    Weight,
    Reps,
}

impl SetField {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Weight => "weight",
            Self::Reps => "reps",
        }
    }
}

/// One set row. Empty strings mean "not filled in yet".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkoutSet {
    pub id: ElementId,
    #[serde(default)]
    pub weight: String,
    #[serde(default)]
    pub reps: String,
}

impl WorkoutSet {
    pub fn empty(id: ElementId) -> Self {
        Self {
            id,
            weight: String::new(),
            reps: String::new(),
        }
    }
}

/// One exercise inside a day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exercise {
    pub id: ElementId,
    pub name: String,
    /// Muscle-group label from the external catalog; not validated here.
    pub muscle: String,
    #[serde(default)]
    pub unit: WeightUnit,
    #[serde(default)]
    pub sets: Vec<WorkoutSet>,
    #[serde(default)]
    pub notes: String,
}

/// One training day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Day {
    pub id: ElementId,
    #[serde(default)]
    pub exercises: Vec<Exercise>,
}

/// Full day/exercise/set tree owned by one program or one fork.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramStructure {
    #[serde(default)]
    pub days: Vec<Day>,
}

/// Candidate set supplied by a bulk set replacement.
///
/// `id` is only a candidate: missing, non-positive or duplicate values are
/// replaced during reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetDraft {
    pub id: Option<ElementId>,
    pub weight: String,
    pub reps: String,
}

impl From<&WorkoutSet> for SetDraft {
    fn from(value: &WorkoutSet) -> Self {
        Self {
            id: Some(value.id),
            weight: value.weight.clone(),
            reps: value.reps.clone(),
        }
    }
}

/// Partial exercise update. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExercisePatch {
    pub unit: Option<WeightUnit>,
    pub notes: Option<String>,
    /// Full replacement of the set sequence (replacement, not merge).
    pub sets: Option<Vec<SetDraft>>,
}

pub type StructureResult<T> = Result<T, StructureError>;

/// Structural edit and validation failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructureError {
    DayNotFound(ElementId),
    ExerciseNotFound {
        day_id: ElementId,
        exercise_id: ElementId,
    },
    SetNotFound {
        exercise_id: ElementId,
        set_id: ElementId,
    },
    NonNumericValue {
        field: SetField,
        value: String,
    },
    InvalidId {
        kind: IdKind,
        id: ElementId,
    },
    DuplicateId {
        kind: IdKind,
        id: ElementId,
    },
}

impl StructureError {
    /// Returns whether this error names an id absent from its scope.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::DayNotFound(_) | Self::ExerciseNotFound { .. } | Self::SetNotFound { .. }
        )
    }
}

impl Display for StructureError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DayNotFound(id) => write!(f, "day not found: {id}"),
            Self::ExerciseNotFound {
                day_id,
                exercise_id,
            } => write!(f, "exercise {exercise_id} not found in day {day_id}"),
            Self::SetNotFound {
                exercise_id,
                set_id,
            } => write!(f, "set {set_id} not found in exercise {exercise_id}"),
            Self::NonNumericValue { field, value } => {
                write!(f, "set {} must contain digits only, got `{value}`", field.as_str())
            }
            Self::InvalidId { kind, id } => {
                write!(
                    f,
                    "{} id must be between 1 and {MAX_ELEMENT_ID}, got {id}",
                    kind.as_str()
                )
            }
            Self::DuplicateId { kind, id } => {
                write!(f, "duplicate {} id {id} in the same scope", kind.as_str())
            }
        }
    }
}

impl Error for StructureError {}

/// Returns whether `value` is empty or consists of ASCII digits only.
pub fn is_numeric_value(value: &str) -> bool {
    value.bytes().all(|byte| byte.is_ascii_digit())
}

/// Strips every non-digit character from raw keystroke input.
pub fn sanitize_numeric_input(raw: &str) -> String {
    NON_DIGIT_RE.replace_all(raw, "").into_owned()
}

fn ensure_numeric(field: SetField, value: &str) -> StructureResult<()> {
    if is_numeric_value(value) {
        Ok(())
    } else {
        Err(StructureError::NonNumericValue {
            field,
            value: value.to_string(),
        })
    }
}

fn ensure_valid_id(kind: IdKind, id: ElementId) -> StructureResult<()> {
    if is_valid_element_id(id) {
        Ok(())
    } else {
        Err(StructureError::InvalidId { kind, id })
    }
}

impl ProgramStructure {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn day(&self, day_id: ElementId) -> Option<&Day> {
        self.days.iter().find(|day| day.id == day_id)
    }

    pub fn exercise(&self, day_id: ElementId, exercise_id: ElementId) -> Option<&Exercise> {
        self.day(day_id)?
            .exercises
            .iter()
            .find(|exercise| exercise.id == exercise_id)
    }

    /// Checks every structural invariant listed in the module docs.
    pub fn validate(&self) -> StructureResult<()> {
        let mut day_ids = HashSet::new();
        let mut exercise_ids = HashSet::new();
        for day in &self.days {
            ensure_valid_id(IdKind::Day, day.id)?;
            if !day_ids.insert(day.id) {
                return Err(StructureError::DuplicateId {
                    kind: IdKind::Day,
                    id: day.id,
                });
            }

            for exercise in &day.exercises {
                ensure_valid_id(IdKind::Exercise, exercise.id)?;
                if !exercise_ids.insert(exercise.id) {
                    return Err(StructureError::DuplicateId {
                        kind: IdKind::Exercise,
                        id: exercise.id,
                    });
                }

                let mut set_ids = HashSet::new();
                for set in &exercise.sets {
                    ensure_valid_id(IdKind::Set, set.id)?;
                    if !set_ids.insert(set.id) {
                        return Err(StructureError::DuplicateId {
                            kind: IdKind::Set,
                            id: set.id,
                        });
                    }
                    ensure_numeric(SetField::Weight, &set.weight)?;
                    ensure_numeric(SetField::Reps, &set.reps)?;
                }
            }
        }
        Ok(())
    }

    /// Appends an empty day with a freshly allocated id.
    pub fn with_day_added(&self, allocator: &mut IdAllocator) -> (Self, ElementId) {
        let mut next = self.clone();
        let day_id = allocator.allocate(IdKind::Day);
        next.days.push(Day {
            id: day_id,
            exercises: Vec::new(),
        });
        (next, day_id)
    }

    pub fn without_day(&self, day_id: ElementId) -> StructureResult<Self> {
        if self.day(day_id).is_none() {
            return Err(StructureError::DayNotFound(day_id));
        }
        let mut next = self.clone();
        next.days.retain(|day| day.id != day_id);
        Ok(next)
    }

    /// Appends a new exercise with default unit, empty notes and
    /// `DEFAULT_SET_COUNT` empty sets to the end of `day_id`.
    pub fn with_exercise_added(
        &self,
        allocator: &mut IdAllocator,
        day_id: ElementId,
        muscle: &str,
        name: &str,
    ) -> StructureResult<(Self, ElementId)> {
        let mut next = self.clone();
        let day = next
            .days
            .iter_mut()
            .find(|day| day.id == day_id)
            .ok_or(StructureError::DayNotFound(day_id))?;

        let exercise_id = allocator.allocate(IdKind::Exercise);
        let sets = (0..DEFAULT_SET_COUNT)
            .map(|_| WorkoutSet::empty(allocator.allocate(IdKind::Set)))
            .collect();
        day.exercises.push(Exercise {
            id: exercise_id,
            name: name.to_string(),
            muscle: muscle.to_string(),
            unit: WeightUnit::default(),
            sets,
            notes: String::new(),
        });
        Ok((next, exercise_id))
    }

    pub fn without_exercise(
        &self,
        day_id: ElementId,
        exercise_id: ElementId,
    ) -> StructureResult<Self> {
        if self.exercise(day_id, exercise_id).is_none() {
            return Err(self.missing_exercise(day_id, exercise_id));
        }
        let mut next = self.clone();
        if let Some(day) = next.days.iter_mut().find(|day| day.id == day_id) {
            day.exercises.retain(|exercise| exercise.id != exercise_id);
        }
        Ok(next)
    }

    /// Merges `patch` into one exercise.
    ///
    /// # Contract
    /// - Non-digit set values are rejected before anything is allocated.
    /// - A supplied set sequence is reconciled through the allocator and
    ///   replaces the existing sequence outright.
    pub fn with_exercise_updated(
        &self,
        allocator: &mut IdAllocator,
        day_id: ElementId,
        exercise_id: ElementId,
        patch: &ExercisePatch,
    ) -> StructureResult<Self> {
        if let Some(drafts) = &patch.sets {
            for draft in drafts {
                ensure_numeric(SetField::Weight, &draft.weight)?;
                ensure_numeric(SetField::Reps, &draft.reps)?;
            }
        }

        let (next, ()) = self.edit_exercise(day_id, exercise_id, |exercise| {
            if let Some(unit) = patch.unit {
                exercise.unit = unit;
            }
            if let Some(notes) = &patch.notes {
                exercise.notes.clone_from(notes);
            }
            if let Some(drafts) = &patch.sets {
                let candidates: Vec<Option<ElementId>> =
                    drafts.iter().map(|draft| draft.id).collect();
                let ids = allocator.reconcile(IdKind::Set, &candidates);
                exercise.sets = drafts
                    .iter()
                    .zip(ids)
                    .map(|(draft, id)| WorkoutSet {
                        id,
                        weight: draft.weight.clone(),
                        reps: draft.reps.clone(),
                    })
                    .collect();
            }
            Ok(())
        })?;
        Ok(next)
    }

    /// Changes exercise identity (name and muscle) keeping id and sets.
    pub fn with_exercise_retargeted(
        &self,
        day_id: ElementId,
        exercise_id: ElementId,
        name: &str,
        muscle: &str,
    ) -> StructureResult<Self> {
        let (next, ()) = self.edit_exercise(day_id, exercise_id, |exercise| {
            exercise.name = name.to_string();
            exercise.muscle = muscle.to_string();
            Ok(())
        })?;
        Ok(next)
    }

    pub fn with_set_added(
        &self,
        allocator: &mut IdAllocator,
        day_id: ElementId,
        exercise_id: ElementId,
    ) -> StructureResult<(Self, ElementId)> {
        self.edit_exercise(day_id, exercise_id, |exercise| {
            let set_id = allocator.allocate(IdKind::Set);
            exercise.sets.push(WorkoutSet::empty(set_id));
            Ok(set_id)
        })
    }

    pub fn without_set(
        &self,
        day_id: ElementId,
        exercise_id: ElementId,
        set_id: ElementId,
    ) -> StructureResult<Self> {
        let (next, ()) = self.edit_exercise(day_id, exercise_id, |exercise| {
            let before = exercise.sets.len();
            exercise.sets.retain(|set| set.id != set_id);
            if exercise.sets.len() == before {
                return Err(StructureError::SetNotFound {
                    exercise_id,
                    set_id,
                });
            }
            Ok(())
        })?;
        Ok(next)
    }

    /// Stores one already-validated numeric value into a set field.
    pub fn with_set_value(
        &self,
        day_id: ElementId,
        exercise_id: ElementId,
        set_id: ElementId,
        field: SetField,
        value: &str,
    ) -> StructureResult<Self> {
        ensure_numeric(field, value)?;
        let (next, ()) = self.edit_exercise(day_id, exercise_id, |exercise| {
            let set = exercise
                .sets
                .iter_mut()
                .find(|set| set.id == set_id)
                .ok_or(StructureError::SetNotFound {
                    exercise_id,
                    set_id,
                })?;
            match field {
                SetField::Weight => set.weight = value.to_string(),
                SetField::Reps => set.reps = value.to_string(),
            }
            Ok(())
        })?;
        Ok(next)
    }

    fn edit_exercise<T>(
        &self,
        day_id: ElementId,
        exercise_id: ElementId,
        edit: impl FnOnce(&mut Exercise) -> StructureResult<T>,
    ) -> StructureResult<(Self, T)> {
        let mut next = self.clone();
        let day = next
            .days
            .iter_mut()
            .find(|day| day.id == day_id)
            .ok_or(StructureError::DayNotFound(day_id))?;
        let exercise = day
            .exercises
            .iter_mut()
            .find(|exercise| exercise.id == exercise_id)
            .ok_or(StructureError::ExerciseNotFound {
                day_id,
                exercise_id,
            })?;
        let output = edit(exercise)?;
        Ok((next, output))
    }

    fn missing_exercise(&self, day_id: ElementId, exercise_id: ElementId) -> StructureError {
        if self.day(day_id).is_none() {
            StructureError::DayNotFound(day_id)
        } else {
            StructureError::ExerciseNotFound {
                day_id,
                exercise_id,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        is_numeric_value, sanitize_numeric_input, ExercisePatch, IdAllocator, ProgramStructure,
        SetDraft, SetField, StructureError, WeightUnit, DEFAULT_SET_COUNT,
    };

    fn one_day() -> (ProgramStructure, IdAllocator) {
        let mut allocator = IdAllocator::new();
        let (structure, _) = ProgramStructure::new().with_day_added(&mut allocator);
        (structure, allocator)
    }

    #[test]
    fn sanitize_keeps_digits_only() {
        assert_eq!(sanitize_numeric_input("6o.5 kg"), "65");
        assert_eq!(sanitize_numeric_input(""), "");
        assert!(is_numeric_value(""));
        assert!(!is_numeric_value("1e3"));
    }

    #[test]
    fn added_exercise_gets_defaults_and_leaves_receiver_untouched() {
        let (structure, mut allocator) = one_day();
        let (next, exercise_id) = structure
            .with_exercise_added(&mut allocator, 1, "Chest", "Bench Press")
            .unwrap();

        assert!(structure.day(1).unwrap().exercises.is_empty());
        let exercise = next.exercise(1, exercise_id).unwrap();
        assert_eq!(exercise.unit, WeightUnit::Kg);
        assert_eq!(exercise.sets.len(), DEFAULT_SET_COUNT);
        assert!(exercise.notes.is_empty());
        assert!(exercise
            .sets
            .iter()
            .all(|set| set.weight.is_empty() && set.reps.is_empty()));
        next.validate().unwrap();
    }

    #[test]
    fn update_rejects_non_digit_sets_without_allocating() {
        let (structure, mut allocator) = one_day();
        let (structure, exercise_id) = structure
            .with_exercise_added(&mut allocator, 1, "Back", "Deadlift")
            .unwrap();
        let before = allocator.clone();

        let patch = ExercisePatch {
            sets: Some(vec![SetDraft {
                id: None,
                weight: "12kg".to_string(),
                reps: String::new(),
            }]),
            ..ExercisePatch::default()
        };
        let err = structure
            .with_exercise_updated(&mut allocator, 1, exercise_id, &patch)
            .unwrap_err();

        assert!(matches!(
            err,
            StructureError::NonNumericValue {
                field: SetField::Weight,
                ..
            }
        ));
        assert_eq!(allocator, before);
    }

    #[test]
    fn validate_rejects_exercise_id_reused_across_days() {
        let (structure, mut allocator) = one_day();
        let (structure, _) = structure.with_day_added(&mut allocator);
        let (mut structure, exercise_id) = structure
            .with_exercise_added(&mut allocator, 1, "Legs", "Squat")
            .unwrap();
        let copy = structure.days[0].exercises[0].clone();
        structure.days[1].exercises.push(copy);

        let err = structure.validate().unwrap_err();
        assert!(matches!(err, StructureError::DuplicateId { id, .. } if id == exercise_id));
    }

    #[test]
    fn structure_serializes_with_document_field_names() {
        let (structure, mut allocator) = one_day();
        let (structure, _) = structure
            .with_exercise_added(&mut allocator, 1, "Shoulders", "Overhead Press")
            .unwrap();

        let json = serde_json::to_value(&structure).unwrap();
        let exercise = &json["days"][0]["exercises"][0];
        assert_eq!(exercise["unit"], "KG");
        assert_eq!(exercise["muscle"], "Shoulders");
        assert_eq!(exercise["sets"][0]["weight"], "");
    }
}
