use jadwal_core::{
    Day, DeleteOutcome, EditSession, ErrorKind, Exercise, ExercisePatch, Program, ProgramDraft,
    ProgramStructure, ProgramValidationError, SetDraft, StructureError, WeightUnit, WorkoutSet,
    MAX_ELEMENT_ID,
};
use std::collections::HashSet;

fn bench_program() -> Program {
    Program::system(ProgramDraft {
        title: "Bench Focus".to_string(),
        structure: ProgramStructure {
            days: vec![Day {
                id: 1,
                exercises: vec![Exercise {
                    id: 1,
                    name: "Bench Press".to_string(),
                    muscle: "chest".to_string(),
                    unit: WeightUnit::Kg,
                    sets: (1..=3).map(WorkoutSet::empty).collect(),
                    notes: String::new(),
                }],
            }],
        },
        ..ProgramDraft::default()
    })
    .unwrap()
}

fn editing_session() -> EditSession {
    let mut session = EditSession::from_program(&bench_program());
    session.modify();
    session
}

fn set_ids(session: &EditSession, exercise_id: i64) -> Vec<i64> {
    session
        .structure()
        .exercise(1, exercise_id)
        .unwrap()
        .sets
        .iter()
        .map(|set| set.id)
        .collect()
}

/// Deterministic xorshift so failures reproduce.
struct Steps(u64);

impl Steps {
    fn next(&mut self) -> u64 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        self.0
    }
}

#[test]
fn added_exercise_gets_defaults_and_three_fresh_sets() {
    let mut session = editing_session();
    let exercise_id = session.add_exercise("shoulders", "Overhead Press").unwrap();

    let day = session.active_day().unwrap();
    assert_eq!(day.exercises.len(), 2);
    assert_eq!(day.exercises[0].name, "Bench Press");
    let added = &day.exercises[1];
    assert_eq!(added.id, exercise_id);
    assert_ne!(added.id, 1);
    assert_eq!(added.unit, WeightUnit::Kg);
    assert!(added.notes.is_empty());
    assert_eq!(added.sets.len(), 3);
    assert!(added
        .sets
        .iter()
        .all(|set| set.weight.is_empty() && set.reps.is_empty()));
}

#[test]
fn set_ids_stay_distinct_and_are_never_reissued() {
    for seed in [7_u64, 42, 1_234_567, 99_999_989] {
        let mut session = editing_session();
        let mut steps = Steps(seed);
        let mut issued: HashSet<i64> = set_ids(&session, 1).into_iter().collect();

        for _ in 0..200 {
            let current = set_ids(&session, 1);
            if current.is_empty() || steps.next() % 3 != 0 {
                let set_id = session.add_set(1).unwrap();
                assert!(issued.insert(set_id), "set id {set_id} was reissued");
            } else {
                let victim = current[(steps.next() as usize) % current.len()];
                assert_eq!(session.delete_set(1, victim).unwrap(), DeleteOutcome::Deleted);
            }

            let surviving = set_ids(&session, 1);
            let distinct: HashSet<i64> = surviving.iter().copied().collect();
            assert_eq!(distinct.len(), surviving.len());
        }
    }
}

#[test]
fn bulk_set_replacement_reconciles_bad_candidates() {
    let mut session = editing_session();
    let batches: Vec<Vec<Option<i64>>> = vec![
        vec![Some(2), Some(2), None, Some(-4), Some(0), Some(3)],
        vec![None, None, None],
        vec![Some(1), Some(1), Some(1), Some(1)],
        vec![],
        vec![Some(50), Some(9), Some(50)],
    ];

    for batch in batches {
        let drafts: Vec<SetDraft> = batch
            .iter()
            .map(|id| SetDraft {
                id: *id,
                weight: "20".to_string(),
                reps: "10".to_string(),
            })
            .collect();
        let patch = ExercisePatch {
            sets: Some(drafts),
            ..ExercisePatch::default()
        };
        session.update_exercise(1, &patch).unwrap();

        let ids = set_ids(&session, 1);
        assert_eq!(ids.len(), batch.len());
        assert!(ids.iter().all(|id| *id > 0));
        let distinct: HashSet<i64> = ids.iter().copied().collect();
        assert_eq!(distinct.len(), ids.len());
    }
}

#[test]
fn bulk_update_rejects_non_digit_values_without_changes() {
    let mut session = editing_session();
    let before = session.structure().clone();

    let patch = ExercisePatch {
        unit: Some(WeightUnit::Lbs),
        sets: Some(vec![SetDraft {
            id: None,
            weight: "6O".to_string(),
            reps: "8".to_string(),
        }]),
        ..ExercisePatch::default()
    };
    let err = session.update_exercise(1, &patch).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    assert_eq!(session.structure(), &before);
    assert!(!session.can_undo());
}

#[test]
fn deleting_missing_exercise_is_a_no_op() {
    let mut session = editing_session();
    let before = session.active_day().unwrap().clone();

    assert_eq!(session.delete_exercise(404).unwrap(), DeleteOutcome::NotFound);
    assert_eq!(session.active_day().unwrap(), &before);
    assert!(!session.can_undo());

    assert_eq!(session.delete_exercise(1).unwrap(), DeleteOutcome::Deleted);
    assert!(session.active_day().unwrap().exercises.is_empty());
}

#[test]
fn retarget_keeps_id_and_sets() {
    let mut session = editing_session();
    let sets_before = set_ids(&session, 1);

    session
        .retarget_exercise(1, "Incline Bench Press", "upper chest")
        .unwrap();

    let exercise = session.structure().exercise(1, 1).unwrap();
    assert_eq!(exercise.name, "Incline Bench Press");
    assert_eq!(exercise.muscle, "upper chest");
    assert_eq!(set_ids(&session, 1), sets_before);
}

#[test]
fn unknown_ids_report_not_found() {
    let mut session = editing_session();

    assert_eq!(session.select_day(9).unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(session.add_set(9).unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(
        session.set_weight(1, 99, "60").unwrap_err().kind(),
        ErrorKind::NotFound
    );
    assert_eq!(session.delete_set(1, 99).unwrap(), DeleteOutcome::NotFound);
}

#[test]
fn new_days_never_reuse_deleted_ids() {
    let mut session = editing_session();
    let second = session.add_day().unwrap();
    assert_eq!(session.active_day_id(), Some(second));
    assert_eq!(session.delete_day(second).unwrap(), DeleteOutcome::Deleted);
    assert_eq!(session.active_day_id(), Some(1));

    let third = session.add_day().unwrap();
    assert!(third > second);
}

#[test]
fn canonical_program_is_untouched_by_session_edits() {
    let program = bench_program();
    let mut session = EditSession::from_program(&program);
    session.modify();
    session.add_exercise("back", "Row").unwrap();
    session.set_weight(1, 1, "100").unwrap();

    assert_eq!(program.structure, bench_program().structure);
    assert_ne!(session.structure(), &program.structure);
}

#[test]
fn bulk_update_reallocates_ids_above_the_bound() {
    let mut session = editing_session();
    let patch = ExercisePatch {
        sets: Some(vec![
            SetDraft {
                id: Some(i64::MAX),
                weight: "100".to_string(),
                reps: "5".to_string(),
            },
            SetDraft {
                id: None,
                weight: String::new(),
                reps: String::new(),
            },
        ]),
        ..ExercisePatch::default()
    };
    session.update_exercise(1, &patch).unwrap();

    let ids = set_ids(&session, 1);
    assert_eq!(ids.len(), 2);
    assert_ne!(ids[0], ids[1]);
    assert!(ids.iter().all(|id| (1..=MAX_ELEMENT_ID).contains(id)));
    assert!(session.structure().validate().is_ok());

    let added = session.add_set(1).unwrap();
    assert!(added > 0 && !ids.contains(&added));
}

#[test]
fn structure_with_id_above_the_bound_is_rejected_and_never_seeds_allocation() {
    let mut structure = bench_program().structure;
    structure.days[0].exercises[0].sets[2].id = i64::MAX;

    let err = Program::system(ProgramDraft {
        title: "Oversized".to_string(),
        structure: structure.clone(),
        ..ProgramDraft::default()
    })
    .unwrap_err();
    assert!(matches!(
        err,
        ProgramValidationError::Structure(StructureError::InvalidId { id: i64::MAX, .. })
    ));

    let mut program = bench_program();
    program.structure = structure;
    let mut session = EditSession::from_program(&program);
    session.modify();

    let added = session.add_set(1).unwrap();
    assert_eq!(added, 3);
    assert_eq!(set_ids(&session, 1), vec![1, 2, i64::MAX, 3]);
}
