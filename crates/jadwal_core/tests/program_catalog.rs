use jadwal_core::db::open_db_in_memory;
use jadwal_core::{
    Day, ErrorKind, Exercise, ProgramDraft, ProgramKind, ProgramListQuery, ProgramMetadataPatch,
    ProgramService, ProgramServiceError, ProgramStructure, SqliteProgramRepository, Visibility,
    WeightUnit, WorkoutSet,
};
use rusqlite::{params, Connection};
use uuid::Uuid;

fn draft(title: &str, tags: &[&str]) -> ProgramDraft {
    ProgramDraft {
        title: title.to_string(),
        summary: format!("{title} summary"),
        tags: tags.iter().map(|tag| tag.to_string()).collect(),
        structure: one_day_structure(),
        ..ProgramDraft::default()
    }
}

fn one_day_structure() -> ProgramStructure {
    ProgramStructure {
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
    }
}

fn set_rating(conn: &Connection, id: Uuid, mean: f64, count: i64) {
    conn.execute(
        "UPDATE programs SET rating_mean = ?2, rating_count = ?3 WHERE id = ?1;",
        params![id.to_string(), mean, count],
    )
    .unwrap();
}

#[test]
fn publish_records_author_and_starts_unrated() {
    let conn = open_db_in_memory().unwrap();
    let service = ProgramService::new(SqliteProgramRepository::try_new(&conn).unwrap());
    let author = Uuid::new_v4();

    let program = service
        .publish_program(author, "  Dana  ", draft("Push Pull Legs", &["Strength", "strength", " PPL "]))
        .unwrap();

    assert_eq!(program.kind, ProgramKind::Community);
    assert_eq!(program.author_id, Some(author));
    assert_eq!(program.author_name.as_deref(), Some("Dana"));
    assert_eq!(program.tags, vec!["Strength".to_string(), "PPL".to_string()]);
    assert_eq!(program.rating.count, 0);
    assert_eq!(program.rating.mean, 0.0);
    assert_eq!(program.structure, one_day_structure());
    assert!(program.created_at > 0);

    let loaded = service.get_program(program.id).unwrap().unwrap();
    assert_eq!(loaded, program);
}

#[test]
fn blank_title_and_blank_tags_are_invalid_input() {
    let conn = open_db_in_memory().unwrap();
    let service = ProgramService::new(SqliteProgramRepository::try_new(&conn).unwrap());

    let err = service.import_system_program(draft("   ", &[])).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    let err = service
        .publish_program(Uuid::new_v4(), "Dana", draft("Split", &["ok", "  "]))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM programs;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 0);
}

#[test]
fn list_orders_by_rating_then_title() {
    let conn = open_db_in_memory().unwrap();
    let service = ProgramService::new(SqliteProgramRepository::try_new(&conn).unwrap());

    let beta = service.import_system_program(draft("Beta", &[])).unwrap();
    let alpha = service.import_system_program(draft("Alpha", &[])).unwrap();
    let top = service.import_system_program(draft("Zeta", &[])).unwrap();
    let popular = service.import_system_program(draft("Gamma", &[])).unwrap();
    set_rating(&conn, top.id, 4.8, 10);
    set_rating(&conn, popular.id, 4.5, 120);
    set_rating(&conn, beta.id, 4.5, 3);

    let listed = service.list_programs(ProgramListQuery::default()).unwrap();
    assert_eq!(listed.applied_limit, 20);
    let ids: Vec<Uuid> = listed.items.iter().map(|program| program.id).collect();
    assert_eq!(ids, vec![top.id, popular.id, beta.id, alpha.id]);

    let page = service
        .list_programs(ProgramListQuery {
            limit: Some(2),
            offset: 1,
            ..ProgramListQuery::default()
        })
        .unwrap();
    let ids: Vec<Uuid> = page.items.iter().map(|program| program.id).collect();
    assert_eq!(ids, vec![popular.id, beta.id]);

    let clamped = service
        .list_programs(ProgramListQuery {
            limit: Some(500),
            ..ProgramListQuery::default()
        })
        .unwrap();
    assert_eq!(clamped.applied_limit, 100);
}

#[test]
fn list_filters_by_kind_tag_and_search() {
    let conn = open_db_in_memory().unwrap();
    let service = ProgramService::new(SqliteProgramRepository::try_new(&conn).unwrap());

    let system = service
        .import_system_program(draft("Starter Strength", &["Beginner"]))
        .unwrap();
    let community = service
        .publish_program(Uuid::new_v4(), "Coach Rami", draft("Hypertrophy 5x", &["volume"]))
        .unwrap();

    let communities = service
        .list_programs(ProgramListQuery {
            kind: Some(ProgramKind::Community),
            ..ProgramListQuery::default()
        })
        .unwrap();
    assert_eq!(communities.items.len(), 1);
    assert_eq!(communities.items[0].id, community.id);

    let tagged = service
        .list_programs(ProgramListQuery {
            tag: Some("beginner".to_string()),
            ..ProgramListQuery::default()
        })
        .unwrap();
    assert_eq!(tagged.items.len(), 1);
    assert_eq!(tagged.items[0].id, system.id);

    let by_author = service
        .list_programs(ProgramListQuery {
            search: Some("rami".to_string()),
            ..ProgramListQuery::default()
        })
        .unwrap();
    assert_eq!(by_author.items.len(), 1);
    assert_eq!(by_author.items[0].id, community.id);

    let wildcard = service
        .list_programs(ProgramListQuery {
            search: Some("%".to_string()),
            ..ProgramListQuery::default()
        })
        .unwrap();
    assert!(wildcard.items.is_empty());
}

#[test]
fn private_programs_are_listed_only_for_their_author() {
    let conn = open_db_in_memory().unwrap();
    let service = ProgramService::new(SqliteProgramRepository::try_new(&conn).unwrap());
    let author = Uuid::new_v4();

    let private = service
        .publish_program(
            author,
            "Dana",
            ProgramDraft {
                visibility: Visibility::Private,
                ..draft("Secret Split", &[])
            },
        )
        .unwrap();

    let anonymous = service.list_programs(ProgramListQuery::default()).unwrap();
    assert!(anonymous.items.is_empty());

    let stranger = service
        .list_programs(ProgramListQuery {
            viewer: Some(Uuid::new_v4()),
            ..ProgramListQuery::default()
        })
        .unwrap();
    assert!(stranger.items.is_empty());

    let owner = service
        .list_programs(ProgramListQuery {
            viewer: Some(author),
            ..ProgramListQuery::default()
        })
        .unwrap();
    assert_eq!(owner.items.len(), 1);
    assert_eq!(owner.items[0].id, private.id);
}

#[test]
fn metadata_update_is_author_only_and_keeps_rating() {
    let conn = open_db_in_memory().unwrap();
    let service = ProgramService::new(SqliteProgramRepository::try_new(&conn).unwrap());
    let author = Uuid::new_v4();
    let program = service
        .publish_program(author, "Dana", draft("Upper Lower", &["split"]))
        .unwrap();
    set_rating(&conn, program.id, 3.5, 8);

    let patch = ProgramMetadataPatch {
        title: Some("Upper Lower v2".to_string()),
        tags: Some(vec!["split".to_string(), "Intermediate".to_string()]),
        duration_hint: Some("8 weeks".to_string()),
        ..ProgramMetadataPatch::default()
    };

    let err = service
        .update_metadata(Uuid::new_v4(), program.id, &patch)
        .unwrap_err();
    assert!(matches!(err, ProgramServiceError::NotAuthor { .. }));
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let updated = service.update_metadata(author, program.id, &patch).unwrap();
    assert_eq!(updated.title, "Upper Lower v2");
    assert_eq!(updated.tags, vec!["split".to_string(), "Intermediate".to_string()]);
    assert_eq!(updated.duration_hint.as_deref(), Some("8 weeks"));
    assert_eq!(updated.rating.mean, 3.5);
    assert_eq!(updated.rating.count, 8);
}

#[test]
fn system_programs_cannot_be_edited_by_anyone() {
    let conn = open_db_in_memory().unwrap();
    let service = ProgramService::new(SqliteProgramRepository::try_new(&conn).unwrap());
    let program = service.import_system_program(draft("Base", &[])).unwrap();

    let err = service
        .replace_structure(Uuid::new_v4(), program.id, &ProgramStructure::new())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let err = service
        .update_metadata(Uuid::new_v4(), Uuid::new_v4(), &ProgramMetadataPatch::default())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn replace_structure_validates_before_writing() {
    let conn = open_db_in_memory().unwrap();
    let service = ProgramService::new(SqliteProgramRepository::try_new(&conn).unwrap());
    let author = Uuid::new_v4();
    let program = service
        .publish_program(author, "Dana", draft("Full Body", &[]))
        .unwrap();

    let mut duplicate = one_day_structure();
    duplicate.days.push(duplicate.days[0].clone());
    let err = service
        .replace_structure(author, program.id, &duplicate)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    assert_eq!(
        service.get_program(program.id).unwrap().unwrap().structure,
        one_day_structure()
    );

    let updated = service
        .replace_structure(author, program.id, &ProgramStructure::new())
        .unwrap();
    assert!(updated.structure.days.is_empty());
}
