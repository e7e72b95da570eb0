use jadwal_core::db::{open_db, open_db_in_memory};
use jadwal_core::{
    ErrorKind, ProgramDraft, ProgramService, RatingAggregate, RatingService, RatingServiceError,
    RatingValue, SqliteProgramRepository,
};
use rusqlite::Connection;
use std::thread;
use uuid::Uuid;

fn import(conn: &Connection) -> Uuid {
    let service = ProgramService::new(SqliteProgramRepository::try_new(conn).unwrap());
    service
        .import_system_program(ProgramDraft {
            title: "Rated".to_string(),
            ..ProgramDraft::default()
        })
        .unwrap()
        .id
}

fn stored_aggregate(conn: &Connection, id: Uuid) -> (f64, i64) {
    conn.query_row(
        "SELECT rating_mean, rating_count FROM programs WHERE id = ?1;",
        [id.to_string()],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )
    .unwrap()
}

#[test]
fn submission_order_does_not_change_aggregate() {
    let orders = [[5, 3, 4], [5, 4, 3], [3, 5, 4], [3, 4, 5], [4, 5, 3], [4, 3, 5]];
    for order in orders {
        let conn = open_db_in_memory().unwrap();
        let program_id = import(&conn);
        let service = RatingService::new(SqliteProgramRepository::try_new(&conn).unwrap());

        let mut last = None;
        for value in order {
            last = Some(service.submit(program_id, value).unwrap());
        }

        let aggregate = last.unwrap();
        assert_eq!(aggregate.count, 3);
        assert!((aggregate.mean - 4.0).abs() < 1e-9, "order {order:?}");
        let (mean, count) = stored_aggregate(&conn, program_id);
        assert!((mean - 4.0).abs() < 1e-9);
        assert_eq!(count, 3);
    }
}

#[test]
fn out_of_range_values_are_rejected_without_writing() {
    let conn = open_db_in_memory().unwrap();
    let program_id = import(&conn);
    let service = RatingService::new(SqliteProgramRepository::try_new(&conn).unwrap());
    service.submit(program_id, 4).unwrap();

    for value in [0, 6, -1] {
        let err = service.submit(program_id, value).unwrap_err();
        assert!(matches!(err, RatingServiceError::InvalidRating(_)));
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }
    assert_eq!(stored_aggregate(&conn, program_id), (4.0, 1));
}

#[test]
fn rating_unknown_program_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    let service = RatingService::new(SqliteProgramRepository::try_new(&conn).unwrap());

    let err = service.submit(Uuid::new_v4(), 5).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn folding_continues_from_existing_aggregate() {
    let conn = open_db_in_memory().unwrap();
    let program_id = import(&conn);
    conn.execute(
        "UPDATE programs SET rating_mean = 4.5, rating_count = 120 WHERE id = ?1;",
        [program_id.to_string()],
    )
    .unwrap();
    let service = RatingService::new(SqliteProgramRepository::try_new(&conn).unwrap());

    let aggregate = service.submit(program_id, 1).unwrap();
    assert_eq!(aggregate.count, 121);
    assert!((aggregate.mean - (4.5 * 120.0 + 1.0) / 121.0).abs() < 1e-9);
}

#[test]
fn concurrent_submissions_are_not_lost() {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 25;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ratings.db");
    let program_id = {
        let conn = open_db(&path).unwrap();
        import(&conn)
    };

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let path = path.clone();
            thread::spawn(move || {
                let conn = open_db(&path).unwrap();
                let service = RatingService::new(SqliteProgramRepository::try_new(&conn).unwrap());
                for _ in 0..PER_THREAD {
                    service.submit(program_id, 5).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let conn = open_db(&path).unwrap();
    let (mean, count) = stored_aggregate(&conn, program_id);
    assert_eq!(count, (THREADS * PER_THREAD) as i64);
    assert!((mean - 5.0).abs() < 1e-9);
}

#[test]
fn stored_aggregate_matches_model_fold() {
    let conn = open_db_in_memory().unwrap();
    let program_id = import(&conn);
    let service = RatingService::new(SqliteProgramRepository::try_new(&conn).unwrap());

    let mut expected = RatingAggregate::default();
    for value in [2, 5, 5, 1, 4, 3, 3] {
        expected = expected.fold(RatingValue::new(value).unwrap());
        let aggregate = service.submit(program_id, value).unwrap();
        assert_eq!(aggregate, expected);
    }
    let (mean, count) = stored_aggregate(&conn, program_id);
    assert_eq!(mean, expected.mean);
    assert_eq!(count as u64, expected.count);
}
