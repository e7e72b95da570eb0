//! Program repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist canonical programs, their tags and their structure document.
//! - Own the atomic rating fold.
//!
//! # Invariants
//! - Metadata updates never touch `rating_mean`/`rating_count`.
//! - `apply_rating` reads the pair, folds it with `RatingAggregate::fold`
//!   and writes mean and count in one statement, all inside one
//!   `IMMEDIATE` transaction.
//! - Listing is deterministic: `rating_mean DESC, rating_count DESC,
//!   title ASC, id ASC`.

use super::{
    ensure_connection_ready, parse_uuid, structure_from_json, structure_to_json, RepoError,
    RepoResult,
};
use crate::model::program::{Program, ProgramId, ProgramKind, UserId, Visibility};
use crate::model::rating::{RatingAggregate, RatingValue};
use crate::model::structure::ProgramStructure;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row, Transaction, TransactionBehavior};

const PROGRAMS_DEFAULT_LIMIT: u32 = 20;
const PROGRAMS_LIMIT_MAX: u32 = 100;

const PROGRAM_SELECT_SQL: &str = "SELECT
    id,
    title,
    short_label,
    summary,
    description,
    duration_hint,
    kind,
    visibility,
    author_id,
    author_name,
    rating_mean,
    rating_count,
    structure_json,
    created_at,
    updated_at
FROM programs";

const PROGRAM_COLUMNS: &[&str] = &[
    "id",
    "title",
    "short_label",
    "summary",
    "description",
    "duration_hint",
    "kind",
    "visibility",
    "author_id",
    "author_name",
    "rating_mean",
    "rating_count",
    "structure_json",
    "created_at",
    "updated_at",
];

/// Query options for program catalog listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramListQuery {
    pub kind: Option<ProgramKind>,
    /// Private programs are listed only for their author.
    pub viewer: Option<UserId>,
    /// Single-tag exact match, case-insensitive.
    pub tag: Option<String>,
    /// Case-insensitive substring over title, author name and summary.
    pub search: Option<String>,
    /// Defaults to 20 and clamps to 100.
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Repository interface for canonical programs.
pub trait ProgramRepository {
    fn create_program(&self, program: &Program) -> RepoResult<ProgramId>;
    fn get_program(&self, id: ProgramId) -> RepoResult<Option<Program>>;
    fn program_exists(&self, id: ProgramId) -> RepoResult<bool>;
    fn list_programs(&self, query: &ProgramListQuery) -> RepoResult<Vec<Program>>;
    /// Writes metadata fields and tags of `program`; rating and structure
    /// columns are left as stored.
    fn update_metadata(&self, program: &Program) -> RepoResult<()>;
    fn replace_structure(&self, id: ProgramId, structure: &ProgramStructure) -> RepoResult<()>;
    /// Folds one validated rating into the stored aggregate atomically.
    fn apply_rating(&self, id: ProgramId, value: RatingValue) -> RepoResult<RatingAggregate>;
}

/// SQLite-backed program repository.
pub struct SqliteProgramRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteProgramRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, "programs", PROGRAM_COLUMNS)?;
        ensure_connection_ready(conn, "program_tags", &["program_id", "tag", "position"])?;
        Ok(Self { conn })
    }
}

impl ProgramRepository for SqliteProgramRepository<'_> {
    fn create_program(&self, program: &Program) -> RepoResult<ProgramId> {
        program.validate()?;
        let structure_json = structure_to_json(&program.structure)?;
        let rating_count = count_to_db(program.rating.count)?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO programs (
                id,
                title,
                short_label,
                summary,
                description,
                duration_hint,
                kind,
                visibility,
                author_id,
                author_name,
                rating_mean,
                rating_count,
                structure_json
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13);",
            params![
                program.id.to_string(),
                program.title.as_str(),
                program.short_label.as_deref(),
                program.summary.as_str(),
                program.description.as_str(),
                program.duration_hint.as_deref(),
                program.kind.as_str(),
                program.visibility.as_str(),
                program.author_id.map(|id| id.to_string()),
                program.author_name.as_deref(),
                program.rating.mean,
                rating_count,
                structure_json,
            ],
        )?;
        replace_tags(&tx, program.id, &program.tags)?;
        tx.commit()?;

        Ok(program.id)
    }

    fn get_program(&self, id: ProgramId) -> RepoResult<Option<Program>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{PROGRAM_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_program_row(self.conn, row)?));
        }
        Ok(None)
    }

    fn program_exists(&self, id: ProgramId) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM programs WHERE id = ?1);",
            [id.to_string()],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn list_programs(&self, query: &ProgramListQuery) -> RepoResult<Vec<Program>> {
        let mut sql = format!("{PROGRAM_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        match query.viewer {
            Some(viewer) => {
                sql.push_str(" AND (visibility = 'public' OR author_id = ?)");
                bind_values.push(Value::Text(viewer.to_string()));
            }
            None => sql.push_str(" AND visibility = 'public'"),
        }

        if let Some(kind) = query.kind {
            sql.push_str(" AND kind = ?");
            bind_values.push(Value::Text(kind.as_str().to_string()));
        }

        if let Some(tag) = query.tag.as_deref().map(str::trim).filter(|tag| !tag.is_empty()) {
            sql.push_str(
                " AND EXISTS (
                    SELECT 1
                    FROM program_tags pt
                    WHERE pt.program_id = programs.id
                      AND pt.tag = ? COLLATE NOCASE
                )",
            );
            bind_values.push(Value::Text(tag.to_string()));
        }

        if let Some(search) = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|search| !search.is_empty())
        {
            sql.push_str(
                " AND (
                    title LIKE ? ESCAPE '\\'
                    OR IFNULL(author_name, '') LIKE ? ESCAPE '\\'
                    OR summary LIKE ? ESCAPE '\\'
                )",
            );
            let pattern = format!("%{}%", escape_like(search));
            for _ in 0..3 {
                bind_values.push(Value::Text(pattern.clone()));
            }
        }

        sql.push_str(" ORDER BY rating_mean DESC, rating_count DESC, title ASC, id ASC");
        sql.push_str(" LIMIT ?");
        bind_values.push(Value::Integer(i64::from(normalize_program_limit(query.limit))));
        if query.offset > 0 {
            sql.push_str(" OFFSET ?");
            bind_values.push(Value::Integer(i64::from(query.offset)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut programs = Vec::new();
        while let Some(row) = rows.next()? {
            programs.push(parse_program_row(self.conn, row)?);
        }
        Ok(programs)
    }

    fn update_metadata(&self, program: &Program) -> RepoResult<()> {
        program.validate()?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let changed = tx.execute(
            "UPDATE programs
             SET
                title = ?2,
                short_label = ?3,
                summary = ?4,
                description = ?5,
                duration_hint = ?6,
                visibility = ?7,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![
                program.id.to_string(),
                program.title.as_str(),
                program.short_label.as_deref(),
                program.summary.as_str(),
                program.description.as_str(),
                program.duration_hint.as_deref(),
                program.visibility.as_str(),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::ProgramNotFound(program.id));
        }
        replace_tags(&tx, program.id, &program.tags)?;
        tx.commit()?;
        Ok(())
    }

    fn replace_structure(&self, id: ProgramId, structure: &ProgramStructure) -> RepoResult<()> {
        let structure_json = structure_to_json(structure)?;
        let changed = self.conn.execute(
            "UPDATE programs
             SET
                structure_json = ?2,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![id.to_string(), structure_json],
        )?;
        if changed == 0 {
            return Err(RepoError::ProgramNotFound(id));
        }
        Ok(())
    }

    fn apply_rating(&self, id: ProgramId, value: RatingValue) -> RepoResult<RatingAggregate> {
        let id_text = id.to_string();
        // IMMEDIATE takes the write lock before the read, so concurrent
        // submissions cannot fold into the same (mean, count) pair.
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let current = {
            let mut stmt =
                tx.prepare("SELECT rating_mean, rating_count FROM programs WHERE id = ?1;")?;
            let mut rows = stmt.query([id_text.as_str()])?;
            let pair: Option<(f64, i64)> = match rows.next()? {
                Some(row) => Some((row.get(0)?, row.get(1)?)),
                None => None,
            };
            pair
        };
        let Some((mean, count)) = current else {
            return Err(RepoError::ProgramNotFound(id));
        };

        let next = RatingAggregate::new(mean, count_from_db(count)?).fold(value);
        tx.execute(
            "UPDATE programs
             SET
                rating_mean = ?2,
                rating_count = ?3,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![id_text.as_str(), next.mean, count_to_db(next.count)?],
        )?;
        tx.commit()?;

        Ok(next)
    }
}

/// Normalizes list limit according to the catalog contract.
pub fn normalize_program_limit(limit: Option<u32>) -> u32 {
    match limit {
        Some(0) | None => PROGRAMS_DEFAULT_LIMIT,
        Some(value) if value > PROGRAMS_LIMIT_MAX => PROGRAMS_LIMIT_MAX,
        Some(value) => value,
    }
}

fn replace_tags(conn: &Connection, program_id: ProgramId, tags: &[String]) -> RepoResult<()> {
    let id_text = program_id.to_string();
    conn.execute(
        "DELETE FROM program_tags WHERE program_id = ?1;",
        [id_text.as_str()],
    )?;
    for (position, tag) in tags.iter().enumerate() {
        conn.execute(
            "INSERT INTO program_tags (program_id, tag, position) VALUES (?1, ?2, ?3);",
            params![id_text.as_str(), tag.as_str(), position as i64],
        )?;
    }
    Ok(())
}

fn load_tags(conn: &Connection, program_id: &str) -> RepoResult<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT tag
         FROM program_tags
         WHERE program_id = ?1
         ORDER BY position ASC;",
    )?;
    let mut rows = stmt.query([program_id])?;
    let mut tags = Vec::new();
    while let Some(row) = rows.next()? {
        tags.push(row.get(0)?);
    }
    Ok(tags)
}

fn parse_program_row(conn: &Connection, row: &Row<'_>) -> RepoResult<Program> {
    let id_text: String = row.get("id")?;
    let id = parse_uuid(&id_text, "programs.id")?;

    let kind_text: String = row.get("kind")?;
    let kind = ProgramKind::parse(&kind_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid program kind `{kind_text}` in programs.kind"))
    })?;

    let visibility_text: String = row.get("visibility")?;
    let visibility = Visibility::parse(&visibility_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid visibility `{visibility_text}` in programs.visibility"
        ))
    })?;

    let author_id = row
        .get::<_, Option<String>>("author_id")?
        .map(|value| parse_uuid(&value, "programs.author_id"))
        .transpose()?;

    let structure_text: String = row.get("structure_json")?;
    let structure = structure_from_json(&structure_text, "programs.structure_json")?;

    let program = Program {
        id,
        title: row.get("title")?,
        short_label: row.get("short_label")?,
        summary: row.get("summary")?,
        description: row.get("description")?,
        tags: load_tags(conn, &id_text)?,
        duration_hint: row.get("duration_hint")?,
        kind,
        visibility,
        author_id,
        author_name: row.get("author_name")?,
        rating: RatingAggregate::new(
            row.get("rating_mean")?,
            count_from_db(row.get("rating_count")?)?,
        ),
        structure,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    };
    program
        .validate()
        .map_err(|err| RepoError::InvalidData(format!("program {id_text}: {err}")))?;
    Ok(program)
}

fn count_to_db(count: u64) -> RepoResult<i64> {
    i64::try_from(count)
        .map_err(|_| RepoError::InvalidData(format!("rating count {count} exceeds storage range")))
}

fn count_from_db(count: i64) -> RepoResult<u64> {
    u64::try_from(count).map_err(|_| {
        RepoError::InvalidData(format!("invalid rating_count `{count}` in programs.rating_count"))
    })
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}
