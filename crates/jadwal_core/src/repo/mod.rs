//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts for programs and vault
//!   memberships.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Write paths validate programs and structures before any SQL mutation.
//! - Read paths reject invalid persisted state (`InvalidData`) instead of
//!   masking it.
//! - Multi-statement writes run in one `IMMEDIATE` transaction.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::program::{ProgramId, ProgramValidationError, UserId};
use crate::model::structure::{ProgramStructure, StructureError};
use crate::model::vault::MembershipId;
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub mod program_repo;
pub mod vault_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error shared by program and vault persistence.
#[derive(Debug)]
pub enum RepoError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Program failed validation before write.
    Validation(ProgramValidationError),
    /// Structure failed validation before write.
    Structure(StructureError),
    ProgramNotFound(ProgramId),
    MembershipNotFound(MembershipId),
    /// Membership exists but belongs to another user.
    NotOwner {
        membership_id: MembershipId,
        user_id: UserId,
    },
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Persisted data cannot be converted to a valid model.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::Structure(err) => write!(f, "{err}"),
            Self::ProgramNotFound(id) => write!(f, "program not found: {id}"),
            Self::MembershipNotFound(id) => write!(f, "vault membership not found: {id}"),
            Self::NotOwner {
                membership_id,
                user_id,
            } => write!(
                f,
                "vault membership {membership_id} is not owned by user {user_id}"
            ),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "repository requires column `{column}` in table `{table}`"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Validation(err) => Some(err),
            Self::Structure(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<ProgramValidationError> for RepoError {
    fn from(value: ProgramValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<StructureError> for RepoError {
    fn from(value: StructureError) -> Self {
        Self::Structure(value)
    }
}

/// Verifies schema version, table and columns before a repository is built.
pub(crate) fn ensure_connection_ready(
    conn: &Connection,
    table: &'static str,
    columns: &[&'static str],
) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    if !table_exists(conn, table)? {
        return Err(RepoError::MissingRequiredTable(table));
    }

    for column in columns.iter().copied() {
        if !table_has_column(conn, table, column)? {
            return Err(RepoError::MissingRequiredColumn { table, column });
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> RepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}

pub(crate) fn parse_uuid(value: &str, column: &'static str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

pub(crate) fn structure_to_json(structure: &ProgramStructure) -> RepoResult<String> {
    structure.validate()?;
    serde_json::to_string(structure)
        .map_err(|err| RepoError::InvalidData(format!("structure serialization failed: {err}")))
}

/// Decodes and validates a stored structure document.
pub(crate) fn structure_from_json(value: &str, column: &'static str) -> RepoResult<ProgramStructure> {
    let structure: ProgramStructure = serde_json::from_str(value)
        .map_err(|err| RepoError::InvalidData(format!("invalid structure in {column}: {err}")))?;
    structure
        .validate()
        .map_err(|err| RepoError::InvalidData(format!("invalid structure in {column}: {err}")))?;
    Ok(structure)
}
