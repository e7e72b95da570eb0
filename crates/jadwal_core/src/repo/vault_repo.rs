//! Vault membership repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist per-user memberships as pristine references or owned forks.
//! - Keep list order stable through an append-only `position` key.
//!
//! # Invariants
//! - Reference rows carry no structure; fork rows always carry display name
//!   and structure (enforced by a table CHECK as well).
//! - At most one reference row exists per `(user_id, program_id)`.
//! - Every mutation keyed by membership id checks ownership inside the same
//!   transaction that writes.

use super::{
    ensure_connection_ready, parse_uuid, structure_from_json, structure_to_json, RepoError,
    RepoResult,
};
use crate::model::program::{ProgramId, UserId};
use crate::model::vault::{
    ForkSnapshot, MembershipId, MembershipStatus, VaultEntry, VaultMembership,
};
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};
use uuid::Uuid;

const MEMBERSHIP_SELECT_SQL: &str = "SELECT
    id,
    user_id,
    program_id,
    status,
    position,
    saved_at,
    is_fork,
    display_name,
    structure_json
FROM vault_memberships";

const MEMBERSHIP_COLUMNS: &[&str] = &[
    "id",
    "user_id",
    "program_id",
    "status",
    "position",
    "saved_at",
    "is_fork",
    "display_name",
    "structure_json",
];

/// Repository interface for vault memberships.
pub trait VaultRepository {
    /// Creates the user's reference membership for `program_id`, or updates
    /// the existing one in place.
    ///
    /// New rows always start `active`. Existing rows take `status` when one
    /// is given and keep their current status otherwise. `saved_at` is
    /// refreshed either way.
    fn upsert_reference(
        &self,
        user_id: UserId,
        program_id: ProgramId,
        status: Option<&MembershipStatus>,
    ) -> RepoResult<VaultMembership>;
    /// Appends a new fork membership owning `snapshot`.
    fn insert_fork(
        &self,
        user_id: UserId,
        program_id: ProgramId,
        snapshot: &ForkSnapshot,
    ) -> RepoResult<VaultMembership>;
    /// Overwrites an owned membership with `snapshot`, turning a reference
    /// into a fork when needed.
    fn save_fork(
        &self,
        user_id: UserId,
        membership_id: MembershipId,
        snapshot: &ForkSnapshot,
    ) -> RepoResult<VaultMembership>;
    /// Refreshes `saved_at` of an owned membership.
    fn touch_membership(
        &self,
        user_id: UserId,
        membership_id: MembershipId,
    ) -> RepoResult<VaultMembership>;
    fn set_status(
        &self,
        user_id: UserId,
        membership_id: MembershipId,
        status: &MembershipStatus,
    ) -> RepoResult<VaultMembership>;
    fn get_membership(&self, membership_id: MembershipId) -> RepoResult<Option<VaultMembership>>;
    fn list_for_user(&self, user_id: UserId) -> RepoResult<Vec<VaultMembership>>;
    /// Deletes an owned membership. Returns `false` when no row has that id.
    fn delete_membership(&self, user_id: UserId, membership_id: MembershipId)
        -> RepoResult<bool>;
}

/// SQLite-backed vault repository.
pub struct SqliteVaultRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteVaultRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, "vault_memberships", MEMBERSHIP_COLUMNS)?;
        Ok(Self { conn })
    }
}

impl VaultRepository for SqliteVaultRepository<'_> {
    fn upsert_reference(
        &self,
        user_id: UserId,
        program_id: ProgramId,
        status: Option<&MembershipStatus>,
    ) -> RepoResult<VaultMembership> {
        let user_text = user_id.to_string();
        let program_text = program_id.to_string();

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        ensure_program_exists(&tx, program_id)?;

        let existing: Option<String> = {
            let mut stmt = tx.prepare(
                "SELECT id
                 FROM vault_memberships
                 WHERE user_id = ?1 AND program_id = ?2 AND is_fork = 0;",
            )?;
            let mut rows = stmt.query(params![user_text.as_str(), program_text.as_str()])?;
            let id_text = match rows.next()? {
                Some(row) => Some(row.get(0)?),
                None => None,
            };
            id_text
        };

        let membership_id = match existing {
            Some(id_text) => {
                tx.execute(
                    "UPDATE vault_memberships
                     SET
                        status = COALESCE(?2, status),
                        saved_at = (strftime('%s', 'now') * 1000)
                     WHERE id = ?1;",
                    params![id_text.as_str(), status.map(MembershipStatus::as_str)],
                )?;
                parse_uuid(&id_text, "vault_memberships.id")?
            }
            None => {
                let membership_id = Uuid::new_v4();
                let position = next_position(&tx, &user_text)?;
                tx.execute(
                    "INSERT INTO vault_memberships (
                        id,
                        user_id,
                        program_id,
                        status,
                        position,
                        is_fork
                    ) VALUES (?1, ?2, ?3, ?4, ?5, 0);",
                    params![
                        membership_id.to_string(),
                        user_text.as_str(),
                        program_text.as_str(),
                        MembershipStatus::Active.as_str(),
                        position,
                    ],
                )?;
                membership_id
            }
        };

        let membership = load_required(&tx, membership_id)?;
        tx.commit()?;
        Ok(membership)
    }

    fn insert_fork(
        &self,
        user_id: UserId,
        program_id: ProgramId,
        snapshot: &ForkSnapshot,
    ) -> RepoResult<VaultMembership> {
        let structure_json = structure_to_json(&snapshot.structure)?;
        let user_text = user_id.to_string();
        let membership_id = Uuid::new_v4();

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        ensure_program_exists(&tx, program_id)?;
        let position = next_position(&tx, &user_text)?;
        tx.execute(
            "INSERT INTO vault_memberships (
                id,
                user_id,
                program_id,
                status,
                position,
                is_fork,
                display_name,
                structure_json
            ) VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?7);",
            params![
                membership_id.to_string(),
                user_text.as_str(),
                program_id.to_string(),
                MembershipStatus::Active.as_str(),
                position,
                snapshot.display_name.as_str(),
                structure_json,
            ],
        )?;

        let membership = load_required(&tx, membership_id)?;
        tx.commit()?;
        Ok(membership)
    }

    fn save_fork(
        &self,
        user_id: UserId,
        membership_id: MembershipId,
        snapshot: &ForkSnapshot,
    ) -> RepoResult<VaultMembership> {
        let structure_json = structure_to_json(&snapshot.structure)?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        load_owned(&tx, user_id, membership_id)?;
        tx.execute(
            "UPDATE vault_memberships
             SET
                is_fork = 1,
                display_name = ?2,
                structure_json = ?3,
                saved_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![
                membership_id.to_string(),
                snapshot.display_name.as_str(),
                structure_json,
            ],
        )?;

        let membership = load_required(&tx, membership_id)?;
        tx.commit()?;
        Ok(membership)
    }

    fn touch_membership(
        &self,
        user_id: UserId,
        membership_id: MembershipId,
    ) -> RepoResult<VaultMembership> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        load_owned(&tx, user_id, membership_id)?;
        tx.execute(
            "UPDATE vault_memberships
             SET saved_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            [membership_id.to_string()],
        )?;

        let membership = load_required(&tx, membership_id)?;
        tx.commit()?;
        Ok(membership)
    }

    fn set_status(
        &self,
        user_id: UserId,
        membership_id: MembershipId,
        status: &MembershipStatus,
    ) -> RepoResult<VaultMembership> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        load_owned(&tx, user_id, membership_id)?;
        tx.execute(
            "UPDATE vault_memberships
             SET
                status = ?2,
                saved_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![membership_id.to_string(), status.as_str()],
        )?;

        let membership = load_required(&tx, membership_id)?;
        tx.commit()?;
        Ok(membership)
    }

    fn get_membership(&self, membership_id: MembershipId) -> RepoResult<Option<VaultMembership>> {
        load_membership(self.conn, membership_id)
    }

    fn list_for_user(&self, user_id: UserId) -> RepoResult<Vec<VaultMembership>> {
        let mut stmt = self.conn.prepare(&format!(
            "{MEMBERSHIP_SELECT_SQL} WHERE user_id = ?1 ORDER BY position ASC, id ASC;"
        ))?;
        let mut rows = stmt.query([user_id.to_string()])?;
        let mut memberships = Vec::new();
        while let Some(row) = rows.next()? {
            memberships.push(parse_membership_row(row)?);
        }
        Ok(memberships)
    }

    fn delete_membership(
        &self,
        user_id: UserId,
        membership_id: MembershipId,
    ) -> RepoResult<bool> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        match load_owned(&tx, user_id, membership_id) {
            Ok(_) => {}
            Err(RepoError::MembershipNotFound(_)) => return Ok(false),
            Err(err) => return Err(err),
        }
        tx.execute(
            "DELETE FROM vault_memberships WHERE id = ?1;",
            [membership_id.to_string()],
        )?;
        tx.commit()?;
        Ok(true)
    }
}

fn ensure_program_exists(conn: &Connection, program_id: ProgramId) -> RepoResult<()> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM programs WHERE id = ?1);",
        [program_id.to_string()],
        |row| row.get(0),
    )?;
    if exists == 1 {
        Ok(())
    } else {
        Err(RepoError::ProgramNotFound(program_id))
    }
}

fn next_position(conn: &Connection, user_text: &str) -> RepoResult<i64> {
    let position: i64 = conn.query_row(
        "SELECT COALESCE(MAX(position), -1) + 1 FROM vault_memberships WHERE user_id = ?1;",
        [user_text],
        |row| row.get(0),
    )?;
    Ok(position)
}

fn load_membership(
    conn: &Connection,
    membership_id: MembershipId,
) -> RepoResult<Option<VaultMembership>> {
    let mut stmt = conn.prepare(&format!("{MEMBERSHIP_SELECT_SQL} WHERE id = ?1;"))?;
    let mut rows = stmt.query([membership_id.to_string()])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_membership_row(row)?));
    }
    Ok(None)
}

fn load_required(conn: &Connection, membership_id: MembershipId) -> RepoResult<VaultMembership> {
    load_membership(conn, membership_id)?.ok_or(RepoError::MembershipNotFound(membership_id))
}

fn load_owned(
    conn: &Connection,
    user_id: UserId,
    membership_id: MembershipId,
) -> RepoResult<VaultMembership> {
    let membership = load_required(conn, membership_id)?;
    if !membership.is_owned_by(user_id) {
        return Err(RepoError::NotOwner {
            membership_id,
            user_id,
        });
    }
    Ok(membership)
}

fn parse_membership_row(row: &Row<'_>) -> RepoResult<VaultMembership> {
    let id_text: String = row.get("id")?;
    let user_text: String = row.get("user_id")?;
    let program_text: String = row.get("program_id")?;

    let status_text: String = row.get("status")?;
    let status = MembershipStatus::parse(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid status `{status_text}` in vault_memberships.status"
        ))
    })?;

    let is_fork: i64 = row.get("is_fork")?;
    let display_name: Option<String> = row.get("display_name")?;
    let structure_json: Option<String> = row.get("structure_json")?;
    let entry = match (is_fork, display_name, structure_json) {
        (0, None, None) => VaultEntry::Reference,
        (1, Some(display_name), Some(structure_json)) => VaultEntry::Fork(ForkSnapshot {
            display_name,
            structure: structure_from_json(&structure_json, "vault_memberships.structure_json")?,
        }),
        (flag, ..) => {
            return Err(RepoError::InvalidData(format!(
                "membership {id_text} has inconsistent fork columns (is_fork={flag})"
            )))
        }
    };

    Ok(VaultMembership {
        id: parse_uuid(&id_text, "vault_memberships.id")?,
        user_id: parse_uuid(&user_text, "vault_memberships.user_id")?,
        program_id: parse_uuid(&program_text, "vault_memberships.program_id")?,
        status,
        saved_at: row.get("saved_at")?,
        position: row.get("position")?,
        entry,
    })
}
