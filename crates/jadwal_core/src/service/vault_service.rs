//! Vault fork manager: turns edit sessions into vault memberships.
//!
//! # Responsibility
//! - Open edit sessions over canonical programs or saved memberships.
//! - Save a session as a pristine reference or as an owned fork.
//! - Delete memberships on behalf of their owner.
//!
//! # Invariants
//! - A session that never entered `Editing` saves as a reference, with no
//!   structure copy. A session that did saves as a fork owning a snapshot.
//! - A session resumed from a fork always saves back into that fork.
//! - Re-saving the same session updates the membership it produced first.
//! - Canonical programs cannot be deleted through this service.

use super::edit_session::{EditSession, SessionOrigin};
use super::{repo_error_kind, DeleteOutcome, ErrorKind};
use crate::model::program::{ProgramId, UserId};
use crate::model::vault::{MembershipId, VaultMembership};
use crate::repo::program_repo::ProgramRepository;
use crate::repo::vault_repo::VaultRepository;
use crate::repo::RepoError;
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug)]
pub enum VaultServiceError {
    ProgramNotFound(ProgramId),
    MembershipNotFound(MembershipId),
    /// Membership belongs to another user.
    NotOwner {
        membership_id: MembershipId,
        user_id: UserId,
    },
    /// Vault delete was pointed at a canonical program id.
    CanonicalProgram(ProgramId),
    /// Status tag is blank.
    InvalidStatus(String),
    Repo(RepoError),
    InconsistentState(&'static str),
}

impl VaultServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ProgramNotFound(_) | Self::MembershipNotFound(_) => ErrorKind::NotFound,
            Self::NotOwner { .. } | Self::CanonicalProgram(_) => ErrorKind::Conflict,
            Self::InvalidStatus(_) => ErrorKind::InvalidInput,
            Self::Repo(err) => repo_error_kind(err),
            Self::InconsistentState(_) => ErrorKind::Storage,
        }
    }
}

impl Display for VaultServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ProgramNotFound(id) => write!(f, "program not found: {id}"),
            Self::MembershipNotFound(id) => write!(f, "vault membership not found: {id}"),
            Self::NotOwner {
                membership_id,
                user_id,
            } => write!(
                f,
                "vault membership {membership_id} is not owned by user {user_id}"
            ),
            Self::CanonicalProgram(id) => {
                write!(f, "program {id} is canonical and cannot be deleted from a vault")
            }
            Self::InvalidStatus(value) => write!(f, "invalid membership status: `{value}`"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::InconsistentState(details) => write!(f, "inconsistent vault state: {details}"),
        }
    }
}

impl Error for VaultServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for VaultServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::ProgramNotFound(id) => Self::ProgramNotFound(id),
            RepoError::MembershipNotFound(id) => Self::MembershipNotFound(id),
            RepoError::NotOwner {
                membership_id,
                user_id,
            } => Self::NotOwner {
                membership_id,
                user_id,
            },
            other => Self::Repo(other),
        }
    }
}

/// Terminal outcome of one save action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SavedAs {
    Reference,
    Fork,
}

impl SavedAs {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Reference => "reference",
            Self::Fork => "fork",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveOutcome {
    pub membership: VaultMembership,
    pub saved_as: SavedAs,
}

pub struct VaultService<P: ProgramRepository, V: VaultRepository> {
    programs: P,
    vault: V,
}

impl<P: ProgramRepository, V: VaultRepository> VaultService<P, V> {
    pub fn new(programs: P, vault: V) -> Self {
        Self { programs, vault }
    }

    /// Opens a viewing session over a canonical program.
    pub fn open_program(&self, program_id: ProgramId) -> Result<EditSession, VaultServiceError> {
        let program = self
            .programs
            .get_program(program_id)?
            .ok_or(VaultServiceError::ProgramNotFound(program_id))?;
        Ok(EditSession::from_program(&program))
    }

    /// Opens a viewing session over one of the user's memberships.
    pub fn open_membership(
        &self,
        user_id: UserId,
        membership_id: MembershipId,
    ) -> Result<EditSession, VaultServiceError> {
        let membership = self.require_owned(user_id, membership_id)?;
        let program = self
            .programs
            .get_program(membership.program_id)?
            .ok_or(VaultServiceError::InconsistentState(
                "membership points at a missing program",
            ))?;
        Ok(EditSession::from_membership(&program, &membership))
    }

    /// Persists the session into the user's vault.
    ///
    /// The session remembers the resulting membership, so calling `save`
    /// again updates it instead of creating another one.
    pub fn save(
        &self,
        user_id: UserId,
        session: &mut EditSession,
    ) -> Result<SaveOutcome, VaultServiceError> {
        let program_id = session.program_id();
        let result = match (session.membership_id(), session.origin(), session.is_editing()) {
            (Some(membership_id), _, true) => self
                .vault
                .save_fork(user_id, membership_id, &session.fork_snapshot()),
            (Some(membership_id), SessionOrigin::Fork, false) => {
                self.vault.touch_membership(user_id, membership_id)
            }
            (_, SessionOrigin::Canonical, false) => {
                self.vault.upsert_reference(user_id, program_id, None)
            }
            (None, _, _) => self
                .vault
                .insert_fork(user_id, program_id, &session.fork_snapshot()),
        };

        let membership = match result {
            Ok(membership) => membership,
            Err(err) => {
                warn!(
                    "event=vault_save module=service status=error program_id={program_id} error={err}"
                );
                return Err(err.into());
            }
        };

        let saved_as = if membership.entry.is_fork() {
            SavedAs::Fork
        } else {
            SavedAs::Reference
        };
        session.attach_membership(&membership);
        info!(
            "event=vault_save module=service status=ok program_id={program_id} membership_id={} mode={}",
            membership.id,
            saved_as.as_str()
        );
        Ok(SaveOutcome {
            membership,
            saved_as,
        })
    }

    /// Deletes one of the user's memberships.
    ///
    /// Unknown ids are a `NotFound` no-op; canonical program ids and other
    /// users' memberships are rejected.
    pub fn delete(
        &self,
        user_id: UserId,
        membership_id: MembershipId,
    ) -> Result<DeleteOutcome, VaultServiceError> {
        if self.vault.delete_membership(user_id, membership_id)? {
            info!(
                "event=vault_delete module=service status=ok membership_id={membership_id}"
            );
            return Ok(DeleteOutcome::Deleted);
        }

        if self.programs.program_exists(membership_id)? {
            warn!(
                "event=vault_delete module=service status=error membership_id={membership_id} error_code=canonical_program"
            );
            return Err(VaultServiceError::CanonicalProgram(membership_id));
        }
        Ok(DeleteOutcome::NotFound)
    }

    fn require_owned(
        &self,
        user_id: UserId,
        membership_id: MembershipId,
    ) -> Result<VaultMembership, VaultServiceError> {
        let membership = self
            .vault
            .get_membership(membership_id)?
            .ok_or(VaultServiceError::MembershipNotFound(membership_id))?;
        if !membership.is_owned_by(user_id) {
            return Err(VaultServiceError::NotOwner {
                membership_id,
                user_id,
            });
        }
        Ok(membership)
    }
}
