//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Keep the CLI and any other surface decoupled from storage details.
//!
//! # Invariants
//! - Every service error maps to exactly one `ErrorKind`.

use crate::repo::RepoError;

pub mod edit_session;
pub mod program_service;
pub mod rating_service;
pub mod saved_program_service;
pub mod vault_service;

/// Caller-facing failure category shared by all services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Unknown program, membership, day, exercise or set.
    NotFound,
    /// Rating out of range, non-digit set value, blank tag/title.
    InvalidInput,
    /// Operation not allowed in the current state or for this caller.
    Conflict,
    /// Persistence failure.
    Storage,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::InvalidInput => "invalid_input",
            Self::Conflict => "conflict",
            Self::Storage => "storage",
        }
    }
}

/// Result of a delete request keyed by id.
///
/// Deleting an id that does not exist is a no-op, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
}

/// Classifies repository failures for service error mapping.
pub(crate) fn repo_error_kind(err: &RepoError) -> ErrorKind {
    match err {
        RepoError::ProgramNotFound(_) | RepoError::MembershipNotFound(_) => ErrorKind::NotFound,
        RepoError::Validation(_) | RepoError::Structure(_) => ErrorKind::InvalidInput,
        RepoError::NotOwner { .. } => ErrorKind::Conflict,
        RepoError::Db(_)
        | RepoError::UninitializedConnection { .. }
        | RepoError::MissingRequiredTable(_)
        | RepoError::MissingRequiredColumn { .. }
        | RepoError::InvalidData(_) => ErrorKind::Storage,
    }
}
