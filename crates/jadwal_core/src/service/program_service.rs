//! Program catalog and authoring service.
//!
//! # Responsibility
//! - Publish community programs and import system programs.
//! - Expose catalog get/list with normalized pagination.
//! - Enforce author-only metadata and structure changes.
//!
//! # Invariants
//! - System programs have no author, so author-only operations on them
//!   always fail with `NotAuthor`.
//! - Rating aggregate is never written from this service.
//! - Replacing a canonical structure never touches vault forks.

use super::{repo_error_kind, ErrorKind};
use crate::model::program::{
    Program, ProgramDraft, ProgramId, ProgramMetadataPatch, ProgramValidationError, UserId,
};
use crate::model::structure::ProgramStructure;
use crate::repo::program_repo::{normalize_program_limit, ProgramListQuery, ProgramRepository};
use crate::repo::RepoError;
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug)]
pub enum ProgramServiceError {
    /// Draft or patch failed validation.
    Validation(ProgramValidationError),
    ProgramNotFound(ProgramId),
    /// Caller is not the program's author.
    NotAuthor {
        program_id: ProgramId,
        user_id: UserId,
    },
    Repo(RepoError),
    /// Write succeeded but read-back did not find the row.
    InconsistentState(&'static str),
}

impl ProgramServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::InvalidInput,
            Self::ProgramNotFound(_) => ErrorKind::NotFound,
            Self::NotAuthor { .. } => ErrorKind::Conflict,
            Self::Repo(err) => repo_error_kind(err),
            Self::InconsistentState(_) => ErrorKind::Storage,
        }
    }
}

impl Display for ProgramServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::ProgramNotFound(id) => write!(f, "program not found: {id}"),
            Self::NotAuthor {
                program_id,
                user_id,
            } => write!(f, "user {user_id} is not the author of program {program_id}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::InconsistentState(details) => {
                write!(f, "inconsistent program state: {details}")
            }
        }
    }
}

impl Error for ProgramServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ProgramServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::ProgramNotFound(id) => Self::ProgramNotFound(id),
            RepoError::Validation(err) => Self::Validation(err),
            other => Self::Repo(other),
        }
    }
}

impl From<ProgramValidationError> for ProgramServiceError {
    fn from(value: ProgramValidationError) -> Self {
        Self::Validation(value)
    }
}

/// Catalog page returned by `list_programs`.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgramsListResult {
    /// Sorted by `rating_mean DESC, rating_count DESC, title ASC, id ASC`.
    pub items: Vec<Program>,
    pub applied_limit: u32,
}

pub struct ProgramService<R: ProgramRepository> {
    repo: R,
}

impl<R: ProgramRepository> ProgramService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Creates a community program owned by `author_id`.
    pub fn publish_program(
        &self,
        author_id: UserId,
        author_name: &str,
        draft: ProgramDraft,
    ) -> Result<Program, ProgramServiceError> {
        let program = Program::community(author_id, author_name, draft)?;
        let program_id = self.repo.create_program(&program)?;
        info!(
            "event=program_publish module=service status=ok program_id={program_id} kind=community days={}",
            program.structure.days.len()
        );
        self.read_back(program_id, "published program not found in read-back")
    }

    /// Creates an author-less system program.
    pub fn import_system_program(
        &self,
        draft: ProgramDraft,
    ) -> Result<Program, ProgramServiceError> {
        let program = Program::system(draft)?;
        let program_id = self.repo.create_program(&program)?;
        info!(
            "event=program_publish module=service status=ok program_id={program_id} kind=system days={}",
            program.structure.days.len()
        );
        self.read_back(program_id, "imported program not found in read-back")
    }

    pub fn get_program(&self, program_id: ProgramId) -> Result<Option<Program>, ProgramServiceError> {
        Ok(self.repo.get_program(program_id)?)
    }

    /// Lists catalog programs; limit defaults to 20 and clamps to 100.
    pub fn list_programs(
        &self,
        query: ProgramListQuery,
    ) -> Result<ProgramsListResult, ProgramServiceError> {
        let applied_limit = normalize_program_limit(query.limit);
        let query = ProgramListQuery {
            limit: Some(applied_limit),
            ..query
        };
        let items = self.repo.list_programs(&query)?;
        Ok(ProgramsListResult {
            items,
            applied_limit,
        })
    }

    /// Applies an author-only metadata patch.
    pub fn update_metadata(
        &self,
        user_id: UserId,
        program_id: ProgramId,
        patch: &ProgramMetadataPatch,
    ) -> Result<Program, ProgramServiceError> {
        let current = self.require_authored(user_id, program_id)?;
        let next = current.with_metadata(patch)?;
        self.repo.update_metadata(&next)?;
        info!("event=program_update module=service status=ok program_id={program_id} part=metadata");
        self.read_back(program_id, "updated program not found in read-back")
    }

    /// Replaces the canonical structure of an authored program.
    pub fn replace_structure(
        &self,
        user_id: UserId,
        program_id: ProgramId,
        structure: &ProgramStructure,
    ) -> Result<Program, ProgramServiceError> {
        self.require_authored(user_id, program_id)?;
        structure
            .validate()
            .map_err(ProgramValidationError::from)?;
        self.repo.replace_structure(program_id, structure)?;
        info!(
            "event=program_update module=service status=ok program_id={program_id} part=structure days={}",
            structure.days.len()
        );
        self.read_back(program_id, "updated program not found in read-back")
    }

    fn require_authored(
        &self,
        user_id: UserId,
        program_id: ProgramId,
    ) -> Result<Program, ProgramServiceError> {
        let program = self
            .repo
            .get_program(program_id)?
            .ok_or(ProgramServiceError::ProgramNotFound(program_id))?;
        if !program.is_authored_by(user_id) {
            warn!(
                "event=program_update module=service status=error program_id={program_id} error_code=not_author"
            );
            return Err(ProgramServiceError::NotAuthor {
                program_id,
                user_id,
            });
        }
        Ok(program)
    }

    fn read_back(
        &self,
        program_id: ProgramId,
        details: &'static str,
    ) -> Result<Program, ProgramServiceError> {
        self.repo
            .get_program(program_id)?
            .ok_or(ProgramServiceError::InconsistentState(details))
    }
}
