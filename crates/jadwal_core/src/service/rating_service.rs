//! Rating submission service.
//!
//! # Invariants
//! - Values outside `1..=5` are rejected before storage is touched.
//! - Mean and count are persisted together by one atomic repository write.

use super::{repo_error_kind, ErrorKind};
use crate::model::program::ProgramId;
use crate::model::rating::{RatingAggregate, RatingError, RatingValue};
use crate::repo::program_repo::ProgramRepository;
use crate::repo::RepoError;
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug)]
pub enum RatingServiceError {
    InvalidRating(RatingError),
    ProgramNotFound(ProgramId),
    Repo(RepoError),
}

impl RatingServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidRating(_) => ErrorKind::InvalidInput,
            Self::ProgramNotFound(_) => ErrorKind::NotFound,
            Self::Repo(err) => repo_error_kind(err),
        }
    }
}

impl Display for RatingServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidRating(err) => write!(f, "{err}"),
            Self::ProgramNotFound(id) => write!(f, "program not found: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for RatingServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidRating(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::ProgramNotFound(_) => None,
        }
    }
}

impl From<RepoError> for RatingServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::ProgramNotFound(id) => Self::ProgramNotFound(id),
            other => Self::Repo(other),
        }
    }
}

impl From<RatingError> for RatingServiceError {
    fn from(value: RatingError) -> Self {
        Self::InvalidRating(value)
    }
}

pub struct RatingService<R: ProgramRepository> {
    repo: R,
}

impl<R: ProgramRepository> RatingService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Folds one rating into the program aggregate and returns the new pair.
    pub fn submit(
        &self,
        program_id: ProgramId,
        value: i64,
    ) -> Result<RatingAggregate, RatingServiceError> {
        let value = RatingValue::new(value).map_err(|err| {
            warn!(
                "event=rating_submit module=service status=error program_id={program_id} error_code=out_of_range"
            );
            err
        })?;

        match self.repo.apply_rating(program_id, value) {
            Ok(aggregate) => {
                info!(
                    "event=rating_submit module=service status=ok program_id={program_id} count={}",
                    aggregate.count
                );
                Ok(aggregate)
            }
            Err(err) => {
                warn!(
                    "event=rating_submit module=service status=error program_id={program_id} error={err}"
                );
                Err(err.into())
            }
        }
    }
}
