//! Core domain logic for jadwal workout programs.
//!
//! Programs own a day → exercise → set structure. Users view them, fork
//! them into their vault, save pristine references and rate them. This
//! crate holds every business invariant; front ends only call services.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status, LoggingConfig, LoggingError};
pub use model::ids::{ElementId, IdAllocator, IdKind, MAX_ELEMENT_ID};
pub use model::program::{
    Program, ProgramDraft, ProgramId, ProgramKind, ProgramMetadataPatch, ProgramValidationError,
    UserId, Visibility,
};
pub use model::rating::{RatingAggregate, RatingError, RatingValue, MAX_RATING, MIN_RATING};
pub use model::structure::{
    Day, Exercise, ExercisePatch, ProgramStructure, SetDraft, StructureError, WeightUnit,
    WorkoutSet,
};
pub use model::vault::{
    ForkSnapshot, MembershipId, MembershipStatus, VaultEntry, VaultMembership, UNTITLED_SCHEDULE,
};
pub use repo::program_repo::{ProgramListQuery, ProgramRepository, SqliteProgramRepository};
pub use repo::vault_repo::{SqliteVaultRepository, VaultRepository};
pub use repo::{RepoError, RepoResult};
pub use service::edit_session::{
    EditSession, SessionError, SessionOrigin, SessionState, MAX_UNDO_DEPTH,
};
pub use service::program_service::{ProgramService, ProgramServiceError, ProgramsListResult};
pub use service::rating_service::{RatingService, RatingServiceError};
pub use service::saved_program_service::{
    ResolvedSource, ResolvedVaultItem, SavedProgramService,
};
pub use service::vault_service::{SaveOutcome, SavedAs, VaultService, VaultServiceError};
pub use service::{DeleteOutcome, ErrorKind};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
