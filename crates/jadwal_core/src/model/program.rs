//! Canonical program document.
//!
//! # Responsibility
//! - Define program metadata, origin kind, visibility and owned structure.
//! - Validate authoring input (drafts and metadata patches).
//!
//! # Invariants
//! - `id` is stable for the program lifetime and never nil.
//! - `system` programs have no author; `community` programs always do.
//! - `rating` is only changed by rating submissions, never by metadata edits.
//! - Tags are trimmed, non-blank and unique case-insensitively.

use super::rating::RatingAggregate;
use super::structure::{ProgramStructure, StructureError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Opaque, globally unique program id.
pub type ProgramId = Uuid;

/// Already-authenticated user identity issued by the auth collaborator.
pub type UserId = Uuid;

/// Who authored a program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgramKind {
    System,
    Community,
}

impl ProgramKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Community => "community",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "system" => Some(Self::System),
            "community" => Some(Self::Community),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    Public,
    Private,
}

impl Visibility {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "public" => Some(Self::Public),
            "private" => Some(Self::Private),
            _ => None,
        }
    }
}

/// Authoring input for a new program.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgramDraft {
    pub title: String,
    pub short_label: Option<String>,
    pub summary: String,
    pub description: String,
    pub tags: Vec<String>,
    pub duration_hint: Option<String>,
    pub visibility: Visibility,
    pub structure: ProgramStructure,
}

/// Author-only metadata update. `None` fields stay unchanged; an empty
/// `short_label` or `duration_hint` clears the value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramMetadataPatch {
    pub title: Option<String>,
    pub short_label: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub duration_hint: Option<String>,
    pub visibility: Option<Visibility>,
}

/// Canonical workout program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub id: ProgramId,
    pub title: String,
    pub short_label: Option<String>,
    pub summary: String,
    pub description: String,
    pub tags: Vec<String>,
    pub duration_hint: Option<String>,
    /// Serialized as `type` to match the external document shape.
    #[serde(rename = "type")]
    pub kind: ProgramKind,
    pub visibility: Visibility,
    pub author_id: Option<UserId>,
    pub author_name: Option<String>,
    pub rating: RatingAggregate,
    pub structure: ProgramStructure,
    /// Epoch milliseconds, assigned by storage.
    pub created_at: i64,
    /// Epoch milliseconds, assigned by storage.
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgramValidationError {
    NilId,
    BlankTitle,
    BlankTag,
    SystemProgramWithAuthor,
    CommunityProgramWithoutAuthor,
    Structure(StructureError),
}

impl Display for ProgramValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NilId => write!(f, "program id must not be nil"),
            Self::BlankTitle => write!(f, "program title must not be blank"),
            Self::BlankTag => write!(f, "program tags must not be blank"),
            Self::SystemProgramWithAuthor => write!(f, "system programs cannot have an author"),
            Self::CommunityProgramWithoutAuthor => {
                write!(f, "community programs require an author")
            }
            Self::Structure(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ProgramValidationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Structure(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StructureError> for ProgramValidationError {
    fn from(value: StructureError) -> Self {
        Self::Structure(value)
    }
}

impl Program {
    /// Builds an author-less `system` program from a draft.
    pub fn system(draft: ProgramDraft) -> Result<Self, ProgramValidationError> {
        Self::from_draft(ProgramKind::System, None, None, draft)
    }

    /// Builds a `community` program owned by `author_id`.
    pub fn community(
        author_id: UserId,
        author_name: impl Into<String>,
        draft: ProgramDraft,
    ) -> Result<Self, ProgramValidationError> {
        let author_name = normalize_optional(author_name.into());
        Self::from_draft(ProgramKind::Community, Some(author_id), author_name, draft)
    }

    fn from_draft(
        kind: ProgramKind,
        author_id: Option<UserId>,
        author_name: Option<String>,
        draft: ProgramDraft,
    ) -> Result<Self, ProgramValidationError> {
        let program = Self {
            id: Uuid::new_v4(),
            title: draft.title.trim().to_string(),
            short_label: draft.short_label.and_then(normalize_optional),
            summary: draft.summary,
            description: draft.description,
            tags: normalize_tags(&draft.tags)?,
            duration_hint: draft.duration_hint.and_then(normalize_optional),
            kind,
            visibility: draft.visibility,
            author_id,
            author_name,
            rating: RatingAggregate::default(),
            structure: draft.structure,
            created_at: 0,
            updated_at: 0,
        };
        program.validate()?;
        Ok(program)
    }

    /// Returns whether `user_id` may edit this program's metadata/structure.
    pub fn is_authored_by(&self, user_id: UserId) -> bool {
        self.author_id == Some(user_id)
    }

    pub fn validate(&self) -> Result<(), ProgramValidationError> {
        if self.id.is_nil() {
            return Err(ProgramValidationError::NilId);
        }
        if self.title.trim().is_empty() {
            return Err(ProgramValidationError::BlankTitle);
        }
        if self.tags.iter().any(|tag| tag.trim().is_empty()) {
            return Err(ProgramValidationError::BlankTag);
        }
        match (self.kind, self.author_id) {
            (ProgramKind::System, Some(_)) => {
                return Err(ProgramValidationError::SystemProgramWithAuthor)
            }
            (ProgramKind::Community, None) => {
                return Err(ProgramValidationError::CommunityProgramWithoutAuthor)
            }
            _ => {}
        }
        self.structure.validate()?;
        Ok(())
    }

    /// Returns a copy with `patch` applied; the receiver is unchanged.
    pub fn with_metadata(&self, patch: &ProgramMetadataPatch) -> Result<Self, ProgramValidationError> {
        let mut next = self.clone();
        if let Some(title) = &patch.title {
            next.title = title.trim().to_string();
        }
        if let Some(short_label) = &patch.short_label {
            next.short_label = normalize_optional(short_label.clone());
        }
        if let Some(summary) = &patch.summary {
            next.summary.clone_from(summary);
        }
        if let Some(description) = &patch.description {
            next.description.clone_from(description);
        }
        if let Some(tags) = &patch.tags {
            next.tags = normalize_tags(tags)?;
        }
        if let Some(duration_hint) = &patch.duration_hint {
            next.duration_hint = normalize_optional(duration_hint.clone());
        }
        if let Some(visibility) = patch.visibility {
            next.visibility = visibility;
        }
        next.validate()?;
        Ok(next)
    }
}

/// Trims tags, rejects blanks and drops case-insensitive duplicates while
/// keeping the first spelling and the input order.
pub fn normalize_tags(tags: &[String]) -> Result<Vec<String>, ProgramValidationError> {
    let mut seen = HashSet::new();
    let mut normalized = Vec::with_capacity(tags.len());
    for tag in tags {
        let trimmed = tag.trim();
        if trimmed.is_empty() {
            return Err(ProgramValidationError::BlankTag);
        }
        if seen.insert(trimmed.to_lowercase()) {
            normalized.push(trimmed.to_string());
        }
    }
    Ok(normalized)
}

fn normalize_optional(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
