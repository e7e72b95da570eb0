//! Vault membership: the durable link between a user and a program.
//!
//! # Invariants
//! - A membership is either a pristine `Reference` (no structure copy) or a
//!   `Fork` that exclusively owns its structure snapshot.
//! - A fork's structure never aliases the canonical program's storage; later
//!   edits on either side do not reach the other.
//! - `program_id` always names the canonical program the membership came from.

use super::program::{ProgramId, UserId};
use super::structure::ProgramStructure;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable membership id.
pub type MembershipId = Uuid;

/// Display name applied when a fork is saved with a blank name.
pub const UNTITLED_SCHEDULE: &str = "Untitled Schedule";

/// Membership lifecycle tag.
///
/// Unknown tags are preserved verbatim in `Other`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MembershipStatus {
    #[default]
    Active,
    Completed,
    Other(String),
}

impl MembershipStatus {
    /// Parses a status tag; blank input yields `None`.
    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().to_lowercase();
        match normalized.as_str() {
            "" => None,
            "active" => Some(Self::Active),
            "completed" => Some(Self::Completed),
            _ => Some(Self::Other(normalized)),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Other(value) => value.as_str(),
        }
    }
}

impl Display for MembershipStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for MembershipStatus {
    fn from(value: String) -> Self {
        Self::parse(&value).unwrap_or_default()
    }
}

impl From<MembershipStatus> for String {
    fn from(value: MembershipStatus) -> Self {
        value.as_str().to_string()
    }
}

/// Independent copy of a program structure owned by one membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForkSnapshot {
    pub display_name: String,
    pub structure: ProgramStructure,
}

impl ForkSnapshot {
    /// Builds a snapshot, falling back to `UNTITLED_SCHEDULE` for blank names.
    pub fn new(display_name: &str, structure: ProgramStructure) -> Self {
        let trimmed = display_name.trim();
        Self {
            display_name: if trimmed.is_empty() {
                UNTITLED_SCHEDULE.to_string()
            } else {
                trimmed.to_string()
            },
            structure,
        }
    }
}

/// Reference-or-fork content of a membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum VaultEntry {
    /// Pristine pointer to the canonical program.
    Reference,
    /// User-owned copy diverged from the canonical program.
    Fork(ForkSnapshot),
}

impl VaultEntry {
    pub fn is_fork(&self) -> bool {
        matches!(self, Self::Fork(_))
    }

    pub fn fork(&self) -> Option<&ForkSnapshot> {
        match self {
            Self::Reference => None,
            Self::Fork(snapshot) => Some(snapshot),
        }
    }
}

/// One saved program in a user's vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultMembership {
    pub id: MembershipId,
    pub user_id: UserId,
    pub program_id: ProgramId,
    pub status: MembershipStatus,
    /// Epoch milliseconds of the latest save or status change.
    pub saved_at: i64,
    /// Order key within the user's vault list.
    pub position: i64,
    pub entry: VaultEntry,
}

impl VaultMembership {
    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.user_id == user_id
    }
}

#[cfg(test)]
mod tests {
    use super::{ForkSnapshot, MembershipStatus, VaultEntry, UNTITLED_SCHEDULE};
    use crate::model::structure::ProgramStructure;

    #[test]
    fn status_parse_keeps_unknown_tags() {
        assert_eq!(MembershipStatus::parse(" Active "), Some(MembershipStatus::Active));
        assert_eq!(
            MembershipStatus::parse("paused"),
            Some(MembershipStatus::Other("paused".to_string()))
        );
        assert_eq!(MembershipStatus::parse("  "), None);
    }

    #[test]
    fn blank_fork_name_falls_back_to_untitled() {
        let snapshot = ForkSnapshot::new("   ", ProgramStructure::new());
        assert_eq!(snapshot.display_name, UNTITLED_SCHEDULE);
    }

    #[test]
    fn entry_serializes_with_mode_tag() {
        let reference = serde_json::to_value(VaultEntry::Reference).unwrap();
        assert_eq!(reference["mode"], "reference");

        let fork = VaultEntry::Fork(ForkSnapshot::new("Mine", ProgramStructure::new()));
        let json = serde_json::to_value(&fork).unwrap();
        assert_eq!(json["mode"], "fork");
        assert_eq!(json["display_name"], "Mine");
    }
}
