//! Saved-program relation: per-user membership list and status lifecycle.
//!
//! # Responsibility
//! - Add or refresh a user's reference membership for a program.
//! - Change membership status on behalf of the owner.
//! - Resolve memberships for display against either the canonical program
//!   or the membership's own fork.
//!
//! # Invariants
//! - Resolution is read-only; it never writes to programs or memberships.
//! - List order follows membership `position`.

use super::vault_service::VaultServiceError;
use crate::model::program::{ProgramId, UserId};
use crate::model::structure::ProgramStructure;
use crate::model::vault::{MembershipId, MembershipStatus, VaultEntry, VaultMembership};
use crate::repo::program_repo::ProgramRepository;
use crate::repo::vault_repo::VaultRepository;
use log::info;

/// Where a resolved item's structure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedSource {
    Canonical,
    Fork,
}

/// One membership joined with the content it displays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedVaultItem {
    pub membership: VaultMembership,
    /// Program title for references, fork display name for forks.
    pub title: String,
    pub structure: ProgramStructure,
    pub source: ResolvedSource,
}

pub struct SavedProgramService<P: ProgramRepository, V: VaultRepository> {
    programs: P,
    vault: V,
}

impl<P: ProgramRepository, V: VaultRepository> SavedProgramService<P, V> {
    pub fn new(programs: P, vault: V) -> Self {
        Self { programs, vault }
    }

    /// Updates status and timestamp of the user's reference membership for
    /// `program_id`, or appends a new `active` one.
    pub fn add_or_update(
        &self,
        user_id: UserId,
        program_id: ProgramId,
        status: &str,
    ) -> Result<VaultMembership, VaultServiceError> {
        let status = parse_status(status)?;
        let membership = self
            .vault
            .upsert_reference(user_id, program_id, Some(&status))?;
        info!(
            "event=saved_program_upsert module=service status=ok program_id={program_id} membership_id={} membership_status={}",
            membership.id, membership.status
        );
        Ok(membership)
    }

    pub fn set_status(
        &self,
        user_id: UserId,
        membership_id: MembershipId,
        status: &str,
    ) -> Result<VaultMembership, VaultServiceError> {
        let status = parse_status(status)?;
        let membership = self.vault.set_status(user_id, membership_id, &status)?;
        info!(
            "event=saved_program_status module=service status=ok membership_id={membership_id} membership_status={}",
            membership.status
        );
        Ok(membership)
    }

    /// Lists the user's memberships resolved for display.
    pub fn list_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<ResolvedVaultItem>, VaultServiceError> {
        let memberships = self.vault.list_for_user(user_id)?;
        let mut items = Vec::with_capacity(memberships.len());
        for membership in memberships {
            items.push(self.resolve(membership)?);
        }
        Ok(items)
    }

    fn resolve(
        &self,
        membership: VaultMembership,
    ) -> Result<ResolvedVaultItem, VaultServiceError> {
        let (title, structure, source) = match &membership.entry {
            VaultEntry::Reference => {
                let program = self.programs.get_program(membership.program_id)?.ok_or(
                    VaultServiceError::InconsistentState("membership points at a missing program"),
                )?;
                (program.title, program.structure, ResolvedSource::Canonical)
            }
            VaultEntry::Fork(snapshot) => (
                snapshot.display_name.clone(),
                snapshot.structure.clone(),
                ResolvedSource::Fork,
            ),
        };
        Ok(ResolvedVaultItem {
            membership,
            title,
            structure,
            source,
        })
    }
}

fn parse_status(value: &str) -> Result<MembershipStatus, VaultServiceError> {
    MembershipStatus::parse(value).ok_or_else(|| VaultServiceError::InvalidStatus(value.to_string()))
}
