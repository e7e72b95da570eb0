//! Vault commands: list, save, status, delete.

use anyhow::Result;
use clap::Subcommand;
use jadwal_core::{
    DeleteOutcome, SavedProgramService, SqliteProgramRepository, SqliteVaultRepository,
    VaultService,
};
use rusqlite::Connection;
use uuid::Uuid;

#[derive(Subcommand)]
pub enum VaultCommand {
    /// List a user's saved programs
    List {
        #[arg(long)]
        user: Uuid,
    },
    /// Save a program to the user's vault as a reference
    Save {
        #[arg(long)]
        user: Uuid,
        program_id: Uuid,
    },
    /// Change a membership status (active, completed, ...)
    Status {
        #[arg(long)]
        user: Uuid,
        membership_id: Uuid,
        status: String,
    },
    /// Delete a membership from the user's vault
    Delete {
        #[arg(long)]
        user: Uuid,
        membership_id: Uuid,
    },
}

impl VaultCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::List { .. } => "vault_list",
            Self::Save { .. } => "vault_save",
            Self::Status { .. } => "vault_status",
            Self::Delete { .. } => "vault_delete",
        }
    }
}

pub fn handle(conn: &Connection, command: VaultCommand) -> Result<()> {
    match command {
        VaultCommand::List { user } => list(conn, user),
        VaultCommand::Save { user, program_id } => save(conn, user, program_id),
        VaultCommand::Status {
            user,
            membership_id,
            status,
        } => set_status(conn, user, membership_id, &status),
        VaultCommand::Delete {
            user,
            membership_id,
        } => delete(conn, user, membership_id),
    }
}

fn list(conn: &Connection, user: Uuid) -> Result<()> {
    let service = SavedProgramService::new(
        SqliteProgramRepository::try_new(conn)?,
        SqliteVaultRepository::try_new(conn)?,
    );
    let items = service.list_for_user(user)?;
    if items.is_empty() {
        println!("Vault is empty.");
        return Ok(());
    }

    println!("{:<36}  {:<9}  {:<10}  TITLE", "MEMBERSHIP", "MODE", "STATUS");
    for item in &items {
        let mode = if item.membership.entry.is_fork() {
            "fork"
        } else {
            "reference"
        };
        println!(
            "{:<36}  {:<9}  {:<10}  {}",
            item.membership.id, mode, item.membership.status, item.title
        );
    }
    Ok(())
}

fn save(conn: &Connection, user: Uuid, program_id: Uuid) -> Result<()> {
    let service = VaultService::new(
        SqliteProgramRepository::try_new(conn)?,
        SqliteVaultRepository::try_new(conn)?,
    );
    let mut session = service.open_program(program_id)?;
    let outcome = service.save(user, &mut session)?;
    println!("{} {}", outcome.membership.id, outcome.saved_as.as_str());
    Ok(())
}

fn set_status(conn: &Connection, user: Uuid, membership_id: Uuid, status: &str) -> Result<()> {
    let service = SavedProgramService::new(
        SqliteProgramRepository::try_new(conn)?,
        SqliteVaultRepository::try_new(conn)?,
    );
    let membership = service.set_status(user, membership_id, status)?;
    println!("{} {}", membership.id, membership.status);
    Ok(())
}

fn delete(conn: &Connection, user: Uuid, membership_id: Uuid) -> Result<()> {
    let service = VaultService::new(
        SqliteProgramRepository::try_new(conn)?,
        SqliteVaultRepository::try_new(conn)?,
    );
    match service.delete(user, membership_id)? {
        DeleteOutcome::Deleted => println!("Deleted {membership_id}"),
        DeleteOutcome::NotFound => println!("Not found: {membership_id}"),
    }
    Ok(())
}
