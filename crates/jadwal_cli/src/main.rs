//! jadwal - workout program catalog and vault CLI.
//!
//! # Responsibility
//! - Map command-line flags onto core configuration (database path, logging).
//! - Dispatch subcommands to core services and print their results.
//!
//! # Invariants
//! - Failures exit non-zero with the error on stderr.

mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use commands::{program, vault};
use log::info;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "jadwal", version, about = "Workout programs, vault forks and ratings")]
struct Cli {
    /// SQLite database file
    #[arg(long, global = true, env = "JADWAL_DB", default_value = "jadwal.db")]
    db: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "JADWAL_LOG_LEVEL")]
    log_level: Option<String>,

    /// Directory for rotating log files; file logging is off when absent
    #[arg(long, global = true, env = "JADWAL_LOG_DIR")]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List or search catalog programs
    Programs(program::ProgramsArgs),
    /// Print one program as JSON
    Show(program::ShowArgs),
    /// Publish a community program from a JSON draft
    Publish(program::PublishArgs),
    /// Import a system program from a JSON draft
    Import(program::ImportArgs),
    /// Rate a program from 1 to 5
    Rate(program::RateArgs),
    /// Saved programs of one user
    Vault {
        #[command(subcommand)]
        command: vault::VaultCommand,
    },
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Self::Programs(_) => "programs",
            Self::Show(_) => "show",
            Self::Publish(_) => "publish",
            Self::Import(_) => "import",
            Self::Rate(_) => "rate",
            Self::Vault { command } => command.name(),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(log_dir) = &cli.log_dir {
        let level = cli
            .log_level
            .as_deref()
            .unwrap_or_else(|| jadwal_core::default_log_level());
        let log_dir = absolute(log_dir)?;
        jadwal_core::init_logging(level, &log_dir)
            .map_err(|err| anyhow::anyhow!("{err}"))
            .context("failed to initialize logging")?;
    }

    let conn = jadwal_core::open_db(&cli.db)
        .with_context(|| format!("failed to open database `{}`", cli.db.display()))?;
    info!(
        "event=cli_command module=cli status=start command={}",
        cli.command.name()
    );

    match cli.command {
        Commands::Programs(args) => program::list(&conn, args),
        Commands::Show(args) => program::show(&conn, args),
        Commands::Publish(args) => program::publish(&conn, args),
        Commands::Import(args) => program::import(&conn, args),
        Commands::Rate(args) => program::rate(&conn, args),
        Commands::Vault { command } => vault::handle(&conn, command),
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().context("failed to resolve current directory")?;
    Ok(cwd.join(path))
}
