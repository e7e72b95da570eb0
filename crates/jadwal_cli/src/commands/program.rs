//! Catalog commands: list, show, publish, import, rate.

use anyhow::{bail, Context, Result};
use clap::{Args, ValueEnum};
use jadwal_core::{
    ProgramDraft, ProgramKind, ProgramListQuery, ProgramService, RatingService,
    SqliteProgramRepository,
};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum KindArg {
    System,
    Community,
}

impl From<KindArg> for ProgramKind {
    fn from(value: KindArg) -> Self {
        match value {
            KindArg::System => ProgramKind::System,
            KindArg::Community => ProgramKind::Community,
        }
    }
}

#[derive(Args)]
pub struct ProgramsArgs {
    /// Free-text search over title, author and summary
    #[arg(long)]
    search: Option<String>,
    /// Only programs carrying this tag
    #[arg(long)]
    tag: Option<String>,
    /// Only programs of this origin
    #[arg(long, value_enum)]
    kind: Option<KindArg>,
    /// Include this user's private programs
    #[arg(long)]
    viewer: Option<Uuid>,
    #[arg(long)]
    limit: Option<u32>,
    #[arg(long, default_value_t = 0)]
    offset: u32,
}

#[derive(Args)]
pub struct ShowArgs {
    program_id: Uuid,
}

#[derive(Args)]
pub struct PublishArgs {
    /// Authenticated author id
    #[arg(long)]
    author: Uuid,
    /// Author display name
    #[arg(long)]
    author_name: String,
    /// JSON program draft
    draft: PathBuf,
}

#[derive(Args)]
pub struct ImportArgs {
    /// JSON program draft
    draft: PathBuf,
}

#[derive(Args)]
pub struct RateArgs {
    program_id: Uuid,
    #[arg(allow_negative_numbers = true)]
    value: i64,
}

pub fn list(conn: &Connection, args: ProgramsArgs) -> Result<()> {
    let service = ProgramService::new(SqliteProgramRepository::try_new(conn)?);
    let result = service.list_programs(ProgramListQuery {
        kind: args.kind.map(ProgramKind::from),
        viewer: args.viewer,
        tag: args.tag,
        search: args.search,
        limit: args.limit,
        offset: args.offset,
    })?;

    if result.items.is_empty() {
        println!("No programs found.");
        return Ok(());
    }
    println!("{:<36}  {:<9}  {:>4}  {:>6}  TITLE", "ID", "TYPE", "MEAN", "COUNT");
    for program in &result.items {
        println!(
            "{:<36}  {:<9}  {:>4.2}  {:>6}  {}",
            program.id,
            program.kind.as_str(),
            program.rating.mean,
            program.rating.count,
            program.title
        );
    }
    Ok(())
}

pub fn show(conn: &Connection, args: ShowArgs) -> Result<()> {
    let service = ProgramService::new(SqliteProgramRepository::try_new(conn)?);
    let Some(program) = service.get_program(args.program_id)? else {
        bail!("program not found: {}", args.program_id);
    };
    println!("{}", serde_json::to_string_pretty(&program)?);
    Ok(())
}

pub fn publish(conn: &Connection, args: PublishArgs) -> Result<()> {
    let draft = read_draft(&args.draft)?;
    let service = ProgramService::new(SqliteProgramRepository::try_new(conn)?);
    let program = service.publish_program(args.author, &args.author_name, draft)?;
    println!("{}", program.id);
    Ok(())
}

pub fn import(conn: &Connection, args: ImportArgs) -> Result<()> {
    let draft = read_draft(&args.draft)?;
    let service = ProgramService::new(SqliteProgramRepository::try_new(conn)?);
    let program = service.import_system_program(draft)?;
    println!("{}", program.id);
    Ok(())
}

pub fn rate(conn: &Connection, args: RateArgs) -> Result<()> {
    let service = RatingService::new(SqliteProgramRepository::try_new(conn)?);
    let aggregate = service.submit(args.program_id, args.value)?;
    println!("mean={:.2} count={}", aggregate.mean, aggregate.count);
    Ok(())
}

fn read_draft(path: &Path) -> Result<ProgramDraft> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read draft `{}`", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse draft `{}`", path.display()))
}
