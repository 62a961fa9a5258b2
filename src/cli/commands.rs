use std::fmt::Write as _;
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use time::OffsetDateTime;

use crate::app::{ActionDispatcher, App};
use crate::config::AppConfig;
use crate::deadline;
use crate::storage::Store;
use crate::ui::rows::{display_rows, DisplayRow, RowStatus, EMPTY_PLACEHOLDER};

#[derive(Args, Debug, Clone)]
pub struct AddArgs {
    /// Text of the neta (prompted if omitted)
    #[arg()]
    pub text: Option<String>,
    /// Deadline as YYYY-MM-DD
    #[arg(long, short)]
    pub deadline: Option<String>,
    /// Keep the neta forever; ignores --deadline
    #[arg(long, short)]
    pub permanent: bool,
}

#[derive(Args, Debug, Clone)]
pub struct DeleteArgs {
    /// Neta identifier (as shown by `list`)
    pub id: i64,
    /// Skip the confirmation prompt
    #[arg(long, short)]
    pub yes: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ExportArgs {
    /// Directory for the backup file (defaults to the configured export dir)
    #[arg(long, short)]
    pub out: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct ImportArgs {
    /// Backup file to append from
    pub file: PathBuf,
    /// Skip the merge confirmation prompt
    #[arg(long, short)]
    pub yes: bool,
}

pub fn run_tui(app: &mut App) -> Result<()> {
    app.run()
}

/// Every command starts the way the TUI does: expired neta go first. A
/// failed write is logged and the command carries on with the swept list.
fn sweep_on_start(store: &mut Store) {
    if let Err(err) = ActionDispatcher::new(store).sweep(deadline::today()) {
        tracing::error!(?err, "sweeping expired neta failed");
    }
}

pub fn add_item(store: &mut Store, args: AddArgs) -> Result<()> {
    sweep_on_start(store);
    let text = match args.text {
        Some(text) => text,
        None => prompt("Neta")?,
    };
    let deadline = args.deadline.unwrap_or_default();
    let item = ActionDispatcher::new(store)
        .submit(&text, &deadline, args.permanent)
        .context("adding neta")?;
    match item.deadline.as_deref() {
        Some(deadline) => println!("Added neta #{} (due {deadline})", item.id),
        None => println!("Added neta #{} (permanent)", item.id),
    }
    Ok(())
}

pub fn list_items(config: &AppConfig, store: &mut Store) -> Result<()> {
    sweep_on_start(store);
    let rows = display_rows(
        store.items(),
        deadline::today(),
        &config.deadline_display_format(),
    );
    print!("{}", format_rows(&rows));
    Ok(())
}

fn format_rows(rows: &[DisplayRow]) -> String {
    if rows.is_empty() {
        return format!("{EMPTY_PLACEHOLDER}\n");
    }
    let mut out = String::new();
    for row in rows {
        let marker = match row.status {
            RowStatus::Expired => "  [EXPIRED]",
            RowStatus::InvalidDate => "  [?]",
            RowStatus::Upcoming | RowStatus::Permanent => "",
        };
        let _ = writeln!(
            &mut out,
            "#{:<14} {:<12} {}{marker}",
            row.id, row.label, row.text
        );
    }
    out
}

pub fn delete_item(store: &mut Store, args: DeleteArgs) -> Result<()> {
    sweep_on_start(store);
    let Some(item) = store.get(args.id).cloned() else {
        bail!("neta #{} not found", args.id);
    };
    if !confirm(&format!("Delete \"{}\"?", item.text), args.yes)? {
        println!("Delete canceled");
        return Ok(());
    }
    ActionDispatcher::new(store)
        .delete(item.id)
        .with_context(|| format!("deleting neta #{}", item.id))?;
    println!("Deleted neta #{} ({})", item.id, item.text);
    Ok(())
}

pub fn sweep_items(store: &mut Store) -> Result<()> {
    let removed = ActionDispatcher::new(store)
        .sweep(deadline::today())
        .context("sweeping expired neta")?;
    let plural = if removed == 1 { "" } else { "s" };
    println!("Removed {removed} expired neta{plural}; {} left", store.len());
    Ok(())
}

pub fn export_items(config: &AppConfig, store: &mut Store, args: ExportArgs) -> Result<()> {
    sweep_on_start(store);
    let dir = args
        .out
        .unwrap_or_else(|| config.storage.export_dir.clone());
    let path = ActionDispatcher::new(store)
        .export(&dir, OffsetDateTime::now_utc().date())
        .context("exporting neta")?;
    println!("Exported {} neta to {}", store.len(), path.display());
    Ok(())
}

pub fn import_items(store: &mut Store, args: ImportArgs) -> Result<()> {
    sweep_on_start(store);
    if !store.is_empty() {
        let question = "Imported neta are appended to the current list and may duplicate \
                        existing entries. Continue?";
        if !confirm(question, args.yes)? {
            println!("Import canceled");
            return Ok(());
        }
    }
    let count = ActionDispatcher::new(store)
        .import_file(&args.file)
        .with_context(|| format!("importing {}", args.file.display()))?;
    println!("Imported {count} neta from {}", args.file.display());
    Ok(())
}

fn confirm(question: &str, assume_yes: bool) -> Result<bool> {
    if assume_yes {
        return Ok(true);
    }
    if !atty::is(atty::Stream::Stdin) {
        bail!("confirmation required; pass --yes when stdin is not a terminal");
    }
    let answer = prompt(&format!("{question} [y/N]"))?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes" | "Yes"))
}

fn prompt(label: &str) -> Result<String> {
    let mut stdout = io::stdout();
    write!(stdout, "{}: ", label)?;
    stdout.flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim_end().to_owned())
}
