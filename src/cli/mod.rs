use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use once_cell::sync::OnceCell;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, EnvFilter};

use crate::app::App;
use crate::config::ConfigLoader;
use crate::storage;

pub mod commands;

const LOG_FILE_NAME: &str = "neta.log";

use self::commands::{AddArgs, DeleteArgs, ExportArgs, ImportArgs};

#[derive(Parser, Debug)]
#[command(
    name = "neta",
    version,
    about = "Terminal list of neta with deadlines and automatic expiry"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Override the config file location (takes precedence over NETA_CONFIG)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the data directory (takes precedence over NETA_DATA)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Minimum log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Launch the interactive TUI (default)
    Tui,
    /// Add a neta from the command line
    Add(AddArgs),
    /// Print the list in display order
    List,
    /// Delete a neta by id
    Delete(DeleteArgs),
    /// Remove expired neta now
    Sweep,
    /// Write the whole list to neta_backup_<date>.json
    Export(ExportArgs),
    /// Append the neta from a backup file
    Import(ImportArgs),
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.config {
        env::set_var("NETA_CONFIG", path);
    }
    if let Some(path) = &cli.data_dir {
        env::set_var("NETA_DATA", path);
    }

    let command = cli.command.unwrap_or(Commands::Tui);
    let loader = ConfigLoader::discover()?;
    let paths = loader.paths().clone();
    // The TUI owns the terminal, so its log lines go to a file instead.
    let log_target = match command {
        Commands::Tui => LogTarget::File(paths.data_dir.clone()),
        _ => LogTarget::Stderr,
    };
    init_tracing(&cli.log_level, log_target)
        .with_context(|| format!("initialising logging at level {}", cli.log_level))?;
    let config = loader.load_or_init()?;
    let mut store = storage::init(&paths, &config.storage)?;

    let config = Arc::new(config);
    match command {
        Commands::Tui => {
            let mut app = App::new(config, store)?;
            commands::run_tui(&mut app)
        }
        Commands::Add(args) => commands::add_item(&mut store, args),
        Commands::List => commands::list_items(&config, &mut store),
        Commands::Delete(args) => commands::delete_item(&mut store, args),
        Commands::Sweep => commands::sweep_items(&mut store),
        Commands::Export(args) => commands::export_items(&config, &mut store, args),
        Commands::Import(args) => commands::import_items(&mut store, args),
    }
}

fn log_file_appender(dir: &Path) -> Result<RollingFileAppender> {
    fs::create_dir_all(dir)
        .with_context(|| format!("creating log directory {}", dir.display()))?;
    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(LOG_FILE_NAME)
        .build(dir)
        .with_context(|| format!("opening log file in {}", dir.display()))
}

enum LogTarget {
    Stderr,
    /// `neta.log` inside the given directory.
    File(PathBuf),
}

fn init_tracing(level: &str, target: LogTarget) -> Result<()> {
    static INIT: OnceCell<()> = OnceCell::new();
    INIT.get_or_try_init(|| -> Result<()> {
        let env_filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"));
        match target {
            LogTarget::Stderr => fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init(),
            LogTarget::File(dir) => {
                let appender = log_file_appender(&dir)?;
                fmt()
                    .with_env_filter(env_filter)
                    .with_ansi(false)
                    .with_writer(appender)
                    .init();
            }
        }
        Ok(())
    })
    .map(|_| ())
}
