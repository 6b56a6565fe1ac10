//! Binary entry point: resolve where the catalog lives, set up logging, then
//! either run the terminal UI or one of the maintenance subcommands.
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use library_catalog::config::Config;
use library_catalog::maintenance::{catalog_info, clear_all, seed_sample_data};
use library_catalog::validation::current_year;
use library_catalog::{library_stats, open_database, run_app, App};

#[derive(Parser)]
#[command(name = "library-catalog", version, about = "Manage authors and books from the terminal")]
struct Cli {
    /// SQLite database to use instead of the default location.
    #[arg(long, global = true, value_name = "PATH")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Open the interactive catalog (default).
    Tui,
    /// Insert a set of sample authors and books.
    Seed,
    /// Delete every book and author.
    Clear {
        /// Confirm the deletion.
        #[arg(long)]
        yes: bool,
    },
    /// List authors with book counts and books with their authors.
    Info,
    /// Print library statistics.
    Stats,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::resolve(cli.db)?;
    config.prepare_data_dir()?;

    let command = cli.command.unwrap_or(Command::Tui);
    match command {
        Command::Tui => init_tracing(Some(&config.log_path))?,
        _ => init_tracing(None)?,
    }
    info!(db = %config.db_path.display(), "starting library catalog");

    let conn = open_database(&config.db_path)?;
    let year = current_year();

    match command {
        Command::Tui => {
            let mut app = App::new(conn, year)?;
            run_app(&mut app)
        }
        Command::Seed => {
            let summary = seed_sample_data(&conn, year).context("failed to seed sample data")?;
            println!(
                "Created {} authors and {} books ({} already present).",
                summary.authors_created, summary.books_created, summary.skipped
            );
            Ok(())
        }
        Command::Clear { yes } => {
            if !yes {
                bail!("refusing to clear the catalog without --yes");
            }
            let (authors, books) = clear_all(&conn).context("failed to clear catalog")?;
            println!("Removed {authors} authors and {books} books.");
            Ok(())
        }
        Command::Info => {
            for line in catalog_info(&conn).context("failed to read catalog")? {
                println!("{line}");
            }
            Ok(())
        }
        Command::Stats => {
            let stats = library_stats(&conn, year).context("failed to compute statistics")?;
            for line in stats.report_lines() {
                println!("{line}");
            }
            Ok(())
        }
    }
}

/// Log to `log_file` when given (the UI owns the terminal), otherwise to
/// stderr. `RUST_LOG` overrides the default `info` filter.
fn init_tracing(log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init();
        }
        None => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .try_init();
        }
    }
    Ok(())
}
