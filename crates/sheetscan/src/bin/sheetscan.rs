//! sheetscan CLI: read scanned answer sheets and grade the answers.

use clap::{Parser, Subcommand};
use sheetscan::io::SheetSetConfig;
use sheetscan::pipeline::run_read;
use sheetscan::run_grade;
use std::path::{Path, PathBuf};

#[cfg(feature = "tracing")]
use sheetscan::core::init_tracing;
#[cfg(not(feature = "tracing"))]
use sheetscan::core::init_with_level;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "sheetscan")]
#[command(about = "Recover, read and grade scanned answer sheets with QR anchors")]
#[command(version)]
struct Cli {
    /// Log debug detail for every stage.
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scans → answer table and read report.
    Read {
        /// Path to the problem-set config (JSON).
        config: PathBuf,
    },
    /// Answer table → score report.
    Grade {
        /// Path to the problem-set config (JSON).
        config: PathBuf,
    },
}

fn main() -> CliResult<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose)?;

    match cli.command {
        Commands::Read { config } => run_read_cmd(&config),
        Commands::Grade { config } => run_grade_cmd(&config),
    }
}

/// `RUST_LOG` drives the filter when tracing is enabled.
#[cfg(feature = "tracing")]
fn init_logging(_verbose: bool) -> CliResult<()> {
    init_tracing(false);
    Ok(())
}

#[cfg(not(feature = "tracing"))]
fn init_logging(verbose: bool) -> CliResult<()> {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    init_with_level(level)?;
    Ok(())
}

fn run_read_cmd(path: &Path) -> CliResult<()> {
    let config = SheetSetConfig::load_json(path)?;
    let outcome = run_read(&config, None)?;
    println!(
        "{} sheets read, {} excluded; answers written to {}",
        outcome.report.sheets.len(),
        outcome.report.failures.len(),
        config.answers_path().display()
    );
    Ok(())
}

fn run_grade_cmd(path: &Path) -> CliResult<()> {
    let config = SheetSetConfig::load_json(path)?;
    let report = run_grade(&config)?;
    println!(
        "{} sheets graded, {} answers not scored, {} rows rejected; scores written to {}",
        report.scores.len(),
        report.failures.len(),
        report.rejected.len(),
        config.scores_path().display()
    );
    Ok(())
}
