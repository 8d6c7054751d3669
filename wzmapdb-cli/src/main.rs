//! wzmapdb CLI - Warzone 2100 map release and database tooling
//!
//! Exit status is 0 on success and 1 on failure. For `validate` failure
//! means the maps did not pass; for `process-new-maps` it means no maps
//! were added to the database.

mod commands;
mod error;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use wzmapdb::config::ConfigFile;
use wzmapdb::logging::init_logging;

use commands::process::ProcessNewMapsArgs;
use commands::push::PushArgs;
use commands::rebuild::RebuildIndexArgs;
use commands::validate::ValidateCommand;
use error::CliError;

#[derive(Parser)]
#[command(name = "wzmapdb")]
#[command(version, about = "Warzone 2100 map validation, release and database pipeline", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Configuration file (default: ~/.wzmapdb/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a map package, or the map folders of a map repo PR
    Validate(ValidateCommand),

    /// Publish new maps from the map repos and add them to the map database
    ProcessNewMaps(ProcessNewMapsArgs),

    /// Refresh the map database index from the stored map info files
    RebuildIndex(RebuildIndexArgs),

    /// Push a branch using a GitHub App installation token
    Push(PushArgs),
}

fn load_config(path: Option<&PathBuf>) -> Result<ConfigFile, CliError> {
    Ok(match path {
        Some(path) => ConfigFile::load_from(path)?,
        None => ConfigFile::load()?,
    })
}

/// Run the selected command. Returns whether it succeeded.
fn run(cli: Cli) -> Result<bool, CliError> {
    let config = load_config(cli.config.as_ref())?;
    let _logging = init_logging(
        &config.logging.directory,
        &config.logging.file,
        cli.verbose,
    )
    .map_err(CliError::LoggingInit)?;

    match cli.command {
        Commands::Validate(command) => commands::validate::run(command, &config),
        Commands::ProcessNewMaps(args) => commands::process::run(args, &config),
        Commands::RebuildIndex(args) => commands::rebuild::run(args).map(|()| true),
        Commands::Push(args) => commands::push::run(args, &config).map(|()| true),
    }
}

fn main() {
    let cli = Cli::parse();
    match run(cli) {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => e.exit(),
    }
}
