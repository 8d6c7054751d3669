//! Map validation commands, reporting in Markdown.
//!
//! Follows the command pattern with trait-based dependency injection:
//!
//! - `traits`: `Output`, `ValidationService`, `CommandHandler`
//! - `services`: console output and the maptools-backed validator
//! - `args`: clap argument types
//! - `handlers`: one handler per subcommand
//! - `output`: the Markdown report
//!
//! # Example
//!
//! ```ignore
//! let output = ConsoleOutput::new();
//! let ctx = CommandContext::new(&output, &validator);
//! let passed = MapHandler::execute(MapArgs { map_path }, &ctx)?;
//! ```

mod args;
mod handlers;
mod output;
mod services;
mod traits;

#[cfg(test)]
mod tests;

pub use args::{ValidateCommand, ValidateTarget};
pub use handlers::{MapHandler, MapListHandler};
pub use services::{ConsoleOutput, DefaultValidationService};
pub use traits::CommandHandler;

use std::env;
use std::path::PathBuf;

use args::{MapArgs, MapListArgs};
use traits::CommandContext;
use wzmapdb::command::CommandRunner;
use wzmapdb::config::{ConfigFile, MapReposConfig};
use wzmapdb::publisher::MaptoolsInspector;
use wzmapdb::tools::ExternalTools;
use wzmapdb::validation::{LocalMapRepos, MapNameUniquenessCheck, ValidateMapOptions};

use crate::error::CliError;

fn default_output_temp_folder() -> PathBuf {
    env::temp_dir().join("wzmapdb-validate")
}

/// Build the validator described by the command line.
fn build_service(
    command: &ValidateCommand,
    config: &ConfigFile,
) -> Result<DefaultValidationService, CliError> {
    let tools = ExternalTools::discover(&config.tools);
    let runner = CommandRunner::new(false);
    let inspector = MaptoolsInspector::new(tools.require_maptools()?, runner);

    let repos_config = match &command.map_repos_config {
        Some(path) => MapReposConfig::load(path)?,
        None => MapReposConfig::default(),
    };

    let uniqueness = if command.skip_uniqueness_checks {
        None
    } else {
        let output_temp_folder = command
            .output_temp_folder
            .clone()
            .unwrap_or_else(default_output_temp_folder);
        Some(MapNameUniquenessCheck::new(
            &output_temp_folder,
            LocalMapRepos::from_args(command.local_map_repo.as_slice())?,
            tools.git.clone(),
            runner,
        ))
    };

    let options = ValidateMapOptions {
        expected_players: command.expected_players,
        ..ValidateMapOptions::default()
    };

    Ok(DefaultValidationService::new(
        inspector,
        repos_config,
        uniqueness,
        options,
    ))
}

/// Run a validate subcommand. Returns whether validation passed.
pub fn run(command: ValidateCommand, config: &ConfigFile) -> Result<bool, CliError> {
    let validator = build_service(&command, config)?;
    let output = ConsoleOutput::new();
    let ctx = CommandContext::new(&output, &validator);

    match command.target {
        ValidateTarget::Map { map_path } => MapHandler::execute(MapArgs { map_path }, &ctx),
        ValidateTarget::MapList { map_list_file } => {
            MapListHandler::execute(MapListArgs { map_list_file }, &ctx)
        }
    }
}
