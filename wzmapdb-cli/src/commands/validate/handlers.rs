//! Command handlers for validate subcommands.

use std::path::PathBuf;

use tracing::{error, warn};
use wzmapdb::validation::ValidateMapError;

use super::args::{MapArgs, MapListArgs};
use super::output::{print_map_validation_details, print_multi_map_validation_details, MapListResults};
use super::traits::{CommandContext, CommandHandler};
use crate::error::CliError;

// ============================================================================
// Map Handler
// ============================================================================

/// Handler for `validate map`.
pub struct MapHandler;

impl CommandHandler for MapHandler {
    type Args = MapArgs;

    fn execute(args: Self::Args, ctx: &CommandContext<'_>) -> Result<bool, CliError> {
        let details = ctx.validator.validate(&args.map_path)?;
        print_map_validation_details(ctx.output, &args.map_path, &details);
        Ok(details.passed_validation())
    }
}

// ============================================================================
// Map List Handler
// ============================================================================

/// Handler for `validate map-list`.
///
/// Paths that do not exist are skipped. Maps the inspector rejects are
/// reported as unprocessable and fail the overall validation.
pub struct MapListHandler;

impl CommandHandler for MapListHandler {
    type Args = MapListArgs;

    fn execute(args: Self::Args, ctx: &CommandContext<'_>) -> Result<bool, CliError> {
        let mut results = MapListResults::default();

        for entry in ctx.validator.read_map_list(&args.map_list_file)? {
            let map_path = PathBuf::from(&entry);
            if !map_path.exists() {
                warn!("Skipping missing map path: {}", entry);
                continue;
            }
            match ctx.validator.validate(&map_path) {
                Ok(details) => results.validated.push((map_path, details)),
                Err(ValidateMapError::Unprocessable(e)) => {
                    error!("{}: {}", entry, e);
                    results.unprocessable.push((map_path, e.to_string()));
                }
                Err(e) => return Err(e.into()),
            }
        }

        print_multi_map_validation_details(ctx.output, &results);
        Ok(results.overall_pass())
    }
}
