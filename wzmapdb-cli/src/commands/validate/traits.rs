//! Core traits for the validate command handlers.
//!
//! Handlers depend on these interfaces only, so reports can be checked
//! against canned validation results.

use std::path::Path;

use wzmapdb::validation::{MapValidationDetails, ValidateMapError};

use crate::error::CliError;

// ============================================================================
// Output Trait - Abstracts console output
// ============================================================================

/// Destination of the Markdown report.
pub trait Output {
    /// Print a line of text.
    fn println(&self, message: &str);

    /// Print an empty line.
    fn newline(&self) {
        self.println("");
    }
}

// ============================================================================
// Validation Service Trait
// ============================================================================

/// Validates maps with everything configured up front: inspector, name
/// uniqueness check, expected player count.
pub trait ValidationService {
    /// Validate one map package or map folder.
    ///
    /// [`ValidateMapError::Unprocessable`] means the map itself is broken;
    /// any other error means the check could not be performed.
    fn validate(&self, map_path: &Path) -> Result<MapValidationDetails, ValidateMapError>;

    /// Read the map paths listed in a map list file.
    fn read_map_list(&self, list_file: &Path) -> Result<Vec<String>, CliError>;
}

// ============================================================================
// Command Context
// ============================================================================

/// Dependencies handed to every handler.
pub struct CommandContext<'a> {
    pub output: &'a dyn Output,
    pub validator: &'a dyn ValidationService,
}

impl<'a> CommandContext<'a> {
    pub fn new(output: &'a dyn Output, validator: &'a dyn ValidationService) -> Self {
        Self { output, validator }
    }
}

// ============================================================================
// Command Handler Trait
// ============================================================================

/// A validate subcommand.
pub trait CommandHandler {
    type Args;

    /// Run the command. Returns whether validation passed.
    fn execute(args: Self::Args, ctx: &CommandContext<'_>) -> Result<bool, CliError>;
}
