//! Concrete implementations of the validate service traits.

use std::fs;
use std::path::Path;

use wzmapdb::config::MapReposConfig;
use wzmapdb::publisher::MaptoolsInspector;
use wzmapdb::validation::{
    validate_map, MapNameUniquenessCheck, MapValidationDetails, NameConflictCheck,
    ValidateMapError, ValidateMapOptions,
};

use super::traits::{Output, ValidationService};
use crate::error::CliError;

// ============================================================================
// Console Output Implementation
// ============================================================================

/// Report output on stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleOutput;

impl ConsoleOutput {
    pub fn new() -> Self {
        Self
    }
}

impl Output for ConsoleOutput {
    fn println(&self, message: &str) {
        println!("{}", message);
    }
}

// ============================================================================
// Default Validation Service
// ============================================================================

/// Validates with `maptools`, checking name uniqueness unless disabled.
pub struct DefaultValidationService {
    inspector: MaptoolsInspector,
    repos_config: MapReposConfig,
    uniqueness: Option<MapNameUniquenessCheck>,
    options: ValidateMapOptions,
}

impl DefaultValidationService {
    pub fn new(
        inspector: MaptoolsInspector,
        repos_config: MapReposConfig,
        uniqueness: Option<MapNameUniquenessCheck>,
        options: ValidateMapOptions,
    ) -> Self {
        Self {
            inspector,
            repos_config,
            uniqueness,
            options,
        }
    }
}

impl ValidationService for DefaultValidationService {
    fn validate(&self, map_path: &Path) -> Result<MapValidationDetails, ValidateMapError> {
        let name_check = self.uniqueness.as_ref().map(|checker| NameConflictCheck {
            checker,
            repos_config: &self.repos_config,
        });
        validate_map(map_path, &self.inspector, name_check.as_ref(), &self.options)
    }

    fn read_map_list(&self, list_file: &Path) -> Result<Vec<String>, CliError> {
        let text = fs::read_to_string(list_file).map_err(|error| CliError::FileRead {
            path: list_file.to_path_buf(),
            error,
        })?;
        Ok(parse_map_list(&text))
    }
}

/// Non-blank lines of a map list, with trailing whitespace removed.
pub fn parse_map_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim_end)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
