//! CLI error handling with user-friendly messages.
//!
//! Every command failure ends up here; `exit` prints it and terminates with
//! status 1.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::process;

use wzmapdb::config::{ConfigFileError, RepoConfigError};
use wzmapdb::database::DatabaseError;
use wzmapdb::pipeline::PipelineError;
use wzmapdb::publisher::{CatalogError, TokenError};
use wzmapdb::push::PushError;
use wzmapdb::tools::ToolError;
use wzmapdb::validation::ValidateMapError;

/// CLI-specific errors.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(io::Error),
    /// Invalid configuration file
    ConfigFile(ConfigFileError),
    /// Invalid map repos or URLs config
    RepoConfig(RepoConfigError),
    /// A required executable is missing or failed
    Tool(ToolError),
    /// Map validation could not be completed
    Validation(ValidateMapError),
    /// The new-maps pipeline aborted
    Pipeline(PipelineError),
    /// Map database failure
    Database(DatabaseError),
    /// Release catalog client could not be created
    Catalog(CatalogError),
    /// Token provider could not be created
    Token(TokenError),
    /// Authenticated push failed
    Push(PushError),
    /// Failed to read an input file
    FileRead { path: PathBuf, error: io::Error },
    /// Failed to write to stdout
    Output(io::Error),
}

impl CliError {
    /// Exit the process with an error message and status 1.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        if let CliError::Tool(ToolError::Missing(_)) = self {
            eprintln!();
            eprintln!("Install the tool or set its path in the [tools] section of config.ini.");
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(e) => write!(f, "Failed to initialize logging: {}", e),
            CliError::ConfigFile(e) => write!(f, "Configuration error: {}", e),
            CliError::RepoConfig(e) => write!(f, "{}", e),
            CliError::Tool(e) => write!(f, "{}", e),
            CliError::Validation(e) => write!(f, "{}", e),
            CliError::Pipeline(e) => write!(f, "{}", e),
            CliError::Database(e) => write!(f, "Map database error: {}", e),
            CliError::Catalog(e) => write!(f, "Failed to create release catalog: {}", e),
            CliError::Token(e) => write!(f, "Failed to create token provider: {}", e),
            CliError::Push(e) => write!(f, "{}", e),
            CliError::FileRead { path, error } => {
                write!(f, "Failed to read file '{}': {}", path.display(), error)
            }
            CliError::Output(e) => write!(f, "Failed to write output: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::LoggingInit(e) => Some(e),
            CliError::ConfigFile(e) => Some(e),
            CliError::RepoConfig(e) => Some(e),
            CliError::Tool(e) => Some(e),
            CliError::Validation(e) => Some(e),
            CliError::Pipeline(e) => Some(e),
            CliError::Database(e) => Some(e),
            CliError::Catalog(e) => Some(e),
            CliError::Token(e) => Some(e),
            CliError::Push(e) => Some(e),
            CliError::FileRead { error, .. } => Some(error),
            CliError::Output(e) => Some(e),
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::ConfigFile(e)
    }
}

impl From<RepoConfigError> for CliError {
    fn from(e: RepoConfigError) -> Self {
        CliError::RepoConfig(e)
    }
}

impl From<ToolError> for CliError {
    fn from(e: ToolError) -> Self {
        CliError::Tool(e)
    }
}

impl From<ValidateMapError> for CliError {
    fn from(e: ValidateMapError) -> Self {
        CliError::Validation(e)
    }
}

impl From<PipelineError> for CliError {
    fn from(e: PipelineError) -> Self {
        CliError::Pipeline(e)
    }
}

impl From<DatabaseError> for CliError {
    fn from(e: DatabaseError) -> Self {
        CliError::Database(e)
    }
}

impl From<CatalogError> for CliError {
    fn from(e: CatalogError) -> Self {
        CliError::Catalog(e)
    }
}

impl From<TokenError> for CliError {
    fn from(e: TokenError) -> Self {
        CliError::Token(e)
    }
}

impl From<PushError> for CliError {
    fn from(e: PushError) -> Self {
        CliError::Push(e)
    }
}
