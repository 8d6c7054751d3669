//! Per-map validation as reported to map submitters.
//!
//! Combines the map info rules with checks that need context outside the
//! map itself: whether the name is already taken in the map repositories,
//! whether an extracted folder is named after its map, and whether the map
//! was submitted to a repository for its player count.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

use super::{validate_map_info, ValidationResult, WarningOptions};
use crate::command::CommandRunner;
use crate::config::MapReposConfig;
use crate::publisher::{clone_repository, repo_subdir, InspectError, MapInspector};
use crate::tools::ToolError;

/// Folder below the output temp folder that receives map repository clones.
pub const MAP_REPO_CLONE_DIRNAME: &str = "map-repo";

#[derive(Debug, Error)]
pub enum ValidateMapError {
    /// The inspector could not process the map.
    #[error(transparent)]
    Unprocessable(#[from] InspectError),

    #[error("Failed to clone map repo: {repo}: {source}")]
    Clone {
        repo: String,
        #[source]
        source: ToolError,
    },

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid local map repo '{0}': expected <repo>@<existing path>")]
    InvalidLocalRepo(String),

    #[error(transparent)]
    Tool(#[from] ToolError),
}

/// Outcome categories, in reporting order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ValidationStatus {
    PlayersCountMismatch,
    NeedsFormatConversion,
    NameConflict,
    FolderNameDoesNotMatchMapName,
    ValidationErrors,
    Pass,
}

impl fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValidationStatus::PlayersCountMismatch => "PlayersCountMismatch",
            ValidationStatus::NeedsFormatConversion => "NeedsFormatConversion",
            ValidationStatus::NameConflict => "NameConflict",
            ValidationStatus::FolderNameDoesNotMatchMapName => "FolderNameDoesNotMatchMapName",
            ValidationStatus::ValidationErrors => "ValidationErrors",
            ValidationStatus::Pass => "Pass",
        };
        f.write_str(name)
    }
}

/// Everything known about one validated map.
#[derive(Debug, Clone, PartialEq)]
pub struct MapValidationDetails {
    /// Map info document as reported by the inspector.
    pub info: Value,
    pub validation: ValidationResult,
    pub name_conflict: bool,
    pub folder_name_mismatch: bool,
    pub players_count_mismatch: bool,
    pub enforce_format_checks: bool,
}

impl MapValidationDetails {
    pub fn needs_format_conversion(&self) -> bool {
        !self.validation.passed_format_checks
    }

    pub fn status_list(&self) -> Vec<ValidationStatus> {
        let checks = [
            (self.players_count_mismatch, ValidationStatus::PlayersCountMismatch),
            (
                self.enforce_format_checks && self.needs_format_conversion(),
                ValidationStatus::NeedsFormatConversion,
            ),
            (self.name_conflict, ValidationStatus::NameConflict),
            (
                self.folder_name_mismatch,
                ValidationStatus::FolderNameDoesNotMatchMapName,
            ),
            (
                !self.validation.errors.is_empty(),
                ValidationStatus::ValidationErrors,
            ),
        ];
        let statuses: Vec<ValidationStatus> = checks
            .into_iter()
            .filter_map(|(failed, status)| failed.then_some(status))
            .collect();
        if statuses.is_empty() {
            vec![ValidationStatus::Pass]
        } else {
            statuses
        }
    }

    pub fn passed_validation(&self) -> bool {
        self.status_list() == [ValidationStatus::Pass]
    }

    pub fn map_name(&self) -> Option<&str> {
        self.info.get("name").and_then(Value::as_str)
    }

    pub fn players(&self) -> Option<i64> {
        self.info.get("players").and_then(Value::as_i64)
    }

    pub fn author_name(&self) -> Option<&str> {
        self.info.pointer("/author/name").and_then(Value::as_str)
    }
}

/// Local checkouts of map repositories, from `<repo>@<path>` arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalMapRepos {
    repos: HashMap<String, PathBuf>,
}

impl LocalMapRepos {
    /// Parse `<repo>@<path>` arguments. Each path must exist.
    pub fn from_args<S: AsRef<str>>(args: &[S]) -> Result<Self, ValidateMapError> {
        let mut repos = HashMap::new();
        for arg in args {
            let arg = arg.as_ref();
            match arg.split_once('@') {
                Some((repo, path)) if !repo.is_empty() && Path::new(path).exists() => {
                    repos.insert(repo.to_string(), PathBuf::from(path));
                }
                _ => return Err(ValidateMapError::InvalidLocalRepo(arg.to_string())),
            }
        }
        Ok(Self { repos })
    }

    pub fn get(&self, repo: &str) -> Option<&Path> {
        self.repos.get(repo).map(PathBuf::as_path)
    }

    pub fn is_empty(&self) -> bool {
        self.repos.is_empty()
    }
}

/// Checks that a map name is not already used in the map repositories.
///
/// Repositories without a local checkout are cloned once into
/// `<output temp folder>/map-repo/<repo>`.
#[derive(Debug, Clone)]
pub struct MapNameUniquenessCheck {
    output_temp_folder: PathBuf,
    local_repos: LocalMapRepos,
    git: Option<PathBuf>,
    runner: CommandRunner,
}

impl MapNameUniquenessCheck {
    pub fn new(
        output_temp_folder: &Path,
        local_repos: LocalMapRepos,
        git: Option<PathBuf>,
        runner: CommandRunner,
    ) -> Self {
        Self {
            output_temp_folder: output_temp_folder.to_path_buf(),
            local_repos,
            git,
            runner,
        }
    }

    /// Whether no repository has a `maps/<name>` entry, ignoring case.
    pub fn is_name_unique(&self, name: &str, repos: &[String]) -> Result<bool, ValidateMapError> {
        for repo in repos {
            let maps_dir = self.local_repo_path(repo)?.join("maps");
            if maps_dir.join(name).exists() || contains_case_insensitive(&maps_dir, name)? {
                debug!("{} already exists in {}", name, repo);
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn local_repo_path(&self, repo: &str) -> Result<PathBuf, ValidateMapError> {
        if let Some(path) = self.local_repos.get(repo) {
            if path.exists() {
                return Ok(path.to_path_buf());
            }
        }

        let path = repo_subdir(&self.output_temp_folder.join(MAP_REPO_CLONE_DIRNAME), repo);
        if !path.exists() {
            let git = self.git.as_deref().ok_or(ToolError::Missing("git"))?;
            clone_repository(git, repo, &path, &self.runner).map_err(|source| {
                error!("Failed to clone {}: {}", repo, source);
                ValidateMapError::Clone {
                    repo: repo.to_string(),
                    source,
                }
            })?;
        }
        Ok(path)
    }
}

fn contains_case_insensitive(dir: &Path, name: &str) -> Result<bool, ValidateMapError> {
    if !dir.is_dir() {
        return Ok(false);
    }
    let wanted = name.to_lowercase();
    let read_err = |source| ValidateMapError::Read {
        path: dir.to_path_buf(),
        source,
    };
    for entry in fs::read_dir(dir).map_err(read_err)? {
        let entry = entry.map_err(read_err)?;
        if entry.file_name().to_string_lossy().to_lowercase() == wanted {
            return Ok(true);
        }
    }
    Ok(false)
}

/// How to validate a map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidateMapOptions {
    pub enforce_format_checks: bool,
    pub expected_players: Option<i64>,
    pub warnings: WarningOptions,
}

impl Default for ValidateMapOptions {
    fn default() -> Self {
        Self {
            enforce_format_checks: true,
            expected_players: None,
            warnings: WarningOptions::default(),
        }
    }
}

/// Name conflicts are looked up in the repositories configured for the
/// map's player count.
pub struct NameConflictCheck<'a> {
    pub checker: &'a MapNameUniquenessCheck,
    pub repos_config: &'a MapReposConfig,
}

/// Inspect and validate the map package or folder at `map_path`.
///
/// Lines the inspector printed on stderr are reported first among the
/// errors. The name conflict check runs only when `name_check` is given.
pub fn validate_map(
    map_path: &Path,
    inspector: &dyn MapInspector,
    name_check: Option<&NameConflictCheck<'_>>,
    options: &ValidateMapOptions,
) -> Result<MapValidationDetails, ValidateMapError> {
    let inspection = inspector.inspect(map_path)?;
    let info = &inspection.map.info;

    let mut validation =
        validate_map_info(info, options.enforce_format_checks, &options.warnings);
    if !inspection.diagnostics.is_empty() {
        let mut errors = inspection.diagnostics.clone();
        errors.append(&mut validation.errors);
        validation.errors = errors;
    }

    let name_conflict = match (name_check, info.name.as_deref()) {
        (Some(check), Some(name)) => {
            let repos = info
                .players
                .map(|players| check.repos_config.get_repos_for_map(players))
                .unwrap_or_default();
            !check.checker.is_name_unique(name, repos)?
        }
        _ => false,
    };

    let folder_name_mismatch = map_path.is_dir()
        && map_path.file_name().map(|n| n.to_string_lossy()).as_deref() != info.name.as_deref();

    let players_count_mismatch = options
        .expected_players
        .is_some_and(|expected| info.players != Some(expected));

    Ok(MapValidationDetails {
        info: inspection.map.raw,
        validation,
        name_conflict,
        folder_name_mismatch,
        players_count_mismatch,
        enforce_format_checks: options.enforce_format_checks,
    })
}
