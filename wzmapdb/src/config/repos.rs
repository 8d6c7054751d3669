//! Map repository lists.
//!
//! Two files describe the map repositories:
//!
//! - the map-repos config, keyed by player count, whose last entry per key
//!   receives new map submissions:
//!   `{"2": ["Warzone2100/maps-2p"], "3": ["Warzone2100/maps-3p"]}`
//! - the tracked state `.config/map-repos.json` in the database root, a
//!   list of `{github_repo, last_release}` advanced after each publication.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::info;

/// Tag used for repositories that have never been processed.
pub const INITIAL_RELEASE_TAG: &str = "v0";

/// Errors reading or writing repository lists.
#[derive(Debug, Error)]
pub enum RepoConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid map repos config: {0}")]
    Invalid(String),
}

/// Map repositories per player count, in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MapReposConfig {
    entries: Vec<(String, Vec<String>)>,
}

impl MapReposConfig {
    pub fn load(path: &Path) -> Result<Self, RepoConfigError> {
        let text = fs::read_to_string(path).map_err(|source| RepoConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text).map_err(|e| match e {
            RepoConfigError::Parse { source, .. } => RepoConfigError::Parse {
                path: path.display().to_string(),
                source,
            },
            other => other,
        })
    }

    pub fn from_json(text: &str) -> Result<Self, RepoConfigError> {
        let value: Map<String, Value> =
            serde_json::from_str(text).map_err(|source| RepoConfigError::Parse {
                path: "<map repos config>".to_string(),
                source,
            })?;

        let mut entries = Vec::with_capacity(value.len());
        for (players, repos) in value {
            let repos: Vec<String> = serde_json::from_value(repos).map_err(|_| {
                RepoConfigError::Invalid(format!(
                    "entry '{}' must be a list of repository names",
                    players
                ))
            })?;
            entries.push((players, repos));
        }
        Ok(Self { entries })
    }

    /// Repositories for a player count. The last one is the newest.
    pub fn get_repos_for_map(&self, players: i64) -> &[String] {
        let key = players.to_string();
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, repos)| repos.as_slice())
            .unwrap_or(&[])
    }

    /// Repository new maps with this player count should be submitted to.
    pub fn get_repo_for_new_map_submissions(&self, players: i64) -> Option<&str> {
        self.get_repos_for_map(players).last().map(String::as_str)
    }

    /// Every repository, in file order.
    pub fn all_repos(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .flat_map(|(_, repos)| repos.iter().map(String::as_str))
    }
}

/// Processing state of one map repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedRepo {
    pub github_repo: String,
    #[serde(default = "initial_release")]
    pub last_release: String,
}

fn initial_release() -> String {
    INITIAL_RELEASE_TAG.to_string()
}

impl TrackedRepo {
    pub fn new(github_repo: &str) -> Self {
        Self {
            github_repo: github_repo.to_string(),
            last_release: initial_release(),
        }
    }
}

/// Load tracked state, adding any configured repository not yet tracked.
///
/// A missing state file starts from an empty list.
pub fn load_tracked_repos(
    config: &MapReposConfig,
    state_path: &Path,
) -> Result<Vec<TrackedRepo>, RepoConfigError> {
    let mut repos: Vec<TrackedRepo> = if state_path.exists() {
        let text = fs::read_to_string(state_path).map_err(|source| RepoConfigError::Read {
            path: state_path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| RepoConfigError::Parse {
            path: state_path.display().to_string(),
            source,
        })?
    } else {
        info!("{} not found - initializing", state_path.display());
        Vec::new()
    };

    for repo in config.all_repos() {
        if !repos.iter().any(|r| r.github_repo == repo) {
            repos.push(TrackedRepo::new(repo));
        }
    }
    Ok(repos)
}

/// Write tracked state with 4-space indentation.
pub fn save_tracked_repos(repos: &[TrackedRepo], state_path: &Path) -> Result<(), RepoConfigError> {
    let write_err = |source| RepoConfigError::Write {
        path: state_path.display().to_string(),
        source,
    };
    if let Some(parent) = state_path.parent() {
        fs::create_dir_all(parent).map_err(write_err)?;
    }
    let text = crate::json::to_string_indent4(&repos)
        .map_err(|e| RepoConfigError::Invalid(e.to_string()))?;
    fs::write(state_path, text).map_err(write_err)
}
