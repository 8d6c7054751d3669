//! Release building.
//!
//! Walks the first-parent history of a map repository since the last
//! published commit and packages every changed map folder into a release
//! directory:
//!
//! ```text
//! <output>/<tag>/assets/<players>p-<name>.wz
//! <output>/<tag>/release.json
//! ```
//!
//! A release collects whole commits. Before a commit is added, the current
//! release is sealed if it already has assets and the commit's changed maps
//! would push it over the asset cap; the commit then starts the next tag.
//! A single commit is never split, so a release may exceed the cap.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use rand::distr::Alphanumeric;
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::archive::{pack_map_folder, PackagedArchive};
use super::git::CommitHistory;
use super::inspect::MapInspector;
use super::{PublishError, PublishResult};
use crate::config::DEFAULT_MAX_ASSETS_PER_RELEASE;
use crate::validation::{validate_map_info, WarningOptions};

pub const RELEASE_MANIFEST_FILENAME: &str = "release.json";
pub const ASSETS_DIRNAME: &str = "assets";

/// Length of the hash-collision salt.
pub const SALT_LENGTH: usize = 8;

fn release_version_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^v?(\d+)").unwrap())
}

fn unsafe_name_chars() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[^A-Za-z0-9\-_]").unwrap())
}

/// Tag following `current`: `v7` and `7` both give `v8`.
///
/// # Errors
///
/// Returns [`PublishError::InvalidVersion`] if `current` has no leading number.
pub fn next_release_tag(current: &str) -> PublishResult<String> {
    let major = release_version_pattern()
        .captures(current)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<u64>().ok())
        .ok_or_else(|| {
            PublishError::InvalidVersion(format!("Invalid current release tagname: {}", current))
        })?;
    Ok(format!("v{}", major + 1))
}

/// Archive file name for a map: `<players>p-<name>.wz` with unsafe
/// characters replaced by `_`.
pub fn archive_file_name(players: i64, name: &str) -> String {
    format!(
        "{}p-{}.wz",
        players,
        unsafe_name_chars().replace_all(name, "_")
    )
}

/// Random alphanumeric salt.
pub fn generate_salt() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(SALT_LENGTH)
        .map(char::from)
        .collect()
}

/// Contents of `release.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseManifest {
    pub target_commitish: String,
    pub included_commits: Vec<String>,
}

impl ReleaseManifest {
    pub fn read(release_dir: &Path) -> PublishResult<Self> {
        let path = release_dir.join(RELEASE_MANIFEST_FILENAME);
        let text = fs::read_to_string(&path).map_err(|e| PublishError::ReadFailed {
            path: path.clone(),
            source: e,
        })?;
        serde_json::from_str(&text).map_err(|e| PublishError::InvalidJson { path, source: e })
    }

    pub fn write(&self, release_dir: &Path) -> PublishResult<()> {
        let path = release_dir.join(RELEASE_MANIFEST_FILENAME);
        let text = crate::json::to_string_indent4(self).map_err(|e| PublishError::InvalidJson {
            path: path.clone(),
            source: e,
        })?;
        fs::write(&path, text).map_err(|e| PublishError::WriteFailed { path, source: e })
    }
}

/// A release ready for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltRelease {
    pub tag: String,
    pub dir: PathBuf,
    pub manifest: ReleaseManifest,
    pub assets: Vec<PackagedArchive>,
}

impl BuiltRelease {
    pub fn assets_dir(&self) -> PathBuf {
        self.dir.join(ASSETS_DIRNAME)
    }
}

struct PendingRelease {
    tag: String,
    commits: Vec<String>,
    assets: Vec<PackagedArchive>,
    /// Map folder that produced each archive path.
    sources: HashMap<PathBuf, String>,
}

impl PendingRelease {
    fn new(tag: String) -> Self {
        Self {
            tag,
            commits: Vec::new(),
            assets: Vec::new(),
            sources: HashMap::new(),
        }
    }

    /// Folder other than `folder` that already produced `output`.
    fn conflicting_source(&self, output: &Path, folder: &str) -> Option<&str> {
        self.sources
            .get(output)
            .map(String::as_str)
            .filter(|source| *source != folder)
    }

    /// Record an archive, replacing an earlier one at the same path.
    fn insert(&mut self, folder: &str, archive: PackagedArchive) {
        match self.assets.iter_mut().find(|a| a.path == archive.path) {
            Some(existing) => *existing = archive,
            None => {
                self.sources.insert(archive.path.clone(), folder.to_string());
                self.assets.push(archive);
            }
        }
    }
}

/// Builds releases for one map repository.
pub struct ReleaseBuilder<'a> {
    history: &'a dyn CommitHistory,
    inspector: &'a dyn MapInspector,
    repo_root: PathBuf,
    output_dir: PathBuf,
    max_assets_per_release: usize,
}

impl<'a> ReleaseBuilder<'a> {
    /// # Arguments
    ///
    /// * `history` - Commit history of the map repository
    /// * `inspector` - Map info extractor
    /// * `repo_root` - Working tree the map folders are read from
    /// * `output_dir` - Directory receiving one folder per release tag
    pub fn new(
        history: &'a dyn CommitHistory,
        inspector: &'a dyn MapInspector,
        repo_root: &Path,
        output_dir: &Path,
    ) -> Self {
        Self {
            history,
            inspector,
            repo_root: repo_root.to_path_buf(),
            output_dir: output_dir.to_path_buf(),
            max_assets_per_release: DEFAULT_MAX_ASSETS_PER_RELEASE,
        }
    }

    pub fn with_max_assets_per_release(mut self, max: usize) -> Self {
        self.max_assets_per_release = max;
        self
    }

    /// Build releases for every commit after `last_commit`.
    ///
    /// Tags continue from `last_tag`. Only releases with at least one asset
    /// are returned.
    pub fn build(&self, last_commit: &str, last_tag: &str) -> PublishResult<Vec<BuiltRelease>> {
        let commits = self.history.commits_since(last_commit)?;
        let mut releases = Vec::new();
        let mut current = PendingRelease::new(next_release_tag(last_tag)?);
        let mut produced: HashMap<String, PathBuf> = HashMap::new();

        for commit in commits {
            info!("Processing commit: {}", commit);

            let folders = match self.history.changed_map_folders(&commit) {
                Ok(folders) => folders,
                Err(e) => {
                    error!("Failed to list changed folders of commit {}: {}", commit, e);
                    continue;
                }
            };
            if folders.is_empty() {
                info!("No changed map folders in commit {}", commit);
                continue;
            }

            if !current.assets.is_empty()
                && current.assets.len() + folders.len() > self.max_assets_per_release
            {
                let next = PendingRelease::new(next_release_tag(&current.tag)?);
                let sealed = std::mem::replace(&mut current, next);
                releases.push(self.finish(sealed));
            }

            current.commits.push(commit.clone());

            let release_dir = self.output_dir.join(&current.tag);
            let assets_dir = release_dir.join(ASSETS_DIRNAME);
            fs::create_dir_all(&assets_dir).map_err(|e| PublishError::CreateDirectoryFailed {
                path: assets_dir.clone(),
                source: e,
            })?;

            for folder in &folders {
                let Some((path, file_name)) = self.inspect_map(folder) else {
                    continue;
                };
                let output = assets_dir.join(&file_name);
                if let Some(other) = current.conflicting_source(&output, folder) {
                    error!(
                        "{} - package {} was already produced from {} in release {}, skipping",
                        folder, file_name, other, current.tag
                    );
                    continue;
                }
                let archive = self.pack(folder, &path, &output, &mut produced)?;
                current.insert(folder, archive);
            }

            ReleaseManifest {
                target_commitish: commit.clone(),
                included_commits: current.commits.clone(),
            }
            .write(&release_dir)?;
        }

        if !current.assets.is_empty() {
            releases.push(self.finish(current));
        }
        Ok(releases)
    }

    fn finish(&self, release: PendingRelease) -> BuiltRelease {
        let manifest = ReleaseManifest {
            target_commitish: release.commits.last().cloned().unwrap_or_default(),
            included_commits: release.commits,
        };
        BuiltRelease {
            dir: self.output_dir.join(&release.tag),
            tag: release.tag,
            manifest,
            assets: release.assets,
        }
    }

    /// Inspect and validate one map folder. Returns the folder path and
    /// archive file name, or `None` if the map is skipped.
    fn inspect_map(&self, folder: &str) -> Option<(PathBuf, String)> {
        info!("Processing map: {}", folder);
        let path = self.repo_root.join(folder);
        if !path.is_dir() {
            info!("{} - map folder no longer exists, skipping", folder);
            return None;
        }

        let inspection = match self.inspector.inspect(&path) {
            Ok(inspection) => inspection,
            Err(e) => {
                error!("{} - {}", folder, e);
                return None;
            }
        };
        let info = &inspection.map.info;

        let result = validate_map_info(info, true, &WarningOptions::default());
        if !result.errors.is_empty() {
            error!(
                "{} - Validation Errors \n\t{}",
                folder,
                result.errors.join("\n\t")
            );
            return None;
        }
        if !result.errors_non_fatal.is_empty() {
            warn!(
                "{} - Validation Errors (Non-Fatal): \n\t{}",
                folder,
                result.errors_non_fatal.join("\n\t")
            );
        }
        if !result.warnings.is_empty() {
            warn!(
                "{} - Validation Warnings: \n\t{}",
                folder,
                result.warnings.join("\n\t")
            );
        }

        // Validation guarantees both fields
        let (Some(players), Some(name)) = (info.players, info.name.as_deref()) else {
            return None;
        };
        Some((path, archive_file_name(players, name)))
    }

    /// Pack a map folder, salting until its hash differs from every other
    /// archive produced in this run.
    fn pack(
        &self,
        folder: &str,
        path: &Path,
        output: &Path,
        produced: &mut HashMap<String, PathBuf>,
    ) -> PublishResult<PackagedArchive> {
        // The file at `output` is about to be replaced
        produced.retain(|_, existing| existing.as_path() != output);

        let mut archive = pack_map_folder(path, output, None)?;
        while produced.contains_key(&archive.sha256) {
            warn!(
                "{} Collision Warning: Initial generated map package had hash {}, which conflicted with existing map package",
                folder, archive.sha256
            );
            archive = pack_map_folder(path, output, Some(&generate_salt()))?;
        }
        produced.insert(archive.sha256.clone(), output.to_path_buf());
        Ok(archive)
    }
}
