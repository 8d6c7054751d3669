//! Release hosting via the `gh` CLI.

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use super::git::CommitHistory;
use super::{PublishError, PublishResult};
use crate::command::{CommandRunner, CommandSpec};
use crate::config::INITIAL_RELEASE_TAG;

pub const GITHUB_API_VERSION: &str = "2022-11-28";
pub const GITHUB_ACCEPT: &str = "application/vnd.github+json";

/// Format of the host's publish timestamps.
pub const HOST_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Format used for upload dates in release info.
pub const UPLOAD_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// The newest published release of a repository.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestRelease {
    pub tag_name: String,
    pub target_commitish: String,
}

/// A release to create.
#[derive(Debug, Clone, Copy)]
pub struct NewRelease<'a> {
    pub tag: &'a str,
    pub target: &'a str,
    pub notes_file: &'a Path,
    /// Directory the assets are uploaded from.
    pub assets_dir: &'a Path,
    /// Asset file names relative to `assets_dir`.
    pub assets: &'a [String],
}

/// Hosted release operations.
///
/// Mutating calls are suppressed by the implementation in dry-run mode.
pub trait ReleaseHost {
    /// The latest release, or `None` if the repository has none.
    ///
    /// # Errors
    ///
    /// Fails if the host cannot confirm whether releases exist.
    fn latest_release(&self, repo: &str) -> PublishResult<Option<LatestRelease>>;

    fn release_exists(&self, repo: &str, tag: &str) -> PublishResult<bool>;

    fn create_release(
        &self,
        repo: &str,
        release: &NewRelease<'_>,
        token: Option<&str>,
    ) -> PublishResult<()>;

    fn delete_release(&self, repo: &str, tag: &str, token: Option<&str>) -> PublishResult<()>;

    /// Publish time as `YYYY-MM-DD HH:MM:SS` UTC.
    fn published_at(&self, repo: &str, tag: &str) -> PublishResult<String>;

    /// Download every asset of a release into `dir`.
    fn download_release(&self, repo: &str, tag: &str, dir: &Path) -> PublishResult<()>;
}

/// [`ReleaseHost`] backed by the `gh` executable.
#[derive(Debug, Clone)]
pub struct GhCliHost {
    gh: PathBuf,
    runner: CommandRunner,
}

impl GhCliHost {
    pub fn new(gh: &Path, runner: CommandRunner) -> Self {
        Self {
            gh: gh.to_path_buf(),
            runner,
        }
    }

    fn release(&self, repo: &str) -> CommandSpec {
        CommandSpec::new(&self.gh).args(["release", "--repo", repo])
    }

    fn with_token(spec: CommandSpec, token: Option<&str>) -> CommandSpec {
        match token {
            Some(token) => spec.env("GH_TOKEN", token),
            None => spec,
        }
    }

    fn invalid_output(what: &str, e: serde_json::Error) -> PublishError {
        PublishError::InvalidJson {
            path: PathBuf::from(what),
            source: e,
        }
    }
}

impl ReleaseHost for GhCliHost {
    fn latest_release(&self, repo: &str) -> PublishResult<Option<LatestRelease>> {
        let view = self
            .release(repo)
            .args(["view", "--json", "name,tagName,targetCommitish"]);
        let output = self.runner.run(&view)?;
        if output.success() {
            let latest: LatestRelease = serde_json::from_slice(&output.stdout)
                .map_err(|e| Self::invalid_output("gh release view", e))?;
            return Ok(Some(latest));
        }

        // gh exits non-zero both for "no releases" and for network trouble.
        // Listing releases tells the two apart.
        let list = CommandSpec::new(&self.gh)
            .args(["api", "-H"])
            .arg(format!("Accept: {}", GITHUB_ACCEPT))
            .arg("-H")
            .arg(format!("X-GitHub-Api-Version: {}", GITHUB_API_VERSION))
            .arg(format!("/repos/{}/releases", repo));
        let output = self.runner.run(&list)?;
        if !output.success() {
            return Err(PublishError::ReleaseListing(
                "GH CLI does not appear to be functioning properly - there is probably either a network issue, or an issue with the GitHub API".to_string(),
            ));
        }
        confirm_no_releases(&output.stdout)?;
        Ok(None)
    }

    fn release_exists(&self, repo: &str, tag: &str) -> PublishResult<bool> {
        let output = self.runner.run(&self.release(repo).args(["view", tag]))?;
        Ok(output.success())
    }

    fn create_release(
        &self,
        repo: &str,
        release: &NewRelease<'_>,
        token: Option<&str>,
    ) -> PublishResult<()> {
        let spec = self
            .release(repo)
            .args(["create", release.tag, "--target", release.target, "--notes-file"])
            .arg(release.notes_file)
            .args(release.assets.iter().map(|a| format!("./{}", a)))
            .current_dir(release.assets_dir);
        let output = self
            .runner
            .run_modification(&Self::with_token(spec, token))?;
        if output.success() {
            Ok(())
        } else {
            Err(PublishError::UploadFailed {
                tag: release.tag.to_string(),
                reason: format!(
                    "gh release --repo {} create {} failed with exit code: {}, and error: {}",
                    repo,
                    release.tag,
                    output.code_display(),
                    output.stderr_text().trim()
                ),
            })
        }
    }

    fn delete_release(&self, repo: &str, tag: &str, token: Option<&str>) -> PublishResult<()> {
        let spec = self.release(repo).args(["delete", tag, "--yes"]);
        let spec = Self::with_token(spec, token);
        let output = self.runner.run_modification(&spec)?;
        output.check(&spec)?;
        Ok(())
    }

    fn published_at(&self, repo: &str, tag: &str) -> PublishResult<String> {
        let spec = self
            .release(repo)
            .args(["view", tag, "--json", "publishedAt"]);
        let output = self.runner.run_checked(&spec)?;
        let value: Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| Self::invalid_output("gh release view --json publishedAt", e))?;
        let published = value
            .get("publishedAt")
            .and_then(Value::as_str)
            .unwrap_or_default();
        host_timestamp_to_upload_date(published)
    }

    fn download_release(&self, repo: &str, tag: &str, dir: &Path) -> PublishResult<()> {
        let spec = self
            .release(repo)
            .args(["download", tag, "--dir"])
            .arg(dir);
        self.runner.run_checked(&spec)?;
        Ok(())
    }
}

fn confirm_no_releases(stdout: &[u8]) -> PublishResult<()> {
    let releases: Value = serde_json::from_slice(stdout)
        .map_err(|e| GhCliHost::invalid_output("gh api releases", e))?;
    match releases.as_array() {
        None => Err(PublishError::ReleaseListing(
            "GH CLI returned unexpected result (requesting latest release failed, but requesting a list of releases returned a non-array) - possible network issue or issue with GitHub API?".to_string(),
        )),
        Some(list) if !list.is_empty() => Err(PublishError::ReleaseListing(
            "GH CLI returned unexpected result (requesting latest release failed, but requesting a list of releases returned results) - possible transient network issue?".to_string(),
        )),
        Some(_) => Ok(()),
    }
}

/// Convert `2023-05-01T12:30:00Z` to `2023-05-01 12:30:00`.
pub fn host_timestamp_to_upload_date(value: &str) -> PublishResult<String> {
    NaiveDateTime::parse_from_str(value, HOST_TIMESTAMP_FORMAT)
        .map(|d| d.format(UPLOAD_DATE_FORMAT).to_string())
        .map_err(|e| PublishError::InvalidTimestamp(format!("'{}': {}", value, e)))
}

/// Last published commit and tag of a repository.
///
/// Without releases, history starts at the main branch's root commit with
/// tag `v0`.
pub fn resolve_latest_release(
    host: &dyn ReleaseHost,
    history: &dyn CommitHistory,
    repo: &str,
) -> PublishResult<(String, String)> {
    match host.latest_release(repo)? {
        Some(latest) => Ok((latest.target_commitish, latest.tag_name)),
        None => {
            info!("{} has no releases yet", repo);
            Ok((history.root_commit()?, INITIAL_RELEASE_TAG.to_string()))
        }
    }
}


#[cfg(test)]
mod tests {
    use super::fakes::FakeHost;
    use super::*;
    use crate::tools::ToolError;

    struct RootOnly;

    impl CommitHistory for RootOnly {
        fn commits_since(&self, _since: &str) -> Result<Vec<String>, ToolError> {
            Ok(Vec::new())
        }
        fn changed_map_folders(&self, _commit: &str) -> Result<Vec<String>, ToolError> {
            Ok(Vec::new())
        }
        fn root_commit(&self) -> Result<String, ToolError> {
            Ok("abc123".to_string())
        }
    }

    #[test]
    fn test_timestamp_conversion() {
        assert_eq!(
            host_timestamp_to_upload_date("2023-05-01T12:30:07Z").unwrap(),
            "2023-05-01 12:30:07"
        );
        assert!(host_timestamp_to_upload_date("yesterday").is_err());
    }

    #[test]
    fn test_confirm_no_releases() {
        assert!(confirm_no_releases(b"[]").is_ok());
        assert!(matches!(
            confirm_no_releases(b"[{\"tag_name\": \"v1\"}]"),
            Err(PublishError::ReleaseListing(_))
        ));
        assert!(matches!(
            confirm_no_releases(b"{\"message\": \"Not Found\"}"),
            Err(PublishError::ReleaseListing(_))
        ));
        assert!(confirm_no_releases(b"not json").is_err());
    }

    #[test]
    fn test_latest_release_json() {
        let latest: LatestRelease = serde_json::from_str(
            r#"{"name": "v3", "tagName": "v3", "targetCommitish": "deadbeef"}"#,
        )
        .unwrap();
        assert_eq!(latest.tag_name, "v3");
        assert_eq!(latest.target_commitish, "deadbeef");
    }

    #[test]
    fn test_resolve_uses_latest_release() {
        let host = FakeHost {
            latest: Some(LatestRelease {
                tag_name: "v9".to_string(),
                target_commitish: "cafe".to_string(),
            }),
            ..Default::default()
        };
        let resolved = resolve_latest_release(&host, &RootOnly, "Warzone2100/maps-2p").unwrap();
        assert_eq!(resolved, ("cafe".to_string(), "v9".to_string()));
    }

    #[test]
    fn test_resolve_without_releases_uses_root_commit() {
        let host = FakeHost::default();
        let resolved = resolve_latest_release(&host, &RootOnly, "Warzone2100/maps-2p").unwrap();
        assert_eq!(resolved, ("abc123".to_string(), "v0".to_string()));
    }

    #[test]
    fn test_resolve_listing_failure_is_fatal() {
        let host = FakeHost {
            fail_listing: true,
            ..Default::default()
        };
        assert!(resolve_latest_release(&host, &RootOnly, "Warzone2100/maps-2p").is_err());
    }

    #[test]
    fn test_dry_run_create_is_suppressed() {
        let host = GhCliHost::new(Path::new("/nonexistent/gh"), CommandRunner::new(true));
        let release = NewRelease {
            tag: "v1",
            target: "abc",
            notes_file: Path::new("notes.md"),
            assets_dir: Path::new("."),
            assets: &["2p-Map.wz".to_string()],
        };
        assert!(host.create_release("Warzone2100/maps-2p", &release, None).is_ok());
        assert!(host.delete_release("Warzone2100/maps-2p", "v1", None).is_ok());
    }
}
