//! Release publishing.
//!
//! Uploads a built release folder as a hosted release and reports when the
//! host says it was published.

use std::fs;
use std::path::Path;

use chrono::Utc;
use tracing::{info, warn};

use super::host::{NewRelease, ReleaseHost, UPLOAD_DATE_FORMAT};
use super::release::{ReleaseManifest, ASSETS_DIRNAME};
use super::token::AccessTokenSource;
use super::{PublishError, PublishResult};

/// Release notes file, written next to `release.json` while uploading.
pub const RELEASE_NOTES_FILENAME: &str = "tmp-gh-release-notes.md";

/// Extension of uploadable map packages.
pub const MAP_PACKAGE_EXTENSION: &str = "wz";

/// A release that is now hosted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedRelease {
    pub tag: String,
    /// Publish time, `YYYY-MM-DD HH:MM:SS` UTC.
    pub uploaded: String,
}

/// Release notes: the target commit, plus every included commit when there
/// is more than one.
pub fn release_notes(manifest: &ReleaseManifest) -> String {
    let mut notes = format!("target_commitish: {}", manifest.target_commitish);
    if manifest.included_commits.len() > 1 {
        notes.push_str("\n\nincluded_commits:\n");
        for commit in &manifest.included_commits {
            notes.push_str("- ");
            notes.push_str(commit);
            notes.push('\n');
        }
    }
    notes.push('\n');
    notes
}

/// Sorted names of the `.wz` files directly inside `assets_dir`.
pub fn list_map_packages(assets_dir: &Path) -> PublishResult<Vec<String>> {
    let entries = fs::read_dir(assets_dir).map_err(|e| PublishError::ReadFailed {
        path: assets_dir.to_path_buf(),
        source: e,
    })?;
    let mut packages: Vec<String> = entries
        .filter_map(Result::ok)
        .filter(|entry| entry.path().is_file())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .is_some_and(|ext| ext == MAP_PACKAGE_EXTENSION)
        })
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    packages.sort();
    Ok(packages)
}

/// Publishes release folders produced by the release builder.
pub struct ReleaseUploader<'a> {
    host: &'a dyn ReleaseHost,
    tokens: Option<&'a dyn AccessTokenSource>,
    dry_run: bool,
}

impl<'a> ReleaseUploader<'a> {
    pub fn new(host: &'a dyn ReleaseHost, dry_run: bool) -> Self {
        Self {
            host,
            tokens: None,
            dry_run,
        }
    }

    /// Create releases with a freshly minted token instead of ambient credentials.
    pub fn with_token_source(mut self, tokens: &'a dyn AccessTokenSource) -> Self {
        self.tokens = Some(tokens);
        self
    }

    /// Upload every release folder in order, stopping at the first failure.
    pub fn upload_all(
        &self,
        repo: &str,
        output_dir: &Path,
        tags: &[String],
    ) -> PublishResult<Vec<UploadedRelease>> {
        tags.iter()
            .map(|tag| self.upload(repo, &output_dir.join(tag), tag))
            .collect()
    }

    /// Upload `<release_dir>/assets/*.wz` as release `tag` of `repo`.
    ///
    /// # Errors
    ///
    /// Fails without touching the host if there is nothing to upload or the
    /// tag already exists. If creating the release fails, the partial
    /// release is deleted and the failure returned.
    pub fn upload(&self, repo: &str, release_dir: &Path, tag: &str) -> PublishResult<UploadedRelease> {
        let manifest = ReleaseManifest::read(release_dir)?;

        let notes_file = release_dir.join(RELEASE_NOTES_FILENAME);
        fs::write(&notes_file, release_notes(&manifest)).map_err(|e| PublishError::WriteFailed {
            path: notes_file.clone(),
            source: e,
        })?;

        let assets_dir = release_dir.join(ASSETS_DIRNAME);
        let assets = list_map_packages(&assets_dir)?;
        if assets.is_empty() {
            return Err(PublishError::NoAssets(assets_dir));
        }

        if self.host.release_exists(repo, tag)? {
            return Err(PublishError::ReleaseExists(format!("{} ({})", tag, repo)));
        }

        let token = self.access_token(repo)?;

        let release = NewRelease {
            tag,
            target: &manifest.target_commitish,
            notes_file: &notes_file,
            assets_dir: &assets_dir,
            assets: &assets,
        };
        info!("Creating release {} of {} with {} map(s)", tag, repo, assets.len());
        if let Err(e) = self.host.create_release(repo, &release, token.as_deref()) {
            if let Err(cleanup) = self.host.delete_release(repo, tag, token.as_deref()) {
                warn!("Failed to delete partial release {}: {}", tag, cleanup);
            }
            return Err(e);
        }

        if !self.dry_run {
            remove_notes_file(&notes_file);
        }

        let uploaded = match self.host.published_at(repo, tag) {
            Ok(date) => date,
            Err(e) => {
                warn!(
                    "Warning: Unable to fetch publish date for release {} in repo {}: {}",
                    tag, repo, e
                );
                Utc::now().format(UPLOAD_DATE_FORMAT).to_string()
            }
        };

        Ok(UploadedRelease {
            tag: tag.to_string(),
            uploaded,
        })
    }

    fn access_token(&self, repo: &str) -> PublishResult<Option<String>> {
        let Some(tokens) = self.tokens else {
            return Ok(None);
        };
        if self.dry_run {
            info!("DRYRUN - Would request access token from token provider");
            return Ok(None);
        }
        Ok(Some(tokens.access_token(repo)?))
    }
}

fn remove_notes_file(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        warn!("Failed to remove {}: {}", path.display(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publisher::host::fakes::FakeHost;
    use crate::publisher::token::TokenError;
    use std::cell::Cell;
    use std::path::PathBuf;
    use tempfile::TempDir;

    struct StaticToken {
        requests: Cell<usize>,
        fail: bool,
    }

    impl StaticToken {
        fn new(fail: bool) -> Self {
            Self {
                requests: Cell::new(0),
                fail,
            }
        }
    }

    impl AccessTokenSource for StaticToken {
        fn access_token(&self, repo: &str) -> Result<String, TokenError> {
            self.requests.set(self.requests.get() + 1);
            if self.fail {
                return Err(TokenError::Installation {
                    repo: repo.to_string(),
                    status: 404,
                });
            }
            Ok("tok-123".to_string())
        }
    }

    fn release_folder(root: &Path, tag: &str, commits: &[&str], assets: &[&str]) -> PathBuf {
        let dir = root.join(tag);
        fs::create_dir_all(dir.join(ASSETS_DIRNAME)).unwrap();
        for asset in assets {
            fs::write(dir.join(ASSETS_DIRNAME).join(asset), b"zip").unwrap();
        }
        ReleaseManifest {
            target_commitish: commits.last().unwrap().to_string(),
            included_commits: commits.iter().map(|c| c.to_string()).collect(),
        }
        .write(&dir)
        .unwrap();
        dir
    }

    #[test]
    fn test_release_notes_single_commit() {
        let manifest = ReleaseManifest {
            target_commitish: "abc".to_string(),
            included_commits: vec!["abc".to_string()],
        };
        assert_eq!(release_notes(&manifest), "target_commitish: abc\n");
    }

    #[test]
    fn test_release_notes_lists_commits() {
        let manifest = ReleaseManifest {
            target_commitish: "c2".to_string(),
            included_commits: vec!["c1".to_string(), "c2".to_string()],
        };
        assert_eq!(
            release_notes(&manifest),
            "target_commitish: c2\n\nincluded_commits:\n- c1\n- c2\n\n"
        );
    }

    #[test]
    fn test_upload_creates_release() {
        let temp = TempDir::new().unwrap();
        let dir = release_folder(temp.path(), "v2", &["c1", "c2"], &["4p-B.wz", "2p-A.wz", "notes.txt"]);
        let host = FakeHost::default();

        let uploaded = ReleaseUploader::new(&host, false)
            .upload("Warzone2100/maps-4p", &dir, "v2")
            .unwrap();

        assert_eq!(uploaded.tag, "v2");
        assert_eq!(uploaded.uploaded, "2024-02-03 04:05:06");
        assert_eq!(host.calls(), vec!["create v2 c2 2p-A.wz,4p-B.wz"]);
        assert!(!dir.join(RELEASE_NOTES_FILENAME).exists());
    }

    #[test]
    fn test_upload_without_assets_fails() {
        let temp = TempDir::new().unwrap();
        let dir = release_folder(temp.path(), "v1", &["c1"], &["readme.md"]);
        let host = FakeHost::default();

        let result = ReleaseUploader::new(&host, false).upload("Warzone2100/maps-2p", &dir, "v1");
        assert!(matches!(result, Err(PublishError::NoAssets(_))));
        assert!(host.calls().is_empty());
    }

    #[test]
    fn test_existing_tag_is_fatal() {
        let temp = TempDir::new().unwrap();
        let dir = release_folder(temp.path(), "v1", &["c1"], &["2p-A.wz"]);
        let host = FakeHost {
            existing_tags: vec!["v1".to_string()],
            ..Default::default()
        };

        let result = ReleaseUploader::new(&host, false).upload("Warzone2100/maps-2p", &dir, "v1");
        assert!(matches!(result, Err(PublishError::ReleaseExists(_))));
        assert!(host.calls().is_empty());
    }

    #[test]
    fn test_failed_create_deletes_release() {
        let temp = TempDir::new().unwrap();
        let dir = release_folder(temp.path(), "v1", &["c1"], &["2p-A.wz"]);
        let host = FakeHost {
            fail_create: true,
            ..Default::default()
        };

        let result = ReleaseUploader::new(&host, false).upload("Warzone2100/maps-2p", &dir, "v1");
        assert!(matches!(result, Err(PublishError::UploadFailed { .. })));
        assert_eq!(host.calls(), vec!["create v1 c1 2p-A.wz", "delete v1"]);
    }

    #[test]
    fn test_publish_date_falls_back_to_now() {
        let temp = TempDir::new().unwrap();
        let dir = release_folder(temp.path(), "v1", &["c1"], &["2p-A.wz"]);
        let host = FakeHost {
            fail_published_at: true,
            ..Default::default()
        };

        let uploaded = ReleaseUploader::new(&host, false)
            .upload("Warzone2100/maps-2p", &dir, "v1")
            .unwrap();
        assert!(chrono::NaiveDateTime::parse_from_str(&uploaded.uploaded, UPLOAD_DATE_FORMAT).is_ok());
    }

    #[test]
    fn test_token_is_passed_to_host() {
        let temp = TempDir::new().unwrap();
        let dir = release_folder(temp.path(), "v1", &["c1"], &["2p-A.wz"]);
        let host = FakeHost::default();
        let tokens = StaticToken::new(false);

        ReleaseUploader::new(&host, false)
            .with_token_source(&tokens)
            .upload("Warzone2100/maps-2p", &dir, "v1")
            .unwrap();
        assert_eq!(tokens.requests.get(), 1);
        assert_eq!(*host.tokens_used.borrow(), vec![Some("tok-123".to_string())]);
    }

    #[test]
    fn test_token_failure_aborts_before_create() {
        let temp = TempDir::new().unwrap();
        let dir = release_folder(temp.path(), "v1", &["c1"], &["2p-A.wz"]);
        let host = FakeHost::default();
        let tokens = StaticToken::new(true);

        let result = ReleaseUploader::new(&host, false)
            .with_token_source(&tokens)
            .upload("Warzone2100/maps-2p", &dir, "v1");
        assert!(matches!(result, Err(PublishError::Token(_))));
        assert!(host.calls().is_empty());
    }

    #[test]
    fn test_dry_run_skips_token_and_keeps_notes() {
        let temp = TempDir::new().unwrap();
        let dir = release_folder(temp.path(), "v1", &["c1"], &["2p-A.wz"]);
        let host = FakeHost::default();
        let tokens = StaticToken::new(false);

        ReleaseUploader::new(&host, true)
            .with_token_source(&tokens)
            .upload("Warzone2100/maps-2p", &dir, "v1")
            .unwrap();
        assert_eq!(tokens.requests.get(), 0);
        assert!(dir.join(RELEASE_NOTES_FILENAME).is_file());
    }

    #[test]
    fn test_upload_all_in_order() {
        let temp = TempDir::new().unwrap();
        release_folder(temp.path(), "v1", &["c1"], &["2p-A.wz"]);
        release_folder(temp.path(), "v2", &["c2"], &["2p-B.wz"]);
        let host = FakeHost::default();

        let uploaded = ReleaseUploader::new(&host, false)
            .upload_all(
                "Warzone2100/maps-2p",
                temp.path(),
                &["v1".to_string(), "v2".to_string()],
            )
            .unwrap();
        assert_eq!(uploaded.len(), 2);
        assert_eq!(host.calls(), vec!["create v1 c1 2p-A.wz", "create v2 c2 2p-B.wz"]);
    }
}
