//! Release processing for one map repository.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::DEFAULT_MAX_ASSETS_PER_RELEASE;
use crate::publisher::{
    generate_release_maps_info, resolve_latest_release, AccessTokenSource, CommitHistory,
    MapInspector, PublishError, PublishResult, ReleaseBuilder, ReleaseHost, ReleaseUploader,
    RepoName, UploadedRelease, ASSETS_DIRNAME,
};

/// Folders used while processing a repository.
#[derive(Debug, Clone)]
pub struct RepoWorkspace {
    /// Working tree of the cloned repository.
    pub checkout: PathBuf,
    /// Receives one folder per built release.
    pub releases: PathBuf,
    /// Receives `<tag>/release-map-info.json` per uploaded release.
    pub release_info: PathBuf,
}

/// Builds, uploads and describes new releases of a map repository.
pub struct MapRepoProcessor<'a> {
    host: &'a dyn ReleaseHost,
    inspector: &'a dyn MapInspector,
    tokens: Option<&'a dyn AccessTokenSource>,
    max_assets_per_release: usize,
    dry_run: bool,
}

impl<'a> MapRepoProcessor<'a> {
    pub fn new(host: &'a dyn ReleaseHost, inspector: &'a dyn MapInspector, dry_run: bool) -> Self {
        Self {
            host,
            inspector,
            tokens: None,
            max_assets_per_release: DEFAULT_MAX_ASSETS_PER_RELEASE,
            dry_run,
        }
    }

    pub fn with_token_source(mut self, tokens: Option<&'a dyn AccessTokenSource>) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn with_max_assets_per_release(mut self, max: usize) -> Self {
        self.max_assets_per_release = max;
        self
    }

    /// Publish every map change since the repository's latest release.
    ///
    /// # Errors
    ///
    /// A repository outside the organization, an unconfirmed release list,
    /// a tag collision and upload failures abort processing.
    pub fn process(
        &self,
        github_repo: &str,
        history: &dyn CommitHistory,
        workspace: &RepoWorkspace,
    ) -> PublishResult<Vec<UploadedRelease>> {
        let repo: RepoName = github_repo.parse()?;

        let (last_commit, last_tag) = resolve_latest_release(self.host, history, github_repo)?;
        info!(
            "{}: last release {} at commit {}",
            github_repo, last_tag, last_commit
        );

        let built = ReleaseBuilder::new(
            history,
            self.inspector,
            &workspace.checkout,
            &workspace.releases,
        )
        .with_max_assets_per_release(self.max_assets_per_release)
        .build(&last_commit, &last_tag)?;
        let tags: Vec<String> = built.iter().map(|r| r.tag.clone()).collect();
        info!("{}: built releases {:?}", github_repo, tags);

        let mut uploader = ReleaseUploader::new(self.host, self.dry_run);
        if let Some(tokens) = self.tokens {
            uploader = uploader.with_token_source(tokens);
        }
        let uploaded = uploader.upload_all(github_repo, &workspace.releases, &tags)?;

        if !uploaded.is_empty() {
            let suffix = repo.maps_suffix()?;
            for release in &uploaded {
                let out_dir = workspace.release_info.join(&release.tag);
                fs::create_dir_all(&out_dir).map_err(|e| PublishError::CreateDirectoryFailed {
                    path: out_dir.clone(),
                    source: e,
                })?;
                generate_release_maps_info(
                    &release_assets_dir(&workspace.releases, &release.tag),
                    suffix,
                    &release.tag,
                    &release.uploaded,
                    &out_dir,
                    self.inspector,
                )?;
            }
        }
        Ok(uploaded)
    }
}

fn release_assets_dir(releases: &Path, tag: &str) -> PathBuf {
    releases.join(tag).join(ASSETS_DIRNAME)
}
