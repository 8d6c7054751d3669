//! Map release publishing.
//!
//! Turns the history of a map repository into hosted releases of packaged
//! maps, and describes each published release for the map database.
//!
//! # Overview
//!
//! The publishing workflow for one repository:
//! 1. Find the last published commit ([`resolve_latest_release`])
//! 2. Package every map changed since then into release folders ([`ReleaseBuilder`])
//! 3. Upload each release folder ([`ReleaseUploader`])
//! 4. Describe the uploaded maps ([`generate_release_maps_info`])
//!
//! # External collaborators
//!
//! Source control, map inspection and release hosting sit behind the
//! [`CommitHistory`], [`MapInspector`] and [`ReleaseHost`] traits, with
//! implementations driving `git`, `maptools` and `gh`.
//!
//! # Example
//!
//! ```ignore
//! use wzmapdb::command::CommandRunner;
//! use wzmapdb::publisher::{GitRepository, GhCliHost, MaptoolsInspector, ReleaseBuilder};
//!
//! let runner = CommandRunner::new(false);
//! let history = GitRepository::new(git, repo_root, runner);
//! let inspector = MaptoolsInspector::new(maptools, runner);
//! let releases = ReleaseBuilder::new(&history, &inspector, repo_root, output)
//!     .build(&last_commit, &last_tag)?;
//! ```

mod archive;
mod checksum;
mod error;
mod git;
mod github;
mod host;
mod inspect;
mod maps_info;
mod release;
mod token;
mod upload;

pub use archive::{pack_map_folder, EntryMetadata, PackagedArchive, SALT_ENTRY_NAME};
pub use checksum::calculate_file_checksum;
pub use error::{PublishError, PublishResult};
pub use git::{clone_repository, map_folders, CommitHistory, GitRepository, MAIN_BRANCH};
pub use github::{
    next_page_url, releases_after, repo_subdir, CatalogError, HostedRelease, ReleaseCatalog, RepoName,
    RestReleaseCatalog, GITHUB_ORG,
};
pub use host::{
    host_timestamp_to_upload_date, resolve_latest_release, GhCliHost, LatestRelease, NewRelease,
    ReleaseHost, UPLOAD_DATE_FORMAT,
};
pub use inspect::{InspectError, Inspection, MapInspector, MaptoolsInspector, PreviewKind};
pub use maps_info::{
    generate_release_maps_info, natural_cmp, read_release_maps_info, DownloadInfo,
    ReleaseMapEntry, PREVIEW_FILENAME, README_FILENAME, RELEASE_MAP_INFO_FILENAME,
};
pub use release::{
    archive_file_name, next_release_tag, BuiltRelease, ReleaseBuilder, ReleaseManifest,
    ASSETS_DIRNAME,
};
pub use token::{
    build_app_jwt, AccessTokenSource, GithubAppCredentials, GithubAppTokenProvider, TokenError,
    GIT_PUSH_APP_ENV, MAPREPO_MANAGER_APP_ENV,
};
pub use upload::{list_map_packages, release_notes, ReleaseUploader, UploadedRelease};

#[cfg(test)]
pub(crate) use git::fakes::FakeHistory;
#[cfg(test)]
pub(crate) use github::fakes::FakeCatalog;
#[cfg(test)]
pub(crate) use host::fakes::FakeHost;
#[cfg(test)]
pub(crate) use inspect::fakes::FakeInspector;
