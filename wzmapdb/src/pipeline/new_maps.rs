//! The new-maps pipeline: publish every tracked repository's new maps,
//! then ingest the new releases into the map database.

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{error, info};

use super::repo::{MapRepoProcessor, RepoWorkspace};
use super::PipelineError;
use crate::command::CommandRunner;
use crate::config::{
    load_tracked_repos, save_tracked_repos, MapDbUrls, MapReposConfig,
    DEFAULT_MAX_ASSETS_PER_RELEASE, DEFAULT_MAX_MAPS_PER_INDEX_PAGE,
};
use crate::database::{DatabasePaths, MapDbUpdater, PngOptimizer};
use crate::publisher::{
    clone_repository, repo_subdir, AccessTokenSource, CommitHistory, GitRepository, MapInspector,
    ReleaseCatalog, ReleaseHost,
};
use crate::tools::ToolError;

/// Obtains a working tree and history of a map repository.
pub trait MapRepoCheckout {
    fn checkout(&self, github_repo: &str, dest: &Path)
        -> Result<Box<dyn CommitHistory>, ToolError>;
}

/// [`MapRepoCheckout`] cloning from GitHub with `git`.
#[derive(Debug, Clone)]
pub struct GitCheckout {
    git: PathBuf,
    runner: CommandRunner,
}

impl GitCheckout {
    pub fn new(git: &Path, runner: CommandRunner) -> Self {
        Self {
            git: git.to_path_buf(),
            runner,
        }
    }
}

impl MapRepoCheckout for GitCheckout {
    fn checkout(
        &self,
        github_repo: &str,
        dest: &Path,
    ) -> Result<Box<dyn CommitHistory>, ToolError> {
        clone_repository(&self.git, github_repo, dest, &self.runner)?;
        Ok(Box::new(GitRepository::new(
            &self.git,
            dest,
            self.runner,
        )))
    }
}

/// Working folder and database locations.
#[derive(Debug, Clone)]
pub struct NewMapsPaths {
    pub working_dir: PathBuf,
    pub data_root: PathBuf,
    pub assets_root: PathBuf,
}

impl NewMapsPaths {
    pub fn checkouts_dir(&self) -> PathBuf {
        self.working_dir.join("map-repos")
    }

    pub fn releases_dir(&self) -> PathBuf {
        self.working_dir.join("temp")
    }

    pub fn release_info_dir(&self) -> PathBuf {
        self.working_dir.join("release-info")
    }

    /// `<data root>/.config/map-repos.json`
    pub fn tracked_state_path(&self) -> PathBuf {
        self.data_root.join(".config").join("map-repos.json")
    }
}

/// External collaborators of the pipeline.
pub struct PipelineServices<'a> {
    pub checkout: &'a dyn MapRepoCheckout,
    pub host: &'a dyn ReleaseHost,
    pub inspector: &'a dyn MapInspector,
    pub catalog: &'a dyn ReleaseCatalog,
    pub tokens: Option<&'a dyn AccessTokenSource>,
    pub optimizer: Option<&'a PngOptimizer>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    pub max_assets_per_release: usize,
    pub max_maps_per_page: usize,
    pub dry_run: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_assets_per_release: DEFAULT_MAX_ASSETS_PER_RELEASE,
            max_maps_per_page: DEFAULT_MAX_MAPS_PER_INDEX_PAGE,
            dry_run: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMapsOutcome {
    pub releases_published: usize,
    pub maps_added: usize,
}

/// Run the whole pipeline.
///
/// CI group markers and the final `Maps Added: <n>` line go to `out`.
/// Repositories that cannot be cloned are skipped; any other failure
/// aborts.
pub fn process_new_maps(
    repos_config: &MapReposConfig,
    paths: &NewMapsPaths,
    urls: &MapDbUrls,
    services: &PipelineServices<'_>,
    settings: &PipelineSettings,
    out: &mut dyn Write,
) -> Result<NewMapsOutcome, PipelineError> {
    let state_path = paths.tracked_state_path();
    let tracked = load_tracked_repos(repos_config, &state_path)?;

    let processor = MapRepoProcessor::new(services.host, services.inspector, settings.dry_run)
        .with_token_source(services.tokens)
        .with_max_assets_per_release(settings.max_assets_per_release);

    let mut releases_published = 0;
    for repo in &tracked {
        let github_repo = repo.github_repo.as_str();
        let workspace = RepoWorkspace {
            checkout: repo_subdir(&paths.checkouts_dir(), github_repo),
            releases: repo_subdir(&paths.releases_dir(), github_repo),
            release_info: repo_subdir(&paths.release_info_dir(), github_repo),
        };

        let history = match services.checkout.checkout(github_repo, &workspace.checkout) {
            Ok(history) => history,
            Err(e) => {
                error!("Failed to clone {}: {}", github_repo, e);
                continue;
            }
        };

        writeln!(out, "::group::Process map repo {}", github_repo)?;
        let result = processor.process(github_repo, history.as_ref(), &workspace);
        writeln!(out, "::endgroup::")?;
        releases_published += result?.len();
    }

    writeln!(out, "::group::Update map db")?;
    let database = DatabasePaths {
        release_info_root: paths.release_info_dir(),
        data_root: paths.data_root.clone(),
        assets_root: paths.assets_root.clone(),
    };
    let mut updater = MapDbUpdater::new(
        services.catalog,
        services.host,
        services.inspector,
        urls,
        database,
    )
    .with_max_maps_per_page(settings.max_maps_per_page)
    .dry_run(settings.dry_run);
    if let Some(optimizer) = services.optimizer {
        updater = updater.with_optimizer(optimizer);
    }
    let result = updater.update(tracked);
    writeln!(out, "::endgroup::")?;
    let outcome = result?;

    save_tracked_repos(&outcome.repos, &state_path)?;

    writeln!(out)?;
    writeln!(out, "Maps Added: {}", outcome.maps_added)?;
    info!(
        "Published {} release(s), added {} map(s)",
        releases_published, outcome.maps_added
    );

    Ok(NewMapsOutcome {
        releases_published,
        maps_added: outcome.maps_added,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrackedRepo;
    use crate::database::page_path;
    use crate::publisher::{FakeCatalog, FakeHistory, FakeHost, FakeInspector};
    use serde_json::{json, Value};
    use std::fs;
    use tempfile::TempDir;

    /// Writes two maps into every checkout; repositories in `unreachable` fail.
    struct FakeCheckout {
        unreachable: Vec<String>,
    }

    impl MapRepoCheckout for FakeCheckout {
        fn checkout(
            &self,
            github_repo: &str,
            dest: &Path,
        ) -> Result<Box<dyn CommitHistory>, ToolError> {
            if self.unreachable.iter().any(|r| r == github_repo) {
                return Err(ToolError::Failed {
                    program: "git".to_string(),
                    code: "128".to_string(),
                    details: "not found".to_string(),
                });
            }
            for name in ["Rush", "Fort"] {
                let dir = dest.join("maps").join(name);
                fs::create_dir_all(&dir).unwrap();
                fs::write(dir.join("game.map"), format!("{} {}", github_repo, name)).unwrap();
            }
            Ok(Box::new(FakeHistory::new(&[(
                "c1",
                &["maps/Rush", "maps/Fort"],
            )])))
        }
    }

    fn urls() -> MapDbUrls {
        let config = match json!({"asset-url-templates": {"info": "https://maps/{hash}"}}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        MapDbUrls::from_json(config, "").unwrap()
    }

    fn paths(temp: &TempDir) -> NewMapsPaths {
        NewMapsPaths {
            working_dir: temp.path().join("work"),
            data_root: temp.path().join("data"),
            assets_root: temp.path().join("assets"),
        }
    }

    #[test]
    fn test_pipeline_publishes_and_indexes() {
        let temp = TempDir::new().unwrap();
        let paths = paths(&temp);
        let config = MapReposConfig::from_json(
            r#"{"2": ["Warzone2100/maps-2p"], "4": ["Warzone2100/maps-4p"]}"#,
        )
        .unwrap();

        let checkout = FakeCheckout {
            unreachable: vec!["Warzone2100/maps-2p".to_string()],
        };
        let host = FakeHost::default();
        let inspector = FakeInspector::default();
        let catalog = FakeCatalog::default().with("Warzone2100/maps-4p", &["v1"]);
        let services = PipelineServices {
            checkout: &checkout,
            host: &host,
            inspector: &inspector,
            catalog: &catalog,
            tokens: None,
            optimizer: None,
        };
        let urls = urls();
        let mut out = Vec::new();

        let outcome = process_new_maps(
            &config,
            &paths,
            &urls,
            &services,
            &PipelineSettings::default(),
            &mut out,
        )
        .unwrap();

        assert_eq!(outcome.releases_published, 1);
        assert_eq!(outcome.maps_added, 2);

        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("::group::Process map repo Warzone2100/maps-4p\n::endgroup::\n"));
        assert!(!out.contains("Process map repo Warzone2100/maps-2p"));
        assert!(out.contains("::group::Update map db\n::endgroup::\n"));
        assert!(out.ends_with("\nMaps Added: 2\n"));

        let page: Value = serde_json::from_str(
            &fs::read_to_string(page_path(&paths.data_root, 1).unwrap()).unwrap(),
        )
        .unwrap();
        assert_eq!(page["maps"].as_array().unwrap().len(), 2);

        let state: Vec<TrackedRepo> =
            serde_json::from_str(&fs::read_to_string(paths.tracked_state_path()).unwrap())
                .unwrap();
        let last = |repo: &str| {
            state
                .iter()
                .find(|r| r.github_repo == repo)
                .map(|r| r.last_release.clone())
        };
        assert_eq!(last("Warzone2100/maps-4p").as_deref(), Some("v1"));
        assert_eq!(last("Warzone2100/maps-2p").as_deref(), Some("v0"));
    }

    #[test]
    fn test_nothing_to_do() {
        let temp = TempDir::new().unwrap();
        let paths = paths(&temp);
        let config = MapReposConfig::from_json(r#"{"4": ["Warzone2100/maps-4p"]}"#).unwrap();
        let checkout = FakeCheckout {
            unreachable: vec!["Warzone2100/maps-4p".to_string()],
        };
        let host = FakeHost::default();
        let inspector = FakeInspector::default();
        let catalog = FakeCatalog::default().with("Warzone2100/maps-4p", &[]);
        let services = PipelineServices {
            checkout: &checkout,
            host: &host,
            inspector: &inspector,
            catalog: &catalog,
            tokens: None,
            optimizer: None,
        };
        let urls = urls();
        let mut out = Vec::new();

        let outcome = process_new_maps(
            &config,
            &paths,
            &urls,
            &services,
            &PipelineSettings::default(),
            &mut out,
        )
        .unwrap();
        assert_eq!(outcome.maps_added, 0);
        assert!(String::from_utf8(out).unwrap().ends_with("Maps Added: 0\n"));
        assert!(paths.tracked_state_path().is_file());
    }
}
