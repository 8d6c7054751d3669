//! Map database ingestion.
//!
//! Lists the releases each tracked map repository published since it was
//! last processed, turns their maps into database records and assets, and
//! appends the records to the index.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use tracing::{error, info, warn};

use super::assets::AssetStore;
use super::images::PngOptimizer;
use super::index::MapIndex;
use super::record::normalize_with_download;
use super::DatabaseError;
use crate::config::{MapDbUrls, TrackedRepo, DEFAULT_MAX_MAPS_PER_INDEX_PAGE};
use crate::map_info::MapInfo;
use crate::publisher::{
    generate_release_maps_info, read_release_maps_info, repo_subdir, MapInspector, PublishError,
    ReleaseCatalog, ReleaseHost, ReleaseMapEntry, RepoName, PREVIEW_FILENAME, README_FILENAME,
    RELEASE_MAP_INFO_FILENAME,
};

/// Scratch folder for downloaded release assets, below a repository's release info folder.
pub const TEMP_ASSETS_DIRNAME: &str = "_tmp_assets";

fn release_folder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^v(\d+)$").unwrap())
}

/// Folders used by an update.
#[derive(Debug, Clone)]
pub struct DatabasePaths {
    /// Holds `<org>/<repo>/<tag>/release-map-info.json` per release.
    pub release_info_root: PathBuf,
    /// Index pages.
    pub data_root: PathBuf,
    /// Per-map info, readme and preview files.
    pub assets_root: PathBuf,
}

/// Result of [`MapDbUpdater::update`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// Tracked state with `last_release` advanced.
    pub repos: Vec<TrackedRepo>,
    pub maps_added: usize,
}

/// Ingests newly published releases into the map database.
pub struct MapDbUpdater<'a> {
    catalog: &'a dyn ReleaseCatalog,
    host: &'a dyn ReleaseHost,
    inspector: &'a dyn MapInspector,
    optimizer: Option<&'a PngOptimizer>,
    urls: &'a MapDbUrls,
    paths: DatabasePaths,
    max_maps_per_page: usize,
    dry_run: bool,
}

impl<'a> MapDbUpdater<'a> {
    pub fn new(
        catalog: &'a dyn ReleaseCatalog,
        host: &'a dyn ReleaseHost,
        inspector: &'a dyn MapInspector,
        urls: &'a MapDbUrls,
        paths: DatabasePaths,
    ) -> Self {
        Self {
            catalog,
            host,
            inspector,
            optimizer: None,
            urls,
            paths,
            max_maps_per_page: DEFAULT_MAX_MAPS_PER_INDEX_PAGE,
            dry_run: false,
        }
    }

    pub fn with_optimizer(mut self, optimizer: &'a PngOptimizer) -> Self {
        self.optimizer = Some(optimizer);
        self
    }

    pub fn with_max_maps_per_page(mut self, max: usize) -> Self {
        self.max_maps_per_page = max;
        self
    }

    /// Also pick up release info folders produced by a dry run, which were
    /// never published.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    fn repo_release_info_dir(&self, github_repo: &str) -> PathBuf {
        repo_subdir(&self.paths.release_info_root, github_repo)
    }

    /// Ingest every new release of every repository.
    ///
    /// A repository whose release list cannot be fetched is skipped and
    /// keeps its `last_release`. All new records are appended to the index
    /// together.
    pub fn update(&self, mut repos: Vec<TrackedRepo>) -> Result<UpdateOutcome, DatabaseError> {
        match self.optimizer {
            Some(optimizer) => optimizer.warn_if_incomplete(),
            None => warn!("No PNG optimizer configured, map png previews will not be optimized"),
        }

        let store = AssetStore::new(&self.paths.assets_root);
        let mut records = Vec::new();

        for repo in repos.iter_mut() {
            let tags = match self.new_release_tags(repo) {
                Ok(tags) => tags,
                Err(e) => {
                    error!(
                        "Failed to get release list from GitHub API for repo {} with error: {} - skipping this repo",
                        repo.github_repo, e
                    );
                    continue;
                }
            };
            info!("{}: new releases {:?}", repo.github_repo, tags);
            let Some(last_tag) = tags.last().cloned() else {
                continue;
            };

            for tag in &tags {
                let added = self.ingest_release(&repo.github_repo, tag, &store)?;
                records.extend(added);
            }
            repo.last_release = last_tag;
        }

        MapIndex::new(&self.paths.data_root, self.urls)
            .with_max_maps_per_page(self.max_maps_per_page)
            .append(&records)?;

        Ok(UpdateOutcome {
            repos,
            maps_added: records.len(),
        })
    }

    /// Tags published after `last_release`, oldest first.
    fn new_release_tags(&self, repo: &TrackedRepo) -> Result<Vec<String>, DatabaseError> {
        let mut tags: Vec<String> = self
            .catalog
            .releases_since(&repo.github_repo, Some(&repo.last_release))?
            .into_iter()
            .map(|r| r.tag_name)
            .collect();

        if self.dry_run {
            let dir = self.repo_release_info_dir(&repo.github_repo);
            for tag in on_disk_release_tags(&dir, &repo.last_release)? {
                if !tags.contains(&tag) {
                    tags.push(tag);
                }
            }
        }
        Ok(tags)
    }

    /// Records for one release, generating its release map info first if
    /// it is not on disk yet.
    fn ingest_release(
        &self,
        github_repo: &str,
        tag: &str,
        store: &AssetStore,
    ) -> Result<Vec<serde_json::Value>, DatabaseError> {
        let repo_name: RepoName = github_repo.parse()?;
        let repo_dir = self.repo_release_info_dir(github_repo);
        let release_dir = repo_dir.join(tag);

        if !release_dir.join(RELEASE_MAP_INFO_FILENAME).is_file() {
            let temp_dir = repo_dir.join(TEMP_ASSETS_DIRNAME);
            fs::create_dir_all(&temp_dir).map_err(DatabaseError::create_dir(&temp_dir))?;

            self.host.download_release(github_repo, tag, &temp_dir)?;
            let uploaded = self.host.published_at(github_repo, tag)?;
            generate_release_maps_info(
                &temp_dir,
                repo_name.maps_suffix()?,
                tag,
                &uploaded,
                &release_dir,
                self.inspector,
            )?;

            fs::remove_dir_all(&temp_dir).map_err(DatabaseError::write(&temp_dir))?;
        }

        let entries = match read_release_maps_info(&release_dir) {
            Ok(entries) => entries,
            // Releases without valid packages produce no info file.
            Err(PublishError::ReadFailed { .. }) => {
                warn!("{} {}: no release map info", github_repo, tag);
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let mut added = Vec::new();
        for entry in &entries {
            if let Some(record) = self.ingest_map(entry, &release_dir, store)? {
                added.push(record);
            }
        }
        info!("{} {}: {} map(s)", github_repo, tag, added.len());
        Ok(added)
    }

    /// Write one map's assets. Maps whose info cannot be normalized are
    /// skipped.
    fn ingest_map(
        &self,
        entry: &ReleaseMapEntry,
        release_dir: &Path,
        store: &AssetStore,
    ) -> Result<Option<serde_json::Value>, DatabaseError> {
        let package = &entry.download.path;
        let record = MapInfo::from_value(&entry.map_info)
            .map_err(|e| e.to_string())
            .and_then(|info| {
                normalize_with_download(&info, entry.download.clone()).map_err(|e| e.to_string())
            });
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                error!("{} - skipping map: {}", package, e);
                return Ok(None);
            }
        };

        let hash = &entry.download.hash;
        store.write_info(hash, &record)?;

        let source_dir = release_dir.join(hash);
        let readme = source_dir.join(README_FILENAME);
        if readme.is_file() {
            store.store_readme(hash, &readme)?;
        }

        let preview = source_dir.join(PREVIEW_FILENAME);
        if preview.is_file() {
            let stored = store.store_preview(hash, &preview)?;
            if let Some(optimizer) = self.optimizer {
                optimizer.optimize(&stored, true);
            }
        } else {
            warn!(
                "Missing preview image: {}",
                store.preview_path(hash).display()
            );
        }

        let value = serde_json::to_value(&record).map_err(DatabaseError::json(store.info_path(hash)))?;
        Ok(Some(value))
    }
}

/// Release folders under `dir` newer than `since_tag`, by tag number.
///
/// When `since_tag` is not among them, every folder is returned.
pub fn on_disk_release_tags(dir: &Path, since_tag: &str) -> Result<Vec<String>, DatabaseError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut tags: Vec<(u64, String)> = Vec::new();
    for entry in fs::read_dir(dir).map_err(DatabaseError::read(dir))? {
        let entry = entry.map_err(DatabaseError::read(dir))?;
        if !entry.path().is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        let number = release_folder_regex()
            .captures(&name)
            .and_then(|c| c[1].parse::<u64>().ok());
        if let Some(number) = number {
            tags.push((number, name));
        }
    }
    tags.sort();

    let tags: Vec<String> = tags.into_iter().map(|(_, name)| name).collect();
    let start = tags
        .iter()
        .position(|t| t == since_tag)
        .map(|i| i + 1)
        .unwrap_or(0);
    Ok(tags[start..].to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::index::page_path;
    use crate::publisher::{pack_map_folder, FakeCatalog, FakeHost, FakeInspector};
    use serde_json::{json, Value};
    use tempfile::TempDir;

    const REPO: &str = "Warzone2100/maps-4p";

    fn urls() -> MapDbUrls {
        let config = match json!({"asset-url-templates": {"info": "https://maps/{hash}"}}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        MapDbUrls::from_json(config, "").unwrap()
    }

    fn paths(temp: &TempDir) -> DatabasePaths {
        DatabasePaths {
            release_info_root: temp.path().join("release-info"),
            data_root: temp.path().join("data"),
            assets_root: temp.path().join("assets"),
        }
    }

    fn write_package(dir: &Path, name: &str, readme: &str) -> PathBuf {
        let folder = dir.join(name.trim_end_matches(".wz"));
        fs::create_dir_all(&folder).unwrap();
        fs::write(folder.join("README.md"), readme).unwrap();
        let path = dir.join(name);
        pack_map_folder(&folder, &path, None).unwrap();
        path
    }

    fn read_json(path: &Path) -> Value {
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn test_on_disk_release_tags() {
        let temp = TempDir::new().unwrap();
        for name in ["v1", "v10", "v2", "_tmp_assets", "notes"] {
            fs::create_dir_all(temp.path().join(name)).unwrap();
        }
        fs::write(temp.path().join("v3"), "file").unwrap();

        assert_eq!(
            on_disk_release_tags(temp.path(), "v1").unwrap(),
            vec!["v2", "v10"]
        );
        assert_eq!(
            on_disk_release_tags(temp.path(), "v0").unwrap(),
            vec!["v1", "v2", "v10"]
        );
        assert!(on_disk_release_tags(&temp.path().join("missing"), "v0")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_update_downloads_and_indexes_new_releases() {
        let temp = TempDir::new().unwrap();
        let packages = temp.path().join("packages");
        fs::create_dir_all(&packages).unwrap();
        let rush = write_package(&packages, "4p-Rush.wz", "# Rush");
        let fort = write_package(&packages, "4p-Fort.wz", "# Fort");

        let catalog = FakeCatalog::default().with(REPO, &["v1", "v2", "v3"]);
        let host = FakeHost {
            downloads: vec![
                ("v2".to_string(), "4p-Rush.wz".to_string(), rush),
                ("v3".to_string(), "4p-Fort.wz".to_string(), fort),
            ],
            ..Default::default()
        };
        let inspector = FakeInspector::default();
        let urls = urls();
        let paths = paths(&temp);
        let updater = MapDbUpdater::new(&catalog, &host, &inspector, &urls, paths.clone());

        let repos = vec![TrackedRepo {
            github_repo: REPO.to_string(),
            last_release: "v1".to_string(),
        }];
        let outcome = updater.update(repos).unwrap();

        assert_eq!(outcome.maps_added, 2);
        assert_eq!(outcome.repos[0].last_release, "v3");
        assert_eq!(host.calls(), vec!["download v2", "download v3"]);
        assert!(!paths
            .release_info_root
            .join("Warzone2100/maps-4p")
            .join(TEMP_ASSETS_DIRNAME)
            .exists());

        let page = read_json(&page_path(&paths.data_root, 1).unwrap());
        let maps = page["maps"].as_array().unwrap();
        assert_eq!(maps[0]["name"], "4p-Rush");
        assert_eq!(maps[1]["name"], "4p-Fort");
        assert_eq!(maps[0]["download"]["type"], "jsonv2");
        assert_eq!(maps[0]["download"]["repo"], "4p");
        assert_eq!(maps[0]["download"]["path"], "v2/4p-Rush.wz");
        assert_eq!(maps[0]["download"]["uploaded"], "2024-02-03");

        let store = AssetStore::new(&paths.assets_root);
        let hash = maps[0]["download"]["hash"].as_str().unwrap();
        assert_eq!(store.load_info(hash).unwrap().unwrap(), maps[0]);
        assert_eq!(
            fs::read_to_string(store.readme_path(hash)).unwrap(),
            "# Rush"
        );
        assert_eq!(
            fs::read_to_string(store.preview_path(hash)).unwrap(),
            "png Preview"
        );
    }

    #[test]
    fn test_update_uses_existing_release_info() {
        let temp = TempDir::new().unwrap();
        let paths = paths(&temp);
        let release_dir = paths.release_info_root.join("Warzone2100/maps-4p/v1");
        fs::create_dir_all(&release_dir).unwrap();

        let mut map_info = crate::map_info::fixtures::valid_map_info_json();
        map_info["name"] = json!("Cached");
        let entries = json!([{
            "map_info": map_info,
            "download": {"repo": "4p", "path": "v1/4p-Cached.wz", "uploaded": "2024-01-01", "hash": "cd34", "size": 10}
        }]);
        fs::write(
            release_dir.join(RELEASE_MAP_INFO_FILENAME),
            entries.to_string(),
        )
        .unwrap();

        let catalog = FakeCatalog::default().with(REPO, &["v1"]);
        let host = FakeHost::default();
        let inspector = FakeInspector::default();
        let urls = urls();
        let outcome = MapDbUpdater::new(&catalog, &host, &inspector, &urls, paths.clone())
            .update(vec![TrackedRepo::new(REPO)])
            .unwrap();

        assert_eq!(outcome.maps_added, 1);
        assert!(host.calls().is_empty());
        let page = read_json(&page_path(&paths.data_root, 1).unwrap());
        assert_eq!(page["maps"][0]["name"], "Cached");
        assert_eq!(page["maps"][0]["download"]["hash"], "cd34");
    }

    #[test]
    fn test_listing_failure_skips_repo() {
        let temp = TempDir::new().unwrap();
        let catalog = FakeCatalog::default();
        let host = FakeHost::default();
        let inspector = FakeInspector::default();
        let urls = urls();
        let paths = paths(&temp);

        let outcome = MapDbUpdater::new(&catalog, &host, &inspector, &urls, paths.clone())
            .update(vec![TrackedRepo::new("Warzone2100/maps-2p")])
            .unwrap();

        assert_eq!(outcome.maps_added, 0);
        assert_eq!(outcome.repos[0].last_release, "v0");
        let manifest = read_json(&paths.data_root.join("v1/versions.json"));
        assert!(manifest["versions"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_dry_run_picks_up_unpublished_release_info() {
        let temp = TempDir::new().unwrap();
        let paths = paths(&temp);
        let release_dir = paths.release_info_root.join("Warzone2100/maps-4p/v2");
        fs::create_dir_all(&release_dir).unwrap();
        fs::write(release_dir.join(RELEASE_MAP_INFO_FILENAME), "[]").unwrap();

        let catalog = FakeCatalog::default().with(REPO, &["v1"]);
        let host = FakeHost::default();
        let inspector = FakeInspector::default();
        let urls = urls();
        let repos = vec![TrackedRepo {
            github_repo: REPO.to_string(),
            last_release: "v1".to_string(),
        }];

        let outcome = MapDbUpdater::new(&catalog, &host, &inspector, &urls, paths)
            .dry_run(true)
            .update(repos)
            .unwrap();
        assert_eq!(outcome.repos[0].last_release, "v2");
        assert_eq!(outcome.maps_added, 0);
    }

    #[test]
    fn test_unnormalizable_map_is_skipped() {
        let temp = TempDir::new().unwrap();
        let paths = paths(&temp);
        let release_dir = paths.release_info_root.join("Warzone2100/maps-4p/v1");
        fs::create_dir_all(&release_dir).unwrap();
        let entries = json!([{
            "map_info": {"name": "Broken"},
            "download": {"repo": "4p", "path": "v1/4p-Broken.wz", "hash": "ef56", "size": 1}
        }]);
        fs::write(
            release_dir.join(RELEASE_MAP_INFO_FILENAME),
            entries.to_string(),
        )
        .unwrap();

        let catalog = FakeCatalog::default().with(REPO, &["v1"]);
        let host = FakeHost::default();
        let inspector = FakeInspector::default();
        let urls = urls();
        let outcome = MapDbUpdater::new(&catalog, &host, &inspector, &urls, paths.clone())
            .update(vec![TrackedRepo::new(REPO)])
            .unwrap();

        assert_eq!(outcome.maps_added, 0);
        assert_eq!(outcome.repos[0].last_release, "v1");
        assert!(!AssetStore::new(&paths.assets_root).info_path("ef56").exists());
    }
}
