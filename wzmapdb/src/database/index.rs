//! The paginated map index.
//!
//! Records are appended in publication order to `v1/full.json`, then
//! `v1/full/page/2.json` and so on. Each page holds at most a fixed number
//! of records and links to its neighbours. `v1/versions.json` lists every
//! page with the time it last changed, so clients only refetch what moved.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde_json::{json, Map, Value};
use tracing::{error, info};

use super::assets::{write_file, AssetStore};
use super::DatabaseError;
use crate::config::{MapDbUrls, DEFAULT_MAX_MAPS_PER_INDEX_PAGE};

pub const PAGE_TYPE: &str = "wz2100.mapdatabase.full.v1";
pub const VERSIONS_TYPE: &str = "wz2100.mapdatabase.versions.v1";
pub const VERSION_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const INDEX_VERSION_DIR: &str = "v1";

/// Current UTC time as a page version stamp.
pub fn version_stamp() -> String {
    Utc::now().format(VERSION_FORMAT).to_string()
}

/// Path components of page `number` below the data root.
pub fn page_path_components(number: usize) -> Result<Vec<String>, DatabaseError> {
    match number {
        0 => Err(DatabaseError::InvalidPageNumber(number)),
        1 => Ok(vec![INDEX_VERSION_DIR.to_string(), "full.json".to_string()]),
        n => Ok(vec![
            INDEX_VERSION_DIR.to_string(),
            "full".to_string(),
            "page".to_string(),
            format!("{}.json", n),
        ]),
    }
}

pub fn page_path(data_root: &Path, number: usize) -> Result<PathBuf, DatabaseError> {
    Ok(page_path_components(number)?
        .iter()
        .fold(data_root.to_path_buf(), |path, c| path.join(c)))
}

pub fn versions_path(data_root: &Path) -> PathBuf {
    data_root.join(INDEX_VERSION_DIR).join("versions.json")
}

fn page_link(urls: &MapDbUrls, number: usize) -> Result<String, DatabaseError> {
    let components = page_path_components(number)?;
    let components: Vec<&str> = components.iter().map(String::as_str).collect();
    Ok(urls.link(&components))
}

/// Existing pages, in order, stopping at the first missing one.
pub fn existing_pages(data_root: &Path) -> Result<Vec<(usize, PathBuf)>, DatabaseError> {
    let mut pages = Vec::new();
    let mut number = 1;
    loop {
        let path = page_path(data_root, number)?;
        if !path.is_file() {
            return Ok(pages);
        }
        pages.push((number, path));
        number += 1;
    }
}

/// A fresh, empty page document.
pub fn new_page(number: usize, urls: &MapDbUrls) -> Result<Value, DatabaseError> {
    let mut links = Map::new();
    links.insert("self".to_string(), Value::String(page_link(urls, number)?));
    if number > 1 {
        links.insert("prev".to_string(), Value::String(page_link(urls, number - 1)?));
    }
    Ok(json!({
        "type": PAGE_TYPE,
        "id": format!("full-page-{}", number),
        "version": version_stamp(),
        "links": links,
        "asset-url-templates": urls.asset_url_templates().clone(),
        "maps": [],
    }))
}

fn read_page(path: &Path) -> Result<Value, DatabaseError> {
    let text = fs::read_to_string(path).map_err(DatabaseError::read(path))?;
    serde_json::from_str(&text).map_err(DatabaseError::json(path))
}

fn write_json(path: &Path, value: &Value) -> Result<(), DatabaseError> {
    let text = crate::json::to_string_compact(value).map_err(DatabaseError::json(path))?;
    write_file(path, text.as_bytes())
}

fn invalid(path: &Path, reason: &str) -> DatabaseError {
    DatabaseError::InvalidPage {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

fn maps_mut<'a>(page: &'a mut Value, path: &Path) -> Result<&'a mut Vec<Value>, DatabaseError> {
    page.get_mut("maps")
        .and_then(Value::as_array_mut)
        .ok_or_else(|| invalid(path, "missing 'maps' array"))
}

fn links_mut<'a>(page: &'a mut Value, path: &Path) -> Result<&'a mut Map<String, Value>, DatabaseError> {
    page.get_mut("links")
        .and_then(Value::as_object_mut)
        .ok_or_else(|| invalid(path, "missing 'links' object"))
}

fn stamp(page: &mut Value, path: &Path) -> Result<(), DatabaseError> {
    let doc = page
        .as_object_mut()
        .ok_or_else(|| invalid(path, "not a JSON object"))?;
    doc.insert("version".to_string(), Value::String(version_stamp()));
    Ok(())
}

/// Pages written by an append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendSummary {
    pub pages_written: Vec<usize>,
    pub records_added: usize,
}

/// The paginated index under a data root.
#[derive(Debug, Clone)]
pub struct MapIndex<'a> {
    data_root: PathBuf,
    urls: &'a MapDbUrls,
    max_maps_per_page: usize,
}

impl<'a> MapIndex<'a> {
    pub fn new(data_root: &Path, urls: &'a MapDbUrls) -> Self {
        Self {
            data_root: data_root.to_path_buf(),
            urls,
            max_maps_per_page: DEFAULT_MAX_MAPS_PER_INDEX_PAGE,
        }
    }

    pub fn with_max_maps_per_page(mut self, max: usize) -> Self {
        self.max_maps_per_page = max.max(1);
        self
    }

    /// Append records after the last existing record.
    ///
    /// The last page is filled to capacity before a new page is started;
    /// a filled page gets a `next` link. Every written page is restamped
    /// and the versions manifest is regenerated.
    pub fn append(&self, records: &[Value]) -> Result<AppendSummary, DatabaseError> {
        let mut number = existing_pages(&self.data_root)?
            .last()
            .map(|(n, _)| *n)
            .unwrap_or(1);
        let mut remaining = records;
        let mut pages_written = Vec::new();

        while !remaining.is_empty() {
            let path = page_path(&self.data_root, number)?;
            let mut page = if path.is_file() {
                read_page(&path)?
            } else {
                new_page(number, self.urls)?
            };

            let maps = maps_mut(&mut page, &path)?;
            let free = self.max_maps_per_page.saturating_sub(maps.len());
            let take = free.min(remaining.len());
            maps.extend_from_slice(&remaining[..take]);
            remaining = &remaining[take..];

            stamp(&mut page, &path)?;
            if !remaining.is_empty() {
                let next = page_link(self.urls, number + 1)?;
                links_mut(&mut page, &path)?.insert("next".to_string(), Value::String(next));
            }
            write_json(&path, &page)?;
            pages_written.push(number);
            number += 1;
        }

        write_versions_manifest(&self.data_root)?;
        if !records.is_empty() {
            info!(
                "Added {} map(s) to the index (pages {:?})",
                records.len(),
                pages_written
            );
        }
        Ok(AppendSummary {
            pages_written,
            records_added: records.len(),
        })
    }
}

/// Regenerate `v1/versions.json` from the existing pages.
pub fn write_versions_manifest(data_root: &Path) -> Result<(), DatabaseError> {
    let mut versions = Vec::new();
    for (_, path) in existing_pages(data_root)? {
        let page = read_page(&path)?;
        let link = page
            .pointer("/links/self")
            .cloned()
            .ok_or_else(|| invalid(&path, "missing 'links.self'"))?;
        let version = page
            .get("version")
            .cloned()
            .ok_or_else(|| invalid(&path, "missing 'version'"))?;
        versions.push(json!({ "page": link, "version": version }));
    }

    let manifest = json!({
        "type": VERSIONS_TYPE,
        "id": "versions",
        "versions": versions,
    });
    write_json(&versions_path(data_root), &manifest)
}

/// Result of refreshing the index from the asset store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RebuildSummary {
    pub pages: usize,
    pub records_refreshed: usize,
    pub records_missing: usize,
}

/// Replace every indexed record with its stored info file.
///
/// Page order, record order and links are kept. Records without an info
/// file are left as they are.
pub fn rebuild_index(data_root: &Path, assets: &AssetStore) -> Result<RebuildSummary, DatabaseError> {
    let mut summary = RebuildSummary::default();

    for (_, path) in existing_pages(data_root)? {
        let mut page = read_page(&path)?;
        for record in maps_mut(&mut page, &path)?.iter_mut() {
            let Some(hash) = record.pointer("/download/hash").and_then(Value::as_str) else {
                error!("Index record without a hash in {}", path.display());
                summary.records_missing += 1;
                continue;
            };
            match assets.load_info(hash)? {
                Some(latest) => {
                    *record = latest;
                    summary.records_refreshed += 1;
                }
                None => {
                    error!(
                        "Missing expected file (skipping update): {}",
                        assets.info_path(hash).display()
                    );
                    summary.records_missing += 1;
                }
            }
        }
        stamp(&mut page, &path)?;
        write_json(&path, &page)?;
        summary.pages += 1;
    }

    write_versions_manifest(data_root)?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn urls(relurl: &str) -> MapDbUrls {
        let config = match json!({"asset-url-templates": {"info": "https://maps/{hash}"}}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        MapDbUrls::from_json(config, relurl).unwrap()
    }

    fn records(range: std::ops::Range<usize>) -> Vec<Value> {
        range
            .map(|i| json!({"name": format!("Map{}", i), "download": {"hash": format!("{:064x}", i)}}))
            .collect()
    }

    fn names(page: &Value) -> Vec<String> {
        page["maps"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["name"].as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_page_paths() {
        assert_eq!(
            page_path(Path::new("/db"), 1).unwrap(),
            PathBuf::from("/db/v1/full.json")
        );
        assert_eq!(
            page_path(Path::new("/db"), 3).unwrap(),
            PathBuf::from("/db/v1/full/page/3.json")
        );
        assert!(matches!(
            page_path(Path::new("/db"), 0),
            Err(DatabaseError::InvalidPageNumber(0))
        ));
    }

    #[test]
    fn test_new_page_key_order() {
        let page = new_page(2, &urls("data")).unwrap();
        let keys: Vec<&String> = page.as_object().unwrap().keys().collect();
        assert_eq!(
            keys,
            vec!["type", "id", "version", "links", "asset-url-templates", "maps"]
        );
        assert_eq!(page["id"], "full-page-2");
        assert_eq!(page["links"]["self"], "/data/v1/full/page/2.json");
        assert_eq!(page["links"]["prev"], "/data/v1/full.json");
    }

    #[test]
    fn test_append_paginates() {
        let temp = TempDir::new().unwrap();
        let urls = urls("");
        let index = MapIndex::new(temp.path(), &urls).with_max_maps_per_page(3);

        let summary = index.append(&records(0..7)).unwrap();
        assert_eq!(summary.pages_written, vec![1, 2, 3]);

        let page1 = read_page(&page_path(temp.path(), 1).unwrap()).unwrap();
        let page2 = read_page(&page_path(temp.path(), 2).unwrap()).unwrap();
        let page3 = read_page(&page_path(temp.path(), 3).unwrap()).unwrap();
        assert_eq!(names(&page1), vec!["Map0", "Map1", "Map2"]);
        assert_eq!(names(&page3), vec!["Map6"]);
        assert_eq!(page1["links"]["next"], "/v1/full/page/2.json");
        assert!(page1["links"].get("prev").is_none());
        assert_eq!(page2["links"]["prev"], "/v1/full.json");
        assert_eq!(page2["links"]["next"], "/v1/full/page/3.json");
        assert!(page3["links"].get("next").is_none());

        let text = fs::read_to_string(page_path(temp.path(), 1).unwrap()).unwrap();
        assert!(text.starts_with("{\"type\":\"wz2100.mapdatabase.full.v1\",\"id\":\"full-page-1\","));
    }

    #[test]
    fn test_append_fills_last_page_first() {
        let temp = TempDir::new().unwrap();
        let urls = urls("");
        let index = MapIndex::new(temp.path(), &urls).with_max_maps_per_page(3);

        index.append(&records(0..2)).unwrap();
        let summary = index.append(&records(2..5)).unwrap();
        assert_eq!(summary.pages_written, vec![1, 2]);

        let page1 = read_page(&page_path(temp.path(), 1).unwrap()).unwrap();
        let page2 = read_page(&page_path(temp.path(), 2).unwrap()).unwrap();
        assert_eq!(names(&page1), vec!["Map0", "Map1", "Map2"]);
        assert_eq!(names(&page2), vec!["Map3", "Map4"]);
    }

    #[test]
    fn test_append_after_full_page() {
        let temp = TempDir::new().unwrap();
        let urls = urls("");
        let index = MapIndex::new(temp.path(), &urls).with_max_maps_per_page(2);

        index.append(&records(0..2)).unwrap();
        index.append(&records(2..3)).unwrap();

        let page1 = read_page(&page_path(temp.path(), 1).unwrap()).unwrap();
        let page2 = read_page(&page_path(temp.path(), 2).unwrap()).unwrap();
        assert_eq!(names(&page1), vec!["Map0", "Map1"]);
        assert_eq!(page1["links"]["next"], "/v1/full/page/2.json");
        assert_eq!(names(&page2), vec!["Map2"]);
    }

    #[test]
    fn test_versions_manifest() {
        let temp = TempDir::new().unwrap();
        let urls = urls("db");
        MapIndex::new(temp.path(), &urls)
            .with_max_maps_per_page(1)
            .append(&records(0..2))
            .unwrap();

        let manifest = read_page(&versions_path(temp.path())).unwrap();
        assert_eq!(manifest["type"], VERSIONS_TYPE);
        assert_eq!(manifest["id"], "versions");
        let versions = manifest["versions"].as_array().unwrap();
        assert_eq!(versions.len(), 2);
        assert_eq!(versions[0]["page"], "/db/v1/full.json");
        assert_eq!(versions[1]["page"], "/db/v1/full/page/2.json");
        let stamp = versions[0]["version"].as_str().unwrap();
        assert!(chrono::NaiveDateTime::parse_from_str(stamp, VERSION_FORMAT).is_ok());
    }

    #[test]
    fn test_empty_append_still_writes_manifest() {
        let temp = TempDir::new().unwrap();
        let urls = urls("");
        let summary = MapIndex::new(temp.path(), &urls).append(&[]).unwrap();
        assert!(summary.pages_written.is_empty());
        let manifest = read_page(&versions_path(temp.path())).unwrap();
        assert!(manifest["versions"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_rebuild_replaces_records_in_place() {
        let temp = TempDir::new().unwrap();
        let data = temp.path().join("data");
        let urls = urls("");
        MapIndex::new(&data, &urls)
            .with_max_maps_per_page(2)
            .append(&records(0..3))
            .unwrap();

        let store = AssetStore::new(&temp.path().join("assets"));
        let hash = format!("{:064x}", 1);
        let updated = json!({"name": "Map1-renamed", "download": {"hash": hash}});
        write_json(&store.info_path(&hash), &updated).unwrap();

        let summary = rebuild_index(&data, &store).unwrap();
        assert_eq!(summary.pages, 2);
        assert_eq!(summary.records_refreshed, 1);
        assert_eq!(summary.records_missing, 2);

        let page1 = read_page(&page_path(&data, 1).unwrap()).unwrap();
        assert_eq!(names(&page1), vec!["Map0", "Map1-renamed"]);
        assert_eq!(page1["links"]["next"], "/v1/full/page/2.json");
    }
}
