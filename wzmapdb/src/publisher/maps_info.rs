//! Release map info.
//!
//! For a folder of published map packages this records each map's info
//! document together with where it can be downloaded, and renders the
//! per-map preview images and README that the map database serves.
//!
//! ```text
//! <out>/release-map-info.json
//! <out>/<sha256>/preview.png
//! <out>/<sha256>/terrain.png
//! <out>/<sha256>/README.md
//! ```

use std::cmp::Ordering;
use std::fs::{self, File};
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use super::checksum::calculate_file_checksum;
use super::inspect::{MapInspector, PreviewKind};
use super::upload::list_map_packages;
use super::{PublishError, PublishResult};
use crate::validation::{to_yyyy_mm_dd, validate_map_info, WarningOptions};

pub const RELEASE_MAP_INFO_FILENAME: &str = "release-map-info.json";
pub const PREVIEW_FILENAME: &str = "preview.png";
pub const TERRAIN_FILENAME: &str = "terrain.png";
pub const README_FILENAME: &str = "README.md";

/// Where a published map package lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadInfo {
    /// Repository name without its `maps-` prefix.
    pub repo: String,
    /// `<tag>/<file>`
    pub path: String,
    /// Publish date, `YYYY-MM-DD`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded: Option<String>,
    pub hash: String,
    pub size: u64,
}

/// One entry of `release-map-info.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseMapEntry {
    pub map_info: Value,
    pub download: DownloadInfo,
}

/// Compare strings so that embedded numbers sort by value: `2p-x` < `10p-x`.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = chunks(a);
    let mut right = chunks(b);
    loop {
        match (left.next(), right.next()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) => {
                let ordering = match (is_number(l), is_number(r)) {
                    (true, true) => compare_numbers(l, r),
                    (true, false) => Ordering::Less,
                    (false, true) => Ordering::Greater,
                    (false, false) => l.cmp(r),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
        }
    }
}

fn is_number(chunk: &str) -> bool {
    chunk.starts_with(|c: char| c.is_ascii_digit())
}

fn compare_numbers(l: &str, r: &str) -> Ordering {
    let l = l.trim_start_matches('0');
    let r = r.trim_start_matches('0');
    l.len().cmp(&r.len()).then_with(|| l.cmp(r))
}

/// Split into alternating runs of ASCII digits and everything else.
fn chunks(s: &str) -> impl Iterator<Item = &str> {
    let mut rest = s;
    std::iter::from_fn(move || {
        let first = rest.chars().next()?;
        let digits = first.is_ascii_digit();
        let end = rest
            .char_indices()
            .find(|(_, c)| c.is_ascii_digit() != digits)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let (chunk, tail) = rest.split_at(end);
        rest = tail;
        Some(chunk)
    })
}

/// Read `<dir>/release-map-info.json`.
pub fn read_release_maps_info(dir: &Path) -> PublishResult<Vec<ReleaseMapEntry>> {
    let path = dir.join(RELEASE_MAP_INFO_FILENAME);
    let text = fs::read_to_string(&path).map_err(|e| PublishError::ReadFailed {
        path: path.clone(),
        source: e,
    })?;
    serde_json::from_str(&text).map_err(|e| PublishError::InvalidJson { path, source: e })
}

/// Generate the release map info for the packages in `assets_dir`.
///
/// # Arguments
///
/// * `assets_dir` - Folder holding the release's `.wz` packages
/// * `repo_suffix` - Repository name without `maps-`
/// * `tag` - Release tag
/// * `uploaded` - Publish time, `YYYY-MM-DD HH:MM:SS`
/// * `out_dir` - Receives `release-map-info.json` and per-map folders
///
/// Packages the inspector rejects, or that fail validation, are left out.
/// Preview and README failures only warn.
pub fn generate_release_maps_info(
    assets_dir: &Path,
    repo_suffix: &str,
    tag: &str,
    uploaded: &str,
    out_dir: &Path,
    inspector: &dyn MapInspector,
) -> PublishResult<Vec<ReleaseMapEntry>> {
    let mut packages = list_map_packages(assets_dir)?;
    if packages.is_empty() {
        warn!(
            "No valid .wz map packages in folder: {}",
            assets_dir.display()
        );
        return Ok(Vec::new());
    }
    packages.sort_by(|a, b| natural_cmp(a, b));

    fs::create_dir_all(out_dir).map_err(|e| PublishError::CreateDirectoryFailed {
        path: out_dir.to_path_buf(),
        source: e,
    })?;

    let mut entries = Vec::new();
    for package in &packages {
        let package_path = assets_dir.join(package);

        let inspection = match inspector.inspect(&package_path) {
            Ok(inspection) => inspection,
            Err(e) => {
                error!("{} - {}", package, e);
                continue;
            }
        };

        let result = validate_map_info(&inspection.map.info, true, &WarningOptions::default());
        if !result.errors.is_empty() {
            error!(
                "{} - Validation Errors \n\t{}",
                package,
                result.errors.join("\n\t")
            );
            continue;
        }
        if !result.errors_non_fatal.is_empty() {
            warn!(
                "{} - Validation Errors (Non-Fatal): \n\t{}",
                package,
                result.errors_non_fatal.join("\n\t")
            );
        }
        if !result.warnings.is_empty() {
            warn!(
                "{} - Validation Warnings: \n\t{}",
                package,
                result.warnings.join("\n\t")
            );
        }

        let uploaded = match to_yyyy_mm_dd(uploaded) {
            Ok(date) => Some(date),
            Err(e) => {
                warn!("{}: {}", package, e);
                None
            }
        };
        let size = fs::metadata(&package_path)
            .map_err(|e| PublishError::ReadFailed {
                path: package_path.clone(),
                source: e,
            })?
            .len();
        let download = DownloadInfo {
            repo: repo_suffix.to_string(),
            path: format!("{}/{}", tag, package),
            uploaded,
            hash: calculate_file_checksum(&package_path)?,
            size,
        };

        let map_dir = out_dir.join(&download.hash);
        fs::create_dir_all(&map_dir).map_err(|e| PublishError::CreateDirectoryFailed {
            path: map_dir.clone(),
            source: e,
        })?;
        for (kind, file) in [
            (PreviewKind::Preview, PREVIEW_FILENAME),
            (PreviewKind::Terrain, TERRAIN_FILENAME),
        ] {
            if let Err(e) = inspector.render_preview(&package_path, &map_dir.join(file), kind) {
                warn!("{} - failed to generate {}: {}", package, file, e);
            }
        }
        extract_readme(&package_path, &map_dir.join(README_FILENAME));

        entries.push(ReleaseMapEntry {
            map_info: inspection.map.raw,
            download,
        });
    }

    let path = out_dir.join(RELEASE_MAP_INFO_FILENAME);
    let text = crate::json::to_string_indent4(&entries).map_err(|e| PublishError::InvalidJson {
        path: path.clone(),
        source: e,
    })?;
    fs::write(&path, text).map_err(|e| PublishError::WriteFailed { path, source: e })?;
    info!("Generated map info for {} map(s) of {}", entries.len(), tag);

    Ok(entries)
}

/// Copy `README.md` out of a package, if it has one.
fn extract_readme(package: &Path, output: &Path) {
    let result = File::open(package)
        .map_err(zip::result::ZipError::Io)
        .and_then(zip::ZipArchive::new)
        .and_then(|mut archive| {
            let mut readme = archive.by_name(README_FILENAME)?;
            let mut file = File::create(output)?;
            io::copy(&mut readme, &mut file)?;
            Ok(())
        });
    match result {
        Ok(()) => debug!("Copied {} from {}", README_FILENAME, package.display()),
        Err(zip::result::ZipError::FileNotFound) => {}
        Err(e) => warn!(
            "Failed to extract {} from {}: {}",
            README_FILENAME,
            package.display(),
            e
        ),
    }
}
