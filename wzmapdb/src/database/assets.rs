//! Per-map asset files.
//!
//! ```text
//! <root>/info/<hh>/<hash>.json
//! <root>/readme/<hh>/<hash>.md
//! <root>/preview/<hh>/<hash>.png
//! ```
//!
//! `<hh>` is the first two characters of the package hash.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use super::record::MapDatabaseRecord;
use super::DatabaseError;

pub const INFO_DIR: &str = "info";
pub const README_DIR: &str = "readme";
pub const PREVIEW_DIR: &str = "preview";

/// Directory fan-out prefix of a hash.
pub fn hash_prefix(hash: &str) -> &str {
    hash.get(..2).unwrap_or(hash)
}

/// The map database's asset tree.
#[derive(Debug, Clone)]
pub struct AssetStore {
    root: PathBuf,
}

impl AssetStore {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    fn path(&self, dir: &str, hash: &str, extension: &str) -> PathBuf {
        self.root
            .join(dir)
            .join(hash_prefix(hash))
            .join(format!("{}.{}", hash, extension))
    }

    pub fn info_path(&self, hash: &str) -> PathBuf {
        self.path(INFO_DIR, hash, "json")
    }

    pub fn readme_path(&self, hash: &str) -> PathBuf {
        self.path(README_DIR, hash, "md")
    }

    pub fn preview_path(&self, hash: &str) -> PathBuf {
        self.path(PREVIEW_DIR, hash, "png")
    }

    /// Write a record as compact JSON under its hash.
    pub fn write_info(&self, hash: &str, record: &MapDatabaseRecord) -> Result<PathBuf, DatabaseError> {
        let path = self.info_path(hash);
        let text = crate::json::to_string_compact(record).map_err(DatabaseError::json(&path))?;
        write_file(&path, text.as_bytes())?;
        Ok(path)
    }

    /// The stored record for `hash`, or `None` if there is none.
    pub fn load_info(&self, hash: &str) -> Result<Option<Value>, DatabaseError> {
        let path = self.info_path(hash);
        if !path.is_file() {
            return Ok(None);
        }
        let text = fs::read_to_string(&path).map_err(DatabaseError::read(&path))?;
        let value = serde_json::from_str(&text).map_err(DatabaseError::json(&path))?;
        Ok(Some(value))
    }

    /// Copy a README. Returns the stored path.
    pub fn store_readme(&self, hash: &str, source: &Path) -> Result<PathBuf, DatabaseError> {
        let path = self.readme_path(hash);
        copy_file(source, &path)?;
        Ok(path)
    }

    /// Copy a preview image. Returns the stored path.
    pub fn store_preview(&self, hash: &str, source: &Path) -> Result<PathBuf, DatabaseError> {
        let path = self.preview_path(hash);
        copy_file(source, &path)?;
        Ok(path)
    }
}

fn ensure_parent(path: &Path) -> Result<(), DatabaseError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(DatabaseError::create_dir(parent))?;
    }
    Ok(())
}

pub(crate) fn write_file(path: &Path, contents: &[u8]) -> Result<(), DatabaseError> {
    ensure_parent(path)?;
    fs::write(path, contents).map_err(DatabaseError::write(path))
}

fn copy_file(source: &Path, dest: &Path) -> Result<(), DatabaseError> {
    ensure_parent(dest)?;
    fs::copy(source, dest).map_err(DatabaseError::write(dest))?;
    Ok(())
}
