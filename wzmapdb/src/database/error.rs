//! Error types for the map database.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use super::record::NormalizeError;
use crate::config::RepoConfigError;
use crate::publisher::{CatalogError, PublishError};
use crate::tools::ToolError;

/// Errors updating or rebuilding the map database.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to create directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// An index page lacks a required part.
    #[error("invalid index page {path}: {reason}")]
    InvalidPage { path: PathBuf, reason: String },

    #[error("Invalid pagenum: {0}")]
    InvalidPageNumber(usize),

    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    #[error(transparent)]
    Publish(#[from] PublishError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Config(#[from] RepoConfigError),

    #[error(transparent)]
    Tool(#[from] ToolError),
}

impl DatabaseError {
    pub(crate) fn read(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| DatabaseError::Read { path, source }
    }

    pub(crate) fn write(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| DatabaseError::Write { path, source }
    }

    pub(crate) fn create_dir(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| DatabaseError::CreateDirectory { path, source }
    }

    pub(crate) fn json(path: impl Into<PathBuf>) -> impl FnOnce(serde_json::Error) -> Self {
        let path = path.into();
        move |source| DatabaseError::Json { path, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_io_errors_keep_source() {
        let err = DatabaseError::read("/data/v1/full.json")(io::Error::new(
            io::ErrorKind::NotFound,
            "missing",
        ));
        assert_eq!(err.to_string(), "failed to read /data/v1/full.json: missing");
        assert!(err.source().is_some());
    }

    #[test]
    fn test_invalid_page_number_display() {
        assert_eq!(
            DatabaseError::InvalidPageNumber(0).to_string(),
            "Invalid pagenum: 0"
        );
    }
}
