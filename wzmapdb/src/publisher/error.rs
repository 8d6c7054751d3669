//! Error types for the publisher module.

use std::fmt;
use std::io;
use std::path::PathBuf;

use super::token::TokenError;
use crate::tools::ToolError;

/// Result type for publisher operations.
pub type PublishResult<T> = Result<T, PublishError>;

/// Errors that can occur during publishing operations.
#[derive(Debug)]
pub enum PublishError {
    /// Repository is outside the organization or misnamed.
    InvalidRepository(String),

    /// Failed to create directory.
    CreateDirectoryFailed { path: PathBuf, source: io::Error },

    /// Failed to read file.
    ReadFailed { path: PathBuf, source: io::Error },

    /// Failed to write file.
    WriteFailed { path: PathBuf, source: io::Error },

    /// JSON document could not be parsed or produced.
    InvalidJson {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// Invalid path provided.
    InvalidPath(String),

    /// Release tag could not be parsed.
    InvalidVersion(String),

    /// Publish timestamp could not be parsed.
    InvalidTimestamp(String),

    /// Archive building failed.
    ArchiveFailed(String),

    /// A release with this tag is already published.
    ReleaseExists(String),

    /// A release folder has no map archives.
    NoAssets(PathBuf),

    /// The host's release list could not be confirmed.
    ReleaseListing(String),

    /// Creating the hosted release failed (the partial release was removed).
    UploadFailed { tag: String, reason: String },

    /// An external tool failed.
    Tool(ToolError),

    /// Access token could not be obtained.
    Token(TokenError),
}

impl fmt::Display for PublishError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishError::InvalidRepository(msg) => {
                write!(f, "invalid repository: {}", msg)
            }
            PublishError::CreateDirectoryFailed { path, source } => {
                write!(
                    f,
                    "failed to create directory {}: {}",
                    path.display(),
                    source
                )
            }
            PublishError::ReadFailed { path, source } => {
                write!(f, "failed to read {}: {}", path.display(), source)
            }
            PublishError::WriteFailed { path, source } => {
                write!(f, "failed to write {}: {}", path.display(), source)
            }
            PublishError::InvalidJson { path, source } => {
                write!(f, "invalid JSON in {}: {}", path.display(), source)
            }
            PublishError::InvalidPath(msg) => {
                write!(f, "invalid path: {}", msg)
            }
            PublishError::InvalidVersion(msg) => {
                write!(f, "invalid version: {}", msg)
            }
            PublishError::InvalidTimestamp(msg) => {
                write!(f, "invalid timestamp: {}", msg)
            }
            PublishError::ArchiveFailed(msg) => {
                write!(f, "archive failed: {}", msg)
            }
            PublishError::ReleaseExists(tag) => {
                write!(f, "Release already exists: {}", tag)
            }
            PublishError::NoAssets(path) => {
                write!(f, "no map archives to upload in {}", path.display())
            }
            PublishError::ReleaseListing(msg) => {
                write!(f, "failed to list releases: {}", msg)
            }
            PublishError::UploadFailed { tag, reason } => {
                write!(f, "failed to create release {}: {}", tag, reason)
            }
            PublishError::Tool(e) => write!(f, "{}", e),
            PublishError::Token(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for PublishError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PublishError::CreateDirectoryFailed { source, .. } => Some(source),
            PublishError::ReadFailed { source, .. } => Some(source),
            PublishError::WriteFailed { source, .. } => Some(source),
            PublishError::InvalidJson { source, .. } => Some(source),
            PublishError::Tool(e) => Some(e),
            PublishError::Token(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ToolError> for PublishError {
    fn from(e: ToolError) -> Self {
        PublishError::Tool(e)
    }
}

impl From<TokenError> for PublishError {
    fn from(e: TokenError) -> Self {
        PublishError::Token(e)
    }
}
