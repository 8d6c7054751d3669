//! External executable discovery.
//!
//! The pipeline drives `git`, `gh` and `maptools`, and optionally `pngquant`
//! and `optipng`. Their locations are resolved once into [`ExternalTools`],
//! which is passed to every component that needs them.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::ToolSettings;

/// Errors from locating or running external tools.
#[derive(Debug, Error)]
pub enum ToolError {
    /// A required executable could not be found.
    #[error("Failed to find {0} executable")]
    Missing(&'static str),

    /// The process could not be started.
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    /// The process ran but exited unsuccessfully.
    #[error("{program} failed with exit code {code}{details}")]
    Failed {
        program: String,
        code: String,
        details: String,
    },

    /// The process succeeded but its output could not be understood.
    #[error("unexpected output from {program}: {reason}")]
    UnexpectedOutput { program: String, reason: String },
}

/// Resolved paths of the external tools.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalTools {
    pub git: Option<PathBuf>,
    pub gh: Option<PathBuf>,
    pub maptools: Option<PathBuf>,
    pub pngquant: Option<PathBuf>,
    pub optipng: Option<PathBuf>,
}

impl ExternalTools {
    /// Locate every tool on `PATH`, preferring explicit overrides.
    ///
    /// `maptools` is also looked up in the current directory, where CI jobs
    /// usually download it.
    pub fn discover(overrides: &ToolSettings) -> Self {
        let maptools = overrides.maptools.clone().or_else(|| {
            which::which("maptools").ok().or_else(|| {
                let cwd = std::env::current_dir().ok()?;
                which::which_in("maptools", Some(&cwd), &cwd).ok()
            })
        });

        Self {
            git: lookup(&overrides.git, "git"),
            gh: lookup(&overrides.gh, "gh"),
            maptools,
            pngquant: lookup(&overrides.pngquant, "pngquant"),
            optipng: lookup(&overrides.optipng, "optipng"),
        }
    }

    pub fn require_git(&self) -> Result<&Path, ToolError> {
        self.git.as_deref().ok_or(ToolError::Missing("git"))
    }

    pub fn require_gh(&self) -> Result<&Path, ToolError> {
        self.gh.as_deref().ok_or(ToolError::Missing("gh cli"))
    }

    pub fn require_maptools(&self) -> Result<&Path, ToolError> {
        self.maptools.as_deref().ok_or(ToolError::Missing("maptools"))
    }

    /// Check the tools every release run needs.
    pub fn require_release_tools(&self) -> Result<(), ToolError> {
        self.require_git()?;
        self.require_maptools()?;
        self.require_gh()?;
        Ok(())
    }
}

fn lookup(configured: &Option<PathBuf>, name: &str) -> Option<PathBuf> {
    configured.clone().or_else(|| which::which(name).ok())
}
