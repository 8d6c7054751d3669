//! Map inspection via `maptools`.
//!
//! `maptools package info` reports a map's info document as JSON on stdout
//! and any problems it noticed on stderr. `maptools package genpreview`
//! renders preview images.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::command::{CommandRunner, CommandSpec};
use crate::map_info::InspectedMap;
use crate::tools::ToolError;

/// Errors from inspecting a map package.
#[derive(Debug, Error)]
pub enum InspectError {
    /// The inspector rejected the package.
    #[error(
        "Invalid map - maptools package info command failed with exit code: {code}{}",
        failure_details(.stdout, .stderr)
    )]
    Failed {
        code: String,
        stdout: String,
        stderr: String,
    },

    /// The inspector succeeded but printed something other than a map info document.
    #[error("maptools package info printed invalid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error(transparent)]
    Tool(#[from] ToolError),
}

fn failure_details(stdout: &str, stderr: &str) -> String {
    let mut details = String::new();
    if !stdout.is_empty() {
        details.push_str(&format!("\n-----STDOUT:-----\n{}\n----------", stdout));
    }
    if !stderr.is_empty() {
        details.push_str(&format!("\n-----STDERR:-----\n{}\n----------", stderr));
    }
    details
}

/// Result of a successful inspection.
#[derive(Debug, Clone, PartialEq)]
pub struct Inspection {
    pub map: InspectedMap,
    /// Lines the inspector printed on stderr. They are reported as errors.
    pub diagnostics: Vec<String>,
}

/// Which preview image to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewKind {
    /// Full preview with player colors.
    Preview,
    /// Terrain layer only.
    Terrain,
}

impl PreviewKind {
    fn option(self) -> &'static str {
        match self {
            PreviewKind::Preview => "--playercolors=wz",
            PreviewKind::Terrain => "--layers=terrain",
        }
    }
}

/// Extracts map info from map packages and folders.
pub trait MapInspector {
    /// Inspect a `.wz` package or an extracted map folder.
    fn inspect(&self, package: &Path) -> Result<Inspection, InspectError>;

    /// Render a preview PNG of a package.
    fn render_preview(
        &self,
        package: &Path,
        output: &Path,
        kind: PreviewKind,
    ) -> Result<(), ToolError>;
}

/// [`MapInspector`] backed by the `maptools` executable.
#[derive(Debug, Clone)]
pub struct MaptoolsInspector {
    maptools: PathBuf,
    runner: CommandRunner,
}

impl MaptoolsInspector {
    pub fn new(maptools: &Path, runner: CommandRunner) -> Self {
        Self {
            maptools: maptools.to_path_buf(),
            runner,
        }
    }
}

impl MapInspector for MaptoolsInspector {
    fn inspect(&self, package: &Path) -> Result<Inspection, InspectError> {
        let spec = CommandSpec::new(&self.maptools)
            .args(["package", "info", "--map-seed=0"])
            .arg(package);
        let output = self.runner.run(&spec)?;
        if !output.success() {
            return Err(InspectError::Failed {
                code: output.code_display(),
                stdout: output.stdout_text(),
                stderr: output.stderr_text(),
            });
        }

        let map = InspectedMap::from_json(&output.stdout_text()).map_err(InspectError::InvalidJson)?;
        Ok(Inspection {
            map,
            diagnostics: output.stderr_text().lines().map(str::to_string).collect(),
        })
    }

    fn render_preview(
        &self,
        package: &Path,
        output: &Path,
        kind: PreviewKind,
    ) -> Result<(), ToolError> {
        let spec = CommandSpec::new(&self.maptools)
            .args(["package", "genpreview", kind.option(), "--map-seed=0"])
            .arg(package)
            .arg(output);
        self.runner.run_checked(&spec)?;
        Ok(())
    }
}
