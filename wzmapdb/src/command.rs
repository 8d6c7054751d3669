//! External process invocation.
//!
//! Read-only queries always run. Commands that change remote state go
//! through [`CommandRunner::run_modification`], which in dry-run mode only
//! logs what would have been executed.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, info};

use crate::tools::ToolError;

/// A command line to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    program: PathBuf,
    args: Vec<OsString>,
    cwd: Option<PathBuf>,
    env: Vec<(String, String)>,
}

impl CommandSpec {
    pub fn new(program: impl AsRef<Path>) -> Self {
        Self {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            cwd: None,
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Set an environment variable. Values never appear in logs.
    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.env.push((key.to_string(), value.to_string()));
        self
    }

    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.display().to_string())
    }

    /// Command line for logs: arguments containing spaces are quoted.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_os_str())
            .chain(self.args.iter().map(|a| a.as_os_str()))
            .map(|part| {
                let part = part.to_string_lossy();
                if part.contains(' ') {
                    format!("\"{}\"", part)
                } else {
                    part.into_owned()
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        cmd.stdin(Stdio::null());
        cmd
    }
}

/// Captured result of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    /// A successful, empty result.
    pub fn empty_success() -> Self {
        Self {
            code: Some(0),
            ..Default::default()
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    pub fn code_display(&self) -> String {
        self.code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "signal".to_string())
    }

    /// Turn a non-zero exit into [`ToolError::Failed`].
    pub fn check(self, spec: &CommandSpec) -> Result<Self, ToolError> {
        if self.success() {
            return Ok(self);
        }
        let stderr = self.stderr_text();
        let details = if stderr.trim().is_empty() {
            String::new()
        } else {
            format!(": {}", stderr.trim())
        };
        Err(ToolError::Failed {
            program: spec.program_name(),
            code: self.code_display(),
            details,
        })
    }
}

/// Runs external commands, honoring dry-run for modifications.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandRunner {
    dry_run: bool,
}

impl CommandRunner {
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Run a command and capture its output.
    pub fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, ToolError> {
        debug!(command = %spec.program_name(), "running");
        let output = spec
            .to_command()
            .output()
            .map_err(|source| ToolError::Spawn {
                program: spec.program_name(),
                source,
            })?;
        Ok(CommandOutput {
            code: output.status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }

    /// Run a command and fail on a non-zero exit.
    pub fn run_checked(&self, spec: &CommandSpec) -> Result<CommandOutput, ToolError> {
        self.run(spec)?.check(spec)
    }

    /// Run a command that modifies remote state.
    pub fn run_modification(&self, spec: &CommandSpec) -> Result<CommandOutput, ToolError> {
        if self.dry_run {
            info!("DRYRUN - Would execute: {}", spec.display());
            return Ok(CommandOutput::empty_success());
        }
        self.run(spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_quotes_arguments_with_spaces() {
        let spec = CommandSpec::new("gh")
            .args(["release", "create", "v1"])
            .arg("--notes-file")
            .arg("my notes.md");
        assert_eq!(
            spec.display(),
            "gh release create v1 --notes-file \"my notes.md\""
        );
    }

    #[test]
    fn test_display_hides_env() {
        let spec = CommandSpec::new("gh").arg("release").env("GH_TOKEN", "secret");
        assert!(!spec.display().contains("secret"));
    }

    #[test]
    fn test_program_name() {
        assert_eq!(CommandSpec::new("/usr/bin/git").program_name(), "git");
    }

    #[test]
    fn test_dry_run_skips_modification() {
        let runner = CommandRunner::new(true);
        let spec = CommandSpec::new("/nonexistent/definitely-not-a-tool").arg("x");
        let output = runner.run_modification(&spec).unwrap();
        assert!(output.success());
        assert!(output.stdout.is_empty());
    }

    #[test]
    fn test_missing_program_is_spawn_error() {
        let runner = CommandRunner::new(false);
        let spec = CommandSpec::new("/nonexistent/definitely-not-a-tool");
        assert!(matches!(runner.run(&spec), Err(ToolError::Spawn { .. })));
    }

    #[test]
    fn test_check_reports_stderr() {
        let spec = CommandSpec::new("git");
        let output = CommandOutput {
            code: Some(128),
            stdout: Vec::new(),
            stderr: b"fatal: not a git repository\n".to_vec(),
        };
        let err = output.check(&spec).unwrap_err();
        assert_eq!(
            err.to_string(),
            "git failed with exit code 128: fatal: not a git repository"
        );
    }
}
