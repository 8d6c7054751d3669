//! Map repository history via the `git` CLI.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::command::{CommandRunner, CommandSpec};
use crate::tools::ToolError;

/// Branch whose first-parent history defines release order.
pub const MAIN_BRANCH: &str = "main";

/// Source control queries needed to build releases.
pub trait CommitHistory {
    /// Commits after `since` up to `HEAD`, oldest first, following first parents.
    fn commits_since(&self, since: &str) -> Result<Vec<String>, ToolError>;

    /// Top-level map folders (`maps/<name>`) touched by a commit.
    fn changed_map_folders(&self, commit: &str) -> Result<Vec<String>, ToolError>;

    /// The parentless commit of the main branch.
    fn root_commit(&self) -> Result<String, ToolError>;
}

/// [`CommitHistory`] over a local clone.
#[derive(Debug, Clone)]
pub struct GitRepository {
    git: PathBuf,
    root: PathBuf,
    runner: CommandRunner,
}

impl GitRepository {
    pub fn new(git: &Path, root: &Path, runner: CommandRunner) -> Self {
        Self {
            git: git.to_path_buf(),
            root: root.to_path_buf(),
            runner,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn git(&self) -> CommandSpec {
        CommandSpec::new(&self.git).current_dir(&self.root)
    }

    fn lines(&self, spec: CommandSpec) -> Result<Vec<String>, ToolError> {
        let output = self.runner.run_checked(&spec)?;
        Ok(output
            .stdout_text()
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }
}

impl CommitHistory for GitRepository {
    fn commits_since(&self, since: &str) -> Result<Vec<String>, ToolError> {
        self.lines(self.git().args([
            "rev-list".to_string(),
            "--topo-order".to_string(),
            "--ancestry-path".to_string(),
            "--reverse".to_string(),
            "--first-parent".to_string(),
            format!("--branches={}", MAIN_BRANCH),
            format!("{}..HEAD", since),
        ]))
    }

    fn changed_map_folders(&self, commit: &str) -> Result<Vec<String>, ToolError> {
        let paths = self.lines(
            self.git()
                .args(["diff", "--name-only"])
                .arg(format!("{}^!", commit)),
        )?;
        Ok(map_folders(&paths))
    }

    fn root_commit(&self) -> Result<String, ToolError> {
        let commits = self.lines(self.git().args([
            "rev-list".to_string(),
            "--max-parents=0".to_string(),
            format!("--branches={}", MAIN_BRANCH),
            "HEAD".to_string(),
        ]))?;
        commits
            .into_iter()
            .next()
            .ok_or_else(|| ToolError::UnexpectedOutput {
                program: "git".to_string(),
                reason: "no root commit found".to_string(),
            })
    }
}

/// Reduce changed file paths to sorted, unique `maps/<name>` folders.
pub fn map_folders(paths: &[String]) -> Vec<String> {
    paths
        .iter()
        .filter_map(|path| {
            let mut parts = path.split('/');
            match (parts.next(), parts.next(), parts.next()) {
                (Some("maps"), Some(name), Some(_)) if !name.is_empty() => {
                    Some(format!("maps/{}", name))
                }
                _ => None,
            }
        })
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Clone `https://github.com/<repo>.git` into `dest`.
pub fn clone_repository(
    git: &Path,
    repo: &str,
    dest: &Path,
    runner: &CommandRunner,
) -> Result<(), ToolError> {
    let url = format!("https://github.com/{}.git", repo);
    info!("Cloning {} into {}", url, dest.display());
    let spec = CommandSpec::new(git).args(["clone", "--"]).arg(url).arg(dest);
    runner.run_checked(&spec)?;
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_map_folders_filters_and_dedupes() {
        let paths = strings(&[
            "README.md",
            "maps/Rush/4c-Rush.json",
            "maps/Rush/multiplay/maps/4c-Rush/game.js",
            "maps/Beta/game.map",
            ".github/workflows/ci.yml",
            "maps/stray-file.txt",
        ]);
        assert_eq!(map_folders(&paths), strings(&["maps/Beta", "maps/Rush"]));
    }

    #[test]
    fn test_map_folders_empty() {
        assert!(map_folders(&strings(&["docs/index.md"])).is_empty());
    }

    #[test]
    fn test_missing_git_is_spawn_error() {
        let repo = GitRepository::new(
            Path::new("/nonexistent/git"),
            Path::new("."),
            CommandRunner::new(false),
        );
        assert!(matches!(
            repo.root_commit(),
            Err(ToolError::Spawn { .. })
        ));
    }
}
