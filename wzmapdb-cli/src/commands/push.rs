//! The `push` command.

use std::path::PathBuf;

use clap::Args;
use tracing::info;
use wzmapdb::command::CommandRunner;
use wzmapdb::config::ConfigFile;
use wzmapdb::publisher::{
    AccessTokenSource, GithubAppCredentials, GithubAppTokenProvider, GIT_PUSH_APP_ENV,
};
use wzmapdb::push::{authenticated_push, PushRequest};
use wzmapdb::tools::ExternalTools;

use crate::error::CliError;

/// Arguments for `push`.
#[derive(Debug, Args)]
pub struct PushArgs {
    /// Target repository (ex. "Warzone2100/map-database")
    #[arg(long)]
    pub github_repo: String,

    /// Local branch to push
    #[arg(long)]
    pub local_branch: String,

    /// Remote branch to update
    #[arg(long)]
    pub remote_branch: String,

    /// Force push
    #[arg(long)]
    pub force: bool,

    /// Local git repository (defaults to the current directory)
    #[arg(long)]
    pub cwd: Option<PathBuf>,

    /// Log the push instead of performing it
    #[arg(long)]
    pub dry_run: bool,
}

/// Push with a token from the push App, or with ambient git credentials.
pub fn run(args: PushArgs, config: &ConfigFile) -> Result<(), CliError> {
    let tools = ExternalTools::discover(&config.tools);
    let git = tools.require_git()?;
    let runner = CommandRunner::new(args.dry_run);

    let tokens = match GithubAppCredentials::from_env(GIT_PUSH_APP_ENV) {
        Some(credentials) => Some(GithubAppTokenProvider::new(
            credentials,
            tools.require_gh()?,
            runner,
        )?),
        None => {
            info!("Not configured to use app token provider");
            None
        }
    };

    let request = PushRequest {
        github_repo: args.github_repo,
        local_branch: args.local_branch,
        remote_branch: args.remote_branch,
        force: args.force,
        cwd: args.cwd,
    };
    authenticated_push(
        git,
        &request,
        tokens.as_ref().map(|t| t as &dyn AccessTokenSource),
        runner,
    )?;
    Ok(())
}
