//! The `process-new-maps` command.

use std::io;
use std::path::PathBuf;

use clap::Args;
use tracing::info;
use wzmapdb::command::CommandRunner;
use wzmapdb::config::{ConfigFile, MapDbUrls, MapReposConfig};
use wzmapdb::database::PngOptimizer;
use wzmapdb::pipeline::{
    process_new_maps, GitCheckout, NewMapsPaths, PipelineServices, PipelineSettings,
};
use wzmapdb::publisher::{
    AccessTokenSource, GhCliHost, GithubAppCredentials, GithubAppTokenProvider, MaptoolsInspector,
    RestReleaseCatalog, MAPREPO_MANAGER_APP_ENV,
};
use wzmapdb::tools::ExternalTools;

use crate::error::CliError;

/// Arguments for `process-new-maps`.
#[derive(Debug, Args)]
pub struct ProcessNewMapsArgs {
    /// Map repos config JSON
    #[arg(long)]
    pub map_repos_config: PathBuf,

    /// Working folder for clones, release builds and release info
    #[arg(long)]
    pub temp_working_dir: PathBuf,

    /// Map database data root (index pages and tracked state)
    #[arg(long)]
    pub map_db_data_root: PathBuf,

    /// Map database assets root (info, readme and preview files)
    #[arg(long)]
    pub map_db_assets_root: PathBuf,

    /// Map database URLs config JSON (asset-url-templates)
    #[arg(long)]
    pub map_db_urls_config: PathBuf,

    /// Path of the data root below the site root
    #[arg(long, default_value = "")]
    pub map_db_data_root_relurl: String,

    /// Log mutating operations instead of performing them
    #[arg(long)]
    pub dry_run: bool,
}

/// Run the pipeline. Returns whether any maps were added to the database.
pub fn run(args: ProcessNewMapsArgs, config: &ConfigFile) -> Result<bool, CliError> {
    let tools = ExternalTools::discover(&config.tools);
    let git = tools.require_git()?;
    let gh = tools.require_gh()?;
    let maptools = tools.require_maptools()?;
    let runner = CommandRunner::new(args.dry_run);

    let repos_config = MapReposConfig::load(&args.map_repos_config)?;
    let urls = MapDbUrls::load(&args.map_db_urls_config, &args.map_db_data_root_relurl)?;

    let checkout = GitCheckout::new(git, runner);
    let host = GhCliHost::new(gh, runner);
    let inspector = MaptoolsInspector::new(maptools, runner);
    let catalog = RestReleaseCatalog::from_env()?;
    let optimizer = PngOptimizer::from_tools(&tools, runner);
    let tokens = match GithubAppCredentials::from_env(MAPREPO_MANAGER_APP_ENV) {
        Some(credentials) => Some(GithubAppTokenProvider::new(credentials, gh, runner)?),
        None => {
            info!("Not configured to use app token provider");
            None
        }
    };

    let services = PipelineServices {
        checkout: &checkout,
        host: &host,
        inspector: &inspector,
        catalog: &catalog,
        tokens: tokens.as_ref().map(|t| t as &dyn AccessTokenSource),
        optimizer: Some(&optimizer),
    };
    let settings = PipelineSettings {
        max_assets_per_release: config.release.max_assets_per_release,
        max_maps_per_page: config.database.max_maps_per_index_page,
        dry_run: args.dry_run,
    };
    let paths = NewMapsPaths {
        working_dir: args.temp_working_dir,
        data_root: args.map_db_data_root,
        assets_root: args.map_db_assets_root,
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let outcome = process_new_maps(&repos_config, &paths, &urls, &services, &settings, &mut out)?;
    Ok(outcome.maps_added > 0)
}
