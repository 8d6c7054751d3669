//! Configuration: the INI settings file, map repository lists and the
//! public URL layout of the database.

mod file;
mod repos;
mod urls;

pub use file::{
    config_directory, config_file_path, ConfigFile, ConfigFileError, DatabaseSettings,
    LoggingSettings, ReleaseSettings, ToolSettings, DEFAULT_LOG_DIRECTORY, DEFAULT_LOG_FILE,
    DEFAULT_MAX_ASSETS_PER_RELEASE, DEFAULT_MAX_MAPS_PER_INDEX_PAGE,
};
pub use repos::{
    load_tracked_repos, save_tracked_repos, MapReposConfig, RepoConfigError, TrackedRepo,
    INITIAL_RELEASE_TAG,
};
pub use urls::MapDbUrls;
