//! Argument types for the validate command.

use std::path::PathBuf;

use clap::{Args, Subcommand};

/// Options shared by both validate subcommands.
#[derive(Debug, Args)]
pub struct ValidateCommand {
    /// Map repos config JSON ({"<players>": ["Org/maps-Np", ...]})
    #[arg(long)]
    pub map_repos_config: Option<PathBuf>,

    /// Folder for clones of map repositories used by the name check
    #[arg(long)]
    pub output_temp_folder: Option<PathBuf>,

    /// Check that each map has this number of players
    #[arg(long)]
    pub expected_players: Option<i64>,

    /// Skip the check for maps with the same name in the map repos
    #[arg(long)]
    pub skip_uniqueness_checks: bool,

    /// A locally cloned map repo (ex. "Warzone2100/maps-2p@./repos/maps-2p")
    #[arg(long, value_name = "REPO@PATH")]
    pub local_map_repo: Vec<String>,

    #[command(subcommand)]
    pub target: ValidateTarget,
}

/// What to validate.
#[derive(Debug, Subcommand)]
pub enum ValidateTarget {
    /// Validate a single map (usually a .wz map package)
    Map {
        /// Map package or extracted map folder
        map_path: PathBuf,
    },

    /// Validate every map in a list file (ex. the map folders changed in a PR)
    MapList {
        /// File with one map path per line
        map_list_file: PathBuf,
    },
}

/// Arguments for [`super::MapHandler`].
#[derive(Debug, Clone)]
pub struct MapArgs {
    pub map_path: PathBuf,
}

/// Arguments for [`super::MapListHandler`].
#[derive(Debug, Clone)]
pub struct MapListArgs {
    pub map_list_file: PathBuf,
}
