//! The `rebuild-index` command.

use std::path::PathBuf;

use clap::Args;
use tracing::{info, warn};
use wzmapdb::database::{rebuild_index, AssetStore};

use crate::error::CliError;

/// Arguments for `rebuild-index`.
#[derive(Debug, Args)]
pub struct RebuildIndexArgs {
    /// Map database data root
    #[arg(long)]
    pub map_db_data_root: PathBuf,

    /// Map database assets root
    #[arg(long)]
    pub map_db_assets_root: PathBuf,
}

/// Refresh every index page from the stored map info files.
pub fn run(args: RebuildIndexArgs) -> Result<(), CliError> {
    let assets = AssetStore::new(&args.map_db_assets_root);
    let summary = rebuild_index(&args.map_db_data_root, &assets)?;

    info!(
        "Rebuilt {} page(s): {} record(s) refreshed",
        summary.pages, summary.records_refreshed
    );
    if summary.records_missing > 0 {
        warn!(
            "{} record(s) had no stored map info and were left unchanged",
            summary.records_missing
        );
    }
    Ok(())
}
