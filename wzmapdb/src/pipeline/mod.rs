//! End-to-end drivers.
//!
//! [`MapRepoProcessor`] publishes one repository's new maps as releases;
//! [`process_new_maps`] runs it for every tracked repository and then
//! updates the map database.

mod new_maps;
mod repo;

use std::io;

use thiserror::Error;

use crate::config::RepoConfigError;
use crate::database::DatabaseError;
use crate::publisher::PublishError;
use crate::tools::ToolError;

pub use new_maps::{
    process_new_maps, GitCheckout, MapRepoCheckout, NewMapsOutcome, NewMapsPaths,
    PipelineServices, PipelineSettings,
};
pub use repo::{MapRepoProcessor, RepoWorkspace};

/// Fatal pipeline failures.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Publish(#[from] PublishError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Config(#[from] RepoConfigError),

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("failed to write pipeline output: {0}")]
    Output(#[from] io::Error),
}
