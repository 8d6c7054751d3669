//! wzmapdb - Warzone 2100 map release and database tooling
//!
//! Validates submitted maps, publishes changed maps from map repositories as
//! reproducible release archives, and maintains the paginated public map
//! database built from those releases.
//!
//! # Modules
//!
//! - [`validation`]: map info rules and per-map validation details
//! - [`publisher`]: packaging, release building and uploading
//! - [`database`]: normalized records, asset store and index pages
//! - [`pipeline`]: the end-to-end new-maps driver
//! - [`push`]: `git push` with a GitHub App installation token

pub mod command;
pub mod config;
pub mod database;
pub mod json;
pub mod logging;
pub mod map_info;
pub mod pipeline;
pub mod publisher;
pub mod push;
pub mod tools;
pub mod validation;
