//! CLI command implementations.
//!
//! - [`validate`] - Map validation with a Markdown report
//! - [`process`] - Publish new maps and update the map database
//! - [`rebuild`] - Refresh the index from stored map info
//! - [`push`] - Authenticated git push

pub mod process;
pub mod push;
pub mod rebuild;
pub mod validate;
