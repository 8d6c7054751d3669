//! The public map database.
//!
//! Published maps are described by [`MapDatabaseRecord`]s. Each record is
//! stored under its package hash in the asset tree ([`AssetStore`]) and
//! appended to the paginated index ([`MapIndex`]). [`MapDbUpdater`] drives
//! ingestion of newly published releases; [`rebuild_index`] refreshes the
//! index from the asset tree after a record schema change.

mod assets;
mod error;
mod images;
mod index;
mod record;
mod update;

pub use assets::{hash_prefix, AssetStore, INFO_DIR, PREVIEW_DIR, README_DIR};
pub use error::DatabaseError;
pub use images::{Optimized, PngOptimizer, SMALL_PALETTE_MIN_SIZE};
pub use index::{
    existing_pages, new_page, page_path, page_path_components, rebuild_index, version_stamp,
    versions_path, write_versions_manifest, AppendSummary, MapIndex, RebuildSummary, PAGE_TYPE,
    VERSIONS_TYPE, VERSION_FORMAT,
};
pub use record::{
    dedupe_authors, normalize, normalize_with_download, AuthorField, BalanceCounter,
    MapDatabaseRecord, NormalizeError, PlayerBalance, RecordDownload, RecordSize,
};
pub use update::{
    on_disk_release_tags, DatabasePaths, MapDbUpdater, UpdateOutcome, TEMP_ASSETS_DIRNAME,
};
