//! SQLite metadata store: the materialized side of a sync.
//!
//! Snapshot records are replayed into the store through `DbVisitor`, read back
//! with `MetadataDb::load_version`, and removed with `delete_from_model`. Each
//! import is recorded in the `sync_runs` table.

pub mod delete;
pub mod metadata_db;
pub mod models;
pub mod visitor;

pub use delete::delete_from_model;
pub use metadata_db::{DbError, DbResult, MetadataDb, CURRENT_SCHEMA_VERSION};
pub use models::{DeleteReport, SyncRunRecord};
pub use visitor::DbVisitor;
