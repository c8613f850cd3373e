//! snapsync-core
//!
//! Core library for correlating reverse-engineering snapshots.
//!
//! A snapshot is a flat serialized database of analysis records (binaries,
//! segments, functions, structs, enums, code and data regions) with their
//! cross-references and content signatures. This crate reads it zero-copy
//! (`format`), indexes it (`index`), serves queries and signature matching over
//! it (`snapshot`), and replays records into consumers such as the SQLite
//! metadata store (`db`) and the diff services (`services`).
//!
//! All substantive logic lives here so frontends (the `snapsync` CLI) stay thin.

pub mod config;
pub mod db;
pub mod format;
pub mod index;
pub mod model;
pub mod services;
pub mod snapshot;
pub mod source;

pub use snapshot::{HSignature, HVersion, Model, ModelError, ModelOptions, ModelVisitor, VerifyMode};

/// Returns the library version as encoded at compile time.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
