use serde::{Deserialize, Serialize};

use crate::model::ObjectId;

/// Bookkeeping record for one snapshot import.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncRunRecord {
    /// Snapshot path as given on the command line.
    pub snapshot: String,
    /// Optional content hash of the snapshot (SHA-256, hex).
    pub snapshot_hash: Option<String>,
    /// Reference snapshot the written records were propagated from, if any.
    pub reference: Option<String>,
    pub reference_hash: Option<String>,
    /// Number of objects written.
    pub objects: usize,
    pub status: String,
    /// RFC 3339 timestamps.
    pub started_at: String,
    pub finished_at: String,
}

/// Outcome of `delete_from_model`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeleteReport {
    /// Stored objects removed.
    pub deleted: Vec<ObjectId>,
    /// Records of a deletable kind with no stored counterpart.
    pub missing: usize,
    /// Records whose kind is never deleted.
    pub skipped: usize,
}
