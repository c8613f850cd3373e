//! On-disk snapshot format ("YADB") and zero-copy typed views over it.
//!
//! Layout (all integers little endian):
//!
//! ```text
//! [Header 128B] [records, vectors, blob bytes ...] [String table] [string bytes]
//! ```
//!
//! - Header: identifier `YADB` at 0, `u16` version at 4, `u32` string table
//!   offset at 8, then one `(u32 offset, u32 count)` slot per record kind at 16.
//!   A slot points at `count` `u32` absolute record offsets.
//! - Record: fixed `RECORD_SIZE` header; vectors are referenced by absolute
//!   offset (0 = empty) and start with a `u32` count followed by fixed-size entries.
//! - String table: `u32` count then `(u32 offset, u32 len)` per string.
//!   String index `NO_STRING` means absent.

use thiserror::Error;

pub mod verify;
pub mod view;
pub mod writer;

pub use verify::verify;
pub use view::{
    AttributeEntry, BlobEntry, CommentEntry, Entries, Entry, HiddenAreaEntry, RegisterViewEntry,
    RootView, SignatureEntry, StrRef, ValueViewEntry, VersionArray, VersionView, XrefEntry,
};
pub use writer::SnapshotWriter;

/// Identifier stored at offset 0.
pub const IDENTIFIER: [u8; 4] = *b"YADB";

/// Format version written by this crate.
pub const FORMAT_VERSION: u16 = 1;

/// Header: identifier(4) + version(2) + reserved(2) + strings(4) + reserved(4) + 14 slots * 8.
pub const HEADER_SIZE: usize = 128;

pub(crate) const HDR_VERSION: usize = 4;
pub(crate) const HDR_STRINGS: usize = 8;
pub(crate) const HDR_SLOTS: usize = 16;
pub(crate) const SLOT_SIZE: usize = 8;

/// Number of record kinds with an array slot.
pub const NUM_SLOTS: usize = 14;

/// String index meaning "absent".
pub const NO_STRING: u32 = u32::MAX;

/// String subtype meaning "absent".
pub const NO_STRING_TYPE: u8 = u8::MAX;

/// Upper bound on records accepted by the verifier.
pub const MAX_RECORDS: usize = 20_000_000;

pub(crate) const REC_OBJECT_ID: usize = 0;
pub(crate) const REC_PARENT_ID: usize = 8;
pub(crate) const REC_ADDRESS: usize = 16;
pub(crate) const REC_SIZE: usize = 24;
pub(crate) const REC_FLAGS: usize = 32;
pub(crate) const REC_USERNAME: usize = 36;
pub(crate) const REC_USERNAME_FLAGS: usize = 40;
pub(crate) const REC_PROTOTYPE: usize = 44;
pub(crate) const REC_HEADER_REPEATABLE: usize = 48;
pub(crate) const REC_HEADER_NONREPEATABLE: usize = 52;
pub(crate) const REC_STRING_TYPE: usize = 56;
pub(crate) const REC_SIGNATURES: usize = 60;
pub(crate) const REC_XREFS: usize = 64;
pub(crate) const REC_COMMENTS: usize = 68;
pub(crate) const REC_VALUEVIEWS: usize = 72;
pub(crate) const REC_REGISTERVIEWS: usize = 76;
pub(crate) const REC_HIDDENAREAS: usize = 80;
pub(crate) const REC_ATTRIBUTES: usize = 84;
pub(crate) const REC_BLOBS: usize = 88;

/// Size of the fixed record header.
pub const RECORD_SIZE: usize = 92;

/// Error type for malformed or unwritable snapshot buffers.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormatError {
    #[error("Buffer does not start with the YADB identifier")]
    MissingIdentifier,

    #[error("Unsupported format version {found}; expected {expected}")]
    UnsupportedVersion { found: u16, expected: u16 },

    #[error("Truncated {what} at offset {offset}")]
    Truncated { what: &'static str, offset: usize },

    #[error("String index {index} is out of range ({count} strings)")]
    BadString { index: u32, count: u32 },

    #[error("String {index} is not valid UTF-8")]
    InvalidUtf8 { index: u32 },

    #[error("Snapshot holds {found} records; limit is {limit}")]
    TooManyRecords { found: usize, limit: usize },

    #[error("Snapshot exceeds the 4 GiB offset range")]
    TooLarge,

    #[error("Record {id:#x} has kind 'unknown' and cannot be stored")]
    UnknownObjectType { id: u64 },
}

pub(crate) fn read_u8(bytes: &[u8], pos: usize) -> u8 {
    bytes.get(pos).copied().unwrap_or(0)
}

pub(crate) fn read_u16(bytes: &[u8], pos: usize) -> u16 {
    match pos.checked_add(2).and_then(|end| bytes.get(pos..end)) {
        Some(b) => u16::from_le_bytes([b[0], b[1]]),
        None => 0,
    }
}

pub(crate) fn read_u32(bytes: &[u8], pos: usize) -> u32 {
    match pos.checked_add(4).and_then(|end| bytes.get(pos..end)) {
        Some(b) => u32::from_le_bytes([b[0], b[1], b[2], b[3]]),
        None => 0,
    }
}

pub(crate) fn read_u64(bytes: &[u8], pos: usize) -> u64 {
    match pos.checked_add(8).and_then(|end| bytes.get(pos..end)) {
        Some(b) => u64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]),
        None => 0,
    }
}
