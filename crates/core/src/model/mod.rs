//! Core data model (IR) for snapshot records: identifiers, record kinds,
//! signature classifications and the owned record representation.
//!
//! The snapshot itself is read zero-copy through `crate::format`; the types in
//! `record` are owned mirrors used for writing snapshots, collecting replayed
//! records, and persisting them.

use serde::{Deserialize, Serialize};

pub mod record;

pub use record::{
    Attribute, BlobRecord, HiddenArea, NameRecord, OffsetComment, RegisterView, ValueView,
    VersionRecord, XrefRecord,
};

/// Stable 64-bit object identifier, unique within one snapshot.
pub type ObjectId = u64;

/// Address, size, or offset inside a binary.
pub type Offset = u64;

/// Operand index of an instruction.
pub type Operand = u32;

/// Dense position of a record inside one model.
pub type VersionIdx = u32;

/// Dense position of a signature inside one model.
pub type SignatureIdx = u32;

/// Return value of every walker callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Walk {
    Continue,
    Stop,
}

impl Walk {
    pub fn is_stop(self) -> bool {
        self == Walk::Stop
    }
}

/// Kind of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectType {
    Unknown,
    Binary,
    Segment,
    SegmentChunk,
    Struct,
    StructMember,
    Enum,
    EnumMember,
    Function,
    StackFrame,
    StackFrameMember,
    Data,
    Code,
    ReferenceInfo,
    BasicBlock,
}

/// Canonical traversal order of the record arrays.
///
/// Local indices are assigned in this order, so it must never change for a
/// given format version.
pub const ORDERED_TYPES: [ObjectType; 14] = [
    ObjectType::Binary,
    ObjectType::Struct,
    ObjectType::StructMember,
    ObjectType::Enum,
    ObjectType::EnumMember,
    ObjectType::Segment,
    ObjectType::SegmentChunk,
    ObjectType::StackFrame,
    ObjectType::StackFrameMember,
    ObjectType::ReferenceInfo,
    ObjectType::Code,
    ObjectType::Function,
    ObjectType::BasicBlock,
    ObjectType::Data,
];

impl ObjectType {
    /// Encode as the on-disk kind code. `Unknown` is 0 and has no array.
    pub fn code(self) -> u8 {
        match self {
            ObjectType::Unknown => 0,
            ObjectType::Binary => 1,
            ObjectType::Segment => 2,
            ObjectType::SegmentChunk => 3,
            ObjectType::Struct => 4,
            ObjectType::StructMember => 5,
            ObjectType::Enum => 6,
            ObjectType::EnumMember => 7,
            ObjectType::Function => 8,
            ObjectType::StackFrame => 9,
            ObjectType::StackFrameMember => 10,
            ObjectType::Data => 11,
            ObjectType::Code => 12,
            ObjectType::ReferenceInfo => 13,
            ObjectType::BasicBlock => 14,
        }
    }

    /// Decode an on-disk kind code.
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => ObjectType::Binary,
            2 => ObjectType::Segment,
            3 => ObjectType::SegmentChunk,
            4 => ObjectType::Struct,
            5 => ObjectType::StructMember,
            6 => ObjectType::Enum,
            7 => ObjectType::EnumMember,
            8 => ObjectType::Function,
            9 => ObjectType::StackFrame,
            10 => ObjectType::StackFrameMember,
            11 => ObjectType::Data,
            12 => ObjectType::Code,
            13 => ObjectType::ReferenceInfo,
            14 => ObjectType::BasicBlock,
            _ => ObjectType::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ObjectType::Unknown => "unknown",
            ObjectType::Binary => "binary",
            ObjectType::Segment => "segment",
            ObjectType::SegmentChunk => "segment_chunk",
            ObjectType::Struct => "struct",
            ObjectType::StructMember => "struct_member",
            ObjectType::Enum => "enum",
            ObjectType::EnumMember => "enum_member",
            ObjectType::Function => "function",
            ObjectType::StackFrame => "stack_frame",
            ObjectType::StackFrameMember => "stack_frame_member",
            ObjectType::Data => "data",
            ObjectType::Code => "code",
            ObjectType::ReferenceInfo => "reference_info",
            ObjectType::BasicBlock => "basic_block",
        }
    }

    /// Whether records of this kind travel with the object referencing them
    /// when matched objects are propagated (type definitions and frames).
    pub fn is_exported_as_child(self) -> bool {
        matches!(
            self,
            ObjectType::Struct
                | ObjectType::StructMember
                | ObjectType::Enum
                | ObjectType::EnumMember
                | ObjectType::StackFrame
                | ObjectType::StackFrameMember
                | ObjectType::ReferenceInfo
        )
    }
}

impl std::fmt::Display for ObjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ObjectType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        std::iter::once(ObjectType::Unknown)
            .chain(ORDERED_TYPES)
            .find(|ty| ty.as_str() == s)
            .ok_or_else(|| format!("unknown object type '{s}'"))
    }
}

/// Fingerprinting strategy of a signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureMethod {
    Unknown,
    FirstByte,
    Full,
    Invariants,
    OpCode,
    IntraGraph,
    String,
}

impl SignatureMethod {
    pub fn to_u8(self) -> u8 {
        match self {
            SignatureMethod::Unknown => 0,
            SignatureMethod::FirstByte => 1,
            SignatureMethod::Full => 2,
            SignatureMethod::Invariants => 3,
            SignatureMethod::OpCode => 4,
            SignatureMethod::IntraGraph => 5,
            SignatureMethod::String => 6,
        }
    }

    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => SignatureMethod::FirstByte,
            2 => SignatureMethod::Full,
            3 => SignatureMethod::Invariants,
            4 => SignatureMethod::OpCode,
            5 => SignatureMethod::IntraGraph,
            6 => SignatureMethod::String,
            _ => SignatureMethod::Unknown,
        }
    }
}

/// Hash algorithm of a signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureAlgo {
    Unknown,
    None,
    Crc32,
    Md5,
}

impl SignatureAlgo {
    pub fn to_u8(self) -> u8 {
        match self {
            SignatureAlgo::Unknown => 0,
            SignatureAlgo::None => 1,
            SignatureAlgo::Crc32 => 2,
            SignatureAlgo::Md5 => 3,
        }
    }

    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => SignatureAlgo::None,
            2 => SignatureAlgo::Crc32,
            3 => SignatureAlgo::Md5,
            _ => SignatureAlgo::Unknown,
        }
    }
}

/// Kind of an offset-indexed comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentType {
    Unknown,
    Repeatable,
    NonRepeatable,
    Anterior,
    Posterior,
    Bookmark,
}

impl CommentType {
    pub fn to_u8(self) -> u8 {
        match self {
            CommentType::Unknown => 0,
            CommentType::Repeatable => 1,
            CommentType::NonRepeatable => 2,
            CommentType::Anterior => 3,
            CommentType::Posterior => 4,
            CommentType::Bookmark => 5,
        }
    }

    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => CommentType::Repeatable,
            2 => CommentType::NonRepeatable,
            3 => CommentType::Anterior,
            4 => CommentType::Posterior,
            5 => CommentType::Bookmark,
            _ => CommentType::Unknown,
        }
    }
}

/// Owned content fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature {
    pub method: SignatureMethod,
    pub algo: SignatureAlgo,
    pub value: String,
}

impl Signature {
    pub fn new(method: SignatureMethod, algo: SignatureAlgo, value: impl Into<String>) -> Self {
        Self { method, algo, value: value.into() }
    }
}
