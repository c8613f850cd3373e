use serde::{Deserialize, Serialize};

use crate::model::{CommentType, ObjectId, ObjectType, Offset, Operand, Signature};

/// Owned mirror of one snapshot record.
///
/// This is both the input of `SnapshotWriter` and the output of
/// `RecordCollector`, so a record written and replayed compares equal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRecord {
    pub object_type: ObjectType,
    pub id: ObjectId,
    #[serde(default)]
    pub parent_id: ObjectId,
    #[serde(default)]
    pub address: Offset,
    #[serde(default)]
    pub size: Offset,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<NameRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prototype: Option<String>,
    #[serde(default)]
    pub flags: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub string_type: Option<u8>,
    #[serde(default)]
    pub signatures: Vec<Signature>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header_comment_repeatable: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header_comment_nonrepeatable: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub comments: Vec<OffsetComment>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub value_views: Vec<ValueView>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub register_views: Vec<RegisterView>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hidden_areas: Vec<HiddenArea>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub xrefs: Vec<XrefRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<Attribute>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blobs: Vec<BlobRecord>,
}

impl VersionRecord {
    /// Create an empty record of the given kind and id.
    pub fn new(object_type: ObjectType, id: ObjectId) -> Self {
        Self {
            object_type,
            id,
            parent_id: 0,
            address: 0,
            size: 0,
            name: None,
            prototype: None,
            flags: 0,
            string_type: None,
            signatures: Vec::new(),
            header_comment_repeatable: None,
            header_comment_nonrepeatable: None,
            comments: Vec::new(),
            value_views: Vec::new(),
            register_views: Vec::new(),
            hidden_areas: Vec::new(),
            xrefs: Vec::new(),
            attributes: Vec::new(),
            blobs: Vec::new(),
        }
    }

    pub fn with_address(mut self, address: Offset) -> Self {
        self.address = address;
        self
    }

    pub fn with_size(mut self, size: Offset) -> Self {
        self.size = size;
        self
    }

    pub fn with_parent(mut self, parent_id: ObjectId) -> Self {
        self.parent_id = parent_id;
        self
    }

    pub fn with_name(mut self, value: impl Into<String>, flags: u32) -> Self {
        self.name = Some(NameRecord { value: value.into(), flags });
        self
    }

    pub fn with_signature(mut self, signature: Signature) -> Self {
        self.signatures.push(signature);
        self
    }

    pub fn with_xref(mut self, offset: Offset, operand: Operand, id: ObjectId) -> Self {
        self.xrefs.push(XrefRecord { offset, operand, id, attributes: Vec::new() });
        self
    }

    /// Whether any offset-indexed annotation is present.
    pub fn has_offsets(&self) -> bool {
        !self.comments.is_empty()
            || !self.value_views.is_empty()
            || !self.register_views.is_empty()
            || !self.hidden_areas.is_empty()
    }
}

/// User-visible name plus the flags describing how it was derived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameRecord {
    pub value: String,
    #[serde(default)]
    pub flags: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffsetComment {
    pub offset: Offset,
    pub comment_type: CommentType,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueView {
    pub offset: Offset,
    pub operand: Operand,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterView {
    pub offset: Offset,
    pub end_offset: Offset,
    pub name: String,
    pub new_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HiddenArea {
    pub offset: Offset,
    pub area_size: Offset,
    pub value: String,
}

/// Outgoing cross-reference, targeting another record by object id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct XrefRecord {
    pub offset: Offset,
    #[serde(default)]
    pub operand: Operand,
    pub id: ObjectId,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub key: String,
    pub value: String,
}

impl Attribute {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self { key: key.into(), value: value.into() }
    }
}

/// Binary blob anchored at an offset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobRecord {
    pub offset: Offset,
    pub data: Vec<u8>,
}
