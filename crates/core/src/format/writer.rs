use std::collections::HashMap;

use crate::format::{
    FormatError, FORMAT_VERSION, HDR_SLOTS, HDR_STRINGS, HDR_VERSION, HEADER_SIZE, IDENTIFIER,
    NO_STRING, NO_STRING_TYPE, RECORD_SIZE, REC_ADDRESS, REC_ATTRIBUTES, REC_BLOBS, REC_COMMENTS,
    REC_FLAGS, REC_HEADER_NONREPEATABLE, REC_HEADER_REPEATABLE, REC_HIDDENAREAS, REC_OBJECT_ID,
    REC_PARENT_ID, REC_PROTOTYPE, REC_REGISTERVIEWS, REC_SIGNATURES, REC_SIZE, REC_STRING_TYPE,
    REC_USERNAME, REC_USERNAME_FLAGS, REC_VALUEVIEWS, REC_XREFS, SLOT_SIZE,
};
use crate::model::{Attribute, ObjectType, VersionRecord, ORDERED_TYPES};

/// Serializes owned records into a YADB snapshot buffer.
///
/// Records are grouped by kind; within a kind they keep insertion order, so
/// the local indices of the resulting model follow `ORDERED_TYPES` and then
/// the order of `add` calls.
#[derive(Debug, Default, Clone)]
pub struct SnapshotWriter {
    records: Vec<VersionRecord>,
}

impl SnapshotWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, record: VersionRecord) -> &mut Self {
        self.records.push(record);
        self
    }

    pub fn extend(&mut self, records: impl IntoIterator<Item = VersionRecord>) -> &mut Self {
        self.records.extend(records);
        self
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Encode all records into a new buffer.
    pub fn finish(&self) -> Result<Vec<u8>, FormatError> {
        if let Some(record) = self.records.iter().find(|r| r.object_type == ObjectType::Unknown) {
            return Err(FormatError::UnknownObjectType { id: record.id });
        }

        let mut enc = Encoder::new();
        for object_type in ORDERED_TYPES {
            let records: Vec<&VersionRecord> =
                self.records.iter().filter(|r| r.object_type == object_type).collect();
            if records.is_empty() {
                continue;
            }
            let array = enc.offset()?;
            let slot = HDR_SLOTS + (object_type.code() as usize - 1) * SLOT_SIZE;
            enc.patch_u32(slot, array);
            enc.patch_u32(slot + 4, records.len() as u32);
            enc.buf.resize(enc.buf.len() + records.len() * 4, 0);
            for (i, record) in records.into_iter().enumerate() {
                let pos = enc.record(record)?;
                enc.patch_u32(array as usize + i * 4, pos);
            }
        }
        enc.string_table()?;
        Ok(enc.buf)
    }
}

struct Encoder<'r> {
    buf: Vec<u8>,
    strings: Vec<&'r str>,
    interned: HashMap<&'r str, u32>,
}

impl<'r> Encoder<'r> {
    fn new() -> Self {
        let mut buf = vec![0u8; HEADER_SIZE];
        buf[..IDENTIFIER.len()].copy_from_slice(&IDENTIFIER);
        buf[HDR_VERSION..HDR_VERSION + 2].copy_from_slice(&FORMAT_VERSION.to_le_bytes());
        Self { buf, strings: Vec::new(), interned: HashMap::new() }
    }

    fn offset(&self) -> Result<u32, FormatError> {
        u32::try_from(self.buf.len()).map_err(|_| FormatError::TooLarge)
    }

    fn patch_u32(&mut self, pos: usize, value: u32) {
        self.buf[pos..pos + 4].copy_from_slice(&value.to_le_bytes());
    }

    fn intern(&mut self, value: &'r str) -> u32 {
        if let Some(&index) = self.interned.get(value) {
            return index;
        }
        let index = self.strings.len() as u32;
        self.strings.push(value);
        self.interned.insert(value, index);
        index
    }

    fn intern_opt(&mut self, value: Option<&'r str>) -> u32 {
        value.map_or(NO_STRING, |v| self.intern(v))
    }

    fn raw_bytes(&mut self, data: &[u8]) -> Result<u32, FormatError> {
        let pos = self.offset()?;
        self.buf.extend_from_slice(data);
        Ok(pos)
    }

    /// Append a vector of fixed-size entries; returns 0 for an empty one.
    fn vector<T>(
        &mut self,
        items: &'r [T],
        mut encode: impl FnMut(&mut Self, &'r T, &mut Vec<u8>) -> Result<(), FormatError>,
    ) -> Result<u32, FormatError> {
        if items.is_empty() {
            return Ok(0);
        }
        let mut entries = Vec::new();
        for item in items {
            encode(self, item, &mut entries)?;
        }
        let pos = self.offset()?;
        self.buf.extend_from_slice(&(items.len() as u32).to_le_bytes());
        self.buf.extend_from_slice(&entries);
        Ok(pos)
    }

    fn attributes(&mut self, attributes: &'r [Attribute]) -> Result<u32, FormatError> {
        self.vector(attributes, |enc, attr, out| {
            out.extend_from_slice(&enc.intern(&attr.key).to_le_bytes());
            out.extend_from_slice(&enc.intern(&attr.value).to_le_bytes());
            Ok(())
        })
    }

    fn record(&mut self, record: &'r VersionRecord) -> Result<u32, FormatError> {
        let signatures = self.vector(&record.signatures, |enc, sig, out| {
            out.extend_from_slice(&[sig.method.to_u8(), sig.algo.to_u8(), 0, 0]);
            out.extend_from_slice(&enc.intern(&sig.value).to_le_bytes());
            Ok(())
        })?;
        let xrefs = self.vector(&record.xrefs, |enc, xref, out| {
            let attributes = enc.attributes(&xref.attributes)?;
            out.extend_from_slice(&xref.offset.to_le_bytes());
            out.extend_from_slice(&xref.id.to_le_bytes());
            out.extend_from_slice(&xref.operand.to_le_bytes());
            out.extend_from_slice(&attributes.to_le_bytes());
            Ok(())
        })?;
        let comments = self.vector(&record.comments, |enc, comment, out| {
            out.extend_from_slice(&comment.offset.to_le_bytes());
            out.extend_from_slice(&[comment.comment_type.to_u8(), 0, 0, 0]);
            out.extend_from_slice(&enc.intern(&comment.value).to_le_bytes());
            Ok(())
        })?;
        let value_views = self.vector(&record.value_views, |enc, view, out| {
            out.extend_from_slice(&view.offset.to_le_bytes());
            out.extend_from_slice(&view.operand.to_le_bytes());
            out.extend_from_slice(&enc.intern(&view.value).to_le_bytes());
            Ok(())
        })?;
        let register_views = self.vector(&record.register_views, |enc, view, out| {
            out.extend_from_slice(&view.offset.to_le_bytes());
            out.extend_from_slice(&view.end_offset.to_le_bytes());
            out.extend_from_slice(&enc.intern(&view.name).to_le_bytes());
            out.extend_from_slice(&enc.intern(&view.new_name).to_le_bytes());
            Ok(())
        })?;
        let hidden_areas = self.vector(&record.hidden_areas, |enc, area, out| {
            out.extend_from_slice(&area.offset.to_le_bytes());
            out.extend_from_slice(&area.area_size.to_le_bytes());
            out.extend_from_slice(&enc.intern(&area.value).to_le_bytes());
            out.extend_from_slice(&0u32.to_le_bytes());
            Ok(())
        })?;
        let attributes = self.attributes(&record.attributes)?;
        let blobs = self.vector(&record.blobs, |enc, blob, out| {
            let data = enc.raw_bytes(&blob.data)?;
            out.extend_from_slice(&blob.offset.to_le_bytes());
            out.extend_from_slice(&data.to_le_bytes());
            out.extend_from_slice(&(blob.data.len() as u32).to_le_bytes());
            Ok(())
        })?;

        let mut header = [0u8; RECORD_SIZE];
        let mut put_u64 = |field: usize, value: u64| {
            header[field..field + 8].copy_from_slice(&value.to_le_bytes());
        };
        put_u64(REC_OBJECT_ID, record.id);
        put_u64(REC_PARENT_ID, record.parent_id);
        put_u64(REC_ADDRESS, record.address);
        put_u64(REC_SIZE, record.size);

        let username = self.intern_opt(record.name.as_ref().map(|n| n.value.as_str()));
        let username_flags = record.name.as_ref().map_or(0, |n| n.flags);
        let prototype = self.intern_opt(record.prototype.as_deref());
        let repeatable = self.intern_opt(record.header_comment_repeatable.as_deref());
        let nonrepeatable = self.intern_opt(record.header_comment_nonrepeatable.as_deref());
        for (field, value) in [
            (REC_FLAGS, record.flags),
            (REC_USERNAME, username),
            (REC_USERNAME_FLAGS, username_flags),
            (REC_PROTOTYPE, prototype),
            (REC_HEADER_REPEATABLE, repeatable),
            (REC_HEADER_NONREPEATABLE, nonrepeatable),
            (REC_SIGNATURES, signatures),
            (REC_XREFS, xrefs),
            (REC_COMMENTS, comments),
            (REC_VALUEVIEWS, value_views),
            (REC_REGISTERVIEWS, register_views),
            (REC_HIDDENAREAS, hidden_areas),
            (REC_ATTRIBUTES, attributes),
            (REC_BLOBS, blobs),
        ] {
            header[field..field + 4].copy_from_slice(&value.to_le_bytes());
        }
        header[REC_STRING_TYPE] = record.string_type.unwrap_or(NO_STRING_TYPE);

        self.raw_bytes(&header)
    }

    fn string_table(&mut self) -> Result<(), FormatError> {
        let table = self.offset()?;
        self.patch_u32(HDR_STRINGS, table);
        let count = self.strings.len();
        self.buf.extend_from_slice(&(count as u32).to_le_bytes());
        let entries = self.buf.len();
        self.buf.resize(entries + count * 8, 0);
        let strings = std::mem::take(&mut self.strings);
        for (i, value) in strings.iter().enumerate() {
            let pos = self.raw_bytes(value.as_bytes())?;
            self.patch_u32(entries + i * 8, pos);
            self.patch_u32(entries + i * 8 + 4, value.len() as u32);
        }
        self.offset()?;
        Ok(())
    }
}
