use crate::model::{
    Attribute, BlobRecord, CommentType, HiddenArea, NameRecord, ObjectId, ObjectType, Offset,
    OffsetComment, Operand, RegisterView, Signature, SignatureAlgo, SignatureMethod, ValueView,
    VersionRecord, XrefRecord,
};
use crate::snapshot::ModelVisitor;

/// Visitor rebuilding owned `VersionRecord`s from a replay stream.
#[derive(Debug, Default)]
pub struct RecordCollector {
    records: Vec<VersionRecord>,
    current: Option<VersionRecord>,
}

impl RecordCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[VersionRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<VersionRecord> {
        self.records
    }

    /// Remove and return the most recently completed record.
    pub fn take_last(&mut self) -> Option<VersionRecord> {
        self.records.pop()
    }

    fn with_current(&mut self, update: impl FnOnce(&mut VersionRecord)) {
        if let Some(record) = self.current.as_mut() {
            update(record);
        }
    }
}

impl ModelVisitor for RecordCollector {
    fn visit_start_version(&mut self, object_type: ObjectType) {
        self.current = Some(VersionRecord::new(object_type, 0));
    }

    fn visit_end_version(&mut self) {
        if let Some(record) = self.current.take() {
            self.records.push(record);
        }
    }

    fn visit_id(&mut self, id: ObjectId) {
        self.with_current(|r| r.id = id);
    }

    fn visit_size(&mut self, size: Offset) {
        self.with_current(|r| r.size = size);
    }

    fn visit_parent_id(&mut self, parent_id: ObjectId) {
        self.with_current(|r| r.parent_id = parent_id);
    }

    fn visit_address(&mut self, address: Offset) {
        self.with_current(|r| r.address = address);
    }

    fn visit_name(&mut self, name: &str, flags: u32) {
        self.with_current(|r| r.name = Some(NameRecord { value: name.to_string(), flags }));
    }

    fn visit_prototype(&mut self, prototype: &str) {
        self.with_current(|r| r.prototype = Some(prototype.to_string()));
    }

    fn visit_flags(&mut self, flags: u32) {
        self.with_current(|r| r.flags = flags);
    }

    fn visit_string_type(&mut self, string_type: u8) {
        self.with_current(|r| r.string_type = Some(string_type));
    }

    fn visit_signature(&mut self, method: SignatureMethod, algo: SignatureAlgo, value: &str) {
        self.with_current(|r| r.signatures.push(Signature::new(method, algo, value)));
    }

    fn visit_header_comment(&mut self, repeatable: bool, comment: &str) {
        self.with_current(|r| {
            let slot = if repeatable {
                &mut r.header_comment_repeatable
            } else {
                &mut r.header_comment_nonrepeatable
            };
            *slot = Some(comment.to_string());
        });
    }

    fn visit_offset_comment(&mut self, offset: Offset, comment_type: CommentType, comment: &str) {
        self.with_current(|r| {
            r.comments.push(OffsetComment { offset, comment_type, value: comment.to_string() })
        });
    }

    fn visit_offset_valueview(&mut self, offset: Offset, operand: Operand, value: &str) {
        self.with_current(|r| {
            r.value_views.push(ValueView { offset, operand, value: value.to_string() })
        });
    }

    fn visit_offset_registerview(
        &mut self,
        offset: Offset,
        end_offset: Offset,
        name: &str,
        new_name: &str,
    ) {
        self.with_current(|r| {
            r.register_views.push(RegisterView {
                offset,
                end_offset,
                name: name.to_string(),
                new_name: new_name.to_string(),
            })
        });
    }

    fn visit_offset_hiddenarea(&mut self, offset: Offset, area_size: Offset, value: &str) {
        self.with_current(|r| {
            r.hidden_areas.push(HiddenArea { offset, area_size, value: value.to_string() })
        });
    }

    fn visit_start_xref(&mut self, offset: Offset, id: ObjectId, operand: Operand) {
        self.with_current(|r| {
            r.xrefs.push(XrefRecord { offset, operand, id, attributes: Vec::new() })
        });
    }

    fn visit_xref_attribute(&mut self, key: &str, value: &str) {
        self.with_current(|r| {
            if let Some(xref) = r.xrefs.last_mut() {
                xref.attributes.push(Attribute::new(key, value));
            }
        });
    }

    fn visit_attribute(&mut self, key: &str, value: &str) {
        self.with_current(|r| r.attributes.push(Attribute::new(key, value)));
    }

    fn visit_blob(&mut self, offset: Offset, data: &[u8]) {
        self.with_current(|r| r.blobs.push(BlobRecord { offset, data: data.to_vec() }));
    }
}
