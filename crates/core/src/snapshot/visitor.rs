//! Push-style replay of stored records.
//!
//! Consumers receive a record's identity and classification before its
//! structural detail, always in the order produced by `accept_version`.

use std::time::Instant;

use tracing::debug;

use crate::model::{
    CommentType, ObjectId, ObjectType, Offset, Operand, SignatureAlgo, SignatureMethod,
    VersionIdx,
};
use crate::snapshot::Model;

/// Receiver of replayed records. Every method defaults to a no-op so
/// consumers only implement what they materialize.
#[allow(unused_variables)]
pub trait ModelVisitor {
    fn visit_start(&mut self) {}
    fn visit_end(&mut self) {}

    fn visit_start_version(&mut self, object_type: ObjectType) {}
    fn visit_end_version(&mut self) {}

    fn visit_id(&mut self, id: ObjectId) {}
    fn visit_size(&mut self, size: Offset) {}
    fn visit_parent_id(&mut self, parent_id: ObjectId) {}
    fn visit_address(&mut self, address: Offset) {}
    fn visit_name(&mut self, name: &str, flags: u32) {}
    fn visit_prototype(&mut self, prototype: &str) {}
    fn visit_flags(&mut self, flags: u32) {}
    fn visit_string_type(&mut self, string_type: u8) {}

    fn visit_start_signatures(&mut self) {}
    fn visit_signature(&mut self, method: SignatureMethod, algo: SignatureAlgo, value: &str) {}
    fn visit_end_signatures(&mut self) {}

    fn visit_header_comment(&mut self, repeatable: bool, comment: &str) {}

    fn visit_start_offsets(&mut self) {}
    fn visit_offset_comment(&mut self, offset: Offset, comment_type: CommentType, comment: &str) {}
    fn visit_offset_valueview(&mut self, offset: Offset, operand: Operand, value: &str) {}
    fn visit_offset_registerview(
        &mut self,
        offset: Offset,
        end_offset: Offset,
        name: &str,
        new_name: &str,
    ) {
    }
    fn visit_offset_hiddenarea(&mut self, offset: Offset, area_size: Offset, value: &str) {}
    fn visit_end_offsets(&mut self) {}

    fn visit_start_xrefs(&mut self) {}
    fn visit_start_xref(&mut self, offset: Offset, id: ObjectId, operand: Operand) {}
    fn visit_xref_attribute(&mut self, key: &str, value: &str) {}
    fn visit_end_xref(&mut self) {}
    fn visit_end_xrefs(&mut self) {}

    fn visit_attribute(&mut self, key: &str, value: &str) {}
    fn visit_blob(&mut self, offset: Offset, data: &[u8]) {}
}

pub(crate) fn accept_version(model: &Model, idx: VersionIdx, visitor: &mut dyn ModelVisitor) {
    let ctx = model.ctx(idx);
    let version = model.view(idx);

    visitor.visit_start_version(ctx.object_type);
    visitor.visit_id(ctx.id);
    visitor.visit_size(version.size());
    visitor.visit_parent_id(version.parent_id());
    visitor.visit_address(version.address());

    if let Some(name) = version.username() {
        visitor.visit_name(name, version.username_flags());
    }
    if let Some(prototype) = version.prototype() {
        visitor.visit_prototype(prototype);
    }
    visitor.visit_flags(version.flags());
    if let Some(string_type) = version.string_type() {
        visitor.visit_string_type(string_type);
    }

    visitor.visit_start_signatures();
    for sig in model.signature_range(idx) {
        let entry = model.signature_entry(sig);
        visitor.visit_signature(entry.method(), entry.algo(), entry.value().unwrap_or(""));
    }
    visitor.visit_end_signatures();

    if let Some(comment) = version.header_comment(true) {
        visitor.visit_header_comment(true, comment);
    }
    if let Some(comment) = version.header_comment(false) {
        visitor.visit_header_comment(false, comment);
    }

    let comments = version.comments();
    let value_views = version.value_views();
    let register_views = version.register_views();
    let hidden_areas = version.hidden_areas();
    if !comments.is_empty()
        || !value_views.is_empty()
        || !register_views.is_empty()
        || !hidden_areas.is_empty()
    {
        visitor.visit_start_offsets();
        for comment in comments.iter() {
            visitor.visit_offset_comment(
                comment.offset(),
                comment.comment_type(),
                comment.value().unwrap_or(""),
            );
        }
        for view in value_views.iter() {
            visitor.visit_offset_valueview(view.offset(), view.operand(), view.value().unwrap_or(""));
        }
        for view in register_views.iter() {
            visitor.visit_offset_registerview(
                view.offset(),
                view.end_offset(),
                view.register_name().unwrap_or(""),
                view.register_new_name().unwrap_or(""),
            );
        }
        for area in hidden_areas.iter() {
            visitor.visit_offset_hiddenarea(area.offset(), area.area_size(), area.value().unwrap_or(""));
        }
        visitor.visit_end_offsets();
    }

    visitor.visit_start_xrefs();
    for xref in version.xrefs().iter() {
        visitor.visit_start_xref(xref.offset(), xref.target_id(), xref.operand());
        for attr in xref.attributes().iter() {
            visitor.visit_xref_attribute(attr.key().unwrap_or(""), attr.value().unwrap_or(""));
        }
        visitor.visit_end_xref();
    }
    visitor.visit_end_xrefs();

    for attr in version.attributes().iter() {
        visitor.visit_attribute(attr.key().unwrap_or(""), attr.value().unwrap_or(""));
    }

    for blob in version.blobs().iter() {
        visitor.visit_blob(blob.offset(), blob.data());
    }

    visitor.visit_end_version();
}

pub(crate) fn accept_model(model: &Model, visitor: &mut dyn ModelVisitor) {
    let mut progress = ProgressLogger::new(model.num_objects());
    visitor.visit_start();
    for idx in 0..model.num_objects() as VersionIdx {
        accept_version(model, idx, visitor);
        progress.update(model.ctx(idx).object_type);
    }
    visitor.visit_end();
}

/// Logs replay progress when the percentage or the record kind changes.
struct ProgressLogger {
    max: usize,
    done: usize,
    last_progress: Option<usize>,
    last_type: Option<ObjectType>,
    chunk: usize,
    last_clock: Instant,
}

impl ProgressLogger {
    fn new(max: usize) -> Self {
        debug!(objects = max, "accept all objects");
        Self { max, done: 0, last_progress: None, last_type: None, chunk: 0, last_clock: Instant::now() }
    }

    fn update(&mut self, object_type: ObjectType) {
        let progress = self.done * 100 / self.max.max(1);
        if self.last_progress != Some(progress) || self.last_type != Some(object_type) {
            let now = Instant::now();
            let millis = now.duration_since(self.last_clock).as_millis().max(1) as usize;
            debug!(
                kind = %object_type,
                progress,
                objects_per_sec = self.chunk * 1000 / millis,
                "accept"
            );
            self.chunk = 0;
            self.last_clock = now;
        }
        self.last_progress = Some(progress);
        self.last_type = Some(object_type);
        self.done += 1;
        self.chunk += 1;
    }
}
