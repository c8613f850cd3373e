use tracing::debug;

use crate::db::{DbError, DbResult, MetadataDb};
use crate::model::{
    CommentType, ObjectId, ObjectType, Offset, Operand, SignatureAlgo, SignatureMethod,
};
use crate::snapshot::{ModelVisitor, RecordCollector};

/// `ModelVisitor` materializing replayed records into a `MetadataDb`.
///
/// Replay has no failure channel, so the first SQL error is kept, later
/// records are dropped, and the error is returned by `finish`.
#[derive(Debug)]
pub struct DbVisitor<'d> {
    db: &'d MetadataDb,
    collector: RecordCollector,
    written: usize,
    error: Option<DbError>,
}

impl<'d> DbVisitor<'d> {
    pub fn new(db: &'d MetadataDb) -> Self {
        Self { db, collector: RecordCollector::new(), written: 0, error: None }
    }

    /// Number of records written so far.
    pub fn written(&self) -> usize {
        self.written
    }

    /// Report the first error, or the number of records written.
    pub fn finish(self) -> DbResult<usize> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.written),
        }
    }
}

impl ModelVisitor for DbVisitor<'_> {
    fn visit_start(&mut self) {
        debug!("db import start");
    }

    fn visit_end(&mut self) {
        debug!(written = self.written, failed = self.error.is_some(), "db import end");
    }

    fn visit_start_version(&mut self, object_type: ObjectType) {
        self.collector.visit_start_version(object_type);
    }

    fn visit_end_version(&mut self) {
        self.collector.visit_end_version();
        let Some(record) = self.collector.take_last() else {
            return;
        };
        if self.error.is_some() {
            return;
        }
        match self.db.upsert_version(&record) {
            Ok(()) => self.written += 1,
            Err(err) => self.error = Some(err),
        }
    }

    fn visit_id(&mut self, id: ObjectId) {
        self.collector.visit_id(id);
    }

    fn visit_size(&mut self, size: Offset) {
        self.collector.visit_size(size);
    }

    fn visit_parent_id(&mut self, parent_id: ObjectId) {
        self.collector.visit_parent_id(parent_id);
    }

    fn visit_address(&mut self, address: Offset) {
        self.collector.visit_address(address);
    }

    fn visit_name(&mut self, name: &str, flags: u32) {
        self.collector.visit_name(name, flags);
    }

    fn visit_prototype(&mut self, prototype: &str) {
        self.collector.visit_prototype(prototype);
    }

    fn visit_flags(&mut self, flags: u32) {
        self.collector.visit_flags(flags);
    }

    fn visit_string_type(&mut self, string_type: u8) {
        self.collector.visit_string_type(string_type);
    }

    fn visit_signature(&mut self, method: SignatureMethod, algo: SignatureAlgo, value: &str) {
        self.collector.visit_signature(method, algo, value);
    }

    fn visit_header_comment(&mut self, repeatable: bool, comment: &str) {
        self.collector.visit_header_comment(repeatable, comment);
    }

    fn visit_offset_comment(&mut self, offset: Offset, comment_type: CommentType, comment: &str) {
        self.collector.visit_offset_comment(offset, comment_type, comment);
    }

    fn visit_offset_valueview(&mut self, offset: Offset, operand: Operand, value: &str) {
        self.collector.visit_offset_valueview(offset, operand, value);
    }

    fn visit_offset_registerview(
        &mut self,
        offset: Offset,
        end_offset: Offset,
        name: &str,
        new_name: &str,
    ) {
        self.collector.visit_offset_registerview(offset, end_offset, name, new_name);
    }

    fn visit_offset_hiddenarea(&mut self, offset: Offset, area_size: Offset, value: &str) {
        self.collector.visit_offset_hiddenarea(offset, area_size, value);
    }

    fn visit_start_xref(&mut self, offset: Offset, id: ObjectId, operand: Operand) {
        self.collector.visit_start_xref(offset, id, operand);
    }

    fn visit_xref_attribute(&mut self, key: &str, value: &str) {
        self.collector.visit_xref_attribute(key, value);
    }

    fn visit_attribute(&mut self, key: &str, value: &str) {
        self.collector.visit_attribute(key, value);
    }

    fn visit_blob(&mut self, offset: Offset, data: &[u8]) {
        self.collector.visit_blob(offset, data);
    }
}
