//! Lightweight record and signature handles.
//!
//! A handle is a `(model, local index)` pair: one reference and one integer,
//! cheap to copy and valid for as long as the model is borrowed.
//!
//! Walkers report an absent string as `""`, the same way replay does.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::format::{VersionView, XrefEntry};
use crate::model::{
    CommentType, ObjectId, ObjectType, Offset, Operand, Signature, SignatureAlgo, SignatureIdx,
    SignatureMethod, VersionIdx, Walk,
};
use crate::snapshot::{visitor, Model, ModelVisitor};

/// Handle on one record of a model.
#[derive(Clone, Copy)]
pub struct HVersion<'a> {
    model: &'a Model,
    idx: VersionIdx,
}

/// Opaque handle on the attribute list of one cross-reference.
#[derive(Debug, Clone, Copy)]
pub struct XrefAttributes<'a> {
    xref: XrefEntry<'a>,
}

impl<'a> HVersion<'a> {
    pub(crate) fn new(model: &'a Model, idx: VersionIdx) -> Self {
        Self { model, idx }
    }

    fn view(&self) -> VersionView<'a> {
        self.model.view(self.idx)
    }

    pub fn model(&self) -> &'a Model {
        self.model
    }

    /// Local index inside the owning model.
    pub fn idx(&self) -> VersionIdx {
        self.idx
    }

    pub fn id(&self) -> ObjectId {
        self.model.ctx(self.idx).id
    }

    pub fn parent_id(&self) -> ObjectId {
        self.view().parent_id()
    }

    pub fn size(&self) -> Offset {
        self.view().size()
    }

    pub fn object_type(&self) -> ObjectType {
        self.model.ctx(self.idx).object_type
    }

    pub fn address(&self) -> Offset {
        self.view().address()
    }

    /// User name, empty when the record has none.
    pub fn username(&self) -> &'a str {
        self.view().username().unwrap_or("")
    }

    pub fn username_flags(&self) -> u32 {
        if self.view().username().is_some() {
            self.view().username_flags()
        } else {
            0
        }
    }

    pub fn prototype(&self) -> &'a str {
        self.view().prototype().unwrap_or("")
    }

    pub fn flags(&self) -> u32 {
        self.view().flags()
    }

    pub fn string_type(&self) -> Option<u8> {
        self.view().string_type()
    }

    pub fn header_comment(&self, repeatable: bool) -> &'a str {
        self.view().header_comment(repeatable).unwrap_or("")
    }

    pub fn has_signature(&self) -> bool {
        !self.view().signatures().is_empty()
    }

    pub fn walk_signatures<F>(&self, mut on_signature: F)
    where
        F: FnMut(HSignature<'a>) -> Walk,
    {
        for idx in self.model.signature_range(self.idx) {
            if on_signature(HSignature::new(self.model, idx)).is_stop() {
                return;
            }
        }
    }

    /// Outgoing cross-references whose target exists in this model.
    pub fn walk_xrefs_from<F>(&self, mut on_xref: F)
    where
        F: FnMut(Offset, Operand, HVersion<'a>) -> Walk,
    {
        for xref in self.view().xrefs().iter() {
            let Some(target) = self.model.get_object(xref.target_id()) else {
                continue;
            };
            if on_xref(xref.offset(), xref.operand(), target).is_stop() {
                return;
            }
        }
    }

    /// Records holding a resolved cross-reference to this one.
    pub fn walk_xrefs_to<F>(&self, mut on_version: F)
    where
        F: FnMut(HVersion<'a>) -> Walk,
    {
        let model = self.model;
        let start = model.ctx(self.idx).xrefs_to_idx;
        model.index().walk_xrefs_to(self.idx, start, |from| on_version(HVersion::new(model, from)));
    }

    /// Every outgoing cross-reference as stored, resolved or not.
    pub fn walk_xrefs<F>(&self, mut on_xref: F)
    where
        F: FnMut(Offset, Operand, ObjectId, XrefAttributes<'a>) -> Walk,
    {
        for xref in self.view().xrefs().iter() {
            let attributes = XrefAttributes { xref };
            if on_xref(xref.offset(), xref.operand(), xref.target_id(), attributes).is_stop() {
                return;
            }
        }
    }

    pub fn walk_xref_attributes<F>(&self, attributes: &XrefAttributes<'a>, mut on_attribute: F)
    where
        F: FnMut(&'a str, &'a str) -> Walk,
    {
        for attr in attributes.xref.attributes().iter() {
            if on_attribute(attr.key().unwrap_or(""), attr.value().unwrap_or("")).is_stop() {
                return;
            }
        }
    }

    pub fn walk_blobs<F>(&self, mut on_blob: F)
    where
        F: FnMut(Offset, &'a [u8]) -> Walk,
    {
        for blob in self.view().blobs().iter() {
            if on_blob(blob.offset(), blob.data()).is_stop() {
                return;
            }
        }
    }

    pub fn walk_comments<F>(&self, mut on_comment: F)
    where
        F: FnMut(Offset, CommentType, &'a str) -> Walk,
    {
        for comment in self.view().comments().iter() {
            let value = comment.value().unwrap_or("");
            if on_comment(comment.offset(), comment.comment_type(), value).is_stop() {
                return;
            }
        }
    }

    pub fn walk_value_views<F>(&self, mut on_view: F)
    where
        F: FnMut(Offset, Operand, &'a str) -> Walk,
    {
        for view in self.view().value_views().iter() {
            if on_view(view.offset(), view.operand(), view.value().unwrap_or("")).is_stop() {
                return;
            }
        }
    }

    pub fn walk_register_views<F>(&self, mut on_view: F)
    where
        F: FnMut(Offset, Offset, &'a str, &'a str) -> Walk,
    {
        for view in self.view().register_views().iter() {
            let name = view.register_name().unwrap_or("");
            let new_name = view.register_new_name().unwrap_or("");
            if on_view(view.offset(), view.end_offset(), name, new_name).is_stop() {
                return;
            }
        }
    }

    pub fn walk_hidden_areas<F>(&self, mut on_area: F)
    where
        F: FnMut(Offset, Offset, &'a str) -> Walk,
    {
        for area in self.view().hidden_areas().iter() {
            if on_area(area.offset(), area.area_size(), area.value().unwrap_or("")).is_stop() {
                return;
            }
        }
    }

    pub fn walk_attributes<F>(&self, mut on_attribute: F)
    where
        F: FnMut(&'a str, &'a str) -> Walk,
    {
        for attr in self.view().attributes().iter() {
            if on_attribute(attr.key().unwrap_or(""), attr.value().unwrap_or("")).is_stop() {
                return;
            }
        }
    }

    /// Replay this record into `visitor`.
    pub fn accept(&self, visitor: &mut dyn ModelVisitor) {
        visitor::accept_version(self.model, self.idx, visitor);
    }
}

impl fmt::Debug for HVersion<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HVersion")
            .field("idx", &self.idx)
            .field("id", &format_args!("{:#x}", self.id()))
            .field("type", &self.object_type())
            .finish()
    }
}

impl PartialEq for HVersion<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.model, other.model) && self.idx == other.idx
    }
}

impl Eq for HVersion<'_> {}

impl Hash for HVersion<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (self.model as *const Model as usize).hash(state);
        self.idx.hash(state);
    }
}

impl PartialOrd for HVersion<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HVersion<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        let lhs = self.model as *const Model as usize;
        let rhs = other.model as *const Model as usize;
        lhs.cmp(&rhs).then(self.idx.cmp(&other.idx))
    }
}

/// Handle on one signature of a model.
#[derive(Clone, Copy)]
pub struct HSignature<'a> {
    model: &'a Model,
    idx: SignatureIdx,
}

impl<'a> HSignature<'a> {
    pub(crate) fn new(model: &'a Model, idx: SignatureIdx) -> Self {
        Self { model, idx }
    }

    pub fn idx(&self) -> SignatureIdx {
        self.idx
    }

    pub fn method(&self) -> SignatureMethod {
        self.model.signature_entry(self.idx).method()
    }

    pub fn algo(&self) -> SignatureAlgo {
        self.model.signature_entry(self.idx).algo()
    }

    pub fn value(&self) -> &'a str {
        self.model.signature_entry(self.idx).value().unwrap_or("")
    }

    /// Record carrying this signature.
    pub fn owner(&self) -> HVersion<'a> {
        HVersion::new(self.model, self.model.signature_ctx(self.idx).version)
    }

    pub fn is_unique(&self) -> bool {
        self.model.is_unique_signature(self.value())
    }

    pub fn to_signature(&self) -> Signature {
        Signature::new(self.method(), self.algo(), self.value())
    }
}

impl fmt::Debug for HSignature<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HSignature")
            .field("idx", &self.idx)
            .field("method", &self.method())
            .field("value", &self.value())
            .finish()
    }
}
