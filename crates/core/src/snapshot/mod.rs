//! Snapshot model: an immutable, indexed view over one YADB buffer.
//!
//! A `Model` parses every record once at construction (no payload copies),
//! registers identities, signatures and cross-references with the `Index`,
//! and then serves queries and visitor replay through lightweight handles.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::format::{self, FormatError, RootView, SignatureEntry, StrRef, VersionView};
use crate::index::{Index, IndexError, SigMap, NO_XREFS};
use crate::model::{ObjectId, ObjectType, SignatureIdx, VersionIdx, Walk, ORDERED_TYPES};
use crate::source::{self, ByteSource, SourceError};

pub mod collect;
pub mod handle;
pub mod visitor;

pub use collect::RecordCollector;
pub use handle::{HSignature, HVersion, XrefAttributes};
pub use visitor::ModelVisitor;

const NO_SIGNATURE: SignatureIdx = SignatureIdx::MAX;

/// Error raised while building a model. Lookups never fail.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Invalid snapshot: {0}")]
    Format(#[from] FormatError),

    #[error("Index construction failed: {0}")]
    Index(#[from] IndexError),

    #[error(transparent)]
    Source(#[from] SourceError),
}

/// When to run full structural verification during construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerifyMode {
    /// Verify in debug builds only.
    #[default]
    Auto,
    Always,
    Never,
}

impl VerifyMode {
    pub fn enabled(self) -> bool {
        match self {
            VerifyMode::Auto => cfg!(debug_assertions),
            VerifyMode::Always => true,
            VerifyMode::Never => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ModelOptions {
    #[serde(default)]
    pub verify: VerifyMode,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct VersionCtx {
    pub(crate) id: ObjectId,
    pub(crate) idx: VersionIdx,
    pub(crate) object_type: ObjectType,
    pub(crate) pos: u32,
    pub(crate) xrefs_to_idx: u32,
    pub(crate) sig_idx: SignatureIdx,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct SignatureCtx {
    pub(crate) pos: u32,
    pub(crate) version: VersionIdx,
}

/// Immutable indexed snapshot.
///
/// Holds a shared reference on its byte source; every handle borrows the
/// model, so the bytes stay alive as long as any handle does.
#[derive(Debug)]
pub struct Model {
    source: Arc<dyn ByteSource>,
    versions: Vec<VersionCtx>,
    signatures: Vec<SignatureCtx>,
    index: Index,
}

impl Model {
    pub fn new(source: Arc<dyn ByteSource>) -> Result<Self, ModelError> {
        Self::with_options(source, &ModelOptions::default())
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, ModelError> {
        Self::new(Arc::new(bytes))
    }

    /// Map `path` and build a model over it.
    pub fn open(path: &Path, options: &ModelOptions) -> Result<Self, ModelError> {
        let source = source::load_file(path)?;
        Self::with_options(source, options)
    }

    pub fn with_options(
        source: Arc<dyn ByteSource>,
        options: &ModelOptions,
    ) -> Result<Self, ModelError> {
        let bytes = source.bytes();
        let root = RootView::new(bytes)?;
        if options.verify.enabled() {
            debug!(len = bytes.len(), "verify snapshot");
            format::verify(bytes)?;
        }

        let num_versions: usize = ORDERED_TYPES.iter().map(|ty| root.versions(*ty).len()).sum();
        if num_versions > format::MAX_RECORDS {
            return Err(FormatError::TooManyRecords {
                found: num_versions,
                limit: format::MAX_RECORDS,
            }
            .into());
        }

        let mut versions = Vec::with_capacity(num_versions);
        let mut signatures = Vec::with_capacity(num_versions);
        let mut index = Index::new();
        index.reserve(num_versions);

        debug!(num_versions, "parse versions");
        let mut sigmap = SigMap::new();
        for object_type in ORDERED_TYPES {
            for version in root.versions(object_type).iter() {
                let idx = versions.len() as VersionIdx;
                let id = version.object_id();
                index.insert_object(id, idx)?;

                for xref in version.xrefs().iter() {
                    index.insert_xref_to(idx, xref.target_id())?;
                }

                let mut sig_idx = NO_SIGNATURE;
                for signature in version.signatures().iter() {
                    let pos = signatures.len() as SignatureIdx;
                    sig_idx = sig_idx.min(pos);
                    signatures.push(SignatureCtx { pos: signature.pos() as u32, version: idx });
                    let key = signature.value_ref().unwrap_or(StrRef::EMPTY);
                    index.insert_signature(&mut sigmap, bytes, key, pos, idx)?;
                }

                versions.push(VersionCtx {
                    id,
                    idx,
                    object_type,
                    pos: version.pos() as u32,
                    xrefs_to_idx: NO_XREFS,
                    sig_idx,
                });
            }
        }

        debug!("index objects");
        index.finish_objects()?;

        debug!("index signatures");
        index.finish_signatures(sigmap)?;

        debug!("index xrefs");
        index.finish_xrefs(|to, start| {
            let target = &mut versions[to as usize];
            target.xrefs_to_idx = target.xrefs_to_idx.min(start);
        })?;

        debug!(
            versions = versions.len(),
            signatures = signatures.len(),
            unique_signatures = index.num_unique_signatures(),
            xrefs_to = index.num_xrefs_to(),
            "model ready"
        );

        Ok(Self { source, versions, signatures, index })
    }

    pub(crate) fn bytes(&self) -> &[u8] {
        self.source.bytes()
    }

    pub(crate) fn root(&self) -> RootView<'_> {
        RootView::new_unchecked(self.bytes())
    }

    pub(crate) fn ctx(&self, idx: VersionIdx) -> &VersionCtx {
        &self.versions[idx as usize]
    }

    pub(crate) fn view(&self, idx: VersionIdx) -> VersionView<'_> {
        VersionView::at(self.root(), self.ctx(idx).pos as usize)
    }

    pub(crate) fn signature_ctx(&self, idx: SignatureIdx) -> &SignatureCtx {
        &self.signatures[idx as usize]
    }

    pub(crate) fn signature_entry(&self, idx: SignatureIdx) -> SignatureEntry<'_> {
        use crate::format::Entry;
        SignatureEntry::at(self.root(), self.signature_ctx(idx).pos as usize)
    }

    pub(crate) fn index(&self) -> &Index {
        &self.index
    }

    /// Signature positions owned by record `idx`, in record order.
    pub(crate) fn signature_range(&self, idx: VersionIdx) -> std::ops::Range<SignatureIdx> {
        let first = self.ctx(idx).sig_idx;
        if first == NO_SIGNATURE {
            return 0..0;
        }
        let owned = self.signatures[first as usize..]
            .iter()
            .take_while(|sig| sig.version == idx)
            .count() as SignatureIdx;
        first..first + owned
    }

    pub fn byte_source(&self) -> &Arc<dyn ByteSource> {
        &self.source
    }

    pub fn num_objects(&self) -> usize {
        self.versions.len()
    }

    pub fn num_signatures(&self) -> usize {
        self.signatures.len()
    }

    pub fn num_unique_signatures(&self) -> usize {
        self.index.num_unique_signatures()
    }

    /// Handle for the record at local index `idx`.
    pub fn version(&self, idx: VersionIdx) -> Option<HVersion<'_>> {
        ((idx as usize) < self.versions.len()).then(|| HVersion::new(self, idx))
    }

    pub fn get_object(&self, id: ObjectId) -> Option<HVersion<'_>> {
        self.index.find_object_id(id).map(|idx| HVersion::new(self, idx))
    }

    pub fn has_object(&self, id: ObjectId) -> bool {
        self.index.find_object_id(id).is_some()
    }

    /// Visit every record in local-index order.
    pub fn walk_objects<F>(&self, mut on_version: F)
    where
        F: FnMut(ObjectId, HVersion<'_>) -> Walk,
    {
        for ctx in &self.versions {
            if on_version(ctx.id, HVersion::new(self, ctx.idx)).is_stop() {
                return;
            }
        }
    }

    pub fn num_objects_with_signature(&self, value: &str) -> usize {
        self.index.num_with_signature(self.bytes(), value.as_bytes())
    }

    pub fn is_unique_signature(&self, value: &str) -> bool {
        self.index.is_unique(self.bytes(), value.as_bytes())
    }

    /// Visit every record carrying `value`, in insertion order.
    pub fn walk_versions_with_signature<F>(&self, value: &str, mut on_version: F)
    where
        F: FnMut(HVersion<'_>) -> Walk,
    {
        self.index.walk_signature_bucket(self.bytes(), value.as_bytes(), |sig| {
            on_version(HVersion::new(self, sig.owner))
        });
    }

    /// Visit every collision-free signature together with its sole owner.
    pub fn walk_versions_without_collision<F>(&self, mut on_pair: F)
    where
        F: FnMut(HSignature<'_>, HVersion<'_>) -> Walk,
    {
        self.index.walk_all_unique_signatures(|sig| {
            on_pair(HSignature::new(self, sig.idx), HVersion::new(self, sig.owner))
        });
    }

    /// Find records of this model matching `remote`, a record of another model.
    ///
    /// For each signature of `remote`, every local record sharing that exact
    /// value is a candidate. A candidate must have exactly the same size, and
    /// unless the signature is unique in this model it must also be at least
    /// `min_size` bytes. `on_pair(candidate, remote)` returning `Walk::Stop`
    /// ends the whole search: the first accepted match wins.
    pub fn walk_matching_versions<'r, F>(&self, remote: &HVersion<'r>, min_size: u64, mut on_pair: F)
    where
        F: FnMut(HVersion<'_>, &HVersion<'r>) -> Walk,
    {
        let bytes = self.bytes();
        let remote_size = remote.size();
        let mut stopped = false;
        remote.walk_signatures(|signature| {
            let value = signature.value().as_bytes();
            let unique = self.index.is_unique(bytes, value);
            self.index.walk_signature_bucket(bytes, value, |sig| {
                let candidate = HVersion::new(self, sig.owner);
                let size = candidate.size();
                if size != remote_size || (!unique && size < min_size) {
                    return Walk::Continue;
                }
                if on_pair(candidate, remote).is_stop() {
                    stopped = true;
                    return Walk::Stop;
                }
                Walk::Continue
            });
            if stopped {
                Walk::Stop
            } else {
                Walk::Continue
            }
        });
    }

    /// Replay every record into `visitor`, bracketed by start/end.
    pub fn accept(&self, visitor: &mut dyn ModelVisitor) {
        visitor::accept_model(self, visitor);
    }
}
