//! Query index over the records of one model.
//!
//! The index is built in two phases. During insertion, entries are appended in
//! whatever order the snapshot is traversed (grouped by record kind). Each
//! `finish_*` call then sorts or buckets its entries once and seals that part
//! of the index; inserting after sealing is an error and querying before
//! sealing is a programming error caught by debug assertions.
//!
//! Signature keys are byte ranges into the snapshot buffer, so queries take
//! that buffer as an argument instead of the index owning copies of the keys.

use std::collections::HashMap;

use thiserror::Error;

use crate::format::StrRef;
use crate::model::{ObjectId, SignatureIdx, VersionIdx, Walk};

/// Marker for a record nobody cross-references.
pub const NO_XREFS: u32 = u32::MAX;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IndexError {
    #[error("The {0} index is already finished")]
    Sealed(&'static str),

    #[error("Duplicate object id {0:#x}")]
    DuplicateObject(ObjectId),
}

/// One signature occurrence: the key bytes, the signature's local index and
/// the record carrying it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sig {
    pub key: StrRef,
    pub idx: SignatureIdx,
    pub owner: VersionIdx,
}

/// First occurrence of each owner in a bucket. A record's signatures are
/// inserted together, so repeated owners are always adjacent.
fn owner_runs(bucket: &[Sig]) -> impl Iterator<Item = &Sig> {
    bucket
        .iter()
        .enumerate()
        .filter(move |(pos, sig)| *pos == 0 || bucket[pos - 1].owner != sig.owner)
        .map(|(_, sig)| sig)
}

/// Per-value bucket accumulator used while inserting signatures.
///
/// Borrows the snapshot bytes for the duration of model construction only.
#[derive(Debug, Default)]
pub struct SigMap<'b> {
    buckets: HashMap<&'b [u8], Vec<Sig>>,
}

impl SigMap<'_> {
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Copy)]
struct ObjectEntry {
    id: ObjectId,
    idx: VersionIdx,
}

#[derive(Debug, Clone, Copy)]
struct PendingXref {
    from: VersionIdx,
    to: ObjectId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct XrefTo {
    to: VersionIdx,
    from: VersionIdx,
}

#[derive(Debug, Default)]
struct Sealed {
    objects: bool,
    signatures: bool,
    xrefs: bool,
}

#[derive(Debug, Default)]
pub struct Index {
    objects: Vec<ObjectEntry>,
    sigs: Vec<Sig>,
    unique_sigs: Vec<u32>,
    pending_xrefs: Vec<PendingXref>,
    xrefs_to: Vec<XrefTo>,
    sealed: Sealed,
}

impl Index {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reserve(&mut self, num_versions: usize) {
        self.objects.reserve(num_versions);
        self.sigs.reserve(num_versions);
    }

    pub fn insert_object(&mut self, id: ObjectId, idx: VersionIdx) -> Result<(), IndexError> {
        if self.sealed.objects {
            return Err(IndexError::Sealed("object"));
        }
        self.objects.push(ObjectEntry { id, idx });
        Ok(())
    }

    /// Sort the object table. Object ids must be unique.
    pub fn finish_objects(&mut self) -> Result<(), IndexError> {
        if self.sealed.objects {
            return Err(IndexError::Sealed("object"));
        }
        self.objects.sort_unstable_by_key(|entry| entry.id);
        if let Some(dup) = self.objects.windows(2).find(|w| w[0].id == w[1].id) {
            return Err(IndexError::DuplicateObject(dup[0].id));
        }
        self.sealed.objects = true;
        Ok(())
    }

    pub fn find_object_id(&self, id: ObjectId) -> Option<VersionIdx> {
        debug_assert!(self.sealed.objects, "object index queried before finish_objects");
        self.objects
            .binary_search_by_key(&id, |entry| entry.id)
            .ok()
            .map(|pos| self.objects[pos].idx)
    }

    /// Signatures of one record must be inserted back to back.
    pub fn insert_signature<'b>(
        &mut self,
        sigmap: &mut SigMap<'b>,
        bytes: &'b [u8],
        key: StrRef,
        idx: SignatureIdx,
        owner: VersionIdx,
    ) -> Result<(), IndexError> {
        if self.sealed.signatures {
            return Err(IndexError::Sealed("signature"));
        }
        sigmap.buckets.entry(key.resolve(bytes)).or_default().push(Sig { key, idx, owner });
        Ok(())
    }

    /// Flatten buckets in key order and compute the unique set.
    ///
    /// Uniqueness is only known once every signature has been inserted, so it
    /// is computed here in one pass rather than maintained incrementally. A
    /// value is unique when a single record owns every occurrence of it.
    pub fn finish_signatures(&mut self, sigmap: SigMap<'_>) -> Result<(), IndexError> {
        if self.sealed.signatures {
            return Err(IndexError::Sealed("signature"));
        }
        let mut buckets: Vec<(&[u8], Vec<Sig>)> = sigmap.buckets.into_iter().collect();
        buckets.sort_unstable_by(|a, b| a.0.cmp(b.0));
        for (_, bucket) in buckets {
            if owner_runs(&bucket).count() == 1 {
                self.unique_sigs.push(self.sigs.len() as u32);
            }
            self.sigs.extend(bucket);
        }
        self.sealed.signatures = true;
        Ok(())
    }

    /// Every occurrence of `value`, in insertion order, repeated owners
    /// included.
    pub fn signature_bucket(&self, bytes: &[u8], value: &[u8]) -> &[Sig] {
        debug_assert!(self.sealed.signatures, "signature index queried before finish_signatures");
        let lo = self.sigs.partition_point(|sig| sig.key.resolve(bytes) < value);
        let len = self.sigs[lo..].partition_point(|sig| sig.key.resolve(bytes) == value);
        &self.sigs[lo..lo + len]
    }

    pub fn is_unique(&self, bytes: &[u8], value: &[u8]) -> bool {
        self.num_with_signature(bytes, value) == 1
    }

    /// Number of distinct records carrying `value`.
    pub fn num_with_signature(&self, bytes: &[u8], value: &[u8]) -> usize {
        owner_runs(self.signature_bucket(bytes, value)).count()
    }

    /// Visit the first occurrence of `value` in each record carrying it.
    pub fn walk_signature_bucket<F>(&self, bytes: &[u8], value: &[u8], mut on_sig: F)
    where
        F: FnMut(Sig) -> Walk,
    {
        for sig in owner_runs(self.signature_bucket(bytes, value)) {
            if on_sig(*sig).is_stop() {
                return;
            }
        }
    }

    /// Every signature value carried by exactly one record.
    pub fn walk_all_unique_signatures<F>(&self, mut on_sig: F)
    where
        F: FnMut(Sig) -> Walk,
    {
        debug_assert!(self.sealed.signatures, "signature index queried before finish_signatures");
        for &pos in &self.unique_sigs {
            if on_sig(self.sigs[pos as usize]).is_stop() {
                return;
            }
        }
    }

    pub fn insert_xref_to(&mut self, from: VersionIdx, to: ObjectId) -> Result<(), IndexError> {
        if self.sealed.xrefs {
            return Err(IndexError::Sealed("xref"));
        }
        self.pending_xrefs.push(PendingXref { from, to });
        Ok(())
    }

    /// Resolve pending edges through the object index and group them by target.
    ///
    /// `on_group(target, start)` is called once per referenced record with the
    /// position of its first incoming edge. Targets missing from this model
    /// are dropped.
    pub fn finish_xrefs<F>(&mut self, mut on_group: F) -> Result<(), IndexError>
    where
        F: FnMut(VersionIdx, u32),
    {
        if self.sealed.xrefs {
            return Err(IndexError::Sealed("xref"));
        }
        let pending = std::mem::take(&mut self.pending_xrefs);
        let mut xrefs_to = Vec::with_capacity(pending.len());
        for edge in pending {
            if let Some(to) = self.find_object_id(edge.to) {
                xrefs_to.push(XrefTo { to, from: edge.from });
            }
        }
        xrefs_to.sort_unstable();
        xrefs_to.dedup();
        for (pos, edge) in xrefs_to.iter().enumerate() {
            if pos == 0 || xrefs_to[pos - 1].to != edge.to {
                on_group(edge.to, pos as u32);
            }
        }
        self.xrefs_to = xrefs_to;
        self.sealed.xrefs = true;
        Ok(())
    }

    /// Records referencing `to`, starting at the group offset reported by `finish_xrefs`.
    pub fn walk_xrefs_to<F>(&self, to: VersionIdx, start: u32, mut on_from: F)
    where
        F: FnMut(VersionIdx) -> Walk,
    {
        debug_assert!(self.sealed.xrefs, "xref index queried before finish_xrefs");
        if start == NO_XREFS {
            return;
        }
        let edges = self.xrefs_to.get(start as usize..).unwrap_or(&[]);
        for edge in edges.iter().take_while(|edge| edge.to == to) {
            if on_from(edge.from).is_stop() {
                return;
            }
        }
    }

    pub fn num_objects(&self) -> usize {
        self.objects.len()
    }

    pub fn num_signatures(&self) -> usize {
        self.sigs.len()
    }

    pub fn num_unique_signatures(&self) -> usize {
        self.unique_sigs.len()
    }

    pub fn num_xrefs_to(&self) -> usize {
        self.xrefs_to.len()
    }
}
