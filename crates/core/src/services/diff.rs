//! Cross-snapshot correlation: signature matches, anchors and propagation of
//! matched reference records into a consumer.

use std::collections::{HashSet, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::model::{ObjectId, ObjectType, Signature, Walk};
use crate::snapshot::{HVersion, Model, ModelVisitor};

/// A record of the new snapshot matched to a record of the reference snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Relation {
    pub reference_id: ObjectId,
    pub new_id: ObjectId,
    pub object_type: ObjectType,
}

/// A collision-free signature and the only record carrying it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Anchor {
    pub signature: Signature,
    pub id: ObjectId,
    pub object_type: ObjectType,
}

/// Outcome of `propagate`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropagateReport {
    /// Matched reference records replayed.
    pub matched: usize,
    /// Child records reached through cross-references and replayed.
    pub children: usize,
    /// Records referencing an exported record, transitively, and replayed.
    pub parents: usize,
    /// Relations whose reference id is not in the reference model.
    pub missing: usize,
}

/// Match every signed record of `new` against `reference`.
///
/// For each record the first accepted candidate of the same kind wins; a
/// candidate of another kind is skipped and the search goes on.
pub fn find_matches(reference: &Model, new: &Model, min_size: u64) -> Vec<Relation> {
    let mut relations = Vec::new();
    new.walk_objects(|_, version| {
        if !version.has_signature() {
            return Walk::Continue;
        }
        reference.walk_matching_versions(&version, min_size, |candidate, remote| {
            if candidate.object_type() != remote.object_type() {
                return Walk::Continue;
            }
            relations.push(Relation {
                reference_id: candidate.id(),
                new_id: remote.id(),
                object_type: remote.object_type(),
            });
            Walk::Stop
        });
        Walk::Continue
    });
    info!(
        reference_objects = reference.num_objects(),
        new_objects = new.num_objects(),
        relations = relations.len(),
        min_size,
        "signature matching done"
    );
    relations
}

/// List every collision-free signature with its owner, in signature order.
pub fn anchors(model: &Model) -> Vec<Anchor> {
    let mut out = Vec::with_capacity(model.num_unique_signatures());
    model.walk_versions_without_collision(|signature, version| {
        out.push(Anchor {
            signature: signature.to_signature(),
            id: version.id(),
            object_type: version.object_type(),
        });
        Walk::Continue
    });
    out
}

/// Replay matched reference records into `visitor`, then every record
/// reachable from them through outgoing cross-references whose kind is
/// exported as a child, then every record that references an exported record,
/// transitively. Each record is replayed at most once.
pub fn propagate(
    reference: &Model,
    relations: &[Relation],
    visitor: &mut dyn ModelVisitor,
) -> PropagateReport {
    let mut report = PropagateReport::default();
    let mut seen: HashSet<ObjectId> = HashSet::new();
    let mut exported: Vec<HVersion<'_>> = Vec::new();

    visitor.visit_start();
    for relation in relations {
        let Some(version) = reference.get_object(relation.reference_id) else {
            debug!(id = relation.reference_id, "relation target missing from reference");
            report.missing += 1;
            continue;
        };
        if !seen.insert(version.id()) {
            continue;
        }
        version.accept(visitor);
        report.matched += 1;
        exported.push(version);
    }

    let mut queue: VecDeque<HVersion<'_>> = exported.iter().copied().collect();
    while let Some(version) = queue.pop_front() {
        version.walk_xrefs_from(|_, _, child| {
            if !child.object_type().is_exported_as_child() || !seen.insert(child.id()) {
                return Walk::Continue;
            }
            child.accept(visitor);
            report.children += 1;
            exported.push(child);
            queue.push_back(child);
            Walk::Continue
        });
    }

    let mut queue: VecDeque<HVersion<'_>> = exported.into_iter().collect();
    while let Some(version) = queue.pop_front() {
        version.walk_xrefs_to(|parent| {
            if !seen.insert(parent.id()) {
                return Walk::Continue;
            }
            parent.accept(visitor);
            report.parents += 1;
            queue.push_back(parent);
            Walk::Continue
        });
    }
    visitor.visit_end();

    debug!(
        matched = report.matched,
        children = report.children,
        parents = report.parents,
        "propagation done"
    );
    report
}
