mod common;

use snapsync_core::model::{ObjectType, VersionRecord};
use snapsync_core::services::{anchors, find_matches, propagate, Relation};
use snapsync_core::snapshot::RecordCollector;

use common::{build_model, full_sig, function, three_functions, FUNC_A, FUNC_C};

#[test]
fn matches_pair_records_of_the_same_kind() {
    let reference = build_model(three_functions());
    let new = build_model(vec![
        function(0x1, 0x7000, 0x80, "cafebabe"),
        // Same signature and size as C, but a data record.
        VersionRecord::new(ObjectType::Data, 0x2).with_size(0x80).with_signature(full_sig("cafebabe")),
        // Unsigned records are never matched.
        VersionRecord::new(ObjectType::Function, 0x3).with_size(0x80),
    ]);

    let relations = find_matches(&reference, &new, 0);
    assert_eq!(
        relations,
        vec![Relation { reference_id: FUNC_C, new_id: 0x1, object_type: ObjectType::Function }]
    );
}

#[test]
fn first_candidate_wins_for_colliding_signatures() {
    let reference = build_model(three_functions());
    let new = build_model(vec![function(0x1, 0x7000, 0x40, "deadbeef")]);

    let relations = find_matches(&reference, &new, 0);
    assert_eq!(relations.len(), 1);
    assert_eq!(relations[0].reference_id, FUNC_A);

    assert!(find_matches(&reference, &new, 0x100).is_empty());
}

#[test]
fn anchors_list_collision_free_signatures() {
    let model = build_model(three_functions());
    let anchors = anchors(&model);
    assert_eq!(anchors.len(), 1);
    assert_eq!(anchors[0].id, FUNC_C);
    assert_eq!(anchors[0].signature.value, "cafebabe");
    assert_eq!(anchors[0].object_type, ObjectType::Function);
}

#[test]
fn propagation_follows_child_kinds_once() {
    // func -> struct -> member, func -> other function (not a child kind),
    // and a second func also pointing at the struct.
    let reference = build_model(vec![
        function(0x10, 0x1000, 0x40, "aaaa").with_xref(0x4, 0, 0x20).with_xref(0x8, 0, 0x11),
        function(0x11, 0x2000, 0x40, "bbbb").with_xref(0x4, 0, 0x20),
        VersionRecord::new(ObjectType::Struct, 0x20).with_name("ctx_t", 0).with_xref(0, 0, 0x21),
        VersionRecord::new(ObjectType::StructMember, 0x21).with_parent(0x20).with_name("len", 0),
        VersionRecord::new(ObjectType::Enum, 0x30).with_name("unused_e", 0),
    ]);
    let relations = vec![
        Relation { reference_id: 0x10, new_id: 0x90, object_type: ObjectType::Function },
        Relation { reference_id: 0x11, new_id: 0x91, object_type: ObjectType::Function },
        Relation { reference_id: 0x10, new_id: 0x92, object_type: ObjectType::Function },
        Relation { reference_id: 0x77, new_id: 0x93, object_type: ObjectType::Function },
    ];

    let mut collector = RecordCollector::new();
    let report = propagate(&reference, &relations, &mut collector);
    assert_eq!(report.matched, 2);
    assert_eq!(report.children, 2);
    assert_eq!(report.parents, 0);
    assert_eq!(report.missing, 1);

    let ids: Vec<u64> = collector.records().iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![0x10, 0x11, 0x20, 0x21]);
}

/// Records referencing an exported record are replayed too, transitively,
/// whatever their kind.
#[test]
fn propagation_walks_up_to_referencing_records() {
    let reference = build_model(vec![
        function(0x10, 0x1000, 0x40, "aaaa"),
        VersionRecord::new(ObjectType::Struct, 0x20).with_name("vtable_t", 0).with_xref(0, 0, 0x10),
        VersionRecord::new(ObjectType::Data, 0x40).with_address(0x9000).with_xref(0, 0, 0x20),
        VersionRecord::new(ObjectType::Data, 0x41).with_address(0x9100),
    ]);
    let relations =
        vec![Relation { reference_id: 0x10, new_id: 0x90, object_type: ObjectType::Function }];

    let mut collector = RecordCollector::new();
    let report = propagate(&reference, &relations, &mut collector);
    assert_eq!(report.matched, 1);
    assert_eq!(report.children, 0);
    assert_eq!(report.parents, 2);

    let ids: Vec<u64> = collector.records().iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![0x10, 0x20, 0x40]);
}
