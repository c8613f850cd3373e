mod common;

use snapsync_core::model::{
    CommentType, ObjectId, ObjectType, Offset, Operand, SignatureAlgo, SignatureMethod,
    VersionRecord,
};
use snapsync_core::format::{RootView, NO_STRING};
use snapsync_core::model::Walk;
use snapsync_core::snapshot::RecordCollector;
use snapsync_core::{Model, ModelVisitor};

use common::{build_model, encode, rich_function, three_functions};

/// Records the replay sequence as short event names.
#[derive(Default)]
struct EventLog {
    events: Vec<String>,
}

impl ModelVisitor for EventLog {
    fn visit_start(&mut self) {
        self.events.push("start".into());
    }
    fn visit_end(&mut self) {
        self.events.push("end".into());
    }
    fn visit_start_version(&mut self, object_type: ObjectType) {
        self.events.push(format!("version:{object_type}"));
    }
    fn visit_end_version(&mut self) {
        self.events.push("end_version".into());
    }
    fn visit_id(&mut self, _: ObjectId) {
        self.events.push("id".into());
    }
    fn visit_size(&mut self, _: Offset) {
        self.events.push("size".into());
    }
    fn visit_parent_id(&mut self, _: ObjectId) {
        self.events.push("parent".into());
    }
    fn visit_address(&mut self, _: Offset) {
        self.events.push("address".into());
    }
    fn visit_name(&mut self, _: &str, _: u32) {
        self.events.push("name".into());
    }
    fn visit_prototype(&mut self, _: &str) {
        self.events.push("prototype".into());
    }
    fn visit_flags(&mut self, _: u32) {
        self.events.push("flags".into());
    }
    fn visit_string_type(&mut self, _: u8) {
        self.events.push("string_type".into());
    }
    fn visit_start_signatures(&mut self) {
        self.events.push("signatures".into());
    }
    fn visit_signature(&mut self, _: SignatureMethod, _: SignatureAlgo, _: &str) {
        self.events.push("signature".into());
    }
    fn visit_end_signatures(&mut self) {
        self.events.push("end_signatures".into());
    }
    fn visit_header_comment(&mut self, repeatable: bool, _: &str) {
        self.events.push(format!("header_comment:{repeatable}"));
    }
    fn visit_start_offsets(&mut self) {
        self.events.push("offsets".into());
    }
    fn visit_offset_comment(&mut self, _: Offset, _: CommentType, _: &str) {
        self.events.push("comment".into());
    }
    fn visit_offset_valueview(&mut self, _: Offset, _: Operand, _: &str) {
        self.events.push("valueview".into());
    }
    fn visit_offset_registerview(&mut self, _: Offset, _: Offset, _: &str, _: &str) {
        self.events.push("registerview".into());
    }
    fn visit_offset_hiddenarea(&mut self, _: Offset, _: Offset, _: &str) {
        self.events.push("hiddenarea".into());
    }
    fn visit_end_offsets(&mut self) {
        self.events.push("end_offsets".into());
    }
    fn visit_start_xrefs(&mut self) {
        self.events.push("xrefs".into());
    }
    fn visit_start_xref(&mut self, _: Offset, _: ObjectId, _: Operand) {
        self.events.push("xref".into());
    }
    fn visit_xref_attribute(&mut self, _: &str, _: &str) {
        self.events.push("xref_attribute".into());
    }
    fn visit_end_xref(&mut self) {
        self.events.push("end_xref".into());
    }
    fn visit_end_xrefs(&mut self) {
        self.events.push("end_xrefs".into());
    }
    fn visit_attribute(&mut self, _: &str, _: &str) {
        self.events.push("attribute".into());
    }
    fn visit_blob(&mut self, _: Offset, _: &[u8]) {
        self.events.push("blob".into());
    }
}

#[test]
fn rich_record_survives_replay() {
    let original = rich_function(0x10);
    let model = build_model(vec![original.clone()]);

    let mut collector = RecordCollector::new();
    model.get_object(0x10).expect("rich function").accept(&mut collector);
    assert_eq!(collector.into_records(), vec![original]);
}

#[test]
fn whole_model_replay_rebuilds_every_record() {
    let mut records = three_functions();
    records.push(VersionRecord::new(ObjectType::Struct, 0x2).with_name("header_t", 0));
    let model = build_model(records.clone());

    let mut collector = RecordCollector::new();
    model.accept(&mut collector);
    let mut replayed = collector.into_records();

    // Replay follows kind traversal order; compare by id.
    replayed.sort_by_key(|r| r.id);
    records.sort_by_key(|r| r.id);
    assert_eq!(replayed, records);
}

#[test]
fn replay_emits_identity_before_structure() {
    let model = build_model(vec![rich_function(0x10)]);
    let mut log = EventLog::default();
    model.get_object(0x10).expect("rich function").accept(&mut log);

    let expected = [
        "version:function",
        "id",
        "size",
        "parent",
        "address",
        "name",
        "prototype",
        "flags",
        "string_type",
        "signatures",
        "signature",
        "signature",
        "end_signatures",
        "header_comment:true",
        "header_comment:false",
        "offsets",
        "comment",
        "comment",
        "valueview",
        "registerview",
        "hiddenarea",
        "end_offsets",
        "xrefs",
        "xref",
        "xref_attribute",
        "xref_attribute",
        "end_xref",
        "xref",
        "end_xref",
        "end_xrefs",
        "attribute",
        "blob",
        "end_version",
    ];
    assert_eq!(log.events, expected);
}

#[test]
fn sparse_record_skips_optional_events() {
    let model = build_model(vec![VersionRecord::new(ObjectType::Enum, 0x7)]);
    let mut log = EventLog::default();
    model.accept(&mut log);

    let expected = [
        "start",
        "version:enum",
        "id",
        "size",
        "parent",
        "address",
        "flags",
        "signatures",
        "end_signatures",
        "xrefs",
        "end_xrefs",
        "end_version",
        "end",
    ];
    assert_eq!(log.events, expected);
}

#[test]
fn empty_name_is_still_replayed() {
    let record = VersionRecord::new(ObjectType::Data, 0x9).with_name("", 0x2);
    let model = build_model(vec![record.clone()]);
    let mut collector = RecordCollector::new();
    model.accept(&mut collector);
    assert_eq!(collector.records(), &[record]);
}

/// Strings missing from the table show up as `""` through the handle walkers
/// and through replay alike, so both enumerate the same entries.
#[test]
fn absent_strings_read_as_empty_everywhere() {
    let mut bytes = encode(vec![rich_function(0x10)]);
    let patches: Vec<usize> = {
        let root = RootView::new(&bytes).expect("root");
        let version = root.versions(ObjectType::Function).get(0).expect("function");
        let xref = version.xrefs().get(0).expect("xref");
        vec![
            version.comments().get(0).expect("comment").pos() + 12,
            version.register_views().get(0).expect("register view").pos() + 16,
            version.hidden_areas().get(0).expect("hidden area").pos() + 16,
            version.attributes().get(0).expect("attribute").pos(),
            xref.attributes().get(0).expect("xref attribute").pos() + 4,
        ]
    };
    for pos in patches {
        bytes[pos..pos + 4].copy_from_slice(&NO_STRING.to_le_bytes());
    }

    let model = Model::from_bytes(bytes).expect("model");
    let version = model.get_object(0x10).expect("record");
    let mut collector = RecordCollector::new();
    version.accept(&mut collector);
    let replayed = collector.into_records().pop().expect("replayed record");

    let mut comments = Vec::new();
    version.walk_comments(|offset, comment_type, value| {
        comments.push((offset, comment_type, value.to_string()));
        Walk::Continue
    });
    let expected: Vec<_> =
        replayed.comments.iter().map(|c| (c.offset, c.comment_type, c.value.clone())).collect();
    assert_eq!(comments, expected);
    assert_eq!(comments[0].2, "");

    let mut registers = Vec::new();
    version.walk_register_views(|offset, end, name, new_name| {
        registers.push((offset, end, name.to_string(), new_name.to_string()));
        Walk::Continue
    });
    assert_eq!(registers, vec![(0x8, 0x30, String::new(), "buf".to_string())]);
    assert_eq!(replayed.register_views[0].name, "");

    let mut areas = Vec::new();
    version.walk_hidden_areas(|offset, size, value| {
        areas.push((offset, size, value.to_string()));
        Walk::Continue
    });
    assert_eq!(areas, vec![(0x40, 0x20, String::new())]);
    assert_eq!(replayed.hidden_areas.len(), 1);

    let mut attributes = Vec::new();
    version.walk_attributes(|key, value| {
        attributes.push((key.to_string(), value.to_string()));
        Walk::Continue
    });
    assert_eq!(attributes, vec![(String::new(), "0xff00ff".to_string())]);
    assert_eq!(replayed.attributes[0].key, "");

    let mut xref_attributes = Vec::new();
    version.walk_xrefs(|_, _, _, attrs| {
        version.walk_xref_attributes(&attrs, |key, value| {
            xref_attributes.push((key.to_string(), value.to_string()));
            Walk::Continue
        });
        Walk::Stop
    });
    assert_eq!(
        xref_attributes,
        vec![("kind".to_string(), String::new()), ("thunk".to_string(), "no".to_string())]
    );
    assert_eq!(replayed.xrefs[0].attributes.len(), 2);
}
