#![allow(dead_code)]

use snapsync_core::format::SnapshotWriter;
use snapsync_core::model::{
    Attribute, BlobRecord, CommentType, HiddenArea, ObjectId, ObjectType, OffsetComment,
    RegisterView, Signature, SignatureAlgo, SignatureMethod, ValueView, VersionRecord,
    XrefRecord,
};
use snapsync_core::Model;

pub const FUNC_A: ObjectId = 0xA0;
pub const FUNC_B: ObjectId = 0xB0;
pub const FUNC_C: ObjectId = 0xC0;

/// Encode `records` and build a model over the buffer.
pub fn build_model(records: Vec<VersionRecord>) -> Model {
    Model::from_bytes(encode(records)).expect("build model")
}

pub fn encode(records: Vec<VersionRecord>) -> Vec<u8> {
    let mut writer = SnapshotWriter::new();
    writer.extend(records);
    writer.finish().expect("encode snapshot")
}

pub fn full_sig(value: &str) -> Signature {
    Signature::new(SignatureMethod::Full, SignatureAlgo::Crc32, value)
}

pub fn function(id: ObjectId, address: u64, size: u64, sig: &str) -> VersionRecord {
    VersionRecord::new(ObjectType::Function, id)
        .with_address(address)
        .with_size(size)
        .with_name(format!("sub_{address:x}"), 1)
        .with_signature(full_sig(sig))
}

/// Three functions: A and B share "deadbeef" and have the same size, C alone
/// carries "cafebabe".
pub fn three_functions() -> Vec<VersionRecord> {
    vec![
        function(FUNC_A, 0x1000, 0x40, "deadbeef"),
        function(FUNC_B, 0x2000, 0x40, "deadbeef"),
        function(FUNC_C, 0x3000, 0x80, "cafebabe"),
    ]
}

/// A function record with every optional field populated.
pub fn rich_function(id: ObjectId) -> VersionRecord {
    let mut record = VersionRecord::new(ObjectType::Function, id)
        .with_address(0x401000)
        .with_size(0x120)
        .with_parent(0x1)
        .with_name("parse_header", 0x5)
        .with_signature(full_sig("0badf00d"))
        .with_signature(Signature::new(SignatureMethod::OpCode, SignatureAlgo::Md5, "9e107d9d"));
    record.prototype = Some("int __cdecl parse_header(char *buf)".to_string());
    record.flags = 0x400;
    record.string_type = Some(3);
    record.header_comment_repeatable = Some("entry point of the parser".to_string());
    record.header_comment_nonrepeatable = Some("checked".to_string());
    record.comments = vec![
        OffsetComment { offset: 0x4, comment_type: CommentType::Repeatable, value: "save rbp".into() },
        OffsetComment { offset: 0x10, comment_type: CommentType::Anterior, value: "loop".into() },
    ];
    record.value_views = vec![ValueView { offset: 0x8, operand: 1, value: "hex".into() }];
    record.register_views = vec![RegisterView {
        offset: 0x8,
        end_offset: 0x30,
        name: "rdi".into(),
        new_name: "buf".into(),
    }];
    record.hidden_areas = vec![HiddenArea { offset: 0x40, area_size: 0x20, value: "tail".into() }];
    record.xrefs = vec![
        XrefRecord {
            offset: 0x14,
            operand: 0,
            id: 0x2,
            attributes: vec![Attribute::new("kind", "call"), Attribute::new("thunk", "no")],
        },
        XrefRecord { offset: 0x20, operand: 1, id: 0xdead, attributes: Vec::new() },
    ];
    record.attributes = vec![Attribute::new("color", "0xff00ff")];
    record.blobs = vec![BlobRecord { offset: 0x0, data: vec![0x55, 0x48, 0x89, 0xe5] }];
    record
}
