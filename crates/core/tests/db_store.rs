mod common;

use chrono::Utc;
use rusqlite::Connection;
use tempfile::tempdir;

use snapsync_core::db::{
    delete_from_model, DbError, DbVisitor, MetadataDb, SyncRunRecord, CURRENT_SCHEMA_VERSION,
};
use snapsync_core::model::{ObjectType, VersionRecord};

use common::{build_model, function, rich_function, three_functions, FUNC_A, FUNC_B};

#[test]
fn upsert_and_load_round_trip() {
    let db = MetadataDb::open_in_memory().expect("open db");
    let record = rich_function(0x10);
    db.upsert_version(&record).expect("upsert");

    assert_eq!(db.load_version(0x10).expect("load"), Some(record.clone()));
    assert_eq!(db.load_version(0x11).expect("load missing"), None);
    assert_eq!(db.count_objects().expect("count"), 1);

    // Upserting again replaces children instead of appending.
    let mut changed = record;
    changed.signatures.truncate(1);
    changed.comments.clear();
    db.upsert_version(&changed).expect("upsert again");
    assert_eq!(db.load_version(0x10).expect("load"), Some(changed));
    assert_eq!(db.count_objects().expect("count"), 1);
}

#[test]
fn high_ids_and_addresses_survive_storage() {
    let db = MetadataDb::open_in_memory().expect("open db");
    let record = function(u64::MAX - 1, 0xffff_ffff_8000_0000, 0x10, "deadbeef");
    db.upsert_version(&record).expect("upsert");
    assert_eq!(db.load_version(u64::MAX - 1).expect("load"), Some(record));
}

fn code(id: u64, address: u64) -> VersionRecord {
    VersionRecord::new(ObjectType::Code, id).with_address(address).with_size(0x10)
}

/// Ranges across 2^63 or running into `u64::MAX` find every stored address.
#[test]
fn range_queries_cross_the_sign_boundary() {
    let db = MetadataDb::open_in_memory().expect("open db");
    let below = 0x7fff_ffff_ffff_fff0;
    let above = 0x8000_0000_0000_0008;
    for record in [code(1, 0x10), code(2, below), code(3, above), code(4, u64::MAX)] {
        db.upsert_version(&record).expect("upsert");
    }

    assert_eq!(db.find_in_range(ObjectType::Code, below, 0x20).expect("range"), vec![2, 3]);
    assert_eq!(db.find_in_range(ObjectType::Code, above, u64::MAX).expect("range"), vec![3, 4]);
    assert_eq!(db.find_in_range(ObjectType::Code, u64::MAX, 0).expect("range"), vec![4]);
    assert_eq!(db.find_in_range(ObjectType::Code, 0, u64::MAX).expect("range"), vec![1, 2, 3]);
    assert!(db.find_in_range(ObjectType::Data, 0, u64::MAX).expect("range").is_empty());

    let model = build_model(vec![code(3, above), code(4, u64::MAX)]);
    let report = delete_from_model(&db, &model).expect("delete");
    assert_eq!(report.deleted, vec![3, 4]);
    assert_eq!(report.missing, 0);
}

#[test]
fn visitor_materializes_a_whole_model() {
    let mut records = three_functions();
    records.push(rich_function(0x10));
    let model = build_model(records.clone());

    let db = MetadataDb::open_in_memory().expect("open db");
    let mut visitor = DbVisitor::new(&db);
    model.accept(&mut visitor);
    assert_eq!(visitor.finish().expect("import"), 4);

    for record in records {
        assert_eq!(db.load_version(record.id).expect("load"), Some(record));
    }
}

#[test]
fn delete_dispatches_on_kind() {
    let db = MetadataDb::open_in_memory().expect("open db");
    let stored = vec![
        VersionRecord::new(ObjectType::Struct, 0x1).with_name("ctx_t", 0),
        VersionRecord::new(ObjectType::Enum, 0x2).with_name("mode_e", 0),
        function(FUNC_A, 0x1000, 0x40, "deadbeef"),
        VersionRecord::new(ObjectType::Data, 0x3).with_address(0x8000).with_size(4),
        VersionRecord::new(ObjectType::Code, 0x4).with_address(0x3004).with_size(2),
        VersionRecord::new(ObjectType::BasicBlock, 0x5).with_address(0x3100).with_size(8),
        VersionRecord::new(ObjectType::Segment, 0x6).with_address(0x0).with_size(0x10000),
    ];
    for record in &stored {
        db.upsert_version(record).expect("upsert");
    }

    // Ids differ from the stored ones: deletion goes by name or address.
    let target = build_model(vec![
        VersionRecord::new(ObjectType::Struct, 0x101).with_name("ctx_t", 0),
        VersionRecord::new(ObjectType::Enum, 0x102).with_name("gone_e", 0),
        function(0x103, 0x1000, 0x40, "ffff"),
        VersionRecord::new(ObjectType::Data, 0x104).with_address(0x8000),
        VersionRecord::new(ObjectType::Code, 0x105).with_address(0x3000).with_size(0x10),
        VersionRecord::new(ObjectType::BasicBlock, 0x106).with_address(0x3200).with_size(8),
        VersionRecord::new(ObjectType::Segment, 0x107).with_address(0x0).with_size(0x10000),
    ]);

    let mut report = delete_from_model(&db, &target).expect("delete");
    report.deleted.sort_unstable();
    assert_eq!(report.deleted, vec![0x1, 0x3, 0x4, FUNC_A]);
    assert_eq!(report.missing, 2);
    assert_eq!(report.skipped, 1);

    assert!(db.load_version(0x2).expect("load").is_some());
    assert!(db.load_version(0x5).expect("load").is_some());
    assert!(db.load_version(0x6).expect("load").is_some());
    assert_eq!(db.count_objects().expect("count"), 3);
}

#[test]
fn deleting_removes_child_rows() {
    let db = MetadataDb::open_in_memory().expect("open db");
    db.upsert_version(&rich_function(0x10)).expect("upsert");
    assert!(db.delete_object(0x10).expect("delete"));
    assert!(!db.delete_object(0x10).expect("delete again"));

    let leftover: i64 = db
        .connection()
        .query_row("SELECT COUNT(*) FROM xref_attributes", [], |row| row.get(0))
        .expect("count attributes");
    assert_eq!(leftover, 0);
}

#[test]
fn sync_runs_insert_and_list() {
    let dir = tempdir().expect("tempdir");
    let db_path = dir.path().join("meta.db");
    let db = MetadataDb::open(&db_path).expect("open db");

    let started = Utc::now().to_rfc3339();
    let run_a = SyncRunRecord {
        snapshot: "a.yadb".into(),
        snapshot_hash: Some("abc123".into()),
        reference: None,
        reference_hash: None,
        objects: 3,
        status: "succeeded".into(),
        started_at: started.clone(),
        finished_at: Utc::now().to_rfc3339(),
    };
    let run_b = SyncRunRecord {
        snapshot: "b.yadb".into(),
        snapshot_hash: None,
        reference: Some("ref.yadb".into()),
        reference_hash: Some("def456".into()),
        ..run_a.clone()
    };
    db.insert_sync_run(&run_a).expect("insert a");
    db.insert_sync_run(&run_b).expect("insert b");

    assert_eq!(db.list_sync_runs(None).expect("list"), vec![run_a.clone(), run_b]);
    assert_eq!(db.list_sync_runs(Some("a.yadb")).expect("filter"), vec![run_a]);
    assert!(db.list_sync_runs(Some("zzz")).expect("filter").is_empty());

    // Reopening keeps data and schema.
    drop(db);
    let db = MetadataDb::open(&db_path).expect("reopen");
    assert_eq!(db.schema_version().expect("version"), CURRENT_SCHEMA_VERSION);
    assert_eq!(db.list_sync_runs(None).expect("list").len(), 2);
}

#[test]
fn v1_schema_is_migrated_to_current() {
    let dir = tempdir().expect("tempdir");
    let db_path = dir.path().join("meta.db");
    {
        let db = MetadataDb::open(&db_path).expect("create");
        db.connection()
            .execute_batch("DROP TABLE sync_runs; PRAGMA user_version = 1;")
            .expect("downgrade");
    }
    let db = MetadataDb::open(&db_path).expect("migrate");
    assert_eq!(db.schema_version().expect("version"), CURRENT_SCHEMA_VERSION);
    assert!(db.list_sync_runs(None).expect("list").is_empty());
}

/// Runs recorded before the reference columns existed survive the upgrade.
#[test]
fn v2_sync_runs_gain_reference_columns() {
    let dir = tempdir().expect("tempdir");
    let db_path = dir.path().join("meta.db");
    {
        let db = MetadataDb::open(&db_path).expect("create");
        db.connection()
            .execute_batch(
                r#"
                DROP TABLE sync_runs;
                CREATE TABLE sync_runs (
                    id            INTEGER PRIMARY KEY AUTOINCREMENT,
                    snapshot      TEXT NOT NULL,
                    snapshot_hash TEXT,
                    objects       INTEGER NOT NULL,
                    status        TEXT NOT NULL,
                    started_at    TEXT NOT NULL,
                    finished_at   TEXT NOT NULL
                );
                INSERT INTO sync_runs (snapshot, snapshot_hash, objects, status, started_at, finished_at)
                VALUES ('old.yadb', NULL, 5, 'succeeded', 't0', 't1');
                PRAGMA user_version = 2;
                "#,
            )
            .expect("downgrade");
    }

    let db = MetadataDb::open(&db_path).expect("migrate");
    assert_eq!(db.schema_version().expect("version"), CURRENT_SCHEMA_VERSION);
    let runs = db.list_sync_runs(None).expect("list");
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].snapshot, "old.yadb");
    assert_eq!(runs[0].objects, 5);
    assert_eq!(runs[0].reference, None);
    assert_eq!(runs[0].reference_hash, None);
}

#[test]
fn newer_schema_is_rejected() {
    let dir = tempdir().expect("tempdir");
    let db_path = dir.path().join("meta.db");
    {
        let conn = Connection::open(&db_path).expect("open raw");
        conn.execute_batch("PRAGMA user_version = 99;").expect("set version");
    }
    let err = MetadataDb::open(&db_path).expect_err("newer schema");
    assert!(matches!(err, DbError::UnsupportedSchemaVersion { found: 99, .. }));
}

#[test]
fn visitor_reports_first_sql_error() {
    let model = build_model(vec![function(FUNC_B, 0x2000, 0x40, "deadbeef")]);
    let db = MetadataDb::open_in_memory().expect("open db");
    db.connection().execute_batch("DROP TABLE signatures;").expect("drop table");

    let mut visitor = DbVisitor::new(&db);
    model.accept(&mut visitor);
    assert_eq!(visitor.written(), 0);
    assert!(matches!(visitor.finish(), Err(DbError::Sql(_))));
}
