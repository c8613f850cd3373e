use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension, Transaction};
use thiserror::Error;

use crate::db::SyncRunRecord;
use crate::model::{
    Attribute, BlobRecord, CommentType, HiddenArea, NameRecord, ObjectId, ObjectType, Offset,
    OffsetComment, RegisterView, Signature, SignatureAlgo, SignatureMethod, ValueView,
    VersionRecord, XrefRecord,
};

/// Minimum schema version we know how to handle.
///
/// `0` means "no schema yet" (fresh DB).
const MIN_SUPPORTED_SCHEMA_VERSION: i32 = 0;

/// Latest schema version this crate knows about.
pub const CURRENT_SCHEMA_VERSION: i32 = 3;

/// Error type for metadata database operations.
#[derive(Debug, Error)]
pub enum DbError {
    /// Underlying SQLite error.
    #[error("SQLite error: {0}")]
    Sql(#[from] rusqlite::Error),

    /// The database was created with a newer schema version than we support.
    #[error(
        "Unsupported schema version {found}; supported range is {min_supported}..={max_supported}"
    )]
    UnsupportedSchemaVersion { found: i32, min_supported: i32, max_supported: i32 },

    /// A stored object kind could not be decoded.
    #[error("Corrupt object {id}: {reason}")]
    Corrupt { id: ObjectId, reason: String },
}

/// Convenience result type for DB operations.
pub type DbResult<T> = Result<T, DbError>;

/// SQLite-backed metadata store, the materialized side of a sync.
///
/// Object ids and addresses are 64-bit unsigned values stored bit-for-bit in
/// SQLite's signed INTEGER columns.
#[derive(Debug)]
pub struct MetadataDb {
    conn: Connection,
}

impl MetadataDb {
    /// Open (or create) a metadata database at the given path and ensure the schema exists.
    pub fn open(path: &Path) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        apply_migrations(&conn)?;
        Ok(Self { conn })
    }

    /// Open a throwaway in-memory database.
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        apply_migrations(&conn)?;
        Ok(Self { conn })
    }

    /// Expose a reference to the underlying connection for advanced callers.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn schema_version(&self) -> DbResult<i32> {
        current_schema_version(&self.conn)
    }

    /// Insert or replace a whole record, children included.
    pub fn upsert_version(&self, record: &VersionRecord) -> DbResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        delete_children(&tx, record.id)?;
        tx.execute(
            r#"
            INSERT OR REPLACE INTO objects
                (id, object_type, parent_id, address, size, name, name_flags, prototype, flags,
                 string_type, header_repeatable, header_nonrepeatable)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
            params![
                record.id as i64,
                record.object_type.as_str(),
                record.parent_id as i64,
                record.address as i64,
                record.size as i64,
                record.name.as_ref().map(|n| n.value.as_str()),
                record.name.as_ref().map(|n| n.flags),
                record.prototype,
                record.flags,
                record.string_type,
                record.header_comment_repeatable,
                record.header_comment_nonrepeatable,
            ],
        )?;
        insert_children(&tx, record)?;
        tx.commit()?;
        Ok(())
    }

    /// Read a record back, or `None` when the id is not stored.
    pub fn load_version(&self, id: ObjectId) -> DbResult<Option<VersionRecord>> {
        let row = self
            .conn
            .query_row(
                r#"
                SELECT object_type, parent_id, address, size, name, name_flags, prototype, flags,
                       string_type, header_repeatable, header_nonrepeatable
                FROM objects
                WHERE id = ?1
                "#,
                params![id as i64],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, Option<String>>(4)?,
                        row.get::<_, Option<u32>>(5)?,
                        row.get::<_, Option<String>>(6)?,
                        row.get::<_, u32>(7)?,
                        row.get::<_, Option<u8>>(8)?,
                        row.get::<_, Option<String>>(9)?,
                        row.get::<_, Option<String>>(10)?,
                    ))
                },
            )
            .optional()?;
        let Some((kind, parent_id, address, size, name, name_flags, prototype, flags, string_type, rep, nonrep)) =
            row
        else {
            return Ok(None);
        };

        let object_type = kind
            .parse::<ObjectType>()
            .map_err(|reason| DbError::Corrupt { id, reason })?;
        let mut record = VersionRecord::new(object_type, id);
        record.parent_id = parent_id as u64;
        record.address = address as u64;
        record.size = size as u64;
        record.name = name.map(|value| NameRecord { value, flags: name_flags.unwrap_or(0) });
        record.prototype = prototype;
        record.flags = flags;
        record.string_type = string_type;
        record.header_comment_repeatable = rep;
        record.header_comment_nonrepeatable = nonrep;
        self.load_children(&mut record)?;
        Ok(Some(record))
    }

    fn load_children(&self, record: &mut VersionRecord) -> DbResult<()> {
        let id = record.id as i64;

        let mut stmt = self.conn.prepare(
            "SELECT method, algo, value FROM signatures WHERE object_id = ?1 ORDER BY idx",
        )?;
        let rows = stmt.query_map(params![id], |row| {
            Ok(Signature::new(
                SignatureMethod::from_u8(row.get(0)?),
                SignatureAlgo::from_u8(row.get(1)?),
                row.get::<_, String>(2)?,
            ))
        })?;
        for row in rows {
            record.signatures.push(row?);
        }

        let mut stmt = self.conn.prepare(
            "SELECT offset, comment_type, value FROM comments WHERE object_id = ?1 ORDER BY idx",
        )?;
        let rows = stmt.query_map(params![id], |row| {
            Ok(OffsetComment {
                offset: row.get::<_, i64>(0)? as Offset,
                comment_type: CommentType::from_u8(row.get(1)?),
                value: row.get(2)?,
            })
        })?;
        for row in rows {
            record.comments.push(row?);
        }

        let mut stmt = self.conn.prepare(
            "SELECT offset, operand, value FROM value_views WHERE object_id = ?1 ORDER BY idx",
        )?;
        let rows = stmt.query_map(params![id], |row| {
            Ok(ValueView {
                offset: row.get::<_, i64>(0)? as Offset,
                operand: row.get(1)?,
                value: row.get(2)?,
            })
        })?;
        for row in rows {
            record.value_views.push(row?);
        }

        let mut stmt = self.conn.prepare(
            r#"
            SELECT offset, end_offset, name, new_name FROM register_views
            WHERE object_id = ?1 ORDER BY idx
            "#,
        )?;
        let rows = stmt.query_map(params![id], |row| {
            Ok(RegisterView {
                offset: row.get::<_, i64>(0)? as Offset,
                end_offset: row.get::<_, i64>(1)? as Offset,
                name: row.get(2)?,
                new_name: row.get(3)?,
            })
        })?;
        for row in rows {
            record.register_views.push(row?);
        }

        let mut stmt = self.conn.prepare(
            "SELECT offset, area_size, value FROM hidden_areas WHERE object_id = ?1 ORDER BY idx",
        )?;
        let rows = stmt.query_map(params![id], |row| {
            Ok(HiddenArea {
                offset: row.get::<_, i64>(0)? as Offset,
                area_size: row.get::<_, i64>(1)? as Offset,
                value: row.get(2)?,
            })
        })?;
        for row in rows {
            record.hidden_areas.push(row?);
        }

        let mut attr_stmt = self.conn.prepare(
            r#"
            SELECT key, value FROM xref_attributes
            WHERE object_id = ?1 AND xref_idx = ?2 ORDER BY idx
            "#,
        )?;
        let mut stmt = self.conn.prepare(
            "SELECT idx, offset, operand, target_id FROM xrefs WHERE object_id = ?1 ORDER BY idx",
        )?;
        let rows = stmt.query_map(params![id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                XrefRecord {
                    offset: row.get::<_, i64>(1)? as Offset,
                    operand: row.get(2)?,
                    id: row.get::<_, i64>(3)? as ObjectId,
                    attributes: Vec::new(),
                },
            ))
        })?;
        for row in rows {
            let (xref_idx, mut xref) = row?;
            let attrs = attr_stmt.query_map(params![id, xref_idx], |row| {
                Ok(Attribute::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;
            for attr in attrs {
                xref.attributes.push(attr?);
            }
            record.xrefs.push(xref);
        }

        let mut stmt = self
            .conn
            .prepare("SELECT key, value FROM attributes WHERE object_id = ?1 ORDER BY idx")?;
        let rows = stmt.query_map(params![id], |row| {
            Ok(Attribute::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        for row in rows {
            record.attributes.push(row?);
        }

        let mut stmt = self
            .conn
            .prepare("SELECT offset, data FROM blobs WHERE object_id = ?1 ORDER BY idx")?;
        let rows = stmt.query_map(params![id], |row| {
            Ok(BlobRecord { offset: row.get::<_, i64>(0)? as Offset, data: row.get(1)? })
        })?;
        for row in rows {
            record.blobs.push(row?);
        }

        Ok(())
    }

    /// Number of stored objects.
    pub fn count_objects(&self) -> DbResult<usize> {
        let count: i64 = self.conn.query_row("SELECT COUNT(*) FROM objects", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Remove one object and its children. Returns whether it existed.
    pub fn delete_object(&self, id: ObjectId) -> DbResult<bool> {
        let tx = self.conn.unchecked_transaction()?;
        delete_children(&tx, id)?;
        let affected = tx.execute("DELETE FROM objects WHERE id = ?1", params![id as i64])?;
        tx.commit()?;
        Ok(affected > 0)
    }

    /// Ids of the objects of `kind` named `name`.
    pub fn find_by_name(&self, kind: ObjectType, name: &str) -> DbResult<Vec<ObjectId>> {
        self.query_ids(
            "SELECT id FROM objects WHERE object_type = ?1 AND name = ?2 ORDER BY id",
            params![kind.as_str(), name],
        )
    }

    /// Ids of the objects of `kind` starting at `address`.
    pub fn find_by_address(&self, kind: ObjectType, address: Offset) -> DbResult<Vec<ObjectId>> {
        self.query_ids(
            "SELECT id FROM objects WHERE object_type = ?1 AND address = ?2 ORDER BY id",
            params![kind.as_str(), address as i64],
        )
    }

    /// Ids of the objects of `kind` starting inside `[start, start + size)`.
    ///
    /// An empty range is treated as the single address `start`; a range
    /// running past `u64::MAX` stops there.
    pub fn find_in_range(
        &self,
        kind: ObjectType,
        start: Offset,
        size: Offset,
    ) -> DbResult<Vec<ObjectId>> {
        let last = start.saturating_add(size.max(1) - 1);
        let mut out = Vec::new();
        for (lo, hi) in signed_segments(start, last) {
            out.extend(self.query_ids(
                r#"
                SELECT id FROM objects
                WHERE object_type = ?1 AND address BETWEEN ?2 AND ?3
                "#,
                params![kind.as_str(), lo, hi],
            )?);
        }
        out.sort_unstable();
        Ok(out)
    }

    fn query_ids(&self, sql: &str, params: impl rusqlite::Params) -> DbResult<Vec<ObjectId>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, |row| row.get::<_, i64>(0))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row? as ObjectId);
        }
        Ok(out)
    }

    /// Insert a sync run record and return its row id.
    pub fn insert_sync_run(&self, record: &SyncRunRecord) -> DbResult<i64> {
        self.conn.execute(
            r#"
            INSERT INTO sync_runs (
                snapshot, snapshot_hash, reference, reference_hash,
                objects, status, started_at, finished_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                record.snapshot,
                record.snapshot_hash,
                record.reference,
                record.reference_hash,
                record.objects as i64,
                record.status,
                record.started_at,
                record.finished_at
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// List sync runs, optionally filtered by snapshot path.
    pub fn list_sync_runs(&self, snapshot: Option<&str>) -> DbResult<Vec<SyncRunRecord>> {
        fn map_run(row: &rusqlite::Row<'_>) -> rusqlite::Result<SyncRunRecord> {
            Ok(SyncRunRecord {
                snapshot: row.get(0)?,
                snapshot_hash: row.get(1)?,
                reference: row.get(2)?,
                reference_hash: row.get(3)?,
                objects: row.get::<_, i64>(4)? as usize,
                status: row.get(5)?,
                started_at: row.get(6)?,
                finished_at: row.get(7)?,
            })
        }

        let mut stmt = self.conn.prepare(
            r#"
            SELECT snapshot, snapshot_hash, reference, reference_hash,
                   objects, status, started_at, finished_at
            FROM sync_runs
            WHERE ?1 IS NULL OR snapshot = ?1
            ORDER BY id
            "#,
        )?;
        let rows = stmt.query_map(params![snapshot], map_run)?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

const CHILD_TABLES: [&str; 9] = [
    "signatures",
    "xrefs",
    "xref_attributes",
    "comments",
    "value_views",
    "register_views",
    "hidden_areas",
    "attributes",
    "blobs",
];

fn delete_children(tx: &Transaction<'_>, id: ObjectId) -> DbResult<()> {
    for table in CHILD_TABLES {
        tx.execute(&format!("DELETE FROM {table} WHERE object_id = ?1"), params![id as i64])?;
    }
    Ok(())
}

fn insert_children(tx: &Transaction<'_>, record: &VersionRecord) -> DbResult<()> {
    let id = record.id as i64;

    {
        let mut stmt = tx.prepare(
            "INSERT INTO signatures (object_id, idx, method, algo, value) VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for (idx, sig) in record.signatures.iter().enumerate() {
            stmt.execute(params![id, idx as i64, sig.method.to_u8(), sig.algo.to_u8(), sig.value])?;
        }
    }

    {
        let mut stmt = tx.prepare(
            r#"
            INSERT INTO xrefs (object_id, idx, offset, operand, target_id)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )?;
        let mut attr_stmt = tx.prepare(
            r#"
            INSERT INTO xref_attributes (object_id, xref_idx, idx, key, value)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )?;
        for (idx, xref) in record.xrefs.iter().enumerate() {
            stmt.execute(params![id, idx as i64, xref.offset as i64, xref.operand, xref.id as i64])?;
            for (attr_idx, attr) in xref.attributes.iter().enumerate() {
                attr_stmt.execute(params![id, idx as i64, attr_idx as i64, attr.key, attr.value])?;
            }
        }
    }

    {
        let mut stmt = tx.prepare(
            r#"
            INSERT INTO comments (object_id, idx, offset, comment_type, value)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )?;
        for (idx, c) in record.comments.iter().enumerate() {
            stmt.execute(params![id, idx as i64, c.offset as i64, c.comment_type.to_u8(), c.value])?;
        }
    }

    {
        let mut stmt = tx.prepare(
            "INSERT INTO value_views (object_id, idx, offset, operand, value) VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for (idx, v) in record.value_views.iter().enumerate() {
            stmt.execute(params![id, idx as i64, v.offset as i64, v.operand, v.value])?;
        }
    }

    {
        let mut stmt = tx.prepare(
            r#"
            INSERT INTO register_views (object_id, idx, offset, end_offset, name, new_name)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )?;
        for (idx, r) in record.register_views.iter().enumerate() {
            stmt.execute(params![
                id,
                idx as i64,
                r.offset as i64,
                r.end_offset as i64,
                r.name,
                r.new_name
            ])?;
        }
    }

    {
        let mut stmt = tx.prepare(
            r#"
            INSERT INTO hidden_areas (object_id, idx, offset, area_size, value)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )?;
        for (idx, h) in record.hidden_areas.iter().enumerate() {
            stmt.execute(params![id, idx as i64, h.offset as i64, h.area_size as i64, h.value])?;
        }
    }

    {
        let mut stmt = tx
            .prepare("INSERT INTO attributes (object_id, idx, key, value) VALUES (?1, ?2, ?3, ?4)")?;
        for (idx, a) in record.attributes.iter().enumerate() {
            stmt.execute(params![id, idx as i64, a.key, a.value])?;
        }
    }

    {
        let mut stmt =
            tx.prepare("INSERT INTO blobs (object_id, idx, offset, data) VALUES (?1, ?2, ?3, ?4)")?;
        for (idx, b) in record.blobs.iter().enumerate() {
            stmt.execute(params![id, idx as i64, b.offset as i64, b.data])?;
        }
    }

    Ok(())
}

/// Split the inclusive address range `[start, last]` into ranges that stay
/// ordered once stored as `i64`. Addresses at or above 2^63 are negative in
/// SQLite, so a range crossing that boundary becomes two.
fn signed_segments(start: Offset, last: Offset) -> Vec<(i64, i64)> {
    const SIGN: Offset = 1 << 63;
    let mut segments = Vec::with_capacity(2);
    if start < SIGN {
        segments.push((start as i64, last.min(SIGN - 1) as i64));
    }
    if last >= SIGN {
        segments.push((start.max(SIGN) as i64, last as i64));
    }
    segments
}

/// Apply schema migrations to bring the database to the latest version.
///
/// We use `PRAGMA user_version` as the schema version indicator.
///
/// Version map:
/// - 0: no schema
/// - 1: objects and their child tables
/// - 2: add sync_runs table
/// - 3: add sync_runs.reference and sync_runs.reference_hash
fn apply_migrations(conn: &Connection) -> DbResult<()> {
    let mut current_version = current_schema_version(conn)?;

    // Reject DBs created with a newer schema than we support.
    if current_version > CURRENT_SCHEMA_VERSION {
        return Err(DbError::UnsupportedSchemaVersion {
            found: current_version,
            min_supported: MIN_SUPPORTED_SCHEMA_VERSION,
            max_supported: CURRENT_SCHEMA_VERSION,
        });
    }

    if current_version == 0 {
        conn.execute_batch(
            r#"
            BEGIN;
            CREATE TABLE IF NOT EXISTS objects (
                id                   INTEGER PRIMARY KEY,
                object_type          TEXT NOT NULL,
                parent_id            INTEGER NOT NULL,
                address              INTEGER NOT NULL,
                size                 INTEGER NOT NULL,
                name                 TEXT,
                name_flags           INTEGER,
                prototype            TEXT,
                flags                INTEGER NOT NULL,
                string_type          INTEGER,
                header_repeatable    TEXT,
                header_nonrepeatable TEXT
            );
            CREATE INDEX IF NOT EXISTS objects_by_name ON objects (object_type, name);
            CREATE INDEX IF NOT EXISTS objects_by_address ON objects (object_type, address);

            CREATE TABLE IF NOT EXISTS signatures (
                object_id INTEGER NOT NULL,
                idx       INTEGER NOT NULL,
                method    INTEGER NOT NULL,
                algo      INTEGER NOT NULL,
                value     TEXT NOT NULL,
                PRIMARY KEY(object_id, idx)
            );
            CREATE TABLE IF NOT EXISTS xrefs (
                object_id INTEGER NOT NULL,
                idx       INTEGER NOT NULL,
                offset    INTEGER NOT NULL,
                operand   INTEGER NOT NULL,
                target_id INTEGER NOT NULL,
                PRIMARY KEY(object_id, idx)
            );
            CREATE TABLE IF NOT EXISTS xref_attributes (
                object_id INTEGER NOT NULL,
                xref_idx  INTEGER NOT NULL,
                idx       INTEGER NOT NULL,
                key       TEXT NOT NULL,
                value     TEXT NOT NULL,
                PRIMARY KEY(object_id, xref_idx, idx)
            );
            CREATE TABLE IF NOT EXISTS comments (
                object_id    INTEGER NOT NULL,
                idx          INTEGER NOT NULL,
                offset       INTEGER NOT NULL,
                comment_type INTEGER NOT NULL,
                value        TEXT NOT NULL,
                PRIMARY KEY(object_id, idx)
            );
            CREATE TABLE IF NOT EXISTS value_views (
                object_id INTEGER NOT NULL,
                idx       INTEGER NOT NULL,
                offset    INTEGER NOT NULL,
                operand   INTEGER NOT NULL,
                value     TEXT NOT NULL,
                PRIMARY KEY(object_id, idx)
            );
            CREATE TABLE IF NOT EXISTS register_views (
                object_id  INTEGER NOT NULL,
                idx        INTEGER NOT NULL,
                offset     INTEGER NOT NULL,
                end_offset INTEGER NOT NULL,
                name       TEXT NOT NULL,
                new_name   TEXT NOT NULL,
                PRIMARY KEY(object_id, idx)
            );
            CREATE TABLE IF NOT EXISTS hidden_areas (
                object_id INTEGER NOT NULL,
                idx       INTEGER NOT NULL,
                offset    INTEGER NOT NULL,
                area_size INTEGER NOT NULL,
                value     TEXT NOT NULL,
                PRIMARY KEY(object_id, idx)
            );
            CREATE TABLE IF NOT EXISTS attributes (
                object_id INTEGER NOT NULL,
                idx       INTEGER NOT NULL,
                key       TEXT NOT NULL,
                value     TEXT NOT NULL,
                PRIMARY KEY(object_id, idx)
            );
            CREATE TABLE IF NOT EXISTS blobs (
                object_id INTEGER NOT NULL,
                idx       INTEGER NOT NULL,
                offset    INTEGER NOT NULL,
                data      BLOB NOT NULL,
                PRIMARY KEY(object_id, idx)
            );

            PRAGMA user_version = 1;
            COMMIT;
            "#,
        )?;
        current_version = 1;
    }

    if current_version < 2 {
        conn.execute_batch(
            r#"
            BEGIN;
            CREATE TABLE IF NOT EXISTS sync_runs (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                snapshot      TEXT NOT NULL,
                snapshot_hash TEXT,
                objects       INTEGER NOT NULL,
                status        TEXT NOT NULL,
                started_at    TEXT NOT NULL,
                finished_at   TEXT NOT NULL
            );

            PRAGMA user_version = 2;
            COMMIT;
            "#,
        )?;
        current_version = 2;
    }

    if current_version < 3 {
        conn.execute_batch(
            r#"
            BEGIN;
            ALTER TABLE sync_runs ADD COLUMN reference TEXT;
            ALTER TABLE sync_runs ADD COLUMN reference_hash TEXT;
            PRAGMA user_version = 3;
            COMMIT;
            "#,
        )?;
    }

    Ok(())
}

/// Read the SQLite schema version from `PRAGMA user_version`.
fn current_schema_version(conn: &Connection) -> DbResult<i32> {
    let version: i32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    Ok(version)
}
