use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::info;

use snapsync_core::db::{delete_from_model, DbVisitor, MetadataDb, SyncRunRecord};
use snapsync_core::services::{find_matches, propagate};

use crate::{sha256_file, Settings};

fn open_db(path: &Path) -> Result<MetadataDb> {
    MetadataDb::open(path)
        .with_context(|| format!("Failed to open metadata database at {}", path.display()))
}

/// Import a snapshot into the metadata database.
///
/// With a reference snapshot, only reference records matched by signature
/// (and the records they reach) are imported, and the sync run records the
/// reference alongside the snapshot.
pub fn sync_command(
    settings: &Settings,
    snapshot: &Path,
    db_path: &Path,
    reference: Option<&Path>,
) -> Result<()> {
    let started_at = Utc::now().to_rfc3339();
    let model = settings.open_model(snapshot)?;
    let db = open_db(db_path)?;

    let mut visitor = DbVisitor::new(&db);
    match reference {
        Some(reference) => {
            let reference_model = settings.open_model(reference)?;
            let relations =
                find_matches(&reference_model, &model, settings.config.matching.min_size);
            let report = propagate(&reference_model, &relations, &mut visitor);
            info!(
                relations = relations.len(),
                matched = report.matched,
                children = report.children,
                parents = report.parents,
                "propagated reference records"
            );
        }
        None => model.accept(&mut visitor),
    }
    let written = visitor.finish().context("Failed to write records")?;

    let reference_hash = reference.map(sha256_file).transpose()?;
    let run = SyncRunRecord {
        snapshot: snapshot.display().to_string(),
        snapshot_hash: Some(sha256_file(snapshot)?),
        reference: reference.map(|path| path.display().to_string()),
        reference_hash,
        objects: written,
        status: "succeeded".to_string(),
        started_at,
        finished_at: Utc::now().to_rfc3339(),
    };
    db.insert_sync_run(&run).context("Failed to record sync run")?;

    println!("Synced {} objects into {}", written, db_path.display());
    Ok(())
}

/// Delete every stored object matching a record of the snapshot.
pub fn delete_command(settings: &Settings, snapshot: &Path, db_path: &Path, json: bool) -> Result<()> {
    let model = settings.open_model(snapshot)?;
    let db = open_db(db_path)?;
    let report = delete_from_model(&db, &model).context("Failed to delete objects")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Deleted {} objects from {}", report.deleted.len(), db_path.display());
    if report.missing > 0 {
        println!("  Missing: {}", report.missing);
    }
    Ok(())
}
