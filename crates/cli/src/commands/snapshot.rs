use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use tracing::info;

use snapsync_core::format::SnapshotWriter;
use snapsync_core::model::{ObjectId, VersionRecord, Walk};
use snapsync_core::services::anchors;
use snapsync_core::snapshot::RecordCollector;

use crate::{sha256_file, Settings};

/// Summary printed by `info`.
#[derive(Debug, Serialize)]
pub struct SnapshotInfo {
    pub path: String,
    pub sha256: String,
    pub objects: usize,
    pub signatures: usize,
    pub unique_signatures: usize,
    pub kinds: BTreeMap<String, usize>,
}

/// Encode a JSON array of records into a snapshot file.
pub fn build_command(input: &Path, output: &Path) -> Result<()> {
    let json = fs::read_to_string(input)
        .with_context(|| format!("Failed to read records from {}", input.display()))?;
    let records: Vec<VersionRecord> =
        serde_json::from_str(&json).context("Failed to parse records JSON")?;

    let mut writer = SnapshotWriter::new();
    writer.extend(records);
    let bytes = writer.finish().context("Failed to encode snapshot")?;
    fs::write(output, &bytes)
        .with_context(|| format!("Failed to write snapshot {}", output.display()))?;

    info!(records = writer.len(), bytes = bytes.len(), "snapshot written");
    println!("Wrote {} records to {}", writer.len(), output.display());
    Ok(())
}

/// Print counts for a snapshot.
pub fn info_command(settings: &Settings, path: &Path, json: bool) -> Result<()> {
    let model = settings.open_model(path)?;
    let mut kinds = BTreeMap::new();
    model.walk_objects(|_, version| {
        *kinds.entry(version.object_type().to_string()).or_insert(0) += 1;
        Walk::Continue
    });
    let summary = SnapshotInfo {
        path: path.display().to_string(),
        sha256: sha256_file(path)?,
        objects: model.num_objects(),
        signatures: model.num_signatures(),
        unique_signatures: model.num_unique_signatures(),
        kinds,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("Snapshot: {}", summary.path);
    println!("  SHA-256: {}", summary.sha256);
    println!("  Objects: {}", summary.objects);
    println!("  Signatures: {} ({} unique)", summary.signatures, summary.unique_signatures);
    for (kind, count) in &summary.kinds {
        println!("  - {kind}: {count}");
    }
    Ok(())
}

/// Print records as JSON, all of them or a single one.
pub fn dump_command(settings: &Settings, path: &Path, id: Option<ObjectId>) -> Result<()> {
    let model = settings.open_model(path)?;
    let mut collector = RecordCollector::new();
    match id {
        Some(id) => model
            .get_object(id)
            .ok_or_else(|| anyhow!("Object {id:#x} not found in {}", path.display()))?
            .accept(&mut collector),
        None => model.accept(&mut collector),
    }
    println!("{}", serde_json::to_string_pretty(collector.records())?);
    Ok(())
}

/// List collision-free signatures.
pub fn anchors_command(settings: &Settings, path: &Path, json: bool) -> Result<()> {
    let model = settings.open_model(path)?;
    let anchors = anchors(&model);

    if json {
        println!("{}", serde_json::to_string_pretty(&anchors)?);
        return Ok(());
    }

    println!("Anchors:");
    if anchors.is_empty() {
        println!("(none)");
        return Ok(());
    }
    for anchor in anchors {
        println!("- {} {:#x} ({})", anchor.signature.value, anchor.id, anchor.object_type);
    }
    Ok(())
}
