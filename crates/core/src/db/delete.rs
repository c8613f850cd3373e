use tracing::{debug, warn};

use crate::db::{DbResult, DeleteReport, MetadataDb};
use crate::model::{ObjectType, Walk};
use crate::snapshot::{HVersion, Model};

/// Delete from `db` every stored object matching a record of `model`.
///
/// Types are matched by name, functions and data by start address, code and
/// basic blocks by address range. Other kinds are left alone. A record with
/// no stored counterpart is logged and counted, not an error.
pub fn delete_from_model(db: &MetadataDb, model: &Model) -> DbResult<DeleteReport> {
    let mut report = DeleteReport::default();
    let mut result = Ok(());
    model.walk_objects(|_, version| match delete_object(db, &version, &mut report) {
        Ok(()) => Walk::Continue,
        Err(err) => {
            result = Err(err);
            Walk::Stop
        }
    });
    result?;
    debug!(
        deleted = report.deleted.len(),
        missing = report.missing,
        skipped = report.skipped,
        "delete from model done"
    );
    Ok(report)
}

fn delete_object(db: &MetadataDb, version: &HVersion<'_>, report: &mut DeleteReport) -> DbResult<()> {
    let kind = version.object_type();
    let targets = match kind {
        ObjectType::Struct | ObjectType::Enum | ObjectType::EnumMember => {
            db.find_by_name(kind, version.username())?
        }
        ObjectType::Function | ObjectType::Data => db.find_by_address(kind, version.address())?,
        ObjectType::Code | ObjectType::BasicBlock => {
            db.find_in_range(kind, version.address(), version.size())?
        }
        _ => {
            report.skipped += 1;
            return Ok(());
        }
    };

    if targets.is_empty() {
        match kind {
            ObjectType::Struct | ObjectType::Enum | ObjectType::EnumMember => {
                warn!(kind = %kind, name = version.username(), "unable to delete missing object")
            }
            _ => warn!(
                kind = %kind,
                address = %format!("{:#x}", version.address()),
                "unable to delete missing object"
            ),
        }
        report.missing += 1;
        return Ok(());
    }

    for id in targets {
        if db.delete_object(id)? {
            report.deleted.push(id);
        }
    }
    Ok(())
}
