use std::path::Path;

use anyhow::Result;

use snapsync_core::services::find_matches;

use crate::Settings;

/// Match every signed record of `new` against `reference`.
pub fn match_command(settings: &Settings, reference: &Path, new: &Path, json: bool) -> Result<()> {
    let reference_model = settings.open_model(reference)?;
    let new_model = settings.open_model(new)?;
    let relations =
        find_matches(&reference_model, &new_model, settings.config.matching.min_size);

    if json {
        println!("{}", serde_json::to_string_pretty(&relations)?);
        return Ok(());
    }

    println!("Matches ({}):", relations.len());
    for relation in &relations {
        println!(
            "- {:#x} -> {:#x} ({})",
            relation.reference_id, relation.new_id, relation.object_type
        );
    }
    Ok(())
}
