use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::snapshot::{ModelOptions, VerifyMode};

/// Signature-matching settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// Minimum size a record must have to be matched on a colliding signature.
    #[serde(default)]
    pub min_size: u64,
}

/// Serializable synchronizer configuration.
///
/// Usually stored next to the snapshots as `snapsync.yaml`; JSON is accepted
/// as well. Missing sections fall back to their defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub matching: MatchingConfig,
    /// Structural verification policy when opening snapshots.
    #[serde(default)]
    pub verify: VerifyMode,
}

impl SyncConfig {
    pub fn model_options(&self) -> ModelOptions {
        ModelOptions { verify: self.verify }
    }
}

/// Load a config file, picking the parser from the file extension.
pub fn load_config(path: &Path) -> Result<SyncConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let ext = path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase);
    let config = match ext.as_deref() {
        Some("yaml") | Some("yml") => serde_yaml::from_str(&text)
            .with_context(|| format!("Failed to parse YAML config {}", path.display()))?,
        Some("json") => serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse JSON config {}", path.display()))?,
        other => bail!(
            "Unsupported config extension {:?} for {}; expected .yaml, .yml or .json",
            other.unwrap_or(""),
            path.display()
        ),
    };
    Ok(config)
}
