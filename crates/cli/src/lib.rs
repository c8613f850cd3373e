use std::fs;
use std::io::{BufReader, Read};
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use sha2::{Digest, Sha256};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use snapsync_core::config::{load_config, SyncConfig};
use snapsync_core::model::ObjectId;
use snapsync_core::{Model, VerifyMode};

pub mod commands;

/// Install the stderr log subscriber. `RUST_LOG` wins over `--verbose`.
pub fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    // A second install (tests driving several commands) is not an error.
    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| level.into()))
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .try_init();
}

/// Settings shared by every command: the config file plus CLI overrides.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub config: SyncConfig,
}

impl Settings {
    /// Load `config_path` when given, then apply overrides.
    pub fn load(
        config_path: Option<&Path>,
        verify: Option<VerifyMode>,
        min_size: Option<u64>,
    ) -> Result<Self> {
        let mut config = match config_path {
            Some(path) => load_config(path)?,
            None => SyncConfig::default(),
        };
        if let Some(verify) = verify {
            config.verify = verify;
        }
        if let Some(min_size) = min_size {
            config.matching.min_size = min_size;
        }
        Ok(Self { config })
    }

    pub fn open_model(&self, path: &Path) -> Result<Model> {
        Model::open(path, &self.config.model_options())
            .with_context(|| format!("Failed to open snapshot {}", path.display()))
    }
}

/// Parse an object id given as decimal or `0x`-prefixed hex.
pub fn parse_object_id(text: &str) -> Result<ObjectId> {
    let trimmed = text.trim();
    let parsed = match trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
        Some(hex) => ObjectId::from_str_radix(hex, 16),
        None => trimmed.parse::<ObjectId>(),
    };
    parsed.map_err(|err| anyhow!("Invalid object id '{text}': {err}"))
}

/// Compute the SHA-256 hash of a file and return it as a hex string.
pub fn sha256_file(path: &Path) -> Result<String> {
    let file = fs::File::open(path)
        .with_context(|| format!("Failed to open snapshot for hashing: {}", path.display()))?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];

    loop {
        let n = reader
            .read(&mut buf)
            .with_context(|| format!("Failed to read snapshot for hashing: {}", path.display()))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    let digest = hasher.finalize();
    Ok(format!("{:x}", digest))
}
