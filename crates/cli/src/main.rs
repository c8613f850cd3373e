use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};

use snapsync::commands::{
    anchors_command, build_command, delete_command, dump_command, info_command, match_command,
    sync_command,
};
use snapsync::{init_tracing, parse_object_id, Settings};
use snapsync_core::VerifyMode;

/// Reverse-engineering snapshot synchronizer.
///
/// This CLI is a thin wrapper around `snapsync-core` (exposed in code as
/// `snapsync_core`); all substantive logic lives in the library.
#[derive(Parser, Debug)]
#[command(
    name = "snapsync",
    version,
    about = "Correlate and sync reverse-engineering snapshots",
    long_about = None
)]
struct Cli {
    /// Log debug output to stderr (RUST_LOG overrides).
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    /// YAML or JSON config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Structural verification policy when opening snapshots.
    #[arg(long, global = true, value_enum)]
    verify: Option<VerifyArg>,

    #[command(subcommand)]
    command: Command,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum VerifyArg {
    Auto,
    Always,
    Never,
}

impl From<VerifyArg> for VerifyMode {
    fn from(arg: VerifyArg) -> Self {
        match arg {
            VerifyArg::Auto => VerifyMode::Auto,
            VerifyArg::Always => VerifyMode::Always,
            VerifyArg::Never => VerifyMode::Never,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Encode a JSON array of records into a snapshot file.
    Build {
        /// JSON file holding the records.
        #[arg(long)]
        input: PathBuf,

        /// Snapshot file to write.
        #[arg(long)]
        output: PathBuf,
    },

    /// Show object and signature counts for a snapshot.
    Info {
        snapshot: PathBuf,

        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Print snapshot records as JSON.
    Dump {
        snapshot: PathBuf,

        /// Only dump this object id (decimal or 0x-prefixed hex).
        #[arg(long, value_parser = parse_object_id)]
        id: Option<u64>,
    },

    /// List signatures carried by exactly one record.
    Anchors {
        snapshot: PathBuf,

        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Match the records of a new snapshot against a reference snapshot.
    Match {
        reference: PathBuf,
        new: PathBuf,

        /// Minimum size for matches on colliding signatures.
        #[arg(long)]
        min_size: Option<u64>,

        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Import a snapshot into a SQLite metadata database.
    ///
    /// With `--reference`, only reference records matched against the
    /// snapshot (plus the type and frame records they reference) are imported.
    Sync {
        snapshot: PathBuf,

        /// Metadata database path (created if missing).
        #[arg(long)]
        db: PathBuf,

        /// Reference snapshot to propagate matched records from.
        #[arg(long)]
        reference: Option<PathBuf>,

        /// Minimum size for matches on colliding signatures.
        #[arg(long)]
        min_size: Option<u64>,
    },

    /// Delete the objects described by a snapshot from a metadata database.
    Delete {
        snapshot: PathBuf,

        /// Metadata database path.
        #[arg(long)]
        db: PathBuf,

        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let verify = cli.verify.map(VerifyMode::from);
    let min_size = match &cli.command {
        Command::Match { min_size, .. } | Command::Sync { min_size, .. } => *min_size,
        _ => None,
    };
    let settings = Settings::load(cli.config.as_deref(), verify, min_size)?;

    match cli.command {
        Command::Build { input, output } => build_command(&input, &output)?,
        Command::Info { snapshot, json } => info_command(&settings, &snapshot, json)?,
        Command::Dump { snapshot, id } => dump_command(&settings, &snapshot, id)?,
        Command::Anchors { snapshot, json } => anchors_command(&settings, &snapshot, json)?,
        Command::Match { reference, new, json, .. } => {
            match_command(&settings, &reference, &new, json)?
        }
        Command::Sync { snapshot, db, reference, .. } => {
            sync_command(&settings, &snapshot, &db, reference.as_deref())?
        }
        Command::Delete { snapshot, db, json } => delete_command(&settings, &snapshot, &db, json)?,
    }

    Ok(())
}
