//! MultiVault CLI
//!
//! Drives sessions, replays operation logs, writes snapshots and queries
//! the event index.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use multivault_kernel::operations::OperationEnvelope;
use multivault_kernel::{Address, LedgerConfig};
use multivault_runtime::event_store::EventStore;
use multivault_runtime::indexer::{EventIndexer, EventSummary};
use multivault_runtime::logging::init_logging;
use multivault_runtime::replay;
use multivault_runtime::session::Session;
use multivault_runtime::snapshot::{self, Snapshot};

/// Deterministic multi-curve term vault ledger.
#[derive(Parser)]
#[command(name = "multivault")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Ledger config (JSON). Defaults apply when omitted.
    #[arg(short, long, global = true, env = "MULTIVAULT_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Absolute directory for rotated log files; stderr when omitted
    #[arg(long, global = true, env = "MULTIVAULT_LOG_DIR")]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply a JSON array of operation envelopes to a session
    Apply {
        /// Directory holding all sessions
        #[arg(short, long)]
        base_dir: PathBuf,

        /// Session name
        #[arg(short, long, default_value = "default")]
        session: String,

        /// Operations file (JSON array of envelopes)
        #[arg(short, long)]
        ops: PathBuf,

        /// Snapshot every N sequences (0 disables)
        #[arg(long, default_value_t = 0)]
        snapshot_interval: u64,
    },

    /// Rebuild the ledger from an operation log and print its hash
    Replay {
        /// Operation log (events.log)
        #[arg(short, long)]
        log: PathBuf,
    },

    /// Replay twice and, if given, from the latest snapshot; all hashes must agree
    Verify {
        #[arg(short, long)]
        log: PathBuf,

        /// Snapshot directory to cross-check against
        #[arg(short, long)]
        snapshots: Option<PathBuf>,
    },

    /// Replay a log and write a snapshot of the result
    Snapshot {
        #[arg(short, long)]
        log: PathBuf,

        /// Output directory
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Count indexed events, optionally for one account
    Index {
        #[arg(short, long)]
        log: PathBuf,

        /// Account (hex, 20 bytes)
        #[arg(short, long)]
        account: Option<Address>,

        /// First sequence to include
        #[arg(long, default_value_t = 0)]
        from: u64,

        /// Last sequence to include
        #[arg(long, default_value_t = u64::MAX)]
        to: u64,
    },

    /// Print the effective config
    InspectConfig,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.log_dir.as_deref())?;

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Apply {
            base_dir,
            session,
            ops,
            snapshot_interval,
        } => {
            let envelopes = read_envelopes(&ops)?;
            let mut session = Session::open(&base_dir, &session, config, snapshot_interval)?;
            for envelope in &envelopes {
                let outcome = session
                    .apply(envelope)
                    .with_context(|| format!("operation {} rejected", envelope.sequence))?;
                println!(
                    "{} {} {}",
                    envelope.sequence,
                    envelope.operation.name(),
                    serde_json::to_string(&outcome)?
                );
            }
            println!("hash {}", session.current_hash()?);
        }
        Commands::Replay { log } => {
            let rebuilt = replay::rebuild_ledger(config, &load_log(&log)?)?;
            println!("sequence {}", rebuilt.ledger.last_sequence());
            println!("hash {}", rebuilt.hash);
        }
        Commands::Verify { log, snapshots } => {
            let envelopes = load_log(&log)?;
            let first = replay::rebuild_hash(config.clone(), &envelopes)?;
            let second = replay::rebuild_hash(config, &envelopes)?;
            if first != second {
                bail!("replay is not deterministic: {} vs {}", first, second);
            }
            if let Some(dir) = snapshots {
                let snap = snapshot::load_latest_snapshot(&dir)?
                    .with_context(|| format!("no snapshot in {}", dir.display()))?;
                let resumed = replay::resume_from_snapshot(&snap, &envelopes)?;
                if resumed.hash != first {
                    bail!(
                        "snapshot {} diverges: {} vs {}",
                        snap.sequence,
                        resumed.hash,
                        first
                    );
                }
            }
            println!("ok {}", first);
        }
        Commands::Snapshot { log, out } => {
            let rebuilt = replay::rebuild_ledger(config, &load_log(&log)?)?;
            let snap = Snapshot::capture(&rebuilt.ledger, &rebuilt.custom_curves)?;
            let path = snapshot::save_snapshot(&out, &snap)?;
            println!("{}", path.display());
        }
        Commands::Index {
            log,
            account,
            from,
            to,
        } => {
            let mut ledger = multivault_kernel::MultiVault::new(config)?;
            let mut custom_curves = Vec::new();
            let mut indexer = EventIndexer::new();
            for envelope in &load_log(&log)? {
                replay::apply_envelope(&mut ledger, &mut custom_curves, envelope)?;
                indexer.ingest(envelope.sequence, &ledger.take_events());
            }
            let summary = match account {
                Some(account) => indexer.query_account(&account, from..=to),
                None => indexer.query(from..=to),
            };
            print_summary(&summary);
        }
        Commands::InspectConfig => {
            println!("{}", config.to_json_string()?);
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<LedgerConfig> {
    match path {
        Some(path) => LedgerConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(LedgerConfig::default()),
    }
}

fn load_log(path: &Path) -> Result<Vec<OperationEnvelope>> {
    if !path.exists() {
        bail!("operation log {} does not exist", path.display());
    }
    let store = EventStore::open(path)?;
    Ok(store.load_operations()?)
}

fn read_envelopes(path: &Path) -> Result<Vec<OperationEnvelope>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
}

fn print_summary(summary: &EventSummary) {
    for (category, count) in summary.counts() {
        println!("{:?} {}", category, count);
    }
}
