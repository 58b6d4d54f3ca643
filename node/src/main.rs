//! # LedgerVM Operator Binary
//!
//! Entry point for `ledgervm`. Parses CLI arguments, initializes logging,
//! and runs one of:
//!
//! - `replay`: apply a JSON block file to in-memory or sled-backed state
//!   and print a JSON report (receipts, rejections, state root, accounts)
//! - `sample`: emit a small block file that replays cleanly
//! - `keygen`: print a keypair's secret, public key, and address

mod cli;
mod logging;
mod replay;

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;

use ledgervm_protocol::config::ChainConfig;
use ledgervm_protocol::crypto::Keypair;
use ledgervm_protocol::state::{KvStore, MemoryState, MemoryStore, SledStore};
use ledgervm_protocol::types::Address;

use cli::{Commands, LedgerCli};
use replay::BlockFile;

fn main() -> Result<()> {
    let cli = LedgerCli::parse();
    logging::init_logging(&cli.log_level, cli.log_format);

    match cli.command {
        Commands::Replay(args) => run_replay(args),
        Commands::Sample(args) => write_sample(args),
        Commands::Keygen(args) => keygen(args),
    }
}

fn load_config(path: Option<&Path>) -> Result<ChainConfig> {
    let Some(path) = path else {
        return Ok(ChainConfig::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let config = ChainConfig::from_json(&raw)
        .with_context(|| format!("invalid config {}", path.display()))?;
    tracing::info!(path = %path.display(), chain_id = config.chain_id, "config loaded");
    Ok(config)
}

fn run_replay(args: cli::ReplayArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let raw = std::fs::read_to_string(&args.blocks)
        .with_context(|| format!("failed to read blocks {}", args.blocks.display()))?;
    let file = BlockFile::from_json(&raw)?;

    match &args.db {
        Some(path) => {
            let store = SledStore::open(path)
                .with_context(|| format!("failed to open database at {}", path.display()))?;
            tracing::info!(path = %path.display(), "database opened");
            replay_into(store, &config, &file, &args.show)
        }
        None => replay_into(MemoryStore::new(), &config, &file, &args.show),
    }
}

fn replay_into<S: KvStore>(
    store: S,
    config: &ChainConfig,
    file: &BlockFile,
    show: &[Address],
) -> Result<()> {
    let state = MemoryState::new(store);
    let report = replay::replay(&state, config, file, show)?;
    tracing::info!(
        applied = report.receipts.len(),
        rejected = report.rejected.len(),
        root = %report.root,
        "replay finished"
    );
    print_json(&report)
}

fn write_sample(args: cli::SampleArgs) -> Result<()> {
    let file = replay::sample_blocks(&ChainConfig::default());
    let json = serde_json::to_string_pretty(&file)?;
    match args.out {
        Some(path) => {
            std::fs::write(&path, json)
                .with_context(|| format!("failed to write {}", path.display()))?;
            tracing::info!(path = %path.display(), blocks = file.blocks.len(), "sample written");
        }
        None => println!("{}", json),
    }
    Ok(())
}

#[derive(Serialize)]
struct KeyReport {
    secret: String,
    public_key: String,
    address: Address,
}

fn keygen(args: cli::KeygenArgs) -> Result<()> {
    let keypair = match args.secret.as_deref() {
        Some(secret) => Keypair::from_hex(secret).context("invalid secret")?,
        None => Keypair::generate(),
    };
    print_json(&KeyReport {
        secret: keypair.secret_key_hex(),
        public_key: keypair.public_key().to_hex(),
        address: keypair.address(),
    })
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
