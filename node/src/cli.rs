//! # CLI Interface
//!
//! Command-line arguments for `ledgervm`, via `clap` derive. Three
//! subcommands: `replay`, `sample`, and `keygen`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use ledgervm_protocol::types::Address;

use crate::logging::LogFormat;

/// LedgerVM operator tool.
///
/// Replays blocks of signed transactions against the reference state and
/// reports the resulting state root and accounts.
#[derive(Parser, Debug)]
#[command(
    name = "ledgervm",
    about = "LedgerVM transaction replay and key tool",
    version,
    propagate_version = true
)]
pub struct LedgerCli {
    /// Log output format.
    #[arg(long, global = true, value_enum, env = "LEDGERVM_LOG_FORMAT", default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    /// Default log filter when `RUST_LOG` is unset.
    #[arg(long, global = true, env = "LEDGERVM_LOG", default_value = "ledgervm=info,ledgervm_protocol=info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Replay a JSON block file and print the resulting state.
    Replay(ReplayArgs),
    /// Write a small, valid block file to start from.
    Sample(SampleArgs),
    /// Generate a keypair and print its public key and address.
    Keygen(KeygenArgs),
}

#[derive(Parser, Debug)]
pub struct ReplayArgs {
    /// Block file: `{"blocks": [{"height", "timestamp", "transactions", ...}]}`.
    pub blocks: PathBuf,

    /// Chain configuration (JSON). Defaults apply when omitted.
    #[arg(long, short = 'c', env = "LEDGERVM_CONFIG")]
    pub config: Option<PathBuf>,

    /// Persist state in a sled database at this path instead of memory.
    ///
    /// Replaying into an existing database continues from its state.
    #[arg(long, env = "LEDGERVM_DB")]
    pub db: Option<PathBuf>,

    /// Extra accounts to include in the report.
    #[arg(long = "show", value_name = "ADDRESS")]
    pub show: Vec<Address>,
}

#[derive(Parser, Debug)]
pub struct SampleArgs {
    /// Output path. Writes to stdout when omitted.
    #[arg(long, short = 'o')]
    pub out: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct KeygenArgs {
    /// Hex-encoded 32-byte secret to derive from instead of generating one.
    #[arg(long, env = "LEDGERVM_SECRET")]
    pub secret: Option<String>,
}
