//! # CLI Interface
//!
//! Defines the command-line argument structure for `shade-node` using
//! `clap` derive. Five subcommands: `demo`, `keygen`, `screen`, `run`, and
//! `version`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// SHADE operator node.
///
/// Runs the confidential-transfer pipeline end to end, screens addresses
/// against the configured reference lists, and finalizes anchors once their
/// cancellation window has passed.
#[derive(Parser, Debug)]
#[command(
    name = "shade-node",
    about = "SHADE confidential transaction node",
    version,
    propagate_version = true
)]
pub struct ShadeNodeCli {
    /// Log output format: `pretty` or `json`.
    #[arg(long, global = true, env = "SHADE_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,

    /// Raise SHADE log verbosity (-v debug, -vv trace). `SHADE_LOG` or
    /// `RUST_LOG` override it.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create, verify, and anchor one confidential transfer, then print the
    /// result as JSON.
    Demo(DemoArgs),
    /// Generate an Ed25519 signing key and write it hex-encoded.
    Keygen(KeygenArgs),
    /// Screen addresses against the configured blacklist and whitelist.
    Screen(ScreenArgs),
    /// Finalize due anchors on an interval until interrupted.
    Run(RunArgs),
    /// Print version information and exit.
    Version,
}

#[derive(Parser, Debug)]
pub struct DemoArgs {
    /// Path to the protocol configuration file (TOML). Defaults apply when
    /// omitted.
    #[arg(long, short = 'c', env = "SHADE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Amount to transfer.
    #[arg(long, default_value_t = 1000, allow_negative_numbers = true)]
    pub amount: i64,

    /// Cancel the transfer right after anchoring it.
    #[arg(long)]
    pub cancel: bool,

    /// Persist to this directory instead of a temporary store.
    #[arg(long, short = 'd')]
    pub data_dir: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct KeygenArgs {
    /// Where to write the hex-encoded secret key.
    #[arg(long, short = 'o', default_value = "shade.key")]
    pub out: PathBuf,
}

#[derive(Parser, Debug)]
pub struct ScreenArgs {
    #[arg(long, short = 'c', env = "SHADE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Addresses to screen.
    #[arg(required = true)]
    pub addresses: Vec<String>,
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    #[arg(long, short = 'c', env = "SHADE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory holding the sled store.
    #[arg(long, short = 'd', env = "SHADE_DATA_DIR", default_value = "shade-data")]
    pub data_dir: PathBuf,

    /// How often to sweep for anchors past their deadline.
    #[arg(long, default_value_t = 1000, value_parser = clap::value_parser!(u64).range(1..))]
    pub interval_ms: u64,
}
