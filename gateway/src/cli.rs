//! # CLI Interface
//!
//! Defines the command-line argument structure for `sente-gateway` using
//! `clap` derive. Supports three subcommands: `run`, `init`, and `version`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use sente_core::config::DEFAULT_HTTP_PORT;

/// SENTE USSD wallet gateway.
///
/// Serves the USSD aggregator webhook, manages custodial wallets for
/// feature-phone subscribers, and exposes a read-only REST surface plus
/// Prometheus metrics.
#[derive(Parser, Debug)]
#[command(
    name = "sente-gateway",
    about = "SENTE USSD wallet gateway",
    version,
    propagate_version = true
)]
pub struct SenteGatewayCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the gateway binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the gateway.
    Run(RunArgs),
    /// Generate a custody master key and write it to a key file.
    Init(InitArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Port for the webhook, REST, and metrics endpoints.
    #[arg(long, short = 'p', env = "SENTE_PORT", default_value_t = DEFAULT_HTTP_PORT)]
    pub port: u16,

    /// Hex-encoded 32-byte custody master key.
    ///
    /// When omitted, the gateway generates an ephemeral key at startup —
    /// sealed credentials then die with the process. Fine for dev, fatal
    /// for anything holding real money.
    #[arg(long, env = "SENTE_MASTER_KEY")]
    pub master_key: Option<String>,

    /// Network label reported by the API (e.g. "devnet", "testnet").
    #[arg(long, env = "SENTE_NETWORK", default_value = "devnet")]
    pub network: String,

    /// Log output format: "pretty" or "json".
    #[arg(long, env = "SENTE_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,
}

/// Arguments for the `init` subcommand.
#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Path the hex-encoded master key is written to. Refuses to overwrite
    /// an existing file.
    #[arg(long, short = 'o', env = "SENTE_KEY_FILE", default_value = "sente-master.key")]
    pub key_file: PathBuf,
}
