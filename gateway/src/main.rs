// Copyright (c) 2026 SENTE Contributors. MIT License.
// See LICENSE for details.

//! # SENTE Gateway
//!
//! Entry point for the `sente-gateway` binary. Parses CLI arguments,
//! initializes logging and metrics, wires the core stack (accounts,
//! sessions, custody, ledger, dispatcher), and serves the HTTP surface.
//!
//! The binary supports three subcommands:
//!
//! - `run`     — start the gateway
//! - `init`    — generate a custody master key
//! - `version` — print build version information

mod api;
mod cli;
mod logging;
mod metrics;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::signal;

use sente_core::account::AccountStore;
use sente_core::custody::MasterKey;
use sente_core::dispatcher::Dispatcher;
use sente_core::ledger::{LedgerClient, MockLedger, TransferStore};
use sente_core::menu::machine::MenuMachine;
use sente_core::session::SessionStore;

use cli::{Commands, SenteGatewayCli};
use logging::LogFormat;
use metrics::GatewayMetrics;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = SenteGatewayCli::parse();

    match cli.command {
        Commands::Run(args) => run_gateway(args).await,
        Commands::Init(args) => init_gateway(args),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Starts the full gateway: webhook, REST surface, metrics, and the
/// session sweeper.
async fn run_gateway(args: cli::RunArgs) -> Result<()> {
    logging::init_logging(
        "sente_gateway=info,sente_core=info,tower_http=info",
        LogFormat::from_str_lossy(&args.log_format),
    );

    tracing::info!(
        port = args.port,
        network = %args.network,
        "starting sente-gateway"
    );

    // --- Custody master key ---
    let master = match &args.master_key {
        Some(hex_key) => MasterKey::from_hex(hex_key).context("invalid SENTE_MASTER_KEY")?,
        None => {
            tracing::warn!(
                "no master key supplied, generating an ephemeral one; \
                 sealed credentials will not survive a restart"
            );
            MasterKey::generate()
        }
    };

    // --- Core stores ---
    let sessions = Arc::new(SessionStore::new());
    let accounts = Arc::new(AccountStore::new());
    let records = Arc::new(TransferStore::new());

    // --- Ledger backend ---
    // The in-process mock chain. A production deployment swaps this for an
    // RPC-backed LedgerClient implementation behind the same trait.
    let ledger = Arc::new(MockLedger::new()) as Arc<dyn LedgerClient>;
    tracing::info!("ledger backend: in-process mock");

    // --- Metrics ---
    let gateway_metrics = Arc::new(GatewayMetrics::new());

    // --- Dispatcher ---
    // Core security and settlement events feed the Prometheus counters
    // through the telemetry hooks.
    let machine = MenuMachine::new(
        Arc::clone(&accounts),
        Arc::clone(&ledger),
        Arc::clone(&records),
        master,
    )
    .with_telemetry(Arc::clone(&gateway_metrics) as _);
    let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&sessions), machine));

    // --- Session sweeper ---
    let sweeper = SessionStore::spawn_sweeper(Arc::clone(&sessions));

    // --- Application state ---
    let app_state = api::AppState {
        version: env!("CARGO_PKG_VERSION").to_string(),
        network: args.network,
        dispatcher,
        accounts,
        records,
        metrics: Arc::clone(&gateway_metrics),
    };

    // --- HTTP server ---
    let router = api::create_router(app_state);
    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind listener on {}", addr))?;
    tracing::info!("gateway listening on {}", addr);

    tokio::select! {
        res = axum::serve(listener, router) => {
            if let Err(e) = res {
                tracing::error!("server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received, draining connections");
        }
    }

    sweeper.abort();
    tracing::info!("sente-gateway stopped");
    Ok(())
}

/// Generates a custody master key and writes it to the key file.
///
/// The key never goes to stdout or the logs — only the file, with owner-only
/// permissions on Unix.
fn init_gateway(args: cli::InitArgs) -> Result<()> {
    logging::init_logging("sente_gateway=info", LogFormat::Pretty);

    if args.key_file.exists() {
        anyhow::bail!(
            "refusing to overwrite existing key file {}",
            args.key_file.display()
        );
    }

    let master = MasterKey::generate();
    std::fs::write(&args.key_file, master.to_hex())
        .with_context(|| format!("failed to write key file {}", args.key_file.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&args.key_file, std::fs::Permissions::from_mode(0o600))?;
    }

    tracing::info!(key_file = %args.key_file.display(), "master key generated");

    println!("Gateway initialized.");
    println!("  Key file : {}", args.key_file.display());
    println!();
    println!("Start the gateway with:");
    println!(
        "  SENTE_MASTER_KEY=$(cat {}) sente-gateway run",
        args.key_file.display()
    );
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("sente-gateway {}", env!("CARGO_PKG_VERSION"));
    println!("rustc         {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
