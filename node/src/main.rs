// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # SHADE Node
//!
//! Entry point for the `shade-node` binary. Parses CLI arguments,
//! initializes logging and metrics, and dispatches to a subcommand:
//!
//! - `demo`   : one confidential transfer through the whole pipeline
//! - `keygen` : write a fresh Ed25519 signing key
//! - `screen` : PSI compliance screening of a list of addresses
//! - `run`    : finalize anchors on an interval until interrupted
//! - `version`: print build version information

mod cli;
mod logging;
mod metrics;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tokio::signal;

use shade_protocol::anchor::{AnchorFilter, AnchorRegistry, AnchorStatus};
use shade_protocol::compliance::ComplianceVerification;
use shade_protocol::config::{ProtocolConfig, SAMPLE_BLACKLIST, TX_FAMILY_FINANCIAL};
use shade_protocol::crypto::keys::SigningKeypair;
use shade_protocol::crypto::signer::{Ed25519Signer, Signer};
use shade_protocol::psi::PsiEngine;
use shade_protocol::storage::{SledStore, Store};
use shade_protocol::transaction::TransactionOrchestrator;

use cli::{Commands, ShadeNodeCli};
use logging::LogFormat;
use metrics::NodeMetrics;

const DEMO_SENDER: &str = "0xWhitelistedAddress1";
const DEMO_RECIPIENT: &str = "0xWhitelistedAddress2";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = ShadeNodeCli::parse();
    logging::init_logging(cli.verbose, LogFormat::from_str_lossy(&cli.log_format))
        .context("failed to initialize logging")?;

    match cli.command {
        Commands::Demo(args) => run_demo(args),
        Commands::Keygen(args) => keygen(args),
        Commands::Screen(args) => screen(args),
        Commands::Run(args) => run_sweeper(args).await,
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<ProtocolConfig> {
    match path {
        Some(path) => ProtocolConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Ok(ProtocolConfig::default()),
    }
}

fn open_store(data_dir: Option<&Path>) -> Result<Arc<dyn Store>> {
    let store = match data_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create data directory: {}", dir.display()))?;
            SledStore::open(dir)
                .with_context(|| format!("failed to open store at {}", dir.display()))?
        }
        None => SledStore::open_temporary().context("failed to open temporary store")?,
    };
    Ok(Arc::new(store))
}

/// Create, verify, anchor and optionally cancel one transfer.
fn run_demo(args: cli::DemoArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let metrics = NodeMetrics::new().context("failed to register metrics")?;
    let store = open_store(args.data_dir.as_deref())?;

    let (orchestrator, amount_keys) =
        TransactionOrchestrator::from_config(&config, store.clone(), Arc::new(Ed25519Signer))
            .context("failed to build orchestrator")?;
    let sender = SigningKeypair::generate();

    let (tx, opening) = orchestrator
        .create_and_encrypt_transaction(
            TX_FAMILY_FINANCIAL,
            DEMO_SENDER,
            DEMO_RECIPIENT,
            args.amount,
            &sender.secret_key_bytes(),
            false,
        )
        .context("failed to create transaction")?;
    metrics.transactions_created_total.inc();
    tracing::info!(tx_id = %tx.tx_id, "demo transaction created");

    let (anchored, rejection) =
        match orchestrator.verify_transaction(&tx, &sender.public_key_bytes(), true) {
            Ok(_) => {
                metrics.transactions_anchored_total.inc();
                (true, None)
            }
            Err(e) if e.is_policy_rejection() => {
                tracing::warn!(tx_id = %tx.tx_id, reason = %e, "demo transaction refused");
                metrics.record_rejection(&e);
                (false, Some(e.to_string()))
            }
            Err(e) => return Err(anyhow::Error::new(e).context("verification failed")),
        };

    let canceled = if args.cancel && anchored {
        let canceled = orchestrator
            .cancel_transaction(&tx.tx_id)
            .context("failed to cancel")?;
        if canceled {
            metrics.anchors_canceled_total.inc();
        }
        canceled
    } else {
        false
    };

    let screening = orchestrator
        .compliance()
        .check_compliance(
            &[DEMO_SENDER, DEMO_RECIPIENT, SAMPLE_BLACKLIST[0]],
            orchestrator.compliance().level(),
        )
        .context("screening failed")?;
    if !screening.passed {
        metrics.compliance_rejections_total.inc();
    }

    let decrypted = amount_keys
        .private
        .decrypt(&tx.encrypted_amount)
        .context("failed to decrypt amount")?;
    let family_total = match orchestrator
        .ledger()
        .encrypted_total(TX_FAMILY_FINANCIAL, orchestrator.amount_key())?
    {
        Some(total) => Some(amount_keys.private.decrypt(&total)?),
        None => None,
    };
    let status = orchestrator
        .anchors()
        .verify_anchor(&tx.tx_id)
        .map(|r| r.status.to_string())
        .ok();
    metrics.anchors_pending.set(
        orchestrator
            .anchors()
            .list_anchors(Some(AnchorFilter {
                status: Some(AnchorStatus::Pending),
                tx_family: None,
            }))
            .len() as i64,
    );

    let summary = json!({
        "tx_id": tx.tx_id,
        "tx_family": tx.tx_family,
        "commitment": tx.commitment.to_hex(),
        "range_proof": {
            "backend": tx.range_proof.backend,
            "min": tx.range_proof.min,
            "max": tx.range_proof.max,
            "size": tx.range_proof.bytes.len(),
        },
        "opening_valid": opening.opens(&tx),
        "decrypted_amount": decrypted,
        "family_total": family_total,
        "sample_screening": screening,
        "anchored": anchored,
        "rejection": rejection,
        "canceled": canceled,
        "anchor_status": status,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    println!("{}", metrics.encode()?);

    store.close().context("failed to close store")?;
    Ok(())
}

/// Generates a signing key and writes its secret half, hex-encoded.
fn keygen(args: cli::KeygenArgs) -> Result<()> {
    let keypair = SigningKeypair::generate();
    let address = Ed25519Signer.derive_address(&keypair.public_key_bytes())?;
    let key_path = &args.out;

    std::fs::write(key_path, hex::encode(keypair.secret_key_bytes()))
        .with_context(|| format!("failed to write key to {}", key_path.display()))?;

    // Restrict permissions on Unix.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(key_path, std::fs::Permissions::from_mode(0o600))?;
    }

    tracing::info!(
        address = %address,
        key_path = %key_path.display(),
        "signing keypair generated"
    );
    println!("Key written to {}", key_path.display());
    println!("  Public key : {}", keypair.public_key_hex());
    println!("  Address    : {}", address);
    Ok(())
}

fn screen(args: cli::ScreenArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let engine = PsiEngine::from_config(&config).context("failed to build PSI engine")?;
    let compliance =
        ComplianceVerification::from_config(&config, engine).context("failed to load lists")?;

    let result = compliance
        .check_compliance(&args.addresses, compliance.level())
        .context("screening failed")?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    if !result.passed {
        let failed =
            result.matched_blacklist.len() + result.matched_whitelist_required_but_absent.len();
        anyhow::bail!("{} address(es) failed screening", failed);
    }
    Ok(())
}

/// Restores persisted anchors and finalizes them as their windows close.
async fn run_sweeper(args: cli::RunArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let metrics = NodeMetrics::new().context("failed to register metrics")?;
    let store = open_store(Some(&args.data_dir))?;

    let anchors = AnchorRegistry::new(config.cancellation_window()).with_store(store.clone());
    let restored = anchors
        .restore_from_store()
        .context("failed to restore anchors")?;
    tracing::info!(
        restored,
        data_dir = %args.data_dir.display(),
        interval_ms = args.interval_ms,
        "starting anchor sweeper"
    );

    let mut interval = tokio::time::interval(std::time::Duration::from_millis(args.interval_ms));
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let finalized = anchors.finalize_due();
                if !finalized.is_empty() {
                    metrics.anchors_finalized_total.inc_by(finalized.len() as u64);
                    tracing::info!(count = finalized.len(), "anchors finalized");
                }
                let pending = anchors.list_anchors(Some(AnchorFilter {
                    status: Some(AnchorStatus::Pending),
                    tx_family: None,
                }));
                metrics.anchors_pending.set(pending.len() as i64);
            }
            _ = &mut shutdown => {
                tracing::info!("shutdown signal received");
                break;
            }
        }
    }

    match metrics.encode() {
        Ok(text) => tracing::info!(metrics = %text, "final metrics"),
        Err(e) => tracing::warn!(error = %e, "failed to encode metrics"),
    }
    store.close().context("failed to close store")?;
    tracing::info!("shade-node stopped");
    Ok(())
}

fn print_version() {
    println!("shade-node {}", env!("CARGO_PKG_VERSION"));
    println!("protocol   {}", shade_protocol::config::PROTOCOL_VERSION);
    println!(
        "encoding   v{}",
        shade_protocol::config::CANONICAL_ENCODING_VERSION
    );
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported. If a handler cannot be
/// installed, that branch never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
