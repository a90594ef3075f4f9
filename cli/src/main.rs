// Copyright (c) 2026 ProxiPay Contributors. MIT License.
// See LICENSE for details.

//! # ProxiPay Wallet CLI
//!
//! Entry point for the `proxipay` binary. Parses CLI arguments, initializes
//! logging, loads the simulation config, opens the wallet and runs one
//! subcommand:
//!
//! - `discover` — list nearby vendors
//! - `pay`      — discover, select and pay a vendor
//! - `balance`  — print the wallet balance
//! - `history`  — list offline records
//! - `logout`   — forget the MPIN

mod cli;
mod logging;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use proxipay_protocol::config::{SimulationConfig, BASE_CURRENCY};
use proxipay_protocol::ledger::{BlobOfflineStore, OfflineStore, SledOfflineLog};
use proxipay_protocol::storage::{KeyValueStore, MemoryStore, WalletDb};
use proxipay_protocol::{PaymentFlow, PaymentForm, PaymentOutcome, PaymentServices};

use cli::{Commands, GlobalArgs, HistoryArgs, PayArgs, ProxiPayCli};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = ProxiPayCli::parse();
    logging::init_logging("proxipay=info,proxipay_protocol=warn", cli.global.log_format);

    let config = load_config(&cli.global)?;
    let services = open_services(&cli.global, config)?;
    let user = cli.global.user.as_str();

    match cli.command {
        Commands::Discover => discover(services, user).await,
        Commands::Pay(args) => {
            let entry = read_mpin(&services, user).await?;
            let outcome = pay(services, user, args, entry).await?;
            println!("Payment stored offline.");
            println!("  Vendor      : {}", outcome.vendor_id);
            println!("  Amount      : {} {}", outcome.amount, BASE_CURRENCY);
            println!("  Ack id      : {}", outcome.ack_id);
            println!("  Record id   : {}", outcome.record_id);
            println!("  New balance : {} {}", outcome.new_balance, BASE_CURRENCY);
            Ok(())
        }
        Commands::Balance => {
            let balance = services
                .balance(user)
                .await
                .with_context(|| format!("failed to read balance for {}", user))?;
            println!("{} {}", balance, BASE_CURRENCY);
            Ok(())
        }
        Commands::History(args) => history(services, user, args).await,
        Commands::Logout => {
            services
                .logout(user)
                .await
                .with_context(|| format!("failed to log out {}", user))?;
            println!("MPIN cleared for {}.", user);
            Ok(())
        }
    }
}

/// Simulation settings from `--config`, or from `config.toml` in the data
/// directory when present. `--instant` zeroes the delays on top.
fn load_config(global: &GlobalArgs) -> Result<SimulationConfig> {
    let path = match &global.config {
        Some(path) => Some(path.clone()),
        None => {
            let default_path = global.data_dir.join("config.toml");
            default_path.is_file().then_some(default_path)
        }
    };

    let mut config = match path {
        Some(path) => read_config_file(path)?,
        None => SimulationConfig::default(),
    };
    if global.instant {
        let instant = SimulationConfig::instant();
        config.discovery_delay = instant.discovery_delay;
        config.unlock_delay = instant.unlock_delay;
        config.exchange_delay = instant.exchange_delay;
    }
    Ok(config)
}

fn read_config_file(path: PathBuf) -> Result<SimulationConfig> {
    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let config = toml::from_str(&raw)
        .with_context(|| format!("invalid config file {}", path.display()))?;
    tracing::info!(path = %path.display(), "config loaded");
    Ok(config)
}

/// MPIN typed for this payment, plus its confirmation when it is being
/// created.
struct MpinEntry {
    pin: String,
    confirm: Option<String>,
}

const MPIN_ENV: &str = "PROXIPAY_MPIN";

/// Take the MPIN from `PROXIPAY_MPIN`, otherwise prompt without echo. A
/// first-time MPIN is confirmed by a second prompt; the environment value
/// confirms itself.
async fn read_mpin(services: &PaymentServices, user: &str) -> Result<MpinEntry> {
    let configured = services
        .mpin()
        .exists(user)
        .await
        .with_context(|| format!("failed to read MPIN state for {}", user))?;

    if let Ok(pin) = std::env::var(MPIN_ENV) {
        let confirm = (!configured).then(|| pin.clone());
        return Ok(MpinEntry { pin, confirm });
    }

    if configured {
        let pin = rpassword::prompt_password("MPIN: ").context("failed to read MPIN")?;
        return Ok(MpinEntry { pin, confirm: None });
    }
    let pin = rpassword::prompt_password("New MPIN (4-6 digits): ").context("failed to read MPIN")?;
    let confirm = rpassword::prompt_password("Confirm MPIN: ").context("failed to read MPIN")?;
    Ok(MpinEntry {
        pin,
        confirm: Some(confirm),
    })
}

/// Open the wallet's stores and wire up the payment services.
fn open_services(global: &GlobalArgs, config: SimulationConfig) -> Result<Arc<PaymentServices>> {
    let (store, ledger): (Arc<dyn KeyValueStore>, Arc<dyn OfflineStore>) = if global.ephemeral {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let ledger = Arc::new(BlobOfflineStore::new(store.clone()));
        tracing::info!("using in-memory wallet");
        (store, ledger)
    } else {
        let db_path = global.data_dir.join("db");
        std::fs::create_dir_all(&db_path).with_context(|| {
            format!("failed to create database directory: {}", db_path.display())
        })?;
        let db = WalletDb::open(&db_path)
            .with_context(|| format!("failed to open database at {}", db_path.display()))?;
        tracing::info!(path = %db_path.display(), "database opened");
        let ledger = Arc::new(SledOfflineLog::new(db.clone()));
        (Arc::new(db), ledger)
    };

    Ok(Arc::new(PaymentServices::new(store, ledger, config)))
}

async fn discover(services: Arc<PaymentServices>, user: &str) -> Result<()> {
    let mut flow = PaymentFlow::new(services, user);
    let vendors = flow.discover().await?;

    println!("{:<16} {:<10} {:<6} {:>8}", "VENDOR", "RECEIVER", "CODE", "SIGNAL");
    for v in vendors {
        println!(
            "{:<16} {:<10} {:<6} {:>4} dBm",
            v.id, v.receiver_id, v.short_code, v.signal_strength
        );
    }
    Ok(())
}

async fn pay(
    services: Arc<PaymentServices>,
    user: &str,
    args: PayArgs,
    entry: MpinEntry,
) -> Result<PaymentOutcome> {
    let mut flow = PaymentFlow::new(services, user);
    flow.discover().await?;
    flow.select_vendor(&args.vendor)
        .with_context(|| format!("vendor {} is not in range", args.vendor))?;

    let mut progress = flow.subscribe();
    let printer = tokio::spawn(async move {
        while let Ok(event) = progress.recv().await {
            println!("  {}", event.message());
        }
    });

    let form = PaymentForm {
        amount: args.amount,
        mpin: entry.pin,
        confirm_mpin: entry.confirm,
        payer_name: args.name,
    };
    let result = flow.submit(form).await;

    // Closing the flow closes the progress channel and lets the printer drain.
    drop(flow);
    let _ = printer.await;

    result.context("payment failed")
}

async fn history(services: Arc<PaymentServices>, user: &str, args: HistoryArgs) -> Result<()> {
    let records = services
        .history(user)
        .await
        .with_context(|| format!("failed to read offline records for {}", user))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No offline records.");
        return Ok(());
    }
    for r in &records {
        println!(
            "{}  {}  {:>8} {}  {}  {}",
            r.created_at, r.id, r.amount, r.currency, r.vendor_id, r.status
        );
    }
    Ok(())
}
