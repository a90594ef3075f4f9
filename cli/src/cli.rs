//! # CLI Interface
//!
//! Defines the command-line argument structure for `proxipay` using `clap`
//! derive. Global flags pick the wallet (data directory, user, config file)
//! and the log format; subcommands map onto the payment flow.
//!
//! The MPIN is never a flag. `pay` reads it from `PROXIPAY_MPIN` or prompts
//! for it on the terminal without echo.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::logging::LogFormat;

/// ProxiPay offline wallet.
///
/// Discovers nearby vendors, pays them with a signed offline handshake, and
/// keeps the balance and the offline records in a local sled database.
#[derive(Parser, Debug)]
#[command(
    name = "proxipay",
    about = "ProxiPay offline wallet",
    version,
    propagate_version = true
)]
pub struct ProxiPayCli {
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Directory holding the wallet database. Created on first use.
    #[arg(
        long,
        short = 'd',
        global = true,
        env = "PROXIPAY_DATA_DIR",
        default_value = ".proxipay"
    )]
    pub data_dir: PathBuf,

    /// TOML file of simulation settings. Defaults to `config.toml` in the
    /// data directory, when that file exists.
    #[arg(long, short = 'c', global = true, env = "PROXIPAY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Wallet owner.
    #[arg(long, short = 'u', global = true, env = "PROXIPAY_USER", default_value = "demo-user")]
    pub user: String,

    /// Log output format on stderr.
    #[arg(long, global = true, env = "PROXIPAY_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    /// Keep everything in memory; nothing is written to the data directory.
    #[arg(long, global = true)]
    pub ephemeral: bool,

    /// Skip the simulated radio and unlock delays, whatever the config says.
    #[arg(long, global = true)]
    pub instant: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan for nearby vendors and list them nearest first.
    Discover,
    /// Pay a vendor. Runs discovery, selects the vendor and submits.
    Pay(PayArgs),
    /// Print the wallet balance.
    Balance,
    /// List the offline records paid from this wallet.
    History(HistoryArgs),
    /// Forget the MPIN. The balance and records are kept.
    Logout,
}

#[derive(Args, Debug)]
pub struct PayArgs {
    /// Advertisement id of the vendor, e.g. `vendor-bridge`.
    #[arg(long, short = 'v')]
    pub vendor: String,

    /// Amount in XOF, e.g. `50` or `12.5`.
    #[arg(long, short = 'a')]
    pub amount: String,

    /// Name shown to the vendor.
    #[arg(long)]
    pub name: Option<String>,
}

#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// Print the raw records as JSON.
    #[arg(long)]
    pub json: bool,
}
