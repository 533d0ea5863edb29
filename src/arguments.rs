/// Command-line argument handling
///
/// Two layers:
/// - Raw argument storage (`CMD_ARGS`) scanned by the logger for
///   `--debug-<tag>`, `--verbose-<tag>` and `--only-<tag>` flags
/// - The clap command tree, parsed from the arguments with those dynamic
///   logger flags removed
use clap::{Args, Parser, Subcommand};
use once_cell::sync::Lazy;
use std::env;
use std::path::PathBuf;
use std::sync::Mutex;

/// Global command-line arguments storage
pub static CMD_ARGS: Lazy<Mutex<Vec<String>>> = Lazy::new(|| Mutex::new(env::args().collect()));

/// Override the stored arguments (tests and embedding binaries)
pub fn set_cmd_args(args: Vec<String>) {
    if let Ok(mut cmd_args) = CMD_ARGS.lock() {
        *cmd_args = args;
    }
}

pub fn get_cmd_args() -> Vec<String> {
    match CMD_ARGS.lock() {
        Ok(args) => args.clone(),
        Err(_) => env::args().collect(),
    }
}

const LOGGER_FLAG_PREFIXES: [&str; 3] = ["--debug-", "--verbose-", "--only-"];

/// Arguments with the logger's dynamic per-tag flags removed
pub fn clap_args(args: &[String]) -> Vec<String> {
    args.iter()
        .filter(|arg| !LOGGER_FLAG_PREFIXES.iter().any(|prefix| arg.starts_with(prefix)))
        .cloned()
        .collect()
}

pub fn parse_cli() -> Cli {
    Cli::parse_from(clap_args(&get_cmd_args()))
}

// =============================================================================
// CLAP COMMAND TREE
// =============================================================================

#[derive(Debug, Parser)]
#[command(
    name = "swapengine",
    version,
    about = "Multi-router token swap engine",
    after_help = "Logger flags: --debug-<tag>, --verbose-<tag>, --only-<tag>, --debug-all\n\
                  Tags: system, config, swap, router, route, gas, liquidity, slippage, simulation, rpc, wallet"
)]
pub struct Cli {
    /// Config file (default: <data dir>/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Build and sign transactions without broadcasting them
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Only warnings and errors
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Show verbose logs for every tag
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Do not write a log file
    #[arg(long, global = true)]
    pub no_log_file: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show the wallet balance of a token (or the native coin)
    Balance {
        /// Token address, known symbol, or the native symbol
        token: String,
        /// Address to inspect instead of the configured wallet
        #[arg(long)]
        owner: Option<String>,
    },
    /// Best route across all routers
    Quote(SwapArgs),
    /// Quotes from every router side by side
    Compare(SwapArgs),
    /// Dry-run preview of a swap
    Simulate(SwapArgs),
    /// Execute a swap
    Swap(SwapArgs),
    /// Buy a token with the native coin
    Buy {
        token: String,
        /// Native amount, e.g. 0.01
        amount: String,
        #[arg(long)]
        slippage_bps: Option<u16>,
    },
    /// Sell a percentage of the wallet's token balance for the native coin
    Sell {
        token: String,
        #[arg(long, default_value_t = 100.0)]
        percent: f64,
        #[arg(long)]
        slippage_bps: Option<u16>,
    },
    /// Configuration file management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Balance check, buy and sell against an in-memory chain
    Demo,
}

#[derive(Debug, Clone, Args)]
pub struct SwapArgs {
    /// Input token (address, symbol, or native symbol)
    #[arg(long)]
    pub from: String,
    /// Output token (address, symbol, or native symbol)
    #[arg(long)]
    pub to: String,
    /// Amount in human units of the input token (output token with --exact-out)
    #[arg(long)]
    pub amount: String,
    #[arg(long)]
    pub slippage_bps: Option<u16>,
    /// Treat --amount as the exact output to receive
    #[arg(long)]
    pub exact_out: bool,
}

#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Write a default config file
    Init {
        #[arg(long)]
        force: bool,
    },
    /// Print the effective configuration
    Show,
    /// Validate the configuration file
    Validate,
}
