//! DEX Arbitrage Scanner
//!
//! Command-line front end for the scanner library.
//!
//! Usage:
//!   dexarb-scanner scan --address <TOKEN> [--address <TOKEN> ...] --investment 1000
//!   dexarb-scanner price <QUERY>
//!
//! `scan` prints the ranked opportunities as a JSON array of flat records;
//! `price` prints the deepest quoted pair for a query.
//!
//! Author: AI-Generated
//! Created: 2026-01-27
//! Modified: 2026-10-18 - Scanner CLI: scan and price subcommands

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dexarb_scanner::arbitrage::{OpportunityScanner, ScanMode, ScanRequest, Slippage, TradeParams};
use dexarb_scanner::cache::ContractCache;
use dexarb_scanner::config::ScannerConfig;
use dexarb_scanner::gateway::{DexScreenerClient, QuoteGateway};
use dexarb_scanner::opportunity_logger::OpportunityLogger;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

/// DEX Arbitrage Scanner
#[derive(Parser)]
#[command(name = "dexarb-scanner")]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "SCANNER_CONFIG", default_value = "scanner.toml")]
    config: PathBuf,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Find arbitrage opportunities around seed token or pair addresses
    Scan {
        /// Seed address (repeatable)
        #[arg(short, long = "address", required = true)]
        addresses: Vec<String>,

        /// Initial investment in the entry token
        #[arg(short, long, default_value_t = 1000.0)]
        investment: f64,

        /// Slippage rate for leg 1 (and leg 2 unless --slippage2 is given)
        #[arg(short, long, default_value_t = 0.01)]
        slippage: f64,

        /// Slippage rate for leg 2
        #[arg(long)]
        slippage2: Option<f64>,

        /// Flat fee per leg as a fraction of the investment
        #[arg(short, long, default_value_t = 0.003)]
        fee: f64,

        /// Surface two-leg candidates without closing them into triangles
        #[arg(long)]
        two_leg_only: bool,

        /// Give up on unresolved lookups after this many seconds
        #[arg(long)]
        deadline_secs: Option<u64>,

        /// Append ranked opportunities to daily CSV files in this directory
        #[arg(long, env = "SCANNER_LOG_DIR")]
        log_dir: Option<PathBuf>,
    },

    /// Print the current quote for a token, pair address, or symbol
    Price {
        query: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if args.json_logs {
        fmt().json().with_env_filter(filter).init();
    } else {
        fmt().with_env_filter(filter).with_target(false).init();
    }

    let config = ScannerConfig::load(Some(&args.config))?;

    let client = DexScreenerClient::new(&config.provider.base_url, config.request_timeout())
        .context("Failed to build DexScreener client")?;
    let gateway = Arc::new(QuoteGateway::new(
        Arc::new(client),
        Arc::new(config.rate_limiter()),
        config.retry_policy(),
    ));
    info!(
        "Provider: {} ({} calls / {}s)",
        config.provider.base_url, config.rate_limit.max_calls, config.rate_limit.interval_secs
    );

    match args.command {
        Command::Price { query } => {
            match gateway.spot_quote(&query).await? {
                Some(pair) => println!("{}", serde_json::to_string_pretty(&pair)?),
                None => warn!("No quoted pair for '{}'", query),
            }
        }
        Command::Scan {
            addresses,
            investment,
            slippage,
            slippage2,
            fee,
            two_leg_only,
            deadline_secs,
            log_dir,
        } => {
            let cache = ContractCache::open(config.contract_store()?, config.staleness_policy())?;
            let scanner = OpportunityScanner::new(Arc::clone(&gateway), cache, config.scan_settings());

            let params = TradeParams {
                investment,
                slippage: Slippage {
                    leg1: slippage,
                    leg2: slippage2.unwrap_or(slippage),
                },
                fee_rate: fee,
            };
            let mode = if two_leg_only { ScanMode::TwoLeg } else { config.scan_mode() };

            let mut request = ScanRequest::new(addresses, params).with_mode(mode);
            if let Some(secs) = deadline_secs {
                request = request.with_deadline(Duration::from_secs(secs));
            }

            let report = scanner.find_opportunities(&request).await?;

            if let Some(dir) = log_dir {
                OpportunityLogger::new(dir).log_opportunities(&report.opportunities);
            }

            if report.is_empty() {
                info!("No opportunities found");
            }
            let records: Vec<_> = report.opportunities.iter().map(|opp| opp.record()).collect();
            println!("{}", serde_json::to_string_pretty(&records)?);

            let stats = gateway.stats();
            info!(
                "Upstream: {} calls, {} requests, {} pairs{}",
                stats.calls,
                stats.attempts,
                stats.pairs,
                if report.deadline_hit { " (deadline hit)" } else { "" }
            );
        }
    }

    Ok(())
}
