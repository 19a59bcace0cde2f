//! Daily price downloader.
//!
//! Fetches OHLCV history from Yahoo Finance and caches it as parquet under
//! `{cache_dir}/{symbol}_{start}_{end}.parquet`. Symbols already cached for
//! the same range are not fetched again.
//!
//! # Usage
//!
//! ```bash
//! price-download --symbols SPY,QQQ,IWM --start 2015-01-01 --end 2023-01-01
//!
//! # Unadjusted prices into a custom directory
//! price-download --symbols SPY --no-adjust --cache-dir data/raw
//! ```

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, Utc};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::warn;

use signal_backtest::data::{DataLoader, YahooClient, YahooConfig};
use signal_backtest::validation::DataIntegrityValidator;

const SEPARATOR: &str = "============================================================";

/// Yahoo Finance price downloader CLI.
#[derive(Parser)]
#[command(name = "price-download")]
#[command(about = "Download daily price history into the parquet cache")]
struct Cli {
    /// Comma-separated list of symbols
    #[arg(long, default_value = "SPY")]
    symbols: String,

    /// Start date (YYYY-MM-DD)
    #[arg(long, default_value = "2015-01-01")]
    start: String,

    /// End date (YYYY-MM-DD), defaults to today
    #[arg(long)]
    end: Option<String>,

    /// Cache directory
    #[arg(long, default_value = "data")]
    cache_dir: PathBuf,

    /// Keep raw prices instead of split/dividend adjusted ones
    #[arg(long)]
    no_adjust: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("signal_backtest=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let symbols: Vec<&str> = cli
        .symbols
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();
    let start = NaiveDate::parse_from_str(&cli.start, "%Y-%m-%d")
        .context("Invalid start date format")?;
    let end = match &cli.end {
        Some(e) => NaiveDate::parse_from_str(e, "%Y-%m-%d").context("Invalid end date format")?,
        None => Utc::now().date_naive(),
    };
    if end <= start {
        bail!("End date {} must be after start date {}", end, start);
    }

    let client = YahooClient::new(YahooConfig {
        auto_adjust: !cli.no_adjust,
        ..Default::default()
    })?;
    let loader = DataLoader::new(&cli.cache_dir);
    let validator = DataIntegrityValidator::new();

    println!("\nDownload Plan:");
    println!("  Symbols: {:?}", symbols);
    println!("  Date range: {} to {}", start, end);
    println!("  Cache: {}", cli.cache_dir.display());
    println!();

    let pb = ProgressBar::new(symbols.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")?
            .progress_chars("=>-"),
    );

    let start_time = Instant::now();
    let mut failures: Vec<(String, String)> = Vec::new();
    let mut reports = Vec::new();

    for symbol in &symbols {
        pb.set_message(symbol.to_string());

        match loader.fetch_prices(&client, symbol, start, end).await {
            Ok(prices) => reports.push(validator.validate(symbol, &prices)),
            Err(e) => {
                warn!("{}: {}", symbol, e);
                failures.push((symbol.to_string(), e.to_string()));
            }
        }

        pb.inc(1);
    }
    pb.finish_with_message("done");

    println!("\n{}", SEPARATOR);
    println!("Download Complete ({:.1}s)", start_time.elapsed().as_secs_f64());
    println!("{}", SEPARATOR);
    for report in &reports {
        println!("  {}", report.summary());
        for check in report.failed_checks() {
            println!("    FAIL {}: {}", check.name, check.message);
        }
    }
    for (symbol, error) in &failures {
        println!("  {}: FAILED - {}", symbol, error);
    }

    if reports.is_empty() {
        bail!("No symbols downloaded");
    }
    Ok(())
}
