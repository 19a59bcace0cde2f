//! Signal research CLI.
//!
//! # Usage
//!
//! ```bash
//! # Download and cache prices first
//! price-download --symbols SPY --start 2015-01-01 --end 2023-01-01
//!
//! # Full-history backtest of one parameter value
//! signal-backtest backtest --config config/default.toml --param 20
//!
//! # Walk-forward parameter selection
//! signal-backtest walkforward --config config/default.toml --grid 10,20,40 --output results
//!
//! # Check a price file before using it
//! signal-backtest validate --file data/SPY_2015-01-01_2023-01-01.parquet
//! ```

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use signal_backtest::backtest::backtest_from_signal;
use signal_backtest::config::ResearchConfig;
use signal_backtest::data::{DataLoader, Frame, FrameError};
use signal_backtest::features::Strategy;
use signal_backtest::metrics::{monthly_returns, regime_summary, summary, DrawdownAnalysis};
use signal_backtest::regime::{add_vol_regime, VolRegime, HIGH_VOL};
use signal_backtest::report::{monthly_table, oos_table, summary_table, window_table, write_csv};
use signal_backtest::validation::DataIntegrityValidator;
use signal_backtest::walkforward::{walkforward_select_param, WalkForwardConfig};

const SEPARATOR: &str = "============================================================";

#[derive(Parser)]
#[command(name = "signal-backtest")]
#[command(about = "Daily-bar signal backtesting and walk-forward research")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Price file (parquet or CSV) instead of the cache
    #[arg(short, long, global = true)]
    file: Option<PathBuf>,

    /// Symbol (overrides config)
    #[arg(long, global = true)]
    symbol: Option<String>,

    /// Strategy: momentum or mean_reversion (overrides config)
    #[arg(long, global = true)]
    strategy: Option<Strategy>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single backtest over the full history
    Backtest {
        /// Lookback or z-score window
        #[arg(long)]
        param: Option<usize>,

        /// Fee in basis points per unit of turnover
        #[arg(long)]
        fee_bps: Option<f64>,

        /// Output directory for summary tables
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run walk-forward parameter selection
    Walkforward {
        /// Comma-separated hyperparameter grid
        #[arg(long)]
        grid: Option<String>,

        /// Training years per window
        #[arg(long)]
        train_years: Option<usize>,

        /// Test years per window
        #[arg(long)]
        test_years: Option<usize>,

        /// Fee in basis points per unit of turnover
        #[arg(long)]
        fee_bps: Option<f64>,

        /// Output directory for results
        #[arg(short, long, default_value = "results")]
        output: PathBuf,
    },

    /// Validate price data integrity
    Validate,
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("signal_backtest=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ResearchConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ResearchConfig::default(),
    };
    if let Some(symbol) = &cli.symbol {
        config.data.symbol = symbol.clone();
    }
    if let Some(strategy) = cli.strategy {
        config.strategy.kind = strategy;
    }

    let file = cli.file.as_deref();

    match cli.command {
        Commands::Backtest {
            param,
            fee_bps,
            output,
        } => {
            let param = param.unwrap_or(config.backtest.param);
            let fee_bps = fee_bps.unwrap_or(config.backtest.fee_bps);
            let prices = load_prices(&config, file)?;
            cmd_backtest(&config, &prices, param, fee_bps, output.as_deref())
        }
        Commands::Walkforward {
            grid,
            train_years,
            test_years,
            fee_bps,
            output,
        } => {
            let grid = match grid {
                Some(g) => parse_grid(&g)?,
                None => config.strategy.grid.clone(),
            };
            let wf = walkforward_config(&config, train_years, test_years, fee_bps)?;
            let prices = load_prices(&config, file)?;
            cmd_walkforward(&config, &prices, &grid, &wf, &output)
        }
        Commands::Validate => cmd_validate(&config, file),
    }
}

fn load_prices(config: &ResearchConfig, file: Option<&Path>) -> Result<Frame> {
    let loader = DataLoader::new(&config.data.cache_dir);
    let prices = match file {
        Some(path) => loader
            .load_file(path)
            .with_context(|| format!("Failed to load {}", path.display())),
        None => loader
            .load_cached(&config.data.symbol, config.data.start, config.data.end)?
            .with_context(|| {
                format!(
                    "No cached data at {}; run price-download first or pass --file",
                    loader
                        .cache_path(&config.data.symbol, config.data.start, config.data.end)
                        .display()
                )
            }),
    }?;
    info!("Loaded {} rows for {}", prices.len(), config.data.symbol);
    Ok(prices)
}

fn parse_grid(grid: &str) -> Result<Vec<usize>> {
    grid.split(',')
        .map(|s| {
            s.trim()
                .parse::<usize>()
                .with_context(|| format!("Invalid grid value: {:?}", s))
        })
        .collect()
}

/// Walk-forward settings from config with CLI overrides.
fn walkforward_config(
    config: &ResearchConfig,
    train_years: Option<usize>,
    test_years: Option<usize>,
    fee_bps: Option<f64>,
) -> Result<WalkForwardConfig> {
    let base = config.walkforward.as_ref();
    let train_years = train_years
        .or(base.map(|w| w.train_years))
        .context("Training years not set: pass --train-years or add a [walkforward] section")?;
    let test_years = test_years
        .or(base.map(|w| w.test_years))
        .context("Test years not set: pass --test-years or add a [walkforward] section")?;
    let fee_bps = fee_bps
        .or(base.map(|w| w.fee_bps))
        .unwrap_or(config.backtest.fee_bps);

    let mut wf = base
        .cloned()
        .unwrap_or_else(|| WalkForwardConfig::new(train_years, test_years, fee_bps));
    wf.train_years = train_years;
    wf.test_years = test_years;
    wf.fee_bps = fee_bps;
    Ok(wf)
}

fn cmd_backtest(
    config: &ResearchConfig,
    prices: &Frame,
    param: usize,
    fee_bps: f64,
    output: Option<&Path>,
) -> Result<()> {
    let strategy = config.strategy.kind;
    let features = strategy.build(prices, param)?;
    let features = add_vol_regime(&features, &config.strategy.regime)?;
    let result = backtest_from_signal(
        &features,
        strategy.signal_column(),
        signal_backtest::features::RET_1D,
        fee_bps,
    )?;

    let overall = summary(&result);
    let regimes = regime_summary(&result, HIGH_VOL)?;
    let drawdown = DrawdownAnalysis::from_curve(result.index(), result.equity());
    let months = monthly_returns(&result);

    println!("{}", SEPARATOR);
    println!(
        "{} {} (param {}, {} bps): {} to {}",
        config.data.symbol,
        strategy,
        param,
        fee_bps,
        result.index().first().map(|d| d.to_string()).unwrap_or_default(),
        result.index().last().map(|d| d.to_string()).unwrap_or_default(),
    );
    println!("{}", SEPARATOR);
    println!("{}", overall);

    if let (Some(peak), Some(trough)) = (drawdown.peak_date, drawdown.trough_date) {
        let recovery = drawdown
            .recovery_date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "not recovered".to_string());
        println!(
            "\nWorst drawdown {:.2}%: peak {}, trough {}, recovery {} ({} days)",
            drawdown.max_drawdown * 100.0,
            peak,
            trough,
            recovery,
            drawdown.duration_days
        );
    }

    for group in &regimes {
        let name = VolRegime::from_label(group.label)
            .map(|r| r.description())
            .unwrap_or("Unknown regime");
        println!(
            "\n{} / {} ({} days)\n{}",
            group.key(),
            name,
            group.rows,
            group.summary
        );
    }

    if let (Some(best), Some(worst)) = (
        months.iter().max_by(|a, b| a.return_pct.total_cmp(&b.return_pct)),
        months.iter().min_by(|a, b| a.return_pct.total_cmp(&b.return_pct)),
    ) {
        println!(
            "\n{} months: best {}-{:02} {:.2}%, worst {}-{:02} {:.2}%",
            months.len(),
            best.year,
            best.month,
            best.return_pct,
            worst.year,
            worst.month,
            worst.return_pct
        );
    }

    if let Some(dir) = output {
        let mut rows = vec![("all".to_string(), overall)];
        rows.extend(regimes.iter().map(|g| (g.key(), g.summary)));
        write_csv(&mut summary_table(&rows)?, &dir.join("backtest_summary.csv"))?;
        write_csv(&mut monthly_table(&months)?, &dir.join("backtest_monthly.csv"))?;
    }

    Ok(())
}

fn cmd_walkforward(
    config: &ResearchConfig,
    prices: &Frame,
    grid: &[usize],
    wf: &WalkForwardConfig,
    output: &Path,
) -> Result<()> {
    let strategy = config.strategy.kind;
    let builder = |p: &Frame, param: usize| -> Result<Frame, FrameError> { strategy.build(p, param) };

    info!(
        "Walk-forward {} on {}: grid {:?}, {} train / {} test years",
        strategy, config.data.symbol, grid, wf.train_years, wf.test_years
    );
    let result = walkforward_select_param(prices, &builder, strategy.signal_column(), grid, wf)?;

    println!("{}", SEPARATOR);
    println!("{}", result.summary());
    println!("{}", SEPARATOR);

    if result.windows.is_empty() {
        println!("No walk-forward window had enough data");
    }

    for w in &result.windows {
        println!(
            "  test {} to {}: param {:>4}  train Sharpe {:>6.2}  test Sharpe {:>6.2}  return {:>7.2}%",
            w.test_start,
            w.test_end,
            w.best_para,
            w.train_sharpe,
            w.test_sharpe,
            w.test_total_return * 100.0
        );
    }

    write_csv(&mut window_table(&result.windows)?, &output.join("walkforward_windows.csv"))?;
    write_csv(&mut oos_table(&result.oos)?, &output.join("walkforward_oos.csv"))?;

    Ok(())
}

fn cmd_validate(config: &ResearchConfig, file: Option<&Path>) -> Result<()> {
    let validator = DataIntegrityValidator::new();
    let report = match file {
        Some(path) => validator
            .validate_file(&config.data.symbol, path)
            .with_context(|| format!("Failed to validate {}", path.display()))?,
        None => validator.validate(&config.data.symbol, &load_prices(config, None)?),
    };

    println!("{}", report.summary());
    for check in &report.checks {
        let status = if check.passed { "PASS" } else { "FAIL" };
        println!("  [{}] {}: {}", status, check.name, check.message);
        if let Some(details) = &check.details {
            println!("         {}", details);
        }
    }

    if !report.all_passed() {
        bail!("{} checks failed", report.failed_checks().len());
    }
    Ok(())
}
