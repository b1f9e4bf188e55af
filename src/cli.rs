//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::backtest::{self as backtest_engine, BacktestConfig, BacktestResult};
use crate::domain::config_validation::{validate_backtest_config, validate_data_config};
use crate::domain::error::TradesimError;
use crate::domain::execution::DegenerateStopPolicy;
use crate::domain::metrics::MetricsConfig;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;

#[derive(Parser, Debug)]
#[command(name = "tradesim", about = "Risk-sized trade lifecycle backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Bars and signals CSV, overrides [data] path
        #[arg(short, long)]
        data: Option<PathBuf>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Validate a backtest configuration
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show bar count, time range and signal counts for a data file
    Info {
        #[arg(short, long)]
        data: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            data,
            dry_run,
        } => {
            if dry_run {
                run_dry_run(&config, data.as_deref())
            } else {
                run_backtest(&config, data.as_deref())
            }
        }
        Command::Validate { config } => run_validate(&config),
        Command::Info { data } => run_info(&data),
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = TradesimError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

fn run_backtest(config_path: &Path, data_override: Option<&Path>) -> ExitCode {
    // Stage 1: Load and validate config
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    if let Err(e) = validate_backtest_config(&adapter) {
        eprintln!("error: {e}");
        return (&e).into();
    }

    // Stage 2: Build BacktestConfig
    let bt_config = match build_backtest_config(&adapter) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    // Stage 3: Resolve data source
    let data_path = match resolve_data_path(data_override, &adapter) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    eprintln!("Loading data from {}", data_path.display());
    let data_port = CsvAdapter::new(data_path);

    run_backtest_pipeline(&data_port, &bt_config)
}

/// Build the run configuration from the `[backtest]` section. Absent keys
/// take the [`BacktestConfig`] defaults.
pub fn build_backtest_config(adapter: &dyn ConfigPort) -> Result<BacktestConfig, TradesimError> {
    let defaults = BacktestConfig::default();

    let degenerate_stop = match adapter.get_string("backtest", "degenerate_stop") {
        Some(raw) => raw
            .parse::<DegenerateStopPolicy>()
            .map_err(|reason| TradesimError::invalid("backtest", "degenerate_stop", reason))?,
        None => defaults.degenerate_stop,
    };

    let get = |key: &str, default: f64| adapter.get_double("backtest", key, default);

    let config = BacktestConfig {
        risk_per_trade_pct: get("risk_per_trade_pct", defaults.risk_per_trade_pct),
        take_profit_ratio: get("take_profit_ratio", defaults.take_profit_ratio),
        initial_balance: get("initial_balance", defaults.initial_balance),
        commission_rate: get("commission_rate", defaults.commission_rate),
        slippage_rate: get("slippage_rate", defaults.slippage_rate),
        spread_rate: get("spread_rate", defaults.spread_rate),
        degenerate_stop,
        metrics: MetricsConfig {
            risk_free_rate: get("risk_free_rate", defaults.metrics.risk_free_rate),
            periods_per_year: get("periods_per_year", defaults.metrics.periods_per_year),
        },
    };
    config.validate()?;
    Ok(config)
}

/// `--data` wins over `[data] path`.
pub fn resolve_data_path(
    data_override: Option<&Path>,
    config: &dyn ConfigPort,
) -> Result<PathBuf, TradesimError> {
    if let Some(path) = data_override {
        return Ok(path.to_path_buf());
    }
    validate_data_config(config)?;
    config
        .get_string("data", "path")
        .map(|p| PathBuf::from(p.trim()))
        .ok_or_else(|| TradesimError::ConfigMissing {
            section: "data".into(),
            key: "path".into(),
        })
}

pub fn run_backtest_pipeline(
    data_port: &dyn DataPort,
    bt_config: &BacktestConfig,
) -> ExitCode {
    // Stage 4: Load bars and signals
    let data = match data_port.load() {
        Ok(d) => d,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    // Stage 5: Run backtest
    eprintln!(
        "Running backtest: {} bars, {} long / {} short signals",
        data.bars.len(),
        data.long_signals(),
        data.short_signals(),
    );
    let result = match backtest_engine::run_backtest(&data.bars, &data.signals, bt_config) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    // Stage 6: Print console summary to stderr
    print_summary(&result, bt_config.initial_balance);

    ExitCode::SUCCESS
}

fn print_summary(result: &BacktestResult, initial_balance: f64) {
    let m = &result.metrics;
    eprintln!("\n=== Backtest Results ===");
    eprintln!("Initial Balance:  {:.2}", initial_balance);
    eprintln!("Final Balance:    {:.2}", result.final_balance);
    eprintln!("Total Return:     {:.2}%", m.total_return * 100.0);
    eprintln!("Total Trades:     {}", m.total_trades);
    if m.total_trades == 0 {
        return;
    }
    eprintln!(
        "Win Rate:         {:.1}% ({} won, {} lost)",
        m.win_rate * 100.0,
        m.winning_trades,
        m.losing_trades
    );
    eprintln!("Profit Factor:    {:.2}", m.profit_factor);
    eprintln!("Avg Win:          {:.2}", m.avg_win);
    eprintln!("Avg Loss:         {:.2}", m.avg_loss);
    eprintln!("Largest Win:      {:.2}", m.largest_win);
    eprintln!("Largest Loss:     {:.2}", m.largest_loss);
    eprintln!(
        "Max Drawdown:     -{:.2} ({:.1}%)",
        m.max_drawdown,
        m.max_drawdown_pct * 100.0
    );
    eprintln!("Sharpe Ratio:     {:.2}", m.sharpe_ratio);
    eprintln!("Sortino Ratio:    {:.2}", m.sortino_ratio);
    eprintln!("Avg Bars Held:    {:.1}", m.avg_bars_held);
    eprintln!(
        "Exits:            {} stop loss, {} take profit, {} end of data",
        m.stop_loss_exits, m.take_profit_exits, m.end_of_data_exits
    );

    eprintln!("\n=== Trades ===");
    for t in &result.trades {
        let pnl_sign = if t.profit >= 0.0 { "+" } else { "" };
        eprintln!(
            "  {} {} @ {:.5} -> {} @ {:.5}  {}  {}{:.2}",
            t.direction,
            t.entry_time,
            t.entry_price,
            t.exit_time,
            t.exit_price,
            t.exit_reason,
            pnl_sign,
            t.profit,
        );
    }
}

pub fn run_dry_run(config_path: &Path, data_override: Option<&Path>) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    if let Err(e) = validate_backtest_config(&adapter) {
        eprintln!("error: {e}");
        return (&e).into();
    }
    let bt_config = match build_backtest_config(&adapter) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let data_path = match resolve_data_path(data_override, &adapter) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    eprintln!("Config validated successfully");

    print_config(&bt_config);
    eprintln!("  data:               {}", data_path.display());

    eprintln!("\nDry run complete: configuration is valid");
    ExitCode::SUCCESS
}

fn print_config(config: &BacktestConfig) {
    eprintln!("\nBacktest parameters:");
    eprintln!("  risk_per_trade_pct: {}", config.risk_per_trade_pct);
    eprintln!("  take_profit_ratio:  {}", config.take_profit_ratio);
    eprintln!("  initial_balance:    {}", config.initial_balance);
    eprintln!("  commission_rate:    {}", config.commission_rate);
    eprintln!("  slippage_rate:      {}", config.slippage_rate);
    eprintln!("  spread_rate:        {}", config.spread_rate);
    eprintln!("  degenerate_stop:    {:?}", config.degenerate_stop);
    eprintln!("  risk_free_rate:     {}", config.metrics.risk_free_rate);
    eprintln!("  periods_per_year:   {}", config.metrics.periods_per_year);
}

fn run_validate(config_path: &Path) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    if let Err(e) = validate_backtest_config(&adapter) {
        eprintln!("error: {e}");
        return (&e).into();
    }
    match build_backtest_config(&adapter) {
        Ok(config) => print_config(&config),
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    }

    eprintln!("\nBacktest configuration is valid.");
    ExitCode::SUCCESS
}

fn run_info(data_path: &Path) -> ExitCode {
    let data = match CsvAdapter::new(data_path).load() {
        Ok(d) => d,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    match (data.bars.first(), data.bars.last()) {
        (Some(first), Some(last)) => {
            println!(
                "{}: {} bars, {} to {}",
                data_path.display(),
                data.bars.len(),
                first.timestamp,
                last.timestamp
            );
            println!(
                "signals: {} long, {} short",
                data.long_signals(),
                data.short_signals()
            );
        }
        _ => eprintln!("{}: no data found", data_path.display()),
    }
    ExitCode::SUCCESS
}
