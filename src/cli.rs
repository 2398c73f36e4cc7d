//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::adapters::csv_adapter::CsvCandleAdapter;
use crate::adapters::csv_trade_sink::{CsvOutputSettings, CsvTradeSink};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::system_clock::SystemClock;
use crate::domain::config_validation::{parse_trail_tiers, validate_config, DEFAULT_TRAIL_TIERS};
use crate::domain::engine::{Engine, EngineConfig, Evaluation, Mode};
use crate::domain::error::EngineError;
use crate::domain::indicator::IndicatorSettings;
use crate::domain::position::{entry_side, PositionRules};
use crate::domain::risk::RiskLimits;
use crate::domain::signal::Thresholds;
use crate::ports::config_port::ConfigPort;
use crate::runtime::scheduler::{lock_engine, Scheduler, SchedulerExit};

#[derive(Parser, Debug)]
#[command(name = "pammtrader", about = "PAMM signal trading engine")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the engine until interrupted or halted by the risk limits
    Run {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
        #[arg(long)]
        mode: Option<String>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Score the latest candles without opening a position
    Inspect {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
    },
}

/// Settings for the process around the engine rather than the engine itself.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeSettings {
    pub tick_interval: Duration,
    pub log_level: String,
    pub data_dir: PathBuf,
    pub trades_dir: PathBuf,
    pub output: CsvOutputSettings,
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Run {
            config,
            symbol,
            mode,
        } => run_engine(&config, symbol.as_deref(), mode.as_deref()),
        Command::Validate { config } => run_validate(&config),
        Command::Inspect { config, symbol } => run_inspect(&config, symbol.as_deref()),
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|err| {
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

/// Install the global `tracing` subscriber. `RUST_LOG` overrides `level`.
pub fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn config_invalid(section: &str, key: &str, reason: impl Into<String>) -> EngineError {
    EngineError::ConfigInvalid {
        section: section.into(),
        key: key.into(),
        reason: reason.into(),
    }
}

fn int_setting<T: TryFrom<i64>>(
    adapter: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: i64,
) -> Result<T, EngineError> {
    let value = adapter.get_int(section, key, default);
    T::try_from(value).map_err(|_| config_invalid(section, key, format!("{value} is out of range")))
}

pub fn build_engine_config(adapter: &dyn ConfigPort) -> Result<EngineConfig, EngineError> {
    let mode = match adapter.get_string("engine", "mode") {
        Some(raw) => raw
            .parse::<Mode>()
            .map_err(|e| config_invalid("engine", "mode", e.to_string()))?,
        None => Mode::Paper,
    };
    let symbol = adapter
        .get_string("engine", "symbol")
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "BTCUSD".to_string());

    let tiers = parse_trail_tiers(
        &adapter
            .get_string("trailing", "tiers")
            .unwrap_or_else(|| DEFAULT_TRAIL_TIERS.to_string()),
    )?;

    Ok(EngineConfig {
        symbol,
        mode,
        timeframe_min: int_setting(adapter, "engine", "timeframe_min", 60)?,
        lookback_hours: int_setting(adapter, "engine", "lookback_hours", 240)?,
        min_candles: int_setting(adapter, "engine", "min_candles", 50)?,
        indicators: IndicatorSettings {
            rsi_len: int_setting(adapter, "indicators", "rsi_len", 14)?,
            macd_fast: int_setting(adapter, "indicators", "macd_fast", 12)?,
            macd_slow: int_setting(adapter, "indicators", "macd_slow", 26)?,
            macd_signal: int_setting(adapter, "indicators", "macd_signal", 9)?,
            atr_len: int_setting(adapter, "indicators", "atr_len", 14)?,
        },
        thresholds: Thresholds {
            normal: adapter.get_double("signal", "pamm_min", 115.0),
            high_vol: adapter.get_double("signal", "pamm_min_high_vol", 115.0),
            low_vol: adapter.get_double("signal", "pamm_min_low_vol", 115.0),
        },
        rules: PositionRules {
            stop_loss_pct: adapter.get_double("risk", "initial_stop_loss_pct", 1.0),
            tiers,
            allow_shorts: adapter.get_bool("signal", "allow_shorts", true),
            macd_flip_exit: adapter.get_bool("trailing", "macd_flip_exit_enabled", false),
        },
        limits: RiskLimits {
            daily_max_loss: adapter.get_double("risk", "daily_max_loss_usd", 500.0),
            daily_max_drawdown: adapter.get_double("risk", "daily_max_drawdown_usd", 1000.0),
        },
        position_size_usd: adapter.get_double("risk", "position_size_usd", 500.0),
    })
}

pub fn build_runtime_settings(adapter: &dyn ConfigPort) -> Result<RuntimeSettings, EngineError> {
    let tick_secs: u64 = int_setting(adapter, "engine", "tick_interval_secs", 60)?;
    let data_dir = adapter
        .get_string("engine", "data_dir")
        .map(PathBuf::from)
        .ok_or_else(|| EngineError::ConfigMissing {
            section: "engine".into(),
            key: "data_dir".into(),
        })?;

    Ok(RuntimeSettings {
        tick_interval: Duration::from_secs(tick_secs),
        log_level: adapter
            .get_string("engine", "log_level")
            .map(|l| l.trim().to_lowercase())
            .unwrap_or_else(|| "info".to_string()),
        data_dir,
        trades_dir: adapter
            .get_string("output", "trades_dir")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(".")),
        output: CsvOutputSettings {
            save_trades: adapter.get_bool("output", "save_trades_csv", true),
            save_winners: adapter.get_bool("output", "save_winners_csv", true),
            save_losers: adapter.get_bool("output", "save_losers_csv", true),
        },
    })
}

/// Load, validate and build both halves of the configuration.
fn prepare(config_path: &Path) -> Result<(EngineConfig, RuntimeSettings), ExitCode> {
    let adapter = load_config(config_path)?;
    let built = validate_config(&adapter)
        .and_then(|_| build_engine_config(&adapter))
        .and_then(|engine| Ok((engine, build_runtime_settings(&adapter)?)));
    built.map_err(|e| {
        eprintln!("error: {e}");
        ExitCode::from(&e)
    })
}

fn build_engine(config: EngineConfig, settings: &RuntimeSettings) -> Engine {
    Engine::new(
        config,
        Box::new(CsvCandleAdapter::new(settings.data_dir.clone())),
        Box::new(SystemClock),
        Box::new(CsvTradeSink::new(
            settings.trades_dir.clone(),
            settings.output,
        )),
    )
}

fn run_engine(config_path: &Path, symbol: Option<&str>, mode: Option<&str>) -> ExitCode {
    let (engine_config, settings) = match prepare(config_path) {
        Ok(prepared) => prepared,
        Err(code) => return code,
    };
    init_tracing(&settings.log_level);

    let mode = match mode.map(str::parse::<Mode>).transpose() {
        Ok(mode) => mode.unwrap_or(engine_config.mode),
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let symbol = symbol
        .map(str::to_string)
        .unwrap_or_else(|| engine_config.symbol.clone());

    let mut engine = build_engine(engine_config, &settings);
    if let Err(e) = engine.start(mode, &symbol) {
        eprintln!("error: {e}");
        return (&e).into();
    }
    let shared = Arc::new(Mutex::new(engine));

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            let err = EngineError::from(e);
            eprintln!("error: {err}");
            return (&err).into();
        }
    };

    let shutdown = CancellationToken::new();
    let scheduler = Scheduler::new(Arc::clone(&shared), settings.tick_interval, shutdown.clone());
    let exit = runtime.block_on(async {
        let interrupt = shutdown.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = interrupt.cancelled() => {}
                signal = tokio::signal::ctrl_c() => {
                    if signal.is_ok() {
                        info!("interrupt received");
                    }
                    interrupt.cancel();
                }
            }
        });
        scheduler.run().await
    });

    let mut engine = lock_engine(&shared);
    if engine.is_running() {
        if let Err(e) = engine.stop() {
            warn!(error = %e, "failed to stop engine");
        }
    }

    match serde_json::to_string_pretty(&engine.state()) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("error: failed to serialize state: {e}"),
    }

    if let SchedulerExit::Halted(reason) = exit {
        eprintln!("Engine halted: {reason}");
    }
    ExitCode::SUCCESS
}

fn run_validate(config_path: &Path) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let (config, settings) = match prepare(config_path) {
        Ok(prepared) => prepared,
        Err(code) => return code,
    };

    eprintln!("\nEngine:");
    eprintln!("  symbol:         {}", config.symbol);
    eprintln!("  mode:           {}", config.mode);
    eprintln!("  timeframe:      {}m", config.timeframe_min);
    eprintln!("  lookback:       {}h", config.lookback_hours);
    eprintln!("  min candles:    {}", config.min_candles);
    eprintln!("  tick interval:  {}s", settings.tick_interval.as_secs());
    eprintln!("  data dir:       {}", settings.data_dir.display());

    eprintln!("\nIndicators:");
    for indicator in config.indicators.indicator_types() {
        eprintln!("  {indicator}");
    }

    eprintln!("\nSignal:");
    eprintln!(
        "  PAMM threshold: {} (high vol {}, low vol {})",
        config.thresholds.normal, config.thresholds.high_vol, config.thresholds.low_vol
    );
    eprintln!("  allow shorts:   {}", config.rules.allow_shorts);

    eprintln!("\nRisk:");
    eprintln!("  daily max loss:     ${:.2}", config.limits.daily_max_loss);
    eprintln!("  daily max drawdown: ${:.2}", config.limits.daily_max_drawdown);
    eprintln!("  initial stop:       {}%", config.rules.stop_loss_pct);
    eprintln!("  position size:      ${:.2}", config.position_size_usd);

    eprintln!("\nTrailing tiers:");
    for (i, tier) in config.rules.tiers.iter().enumerate() {
        eprintln!(
            "  {}: +{}% locks +{}%",
            i + 1,
            tier.trigger_pct,
            tier.lock_pct
        );
    }
    eprintln!("  MACD flip exit: {}", config.rules.macd_flip_exit);

    eprintln!("\nConfiguration is valid.");
    ExitCode::SUCCESS
}

fn run_inspect(config_path: &Path, symbol: Option<&str>) -> ExitCode {
    let (config, settings) = match prepare(config_path) {
        Ok(prepared) => prepared,
        Err(code) => return code,
    };
    init_tracing(&settings.log_level);

    let symbol = symbol
        .map(str::to_string)
        .unwrap_or_else(|| config.symbol.clone());
    let allow_shorts = config.rules.allow_shorts;
    let engine = build_engine(config, &settings);

    let reading = match engine.evaluate(&symbol, None) {
        Ok(Evaluation::Ready(reading)) => reading,
        Ok(Evaluation::InsufficientHistory { candles, required }) => {
            eprintln!("{symbol}: only {candles} candles, need {required}");
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let fmt = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |v| format!("{v:.4}"));
    eprintln!("{} @ {} ({} candles)", symbol, reading.time, reading.candles);
    eprintln!("  price:      {:.2}", reading.price);
    eprintln!("  RSI:        {}", fmt(reading.indicators.rsi));
    eprintln!("  MACD:       {}", fmt(reading.indicators.macd));
    eprintln!("  histogram:  {}", fmt(reading.indicators.histogram));
    eprintln!("  ATR:        {}", fmt(reading.indicators.atr));
    eprintln!("  ATR base:   {}", fmt(reading.atr_baseline));
    eprintln!("  score:      {:.0}", reading.score);
    eprintln!("  threshold:  {:.0}", reading.threshold);
    match entry_side(reading.score, reading.threshold, allow_shorts) {
        Some(side) => eprintln!("  signal:     {side}"),
        None => eprintln!("  signal:     none"),
    }

    match serde_json::to_string_pretty(&reading) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("error: failed to serialize reading: {e}"),
    }
    ExitCode::SUCCESS
}
