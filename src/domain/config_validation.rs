//! Configuration validation.
//!
//! Checks every section before an engine is built. Missing keys fall back to
//! defaults; present keys must hold usable values.

use crate::domain::engine::{Mode, SUPPORTED_TIMEFRAMES};
use crate::domain::error::EngineError;
use crate::domain::position::TrailTier;
use crate::ports::config_port::ConfigPort;

pub const DEFAULT_TRAIL_TIERS: &str = "0.75:0.25, 1.5:0.6, 3.0:1.2";

/// Ten years of hourly history.
pub const MAX_LOOKBACK_HOURS: i64 = 24 * 365 * 10;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Boolean words accepted in config files, case-insensitive.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

pub fn validate_config(config: &dyn ConfigPort) -> Result<(), EngineError> {
    validate_engine_section(config)?;
    validate_signal_section(config)?;
    validate_indicator_section(config)?;
    validate_risk_section(config)?;
    validate_trailing_section(config)?;
    validate_output_section(config)?;
    Ok(())
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> EngineError {
    EngineError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

/// A present key that does not parse as an integer is an error rather than
/// silently falling back to the default.
fn require_int(config: &dyn ConfigPort, section: &str, key: &str) -> Result<(), EngineError> {
    match config.get_string(section, key) {
        Some(raw) if raw.trim().parse::<i64>().is_err() => {
            Err(invalid(section, key, format!("{key} must be an integer")))
        }
        _ => Ok(()),
    }
}

fn require_number(config: &dyn ConfigPort, section: &str, key: &str) -> Result<(), EngineError> {
    match config.get_string(section, key) {
        Some(raw) if !raw.trim().parse::<f64>().is_ok_and(f64::is_finite) => {
            Err(invalid(section, key, format!("{key} must be a finite number")))
        }
        _ => Ok(()),
    }
}

fn require_bool(config: &dyn ConfigPort, section: &str, key: &str) -> Result<(), EngineError> {
    match config.get_string(section, key) {
        Some(raw) if parse_bool(&raw).is_none() => Err(invalid(
            section,
            key,
            format!("{key} must be true or false"),
        )),
        _ => Ok(()),
    }
}

fn validate_engine_section(config: &dyn ConfigPort) -> Result<(), EngineError> {
    if let Some(raw) = config.get_string("engine", "mode") {
        match raw.parse::<Mode>() {
            Ok(Mode::Paper) | Ok(Mode::Live) => {}
            _ => return Err(invalid("engine", "mode", "mode must be paper or live")),
        }
    }

    if let Some(symbol) = config.get_string("engine", "symbol") {
        if symbol.trim().is_empty() {
            return Err(invalid("engine", "symbol", "symbol must not be empty"));
        }
    }

    for key in ["tick_interval_secs", "timeframe_min", "lookback_hours", "min_candles"] {
        require_int(config, "engine", key)?;
    }

    if config.get_int("engine", "tick_interval_secs", 60) < 1 {
        return Err(invalid(
            "engine",
            "tick_interval_secs",
            "tick_interval_secs must be at least 1",
        ));
    }

    let timeframe = config.get_int("engine", "timeframe_min", 60);
    if !SUPPORTED_TIMEFRAMES
        .iter()
        .any(|&tf| i64::from(tf) == timeframe)
    {
        return Err(invalid(
            "engine",
            "timeframe_min",
            format!("timeframe_min must be one of {:?}", SUPPORTED_TIMEFRAMES),
        ));
    }

    let lookback = config.get_int("engine", "lookback_hours", 240);
    if !(1..=MAX_LOOKBACK_HOURS).contains(&lookback) {
        return Err(invalid(
            "engine",
            "lookback_hours",
            format!("lookback_hours must be between 1 and {MAX_LOOKBACK_HOURS}"),
        ));
    }

    if config.get_int("engine", "min_candles", 50) < 1 {
        return Err(invalid(
            "engine",
            "min_candles",
            "min_candles must be at least 1",
        ));
    }

    if let Some(level) = config.get_string("engine", "log_level") {
        if !LOG_LEVELS.contains(&level.trim().to_lowercase().as_str()) {
            return Err(invalid(
                "engine",
                "log_level",
                format!("log_level must be one of {}", LOG_LEVELS.join(", ")),
            ));
        }
    }
    Ok(())
}

fn validate_signal_section(config: &dyn ConfigPort) -> Result<(), EngineError> {
    for key in ["pamm_min", "pamm_min_high_vol", "pamm_min_low_vol"] {
        require_number(config, "signal", key)?;
        if config.get_double("signal", key, 115.0) <= 0.0 {
            return Err(invalid("signal", key, format!("{key} must be positive")));
        }
    }
    require_bool(config, "signal", "allow_shorts")
}

fn validate_indicator_section(config: &dyn ConfigPort) -> Result<(), EngineError> {
    let defaults = [
        ("rsi_len", 14),
        ("macd_fast", 12),
        ("macd_slow", 26),
        ("macd_signal", 9),
        ("atr_len", 14),
    ];
    for (key, default) in defaults {
        require_int(config, "indicators", key)?;
        if config.get_int("indicators", key, default) < 1 {
            return Err(invalid(
                "indicators",
                key,
                format!("{key} must be at least 1"),
            ));
        }
    }

    let fast = config.get_int("indicators", "macd_fast", 12);
    let slow = config.get_int("indicators", "macd_slow", 26);
    if fast >= slow {
        return Err(invalid(
            "indicators",
            "macd_fast",
            "macd_fast must be less than macd_slow",
        ));
    }
    Ok(())
}

fn validate_risk_section(config: &dyn ConfigPort) -> Result<(), EngineError> {
    let positive = [
        ("daily_max_loss_usd", 500.0),
        ("daily_max_drawdown_usd", 1000.0),
        ("position_size_usd", 500.0),
    ];
    for (key, default) in positive {
        require_number(config, "risk", key)?;
        if config.get_double("risk", key, default) <= 0.0 {
            return Err(invalid("risk", key, format!("{key} must be positive")));
        }
    }

    require_number(config, "risk", "initial_stop_loss_pct")?;
    let stop = config.get_double("risk", "initial_stop_loss_pct", 1.0);
    if stop <= 0.0 || stop >= 100.0 {
        return Err(invalid(
            "risk",
            "initial_stop_loss_pct",
            "initial_stop_loss_pct must be between 0 and 100",
        ));
    }
    Ok(())
}

fn validate_trailing_section(config: &dyn ConfigPort) -> Result<(), EngineError> {
    let raw = config
        .get_string("trailing", "tiers")
        .unwrap_or_else(|| DEFAULT_TRAIL_TIERS.to_string());
    parse_trail_tiers(&raw)?;
    require_bool(config, "trailing", "macd_flip_exit_enabled")
}

fn validate_output_section(config: &dyn ConfigPort) -> Result<(), EngineError> {
    for key in ["save_trades_csv", "save_winners_csv", "save_losers_csv"] {
        require_bool(config, "output", key)?;
    }
    Ok(())
}

/// Parse `trigger:lock` pairs separated by commas, e.g. `0.75:0.25, 1.5:0.6`.
///
/// Values must be finite and non-negative, triggers strictly ascending and
/// each lock no greater than its trigger. An empty string means no tiers.
pub fn parse_trail_tiers(raw: &str) -> Result<Vec<TrailTier>, EngineError> {
    let bad = |reason: String| invalid("trailing", "tiers", reason);

    let mut tiers: Vec<TrailTier> = Vec::new();
    for item in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let (trigger, lock) = item
            .split_once(':')
            .ok_or_else(|| bad(format!("'{item}' is not a trigger:lock pair")))?;
        let trigger_pct: f64 = trigger
            .trim()
            .parse()
            .map_err(|_| bad(format!("invalid trigger '{}'", trigger.trim())))?;
        let lock_pct: f64 = lock
            .trim()
            .parse()
            .map_err(|_| bad(format!("invalid lock '{}'", lock.trim())))?;

        if !trigger_pct.is_finite() || !lock_pct.is_finite() || trigger_pct < 0.0 || lock_pct < 0.0
        {
            return Err(bad(format!("'{item}' must be finite and non-negative")));
        }
        if lock_pct > trigger_pct {
            return Err(bad(format!("'{item}' locks more than it triggers")));
        }
        if let Some(prev) = tiers.last() {
            if trigger_pct <= prev.trigger_pct {
                return Err(bad("triggers must be strictly ascending".to_string()));
            }
        }
        tiers.push(TrailTier {
            trigger_pct,
            lock_pct,
        });
    }
    Ok(tiers)
}
