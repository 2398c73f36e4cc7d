//! The trading engine: one explicit value owning all mutable run state.
//!
//! Collaborators are injected as ports so the engine can be driven by the
//! tokio scheduler in production and stepped by hand in tests. Every state
//! change happens inside [`Engine::start`], [`Engine::stop`] or
//! [`Engine::tick`], and the caller serializes those calls.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, error, info, warn};

use super::candle::{self, Candle};
use super::error::EngineError;
use super::indicator::{IndicatorFrame, IndicatorReading, IndicatorSettings};
use super::position::{self, Exit, Position, PositionRules, Side, TickInput};
use super::risk::{HaltReason, RiskLedger, RiskLimits};
use super::signal::{self, Thresholds};
use super::trade::{IndicatorSnapshot, Trade, TradeContext, TradeSummary};
use crate::ports::clock_port::Clock;
use crate::ports::market_data_port::MarketDataPort;
use crate::ports::trade_sink_port::TradeSink;

/// Candle bucket sizes the engine accepts, in minutes.
pub const SUPPORTED_TIMEFRAMES: [u32; 7] = [1, 5, 15, 30, 60, 240, 1440];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Idle,
    Paper,
    Live,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Idle => write!(f, "idle"),
            Mode::Paper => write!(f, "paper"),
            Mode::Live => write!(f, "live"),
        }
    }
}

impl FromStr for Mode {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "idle" => Ok(Mode::Idle),
            "paper" => Ok(Mode::Paper),
            "live" => Ok(Mode::Live),
            other => Err(EngineError::invalid_argument(format!(
                "unknown mode '{other}', expected paper or live"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub symbol: String,
    pub mode: Mode,
    pub timeframe_min: u32,
    pub lookback_hours: u32,
    /// Ticks with fewer candles than this are skipped.
    pub min_candles: usize,
    pub indicators: IndicatorSettings,
    pub thresholds: Thresholds,
    pub rules: PositionRules,
    pub limits: RiskLimits,
    pub position_size_usd: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            symbol: "BTCUSD".to_string(),
            mode: Mode::Paper,
            timeframe_min: 60,
            lookback_hours: 240,
            min_candles: 50,
            indicators: IndicatorSettings::default(),
            thresholds: Thresholds::default(),
            rules: PositionRules::default(),
            limits: RiskLimits::default(),
            position_size_usd: 500.0,
        }
    }
}

/// Indicator values, threshold and score at the latest candle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SignalReading {
    pub time: DateTime<Utc>,
    pub price: f64,
    pub candles: usize,
    pub indicators: IndicatorReading,
    pub atr_baseline: Option<f64>,
    pub threshold: f64,
    pub score: f64,
}

impl SignalReading {
    pub fn snapshot(&self) -> IndicatorSnapshot {
        IndicatorSnapshot {
            score: self.score,
            rsi: self.indicators.rsi,
            macd: self.indicators.macd,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    InsufficientHistory { candles: usize, required: usize },
    Ready(SignalReading),
}

/// What a single [`Engine::tick`] did.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    NotRunning,
    InsufficientHistory {
        candles: usize,
        required: usize,
    },
    Evaluated {
        signal: SignalReading,
        opened: Option<Side>,
        closed: Option<Trade>,
        halted: Option<HaltReason>,
    },
    Failed {
        reason: String,
    },
}

/// Read-only view of the engine for status queries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineSnapshot {
    pub running: bool,
    pub mode: Mode,
    pub symbol: String,
    pub position: Option<Position>,
    pub summary: TradeSummary,
    pub last_error: Option<String>,
    pub trade_count: usize,
    pub daily_pnl: f64,
    pub daily_drawdown: f64,
    pub atr_baseline: Option<f64>,
    pub halt_reason: Option<HaltReason>,
}

#[derive(Debug, Clone, Default)]
struct EngineState {
    running: bool,
    mode: Mode,
    symbol: String,
    position: Option<Position>,
    trades: Vec<Trade>,
    summary: TradeSummary,
    ledger: RiskLedger,
    last_error: Option<String>,
    atr_baseline: Option<f64>,
    halt_reason: Option<HaltReason>,
}

pub struct Engine {
    config: EngineConfig,
    market_data: Box<dyn MarketDataPort + Send>,
    clock: Box<dyn Clock + Send>,
    sink: Box<dyn TradeSink + Send>,
    state: EngineState,
    trade_seq: u64,
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        market_data: Box<dyn MarketDataPort + Send>,
        clock: Box<dyn Clock + Send>,
        sink: Box<dyn TradeSink + Send>,
    ) -> Self {
        let state = EngineState {
            symbol: config.symbol.clone(),
            ..EngineState::default()
        };
        Engine {
            config,
            market_data,
            clock,
            sink,
            state,
            trade_seq: 0,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.state.running
    }

    /// Begin a session. Resets the risk ledger, the last error and the
    /// volatility baseline; the trade log is kept.
    pub fn start(&mut self, mode: Mode, symbol: &str) -> Result<(), EngineError> {
        if self.state.running {
            return Err(EngineError::AlreadyRunning);
        }
        if mode == Mode::Idle {
            return Err(EngineError::invalid_argument(
                "engine must be started in paper or live mode",
            ));
        }
        let symbol = symbol.trim();
        if symbol.is_empty() {
            return Err(EngineError::invalid_argument("symbol must not be empty"));
        }

        if self.state.symbol != symbol {
            if let Some(position) = self.state.position.take() {
                warn!(
                    previous = %self.state.symbol,
                    side = %position.side,
                    entry = position.entry_price,
                    "discarding open position from previous symbol"
                );
            }
        }

        self.state.running = true;
        self.state.mode = mode;
        self.state.symbol = symbol.to_string();
        self.state.ledger = RiskLedger::default();
        self.state.last_error = None;
        self.state.atr_baseline = None;
        self.state.halt_reason = None;

        info!(%mode, symbol, timeframe_min = self.config.timeframe_min, "engine started");
        Ok(())
    }

    /// An open position is left in place.
    pub fn stop(&mut self) -> Result<(), EngineError> {
        if !self.state.running {
            return Err(EngineError::NotRunning);
        }
        self.state.running = false;
        self.state.mode = Mode::Idle;
        info!(symbol = %self.state.symbol, "engine stopped");
        Ok(())
    }

    pub fn state(&self) -> EngineSnapshot {
        let state = &self.state;
        EngineSnapshot {
            running: state.running,
            mode: state.mode,
            symbol: state.symbol.clone(),
            position: state.position.clone(),
            summary: state.summary,
            last_error: state.last_error.clone(),
            trade_count: state.trades.len(),
            daily_pnl: state.ledger.daily_realized_pnl,
            daily_drawdown: state.ledger.daily_drawdown,
            atr_baseline: state.atr_baseline,
            halt_reason: state.halt_reason,
        }
    }

    pub fn trades(&self) -> Vec<Trade> {
        self.state.trades.clone()
    }

    /// Fetch the look-back window for `symbol` and score its latest candle.
    ///
    /// `atr_baseline` is used when given; otherwise it is derived from this
    /// window once the latest ATR is defined.
    pub fn evaluate(
        &self,
        symbol: &str,
        atr_baseline: Option<f64>,
    ) -> Result<Evaluation, EngineError> {
        let candles = self.fetch_window(symbol)?;
        let required = self.config.min_candles;
        let last = match candles.last() {
            Some(last) if candles.len() >= required => last,
            _ => {
                return Ok(Evaluation::InsufficientHistory {
                    candles: candles.len(),
                    required,
                })
            }
        };

        let frame = IndicatorFrame::compute(&candles, &self.config.indicators)?;
        let indicators = frame.latest();

        let atr_baseline = atr_baseline.or_else(|| {
            indicators
                .atr
                .and_then(|_| signal::atr_baseline(&frame.atr))
        });
        let threshold =
            signal::adaptive_threshold(indicators.atr, atr_baseline, &self.config.thresholds);
        let score = signal::score(indicators.rsi, indicators.macd, indicators.histogram);

        Ok(Evaluation::Ready(SignalReading {
            time: last.timestamp,
            price: last.close,
            candles: candles.len(),
            indicators,
            atr_baseline,
            threshold,
            score,
        }))
    }

    /// Record a tick that failed outside [`Engine::tick`], such as a panic
    /// on the worker running it. The engine keeps its running state.
    pub fn record_failure(&mut self, reason: String) {
        self.state.last_error = Some(reason);
    }

    /// One evaluation cycle. Does nothing unless the engine is running.
    pub fn tick(&mut self) -> TickOutcome {
        if !self.state.running {
            return TickOutcome::NotRunning;
        }

        let evaluation = match self.evaluate(&self.state.symbol, self.state.atr_baseline) {
            Ok(evaluation) => evaluation,
            Err(e) => {
                warn!(symbol = %self.state.symbol, error = %e, "tick failed");
                let reason = e.to_string();
                self.state.last_error = Some(reason.clone());
                return TickOutcome::Failed { reason };
            }
        };

        let signal = match evaluation {
            Evaluation::InsufficientHistory { candles, required } => {
                debug!(candles, required, "not enough history, skipping tick");
                return TickOutcome::InsufficientHistory { candles, required };
            }
            Evaluation::Ready(signal) => signal,
        };

        if self.state.atr_baseline.is_none() && signal.atr_baseline.is_some() {
            debug!(atr_baseline = signal.atr_baseline, "volatility baseline set");
            self.state.atr_baseline = signal.atr_baseline;
        }

        let input = TickInput {
            price: signal.price,
            time: signal.time,
            threshold: signal.threshold,
            snapshot: signal.snapshot(),
            histogram: signal.indicators.histogram,
        };
        let outcome = position::step(self.state.position.as_ref(), &input, &self.config.rules);

        if let (Some(side), Some(position)) = (outcome.opened, outcome.position.as_ref()) {
            info!(
                %side,
                price = signal.price,
                score = signal.score,
                threshold = signal.threshold,
                stop = position.stop_loss,
                "position opened"
            );
        }
        self.state.position = outcome.position;

        let closed = outcome.exit.map(|exit| self.close(exit));
        let halted = self.enforce_risk_limits();

        TickOutcome::Evaluated {
            signal,
            opened: outcome.opened,
            closed,
            halted,
        }
    }

    fn fetch_window(&self, symbol: &str) -> Result<Vec<Candle>, EngineError> {
        let end = self.clock.now();
        let start = Duration::try_hours(i64::from(self.config.lookback_hours))
            .and_then(|lookback| end.checked_sub_signed(lookback))
            .ok_or_else(|| {
                EngineError::invalid_argument(format!(
                    "lookback of {} hours reaches before the earliest representable time",
                    self.config.lookback_hours
                ))
            })?;
        let candles =
            self.market_data
                .fetch_candles(symbol, self.config.timeframe_min, start, end)?;
        Ok(candle::normalize(candles))
    }

    fn close(&mut self, exit: Exit) -> Trade {
        self.trade_seq += 1;
        let context = TradeContext {
            id: format!("{}-{}", self.clock.now().timestamp_millis(), self.trade_seq),
            symbol: self.state.symbol.clone(),
            mode: self.state.mode,
            timeframe_min: self.config.timeframe_min,
        };
        let trade = Trade::from_exit(&exit, context);

        info!(
            side = %trade.side,
            price = trade.exit_price,
            pnl = trade.pnl,
            pnl_pct = trade.pnl_pct,
            reason = %trade.exit_reason,
            tier = trade.stop_tier,
            "position closed"
        );

        self.state.ledger.record(trade.pnl);
        self.state.trades.push(trade.clone());
        self.state.summary = TradeSummary::compute(&self.state.trades);

        if let Err(e) = self.sink.record(&trade) {
            error!(id = %trade.id, error = %e, "failed to record trade");
        }

        trade
    }

    fn enforce_risk_limits(&mut self) -> Option<HaltReason> {
        let reason = self.state.ledger.check(&self.config.limits)?;
        warn!(%reason, symbol = %self.state.symbol, "risk limit reached, halting engine");
        self.state.running = false;
        self.state.mode = Mode::Idle;
        self.state.halt_reason = Some(reason);
        Some(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::{Arc, Mutex};

    struct StaticCandles(Vec<Candle>);

    impl MarketDataPort for StaticCandles {
        fn fetch_candles(
            &self,
            _symbol: &str,
            _timeframe_min: u32,
            _start: DateTime<Utc>,
            _end: DateTime<Utc>,
        ) -> Result<Vec<Candle>, EngineError> {
            Ok(self.0.clone())
        }
    }

    struct FixedClock;

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
        }
    }

    #[derive(Clone, Default)]
    struct SharedSink(Arc<Mutex<Vec<Trade>>>);

    impl TradeSink for SharedSink {
        fn record(&self, trade: &Trade) -> Result<(), EngineError> {
            self.0.lock().unwrap().push(trade.clone());
            Ok(())
        }
    }

    /// Accelerating rise: RSI pinned at 100 with MACD above its signal line.
    fn rising(count: usize) -> Vec<Candle> {
        let t0 = Utc.with_ymd_and_hms(2024, 5, 20, 0, 0, 0).unwrap();
        (0..count)
            .map(|i| {
                let close = 100.0 + (i * i) as f64;
                Candle {
                    timestamp: t0 + Duration::hours(i as i64),
                    open: close - 0.5,
                    high: close + 1.0,
                    low: close - 1.0,
                    close,
                    volume: 5.0,
                }
            })
            .collect()
    }

    fn engine_with(candles: Vec<Candle>) -> Engine {
        Engine::new(
            EngineConfig::default(),
            Box::new(StaticCandles(candles)),
            Box::new(FixedClock),
            Box::new(SharedSink::default()),
        )
    }

    #[test]
    fn mode_parse_and_display() {
        assert_eq!("Paper".parse::<Mode>().unwrap(), Mode::Paper);
        assert_eq!(" live ".parse::<Mode>().unwrap(), Mode::Live);
        assert!("demo".parse::<Mode>().is_err());
        assert_eq!(Mode::Idle.to_string(), "idle");
    }

    #[test]
    fn new_engine_is_idle() {
        let engine = engine_with(vec![]);
        let state = engine.state();
        assert!(!state.running);
        assert_eq!(state.mode, Mode::Idle);
        assert_eq!(state.symbol, "BTCUSD");
        assert_eq!(state.trade_count, 0);
    }

    #[test]
    fn start_rejects_idle_mode_and_blank_symbol() {
        let mut engine = engine_with(vec![]);
        assert!(matches!(
            engine.start(Mode::Idle, "BTCUSD"),
            Err(EngineError::InvalidArgument { .. })
        ));
        assert!(matches!(
            engine.start(Mode::Paper, "  "),
            Err(EngineError::InvalidArgument { .. })
        ));
        assert!(!engine.is_running());
    }

    #[test]
    fn tick_when_stopped_does_nothing() {
        let mut engine = engine_with(rising(60));
        assert_eq!(engine.tick(), TickOutcome::NotRunning);
    }

    #[test]
    fn short_history_is_skipped() {
        let mut engine = engine_with(rising(49));
        engine.start(Mode::Paper, "BTCUSD").unwrap();
        assert_eq!(
            engine.tick(),
            TickOutcome::InsufficientHistory {
                candles: 49,
                required: 50
            }
        );
        assert!(engine.state().position.is_none());
        assert_eq!(engine.state().atr_baseline, None);
    }

    #[test]
    fn lookback_past_the_calendar_fails_the_tick() {
        let config = EngineConfig {
            lookback_hours: u32::MAX,
            ..EngineConfig::default()
        };
        let mut engine = Engine::new(
            config,
            Box::new(StaticCandles(rising(60))),
            Box::new(FixedClock),
            Box::new(SharedSink::default()),
        );
        engine.start(Mode::Paper, "BTCUSD").unwrap();

        let TickOutcome::Failed { reason } = engine.tick() else {
            panic!("expected a failed tick");
        };
        assert!(reason.contains("lookback"));
        let state = engine.state();
        assert!(state.running);
        assert_eq!(state.last_error, Some(reason));
    }

    #[test]
    fn recorded_failure_shows_in_state() {
        let mut engine = engine_with(rising(60));
        engine.start(Mode::Paper, "BTCUSD").unwrap();
        engine.record_failure("worker panicked".to_string());

        let state = engine.state();
        assert!(state.running);
        assert_eq!(state.last_error.as_deref(), Some("worker panicked"));
    }

    #[test]
    fn strong_uptrend_opens_long() {
        let mut engine = engine_with(rising(60));
        engine.start(Mode::Paper, "BTCUSD").unwrap();

        let TickOutcome::Evaluated { signal, opened, closed, halted } = engine.tick() else {
            panic!("expected an evaluated tick");
        };
        // RSI 100, MACD and histogram positive
        assert_eq!(signal.score, 130.0);
        assert_eq!(signal.threshold, 115.0);
        assert_eq!(opened, Some(Side::Long));
        assert!(closed.is_none());
        assert!(halted.is_none());

        let state = engine.state();
        let position = state.position.unwrap();
        assert_eq!(position.entry_price, 3581.0);
        assert!(state.atr_baseline.is_some());
    }

    #[test]
    fn evaluate_does_not_touch_state() {
        let engine = engine_with(rising(60));
        let Evaluation::Ready(signal) = engine.evaluate("BTCUSD", None).unwrap() else {
            panic!("expected a reading");
        };
        assert_eq!(signal.candles, 60);
        assert_eq!(signal.price, 3581.0);
        assert!(engine.state().position.is_none());
        assert!(engine.state().atr_baseline.is_none());
    }

    #[test]
    fn stop_keeps_position_and_resets_mode() {
        let mut engine = engine_with(rising(60));
        engine.start(Mode::Live, "BTCUSD").unwrap();
        engine.tick();
        engine.stop().unwrap();

        let state = engine.state();
        assert!(!state.running);
        assert_eq!(state.mode, Mode::Idle);
        assert!(state.position.is_some());
    }

    #[test]
    fn restart_on_other_symbol_drops_position() {
        let mut engine = engine_with(rising(60));
        engine.start(Mode::Paper, "BTCUSD").unwrap();
        engine.tick();
        engine.stop().unwrap();

        engine.start(Mode::Paper, "ETHUSD").unwrap();
        assert!(engine.state().position.is_none());
        assert_eq!(engine.state().symbol, "ETHUSD");
    }
}
