#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use pammtrader::domain::candle::Candle;
use pammtrader::domain::engine::{Engine, EngineConfig};
use pammtrader::domain::error::EngineError;
use pammtrader::domain::trade::Trade;
use pammtrader::ports::clock_port::Clock;
use pammtrader::ports::market_data_port::MarketDataPort;
use pammtrader::ports::trade_sink_port::TradeSink;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// One scripted response per fetch. The last response repeats once the
/// script runs out.
pub enum Response {
    Candles(Vec<Candle>),
    Error(String),
    Panic(String),
}

#[derive(Clone)]
pub struct MockDataPort {
    script: Arc<Mutex<VecDeque<Response>>>,
    last: Arc<Mutex<Option<Vec<Candle>>>>,
    calls: Arc<AtomicUsize>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            script: Arc::new(Mutex::new(VecDeque::new())),
            last: Arc::new(Mutex::new(None)),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_candles(self, candles: Vec<Candle>) -> Self {
        self.script
            .lock()
            .unwrap()
            .push_back(Response::Candles(candles));
        self
    }

    pub fn with_error(self, reason: &str) -> Self {
        self.script
            .lock()
            .unwrap()
            .push_back(Response::Error(reason.to_string()));
        self
    }

    pub fn with_panic(self, message: &str) -> Self {
        self.script
            .lock()
            .unwrap()
            .push_back(Response::Panic(message.to_string()));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl MarketDataPort for MockDataPort {
    fn fetch_candles(
        &self,
        _symbol: &str,
        _timeframe_min: u32,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> Result<Vec<Candle>, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Response::Candles(candles)) => {
                *self.last.lock().unwrap() = Some(candles.clone());
                Ok(candles)
            }
            Some(Response::Error(reason)) => Err(EngineError::data_provider(reason)),
            Some(Response::Panic(message)) => panic!("{message}"),
            None => Ok(self.last.lock().unwrap().clone().unwrap_or_default()),
        }
    }
}

#[derive(Clone, Default)]
pub struct MemoryTradeSink {
    pub trades: Arc<Mutex<Vec<Trade>>>,
    pub fail: bool,
}

impl MemoryTradeSink {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn recorded(&self) -> Vec<Trade> {
        self.trades.lock().unwrap().clone()
    }
}

impl TradeSink for MemoryTradeSink {
    fn record(&self, trade: &Trade) -> Result<(), EngineError> {
        if self.fail {
            return Err(EngineError::TradeSink {
                reason: "disk full".into(),
            });
        }
        self.trades.lock().unwrap().push(trade.clone());
        Ok(())
    }
}

pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
}

pub fn candle(timestamp: DateTime<Utc>, close: f64) -> Candle {
    Candle {
        timestamp,
        open: close,
        high: close + 1.0,
        low: close - 1.0,
        close,
        volume: 10.0,
    }
}

const TREND_LEN: usize = 60;

/// Sixty hourly candles rising at an accelerating rate and ending exactly at
/// `last_close`. RSI is 100 and the MACD histogram positive at the last bar,
/// which scores 130.
pub fn uptrend(last_close: f64) -> Vec<Candle> {
    trend(last_close, 1.0)
}

/// Accelerating fall ending at `last_close`: RSI 0 with MACD and histogram
/// negative, scoring -30.
pub fn downtrend(last_close: f64) -> Vec<Candle> {
    trend(last_close, -1.0)
}

fn trend(last_close: f64, direction: f64) -> Vec<Candle> {
    let step = last_close / 10_000.0;
    let last = (TREND_LEN - 1) * (TREND_LEN - 1);
    (0..TREND_LEN)
        .map(|i| {
            let remaining = (last - i * i) as f64;
            candle(
                t0() + Duration::hours(i as i64),
                last_close - direction * step * remaining,
            )
        })
        .collect()
}

/// A trend ending at `entry`, followed by one candle closing at each of
/// `prices`.
pub fn extend(mut candles: Vec<Candle>, prices: &[f64]) -> Vec<Candle> {
    let start = candles.len() as i64;
    for (i, &price) in prices.iter().enumerate() {
        candles.push(candle(t0() + Duration::hours(start + i as i64), price));
    }
    candles
}

pub fn engine_with(
    config: EngineConfig,
    data: &MockDataPort,
    sink: &MemoryTradeSink,
) -> Engine {
    Engine::new(
        config,
        Box::new(data.clone()),
        Box::new(FixedClock(t0() + Duration::days(3))),
        Box::new(sink.clone()),
    )
}
