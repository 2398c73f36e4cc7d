//! OHLCV candle representation.

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// All four price fields are finite and strictly positive.
    pub fn is_tradeable(&self) -> bool {
        [self.open, self.high, self.low, self.close]
            .iter()
            .all(|&p| p.is_finite() && p > 0.0)
    }
}

pub fn closes(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.close).collect()
}

pub fn highs(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.high).collect()
}

pub fn lows(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.low).collect()
}

/// Drop candles that are not tradeable, sort ascending by timestamp and keep
/// the first candle for any duplicated timestamp.
pub fn normalize(mut candles: Vec<Candle>) -> Vec<Candle> {
    candles.retain(Candle::is_tradeable);
    candles.sort_by_key(|c| c.timestamp);
    candles.dedup_by_key(|c| c.timestamp);
    candles
}
