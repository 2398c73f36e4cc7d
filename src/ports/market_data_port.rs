//! Market data port trait.

use crate::domain::candle::Candle;
use crate::domain::error::EngineError;
use chrono::{DateTime, Utc};

pub trait MarketDataPort {
    /// Candles for `symbol` at `timeframe_min` minute buckets whose
    /// timestamps fall in `[start, end]`.
    ///
    /// Implementations return candles sorted ascending with non-finite rows
    /// removed. No data is an empty vector, not an error.
    fn fetch_candles(
        &self,
        symbol: &str,
        timeframe_min: u32,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Candle>, EngineError>;
}
