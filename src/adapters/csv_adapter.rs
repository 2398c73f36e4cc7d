//! CSV file market data adapter.
//!
//! Reads `<symbol>_<timeframe>m.csv` from a base directory with the columns
//! `timestamp,open,high,low,close,volume`. Timestamps may be RFC 3339 or
//! epoch seconds/milliseconds.

use crate::domain::candle::{self, Candle};
use crate::domain::error::EngineError;
use crate::ports::market_data_port::MarketDataPort;
use chrono::{DateTime, TimeZone, Utc};
use std::fs;
use std::path::PathBuf;

/// Epoch values above this are taken as milliseconds.
const EPOCH_MILLIS_CUTOFF: i64 = 1_000_000_000_000;

pub struct CsvCandleAdapter {
    base_path: PathBuf,
}

impl CsvCandleAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    pub fn csv_path(&self, symbol: &str, timeframe_min: u32) -> PathBuf {
        self.base_path
            .join(format!("{}_{}m.csv", symbol, timeframe_min))
    }
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, EngineError> {
    let raw = raw.trim();
    if let Ok(epoch) = raw.parse::<i64>() {
        let parsed = if epoch > EPOCH_MILLIS_CUTOFF {
            Utc.timestamp_millis_opt(epoch).single()
        } else {
            Utc.timestamp_opt(epoch, 0).single()
        };
        return parsed.ok_or_else(|| {
            EngineError::data_provider(format!("timestamp out of range: {}", raw))
        });
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| EngineError::data_provider(format!("invalid timestamp '{}': {}", raw, e)))
}

fn parse_field(record: &csv::StringRecord, index: usize, name: &str) -> Result<f64, EngineError> {
    record
        .get(index)
        .ok_or_else(|| EngineError::data_provider(format!("missing {} column", name)))?
        .trim()
        .parse()
        .map_err(|e| EngineError::data_provider(format!("invalid {} value: {}", name, e)))
}

impl MarketDataPort for CsvCandleAdapter {
    fn fetch_candles(
        &self,
        symbol: &str,
        timeframe_min: u32,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Candle>, EngineError> {
        let path = self.csv_path(symbol, timeframe_min);
        let content = fs::read_to_string(&path).map_err(|e| {
            EngineError::data_provider(format!("failed to read {}: {}", path.display(), e))
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut candles = Vec::new();

        for result in rdr.records() {
            let record = result
                .map_err(|e| EngineError::data_provider(format!("CSV parse error: {}", e)))?;

            let ts_str = record
                .get(0)
                .ok_or_else(|| EngineError::data_provider("missing timestamp column"))?;
            let timestamp = parse_timestamp(ts_str)?;

            if timestamp < start || timestamp > end {
                continue;
            }

            candles.push(Candle {
                timestamp,
                open: parse_field(&record, 1, "open")?,
                high: parse_field(&record, 2, "high")?,
                low: parse_field(&record, 3, "low")?,
                close: parse_field(&record, 4, "close")?,
                volume: parse_field(&record, 5, "volume")?,
            });
        }

        Ok(candle::normalize(candles))
    }
}
