//! Technical indicator implementations.
//!
//! Every indicator is a pure function over price slices that returns one
//! value per input index. Indices inside an indicator's warm-up window are
//! `None`; a defined value is never a placeholder zero.
//!
//! - `IndicatorType`: indicator identity + parameters, used in logs and errors
//! - `Series`: the per-index output of a single-line indicator
//! - `IndicatorFrame`: the set of series the engine evaluates each tick

pub mod adx;
pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod frame;
pub mod macd;
pub mod rsi;
pub mod sma;
pub mod stddev;

pub use adx::calculate_adx;
pub use atr::calculate_atr;
pub use bollinger::{calculate_bollinger, BollingerSeries};
pub use ema::calculate_ema;
pub use frame::{IndicatorFrame, IndicatorReading, IndicatorSettings};
pub use macd::{calculate_macd, MacdSeries};
pub use rsi::calculate_rsi;
pub use sma::calculate_sma;
pub use stddev::calculate_stddev;

use crate::domain::error::EngineError;
use std::fmt;

/// One output value per input index; `None` inside the warm-up window.
pub type Series = Vec<Option<f64>>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Sma(usize),
    Ema(usize),
    Rsi(usize),
    Atr(usize),
    Adx(usize),
    Stddev(usize),
    Macd {
        fast: usize,
        slow: usize,
        signal: usize,
    },
    Bollinger {
        period: usize,
        stddev_mult_x100: u32,
    },
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Sma(period) => write!(f, "SMA({})", period),
            IndicatorType::Ema(period) => write!(f, "EMA({})", period),
            IndicatorType::Rsi(period) => write!(f, "RSI({})", period),
            IndicatorType::Atr(period) => write!(f, "ATR({})", period),
            IndicatorType::Adx(period) => write!(f, "ADX({})", period),
            IndicatorType::Stddev(period) => write!(f, "STDDEV({})", period),
            IndicatorType::Macd { fast, slow, signal } => {
                write!(f, "MACD({},{},{})", fast, slow, signal)
            }
            IndicatorType::Bollinger {
                period,
                stddev_mult_x100,
            } => {
                let mult = *stddev_mult_x100 as f64 / 100.0;
                write!(f, "BOLLINGER({},{})", period, mult)
            }
        }
    }
}

/// Reject a zero period for `indicator`.
pub(crate) fn require_period(indicator: &str, period: usize) -> Result<(), EngineError> {
    if period < 1 {
        return Err(EngineError::invalid_argument(format!(
            "{indicator} period must be >= 1"
        )));
    }
    Ok(())
}

/// Reject high/low/close slices of different lengths.
pub(crate) fn require_same_len(
    indicator: &str,
    highs: &[f64],
    lows: &[f64],
    closes: &[f64],
) -> Result<(), EngineError> {
    if highs.len() != lows.len() || highs.len() != closes.len() {
        return Err(EngineError::invalid_argument(format!(
            "{indicator}: highs, lows and closes must have the same length ({}, {}, {})",
            highs.len(),
            lows.len(),
            closes.len()
        )));
    }
    Ok(())
}

/// Last value of a series, if the series is non-empty and its last index is defined.
pub fn latest(series: &[Option<f64>]) -> Option<f64> {
    series.last().copied().flatten()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indicator_type_display_ema() {
        assert_eq!(IndicatorType::Ema(12).to_string(), "EMA(12)");
    }

    #[test]
    fn indicator_type_display_macd() {
        let macd = IndicatorType::Macd {
            fast: 12,
            slow: 26,
            signal: 9,
        };
        assert_eq!(macd.to_string(), "MACD(12,26,9)");
    }

    #[test]
    fn indicator_type_display_bollinger() {
        let boll = IndicatorType::Bollinger {
            period: 20,
            stddev_mult_x100: 200,
        };
        assert_eq!(boll.to_string(), "BOLLINGER(20,2)");
    }

    #[test]
    fn require_period_rejects_zero() {
        let err = require_period("EMA", 0).unwrap_err();
        assert!(matches!(err, EngineError::InvalidArgument { .. }));
        assert!(err.to_string().contains("EMA period must be >= 1"));
        assert!(require_period("EMA", 1).is_ok());
    }

    #[test]
    fn require_same_len_rejects_mismatch() {
        assert!(require_same_len("ATR", &[1.0], &[1.0], &[1.0, 2.0]).is_err());
        assert!(require_same_len("ATR", &[1.0], &[1.0], &[1.0]).is_ok());
    }

    #[test]
    fn latest_value() {
        assert_eq!(latest(&[]), None);
        assert_eq!(latest(&[Some(1.0), None]), None);
        assert_eq!(latest(&[None, Some(2.0)]), Some(2.0));
    }
}
