//! Bollinger Bands indicator.
//!
//! Bollinger Bands consist of:
//! - Middle: Simple Moving Average (SMA) over n periods
//! - Upper: Middle + (multiplier × StdDev)
//! - Lower: Middle - (multiplier × StdDev)
//!
//! Where StdDev is population standard deviation (divides by N, not N-1).
//!
//! Default parameters: period=20, multiplier=2.0
//! Warmup: first (period-1) values are undefined.

use super::stddev::population_stddev;
use super::{calculate_sma, Series};
use crate::domain::error::EngineError;

pub const DEFAULT_PERIOD: usize = 20;
pub const DEFAULT_MULTIPLIER: f64 = 2.0;

#[derive(Debug, Clone, PartialEq)]
pub struct BollingerSeries {
    pub upper: Series,
    pub middle: Series,
    pub lower: Series,
}

pub fn calculate_bollinger(
    closes: &[f64],
    period: usize,
    multiplier: f64,
) -> Result<BollingerSeries, EngineError> {
    if !multiplier.is_finite() {
        return Err(EngineError::invalid_argument(
            "Bollinger multiplier must be finite",
        ));
    }
    let middle = calculate_sma(closes, period)?;

    let mut upper = vec![None; closes.len()];
    let mut lower = vec![None; closes.len()];

    for (i, mid) in middle.iter().enumerate() {
        let Some(mid) = *mid else { continue };
        let window = &closes[i + 1 - period..=i];
        let sd = population_stddev(window, mid);
        upper[i] = Some(mid + multiplier * sd);
        lower[i] = Some(mid - multiplier * sd);
    }

    Ok(BollingerSeries {
        upper,
        middle,
        lower,
    })
}
