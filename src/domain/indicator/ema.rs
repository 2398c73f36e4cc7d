//! Exponential Moving Average indicator.
//!
//! k = 2/(n+1), seed with the SMA of the first n values, then
//! EMA[i] = EMA[i-1] + (V[i] - EMA[i-1]) * k, i.e. EMA[i-1]*(1-k) + V[i]*k.
//! Warmup: first (n-1) values are undefined.

use super::{require_period, Series};
use crate::domain::error::EngineError;

pub fn calculate_ema(values: &[f64], period: usize) -> Result<Series, EngineError> {
    require_period("EMA", period)?;

    let mut out = vec![None; values.len()];
    if values.len() < period {
        return Ok(out);
    }

    let k = 2.0 / (period as f64 + 1.0);
    let mut ema = values[..period].iter().sum::<f64>() / period as f64;
    out[period - 1] = Some(ema);

    for (i, &value) in values.iter().enumerate().skip(period) {
        ema += (value - ema) * k;
        out[i] = Some(ema);
    }

    Ok(out)
}
