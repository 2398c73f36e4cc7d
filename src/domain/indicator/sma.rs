//! Simple Moving Average over a trailing window.

use super::{require_period, Series};
use crate::domain::error::EngineError;

pub fn calculate_sma(values: &[f64], period: usize) -> Result<Series, EngineError> {
    require_period("SMA", period)?;

    let mut out = vec![None; values.len()];
    if values.len() < period {
        return Ok(out);
    }

    for i in (period - 1)..values.len() {
        let window = &values[i + 1 - period..=i];
        out[i] = Some(window.iter().sum::<f64>() / period as f64);
    }

    Ok(out)
}
