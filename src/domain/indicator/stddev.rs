//! Rolling population standard deviation.
//!
//! STDDEV(n)[i] = sqrt(sum((V[i-j] - SMA(n)[i])^2 for j in 0..n) / n)
//! Warmup: first (n-1) values are undefined.

use super::{require_period, Series};
use crate::domain::error::EngineError;

pub fn calculate_stddev(values: &[f64], period: usize) -> Result<Series, EngineError> {
    require_period("STDDEV", period)?;

    let mut out = vec![None; values.len()];
    if values.len() < period {
        return Ok(out);
    }

    for i in (period - 1)..values.len() {
        let window = &values[i + 1 - period..=i];
        let mean = window.iter().sum::<f64>() / period as f64;
        out[i] = Some(population_stddev(window, mean));
    }

    Ok(out)
}

pub(crate) fn population_stddev(window: &[f64], mean: f64) -> f64 {
    let variance = window
        .iter()
        .map(|v| {
            let diff = v - mean;
            diff * diff
        })
        .sum::<f64>()
        / window.len() as f64;
    variance.sqrt()
}
