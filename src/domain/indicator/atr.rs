//! Average True Range.
//!
//! TR[0] = high - low; TR[i] = max(high-low, |high-prevClose|, |low-prevClose|).
//! Seed: mean of the first n true ranges at index n-1, then Wilder smoothing
//! ATR[i] = (ATR[i-1] * (n-1) + TR[i]) / n.

use super::{require_period, require_same_len, Series};
use crate::domain::error::EngineError;

pub fn calculate_atr(
    highs: &[f64],
    lows: &[f64],
    closes: &[f64],
    period: usize,
) -> Result<Series, EngineError> {
    require_period("ATR", period)?;
    require_same_len("ATR", highs, lows, closes)?;

    let mut out = vec![None; closes.len()];
    if closes.len() < period {
        return Ok(out);
    }

    let tr = true_ranges(highs, lows, closes);
    let n = period as f64;
    let mut atr = tr[..period].iter().sum::<f64>() / n;
    out[period - 1] = Some(atr);

    for i in period..closes.len() {
        atr = (atr * (n - 1.0) + tr[i]) / n;
        out[i] = Some(atr);
    }

    Ok(out)
}

pub(crate) fn true_ranges(highs: &[f64], lows: &[f64], closes: &[f64]) -> Vec<f64> {
    (0..closes.len())
        .map(|i| {
            let hl = highs[i] - lows[i];
            if i == 0 {
                hl
            } else {
                let hc = (highs[i] - closes[i - 1]).abs();
                let lc = (lows[i] - closes[i - 1]).abs();
                hl.max(hc).max(lc)
            }
        })
        .collect()
}
