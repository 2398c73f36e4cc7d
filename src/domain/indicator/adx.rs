//! Average Directional Index.
//!
//! +DM/-DM and true range are taken from index 1. Their Wilder running sums
//! are seeded over indices 1..=n, giving +DI/-DI and DX from index n onwards.
//! ADX is seeded as the mean DX over n..2n at index 2n-1 and then Wilder
//! smoothed. Fewer than 2n values leaves the whole output undefined. A zero
//! denominator yields 0 rather than NaN.

use super::{require_period, require_same_len, Series};
use crate::domain::error::EngineError;

pub fn calculate_adx(
    highs: &[f64],
    lows: &[f64],
    closes: &[f64],
    period: usize,
) -> Result<Series, EngineError> {
    require_period("ADX", period)?;
    require_same_len("ADX", highs, lows, closes)?;

    let len = closes.len();
    let mut out = vec![None; len];
    if len < period * 2 {
        return Ok(out);
    }

    let mut plus_dm = vec![0.0; len];
    let mut minus_dm = vec![0.0; len];
    let mut tr = vec![0.0; len];
    for i in 1..len {
        let up = highs[i] - highs[i - 1];
        let down = lows[i - 1] - lows[i];
        plus_dm[i] = if up > down && up > 0.0 { up } else { 0.0 };
        minus_dm[i] = if down > up && down > 0.0 { down } else { 0.0 };

        let hl = highs[i] - lows[i];
        let hc = (highs[i] - closes[i - 1]).abs();
        let lc = (lows[i] - closes[i - 1]).abs();
        tr[i] = hl.max(hc).max(lc);
    }

    let n = period as f64;
    let mut smoothed_plus: f64 = plus_dm[1..=period].iter().sum();
    let mut smoothed_minus: f64 = minus_dm[1..=period].iter().sum();
    let mut smoothed_tr: f64 = tr[1..=period].iter().sum();

    let mut dx = vec![0.0; len];
    dx[period] = directional_index(smoothed_plus, smoothed_minus, smoothed_tr);
    for i in (period + 1)..len {
        smoothed_plus = smoothed_plus - smoothed_plus / n + plus_dm[i];
        smoothed_minus = smoothed_minus - smoothed_minus / n + minus_dm[i];
        smoothed_tr = smoothed_tr - smoothed_tr / n + tr[i];
        dx[i] = directional_index(smoothed_plus, smoothed_minus, smoothed_tr);
    }

    let mut adx = dx[period..period * 2].iter().sum::<f64>() / n;
    out[period * 2 - 1] = Some(adx);
    for i in (period * 2)..len {
        adx = (adx * (n - 1.0) + dx[i]) / n;
        out[i] = Some(adx);
    }

    Ok(out)
}

/// DX from smoothed +DM, -DM and TR.
fn directional_index(plus_dm: f64, minus_dm: f64, tr: f64) -> f64 {
    let (plus_di, minus_di) = if tr != 0.0 {
        (plus_dm / tr * 100.0, minus_dm / tr * 100.0)
    } else {
        (0.0, 0.0)
    };
    let sum = plus_di + minus_di;
    if sum != 0.0 {
        (plus_di - minus_di).abs() / sum * 100.0
    } else {
        0.0
    }
}
