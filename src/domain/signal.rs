//! Composite entry score (the "PAMM" score) and its volatility-adaptive threshold.

use serde::Serialize;

/// Number of most recent defined ATR values averaged into the session baseline.
pub const ATR_BASELINE_WINDOW: usize = 20;

/// ATR ratio above which the high-volatility threshold applies.
pub const HIGH_VOL_RATIO: f64 = 1.5;

/// ATR ratio below which the low-volatility threshold applies.
pub const LOW_VOL_RATIO: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Thresholds {
    pub normal: f64,
    pub high_vol: f64,
    pub low_vol: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Thresholds {
            normal: 115.0,
            high_vol: 115.0,
            low_vol: 115.0,
        }
    }
}

/// clamp((rsi-50)*3, 0, 100) + (±20 by MACD sign) + (±10 by histogram sign).
///
/// Any undefined input scores 0.
pub fn score(rsi: Option<f64>, macd: Option<f64>, hist: Option<f64>) -> f64 {
    let (Some(rsi), Some(macd), Some(hist)) = (rsi, macd, hist) else {
        return 0.0;
    };

    let rsi_score = ((rsi - 50.0) * 3.0).clamp(0.0, 100.0);
    let macd_score = if macd > 0.0 { 20.0 } else { -20.0 };
    let hist_score = if hist > 0.0 { 10.0 } else { -10.0 };

    rsi_score + macd_score + hist_score
}

/// Entry threshold for the current volatility regime.
pub fn adaptive_threshold(
    current_atr: Option<f64>,
    average_atr: Option<f64>,
    thresholds: &Thresholds,
) -> f64 {
    let (Some(current), Some(average)) = (current_atr, average_atr) else {
        return thresholds.normal;
    };
    if average == 0.0 || current == 0.0 {
        return thresholds.normal;
    }

    let ratio = current / average;
    if ratio > HIGH_VOL_RATIO {
        thresholds.high_vol
    } else if ratio < LOW_VOL_RATIO {
        thresholds.low_vol
    } else {
        thresholds.normal
    }
}

/// Mean of the trailing [`ATR_BASELINE_WINDOW`] defined ATR values.
pub fn atr_baseline(atr: &[Option<f64>]) -> Option<f64> {
    let defined: Vec<f64> = atr.iter().flatten().copied().collect();
    if defined.is_empty() {
        return None;
    }
    let tail = &defined[defined.len().saturating_sub(ATR_BASELINE_WINDOW)..];
    Some(tail.iter().sum::<f64>() / tail.len() as f64)
}
