//! RSI (Relative Strength Index) indicator.
//!
//! Uses Wilder's smoothing for average gain/loss calculation:
//! - First average: simple mean of gains/losses over the first n changes
//! - Subsequent: avg = (prev_avg * (n-1) + current) / n
//!
//! Formula: RSI = 100 - (100 / (1 + avg_gain / avg_loss))
//! If avg_loss == 0: RSI = 100
//!
//! Warmup: first n values are undefined (n changes are needed for the seed).
//! Fewer than n+1 values leaves the whole output undefined.

use super::{require_period, Series};
use crate::domain::error::EngineError;

pub fn calculate_rsi(closes: &[f64], period: usize) -> Result<Series, EngineError> {
    require_period("RSI", period)?;

    let mut out = vec![None; closes.len()];
    if closes.len() < period + 1 {
        return Ok(out);
    }

    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;
    for i in 1..=period {
        let (gain, loss) = split_change(closes[i] - closes[i - 1]);
        avg_gain += gain;
        avg_loss += loss;
    }
    avg_gain /= period as f64;
    avg_loss /= period as f64;
    out[period] = Some(rsi_value(avg_gain, avg_loss));

    let n = period as f64;
    for i in (period + 1)..closes.len() {
        let (gain, loss) = split_change(closes[i] - closes[i - 1]);
        avg_gain = (avg_gain * (n - 1.0) + gain) / n;
        avg_loss = (avg_loss * (n - 1.0) + loss) / n;
        out[i] = Some(rsi_value(avg_gain, avg_loss));
    }

    Ok(out)
}

fn split_change(change: f64) -> (f64, f64) {
    if change > 0.0 {
        (change, 0.0)
    } else {
        (0.0, change.abs())
    }
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - (100.0 / (1.0 + avg_gain / avg_loss))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rsi_empty() {
        assert!(calculate_rsi(&[], 14).unwrap().is_empty());
    }

    #[test]
    fn rsi_insufficient_values_all_undefined() {
        let closes: Vec<f64> = (0..14).map(|i| 100.0 + i as f64).collect();
        let series = calculate_rsi(&closes, 14).unwrap();
        assert_eq!(series.len(), 14);
        assert!(series.iter().all(Option::is_none));
    }

    #[test]
    fn rsi_warmup_period() {
        let closes: Vec<f64> = (1..=15).map(|i| 100.0 + (i as f64 % 5.0) * 2.0).collect();
        let series = calculate_rsi(&closes, 14).unwrap();

        for (i, v) in series.iter().enumerate().take(14) {
            assert!(v.is_none(), "index {} should be undefined", i);
        }
        assert!(series[14].is_some(), "index 14 should be defined");
    }

    #[test]
    fn rsi_strictly_increasing_is_100() {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + i as f64 * 0.5).collect();
        let series = calculate_rsi(&closes, 14).unwrap();

        for v in series.iter().skip(14) {
            assert_eq!(*v, Some(100.0));
        }
    }

    #[test]
    fn rsi_all_losses_is_0() {
        let closes: Vec<f64> = (0..15).map(|i| 100.0 - i as f64).collect();
        let series = calculate_rsi(&closes, 14).unwrap();
        let rsi = series[14].unwrap();
        assert!(rsi.abs() < f64::EPSILON, "RSI should be 0 when all losses");
    }

    #[test]
    fn rsi_flat_series_is_100() {
        let series = calculate_rsi(&[50.0; 20], 14).unwrap();
        assert_eq!(series[19], Some(100.0));
    }

    #[test]
    fn rsi_in_range() {
        let closes: Vec<f64> = (1..=40)
            .map(|i| 100.0 + (i as f64 % 7.0 - 3.0) * 2.0)
            .collect();
        let series = calculate_rsi(&closes, 14).unwrap();

        for rsi in series.iter().flatten() {
            assert!((0.0..=100.0).contains(rsi), "RSI {} out of range", rsi);
        }
    }

    #[test]
    fn rsi_known_calculation() {
        let closes = [
            44.0, 44.25, 44.50, 43.75, 44.50, 44.25, 44.75, 45.25, 45.50, 45.25, 45.50, 46.0,
            46.25, 46.0, 46.50,
        ];
        let series = calculate_rsi(&closes, 14).unwrap();

        // gains: 0.25+0.25+0.75+0.5+0.5+0.25+0.25+0.5+0.25+0.5 = 4.0
        // losses: 0.75+0.25+0.25+0.25 = 1.5
        let expected = 100.0 - 100.0 / (1.0 + (4.0 / 14.0) / (1.5 / 14.0));
        approx::assert_relative_eq!(series[14].unwrap(), expected, epsilon = 1e-9);
    }

    #[test]
    fn rsi_wilder_step() {
        // period 2: changes +2, -1, +3
        let series = calculate_rsi(&[10.0, 12.0, 11.0, 14.0], 2).unwrap();
        let (g, l) = (1.0, 0.5);
        approx::assert_relative_eq!(series[2].unwrap(), 100.0 - 100.0 / (1.0 + g / l));
        let (g, l) = ((g + 3.0) / 2.0, (l + 0.0) / 2.0);
        approx::assert_relative_eq!(series[3].unwrap(), 100.0 - 100.0 / (1.0 + g / l));
    }

    #[test]
    fn rsi_zero_period_is_invalid() {
        assert!(calculate_rsi(&[100.0, 101.0], 0).is_err());
    }
}
