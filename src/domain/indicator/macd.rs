//! MACD (Moving Average Convergence Divergence) indicator.
//!
//! MACD Line = EMA(fast) - EMA(slow), defined where both EMAs are defined
//! Signal Line = EMA(signal) over the defined MACD values only
//! Histogram = MACD Line - Signal Line, defined where both are defined
//!
//! Default parameters: fast=12, slow=26, signal=9
//! Warmup: the signal seed sits at the index of the `signal`-th defined MACD
//! value, i.e. max(fast, slow) - 1 + signal - 1.

use super::{calculate_ema, require_period, Series};
use crate::domain::error::EngineError;

pub const DEFAULT_FAST: usize = 12;
pub const DEFAULT_SLOW: usize = 26;
pub const DEFAULT_SIGNAL: usize = 9;

#[derive(Debug, Clone, PartialEq)]
pub struct MacdSeries {
    pub macd: Series,
    pub signal: Series,
    pub histogram: Series,
}

pub fn calculate_macd(
    closes: &[f64],
    fast: usize,
    slow: usize,
    signal_period: usize,
) -> Result<MacdSeries, EngineError> {
    require_period("MACD fast", fast)?;
    require_period("MACD slow", slow)?;
    require_period("MACD signal", signal_period)?;

    let ema_fast = calculate_ema(closes, fast)?;
    let ema_slow = calculate_ema(closes, slow)?;

    let macd: Series = ema_fast
        .iter()
        .zip(&ema_slow)
        .map(|(f, s)| match (f, s) {
            (Some(f), Some(s)) => Some(f - s),
            _ => None,
        })
        .collect();

    let signal = ema_of_defined(&macd, signal_period);

    let histogram = macd
        .iter()
        .zip(&signal)
        .map(|(m, s)| match (m, s) {
            (Some(m), Some(s)) => Some(m - s),
            _ => None,
        })
        .collect();

    Ok(MacdSeries {
        macd,
        signal,
        histogram,
    })
}

/// EMA over a partially defined series: seeded with the mean of the first
/// `period` defined values at the index of the last of them, then carried
/// forward only while both the input and the previous output are defined.
fn ema_of_defined(values: &[Option<f64>], period: usize) -> Series {
    let mut out = vec![None; values.len()];

    let seed: Vec<(usize, f64)> = values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.map(|v| (i, v)))
        .take(period)
        .collect();
    if seed.len() < period {
        return out;
    }

    let k = 2.0 / (period as f64 + 1.0);
    let start = seed[period - 1].0;
    out[start] = Some(seed.iter().map(|(_, v)| v).sum::<f64>() / period as f64);

    for i in (start + 1)..values.len() {
        if let (Some(value), Some(prev)) = (values[i], out[i - 1]) {
            out[i] = Some(prev + (value - prev) * k);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_macd(closes: &[f64]) -> MacdSeries {
        calculate_macd(closes, DEFAULT_FAST, DEFAULT_SLOW, DEFAULT_SIGNAL).unwrap()
    }

    fn rising(n: usize) -> Vec<f64> {
        (0..n).map(|i| 100.0 + i as f64).collect()
    }

    #[test]
    fn macd_warmup_default() {
        let series = default_macd(&rising(40));

        assert!(series.macd[DEFAULT_SLOW - 2].is_none());
        assert!(series.macd[DEFAULT_SLOW - 1].is_some());

        let warmup = DEFAULT_SLOW - 1 + DEFAULT_SIGNAL - 1;
        for i in 0..warmup {
            assert!(series.signal[i].is_none(), "signal {} should be undefined", i);
            assert!(series.histogram[i].is_none(), "hist {} should be undefined", i);
        }
        assert!(series.signal[warmup].is_some());
        assert!(series.histogram[warmup].is_some());
    }

    #[test]
    fn macd_histogram_equals_line_minus_signal() {
        let series = default_macd(&rising(40));

        for i in 0..40 {
            if let Some(hist) = series.histogram[i] {
                let line = series.macd[i].unwrap();
                let signal = series.signal[i].unwrap();
                assert!((hist - (line - signal)).abs() < f64::EPSILON);
            }
        }
    }

    #[test]
    fn macd_line_is_ema_fast_minus_ema_slow() {
        let closes = [10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0, 80.0, 90.0, 100.0];
        let series = calculate_macd(&closes, 3, 5, 2).unwrap();

        let ema_fast = calculate_ema(&closes, 3).unwrap();
        let ema_slow = calculate_ema(&closes, 5).unwrap();

        for i in 0..closes.len() {
            match series.macd[i] {
                Some(line) => {
                    let expected = ema_fast[i].unwrap() - ema_slow[i].unwrap();
                    assert!((line - expected).abs() < f64::EPSILON, "mismatch at {}", i);
                }
                None => assert!(i < 4),
            }
        }
    }

    #[test]
    fn macd_signal_seeded_from_defined_values() {
        let closes = [10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0, 80.0, 90.0, 100.0];
        let series = calculate_macd(&closes, 3, 5, 2).unwrap();

        // slow EMA first defined at index 4, so the 2-period signal seeds at 5
        assert!(series.signal[4].is_none());
        let seed = (series.macd[4].unwrap() + series.macd[5].unwrap()) / 2.0;
        approx::assert_relative_eq!(series.signal[5].unwrap(), seed);

        let k = 2.0 / 3.0;
        let next = seed + (series.macd[6].unwrap() - seed) * k;
        approx::assert_relative_eq!(series.signal[6].unwrap(), next);
    }

    #[test]
    fn macd_histogram_flips_at_crossover() {
        // Accelerating rise then a sharp, sustained drop: the histogram must go from
        // positive to negative exactly once, on the first falling bar.
        let mut closes: Vec<f64> = (0..30).map(|i| 100.0 + 0.1 * (i * i) as f64).collect();
        let top = closes[29];
        closes.extend((1..=15).map(|i| top - 4.0 * i as f64));

        let series = calculate_macd(&closes, 3, 6, 3).unwrap();
        let flips: Vec<usize> = (1..closes.len())
            .filter(|&i| match (series.histogram[i - 1], series.histogram[i]) {
                (Some(prev), Some(cur)) => prev > 0.0 && cur < 0.0,
                _ => false,
            })
            .collect();

        assert_eq!(flips, vec![30]);
        assert!(series.histogram[29].unwrap() > 0.0);
        assert!(series.histogram[30].unwrap() < 0.0);
    }

    #[test]
    fn macd_empty_input() {
        let series = default_macd(&[]);
        assert!(series.macd.is_empty());
        assert!(series.signal.is_empty());
        assert!(series.histogram.is_empty());
    }

    #[test]
    fn macd_short_input_all_undefined() {
        let series = default_macd(&rising(10));
        assert!(series.macd.iter().all(Option::is_none));
        assert!(series.histogram.iter().all(Option::is_none));
    }

    #[test]
    fn macd_zero_period() {
        let closes = rising(3);
        assert!(calculate_macd(&closes, 0, 26, 9).is_err());
        assert!(calculate_macd(&closes, 12, 0, 9).is_err());
        assert!(calculate_macd(&closes, 12, 26, 0).is_err());
    }

    #[test]
    fn macd_default_constants() {
        assert_eq!(DEFAULT_FAST, 12);
        assert_eq!(DEFAULT_SLOW, 26);
        assert_eq!(DEFAULT_SIGNAL, 9);
    }
}
