//! The indicator set evaluated on every engine tick.

use serde::Serialize;

use super::{calculate_atr, calculate_macd, calculate_rsi, latest, IndicatorType, Series};
use crate::domain::candle::{self, Candle};
use crate::domain::error::EngineError;

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSettings {
    pub rsi_len: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub atr_len: usize,
}

impl Default for IndicatorSettings {
    fn default() -> Self {
        IndicatorSettings {
            rsi_len: 14,
            macd_fast: super::macd::DEFAULT_FAST,
            macd_slow: super::macd::DEFAULT_SLOW,
            macd_signal: super::macd::DEFAULT_SIGNAL,
            atr_len: 14,
        }
    }
}

impl IndicatorSettings {
    /// The indicators [`IndicatorFrame::compute`] evaluates with these settings.
    pub fn indicator_types(&self) -> Vec<IndicatorType> {
        vec![
            IndicatorType::Rsi(self.rsi_len),
            IndicatorType::Macd {
                fast: self.macd_fast,
                slow: self.macd_slow,
                signal: self.macd_signal,
            },
            IndicatorType::Atr(self.atr_len),
        ]
    }
}

/// Parallel series, one value per candle.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorFrame {
    pub rsi: Series,
    pub macd: Series,
    pub signal: Series,
    pub histogram: Series,
    pub atr: Series,
}

/// Indicator values at the most recent candle.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct IndicatorReading {
    pub rsi: Option<f64>,
    pub macd: Option<f64>,
    pub histogram: Option<f64>,
    pub atr: Option<f64>,
}

impl IndicatorFrame {
    pub fn compute(candles: &[Candle], settings: &IndicatorSettings) -> Result<Self, EngineError> {
        let closes = candle::closes(candles);
        let highs = candle::highs(candles);
        let lows = candle::lows(candles);

        let rsi = calculate_rsi(&closes, settings.rsi_len)?;
        let macd = calculate_macd(
            &closes,
            settings.macd_fast,
            settings.macd_slow,
            settings.macd_signal,
        )?;
        let atr = calculate_atr(&highs, &lows, &closes, settings.atr_len)?;

        Ok(IndicatorFrame {
            rsi,
            macd: macd.macd,
            signal: macd.signal,
            histogram: macd.histogram,
            atr,
        })
    }

    pub fn latest(&self) -> IndicatorReading {
        IndicatorReading {
            rsi: latest(&self.rsi),
            macd: latest(&self.macd),
            histogram: latest(&self.histogram),
            atr: latest(&self.atr),
        }
    }
}
