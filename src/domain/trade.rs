//! Closed-trade records and the running results summary.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

use super::engine::Mode;
use super::position::{Exit, Side};

/// Signal values captured when a position is opened or closed.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct IndicatorSnapshot {
    pub score: f64,
    pub rsi: Option<f64>,
    pub macd: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    StopLoss,
    MacdFlip,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::StopLoss => write!(f, "stop_loss"),
            ExitReason::MacdFlip => write!(f, "macd_flip"),
        }
    }
}

/// Engine-level labels stamped on every trade.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeContext {
    pub id: String,
    pub symbol: String,
    pub mode: Mode,
    pub timeframe_min: u32,
}

/// Immutable record of one closed position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trade {
    pub id: String,
    pub symbol: String,
    pub side: Side,
    pub mode: Mode,
    pub timeframe_min: u32,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub entry_price: f64,
    pub exit_price: f64,
    pub pnl: f64,
    pub pnl_pct: f64,
    pub entry: IndicatorSnapshot,
    pub exit: IndicatorSnapshot,
    pub exit_reason: ExitReason,
    pub stop_tier: usize,
}

impl Trade {
    pub fn from_exit(exit: &Exit, context: TradeContext) -> Self {
        let position = &exit.position;
        let pnl = position.unrealized_pnl(exit.price);
        let pnl_pct = pnl / position.entry_price * 100.0;

        Trade {
            id: context.id,
            symbol: context.symbol,
            side: position.side,
            mode: context.mode,
            timeframe_min: context.timeframe_min,
            entry_time: position.entry_time,
            exit_time: exit.time,
            entry_price: position.entry_price,
            exit_price: exit.price,
            pnl,
            pnl_pct,
            entry: position.entry,
            exit: exit.snapshot,
            exit_reason: exit.reason,
            stop_tier: position.stop_tier,
        }
    }

    pub fn is_winner(&self) -> bool {
        self.pnl > 0.0
    }

    pub fn is_loser(&self) -> bool {
        self.pnl < 0.0
    }
}

/// Aggregate results over the trade log.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct TradeSummary {
    pub pnl: f64,
    pub count: usize,
    pub win_rate_pct: f64,
}

impl TradeSummary {
    pub fn compute(trades: &[Trade]) -> Self {
        if trades.is_empty() {
            return TradeSummary::default();
        }
        let wins = trades.iter().filter(|t| t.is_winner()).count();
        TradeSummary {
            pnl: trades.iter().map(|t| t.pnl).sum(),
            count: trades.len(),
            win_rate_pct: wins as f64 / trades.len() as f64 * 100.0,
        }
    }
}
