//! Daily risk governor.

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RiskLimits {
    pub daily_max_loss: f64,
    pub daily_max_drawdown: f64,
}

impl Default for RiskLimits {
    fn default() -> Self {
        RiskLimits {
            daily_max_loss: 500.0,
            daily_max_drawdown: 1000.0,
        }
    }
}

/// Why the governor stopped the engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HaltReason {
    DailyLoss { pnl: f64, limit: f64 },
    DailyDrawdown { drawdown: f64, limit: f64 },
}

impl fmt::Display for HaltReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HaltReason::DailyLoss { pnl, limit } => {
                write!(f, "daily P&L {pnl:.2} reached limit {limit:.2}")
            }
            HaltReason::DailyDrawdown { drawdown, limit } => {
                write!(f, "daily drawdown {drawdown:.2} reached limit {limit:.2}")
            }
        }
    }
}

/// Realized P&L accumulated since the last engine start.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct RiskLedger {
    pub daily_realized_pnl: f64,
    pub peak_realized_pnl: f64,
    pub daily_drawdown: f64,
}

impl RiskLedger {
    pub fn record(&mut self, pnl: f64) {
        self.daily_realized_pnl += pnl;
        self.peak_realized_pnl = self.peak_realized_pnl.max(self.daily_realized_pnl);
        self.daily_drawdown = self.peak_realized_pnl - self.daily_realized_pnl;
    }

    /// The magnitude of daily P&L is compared, so a large enough profit
    /// halts as well as a loss.
    pub fn check(&self, limits: &RiskLimits) -> Option<HaltReason> {
        if self.daily_realized_pnl.abs() >= limits.daily_max_loss {
            return Some(HaltReason::DailyLoss {
                pnl: self.daily_realized_pnl,
                limit: limits.daily_max_loss,
            });
        }
        if self.daily_drawdown.abs() >= limits.daily_max_drawdown {
            return Some(HaltReason::DailyDrawdown {
                drawdown: self.daily_drawdown,
                limit: limits.daily_max_drawdown,
            });
        }
        None
    }
}
