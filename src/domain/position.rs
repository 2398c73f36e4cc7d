//! Single-position state machine with a tiered trailing stop.
//!
//! The engine is either flat or holds exactly one [`Position`]. Positions are
//! values: every transition returns a new `Position` rather than editing the
//! old one, so the water marks, stop and tier of a tick change together.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

use super::trade::{ExitReason, IndicatorSnapshot};

/// The MACD-histogram flip exit stays switched off regardless of the
/// `macd_flip_exit_enabled` setting until the exit rule is signed off.
pub const MACD_FLIP_EXIT_ACTIVE: bool = false;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Long,
    Short,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Long => write!(f, "long"),
            Side::Short => write!(f, "short"),
        }
    }
}

/// Once unrealized profit reaches `trigger_pct`, the stop may be moved to lock
/// in `lock_pct` of the entry price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrailTier {
    pub trigger_pct: f64,
    pub lock_pct: f64,
}

pub fn default_trail_tiers() -> Vec<TrailTier> {
    vec![
        TrailTier {
            trigger_pct: 0.75,
            lock_pct: 0.25,
        },
        TrailTier {
            trigger_pct: 1.50,
            lock_pct: 0.60,
        },
        TrailTier {
            trigger_pct: 3.00,
            lock_pct: 1.20,
        },
    ]
}

#[derive(Debug, Clone, PartialEq)]
pub struct PositionRules {
    /// Initial stop distance from entry, in percent.
    pub stop_loss_pct: f64,
    /// Ordered by ascending `trigger_pct`.
    pub tiers: Vec<TrailTier>,
    pub allow_shorts: bool,
    pub macd_flip_exit: bool,
}

impl Default for PositionRules {
    fn default() -> Self {
        PositionRules {
            stop_loss_pct: 1.0,
            tiers: default_trail_tiers(),
            allow_shorts: true,
            macd_flip_exit: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Position {
    pub side: Side,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub high_water_mark: f64,
    pub low_water_mark: f64,
    /// 0 until a trailing tier moves the stop, then the 1-based tier index.
    pub stop_tier: usize,
    pub entry_time: DateTime<Utc>,
    pub entry: IndicatorSnapshot,
}

impl Position {
    pub fn open(
        side: Side,
        entry_price: f64,
        entry_time: DateTime<Utc>,
        entry: IndicatorSnapshot,
        stop_loss_pct: f64,
    ) -> Self {
        let stop_frac = stop_loss_pct / 100.0;
        let stop_loss = match side {
            Side::Long => entry_price * (1.0 - stop_frac),
            Side::Short => entry_price * (1.0 + stop_frac),
        };
        Position {
            side,
            entry_price,
            stop_loss,
            high_water_mark: entry_price,
            low_water_mark: entry_price,
            stop_tier: 0,
            entry_time,
            entry,
        }
    }

    /// Price difference in the holder's favour.
    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        match self.side {
            Side::Long => price - self.entry_price,
            Side::Short => self.entry_price - price,
        }
    }

    pub fn profit_pct(&self, price: f64) -> f64 {
        self.unrealized_pnl(price) / self.entry_price * 100.0
    }

    pub fn should_stop_loss(&self, price: f64) -> bool {
        match self.side {
            Side::Long => price <= self.stop_loss,
            Side::Short => price >= self.stop_loss,
        }
    }

    /// True when `candidate` is a strictly tighter stop for this side.
    fn is_more_favorable(&self, candidate: f64) -> bool {
        match self.side {
            Side::Long => candidate > self.stop_loss,
            Side::Short => candidate < self.stop_loss,
        }
    }

    /// The position after observing `price`: water marks advanced and the
    /// stop ratcheted to the highest tier reached, if that tightens it.
    pub fn ticked(&self, price: f64, tiers: &[TrailTier]) -> Position {
        let mut next = self.clone();
        match next.side {
            Side::Long => next.high_water_mark = next.high_water_mark.max(price),
            Side::Short => next.low_water_mark = next.low_water_mark.min(price),
        }

        let profit_pct = self.profit_pct(price);
        if let Some((index, tier)) = tiers
            .iter()
            .enumerate()
            .rev()
            .find(|(_, tier)| profit_pct >= tier.trigger_pct)
        {
            let lock = tier.lock_pct / 100.0;
            let candidate = match next.side {
                Side::Long => next.entry_price * (1.0 + lock),
                Side::Short => next.entry_price * (1.0 - lock),
            };
            if next.is_more_favorable(candidate) {
                tracing::debug!(
                    side = %next.side,
                    tier = index + 1,
                    from = next.stop_loss,
                    to = candidate,
                    "trailing stop ratcheted"
                );
                next.stop_loss = candidate;
                next.stop_tier = index + 1;
            }
        }

        next
    }
}

/// Histogram sign opposite to the position side.
pub fn histogram_flipped(side: Side, histogram: Option<f64>) -> bool {
    match (side, histogram) {
        (Side::Long, Some(h)) => h < 0.0,
        (Side::Short, Some(h)) => h > 0.0,
        (_, None) => false,
    }
}

/// Side to open on a flat tick, if any.
pub fn entry_side(score: f64, threshold: f64, allow_shorts: bool) -> Option<Side> {
    if score >= threshold {
        Some(Side::Long)
    } else if allow_shorts && score <= -threshold {
        Some(Side::Short)
    } else {
        None
    }
}

/// Everything the state machine needs to know about the current tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickInput {
    pub price: f64,
    pub time: DateTime<Utc>,
    pub threshold: f64,
    pub snapshot: IndicatorSnapshot,
    pub histogram: Option<f64>,
}

/// A position leaving the book; becomes exactly one trade.
#[derive(Debug, Clone, PartialEq)]
pub struct Exit {
    pub position: Position,
    pub price: f64,
    pub time: DateTime<Utc>,
    pub reason: ExitReason,
    pub snapshot: IndicatorSnapshot,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct StepOutcome {
    /// The position to carry into the next tick.
    pub position: Option<Position>,
    /// Set when a position was opened on this tick.
    pub opened: Option<Side>,
    /// Set when a position was closed on this tick.
    pub exit: Option<Exit>,
}

/// Advance the state machine by one tick.
///
/// Flat: open when the score clears the threshold (long) or its negative
/// (short, if allowed) and RSI and MACD are defined. Open (including a
/// position opened on this very tick): advance water marks and stop, then
/// close on a stop breach or, when active, a histogram flip.
pub fn step(current: Option<&Position>, tick: &TickInput, rules: &PositionRules) -> StepOutcome {
    let mut outcome = StepOutcome::default();

    let position = match current {
        Some(position) => Some(position.clone()),
        None => {
            let indicators_defined = tick.snapshot.rsi.is_some() && tick.snapshot.macd.is_some();
            let price_usable = tick.price.is_finite() && tick.price > 0.0;
            entry_side(tick.snapshot.score, tick.threshold, rules.allow_shorts)
                .filter(|_| indicators_defined && price_usable)
                .map(|side| {
                    outcome.opened = Some(side);
                    Position::open(
                        side,
                        tick.price,
                        tick.time,
                        tick.snapshot,
                        rules.stop_loss_pct,
                    )
                })
        }
    };

    let Some(position) = position else {
        return outcome;
    };

    let next = position.ticked(tick.price, &rules.tiers);
    let reason = if next.should_stop_loss(tick.price) {
        Some(ExitReason::StopLoss)
    } else if MACD_FLIP_EXIT_ACTIVE
        && rules.macd_flip_exit
        && histogram_flipped(next.side, tick.histogram)
    {
        Some(ExitReason::MacdFlip)
    } else {
        None
    };

    match reason {
        Some(reason) => {
            outcome.exit = Some(Exit {
                position: next,
                price: tick.price,
                time: tick.time,
                reason,
                snapshot: tick.snapshot,
            });
        }
        None => outcome.position = Some(next),
    }

    outcome
}
