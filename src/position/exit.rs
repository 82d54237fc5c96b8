//! Exit conditions for an open position

use super::{ExitReason, Position};
use crate::config::PositionConfig;
use crate::signal::Side;
use crate::trend::Trend;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Price and time thresholds, evaluated in priority order
#[derive(Debug, Clone)]
pub struct ExitRules {
    pub take_profit_pct: Decimal,
    pub stop_loss_pct: Decimal,
    pub exit_before_end_secs: i64,
}

impl ExitRules {
    pub fn from_config(config: &PositionConfig) -> Self {
        Self {
            take_profit_pct: config.take_profit_pct,
            stop_loss_pct: config.stop_loss_pct,
            exit_before_end_secs: config.exit_before_end_secs,
        }
    }

    /// First exit that applies: forced, take-profit, stop-loss, reversal.
    ///
    /// `current_price` is the outcome token's price; without one only the
    /// time-based and reversal exits can fire.
    pub fn decide(
        &self,
        position: &Position,
        remaining_secs: i64,
        current_price: Option<Decimal>,
        reversal: bool,
    ) -> Option<ExitReason> {
        if position.exited {
            return None;
        }
        if remaining_secs <= self.exit_before_end_secs {
            return Some(ExitReason::Forced);
        }

        if let Some(ret) = current_price.and_then(|p| position.return_pct(p)) {
            if ret >= self.take_profit_pct {
                return Some(ExitReason::TakeProfit);
            }
            if ret <= -self.stop_loss_pct {
                return Some(ExitReason::StopLoss);
            }
        }

        reversal.then_some(ExitReason::TrendReversal)
    }
}

/// State of the most recent adverse trend crossing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingCrossing {
    #[default]
    None,
    /// A crossing was deferred because the position had cushion
    Armed,
    /// A crossing produced an exit signal
    Fired,
}

/// Detects trend crossings against a position.
///
/// A crossing is a change of the last non-neutral trend to one opposing the
/// position. With more than `cushion_pct` favourable move the first crossing
/// only arms; every crossing after that fires regardless of cushion. The
/// last-seen trend always advances, so a deferred crossing is not re-read on
/// later ticks.
#[derive(Debug, Clone)]
pub struct ReversalTracker {
    side: Side,
    cushion_pct: Decimal,
    last: Option<Trend>,
    pending: PendingCrossing,
}

impl ReversalTracker {
    pub fn new(side: Side, initial: Trend, cushion_pct: Decimal) -> Self {
        Self {
            side,
            cushion_pct,
            last: (initial != Trend::Neutral).then_some(initial),
            pending: PendingCrossing::None,
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn pending(&self) -> PendingCrossing {
        self.pending
    }

    /// Feed the current exit trend and the interval move (percent, signed as
    /// BTC moved). Returns true when a reversal exit should fire.
    pub fn observe(&mut self, trend: Trend, move_pct: Decimal) -> bool {
        if trend == Trend::Neutral {
            return false;
        }

        let crossing = matches!(self.last, Some(prev) if prev != trend) && trend.opposes(self.side);
        self.last = Some(trend);

        if !crossing {
            return false;
        }

        match self.pending {
            PendingCrossing::Armed | PendingCrossing::Fired => {
                self.pending = PendingCrossing::Fired;
                true
            }
            PendingCrossing::None => {
                if self.side.favourable(move_pct) > self.cushion_pct {
                    tracing::info!(
                        side = %self.side,
                        trend = %trend,
                        move_pct = %move_pct,
                        "Trend crossed against position, deferred on cushion"
                    );
                    self.pending = PendingCrossing::Armed;
                    false
                } else {
                    self.pending = PendingCrossing::Fired;
                    true
                }
            }
        }
    }
}
