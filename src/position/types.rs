//! Position types

use crate::signal::Side;
use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Why a position was closed before expiry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    /// Too little time left in the interval
    Forced,
    TakeProfit,
    StopLoss,
    /// Short-term trend crossed against the position
    TrendReversal,
}

impl ExitReason {
    pub fn label(self) -> &'static str {
        match self {
            ExitReason::Forced => "forced_exit",
            ExitReason::TakeProfit => "take_profit",
            ExitReason::StopLoss => "stop_loss",
            ExitReason::TrendReversal => "trend_reversal",
        }
    }
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Lifecycle of the controller's current interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionPhase {
    /// Nothing in flight; entries may be attempted
    #[default]
    Idle,
    Submitting,
    PendingFill,
    Open,
    Exiting,
    /// Closed early; waiting for the interval to settle
    Exited,
    Resolved,
    /// Entry order ended with nothing matched; no retry this interval
    Unfilled,
}

impl PositionPhase {
    /// The interval has had an order reach the exchange
    pub fn is_committed(self) -> bool {
        !matches!(self, PositionPhase::Idle)
    }
}

/// A filled entry, owned and mutated only by the controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub interval_start: i64,
    pub slug: String,
    pub side: Side,
    pub token_id: String,
    pub order_id: String,
    /// Execution price of the entry
    pub entry_price: Decimal,
    /// Confirmed filled shares
    pub size: Decimal,
    /// `entry_price * size`
    pub cost: Decimal,
    pub entry_ts: DateTime<Utc>,
    /// Fair value the entry was taken against
    pub fair_value: Decimal,
    pub exited: bool,
    pub exit_reason: Option<ExitReason>,
    pub exit_price: Option<Decimal>,
    pub exit_order_id: Option<String>,
    /// Shares actually sold; never more than `size`
    pub sold_size: Decimal,
    pub exit_pnl: Decimal,
    /// Closed without a confirmed sale; outcome unknown, recorded as zero
    pub written_off: bool,
    pub sell_attempts: u32,
}

impl Position {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        interval_start: i64,
        slug: impl Into<String>,
        side: Side,
        token_id: impl Into<String>,
        order_id: impl Into<String>,
        entry_price: Decimal,
        size: Decimal,
        fair_value: Decimal,
        entry_ts: DateTime<Utc>,
    ) -> Self {
        Self {
            interval_start,
            slug: slug.into(),
            side,
            token_id: token_id.into(),
            order_id: order_id.into(),
            entry_price,
            size,
            cost: (entry_price * size).round_dp(4),
            entry_ts,
            fair_value,
            exited: false,
            exit_reason: None,
            exit_price: None,
            exit_order_id: None,
            sold_size: Decimal::ZERO,
            exit_pnl: Decimal::ZERO,
            written_off: false,
            sell_attempts: 0,
        }
    }

    /// Shares still held to expiry
    pub fn held_size(&self) -> Decimal {
        (self.size - self.sold_size).max(Decimal::ZERO)
    }

    /// `(current - entry) / entry`
    pub fn return_pct(&self, current: Decimal) -> Option<Decimal> {
        if self.entry_price.is_zero() {
            return None;
        }
        Some((current - self.entry_price) / self.entry_price)
    }

    /// Record a confirmed sale of up to `filled` shares at `price`.
    ///
    /// Returns the proceeds credited.
    pub fn record_sale(&mut self, reason: ExitReason, order_id: &str, filled: Decimal, price: Decimal) -> Decimal {
        let sold = filled.min(self.held_size());
        self.sold_size += sold;
        self.exited = true;
        self.exit_reason = Some(reason);
        self.exit_price = Some(price);
        self.exit_order_id = Some(order_id.to_string());
        self.exit_pnl = ((price - self.entry_price) * sold).round_dp(2);
        (price * sold).round_dp(2)
    }

    /// Close without a confirmed sale
    pub fn write_off(&mut self, reason: ExitReason) {
        self.exited = true;
        self.written_off = true;
        self.exit_reason = Some(reason);
        self.exit_pnl = Decimal::ZERO;
    }

    /// Settle against the interval outcome. `winner` is `None` when the
    /// outcome could not be determined.
    pub fn settle(&self, winner: Option<Side>, settled_at: DateTime<Utc>) -> Settlement {
        let held = self.held_size();
        let (payout, held_pnl) = if self.written_off {
            (Decimal::ZERO, Decimal::ZERO)
        } else {
            match winner {
                Some(w) if w == self.side => (held, held - self.entry_price * held),
                Some(_) => (Decimal::ZERO, -(self.entry_price * held)),
                None => (Decimal::ZERO, Decimal::ZERO),
            }
        };

        let pnl = if self.written_off {
            Decimal::ZERO
        } else {
            (self.exit_pnl + held_pnl).round_dp(2)
        };

        Settlement {
            interval_start: self.interval_start,
            slug: self.slug.clone(),
            side: self.side,
            winner,
            entry_price: self.entry_price,
            size: self.size,
            cost: self.cost,
            exit_reason: self.exit_reason,
            exit_price: self.exit_price,
            written_off: self.written_off,
            payout: payout.round_dp(2),
            pnl,
            won: pnl > Decimal::ZERO,
            would_have_won: if self.exited {
                winner.map(|w| w == self.side)
            } else {
                None
            },
            entry_ts: self.entry_ts,
            settled_at,
        }
    }
}

/// Final record of a traded interval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settlement {
    pub interval_start: i64,
    pub slug: String,
    pub side: Side,
    pub winner: Option<Side>,
    pub entry_price: Decimal,
    pub size: Decimal,
    pub cost: Decimal,
    pub exit_reason: Option<ExitReason>,
    pub exit_price: Option<Decimal>,
    pub written_off: bool,
    /// Settlement value of shares held to expiry
    pub payout: Decimal,
    pub pnl: Decimal,
    pub won: bool,
    /// For early exits: whether holding would have won
    pub would_have_won: Option<bool>,
    pub entry_ts: DateTime<Utc>,
    pub settled_at: DateTime<Utc>,
}

fn has_cent_precision(value: Decimal) -> bool {
    (value * Decimal::ONE_HUNDRED).fract().is_zero()
}

/// Shares to buy for `bet` dollars at `price`.
///
/// Size is truncated to cents and walked down until the notional is also a
/// whole number of cents. If that falls under `min_order_value`, the size is
/// raised to 105% of the minimum instead.
pub fn entry_size(bet: Decimal, price: Decimal, min_order_value: Decimal) -> Option<Decimal> {
    if price <= Decimal::ZERO || bet <= Decimal::ZERO {
        return None;
    }

    let step = Decimal::new(1, 2);
    let mut size = (bet / price).round_dp_with_strategy(2, RoundingStrategy::ToZero);
    while size > Decimal::ONE && !has_cent_precision(size * price) {
        size -= step;
    }

    if size * price < min_order_value {
        size = (min_order_value * Decimal::new(105, 2) / price).round_dp(2);
    }

    (size > Decimal::ZERO).then_some(size)
}
