//! Signal types

use crate::calibration::FairValue;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Outcome side of an up/down market
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Up,
    Down,
}

impl Side {
    /// The other outcome
    pub fn opposite(self) -> Self {
        match self {
            Side::Up => Side::Down,
            Side::Down => Side::Up,
        }
    }

    /// Outcome name as listed by the market
    pub fn outcome_name(self) -> &'static str {
        match self {
            Side::Up => "Up",
            Side::Down => "Down",
        }
    }

    /// `move_pct` signed in this side's favour
    pub fn favourable(self, move_pct: Decimal) -> Decimal {
        match self {
            Side::Up => move_pct,
            Side::Down => -move_pct,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.outcome_name())
    }
}

/// Passed the price-independent gates; awaiting an order book check
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EntryCandidate {
    pub interval_start: i64,
    pub side: Side,
    pub move_pct: Decimal,
    pub elapsed_secs: i64,
    pub remaining_secs: i64,
    pub fair_value: FairValue,
}

/// Fully gated entry decision
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntrySignal {
    pub interval_start: i64,
    pub side: Side,
    pub token_id: String,
    /// Calibrated win probability
    pub fair_value: Decimal,
    /// Limit price for the buy
    pub buy_price: Decimal,
    pub best_bid: Decimal,
    pub best_ask: Decimal,
    pub spread: Decimal,
    /// `fair_value - buy_price`
    pub edge: Decimal,
    pub move_pct: Decimal,
    pub elapsed_secs: i64,
}

/// Why an evaluation did not produce an entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RejectReason {
    CircuitBreaker,
    FirstInterval,
    PositionTaken,
    NoOpenPrice,
    OutsideWindow(i64),
    MoveTooSmall(Decimal),
    NoFairValue,
    Throttled,
    HtfMisaligned,
    MarketUnavailable,
    NotAcceptingOrders,
    NoLiquidity,
    EdgeTooSmall(Decimal),
    PriceTooHigh(Decimal),
    SpreadTooWide(Decimal),
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::CircuitBreaker => write!(f, "circuit breaker tripped"),
            RejectReason::FirstInterval => write!(f, "first interval after start"),
            RejectReason::PositionTaken => write!(f, "position already taken"),
            RejectReason::NoOpenPrice => write!(f, "no open price"),
            RejectReason::OutsideWindow(s) => write!(f, "elapsed {s}s outside entry window"),
            RejectReason::MoveTooSmall(m) => write!(f, "move {m}% below minimum"),
            RejectReason::NoFairValue => write!(f, "no trusted fair value"),
            RejectReason::Throttled => write!(f, "throttled"),
            RejectReason::HtfMisaligned => write!(f, "against higher-timeframe trend"),
            RejectReason::MarketUnavailable => write!(f, "market unavailable"),
            RejectReason::NotAcceptingOrders => write!(f, "market not accepting orders"),
            RejectReason::NoLiquidity => write!(f, "no bid/ask"),
            RejectReason::EdgeTooSmall(e) => write!(f, "edge {e} below minimum"),
            RejectReason::PriceTooHigh(p) => write!(f, "price {p} above maximum"),
            RejectReason::SpreadTooWide(s) => write!(f, "spread {s} too wide"),
        }
    }
}
