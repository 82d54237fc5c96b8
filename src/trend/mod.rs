//! Trend module
//!
//! Triple-EMA crossover trend tracking over candle closes, plus the
//! higher-timeframe EMA filter used to gate entries.

mod htf;
mod tema;
mod tracker;

pub use htf::HtfEmaTracker;
pub use tema::{ema, last_ema, tema};
pub use tracker::{TrendConfig, TrendTracker};

use crate::signal::Side;
use serde::{Deserialize, Serialize};

/// Trend direction derived from fast vs slow TEMA
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Trend {
    Up,
    Down,
    Neutral,
}

impl Trend {
    /// Compare fast and slow TEMA; an exact tie is `Neutral`
    pub fn from_tema(fast: f64, slow: f64) -> Self {
        if fast > slow {
            Trend::Up
        } else if fast < slow {
            Trend::Down
        } else {
            Trend::Neutral
        }
    }

    /// Whether this trend points the same way as `side`
    pub fn agrees_with(self, side: Side) -> bool {
        matches!(
            (self, side),
            (Trend::Up, Side::Up) | (Trend::Down, Side::Down)
        )
    }

    /// Whether this trend points against `side`
    pub fn opposes(self, side: Side) -> bool {
        matches!(
            (self, side),
            (Trend::Up, Side::Down) | (Trend::Down, Side::Up)
        )
    }
}

impl std::fmt::Display for Trend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trend::Up => write!(f, "Up"),
            Trend::Down => write!(f, "Down"),
            Trend::Neutral => write!(f, "Neutral"),
        }
    }
}

/// Cached TEMA pair of a tracker
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TemaState {
    pub tema_fast: Option<f64>,
    pub tema_slow: Option<f64>,
}

impl TemaState {
    /// Both TEMA values are defined
    pub fn ready(&self) -> bool {
        self.tema_fast.is_some() && self.tema_slow.is_some()
    }

    /// Trend implied by the pair; `Neutral` until ready
    pub fn trend(&self) -> Trend {
        match (self.tema_fast, self.tema_slow) {
            (Some(fast), Some(slow)) => Trend::from_tema(fast, slow),
            _ => Trend::Neutral,
        }
    }
}
