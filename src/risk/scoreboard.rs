//! Win/loss tallies over settled trades

use crate::position::{ExitReason, Settlement};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Early-exit outcomes versus holding to expiry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeldComparison {
    /// Exited, but the held side lost: the exit saved money
    pub saved: u64,
    /// Exited, but the held side won: the exit cost money
    pub cost: u64,
}

/// Aggregate results across settled trades
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scoreboard {
    pub trades: u64,
    pub wins: u64,
    pub losses: u64,
    /// Closed without a confirmed sale
    pub written_off: u64,
    pub total_pnl: Decimal,
    pub exits: BTreeMap<String, u64>,
    pub held: HeldComparison,
}

impl Scoreboard {
    /// Build from a trade history
    pub fn from_trades<'a>(trades: impl IntoIterator<Item = &'a Settlement>) -> Self {
        let mut board = Self::default();
        for t in trades {
            board.record(t);
        }
        board
    }

    pub fn record(&mut self, s: &Settlement) {
        self.trades += 1;
        self.total_pnl += s.pnl;

        if s.written_off {
            self.written_off += 1;
        } else if s.won {
            self.wins += 1;
        } else {
            self.losses += 1;
        }

        if let Some(reason) = s.exit_reason {
            *self.exits.entry(reason.label().to_string()).or_default() += 1;
            match s.would_have_won {
                Some(true) => self.held.cost += 1,
                Some(false) => self.held.saved += 1,
                None => {}
            }
        }
    }

    pub fn exits_for(&self, reason: ExitReason) -> u64 {
        self.exits.get(reason.label()).copied().unwrap_or(0)
    }

    /// Wins over decided trades
    pub fn win_rate(&self) -> Option<f64> {
        let decided = self.wins + self.losses;
        (decided > 0).then(|| self.wins as f64 / decided as f64)
    }
}

impl std::fmt::Display for Scoreboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}W/{}L", self.wins, self.losses)?;
        if self.written_off > 0 {
            write!(f, "/{}?", self.written_off)?;
        }
        write!(f, " | P&L {:+}", self.total_pnl.round_dp(2))?;
        if self.held.saved + self.held.cost > 0 {
            write!(f, " | exits {}saved/{}cost", self.held.saved, self.held.cost)?;
        }
        Ok(())
    }
}
