//! Persisted bankroll and trade history

use super::{RiskError, Scoreboard};
use crate::position::Settlement;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// State carried across restarts. Loaded once at startup, written after
/// every settlement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub bankroll: Decimal,
    #[serde(default)]
    pub trades: Vec<Settlement>,
    pub updated: DateTime<Utc>,
}

impl SessionSnapshot {
    pub fn new(bankroll: Decimal) -> Self {
        Self {
            bankroll,
            trades: vec![],
            updated: Utc::now(),
        }
    }

    /// Read `path`, or start fresh with `initial_bankroll` if it does not exist
    pub fn load_or_new(path: impl AsRef<Path>, initial_bankroll: Decimal) -> Result<Self, RiskError> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!(path = %path.display(), bankroll = %initial_bankroll, "No session state, starting fresh");
            return Ok(Self::new(initial_bankroll));
        }

        let content = std::fs::read_to_string(path)?;
        let snapshot: Self = serde_json::from_str(&content)?;
        tracing::info!(
            path = %path.display(),
            bankroll = %snapshot.bankroll,
            trades = snapshot.trades.len(),
            "Loaded session state"
        );
        Ok(snapshot)
    }

    /// Write via a temporary file and rename
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), RiskError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(self)?)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Append a settled trade
    pub fn push(&mut self, settlement: Settlement) {
        self.trades.push(settlement);
        self.updated = Utc::now();
    }

    pub fn scoreboard(&self) -> Scoreboard {
        Scoreboard::from_trades(&self.trades)
    }
}
