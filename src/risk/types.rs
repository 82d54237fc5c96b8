//! Risk management types

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reason for trading halt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HaltReason {
    /// Cumulative session P&L reached the loss floor
    MaxSessionLossReached(Decimal),
}

impl std::fmt::Display for HaltReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HaltReason::MaxSessionLossReached(pnl) => write!(f, "session loss limit reached at {pnl}"),
        }
    }
}

/// Session state persistence errors
#[derive(Debug, Error)]
pub enum RiskError {
    #[error("state file: {0}")]
    Io(#[from] std::io::Error),
    #[error("state format: {0}")]
    Format(#[from] serde_json::Error),
}
