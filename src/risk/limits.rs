//! Session loss circuit breaker

use super::HaltReason;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Running session P&L with a one-way halt.
///
/// Lives for one process run; a restart starts a fresh session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRisk {
    /// Loss floor, as a positive amount
    pub max_session_loss: Decimal,
    pub session_pnl: Decimal,
    halt: Option<HaltReason>,
}

impl SessionRisk {
    pub fn new(max_session_loss: Decimal) -> Self {
        Self {
            max_session_loss,
            session_pnl: Decimal::ZERO,
            halt: None,
        }
    }

    /// Add a settled P&L; returns the halt reason the first time the floor
    /// is reached
    pub fn record(&mut self, pnl: Decimal) -> Option<HaltReason> {
        self.session_pnl += pnl;

        if self.halt.is_none() && self.session_pnl <= -self.max_session_loss {
            let reason = HaltReason::MaxSessionLossReached(self.session_pnl);
            self.halt = Some(reason.clone());
            return Some(reason);
        }
        None
    }

    pub fn is_halted(&self) -> bool {
        self.halt.is_some()
    }

    pub fn halt_reason(&self) -> Option<&HaltReason> {
        self.halt.as_ref()
    }
}
