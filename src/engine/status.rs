//! Point-in-time engine status

use crate::position::ControllerSnapshot;
use crate::session::IntervalState;
use crate::trend::Trend;
use rust_decimal::Decimal;
use serde::Serialize;

/// Snapshot for reporting: current interval, trends and controller state
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub interval: Option<IntervalState>,
    pub move_pct: Option<Decimal>,
    pub elapsed_secs: Option<i64>,
    pub trend: Trend,
    pub exit_trend: Trend,
    pub htf_ema: Option<f64>,
    pub ticks: u64,
    pub controller: ControllerSnapshot,
}

impl std::fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.interval, self.move_pct) {
            (Some(iv), Some(m)) => write!(
                f,
                "interval {} +{}s move {}%",
                iv.start_ts,
                self.elapsed_secs.unwrap_or_default(),
                m.round_dp(3)
            )?,
            (Some(iv), None) => write!(f, "interval {} (no open)", iv.start_ts)?,
            _ => write!(f, "no interval")?,
        }
        write!(f, " | trend {}", self.trend)?;
        if let Some(ema) = self.htf_ema {
            write!(f, " | htf {:.2}", ema)?;
        }
        write!(f, " | {:?}", self.controller.phase)?;
        if let Some(p) = &self.controller.position {
            write!(f, " {} {}@{}", p.side, p.size, p.entry_price)?;
        }
        if self.controller.halted {
            write!(f, " | HALTED")?;
        }
        write!(f, " | {} | bank {}", self.controller.scoreboard, self.controller.bankroll.round_dp(2))
    }
}
