//! Risk management module
//!
//! Session circuit breaker, trade scoreboard and persisted session state

mod limits;
mod scoreboard;
mod snapshot;
mod types;

pub use limits::SessionRisk;
pub use scoreboard::{HeldComparison, Scoreboard};
pub use snapshot::SessionSnapshot;
pub use types::{HaltReason, RiskError};
