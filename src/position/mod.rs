//! Position module
//!
//! Position records and settlement, exit rules, and the controller task that
//! drives an entry from order submission through exit and resolution.

mod controller;
mod exit;
mod types;

pub use controller::{
    ControllerCommand, ControllerConfig, ControllerHandle, ControllerSnapshot, PositionController,
};
pub use exit::{ExitRules, PendingCrossing, ReversalTracker};
pub use types::{entry_size, ExitReason, Position, PositionPhase, Settlement};
