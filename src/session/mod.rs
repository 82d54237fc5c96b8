//! Interval session module
//!
//! Tracks the current 15-minute window: its open, range, and clocks, and
//! rotates edge-triggered on tick arrival.

mod interval;

pub use interval::{IntervalClock, IntervalState, Rotation};

/// Length of one market interval in seconds
pub const INTERVAL_SECS: i64 = 900;
