//! Calibration module
//!
//! Offline replay of historical 1-minute candles through 15-minute intervals,
//! producing the empirical win-probability table the live engine reads.

mod buckets;
mod engine;
mod table;

pub use buckets::{ElapsedBucket, MoveBucket};
pub use engine::{CalibrationEngine, CalibrationReport, IntervalStats, Observation, PersistenceRates};
pub use table::{BucketTable, Cell, FairValue, FairValueTable, TableBuilder};

use rust_decimal::Decimal;
use thiserror::Error;

/// Calibration and table loading errors
#[derive(Debug, Error)]
pub enum CalibrationError {
    #[error("no candles to calibrate from")]
    NoCandles,
    #[error("table i/o: {0}")]
    Io(#[from] std::io::Error),
    #[error("table format: {0}")]
    Format(#[from] serde_json::Error),
}

/// Maps `(|move%|, elapsed seconds)` to a trusted win probability
pub trait FairValueLookup: Send + Sync {
    /// `None` when the point falls outside the buckets or the cell is not
    /// backed by enough samples
    fn lookup(&self, abs_move_pct: Decimal, elapsed_secs: i64) -> Option<FairValue>;
}
