//! Signal generation module
//!
//! Turns an interval's move into an entry decision using calibrated fair
//! values, the higher-timeframe trend and the live order book.

mod evaluator;
mod types;

pub use evaluator::{EvalContext, SignalEvaluator};
pub use types::{EntryCandidate, EntrySignal, RejectReason, Side};
