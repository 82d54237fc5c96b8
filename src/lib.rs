//! poly-sniper: Momentum sniper for Polymarket BTC 15-minute up/down markets
//!
//! This library provides the core components for:
//! - Real-time BTC price from the Chainlink stream or Binance trades
//! - Candle synthesis and triple-EMA trend tracking
//! - Offline calibration of an empirical fair-value table
//! - Per-interval session tracking and entry gating
//! - Position lifecycle: fill confirmation, exits, settlement
//! - Session circuit breaker and persisted bankroll
//! - Paper execution against the live order book
//! - Logging and Prometheus metrics

pub mod calibration;
pub mod candles;
pub mod cli;
pub mod config;
pub mod engine;
pub mod execution;
pub mod feed;
pub mod market;
pub mod position;
pub mod risk;
pub mod session;
pub mod signal;
pub mod telemetry;
pub mod trend;
pub mod ws;
