//! CLI interface for poly-sniper
//!
//! Provides subcommands for:
//! - `run`: Trade the 15-minute markets (paper gateway)
//! - `calibrate`: Build the fair-value table from price history
//! - `status`: Show the persisted session record
//! - `config`: Print the effective configuration

mod calibrate;
mod run;
mod status;

pub use calibrate::CalibrateArgs;
pub use run::RunArgs;
pub use status::StatusArgs;

use crate::candles::{BinanceKlines, CoinbaseCandles, HistoricalCandleSource};
use crate::config::{CalibrationConfig, CandleSourceKind};
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "poly-sniper")]
#[command(about = "Momentum sniper for Polymarket BTC 15-minute up/down markets")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the trading loop
    Run(RunArgs),
    /// Build the fair-value table from historical candles
    Calibrate(CalibrateArgs),
    /// Show session record and bankroll
    Status(StatusArgs),
    /// Print the effective configuration
    Config,
}

/// Historical candle source named by the calibration settings
pub fn candle_source(config: &CalibrationConfig) -> anyhow::Result<(Box<dyn HistoricalCandleSource>, &'static str)> {
    Ok(match config.source {
        CandleSourceKind::Coinbase => (Box::new(CoinbaseCandles::new(&config.product)?), "coinbase"),
        CandleSourceKind::Binance => (Box::new(BinanceKlines::new(&config.symbol)?), "binance"),
    })
}
