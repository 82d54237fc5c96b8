//! Candle module
//!
//! Fixed-width OHLC candles, tick bucketing, and historical candle sources
//! used for tracker bootstrap and offline calibration.

mod aggregator;
mod binance;
mod coinbase;

pub use aggregator::{resample, CandleAggregator};
pub use binance::BinanceKlines;
pub use coinbase::CoinbaseCandles;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A closed OHLC candle, keyed by its bucket start (unix seconds)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Bucket start, unix seconds
    pub start_ts: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
}

impl Candle {
    /// A candle opened by a single price
    pub fn from_price(start_ts: i64, price: Decimal) -> Self {
        Self {
            start_ts,
            open: price,
            high: price,
            low: price,
            close: price,
        }
    }

    /// Fold another price into this candle
    pub fn update(&mut self, price: Decimal) {
        self.high = self.high.max(price);
        self.low = self.low.min(price);
        self.close = price;
    }
}

/// Start of the bucket containing `ts` for buckets of `width` seconds.
/// A width below one second is treated as one.
pub fn bucket_start(ts: i64, width: i64) -> i64 {
    let width = width.max(1);
    ts.div_euclid(width) * width
}

/// Sort ascending by start time and drop duplicate buckets (first wins)
pub fn normalize(mut candles: Vec<Candle>) -> Vec<Candle> {
    candles.sort_by_key(|c| c.start_ts);
    candles.dedup_by_key(|c| c.start_ts);
    candles
}

/// Trait for historical candle providers
#[async_trait]
pub trait HistoricalCandleSource: Send + Sync {
    /// Fetch candles of `width_secs` whose start falls in `[start, end)`,
    /// ascending and deduplicated.
    async fn fetch(
        &self,
        width_secs: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> anyhow::Result<Vec<Candle>>;
}
