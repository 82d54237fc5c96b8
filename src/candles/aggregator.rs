//! Tick-to-candle bucketing

use super::{bucket_start, Candle};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Buckets a price stream into fixed-width candles.
///
/// Only one candle is in progress at a time. A tick whose bucket lies after
/// the current one closes the current candle; any other tick is folded into
/// the in-progress candle.
#[derive(Debug, Clone)]
pub struct CandleAggregator {
    width_secs: i64,
    current: Option<Candle>,
}

impl CandleAggregator {
    /// Create an aggregator for candles `width_secs` wide
    pub fn new(width_secs: i64) -> Self {
        Self {
            width_secs: width_secs.max(1),
            current: None,
        }
    }

    /// Candle width in seconds
    pub fn width_secs(&self) -> i64 {
        self.width_secs
    }

    /// The in-progress candle, if any tick has been seen
    pub fn current(&self) -> Option<&Candle> {
        self.current.as_ref()
    }

    /// Replace the in-progress candle (used when seeding from history)
    pub fn seed_current(&mut self, candle: Candle) {
        self.current = Some(candle);
    }

    /// Fold a tick in, returning the candle it closed (if any)
    pub fn push(&mut self, ts: i64, price: Decimal) -> Option<Candle> {
        let start = bucket_start(ts, self.width_secs);

        match self.current.as_mut() {
            None => {
                self.current = Some(Candle::from_price(start, price));
                None
            }
            Some(candle) if start > candle.start_ts => {
                let closed = *candle;
                self.current = Some(Candle::from_price(start, price));
                Some(closed)
            }
            Some(candle) => {
                candle.update(price);
                None
            }
        }
    }
}

/// Aggregate ascending candles into wider buckets of `width_secs`.
///
/// Partial buckets are kept; the output is ascending by start.
pub fn resample(candles: &[Candle], width_secs: i64) -> Vec<Candle> {
    let mut by_bucket: BTreeMap<i64, Candle> = BTreeMap::new();

    for c in candles {
        let start = bucket_start(c.start_ts, width_secs);
        by_bucket
            .entry(start)
            .and_modify(|agg| {
                agg.high = agg.high.max(c.high);
                agg.low = agg.low.min(c.low);
                agg.close = c.close;
            })
            .or_insert(Candle {
                start_ts: start,
                ..*c
            });
    }

    by_bucket.into_values().collect()
}
