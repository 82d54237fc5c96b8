//! Higher-timeframe EMA filter

use super::last_ema;
use crate::candles::{bucket_start, Candle, CandleAggregator, HistoricalCandleSource};
use crate::signal::Side;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::VecDeque;

/// EMA of 15-minute closes compared against the live price.
///
/// An `Up` entry is aligned when price is above the EMA, a `Down` entry when
/// below. Before the EMA is defined the filter has no opinion.
#[derive(Debug, Clone)]
pub struct HtfEmaTracker {
    period: usize,
    candles: CandleAggregator,
    closes: VecDeque<f64>,
    ema: Option<f64>,
    last_price: Option<f64>,
}

impl HtfEmaTracker {
    /// Create a filter over candles `candle_secs` wide
    pub fn new(candle_secs: i64, period: usize) -> Self {
        Self {
            period,
            candles: CandleAggregator::new(candle_secs),
            closes: VecDeque::new(),
            ema: None,
            last_price: None,
        }
    }

    fn capacity(&self) -> usize {
        self.period * 4 + 10
    }

    /// Current EMA value
    pub fn ema(&self) -> Option<f64> {
        self.ema
    }

    /// Whether the EMA is defined and a price has been seen
    pub fn is_ready(&self) -> bool {
        self.ema.is_some() && self.last_price.is_some()
    }

    /// Feed a trade price at `ts` (unix seconds)
    pub fn update_price(&mut self, ts: i64, price: Decimal) {
        let Some(p) = price.to_f64() else { return };
        self.last_price = Some(p);

        if let Some(closed) = self.candles.push(ts, price) {
            if let Some(close) = closed.close.to_f64() {
                self.push_close(close);
            }
        }
    }

    fn push_close(&mut self, close: f64) {
        if self.closes.len() == self.capacity() {
            self.closes.pop_front();
        }
        self.closes.push_back(close);
        self.ema = last_ema(self.closes.make_contiguous(), self.period);
    }

    /// `Some(aligned)` once ready, `None` otherwise (or on an exact tie)
    pub fn is_aligned(&self, side: Side) -> Option<bool> {
        let ema = self.ema?;
        let price = self.last_price?;
        if price == ema {
            return None;
        }
        Some(match side {
            Side::Up => price > ema,
            Side::Down => price < ema,
        })
    }

    /// Seed from ascending history, as for the trend tracker
    pub fn seed(&mut self, candles: &[Candle], now_ts: i64) {
        let current_bucket = bucket_start(now_ts, self.candles.width_secs());
        for candle in candles {
            if candle.start_ts < current_bucket {
                if let Some(close) = candle.close.to_f64() {
                    self.push_close(close);
                }
            } else if candle.start_ts == current_bucket {
                self.candles.seed_current(*candle);
                self.last_price = candle.close.to_f64();
            }
        }
    }

    /// Pre-seed from a historical source; failure leaves the filter open
    pub async fn bootstrap(&mut self, source: &dyn HistoricalCandleSource, now: DateTime<Utc>) -> bool {
        let width = self.candles.width_secs();
        let start = now - Duration::seconds((self.capacity() as i64) * width);

        match source.fetch(width, start, now).await {
            Ok(candles) => {
                self.seed(&candles, now.timestamp());
                tracing::info!(ema = ?self.ema, "HTF filter bootstrapped");
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "HTF bootstrap failed, filter disabled until warm");
                false
            }
        }
    }
}
