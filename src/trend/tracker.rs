//! TEMA crossover trend tracker

use super::{tema, TemaState, Trend};
use crate::candles::{bucket_start, Candle, CandleAggregator, HistoricalCandleSource};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Extra closes kept beyond the `3 * slow` minimum
const HISTORY_MARGIN: usize = 60;

/// Candle width and TEMA periods of a tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendConfig {
    pub candle_secs: i64,
    pub fast_period: usize,
    pub slow_period: usize,
}

impl TrendConfig {
    /// Closes needed before the slow TEMA is defined
    pub fn min_candles(&self) -> usize {
        self.slow_period * 3
    }

    /// Bounded history size
    pub fn history_capacity(&self) -> usize {
        self.min_candles() + HISTORY_MARGIN
    }

    /// Candles requested from history on bootstrap
    pub fn bootstrap_candles(&self) -> usize {
        (self.min_candles() + 20).min(1000)
    }
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            candle_secs: 300,
            fast_period: 10,
            slow_period: 80,
        }
    }
}

/// Tracks fast/slow TEMA over a bounded history of candle closes.
///
/// The in-progress candle is overwritten on every tick; its close is only
/// appended to the history once a tick lands in a later bucket.
#[derive(Debug, Clone)]
pub struct TrendTracker {
    config: TrendConfig,
    candles: CandleAggregator,
    closes: VecDeque<f64>,
    state: TemaState,
}

impl TrendTracker {
    /// Create an empty tracker
    pub fn new(config: TrendConfig) -> Self {
        Self {
            config,
            candles: CandleAggregator::new(config.candle_secs),
            closes: VecDeque::with_capacity(config.history_capacity()),
            state: TemaState::default(),
        }
    }

    /// Tracker configuration
    pub fn config(&self) -> &TrendConfig {
        &self.config
    }

    /// Current trend; `Neutral` until both TEMAs are defined
    pub fn trend(&self) -> Trend {
        self.state.trend()
    }

    /// Cached TEMA values
    pub fn state(&self) -> TemaState {
        self.state
    }

    /// Whether both TEMAs are defined
    pub fn is_ready(&self) -> bool {
        self.state.ready()
    }

    /// Number of closed candles held
    pub fn len(&self) -> usize {
        self.closes.len()
    }

    /// No closed candles held yet
    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }

    /// Feed a trade price at `ts` (unix seconds).
    ///
    /// Returns the recomputed trend when the tick closed a candle.
    pub fn update_price(&mut self, ts: i64, price: Decimal) -> Option<Trend> {
        let closed = self.candles.push(ts, price)?;
        let close = closed.close.to_f64()?;
        self.push_close(close);
        Some(self.trend())
    }

    /// Append a closed candle's close and recompute
    pub fn push_close(&mut self, close: f64) {
        self.append(close);
        self.recalculate();
    }

    fn append(&mut self, close: f64) {
        if self.closes.len() == self.config.history_capacity() {
            self.closes.pop_front();
        }
        self.closes.push_back(close);
    }

    fn recalculate(&mut self) {
        let closes = self.closes.make_contiguous();
        self.state = TemaState {
            tema_fast: tema(closes, self.config.fast_period),
            tema_slow: tema(closes, self.config.slow_period),
        };
    }

    /// Seed history from ascending candles.
    ///
    /// Candles before the bucket containing `now_ts` become history; a candle
    /// in the current bucket becomes the in-progress candle. Returns the
    /// number of closes added.
    pub fn seed(&mut self, candles: &[Candle], now_ts: i64) -> usize {
        let current_bucket = bucket_start(now_ts, self.config.candle_secs);
        let mut added = 0;

        for candle in candles {
            if candle.start_ts < current_bucket {
                if let Some(close) = candle.close.to_f64() {
                    self.append(close);
                    added += 1;
                }
            } else if candle.start_ts == current_bucket {
                self.candles.seed_current(*candle);
            }
        }

        self.recalculate();
        added
    }

    /// Pre-seed from a historical source.
    ///
    /// Failure is logged and leaves the tracker empty; it fills from live
    /// ticks instead.
    pub async fn bootstrap(&mut self, source: &dyn HistoricalCandleSource, now: DateTime<Utc>) -> bool {
        let count = self.config.bootstrap_candles() as i64;
        let start = now - Duration::seconds(count * self.config.candle_secs);

        match source.fetch(self.config.candle_secs, start, now).await {
            Ok(candles) => {
                let added = self.seed(&candles, now.timestamp());
                tracing::info!(
                    candle_secs = self.config.candle_secs,
                    closes = added,
                    ready = self.is_ready(),
                    trend = %self.trend(),
                    "Trend tracker bootstrapped"
                );
                true
            }
            Err(e) => {
                tracing::warn!(
                    candle_secs = self.config.candle_secs,
                    error = %e,
                    "Trend bootstrap failed, warming up from live ticks"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;

    fn config(fast: usize, slow: usize) -> TrendConfig {
        TrendConfig {
            candle_secs: 60,
            fast_period: fast,
            slow_period: slow,
        }
    }

    fn accelerating(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| 100.0 + i as f64 + 0.01 * (i * i) as f64)
            .collect()
    }

    #[test]
    fn test_neutral_until_ready() {
        let mut tracker = TrendTracker::new(config(2, 4));
        for close in accelerating(11) {
            tracker.push_close(close);
        }
        assert!(!tracker.is_ready());
        assert_eq!(tracker.trend(), Trend::Neutral);

        tracker.push_close(500.0);
        assert!(tracker.is_ready());
    }

    #[test]
    fn test_rising_series_trends_up() {
        let mut tracker = TrendTracker::new(config(10, 80));
        for close in accelerating(240) {
            tracker.push_close(close);
        }
        assert!(tracker.is_ready());
        assert_eq!(tracker.trend(), Trend::Up);
    }

    #[test]
    fn test_incremental_matches_batch() {
        let closes = accelerating(200);
        let mut tracker = TrendTracker::new(config(5, 20));
        for close in &closes {
            tracker.push_close(*close);
        }

        let capacity = tracker.config().history_capacity();
        let window = &closes[closes.len() - capacity..];
        assert_eq!(tracker.state().tema_fast, tema(window, 5));
        assert_eq!(tracker.state().tema_slow, tema(window, 20));
    }

    #[test]
    fn test_history_is_bounded() {
        let mut tracker = TrendTracker::new(config(2, 4));
        for i in 0..500 {
            tracker.push_close(i as f64);
        }
        assert_eq!(tracker.len(), 4 * 3 + HISTORY_MARGIN);
    }

    #[test]
    fn test_ready_is_monotone() {
        let mut tracker = TrendTracker::new(config(2, 4));
        let mut seen_ready = false;
        for close in accelerating(300) {
            tracker.push_close(close);
            if seen_ready {
                assert!(tracker.is_ready());
            }
            seen_ready |= tracker.is_ready();
        }
        assert!(seen_ready);
    }

    #[test]
    fn test_update_price_closes_on_bucket_advance() {
        let mut tracker = TrendTracker::new(config(2, 4));
        assert!(tracker.update_price(0, dec!(100)).is_none());
        assert!(tracker.update_price(30, dec!(101)).is_none());
        assert!(tracker.is_empty());

        assert!(tracker.update_price(61, dec!(102)).is_some());
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_seed_splits_history_and_current() {
        let mut tracker = TrendTracker::new(config(2, 4));
        let candles: Vec<Candle> = (0..20)
            .map(|i| Candle::from_price(i * 60, Decimal::from(100 + i)))
            .collect();

        // now falls inside the last candle's bucket
        let added = tracker.seed(&candles, 19 * 60 + 10);
        assert_eq!(added, 19);
        assert!(tracker.is_ready());

        // next bucket closes the seeded in-progress candle
        tracker.update_price(20 * 60, dec!(200));
        assert_eq!(tracker.len(), 20);
    }

    #[test]
    fn test_zero_width_config_does_not_panic() {
        let mut tracker = TrendTracker::new(TrendConfig {
            candle_secs: 0,
            fast_period: 2,
            slow_period: 4,
        });
        let candles: Vec<Candle> = (0..5).map(|i| Candle::from_price(i, Decimal::from(100 + i))).collect();

        assert_eq!(tracker.seed(&candles, 4), 4);
        assert!(tracker.update_price(5, dec!(105)).is_some());
        assert_eq!(tracker.len(), 5);
    }

    struct FailingSource;

    #[async_trait]
    impl HistoricalCandleSource for FailingSource {
        async fn fetch(&self, _: i64, _: DateTime<Utc>, _: DateTime<Utc>) -> anyhow::Result<Vec<Candle>> {
            anyhow::bail!("offline")
        }
    }

    struct FixedSource(Vec<Candle>);

    #[async_trait]
    impl HistoricalCandleSource for FixedSource {
        async fn fetch(&self, _: i64, _: DateTime<Utc>, _: DateTime<Utc>) -> anyhow::Result<Vec<Candle>> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn test_bootstrap_failure_stays_neutral() {
        let mut tracker = TrendTracker::new(config(2, 4));
        assert!(!tracker.bootstrap(&FailingSource, Utc::now()).await);
        assert!(tracker.is_empty());
        assert_eq!(tracker.trend(), Trend::Neutral);
    }

    #[tokio::test]
    async fn test_bootstrap_seeds_history() {
        let now = Utc::now();
        let bucket = bucket_start(now.timestamp(), 60);
        let candles: Vec<Candle> = (0..30)
            .map(|i| Candle::from_price(bucket - (30 - i) * 60, Decimal::from(100 + i)))
            .collect();

        let mut tracker = TrendTracker::new(config(2, 4));
        assert!(tracker.bootstrap(&FixedSource(candles), now).await);
        assert_eq!(tracker.len(), 30);
        assert!(tracker.is_ready());
    }
}
