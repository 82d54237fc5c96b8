//! Historical interval replay

use super::{BucketTable, CalibrationError, ElapsedBucket, MoveBucket, TableBuilder};
use crate::candles::{bucket_start, resample, Candle};
use crate::config::CalibrationConfig;
use crate::session::INTERVAL_SECS;
use crate::signal::Side;
use crate::trend::{tema, Trend, TrendConfig};
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// One-minute candles per interval
const MINUTES_PER_INTERVAL: i64 = INTERVAL_SECS / 60;

/// A minute-mark sample from a historical interval
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub interval_start: i64,
    pub elapsed_secs: i64,
    pub move_pct: Decimal,
    pub abs_move_pct: Decimal,
    pub direction: Side,
    pub final_winner: Side,
    pub won: bool,
    /// `None` when no trend was available or it was neutral
    pub trend_alignment: Option<bool>,
}

/// Interval walk counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntervalStats {
    pub total: u64,
    pub complete: u64,
    /// Intervals with at least one missing minute
    pub skipped: u64,
}

/// Share of observations whose direction held to the close
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistenceRates {
    pub baseline: Option<f64>,
    pub aligned: Option<f64>,
    pub opposed: Option<f64>,
}

/// Wins over observations
#[derive(Debug, Clone, Copy, Default)]
struct Tally {
    wins: u64,
    total: u64,
}

impl Tally {
    fn record(&mut self, won: bool) {
        self.total += 1;
        if won {
            self.wins += 1;
        }
    }

    fn rate(&self) -> Option<f64> {
        (self.total > 0).then(|| self.wins as f64 / self.total as f64)
    }
}

/// Persisted output of a calibration run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationReport {
    pub generated: DateTime<Utc>,
    pub data_source: String,
    pub product: String,
    pub lookback_days: u32,
    pub candle_count: usize,
    pub intervals: IntervalStats,
    pub observation_count: u64,
    pub tema: TrendConfig,
    pub min_samples: u64,
    pub move_bins: Vec<String>,
    pub elapsed_bins: Vec<String>,
    pub persistence: PersistenceRates,
    pub all_observations: BucketTable,
    pub tema_aligned: BucketTable,
    pub tema_misaligned: BucketTable,
    /// Aligned cells with untrusted rates blanked; read by the live engine
    pub bot_table: BucketTable,
}

impl CalibrationReport {
    /// Write as pretty JSON, creating parent directories
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), CalibrationError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// Replays 1-minute history through the interval/bucket model
pub struct CalibrationEngine {
    config: CalibrationConfig,
}

impl CalibrationEngine {
    pub fn new(config: CalibrationConfig) -> Self {
        Self { config }
    }

    /// Trend after each resampled candle closes, keyed by its close time.
    ///
    /// Each point is computed over every close up to that candle, not the
    /// bounded window the live tracker keeps.
    pub fn trend_series(&self, candles_1m: &[Candle]) -> BTreeMap<i64, Trend> {
        let config = self.config.tema;
        let mut closes = Vec::new();
        let mut series = BTreeMap::new();

        for candle in resample(candles_1m, config.candle_secs) {
            let Some(close) = candle.close.to_f64() else { continue };
            closes.push(close);
            if let (Some(fast), Some(slow)) = (
                tema(&closes, config.fast_period),
                tema(&closes, config.slow_period),
            ) {
                series.insert(candle.start_ts + config.candle_secs, Trend::from_tema(fast, slow));
            }
        }

        series
    }

    /// Latest trend known at `ts`, looking back at most two candles
    pub fn trend_at(&self, series: &BTreeMap<i64, Trend>, ts: i64) -> Option<Trend> {
        let width = self.config.tema.candle_secs;
        let key = bucket_start(ts, width);
        [key, key - width, key - 2 * width]
            .iter()
            .find_map(|k| series.get(k).copied())
    }

    /// Walk every 15-minute interval and emit one observation per minute mark.
    ///
    /// Intervals missing any of their 15 minutes are counted as skipped and
    /// emit nothing.
    pub fn replay<F>(
        &self,
        candles_1m: &[Candle],
        trends: Option<&BTreeMap<i64, Trend>>,
        mut sink: F,
    ) -> IntervalStats
    where
        F: FnMut(Observation),
    {
        let mut stats = IntervalStats::default();
        let (Some(first), Some(last)) = (candles_1m.first(), candles_1m.last()) else {
            return stats;
        };

        let by_ts: HashMap<i64, &Candle> = candles_1m.iter().map(|c| (c.start_ts, c)).collect();

        let mut start = bucket_start(first.start_ts, INTERVAL_SECS);
        if start < first.start_ts {
            start += INTERVAL_SECS;
        }

        while start + INTERVAL_SECS - 60 <= last.start_ts {
            stats.total += 1;

            let minutes: Option<Vec<&Candle>> = (0..MINUTES_PER_INTERVAL)
                .map(|i| by_ts.get(&(start + i * 60)).copied())
                .collect();

            let Some(minutes) = minutes.filter(|m| m[0].open > Decimal::ZERO) else {
                stats.skipped += 1;
                start += INTERVAL_SECS;
                continue;
            };
            stats.complete += 1;

            let open = minutes[0].open;
            let final_winner = if minutes[minutes.len() - 1].close >= open {
                Side::Up
            } else {
                Side::Down
            };
            let trend = trends.and_then(|s| self.trend_at(s, start));

            for (idx, candle) in minutes.iter().take(minutes.len() - 1).enumerate() {
                let move_pct = (candle.close - open) / open * dec!(100);
                let abs_move_pct = move_pct.abs();
                if abs_move_pct < self.config.noise_floor_pct {
                    continue;
                }

                let direction = if move_pct > Decimal::ZERO {
                    Side::Up
                } else {
                    Side::Down
                };
                let trend_alignment = match trend {
                    Some(Trend::Neutral) | None => None,
                    Some(t) => Some(t.agrees_with(direction)),
                };

                sink(Observation {
                    interval_start: start,
                    elapsed_secs: (idx as i64 + 1) * 60,
                    move_pct,
                    abs_move_pct,
                    direction,
                    final_winner,
                    won: direction == final_winner,
                    trend_alignment,
                });
            }

            start += INTERVAL_SECS;
        }

        stats
    }

    /// Build every table from ascending, deduplicated 1-minute candles
    pub fn calibrate(&self, candles_1m: &[Candle], data_source: &str) -> Result<CalibrationReport, CalibrationError> {
        if candles_1m.is_empty() {
            return Err(CalibrationError::NoCandles);
        }

        let trends = self.trend_series(candles_1m);
        tracing::info!(
            candles = candles_1m.len(),
            trend_points = trends.len(),
            "Computed calibration trend series"
        );

        let mut all = TableBuilder::default();
        let mut aligned = TableBuilder::default();
        let mut misaligned = TableBuilder::default();
        let mut observation_count = 0u64;
        let mut baseline = Tally::default();
        let mut with_trend = Tally::default();
        let mut against_trend = Tally::default();

        let intervals = self.replay(candles_1m, Some(&trends), |obs| {
            observation_count += 1;
            baseline.record(obs.won);
            match obs.trend_alignment {
                Some(true) => with_trend.record(obs.won),
                Some(false) => against_trend.record(obs.won),
                None => {}
            }

            let (Some(m), Some(e)) = (
                MoveBucket::classify(obs.abs_move_pct),
                ElapsedBucket::classify(obs.elapsed_secs),
            ) else {
                return;
            };

            all.record(m, e, obs.won);
            match obs.trend_alignment {
                Some(true) => aligned.record(m, e, obs.won),
                Some(false) => misaligned.record(m, e, obs.won),
                None => {}
            }
        });

        tracing::info!(
            total = intervals.total,
            complete = intervals.complete,
            skipped = intervals.skipped,
            observations = observation_count,
            "Replayed historical intervals"
        );

        let persistence = PersistenceRates {
            baseline: baseline.rate(),
            aligned: with_trend.rate(),
            opposed: against_trend.rate(),
        };

        let tema_aligned = aligned.build();
        let bot_table = tema_aligned.trusted_only(self.config.min_samples);

        Ok(CalibrationReport {
            generated: Utc::now(),
            data_source: data_source.to_string(),
            product: self.config.product.clone(),
            lookback_days: self.config.lookback_days,
            candle_count: candles_1m.len(),
            intervals,
            observation_count,
            tema: self.config.tema,
            min_samples: self.config.min_samples,
            move_bins: MoveBucket::ALL.iter().map(|b| b.label().to_string()).collect(),
            elapsed_bins: ElapsedBucket::ALL
                .iter()
                .map(|b| b.label().to_string())
                .collect(),
            persistence,
            all_observations: all.build(),
            tema_aligned,
            tema_misaligned: misaligned.build(),
            bot_table,
        })
    }
}
