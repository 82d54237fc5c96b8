//! Per-interval state and rotation

use super::INTERVAL_SECS;
use crate::candles::bucket_start;
use crate::signal::Side;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;

/// State of one 15-minute interval
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntervalState {
    pub start_ts: i64,
    pub end_ts: i64,
    /// First price seen after rotation
    pub open_price: Option<Decimal>,
    pub latest_price: Option<Decimal>,
    pub high: Option<Decimal>,
    pub low: Option<Decimal>,
    /// False for the first interval after startup, whose open may be stale
    pub resolvable: bool,
    pub ticks: u64,
    #[serde(skip)]
    last_eval_slot: Option<i64>,
}

impl IntervalState {
    /// A fresh interval starting at `start_ts`
    pub fn new(start_ts: i64, resolvable: bool) -> Self {
        Self {
            start_ts,
            end_ts: start_ts + INTERVAL_SECS,
            open_price: None,
            latest_price: None,
            high: None,
            low: None,
            resolvable,
            ticks: 0,
            last_eval_slot: None,
        }
    }

    /// Interval containing `now`
    pub fn containing(now: DateTime<Utc>, resolvable: bool) -> Self {
        Self::new(bucket_start(now.timestamp(), INTERVAL_SECS), resolvable)
    }

    /// Record a price; returns true when it became the open
    pub fn record_price(&mut self, price: Decimal) -> bool {
        self.ticks += 1;
        self.latest_price = Some(price);
        self.high = Some(self.high.map_or(price, |h| h.max(price)));
        self.low = Some(self.low.map_or(price, |l| l.min(price)));

        if self.open_price.is_none() {
            self.open_price = Some(price);
            return true;
        }
        false
    }

    /// Whole seconds since the interval started
    pub fn elapsed_secs(&self, now: DateTime<Utc>) -> i64 {
        (now.timestamp() - self.start_ts).clamp(0, INTERVAL_SECS)
    }

    /// Whole seconds until the interval ends
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> i64 {
        (self.end_ts - now.timestamp()).clamp(0, INTERVAL_SECS)
    }

    /// `(latest - open) / open * 100`
    pub fn move_pct(&self) -> Option<Decimal> {
        let open = self.open_price.filter(|o| !o.is_zero())?;
        let latest = self.latest_price?;
        Some((latest - open) / open * dec!(100))
    }

    /// Sign of the move; `None` when flat or unknown
    pub fn direction(&self) -> Option<Side> {
        let m = self.move_pct()?;
        if m > Decimal::ZERO {
            Some(Side::Up)
        } else if m < Decimal::ZERO {
            Some(Side::Down)
        } else {
            None
        }
    }

    /// Settlement side from the latest price: `Up` when at or above the open
    pub fn winner(&self) -> Option<Side> {
        let open = self.open_price?;
        let latest = self.latest_price?;
        Some(if latest >= open { Side::Up } else { Side::Down })
    }

    /// Claim the evaluation slot containing `elapsed_secs`.
    ///
    /// Returns false when an evaluation already ran in this slot.
    pub fn claim_eval_slot(&mut self, elapsed_secs: i64, throttle_secs: i64) -> bool {
        let slot = elapsed_secs / throttle_secs.max(1);
        if self.last_eval_slot == Some(slot) {
            return false;
        }
        self.last_eval_slot = Some(slot);
        true
    }
}

/// Outcome of feeding a timestamp to the clock
#[derive(Debug, Clone, PartialEq)]
pub enum Rotation {
    /// Still inside the current interval
    Unchanged,
    /// A new interval began; carries the one it replaced
    Started { previous: Option<IntervalState> },
}

/// Edge-triggered interval rotation
#[derive(Debug, Clone, Default)]
pub struct IntervalClock {
    current: Option<IntervalState>,
}

impl IntervalClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&IntervalState> {
        self.current.as_ref()
    }

    pub fn current_mut(&mut self) -> Option<&mut IntervalState> {
        self.current.as_mut()
    }

    /// Rotate when `now` falls in a later interval than the current one.
    ///
    /// The first interval observed is marked not resolvable. A timestamp
    /// earlier than the current interval is ignored.
    pub fn observe(&mut self, now: DateTime<Utc>) -> Rotation {
        let start = bucket_start(now.timestamp(), INTERVAL_SECS);

        match &self.current {
            Some(cur) if start <= cur.start_ts => Rotation::Unchanged,
            Some(_) => {
                let previous = self.current.replace(IntervalState::new(start, true));
                Rotation::Started { previous }
            }
            None => {
                self.current = Some(IntervalState::new(start, false));
                Rotation::Started { previous: None }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const T0: i64 = 1_704_067_200;

    fn at(ts: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(ts, 0).unwrap()
    }

    #[test]
    fn test_first_price_is_open() {
        let mut iv = IntervalState::new(T0, true);
        assert!(iv.record_price(dec!(50000)));
        assert!(!iv.record_price(dec!(50100)));
        assert!(!iv.record_price(dec!(49900)));

        assert_eq!(iv.open_price, Some(dec!(50000)));
        assert_eq!(iv.latest_price, Some(dec!(49900)));
        assert_eq!(iv.high, Some(dec!(50100)));
        assert_eq!(iv.low, Some(dec!(49900)));
        assert_eq!(iv.ticks, 3);
    }

    #[test]
    fn test_move_and_direction() {
        let mut iv = IntervalState::new(T0, true);
        assert_eq!(iv.move_pct(), None);

        iv.record_price(dec!(50000));
        assert_eq!(iv.direction(), None);

        iv.record_price(dec!(50050));
        assert_eq!(iv.move_pct(), Some(dec!(0.1)));
        assert_eq!(iv.direction(), Some(Side::Up));

        iv.record_price(dec!(49975));
        assert_eq!(iv.move_pct(), Some(dec!(-0.05)));
        assert_eq!(iv.direction(), Some(Side::Down));
    }

    #[test]
    fn test_winner_ties_go_up() {
        let mut iv = IntervalState::new(T0, true);
        assert_eq!(iv.winner(), None);
        iv.record_price(dec!(100));
        assert_eq!(iv.winner(), Some(Side::Up));
        iv.record_price(dec!(99.99));
        assert_eq!(iv.winner(), Some(Side::Down));
    }

    #[test]
    fn test_clocks() {
        let iv = IntervalState::new(T0, true);
        assert_eq!(iv.elapsed_secs(at(T0 + 300)), 300);
        assert_eq!(iv.remaining_secs(at(T0 + 300)), 600);
        assert_eq!(iv.elapsed_secs(at(T0 - 5)), 0);
        assert_eq!(iv.remaining_secs(at(T0 + 1000)), 0);
    }

    #[test]
    fn test_eval_slot_throttle() {
        let mut iv = IntervalState::new(T0, true);
        assert!(iv.claim_eval_slot(61, 30));
        assert!(!iv.claim_eval_slot(89, 30));
        assert!(iv.claim_eval_slot(90, 30));
    }

    #[test]
    fn test_clock_first_interval_not_resolvable() {
        let mut clock = IntervalClock::new();
        assert_eq!(
            clock.observe(at(T0 + 400)),
            Rotation::Started { previous: None }
        );
        let first = clock.current().unwrap();
        assert_eq!(first.start_ts, T0);
        assert!(!first.resolvable);

        assert_eq!(clock.observe(at(T0 + 899)), Rotation::Unchanged);

        match clock.observe(at(T0 + 900)) {
            Rotation::Started { previous } => {
                assert_eq!(previous.unwrap().start_ts, T0);
            }
            other => panic!("expected rotation, got {other:?}"),
        }
        assert!(clock.current().unwrap().resolvable);
        assert_eq!(clock.current().unwrap().end_ts, T0 + 1800);
    }

    #[test]
    fn test_clock_ignores_stale_timestamps() {
        let mut clock = IntervalClock::new();
        clock.observe(at(T0 + 900));
        assert_eq!(clock.observe(at(T0 + 10)), Rotation::Unchanged);
        assert_eq!(clock.current().unwrap().start_ts, T0 + 900);
    }

    #[test]
    fn test_clock_skips_quiet_intervals() {
        let mut clock = IntervalClock::new();
        clock.observe(at(T0));
        clock.observe(at(T0 + 2700 + 5));
        assert_eq!(clock.current().unwrap().start_ts, T0 + 2700);
    }
}
