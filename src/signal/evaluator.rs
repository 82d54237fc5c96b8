//! Entry gating
//!
//! Evaluation is split in two so the order book is only fetched once every
//! price-independent gate has passed: [`SignalEvaluator::pre_check`] runs on
//! the tick path, [`SignalEvaluator::price_check`] runs against a fresh
//! [`MarketSnapshot`].

use super::{EntryCandidate, EntrySignal, RejectReason};
use crate::calibration::FairValueLookup;
use crate::config::{ExecutionConfig, SignalConfig};
use crate::market::MarketSnapshot;
use crate::session::IntervalState;
use crate::trend::HtfEmaTracker;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;

/// Session facts the evaluator does not own
#[derive(Debug, Clone, Copy)]
pub struct EvalContext {
    pub now: DateTime<Utc>,
    /// A position (or an attempt that reached the exchange) exists this interval
    pub position_taken: bool,
    /// Circuit breaker tripped
    pub halted: bool,
}

/// Applies entry gates in a fixed order; the first failure is reported
pub struct SignalEvaluator {
    config: SignalConfig,
    tick_increment: Decimal,
    max_buy_price: Decimal,
    fair_values: Arc<dyn FairValueLookup>,
}

impl SignalEvaluator {
    pub fn new(config: SignalConfig, execution: &ExecutionConfig, fair_values: Arc<dyn FairValueLookup>) -> Self {
        Self {
            config,
            tick_increment: execution.tick_increment,
            max_buy_price: execution.max_buy_price,
            fair_values,
        }
    }

    pub fn config(&self) -> &SignalConfig {
        &self.config
    }

    /// Gates that need no market data.
    ///
    /// Claims the interval's throttle slot only once the cheaper gates pass,
    /// so a rejected tick does not burn the slot.
    pub fn pre_check(
        &self,
        iv: &mut IntervalState,
        htf: &HtfEmaTracker,
        ctx: EvalContext,
    ) -> Result<EntryCandidate, RejectReason> {
        if ctx.halted {
            return Err(RejectReason::CircuitBreaker);
        }
        if !iv.resolvable {
            return Err(RejectReason::FirstInterval);
        }
        if ctx.position_taken {
            return Err(RejectReason::PositionTaken);
        }

        let move_pct = iv.move_pct().ok_or(RejectReason::NoOpenPrice)?;

        let elapsed = iv.elapsed_secs(ctx.now);
        if elapsed < self.config.entry_start_secs || elapsed > self.config.entry_end_secs {
            return Err(RejectReason::OutsideWindow(elapsed));
        }

        let abs_move = move_pct.abs();
        if abs_move < self.config.min_move_pct {
            return Err(RejectReason::MoveTooSmall(move_pct));
        }
        let side = iv.direction().ok_or(RejectReason::MoveTooSmall(move_pct))?;

        let fair_value = self
            .fair_values
            .lookup(abs_move, elapsed)
            .ok_or(RejectReason::NoFairValue)?;

        if !iv.claim_eval_slot(elapsed, self.config.eval_throttle_secs) {
            return Err(RejectReason::Throttled);
        }

        if self.config.htf_filter && htf.is_aligned(side) == Some(false) {
            return Err(RejectReason::HtfMisaligned);
        }

        Ok(EntryCandidate {
            interval_start: iv.start_ts,
            side,
            move_pct,
            elapsed_secs: elapsed,
            remaining_secs: iv.remaining_secs(ctx.now),
            fair_value,
        })
    }

    /// Gates that need the book: edge, price cap, spread
    pub fn price_check(
        &self,
        candidate: &EntryCandidate,
        snapshot: &MarketSnapshot,
    ) -> Result<EntrySignal, RejectReason> {
        if !snapshot.accepting_orders {
            return Err(RejectReason::NotAcceptingOrders);
        }

        let (best_bid, best_ask) = match (snapshot.best_bid(), snapshot.best_ask()) {
            (Some(bid), Some(ask)) => (bid, ask),
            _ => return Err(RejectReason::NoLiquidity),
        };

        let buy_price = (best_ask + self.tick_increment)
            .min(self.max_buy_price)
            .round_dp(2);
        let fair_value = Decimal::try_from(candidate.fair_value.probability)
            .map_err(|_| RejectReason::NoFairValue)?
            .round_dp(4);
        let edge = fair_value - buy_price;
        let spread = (best_ask - best_bid).max(Decimal::ZERO);

        if edge < self.config.min_edge {
            return Err(RejectReason::EdgeTooSmall(edge));
        }
        if buy_price > self.config.max_entry_price {
            return Err(RejectReason::PriceTooHigh(buy_price));
        }
        if spread > self.config.max_spread {
            return Err(RejectReason::SpreadTooWide(spread));
        }

        Ok(EntrySignal {
            interval_start: candidate.interval_start,
            side: candidate.side,
            token_id: snapshot.token_id.clone(),
            fair_value,
            buy_price,
            best_bid,
            best_ask,
            spread,
            edge,
            move_pct: candidate.move_pct,
            elapsed_secs: candidate.elapsed_secs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::{BucketTable, Cell, ElapsedBucket, FairValueTable, MoveBucket};
    use crate::candles::Candle;
    use crate::market::{OrderBook, PriceLevel};
    use crate::signal::Side;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    const T0: i64 = 1_704_067_200;

    fn evaluator(htf_filter: bool) -> SignalEvaluator {
        let mut table = BucketTable::default();
        table.insert(
            MoveBucket::Moderate,
            ElapsedBucket::Developing,
            Cell {
                win_rate: Some(0.62),
                count: 50,
            },
        );
        table.insert(
            MoveBucket::Small,
            ElapsedBucket::Developing,
            Cell {
                win_rate: Some(0.70),
                count: 12,
            },
        );
        let config = SignalConfig {
            htf_filter,
            ..SignalConfig::default()
        };
        SignalEvaluator::new(
            config,
            &ExecutionConfig::default(),
            Arc::new(FairValueTable::new(table, 30)),
        )
    }

    fn at(offset: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(T0 + offset, 0).unwrap()
    }

    fn ctx(offset: i64) -> EvalContext {
        EvalContext {
            now: at(offset),
            position_taken: false,
            halted: false,
        }
    }

    fn interval(open: Decimal, latest: Decimal) -> IntervalState {
        let mut iv = IntervalState::new(T0, true);
        iv.record_price(open);
        iv.record_price(latest);
        iv
    }

    fn snapshot(bid: Decimal, ask: Decimal) -> MarketSnapshot {
        MarketSnapshot {
            slug: "btc-updown-15m-1704067200".into(),
            side: Side::Up,
            token_id: "tok-up".into(),
            accepting_orders: true,
            min_order_size: Some(dec!(5)),
            book: OrderBook::from_levels(
                "tok-up",
                vec![PriceLevel { price: bid, size: dec!(100) }],
                vec![PriceLevel { price: ask, size: dec!(100) }],
            ),
        }
    }

    fn htf() -> HtfEmaTracker {
        HtfEmaTracker::new(900, 5)
    }

    #[test]
    fn test_moderate_up_move_produces_signal() {
        let eval = evaluator(true);
        let mut iv = interval(dec!(50000), dec!(50045));

        let candidate = eval.pre_check(&mut iv, &htf(), ctx(300)).unwrap();
        assert_eq!(candidate.side, Side::Up);
        assert_eq!(candidate.move_pct, dec!(0.09));
        assert_eq!(candidate.remaining_secs, 600);
        assert_eq!(candidate.fair_value.move_bucket, MoveBucket::Moderate);

        let signal = eval.price_check(&candidate, &snapshot(dec!(0.52), dec!(0.54))).unwrap();
        assert_eq!(signal.buy_price, dec!(0.55));
        assert_eq!(signal.fair_value, dec!(0.62));
        assert_eq!(signal.edge, dec!(0.07));
        assert_eq!(signal.spread, dec!(0.02));
        assert_eq!(signal.token_id, "tok-up");
    }

    #[test]
    fn test_gate_order() {
        let eval = evaluator(false);
        let mut iv = interval(dec!(50000), dec!(50045));

        let halted = EvalContext { halted: true, position_taken: true, ..ctx(300) };
        assert_eq!(eval.pre_check(&mut iv, &htf(), halted), Err(RejectReason::CircuitBreaker));

        let mut first = IntervalState::new(T0, false);
        first.record_price(dec!(50000));
        assert_eq!(eval.pre_check(&mut first, &htf(), ctx(300)), Err(RejectReason::FirstInterval));

        let taken = EvalContext { position_taken: true, ..ctx(300) };
        assert_eq!(eval.pre_check(&mut iv, &htf(), taken), Err(RejectReason::PositionTaken));

        let mut empty = IntervalState::new(T0, true);
        assert_eq!(eval.pre_check(&mut empty, &htf(), ctx(300)), Err(RejectReason::NoOpenPrice));
    }

    #[test]
    fn test_entry_window_is_inclusive() {
        let eval = evaluator(false);
        let mut iv = interval(dec!(50000), dec!(50045));

        assert_eq!(eval.pre_check(&mut iv, &htf(), ctx(59)), Err(RejectReason::OutsideWindow(59)));
        assert_eq!(eval.pre_check(&mut iv, &htf(), ctx(841)), Err(RejectReason::OutsideWindow(841)));
        // Inside the window but no table cell at 840s
        assert_eq!(eval.pre_check(&mut iv, &htf(), ctx(840)), Err(RejectReason::NoFairValue));
    }

    #[test]
    fn test_small_move_rejected() {
        let eval = evaluator(false);
        let mut iv = interval(dec!(50000), dec!(50010));
        assert_eq!(
            eval.pre_check(&mut iv, &htf(), ctx(300)),
            Err(RejectReason::MoveTooSmall(dec!(0.02)))
        );
    }

    #[test]
    fn test_untrusted_cell_rejected() {
        let eval = evaluator(false);
        // 0.04% lands in the small bucket, which has only 12 samples
        let mut iv = interval(dec!(50000), dec!(50020));
        assert_eq!(eval.pre_check(&mut iv, &htf(), ctx(300)), Err(RejectReason::NoFairValue));
    }

    #[test]
    fn test_throttle_once_per_slot() {
        let eval = evaluator(false);
        let mut iv = interval(dec!(50000), dec!(50045));

        assert!(eval.pre_check(&mut iv, &htf(), ctx(300)).is_ok());
        assert_eq!(eval.pre_check(&mut iv, &htf(), ctx(310)), Err(RejectReason::Throttled));
        assert!(eval.pre_check(&mut iv, &htf(), ctx(330)).is_ok());
    }

    #[test]
    fn test_htf_misaligned_filtered() {
        let mut tracker = htf();
        let history: Vec<Candle> = (1..=6)
            .map(|i| Candle::from_price(T0 - i * 900, dec!(51000)))
            .rev()
            .collect();
        tracker.seed(&history, T0 + 300);
        tracker.update_price(T0 + 300, dec!(50045));
        assert_eq!(tracker.is_aligned(Side::Up), Some(false));

        let mut iv = interval(dec!(50000), dec!(50045));
        assert_eq!(
            evaluator(true).pre_check(&mut iv, &tracker, ctx(300)),
            Err(RejectReason::HtfMisaligned)
        );

        let mut iv = interval(dec!(50000), dec!(50045));
        assert!(evaluator(false).pre_check(&mut iv, &tracker, ctx(300)).is_ok());
    }

    #[test]
    fn test_price_gates() {
        let eval = evaluator(false);
        let mut iv = interval(dec!(50000), dec!(50045));
        let candidate = eval.pre_check(&mut iv, &htf(), ctx(300)).unwrap();

        // 0.62 - 0.61 = 0.01 edge
        assert_eq!(
            eval.price_check(&candidate, &snapshot(dec!(0.58), dec!(0.60))),
            Err(RejectReason::EdgeTooSmall(dec!(0.01)))
        );

        assert_eq!(
            eval.price_check(&candidate, &snapshot(dec!(0.45), dec!(0.52))),
            Err(RejectReason::SpreadTooWide(dec!(0.07)))
        );

        let mut closed = snapshot(dec!(0.52), dec!(0.54));
        closed.accepting_orders = false;
        assert_eq!(eval.price_check(&candidate, &closed), Err(RejectReason::NotAcceptingOrders));

        let mut empty = snapshot(dec!(0.52), dec!(0.54));
        empty.book.asks.clear();
        assert_eq!(eval.price_check(&candidate, &empty), Err(RejectReason::NoLiquidity));
    }

    #[test]
    fn test_price_cap_checked_after_edge() {
        let mut table = BucketTable::default();
        table.insert(
            MoveBucket::Moderate,
            ElapsedBucket::Developing,
            Cell {
                win_rate: Some(0.90),
                count: 80,
            },
        );
        let eval = SignalEvaluator::new(
            SignalConfig::default(),
            &ExecutionConfig::default(),
            Arc::new(FairValueTable::new(table, 30)),
        );
        let mut iv = interval(dec!(50000), dec!(50045));
        let candidate = eval.pre_check(&mut iv, &htf(), ctx(300)).unwrap();

        assert_eq!(
            eval.price_check(&candidate, &snapshot(dec!(0.76), dec!(0.78))),
            Err(RejectReason::PriceTooHigh(dec!(0.79)))
        );
    }

    #[test]
    fn test_buy_price_capped() {
        let eval = evaluator(false);
        let mut iv = interval(dec!(50000), dec!(50045));
        let candidate = eval.pre_check(&mut iv, &htf(), ctx(300)).unwrap();

        // 0.99 cap leaves a negative edge
        let result = eval.price_check(&candidate, &snapshot(dec!(0.98), dec!(0.99)));
        assert_eq!(result, Err(RejectReason::EdgeTooSmall(dec!(-0.37))));
    }
}
