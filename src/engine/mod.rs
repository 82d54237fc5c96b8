//! Tick engine
//!
//! Consumes price ticks one at a time: updates the trend trackers, rotates
//! the interval, gates entries and schedules exit checks. Everything that
//! touches the exchange is handed to the [`PositionController`] task.
//!
//! [`PositionController`]: crate::position::PositionController

mod status;

pub use status::EngineStatus;

use crate::candles::HistoricalCandleSource;
use crate::config::Config;
use crate::feed::PriceTick;
use crate::market::market_slug;
use crate::position::{ControllerCommand, ControllerHandle, ControllerSnapshot, ReversalTracker};
use crate::session::{IntervalClock, IntervalState, Rotation};
use crate::signal::{EvalContext, RejectReason, SignalEvaluator};
use crate::telemetry::{record_counter, set_gauge, CounterMetric, GaugeMetric};
use crate::trend::{HtfEmaTracker, Trend, TrendTracker};
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

/// How often `run` logs a status line
const STATUS_EVERY: Duration = Duration::from_secs(60);

/// Timing knobs the tick loop needs
#[derive(Debug, Clone)]
struct EngineSettings {
    slug_prefix: String,
    monitor_interval_secs: i64,
    exit_before_end_secs: i64,
    reversal_after_secs: i64,
    cushion_pct: Decimal,
}

/// Reversal detection for the position of one interval
#[derive(Debug)]
struct ReversalWatch {
    interval_start: i64,
    tracker: ReversalTracker,
}

/// Single-threaded tick handler
pub struct Engine {
    settings: EngineSettings,
    evaluator: Arc<SignalEvaluator>,
    trend: TrendTracker,
    exit_trend: TrendTracker,
    htf: HtfEmaTracker,
    clock: IntervalClock,
    controller: ControllerHandle,
    sent_seq: u64,
    reversal: Option<ReversalWatch>,
    reversal_due: bool,
    last_monitor: Option<(i64, i64)>,
    ticks: u64,
}

impl Engine {
    pub fn new(config: &Config, evaluator: Arc<SignalEvaluator>, controller: ControllerHandle) -> Self {
        Self {
            settings: EngineSettings {
                slug_prefix: config.market.slug_prefix.clone(),
                monitor_interval_secs: config.position.monitor_interval_secs.max(1) as i64,
                exit_before_end_secs: config.position.exit_before_end_secs,
                reversal_after_secs: config.exit_trend.active_after_secs,
                cushion_pct: config.exit_trend.cushion_pct,
            },
            evaluator,
            trend: TrendTracker::new(config.trend),
            exit_trend: TrendTracker::new(config.exit_trend.tema),
            htf: HtfEmaTracker::new(config.htf.candle_secs, config.htf.period),
            clock: IntervalClock::new(),
            controller,
            sent_seq: 0,
            reversal: None,
            reversal_due: false,
            last_monitor: None,
            ticks: 0,
        }
    }

    /// Pre-seed the trend trackers from history. Failures only delay
    /// readiness.
    pub async fn bootstrap(&mut self, source: &dyn HistoricalCandleSource, now: DateTime<Utc>) {
        self.trend.bootstrap(source, now).await;
        self.exit_trend.bootstrap(source, now).await;
        self.htf.bootstrap(source, now).await;
    }

    /// Handle one trade. Never blocks on the exchange.
    pub fn on_trade(&mut self, tick: &PriceTick) {
        let now = tick.timestamp;
        let ts = now.timestamp();
        let price = tick.price;

        self.ticks += 1;
        record_counter(CounterMetric::Ticks, 1);

        if let Some(trend) = self.trend.update_price(ts, price) {
            tracing::debug!(trend = %trend, state = ?self.trend.state(), "Trend candle closed");
        }
        self.exit_trend.update_price(ts, price);
        self.htf.update_price(ts, price);

        if let Rotation::Started { previous } = self.clock.observe(now) {
            self.on_rotation(previous);
        }

        let Some(iv) = self.clock.current_mut() else {
            return;
        };
        if iv.record_price(price) {
            tracing::info!(
                interval = iv.start_ts,
                open = %price,
                resolvable = iv.resolvable,
                "Interval open price"
            );
        }

        let interval_start = iv.start_ts;
        let elapsed = iv.elapsed_secs(now);
        let remaining = iv.remaining_secs(now);
        let Some(move_pct) = iv.move_pct() else {
            return;
        };
        set_gauge(GaugeMetric::MovePct, move_pct.to_f64().unwrap_or_default());

        let snapshot = self.controller.snapshot();
        let idle = snapshot.last_seq == self.sent_seq;

        if let Some(position) = snapshot.open_position(interval_start) {
            let watch = self.reversal.get_or_insert_with(|| ReversalWatch {
                interval_start,
                tracker: ReversalTracker::new(position.side, self.exit_trend.trend(), self.settings.cushion_pct),
            });
            if watch.interval_start == interval_start && elapsed >= self.settings.reversal_after_secs {
                let exit_trend = self.exit_trend.trend();
                if watch.tracker.observe(exit_trend, move_pct) {
                    tracing::info!(
                        interval = interval_start,
                        side = %position.side,
                        trend = %exit_trend,
                        move_pct = %move_pct.round_dp(3),
                        "Trend reversal against position"
                    );
                    self.reversal_due = true;
                }
            }

            if idle {
                let retry = snapshot.pending_exit.is_some();
                self.schedule_check(interval_start, elapsed, remaining, retry);
            }
            return;
        }

        if !idle {
            return;
        }

        let ctx = EvalContext {
            now,
            position_taken: snapshot.committed_to(interval_start),
            halted: snapshot.halted,
        };
        match self.evaluator.pre_check(iv, &self.htf, ctx) {
            Ok(candidate) => {
                tracing::info!(
                    interval = interval_start,
                    side = %candidate.side,
                    move_pct = %candidate.move_pct.round_dp(3),
                    elapsed = candidate.elapsed_secs,
                    fair_value = candidate.fair_value.probability,
                    "Entry candidate"
                );
                let slug = market_slug(&self.settings.slug_prefix, interval_start);
                self.send(|seq| ControllerCommand::Enter { seq, candidate, slug });
            }
            Err(reason) => log_reject(interval_start, &reason),
        }
    }

    /// Send a `Check` once per monitor slot, or right away when an exit is
    /// forced, a reversal fired or a failed sell awaits its retry
    fn schedule_check(&mut self, interval_start: i64, elapsed: i64, remaining: i64, retry: bool) {
        let slot = (interval_start, elapsed / self.settings.monitor_interval_secs);
        let check_price = self.last_monitor != Some(slot);
        let forced = remaining <= self.settings.exit_before_end_secs;

        if !(check_price || forced || retry || self.reversal_due) {
            return;
        }

        let reversal = self.reversal_due;
        let sent = self.send(|seq| ControllerCommand::Check {
            seq,
            interval_start,
            remaining_secs: remaining,
            check_price,
            reversal,
        });
        if sent {
            self.reversal_due = false;
            if check_price {
                self.last_monitor = Some(slot);
            }
        }
    }

    fn on_rotation(&mut self, previous: Option<IntervalState>) {
        self.reversal = None;
        self.reversal_due = false;

        if let Some(prev) = previous {
            let winner = prev.winner();
            tracing::info!(
                interval = prev.start_ts,
                open = ?prev.open_price,
                close = ?prev.latest_price,
                move_pct = ?prev.move_pct().map(|m| m.round_dp(3)),
                winner = ?winner,
                ticks = prev.ticks,
                "Interval ended"
            );
            if prev.resolvable {
                let interval_start = prev.start_ts;
                self.send(|seq| ControllerCommand::Resolve {
                    seq,
                    interval_start,
                    winner,
                });
            }
        }

        if let Some(iv) = self.clock.current() {
            tracing::info!(
                interval = iv.start_ts,
                resolvable = iv.resolvable,
                trend = %self.trend.trend(),
                "Interval started"
            );
        }
    }

    fn send(&mut self, build: impl FnOnce(u64) -> ControllerCommand) -> bool {
        let seq = self.sent_seq + 1;
        match self.controller.try_send(build(seq)) {
            Ok(()) => {
                self.sent_seq = seq;
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "Controller queue unavailable, command dropped");
                false
            }
        }
    }

    pub fn status(&self) -> EngineStatus {
        let interval = self.clock.current().cloned();
        let now = Utc::now();
        EngineStatus {
            move_pct: interval.as_ref().and_then(|iv| iv.move_pct()),
            elapsed_secs: interval.as_ref().map(|iv| iv.elapsed_secs(now)),
            interval,
            trend: self.trend.trend(),
            exit_trend: self.exit_trend.trend(),
            htf_ema: self.htf.ema(),
            ticks: self.ticks,
            controller: self.controller.snapshot(),
        }
    }

    /// Wait until the controller has handled every command sent so far
    pub async fn settle(&self) -> ControllerSnapshot {
        let target = self.sent_seq;
        let mut state = self.controller.subscribe();
        let result = match state.wait_for(|s| s.last_seq >= target).await {
            Ok(snapshot) => snapshot.clone(),
            Err(_) => self.controller.snapshot(),
        };
        result
    }

    /// Consume ticks until the feed closes or `shutdown` fires, then stop
    pub async fn run(
        mut self,
        mut ticks: mpsc::Receiver<PriceTick>,
        mut shutdown: watch::Receiver<bool>,
    ) -> ControllerSnapshot {
        let mut status_timer = tokio::time::interval(STATUS_EVERY);
        status_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                tick = ticks.recv() => {
                    match tick {
                        Some(tick) => self.on_trade(&tick),
                        None => {
                            tracing::warn!("Price feed closed");
                            break;
                        }
                    }
                }
                _ = shutdown.changed() => {
                    tracing::info!("Shutdown requested");
                    break;
                }
                _ = status_timer.tick() => {
                    tracing::info!(status = %self.status(), "Status");
                }
            }
        }

        self.stop().await
    }

    /// Let in-flight order work finish and return the final controller state
    pub async fn stop(self) -> ControllerSnapshot {
        let last = self.controller.shutdown().await;
        tracing::info!(
            session_pnl = %last.session_pnl,
            bankroll = %last.bankroll,
            record = %last.scoreboard,
            "Engine stopped"
        );
        last
    }

    pub fn trend(&self) -> Trend {
        self.trend.trend()
    }
}

fn log_reject(interval: i64, reason: &RejectReason) {
    match reason {
        RejectReason::OutsideWindow(_)
        | RejectReason::MoveTooSmall(_)
        | RejectReason::Throttled
        | RejectReason::PositionTaken
        | RejectReason::NoOpenPrice => {
            tracing::trace!(interval, reason = %reason, "No entry");
        }
        _ => tracing::debug!(interval, reason = %reason, "No entry"),
    }
}
