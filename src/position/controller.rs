//! Position lifecycle task
//!
//! The controller owns the interval's [`Position`] and the session
//! accounting. It runs as its own task so order submission and fill polling
//! never stall tick ingestion; the engine talks to it over a command channel
//! and reads its state from a `watch` snapshot.

use super::{entry_size, ExitReason, ExitRules, Position, PositionPhase};
use crate::config::Config;
use crate::execution::{confirm_fill, FillOutcome, OrderGateway, OrderRequest, PollPolicy};
use crate::market::{self, MarketQuery};
use crate::risk::{Scoreboard, SessionRisk, SessionSnapshot};
use crate::signal::{EntryCandidate, SignalEvaluator, Side};
use crate::telemetry::{
    record_counter, record_exit, record_latency, set_gauge, CounterMetric, GaugeMetric, LatencyMetric,
};
use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Lowest price an order may carry
const MIN_PRICE: Decimal = dec!(0.01);

/// Order and exit parameters of the controller
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub rules: ExitRules,
    pub bet_size: Decimal,
    pub min_order_value: Decimal,
    pub sell_offset: Decimal,
    pub max_sell_attempts: u32,
    pub entry_policy: PollPolicy,
    pub exit_policy: PollPolicy,
    pub max_session_loss: Decimal,
    /// Where the session snapshot is written after each settlement
    pub state_path: Option<PathBuf>,
}

impl ControllerConfig {
    pub fn from_config(config: &Config) -> Self {
        let exec = &config.execution;
        let interval = Duration::from_millis(exec.poll_interval_ms);
        Self {
            rules: ExitRules::from_config(&config.position),
            bet_size: exec.bet_size,
            min_order_value: exec.min_order_value,
            sell_offset: exec.sell_offset,
            max_sell_attempts: exec.max_sell_attempts,
            entry_policy: PollPolicy::new(Duration::from_secs(exec.entry_timeout_secs), interval),
            exit_policy: PollPolicy::new(Duration::from_secs(exec.exit_timeout_secs), interval),
            max_session_loss: config.risk.max_session_loss,
            state_path: Some(config.risk.state_path.clone()),
        }
    }
}

/// Work sent from the tick loop. `seq` is echoed back in
/// [`ControllerSnapshot::last_seq`] once the command has been handled.
#[derive(Debug, Clone)]
pub enum ControllerCommand {
    /// Price-check the candidate against a fresh book and buy if it holds
    Enter {
        seq: u64,
        candidate: EntryCandidate,
        slug: String,
    },
    /// Evaluate exits for the open position
    Check {
        seq: u64,
        interval_start: i64,
        remaining_secs: i64,
        /// Fetch the token price for take-profit/stop-loss
        check_price: bool,
        /// A trend reversal was detected since the last check
        reversal: bool,
    },
    /// The interval ended; settle whatever is held
    Resolve {
        seq: u64,
        interval_start: i64,
        winner: Option<Side>,
    },
}

impl ControllerCommand {
    pub fn seq(&self) -> u64 {
        match self {
            ControllerCommand::Enter { seq, .. }
            | ControllerCommand::Check { seq, .. }
            | ControllerCommand::Resolve { seq, .. } => *seq,
        }
    }
}

/// State published after every transition
#[derive(Debug, Clone, Default, Serialize)]
pub struct ControllerSnapshot {
    /// Sequence number of the last command fully handled
    pub last_seq: u64,
    /// Interval the phase refers to
    pub interval_start: Option<i64>,
    pub phase: PositionPhase,
    pub position: Option<Position>,
    /// Exit whose sell failed and is retried on the next check
    pub pending_exit: Option<ExitReason>,
    pub session_pnl: Decimal,
    pub halted: bool,
    pub bankroll: Decimal,
    pub scoreboard: Scoreboard,
}

impl ControllerSnapshot {
    /// An order for `interval_start` has reached the exchange
    pub fn committed_to(&self, interval_start: i64) -> bool {
        self.interval_start == Some(interval_start) && self.phase.is_committed()
    }

    /// Open, unexited position in `interval_start`
    pub fn open_position(&self, interval_start: i64) -> Option<&Position> {
        self.position
            .as_ref()
            .filter(|p| p.interval_start == interval_start && !p.exited)
    }
}

/// Engine-side handle to a running controller
pub struct ControllerHandle {
    tx: mpsc::Sender<ControllerCommand>,
    state: watch::Receiver<ControllerSnapshot>,
    task: JoinHandle<()>,
}

impl ControllerHandle {
    /// Queue a command without waiting
    pub fn try_send(&self, cmd: ControllerCommand) -> Result<(), mpsc::error::TrySendError<ControllerCommand>> {
        self.tx.try_send(cmd)
    }

    /// Latest published state
    pub fn snapshot(&self) -> ControllerSnapshot {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ControllerSnapshot> {
        self.state.clone()
    }

    /// Close the queue, let queued and in-flight commands finish, and
    /// return the final state
    pub async fn shutdown(self) -> ControllerSnapshot {
        let Self { tx, state, task } = self;
        drop(tx);
        if let Err(e) = task.await {
            tracing::error!(error = %e, "Position controller task failed");
        }
        let snapshot = state.borrow().clone();
        snapshot
    }
}

/// Single writer of the position and session accounting
pub struct PositionController {
    config: ControllerConfig,
    gateway: Arc<dyn OrderGateway>,
    market: Arc<dyn MarketQuery>,
    evaluator: Arc<SignalEvaluator>,
    risk: SessionRisk,
    session: SessionSnapshot,
    scoreboard: Scoreboard,
    phase: PositionPhase,
    position: Option<Position>,
    pending_exit: Option<ExitReason>,
    interval_start: Option<i64>,
    last_seq: u64,
    state_tx: watch::Sender<ControllerSnapshot>,
}

impl PositionController {
    pub fn new(
        config: ControllerConfig,
        gateway: Arc<dyn OrderGateway>,
        market: Arc<dyn MarketQuery>,
        evaluator: Arc<SignalEvaluator>,
        session: SessionSnapshot,
    ) -> Self {
        let risk = SessionRisk::new(config.max_session_loss);
        let scoreboard = session.scoreboard();
        let (state_tx, _) = watch::channel(ControllerSnapshot::default());

        let controller = Self {
            config,
            gateway,
            market,
            evaluator,
            risk,
            session,
            scoreboard,
            phase: PositionPhase::Idle,
            position: None,
            pending_exit: None,
            interval_start: None,
            last_seq: 0,
            state_tx,
        };
        controller.publish();
        controller
    }

    /// Start the controller task with a command queue of `capacity`
    pub fn spawn(self, capacity: usize) -> ControllerHandle {
        let (tx, rx) = mpsc::channel(capacity);
        let state = self.state_tx.subscribe();
        let task = tokio::spawn(self.run(rx));
        ControllerHandle { tx, state, task }
    }

    async fn run(mut self, mut rx: mpsc::Receiver<ControllerCommand>) {
        tracing::info!(
            bankroll = %self.session.bankroll,
            record = %self.scoreboard,
            "Position controller started"
        );

        while let Some(cmd) = rx.recv().await {
            self.handle(cmd).await;
        }

        tracing::info!(
            session_pnl = %self.risk.session_pnl,
            bankroll = %self.session.bankroll,
            "Position controller stopped"
        );
    }

    async fn handle(&mut self, cmd: ControllerCommand) {
        let seq = cmd.seq();
        match cmd {
            ControllerCommand::Enter { candidate, slug, .. } => self.enter(candidate, slug).await,
            ControllerCommand::Check {
                interval_start,
                remaining_secs,
                check_price,
                reversal,
                ..
            } => self.check(interval_start, remaining_secs, check_price, reversal).await,
            ControllerCommand::Resolve {
                interval_start, winner, ..
            } => self.resolve(interval_start, winner),
        }
        self.last_seq = seq;
        self.publish();
    }

    fn publish(&self) {
        self.state_tx.send_replace(ControllerSnapshot {
            last_seq: self.last_seq,
            interval_start: self.interval_start,
            phase: self.phase,
            position: self.position.clone(),
            pending_exit: self.pending_exit,
            session_pnl: self.risk.session_pnl,
            halted: self.risk.is_halted(),
            bankroll: self.session.bankroll,
            scoreboard: self.scoreboard.clone(),
        });
    }

    fn set_phase(&mut self, phase: PositionPhase) {
        self.phase = phase;
        self.publish();
    }

    async fn enter(&mut self, candidate: EntryCandidate, slug: String) {
        let interval = candidate.interval_start;

        if self.risk.is_halted() {
            tracing::debug!(interval, "Entry skipped, circuit breaker tripped");
            return;
        }
        if let Some(held) = &self.position {
            tracing::warn!(
                interval,
                held_interval = held.interval_start,
                "Entry skipped, previous position not settled"
            );
            return;
        }
        if self.interval_start == Some(interval) && self.phase.is_committed() {
            tracing::debug!(interval, phase = ?self.phase, "Entry skipped, interval already committed");
            return;
        }

        self.interval_start = Some(interval);
        self.phase = PositionPhase::Idle;

        let started = Instant::now();
        let snapshot = match market::snapshot(self.market.as_ref(), &slug, candidate.side).await {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(interval, slug = %slug, error = %e, "Market unavailable");
                return;
            }
        };
        record_latency(LatencyMetric::OrderBook, started.elapsed());

        let signal = match self.evaluator.price_check(&candidate, &snapshot) {
            Ok(signal) => signal,
            Err(reason) => {
                tracing::info!(
                    interval,
                    side = %candidate.side,
                    move_pct = %candidate.move_pct.round_dp(3),
                    reason = %reason,
                    "Entry rejected"
                );
                return;
            }
        };

        let Some(mut size) = entry_size(self.config.bet_size, signal.buy_price, self.config.min_order_value) else {
            tracing::warn!(interval, price = %signal.buy_price, "Could not size entry");
            return;
        };
        if let Some(min_size) = snapshot.min_order_size {
            size = size.max(min_size);
        }

        tracing::info!(
            interval,
            side = %signal.side,
            move_pct = %signal.move_pct.round_dp(3),
            elapsed = signal.elapsed_secs,
            fair_value = %signal.fair_value,
            price = %signal.buy_price,
            edge = %signal.edge,
            size = %size,
            "Entry signal"
        );

        self.set_phase(PositionPhase::Submitting);
        let started = Instant::now();
        let request = OrderRequest::buy(&signal.token_id, signal.buy_price, size);
        let order_id = match self.gateway.submit(&request).await {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!(interval, error = %e, "Entry order failed");
                self.phase = PositionPhase::Idle;
                return;
            }
        };

        tracing::info!(interval, order_id = %order_id, "Entry order submitted");
        self.set_phase(PositionPhase::PendingFill);

        let outcome = confirm_fill(
            self.gateway.as_ref(),
            &order_id,
            size,
            signal.buy_price,
            self.config.entry_policy,
        )
        .await;
        record_latency(LatencyMetric::EntryRoundTrip, started.elapsed());

        match outcome {
            FillOutcome::Filled { size: filled, price } => {
                let position = Position::new(
                    interval,
                    slug,
                    signal.side,
                    signal.token_id,
                    order_id,
                    price,
                    filled,
                    signal.fair_value,
                    Utc::now(),
                );
                self.session.bankroll -= position.cost;
                record_counter(CounterMetric::Entries, 1);
                tracing::info!(
                    interval,
                    order_id = %position.order_id,
                    side = %position.side,
                    price = %position.entry_price,
                    size = %position.size,
                    requested = %size,
                    cost = %position.cost,
                    "Entry filled"
                );
                self.position = Some(position);
                self.phase = PositionPhase::Open;
            }
            FillOutcome::Unfilled(reason) => {
                record_counter(CounterMetric::Unfilled, 1);
                tracing::info!(interval, order_id = %order_id, reason = ?reason, "Entry unfilled");
                self.phase = PositionPhase::Unfilled;
            }
        }
    }

    async fn check(&mut self, interval_start: i64, remaining_secs: i64, check_price: bool, reversal: bool) {
        let Some(position) = self
            .position
            .as_ref()
            .filter(|p| p.interval_start == interval_start && !p.exited)
        else {
            return;
        };

        let price = if check_price {
            match self.market.midpoint(&position.token_id).await {
                Ok(p) => Some(p),
                Err(e) => {
                    tracing::debug!(interval = interval_start, error = %e, "Price check failed");
                    None
                }
            }
        } else {
            None
        };

        let decided = self.config.rules.decide(position, remaining_secs, price, reversal);
        let reason = match (decided, self.pending_exit) {
            (Some(ExitReason::Forced), _) => ExitReason::Forced,
            (_, Some(pending)) => {
                tracing::info!(
                    interval = interval_start,
                    reason = %pending,
                    attempts = position.sell_attempts,
                    remaining = remaining_secs,
                    "Retrying exit"
                );
                pending
            }
            (Some(reason), None) => {
                tracing::info!(
                    interval = interval_start,
                    reason = %reason,
                    remaining = remaining_secs,
                    price = ?price,
                    entry = %position.entry_price,
                    "Exit triggered"
                );
                reason
            }
            (None, None) => return,
        };
        self.exit(reason).await;
    }

    async fn exit(&mut self, reason: ExitReason) {
        let Some(position) = self.position.as_mut() else {
            return;
        };
        position.sell_attempts += 1;
        let interval = position.interval_start;
        let attempts = position.sell_attempts;

        if attempts > self.config.max_sell_attempts {
            position.write_off(reason);
            record_exit(reason.label());
            tracing::warn!(interval, reason = %reason, attempts, "Sell attempts exhausted, position written off");
            self.pending_exit = None;
            self.phase = PositionPhase::Exited;
            return;
        }

        let token_id = position.token_id.clone();
        let entry_price = position.entry_price;
        let shares = position
            .held_size()
            .round_dp_with_strategy(2, RoundingStrategy::ToZero);

        self.set_phase(PositionPhase::Exiting);

        let bid = match self.market.sell_price(&token_id).await {
            Ok(bid) => bid,
            Err(e) => {
                let fallback = (entry_price * Decimal::new(5, 1)).max(MIN_PRICE);
                tracing::warn!(interval, error = %e, fallback = %fallback, "No sell price, using fallback");
                fallback
            }
        };
        let price = (bid - self.config.sell_offset).max(MIN_PRICE).round_dp(2);

        if shares * price < self.config.min_order_value {
            if reason == ExitReason::Forced {
                if let Some(position) = self.position.as_mut() {
                    position.write_off(reason);
                }
                record_exit(reason.label());
                tracing::warn!(
                    interval,
                    shares = %shares,
                    price = %price,
                    "Exit below minimum order value, closed without sale"
                );
                self.pending_exit = None;
                self.phase = PositionPhase::Exited;
            } else {
                tracing::info!(interval, shares = %shares, price = %price, "Exit below minimum order value, holding");
                self.phase = PositionPhase::Open;
            }
            return;
        }

        let started = Instant::now();
        let request = OrderRequest::sell(&token_id, price, shares);
        let order_id = match self.gateway.submit(&request).await {
            Ok(id) => id,
            Err(e) => {
                record_counter(CounterMetric::SellFailures, 1);
                tracing::warn!(interval, attempt = attempts, error = %e, "Sell order failed");
                self.pending_exit = Some(reason);
                self.phase = PositionPhase::Open;
                return;
            }
        };

        let outcome = confirm_fill(self.gateway.as_ref(), &order_id, shares, price, self.config.exit_policy).await;
        record_latency(LatencyMetric::ExitRoundTrip, started.elapsed());

        match outcome {
            FillOutcome::Filled { size, price } => {
                let Some(position) = self.position.as_mut() else {
                    return;
                };
                let proceeds = position.record_sale(reason, &order_id, size, price);
                self.session.bankroll += proceeds;
                record_exit(reason.label());
                tracing::info!(
                    interval,
                    order_id = %order_id,
                    reason = %reason,
                    price = %price,
                    sold = %position.sold_size,
                    held = %position.held_size(),
                    pnl = %position.exit_pnl,
                    "Exit filled"
                );
                self.pending_exit = None;
                self.phase = PositionPhase::Exited;
            }
            FillOutcome::Unfilled(why) => {
                record_counter(CounterMetric::SellFailures, 1);
                tracing::warn!(interval, order_id = %order_id, attempt = attempts, reason = ?why, "Sell unfilled");
                self.pending_exit = Some(reason);
                self.phase = PositionPhase::Open;
            }
        }
    }

    fn resolve(&mut self, interval_start: i64, winner: Option<Side>) {
        self.pending_exit = None;
        let Some(position) = self.position.take() else {
            if self.interval_start == Some(interval_start) {
                self.phase = PositionPhase::Idle;
            }
            return;
        };

        // A position from an earlier interval missed its resolve; its outcome is unknown
        let winner = if position.interval_start == interval_start {
            winner
        } else {
            tracing::warn!(
                interval = interval_start,
                held_interval = position.interval_start,
                "Settling stale position with unknown outcome"
            );
            None
        };

        let settlement = position.settle(winner, Utc::now());

        if let Some(halt) = self.risk.record(settlement.pnl) {
            set_gauge(GaugeMetric::CircuitBreaker, 1.0);
            tracing::error!(
                session_pnl = %self.risk.session_pnl,
                limit = %self.risk.max_session_loss,
                reason = %halt,
                "Circuit breaker tripped, entries halted"
            );
        }

        self.session.bankroll += settlement.payout;
        self.scoreboard.record(&settlement);
        record_counter(CounterMetric::Resolutions, 1);
        set_gauge(GaugeMetric::SessionPnl, self.risk.session_pnl.to_f64().unwrap_or_default());
        set_gauge(GaugeMetric::Bankroll, self.session.bankroll.to_f64().unwrap_or_default());

        tracing::info!(
            interval = settlement.interval_start,
            side = %settlement.side,
            winner = ?settlement.winner,
            exit = ?settlement.exit_reason,
            written_off = settlement.written_off,
            pnl = %settlement.pnl,
            session_pnl = %self.risk.session_pnl,
            bankroll = %self.session.bankroll,
            record = %self.scoreboard,
            "Position resolved"
        );

        self.session.push(settlement);
        if let Some(path) = &self.config.state_path {
            if let Err(e) = self.session.save(path) {
                tracing::error!(path = %path.display(), error = %e, "Failed to save session state");
            }
        }

        self.interval_start = Some(interval_start);
        self.phase = PositionPhase::Resolved;
    }
}
