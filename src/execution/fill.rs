//! Poll-with-deadline fill confirmation

use super::{OrderGateway, OrderStatus, OrderUpdate};
use crate::telemetry::metrics::{record_counter, CounterMetric};
use rust_decimal::Decimal;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep_until, timeout_at, Instant};

/// Polls a `MATCHED` order reporting no size before trusting the full size
const MATCHED_LAG_POLLS: u32 = 5;

/// Deadline and spacing for a polling loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub timeout: Duration,
    pub interval: Duration,
}

impl PollPolicy {
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval }
    }
}

/// Result of waiting for an order to fill
#[derive(Debug, Clone, PartialEq)]
pub enum FillOutcome {
    /// `size` never exceeds the requested size
    Filled { size: Decimal, price: Decimal },
    Unfilled(UnfilledReason),
}

impl FillOutcome {
    pub fn filled_size(&self) -> Decimal {
        match self {
            FillOutcome::Filled { size, .. } => *size,
            FillOutcome::Unfilled(_) => Decimal::ZERO,
        }
    }
}

/// Why an order ended with nothing matched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnfilledReason {
    /// Exchange reported the order canceled or expired
    Terminal,
    /// Deadline passed; a cancel was attempted
    TimedOut,
}

/// Run `check` every `policy.interval` until it yields a value or the
/// deadline passes.
///
/// Each check is itself bounded by the deadline, so a hung endpoint cannot
/// extend the wait. `check` receives the 1-based attempt number.
pub async fn poll_until<T, F, Fut>(policy: PollPolicy, mut check: F) -> Option<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let deadline = Instant::now() + policy.timeout;
    let mut attempt = 0;

    loop {
        attempt += 1;
        match timeout_at(deadline, check(attempt)).await {
            Ok(Some(value)) => return Some(value),
            Ok(None) => {}
            Err(_) => return None,
        }

        let next = (Instant::now() + policy.interval).min(deadline);
        sleep_until(next).await;
        if Instant::now() >= deadline {
            return None;
        }
    }
}

fn execution_price(update: &OrderUpdate, limit_price: Decimal) -> Decimal {
    let price = update.fill_price();
    if price > Decimal::ZERO {
        price
    } else {
        limit_price
    }
}

/// Wait for `order_id` to fill.
///
/// Any matched size ends the wait with that size (capped at `requested`); a
/// still-resting remainder is canceled. Canceled/expired orders with nothing
/// matched are unfilled. On timeout the order is canceled best-effort.
pub async fn confirm_fill(
    gateway: &dyn OrderGateway,
    order_id: &str,
    requested: Decimal,
    limit_price: Decimal,
    policy: PollPolicy,
) -> FillOutcome {
    let outcome = poll_until(policy, |attempt| async move {
        let update = match gateway.poll(order_id).await {
            Ok(update) => update,
            Err(e) => {
                tracing::warn!(order_id, attempt, error = %e, "Order status check failed");
                return None;
            }
        };

        tracing::debug!(
            order_id,
            attempt,
            status = ?update.status,
            matched = %update.size_matched,
            "Order status"
        );

        if update.size_matched > Decimal::ZERO {
            if update.status == OrderStatus::Live {
                if let Err(e) = gateway.cancel(order_id).await {
                    tracing::warn!(order_id, error = %e, "Cancel of unfilled remainder failed");
                }
            }
            return Some(FillOutcome::Filled {
                size: update.size_matched.min(requested),
                price: execution_price(&update, limit_price),
            });
        }

        if update.status.is_dead() {
            return Some(FillOutcome::Unfilled(UnfilledReason::Terminal));
        }

        if update.status == OrderStatus::Matched && attempt >= MATCHED_LAG_POLLS {
            tracing::warn!(order_id, attempt, "MATCHED with no size reported, accepting requested size");
            let size = if update.original_size > Decimal::ZERO {
                update.original_size.min(requested)
            } else {
                requested
            };
            return Some(FillOutcome::Filled {
                size,
                price: execution_price(&update, limit_price),
            });
        }

        None
    })
    .await;

    match outcome {
        Some(outcome) => outcome,
        None => {
            match gateway.cancel(order_id).await {
                Ok(()) => tracing::info!(order_id, timeout = ?policy.timeout, "Fill timeout, order canceled"),
                Err(e) => tracing::warn!(order_id, error = %e, "Fill timeout, cancel failed"),
            }
            record_counter(CounterMetric::OrderTimeouts, 1);
            FillOutcome::Unfilled(UnfilledReason::TimedOut)
        }
    }
}
