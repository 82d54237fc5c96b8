//! Engine and position controller driven together by synthetic ticks

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use poly_sniper::calibration::{BucketTable, Cell, ElapsedBucket, FairValueTable, MoveBucket};
use poly_sniper::candles::{Candle, HistoricalCandleSource};
use poly_sniper::config::Config;
use poly_sniper::engine::Engine;
use poly_sniper::execution::{
    GatewayError, OrderGateway, OrderRequest, OrderSide, OrderStatus, OrderUpdate, PollPolicy,
};
use poly_sniper::feed::PriceTick;
use poly_sniper::market::{MarketError, MarketQuery, OrderBook, PriceLevel, UpDownMarket};
use poly_sniper::position::{ControllerConfig, ExitReason, PositionController, PositionPhase};
use poly_sniper::risk::SessionSnapshot;
use poly_sniper::signal::{Side, SignalEvaluator};
use poly_sniper::trend::Trend;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Interval-aligned start of the first (non-resolvable) interval
const T0: i64 = 1_704_067_200;
const SECOND: i64 = T0 + 900;
const THIRD: i64 = T0 + 1800;

/// Fixed book: bid 0.58, ask 0.60 on both tokens
struct FakeMarket {
    mid: Mutex<Decimal>,
    sell: Mutex<Decimal>,
}

impl FakeMarket {
    fn new() -> Self {
        Self {
            mid: Mutex::new(dec!(0.61)),
            sell: Mutex::new(dec!(0.58)),
        }
    }
}

#[async_trait]
impl MarketQuery for FakeMarket {
    async fn market(&self, slug: &str) -> Result<UpDownMarket, MarketError> {
        Ok(UpDownMarket {
            slug: slug.to_string(),
            condition_id: "0xcond".into(),
            up_token_id: "tok-up".into(),
            down_token_id: "tok-down".into(),
            accepting_orders: true,
            min_order_size: None,
        })
    }

    async fn order_book(&self, token_id: &str) -> Result<OrderBook, MarketError> {
        Ok(OrderBook::from_levels(
            token_id,
            vec![PriceLevel {
                price: dec!(0.58),
                size: dec!(200),
            }],
            vec![PriceLevel {
                price: dec!(0.60),
                size: dec!(200),
            }],
        ))
    }

    async fn midpoint(&self, _token_id: &str) -> Result<Decimal, MarketError> {
        Ok(*self.mid.lock().unwrap())
    }

    async fn sell_price(&self, _token_id: &str) -> Result<Decimal, MarketError> {
        Ok(*self.sell.lock().unwrap())
    }
}

/// Fills every accepted order in full at its limit price. Sells are
/// rejected while `reject_sells` is set.
#[derive(Default)]
struct FillingGateway {
    orders: Mutex<Vec<OrderRequest>>,
    reject_sells: AtomicBool,
    rejected: AtomicUsize,
}

impl FillingGateway {
    fn orders(&self) -> Vec<OrderRequest> {
        self.orders.lock().unwrap().clone()
    }

    fn rejected(&self) -> usize {
        self.rejected.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OrderGateway for FillingGateway {
    async fn submit(&self, order: &OrderRequest) -> Result<String, GatewayError> {
        if order.side == OrderSide::Sell && self.reject_sells.load(Ordering::SeqCst) {
            self.rejected.fetch_add(1, Ordering::SeqCst);
            return Err(GatewayError::Rejected("not enough balance".into()));
        }
        let mut orders = self.orders.lock().unwrap();
        orders.push(order.clone());
        Ok(format!("order-{}", orders.len()))
    }

    async fn poll(&self, order_id: &str) -> Result<OrderUpdate, GatewayError> {
        let idx: usize = order_id
            .trim_start_matches("order-")
            .parse()
            .map_err(|_| GatewayError::NotFound(order_id.to_string()))?;
        let order = self.orders.lock().unwrap()[idx - 1].clone();
        Ok(OrderUpdate {
            order_id: order_id.to_string(),
            status: OrderStatus::Matched,
            original_size: order.size,
            size_matched: order.size,
            price: order.price,
            avg_price: None,
        })
    }

    async fn cancel(&self, _order_id: &str) -> Result<(), GatewayError> {
        Ok(())
    }
}

struct Harness {
    engine: Engine,
    gateway: Arc<FillingGateway>,
    market: Arc<FakeMarket>,
}

fn harness(max_session_loss: Decimal) -> Harness {
    let mut config = Config::default();
    config.risk.max_session_loss = max_session_loss;

    let mut table = BucketTable::default();
    table.insert(
        MoveBucket::Large,
        ElapsedBucket::Developing,
        Cell {
            win_rate: Some(0.80),
            count: 120,
        },
    );
    let evaluator = Arc::new(SignalEvaluator::new(
        config.signal.clone(),
        &config.execution,
        Arc::new(FairValueTable::new(table, config.signal.min_samples)),
    ));

    let mut cc = ControllerConfig::from_config(&config);
    cc.state_path = None;
    cc.entry_policy = PollPolicy::new(Duration::from_secs(2), Duration::from_millis(50));
    cc.exit_policy = cc.entry_policy;

    let gateway = Arc::new(FillingGateway::default());
    let market = Arc::new(FakeMarket::new());
    let controller = PositionController::new(
        cc,
        gateway.clone(),
        market.clone(),
        evaluator.clone(),
        SessionSnapshot::new(dec!(100)),
    )
    .spawn(16);

    Harness {
        engine: Engine::new(&config, evaluator, controller),
        gateway,
        market,
    }
}

fn at(ts: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(ts, 0).unwrap()
}

fn tick(ts: i64, price: Decimal) -> PriceTick {
    PriceTick {
        symbol: "btc/usd".into(),
        price,
        timestamp: at(ts),
        exchange_ts: at(ts),
    }
}

/// Walk the engine into an open Up position in the second interval.
///
/// Ask 0.60 gives a 0.61 limit; $5 at 0.61 rounds to 8 shares costing 4.88.
async fn enter_second_interval(h: &mut Harness) {
    h.engine.on_trade(&tick(T0 + 100, dec!(50000)));
    h.engine.on_trade(&tick(T0 + 300, dec!(50080)));
    h.engine.on_trade(&tick(SECOND, dec!(50000)));
    h.engine.on_trade(&tick(SECOND + 300, dec!(50060)));

    let snap = h.engine.settle().await;
    let position = snap.position.expect("position opened");
    assert_eq!(position.interval_start, SECOND);
    assert_eq!(position.side, Side::Up);
    assert_eq!(position.entry_price, dec!(0.61));
    assert_eq!(position.size, dec!(8));
    assert_eq!(snap.phase, PositionPhase::Open);
    assert_eq!(snap.bankroll, dec!(95.12));
}

#[tokio::test]
async fn test_first_interval_never_trades() {
    let mut h = harness(dec!(25));

    h.engine.on_trade(&tick(T0 + 100, dec!(50000)));
    h.engine.on_trade(&tick(T0 + 300, dec!(50080)));
    h.engine.on_trade(&tick(T0 + 400, dec!(50100)));

    let snap = h.engine.settle().await;
    assert_eq!(snap.last_seq, 0);
    assert!(snap.position.is_none());
    assert!(h.gateway.orders().is_empty());

    // Rotating out of an unresolvable interval sends nothing
    h.engine.on_trade(&tick(SECOND + 5, dec!(50100)));
    assert_eq!(h.engine.settle().await.last_seq, 0);
}

#[tokio::test]
async fn test_entry_held_to_settlement() {
    let mut h = harness(dec!(25));
    enter_second_interval(&mut h).await;

    let orders = h.gateway.orders();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].side, OrderSide::Buy);
    assert_eq!(orders[0].token_id, "tok-up");

    // A second qualifying tick in the same interval does not re-enter
    h.engine.on_trade(&tick(SECOND + 400, dec!(50070)));
    h.engine.settle().await;
    assert_eq!(h.gateway.orders().len(), 1);

    // Rotation settles the interval; latest 50070 >= open 50000, Up wins
    h.engine.on_trade(&tick(THIRD + 2, dec!(50070)));
    let snap = h.engine.settle().await;

    assert_eq!(snap.phase, PositionPhase::Resolved);
    assert_eq!(snap.session_pnl, dec!(3.12));
    assert_eq!(snap.bankroll, dec!(103.12));
    assert_eq!(snap.scoreboard.wins, 1);
    assert!(!snap.halted);

    let last = h.engine.stop().await;
    assert_eq!(last.scoreboard.trades, 1);
}

#[tokio::test]
async fn test_stop_loss_exit_then_settle() {
    let mut h = harness(dec!(25));
    enter_second_interval(&mut h).await;

    // Token marked at 0.40: -34% from entry
    *h.market.mid.lock().unwrap() = dec!(0.40);
    *h.market.sell.lock().unwrap() = dec!(0.42);
    h.engine.on_trade(&tick(SECOND + 320, dec!(50010)));
    let snap = h.engine.settle().await;

    let position = snap.position.clone().expect("position kept after exit");
    assert!(position.exited);
    assert_eq!(position.exit_reason, Some(ExitReason::StopLoss));
    assert_eq!(position.exit_price, Some(dec!(0.40)));
    assert_eq!(snap.phase, PositionPhase::Exited);
    assert_eq!(snap.bankroll, dec!(98.32));

    let sell = &h.gateway.orders()[1];
    assert_eq!(sell.side, OrderSide::Sell);
    assert_eq!(sell.size, dec!(8));

    // Up still wins: the exit cost money versus holding
    h.engine.on_trade(&tick(THIRD + 2, dec!(50010)));
    let snap = h.engine.settle().await;
    assert_eq!(snap.session_pnl, dec!(-1.68));
    assert_eq!(snap.scoreboard.held.cost, 1);
    assert_eq!(snap.scoreboard.exits_for(ExitReason::StopLoss), 1);
}

#[tokio::test]
async fn test_circuit_breaker_blocks_later_entries() {
    let mut h = harness(dec!(4));
    enter_second_interval(&mut h).await;

    // Close below the open: Down wins and the held Up position loses 4.88
    h.engine.on_trade(&tick(SECOND + 500, dec!(49990)));
    h.engine.on_trade(&tick(THIRD + 2, dec!(49990)));
    let snap = h.engine.settle().await;
    assert_eq!(snap.session_pnl, dec!(-4.88));
    assert!(snap.halted);

    // A qualifying move in the next interval is refused
    h.engine.on_trade(&tick(THIRD + 300, dec!(50060)));
    let snap = h.engine.settle().await;
    assert_eq!(snap.phase, PositionPhase::Resolved);
    assert_eq!(h.gateway.orders().len(), 1);
}

/// One-minute history only; other widths come back empty
struct MinuteHistory(Vec<Candle>);

#[async_trait]
impl HistoricalCandleSource for MinuteHistory {
    async fn fetch(&self, width_secs: i64, _: DateTime<Utc>, _: DateTime<Utc>) -> anyhow::Result<Vec<Candle>> {
        Ok(if width_secs == 60 { self.0.clone() } else { vec![] })
    }
}

/// BTC price for the minute `m` after T0: an accelerating climb through the
/// entry at SECOND+240, then a steady 40/minute slide.
fn minute_price(m: i64) -> Decimal {
    let u = m.min(19) + 60;
    let climb = dec!(49000) + Decimal::from(u * u) / dec!(10);
    climb - Decimal::from(40 * (m - 19).max(0))
}

#[tokio::test]
async fn test_trend_reversal_exit_after_active_window() {
    let mut h = harness(dec!(25));
    let history = (-60..0)
        .map(|m| Candle::from_price(T0 + m * 60, minute_price(m)))
        .collect();
    h.engine.bootstrap(&MinuteHistory(history), at(T0)).await;

    // 0.124% up at +240s opens an Up position while the minute trend is Up
    for m in 0..=19 {
        h.engine.on_trade(&tick(T0 + m * 60, minute_price(m)));
        h.engine.settle().await;
    }
    let snap = h.engine.settle().await;
    let position = snap.open_position(SECOND).expect("position opened");
    assert_eq!(position.side, Side::Up);
    assert_eq!(h.engine.status().exit_trend, Trend::Up);

    // The trend turns against the position before +600s; nothing is sold yet
    for m in 20..=24 {
        h.engine.on_trade(&tick(T0 + m * 60, minute_price(m)));
        h.engine.settle().await;
    }
    assert_eq!(h.engine.status().exit_trend, Trend::Down);
    assert_eq!(h.gateway.orders().len(), 1);
    assert!(h.engine.settle().await.open_position(SECOND).is_some());

    // At +600s the reversal fires; the sell is rejected and kept pending
    h.gateway.reject_sells.store(true, Ordering::SeqCst);
    h.engine.on_trade(&tick(SECOND + 600, minute_price(25)));
    let snap = h.engine.settle().await;
    assert_eq!(h.gateway.rejected(), 1);
    assert_eq!(snap.pending_exit, Some(ExitReason::TrendReversal));
    assert_eq!(snap.phase, PositionPhase::Open);
    assert!(snap.open_position(SECOND).is_some());

    // Retried on the next tick even inside the same monitor slot
    h.engine.on_trade(&tick(SECOND + 601, minute_price(25)));
    h.engine.settle().await;
    assert_eq!(h.gateway.rejected(), 2);

    h.gateway.reject_sells.store(false, Ordering::SeqCst);
    h.engine.on_trade(&tick(SECOND + 602, minute_price(25)));
    let snap = h.engine.settle().await;

    let position = snap.position.clone().expect("position kept after exit");
    assert!(position.exited);
    assert_eq!(position.exit_reason, Some(ExitReason::TrendReversal));
    assert_eq!(position.exit_price, Some(dec!(0.56)));
    assert_eq!(position.sell_attempts, 3);
    assert_eq!(snap.pending_exit, None);
    assert_eq!(snap.phase, PositionPhase::Exited);
    assert_eq!(snap.bankroll, dec!(99.60));

    let sell = &h.gateway.orders()[1];
    assert_eq!(sell.side, OrderSide::Sell);
    assert_eq!(sell.size, dec!(8));
}
