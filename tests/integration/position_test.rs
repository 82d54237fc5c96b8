//! Fill confirmation against the paper gateway

use async_trait::async_trait;
use poly_sniper::execution::{
    confirm_fill, FillOutcome, OrderGateway, OrderRequest, OrderStatus, PaperGateway, PollPolicy, UnfilledReason,
};
use poly_sniper::market::{MarketError, MarketQuery, OrderBook, PriceLevel, UpDownMarket};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One-level book whose ask can be moved; counts book reads
struct MovingBook {
    ask: Mutex<Decimal>,
    reads: AtomicUsize,
}

impl MovingBook {
    fn new(ask: Decimal) -> Self {
        Self {
            ask: Mutex::new(ask),
            reads: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl MarketQuery for MovingBook {
    async fn market(&self, slug: &str) -> Result<UpDownMarket, MarketError> {
        Err(MarketError::NotFound(slug.to_string()))
    }

    async fn order_book(&self, token_id: &str) -> Result<OrderBook, MarketError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let ask = *self.ask.lock().unwrap();
        Ok(OrderBook::from_levels(
            token_id,
            vec![PriceLevel {
                price: ask - dec!(0.02),
                size: dec!(50),
            }],
            vec![PriceLevel {
                price: ask,
                size: dec!(5),
            }],
        ))
    }

    async fn midpoint(&self, _token_id: &str) -> Result<Decimal, MarketError> {
        Ok(*self.ask.lock().unwrap() - dec!(0.01))
    }

    async fn sell_price(&self, _token_id: &str) -> Result<Decimal, MarketError> {
        Ok(*self.ask.lock().unwrap() - dec!(0.02))
    }
}

fn policy() -> PollPolicy {
    PollPolicy::new(Duration::from_secs(20), Duration::from_secs(1))
}

#[tokio::test(start_paused = true)]
async fn test_unmatched_order_times_out_and_cancels() {
    let book = Arc::new(MovingBook::new(dec!(0.70)));
    let gateway = PaperGateway::new(book.clone());

    let order = OrderRequest::buy("tok-up", dec!(0.56), dec!(9));
    let id = gateway.submit(&order).await.unwrap();

    let outcome = confirm_fill(&gateway, &id, order.size, order.price, policy()).await;
    assert_eq!(outcome, FillOutcome::Unfilled(UnfilledReason::TimedOut));
    assert_eq!(outcome.filled_size(), Decimal::ZERO);
    assert!(book.reads.load(Ordering::SeqCst) >= 20);

    let update = gateway.poll(&id).await.unwrap();
    assert_eq!(update.status, OrderStatus::Canceled);
}

#[tokio::test(start_paused = true)]
async fn test_partial_depth_fills_and_cancels_remainder() {
    let book = Arc::new(MovingBook::new(dec!(0.70)));
    let gateway = PaperGateway::new(book.clone());

    let order = OrderRequest::buy("tok-up", dec!(0.56), dec!(9));
    let id = gateway.submit(&order).await.unwrap();

    // Ask drops through the limit after a few seconds, with 5 shares resting
    let mover = book.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(3500)).await;
        *mover.ask.lock().unwrap() = dec!(0.55);
    });

    let outcome = confirm_fill(&gateway, &id, order.size, order.price, policy()).await;
    assert_eq!(
        outcome,
        FillOutcome::Filled {
            size: dec!(5),
            price: dec!(0.55),
        }
    );

    let update = gateway.poll(&id).await.unwrap();
    assert_eq!(update.status, OrderStatus::Canceled);
    assert_eq!(update.size_matched, dec!(5));
}

#[tokio::test(start_paused = true)]
async fn test_sell_fills_at_bid() {
    let book = Arc::new(MovingBook::new(dec!(0.90)));
    let gateway = PaperGateway::new(book);

    let order = OrderRequest::sell("tok-up", dec!(0.86), dec!(9));
    let id = gateway.submit(&order).await.unwrap();

    let outcome = confirm_fill(&gateway, &id, order.size, order.price, policy()).await;
    assert_eq!(
        outcome,
        FillOutcome::Filled {
            size: dec!(9),
            price: dec!(0.88),
        }
    );
}
