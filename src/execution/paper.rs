//! Paper trading gateway
//!
//! Orders rest in memory and fill on poll when their limit crosses the live
//! book, at the touch price and up to the depth available at the limit.

use super::{GatewayError, OrderGateway, OrderId, OrderRequest, OrderSide, OrderStatus, OrderUpdate};
use crate::market::MarketQuery;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct PaperOrder {
    request: OrderRequest,
    status: OrderStatus,
    matched: Decimal,
    /// Sum of `price * size` over simulated fills
    matched_notional: Decimal,
}

impl PaperOrder {
    fn remaining(&self) -> Decimal {
        self.request.size - self.matched
    }

    fn update(&self, order_id: &str) -> OrderUpdate {
        let avg_price = if self.matched > Decimal::ZERO {
            Some((self.matched_notional / self.matched).round_dp(4))
        } else {
            None
        };
        OrderUpdate {
            order_id: order_id.to_string(),
            status: self.status.clone(),
            original_size: self.request.size,
            size_matched: self.matched,
            price: self.request.price,
            avg_price,
        }
    }
}

/// Simulated order gateway backed by real market data
pub struct PaperGateway {
    market: Arc<dyn MarketQuery>,
    orders: Arc<RwLock<HashMap<OrderId, PaperOrder>>>,
}

impl PaperGateway {
    /// Create a new paper gateway
    pub fn new(market: Arc<dyn MarketQuery>) -> Self {
        Self {
            market,
            orders: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of orders ever submitted
    pub async fn order_count(&self) -> usize {
        self.orders.read().await.len()
    }

    async fn try_match(&self, order: &mut PaperOrder) -> Result<(), GatewayError> {
        let book = self
            .market
            .order_book(&order.request.token_id)
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let limit = order.request.price;
        let (touch, depth) = match order.request.side {
            OrderSide::Buy => match book.best_ask() {
                Some(ask) if ask <= limit => (ask, book.ask_depth_at(limit)),
                _ => return Ok(()),
            },
            OrderSide::Sell => match book.best_bid() {
                Some(bid) if bid >= limit => (bid, book.bid_depth_at(limit)),
                _ => return Ok(()),
            },
        };

        let fill = order.remaining().min(depth);
        if fill <= Decimal::ZERO {
            return Ok(());
        }

        order.matched += fill;
        order.matched_notional += fill * touch;
        if order.remaining() <= Decimal::ZERO {
            order.status = OrderStatus::Matched;
        }

        tracing::info!(
            token_id = %order.request.token_id,
            side = %order.request.side,
            size = %fill,
            price = %touch,
            "Paper order filled"
        );
        Ok(())
    }
}

#[async_trait]
impl OrderGateway for PaperGateway {
    async fn submit(&self, order: &OrderRequest) -> Result<OrderId, GatewayError> {
        if order.price <= Decimal::ZERO || order.price >= Decimal::ONE {
            return Err(GatewayError::Rejected(format!("price {} outside (0, 1)", order.price)));
        }
        if order.size <= Decimal::ZERO {
            return Err(GatewayError::Rejected(format!("size {} not positive", order.size)));
        }

        let order_id = format!("paper-{}", uuid::Uuid::new_v4());
        let paper = PaperOrder {
            request: order.clone(),
            status: OrderStatus::Live,
            matched: Decimal::ZERO,
            matched_notional: Decimal::ZERO,
        };
        self.orders.write().await.insert(order_id.clone(), paper);

        tracing::info!(
            order_id = %order_id,
            side = %order.side,
            price = %order.price,
            size = %order.size,
            "Paper order placed"
        );
        Ok(order_id)
    }

    async fn poll(&self, order_id: &str) -> Result<OrderUpdate, GatewayError> {
        let mut order = self
            .orders
            .read()
            .await
            .get(order_id)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(order_id.to_string()))?;

        if order.status == OrderStatus::Live {
            self.try_match(&mut order).await?;
            self.orders.write().await.insert(order_id.to_string(), order.clone());
        }

        Ok(order.update(order_id))
    }

    async fn cancel(&self, order_id: &str) -> Result<(), GatewayError> {
        let mut orders = self.orders.write().await;
        let order = orders
            .get_mut(order_id)
            .ok_or_else(|| GatewayError::NotFound(order_id.to_string()))?;

        if order.status == OrderStatus::Live {
            order.status = OrderStatus::Canceled;
            tracing::info!(order_id, matched = %order.matched, "Paper order cancelled");
        }
        Ok(())
    }
}
