//! Execution types

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Exchange-assigned order identifier
pub type OrderId = String;

/// Order direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

/// A limit order to be submitted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    /// Outcome token
    pub token_id: String,
    pub side: OrderSide,
    /// Limit price
    pub price: Decimal,
    /// Shares
    pub size: Decimal,
}

impl OrderRequest {
    pub fn buy(token_id: impl Into<String>, price: Decimal, size: Decimal) -> Self {
        Self {
            token_id: token_id.into(),
            side: OrderSide::Buy,
            price,
            size,
        }
    }

    pub fn sell(token_id: impl Into<String>, price: Decimal, size: Decimal) -> Self {
        Self {
            token_id: token_id.into(),
            side: OrderSide::Sell,
            price,
            size,
        }
    }

    /// `price * size`
    pub fn notional(&self) -> Decimal {
        self.price * self.size
    }
}

/// Order status as reported by the exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Resting on the book
    Live,
    Matched,
    Canceled,
    Expired,
    Other(String),
}

impl OrderStatus {
    /// Normalize an exchange status string
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "LIVE" | "OPEN" => OrderStatus::Live,
            "MATCHED" | "FILLED" => OrderStatus::Matched,
            "CANCELED" | "CANCELLED" => OrderStatus::Canceled,
            "EXPIRED" => OrderStatus::Expired,
            other => OrderStatus::Other(other.to_string()),
        }
    }

    /// No further fills can happen
    pub fn is_dead(&self) -> bool {
        matches!(self, OrderStatus::Canceled | OrderStatus::Expired)
    }
}

/// One status poll of an order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderUpdate {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub original_size: Decimal,
    pub size_matched: Decimal,
    /// Limit price of the order
    pub price: Decimal,
    /// Average execution price when the exchange reports it
    pub avg_price: Option<Decimal>,
}

impl OrderUpdate {
    /// Best known execution price
    pub fn fill_price(&self) -> Decimal {
        self.avg_price.unwrap_or(self.price)
    }
}
