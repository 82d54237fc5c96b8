//! Market data module
//!
//! Resolves each interval's up/down market by slug via the Gamma API and
//! reads order books and prices from the CLOB.

mod book;
mod cache;
mod clob;
mod gamma;

pub use book::{OrderBook, PriceLevel};
pub use cache::MarketCache;
pub use clob::{ClobClient, CLOB_API_URL};
pub use gamma::{GammaClient, GAMMA_API_URL};

use crate::signal::Side;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Market lookup errors
#[derive(Debug, Error)]
pub enum MarketError {
    #[error("market not found: {0}")]
    NotFound(String),
    #[error("transport: {0}")]
    Transport(String),
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for MarketError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            MarketError::Malformed(e.to_string())
        } else {
            MarketError::Transport(e.to_string())
        }
    }
}

/// A 15-minute BTC up/down market
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpDownMarket {
    pub slug: String,
    pub condition_id: String,
    pub up_token_id: String,
    pub down_token_id: String,
    pub accepting_orders: bool,
    pub min_order_size: Option<Decimal>,
}

impl UpDownMarket {
    /// Token for an outcome side
    pub fn token_for(&self, side: Side) -> &str {
        match side {
            Side::Up => &self.up_token_id,
            Side::Down => &self.down_token_id,
        }
    }
}

/// Prices and flags for one side of a market at a moment
#[derive(Debug, Clone)]
pub struct MarketSnapshot {
    pub slug: String,
    pub side: Side,
    pub token_id: String,
    pub accepting_orders: bool,
    pub min_order_size: Option<Decimal>,
    pub book: OrderBook,
}

impl MarketSnapshot {
    pub fn best_bid(&self) -> Option<Decimal> {
        self.book.best_bid()
    }

    pub fn best_ask(&self) -> Option<Decimal> {
        self.book.best_ask()
    }
}

/// Slug of the market covering the interval starting at `interval_start`
pub fn market_slug(prefix: &str, interval_start: i64) -> String {
    format!("{}-{}", prefix, interval_start)
}

/// Trait for market data implementations
#[async_trait]
pub trait MarketQuery: Send + Sync {
    /// Resolve a market by slug
    async fn market(&self, slug: &str) -> Result<UpDownMarket, MarketError>;
    /// Current book for a token
    async fn order_book(&self, token_id: &str) -> Result<OrderBook, MarketError>;
    /// Midpoint price for a token
    async fn midpoint(&self, token_id: &str) -> Result<Decimal, MarketError>;
    /// Best price a seller of the token would receive
    async fn sell_price(&self, token_id: &str) -> Result<Decimal, MarketError>;
}

/// Resolve the market and read the book for `side`
pub async fn snapshot(
    query: &dyn MarketQuery,
    slug: &str,
    side: Side,
) -> Result<MarketSnapshot, MarketError> {
    let market = query.market(slug).await?;
    let token_id = market.token_for(side).to_string();
    let book = query.order_book(&token_id).await?;

    Ok(MarketSnapshot {
        slug: market.slug,
        side,
        token_id,
        accepting_orders: market.accepting_orders,
        min_order_size: market.min_order_size,
        book,
    })
}
