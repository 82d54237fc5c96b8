//! Cached market resolution over Gamma + CLOB

use super::{ClobClient, GammaClient, MarketError, MarketQuery, OrderBook, UpDownMarket};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Resolves markets by slug, caching metadata for `ttl`
pub struct MarketCache {
    gamma: GammaClient,
    clob: ClobClient,
    ttl: Duration,
    markets: Arc<RwLock<HashMap<String, (Instant, UpDownMarket)>>>,
}

impl MarketCache {
    /// Create a new market cache
    pub fn new(gamma: GammaClient, clob: ClobClient, ttl: Duration) -> Self {
        Self {
            gamma,
            clob,
            ttl,
            markets: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of cached markets
    pub async fn len(&self) -> usize {
        self.markets.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.markets.read().await.is_empty()
    }

    async fn cached(&self, slug: &str) -> Option<UpDownMarket> {
        let markets = self.markets.read().await;
        markets
            .get(slug)
            .filter(|(at, _)| at.elapsed() < self.ttl)
            .map(|(_, m)| m.clone())
    }
}

#[async_trait]
impl MarketQuery for MarketCache {
    async fn market(&self, slug: &str) -> Result<UpDownMarket, MarketError> {
        if let Some(market) = self.cached(slug).await {
            return Ok(market);
        }

        let market = self.gamma.market_by_slug(slug).await?;
        tracing::debug!(
            slug,
            up = %market.up_token_id,
            down = %market.down_token_id,
            accepting = market.accepting_orders,
            "Resolved market"
        );

        let mut markets = self.markets.write().await;
        // Drop anything older than a full interval past its ttl
        let horizon = self.ttl + Duration::from_secs(crate::session::INTERVAL_SECS as u64);
        markets.retain(|_, (at, _)| at.elapsed() < horizon);
        markets.insert(slug.to_string(), (Instant::now(), market.clone()));

        Ok(market)
    }

    async fn order_book(&self, token_id: &str) -> Result<OrderBook, MarketError> {
        self.clob.book(token_id).await
    }

    async fn midpoint(&self, token_id: &str) -> Result<Decimal, MarketError> {
        self.clob.midpoint(token_id).await
    }

    async fn sell_price(&self, token_id: &str) -> Result<Decimal, MarketError> {
        self.clob.price(token_id, "SELL").await
    }
}
