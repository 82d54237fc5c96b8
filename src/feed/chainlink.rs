//! Chainlink price feed over Polymarket's real-time data socket
//!
//! This is the same Chainlink stream the up/down markets settle against.

use super::{forward_ticks, PriceFeed, PriceTick};
use crate::ws::{WsClient, WsConfig};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::mpsc;

pub const RTDS_URL: &str = "wss://ws-live-data.polymarket.com";

const TOPIC: &str = "crypto_prices_chainlink";

#[derive(Debug, Deserialize)]
struct RtdsMessage {
    #[serde(default)]
    topic: String,
    payload: Option<ChainlinkPayload>,
}

#[derive(Debug, Deserialize)]
struct ChainlinkPayload {
    symbol: String,
    value: serde_json::Number,
    /// Milliseconds
    timestamp: i64,
}

/// Chainlink `crypto_prices_chainlink` topic, filtered to one symbol
pub struct ChainlinkFeed {
    url: String,
    /// Slash-separated pair, e.g. `btc/usd`
    symbol: String,
    capacity: usize,
}

impl ChainlinkFeed {
    pub fn new(symbol: impl Into<String>, capacity: usize) -> Self {
        Self::with_url(RTDS_URL, symbol, capacity)
    }

    pub fn with_url(url: impl Into<String>, symbol: impl Into<String>, capacity: usize) -> Self {
        Self {
            url: url.into(),
            symbol: symbol.into().to_lowercase(),
            capacity,
        }
    }

    fn subscribe_message(&self) -> String {
        json!({
            "action": "subscribe",
            "subscriptions": [{
                "topic": TOPIC,
                "type": "*",
                "filters": json!({ "symbol": self.symbol }).to_string(),
            }],
        })
        .to_string()
    }

    /// Parse an RTDS frame; anything but a price for `symbol` is skipped
    fn parse_message(symbol: &str, msg: &str) -> Option<PriceTick> {
        let frame: RtdsMessage = serde_json::from_str(msg).ok()?;
        if frame.topic != TOPIC {
            return None;
        }

        let payload = frame.payload?;
        if !payload.symbol.eq_ignore_ascii_case(symbol) {
            return None;
        }

        let price = Decimal::from_str(&payload.value.to_string()).ok()?;
        let exchange_ts = Utc.timestamp_millis_opt(payload.timestamp).single()?;

        Some(PriceTick {
            symbol: payload.symbol,
            price,
            timestamp: Utc::now(),
            exchange_ts,
        })
    }
}

#[async_trait]
impl PriceFeed for ChainlinkFeed {
    async fn subscribe(&self) -> anyhow::Result<mpsc::Receiver<PriceTick>> {
        let (tick_tx, tick_rx) = mpsc::channel(self.capacity);

        tracing::info!(symbol = %self.symbol, url = %self.url, "Subscribing to Chainlink feed");

        let config = WsConfig::new(self.url.clone())
            .initial_delay(Duration::from_secs(3))
            .max_delay(Duration::from_secs(30))
            .ping_interval(Duration::from_secs(5))
            .on_connect(self.subscribe_message());
        let ws_rx = WsClient::new(config).connect(self.capacity);

        let symbol = self.symbol.clone();
        tokio::spawn(forward_ticks("chainlink", ws_rx, tick_tx, move |msg| {
            Self::parse_message(&symbol, msg)
        }));

        Ok(tick_rx)
    }
}
