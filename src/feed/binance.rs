//! Binance WebSocket trade feed

use super::{forward_ticks, PriceFeed, PriceTick};
use crate::ws::{WsClient, WsConfig};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::mpsc;

/// Binance WebSocket base URL
const BINANCE_WS_URL: &str = "wss://stream.binance.com:9443/ws";

/// Binance trade message structure
#[derive(Debug, Deserialize)]
struct BinanceTradeMessage {
    /// Event type
    #[serde(rename = "e")]
    event_type: String,
    /// Symbol
    #[serde(rename = "s")]
    symbol: String,
    /// Price
    #[serde(rename = "p")]
    price: String,
    /// Trade time (milliseconds)
    #[serde(rename = "T")]
    trade_time: i64,
}

/// Binance `<symbol>@trade` stream
pub struct BinanceFeed {
    symbol: String,
    capacity: usize,
}

impl BinanceFeed {
    pub fn new(symbol: impl Into<String>, capacity: usize) -> Self {
        Self {
            symbol: symbol.into().to_lowercase(),
            capacity,
        }
    }

    fn build_ws_url(&self) -> String {
        format!("{}/{}@trade", BINANCE_WS_URL, self.symbol)
    }

    /// Parse a Binance trade message into a PriceTick
    pub(crate) fn parse_message(msg: &str) -> Option<PriceTick> {
        let trade: BinanceTradeMessage = serde_json::from_str(msg).ok()?;

        if trade.event_type != "trade" {
            return None;
        }

        let price = Decimal::from_str(&trade.price).ok()?;
        let exchange_ts = Utc.timestamp_millis_opt(trade.trade_time).single()?;

        Some(PriceTick {
            symbol: trade.symbol,
            price,
            timestamp: Utc::now(),
            exchange_ts,
        })
    }
}

#[async_trait]
impl PriceFeed for BinanceFeed {
    async fn subscribe(&self) -> anyhow::Result<mpsc::Receiver<PriceTick>> {
        let (tick_tx, tick_rx) = mpsc::channel(self.capacity);

        tracing::info!(symbol = %self.symbol, "Subscribing to Binance feed");

        let config = WsConfig::new(self.build_ws_url())
            .initial_delay(Duration::from_secs(1))
            .max_delay(Duration::from_secs(30))
            .ping_interval(Duration::from_secs(30));
        let ws_rx = WsClient::new(config).connect(self.capacity);

        tokio::spawn(forward_ticks("binance", ws_rx, tick_tx, Self::parse_message));

        Ok(tick_rx)
    }
}
