//! Price feed module
//!
//! Real-time BTC price from the Chainlink stream the markets settle on, or
//! from Binance trades. Both adapters decode at the boundary and hand the
//! engine typed [`PriceTick`]s over a bounded channel.

mod binance;
mod chainlink;
mod types;

pub use binance::BinanceFeed;
pub use chainlink::{ChainlinkFeed, RTDS_URL};
pub use types::PriceTick;

use crate::config::{FeedConfig, FeedSource};
use crate::ws::WsMessage;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Trait for price feed implementations
#[async_trait]
pub trait PriceFeed: Send + Sync {
    /// Subscribe to price updates
    async fn subscribe(&self) -> anyhow::Result<mpsc::Receiver<PriceTick>>;
}

/// Build the configured feed
pub fn from_config(config: &FeedConfig) -> Box<dyn PriceFeed> {
    match config.source {
        FeedSource::Chainlink => Box::new(ChainlinkFeed::new(&config.chainlink_symbol, config.channel_capacity)),
        FeedSource::Binance => Box::new(BinanceFeed::new(&config.symbol, config.channel_capacity)),
    }
}

/// Decode socket frames into ticks until either side goes away.
///
/// Frames that do not parse are dropped; they never end the stream.
async fn forward_ticks<F>(
    source: &'static str,
    mut ws_rx: mpsc::Receiver<WsMessage>,
    tick_tx: mpsc::Sender<PriceTick>,
    parse: F,
) where
    F: Fn(&str) -> Option<PriceTick> + Send + 'static,
{
    let mut dropped = 0u64;

    while let Some(msg) = ws_rx.recv().await {
        match msg {
            WsMessage::Text(text) => match parse(&text) {
                Some(tick) => {
                    if tick_tx.send(tick).await.is_err() {
                        tracing::debug!(source, "Tick receiver dropped, stopping feed");
                        break;
                    }
                }
                None => {
                    dropped += 1;
                    tracing::trace!(source, dropped, "Skipped frame");
                }
            },
            WsMessage::Connected => tracing::info!(source, "Price feed connected"),
            WsMessage::Reconnecting { attempt } => tracing::warn!(source, attempt, "Price feed reconnecting"),
            WsMessage::Disconnected => {
                tracing::error!(source, "Price feed disconnected");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_forward_skips_bad_frames() {
        let (ws_tx, ws_rx) = mpsc::channel(10);
        let (tick_tx, mut tick_rx) = mpsc::channel(10);

        let handle = tokio::spawn(forward_ticks("binance", ws_rx, tick_tx, BinanceFeed::parse_message));

        ws_tx.send(WsMessage::Connected).await.unwrap();
        ws_tx.send(WsMessage::Text("invalid json".to_string())).await.unwrap();
        let msg = r#"{"e":"trade","E":1704067200000,"s":"BTCUSDT","t":1,"p":"100.00","q":"0.001","T":1704067200123}"#;
        ws_tx.send(WsMessage::Text(msg.to_string())).await.unwrap();

        let tick = tick_rx.recv().await.unwrap();
        assert_eq!(tick.price, dec!(100.00));

        ws_tx.send(WsMessage::Disconnected).await.unwrap();
        handle.await.unwrap();
        assert!(tick_rx.recv().await.is_none());
    }

    #[test]
    fn test_from_config_defaults_to_chainlink() {
        // Construction only; nothing connects until subscribe
        let _feed = from_config(&FeedConfig::default());
    }
}
