//! Binance klines REST source
//!
//! Used to pre-seed trend trackers on startup. Tries each configured base URL
//! in order (binance.us first, then binance.com) and pages through the
//! requested window 1000 klines at a time.

use super::{normalize, Candle, HistoricalCandleSource};
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;
use std::time::Duration;

/// Default REST endpoints, tried in order
pub const BINANCE_REST_URLS: [&str; 2] = ["https://api.binance.us", "https://api.binance.com"];

/// Maximum klines per request
const MAX_LIMIT: usize = 1000;

/// Binance klines client
pub struct BinanceKlines {
    client: Client,
    base_urls: Vec<String>,
    symbol: String,
}

impl BinanceKlines {
    /// Create a klines source for `symbol` (e.g. "BTCUSDT")
    pub fn new(symbol: impl Into<String>) -> anyhow::Result<Self> {
        Self::with_base_urls(
            symbol,
            BINANCE_REST_URLS.iter().map(|s| s.to_string()).collect(),
        )
    }

    /// Create a klines source against explicit base URLs
    pub fn with_base_urls(symbol: impl Into<String>, base_urls: Vec<String>) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("failed to build Binance HTTP client")?;

        Ok(Self {
            client,
            base_urls,
            symbol: symbol.into().to_uppercase(),
        })
    }

    /// Kline interval label for a candle width
    fn interval_label(width_secs: i64) -> Option<&'static str> {
        match width_secs {
            60 => Some("1m"),
            300 => Some("5m"),
            900 => Some("15m"),
            3600 => Some("1h"),
            _ => None,
        }
    }

    /// Parse one kline row: `[open_time_ms, "open", "high", "low", "close", ...]`
    fn parse_row(row: &[Value]) -> Option<Candle> {
        let start_ms = row.first()?.as_i64()?;
        let field = |i: usize| -> Option<Decimal> {
            let v = row.get(i)?;
            match v {
                Value::String(s) => Decimal::from_str(s).ok(),
                Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
                _ => None,
            }
        };

        Some(Candle {
            start_ts: start_ms.div_euclid(1000),
            open: field(1)?,
            high: field(2)?,
            low: field(3)?,
            close: field(4)?,
        })
    }

    async fn fetch_page(
        &self,
        base_url: &str,
        interval: &str,
        start_ms: i64,
        end_ms: i64,
    ) -> anyhow::Result<Vec<Candle>> {
        let url = format!("{}/api/v3/klines", base_url);
        let limit = MAX_LIMIT.to_string();
        let start = start_ms.to_string();
        let end = end_ms.to_string();

        let response = self
            .client
            .get(&url)
            .query(&[
                ("symbol", self.symbol.as_str()),
                ("interval", interval),
                ("startTime", start.as_str()),
                ("endTime", end.as_str()),
                ("limit", limit.as_str()),
            ])
            .send()
            .await
            .with_context(|| format!("GET {url}"))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Binance klines error: {} - {}", status, body);
        }

        let rows: Vec<Vec<Value>> = response.json().await.context("decode klines")?;
        Ok(rows.iter().filter_map(|r| Self::parse_row(r)).collect())
    }

    async fn fetch_from(
        &self,
        base_url: &str,
        width_secs: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> anyhow::Result<Vec<Candle>> {
        let interval = Self::interval_label(width_secs)
            .ok_or_else(|| anyhow::anyhow!("unsupported kline width: {}s", width_secs))?;

        let end_ms = end.timestamp_millis() - 1;
        let mut cursor_ms = start.timestamp_millis();
        let mut out = Vec::new();

        while cursor_ms <= end_ms {
            let page = self.fetch_page(base_url, interval, cursor_ms, end_ms).await?;
            let Some(last) = page.last() else { break };
            cursor_ms = (last.start_ts + width_secs) * 1000;
            let full = page.len() >= MAX_LIMIT;
            out.extend(page);
            if !full {
                break;
            }
        }

        Ok(normalize(out))
    }
}

#[async_trait]
impl HistoricalCandleSource for BinanceKlines {
    async fn fetch(
        &self,
        width_secs: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> anyhow::Result<Vec<Candle>> {
        let mut last_err = None;

        for base_url in &self.base_urls {
            match self.fetch_from(base_url, width_secs, start, end).await {
                Ok(candles) if !candles.is_empty() => {
                    tracing::debug!(
                        source = %base_url,
                        count = candles.len(),
                        "Fetched Binance klines"
                    );
                    return Ok(candles);
                }
                Ok(_) => {
                    tracing::warn!(source = %base_url, "Binance returned no klines");
                }
                Err(e) => {
                    tracing::warn!(source = %base_url, error = %e, "Binance klines request failed");
                    last_err = Some(e);
                }
            }
        }

        match last_err {
            Some(e) => Err(e),
            None => Ok(vec![]),
        }
    }
}
