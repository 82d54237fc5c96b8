//! Coinbase Exchange candles REST source
//!
//! Used by offline calibration to pull months of 1-minute history. The
//! endpoint returns at most 300 rows per request, so the window is walked in
//! 300-candle chunks with light pacing between requests.

use super::{normalize, Candle, HistoricalCandleSource};
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;
use std::time::Duration;

/// Coinbase Exchange REST base URL
pub const COINBASE_API_URL: &str = "https://api.exchange.coinbase.com";

/// Rows returned per request
const MAX_PER_REQUEST: i64 = 300;
/// Attempts per chunk before giving up
const MAX_CHUNK_ATTEMPTS: u32 = 5;
const RATE_LIMIT_BACKOFF: Duration = Duration::from_secs(3);
const ERROR_BACKOFF: Duration = Duration::from_secs(2);
const REQUEST_PACING: Duration = Duration::from_millis(200);

/// Coinbase candles client for a single product (e.g. "BTC-USD")
pub struct CoinbaseCandles {
    client: Client,
    base_url: String,
    product: String,
}

impl CoinbaseCandles {
    /// Create a candles source for `product`
    pub fn new(product: impl Into<String>) -> anyhow::Result<Self> {
        Self::with_base_url(product, COINBASE_API_URL)
    }

    /// Create a candles source against an explicit base URL
    pub fn with_base_url(product: impl Into<String>, base_url: impl Into<String>) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .user_agent("poly-sniper")
            .build()
            .context("failed to build Coinbase HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            product: product.into(),
        })
    }

    /// Parse one row: `[time, low, high, open, close, volume]`
    fn parse_row(row: &[Value]) -> Option<Candle> {
        let num = |i: usize| -> Option<Decimal> {
            match row.get(i)? {
                Value::Number(n) => Decimal::from_str(&n.to_string())
                    .or_else(|_| Decimal::from_scientific(&n.to_string()))
                    .ok(),
                Value::String(s) => Decimal::from_str(s).ok(),
                _ => None,
            }
        };

        Some(Candle {
            start_ts: row.first()?.as_i64()?,
            low: num(1)?,
            high: num(2)?,
            open: num(3)?,
            close: num(4)?,
        })
    }

    async fn fetch_chunk(&self, width_secs: i64, start: i64, end: i64) -> anyhow::Result<Vec<Candle>> {
        let url = format!("{}/products/{}/candles", self.base_url, self.product);
        let params = [
            ("start", start.to_string()),
            ("end", end.to_string()),
            ("granularity", width_secs.to_string()),
        ];

        for attempt in 1..=MAX_CHUNK_ATTEMPTS {
            let response = match self.client.get(&url).query(&params).send().await {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(error = %e, attempt, "Coinbase request failed, retrying");
                    tokio::time::sleep(ERROR_BACKOFF).await;
                    continue;
                }
            };

            match response.status() {
                StatusCode::TOO_MANY_REQUESTS => {
                    tracing::debug!(attempt, "Coinbase rate limited, backing off");
                    tokio::time::sleep(RATE_LIMIT_BACKOFF).await;
                }
                s if s.is_success() => {
                    let rows: Vec<Vec<Value>> = response.json().await.context("decode candles")?;
                    return Ok(rows.iter().filter_map(|r| Self::parse_row(r)).collect());
                }
                s => {
                    let body = response.text().await.unwrap_or_default();
                    tracing::warn!(status = %s, body = %body, attempt, "Coinbase candles error");
                    tokio::time::sleep(ERROR_BACKOFF).await;
                }
            }
        }

        anyhow::bail!(
            "Coinbase candles chunk {}..{} failed after {} attempts",
            start,
            end,
            MAX_CHUNK_ATTEMPTS
        )
    }
}

#[async_trait]
impl HistoricalCandleSource for CoinbaseCandles {
    async fn fetch(
        &self,
        width_secs: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> anyhow::Result<Vec<Candle>> {
        let start_ts = start.timestamp();
        let end_ts = end.timestamp();
        let chunk = width_secs * MAX_PER_REQUEST;

        let mut out = Vec::new();
        let mut cursor = start_ts;
        let mut requests = 0u64;

        while cursor < end_ts {
            let chunk_end = (cursor + chunk).min(end_ts);
            out.extend(self.fetch_chunk(width_secs, cursor, chunk_end).await?);
            cursor = chunk_end;
            requests += 1;

            if requests % 100 == 0 {
                tracing::info!(
                    requests,
                    candles = out.len(),
                    progress_pct = (cursor - start_ts) * 100 / (end_ts - start_ts).max(1),
                    "Coinbase fetch progress"
                );
            }

            tokio::time::sleep(REQUEST_PACING).await;
        }

        out.retain(|c| c.start_ts >= start_ts && c.start_ts < end_ts);
        let candles = normalize(out);

        tracing::info!(
            product = %self.product,
            requests,
            count = candles.len(),
            "Fetched Coinbase candles"
        );

        Ok(candles)
    }
}
