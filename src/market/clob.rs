//! CLOB REST reads: book, midpoint, price

use super::{MarketError, OrderBook, PriceLevel};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;

/// CLOB REST base URL
pub const CLOB_API_URL: &str = "https://clob.polymarket.com";

/// Read-only CLOB client
pub struct ClobClient {
    base_url: String,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct BookResponse {
    #[serde(default)]
    asset_id: String,
    #[serde(default)]
    bids: Vec<BookEntry>,
    #[serde(default)]
    asks: Vec<BookEntry>,
}

#[derive(Debug, Deserialize)]
struct BookEntry {
    price: String,
    size: String,
}

#[derive(Debug, Deserialize)]
struct MidpointResponse {
    mid: String,
}

#[derive(Debug, Deserialize)]
struct PriceResponse {
    price: String,
}

impl ClobClient {
    /// Create a client against `base_url` with a request timeout
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, MarketError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into(),
            client,
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T, MarketError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.client.get(&url).query(query).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MarketError::Transport(format!("CLOB {} error: {} - {}", path, status, body)));
        }

        Ok(response.json().await?)
    }

    /// Full book for a token
    pub async fn book(&self, token_id: &str) -> Result<OrderBook, MarketError> {
        let resp: BookResponse = self.get("/book", &[("token_id", token_id)]).await?;
        Ok(build_book(token_id, resp))
    }

    /// Midpoint for a token
    pub async fn midpoint(&self, token_id: &str) -> Result<Decimal, MarketError> {
        let resp: MidpointResponse = self.get("/midpoint", &[("token_id", token_id)]).await?;
        parse_price(&resp.mid)
    }

    /// Best price for `side` ("BUY" or "SELL")
    pub async fn price(&self, token_id: &str, side: &str) -> Result<Decimal, MarketError> {
        let resp: PriceResponse = self
            .get("/price", &[("token_id", token_id), ("side", side)])
            .await?;
        parse_price(&resp.price)
    }
}

fn parse_price(raw: &str) -> Result<Decimal, MarketError> {
    Decimal::from_str(raw).map_err(|e| MarketError::Malformed(format!("price '{}': {}", raw, e)))
}

fn build_book(token_id: &str, resp: BookResponse) -> OrderBook {
    let levels = |entries: Vec<BookEntry>| -> Vec<PriceLevel> {
        entries
            .into_iter()
            .filter_map(|e| {
                Some(PriceLevel {
                    price: Decimal::from_str(&e.price).ok()?,
                    size: Decimal::from_str(&e.size).ok()?,
                })
            })
            .collect()
    };

    let id = if resp.asset_id.is_empty() {
        token_id.to_string()
    } else {
        resp.asset_id
    };
    OrderBook::from_levels(id, levels(resp.bids), levels(resp.asks))
}
