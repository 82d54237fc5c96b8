//! Gamma API client for market discovery
//!
//! Each 15-minute BTC up/down market is published under the slug
//! `btc-updown-15m-{interval_start}`. Outcome tokens are mapped by outcome
//! name, never by position in the list.

use super::{MarketError, UpDownMarket};
use crate::signal::Side;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;

/// Gamma API base URL
pub const GAMMA_API_URL: &str = "https://gamma-api.polymarket.com";

/// Client for Polymarket's Gamma API
pub struct GammaClient {
    base_url: String,
    client: Client,
}

impl GammaClient {
    /// Create a client against `base_url` with a request timeout
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, MarketError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into(),
            client,
        })
    }

    /// Fetch a market by slug
    pub async fn market_by_slug(&self, slug: &str) -> Result<UpDownMarket, MarketError> {
        let url = format!("{}/markets", self.base_url);

        tracing::debug!(url = %url, slug, "Fetching market from Gamma API");

        let response = self.client.get(&url).query(&[("slug", slug)]).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MarketError::Transport(format!("Gamma API error: {} - {}", status, body)));
        }

        let markets: Vec<GammaMarket> = response.json().await?;
        let market = markets
            .into_iter()
            .next()
            .ok_or_else(|| MarketError::NotFound(slug.to_string()))?;

        convert_market(slug, market)
    }
}

/// Raw market response from Gamma API
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GammaMarket {
    #[serde(default)]
    condition_id: String,
    /// Outcome names as a JSON string, e.g. `["Up", "Down"]`
    outcomes: Option<String>,
    /// CLOB token IDs as a JSON string, aligned with `outcomes`
    clob_token_ids: Option<String>,
    accepting_orders: Option<bool>,
    order_min_size: Option<serde_json::Value>,
}

fn convert_market(slug: &str, gamma: GammaMarket) -> Result<UpDownMarket, MarketError> {
    let outcomes: Vec<String> = parse_json_list(gamma.outcomes.as_deref(), "outcomes")?;
    let token_ids: Vec<String> = parse_json_list(gamma.clob_token_ids.as_deref(), "clobTokenIds")?;

    if outcomes.len() < 2 || token_ids.len() < outcomes.len() {
        return Err(MarketError::Malformed(format!(
            "{} outcomes for {} tokens",
            outcomes.len(),
            token_ids.len()
        )));
    }

    let token_for = |side: Side| -> Result<String, MarketError> {
        outcomes
            .iter()
            .position(|o| o.eq_ignore_ascii_case(side.outcome_name()))
            .map(|i| token_ids[i].clone())
            .ok_or_else(|| MarketError::Malformed(format!("no '{}' outcome in {:?}", side, outcomes)))
    };

    Ok(UpDownMarket {
        slug: slug.to_string(),
        condition_id: gamma.condition_id,
        up_token_id: token_for(Side::Up)?,
        down_token_id: token_for(Side::Down)?,
        accepting_orders: gamma.accepting_orders.unwrap_or(true),
        min_order_size: gamma.order_min_size.as_ref().and_then(parse_decimal_value),
    })
}

/// Parse a JSON-encoded string list such as `"[\"a\", \"b\"]"`
fn parse_json_list(raw: Option<&str>, field: &str) -> Result<Vec<String>, MarketError> {
    let raw = raw.ok_or_else(|| MarketError::Malformed(format!("missing {}", field)))?;
    serde_json::from_str(raw).map_err(|e| MarketError::Malformed(format!("{}: {} - {}", field, raw, e)))
}

fn parse_decimal_value(v: &serde_json::Value) -> Option<Decimal> {
    match v {
        serde_json::Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        serde_json::Value::String(s) => Decimal::from_str(s).ok(),
        _ => None,
    }
}
