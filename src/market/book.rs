//! Order book snapshot

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A price level in the order book
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: Decimal,
    pub size: Decimal,
}

/// L2 book for one outcome token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBook {
    pub token_id: String,
    /// Bid levels, best (highest) first
    pub bids: Vec<PriceLevel>,
    /// Ask levels, best (lowest) first
    pub asks: Vec<PriceLevel>,
    pub updated_at: DateTime<Utc>,
}

impl OrderBook {
    /// Create an empty book
    pub fn new(token_id: impl Into<String>) -> Self {
        Self {
            token_id: token_id.into(),
            bids: vec![],
            asks: vec![],
            updated_at: Utc::now(),
        }
    }

    /// Build a book from unordered levels, dropping non-positive ones
    pub fn from_levels(token_id: impl Into<String>, bids: Vec<PriceLevel>, asks: Vec<PriceLevel>) -> Self {
        let valid = |l: &PriceLevel| l.price > Decimal::ZERO && l.size > Decimal::ZERO;

        let mut bids: Vec<PriceLevel> = bids.into_iter().filter(valid).collect();
        let mut asks: Vec<PriceLevel> = asks.into_iter().filter(valid).collect();
        bids.sort_by(|a, b| b.price.cmp(&a.price));
        asks.sort_by(|a, b| a.price.cmp(&b.price));

        Self {
            token_id: token_id.into(),
            bids,
            asks,
            updated_at: Utc::now(),
        }
    }

    /// Get best bid price
    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.first().map(|l| l.price)
    }

    /// Get best ask price
    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.first().map(|l| l.price)
    }

    /// Get mid price
    pub fn mid_price(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some((bid + ask) / Decimal::TWO),
            _ => None,
        }
    }

    /// Ask minus bid; a crossed or locked book reports zero
    pub fn spread(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some((ask - bid).max(Decimal::ZERO)),
            _ => None,
        }
    }

    /// Size resting at or better than `price` on the ask side
    pub fn ask_depth_at(&self, price: Decimal) -> Decimal {
        self.asks
            .iter()
            .take_while(|l| l.price <= price)
            .map(|l| l.size)
            .sum()
    }

    /// Size resting at or better than `price` on the bid side
    pub fn bid_depth_at(&self, price: Decimal) -> Decimal {
        self.bids
            .iter()
            .take_while(|l| l.price >= price)
            .map(|l| l.size)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn level(price: Decimal, size: Decimal) -> PriceLevel {
        PriceLevel { price, size }
    }

    #[test]
    fn test_order_book_mid_price() {
        let book = OrderBook::from_levels(
            "test",
            vec![level(dec!(0.50), dec!(100))],
            vec![level(dec!(0.52), dec!(100))],
        );

        assert_eq!(book.mid_price(), Some(dec!(0.51)));
        assert_eq!(book.spread(), Some(dec!(0.02)));
    }

    #[test]
    fn test_from_levels_orders_best_first() {
        let book = OrderBook::from_levels(
            "test",
            vec![level(dec!(0.40), dec!(5)), level(dec!(0.48), dec!(5)), level(dec!(0.45), dec!(5))],
            vec![level(dec!(0.60), dec!(5)), level(dec!(0.52), dec!(5)), level(dec!(0.55), dec!(5))],
        );

        assert_eq!(book.best_bid(), Some(dec!(0.48)));
        assert_eq!(book.best_ask(), Some(dec!(0.52)));
    }

    #[test]
    fn test_from_levels_drops_empty_levels() {
        let book = OrderBook::from_levels(
            "test",
            vec![level(dec!(0.49), dec!(0)), level(dec!(0.47), dec!(3))],
            vec![level(dec!(0), dec!(10))],
        );

        assert_eq!(book.best_bid(), Some(dec!(0.47)));
        assert!(book.best_ask().is_none());
        assert!(book.spread().is_none());
    }

    #[test]
    fn test_crossed_book_spread_is_zero() {
        let book = OrderBook::from_levels(
            "test",
            vec![level(dec!(0.55), dec!(1))],
            vec![level(dec!(0.53), dec!(1))],
        );
        assert_eq!(book.spread(), Some(dec!(0)));
    }

    #[test]
    fn test_depth_at_price() {
        let book = OrderBook::from_levels(
            "test",
            vec![level(dec!(0.50), dec!(10)), level(dec!(0.49), dec!(20))],
            vec![level(dec!(0.52), dec!(5)), level(dec!(0.53), dec!(7)), level(dec!(0.60), dec!(50))],
        );

        assert_eq!(book.ask_depth_at(dec!(0.53)), dec!(12));
        assert_eq!(book.bid_depth_at(dec!(0.49)), dec!(30));
        assert_eq!(book.bid_depth_at(dec!(0.51)), dec!(0));
    }

    #[test]
    fn test_order_book_new() {
        let book = OrderBook::new("test-token");
        assert_eq!(book.token_id, "test-token");
        assert!(book.mid_price().is_none());
    }
}
