//! Execution module
//!
//! Order submission, status polling and fill confirmation. The exchange is
//! reached through [`OrderGateway`]; [`PaperGateway`] simulates it against
//! the live book.

mod fill;
mod paper;
mod types;

pub use fill::{confirm_fill, poll_until, FillOutcome, PollPolicy, UnfilledReason};
pub use paper::PaperGateway;
pub use types::{OrderId, OrderRequest, OrderSide, OrderStatus, OrderUpdate};

use async_trait::async_trait;
use thiserror::Error;

/// Order gateway failures
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Network or HTTP failure; safe to retry
    #[error("transport: {0}")]
    Transport(String),
    /// Exchange declined the order
    #[error("rejected: {0}")]
    Rejected(String),
    #[error("order not found: {0}")]
    NotFound(OrderId),
}

/// Trait for order gateway implementations
#[async_trait]
pub trait OrderGateway: Send + Sync {
    /// Place a limit order
    async fn submit(&self, order: &OrderRequest) -> Result<OrderId, GatewayError>;
    /// Current status of an order
    async fn poll(&self, order_id: &str) -> Result<OrderUpdate, GatewayError>;
    /// Cancel an order
    async fn cancel(&self, order_id: &str) -> Result<(), GatewayError>;
}
