//! WebSocket client library
//!
//! A reconnecting reader with ping keepalive and subscribe-on-connect, shared
//! by the price feeds.

mod client;
mod types;

pub use client::WsClient;
pub use types::{WsConfig, WsError, WsMessage};
