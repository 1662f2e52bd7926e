//! WebSocket connection plumbing shared by streaming transports.
//!
//! This module provides:
//! - Connection state reporting
//! - Reconnect policy with exponential backoff and jitter
//! - Handshake request construction with custom headers and subprotocols
//!
//! # Example
//!
//! ```ignore
//! use graphlink_net::websocket::{ReconnectConfig, handshake_request};
//!
//! let reconnect = ReconnectConfig::new()
//!     .initial_delay(Duration::from_millis(500))
//!     .max_attempts(10);
//!
//! let request = handshake_request("wss://api.example.com/graphql", &headers, Some("graphql-ws"))?;
//! ```

mod handshake;
mod message;
mod reconnect;

pub use handshake::handshake_request;
pub use message::WebSocketState;
pub use reconnect::ReconnectConfig;
