//! Transports for graphlink.
//!
//! This crate carries GraphQL operations over the wire:
//!
//! - **GraphQL over HTTP**: [`graphql::HttpTransport`] POSTs an
//!   [`Operation`] as JSON and parses the [`GraphQLResponse`].
//! - **Subscriptions**: [`graphql::SubscriptionTransport`] multiplexes
//!   subscriptions over one lazily opened WebSocket connection, speaking
//!   either `subscriptions-transport-ws` or `graphql-transport-ws`, and
//!   reconnects with backoff.
//! - **HTTP client**: a small builder over `reqwest` used by the HTTP
//!   transport.
//!
//! # Example
//!
//! ```ignore
//! use graphlink_net::graphql::{HttpTransport, Operation};
//! use graphlink_net::http::HttpClient;
//!
//! let client = HttpClient::builder()
//!     .timeout(Duration::from_secs(30))
//!     .build()?;
//! let transport = HttpTransport::new("https://api.example.com/graphql", client)?;
//!
//! let response = transport
//!     .execute(&Operation::new("{ viewer { login } }"))
//!     .await?;
//! ```
//!
//! Operations are classified by their main definition, so a document whose
//! first definition is a fragment still reports the kind of its operation:
//!
//! ```ignore
//! let operation = Operation::new(
//!     "fragment F on Message { id } subscription { messageAdded { ...F } }",
//! );
//! assert!(operation.is_subscription());
//! ```
//!
//! # Errors
//!
//! Every transport failure is a [`NetworkError`]. Errors reported by the
//! server inside a response body are not transport failures; they arrive in
//! [`GraphQLResponse::errors`].

mod error;
pub mod graphql;
pub mod http;
pub mod websocket;

pub use error::{NetworkError, Result};

// Re-export commonly used types at the crate root
pub use graphql::{
    CredentialsPolicy, GraphQLError, GraphQLResponse, HttpTransport, Operation, OperationKind,
    SubscriptionConfig, SubscriptionStream, SubscriptionTransport, WireProtocol,
};
pub use self::http::{HttpClient, HttpClientBuilder};
pub use websocket::{ReconnectConfig, WebSocketState};
