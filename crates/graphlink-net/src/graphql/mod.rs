//! GraphQL transports: operations, HTTP execution and WebSocket subscriptions.
//!
//! # Example
//!
//! ```ignore
//! use graphlink_net::graphql::{HttpTransport, Operation};
//! use graphlink_net::http::HttpClient;
//!
//! let transport = HttpTransport::new("https://api.example.com/graphql", HttpClient::new()?)?;
//!
//! let operation = Operation::new(r#"
//!     query GetUser($id: ID!) {
//!         user(id: $id) { id name }
//!     }
//! "#)
//! .variable("id", "123");
//!
//! let response = transport.execute(&operation).await?;
//! for error in &response.errors {
//!     eprintln!("{error}");
//! }
//! println!("{:?}", response.data);
//! ```
//!
//! # Subscriptions
//!
//! ```ignore
//! use futures_util::StreamExt;
//! use graphlink_net::graphql::{Operation, SubscriptionConfig, SubscriptionTransport};
//!
//! let transport = SubscriptionTransport::new(
//!     SubscriptionConfig::new("wss://api.example.com/graphql")
//!         .connection_params(|| Some(serde_json::json!({ "authorization": "Bearer ..." }))),
//! );
//!
//! let mut stream = transport.subscribe(&Operation::new("subscription { messageAdded { id } }"))?;
//! while let Some(response) = stream.next().await {
//!     println!("{:?}", response?.data);
//! }
//! ```

mod http_transport;
mod operation;
mod protocol;
mod response;
mod subscription;

pub use http_transport::{CredentialsPolicy, HttpTransport};
pub use operation::{Operation, OperationKind, main_definition};
pub use protocol::{ClientMessage, ServerMessage, WireProtocol};
pub use response::{GraphQLError, GraphQLLocation, GraphQLResponse, PathSegment, join_path};
pub use subscription::{
    ConnectionParams, SubscriptionConfig, SubscriptionStream, SubscriptionTransport,
};
