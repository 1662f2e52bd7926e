//! graphlink - a GraphQL client runtime.
//!
//! A [`GraphQLClient`] owns a normalized [`InMemoryCache`] and a link chain
//! that every operation passes through:
//!
//! 1. [`ErrorObserver`](link::ErrorObserver) reports GraphQL and network
//!    errors without altering the results.
//! 2. [`ContextDecorator`](link::ContextDecorator) sets the `authorization`
//!    header from the credential store.
//! 3. [`TransportRouter`](link::TransportRouter) sends subscriptions over a
//!    shared WebSocket connection (client context, streaming enabled) and
//!    everything else over HTTP.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use graphlink::{ClientConfig, MemoryStore, Operation, create_client};
//!
//! # async fn run() -> graphlink::Result<()> {
//! let store = Arc::new(MemoryStore::new());
//! store.set("id_token", "abc123");
//!
//! let client = create_client(ClientConfig::from_env()?, Some(store))?;
//! let response = client
//!     .query(Operation::new("{ hn { topStories(limit: 3) { title } } }"))
//!     .await?;
//! println!("{:?}", response.data);
//! # Ok(())
//! # }
//! ```
//!
//! A server render hands its cache to the browser with
//! [`CacheSnapshot::to_handoff_script`]; the client instance restores it
//! through [`ClientConfig::initial_state`].

pub mod cache;
mod client;
pub mod config;
mod context;
mod error;
pub mod link;
pub mod logging;
pub mod storage;

pub use cache::{CacheError, CacheSnapshot, FragmentMatcher, InMemoryCache, SNAPSHOT_GLOBAL};
pub use client::{FetchPolicy, GraphQLClient, GraphQLClientBuilder, create_client};
pub use config::{ClientConfig, ClientConfigBuilder};
pub use context::ExecutionContext;
pub use error::{Error, Result};
pub use storage::{CredentialStore, FileStore, MemoryStore, StorageError};

pub use graphlink_net::graphql::{
    CredentialsPolicy, GraphQLError, GraphQLResponse, Operation, OperationKind, WireProtocol,
};
pub use graphlink_net::websocket::ReconnectConfig;
pub use graphlink_net::NetworkError;
