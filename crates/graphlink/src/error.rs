//! Error types for the client.

use graphlink_net::NetworkError;
use graphlink_net::graphql::GraphQLError;

use crate::cache::CacheError;

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by [`GraphQLClient`](crate::GraphQLClient).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The transport failed.
    #[error(transparent)]
    Network(#[from] NetworkError),

    /// The server answered with GraphQL errors.
    #[error("GraphQL error: {}", join_messages(.0))]
    GraphQL(Vec<GraphQLError>),

    /// Invalid configuration value.
    #[error("Invalid configuration for '{key}': {message}")]
    InvalidConfig { key: String, message: String },

    /// A cache-only query found nothing in the cache.
    #[error("No cached result for cache-only query")]
    CacheMiss,

    /// The link chain finished without producing a result.
    #[error("Link chain produced no response")]
    EmptyResponse,

    /// The cache could not process a document.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Response data did not match the requested type.
    #[error("Failed to deserialize response data: {0}")]
    Deserialize(#[from] serde_json::Error),
}

impl Error {
    /// Create a configuration error.
    pub fn invalid_config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            key: key.into(),
            message: message.into(),
        }
    }
}

fn join_messages(errors: &[GraphQLError]) -> String {
    errors
        .iter()
        .map(|error| error.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}
