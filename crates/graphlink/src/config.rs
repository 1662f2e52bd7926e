//! Client configuration.
//!
//! Configuration is explicit: a [`ClientConfig`] is built with
//! [`ClientConfig::builder`] or read from the environment with
//! [`ClientConfig::from_env`].
//!
//! | Variable           | Meaning                                   | Default                          |
//! |--------------------|-------------------------------------------|----------------------------------|
//! | `GRAPHQL`          | GraphQL endpoint URL                      | `https://graphqlhub.com/graphql` |
//! | `WS_SUBSCRIPTIONS` | Send subscriptions over WebSocket         | off                              |
//! | `SERVER`           | Run in the server (rendering) context     | off                              |

use std::time::Duration;

use graphlink_net::graphql::{CredentialsPolicy, WireProtocol};
use graphlink_net::websocket::ReconnectConfig;

use crate::cache::CacheSnapshot;
use crate::context::ExecutionContext;
use crate::error::{Error, Result};

/// Endpoint used when `GRAPHQL` is unset.
pub const DEFAULT_GRAPHQL_URL: &str = "https://graphqlhub.com/graphql";

/// Storage key of the bearer token.
pub const DEFAULT_CREDENTIAL_KEY: &str = "id_token";

/// Environment variable naming the GraphQL endpoint.
pub const ENV_GRAPHQL: &str = "GRAPHQL";
/// Environment variable enabling WebSocket subscriptions.
pub const ENV_WS_SUBSCRIPTIONS: &str = "WS_SUBSCRIPTIONS";
/// Environment variable selecting the server context.
pub const ENV_SERVER: &str = "SERVER";

/// Configuration for a [`GraphQLClient`](crate::GraphQLClient).
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// GraphQL endpoint for queries and mutations.
    pub graphql_url: String,
    /// Explicit WebSocket endpoint. Derived from `graphql_url` when unset.
    pub websocket_url: Option<String>,
    /// Where the client runs.
    pub context: ExecutionContext,
    /// Whether subscriptions travel over WebSocket.
    pub ws_subscriptions: bool,
    /// Storage key of the bearer token.
    pub credential_key: String,
    /// Cookie policy for HTTP requests.
    pub credentials: CredentialsPolicy,
    /// HTTP request timeout.
    pub request_timeout: Duration,
    /// Timeout for opening a connection (HTTP connect, WebSocket handshake
    /// and `connection_ack`).
    pub connection_timeout: Duration,
    /// WebSocket ping interval (`graphql-transport-ws` only).
    pub keep_alive_interval: Option<Duration>,
    /// WebSocket reconnection policy. `None` disables reconnection.
    pub reconnect: Option<ReconnectConfig>,
    /// WebSocket wire protocol.
    pub ws_protocol: WireProtocol,
    /// Cache snapshot to restore on startup (client context only).
    pub initial_state: Option<CacheSnapshot>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            graphql_url: DEFAULT_GRAPHQL_URL.to_owned(),
            websocket_url: None,
            context: ExecutionContext::default(),
            ws_subscriptions: false,
            credential_key: DEFAULT_CREDENTIAL_KEY.to_owned(),
            credentials: CredentialsPolicy::default(),
            request_timeout: Duration::from_secs(30),
            connection_timeout: Duration::from_secs(10),
            keep_alive_interval: Some(Duration::from_secs(30)),
            reconnect: Some(ReconnectConfig::default()),
            ws_protocol: WireProtocol::default(),
            initial_state: None,
        }
    }
}

impl ClientConfig {
    /// Create a builder with default settings.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`, which maps a variable name to
    /// its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut builder = Self::builder();

        if let Some(url) = lookup(ENV_GRAPHQL).filter(|url| !url.trim().is_empty()) {
            builder = builder.graphql_url(url.trim());
        }
        if let Some(value) = lookup(ENV_WS_SUBSCRIPTIONS) {
            builder = builder.ws_subscriptions(parse_flag(ENV_WS_SUBSCRIPTIONS, &value)?);
        }
        if let Some(value) = lookup(ENV_SERVER) {
            builder = builder.context(ExecutionContext::from_server_flag(parse_flag(
                ENV_SERVER, &value,
            )?));
        }

        builder.build()
    }

    /// The WebSocket endpoint.
    ///
    /// Without an explicit `websocket_url`, the scheme of `graphql_url` is
    /// substituted: `http` becomes `ws` and `https` becomes `wss`.
    pub fn streaming_url(&self) -> String {
        if let Some(url) = &self.websocket_url {
            return url.clone();
        }
        let Ok(mut url) = url::Url::parse(&self.graphql_url) else {
            return self.graphql_url.clone();
        };
        let scheme = match url.scheme() {
            "https" => "wss",
            "http" => "ws",
            _ => return self.graphql_url.clone(),
        };
        if url.set_scheme(scheme).is_err() {
            return self.graphql_url.clone();
        }
        url.into()
    }

    /// Whether a streaming transport is constructed at all.
    pub fn streaming_enabled(&self) -> bool {
        self.ws_subscriptions && self.context.is_client()
    }

    /// Whether this configuration renders on the server.
    pub fn ssr_mode(&self) -> bool {
        self.context.is_server()
    }
}

/// Parse a boolean-like environment value.
///
/// `1`, `true`, `yes` and `on` are true; `0`, `false`, `no`, `off` and the
/// empty string are false. Case is ignored.
pub fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        other => Err(Error::invalid_config(
            key,
            format!("expected a boolean, got '{other}'"),
        )),
    }
}

/// Builder for [`ClientConfig`].
#[derive(Clone, Debug, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Set the GraphQL endpoint.
    pub fn graphql_url(mut self, url: impl Into<String>) -> Self {
        self.config.graphql_url = url.into();
        self
    }

    /// Set an explicit WebSocket endpoint.
    pub fn websocket_url(mut self, url: impl Into<String>) -> Self {
        self.config.websocket_url = Some(url.into());
        self
    }

    /// Set the execution context.
    pub fn context(mut self, context: ExecutionContext) -> Self {
        self.config.context = context;
        self
    }

    /// Enable or disable WebSocket subscriptions.
    pub fn ws_subscriptions(mut self, enabled: bool) -> Self {
        self.config.ws_subscriptions = enabled;
        self
    }

    /// Set the storage key of the bearer token.
    pub fn credential_key(mut self, key: impl Into<String>) -> Self {
        self.config.credential_key = key.into();
        self
    }

    /// Set the cookie policy.
    pub fn credentials(mut self, policy: CredentialsPolicy) -> Self {
        self.config.credentials = policy;
        self
    }

    /// Set the HTTP request timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Set the connection timeout.
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.config.connection_timeout = timeout;
        self
    }

    /// Set or disable the WebSocket ping interval.
    pub fn keep_alive_interval(mut self, interval: Option<Duration>) -> Self {
        self.config.keep_alive_interval = interval;
        self
    }

    /// Set the WebSocket reconnection policy.
    pub fn reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.config.reconnect = Some(reconnect);
        self
    }

    /// Disable WebSocket reconnection.
    pub fn no_reconnect(mut self) -> Self {
        self.config.reconnect = None;
        self
    }

    /// Set the WebSocket wire protocol.
    pub fn ws_protocol(mut self, protocol: WireProtocol) -> Self {
        self.config.ws_protocol = protocol;
        self
    }

    /// Set the cache snapshot restored on startup.
    pub fn initial_state(mut self, snapshot: CacheSnapshot) -> Self {
        self.config.initial_state = Some(snapshot);
        self
    }

    /// Validate and build the configuration.
    pub fn build(self) -> Result<ClientConfig> {
        let config = self.config;
        validate_url(ENV_GRAPHQL, &config.graphql_url, &["http", "https"])?;
        if let Some(url) = &config.websocket_url {
            validate_url("websocket_url", url, &["ws", "wss"])?;
        }
        Ok(config)
    }
}

fn validate_url(key: &str, value: &str, schemes: &[&str]) -> Result<()> {
    let url = url::Url::parse(value).map_err(|e| Error::invalid_config(key, e.to_string()))?;
    if schemes.contains(&url.scheme()) {
        Ok(())
    } else {
        Err(Error::invalid_config(
            key,
            format!("unsupported scheme '{}'", url.scheme()),
        ))
    }
}
