//! The client facade: one cache and one link chain per instance.

use std::fmt;
use std::sync::Arc;

use futures_util::StreamExt;
use graphlink_net::graphql::{
    GraphQLResponse, HttpTransport, Operation, SubscriptionConfig, SubscriptionTransport,
};
use graphlink_net::http::HttpClient;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::cache::{CacheSnapshot, FragmentMatcher, InMemoryCache};
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::link::{
    ContextDecorator, DiagnosticSink, ErrorObserver, HttpLink, LinkChain, ResponseStream,
    TransportRouter, WebSocketLink,
};
use crate::logging::targets;
use crate::storage::CredentialStore;

/// Where a query looks for its result.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FetchPolicy {
    /// Answer from the cache when every field is present, otherwise fetch
    /// and cache the result.
    #[default]
    CacheFirst,
    /// Always fetch; cache the result.
    NetworkOnly,
    /// Answer from the cache or fail with [`Error::CacheMiss`].
    CacheOnly,
    /// Always fetch; leave the cache untouched.
    NoCache,
}

impl FetchPolicy {
    fn reads_cache(self) -> bool {
        matches!(self, Self::CacheFirst | Self::CacheOnly)
    }

    fn writes_cache(self) -> bool {
        matches!(self, Self::CacheFirst | Self::NetworkOnly)
    }
}

struct ClientInner {
    config: ClientConfig,
    cache: Mutex<InMemoryCache>,
    link: LinkChain,
}

impl ClientInner {
    /// Write an error-free result into the cache. Failures are logged; the
    /// caller still gets the response.
    fn store_result(&self, operation: &Operation, response: &GraphQLResponse) {
        if response.has_errors() {
            return;
        }
        let Some(data) = &response.data else {
            return;
        };
        if let Err(err) = self.cache.lock().write_query(operation, data) {
            tracing::warn!(target: targets::CLIENT, error = %err, "could not cache result");
        }
    }
}

/// A GraphQL client.
///
/// Cloning is cheap; clones share the cache and the link chain.
///
/// # Example
///
/// ```ignore
/// let config = ClientConfig::from_env()?;
/// let client = create_client(config, Some(Arc::new(MemoryStore::new())))?;
///
/// let response = client.query(Operation::new("{ viewer { id name } }")).await?;
/// println!("{:?}", response.data);
/// ```
#[derive(Clone)]
pub struct GraphQLClient {
    inner: Arc<ClientInner>,
}

impl GraphQLClient {
    /// Start building a client for `config`.
    pub fn builder(config: ClientConfig) -> GraphQLClientBuilder {
        GraphQLClientBuilder {
            config,
            store: None,
            matcher: FragmentMatcher::new(),
            sink: None,
        }
    }

    /// The configuration this client was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Whether the client renders on the server.
    pub fn ssr_mode(&self) -> bool {
        self.inner.config.ssr_mode()
    }

    /// Run a query with [`FetchPolicy::CacheFirst`].
    pub async fn query(&self, operation: Operation) -> Result<GraphQLResponse> {
        self.query_with_policy(operation, FetchPolicy::default()).await
    }

    /// Run a query with an explicit fetch policy.
    pub async fn query_with_policy(
        &self,
        operation: Operation,
        policy: FetchPolicy,
    ) -> Result<GraphQLResponse> {
        if policy.reads_cache() {
            let cached = match self.inner.cache.lock().read_query(&operation) {
                Ok(cached) => cached,
                Err(err) if policy == FetchPolicy::CacheOnly => return Err(err.into()),
                Err(err) => {
                    tracing::debug!(target: targets::CLIENT, error = %err, "cache read failed, fetching");
                    None
                }
            };
            if let Some(data) = cached {
                tracing::debug!(target: targets::CLIENT, ?policy, "answered from cache");
                return Ok(GraphQLResponse::from_data(data));
            }
            if policy == FetchPolicy::CacheOnly {
                return Err(Error::CacheMiss);
            }
        }

        let response = self.first_response(operation.clone()).await?;
        if policy.writes_cache() {
            self.inner.store_result(&operation, &response);
        }
        Ok(response)
    }

    /// Run a query and deserialize its data.
    ///
    /// GraphQL errors in the response become [`Error::GraphQL`].
    pub async fn query_as<T: DeserializeOwned>(&self, operation: Operation) -> Result<T> {
        let response = self.query(operation).await?;
        if response.has_errors() {
            return Err(Error::GraphQL(response.errors));
        }
        Ok(serde_json::from_value(response.data.unwrap_or(Value::Null))?)
    }

    /// Run a mutation over the network and cache its result.
    pub async fn mutate(&self, operation: Operation) -> Result<GraphQLResponse> {
        let response = self.first_response(operation.clone()).await?;
        self.inner.store_result(&operation, &response);
        Ok(response)
    }

    /// Start a subscription. Each error-free item is also written to the
    /// cache.
    pub fn subscribe(&self, operation: Operation) -> ResponseStream {
        let inner = Arc::clone(&self.inner);
        let written = operation.clone();
        self.inner
            .link
            .execute(operation)
            .inspect(move |item| {
                if let Ok(response) = item {
                    inner.store_result(&written, response);
                }
            })
            .boxed()
    }

    /// Run `operation` through the link chain without touching the cache.
    pub fn execute(&self, operation: Operation) -> ResponseStream {
        self.inner.link.execute(operation)
    }

    /// A snapshot of the cache, for handing to a client-side instance.
    pub fn extract(&self) -> CacheSnapshot {
        self.inner.cache.lock().extract()
    }

    /// Run `f` with the cache locked.
    pub fn cache<R>(&self, f: impl FnOnce(&mut InMemoryCache) -> R) -> R {
        f(&mut self.inner.cache.lock())
    }

    async fn first_response(&self, operation: Operation) -> Result<GraphQLResponse> {
        let mut stream = self.inner.link.execute(operation);
        match stream.next().await {
            Some(item) => Ok(item?),
            None => Err(Error::EmptyResponse),
        }
    }
}

impl fmt::Debug for GraphQLClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphQLClient")
            .field("config", &self.inner.config)
            .field("link", &self.inner.link)
            .finish()
    }
}

/// Builder for [`GraphQLClient`].
pub struct GraphQLClientBuilder {
    config: ClientConfig,
    store: Option<Arc<dyn CredentialStore>>,
    matcher: FragmentMatcher,
    sink: Option<Arc<dyn DiagnosticSink>>,
}

impl GraphQLClientBuilder {
    /// Read the bearer token from `store`.
    pub fn credential_store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Use `matcher` for fragments on unions and interfaces.
    pub fn fragment_matcher(mut self, matcher: FragmentMatcher) -> Self {
        self.matcher = matcher;
        self
    }

    /// Seed the cache with `snapshot` (client context only).
    pub fn initial_state(mut self, snapshot: CacheSnapshot) -> Self {
        self.config.initial_state = Some(snapshot);
        self
    }

    /// Send diagnostics to `sink` instead of the log.
    pub fn diagnostic_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Build the cache and the link chain.
    pub fn build(self) -> Result<GraphQLClient> {
        let Self {
            mut config,
            store,
            matcher,
            sink,
        } = self;

        let mut cache = InMemoryCache::new(matcher);
        if let Some(snapshot) = config.initial_state.take() {
            if config.context.is_client() {
                cache.restore(snapshot);
            } else {
                tracing::debug!(target: targets::CLIENT, "ignoring initial state on the server");
            }
        }

        let decorator = ContextDecorator::new(config.context, store, config.credential_key.clone());

        let http = HttpClient::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connection_timeout);
        let http = config.credentials.apply(http).build()?;
        let transport = HttpTransport::new(config.graphql_url.clone(), http)?;
        let mut router = TransportRouter::new(config.context, Arc::new(HttpLink::new(transport)));

        if config.streaming_enabled() {
            let params = decorator.clone();
            let subscriptions = SubscriptionConfig::new(config.streaming_url())
                .protocol(config.ws_protocol)
                .connection_timeout(config.connection_timeout)
                .keep_alive_interval(config.keep_alive_interval)
                .reconnect(config.reconnect.clone())
                .connection_params(move || {
                    Some(json!({ "authorization": params.authorization_value() }))
                });
            let transport = Arc::new(SubscriptionTransport::new(subscriptions));
            router = router.with_streaming(Arc::new(WebSocketLink::new(transport)));
        }

        let observer = match sink {
            Some(sink) => ErrorObserver::new(sink),
            None => ErrorObserver::default(),
        };
        let link = LinkChain::new().with(observer).with(decorator).with(router);

        tracing::debug!(
            target: targets::CLIENT,
            endpoint = %config.graphql_url,
            context = ?config.context,
            streaming = config.streaming_enabled(),
            "client ready"
        );

        Ok(GraphQLClient {
            inner: Arc::new(ClientInner {
                config,
                cache: Mutex::new(cache),
                link,
            }),
        })
    }
}

impl fmt::Debug for GraphQLClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphQLClientBuilder")
            .field("config", &self.config)
            .field("store", &self.store.is_some())
            .field("matcher", &self.matcher)
            .finish()
    }
}

/// Build a client for `config`, reading credentials from `store`.
pub fn create_client(
    config: ClientConfig,
    store: Option<Arc<dyn CredentialStore>>,
) -> Result<GraphQLClient> {
    let mut builder = GraphQLClient::builder(config);
    if let Some(store) = store {
        builder = builder.credential_store(store);
    }
    builder.build()
}
