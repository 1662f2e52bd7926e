//! The link chain: an ordered pipeline of request stages.
//!
//! Every stage implements [`Link`]. A stage may change the operation before
//! calling [`Forward::run`] and may observe the stream coming back, but it
//! never suppresses an item. The last stage is a terminal transport that
//! answers without forwarding.
//!
//! The client assembles:
//!
//! ```text
//! ErrorObserver -> ContextDecorator -> TransportRouter -> { HttpLink | WebSocketLink }
//! ```

mod auth;
mod error;
mod http;
mod router;
mod ws;

use std::sync::Arc;

use futures_util::StreamExt;
use futures_util::stream::{self, BoxStream};
use graphlink_net::NetworkError;
use graphlink_net::graphql::{GraphQLResponse, Operation};

pub use auth::ContextDecorator;
pub use error::{Diagnostic, DiagnosticSink, ErrorObserver, TracingSink};
pub use self::http::HttpLink;
pub use router::{Route, TransportRouter, route};
pub use ws::WebSocketLink;

/// The results of one operation: a single item for queries and mutations,
/// any number for subscriptions.
pub type ResponseStream = BoxStream<'static, graphlink_net::Result<GraphQLResponse>>;

/// A stage in the link chain.
pub trait Link: Send + Sync {
    /// Handle `operation`, usually by calling `forward.run` with a
    /// (possibly modified) operation.
    fn request(&self, operation: Operation, forward: Forward<'_>) -> ResponseStream;
}

/// The remainder of the chain after the current stage.
#[derive(Clone, Copy)]
pub struct Forward<'a> {
    links: &'a [Arc<dyn Link>],
}

impl<'a> Forward<'a> {
    /// Pass `operation` to the next stage.
    pub fn run(self, operation: Operation) -> ResponseStream {
        match self.links.split_first() {
            Some((link, rest)) => link.request(operation, Forward { links: rest }),
            None => stream::once(async {
                Err(NetworkError::Request(
                    "link chain has no terminating link".into(),
                ))
            })
            .boxed(),
        }
    }

    /// Whether this is the end of the chain.
    pub fn is_end(&self) -> bool {
        self.links.is_empty()
    }
}

/// An ordered sequence of links.
#[derive(Clone, Default)]
pub struct LinkChain {
    links: Vec<Arc<dyn Link>>,
}

impl LinkChain {
    /// Create an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage.
    pub fn with(mut self, link: impl Link + 'static) -> Self {
        self.links.push(Arc::new(link));
        self
    }

    /// Append a shared stage.
    pub fn with_shared(mut self, link: Arc<dyn Link>) -> Self {
        self.links.push(link);
        self
    }

    /// Number of stages.
    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// Whether the chain has no stages.
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Run `operation` through every stage.
    pub fn execute(&self, operation: Operation) -> ResponseStream {
        Forward { links: &self.links }.run(operation)
    }
}

impl std::fmt::Debug for LinkChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkChain")
            .field("len", &self.links.len())
            .finish()
    }
}
