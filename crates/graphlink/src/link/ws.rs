use std::sync::Arc;

use futures_util::StreamExt;
use futures_util::stream;
use graphlink_net::graphql::{Operation, SubscriptionTransport};

use super::{Forward, Link, ResponseStream};

/// Terminal stage registering each operation on the shared subscription
/// connection.
#[derive(Clone, Debug)]
pub struct WebSocketLink {
    transport: Arc<SubscriptionTransport>,
}

impl WebSocketLink {
    /// Wrap `transport`.
    pub fn new(transport: Arc<SubscriptionTransport>) -> Self {
        Self { transport }
    }

    /// The underlying transport.
    pub fn transport(&self) -> &SubscriptionTransport {
        &self.transport
    }
}

impl Link for WebSocketLink {
    fn request(&self, operation: Operation, _forward: Forward<'_>) -> ResponseStream {
        match self.transport.subscribe(&operation) {
            Ok(subscription) => subscription.boxed(),
            Err(err) => stream::once(async move { Err(err) }).boxed(),
        }
    }
}
