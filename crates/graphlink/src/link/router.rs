use std::fmt;
use std::sync::Arc;

use graphlink_net::graphql::{Operation, OperationKind};

use super::{Forward, Link, ResponseStream};
use crate::context::ExecutionContext;
use crate::logging::targets;

/// The transport chosen for one operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Route {
    /// The persistent WebSocket connection.
    Streaming,
    /// A single HTTP request.
    RequestResponse,
}

/// Choose the transport for an operation of `kind`.
///
/// Only subscriptions stream, and only on the client with streaming enabled.
pub fn route(kind: OperationKind, streaming_enabled: bool, context: ExecutionContext) -> Route {
    match (kind, streaming_enabled, context) {
        (OperationKind::Subscription, true, ExecutionContext::Client) => Route::Streaming,
        _ => Route::RequestResponse,
    }
}

/// Terminal stage that sends each operation to exactly one transport.
#[derive(Clone)]
pub struct TransportRouter {
    context: ExecutionContext,
    streaming: Option<Arc<dyn Link>>,
    request_response: Arc<dyn Link>,
}

impl TransportRouter {
    /// A router that sends everything over `request_response`.
    pub fn new(context: ExecutionContext, request_response: Arc<dyn Link>) -> Self {
        Self {
            context,
            streaming: None,
            request_response,
        }
    }

    /// Route subscriptions to `streaming`.
    pub fn with_streaming(mut self, streaming: Arc<dyn Link>) -> Self {
        self.streaming = Some(streaming);
        self
    }

    /// Whether a streaming transport is installed.
    pub fn streaming_enabled(&self) -> bool {
        self.streaming.is_some()
    }

    /// The route `operation` takes.
    pub fn route(&self, operation: &Operation) -> Route {
        route(operation.kind(), self.streaming_enabled(), self.context)
    }
}

impl Link for TransportRouter {
    fn request(&self, operation: Operation, forward: Forward<'_>) -> ResponseStream {
        let decision = self.route(&operation);
        tracing::debug!(
            target: targets::LINK,
            kind = %operation.kind(),
            route = ?decision,
            "routing operation"
        );
        let transport = match (decision, &self.streaming) {
            (Route::Streaming, Some(streaming)) => streaming,
            _ => &self.request_response,
        };
        transport.request(operation, forward)
    }
}

impl fmt::Debug for TransportRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportRouter")
            .field("context", &self.context)
            .field("streaming", &self.streaming_enabled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use futures_util::stream;
    use graphlink_net::GraphQLResponse;
    use serde_json::json;

    struct Named(&'static str);

    impl Link for Named {
        fn request(&self, _operation: Operation, _forward: Forward<'_>) -> ResponseStream {
            let name = self.0;
            stream::once(async move { Ok(GraphQLResponse::from_data(json!(name))) }).boxed()
        }
    }

    #[test]
    fn test_route_table() {
        let kinds = [
            OperationKind::Query,
            OperationKind::Mutation,
            OperationKind::Subscription,
        ];
        let contexts = [ExecutionContext::Server, ExecutionContext::Client];

        for kind in kinds {
            for enabled in [false, true] {
                for context in contexts {
                    let expected = if kind == OperationKind::Subscription
                        && enabled
                        && context == ExecutionContext::Client
                    {
                        Route::Streaming
                    } else {
                        Route::RequestResponse
                    };
                    assert_eq!(route(kind, enabled, context), expected);
                    // Same inputs, same answer.
                    assert_eq!(route(kind, enabled, context), expected);
                }
            }
        }
    }

    async fn answer(router: &TransportRouter, document: &str) -> serde_json::Value {
        let mut stream = router.request(Operation::new(document), Forward { links: &[] });
        stream.next().await.unwrap().unwrap().data.unwrap()
    }

    #[tokio::test]
    async fn test_dispatch() {
        let router = TransportRouter::new(ExecutionContext::Client, Arc::new(Named("http")))
            .with_streaming(Arc::new(Named("ws")));

        assert_eq!(answer(&router, "subscription { a }").await, json!("ws"));
        assert_eq!(answer(&router, "query { a }").await, json!("http"));
        assert_eq!(answer(&router, "mutation { a }").await, json!("http"));
        assert_eq!(
            answer(&router, "fragment F on Query { a } subscription S { ...F }").await,
            json!("ws")
        );
    }

    #[tokio::test]
    async fn test_without_streaming_everything_uses_http() {
        let router = TransportRouter::new(ExecutionContext::Client, Arc::new(Named("http")));
        assert_eq!(router.route(&Operation::new("subscription { a }")), Route::RequestResponse);
        assert_eq!(answer(&router, "subscription { a }").await, json!("http"));
    }

    #[tokio::test]
    async fn test_server_context_never_streams() {
        let router = TransportRouter::new(ExecutionContext::Server, Arc::new(Named("http")))
            .with_streaming(Arc::new(Named("ws")));
        assert_eq!(answer(&router, "subscription { a }").await, json!("http"));
    }
}
