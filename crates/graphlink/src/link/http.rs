use futures_util::StreamExt;
use futures_util::stream;
use graphlink_net::graphql::{HttpTransport, Operation};

use super::{Forward, Link, ResponseStream};

/// Terminal stage sending each operation as one HTTP request.
#[derive(Clone, Debug)]
pub struct HttpLink {
    transport: HttpTransport,
}

impl HttpLink {
    /// Wrap `transport`.
    pub fn new(transport: HttpTransport) -> Self {
        Self { transport }
    }

    /// The underlying transport.
    pub fn transport(&self) -> &HttpTransport {
        &self.transport
    }
}

impl Link for HttpLink {
    fn request(&self, operation: Operation, _forward: Forward<'_>) -> ResponseStream {
        let transport = self.transport.clone();
        stream::once(async move { transport.execute(&operation).await }).boxed()
    }
}
