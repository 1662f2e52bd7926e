use std::fmt;
use std::sync::Arc;

use graphlink_net::graphql::Operation;
use http::HeaderValue;
use http::header::AUTHORIZATION;

use super::{Forward, Link, ResponseStream};
use crate::context::ExecutionContext;
use crate::logging::targets;
use crate::storage::CredentialStore;

/// Sets the `authorization` header from the stored bearer token.
///
/// On the client the token under the credential key becomes
/// `Bearer <token>`. Without a token, and always on the server, the header
/// is set to the empty string rather than removed. The store is never
/// consulted on the server.
#[derive(Clone)]
pub struct ContextDecorator {
    context: ExecutionContext,
    store: Option<Arc<dyn CredentialStore>>,
    key: String,
}

impl ContextDecorator {
    /// Create a decorator reading `key` from `store`.
    pub fn new(
        context: ExecutionContext,
        store: Option<Arc<dyn CredentialStore>>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            context,
            store,
            key: key.into(),
        }
    }

    /// The current `authorization` value.
    pub fn authorization_value(&self) -> String {
        if self.context.is_server() {
            return String::new();
        }
        let Some(store) = &self.store else {
            return String::new();
        };
        match store.get(&self.key) {
            Ok(Some(token)) if !token.is_empty() => format!("Bearer {token}"),
            Ok(_) => String::new(),
            Err(err) => {
                tracing::debug!(target: targets::LINK, error = %err, "credential lookup failed");
                String::new()
            }
        }
    }

    /// Set `authorization` on `operation`, keeping every other header.
    pub fn decorate(&self, mut operation: Operation) -> Operation {
        let value = HeaderValue::try_from(self.authorization_value()).unwrap_or_else(|err| {
            tracing::debug!(target: targets::LINK, error = %err, "credential is not a valid header value");
            HeaderValue::from_static("")
        });
        operation.headers_mut().insert(AUTHORIZATION, value);
        operation
    }
}

impl Link for ContextDecorator {
    fn request(&self, operation: Operation, forward: Forward<'_>) -> ResponseStream {
        forward.run(self.decorate(operation))
    }
}

impl fmt::Debug for ContextDecorator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextDecorator")
            .field("context", &self.context)
            .field("has_store", &self.store.is_some())
            .field("key", &self.key)
            .finish()
    }
}
