use std::fmt;
use std::sync::Arc;

use futures_util::StreamExt;
use graphlink_net::NetworkError;
use graphlink_net::graphql::{GraphQLError, GraphQLLocation, Operation, PathSegment, join_path};

use super::{Forward, Link, ResponseStream};
use crate::logging::targets;

/// One observed failure.
#[derive(Clone, Debug, PartialEq)]
pub enum Diagnostic {
    /// An error the server reported inside a response.
    GraphQL {
        message: String,
        locations: Vec<GraphQLLocation>,
        path: Vec<PathSegment>,
    },
    /// A transport failure.
    Network { message: String },
}

impl From<&GraphQLError> for Diagnostic {
    fn from(error: &GraphQLError) -> Self {
        Self::GraphQL {
            message: error.message.clone(),
            locations: error.locations.clone(),
            path: error.path.clone().unwrap_or_default(),
        }
    }
}

impl From<&NetworkError> for Diagnostic {
    fn from(error: &NetworkError) -> Self {
        Self::Network {
            message: error.to_string(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GraphQL {
                message,
                locations,
                path,
            } => {
                let locations = locations
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(
                    f,
                    "[GraphQL error]: Message: {message}, Location: {locations}, Path: {}",
                    join_path(path)
                )
            }
            Self::Network { message } => write!(f, "[Network error]: {message}"),
        }
    }
}

/// Receives diagnostics from an [`ErrorObserver`].
pub trait DiagnosticSink: Send + Sync {
    /// Record one diagnostic.
    fn emit(&self, diagnostic: &Diagnostic);
}

/// Logs diagnostics with `tracing::warn!` under `graphlink::link`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn emit(&self, diagnostic: &Diagnostic) {
        tracing::warn!(target: targets::LINK, "{diagnostic}");
    }
}

/// Reports every error flowing back through the chain, then passes it on
/// unchanged.
#[derive(Clone)]
pub struct ErrorObserver {
    sink: Arc<dyn DiagnosticSink>,
}

impl ErrorObserver {
    /// Observe into `sink`.
    pub fn new(sink: Arc<dyn DiagnosticSink>) -> Self {
        Self { sink }
    }

    /// Report the errors carried by one item.
    pub fn observe(&self, item: &graphlink_net::Result<graphlink_net::GraphQLResponse>) {
        match item {
            Ok(response) => {
                for error in &response.errors {
                    self.sink.emit(&Diagnostic::from(error));
                }
            }
            Err(error) => self.sink.emit(&Diagnostic::from(error)),
        }
    }
}

impl Default for ErrorObserver {
    fn default() -> Self {
        Self::new(Arc::new(TracingSink))
    }
}

impl Link for ErrorObserver {
    fn request(&self, operation: Operation, forward: Forward<'_>) -> ResponseStream {
        let observer = self.clone();
        forward
            .run(operation)
            .inspect(move |item| observer.observe(item))
            .boxed()
    }
}

impl fmt::Debug for ErrorObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorObserver").finish_non_exhaustive()
    }
}
