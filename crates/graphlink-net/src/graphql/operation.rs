//! GraphQL operations and main-definition classification.

use std::collections::HashMap;
use std::sync::Arc;

use async_graphql_parser::types::{DocumentOperations, ExecutableDocument, OperationDefinition};
use async_graphql_parser::types::OperationType;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The kind of a GraphQL operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    /// A query operation (read-only).
    #[default]
    Query,
    /// A mutation operation (modifies data).
    Mutation,
    /// A subscription operation (real-time updates).
    Subscription,
}

impl From<OperationType> for OperationKind {
    fn from(ty: OperationType) -> Self {
        match ty {
            OperationType::Query => Self::Query,
            OperationType::Mutation => Self::Mutation,
            OperationType::Subscription => Self::Subscription,
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Query => write!(f, "query"),
            Self::Mutation => write!(f, "mutation"),
            Self::Subscription => write!(f, "subscription"),
        }
    }
}

/// A single GraphQL request: document, variables and per-operation headers.
///
/// The document is parsed once on construction. Its kind is taken from the
/// *main definition*: the operation selected by [`operation_name`] when the
/// document holds several, otherwise the first operation in source order.
/// A document that does not parse classifies as a query, which leaves the
/// server to report the syntax error.
///
/// # Example
///
/// ```ignore
/// let operation = Operation::new("query User($id: ID!) { user(id: $id) { id name } }")
///     .variable("id", "123")
///     .header("x-request-id", "abc");
/// assert_eq!(operation.kind(), OperationKind::Query);
/// ```
///
/// [`operation_name`]: Operation::operation_name
#[derive(Debug, Clone, Serialize)]
pub struct Operation {
    /// The GraphQL document text.
    pub query: String,

    /// Variables for the operation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<Value>,

    /// Operation name (for documents with multiple operations).
    #[serde(skip_serializing_if = "Option::is_none", rename = "operationName")]
    pub operation_name: Option<String>,

    /// Extensions (implementation-specific metadata).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Value>,

    #[serde(skip)]
    headers: http::HeaderMap,

    #[serde(skip)]
    document: Option<Arc<ExecutableDocument>>,
}

impl Operation {
    /// Create an operation from a document string.
    pub fn new(query: impl Into<String>) -> Self {
        let query = query.into();
        let document = match async_graphql_parser::parse_query(&query) {
            Ok(document) => Some(Arc::new(document)),
            Err(err) => {
                tracing::debug!(target: "graphlink_net::graphql", error = %err, "document did not parse");
                None
            }
        };
        Self {
            query,
            variables: None,
            operation_name: None,
            extensions: None,
            headers: http::HeaderMap::new(),
            document,
        }
    }

    /// Set a variable value.
    pub fn variable(mut self, name: impl Into<String>, value: impl Serialize) -> Self {
        let variables = self
            .variables
            .get_or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(map) = variables
            && let Ok(value) = serde_json::to_value(value)
        {
            map.insert(name.into(), value);
        }
        self
    }

    /// Set all variables from a serializable value.
    pub fn variables(mut self, variables: impl Serialize) -> Self {
        self.variables = serde_json::to_value(variables).ok();
        self
    }

    /// Set variables from a HashMap.
    pub fn variables_map(mut self, variables: HashMap<String, Value>) -> Self {
        self.variables = Some(Value::Object(variables.into_iter().collect()));
        self
    }

    /// Set the operation name.
    pub fn operation_name(mut self, name: impl Into<String>) -> Self {
        self.operation_name = Some(name.into());
        self
    }

    /// Set extensions.
    pub fn extensions(mut self, extensions: impl Serialize) -> Self {
        self.extensions = serde_json::to_value(extensions).ok();
        self
    }

    /// Add a header sent with this operation.
    ///
    /// Invalid names or values are dropped with a warning.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        match (
            http::HeaderName::try_from(name),
            http::HeaderValue::try_from(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            _ => {
                tracing::warn!(target: "graphlink_net::graphql", header = name, "dropping invalid operation header");
            }
        }
        self
    }

    /// Headers sent with this operation.
    pub fn headers(&self) -> &http::HeaderMap {
        &self.headers
    }

    /// Mutable access to the headers sent with this operation.
    pub fn headers_mut(&mut self) -> &mut http::HeaderMap {
        &mut self.headers
    }

    /// The parsed document, if the text is valid GraphQL.
    pub fn document(&self) -> Option<&ExecutableDocument> {
        self.document.as_deref()
    }

    /// The operation definition this request executes.
    pub fn main_definition(&self) -> Option<&OperationDefinition> {
        main_definition(self.document()?, self.operation_name.as_deref())
    }

    /// The kind of the main definition.
    pub fn kind(&self) -> OperationKind {
        self.main_definition()
            .map(|definition| definition.ty.into())
            .unwrap_or_default()
    }

    /// Check if this is a subscription.
    pub fn is_subscription(&self) -> bool {
        self.kind() == OperationKind::Subscription
    }

    /// Variables as a JSON object (empty when unset or not an object).
    pub fn variables_object(&self) -> Map<String, Value> {
        match &self.variables {
            Some(Value::Object(map)) => map.clone(),
            _ => Map::new(),
        }
    }
}

/// Select the operation a document executes.
///
/// With several operations, `operation_name` picks one; without a name the
/// first operation in source order wins.
pub fn main_definition<'a>(
    document: &'a ExecutableDocument,
    operation_name: Option<&str>,
) -> Option<&'a OperationDefinition> {
    match &document.operations {
        DocumentOperations::Single(operation) => Some(&operation.node),
        DocumentOperations::Multiple(operations) => match operation_name {
            Some(name) => operations
                .iter()
                .find(|(candidate, _)| candidate.as_str() == name)
                .map(|(_, operation)| &operation.node),
            None => operations
                .values()
                .min_by_key(|operation| (operation.pos.line, operation.pos.column))
                .map(|operation| &operation.node),
        },
    }
}
