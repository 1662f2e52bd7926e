//! Request/response transport: GraphQL over HTTP POST.

use serde::{Deserialize, Serialize};

use super::operation::Operation;
use super::response::GraphQLResponse;
use crate::error::{NetworkError, Result};
use crate::http::{HttpClient, HttpClientBuilder};

/// Whether cookies travel with GraphQL requests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CredentialsPolicy {
    /// Never store or send cookies.
    Omit,
    /// Send cookies back to the origin that set them.
    #[default]
    SameOrigin,
    /// Send cookies on every request, including cross-origin endpoints.
    Include,
}

impl CredentialsPolicy {
    /// Whether the HTTP client keeps a cookie store.
    ///
    /// The cookie store already scopes cookies to the domain that set them,
    /// so `SameOrigin` and `Include` both enable it.
    pub fn uses_cookies(self) -> bool {
        !matches!(self, Self::Omit)
    }

    /// Configure `builder` for this policy.
    pub fn apply(self, builder: HttpClientBuilder) -> HttpClientBuilder {
        builder.cookies(self.uses_cookies())
    }
}

/// Sends operations as JSON POST requests to a fixed endpoint.
///
/// # Example
///
/// ```ignore
/// let transport = HttpTransport::new("https://api.example.com/graphql", HttpClient::new()?)?;
/// let response = transport.execute(&Operation::new("{ viewer { id } }")).await?;
/// ```
#[derive(Clone, Debug)]
pub struct HttpTransport {
    endpoint: String,
    client: HttpClient,
}

impl HttpTransport {
    /// Create a transport for `endpoint` using `client`.
    pub fn new(endpoint: impl Into<String>, client: HttpClient) -> Result<Self> {
        let endpoint = endpoint.into();
        url::Url::parse(&endpoint)?;
        Ok(Self { endpoint, client })
    }

    /// The GraphQL endpoint URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Execute `operation` and parse the GraphQL response.
    ///
    /// Non-2xx statuses fail with [`NetworkError::HttpStatus`] carrying the
    /// body text. Errors reported inside a 2xx body are returned in
    /// [`GraphQLResponse::errors`].
    pub async fn execute(&self, operation: &Operation) -> Result<GraphQLResponse> {
        tracing::debug!(
            target: "graphlink_net::http",
            endpoint = %self.endpoint,
            kind = %operation.kind(),
            operation = operation.operation_name.as_deref().unwrap_or(""),
            "executing operation"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .header(http::header::CONTENT_TYPE, "application/json")
            .header(http::header::ACCEPT, "application/json")
            .headers(operation.headers())
            .json(operation)
            .send()
            .await?
            .error_for_status_with_body()
            .await?;

        response.json::<GraphQLResponse>().await.map_err(|err| match err {
            NetworkError::Json(message) => {
                NetworkError::Json(format!("not a GraphQL response: {message}"))
            }
            other => other,
        })
    }
}
