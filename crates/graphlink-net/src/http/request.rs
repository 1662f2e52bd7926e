//! HTTP request types and builder.

use std::time::Duration;

use serde::Serialize;

use super::client::HttpClient;
use super::response::HttpResponse;
use crate::error::Result;

/// HTTP request methods.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    /// HTTP GET method.
    Get,
    /// HTTP POST method.
    Post,
}

impl HttpMethod {
    pub(crate) fn to_reqwest(self) -> reqwest::Method {
        match self {
            Self::Get => reqwest::Method::GET,
            Self::Post => reqwest::Method::POST,
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Post => write!(f, "POST"),
        }
    }
}

/// The body of an HTTP request.
#[derive(Clone, Debug, Default)]
pub enum RequestBody {
    /// No body.
    #[default]
    None,
    /// JSON body (serialized from a value).
    Json(serde_json::Value),
}

/// A built HTTP request ready to be sent.
#[derive(Debug)]
pub struct HttpRequest {
    /// The HTTP method.
    pub method: HttpMethod,
    /// The request URL.
    pub url: String,
    /// Request headers.
    pub headers: http::HeaderMap,
    /// Request body.
    pub body: RequestBody,
    /// Request timeout override.
    pub timeout: Option<Duration>,
}

/// Builder for constructing HTTP requests.
pub struct HttpRequestBuilder {
    client: HttpClient,
    method: HttpMethod,
    url: String,
    headers: http::HeaderMap,
    body: RequestBody,
    timeout: Option<Duration>,
}

impl HttpRequestBuilder {
    pub(crate) fn new(client: HttpClient, method: HttpMethod, url: String) -> Self {
        Self {
            client,
            method,
            url,
            headers: http::HeaderMap::new(),
            body: RequestBody::None,
            timeout: None,
        }
    }

    /// Add a header to the request.
    ///
    /// Invalid names or values are dropped with a warning.
    pub fn header(
        mut self,
        name: impl TryInto<http::HeaderName>,
        value: impl TryInto<http::HeaderValue>,
    ) -> Self {
        match (name.try_into(), value.try_into()) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            _ => {
                tracing::warn!(target: "graphlink_net::http", url = %self.url, "dropping invalid request header");
            }
        }
        self
    }

    /// Add multiple headers to the request. Later values replace earlier ones.
    pub fn headers(mut self, headers: &http::HeaderMap) -> Self {
        for (name, value) in headers {
            self.headers.insert(name.clone(), value.clone());
        }
        self
    }

    /// Set a JSON body from a serializable value.
    pub fn json<T: Serialize>(mut self, body: &T) -> Self {
        match serde_json::to_value(body) {
            Ok(value) => self.body = RequestBody::Json(value),
            Err(e) => {
                tracing::error!(target: "graphlink_net::http", "Failed to serialize JSON body: {}", e);
            }
        }
        self
    }

    /// Set a timeout for this specific request.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the request without sending it.
    pub fn build(self) -> HttpRequest {
        HttpRequest {
            method: self.method,
            url: self.url,
            headers: self.headers,
            body: self.body,
            timeout: self.timeout,
        }
    }

    /// Send the request and wait for the response.
    pub async fn send(self) -> Result<HttpResponse> {
        let client = self.client.clone();
        let request = self.build();

        let url = url::Url::parse(&request.url)?;

        let mut req_builder = client
            .reqwest_client()
            .request(request.method.to_reqwest(), url)
            .headers(request.headers);

        if let Some(timeout) = request.timeout {
            req_builder = req_builder.timeout(timeout);
        }

        if let RequestBody::Json(value) = request.body {
            req_builder = req_builder.json(&value);
        }

        tracing::trace!(target: "graphlink_net::http", method = %request.method, "sending request");
        let response = req_builder.send().await?;
        Ok(HttpResponse::from_reqwest(response))
    }
}
