//! Error types for the transport layer.

/// Transport-level errors.
///
/// These cover everything that can go wrong between handing an operation to
/// a transport and getting a well-formed GraphQL response back. Errors the
/// server reports inside a response body are not transport errors; they are
/// carried in [`GraphQLResponse::errors`](crate::graphql::GraphQLResponse).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NetworkError {
    /// HTTP request failed.
    #[error("HTTP request error: {0}")]
    Request(String),
    /// Invalid URL provided.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    /// Request or connection attempt timed out.
    #[error("Request timed out")]
    Timeout,
    /// Connection refused or failed.
    #[error("Connection error: {0}")]
    Connection(String),
    /// Invalid header name or value.
    #[error("Invalid header: {0}")]
    InvalidHeader(String),
    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(String),
    /// Invalid response body.
    #[error("Invalid response body: {0}")]
    InvalidBody(String),
    /// HTTP error status (4xx or 5xx).
    #[error("{}", http_status_message(.status, .message))]
    HttpStatus {
        /// The HTTP status code.
        status: u16,
        /// Optional error message from the response body.
        message: Option<String>,
    },
    /// Redirect limit exceeded.
    #[error("Too many redirects")]
    TooManyRedirects,
    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(String),
    /// The subscription server violated the wire protocol or rejected the
    /// connection.
    #[error("Subscription protocol error: {0}")]
    Protocol(String),
    /// The streaming connection closed and will not be re-established.
    #[error("Connection closed")]
    ConnectionClosed,
}

fn http_status_message(status: &u16, message: &Option<String>) -> String {
    match message {
        Some(msg) if !msg.is_empty() => format!("HTTP {status}: {msg}"),
        _ => format!("HTTP {status}"),
    }
}

impl From<reqwest::Error> for NetworkError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Connection(err.to_string())
        } else if err.is_redirect() {
            Self::TooManyRedirects
        } else if err.is_decode() {
            Self::Json(err.to_string())
        } else {
            Self::Request(err.to_string())
        }
    }
}

impl From<url::ParseError> for NetworkError {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidUrl(err.to_string())
    }
}

impl From<serde_json::Error> for NetworkError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

impl From<http::header::InvalidHeaderName> for NetworkError {
    fn from(err: http::header::InvalidHeaderName) -> Self {
        Self::InvalidHeader(err.to_string())
    }
}

impl From<http::header::InvalidHeaderValue> for NetworkError {
    fn from(err: http::header::InvalidHeaderValue) -> Self {
        Self::InvalidHeader(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for NetworkError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;
        match err {
            WsError::ConnectionClosed | WsError::AlreadyClosed => Self::ConnectionClosed,
            WsError::Http(response) => Self::HttpStatus {
                status: response.status().as_u16(),
                message: None,
            },
            other => Self::WebSocket(other.to_string()),
        }
    }
}

/// A specialized Result type for transport operations.
pub type Result<T> = std::result::Result<T, NetworkError>;
