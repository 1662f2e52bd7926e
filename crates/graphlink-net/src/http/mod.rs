//! HTTP client used by the request/response transport.
//!
//! A thin layer over `reqwest` that keeps the transport code independent of
//! the underlying client and maps failures into [`NetworkError`](crate::NetworkError).
//!
//! # Example
//!
//! ```ignore
//! use graphlink_net::http::HttpClient;
//!
//! let client = HttpClient::builder()
//!     .timeout(Duration::from_secs(10))
//!     .build()?;
//!
//! let response = client
//!     .post("https://api.example.com/graphql")
//!     .header("Accept", "application/json")
//!     .json(&serde_json::json!({ "query": "{ viewer { id } }" }))
//!     .send()
//!     .await?;
//! println!("Status: {}", response.status());
//! ```

mod client;
mod request;
mod response;

pub use client::{HttpClient, HttpClientBuilder, HttpClientConfig};
pub use request::{HttpMethod, HttpRequest, HttpRequestBuilder, RequestBody};
pub use response::HttpResponse;
