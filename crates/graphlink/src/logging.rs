//! Logging for graphlink.
//!
//! graphlink uses the `tracing` crate for instrumentation and never installs
//! a subscriber itself; applications choose one. Filter by subsystem with the
//! names in [`targets`], e.g.
//! `RUST_LOG=graphlink::link=warn,graphlink_net::graphql=debug`.

/// Target names for log filtering.
pub mod targets {
    /// Client facade: fetch policies and cache writes.
    pub const CLIENT: &str = "graphlink::client";
    /// Link chain: header decoration, routing and diagnostics.
    pub const LINK: &str = "graphlink::link";
    /// Normalized cache.
    pub const CACHE: &str = "graphlink::cache";
    /// HTTP client and GraphQL-over-HTTP transport.
    pub const NET_HTTP: &str = "graphlink_net::http";
    /// GraphQL operations and the subscription transport.
    pub const NET_GRAPHQL: &str = "graphlink_net::graphql";
}
