//! Where the client runs.

use serde::{Deserialize, Serialize};

/// The execution context of a client instance.
///
/// A server-context client renders one request: it never reads stored
/// credentials, never opens a streaming connection and never restores a
/// cache snapshot. A client-context client lives for a user session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionContext {
    /// Server-side rendering.
    Server,
    /// A long-lived interactive session.
    #[default]
    Client,
}

impl ExecutionContext {
    /// Select the context from a "running on the server" flag.
    pub fn from_server_flag(server: bool) -> Self {
        if server { Self::Server } else { Self::Client }
    }

    /// Whether this is the server context.
    pub fn is_server(self) -> bool {
        self == Self::Server
    }

    /// Whether this is the client context.
    pub fn is_client(self) -> bool {
        self == Self::Client
    }
}
