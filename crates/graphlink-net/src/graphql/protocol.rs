//! Wire protocols for GraphQL over WebSocket.
//!
//! Two protocols are in use in the wild:
//!
//! - `subscriptions-transport-ws` (subprotocol `graphql-ws`): `start`/`stop`,
//!   `data`, server keep-alive `ka`, client `connection_terminate`.
//!   See: https://github.com/apollographql/subscriptions-transport-ws/blob/master/PROTOCOL.md
//! - `graphql-transport-ws` (subprotocol `graphql-transport-ws`):
//!   `subscribe`/`complete`, `next`, bidirectional `ping`/`pong`.
//!   See: https://github.com/enisdenjo/graphql-ws/blob/master/PROTOCOL.md
//!
//! Client messages are encoded per protocol. Server messages are decoded by a
//! single protocol-agnostic decoder since the message type names never clash.

use serde_json::{Value, json};

use super::response::{GraphQLError, GraphQLResponse};
use crate::error::{NetworkError, Result};

/// The GraphQL-over-WebSocket protocol spoken on a connection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum WireProtocol {
    /// The legacy `subscriptions-transport-ws` protocol.
    #[default]
    SubscriptionsTransportWs,
    /// The `graphql-transport-ws` protocol.
    GraphqlTransportWs,
}

/// A message sent by the client.
#[derive(Clone, Debug, PartialEq)]
pub enum ClientMessage {
    /// Open the protocol session, with optional connection parameters.
    ConnectionInit { payload: Option<Value> },
    /// Register an operation under `id`.
    Subscribe { id: String, payload: Value },
    /// Stop the operation registered under `id`.
    Stop { id: String },
    /// Keep-alive ping.
    Ping,
    /// Answer to a server ping.
    Pong { payload: Option<Value> },
    /// Close the protocol session.
    Terminate,
}

/// A message received from the server.
#[derive(Clone, Debug, PartialEq)]
pub enum ServerMessage {
    /// The connection was accepted.
    ConnectionAck,
    /// The connection was rejected.
    ConnectionError { payload: Option<Value> },
    /// Legacy keep-alive.
    KeepAlive,
    /// Server ping; must be answered with a pong.
    Ping { payload: Option<Value> },
    /// Answer to a client ping.
    Pong,
    /// A result for the operation `id`.
    Data { id: String, payload: GraphQLResponse },
    /// The operation `id` failed before producing results.
    Error { id: String, errors: Vec<GraphQLError> },
    /// The operation `id` will produce no more results.
    Complete { id: String },
}

impl WireProtocol {
    /// The `Sec-WebSocket-Protocol` value for this protocol.
    pub fn subprotocol(self) -> &'static str {
        match self {
            Self::SubscriptionsTransportWs => "graphql-ws",
            Self::GraphqlTransportWs => "graphql-transport-ws",
        }
    }

    /// Whether the client may send keep-alive pings.
    pub fn supports_ping(self) -> bool {
        matches!(self, Self::GraphqlTransportWs)
    }

    /// Encode a client message.
    ///
    /// Returns `None` for messages the protocol has no representation for.
    pub fn encode(self, message: &ClientMessage) -> Option<String> {
        let legacy = self == Self::SubscriptionsTransportWs;
        let value = match message {
            ClientMessage::ConnectionInit { payload } => with_payload("connection_init", payload),
            ClientMessage::Subscribe { id, payload } => json!({
                "id": id,
                "type": if legacy { "start" } else { "subscribe" },
                "payload": payload,
            }),
            ClientMessage::Stop { id } => json!({
                "id": id,
                "type": if legacy { "stop" } else { "complete" },
            }),
            ClientMessage::Ping if !legacy => json!({ "type": "ping" }),
            ClientMessage::Pong { payload } if !legacy => with_payload("pong", payload),
            ClientMessage::Terminate if legacy => json!({ "type": "connection_terminate" }),
            ClientMessage::Ping | ClientMessage::Pong { .. } | ClientMessage::Terminate => {
                return None;
            }
        };
        Some(value.to_string())
    }

    /// Decode a server message of either protocol.
    pub fn decode(text: &str) -> Result<ServerMessage> {
        let mut value: Value = serde_json::from_str(text)?;
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| NetworkError::Protocol("message without type".into()))?
            .to_owned();
        let payload = value.get_mut("payload").map(Value::take);

        let message = match kind.as_str() {
            "connection_ack" => ServerMessage::ConnectionAck,
            "connection_error" => ServerMessage::ConnectionError { payload },
            "ka" => ServerMessage::KeepAlive,
            "ping" => ServerMessage::Ping { payload },
            "pong" => ServerMessage::Pong,
            "data" | "next" => ServerMessage::Data {
                id: message_id(&value)?,
                payload: serde_json::from_value(payload.unwrap_or(Value::Null))?,
            },
            "error" => ServerMessage::Error {
                id: message_id(&value)?,
                errors: decode_errors(payload)?,
            },
            "complete" => ServerMessage::Complete {
                id: message_id(&value)?,
            },
            other => {
                return Err(NetworkError::Protocol(format!(
                    "unknown message type '{other}'"
                )));
            }
        };
        Ok(message)
    }
}

fn with_payload(kind: &str, payload: &Option<Value>) -> Value {
    match payload {
        Some(payload) => json!({ "type": kind, "payload": payload }),
        None => json!({ "type": kind }),
    }
}

fn message_id(value: &Value) -> Result<String> {
    match value.get("id") {
        Some(Value::String(id)) => Ok(id.clone()),
        Some(Value::Number(id)) => Ok(id.to_string()),
        _ => Err(NetworkError::Protocol("message without id".into())),
    }
}

// The legacy protocol sends a single error object, the newer one a list.
fn decode_errors(payload: Option<Value>) -> Result<Vec<GraphQLError>> {
    match payload {
        Some(Value::Array(errors)) => errors
            .into_iter()
            .map(|error| serde_json::from_value(error).map_err(NetworkError::from))
            .collect(),
        Some(Value::Object(error)) if error.contains_key("message") => {
            Ok(vec![serde_json::from_value(Value::Object(error))?])
        }
        Some(other) => Ok(vec![GraphQLError::new(other.to_string())]),
        None => Ok(vec![GraphQLError::new("subscription failed")]),
    }
}
