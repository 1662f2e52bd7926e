//! WebSocket connection state.

/// Current state of a WebSocket connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum WebSocketState {
    /// Not connected to any server.
    #[default]
    Disconnected,
    /// Currently attempting to connect.
    Connecting,
    /// Connected and ready to send/receive messages.
    Connected,
    /// Connection lost, waiting before the next connection attempt.
    Reconnecting,
}
