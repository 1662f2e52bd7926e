//! GraphQL subscriptions over a shared WebSocket connection.
//!
//! A [`SubscriptionTransport`] owns one background task that owns the socket.
//! Callers register operations over an unbounded command channel and receive
//! results on a per-subscription channel, so every subscription multiplexes
//! over the same connection under its own id.
//!
//! The connection is opened lazily on the first subscription. When it drops,
//! the task reconnects with backoff, calls the connection-params callback
//! again and re-sends every active registration.

use std::collections::HashMap;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, Stream, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::Interval;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use super::operation::Operation;
use super::protocol::{ClientMessage, ServerMessage, WireProtocol};
use super::response::GraphQLResponse;
use crate::error::{NetworkError, Result};
use crate::websocket::{ReconnectConfig, WebSocketState, handshake_request};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;
type Sink = SplitSink<Socket, Message>;
type ResultSender = mpsc::UnboundedSender<Result<GraphQLResponse>>;

/// Produces the `connection_init` payload. Called on every connection
/// attempt.
pub type ConnectionParams = Arc<dyn Fn() -> Option<Value> + Send + Sync>;

/// Configuration for the subscription connection.
#[derive(Clone)]
pub struct SubscriptionConfig {
    /// WebSocket URL for subscriptions.
    pub url: String,
    /// Wire protocol spoken on the connection.
    pub protocol: WireProtocol,
    /// Timeout for the handshake and for `connection_ack`.
    pub connection_timeout: Duration,
    /// Client ping interval (`graphql-transport-ws` only).
    pub keep_alive_interval: Option<Duration>,
    /// Reconnection policy. `None` disables reconnection.
    pub reconnect: Option<ReconnectConfig>,
    /// Additional headers for the WebSocket handshake.
    pub headers: HashMap<String, String>,
    /// Connection parameters callback.
    pub connection_params: Option<ConnectionParams>,
}

impl SubscriptionConfig {
    /// Create a configuration for `url` with default settings.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            protocol: WireProtocol::default(),
            connection_timeout: Duration::from_secs(30),
            keep_alive_interval: Some(Duration::from_secs(30)),
            reconnect: Some(ReconnectConfig::default()),
            headers: HashMap::new(),
            connection_params: None,
        }
    }

    /// Set the wire protocol.
    pub fn protocol(mut self, protocol: WireProtocol) -> Self {
        self.protocol = protocol;
        self
    }

    /// Set the connection timeout.
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Set or disable the client ping interval.
    pub fn keep_alive_interval(mut self, interval: Option<Duration>) -> Self {
        self.keep_alive_interval = interval;
        self
    }

    /// Set or disable the reconnection policy.
    pub fn reconnect(mut self, reconnect: Option<ReconnectConfig>) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Add a handshake header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Set the connection parameters callback.
    pub fn connection_params(
        mut self,
        params: impl Fn() -> Option<Value> + Send + Sync + 'static,
    ) -> Self {
        self.connection_params = Some(Arc::new(params));
        self
    }
}

impl fmt::Debug for SubscriptionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionConfig")
            .field("url", &self.url)
            .field("protocol", &self.protocol)
            .field("connection_timeout", &self.connection_timeout)
            .field("keep_alive_interval", &self.keep_alive_interval)
            .field("reconnect", &self.reconnect)
            .field("headers", &self.headers)
            .field("connection_params", &self.connection_params.is_some())
            .finish()
    }
}

enum Command {
    Subscribe {
        id: String,
        payload: Value,
        sender: ResultSender,
    },
    Unsubscribe {
        id: String,
    },
    Shutdown,
}

/// A stream of results for one subscription.
///
/// Dropping the stream stops the subscription on the server; the shared
/// connection stays open.
pub struct SubscriptionStream {
    id: String,
    receiver: mpsc::UnboundedReceiver<Result<GraphQLResponse>>,
    commands: mpsc::UnboundedSender<Command>,
}

impl SubscriptionStream {
    /// Get the subscription ID.
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Stream for SubscriptionStream {
    type Item = Result<GraphQLResponse>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

impl Drop for SubscriptionStream {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Unsubscribe {
            id: std::mem::take(&mut self.id),
        });
    }
}

impl fmt::Debug for SubscriptionStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionStream")
            .field("id", &self.id)
            .finish()
    }
}

/// A multiplexing GraphQL subscription transport.
pub struct SubscriptionTransport {
    config: Arc<SubscriptionConfig>,
    state: Arc<Mutex<WebSocketState>>,
    commands: Mutex<Option<mpsc::UnboundedSender<Command>>>,
    next_id: AtomicU64,
}

impl SubscriptionTransport {
    /// Create a transport. No connection is made until the first
    /// subscription.
    pub fn new(config: SubscriptionConfig) -> Self {
        Self {
            config: Arc::new(config),
            state: Arc::new(Mutex::new(WebSocketState::Disconnected)),
            commands: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    /// The transport configuration.
    pub fn config(&self) -> &SubscriptionConfig {
        &self.config
    }

    /// The current connection state.
    pub fn state(&self) -> WebSocketState {
        *self.state.lock()
    }

    /// Register `operation` and return its result stream.
    ///
    /// Must be called within a tokio runtime.
    pub fn subscribe(&self, operation: &Operation) -> Result<SubscriptionStream> {
        let payload = serde_json::to_value(operation)?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed).to_string();
        let (sender, receiver) = mpsc::unbounded_channel();

        let commands = self.dispatch(Command::Subscribe {
            id: id.clone(),
            payload,
            sender,
        })?;

        tracing::debug!(target: "graphlink_net::graphql", id = %id, "subscription registered");
        Ok(SubscriptionStream {
            id,
            receiver,
            commands,
        })
    }

    /// Close the connection and end every active subscription.
    pub fn close(&self) {
        if let Some(commands) = self.commands.lock().take() {
            let _ = commands.send(Command::Shutdown);
        }
    }

    fn dispatch(&self, command: Command) -> Result<mpsc::UnboundedSender<Command>> {
        let mut commands = self.commands.lock();
        let mut command = command;
        if let Some(sender) = commands.as_ref() {
            match sender.send(command) {
                Ok(()) => return Ok(sender.clone()),
                Err(mpsc::error::SendError(returned)) => command = returned,
            }
        }

        let sender = self.spawn_actor()?;
        sender
            .send(command)
            .map_err(|_| NetworkError::ConnectionClosed)?;
        *commands = Some(sender.clone());
        Ok(sender)
    }

    fn spawn_actor(&self) -> Result<mpsc::UnboundedSender<Command>> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            NetworkError::Connection("subscriptions require a tokio runtime".into())
        })?;
        let (sender, receiver) = mpsc::unbounded_channel();
        let actor = Actor {
            config: self.config.clone(),
            state: self.state.clone(),
            commands: receiver,
            active: HashMap::new(),
        };
        runtime.spawn(actor.run());
        Ok(sender)
    }
}

impl Drop for SubscriptionTransport {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for SubscriptionTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionTransport")
            .field("url", &self.config.url)
            .field("state", &self.state())
            .finish()
    }
}

struct Registration {
    payload: Value,
    sender: ResultSender,
}

enum Flow {
    Continue,
    Stop,
}

struct Actor {
    config: Arc<SubscriptionConfig>,
    state: Arc<Mutex<WebSocketState>>,
    commands: mpsc::UnboundedReceiver<Command>,
    active: HashMap<String, Registration>,
}

impl Actor {
    async fn run(mut self) {
        let mut attempt: u32 = 0;

        loop {
            // Idle until something needs the connection.
            if self.active.is_empty() {
                match self.commands.recv().await {
                    Some(command) => {
                        if let Flow::Stop = self.apply_offline(command) {
                            break;
                        }
                        continue;
                    }
                    None => break,
                }
            }

            self.set_state(if attempt == 0 {
                WebSocketState::Connecting
            } else {
                WebSocketState::Reconnecting
            });

            let request = match handshake_request(
                &self.config.url,
                &self.config.headers,
                Some(self.config.protocol.subprotocol()),
            ) {
                Ok(request) => request,
                Err(error) => {
                    // A malformed endpoint or header fails every registration without retrying.
                    tracing::warn!(target: "graphlink_net::graphql", error = %error, "invalid subscription endpoint");
                    self.fail_all(&error);
                    self.set_state(WebSocketState::Disconnected);
                    attempt = 0;
                    continue;
                }
            };

            let error = match self.open(request).await {
                Ok(socket) => {
                    attempt = 0;
                    self.set_state(WebSocketState::Connected);
                    match self.serve(socket).await {
                        Ok(()) => break,
                        Err(error) => error,
                    }
                }
                Err(error) => error,
            };

            self.set_state(WebSocketState::Disconnected);
            tracing::debug!(target: "graphlink_net::graphql", error = %error, attempt, "subscription connection lost");

            if let Flow::Stop = self.backoff(&mut attempt, error).await {
                break;
            }
        }

        self.set_state(WebSocketState::Disconnected);
        tracing::debug!(target: "graphlink_net::graphql", "subscription transport stopped");
    }

    fn set_state(&self, state: WebSocketState) {
        *self.state.lock() = state;
    }

    fn apply_offline(&mut self, command: Command) -> Flow {
        match command {
            Command::Subscribe {
                id,
                payload,
                sender,
            } => {
                self.active.insert(id, Registration { payload, sender });
            }
            Command::Unsubscribe { id } => {
                self.active.remove(&id);
            }
            Command::Shutdown => return Flow::Stop,
        }
        Flow::Continue
    }

    fn fail_all(&mut self, error: &NetworkError) {
        for (_, registration) in self.active.drain() {
            let _ = registration.sender.send(Err(error.clone()));
        }
    }

    /// Wait before the next attempt, or give up and fail every subscriber.
    async fn backoff(&mut self, attempt: &mut u32, error: NetworkError) -> Flow {
        let delay = match &self.config.reconnect {
            Some(reconnect) if reconnect.allows_attempt(*attempt) => {
                reconnect.delay_for_attempt(*attempt)
            }
            _ => {
                tracing::warn!(target: "graphlink_net::graphql", error = %error, "subscription connection closed for good");
                self.fail_all(&error);
                *attempt = 0;
                return Flow::Continue;
            }
        };
        *attempt = attempt.saturating_add(1);

        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => return Flow::Continue,
                command = self.commands.recv() => match command {
                    Some(command) => {
                        if let Flow::Stop = self.apply_offline(command) {
                            return Flow::Stop;
                        }
                    }
                    None => return Flow::Stop,
                },
            }
        }
    }

    async fn open(&self, request: Request) -> Result<Socket> {
        let protocol = self.config.protocol;
        let timeout = self.config.connection_timeout;

        let (mut socket, _) = tokio::time::timeout(timeout, tokio_tungstenite::connect_async(request))
            .await
            .map_err(|_| NetworkError::Timeout)??;

        let payload = self
            .config
            .connection_params
            .as_ref()
            .and_then(|params| params());
        if let Some(text) = protocol.encode(&ClientMessage::ConnectionInit { payload }) {
            socket.send(Message::Text(text.into())).await?;
        }

        tokio::time::timeout(timeout, await_ack(&mut socket, protocol))
            .await
            .map_err(|_| NetworkError::Timeout)??;

        tracing::debug!(target: "graphlink_net::graphql", url = %self.config.url, "subscription connection acknowledged");
        Ok(socket)
    }

    /// Drive an open connection. `Ok` means shutdown was requested.
    async fn serve(&mut self, socket: Socket) -> Result<()> {
        let protocol = self.config.protocol;
        let (mut sink, mut stream) = socket.split();

        for (id, registration) in &self.active {
            let message = ClientMessage::Subscribe {
                id: id.clone(),
                payload: registration.payload.clone(),
            };
            send(&mut sink, protocol, &message).await?;
        }

        let mut ping = self
            .config
            .keep_alive_interval
            .filter(|_| protocol.supports_ping())
            .map(|period| tokio::time::interval_at(tokio::time::Instant::now() + period, period));

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Subscribe { id, payload, sender }) => {
                        let message = ClientMessage::Subscribe { id: id.clone(), payload: payload.clone() };
                        self.active.insert(id, Registration { payload, sender });
                        send(&mut sink, protocol, &message).await?;
                    }
                    Some(Command::Unsubscribe { id }) => {
                        if self.active.remove(&id).is_some() {
                            send(&mut sink, protocol, &ClientMessage::Stop { id }).await?;
                        }
                    }
                    Some(Command::Shutdown) | None => {
                        let _ = send(&mut sink, protocol, &ClientMessage::Terminate).await;
                        let _ = sink.close().await;
                        return Ok(());
                    }
                },
                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => match WireProtocol::decode(text.as_str()) {
                        Ok(message) => self.handle(message, &mut sink).await?,
                        Err(error) => {
                            tracing::warn!(target: "graphlink_net::graphql", error = %error, "ignoring undecodable message");
                        }
                    },
                    Some(Ok(Message::Close(_))) | None => return Err(NetworkError::ConnectionClosed),
                    Some(Ok(_)) => {}
                    Some(Err(error)) => return Err(error.into()),
                },
                _ = tick(&mut ping) => {
                    send(&mut sink, protocol, &ClientMessage::Ping).await?;
                }
            }
        }
    }

    async fn handle(&mut self, message: ServerMessage, sink: &mut Sink) -> Result<()> {
        match message {
            ServerMessage::Data { id, payload } => {
                if let Some(registration) = self.active.get(&id) {
                    let _ = registration.sender.send(Ok(payload));
                }
            }
            ServerMessage::Error { id, errors } => {
                if let Some(registration) = self.active.remove(&id) {
                    let _ = registration
                        .sender
                        .send(Ok(GraphQLResponse::from_errors(errors)));
                }
            }
            ServerMessage::Complete { id } => {
                self.active.remove(&id);
            }
            ServerMessage::Ping { payload } => {
                send(sink, self.config.protocol, &ClientMessage::Pong { payload }).await?;
            }
            ServerMessage::ConnectionError { payload } => {
                return Err(rejected(payload));
            }
            ServerMessage::ConnectionAck | ServerMessage::KeepAlive | ServerMessage::Pong => {}
        }
        Ok(())
    }
}

async fn await_ack(socket: &mut Socket, protocol: WireProtocol) -> Result<()> {
    while let Some(frame) = socket.next().await {
        let text = match frame? {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };
        match WireProtocol::decode(text.as_str())? {
            ServerMessage::ConnectionAck => return Ok(()),
            ServerMessage::ConnectionError { payload } => return Err(rejected(payload)),
            ServerMessage::Ping { payload } => {
                if let Some(pong) = protocol.encode(&ClientMessage::Pong { payload }) {
                    socket.send(Message::Text(pong.into())).await?;
                }
            }
            _ => {}
        }
    }
    Err(NetworkError::ConnectionClosed)
}

async fn send(sink: &mut Sink, protocol: WireProtocol, message: &ClientMessage) -> Result<()> {
    if let Some(text) = protocol.encode(message) {
        sink.send(Message::Text(text.into())).await?;
    }
    Ok(())
}

async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

fn rejected(payload: Option<Value>) -> NetworkError {
    let reason = payload
        .map(|payload| match payload.get("message").and_then(Value::as_str) {
            Some(message) => message.to_owned(),
            None => payload.to_string(),
        })
        .unwrap_or_else(|| "connection rejected".into());
    NetworkError::Protocol(reason)
}
