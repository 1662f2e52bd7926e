//! Integration tests for the subscription transport against a local
//! WebSocket server.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use graphlink_net::graphql::{
    Operation, SubscriptionConfig, SubscriptionTransport, WireProtocol,
};
use graphlink_net::{NetworkError, ReconnectConfig, WebSocketState};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::HeaderValue;

const TIMEOUT: Duration = Duration::from_secs(5);

type ServerSocket = WebSocketStream<TcpStream>;

async fn listen() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/graphql", listener.local_addr().unwrap());
    (listener, url)
}

async fn accept(listener: &TcpListener, subprotocol: &'static str) -> ServerSocket {
    let (stream, _) = listener.accept().await.unwrap();
    tokio_tungstenite::accept_hdr_async(stream, move |_req: &Request, mut response: Response| {
        response
            .headers_mut()
            .insert("sec-websocket-protocol", HeaderValue::from_static(subprotocol));
        Ok::<_, ErrorResponse>(response)
    })
    .await
    .unwrap()
}

async fn recv_json(socket: &mut ServerSocket) -> Value {
    loop {
        let frame = tokio::time::timeout(TIMEOUT, socket.next())
            .await
            .expect("timed out waiting for a client message")
            .expect("client closed the connection")
            .unwrap();
        if let Message::Text(text) = frame {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

async fn send_json(socket: &mut ServerSocket, value: Value) {
    socket
        .send(Message::Text(value.to_string().into()))
        .await
        .unwrap();
}

/// Read `connection_init`, acknowledge it and return its payload.
async fn handshake(socket: &mut ServerSocket) -> Value {
    let init = recv_json(socket).await;
    assert_eq!(init["type"], "connection_init");
    send_json(socket, json!({ "type": "connection_ack" })).await;
    init.get("payload").cloned().unwrap_or(Value::Null)
}

fn fast_reconnect() -> ReconnectConfig {
    ReconnectConfig::new()
        .initial_delay(Duration::from_millis(10))
        .max_delay(Duration::from_millis(50))
}

#[tokio::test]
async fn test_subscribe_receive_and_stop() {
    let (listener, url) = listen().await;

    let server = tokio::spawn(async move {
        let mut socket = accept(&listener, "graphql-ws").await;
        let params = handshake(&mut socket).await;
        assert_eq!(params, json!({ "authorization": "Bearer abc123" }));

        let start = recv_json(&mut socket).await;
        assert_eq!(start["type"], "start");
        assert_eq!(start["payload"]["query"], "subscription { messageAdded { id } }");
        let id = start["id"].clone();

        send_json(
            &mut socket,
            json!({ "id": id, "type": "data", "payload": { "data": { "messageAdded": { "id": "m1" } } } }),
        )
        .await;

        let stop = recv_json(&mut socket).await;
        assert_eq!(stop, json!({ "id": id, "type": "stop" }));
    });

    let transport = SubscriptionTransport::new(
        SubscriptionConfig::new(url)
            .connection_params(|| Some(json!({ "authorization": "Bearer abc123" }))),
    );
    assert_eq!(transport.state(), WebSocketState::Disconnected);

    let mut stream = transport
        .subscribe(&Operation::new("subscription { messageAdded { id } }"))
        .unwrap();

    let item = tokio::time::timeout(TIMEOUT, stream.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(item.data, Some(json!({ "messageAdded": { "id": "m1" } })));
    assert_eq!(transport.state(), WebSocketState::Connected);

    drop(stream);
    tokio::time::timeout(TIMEOUT, server).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_connection_params_rederived_after_reconnect() {
    let (listener, url) = listen().await;

    let server = tokio::spawn(async move {
        let mut first = accept(&listener, "graphql-ws").await;
        let params = handshake(&mut first).await;
        assert_eq!(params, json!({ "authorization": "Bearer token-1" }));
        let start = recv_json(&mut first).await;
        let id = start["id"].clone();
        drop(first);

        let mut second = accept(&listener, "graphql-ws").await;
        let params = handshake(&mut second).await;
        assert_eq!(params, json!({ "authorization": "Bearer token-2" }));

        let resent = recv_json(&mut second).await;
        assert_eq!(resent["type"], "start");
        assert_eq!(resent["id"], id);
        assert_eq!(resent["payload"], start["payload"]);

        send_json(
            &mut second,
            json!({ "id": id, "type": "data", "payload": { "data": { "tick": 2 } } }),
        )
        .await;
        second
    });

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let transport = SubscriptionTransport::new(
        SubscriptionConfig::new(url)
            .reconnect(Some(fast_reconnect()))
            .connection_params(move || {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                Some(json!({ "authorization": format!("Bearer token-{n}") }))
            }),
    );

    let mut stream = transport
        .subscribe(&Operation::new("subscription { tick }"))
        .unwrap();

    let item = tokio::time::timeout(TIMEOUT, stream.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(item.data, Some(json!({ "tick": 2 })));
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    let _socket = tokio::time::timeout(TIMEOUT, server).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_unsubscribe_keeps_shared_connection() {
    let (listener, url) = listen().await;

    let server = tokio::spawn(async move {
        let mut socket = accept(&listener, "graphql-ws").await;
        handshake(&mut socket).await;
        let first = recv_json(&mut socket).await["id"].clone();
        let second = recv_json(&mut socket).await["id"].clone();
        assert_ne!(first, second);

        let stop = recv_json(&mut socket).await;
        assert_eq!(stop, json!({ "id": first, "type": "stop" }));

        send_json(
            &mut socket,
            json!({ "id": second, "type": "data", "payload": { "data": { "b": true } } }),
        )
        .await;

        // No second connection is opened.
        let extra = tokio::time::timeout(Duration::from_millis(200), listener.accept()).await;
        assert!(extra.is_err());
        socket
    });

    let transport = SubscriptionTransport::new(SubscriptionConfig::new(url));
    let first = transport
        .subscribe(&Operation::new("subscription { a }"))
        .unwrap();
    let mut second = transport
        .subscribe(&Operation::new("subscription { b }"))
        .unwrap();
    assert_ne!(first.id(), second.id());

    // Let both registrations reach the server before stopping the first.
    tokio::time::sleep(Duration::from_millis(100)).await;
    drop(first);

    let item = tokio::time::timeout(TIMEOUT, second.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(item.data, Some(json!({ "b": true })));

    let _socket = tokio::time::timeout(TIMEOUT, server).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_operation_error_ends_stream() {
    let (listener, url) = listen().await;

    let server = tokio::spawn(async move {
        let mut socket = accept(&listener, "graphql-ws").await;
        handshake(&mut socket).await;
        let id = recv_json(&mut socket).await["id"].clone();
        send_json(
            &mut socket,
            json!({ "id": id, "type": "error", "payload": { "message": "not allowed" } }),
        )
        .await;
        socket
    });

    let transport = SubscriptionTransport::new(SubscriptionConfig::new(url));
    let mut stream = transport
        .subscribe(&Operation::new("subscription { secret }"))
        .unwrap();

    let item = tokio::time::timeout(TIMEOUT, stream.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(item.errors.len(), 1);
    assert_eq!(item.errors[0].message, "not allowed");
    assert!(tokio::time::timeout(TIMEOUT, stream.next()).await.unwrap().is_none());

    let _socket = server.await.unwrap();
}

#[tokio::test]
async fn test_connection_lost_without_reconnect() {
    let (listener, url) = listen().await;

    tokio::spawn(async move {
        let mut socket = accept(&listener, "graphql-ws").await;
        handshake(&mut socket).await;
        recv_json(&mut socket).await;
        socket.close(None).await.unwrap();
    });

    let transport = SubscriptionTransport::new(SubscriptionConfig::new(url).reconnect(None));
    let mut stream = transport
        .subscribe(&Operation::new("subscription { a }"))
        .unwrap();

    let item = tokio::time::timeout(TIMEOUT, stream.next())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(item.unwrap_err(), NetworkError::ConnectionClosed);
    assert!(tokio::time::timeout(TIMEOUT, stream.next()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_graphql_transport_ws_protocol() {
    let (listener, url) = listen().await;

    let server = tokio::spawn(async move {
        let mut socket = accept(&listener, "graphql-transport-ws").await;
        let params = handshake(&mut socket).await;
        assert_eq!(params, Value::Null);

        let subscribe = recv_json(&mut socket).await;
        assert_eq!(subscribe["type"], "subscribe");
        let id = subscribe["id"].clone();

        send_json(&mut socket, json!({ "type": "ping" })).await;
        let pong = recv_json(&mut socket).await;
        assert_eq!(pong, json!({ "type": "pong" }));

        send_json(
            &mut socket,
            json!({ "id": id, "type": "next", "payload": { "data": { "n": 1 } } }),
        )
        .await;
        send_json(&mut socket, json!({ "id": id, "type": "complete" })).await;
        socket
    });

    let transport = SubscriptionTransport::new(
        SubscriptionConfig::new(url)
            .protocol(WireProtocol::GraphqlTransportWs)
            .keep_alive_interval(None),
    );
    let stream = transport
        .subscribe(&Operation::new("subscription { n }"))
        .unwrap();

    let items: Vec<_> = tokio::time::timeout(TIMEOUT, stream.collect::<Vec<_>>())
        .await
        .unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].as_ref().unwrap().data, Some(json!({ "n": 1 })));

    let _socket = server.await.unwrap();
}

#[tokio::test]
async fn test_rejected_connection_init() {
    let (listener, url) = listen().await;

    tokio::spawn(async move {
        let mut socket = accept(&listener, "graphql-ws").await;
        let init = recv_json(&mut socket).await;
        assert_eq!(init["type"], "connection_init");
        send_json(
            &mut socket,
            json!({ "type": "connection_error", "payload": { "message": "bad token" } }),
        )
        .await;
        socket
    });

    let transport = SubscriptionTransport::new(SubscriptionConfig::new(url).reconnect(None));
    let mut stream = transport
        .subscribe(&Operation::new("subscription { a }"))
        .unwrap();

    let item = tokio::time::timeout(TIMEOUT, stream.next())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        item.unwrap_err(),
        NetworkError::Protocol("bad token".into())
    );
}

#[tokio::test]
async fn test_invalid_endpoint_fails_without_retrying() {
    let transport = SubscriptionTransport::new(
        SubscriptionConfig::new("not a url").reconnect(Some(ReconnectConfig::new())),
    );
    let mut stream = transport
        .subscribe(&Operation::new("subscription { a }"))
        .unwrap();
    let item = tokio::time::timeout(TIMEOUT, stream.next())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(item, Err(NetworkError::InvalidUrl(_))));
    assert!(tokio::time::timeout(TIMEOUT, stream.next()).await.unwrap().is_none());

    let (_listener, url) = listen().await;
    let transport =
        SubscriptionTransport::new(SubscriptionConfig::new(url).header("bad header", "value"));
    let mut stream = transport
        .subscribe(&Operation::new("subscription { a }"))
        .unwrap();
    let item = tokio::time::timeout(TIMEOUT, stream.next())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(item, Err(NetworkError::InvalidHeader(_))));
}
