//! Integration tests for the full client: WebSocket → dispatcher → store,
//! and intents → effects → WebSocket.

use std::time::Duration;

use fleetwatch::prelude::*;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{Message, Utf8Bytes};

type ServerWs = tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>;

const LOAD_USERNAME: &str = r#"{"type":"load_username","payload":null,"meta":null,"error":false}"#;

// =========================================================================
// Helpers
// =========================================================================

async fn within<F: std::future::Future>(fut: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(5), fut)
        .await
        .expect("timed out")
}

/// Binds a server and builds a client pointed at it.
async fn start() -> (TcpListener, FleetClient) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    let config = ClientConfig::new(url).reconnect(
        ReconnectPolicy::new(Duration::from_millis(20), Duration::from_millis(100)).without_jitter(),
    );
    let client = FleetClient::builder(config).build().expect("client builds");
    (listener, client)
}

async fn accept(listener: &TcpListener) -> ServerWs {
    let (stream, _) = within(listener.accept()).await.unwrap();
    tokio_tungstenite::accept_async(stream).await.unwrap()
}

/// Next text frame from the client.
async fn recv_text(ws: &mut ServerWs) -> String {
    loop {
        match within(ws.next()).await {
            Some(Ok(Message::Text(text))) => return text.as_str().to_owned(),
            Some(Ok(_)) => continue,
            other => panic!("expected text frame, got {other:?}"),
        }
    }
}

async fn send_action(ws: &mut ServerWs, action: Action) {
    let text = JsonCodec.encode_action(&action).unwrap();
    ws.send(Message::text(text)).await.unwrap();
}

// =========================================================================
// Bootstrap
// =========================================================================

#[tokio::test]
async fn test_username_requested_on_connect() {
    let (listener, client) = start().await;
    let mut server = accept(&listener).await;

    assert_eq!(recv_text(&mut server).await, LOAD_USERNAME);
    client.shutdown().await;
}

#[tokio::test]
async fn test_load_units_right_after_build_reaches_server() {
    let (listener, client) = start().await;
    // Still connecting: the command must wait for the socket, not vanish.
    client.load_units().unwrap();

    let mut server = accept(&listener).await;
    let mut received = vec![recv_text(&mut server).await, recv_text(&mut server).await];
    received.sort();

    assert_eq!(
        received,
        vec![
            LOAD_USERNAME.to_string(),
            r#"{"type":"load_verkehrsmittel","payload":null,"meta":null,"error":false}"#.to_string(),
        ]
    );
    client.shutdown().await;
}

#[tokio::test]
async fn test_username_requested_again_after_reconnect() {
    let (listener, client) = start().await;

    let mut first = accept(&listener).await;
    assert_eq!(recv_text(&mut first).await, LOAD_USERNAME);

    // Abnormal drop: the client must reconnect and re-bootstrap.
    drop(first);

    let mut second = accept(&listener).await;
    assert_eq!(recv_text(&mut second).await, LOAD_USERNAME);

    // Server answers on the new connection; state follows.
    send_action(&mut second, Action::username_loaded("anna")).await;
    let mut states = client.subscribe();
    within(states.wait_for(|s| s.user.name == "anna")).await.unwrap();

    client.shutdown().await;
}

// =========================================================================
// Commands and events
// =========================================================================

#[tokio::test]
async fn test_intents_are_sent_as_commands() {
    let (listener, client) = start().await;
    let mut server = accept(&listener).await;
    recv_text(&mut server).await;

    client.load_units().unwrap();
    client.delay_unit(UnitNumber(7), 5).unwrap();

    assert_eq!(
        recv_text(&mut server).await,
        r#"{"type":"load_verkehrsmittel","payload":null,"meta":null,"error":false}"#
    );
    assert_eq!(
        recv_text(&mut server).await,
        r#"{"type":"delay_verkehrsmittel","payload":"5","meta":7,"error":false}"#
    );
    client.shutdown().await;
}

#[tokio::test]
async fn test_server_events_build_state() {
    let (listener, client) = start().await;
    let mut server = accept(&listener).await;
    recv_text(&mut server).await;

    let unit = TransportUnit::new(7, "IC", "IC 7", vec!["Bern".into(), "Olten".into()]);
    send_action(&mut server, Action::username_loaded("anna")).await;
    send_action(&mut server, Action::unit_created(unit)).await;
    server
        .send(Message::text(r#"{"type":"verkehrsmittel_moved","payload":"Olten","meta":7}"#))
        .await
        .unwrap();
    // Noise the client must shrug off.
    server.send(Message::text("null")).await.unwrap();
    server
        .send(Message::text(r#"{"type":"server_error","error":true,"payload":"nope"}"#))
        .await
        .unwrap();
    server.send(Message::text(r#"{"type":"teleported","meta":7}"#)).await.unwrap();
    server
        .send(Message::text(r#"{"type":"verkehrsmittel_delayed","payload":3,"meta":7}"#))
        .await
        .unwrap();

    let mut states = client.subscribe();
    within(states.wait_for(|s| s.unit(UnitNumber(7)).is_some_and(|u| u.delay_minutes == 3)))
        .await
        .unwrap();

    let state = client.state();
    assert_eq!(state.user.name, "anna");
    assert_eq!(state.units.len(), 1);
    assert_eq!(state.units[0].current_position, "Olten");

    client.shutdown().await;
}

// =========================================================================
// Close semantics
// =========================================================================

#[tokio::test]
async fn test_graceful_server_close_does_not_reconnect() {
    let (listener, client) = start().await;
    let mut server = accept(&listener).await;
    recv_text(&mut server).await;

    server
        .close(Some(CloseFrame {
            code: CloseCode::Normal,
            reason: Utf8Bytes::from_static("maintenance"),
        }))
        .await
        .unwrap();

    let mut status = client.connection_state();
    within(status.wait_for(|s| s.is_closed())).await.unwrap();

    let again = tokio::time::timeout(Duration::from_millis(300), listener.accept()).await;
    assert!(again.is_err(), "client reconnected after a normal close");

    // Intents still go through the store; the send is dropped, not fatal.
    client.load_units().unwrap();
    client.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_closes_socket_normally() {
    let (listener, client) = start().await;
    let mut server = accept(&listener).await;
    recv_text(&mut server).await;

    let store = client.store().clone();
    client.shutdown().await;

    match within(server.next()).await {
        Some(Ok(Message::Close(Some(frame)))) => assert_eq!(frame.code, CloseCode::Normal),
        other => panic!("expected close frame, got {other:?}"),
    }
    assert!(matches!(store.dispatch(Action::load_units()), Err(StoreError::Closed)));
}
