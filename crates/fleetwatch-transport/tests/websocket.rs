//! Integration tests for the reconnecting WebSocket channel.
//!
//! Each test binds a real `tokio-tungstenite` server on `127.0.0.1:0` and
//! drives the client channel against it. Reconnect delays are shortened
//! to a few milliseconds so the suite stays fast.

#[cfg(feature = "websocket")]
mod websocket {
    use std::future::Future;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use fleetwatch_transport::{
        Channel, ConnectionState, ReconnectPolicy, TransportError,
        WebSocketChannel,
    };
    use futures_util::{SinkExt, StreamExt};
    use tokio::net::TcpListener;
    use tokio_tungstenite::tungstenite::protocol::CloseFrame;
    use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
    use tokio_tungstenite::tungstenite::{Message, Utf8Bytes};

    type ServerWs = tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>;

    // =====================================================================
    // Helpers
    // =====================================================================

    async fn within<F: Future>(fut: F) -> F::Output {
        tokio::time::timeout(Duration::from_secs(5), fut)
            .await
            .expect("timed out")
    }

    async fn bind() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let url = format!("ws://{}", listener.local_addr().unwrap());
        (listener, url)
    }

    async fn accept(listener: &TcpListener) -> ServerWs {
        let (stream, _) = within(listener.accept()).await.expect("accept");
        tokio_tungstenite::accept_async(stream)
            .await
            .expect("server handshake")
    }

    fn fast_policy() -> ReconnectPolicy {
        ReconnectPolicy::new(Duration::from_millis(20), Duration::from_millis(100))
            .without_jitter()
    }

    async fn wait_open(channel: &WebSocketChannel) {
        let mut status = channel.status();
        within(status.wait_for(|s| s.is_open()))
            .await
            .expect("status sender alive");
    }

    fn counter(channel: &WebSocketChannel) -> Arc<AtomicUsize> {
        let opens = Arc::new(AtomicUsize::new(0));
        let o = Arc::clone(&opens);
        channel.on_open(Arc::new(move || {
            o.fetch_add(1, Ordering::SeqCst);
        }));
        opens
    }

    // =====================================================================
    // Data flow
    // =====================================================================

    #[tokio::test]
    async fn test_send_and_receive_text() {
        let (listener, url) = bind().await;
        let channel = WebSocketChannel::new(fast_policy());
        let mut inbound = channel.data_stream();
        channel.connect(&url).expect("connect");

        let mut server = accept(&listener).await;
        wait_open(&channel).await;

        // --- Client sends, server receives ---
        channel.send(r#"{"type":"load_username"}"#.to_string());
        let msg = within(server.next()).await.unwrap().unwrap();
        assert_eq!(msg.into_text().unwrap().as_str(), r#"{"type":"load_username"}"#);

        // --- Server sends, client receives ---
        server.send(Message::text("pong")).await.unwrap();
        assert_eq!(within(inbound.next()).await, Some(Ok("pong".to_string())));

        channel.shutdown().await;
        assert_eq!(channel.state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn test_binary_utf8_frames_are_accepted() {
        let (listener, url) = bind().await;
        let channel = WebSocketChannel::new(fast_policy());
        let mut inbound = channel.data_stream();
        channel.connect(&url).unwrap();

        let mut server = accept(&listener).await;
        server
            .send(Message::Binary(b"{\"type\":\"x\"}".to_vec().into()))
            .await
            .unwrap();

        assert_eq!(
            within(inbound.next()).await,
            Some(Ok("{\"type\":\"x\"}".to_string()))
        );
        channel.shutdown().await;
    }

    #[tokio::test]
    async fn test_send_before_open_is_delivered_on_open() {
        let (listener, url) = bind().await;
        let channel = WebSocketChannel::new(fast_policy());

        // Not connected yet: held until the socket opens.
        channel.send("early".to_string());

        channel.connect(&url).unwrap();
        let mut server = accept(&listener).await;
        channel.send("later".to_string());

        let first = within(server.next()).await.unwrap().unwrap();
        assert_eq!(first.into_text().unwrap().as_str(), "early");
        let second = within(server.next()).await.unwrap().unwrap();
        assert_eq!(second.into_text().unwrap().as_str(), "later");
        channel.shutdown().await;
    }

    #[tokio::test]
    async fn test_send_while_reconnecting_is_delivered_after_reconnect() {
        let (listener, url) = bind().await;
        let channel = WebSocketChannel::new(fast_policy());
        channel.connect(&url).unwrap();

        let server = accept(&listener).await;
        wait_open(&channel).await;
        drop(server);

        let mut status = channel.status();
        within(status.wait_for(|s| !s.is_open())).await.unwrap();
        channel.send("retry".to_string());

        let mut server = accept(&listener).await;
        let msg = within(server.next()).await.unwrap().unwrap();
        assert_eq!(msg.into_text().unwrap().as_str(), "retry");
        channel.shutdown().await;
    }

    #[tokio::test]
    async fn test_send_after_close_is_dropped() {
        let channel = WebSocketChannel::new(fast_policy());
        channel.close();
        // Closed for good: nothing queued, no panic.
        channel.send("late".to_string());
        assert!(channel.state().is_closed());
    }

    #[tokio::test]
    async fn test_wss_url_starts_a_tls_handshake() {
        use tokio::io::AsyncReadExt;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("wss://{}/websocket", listener.local_addr().unwrap());
        let channel = WebSocketChannel::new(fast_policy());
        channel.connect(&url).unwrap();

        // The first bytes on the wire are a TLS handshake record (0x16),
        // not a plain HTTP upgrade and not a local URL error.
        let (mut stream, _) = within(listener.accept()).await.unwrap();
        let mut head = [0u8; 1];
        within(stream.read_exact(&mut head)).await.unwrap();
        assert_eq!(head[0], 0x16);

        channel.shutdown().await;
    }

    // =====================================================================
    // Reconnect semantics
    // =====================================================================

    #[tokio::test]
    async fn test_on_open_fires_on_every_reconnect() {
        let (listener, url) = bind().await;
        let channel = WebSocketChannel::new(fast_policy());
        let opens = counter(&channel);
        let mut inbound = channel.data_stream();
        channel.connect(&url).unwrap();

        // First connection, then an abrupt drop (no close frame).
        let server = accept(&listener).await;
        wait_open(&channel).await;
        assert_eq!(opens.load(Ordering::SeqCst), 1);
        drop(server);

        // The failure shows up on the stream without ending it.
        let item = within(inbound.next()).await.expect("stream alive");
        assert!(item.is_err(), "expected transport error, got {item:?}");

        // Client comes back on its own.
        let mut server = accept(&listener).await;
        wait_open(&channel).await;
        assert_eq!(opens.load(Ordering::SeqCst), 2);

        // And the same stream keeps delivering.
        server.send(Message::text("again")).await.unwrap();
        assert_eq!(within(inbound.next()).await, Some(Ok("again".to_string())));

        channel.shutdown().await;
    }

    #[tokio::test]
    async fn test_abnormal_close_code_reconnects() {
        let (listener, url) = bind().await;
        let channel = WebSocketChannel::new(fast_policy());
        let opens = counter(&channel);
        channel.connect(&url).unwrap();

        let mut server = accept(&listener).await;
        server
            .close(Some(CloseFrame {
                code: CloseCode::Error,
                reason: Utf8Bytes::from_static("internal"),
            }))
            .await
            .unwrap();

        let _second = accept(&listener).await;
        wait_open(&channel).await;
        assert_eq!(opens.load(Ordering::SeqCst), 2);
        channel.shutdown().await;
    }

    #[tokio::test]
    async fn test_normal_close_does_not_reconnect() {
        let (listener, url) = bind().await;
        let channel = WebSocketChannel::new(fast_policy());
        let mut inbound = channel.data_stream();
        channel.connect(&url).unwrap();

        let mut server = accept(&listener).await;
        wait_open(&channel).await;
        server
            .close(Some(CloseFrame {
                code: CloseCode::Normal,
                reason: Utf8Bytes::from_static("bye"),
            }))
            .await
            .unwrap();

        // Graceful close completes the stream without an error item.
        assert_eq!(within(inbound.next()).await, None);
        let mut status = channel.status();
        within(status.wait_for(|s| s.is_closed())).await.unwrap();

        // No second connection attempt arrives.
        let again = tokio::time::timeout(
            Duration::from_millis(300),
            listener.accept(),
        )
        .await;
        assert!(again.is_err(), "client reconnected after a normal close");
    }

    #[tokio::test]
    async fn test_connect_failures_are_reported_and_retried() {
        // Grab a free port, then release it so nothing is listening.
        let (listener, url) = bind().await;
        drop(listener);

        let channel = WebSocketChannel::new(fast_policy());
        let mut inbound = channel.data_stream();
        channel.connect(&url).unwrap();

        for _ in 0..2 {
            match within(inbound.next()).await {
                Some(Err(TransportError::ConnectFailed(_))) => {}
                other => panic!("expected ConnectFailed, got {other:?}"),
            }
        }

        let mut status = channel.status();
        within(status.wait_for(|s| matches!(s, ConnectionState::Reconnecting { .. })))
            .await
            .unwrap();

        channel.close();
        // Remaining error items may still be queued; the stream must end.
        while let Some(item) = within(inbound.next()).await {
            assert!(item.is_err());
        }
        assert!(channel.state().is_closed());
    }

    // =====================================================================
    // Lifecycle
    // =====================================================================

    #[tokio::test]
    async fn test_close_sends_normal_close_frame() {
        let (listener, url) = bind().await;
        let channel = WebSocketChannel::new(fast_policy());
        channel.connect(&url).unwrap();

        let mut server = accept(&listener).await;
        wait_open(&channel).await;
        channel.close();

        let msg = within(server.next()).await.unwrap().unwrap();
        match msg {
            Message::Close(Some(frame)) => assert_eq!(frame.code, CloseCode::Normal),
            other => panic!("expected close frame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_connect_twice_is_rejected() {
        let (_listener, url) = bind().await;
        let channel = WebSocketChannel::new(fast_policy());
        channel.connect(&url).unwrap();
        assert_eq!(channel.connect(&url), Err(TransportError::AlreadyStarted));
        channel.shutdown().await;
    }

    #[tokio::test]
    async fn test_connect_after_close_is_rejected() {
        let channel = WebSocketChannel::new(fast_policy());
        let mut inbound = channel.data_stream();
        channel.close();
        assert_eq!(
            channel.connect("ws://127.0.0.1:1"),
            Err(TransportError::Shutdown)
        );
        assert_eq!(inbound.next().await, None);
    }
}
