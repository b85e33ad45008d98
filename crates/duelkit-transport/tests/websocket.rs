//! Integration tests for the WebSocket transport.
//!
//! These tests spin up a real loopback WebSocket server with
//! `tokio-tungstenite` and drive it with [`WebSocketConnector`] to verify
//! that frames actually flow over the network.

#[cfg(feature = "websocket")]
mod websocket {
    use duelkit_transport::{Connection, Connector, TransportError, WebSocketConnector};
    use futures_util::{SinkExt, StreamExt};
    use tokio::net::TcpListener;
    use tokio_tungstenite::tungstenite::Message;
    use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

    type ServerWs = tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>;

    /// Binds a loopback listener on an OS-assigned port and returns it with
    /// the `ws://` URL a client should dial.
    async fn listen() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("should bind");
        let addr = listener.local_addr().expect("should have addr");
        (listener, format!("ws://{addr}"))
    }

    async fn accept(listener: &TcpListener) -> ServerWs {
        let (stream, _) = listener.accept().await.expect("should accept");
        tokio_tungstenite::accept_async(stream)
            .await
            .expect("handshake should succeed")
    }

    #[tokio::test]
    async fn test_connect_send_and_receive_text() {
        let (listener, url) = listen().await;
        let server = tokio::spawn(async move {
            let mut ws = accept(&listener).await;
            let msg = ws.next().await.unwrap().unwrap();
            assert_eq!(msg, Message::Text(r#"{"action":"ping"}"#.into()));
            ws.send(Message::Text(r#"{"action":"pong"}"#.into()))
                .await
                .unwrap();
            ws
        });

        let conn = WebSocketConnector.connect(&url).await.expect("should connect");
        assert!(conn.id().into_inner() > 0);

        conn.send(r#"{"action":"ping"}"#).await.expect("send should succeed");
        let frame = conn
            .recv()
            .await
            .expect("recv should succeed")
            .expect("should have data");
        assert_eq!(frame, br#"{"action":"pong"}"#);

        let _server_ws = server.await.unwrap();
    }

    #[tokio::test]
    async fn test_recv_returns_none_when_server_closes() {
        let (listener, url) = listen().await;
        let server = tokio::spawn(async move {
            let mut ws = accept(&listener).await;
            ws.close(None).await.unwrap();
        });

        let conn = WebSocketConnector.connect(&url).await.unwrap();
        let result = conn.recv().await.expect("recv should not error");
        assert!(result.is_none(), "should return None on server close");
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_close_sends_normal_closure() {
        let (listener, url) = listen().await;
        let server = tokio::spawn(async move {
            let mut ws = accept(&listener).await;
            loop {
                match ws.next().await {
                    Some(Ok(Message::Close(frame))) => return frame,
                    Some(Ok(_)) => continue,
                    _ => return None,
                }
            }
        });

        let conn = WebSocketConnector.connect(&url).await.unwrap();
        conn.close("leaving").await.expect("close should succeed");

        let frame = server.await.unwrap().expect("server should see a close frame");
        assert_eq!(frame.code, CloseCode::Normal);
        assert_eq!(frame.reason.as_str(), "leaving");
    }

    #[tokio::test]
    async fn test_connect_to_closed_port_fails() {
        // Bind then drop to get a port nothing listens on.
        let (listener, url) = listen().await;
        drop(listener);

        let result = WebSocketConnector.connect(&url).await;
        assert!(matches!(result, Err(TransportError::ConnectFailed(_))));
    }
}
