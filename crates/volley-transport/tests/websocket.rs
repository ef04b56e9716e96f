//! Integration tests for the WebSocket transport.
//!
//! A real listener is bound on an OS-assigned port and driven by a
//! `tokio-tungstenite` client.

#[cfg(feature = "websocket")]
mod websocket {
    use futures_util::{SinkExt, StreamExt};
    use tokio_tungstenite::tungstenite::Message;
    use volley_transport::{
        Connection, Inbound, Transport, WebSocketConnection, WebSocketTransport,
    };

    type ClientWs = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >;

    /// Binds on port 0, connects one client, and returns both ends.
    async fn connected_pair() -> (WebSocketConnection, ClientWs) {
        let mut transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport.local_addr().expect("local addr");

        let server_handle = tokio::spawn(async move {
            transport.accept().await.expect("should accept")
        });

        let (client_ws, _) =
            tokio_tungstenite::connect_async(format!("ws://{addr}"))
                .await
                .expect("client should connect");
        let server_conn = server_handle.await.expect("accept task");
        (server_conn, client_ws)
    }

    #[tokio::test]
    async fn test_websocket_text_round_trip() {
        let (server_conn, mut client_ws) = connected_pair().await;
        assert!(server_conn.id().get() > 0);

        server_conn
            .send(r#"{"type":"pong"}"#)
            .await
            .expect("send should succeed");

        let msg = client_ws.next().await.unwrap().unwrap();
        assert!(msg.is_text(), "server must send text frames");
        assert_eq!(msg.into_text().unwrap().as_str(), r#"{"type":"pong"}"#);

        client_ws
            .send(Message::Text(r#"{"type":"ping"}"#.to_string().into()))
            .await
            .unwrap();

        let received = server_conn
            .recv()
            .await
            .expect("recv should succeed")
            .expect("should have data");
        assert_eq!(received, Inbound::Text(r#"{"type":"ping"}"#.into()));

        server_conn.close().await.expect("close should succeed");
    }

    #[tokio::test]
    async fn test_websocket_binary_frame_is_read_as_text() {
        let (server_conn, mut client_ws) = connected_pair().await;

        client_ws
            .send(Message::Binary(b"{\"a\":1}".to_vec().into()))
            .await
            .unwrap();

        let received = server_conn.recv().await.unwrap().unwrap();
        assert_eq!(received, Inbound::Text("{\"a\":1}".into()));
    }

    #[tokio::test]
    async fn test_websocket_binary_frame_with_bad_utf8_is_malformed() {
        let (server_conn, mut client_ws) = connected_pair().await;

        client_ws
            .send(Message::Binary(b"{\"m\":\"\xff\xfe\"}".to_vec().into()))
            .await
            .unwrap();
        client_ws
            .send(Message::Text("after".to_string().into()))
            .await
            .unwrap();

        let received = server_conn.recv().await.unwrap().unwrap();
        assert!(matches!(received, Inbound::Malformed(ref why) if why.contains("UTF-8")));
        let next = server_conn.recv().await.unwrap().unwrap();
        assert_eq!(next, Inbound::Text("after".into()));
    }

    #[tokio::test]
    async fn test_websocket_send_while_reader_is_waiting() {
        // The reader holds the stream half; sends must not wait on it.
        let (server_conn, mut client_ws) = connected_pair().await;
        let server_conn = std::sync::Arc::new(server_conn);

        let reader = {
            let conn = std::sync::Arc::clone(&server_conn);
            tokio::spawn(async move { conn.recv().await })
        };
        tokio::task::yield_now().await;

        tokio::time::timeout(
            std::time::Duration::from_secs(2),
            server_conn.send("broadcast"),
        )
        .await
        .expect("send must not block on a pending recv")
        .expect("send should succeed");

        let msg = client_ws.next().await.unwrap().unwrap();
        assert_eq!(msg.into_text().unwrap().as_str(), "broadcast");

        client_ws.send(Message::Close(None)).await.unwrap();
        let result = reader.await.unwrap().expect("recv should not error");
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_websocket_recv_returns_none_on_client_close() {
        let (server_conn, mut client_ws) = connected_pair().await;

        client_ws.send(Message::Close(None)).await.unwrap();

        let result = server_conn.recv().await.expect("recv should not error");
        assert!(result.is_none(), "should return None on client close");
    }
}
