//! Tests for the namespace handshake
mod utils;

use std::time::Duration;

use fixture::{MockConnector, URI, accept, config, next, recorder};
use serde_json::json;
use sioclient::{ClientConfig, IoClient, ProtocolVersion, SocketOptions};

#[tokio::test]
pub async fn buffered_emits_are_sent_after_connect() {
    let (connector, mut conns) = MockConnector::new();
    let client = IoClient::with_connector(config(), connector);
    let socket = assert_ok!(client.socket(SocketOptions::new(URI).namespace("/chat")));
    let (tx, mut connected) = recorder();
    socket.on("connect", tx);

    assert_ok!(socket.emit("hello", [json!("world")]));
    assert_ok!(socket.emit("second", []));
    assert!(!socket.connected());

    let mut server = accept(&mut conns).await;
    assert_eq!(server.recv_text().await, "0/chat,");
    server.assert_silent().await;

    server.send("0/chat,");
    next(&mut connected).await;
    assert_eq!(server.recv_text().await, r#"2/chat,["hello","world"]"#);
    assert_eq!(server.recv_text().await, r#"2/chat,["second"]"#);
    assert!(socket.connected());
    let id = format!("/chat#{}", server.sid);
    assert_eq!(socket.id().as_deref(), Some(id.as_str()));

    assert_ok!(socket.emit("now", []));
    assert_eq!(server.recv_text().await, r#"2/chat,["now"]"#);
}

#[tokio::test]
pub async fn root_namespace_is_connected_by_the_server() {
    let (connector, mut conns) = MockConnector::new();
    let client = IoClient::with_connector(config(), connector.clone());
    let socket = assert_ok!(client.socket(SocketOptions::new(URI)));
    let (tx, mut connecting) = recorder();
    socket.on("connecting", tx);
    let (tx, mut connected) = recorder();
    socket.on("connect", tx);

    let mut server = accept(&mut conns).await;
    next(&mut connecting).await;
    server.assert_silent().await;
    server.send("0");
    next(&mut connected).await;
    assert_eq!(socket.id().as_deref(), Some(server.sid.as_str()));

    let url = &connector.requests()[0].url;
    assert_eq!(url, "ws://localhost:3000/socket.io/?EIO=3&transport=websocket");
}

#[tokio::test]
pub async fn v5_connects_root_with_auth() {
    let (connector, mut conns) = MockConnector::new();
    let config = ClientConfig {
        protocol: ProtocolVersion::V5,
        ..config()
    };
    let client = IoClient::with_connector(config, connector.clone());
    let socket = assert_ok!(client.socket(SocketOptions::new(URI).auth(json!({ "token": "abc" }))));
    let (tx, mut connected) = recorder();
    socket.on("connect", tx);

    let mut server = accept(&mut conns).await;
    assert_eq!(server.recv_text().await, r#"0{"token":"abc"}"#);
    server.send(r#"0{"sid":"xyz"}"#);
    next(&mut connected).await;
    assert_eq!(socket.id().as_deref(), Some("xyz"));
    assert!(connector.requests()[0].url.contains("EIO=4"));
}

#[tokio::test]
pub async fn v4_namespace_query() {
    let (connector, mut conns) = MockConnector::new();
    let client = IoClient::with_connector(config(), connector.clone());
    let _socket =
        assert_ok!(client.socket(SocketOptions::new(URI).namespace("/chat").query("token=1")));

    let mut server = accept(&mut conns).await;
    assert_eq!(server.recv_text().await, "0/chat?token=1,");
    assert!(connector.requests()[0].url.ends_with("&token=1"));
}

#[tokio::test]
pub async fn connect_error_from_server() {
    let (connector, mut conns) = MockConnector::new();
    let config = ClientConfig {
        protocol: ProtocolVersion::V5,
        ..config()
    };
    let client = IoClient::with_connector(config, connector);
    let socket = assert_ok!(client.socket(SocketOptions::new(URI).namespace("/admin")));
    let (tx, mut errors) = recorder();
    socket.on("connect_error", tx);

    let mut server = accept(&mut conns).await;
    assert_eq!(server.recv_text().await, "0/admin,");
    server.send(r#"4/admin,{"message":"unauthorized"}"#);
    assert_eq!(
        next(&mut errors).await,
        vec![json!({ "message": "unauthorized" })]
    );
    assert!(!socket.connected());
}

#[tokio::test]
pub async fn v4_error_packet_is_an_error_event() {
    let (connector, mut conns) = MockConnector::new();
    let client = IoClient::with_connector(config(), connector);
    let socket = assert_ok!(client.socket(SocketOptions::new(URI).namespace("/admin")));
    let (tx, mut errors) = recorder();
    socket.on("error", tx);
    let (tx, mut connect_errors) = recorder();
    socket.on("connect_error", tx);

    let mut server = accept(&mut conns).await;
    assert_eq!(server.recv_text().await, "0/admin,");
    server.send(r#"4/admin,"Not authorized""#);
    assert_eq!(next(&mut errors).await, vec![json!("Not authorized")]);
    assert!(connect_errors.try_recv().is_err());
    assert!(!socket.connected());
}

#[tokio::test]
pub async fn same_namespace_returns_the_same_socket() {
    let (connector, mut conns) = MockConnector::new();
    let client = IoClient::with_connector(config(), connector.clone());
    let first = assert_ok!(client.socket(SocketOptions::new(URI).namespace("/chat")));
    let second = assert_ok!(client.socket(SocketOptions::new(URI).namespace("chat")));
    let (tx, mut events) = recorder();
    first.on("news", tx);

    let mut server = accept(&mut conns).await;
    assert_eq!(server.recv_text().await, "0/chat,");
    server.send("0/chat,");
    server.send(r#"2/chat,["news",1]"#);
    assert_eq!(next(&mut events).await, vec![json!(1)]);
    assert!(second.connected());
    server.assert_silent().await;
    assert_eq!(connector.connects(), 1);
}

#[tokio::test]
pub async fn auto_connect_disabled() {
    let (connector, mut conns) = MockConnector::new();
    let config = ClientConfig {
        auto_connect: false,
        ..config()
    };
    let client = IoClient::with_connector(config, connector.clone());
    let socket = assert_ok!(client.socket(SocketOptions::new(URI).namespace("/chat")));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(connector.connects(), 0);

    socket.connect();
    let mut server = accept(&mut conns).await;
    assert_eq!(server.recv_text().await, "0/chat,");
}

#[tokio::test]
pub async fn connect_timeout() {
    struct Hanging;
    impl sioclient::Connector for Hanging {
        fn connect(
            &self,
            _: sioclient::ConnectRequest,
        ) -> futures_core::future::BoxFuture<
            'static,
            Result<sioclient::Connection, sioclient::TransportError>,
        > {
            Box::pin(std::future::pending())
        }
    }

    let config = ClientConfig {
        timeout: Some(Duration::from_millis(20)),
        reconnection: false,
        ..config()
    };
    let client = IoClient::with_connector(config, Hanging);
    let socket = assert_ok!(client.socket(SocketOptions::new(URI)));
    let (tx, mut timeouts) = recorder();
    socket.on("connect_timeout", tx);
    let (tx, mut errors) = recorder();
    socket.on("connect_error", tx);
    assert_eq!(next(&mut timeouts).await, vec![json!(20)]);
    let err = next(&mut errors).await;
    assert_eq!(err, vec![json!("transport error: connect timeout")]);
    assert_eq!(
        socket.manager().state(),
        sioclient::ConnectionState::Closed
    );
}
