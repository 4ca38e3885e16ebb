//! Tests for acknowledgements
mod utils;

use bytes::Bytes;
use fixture::root_socket;
use serde_json::json;
use sioclient::{AckError, Message, Payload};
use tokio::sync::mpsc;

#[tokio::test]
pub async fn ack_callback_is_called_once() {
    let (socket, mut server) = root_socket().await;
    let (tx, mut acks) = mpsc::unbounded_channel();
    assert_ok!(socket.emit_with_ack("ping", [json!(1)], move |payload| {
        tx.send(payload.args).unwrap();
    }));
    assert_eq!(server.recv_text().await, r#"20["ping",1]"#);
    server.send(r#"30["pong"]"#);
    server.send(r#"30["pong"]"#);
    assert_eq!(assert_some!(acks.recv().await), vec![json!("pong")]);

    // Ack ids are not reused
    let ack = assert_ok!(socket.emit_ack("ping", []));
    assert_eq!(server.recv_text().await, r#"21["ping"]"#);
    server.send(r#"31["pong2"]"#);
    let payload = assert_ok!(ack.await);
    assert_eq!(payload.args, vec![json!("pong2")]);
    assert!(acks.try_recv().is_err());
}

#[tokio::test]
pub async fn server_requested_ack() {
    let (socket, mut server) = root_socket().await;
    socket.on("question", |args| {
        if let Some(ack) = &args.ack {
            let mut reply = vec![json!("answer")];
            reply.extend(args.args.iter().cloned());
            ack.send(reply);
            ack.send([json!("twice")]);
        }
    });

    server.send(r#"25["question",1]"#);
    assert_eq!(server.recv_text().await, r#"35["answer",1]"#);
    server.assert_silent().await;
}

#[tokio::test]
pub async fn ack_future_is_closed_with_the_socket() {
    let (socket, mut server) = root_socket().await;
    let ack = assert_ok!(socket.emit_ack("ping", []));
    assert_eq!(server.recv_text().await, r#"20["ping"]"#);
    socket.close();
    assert_eq!(assert_err!(ack.await), AckError::Closed);
}

#[tokio::test]
pub async fn binary_event_with_ack() {
    let (socket, mut server) = root_socket().await;
    let ack = assert_ok!(socket.emit_ack("upload", [json!("a.txt")]));
    assert_eq!(server.recv_text().await, r#"20["upload","a.txt"]"#);

    server.send(r#"61-0[{"_placeholder":true,"num":0}]"#);
    server.send_bin(b"stored");
    let payload: Payload = assert_ok!(ack.await);
    assert_eq!(
        payload.attachment_for(&payload.args[0]),
        Some(&Bytes::from_static(b"stored"))
    );
}

#[tokio::test]
pub async fn binary_emit() {
    let (socket, mut server) = root_socket().await;
    assert_ok!(socket.emit_with_binary(
        "file",
        [json!("a.txt"), Payload::placeholder(0)],
        vec![Bytes::from_static(b"data")],
    ));
    assert_eq!(
        server.recv_text().await,
        r#"51-["file","a.txt",{"_placeholder":true,"num":0}]"#
    );
    assert_eq!(
        server.recv().await,
        Message::Binary(Bytes::from_static(b"data"))
    );
}
