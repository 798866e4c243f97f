//! End to end coverage of the session lifecycle over a real server:
//! handshake contents, message echo, heartbeat liveness and the close
//! reason reported for every termination path.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use socketry_engine::{handler::SessionHandler, CloseReason, Session};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;


use fixture::{create_server, create_ws_connection, OpenPacket};

#[derive(Debug)]
struct EchoHandler {
    disconnect_tx: mpsc::Sender<CloseReason>,
}

impl EchoHandler {
    fn new() -> (Self, mpsc::Receiver<CloseReason>) {
        let (disconnect_tx, rx) = mpsc::channel(10);
        (Self { disconnect_tx }, rx)
    }
}

impl SessionHandler for EchoHandler {
    fn on_connect(&self, _session: Arc<Session>) {}

    fn on_disconnect(&self, _session: Arc<Session>, reason: CloseReason) {
        self.disconnect_tx.try_send(reason).unwrap();
    }

    fn on_message(&self, msg: String, session: Arc<Session>) {
        session.emit(msg).ok();
    }
}

#[tokio::test]
async fn ws_handshake() {
    let (handler, _rx) = EchoHandler::new();
    create_server(handler, 3101).await;
    let mut ws = create_ws_connection(3101).await;

    let msg = ws.next().await.unwrap().unwrap();
    let data = msg.into_text().unwrap();
    assert_eq!(&data[..1], "0");
    let open: OpenPacket = serde_json::from_str(&data[1..]).unwrap();
    assert_eq!(open.sid.len(), 22);
    assert!(open.upgrades.is_empty());
    assert_eq!(open.ping_interval, 300);
    assert_eq!(open.ping_timeout, 200);
    assert_eq!(open.max_payload, 1_000_000);
}

#[tokio::test]
async fn message_echo() {
    let (handler, _rx) = EchoHandler::new();
    create_server(handler, 3102).await;
    let mut ws = create_ws_connection(3102).await;
    ws.next().await.unwrap().unwrap(); // open packet

    ws.send(Message::Text("4hello".to_string())).await.unwrap();
    let msg = ws.next().await.unwrap().unwrap();
    assert_eq!(msg.into_text().unwrap(), "4hello");
}

#[tokio::test]
async fn heartbeat_ping_pong() {
    let (handler, _rx) = EchoHandler::new();
    create_server(handler, 3103).await;
    let mut ws = create_ws_connection(3103).await;
    ws.next().await.unwrap().unwrap(); // open packet

    // two full ping/pong cycles
    for _ in 0..2 {
        let msg = tokio::time::timeout(Duration::from_millis(500), ws.next())
            .await
            .expect("timeout waiting for ping")
            .unwrap()
            .unwrap();
        assert_eq!(msg.into_text().unwrap(), "2");
        ws.send(Message::Text("3".to_string())).await.unwrap();
    }
}

#[tokio::test]
async fn heartbeat_timeout() {
    let (handler, mut rx) = EchoHandler::new();
    create_server(handler, 3104).await;
    let _ws = create_ws_connection(3104).await;

    let reason = tokio::time::timeout(Duration::from_millis(1000), rx.recv())
        .await
        .expect("timeout waiting for CloseReason::PingTimeout")
        .unwrap();
    assert_eq!(reason, CloseReason::PingTimeout);
    assert_eq!(reason.to_string(), "ping timeout");
}

#[tokio::test]
async fn client_close_packet() {
    let (handler, mut rx) = EchoHandler::new();
    create_server(handler, 3105).await;
    let mut ws = create_ws_connection(3105).await;
    ws.next().await.unwrap().unwrap(); // open packet

    ws.send(Message::Text("1".to_string())).await.unwrap();

    let reason = tokio::time::timeout(Duration::from_millis(100), rx.recv())
        .await
        .expect("timeout waiting for CloseReason::ClientClose")
        .unwrap();
    assert_eq!(reason, CloseReason::ClientClose);
    assert_eq!(reason.to_string(), "client closed");
}

#[tokio::test]
async fn client_ws_close() {
    let (handler, mut rx) = EchoHandler::new();
    create_server(handler, 3106).await;
    let mut ws = create_ws_connection(3106).await;
    ws.next().await.unwrap().unwrap(); // open packet

    ws.close(None).await.unwrap();

    let reason = tokio::time::timeout(Duration::from_millis(100), rx.recv())
        .await
        .expect("timeout waiting for CloseReason::ClientClose")
        .unwrap();
    assert_eq!(reason, CloseReason::ClientClose);
}

#[tokio::test]
async fn malformed_frames_are_dropped() {
    let (handler, mut rx) = EchoHandler::new();
    create_server(handler, 3107).await;
    let mut ws = create_ws_connection(3107).await;
    ws.next().await.unwrap().unwrap(); // open packet

    // not a packet at all, the session must survive it
    ws.send(Message::Text("zzz-not-a-packet".to_string()))
        .await
        .unwrap();
    ws.send(Message::Text("4still-alive".to_string()))
        .await
        .unwrap();

    let msg = tokio::time::timeout(Duration::from_millis(200), ws.next())
        .await
        .expect("session should still echo")
        .unwrap()
        .unwrap();
    assert_eq!(msg.into_text().unwrap(), "4still-alive");
    assert!(rx.try_recv().is_err());
}
