//! End-to-end tests for `ChatClient` against a loopback WebSocket server.
//!
//! The HTTP side points at a port nobody listens on, so session bootstrap
//! always fails and the client has to carry on without a session id.

use std::time::Duration;

use chatline::{
    ChatClient, ChatError, ChatMessage, ConnectionObserver, ConnectionState,
    ReconnectConfig, RenderHandler,
};
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

type ServerWs = tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>;

#[derive(Debug, PartialEq, Eq)]
enum Seen {
    Connected(bool),
    ChatReady,
    Exhausted,
    Message(String, String, u64),
    Notification(String),
}

struct Recorder(mpsc::UnboundedSender<Seen>);

impl RenderHandler for Recorder {
    fn render_message(&mut self, m: &ChatMessage) {
        let _ = self
            .0
            .send(Seen::Message(m.username.clone(), m.content.clone(), m.timestamp));
    }

    fn render_notification(&mut self, text: &str) {
        let _ = self.0.send(Seen::Notification(text.into()));
    }
}

impl ConnectionObserver for Recorder {
    fn connectivity_changed(&mut self, connected: bool) {
        let _ = self.0.send(Seen::Connected(connected));
    }

    fn chat_ready(&mut self) {
        let _ = self.0.send(Seen::ChatReady);
    }

    fn reconnect_exhausted(&mut self, _error: &ChatError) {
        let _ = self.0.send(Seen::Exhausted);
    }
}

/// A port with nothing listening on it.
async fn dead_http_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

async fn accept(listener: &TcpListener) -> ServerWs {
    let (stream, _) = tokio::time::timeout(Duration::from_secs(5), listener.accept())
        .await
        .expect("client should connect in time")
        .unwrap();
    tokio_tungstenite::accept_async(stream).await.unwrap()
}

async fn next_json(server: &mut ServerWs) -> Value {
    let frame = tokio::time::timeout(Duration::from_secs(5), server.next())
        .await
        .expect("frame should arrive in time")
        .unwrap()
        .unwrap();
    serde_json::from_str(frame.to_text().unwrap()).unwrap()
}

async fn next_seen(rx: &mut mpsc::UnboundedReceiver<Seen>) -> Seen {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("notification should arrive in time")
        .unwrap()
}

async fn client_for(
    listener: &TcpListener,
    reconnect: ReconnectConfig,
) -> (ChatClient, mpsc::UnboundedReceiver<Seen>) {
    let port = listener.local_addr().unwrap().port();
    let (tx, rx) = mpsc::unbounded_channel();
    let client = ChatClient::builder()
        .server_url(&dead_http_url().await)
        .unwrap()
        .ws_port(port)
        .http_timeout(Duration::from_secs(2))
        .reconnect(reconnect)
        .build(Recorder(tx.clone()), Recorder(tx))
        .unwrap();
    (client, rx)
}

#[tokio::test]
async fn test_join_send_and_receive() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let (mut client, mut seen) = client_for(&listener, ReconnectConfig::default()).await;

    let session = client.join("  Alice  ").await.unwrap();
    assert_eq!(session, None);
    assert!(client.session_id().is_none());

    let mut server = accept(&listener).await;
    assert_eq!(next_json(&mut server).await, json!({"type": "join", "username": "Alice"}));
    assert_eq!(next_seen(&mut seen).await, Seen::Connected(true));
    assert_eq!(next_seen(&mut seen).await, Seen::ChatReady);
    assert_eq!(client.state().await.unwrap(), ConnectionState::Open);

    server
        .send(Message::Text(
            r#"{"type":"message","username":"Bob","content":"hi","timestamp":1000}"#.into(),
        ))
        .await
        .unwrap();
    server
        .send(Message::Text(r#"{"type":"notification","message":"Carol joined"}"#.into()))
        .await
        .unwrap();
    assert_eq!(
        next_seen(&mut seen).await,
        Seen::Message("Bob".into(), "hi".into(), 1000)
    );
    assert_eq!(
        next_seen(&mut seen).await,
        Seen::Notification("Carol joined".into())
    );

    client.send_message(" hello ").await.unwrap();
    assert_eq!(next_json(&mut server).await, json!({"type": "message", "content": "hello"}));

    client.shutdown().await;
}

#[tokio::test]
async fn test_invalid_input_is_rejected_before_any_network_action() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let (mut client, _seen) = client_for(&listener, ReconnectConfig::default()).await;

    assert!(matches!(client.join("a").await, Err(ChatError::Validation(_))));
    assert!(matches!(client.send_message("   ").await, Err(ChatError::Validation(_))));
    let long = "x".repeat(501);
    assert!(matches!(client.send_message(&long).await, Err(ChatError::Validation(_))));

    let nobody = tokio::time::timeout(Duration::from_millis(200), listener.accept()).await;
    assert!(nobody.is_err(), "nothing should have connected");
    assert_eq!(client.state().await.unwrap(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_send_before_connect_is_not_connected() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let (client, _seen) = client_for(&listener, ReconnectConfig::default()).await;

    assert!(matches!(
        client.send_message("hi").await,
        Err(ChatError::NotConnected)
    ));
}

#[tokio::test]
async fn test_reconnects_and_rejoins_after_peer_close() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let reconnect = ReconnectConfig {
        base_delay: Duration::from_millis(50),
        max_delay: Duration::from_millis(200),
        ..ReconnectConfig::default()
    };
    let (mut client, mut seen) = client_for(&listener, reconnect).await;
    client.join("Alice").await.unwrap();

    let mut first = accept(&listener).await;
    assert_eq!(next_json(&mut first).await["type"], "join");
    assert_eq!(next_seen(&mut seen).await, Seen::Connected(true));
    assert_eq!(next_seen(&mut seen).await, Seen::ChatReady);

    first.close(None).await.unwrap();
    assert_eq!(next_seen(&mut seen).await, Seen::Connected(false));

    let mut second = accept(&listener).await;
    assert_eq!(
        next_json(&mut second).await,
        json!({"type": "join", "username": "Alice"})
    );
    // No second chat-ready trigger.
    assert_eq!(next_seen(&mut seen).await, Seen::Connected(true));

    client.disconnect().await.unwrap();
    assert_eq!(next_seen(&mut seen).await, Seen::Connected(false));
    assert_eq!(client.state().await.unwrap(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_silent_server_counts_as_failed_attempt() {
    // Accepts TCP and never answers the upgrade.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (accepted_tx, mut accepted) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
            let _ = accepted_tx.send(());
        }
    });

    let (tx, mut seen) = mpsc::unbounded_channel();
    let mut client = ChatClient::builder()
        .server_url(&dead_http_url().await)
        .unwrap()
        .ws_port(port)
        .connect_timeout(Duration::from_millis(200))
        .reconnect(ReconnectConfig {
            base_delay: Duration::from_millis(50),
            max_delay: Duration::from_millis(50),
            max_attempts: 1,
            ..ReconnectConfig::default()
        })
        .build(Recorder(tx.clone()), Recorder(tx))
        .unwrap();
    client.join("Alice").await.unwrap();

    // First attempt times out, the backoff retry dials again, and once that
    // one times out too the client gives up.
    for _ in 0..2 {
        tokio::time::timeout(Duration::from_secs(5), accepted.recv())
            .await
            .expect("client should dial")
            .unwrap();
    }
    assert_eq!(next_seen(&mut seen).await, Seen::Exhausted);
    assert_eq!(client.state().await.unwrap(), ConnectionState::Closed);
}
