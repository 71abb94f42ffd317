//! Integration tests for the session bootstrap and stats client.
//!
//! A tiny raw-HTTP responder on loopback plays the chat server: it accepts
//! one connection, captures the request line, and writes a canned response.

use chatline_session::{
    SessionBootstrapper, SessionError, SessionId, StatsClient, Url,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// Serves exactly one request with `status` and `body`.
/// Resolves the returned receiver with the request line.
async fn serve_once(status: &str, body: &str) -> (Url, oneshot::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        // Read until the end of the headers; our requests have tiny bodies
        // that arrive with them.
        while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = stream.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }
        let text = String::from_utf8_lossy(&buf);
        let request_line = text.lines().next().unwrap_or_default().to_string();
        let _ = tx.send(request_line);
        stream.write_all(response.as_bytes()).await.unwrap();
        stream.shutdown().await.ok();
    });

    let base = Url::parse(&format!("http://{addr}")).unwrap();
    (base, rx)
}

fn http() -> reqwest::Client {
    reqwest::Client::new()
}

// =========================================================================
// SessionBootstrapper
// =========================================================================

#[tokio::test]
async fn test_bootstrap_success_returns_session_id() {
    let (base, request) = serve_once("200 OK", r#"{"sessionId":"abc123"}"#).await;
    let bootstrapper = SessionBootstrapper::new(http(), &base).unwrap();

    let id = bootstrapper.create_session().await;

    assert_eq!(id, Some(SessionId::new("abc123")));
    assert_eq!(request.await.unwrap(), "POST /api/session HTTP/1.1");
}

#[tokio::test]
async fn test_bootstrap_server_error_degrades_to_none() {
    let (base, _request) = serve_once("500 Internal Server Error", "{}").await;
    let bootstrapper = SessionBootstrapper::new(http(), &base).unwrap();

    assert_eq!(bootstrapper.create_session().await, None);
}

#[tokio::test]
async fn test_bootstrap_malformed_body_degrades_to_none() {
    let (base, _request) = serve_once("200 OK", "<html>oops</html>").await;
    let bootstrapper = SessionBootstrapper::new(http(), &base).unwrap();

    assert_eq!(bootstrapper.create_session().await, None);
}

#[tokio::test]
async fn test_bootstrap_empty_id_degrades_to_none() {
    let (base, _request) = serve_once("200 OK", r#"{"sessionId":""}"#).await;
    let bootstrapper = SessionBootstrapper::new(http(), &base).unwrap();

    assert_eq!(bootstrapper.create_session().await, None);
}

#[tokio::test]
async fn test_bootstrap_unreachable_server_degrades_to_none() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let base = Url::parse(&format!("http://{addr}")).unwrap();
    let bootstrapper = SessionBootstrapper::new(http(), &base).unwrap();

    assert_eq!(bootstrapper.create_session().await, None);
}

#[test]
fn test_bootstrap_endpoint_joins_base_url() {
    let base = Url::parse("https://chat.example.com:8443/").unwrap();
    let bootstrapper = SessionBootstrapper::new(http(), &base).unwrap();
    assert_eq!(
        bootstrapper.endpoint().as_str(),
        "https://chat.example.com:8443/api/session"
    );
}

// =========================================================================
// StatsClient
// =========================================================================

#[tokio::test]
async fn test_stats_fetch() {
    let (base, request) = serve_once(
        "200 OK",
        r#"{"activeThreads":2,"poolSize":8,"queueSize":1,"totalRequests":99}"#,
    )
    .await;
    let stats = StatsClient::new(http(), &base).unwrap().fetch().await.unwrap();

    assert_eq!(stats.active_threads, Some(2));
    assert_eq!(stats.pool_size, Some(8));
    assert_eq!(stats.queue_size, Some(1));
    assert_eq!(stats.total_requests, Some(99));
    assert_eq!(request.await.unwrap(), "GET /api/stats HTTP/1.1");
}

#[tokio::test]
async fn test_stats_error_status_is_reported() {
    let (base, _request) = serve_once("503 Service Unavailable", "").await;
    let err = StatsClient::new(http(), &base).unwrap().fetch().await.unwrap_err();

    assert!(matches!(err, SessionError::Status(s) if s.as_u16() == 503));
}
