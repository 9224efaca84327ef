// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The live routes, through the router and over a real loopback socket.

use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, BodyDataStream};
use axum::http::{Request, StatusCode};
use futures::StreamExt;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tower::ServiceExt;

use livetrace::health::{HealthCollector, HealthConfig, HealthSnapshot};
use livetrace::store::{LogLevel, TelemetryStore};
use livetrace::stream::{
    Frame, LiveServer, ServerConfig, StreamConfig, TelemetryDelta, HEALTH_EVENT, HEALTH_PATH,
    STREAM_PATH, TELEMETRY_EVENT,
};

fn live_server() -> (Arc<LiveServer>, Arc<TelemetryStore>) {
    let store = Arc::new(TelemetryStore::default());
    let health = Arc::new(HealthCollector::new(HealthConfig::default()));
    let config = ServerConfig {
        bind: "127.0.0.1:0".to_string(),
        stream: StreamConfig {
            debounce: Duration::from_millis(20),
            ..StreamConfig::default()
        },
        ..ServerConfig::default()
    };
    let server = Arc::new(LiveServer::new(Arc::clone(&store), health, config));
    (server, store)
}

fn stream_request(correlation_id: Option<&str>) -> Request<Body> {
    let mut request = Request::builder().uri(STREAM_PATH);
    if let Some(id) = correlation_id {
        request = request.header("x-correlation-id", id);
    }
    request.body(Body::empty()).unwrap()
}

/// Read body chunks until a frame named `name` decodes.
async fn next_frame<T>(body: &mut BodyDataStream, text: &mut String, name: &str) -> T
where
    T: for<'de> serde::Deserialize<'de>,
{
    loop {
        let found = Frame::parse_all(text)
            .iter()
            .filter(|frame| frame.name() == Some(name))
            .find_map(|frame| frame.decode::<T>());
        if let Some(found) = found {
            return found;
        }
        let chunk = timeout(Duration::from_secs(5), body.next())
            .await
            .unwrap()
            .expect("stream ended early")
            .unwrap();
        text.push_str(&String::from_utf8_lossy(&chunk));
    }
}

// ============================================================================
// Router
// ============================================================================

#[tokio::test]
async fn test_stream_route_pushes_new_entries() {
    let (server, store) = live_server();
    let response = Arc::clone(&server)
        .router()
        .oneshot(stream_request(Some("dash-1")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "text/event-stream");
    assert_eq!(response.headers()["x-correlation-id"], "dash-1");
    assert_eq!(store.notifier().receiver_count(), 1);

    let mut body = response.into_body().into_data_stream();
    let mut text = String::new();
    let _: HealthSnapshot = next_frame(&mut body, &mut text, HEALTH_EVENT).await;

    store.log(LogLevel::Warn, "disk almost full");
    let delta: TelemetryDelta = next_frame(&mut body, &mut text, TELEMETRY_EVENT).await;
    assert_eq!(delta.logs.len(), 1);
    assert_eq!(delta.logs[0].level, LogLevel::Warn);
    assert_eq!(delta.logs[0].message, "disk almost full");

    // Dropping the body is the disconnect; the publisher unsubscribes.
    drop(body);
    for _ in 0..100 {
        if store.notifier().receiver_count() == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(store.notifier().receiver_count(), 0);
}

#[tokio::test]
async fn test_stream_without_inbound_id_gets_a_generated_one() {
    let (server, _store) = live_server();
    let response = server.router().oneshot(stream_request(None)).await.unwrap();

    let id = response.headers()["x-correlation-id"].to_str().unwrap();
    assert!(!id.is_empty());
    assert_ne!(id, "dash-1");
}

#[tokio::test]
async fn test_health_route_returns_a_snapshot() {
    let (server, _store) = live_server();
    let response = server
        .router()
        .oneshot(Request::builder().uri(HEALTH_PATH).body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "application/json");
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let snapshot: HealthSnapshot = serde_json::from_slice(&bytes).unwrap();
    assert!(snapshot.cpu.usage >= 0.0);
}

// ============================================================================
// Socket
// ============================================================================

/// Send a request and read until the server closes the connection.
async fn request(addr: std::net::SocketAddr, raw: &str) -> String {
    let mut socket = TcpStream::connect(addr).await.unwrap();
    socket.write_all(raw.as_bytes()).await.unwrap();
    let mut response = String::new();
    timeout(Duration::from_secs(5), socket.read_to_string(&mut response))
        .await
        .unwrap()
        .unwrap();
    response
}

async fn start_serving() -> (
    std::net::SocketAddr,
    oneshot::Sender<()>,
    JoinHandle<std::io::Result<()>>,
) {
    let (server, _store) = live_server();
    let listener = server.bind().await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (stop, stopped) = oneshot::channel::<()>();
    let serving = tokio::spawn(server.serve(listener, async move {
        let _ = stopped.await;
    }));
    (addr, stop, serving)
}

#[tokio::test]
async fn test_serve_answers_over_tcp_until_shutdown() {
    let (addr, stop, serving) = start_serving().await;

    let missing = request(addr, "GET /nope HTTP/1.1\r\nHost: x\r\nConnection: close\r\n\r\n").await;
    assert!(missing.starts_with("HTTP/1.1 404"));

    let posted = request(
        addr,
        "POST /live/health HTTP/1.1\r\nHost: x\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
    )
    .await;
    assert!(posted.starts_with("HTTP/1.1 405"));

    let health = request(addr, "GET /live/health HTTP/1.1\r\nHost: x\r\nConnection: close\r\n\r\n").await;
    let (head, body) = health.split_once("\r\n\r\n").unwrap();
    assert!(head.starts_with("HTTP/1.1 200 OK"));
    let snapshot: HealthSnapshot = serde_json::from_str(body).unwrap();
    assert!(snapshot.cpu.usage >= 0.0);

    let _ = stop.send(());
    timeout(Duration::from_secs(5), serving)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_endless_request_head_is_cut_off() {
    let (addr, stop, _serving) = start_serving().await;
    let socket = TcpStream::connect(addr).await.unwrap();
    let (mut read_half, mut write_half) = socket.into_split();

    // Never sends a newline and never closes the write side.
    tokio::spawn(async move {
        let _ = write_half.write_all(b"GET /").await;
        let _ = write_half.write_all(&vec![b'a'; 4 << 20]).await;
        std::future::pending::<()>().await;
    });

    let mut response = Vec::new();
    let outcome = timeout(Duration::from_secs(5), read_half.read_to_end(&mut response)).await;
    assert!(outcome.is_ok(), "server kept buffering an oversized head");
    if !response.is_empty() {
        assert!(String::from_utf8_lossy(&response).starts_with("HTTP/1.1 4"));
    }
    let _ = stop.send(());
}
