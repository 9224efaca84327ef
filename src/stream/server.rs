// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! HTTP transport for the live stream, built on axum.
//!
//! # Endpoints
//!
//! - `GET /live/stream` - event stream driven by a [`StreamingPublisher`]
//! - `GET /live/health` - one JSON [`HealthSnapshot`](crate::health::HealthSnapshot)

use std::future::{Future, IntoFuture};
use std::io;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderName, HeaderValue},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use futures::StreamExt;
use tokio::io::duplex;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, info_span, warn, Instrument};

use super::frame::EVENT_STREAM_CONTENT_TYPE;
use super::publisher::{StreamConfig, StreamingPublisher};
use crate::correlation::{with_correlation, CorrelationId};
use crate::health::HealthCollector;
use crate::store::TelemetryStore;

pub const STREAM_PATH: &str = "/live/stream";
pub const HEALTH_PATH: &str = "/live/health";

/// Bytes buffered between the publisher and the response body.
const PIPE_CAPACITY: usize = 64 * 1024;

/// Server settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: String,
    /// Request header carrying a caller-supplied correlation id.
    pub correlation_header: String,
    pub stream: StreamConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:7878".to_string(),
            correlation_header: "x-correlation-id".to_string(),
            stream: StreamConfig::default(),
        }
    }
}

/// Serves the live routes.
#[derive(Debug)]
pub struct LiveServer {
    store: Arc<TelemetryStore>,
    health: Arc<HealthCollector>,
    config: ServerConfig,
}

impl LiveServer {
    pub fn new(
        store: Arc<TelemetryStore>,
        health: Arc<HealthCollector>,
        config: ServerConfig,
    ) -> Self {
        Self {
            store,
            health,
            config,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Build the router. Unknown paths get 404, other methods 405.
    pub fn router(self: Arc<Self>) -> Router {
        Router::new()
            .route(STREAM_PATH, get(stream_handler))
            .route(HEALTH_PATH, get(health_handler))
            .with_state(self)
    }

    pub async fn bind(&self) -> io::Result<TcpListener> {
        let listener = TcpListener::bind(&self.config.bind).await?;
        info!(addr = %listener.local_addr()?, "live server listening");
        Ok(listener)
    }

    /// Serve until `shutdown` resolves.
    ///
    /// Open streams never complete on their own, so shutdown stops accepting
    /// without waiting for them.
    pub async fn serve<S>(self: Arc<Self>, listener: TcpListener, shutdown: S) -> io::Result<()>
    where
        S: Future<Output = ()>,
    {
        let serving = axum::serve(listener, self.router()).into_future();
        tokio::select! {
            result = serving => result,
            _ = shutdown => {
                info!("live server stopping");
                Ok(())
            }
        }
    }

    fn inbound_correlation(&self, headers: &HeaderMap) -> Option<CorrelationId> {
        headers
            .get(self.config.correlation_header.as_str())
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(CorrelationId::from_external)
    }
}

async fn health_handler(State(server): State<Arc<LiveServer>>) -> impl IntoResponse {
    Json(server.health.snapshot())
}

/// Spawns a publisher writing into a pipe whose read end is the body.
///
/// The connection's correlation id comes from the inbound header, or is
/// generated, and is echoed back in the same header.
async fn stream_handler(
    State(server): State<Arc<LiveServer>>,
    headers: HeaderMap,
) -> Response {
    let correlation_id = server.inbound_correlation(&headers).unwrap_or_default();
    let (writer, reader) = duplex(PIPE_CAPACITY);
    let (alive, gone) = oneshot::channel::<()>();

    let mut publisher = StreamingPublisher::new(
        writer,
        Arc::clone(&server.store),
        Arc::clone(&server.health),
        server.config.stream.clone(),
    );
    let span = info_span!("live_stream", correlation_id = %correlation_id);
    tokio::spawn(
        with_correlation(Some(correlation_id.to_string()), async move {
            debug!("stream connected");
            let result = publisher
                .run_until(async move {
                    let _ = gone.await;
                })
                .await;
            match result {
                Ok(()) => debug!(frames = publisher.frames_sent(), "stream disconnected"),
                Err(err) if err.is_disconnect() => {
                    debug!(frames = publisher.frames_sent(), "stream dropped")
                }
                Err(err) => warn!(error = %err, "stream failed"),
            }
        })
        .instrument(span),
    );

    // The body owns `alive`; dropping the body resolves `gone`.
    let body = ReaderStream::new(reader).map(move |chunk| {
        let _ = &alive;
        chunk
    });

    let mut response = (
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(EVENT_STREAM_CONTENT_TYPE)),
            (header::CACHE_CONTROL, HeaderValue::from_static("no-cache")),
            (
                HeaderName::from_static("x-accel-buffering"),
                HeaderValue::from_static("no"),
            ),
        ],
        Body::from_stream(body),
    )
        .into_response();

    if let (Ok(name), Ok(value)) = (
        HeaderName::try_from(server.config.correlation_header.as_str()),
        HeaderValue::from_str(correlation_id.as_str()),
    ) {
        response.headers_mut().insert(name, value);
    }
    response
}
