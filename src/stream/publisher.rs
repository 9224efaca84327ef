// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Per-connection push delivery.
//!
//! A publisher moves through `Connected -> Streaming -> Closed`. Opening
//! sends one health frame and a full-history delta.
//! While streaming it coalesces change notifications behind a debounce
//! timer, pushes health on a fixed interval and writes heartbeats so idle
//! proxies keep the connection open. Closing is idempotent and every write
//! path checks for it first.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tracing::{debug, trace};

use super::frame::{Frame, TelemetryDelta, HEALTH_EVENT, TELEMETRY_EVENT};
use crate::error::StreamError;
use crate::health::HealthCollector;
use crate::store::{EmissionFilter, EntryKind, ErrorFilter, LogFilter, RunFilter, TelemetryStore};

/// Push cadence for one connection.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Delay between the first change notification and the delta push.
    pub debounce: Duration,
    pub health_interval: Duration,
    pub heartbeat_interval: Duration,
    /// Per-buffer cap on entries in one delta frame.
    pub max_entries_per_push: usize,
    /// Pause aggregation window for health frames.
    pub gc_window_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(100),
            health_interval: Duration::from_secs(2),
            heartbeat_interval: Duration::from_secs(15),
            max_entries_per_push: 1000,
            gc_window_ms: crate::health::DEFAULT_GC_WINDOW_MS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublisherState {
    Connected,
    Streaming,
    Closed,
}

/// Streams telemetry deltas and health to one writer.
pub struct StreamingPublisher<W> {
    writer: W,
    store: Arc<TelemetryStore>,
    health: Arc<HealthCollector>,
    config: StreamConfig,
    state: PublisherState,
    cursor: i64,
    changes: Option<broadcast::Receiver<EntryKind>>,
    frames_sent: u64,
}

impl<W: AsyncWrite + Unpin + Send> StreamingPublisher<W> {
    /// Subscribes to store changes immediately so nothing recorded between
    /// construction and [`open`](Self::open) is missed.
    pub fn new(
        writer: W,
        store: Arc<TelemetryStore>,
        health: Arc<HealthCollector>,
        config: StreamConfig,
    ) -> Self {
        let changes = Some(store.subscribe());
        Self {
            writer,
            store,
            health,
            config,
            state: PublisherState::Connected,
            cursor: 0,
            changes,
            frames_sent: 0,
        }
    }

    pub fn state(&self) -> PublisherState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == PublisherState::Closed
    }

    /// Timestamp watermark of everything already delivered.
    pub fn cursor(&self) -> i64 {
        self.cursor
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    /// Send an immediate health frame and the initial delta.
    ///
    /// If the store held nothing at all, the cursor jumps to just before now
    /// so later pushes only consider new entries.
    pub async fn open(&mut self) -> Result<(), StreamError> {
        if self.state != PublisherState::Connected {
            return Ok(());
        }

        self.push_health().await?;
        if self.push_delta().await? == 0 {
            self.cursor = chrono::Utc::now().timestamp_millis() - 1;
        }

        if self.state == PublisherState::Connected {
            self.state = PublisherState::Streaming;
        }
        debug!(cursor = self.cursor, "stream opened");
        Ok(())
    }

    /// Stream until `disconnect` resolves or a write fails.
    ///
    /// Opens first if needed. Always leaves the publisher closed.
    pub async fn run_until<D>(&mut self, disconnect: D) -> Result<(), StreamError>
    where
        D: Future<Output = ()>,
    {
        let result = self.stream(disconnect).await;
        self.close();
        result
    }

    async fn stream<D>(&mut self, disconnect: D) -> Result<(), StreamError>
    where
        D: Future<Output = ()>,
    {
        self.open().await?;
        let mut changes = match self.changes.take() {
            Some(changes) => changes,
            None => return Ok(()),
        };

        let start = Instant::now();
        let mut health = interval_at(start + self.config.health_interval, self.config.health_interval);
        health.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut heartbeat = interval_at(
            start + self.config.heartbeat_interval,
            self.config.heartbeat_interval,
        );
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // At most one debounce timer exists; it is re-armed, never duplicated.
        let debounce = sleep(self.config.debounce);
        tokio::pin!(debounce);
        let mut pending = false;

        tokio::pin!(disconnect);

        while self.state == PublisherState::Streaming {
            tokio::select! {
                _ = &mut disconnect => {
                    debug!("stream peer disconnected");
                    break;
                }
                change = changes.recv() => match change {
                    Ok(_) | Err(RecvError::Lagged(_)) => {
                        if !pending {
                            pending = true;
                            debounce.as_mut().reset(Instant::now() + self.config.debounce);
                        }
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = &mut debounce, if pending => {
                    pending = false;
                    self.push_delta().await?;
                }
                _ = health.tick() => {
                    self.push_health().await?;
                }
                _ = heartbeat.tick() => {
                    self.heartbeat().await?;
                }
            }
        }
        Ok(())
    }

    /// Push everything after the cursor. Returns the number of entries sent.
    ///
    /// Nothing is written when there is nothing new or the publisher is closed.
    pub async fn push_delta(&mut self) -> Result<usize, StreamError> {
        if self.is_closed() {
            return Ok(0);
        }

        let delta = self.collect_delta();
        let Some(newest) = delta.max_timestamp() else {
            return Ok(0);
        };
        let total = delta.total();

        self.write_frame(&Frame::event(TELEMETRY_EVENT, &delta)?).await?;
        self.cursor = self.cursor.max(newest);
        trace!(entries = total, cursor = self.cursor, "delta pushed");
        Ok(total)
    }

    fn collect_delta(&self) -> TelemetryDelta {
        let cursor = self.cursor;
        let last = i64::try_from(self.config.max_entries_per_push).unwrap_or(i64::MAX);

        TelemetryDelta {
            logs: self
                .store
                .get_logs(LogFilter::from(cursor).last(last))
                .into_iter()
                .map(Into::into)
                .collect(),
            emissions: self
                .store
                .get_emissions(EmissionFilter::from(cursor).last(last))
                .into_iter()
                .map(Into::into)
                .collect(),
            errors: self
                .store
                .get_errors(ErrorFilter::from(cursor).last(last))
                .into_iter()
                .map(Into::into)
                .collect(),
            runs: self.store.get_runs(RunFilter::from(cursor).last(last)),
        }
    }

    /// Write one health frame. Returns whether anything was written.
    pub async fn push_health(&mut self) -> Result<bool, StreamError> {
        if self.is_closed() {
            return Ok(false);
        }
        let snapshot = self.health.snapshot_with_window(self.config.gc_window_ms);
        self.write_frame(&Frame::event(HEALTH_EVENT, &snapshot)?).await?;
        Ok(true)
    }

    /// Write a comment-only keepalive frame.
    pub async fn heartbeat(&mut self) -> Result<bool, StreamError> {
        if self.is_closed() {
            return Ok(false);
        }
        self.write_frame(&Frame::Heartbeat).await?;
        Ok(true)
    }

    /// Unsubscribe from the store and suppress further writes.
    ///
    /// Timers live inside [`run_until`](Self::run_until) and stop with it.
    pub fn close(&mut self) {
        if self.state == PublisherState::Closed {
            return;
        }
        self.state = PublisherState::Closed;
        self.changes = None;
        debug!(frames = self.frames_sent, "stream closed");
    }

    /// Close and hand back the writer.
    pub fn into_writer(mut self) -> W {
        self.close();
        self.writer
    }

    async fn write_frame(&mut self, frame: &Frame) -> Result<(), StreamError> {
        self.write_raw(frame.encode().as_bytes()).await?;
        self.frames_sent += 1;
        Ok(())
    }

    async fn write_raw(&mut self, bytes: &[u8]) -> Result<(), StreamError> {
        if self.is_closed() {
            return Err(StreamError::Closed);
        }
        let written = async {
            self.writer.write_all(bytes).await?;
            self.writer.flush().await
        }
        .await;

        if let Err(err) = written {
            debug!(error = %err, "stream write failed");
            self.close();
            return Err(StreamError::Io(err));
        }
        Ok(())
    }
}
