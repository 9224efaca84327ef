// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Unit-of-work timing.
//!
//! [`RunTracker::run`] is the entry point task and hook executors wrap
//! around each unit: it scopes the correlation chain, times the future and
//! records the outcome. [`RunSpan`] is the guard underneath for callers that
//! manage the scope themselves.

use std::fmt;
use std::future::Future;
use std::time::Instant;

use tracing::{debug, info_span, Instrument, Span};

use crate::correlation::{derive_parent_and_root, with_unit_of_work, UnitLinks};
use crate::store::{ErrorPayload, NodeKind, TelemetryStore};

/// Timing guard for one unit of work.
///
/// Parent and root links are captured at [`RunSpan::start`], which must run
/// before the unit enters its own correlation scope.
pub struct RunSpan {
    node_id: String,
    kind: NodeKind,
    links: UnitLinks,
    start: Instant,
    span: Span,
}

impl RunSpan {
    pub fn start(node_id: impl Into<String>, kind: NodeKind) -> Self {
        let node_id = node_id.into();
        let links = derive_parent_and_root(&node_id);
        let span = info_span!(
            "run",
            node = %node_id,
            kind = ?kind,
            duration_ms = tracing::field::Empty,
            ok = tracing::field::Empty,
        );

        Self {
            node_id,
            kind,
            links,
            start: Instant::now(),
            span,
        }
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn links(&self) -> &UnitLinks {
        &self.links
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }

    /// Record the run; on failure also record the error.
    pub fn finish<T, E: fmt::Display>(self, store: &TelemetryStore, result: &Result<T, E>) {
        let duration_ms = self.elapsed_ms();
        let ok = result.is_ok();
        self.span.record("duration_ms", duration_ms);
        self.span.record("ok", ok);

        let error = result.as_ref().err().map(|err| {
            let message = err.to_string();
            // Alternate form carries the cause chain for anyhow-style errors.
            let detailed = format!("{:#}", err);
            let payload = if detailed != message {
                ErrorPayload::new(message).with_stack(detailed)
            } else {
                ErrorPayload::new(message)
            };
            store.record_error(self.node_id.clone(), self.kind.into(), payload.clone(), None);
            payload.message
        });

        debug!(parent: &self.span, node = %self.node_id, ok, duration_ms, "run finished");
        store.record_run(
            self.node_id,
            self.kind,
            duration_ms,
            ok,
            error,
            self.links.parent_id,
            Some(self.links.root_id),
        );
    }
}

/// Wraps executions of tasks and hooks.
pub struct RunTracker;

impl RunTracker {
    /// Run `fut` as unit of work `node_id` and record the outcome.
    ///
    /// The result is returned unchanged; recording never fails the caller.
    pub async fn run<F, T, E>(
        store: &TelemetryStore,
        node_id: impl Into<String>,
        kind: NodeKind,
        fut: F,
    ) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let run = RunSpan::start(node_id, kind);
        let span = run.span().clone();
        let node_id = run.node_id.clone();

        with_unit_of_work(
            node_id,
            async move {
                let result = fut.await;
                run.finish(store, &result);
                result
            }
            .instrument(span),
        )
        .await
    }
}
