// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Ambient per-call-chain context.
//!
//! The context lives in a tokio task-local and is scoped over a whole future,
//! so everything the future awaits sees it. Forking copies the chain; a
//! nested scope never mutates the context its caller observes.

use std::future::Future;
use std::sync::Arc;

use super::id::CorrelationId;

tokio::task_local! {
    static UNIT_OF_WORK: CorrelationContext;
}

/// Correlation id plus the stack of in-flight unit-of-work ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationContext {
    correlation_id: CorrelationId,
    chain: Arc<[String]>,
}

impl CorrelationContext {
    /// A root context with an empty chain.
    pub fn root(correlation_id: CorrelationId) -> Self {
        Self {
            correlation_id,
            chain: Arc::from(Vec::new()),
        }
    }

    /// Copy this context with `id` appended to the chain.
    pub fn fork(&self, id: impl Into<String>) -> Self {
        let mut chain = Vec::with_capacity(self.chain.len() + 1);
        chain.extend(self.chain.iter().cloned());
        chain.push(id.into());
        Self {
            correlation_id: self.correlation_id.clone(),
            chain: Arc::from(chain),
        }
    }

    pub fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    /// Unit ids from the root to the currently executing unit.
    pub fn chain(&self) -> &[String] {
        &self.chain
    }

    /// Id of the unit currently executing, if any.
    pub fn current_unit(&self) -> Option<&str> {
        self.chain.last().map(String::as_str)
    }
}

/// Parent/root links of a unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitLinks {
    pub parent_id: Option<String>,
    pub root_id: String,
}

impl UnitLinks {
    /// Links for `id` entering underneath `chain`.
    ///
    /// The parent is the last element of the chain, the root its first
    /// element; an empty chain makes `id` its own root.
    pub fn from_chain(chain: &[String], id: &str) -> Self {
        Self {
            parent_id: chain.last().cloned(),
            root_id: chain.first().cloned().unwrap_or_else(|| id.to_string()),
        }
    }
}

/// Snapshot of the ambient context, if one is established.
pub fn current_context() -> Option<CorrelationContext> {
    UNIT_OF_WORK.try_with(CorrelationContext::clone).ok()
}

/// The ambient correlation id, or `None` outside any chain.
pub fn current_correlation_id() -> Option<CorrelationId> {
    UNIT_OF_WORK
        .try_with(|ctx| ctx.correlation_id.clone())
        .ok()
}

/// Run `fut` as the unit of work `id`.
///
/// Outside any chain a fresh correlation id is generated. Inside one, the
/// chain is copied with `id` appended and the correlation id is inherited.
/// The caller's context is back in place once `fut` completes, fails, or is
/// dropped.
pub async fn with_unit_of_work<F>(id: impl Into<String>, fut: F) -> F::Output
where
    F: Future,
{
    let ctx = entered_context(id.into());
    UNIT_OF_WORK.scope(ctx, fut).await
}

/// Synchronous counterpart of [`with_unit_of_work`].
pub fn sync_unit_of_work<R>(id: impl Into<String>, f: impl FnOnce() -> R) -> R {
    let ctx = entered_context(id.into());
    UNIT_OF_WORK.sync_scope(ctx, f)
}

/// Run `fut` under a root context seeded from an inbound correlation id.
///
/// An existing ambient context always wins. Otherwise the supplied id is
/// used verbatim, or a new one is generated when none was supplied.
pub async fn with_correlation<F>(inbound: Option<String>, fut: F) -> F::Output
where
    F: Future,
{
    if current_context().is_some() {
        return fut.await;
    }
    let id = match inbound {
        Some(id) if !id.trim().is_empty() => CorrelationId::from(id),
        _ => CorrelationId::new(),
    };
    UNIT_OF_WORK.scope(CorrelationContext::root(id), fut).await
}

/// Carry the caller's context into `fut`.
///
/// Task-locals do not follow `tokio::spawn`; wrap the spawned future with
/// this so nested recordings keep their chain. The context is captured when
/// `propagate` is called, not when the future is first polled.
pub fn propagate<F>(fut: F) -> impl Future<Output = F::Output>
where
    F: Future,
{
    let ctx = current_context();
    async move {
        match ctx {
            Some(ctx) => UNIT_OF_WORK.scope(ctx, fut).await,
            None => fut.await,
        }
    }
}

/// Parent and root of `id` entering underneath the ambient chain.
///
/// Must be called before `id` pushes itself. The parent is the innermost
/// element of the chain even when it carries the same id, so a unit that
/// re-enters itself keeps the link to its caller.
pub fn derive_parent_and_root(id: &str) -> UnitLinks {
    match current_context() {
        Some(ctx) => UnitLinks::from_chain(ctx.chain(), id),
        None => UnitLinks::from_chain(&[], id),
    }
}

/// Links of the unit currently executing, seen from inside it.
///
/// Drops the innermost element of the chain, which is the running unit
/// itself. `None` outside any unit of work.
pub fn current_unit_links() -> Option<UnitLinks> {
    let ctx = current_context()?;
    let (current, before) = ctx.chain().split_last()?;
    Some(UnitLinks::from_chain(before, current))
}

fn entered_context(id: String) -> CorrelationContext {
    match current_context() {
        Some(parent) => parent.fork(id),
        None => CorrelationContext::root(CorrelationId::new()).fork(id),
    }
}
