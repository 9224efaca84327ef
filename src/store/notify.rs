// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Change notification for the telemetry store.
//!
//! Two delivery paths run after every record call: synchronous callbacks
//! registered with [`ChangeNotifier::on_record`], and a broadcast channel for
//! async consumers. Both carry only the [`EntryKind`].

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tokio::sync::broadcast;
use tracing::warn;

use super::entries::EntryKind;

/// Broadcast capacity. Slow receivers see `Lagged` and should re-query.
pub const CHANNEL_CAPACITY: usize = 64;

type Listener = Arc<dyn Fn(EntryKind) + Send + Sync>;
type Registry = Mutex<Vec<(u64, Listener)>>;

pub struct ChangeNotifier {
    listeners: Arc<Registry>,
    next_id: AtomicU64,
    sender: broadcast::Sender<EntryKind>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            listeners: Arc::new(Mutex::new(Vec::new())),
            next_id: AtomicU64::new(0),
            sender,
        }
    }

    /// Register a callback run synchronously after each record.
    pub fn on_record<F>(&self, callback: F) -> ListenerHandle
    where
        F: Fn(EntryKind) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(callback)));
        ListenerHandle {
            id,
            registry: Arc::downgrade(&self.listeners),
            active: AtomicBool::new(true),
        }
    }

    /// Receiver for async consumers.
    pub fn subscribe(&self) -> broadcast::Receiver<EntryKind> {
        self.sender.subscribe()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Open broadcast receivers, i.e. live async consumers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Fan out `kind`. Must be called without any buffer lock held.
    pub fn notify(&self, kind: EntryKind) {
        // Snapshot so callbacks may (un)register without deadlocking.
        let listeners: Vec<Listener> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(kind))).is_err() {
                warn!(kind = ?kind, "record listener panicked; ignoring");
            }
        }

        // No receivers is not an error.
        let _ = self.sender.send(kind);
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("listeners", &self.listener_count())
            .field("receivers", &self.receiver_count())
            .finish()
    }
}

/// Deregisters a callback. Dropping the handle leaves the callback registered.
#[derive(Debug)]
pub struct ListenerHandle {
    id: u64,
    registry: Weak<Registry>,
    active: AtomicBool,
}

impl ListenerHandle {
    /// Remove the callback. Later calls do nothing.
    pub fn unsubscribe(&self) {
        if !self.active.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(registry) = self.registry.upgrade() {
            registry
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .retain(|(id, _)| *id != self.id);
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}
