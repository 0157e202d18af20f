// SPDX-FileCopyrightText: 2026 Worksync Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Event System
//!
//! A typed event channel with explicit subscriber handles. Handlers are
//! dispatched in subscription order and can be removed individually, so
//! ordering and cancellation stay observable.

use std::sync::{Arc, Mutex};

use crate::sync::state::SyncStatus;

/// Events emitted by the sync engine.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// A sync cycle started.
    SyncStarted,

    /// A sync cycle finished.
    SyncCompleted {
        /// Whether any remote data was applied.
        took_remote: bool,
        /// Conflicts produced by this cycle.
        new_conflicts: usize,
    },

    /// A sync cycle failed.
    SyncFailed {
        /// Error description.
        error: String,
    },

    /// The coordinator changed status.
    StatusChanged {
        /// The new status.
        status: SyncStatus,
    },

    /// A concurrent edit needs a user decision.
    ConflictDetected {
        /// Conflict id.
        conflict_id: String,
        /// Affected top-level path.
        path: String,
    },

    /// A conflict was resolved.
    ConflictResolved {
        /// Conflict id.
        conflict_id: String,
    },

    /// This device can no longer decrypt envelopes and must re-pair.
    RepairRequired {
        /// Why re-pairing is needed.
        reason: String,
    },

    /// A device was paired (untrusted).
    DevicePaired {
        /// Device id.
        device_id: String,
    },

    /// A device was granted trust.
    DeviceTrusted {
        /// Device id.
        device_id: String,
    },

    /// A device was removed from the workspace.
    DeviceRemoved {
        /// Device id.
        device_id: String,
    },

    /// The workspace key was rotated.
    KeyRotated {
        /// New key epoch.
        epoch: u64,
    },
}

/// Event handler trait.
///
/// Implement this trait to receive sync events.
pub trait EventHandler: Send + Sync {
    /// Called when an event occurs.
    fn on_event(&self, event: SyncEvent);
}

/// Simple callback-based event handler.
///
/// Wraps a closure for easy event handling.
pub struct CallbackHandler<F>
where
    F: Fn(SyncEvent) + Send + Sync,
{
    callback: F,
}

impl<F> CallbackHandler<F>
where
    F: Fn(SyncEvent) + Send + Sync,
{
    /// Creates a new callback handler.
    pub fn new(callback: F) -> Self {
        CallbackHandler { callback }
    }
}

impl<F> EventHandler for CallbackHandler<F>
where
    F: Fn(SyncEvent) + Send + Sync,
{
    fn on_event(&self, event: SyncEvent) {
        (self.callback)(event);
    }
}

/// Handle identifying one subscription, for explicit unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberHandle(u64);

struct Subscriber {
    handle: SubscriberHandle,
    handler: Arc<dyn EventHandler>,
}

/// Typed event channel with subscriber handles.
#[derive(Default)]
pub struct EventBus {
    inner: Mutex<BusInner>,
}

#[derive(Default)]
struct BusInner {
    subscribers: Vec<Subscriber>,
    next_handle: u64,
}

impl EventBus {
    /// Creates an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a subscriber; the returned handle removes it again.
    pub fn subscribe(&self, handler: Arc<dyn EventHandler>) -> SubscriberHandle {
        let mut inner = self.lock();
        inner.next_handle += 1;
        let handle = SubscriberHandle(inner.next_handle);
        inner.subscribers.push(Subscriber { handle, handler });
        handle
    }

    /// Removes a subscriber. Returns true if it was registered.
    pub fn unsubscribe(&self, handle: SubscriberHandle) -> bool {
        let mut inner = self.lock();
        let before = inner.subscribers.len();
        inner.subscribers.retain(|s| s.handle != handle);
        inner.subscribers.len() != before
    }

    /// Number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    /// Dispatches an event to all subscribers in subscription order.
    pub fn dispatch(&self, event: SyncEvent) {
        // Clone handlers out so a handler can unsubscribe during dispatch
        // without deadlocking.
        let handlers: Vec<Arc<dyn EventHandler>> = self
            .lock()
            .subscribers
            .iter()
            .map(|s| s.handler.clone())
            .collect();
        for handler in handlers {
            handler.on_event(event.clone());
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BusInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}
