//! Typed multicast event dispatch.
//!
//! A [`Dispatcher<E>`] is one channel bound to one event kind. Listeners
//! subscribe with an `Arc<dyn Listener<E>>` and every [`Dispatcher::dispatch`]
//! calls them synchronously, on the calling thread, in subscription order.
//! There is no thread hop: callers on a worker thread that touch UI-owned
//! state must marshal before dispatching.
//!
//! A panicking listener does not stop the others; the failure is logged and
//! counted in the returned [`DispatchReport`].

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, RwLock};

/// Receives events of kind `E`.
pub trait Listener<E>: Send + Sync {
    fn on_event(&self, event: &E);
}

impl<E, F> Listener<E> for F
where
    F: Fn(&E) + Send + Sync,
{
    fn on_event(&self, event: &E) {
        self(event)
    }
}

/// Outcome of a single dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Listeners invoked.
    pub delivered: usize,
    /// Listeners that panicked.
    pub failed: usize,
}

/// A channel for one event kind.
pub struct Dispatcher<E> {
    name: &'static str,
    listeners: RwLock<Vec<Arc<dyn Listener<E>>>>,
}

impl<E> Dispatcher<E> {
    /// Create a channel. `name` only shows up in logs.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            listeners: RwLock::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Add a listener at the end of the delivery order.
    pub fn subscribe(&self, listener: Arc<dyn Listener<E>>) {
        self.write().push(listener);
    }

    /// Remove a listener previously passed to [`Dispatcher::subscribe`].
    /// Returns whether it was subscribed.
    pub fn unsubscribe(&self, listener: &Arc<dyn Listener<E>>) -> bool {
        let mut listeners = self.write();
        let before = listeners.len();
        listeners.retain(|l| !Arc::ptr_eq(l, listener));
        before != listeners.len()
    }

    /// Drop every subscriber at once.
    pub fn clear(&self) {
        let dropped = std::mem::take(&mut *self.write()).len();
        if dropped > 0 {
            tracing::debug!("Channel '{}' cleared ({} subscribers)", self.name, dropped);
        }
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver `event` to every current subscriber.
    ///
    /// The subscriber list is snapshotted first, so listeners may subscribe or
    /// unsubscribe from inside a callback; the change applies to the next
    /// dispatch.
    pub fn dispatch(&self, event: &E) -> DispatchReport {
        let snapshot: Vec<Arc<dyn Listener<E>>> = self.read().clone();
        let mut report = DispatchReport::default();
        for listener in snapshot {
            report.delivered += 1;
            if catch_unwind(AssertUnwindSafe(|| listener.on_event(event))).is_err() {
                report.failed += 1;
                tracing::error!("Listener on channel '{}' panicked", self.name);
            }
        }
        report
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<Arc<dyn Listener<E>>>> {
        self.listeners.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Vec<Arc<dyn Listener<E>>>> {
        self.listeners.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl<E> std::fmt::Debug for Dispatcher<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("name", &self.name)
            .field("subscribers", &self.len())
            .finish()
    }
}
