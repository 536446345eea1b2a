//! Minimal publish-subscribe primitive
//!
//! The core crates emit value-changed events through an `EventBus`; a
//! display layer owns the subscription lifecycle. No UI framework types
//! leak into the core. Dropping a `Subscription` unsubscribes its callback.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;
type Registry<T> = Mutex<HashMap<u64, Callback<T>>>;

/// A set of subscribers notified synchronously on every `emit`.
pub struct EventBus<T> {
    registry: Arc<Registry<T>>,
    next_id: AtomicU64,
}

impl<T> EventBus<T> {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(0),
        }
    }

    /// Register a callback. The callback stays live until the returned
    /// `Subscription` is dropped or cancelled.
    pub fn subscribe<F>(&self, callback: F) -> Subscription<T>
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.registry).insert(id, Arc::new(callback));
        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Invoke every live callback with a shared reference to `event`.
    ///
    /// Callbacks run outside the registry lock, so a callback may
    /// subscribe or drop subscriptions on this bus; such changes take
    /// effect from the next emit.
    pub fn emit(&self, event: &T) {
        let callbacks: Vec<Callback<T>> = lock(&self.registry).values().cloned().collect();
        for callback in callbacks {
            callback(event);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.registry).len()
    }
}

impl<T> Default for EventBus<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle tying a callback's lifetime to the subscriber.
pub struct Subscription<T> {
    id: u64,
    registry: Weak<Registry<T>>,
}

impl<T> Subscription<T> {
    /// Explicitly unsubscribe; equivalent to dropping the handle.
    pub fn cancel(self) {}
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            lock(&registry).remove(&self.id);
        }
    }
}

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
