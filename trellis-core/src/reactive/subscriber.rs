//! Subscriber types for the reactive system.
//!
//! Every producer (a signal or a derivation) owns an [`ObserverList`]. An
//! observer is registered under a [`SubscriberId`] and is removed again
//! through the [`Subscription`] handle handed back at registration time.
//! There is no process-wide registry: each producer keeps its own list, so
//! notification order is simply the insertion order of that list.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

/// Unique identifier for a subscriber.
///
/// Each observer registration gets a unique ID. The ID is what a
/// [`Subscription`] uses to find and remove its entry again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    ///
    /// Uses an atomic counter to ensure uniqueness across threads.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// Callback invoked with a producer's value.
pub type Observer<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Entry<T> {
    id: SubscriberId,
    /// Cleared on removal so an in-flight notification skips the entry.
    live: Arc<AtomicBool>,
    callback: Observer<T>,
}

/// Ordered list of observers owned by a single producer.
///
/// The list lock is never held while callbacks run: [`notify`](Self::notify)
/// snapshots the entries first, so observers are free to subscribe,
/// unsubscribe or set other signals from inside a callback.
pub struct ObserverList<T> {
    entries: Mutex<Vec<Entry<T>>>,
}

impl<T> ObserverList<T> {
    /// Create an empty list.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Append an observer. It will be notified after every observer that
    /// was registered before it.
    pub fn insert(&self, callback: Observer<T>) -> SubscriberId {
        let id = SubscriberId::new();
        self.entries.lock().push(Entry {
            id,
            live: Arc::new(AtomicBool::new(true)),
            callback,
        });
        id
    }

    /// Remove an observer. Returns `false` if it was already gone.
    pub fn remove(&self, id: SubscriberId) -> bool {
        let mut entries = self.entries.lock();
        match entries.iter().position(|entry| entry.id == id) {
            Some(position) => {
                let entry = entries.remove(position);
                entry.live.store(false, Ordering::Release);
                true
            }
            None => false,
        }
    }

    /// Number of registered observers.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether no observer is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Invoke every live observer, in registration order, with `value`.
    pub fn notify(&self, value: &T) {
        let snapshot: Vec<(Arc<AtomicBool>, Observer<T>)> = self
            .entries
            .lock()
            .iter()
            .map(|entry| (Arc::clone(&entry.live), Arc::clone(&entry.callback)))
            .collect();

        for (live, callback) in snapshot {
            if live.load(Ordering::Acquire) {
                callback(value);
            }
        }
    }
}

impl<T> Default for ObserverList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for ObserverList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverList")
            .field("len", &self.len())
            .finish()
    }
}

/// Stop handle returned by every `observe`.
///
/// Calling [`stop`](Self::stop) deregisters the observer; further calls are
/// no-ops. Dropping the handle does *not* stop the observer, teardown is
/// always an explicit call.
#[must_use = "the observer stays registered until `stop` is called"]
pub struct Subscription {
    stop: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl Subscription {
    /// Wrap a teardown closure. It runs at most once.
    pub fn new<F>(stop: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            stop: Mutex::new(Some(Box::new(stop))),
        }
    }

    /// A handle with nothing to tear down.
    pub fn noop() -> Self {
        Self {
            stop: Mutex::new(None),
        }
    }

    /// Deregister the observer.
    pub fn stop(&self) {
        let stop = self.stop.lock().take();
        if let Some(stop) = stop {
            stop();
        }
    }

    /// Whether `stop` has already run (or there was nothing to stop).
    pub fn is_stopped(&self) -> bool {
        self.stop.lock().is_none()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

/// Undo step for a registration that did not complete.
///
/// Runs its closure when dropped unless [`disarm`](Self::disarm) was called
/// first, so a callback that panics halfway through `observe` does not leave
/// a handle-less observer behind.
pub(crate) struct Rollback<F: FnOnce()> {
    undo: Option<F>,
}

impl<F: FnOnce()> Rollback<F> {
    pub(crate) fn new(undo: F) -> Self {
        Self { undo: Some(undo) }
    }

    pub(crate) fn disarm(mut self) {
        self.undo = None;
    }
}

impl<F: FnOnce()> Drop for Rollback<F> {
    fn drop(&mut self) {
        if let Some(undo) = self.undo.take() {
            undo();
        }
    }
}

/// A bag of subscriptions released together.
#[derive(Debug, Default)]
pub struct Subscriptions {
    inner: Mutex<Vec<Subscription>>,
}

impl Subscriptions {
    /// Create an empty bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscription to the bag.
    pub fn push(&self, subscription: Subscription) {
        self.inner.lock().push(subscription);
    }

    /// Stop every subscription in insertion order and empty the bag.
    pub fn stop_all(&self) {
        let drained: Vec<Subscription> = std::mem::take(&mut *self.inner.lock());
        for subscription in drained {
            subscription.stop();
        }
    }

    /// Number of subscriptions currently held.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether the bag is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}
