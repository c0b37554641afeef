//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive. It holds a value and
//! notifies its observers whenever that value changes.
//!
//! # How Signals Work
//!
//! 1. `observe` registers a callback and immediately invokes it once with
//!    the current value.
//!
//! 2. `set`/`update` compare the new value against the stored one with
//!    `PartialEq`. An equal value is dropped without notifying anyone.
//!
//! 3. A different value is stored and every observer runs synchronously, in
//!    registration order, before `set` returns. An observer that sets
//!    another signal finishes that whole cascade before the next observer
//!    of this signal runs (depth-first propagation).
//!
//! # Memory Layout
//!
//! Each signal consists of:
//! - A unique ID (8 bytes)
//! - The value, behind `Arc<RwLock<_>>` so clones share it
//! - Its own observer list

use std::fmt::Debug;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::trace;

use super::readable::{next_producer_id, ReadSignal, Readable};
use super::subscriber::{Observer, ObserverList, Rollback, Subscription};

/// A writable reactive cell holding a value of type T.
///
/// # Type Parameters
///
/// - `T`: The stored value. `PartialEq` drives change suppression; `Clone`
///   because readers receive copies, never references into the cell.
///
/// # Example
///
/// ```rust
/// use trellis_core::reactive::Signal;
///
/// let count = Signal::new(0);
/// let stop = count.observe(|value| println!("count = {value}"));
///
/// count.set(5); // prints "count = 5"
/// count.set(5); // equal value: no notification
/// stop.stop();
/// ```
pub struct Signal<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Unique identifier for this signal.
    id: u64,

    /// The current value.
    value: Arc<RwLock<T>>,

    /// Observers, in notification order.
    observers: Arc<ObserverList<T>>,
}

impl<T> Signal<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Create a new signal with the given initial value.
    pub fn new(value: T) -> Self {
        Self {
            id: next_producer_id(),
            value: Arc::new(RwLock::new(value)),
            observers: Arc::new(ObserverList::new()),
        }
    }

    /// Get the signal's unique ID.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Get a copy of the current value.
    pub fn get(&self) -> T {
        self.value.read().clone()
    }

    /// Run `f` against the current value without cloning it.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.value.read())
    }

    /// Replace the value and notify observers if it changed.
    pub fn set(&self, value: T) {
        {
            let mut guard = self.value.write();
            if *guard == value {
                trace!(signal = self.id, "set with equal value suppressed");
                return;
            }
            *guard = value.clone();
        }

        trace!(
            signal = self.id,
            observers = self.observers.len(),
            "signal changed"
        );
        self.observers.notify(&value);
    }

    /// Update the value using a function of the current value.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        let new_value = {
            let guard = self.value.read();
            f(&guard)
        };
        self.set(new_value);
    }

    /// Mutate a copy of the current value, then store it through `set`.
    ///
    /// Change detection still compares against the previous snapshot, so an
    /// edit that leaves the value structurally equal notifies nobody.
    pub fn modify<F>(&self, f: F)
    where
        F: FnOnce(&mut T),
    {
        let mut next = self.get();
        f(&mut next);
        self.set(next);
    }

    /// Register an observer.
    ///
    /// The callback runs once right away with the current value and then on
    /// every effective change until the returned handle is stopped.
    pub fn observe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.register(Arc::new(callback))
    }

    fn register(&self, callback: Observer<T>) -> Subscription {
        let id = self.observers.insert(Arc::clone(&callback));
        let rollback = Rollback::new(|| {
            self.observers.remove(id);
        });
        let current = self.get();
        callback(&current);
        rollback.disarm();

        let observers = Arc::downgrade(&self.observers);
        Subscription::new(move || {
            if let Some(observers) = observers.upgrade() {
                observers.remove(id);
            }
        })
    }

    /// Get the number of observers.
    pub fn subscriber_count(&self) -> usize {
        self.observers.len()
    }

    /// A read-only view sharing this signal's state.
    pub fn readonly(&self) -> ReadSignal<T> {
        ReadSignal::from(self.clone())
    }
}

impl<T> Readable for Signal<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    type Value = T;

    fn id(&self) -> u64 {
        self.id
    }

    fn get(&self) -> T {
        Signal::get(self)
    }

    fn observe_with(&self, observer: Observer<T>) -> Subscription {
        self.register(observer)
    }
}

impl<T> Clone for Signal<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            value: Arc::clone(&self.value),
            observers: Arc::clone(&self.observers),
        }
    }
}

impl<T> Default for Signal<T>
where
    T: Clone + PartialEq + Send + Sync + Default + 'static,
{
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> Debug for Signal<T>
where
    T: Clone + PartialEq + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.id)
            .field("value", &*self.value.read())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
