//! Derived Implementation
//!
//! A Derived is a read-only value computed from one or more sources by a
//! pure transform.
//!
//! # How Derivations Work
//!
//! A derivation is in one of two states:
//!
//! - **Cold** (no observers): nothing is cached and no source is observed.
//!   Every `get` runs the transform against the sources' current values.
//!
//! - **Warm** (one or more observers): every source is observed. Each
//!   source notification recomputes once, caches the result and notifies
//!   downstream observers only when the new value differs from the cached
//!   one. `get` returns the cache.
//!
//! ```text
//! {cold} --(first observer attaches)--> {warm} --(last observer stops)--> {cold}
//! ```
//!
//! Going cold releases every source subscription, so an inactive branch of
//! the UI stops doing work entirely. While warm, the sources and every
//! outstanding [`Subscription`] keep the derivation alive, so dropping the
//! `Derived` handle itself does not silence its observers.
//!
//! # Multiple Sources
//!
//! Warming up subscribes to all sources first and computes once afterwards,
//! so the first observer never sees a value built from partially
//! subscribed state. After that, each source notification is handled on
//! its own: two sources changed back to back produce two recomputations.

use std::fmt::Debug;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use super::readable::{next_producer_id, ReadSignal, Readable};
use super::sources::Sources;
use super::subscriber::{Observer, ObserverList, Rollback, SubscriberId, Subscription};

/// Warm/cold bookkeeping for a derivation.
struct DerivedState<T> {
    /// Last computed value. `None` while cold.
    cached: Option<T>,

    /// Source subscriptions held while warm.
    sources: Vec<Subscription>,

    /// Set while subscribing to sources; their immediate deliveries are
    /// folded into the single initial computation.
    warming: bool,
}

struct DerivedInner<T> {
    id: u64,
    compute: Box<dyn Fn() -> T + Send + Sync>,
    attach: Box<dyn Fn(Arc<dyn Fn() + Send + Sync>) -> Vec<Subscription> + Send + Sync>,
    state: Mutex<DerivedState<T>>,
    observers: ObserverList<T>,
}

/// A value derived from other reactive values.
///
/// # Type Parameters
///
/// - `T`: The computed value. `PartialEq` gates downstream notifications.
///
/// # Example
///
/// ```rust
/// use trellis_core::reactive::{Derived, Signal};
///
/// let width = Signal::new(3);
/// let height = Signal::new(4);
/// let area = Derived::from_sources((width.clone(), height), |(w, h)| w * h);
///
/// assert_eq!(area.get(), 12);
/// width.set(5);
/// assert_eq!(area.get(), 20);
/// ```
pub struct Derived<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    inner: Arc<DerivedInner<T>>,
}

impl<T> Derived<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Derive from a single source.
    pub fn new<S, F>(source: S, transform: F) -> Self
    where
        S: Readable,
        F: Fn(&S::Value) -> T + Send + Sync + 'static,
    {
        Self::from_sources((source,), move |(value,)| transform(&value))
    }

    /// Derive from several sources. The transform receives the positional
    /// tuple (or vector) of all current source values.
    pub fn from_sources<S, F>(sources: S, transform: F) -> Self
    where
        S: Sources,
        F: Fn(S::Values) -> T + Send + Sync + 'static,
    {
        let sources = Arc::new(sources);
        let reader = Arc::clone(&sources);

        Self {
            inner: Arc::new(DerivedInner {
                id: next_producer_id(),
                compute: Box::new(move || transform(reader.values())),
                attach: Box::new(move |on_change| sources.observe_each(on_change)),
                state: Mutex::new(DerivedState {
                    cached: None,
                    sources: Vec::new(),
                    warming: false,
                }),
                observers: ObserverList::new(),
            }),
        }
    }

    /// Get the derivation's unique ID.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Current value: the cache when warm, a fresh computation when cold.
    pub fn get(&self) -> T {
        if let Some(cached) = self.inner.state.lock().cached.clone() {
            return cached;
        }
        (self.inner.compute)()
    }

    /// Register an observer. The first observer warms the derivation up.
    pub fn observe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.register(Arc::new(callback))
    }

    fn register(&self, callback: Observer<T>) -> Subscription {
        let cached = self.inner.state.lock().cached.clone();
        let current = match cached {
            Some(value) => value,
            None => DerivedInner::warm_up(&self.inner),
        };

        let id = self.inner.observers.insert(Arc::clone(&callback));
        let rollback = Rollback::new(|| self.inner.release(id));
        callback(&current);
        rollback.disarm();

        // The handle keeps the derivation alive while observed, even after
        // every `Derived` clone is dropped.
        let inner = Arc::clone(&self.inner);
        Subscription::new(move || inner.release(id))
    }

    /// Whether the derivation currently observes its sources.
    pub fn is_warm(&self) -> bool {
        self.inner.state.lock().cached.is_some()
    }

    /// Number of observers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.observers.len()
    }

    /// A type-erased read-only handle.
    pub fn readonly(&self) -> ReadSignal<T> {
        ReadSignal::from(self.clone())
    }
}

impl<T> DerivedInner<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn warm_up(this: &Arc<Self>) -> T {
        this.state.lock().warming = true;

        // Strong on purpose: the sources keep a warm derivation alive.
        // `cool_down` stops these subscriptions, which breaks the cycle.
        let target = Arc::clone(this);
        let subscriptions = (this.attach)(Arc::new(move || target.source_changed()));
        this.state.lock().sources = subscriptions;

        let rollback = Rollback::new(|| {
            this.state.lock().warming = false;
            this.cool_down();
        });
        let value = (this.compute)();
        rollback.disarm();

        {
            let mut state = this.state.lock();
            state.cached = Some(value.clone());
            state.warming = false;
        }
        trace!(derived = this.id, "derivation warmed up");
        value
    }

    /// Drop one observer; the last one cools the derivation down.
    fn release(&self, id: SubscriberId) {
        if self.observers.remove(id) && self.observers.is_empty() {
            self.cool_down();
        }
    }

    fn cool_down(&self) {
        let subscriptions = {
            let mut state = self.state.lock();
            state.cached = None;
            std::mem::take(&mut state.sources)
        };
        for subscription in subscriptions {
            subscription.stop();
        }
        trace!(derived = self.id, "derivation cooled down");
    }

    fn source_changed(&self) {
        {
            let state = self.state.lock();
            if state.warming || state.cached.is_none() {
                return;
            }
        }

        let next = (self.compute)();
        let changed = {
            let mut state = self.state.lock();
            match &state.cached {
                Some(previous) if *previous == next => false,
                _ => {
                    state.cached = Some(next.clone());
                    true
                }
            }
        };

        if changed {
            self.observers.notify(&next);
        }
    }
}

impl<T> Readable for Derived<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    type Value = T;

    fn id(&self) -> u64 {
        self.inner.id
    }

    fn get(&self) -> T {
        Derived::get(self)
    }

    fn observe_with(&self, observer: Observer<T>) -> Subscription {
        self.register(observer)
    }
}

impl<T> Clone for Derived<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Derived<T>
where
    T: Clone + PartialEq + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Derived")
            .field("id", &self.inner.id)
            .field("warm", &self.is_warm())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Signal;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counted<T: Copy + 'static>(
        calls: &Arc<AtomicUsize>,
        f: impl Fn(T) -> T + Send + Sync + 'static,
    ) -> impl Fn(&T) -> T + Send + Sync + 'static {
        let calls = calls.clone();
        move |v: &T| {
            calls.fetch_add(1, Ordering::SeqCst);
            f(*v)
        }
    }

    #[test]
    fn cold_get_recomputes_every_time() {
        let source = Signal::new(2);
        let calls = Arc::new(AtomicUsize::new(0));
        let doubled = Derived::new(source.clone(), counted(&calls, |v: i32| v * 2));

        assert_eq!(doubled.get(), 4);
        assert_eq!(doubled.get(), 4);
        assert_eq!(doubled.get(), 4);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(!doubled.is_warm());
        assert_eq!(source.subscriber_count(), 0);
    }

    #[test]
    fn warm_recomputes_once_per_source_change() {
        let source = Signal::new(1);
        let calls = Arc::new(AtomicUsize::new(0));
        let doubled = Derived::new(source.clone(), counted(&calls, |v: i32| v * 2));

        let subscription = doubled.observe(|_| {});
        assert!(doubled.is_warm());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Cached reads do not compute.
        assert_eq!(doubled.get(), 2);
        assert_eq!(doubled.get(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        source.set(5);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(doubled.get(), 10);

        // Equal source value: the source never notifies.
        source.set(5);
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        subscription.stop();
    }

    #[test]
    fn output_is_equality_gated() {
        let source = Signal::new(3);
        let parity = Derived::new(source.clone(), |v: &i32| v % 2);
        let notifications = Arc::new(AtomicUsize::new(0));
        let notifications_clone = notifications.clone();

        let _subscription = parity.observe(move |_| {
            notifications_clone.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(notifications.load(Ordering::SeqCst), 1);

        source.set(5); // still odd
        source.set(7);
        assert_eq!(notifications.load(Ordering::SeqCst), 1);

        source.set(8);
        assert_eq!(notifications.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn last_observer_releases_sources() {
        let source = Signal::new(0);
        let derived = Derived::new(source.clone(), |v: &i32| v + 1);

        let first = derived.observe(|_| {});
        let second = derived.observe(|_| {});
        assert_eq!(source.subscriber_count(), 1);

        first.stop();
        assert!(derived.is_warm());
        second.stop();
        assert!(!derived.is_warm());
        assert_eq!(source.subscriber_count(), 0);

        // Warm up again from cold.
        let third = derived.observe(|_| {});
        assert_eq!(source.subscriber_count(), 1);
        third.stop();
    }

    #[test]
    fn multi_source_initial_value_is_computed_once() {
        let a = Signal::new(1);
        let b = Signal::new(10);
        let c = Signal::new(100);
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();

        let sum = Derived::from_sources((a.clone(), b.clone(), c.clone()), move |(a, b, c)| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            a + b + c
        });

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let _subscription = sum.observe(move |v| seen_clone.lock().push(*v));

        assert_eq!(*seen.lock(), vec![111]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // No cross-source batching: each change recomputes on its own.
        a.set(2);
        b.set(20);
        assert_eq!(*seen.lock(), vec![111, 112, 122]);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn vector_sources() {
        let signals: Vec<Signal<i32>> = (1..=4).map(Signal::new).collect();
        let total = Derived::from_sources(signals.clone(), |values| values.iter().sum::<i32>());

        assert_eq!(total.get(), 10);
        let _subscription = total.observe(|_| {});
        signals[3].set(40);
        assert_eq!(total.get(), 46);
    }

    #[test]
    fn derived_of_derived() {
        let base = Signal::new(5);
        let doubled = base.map(|v| v * 2);
        let plus_ten = doubled.map(|v| v + 10);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let _subscription = plus_ten.observe(move |v| seen_clone.lock().push(*v));

        base.set(10);
        assert_eq!(*seen.lock(), vec![20, 30]);
        assert!(doubled.is_warm());
    }

    #[test]
    fn observed_derivation_outlives_its_handle() {
        let source = Signal::new(1);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();

        // The `Derived` returned by `map` is a temporary.
        let subscription = source
            .map(|v| v * 2)
            .observe(move |v| seen_clone.lock().push(*v));

        source.set(2);
        source.set(3);
        assert_eq!(*seen.lock(), vec![2, 4, 6]);
        assert_eq!(source.subscriber_count(), 1);

        subscription.stop();
        assert_eq!(source.subscriber_count(), 0);
        source.set(4);
        assert_eq!(*seen.lock(), vec![2, 4, 6]);
    }

    #[test]
    fn panicking_warm_up_returns_to_cold() {
        let source = Signal::new(0);
        let inverse = Derived::new(source.clone(), |v: &i32| {
            if *v == 0 {
                panic!("division by zero");
            }
            100 / v
        });

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _subscription = inverse.observe(|_| {});
        }));
        assert!(result.is_err());
        assert!(!inverse.is_warm());
        assert_eq!(inverse.subscriber_count(), 0);
        assert_eq!(source.subscriber_count(), 0);

        source.set(4);
        let subscription = inverse.observe(|_| {});
        assert_eq!(inverse.get(), 25);
        assert_eq!(source.subscriber_count(), 1);

        subscription.stop();
        assert!(!inverse.is_warm());
        assert_eq!(source.subscriber_count(), 0);
    }

    #[test]
    fn panicking_first_delivery_leaves_derivation_cold() {
        let source = Signal::new(1);
        let doubled = source.map(|v| v * 2);

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _subscription = doubled.observe(|_| panic!("observer failed"));
        }));
        assert!(result.is_err());
        assert_eq!(doubled.subscriber_count(), 0);
        assert!(!doubled.is_warm());
        assert_eq!(source.subscriber_count(), 0);
    }

    #[test]
    fn derived_clone_shares_state() {
        let source = Signal::new(1);
        let derived1 = Derived::new(source, |v: &i32| *v);
        let derived2 = derived1.clone();

        let subscription = derived1.observe(|_| {});
        assert_eq!(derived1.id(), derived2.id());
        assert!(derived2.is_warm());
        subscription.stop();
        assert!(!derived2.is_warm());
    }
}
