//! Read-only reactive values.
//!
//! [`Readable`] is the seam every consumer of reactive state goes through:
//! derivations observe their sources through it, binders and reconcilers
//! observe the values they render through it. [`ReadSignal`] erases the
//! concrete producer so a signal, a derivation or a constant can be stored
//! behind one type, and [`Prop`] covers the "static or reactive" inputs the
//! binders accept.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::derived::Derived;
use super::signal::Signal;
use super::subscriber::{Observer, Subscription};

/// Counter shared by every producer kind so IDs never collide.
static PRODUCER_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a new unique producer ID.
pub(crate) fn next_producer_id() -> u64 {
    PRODUCER_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// A value that can be read and observed.
pub trait Readable: Send + Sync + 'static {
    /// The observed value.
    type Value: Clone + PartialEq + Send + Sync + 'static;

    /// Identity of the underlying producer. Clones share it.
    fn id(&self) -> u64;

    /// Current value.
    fn get(&self) -> Self::Value;

    /// Register an observer. It is invoked once immediately with the
    /// current value, then after every effective change.
    fn observe_with(&self, observer: Observer<Self::Value>) -> Subscription;

    /// Closure form of [`observe_with`](Self::observe_with).
    fn observe<F>(&self, callback: F) -> Subscription
    where
        Self: Sized,
        F: Fn(&Self::Value) + Send + Sync + 'static,
    {
        self.observe_with(Arc::new(callback))
    }

    /// Single-source derivation of this value.
    fn map<U, F>(&self, transform: F) -> Derived<U>
    where
        Self: Sized + Clone,
        U: Clone + PartialEq + Send + Sync + 'static,
        F: Fn(&Self::Value) -> U + Send + Sync + 'static,
    {
        Derived::new(self.clone(), transform)
    }
}

/// Type-erased read-only handle onto any [`Readable`].
pub struct ReadSignal<T>(Arc<dyn Readable<Value = T>>);

impl<T> ReadSignal<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Wrap any readable producer.
    pub fn new<R>(readable: R) -> Self
    where
        R: Readable<Value = T>,
    {
        Self(Arc::new(readable))
    }

    /// A readable that never changes.
    pub fn constant(value: T) -> Self {
        Self::new(Constant {
            id: next_producer_id(),
            value,
        })
    }

    /// Producer identity.
    pub fn id(&self) -> u64 {
        self.0.id()
    }

    /// Current value.
    pub fn get(&self) -> T {
        self.0.get()
    }

    /// Register an observer; see [`Readable::observe_with`].
    pub fn observe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.0.observe_with(Arc::new(callback))
    }
}

impl<T> Readable for ReadSignal<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    type Value = T;

    fn id(&self) -> u64 {
        self.0.id()
    }

    fn get(&self) -> T {
        self.0.get()
    }

    fn observe_with(&self, observer: Observer<T>) -> Subscription {
        self.0.observe_with(observer)
    }
}

impl<T> Clone for ReadSignal<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T> From<Signal<T>> for ReadSignal<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn from(signal: Signal<T>) -> Self {
        Self::new(signal)
    }
}

impl<T> From<Derived<T>> for ReadSignal<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn from(derived: Derived<T>) -> Self {
        Self::new(derived)
    }
}

impl<T> fmt::Debug for ReadSignal<T>
where
    T: Clone + PartialEq + Send + Sync + fmt::Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadSignal")
            .field("id", &self.id())
            .field("value", &self.get())
            .finish()
    }
}

struct Constant<T> {
    id: u64,
    value: T,
}

impl<T> Readable for Constant<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    type Value = T;

    fn id(&self) -> u64 {
        self.id
    }

    fn get(&self) -> T {
        self.value.clone()
    }

    fn observe_with(&self, observer: Observer<T>) -> Subscription {
        observer(&self.value);
        Subscription::noop()
    }
}

/// A binder input that is either fixed or reactive.
#[derive(Clone)]
pub enum Prop<T> {
    /// Applied once.
    Static(T),
    /// Re-applied on every change.
    Reactive(ReadSignal<T>),
}

impl<T> Prop<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Current value.
    pub fn get(&self) -> T {
        match self {
            Prop::Static(value) => value.clone(),
            Prop::Reactive(signal) => signal.get(),
        }
    }

    /// Whether the value can change after it is first applied.
    pub fn is_reactive(&self) -> bool {
        matches!(self, Prop::Reactive(_))
    }

    /// Deliver the value to `apply` now, and again on every change when
    /// reactive.
    pub fn observe<F>(&self, apply: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        match self {
            Prop::Static(value) => {
                apply(value);
                Subscription::noop()
            }
            Prop::Reactive(signal) => signal.observe(apply),
        }
    }
}

/// Static props compare by value, reactive props by producer identity.
impl<T> PartialEq for Prop<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Prop::Static(a), Prop::Static(b)) => a == b,
            (Prop::Reactive(a), Prop::Reactive(b)) => a.id() == b.id(),
            _ => false,
        }
    }
}

impl<T> fmt::Debug for Prop<T>
where
    T: Clone + PartialEq + Send + Sync + fmt::Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Prop::Static(value) => f.debug_tuple("Static").field(value).finish(),
            Prop::Reactive(signal) => f.debug_tuple("Reactive").field(&signal.id()).finish(),
        }
    }
}

impl<T> Default for Prop<T>
where
    T: Clone + PartialEq + Send + Sync + Default + 'static,
{
    fn default() -> Self {
        Prop::Static(T::default())
    }
}

impl<T> From<T> for Prop<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn from(value: T) -> Self {
        Prop::Static(value)
    }
}

impl<T> From<Signal<T>> for Prop<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn from(signal: Signal<T>) -> Self {
        Prop::Reactive(signal.into())
    }
}

impl<T> From<ReadSignal<T>> for Prop<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn from(signal: ReadSignal<T>) -> Self {
        Prop::Reactive(signal)
    }
}

impl<T> From<Derived<T>> for Prop<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn from(derived: Derived<T>) -> Self {
        Prop::Reactive(derived.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn read_signal_follows_source() {
        let signal = Signal::new(1);
        let read = signal.readonly();

        assert_eq!(read.id(), signal.id());
        signal.set(2);
        assert_eq!(read.get(), 2);
    }

    #[test]
    fn constant_delivers_once() {
        let constant = ReadSignal::constant("fixed".to_string());
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();

        let subscription = constant.observe(move |v| {
            assert_eq!(v, "fixed");
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(subscription.is_stopped());
    }

    #[test]
    fn prop_equality() {
        let signal = Signal::new(3);
        let a: Prop<i32> = signal.clone().into();
        let b: Prop<i32> = signal.readonly().into();
        let c: Prop<i32> = Signal::new(3).into();

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(Prop::Static(3), Prop::from(3));
        assert_ne!(Prop::Static(3), a);
    }

    #[test]
    fn prop_observe_static_applies_once() {
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = seen.clone();
        let prop = Prop::Static(5usize);

        let subscription = prop.observe(move |v| {
            seen_clone.fetch_add(*v, Ordering::SeqCst);
        });

        assert_eq!(seen.load(Ordering::SeqCst), 5);
        assert!(!prop.is_reactive());
        subscription.stop();
    }
}
