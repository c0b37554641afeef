//! Reactive Primitives
//!
//! This module implements the signal graph: writable signals, derivations
//! computed from them, and the observer plumbing both share. These
//! primitives feed every binder and reconciler in the crate.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A [`Signal`] is a container for mutable state. Observers registered with
//! `observe` run once immediately and then after every change. A `set` with
//! a value equal to the current one (by `PartialEq`) notifies nobody.
//!
//! ## Derivations
//!
//! A [`Derived`] computes a value from one or more sources. With no
//! observers it is *cold* and recomputes on every read; the first observer
//! makes it *warm*: it observes its sources, caches, and only notifies when
//! its output actually changes.
//!
//! ## Subscriptions
//!
//! Every `observe` returns a [`Subscription`]. Stopping it is the only way
//! to cancel an observer, and stopping twice is harmless.
//!
//! # Implementation Notes
//!
//! Propagation is synchronous and depth-first: `set` returns only after
//! every observer (and everything those observers set in turn) has run.
//! Each producer owns its observer list; there is no global dispatcher.

mod derived;
mod readable;
mod signal;
mod sources;
mod subscriber;

pub use derived::Derived;
pub use readable::{Prop, ReadSignal, Readable};
pub use signal::Signal;
pub use sources::{SourceChanged, Sources};
pub use subscriber::{Observer, ObserverList, SubscriberId, Subscription, Subscriptions};
