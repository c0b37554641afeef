//! Trellis Core
//!
//! This crate provides the reactive core of the Trellis UI runtime. It
//! implements:
//!
//! - Reactive primitives (signals and cold/warm derivations)
//! - Binders that keep a single host node in sync with reactive values
//! - Reconcilers that keep conditional content and keyed lists in sync
//! - An in-memory host tree for tests and headless use
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: signals, derivations and observer plumbing
//! - `host`: the host tree primitives the core drives, plus `MemoryTree`
//! - `bind`: text, attribute, property, style, class, event and two-way
//!   bindings
//! - `view`: the `View` trait, elements, `Dynamic` and `List`
//!
//! Propagation is synchronous: a `set` returns only after every affected
//! binding and reconciler has patched the host tree.
//!
//! # Example
//!
//! ```rust
//! use trellis_core::host::{MemoryTree, SharedTree};
//! use trellis_core::reactive::Signal;
//! use trellis_core::view::{Element, List, View};
//! use trellis_core::bind::Text;
//!
//! let memory = MemoryTree::shared();
//! let tree: SharedTree = memory.clone();
//!
//! let todos = Signal::new(vec!["write".to_string(), "test".to_string()]);
//! let mut list = Element::new("ul").child(List::new(
//!     todos.clone(),
//!     |todo, _index| Element::new("li").child(Text::<String>::new(todo)),
//!     |todo: &String, _| todo.clone(),
//! ));
//! list.connect(&tree, memory.root(), None).unwrap();
//! assert_eq!(memory.render(), "<ul><li>write</li><li>test</li></ul>");
//!
//! todos.modify(|items| items.reverse());
//! assert_eq!(memory.render(), "<ul><li>test</li><li>write</li></ul>");
//! ```

pub mod bind;
pub mod config;
pub mod error;
pub mod host;
pub mod reactive;
pub mod view;

pub use bind::{Binding, Classes, StyleMap, StyleValue};
pub use config::BindConfig;
pub use error::{BindError, RenderError, Result, TransitionError};
pub use reactive::{Derived, Prop, ReadSignal, Readable, Signal, Subscription};
pub use serde_json::{json, Value};
pub use view::{Dynamic, Element, List, Renderable, View};
