//! Binders
//!
//! Binders connect reactive values to a single host node. [`Text`] owns one
//! text node; [`bind`] applies a list of named bindings to an element:
//! attributes, properties, inline style, classes, event handlers and
//! two-way value bindings.
//!
//! The binding *kind* is resolved from the name alone, before anything is
//! applied:
//!
//! | name                          | kind      |
//! |-------------------------------|-----------|
//! | `style`                       | Style     |
//! | `class`, `className`          | Class     |
//! | `on:<event>`                  | Event     |
//! | `bind:<prop>`                 | Model     |
//! | `prop:<name>`                 | Property  |
//! | `value`, `checked`, `selected`| Property  |
//! | anything else                 | Attribute |
//!
//! Every subscription and listener a call to [`bind`] creates is collected
//! in the returned [`BindingSet`] and released exactly once.

mod class;
mod model;
mod style;
mod text;

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::debug;

use crate::config::BindConfig;
use crate::error::BindError;
use crate::host::{Event, ListenerId, NodeId, SharedTree};
use crate::reactive::{Prop, ReadSignal, Signal, Subscriptions};

pub use class::Classes;
pub use model::coerce;
pub use style::{StyleMap, StyleValue};
pub use text::{Text, TextContent};

/// An event handler. Two handlers are equal only if they are the same
/// closure.
#[derive(Clone)]
pub struct Handler(Arc<dyn Fn(&Event) + Send + Sync>);

impl Handler {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn call(&self, event: &Event) {
        (self.0)(event)
    }
}

impl PartialEq for Handler {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Handler")
    }
}

/// A value bound under a name.
#[derive(Debug, Clone)]
pub enum Binding {
    /// Attribute or property value.
    Value(Prop<Value>),
    /// Event handler, dereferenced at call time when reactive.
    Handler(Prop<Handler>),
    /// Two-way value binding.
    Model(Signal<Value>),
    /// Inline style map.
    Style(Prop<StyleMap>),
    /// Class membership.
    Class(Prop<Classes>),
}

impl Binding {
    /// A static attribute or property value.
    pub fn value(value: impl Into<Value>) -> Self {
        Binding::Value(Prop::Static(value.into()))
    }

    /// A reactive attribute or property value.
    pub fn signal(signal: impl Into<ReadSignal<Value>>) -> Self {
        Binding::Value(Prop::Reactive(signal.into()))
    }

    pub fn handler<F>(f: F) -> Self
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        Binding::Handler(Prop::Static(Handler::new(f)))
    }

    /// A handler that can be swapped without re-registering the listener.
    pub fn handler_signal(signal: impl Into<ReadSignal<Handler>>) -> Self {
        Binding::Handler(Prop::Reactive(signal.into()))
    }

    pub fn model(signal: Signal<Value>) -> Self {
        Binding::Model(signal)
    }

    pub fn style(style: impl Into<Prop<StyleMap>>) -> Self {
        Binding::Style(style.into())
    }

    pub fn class(classes: impl Into<Prop<Classes>>) -> Self {
        Binding::Class(classes.into())
    }

    fn shape(&self) -> &'static str {
        match self {
            Binding::Value(_) => "a value",
            Binding::Handler(_) => "an event handler",
            Binding::Model(_) => "a writable signal",
            Binding::Style(_) => "a style map",
            Binding::Class(_) => "a class list",
        }
    }
}

/// What a binding name refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingKind {
    Attribute(String),
    Property(String),
    Style,
    Class,
    Event(String),
    Model(String),
}

impl BindingKind {
    /// Resolve a binding name.
    pub fn resolve(name: &str) -> Result<Self, BindError> {
        if name.is_empty() {
            return Err(BindError::EmptyName);
        }
        if let Some(event) = name.strip_prefix("on:") {
            if event.is_empty() {
                return Err(BindError::MissingEvent(name.to_string()));
            }
            return Ok(BindingKind::Event(event.to_string()));
        }
        if let Some(property) = name.strip_prefix("bind:") {
            if property.is_empty() {
                return Err(BindError::MissingProperty(name.to_string()));
            }
            return Ok(BindingKind::Model(property.to_string()));
        }
        if let Some(property) = name.strip_prefix("prop:") {
            if property.is_empty() {
                return Err(BindError::MissingProperty(name.to_string()));
            }
            return Ok(BindingKind::Property(property.to_string()));
        }

        Ok(match name {
            "style" => BindingKind::Style,
            "class" | "className" => BindingKind::Class,
            "value" | "checked" | "selected" => BindingKind::Property(name.to_string()),
            _ => BindingKind::Attribute(name.to_string()),
        })
    }

    fn expects(&self) -> &'static str {
        match self {
            BindingKind::Attribute(_) | BindingKind::Property(_) => "a value",
            BindingKind::Style => "a style map",
            BindingKind::Class => "a class list",
            BindingKind::Event(_) => "an event handler",
            BindingKind::Model(_) => "a writable signal",
        }
    }

    fn accepts(&self, binding: &Binding) -> bool {
        matches!(
            (self, binding),
            (BindingKind::Attribute(_) | BindingKind::Property(_), Binding::Value(_))
                | (BindingKind::Style, Binding::Style(_))
                | (BindingKind::Class, Binding::Class(_))
                | (BindingKind::Event(_), Binding::Handler(_))
                | (BindingKind::Model(_), Binding::Model(_))
        )
    }
}

/// Everything one [`bind`] call attached to a node.
#[must_use = "bindings stay active until `release` is called"]
pub struct BindingSet {
    tree: SharedTree,
    node: NodeId,
    subscriptions: Subscriptions,
    listeners: Mutex<Vec<ListenerId>>,
}

impl BindingSet {
    /// The bound node.
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Stop every subscription and remove every listener. Idempotent.
    pub fn release(&self) {
        self.subscriptions.stop_all();
        let listeners = std::mem::take(&mut *self.listeners.lock());
        for listener in listeners {
            self.tree.remove_event_listener(self.node, listener);
        }
    }

    /// Number of live subscriptions and listeners.
    pub fn len(&self) -> usize {
        self.subscriptions.len() + self.listeners.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for BindingSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingSet")
            .field("node", &self.node)
            .field("active", &self.len())
            .finish()
    }
}

/// Apply `bindings` to `node` with the default [`BindConfig`].
pub fn bind(
    tree: &SharedTree,
    node: NodeId,
    bindings: &[(String, Binding)],
) -> Result<BindingSet, BindError> {
    bind_with(tree, node, bindings, &BindConfig::default())
}

/// Apply `bindings` to `node`.
///
/// Every name is resolved and checked against its value before anything is
/// applied, so an error leaves the node untouched.
pub fn bind_with(
    tree: &SharedTree,
    node: NodeId,
    bindings: &[(String, Binding)],
    config: &BindConfig,
) -> Result<BindingSet, BindError> {
    let mut resolved = Vec::with_capacity(bindings.len());
    for (name, binding) in bindings {
        let kind = BindingKind::resolve(name)?;
        if !kind.accepts(binding) {
            return Err(BindError::Mismatch {
                name: name.clone(),
                expected: kind.expects(),
                found: binding.shape(),
            });
        }
        resolved.push((kind, binding));
    }

    let set = BindingSet {
        tree: SharedTree::clone(tree),
        node,
        subscriptions: Subscriptions::new(),
        listeners: Mutex::new(Vec::new()),
    };

    for (kind, binding) in resolved {
        match (kind, binding) {
            (BindingKind::Attribute(name), Binding::Value(value)) => {
                let target = SharedTree::clone(tree);
                set.subscriptions.push(value.observe(move |v: &Value| {
                    apply_attribute(&target, node, &name, v);
                }));
            }
            (BindingKind::Property(name), Binding::Value(value)) => {
                let target = SharedTree::clone(tree);
                set.subscriptions.push(value.observe(move |v: &Value| {
                    apply_property(&target, node, &name, v);
                }));
            }
            (BindingKind::Style, Binding::Style(style)) => {
                set.subscriptions
                    .push(style::bind_style(tree, node, style, &config.length_unit));
            }
            (BindingKind::Class, Binding::Class(classes)) => {
                set.subscriptions.push(class::bind_classes(tree, node, classes));
            }
            (BindingKind::Event(event), Binding::Handler(handler)) => {
                let handler = handler.clone();
                let id = tree.add_event_listener(
                    node,
                    &event,
                    Arc::new(move |e: &Event| handler.get().call(e)),
                );
                set.listeners.lock().push(id);
            }
            (BindingKind::Model(property), Binding::Model(signal)) => {
                let (subscription, listeners) =
                    model::bind_model(tree, node, &property, signal, &config.model_events);
                set.subscriptions.push(subscription);
                set.listeners.lock().extend(listeners);
            }
            // Ruled out by `accepts` above.
            _ => {}
        }
    }

    debug!(%node, bindings = bindings.len(), "bindings applied");
    Ok(set)
}

fn apply_attribute(tree: &SharedTree, node: NodeId, name: &str, value: &Value) {
    match value {
        Value::Null | Value::Bool(false) => tree.remove_attribute(node, name),
        Value::Bool(true) => tree.set_attribute(node, name, ""),
        other => tree.set_attribute(node, name, &other.to_text()),
    }
}

fn apply_property(tree: &SharedTree, node: NodeId, name: &str, value: &Value) {
    match value {
        Value::Null => tree.remove_property(node, name),
        other => tree.set_property(node, name, other.clone()),
    }
}
