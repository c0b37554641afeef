//! Host Tree
//!
//! The host tree is the externally owned, mutable output the reconcilers
//! keep in sync with application state: a browser DOM, a terminal widget
//! tree, a native view hierarchy. The core only needs the handful of
//! primitives on [`HostTree`]; they are assumed to be synchronous and
//! immediately observable.
//!
//! [`MemoryTree`] is a complete in-memory implementation used by the tests
//! and by headless embedders.

mod memory;
mod node;

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

pub use memory::{MemoryTree, NodeSnapshot};
pub use node::{ListenerId, NodeId, NodeKind};

/// An event delivered to a listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Event name, e.g. `"click"` or `"input"`.
    pub name: String,
    /// Node the event was dispatched on.
    pub target: NodeId,
}

impl Event {
    /// Create an event.
    pub fn new(name: impl Into<String>, target: NodeId) -> Self {
        Self {
            name: name.into(),
            target,
        }
    }
}

/// Event listener callback.
pub type Listener = Arc<dyn Fn(&Event) + Send + Sync>;

/// Shared handle to a host tree.
pub type SharedTree = Arc<dyn HostTree>;

/// Primitives the core consumes from a host tree.
///
/// Calls referring to a node the tree does not know are ignored by
/// implementations rather than treated as errors.
pub trait HostTree: Send + Sync {
    /// Create a detached element.
    fn create_element(&self, tag: &str) -> NodeId;

    /// Create a detached text node.
    fn create_text(&self, text: &str) -> NodeId;

    /// Create a detached, invisible marker node.
    fn create_anchor(&self) -> NodeId;

    /// Replace a text node's content.
    fn set_text(&self, node: NodeId, text: &str);

    /// Parent of `node`, if attached.
    fn parent(&self, node: NodeId) -> Option<NodeId>;

    /// First child of `parent`.
    fn first_child(&self, parent: NodeId) -> Option<NodeId>;

    /// Sibling following `node`.
    fn next_sibling(&self, node: NodeId) -> Option<NodeId>;

    /// Insert `node` into `parent` before `reference`, or last when
    /// `reference` is `None`. An attached node is moved.
    fn insert_before(&self, parent: NodeId, node: NodeId, reference: Option<NodeId>);

    /// Detach `node` from `parent`.
    fn remove_child(&self, parent: NodeId, node: NodeId);

    fn set_attribute(&self, node: NodeId, name: &str, value: &str);
    fn remove_attribute(&self, node: NodeId, name: &str);

    fn set_property(&self, node: NodeId, name: &str, value: Value);
    fn remove_property(&self, node: NodeId, name: &str);
    fn property(&self, node: NodeId, name: &str) -> Option<Value>;

    fn add_class(&self, node: NodeId, class: &str);
    fn remove_class(&self, node: NodeId, class: &str);

    fn set_style(&self, node: NodeId, name: &str, value: &str);
    fn remove_style(&self, node: NodeId, name: &str);
    /// Drop the node's entire inline style.
    fn clear_style(&self, node: NodeId);

    fn add_event_listener(&self, node: NodeId, event: &str, listener: Listener) -> ListenerId;
    fn remove_event_listener(&self, node: NodeId, listener: ListenerId);
}

impl fmt::Debug for dyn HostTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("HostTree")
    }
}

/// Insert `node` into `parent` right after `after`, or as the first child
/// when `after` is `None`.
pub fn insert_after(tree: &dyn HostTree, parent: NodeId, node: NodeId, after: Option<NodeId>) {
    let reference = match after {
        Some(after) => tree.next_sibling(after),
        None => tree.first_child(parent),
    };
    if reference == Some(node) {
        return;
    }
    tree.insert_before(parent, node, reference);
}

/// Detach `node` from whatever parent it has.
pub fn detach(tree: &dyn HostTree, node: NodeId) {
    if let Some(parent) = tree.parent(node) {
        tree.remove_child(parent, node);
    }
}
