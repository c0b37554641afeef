//! In-memory host tree.
//!
//! [`MemoryTree`] implements every [`HostTree`] primitive over a plain node
//! table. Beyond the trait it offers introspection (`children`,
//! `inner_html`, `snapshot`, listener counts) and synthetic event dispatch,
//! which is what the reconciler tests assert against.

use std::fmt::Write as _;
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use super::node::{ListenerId, NodeId, NodeKind};
use super::{Event, HostTree, Listener};

struct MemoryNode {
    kind: NodeKind,
    tag: String,
    text: String,
    attributes: IndexMap<String, String>,
    properties: IndexMap<String, Value>,
    classes: IndexSet<String>,
    style: IndexMap<String, String>,
    listeners: Vec<(ListenerId, String, Listener)>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl MemoryNode {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            tag: String::new(),
            text: String::new(),
            attributes: IndexMap::new(),
            properties: IndexMap::new(),
            classes: IndexSet::new(),
            style: IndexMap::new(),
            listeners: Vec::new(),
            parent: None,
            children: Vec::new(),
        }
    }
}

/// Serializable view of a subtree, for assertions and debugging.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeSnapshot {
    pub kind: NodeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub attributes: IndexMap<String, String>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub properties: IndexMap<String, Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub classes: Vec<String>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub style: IndexMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeSnapshot>,
}

/// A host tree kept entirely in memory.
pub struct MemoryTree {
    root: NodeId,
    nodes: Mutex<IndexMap<NodeId, MemoryNode>>,
}

impl MemoryTree {
    /// Create a tree with a single `<root>` element.
    pub fn new() -> Self {
        let root = NodeId::new();
        let mut node = MemoryNode::new(NodeKind::Element);
        node.tag = "root".to_string();

        let mut nodes = IndexMap::new();
        nodes.insert(root, node);
        Self {
            root,
            nodes: Mutex::new(nodes),
        }
    }

    /// Create a tree behind an `Arc`, ready to hand out as a
    /// [`SharedTree`](super::SharedTree).
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// The root element.
    pub fn root(&self) -> NodeId {
        self.root
    }

    fn create(&self, node: MemoryNode) -> NodeId {
        let id = NodeId::new();
        self.nodes.lock().insert(id, node);
        id
    }

    fn with_node<R>(&self, id: NodeId, f: impl FnOnce(&mut MemoryNode) -> R) -> Option<R> {
        let mut nodes = self.nodes.lock();
        match nodes.get_mut(&id) {
            Some(node) => Some(f(node)),
            None => {
                warn!(node = %id, "memory tree: unknown node");
                None
            }
        }
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    /// Kind of `node`.
    pub fn kind(&self, node: NodeId) -> Option<NodeKind> {
        self.nodes.lock().get(&node).map(|n| n.kind)
    }

    /// Tag of an element.
    pub fn tag(&self, node: NodeId) -> Option<String> {
        self.nodes
            .lock()
            .get(&node)
            .filter(|n| n.kind == NodeKind::Element)
            .map(|n| n.tag.clone())
    }

    /// Children of `node`, in order. Anchors included.
    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.nodes
            .lock()
            .get(&node)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    /// Children of `node` that are elements or text, in order.
    pub fn visible_children(&self, node: NodeId) -> Vec<NodeId> {
        let nodes = self.nodes.lock();
        nodes
            .get(&node)
            .map(|n| {
                n.children
                    .iter()
                    .copied()
                    .filter(|child| {
                        nodes
                            .get(child)
                            .is_some_and(|c| c.kind != NodeKind::Anchor)
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Concatenated text of `node` and its descendants.
    pub fn text_content(&self, node: NodeId) -> String {
        let nodes = self.nodes.lock();
        let mut out = String::new();
        collect_text(&nodes, node, &mut out);
        out
    }

    /// Attribute value.
    pub fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.nodes
            .lock()
            .get(&node)
            .and_then(|n| n.attributes.get(name).cloned())
    }

    /// Classes of `node`, in the order they were added.
    pub fn classes(&self, node: NodeId) -> Vec<String> {
        self.nodes
            .lock()
            .get(&node)
            .map(|n| n.classes.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Whether `node` carries `class`.
    pub fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.nodes
            .lock()
            .get(&node)
            .is_some_and(|n| n.classes.contains(class))
    }

    /// One inline style property.
    pub fn style(&self, node: NodeId, name: &str) -> Option<String> {
        self.nodes
            .lock()
            .get(&node)
            .and_then(|n| n.style.get(name).cloned())
    }

    /// Number of inline style properties on `node`.
    pub fn style_len(&self, node: NodeId) -> usize {
        self.nodes.lock().get(&node).map_or(0, |n| n.style.len())
    }

    /// Listeners registered on `node`.
    pub fn listeners_on(&self, node: NodeId) -> usize {
        self.nodes.lock().get(&node).map_or(0, |n| n.listeners.len())
    }

    /// Listeners registered anywhere in the tree, attached or not.
    pub fn listener_count(&self) -> usize {
        self.nodes.lock().values().map(|n| n.listeners.len()).sum()
    }

    /// Whether `node` is reachable from the root.
    pub fn is_attached(&self, node: NodeId) -> bool {
        let nodes = self.nodes.lock();
        let mut current = Some(node);
        while let Some(id) = current {
            if id == self.root {
                return true;
            }
            current = nodes.get(&id).and_then(|n| n.parent);
        }
        false
    }

    /// First element with `tag` in document order under the root.
    pub fn find(&self, tag: &str) -> Option<NodeId> {
        self.find_all(tag).into_iter().next()
    }

    /// Every element with `tag` in document order under the root.
    pub fn find_all(&self, tag: &str) -> Vec<NodeId> {
        let nodes = self.nodes.lock();
        let mut found = Vec::new();
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            if let Some(node) = nodes.get(&id) {
                if node.kind == NodeKind::Element && node.tag == tag {
                    found.push(id);
                }
                stack.extend(node.children.iter().rev().copied());
            }
        }
        found
    }

    /// Deliver `event` to every listener registered for it on `node`.
    /// Returns how many listeners ran.
    pub fn dispatch(&self, node: NodeId, event: &str) -> usize {
        let listeners: Vec<Listener> = self
            .nodes
            .lock()
            .get(&node)
            .map(|n| {
                n.listeners
                    .iter()
                    .filter(|(_, name, _)| name == event)
                    .map(|(_, _, listener)| Arc::clone(listener))
                    .collect()
            })
            .unwrap_or_default();

        let payload = Event::new(event, node);
        for listener in &listeners {
            listener(&payload);
        }
        listeners.len()
    }

    /// Simulate a user edit: store `value` into the node's `value` property
    /// and dispatch `input`.
    pub fn input(&self, node: NodeId, value: impl Into<Value>) -> usize {
        self.set_property(node, "value", value.into());
        self.dispatch(node, "input")
    }

    /// HTML-like serialization of everything under the root.
    pub fn render(&self) -> String {
        self.inner_html(self.root)
    }

    /// HTML-like serialization of `node`'s children. Anchors render as
    /// nothing.
    pub fn inner_html(&self, node: NodeId) -> String {
        let nodes = self.nodes.lock();
        let mut out = String::new();
        if let Some(n) = nodes.get(&node) {
            for child in &n.children {
                write_html(&nodes, *child, &mut out);
            }
        }
        out
    }

    /// HTML-like serialization of `node` itself.
    pub fn outer_html(&self, node: NodeId) -> String {
        let nodes = self.nodes.lock();
        let mut out = String::new();
        write_html(&nodes, node, &mut out);
        out
    }

    /// Serializable copy of the subtree rooted at `node`.
    pub fn snapshot(&self, node: NodeId) -> Option<NodeSnapshot> {
        let nodes = self.nodes.lock();
        snapshot_of(&nodes, node)
    }
}

impl Default for MemoryTree {
    fn default() -> Self {
        Self::new()
    }
}

fn collect_text(nodes: &IndexMap<NodeId, MemoryNode>, id: NodeId, out: &mut String) {
    if let Some(node) = nodes.get(&id) {
        match node.kind {
            NodeKind::Text => out.push_str(&node.text),
            NodeKind::Element => {
                for child in &node.children {
                    collect_text(nodes, *child, out);
                }
            }
            NodeKind::Anchor => {}
        }
    }
}

fn write_html(nodes: &IndexMap<NodeId, MemoryNode>, id: NodeId, out: &mut String) {
    let Some(node) = nodes.get(&id) else {
        return;
    };
    match node.kind {
        NodeKind::Anchor => {}
        NodeKind::Text => out.push_str(&node.text),
        NodeKind::Element => {
            out.push('<');
            out.push_str(&node.tag);
            for (name, value) in &node.attributes {
                let _ = write!(out, " {name}=\"{value}\"");
            }
            if !node.classes.is_empty() && !node.attributes.contains_key("class") {
                let classes: Vec<&str> = node.classes.iter().map(String::as_str).collect();
                let _ = write!(out, " class=\"{}\"", classes.join(" "));
            }
            if !node.style.is_empty() {
                let style: Vec<String> = node
                    .style
                    .iter()
                    .map(|(name, value)| format!("{name}: {value}"))
                    .collect();
                let _ = write!(out, " style=\"{}\"", style.join("; "));
            }
            out.push('>');
            for child in &node.children {
                write_html(nodes, *child, out);
            }
            let _ = write!(out, "</{}>", node.tag);
        }
    }
}

fn snapshot_of(nodes: &IndexMap<NodeId, MemoryNode>, id: NodeId) -> Option<NodeSnapshot> {
    let node = nodes.get(&id)?;
    let is_element = node.kind == NodeKind::Element;
    Some(NodeSnapshot {
        kind: node.kind,
        tag: is_element.then(|| node.tag.clone()),
        text: (node.kind == NodeKind::Text).then(|| node.text.clone()),
        attributes: node.attributes.clone(),
        properties: node.properties.clone(),
        classes: node.classes.iter().cloned().collect(),
        style: node.style.clone(),
        children: node
            .children
            .iter()
            .filter_map(|child| snapshot_of(nodes, *child))
            .collect(),
    })
}

impl HostTree for MemoryTree {
    fn create_element(&self, tag: &str) -> NodeId {
        let mut node = MemoryNode::new(NodeKind::Element);
        node.tag = tag.to_string();
        self.create(node)
    }

    fn create_text(&self, text: &str) -> NodeId {
        let mut node = MemoryNode::new(NodeKind::Text);
        node.text = text.to_string();
        self.create(node)
    }

    fn create_anchor(&self) -> NodeId {
        self.create(MemoryNode::new(NodeKind::Anchor))
    }

    fn set_text(&self, node: NodeId, text: &str) {
        self.with_node(node, |n| n.text = text.to_string());
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.lock().get(&node).and_then(|n| n.parent)
    }

    fn first_child(&self, parent: NodeId) -> Option<NodeId> {
        self.nodes
            .lock()
            .get(&parent)
            .and_then(|n| n.children.first().copied())
    }

    fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        let nodes = self.nodes.lock();
        let parent = nodes.get(&node)?.parent?;
        let siblings = &nodes.get(&parent)?.children;
        let position = siblings.iter().position(|c| *c == node)?;
        siblings.get(position + 1).copied()
    }

    fn insert_before(&self, parent: NodeId, node: NodeId, reference: Option<NodeId>) {
        if reference == Some(node) {
            return;
        }

        let mut nodes = self.nodes.lock();
        if !nodes.contains_key(&parent) || !nodes.contains_key(&node) {
            warn!(%parent, %node, "memory tree: insert with unknown node");
            return;
        }

        let old_parent = nodes.get(&node).and_then(|n| n.parent);
        if let Some(old_parent) = old_parent {
            if let Some(old) = nodes.get_mut(&old_parent) {
                old.children.retain(|c| *c != node);
            }
        }

        if let Some(target) = nodes.get_mut(&parent) {
            let position = reference.and_then(|r| target.children.iter().position(|c| *c == r));
            match position {
                Some(position) => target.children.insert(position, node),
                None => {
                    if let Some(reference) = reference {
                        warn!(%parent, %reference, "memory tree: reference is not a child, appending");
                    }
                    target.children.push(node);
                }
            }
        }

        if let Some(inserted) = nodes.get_mut(&node) {
            inserted.parent = Some(parent);
        }
    }

    fn remove_child(&self, parent: NodeId, node: NodeId) {
        let mut nodes = self.nodes.lock();
        let is_child = nodes.get(&node).and_then(|n| n.parent) == Some(parent);
        if !is_child {
            warn!(%parent, %node, "memory tree: remove of a non-child");
            return;
        }
        if let Some(p) = nodes.get_mut(&parent) {
            p.children.retain(|c| *c != node);
        }
        if let Some(n) = nodes.get_mut(&node) {
            n.parent = None;
        }
    }

    fn set_attribute(&self, node: NodeId, name: &str, value: &str) {
        self.with_node(node, |n| {
            n.attributes.insert(name.to_string(), value.to_string());
        });
    }

    fn remove_attribute(&self, node: NodeId, name: &str) {
        self.with_node(node, |n| {
            n.attributes.shift_remove(name);
        });
    }

    fn set_property(&self, node: NodeId, name: &str, value: Value) {
        self.with_node(node, |n| {
            n.properties.insert(name.to_string(), value);
        });
    }

    fn remove_property(&self, node: NodeId, name: &str) {
        self.with_node(node, |n| {
            n.properties.shift_remove(name);
        });
    }

    fn property(&self, node: NodeId, name: &str) -> Option<Value> {
        self.nodes
            .lock()
            .get(&node)
            .and_then(|n| n.properties.get(name).cloned())
    }

    fn add_class(&self, node: NodeId, class: &str) {
        self.with_node(node, |n| {
            n.classes.insert(class.to_string());
        });
    }

    fn remove_class(&self, node: NodeId, class: &str) {
        self.with_node(node, |n| {
            n.classes.shift_remove(class);
        });
    }

    fn set_style(&self, node: NodeId, name: &str, value: &str) {
        self.with_node(node, |n| {
            n.style.insert(name.to_string(), value.to_string());
        });
    }

    fn remove_style(&self, node: NodeId, name: &str) {
        self.with_node(node, |n| {
            n.style.shift_remove(name);
        });
    }

    fn clear_style(&self, node: NodeId) {
        self.with_node(node, |n| n.style.clear());
    }

    fn add_event_listener(&self, node: NodeId, event: &str, listener: Listener) -> ListenerId {
        let id = ListenerId::new();
        self.with_node(node, |n| n.listeners.push((id, event.to_string(), listener)));
        id
    }

    fn remove_event_listener(&self, node: NodeId, listener: ListenerId) {
        self.with_node(node, |n| n.listeners.retain(|(id, _, _)| *id != listener));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn insert_and_reorder() {
        let tree = MemoryTree::new();
        let root = tree.root();
        let a = tree.create_text("a");
        let b = tree.create_text("b");
        let c = tree.create_text("c");

        tree.insert_before(root, a, None);
        tree.insert_before(root, c, None);
        tree.insert_before(root, b, Some(c));
        assert_eq!(tree.inner_html(root), "abc");

        // Re-inserting an attached node moves it.
        tree.insert_before(root, c, Some(a));
        assert_eq!(tree.inner_html(root), "cab");
        assert_eq!(tree.next_sibling(a), Some(b));
        assert_eq!(tree.first_child(root), Some(c));

        tree.remove_child(root, a);
        assert_eq!(tree.inner_html(root), "cb");
        assert!(!tree.is_attached(a));
        assert_eq!(tree.parent(a), None);
    }

    #[test]
    fn insert_after_helper() {
        let tree = MemoryTree::new();
        let root = tree.root();
        let anchor = tree.create_anchor();
        let x = tree.create_text("x");
        let y = tree.create_text("y");

        crate::host::insert_after(&tree, root, anchor, None);
        crate::host::insert_after(&tree, root, y, Some(anchor));
        crate::host::insert_after(&tree, root, x, Some(anchor));
        assert_eq!(tree.children(root), vec![anchor, x, y]);
        assert_eq!(tree.visible_children(root), vec![x, y]);
    }

    #[test]
    fn element_rendering() {
        let tree = MemoryTree::new();
        let div = tree.create_element("div");
        tree.set_attribute(div, "id", "main");
        tree.add_class(div, "a");
        tree.add_class(div, "b");
        tree.set_style(div, "width", "10px");
        let text = tree.create_text("hi");
        tree.insert_before(div, text, None);
        tree.insert_before(tree.root(), div, None);

        assert_eq!(
            tree.inner_html(tree.root()),
            r#"<div id="main" class="a b" style="width: 10px">hi</div>"#
        );
        assert_eq!(tree.text_content(tree.root()), "hi");
        assert_eq!(tree.find("div"), Some(div));
    }

    #[test]
    fn snapshot_serializes() {
        let tree = MemoryTree::new();
        let span = tree.create_element("span");
        tree.set_attribute(span, "title", "t");
        let text = tree.create_text("x");
        tree.insert_before(span, text, None);

        let snapshot = tree.snapshot(span).unwrap();
        assert_eq!(
            serde_json::to_value(&snapshot).unwrap(),
            json!({
                "kind": "element",
                "tag": "span",
                "attributes": { "title": "t" },
                "children": [{ "kind": "text", "text": "x" }]
            })
        );
    }

    #[test]
    fn dispatch_runs_matching_listeners() {
        let tree = MemoryTree::new();
        let button = tree.create_element("button");
        let clicks = Arc::new(AtomicUsize::new(0));
        let clicks_clone = clicks.clone();

        let id = tree.add_event_listener(
            button,
            "click",
            Arc::new(move |event: &Event| {
                assert_eq!(event.name, "click");
                clicks_clone.fetch_add(1, Ordering::SeqCst);
            }),
        );

        assert_eq!(tree.dispatch(button, "click"), 1);
        assert_eq!(tree.dispatch(button, "focus"), 0);
        assert_eq!(tree.listener_count(), 1);

        tree.remove_event_listener(button, id);
        assert_eq!(tree.dispatch(button, "click"), 0);
        assert_eq!(clicks.load(Ordering::SeqCst), 1);
    }
}
