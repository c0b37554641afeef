//! Element descriptor.

use serde_json::Value;
use tracing::trace;

use super::{connect_all, disconnect_all, Renderable, View, Views};
use crate::bind::{bind_with, Binding, BindingSet};
use crate::config::BindConfig;
use crate::error::{RenderError, Result};
use crate::host::{detach, insert_after, Event, NodeId, SharedTree};

/// A host element with bindings and children.
///
/// ```rust
/// use trellis_core::host::{MemoryTree, SharedTree};
/// use trellis_core::reactive::Signal;
/// use trellis_core::view::{Element, View};
/// use trellis_core::{json, Binding};
///
/// let memory = MemoryTree::shared();
/// let tree: SharedTree = memory.clone();
/// let label = Signal::new(json!("save"));
///
/// let mut button = Element::new("button")
///     .attr("type", "submit")
///     .bind("title", Binding::signal(label.clone()))
///     .child(label.clone());
/// button.connect(&tree, memory.root(), None).unwrap();
/// assert_eq!(
///     memory.render(),
///     r#"<button type="submit" title="save">save</button>"#
/// );
/// ```
pub struct Element {
    tag: String,
    bindings: Vec<(String, Binding)>,
    pending: Vec<Renderable>,
    children: Views,
    config: BindConfig,
    mounted: Option<Mounted>,
}

struct Mounted {
    tree: SharedTree,
    node: NodeId,
    bindings: BindingSet,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            bindings: Vec::new(),
            pending: Vec::new(),
            children: Views::new(),
            config: BindConfig::default(),
            mounted: None,
        }
    }

    /// Add a binding. The kind is resolved from `name` when connecting.
    pub fn bind(mut self, name: impl Into<String>, binding: Binding) -> Self {
        self.bindings.push((name.into(), binding));
        self
    }

    /// Add a static attribute or property.
    pub fn attr(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.bind(name, Binding::value(value))
    }

    /// Add an event handler.
    pub fn on<F>(self, event: &str, handler: F) -> Self
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.bind(format!("on:{event}"), Binding::handler(handler))
    }

    pub fn child(mut self, child: impl Into<Renderable>) -> Self {
        self.pending.push(child.into());
        self
    }

    pub fn children<I, R>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<Renderable>,
    {
        self.pending.extend(children.into_iter().map(Into::into));
        self
    }

    /// Use `config` instead of the defaults for this element's bindings.
    pub fn with_config(mut self, config: BindConfig) -> Self {
        self.config = config;
        self
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// The host element, while connected.
    pub fn node(&self) -> Option<NodeId> {
        self.mounted.as_ref().map(|m| m.node)
    }

    fn build(&mut self, tree: &SharedTree) -> Result<Mounted> {
        for child in std::mem::take(&mut self.pending) {
            self.children.extend(child.normalize()?);
        }

        let node = tree.create_element(&self.tag);
        let bindings = bind_with(tree, node, &self.bindings, &self.config)?;
        if let Err(error) = connect_all(&mut self.children, tree, node, None) {
            bindings.release();
            return Err(error);
        }

        Ok(Mounted {
            tree: SharedTree::clone(tree),
            node,
            bindings,
        })
    }
}

impl View for Element {
    fn connect(&mut self, tree: &SharedTree, parent: NodeId, after: Option<NodeId>) -> Result<()> {
        if self.mounted.is_some() {
            return Err(RenderError::AlreadyConnected);
        }

        let mounted = self.build(tree)?;
        insert_after(tree.as_ref(), parent, mounted.node, after);
        trace!(node = %mounted.node, tag = %self.tag, "element connected");
        self.mounted = Some(mounted);
        Ok(())
    }

    fn disconnect(&mut self) {
        if let Some(mounted) = self.mounted.take() {
            mounted.bindings.release();
            disconnect_all(&mut self.children);
            detach(mounted.tree.as_ref(), mounted.node);
        }
    }

    fn nodes(&self) -> Vec<NodeId> {
        self.node().into_iter().collect()
    }

    fn is_connected(&self) -> bool {
        self.mounted.is_some()
    }
}

impl std::fmt::Debug for Element {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Element")
            .field("tag", &self.tag)
            .field("bindings", &self.bindings.len())
            .field("children", &(self.pending.len() + self.children.len()))
            .field("node", &self.node())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BindError;
    use crate::host::{HostTree, MemoryTree};
    use crate::reactive::Signal;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn nested_elements_render_in_order() {
        let memory = MemoryTree::shared();
        let tree: SharedTree = memory.clone();

        let mut list = Element::new("ul")
            .attr("id", "items")
            .children(["one", "two"].map(|label| Element::new("li").child(label)));
        list.connect(&tree, memory.root(), None).unwrap();

        assert_eq!(
            memory.render(),
            r#"<ul id="items"><li>one</li><li>two</li></ul>"#
        );
    }

    #[test]
    fn disconnect_releases_everything() {
        let memory = MemoryTree::shared();
        let tree: SharedTree = memory.clone();
        let text = Signal::new(json!("hi"));
        let clicks = Arc::new(AtomicUsize::new(0));

        let clicks_clone = clicks.clone();
        let mut element = Element::new("p")
            .bind("title", Binding::signal(text.clone()))
            .on("click", move |_| {
                clicks_clone.fetch_add(1, Ordering::SeqCst);
            })
            .child(text.clone());
        element.connect(&tree, memory.root(), None).unwrap();
        let node = element.node().unwrap();

        memory.dispatch(node, "click");
        assert_eq!(clicks.load(Ordering::SeqCst), 1);
        assert_eq!(text.subscriber_count(), 2);

        element.disconnect();
        assert_eq!(memory.render(), "");
        assert_eq!(text.subscriber_count(), 0);
        assert_eq!(memory.listener_count(), 0);

        // Reconnecting rebuilds from the same description.
        element.connect(&tree, memory.root(), None).unwrap();
        assert_eq!(memory.render(), r#"<p title="hi">hi</p>"#);
        assert_eq!(text.subscriber_count(), 2);
    }

    #[test]
    fn binding_error_places_nothing() {
        let memory = MemoryTree::shared();
        let tree: SharedTree = memory.clone();

        let mut element = Element::new("div")
            .bind("on:", Binding::handler(|_| {}))
            .child("never shown");
        let error = element.connect(&tree, memory.root(), None).unwrap_err();

        assert_eq!(error, RenderError::Bind(BindError::MissingEvent("on:".into())));
        assert!(!element.is_connected());
        assert_eq!(memory.render(), "");
        assert!(memory.children(memory.root()).is_empty());
    }

    #[test]
    fn object_child_is_rejected() {
        let memory = MemoryTree::shared();
        let tree: SharedTree = memory.clone();

        let mut element = Element::new("div").child(json!({ "a": 1 }));
        assert!(matches!(
            element.connect(&tree, memory.root(), None),
            Err(RenderError::UnrenderableValue(_))
        ));
        assert_eq!(memory.first_child(memory.root()), None);
    }
}
