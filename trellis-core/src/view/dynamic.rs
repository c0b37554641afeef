//! Conditional reconciler.
//!
//! A [`Dynamic`] sits behind an anchor node. Whenever its source changes it
//! renders the new value, tears the previous content down (last view first)
//! and connects the new content right after the anchor.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

use super::{connect_all, disconnect_all, nodes_of, ErrorSink, Renderable, View, Views};
use crate::error::{RenderError, Result};
use crate::host::{detach, insert_after, NodeId, SharedTree};
use crate::reactive::{ReadSignal, Subscription};

type RenderFn<T> = Arc<dyn Fn(&T) -> Renderable + Send + Sync>;

/// Content that follows a signal.
///
/// # Panics
///
/// Once connected, a render result that cannot be rendered (see
/// [`Renderable`]) panics inside the `set` that caused it.
pub struct Dynamic<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    source: ReadSignal<T>,
    render: RenderFn<T>,
    mounted: Option<Mounted>,
}

struct Mounted {
    tree: SharedTree,
    anchor: NodeId,
    content: Arc<Mutex<Views>>,
    subscription: Subscription,
}

impl<T> Dynamic<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Render `source` through `render`.
    pub fn new<R, F>(source: impl Into<ReadSignal<T>>, render: F) -> Self
    where
        R: Into<Renderable>,
        F: Fn(&T) -> R + Send + Sync + 'static,
    {
        Self {
            source: source.into(),
            render: Arc::new(move |value: &T| -> Renderable { render(value).into() }),
            mounted: None,
        }
    }

    /// Render the source value itself.
    pub fn of(source: impl Into<ReadSignal<T>>) -> Self
    where
        T: Into<Renderable>,
    {
        Self::new(source, |value: &T| value.clone())
    }

    /// The anchor node, while connected.
    pub fn anchor(&self) -> Option<NodeId> {
        self.mounted.as_ref().map(|m| m.anchor)
    }
}

/// Swap the content after `anchor` for `rendered`.
fn swap(
    tree: &SharedTree,
    parent: NodeId,
    anchor: NodeId,
    content: &Mutex<Views>,
    rendered: Renderable,
) -> Result<()> {
    let mut next = rendered.normalize()?;

    let mut previous = std::mem::take(&mut *content.lock());
    disconnect_all(&mut previous);

    connect_all(&mut next, tree, parent, Some(anchor))?;
    trace!(%anchor, removed = previous.len(), added = next.len(), "dynamic content swapped");
    *content.lock() = next;
    Ok(())
}

impl<T> View for Dynamic<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn connect(&mut self, tree: &SharedTree, parent: NodeId, after: Option<NodeId>) -> Result<()> {
        if self.mounted.is_some() {
            return Err(RenderError::AlreadyConnected);
        }

        let anchor = tree.create_anchor();
        insert_after(tree.as_ref(), parent, anchor, after);

        let content: Arc<Mutex<Views>> = Arc::new(Mutex::new(Views::new()));
        let sink = Arc::new(ErrorSink::default());

        let render = Arc::clone(&self.render);
        let target = SharedTree::clone(tree);
        let state = Arc::clone(&content);
        let errors = Arc::clone(&sink);

        sink.begin();
        let subscription = self.source.observe(move |value: &T| {
            if let Err(error) = swap(&target, parent, anchor, &state, render(value)) {
                errors.report(error);
            }
        });

        self.mounted = Some(Mounted {
            tree: SharedTree::clone(tree),
            anchor,
            content,
            subscription,
        });

        if let Err(error) = sink.finish() {
            debug!(%anchor, %error, "dynamic failed to connect");
            self.disconnect();
            return Err(error);
        }
        Ok(())
    }

    fn disconnect(&mut self) {
        if let Some(mounted) = self.mounted.take() {
            mounted.subscription.stop();
            let mut content = std::mem::take(&mut *mounted.content.lock());
            disconnect_all(&mut content);
            detach(mounted.tree.as_ref(), mounted.anchor);
        }
    }

    fn nodes(&self) -> Vec<NodeId> {
        match &self.mounted {
            Some(mounted) => {
                let mut nodes = vec![mounted.anchor];
                nodes.extend(nodes_of(&mounted.content.lock()));
                nodes
            }
            None => Vec::new(),
        }
    }

    fn is_connected(&self) -> bool {
        self.mounted.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{HostTree, MemoryTree};
    use crate::reactive::Signal;
    use crate::view::Element;
    use serde_json::{json, Value};

    #[test]
    fn toggles_content() {
        let memory = MemoryTree::shared();
        let tree: SharedTree = memory.clone();
        let visible = Signal::new(true);

        let mut dynamic = Dynamic::new(visible.clone(), |on: &bool| {
            on.then(|| Element::new("b").child("shown"))
        });
        dynamic.connect(&tree, memory.root(), None).unwrap();
        assert_eq!(memory.render(), "<b>shown</b>");

        visible.set(false);
        assert_eq!(memory.render(), "");
        assert_eq!(memory.children(memory.root()).len(), 1);

        visible.set(true);
        assert_eq!(memory.render(), "<b>shown</b>");

        dynamic.disconnect();
        assert!(memory.children(memory.root()).is_empty());
        assert_eq!(visible.subscriber_count(), 0);
    }

    #[test]
    fn content_stays_after_anchor() {
        let memory = MemoryTree::shared();
        let tree: SharedTree = memory.clone();
        let before = memory.create_text("[");
        let after = memory.create_text("]");
        memory.insert_before(memory.root(), before, None);
        memory.insert_before(memory.root(), after, None);

        let items = Signal::new(json!(["a", "b"]));
        let mut dynamic = Dynamic::<Value>::of(items.clone());
        dynamic.connect(&tree, memory.root(), Some(before)).unwrap();
        assert_eq!(memory.render(), "[ab]");

        items.set(json!(["c"]));
        assert_eq!(memory.render(), "[c]");
        assert_eq!(dynamic.nodes().len(), 2);
    }

    #[test]
    fn connect_reports_unrenderable_value() {
        let memory = MemoryTree::shared();
        let tree: SharedTree = memory.clone();
        let value = Signal::new(json!({ "bad": true }));

        let mut dynamic = Dynamic::<Value>::of(value.clone());
        assert_eq!(
            dynamic.connect(&tree, memory.root(), None),
            Err(RenderError::UnrenderableValue(json!({ "bad": true })))
        );
        assert!(!dynamic.is_connected());
        assert_eq!(value.subscriber_count(), 0);
        assert!(memory.children(memory.root()).is_empty());
    }

    #[test]
    #[should_panic(expected = "value cannot be rendered")]
    fn unrenderable_update_panics() {
        let memory = MemoryTree::shared();
        let tree: SharedTree = memory.clone();
        let value = Signal::new(json!("fine"));

        let mut dynamic = Dynamic::<Value>::of(value.clone());
        dynamic.connect(&tree, memory.root(), None).unwrap();
        value.set(json!({ "bad": true }));
    }
}
