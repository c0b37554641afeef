//! Text binder.
//!
//! [`Text`] owns exactly one host text node and keeps its content equal to
//! the text form of a static or reactive value.

use serde_json::Value;
use tracing::trace;

use crate::error::{RenderError, Result};
use crate::host::{insert_after, NodeId, SharedTree};
use crate::reactive::{Prop, Subscription};
use crate::view::View;

/// Conversion of a bound value into text node content.
pub trait TextContent {
    fn to_text(&self) -> String;
}

impl TextContent for Value {
    /// Strings verbatim, `null` as nothing, everything else as JSON.
    fn to_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

impl TextContent for String {
    fn to_text(&self) -> String {
        self.clone()
    }
}

impl TextContent for &'static str {
    fn to_text(&self) -> String {
        (*self).to_string()
    }
}

impl<T: TextContent> TextContent for Option<T> {
    fn to_text(&self) -> String {
        self.as_ref().map(TextContent::to_text).unwrap_or_default()
    }
}

macro_rules! display_text {
    ($($ty:ty),* $(,)?) => {
        $(
            impl TextContent for $ty {
                fn to_text(&self) -> String {
                    self.to_string()
                }
            }
        )*
    };
}

display_text!(bool, char, i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64);

/// A text node bound to a value.
pub struct Text<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    content: Prop<T>,
    mounted: Option<Mounted>,
}

struct Mounted {
    tree: SharedTree,
    node: NodeId,
    subscription: Subscription,
}

impl<T> Text<T>
where
    T: TextContent + Clone + PartialEq + Send + Sync + 'static,
{
    /// Bind a text node to `content`.
    pub fn new(content: impl Into<Prop<T>>) -> Self {
        Self {
            content: content.into(),
            mounted: None,
        }
    }

    /// The text node, while connected.
    pub fn node(&self) -> Option<NodeId> {
        self.mounted.as_ref().map(|m| m.node)
    }
}

impl<T> View for Text<T>
where
    T: TextContent + Clone + PartialEq + Send + Sync + 'static,
{
    fn connect(&mut self, tree: &SharedTree, parent: NodeId, after: Option<NodeId>) -> Result<()> {
        if self.mounted.is_some() {
            return Err(RenderError::AlreadyConnected);
        }

        let node = tree.create_text("");
        insert_after(tree.as_ref(), parent, node, after);

        let target = SharedTree::clone(tree);
        let subscription = self.content.observe(move |value: &T| {
            trace!(%node, "text updated");
            target.set_text(node, &value.to_text());
        });

        self.mounted = Some(Mounted {
            tree: SharedTree::clone(tree),
            node,
            subscription,
        });
        Ok(())
    }

    fn disconnect(&mut self) {
        if let Some(mounted) = self.mounted.take() {
            mounted.subscription.stop();
            crate::host::detach(mounted.tree.as_ref(), mounted.node);
        }
    }

    fn nodes(&self) -> Vec<NodeId> {
        self.node().into_iter().collect()
    }

    fn is_connected(&self) -> bool {
        self.mounted.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryTree;
    use crate::reactive::Signal;
    use serde_json::json;

    #[test]
    fn value_text_forms() {
        assert_eq!(Value::Null.to_text(), "");
        assert_eq!(json!("hi").to_text(), "hi");
        assert_eq!(json!(3).to_text(), "3");
        assert_eq!(json!(true).to_text(), "true");
        assert_eq!(None::<i32>.to_text(), "");
        assert_eq!(Some(1.5).to_text(), "1.5");
    }

    #[test]
    fn reactive_text_follows_signal() {
        let memory = MemoryTree::shared();
        let tree: SharedTree = memory.clone();
        let name = Signal::new("Ada".to_string());

        let mut text = Text::<String>::new(name.clone());
        text.connect(&tree, memory.root(), None).unwrap();
        assert_eq!(memory.render(), "Ada");

        name.set("Grace".to_string());
        assert_eq!(memory.render(), "Grace");

        text.disconnect();
        assert_eq!(memory.render(), "");
        assert_eq!(name.subscriber_count(), 0);

        // Second disconnect is a no-op.
        text.disconnect();
        assert!(!text.is_connected());
    }

    #[test]
    fn static_text_and_double_connect() {
        let memory = MemoryTree::shared();
        let tree: SharedTree = memory.clone();

        let mut text = Text::<i32>::new(42);
        text.connect(&tree, memory.root(), None).unwrap();
        assert_eq!(memory.render(), "42");
        assert_eq!(
            text.connect(&tree, memory.root(), None),
            Err(RenderError::AlreadyConnected)
        );
    }
}
