//! Inline style bindings.
//!
//! A [`StyleMap`] maps property names to static or reactive
//! [`StyleValue`]s. When the map itself is reactive, every change clears the
//! node's inline style and rebuilds all per-property bindings; a reactive
//! entry inside the map updates only its own property.

use std::sync::Arc;

use indexmap::IndexMap;
use tracing::trace;

use crate::host::{NodeId, SharedTree};
use crate::reactive::{Prop, ReadSignal, Subscription, Subscriptions};

/// One inline style value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum StyleValue {
    /// A length, suffixed with the configured unit.
    Number(f64),
    /// Applied verbatim.
    Text(String),
    /// Removes the property.
    #[default]
    Unset,
}

impl StyleValue {
    /// The CSS text of this value, `None` for [`StyleValue::Unset`].
    pub fn css(&self, unit: &str) -> Option<String> {
        match self {
            StyleValue::Number(n) => Some(format!("{n}{unit}")),
            StyleValue::Text(text) => Some(text.clone()),
            StyleValue::Unset => None,
        }
    }
}

impl From<f64> for StyleValue {
    fn from(n: f64) -> Self {
        StyleValue::Number(n)
    }
}

impl From<i32> for StyleValue {
    fn from(n: i32) -> Self {
        StyleValue::Number(f64::from(n))
    }
}

impl From<&str> for StyleValue {
    fn from(text: &str) -> Self {
        StyleValue::Text(text.to_string())
    }
}

impl From<String> for StyleValue {
    fn from(text: String) -> Self {
        StyleValue::Text(text)
    }
}

impl<T: Into<StyleValue>> From<Option<T>> for StyleValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(StyleValue::Unset, Into::into)
    }
}

/// Ordered set of inline style entries.
///
/// ```rust
/// use trellis_core::bind::{StyleMap, StyleValue};
/// use trellis_core::reactive::{Readable, Signal};
///
/// let width = Signal::new(10.0);
/// let style = StyleMap::new()
///     .set("color", "red")
///     .bind("width", width.map(|w| StyleValue::from(*w)));
/// assert_eq!(style.len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StyleMap {
    entries: IndexMap<String, Prop<StyleValue>>,
}

impl StyleMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a static entry.
    pub fn set(mut self, name: impl Into<String>, value: impl Into<StyleValue>) -> Self {
        self.entries.insert(name.into(), Prop::Static(value.into()));
        self
    }

    /// Add a reactive entry.
    pub fn bind(mut self, name: impl Into<String>, value: impl Into<ReadSignal<StyleValue>>) -> Self {
        self.entries.insert(name.into(), Prop::Reactive(value.into()));
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Prop<StyleValue>)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }
}

fn apply(tree: &SharedTree, node: NodeId, name: &str, value: &StyleValue, unit: &str) {
    match value.css(unit) {
        Some(css) => tree.set_style(node, name, &css),
        None => tree.remove_style(node, name),
    }
}

/// Bind `style` onto `node`. The returned handle stops the outer and every
/// per-entry subscription.
pub(crate) fn bind_style(
    tree: &SharedTree,
    node: NodeId,
    style: &Prop<StyleMap>,
    unit: &str,
) -> Subscription {
    let entries = Arc::new(Subscriptions::new());
    let unit: Arc<str> = Arc::from(unit);

    let target = SharedTree::clone(tree);
    let inner = Arc::clone(&entries);
    let outer = style.observe(move |map: &StyleMap| {
        inner.stop_all();
        target.clear_style(node);
        trace!(%node, entries = map.len(), "style rebuilt");

        for (name, value) in map.iter() {
            let tree = SharedTree::clone(&target);
            let name = name.to_string();
            let unit = Arc::clone(&unit);
            inner.push(value.observe(move |v: &StyleValue| {
                apply(&tree, node, &name, v, &unit);
            }));
        }
    });

    Subscription::new(move || {
        outer.stop();
        entries.stop_all();
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{HostTree, MemoryTree};
    use crate::reactive::{Readable, Signal};

    #[test]
    fn css_text() {
        assert_eq!(StyleValue::from(12).css("px").as_deref(), Some("12px"));
        assert_eq!(StyleValue::from(1.5).css("rem").as_deref(), Some("1.5rem"));
        assert_eq!(StyleValue::from("auto").css("px").as_deref(), Some("auto"));
        assert_eq!(StyleValue::from(None::<i32>).css("px"), None);
    }

    #[test]
    fn nested_signal_updates_single_property() {
        let memory = MemoryTree::shared();
        let tree: SharedTree = memory.clone();
        let node = memory.create_element("div");

        let width = Signal::new(10.0);
        let style = StyleMap::new()
            .set("color", "red")
            .bind("width", width.map(|w| StyleValue::from(*w)));

        let subscription = bind_style(&tree, node, &Prop::Static(style), "px");
        assert_eq!(memory.style(node, "color").as_deref(), Some("red"));
        assert_eq!(memory.style(node, "width").as_deref(), Some("10px"));

        width.set(20.0);
        assert_eq!(memory.style(node, "width").as_deref(), Some("20px"));
        assert_eq!(memory.style(node, "color").as_deref(), Some("red"));

        subscription.stop();
        assert_eq!(width.subscriber_count(), 0);
        width.set(30.0);
        assert_eq!(memory.style(node, "width").as_deref(), Some("20px"));
    }

    #[test]
    fn outer_signal_rebuilds_whole_style() {
        let memory = MemoryTree::shared();
        let tree: SharedTree = memory.clone();
        let node = memory.create_element("div");

        let height = Signal::new(StyleValue::from(5));
        let first = StyleMap::new().set("color", "red").bind("height", height.clone());
        let style = Signal::new(first);

        let subscription = bind_style(&tree, node, &Prop::from(style.clone()), "px");
        assert_eq!(memory.style_len(node), 2);
        assert_eq!(height.subscriber_count(), 1);

        style.set(StyleMap::new().set("margin", 4));
        assert_eq!(memory.style(node, "color"), None);
        assert_eq!(memory.style(node, "height"), None);
        assert_eq!(memory.style(node, "margin").as_deref(), Some("4px"));
        // The old nested binding was torn down with the old map.
        assert_eq!(height.subscriber_count(), 0);

        subscription.stop();
        assert_eq!(style.subscriber_count(), 0);
    }
}
