//! Views and Reconcilers
//!
//! A [`View`] is a subtree descriptor: something that can place its nodes
//! into a host tree after a given sibling and take them out again.
//! [`Element`] and [`Text`](crate::bind::Text) are static descriptors;
//! [`Dynamic`] and [`List`] are reconcilers that keep their content in sync
//! with a signal.
//!
//! Render functions return a [`Renderable`], a closed set of shapes that is
//! normalised into a flat sequence of views in one place.
//!
//! # Errors
//!
//! Problems found while a view is first connected come back as `Err` from
//! [`View::connect`]. A reconciler that hits one later, inside a signal
//! notification, has nobody to return it to and panics instead.

mod dynamic;
mod element;
mod list;
pub mod transition;

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use serde_json::Value;
use smallvec::SmallVec;

use crate::bind::Text;
use crate::error::{RenderError, Result};
use crate::host::{HostTree, NodeId, SharedTree};
use crate::reactive::{Derived, Prop, ReadSignal, Signal};

pub use dynamic::Dynamic;
pub use element::Element;
pub use list::{Key, List};
pub use transition::{Timed, Transition, TransitionFuture, TransitionHandle};

/// A subtree that can be attached to and detached from a host tree.
pub trait View: Send {
    /// Create the subtree and insert it into `parent` right after `after`
    /// (or as the first children when `after` is `None`).
    fn connect(&mut self, tree: &SharedTree, parent: NodeId, after: Option<NodeId>) -> Result<()>;

    /// Release every subscription and detach every node. Calling it on a
    /// disconnected view does nothing.
    fn disconnect(&mut self);

    /// Top-level host nodes currently owned by the view, in tree order.
    fn nodes(&self) -> Vec<NodeId>;

    fn is_connected(&self) -> bool;
}

/// A flat run of views.
pub type Views = SmallVec<[Box<dyn View>; 2]>;

/// What a render function may return.
pub enum Renderable {
    /// Renders nothing.
    Empty,
    /// `null` and `false` render nothing, arrays render each element,
    /// objects are rejected, anything else renders as text.
    Value(Value),
    /// Text that follows a signal.
    Reactive(ReadSignal<Value>),
    /// Nested renderables, flattened in order.
    List(Vec<Renderable>),
    /// A prebuilt subtree.
    View(Box<dyn View>),
}

impl Renderable {
    /// Flatten into views.
    pub fn normalize(self) -> Result<Views> {
        let mut views = Views::new();
        self.flatten_into(&mut views)?;
        Ok(views)
    }

    fn flatten_into(self, views: &mut Views) -> Result<()> {
        match self {
            Renderable::Empty => {}
            Renderable::Value(value) => match value {
                Value::Null | Value::Bool(false) => {}
                Value::Array(items) => {
                    for item in items {
                        Renderable::Value(item).flatten_into(views)?;
                    }
                }
                Value::Object(_) => return Err(RenderError::UnrenderableValue(value)),
                other => views.push(Box::new(Text::<Value>::new(other))),
            },
            Renderable::Reactive(signal) => {
                views.push(Box::new(Text::<Value>::new(Prop::Reactive(signal))));
            }
            Renderable::List(items) => {
                for item in items {
                    item.flatten_into(views)?;
                }
            }
            Renderable::View(view) => views.push(view),
        }
        Ok(())
    }

    /// Whether this renders nothing without further inspection.
    pub fn is_empty(&self) -> bool {
        match self {
            Renderable::Empty => true,
            Renderable::Value(value) => matches!(value, Value::Null | Value::Bool(false)),
            Renderable::List(items) => items.iter().all(Renderable::is_empty),
            Renderable::Reactive(_) | Renderable::View(_) => false,
        }
    }
}

impl std::fmt::Debug for Renderable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Renderable::Empty => f.write_str("Empty"),
            Renderable::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Renderable::Reactive(signal) => f.debug_tuple("Reactive").field(&signal.id()).finish(),
            Renderable::List(items) => f.debug_tuple("List").field(items).finish(),
            Renderable::View(view) => f.debug_tuple("View").field(&view.nodes()).finish(),
        }
    }
}

impl Default for Renderable {
    fn default() -> Self {
        Renderable::Empty
    }
}

impl From<()> for Renderable {
    fn from(_: ()) -> Self {
        Renderable::Empty
    }
}

impl From<Value> for Renderable {
    fn from(value: Value) -> Self {
        Renderable::Value(value)
    }
}

macro_rules! value_renderable {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Renderable {
                fn from(value: $ty) -> Self {
                    Renderable::Value(Value::from(value))
                }
            }
        )*
    };
}

value_renderable!(&str, String, bool, i32, i64, u32, u64, usize, f64);

impl<R: Into<Renderable>> From<Option<R>> for Renderable {
    fn from(value: Option<R>) -> Self {
        value.map_or(Renderable::Empty, Into::into)
    }
}

impl From<Vec<Renderable>> for Renderable {
    fn from(items: Vec<Renderable>) -> Self {
        Renderable::List(items)
    }
}

impl From<ReadSignal<Value>> for Renderable {
    fn from(signal: ReadSignal<Value>) -> Self {
        Renderable::Reactive(signal)
    }
}

impl From<Signal<Value>> for Renderable {
    fn from(signal: Signal<Value>) -> Self {
        Renderable::Reactive(signal.readonly())
    }
}

impl From<Derived<Value>> for Renderable {
    fn from(derived: Derived<Value>) -> Self {
        Renderable::Reactive(derived.readonly())
    }
}

impl From<Box<dyn View>> for Renderable {
    fn from(view: Box<dyn View>) -> Self {
        Renderable::View(view)
    }
}

impl From<Element> for Renderable {
    fn from(element: Element) -> Self {
        Renderable::View(Box::new(element))
    }
}

impl<T> From<Text<T>> for Renderable
where
    T: crate::bind::TextContent + Clone + PartialEq + Send + Sync + 'static,
{
    fn from(text: Text<T>) -> Self {
        Renderable::View(Box::new(text))
    }
}

impl<T> From<Dynamic<T>> for Renderable
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn from(dynamic: Dynamic<T>) -> Self {
        Renderable::View(Box::new(dynamic))
    }
}

impl<T, K> From<List<T, K>> for Renderable
where
    T: Clone + PartialEq + Send + Sync + 'static,
    K: Key,
{
    fn from(list: List<T, K>) -> Self {
        Renderable::View(Box::new(list))
    }
}

/// Connect `views` one after another, starting right after `after`.
///
/// Returns the last node placed, or `after` when nothing was placed. If a
/// view fails, the ones already connected are disconnected again.
pub(crate) fn connect_all(
    views: &mut [Box<dyn View>],
    tree: &SharedTree,
    parent: NodeId,
    after: Option<NodeId>,
) -> Result<Option<NodeId>> {
    let mut cursor = after;
    for position in 0..views.len() {
        if let Err(error) = views[position].connect(tree, parent, cursor) {
            disconnect_all(&mut views[..position]);
            return Err(error);
        }
        if let Some(last) = views[position].nodes().last() {
            cursor = Some(*last);
        }
    }
    Ok(cursor)
}

/// Disconnect `views` in reverse order.
pub(crate) fn disconnect_all(views: &mut [Box<dyn View>]) {
    for view in views.iter_mut().rev() {
        view.disconnect();
    }
}

/// Every top-level node of `views`, in order.
pub(crate) fn nodes_of(views: &[Box<dyn View>]) -> Vec<NodeId> {
    views.iter().flat_map(|view| view.nodes()).collect()
}

fn last_child(tree: &dyn HostTree, parent: NodeId) -> Option<NodeId> {
    let mut last = tree.first_child(parent)?;
    while let Some(next) = tree.next_sibling(last) {
        last = next;
    }
    Some(last)
}

/// Render `content` at the end of `parent`.
///
/// The returned views own everything that was placed; pass them to
/// [`unmount`] to take it down again.
pub fn mount(content: impl Into<Renderable>, tree: &SharedTree, parent: NodeId) -> Result<Views> {
    let mut views = content.into().normalize()?;
    let after = last_child(tree.as_ref(), parent);
    connect_all(&mut views, tree, parent, after)?;
    Ok(views)
}

/// Disconnect views returned by [`mount`].
pub fn unmount(views: &mut Views) {
    disconnect_all(views);
}

/// Routes errors raised inside reconciler notifications.
///
/// While the first notification runs (during `connect`) the first error is
/// kept so `connect` can return it. Afterwards an error has no caller to go
/// to and panics.
#[derive(Debug, Default)]
pub(crate) struct ErrorSink {
    connecting: AtomicBool,
    first: Mutex<Option<RenderError>>,
}

impl ErrorSink {
    pub(crate) fn begin(&self) {
        self.connecting.store(true, Ordering::SeqCst);
    }

    pub(crate) fn finish(&self) -> Result<()> {
        self.connecting.store(false, Ordering::SeqCst);
        match self.first.lock().take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// # Panics
    ///
    /// Panics with the error's message outside of `connect`.
    pub(crate) fn report(&self, error: RenderError) {
        if self.connecting.load(Ordering::SeqCst) {
            self.first.lock().get_or_insert(error);
        } else {
            panic!("{error}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryTree;
    use serde_json::json;

    #[test]
    fn normalize_flattens_shapes() {
        let content = Renderable::List(vec![
            "a".into(),
            Renderable::Empty,
            json!([1, null, false, [true]]).into(),
            Some("b").into(),
            None::<&str>.into(),
        ]);

        let views = content.normalize().unwrap();
        assert_eq!(views.len(), 4);
    }

    #[test]
    fn normalize_rejects_objects() {
        let content: Renderable = json!(["ok", { "no": 1 }]).into();
        assert_eq!(
            content.normalize().err(),
            Some(RenderError::UnrenderableValue(json!({ "no": 1 })))
        );
    }

    #[test]
    fn empty_shapes() {
        assert!(Renderable::from(()).is_empty());
        assert!(Renderable::from(false).is_empty());
        assert!(Renderable::from(Value::Null).is_empty());
        assert!(Renderable::List(vec![Renderable::Empty]).is_empty());
        assert!(!Renderable::from(0).is_empty());
    }

    #[test]
    fn mount_appends_after_existing_children() {
        let memory = MemoryTree::shared();
        let tree: SharedTree = memory.clone();
        let existing = memory.create_text("first ");
        memory.insert_before(memory.root(), existing, None);

        let content = Renderable::List(vec!["second".into(), " third".into()]);
        let mut views = mount(content, &tree, memory.root()).unwrap();
        assert_eq!(memory.render(), "first second third");

        unmount(&mut views);
        assert_eq!(memory.render(), "first ");
    }

    #[test]
    #[should_panic(expected = "view is not connected")]
    fn sink_panics_after_connect() {
        let sink = ErrorSink::default();
        sink.begin();
        sink.report(RenderError::NotConnected);
        assert_eq!(sink.finish(), Err(RenderError::NotConnected));
        sink.report(RenderError::NotConnected);
    }
}
