//! Keyed list reconciler.
//!
//! Every item of the source collection is identified by a caller supplied
//! key. An item whose key survives a change keeps its subtree; only its
//! value and index signals are updated. Vanished keys are torn down, new
//! keys are rendered, and finally every item's nodes are walked in index
//! order after the anchor and moved where they are out of place.
//!
//! # Duplicate keys
//!
//! When one pass sees the same key twice the last occurrence wins: the item
//! gets the value and index of the last occurrence and a warning is logged.
//! The index signal keeps that source index, so for `[1, 2, 1]` (keyed by
//! value) item `1` is rendered second but its index reads `2`.

use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::{debug, warn};

use super::transition::{Transition, TransitionHandle, Transitions};
use super::{connect_all, disconnect_all, nodes_of, ErrorSink, Renderable, View, Views};
use crate::error::{RenderError, Result};
use crate::host::{detach, insert_after, NodeId, SharedTree};
use crate::reactive::{ReadSignal, Signal, Subscription};

/// Requirements on list keys.
pub trait Key: Eq + Hash + Clone + Debug + Send + Sync + 'static {}

impl<K> Key for K where K: Eq + Hash + Clone + Debug + Send + Sync + 'static {}

type RenderItem<T> = Arc<dyn Fn(ReadSignal<T>, ReadSignal<usize>) -> Renderable + Send + Sync>;
type KeyFn<T, K> = Arc<dyn Fn(&T, usize) -> K + Send + Sync>;

struct Item<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    value: Signal<T>,
    index: Signal<usize>,
    views: Views,
}

type Items<K, T> = Mutex<IndexMap<K, Item<T>>>;

/// A keyed, reconciled sequence of subtrees.
///
/// # Panics
///
/// Once connected, a render result that cannot be rendered panics inside
/// the `set` that caused it.
pub struct List<T, K>
where
    T: Clone + PartialEq + Send + Sync + 'static,
    K: Key,
{
    source: ReadSignal<Vec<T>>,
    render: RenderItem<T>,
    key: KeyFn<T, K>,
    transition: Option<Arc<dyn Transition>>,
    transitions: Arc<Transitions>,
    mounted: Option<Mounted<T, K>>,
}

struct Mounted<T, K>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    tree: SharedTree,
    anchor: NodeId,
    items: Arc<Items<K, T>>,
    subscription: Subscription,
}

impl<T, K> List<T, K>
where
    T: Clone + PartialEq + Send + Sync + 'static,
    K: Key,
{
    /// Render every element of `source` with `render`, identified by `key`.
    ///
    /// `render` receives the item's value and index as signals, so the
    /// subtree it builds can follow both without being rebuilt.
    pub fn new<R, F, G>(source: impl Into<ReadSignal<Vec<T>>>, render: F, key: G) -> Self
    where
        R: Into<Renderable>,
        F: Fn(ReadSignal<T>, ReadSignal<usize>) -> R + Send + Sync + 'static,
        G: Fn(&T, usize) -> K + Send + Sync + 'static,
    {
        Self {
            source: source.into(),
            render: Arc::new(move |value: ReadSignal<T>, index: ReadSignal<usize>| -> Renderable {
                render(value, index).into()
            }),
            key: Arc::new(key),
            transition: None,
            transitions: Arc::new(Transitions::default()),
            mounted: None,
        }
    }

    /// Run `transition` around item insertion and removal.
    pub fn with_transition(mut self, transition: impl Transition + 'static) -> Self {
        self.transition = Some(Arc::new(transition));
        self
    }

    /// Handle on this list's in-flight transitions.
    pub fn transitions(&self) -> TransitionHandle {
        TransitionHandle::new(Arc::clone(&self.transitions))
    }

    /// Keys of the tracked items, in order. Exiting items are not included.
    pub fn keys(&self) -> Vec<K> {
        self.mounted
            .as_ref()
            .map(|m| m.items.lock().keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.mounted.as_ref().map_or(0, |m| m.items.lock().len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Item maps of one reconciliation pass.
///
/// Items move from `current` to `ordered` as the pass goes. Dropping the
/// pass writes both back, also when a render function unwinds out of it,
/// so every connected item stays tracked and `disconnect` can reach it.
struct Pass<'a, K, T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
    K: Key,
{
    items: &'a Items<K, T>,
    current: IndexMap<K, Item<T>>,
    ordered: IndexMap<K, Item<T>>,
}

impl<K, T> Drop for Pass<'_, K, T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
    K: Key,
{
    fn drop(&mut self) {
        let mut items = self.items.lock();
        items.extend(self.ordered.drain(..));
        items.extend(self.current.drain(..));
    }
}

/// Everything a reconciliation pass needs besides the new values.
struct Reconciler<T, K>
where
    T: Clone + PartialEq + Send + Sync + 'static,
    K: Key,
{
    tree: SharedTree,
    parent: NodeId,
    anchor: NodeId,
    render: RenderItem<T>,
    key: KeyFn<T, K>,
    transition: Option<Arc<dyn Transition>>,
    transitions: Arc<Transitions>,
    items: Arc<Items<K, T>>,
}

impl<T, K> Reconciler<T, K>
where
    T: Clone + PartialEq + Send + Sync + 'static,
    K: Key,
{
    fn reconcile(&self, values: &[T]) -> Result<()> {
        let mut next: IndexMap<K, (T, usize)> = IndexMap::with_capacity(values.len());
        for (index, value) in values.iter().enumerate() {
            let key = (self.key)(value, index);
            if let Some((_, first)) = next.insert(key.clone(), (value.clone(), index)) {
                warn!(?key, first, index, "duplicate list key, last occurrence wins");
            }
        }
        next.sort_by(|_, a, _, b| a.1.cmp(&b.1));

        let mut pass = Pass {
            items: self.items.as_ref(),
            current: std::mem::take(&mut *self.items.lock()),
            ordered: IndexMap::with_capacity(next.len()),
        };

        let vanished: Vec<K> = pass
            .current
            .keys()
            .filter(|key| !next.contains_key(*key))
            .cloned()
            .collect();
        for key in &vanished {
            if let Some(item) = pass.current.shift_remove(key) {
                self.remove(item);
            }
        }

        let mut cursor = self.anchor;
        let mut first_error = None;
        let (mut created, mut reused, mut moved) = (0usize, 0usize, 0usize);

        for (key, (value, index)) in next {
            match pass.current.shift_remove(&key) {
                Some(item) => {
                    // Tracked again before any item observer runs.
                    let (position, _) = pass.ordered.insert_full(key, item);
                    let item = &pass.ordered[position];
                    item.value.set(value);
                    item.index.set(index);
                    for node in nodes_of(&item.views) {
                        if self.tree.next_sibling(cursor) != Some(node) {
                            detach(self.tree.as_ref(), node);
                            insert_after(self.tree.as_ref(), self.parent, node, Some(cursor));
                            moved += 1;
                        }
                        cursor = node;
                    }
                    reused += 1;
                }
                None => match self.create(value, index, cursor) {
                    Ok((item, last)) => {
                        cursor = last;
                        created += 1;
                        pass.ordered.insert(key, item);
                    }
                    Err(error) => {
                        first_error.get_or_insert(error);
                    }
                },
            }
        }

        drop(pass);
        debug!(
            anchor = %self.anchor,
            created,
            reused,
            removed = vanished.len(),
            moved,
            "list reconciled"
        );

        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Build and connect a new item after `cursor`. Returns the item and
    /// its last node (or `cursor` if it placed nothing).
    fn create(&self, value: T, index: usize, cursor: NodeId) -> Result<(Item<T>, NodeId)> {
        let value = Signal::new(value);
        let index = Signal::new(index);

        let mut views = (self.render)(value.readonly(), index.readonly()).normalize()?;
        let last = connect_all(&mut views, &self.tree, self.parent, Some(cursor))?;

        if let Some(transition) = &self.transition {
            let nodes = nodes_of(&views);
            if !nodes.is_empty() {
                if let Some(future) = transition.enter(&self.tree, &nodes) {
                    Transitions::start(&self.transitions, future, None);
                }
            }
        }

        Ok((Item { value, index, views }, last.unwrap_or(cursor)))
    }

    /// Tear an item down, or hand it to its exit transition.
    fn remove(&self, mut item: Item<T>) {
        let nodes = nodes_of(&item.views);
        let exit = match &self.transition {
            Some(transition) if !nodes.is_empty() => transition.exit(&self.tree, &nodes),
            _ => None,
        };

        match exit {
            Some(future) => Transitions::start(&self.transitions, future, Some(item.views)),
            None => disconnect_all(&mut item.views),
        }
    }
}

impl<T, K> View for List<T, K>
where
    T: Clone + PartialEq + Send + Sync + 'static,
    K: Key,
{
    fn connect(&mut self, tree: &SharedTree, parent: NodeId, after: Option<NodeId>) -> Result<()> {
        if self.mounted.is_some() {
            return Err(RenderError::AlreadyConnected);
        }

        let anchor = tree.create_anchor();
        insert_after(tree.as_ref(), parent, anchor, after);

        let items: Arc<Items<K, T>> = Arc::new(Mutex::new(IndexMap::new()));
        let reconciler = Reconciler {
            tree: SharedTree::clone(tree),
            parent,
            anchor,
            render: Arc::clone(&self.render),
            key: Arc::clone(&self.key),
            transition: self.transition.clone(),
            transitions: Arc::clone(&self.transitions),
            items: Arc::clone(&items),
        };

        let sink = Arc::new(ErrorSink::default());
        let errors = Arc::clone(&sink);

        sink.begin();
        let subscription = self.source.observe(move |values: &Vec<T>| {
            if let Err(error) = reconciler.reconcile(values) {
                errors.report(error);
            }
        });

        self.mounted = Some(Mounted {
            tree: SharedTree::clone(tree),
            anchor,
            items,
            subscription,
        });

        if let Err(error) = sink.finish() {
            self.disconnect();
            return Err(error);
        }
        Ok(())
    }

    fn disconnect(&mut self) {
        let Some(mounted) = self.mounted.take() else {
            return;
        };
        mounted.subscription.stop();

        let items = std::mem::take(&mut *mounted.items.lock());
        for (_, mut item) in items.into_iter().rev() {
            disconnect_all(&mut item.views);
        }

        // Exiting items leave the tree now; their futures keep running.
        self.transitions.detach_exiting();

        detach(mounted.tree.as_ref(), mounted.anchor);
    }

    fn nodes(&self) -> Vec<NodeId> {
        match &self.mounted {
            Some(mounted) => {
                let mut nodes = vec![mounted.anchor];
                for item in mounted.items.lock().values() {
                    nodes.extend(nodes_of(&item.views));
                }
                nodes
            }
            None => Vec::new(),
        }
    }

    fn is_connected(&self) -> bool {
        self.mounted.is_some()
    }
}
