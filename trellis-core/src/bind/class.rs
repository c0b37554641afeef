//! Class membership bindings.

use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use parking_lot::Mutex;
use tracing::trace;

use crate::host::{NodeId, SharedTree};
use crate::reactive::{Prop, Subscription, Subscriptions};

/// A class specification: a space separated list, a map of toggles, or a
/// nested list of either.
#[derive(Debug, Clone, PartialEq)]
pub enum Classes {
    Names(String),
    Toggles(IndexMap<String, Prop<bool>>),
    List(Vec<Classes>),
}

impl Classes {
    /// An empty toggle map.
    pub fn new() -> Self {
        Classes::Toggles(IndexMap::new())
    }

    /// Add a class toggled by a static or reactive flag.
    pub fn toggle(self, name: impl Into<String>, on: impl Into<Prop<bool>>) -> Self {
        match self {
            Classes::Toggles(mut toggles) => {
                toggles.insert(name.into(), on.into());
                Classes::Toggles(toggles)
            }
            other => {
                let mut toggles = IndexMap::new();
                toggles.insert(name.into(), on.into());
                Classes::List(vec![other, Classes::Toggles(toggles)])
            }
        }
    }

    /// Flatten into `(class, flag)` pairs, in order. Later entries for the
    /// same class replace earlier ones.
    pub fn flatten(&self) -> IndexMap<String, Prop<bool>> {
        let mut out = IndexMap::new();
        self.flatten_into(&mut out);
        out
    }

    fn flatten_into(&self, out: &mut IndexMap<String, Prop<bool>>) {
        match self {
            Classes::Names(names) => {
                for name in names.split_whitespace() {
                    out.insert(name.to_string(), Prop::Static(true));
                }
            }
            Classes::Toggles(toggles) => {
                for (name, on) in toggles {
                    out.insert(name.clone(), on.clone());
                }
            }
            Classes::List(items) => {
                for item in items {
                    item.flatten_into(out);
                }
            }
        }
    }
}

impl Default for Classes {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for Classes {
    fn from(names: &str) -> Self {
        Classes::Names(names.to_string())
    }
}

impl From<String> for Classes {
    fn from(names: String) -> Self {
        Classes::Names(names)
    }
}

impl From<Vec<Classes>> for Classes {
    fn from(items: Vec<Classes>) -> Self {
        Classes::List(items)
    }
}

/// Bind `classes` onto `node`. Only classes this binding added are ever
/// removed from the node.
pub(crate) fn bind_classes(tree: &SharedTree, node: NodeId, classes: &Prop<Classes>) -> Subscription {
    let toggles = Arc::new(Subscriptions::new());
    let applied: Arc<Mutex<IndexSet<String>>> = Arc::new(Mutex::new(IndexSet::new()));

    let target = SharedTree::clone(tree);
    let inner = Arc::clone(&toggles);
    let owned = Arc::clone(&applied);
    let outer = classes.observe(move |classes: &Classes| {
        inner.stop_all();
        let previous: Vec<String> = owned.lock().drain(..).collect();
        for class in &previous {
            target.remove_class(node, class);
        }

        let flat = classes.flatten();
        trace!(%node, classes = flat.len(), "classes rebuilt");
        for (name, on) in flat {
            let tree = SharedTree::clone(&target);
            let applied = Arc::clone(&owned);
            inner.push(on.observe(move |enabled: &bool| {
                if *enabled {
                    tree.add_class(node, &name);
                    applied.lock().insert(name.clone());
                } else {
                    tree.remove_class(node, &name);
                    applied.lock().shift_remove(&name);
                }
            }));
        }
    });

    Subscription::new(move || {
        outer.stop();
        toggles.stop_all();
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{HostTree, MemoryTree};
    use crate::reactive::Signal;

    #[test]
    fn flatten_nested() {
        let active = Signal::new(true);
        let classes = Classes::List(vec![
            "btn  primary".into(),
            Classes::new().toggle("active", active.clone()).toggle("hidden", false),
            Classes::List(vec!["deep".into()]),
        ]);

        let flat = classes.flatten();
        let names: Vec<&str> = flat.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["btn", "primary", "active", "hidden", "deep"]);
        assert!(flat["active"].is_reactive());
    }

    #[test]
    fn toggles_follow_signals() {
        let memory = MemoryTree::shared();
        let tree: SharedTree = memory.clone();
        let node = memory.create_element("div");
        let active = Signal::new(false);

        let classes = Classes::from("btn").toggle("active", active.clone());
        let subscription = bind_classes(&tree, node, &Prop::Static(classes));
        assert_eq!(memory.classes(node), vec!["btn"]);

        active.set(true);
        assert!(memory.has_class(node, "active"));
        active.set(false);
        assert!(!memory.has_class(node, "active"));

        subscription.stop();
        assert_eq!(active.subscriber_count(), 0);
    }

    #[test]
    fn outer_change_replaces_own_classes_only() {
        let memory = MemoryTree::shared();
        let tree: SharedTree = memory.clone();
        let node = memory.create_element("div");
        memory.add_class(node, "external");

        let classes = Signal::new(Classes::from("a b"));
        let subscription = bind_classes(&tree, node, &Prop::from(classes.clone()));
        assert_eq!(memory.classes(node), vec!["external", "a", "b"]);

        classes.set(Classes::from("c"));
        assert_eq!(memory.classes(node), vec!["external", "c"]);

        subscription.stop();
    }
}
