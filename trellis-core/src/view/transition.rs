//! Enter and exit transitions for list items.
//!
//! A [`Transition`] is called with an item's top-level nodes right after the
//! item is inserted (`enter`) or right before it would be removed (`exit`).
//! Either hook may hand back a future. An exiting item stays in the host
//! tree until its own future completes; the list forgets it immediately, so
//! a new item with the same key is built from scratch.
//!
//! Transition futures are spawned onto the tokio runtime the list update
//! runs in. Without one they are queued, and [`TransitionHandle::settle`]
//! drives them.

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::{join_all, BoxFuture};
use futures_util::FutureExt;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::debug;

use super::{disconnect_all, Views};
use crate::error::{RenderError, TransitionError};
use crate::host::{NodeId, SharedTree};

/// Future returned by a transition hook.
pub type TransitionFuture = BoxFuture<'static, Result<(), TransitionError>>;

/// Hooks run around item insertion and removal.
pub trait Transition: Send + Sync {
    fn enter(&self, _tree: &SharedTree, _nodes: &[NodeId]) -> Option<TransitionFuture> {
        None
    }

    fn exit(&self, _tree: &SharedTree, _nodes: &[NodeId]) -> Option<TransitionFuture> {
        None
    }
}

/// Marks items with `<name>-enter` / `<name>-exit` classes for a fixed time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timed {
    name: String,
    duration: Duration,
}

impl Timed {
    pub fn new(name: impl Into<String>, duration: Duration) -> Self {
        Self {
            name: name.into(),
            duration,
        }
    }

    fn run(&self, tree: &SharedTree, nodes: &[NodeId], phase: &str) -> TransitionFuture {
        let class = format!("{}-{phase}", self.name);
        for node in nodes {
            tree.add_class(*node, &class);
        }

        let tree = Arc::downgrade(tree);
        let nodes = nodes.to_vec();
        let duration = self.duration;
        async move {
            tokio::time::sleep(duration).await;
            if let Some(tree) = tree.upgrade() {
                for node in nodes {
                    tree.remove_class(node, &class);
                }
            }
            Ok(())
        }
        .boxed()
    }
}

impl Transition for Timed {
    fn enter(&self, tree: &SharedTree, nodes: &[NodeId]) -> Option<TransitionFuture> {
        Some(self.run(tree, nodes, "enter"))
    }

    fn exit(&self, tree: &SharedTree, nodes: &[NodeId]) -> Option<TransitionFuture> {
        Some(self.run(tree, nodes, "exit"))
    }
}

/// Views of an exiting item. Whoever takes them first disconnects them:
/// the finished exit, or the list being disconnected.
pub(crate) type ExitSlot = Arc<Mutex<Option<Views>>>;

enum Task {
    /// Running on the ambient tokio runtime.
    Spawned(JoinHandle<Result<(), TransitionError>>),
    /// No runtime was available; runs when `settle` is awaited.
    Queued(TransitionFuture),
}

struct Pending {
    id: u64,
    task: Task,
    exiting: Option<ExitSlot>,
}

/// In-flight transitions of one list.
#[derive(Default)]
pub(crate) struct Transitions {
    pending: Mutex<Vec<Pending>>,
    failures: Mutex<Vec<TransitionError>>,
    finished: AtomicUsize,
    next_id: AtomicU64,
}

impl Transitions {
    /// Track `future`. An exit passes the item's views, which are
    /// disconnected as soon as that exit completes, resolved or rejected.
    ///
    /// With a tokio runtime in scope the transition is spawned onto it and
    /// runs on its own; otherwise it waits for [`TransitionHandle::settle`].
    pub(crate) fn start(this: &Arc<Self>, future: TransitionFuture, exiting: Option<Views>) {
        let id = this.next_id.fetch_add(1, Ordering::Relaxed);
        let exiting = exiting.map(|views| Arc::new(Mutex::new(Some(views))));

        let slot = exiting.clone();
        let owner = Arc::downgrade(this);
        let wrapped = async move {
            let result = future.await;
            if let Some(slot) = slot {
                let views = slot.lock().take();
                if let Some(mut views) = views {
                    disconnect_all(&mut views);
                }
            }
            if let Some(owner) = owner.upgrade() {
                owner.finish(id, result.clone());
            }
            result
        }
        .boxed();

        // Held across the spawn so a fast task cannot finish before its
        // entry exists.
        let mut pending = this.pending.lock();
        let task = match Handle::try_current() {
            Ok(runtime) => Task::Spawned(runtime.spawn(wrapped)),
            Err(_) => Task::Queued(wrapped),
        };
        pending.push(Pending { id, task, exiting });
    }

    fn finish(&self, id: u64, result: Result<(), TransitionError>) {
        self.pending.lock().retain(|pending| pending.id != id);
        self.finished.fetch_add(1, Ordering::SeqCst);
        if let Err(error) = result {
            debug!(%error, "transition rejected");
            self.failures.lock().push(error);
        }
    }

    /// Disconnect every exiting item now. Their futures keep running.
    pub(crate) fn detach_exiting(&self) {
        let slots: Vec<ExitSlot> = self
            .pending
            .lock()
            .iter()
            .filter_map(|pending| pending.exiting.clone())
            .collect();
        for slot in slots {
            let views = slot.lock().take();
            if let Some(mut views) = views {
                disconnect_all(&mut views);
            }
        }
    }

    fn len(&self) -> usize {
        self.pending.lock().len()
    }
}

/// Access to a list's in-flight transitions.
#[derive(Clone)]
pub struct TransitionHandle {
    transitions: Arc<Transitions>,
}

impl TransitionHandle {
    pub(crate) fn new(transitions: Arc<Transitions>) -> Self {
        Self { transitions }
    }

    /// Number of transitions not yet finished.
    pub fn pending(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_idle(&self) -> bool {
        self.pending() == 0
    }

    /// Await every transition started so far.
    ///
    /// Returns how many transitions finished since the last `settle`
    /// (including those that completed on their own), or every rejection
    /// seen in that time. Exiting items are detached whether their
    /// transition resolved or rejected.
    pub async fn settle(&self) -> Result<usize, RenderError> {
        let pending = std::mem::take(&mut *self.transitions.pending.lock());

        let outcomes = join_all(pending.into_iter().map(|pending| async move {
            match pending.task {
                Task::Spawned(handle) => handle.await.map(|_| ()),
                Task::Queued(future) => {
                    let _ = future.await;
                    Ok(())
                }
            }
        }))
        .await;

        // A task that panicked or was cancelled never reached `finish`.
        for outcome in outcomes {
            if let Err(error) = outcome {
                self.transitions.finished.fetch_add(1, Ordering::SeqCst);
                self.transitions
                    .failures
                    .lock()
                    .push(TransitionError::new(format!("transition task failed: {error}")));
            }
        }

        let count = self.transitions.finished.swap(0, Ordering::SeqCst);
        let failures = std::mem::take(&mut *self.transitions.failures.lock());
        debug!(settled = count, failed = failures.len(), "transitions settled");
        if failures.is_empty() {
            Ok(count)
        } else {
            Err(RenderError::TransitionsFailed(failures))
        }
    }
}

impl fmt::Debug for TransitionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransitionHandle")
            .field("pending", &self.pending())
            .finish()
    }
}
