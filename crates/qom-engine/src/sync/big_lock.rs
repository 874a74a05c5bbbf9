//! Global execution lock around an object graph

use parking_lot::{Mutex, MutexGuard};
use tracing::trace;

use crate::object::ObjectGraph;

/// Process-wide lock serializing all access to one `ObjectGraph`
///
/// Registration, creation, destruction and property access all happen with
/// the lock held. Data published by the graph (for example interrupt
/// statistics slices) stays valid only while the guard lives.
pub struct BigLock {
    graph: Mutex<ObjectGraph>,
}

impl BigLock {
    /// Wrap a graph
    pub fn new(graph: ObjectGraph) -> Self {
        Self {
            graph: Mutex::new(graph),
        }
    }

    /// Acquire the lock, blocking until it is free
    pub fn lock(&self) -> MutexGuard<'_, ObjectGraph> {
        trace!("acquiring big lock");
        self.graph.lock()
    }

    /// Acquire the lock if nobody holds it
    pub fn try_lock(&self) -> Option<MutexGuard<'_, ObjectGraph>> {
        self.graph.try_lock()
    }

    /// Run `f` with the lock held
    pub fn with<R>(&self, f: impl FnOnce(&mut ObjectGraph) -> R) -> R {
        let mut guard = self.lock();
        f(&mut guard)
    }

    /// Whether the lock is currently held
    pub fn is_locked(&self) -> bool {
        self.graph.is_locked()
    }

    /// Unwrap the graph
    pub fn into_inner(self) -> ObjectGraph {
        self.graph.into_inner()
    }
}

impl std::fmt::Debug for BigLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BigLock")
            .field("locked", &self.is_locked())
            .finish()
    }
}
