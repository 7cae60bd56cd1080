//! Subject/observer protocol between the substrate and its payload layers.
//!
//! The substrate pushes removal notifications synchronously, after the
//! mutation has been applied. Additive changes are never notified.
//!
//! While a notification is delivered the substrate is locked for the
//! mutation in progress: an observer must not try to mutate (or read) the
//! same substrate from inside a callback. Association layers detect that
//! case and report `Error::GraphBusy` instead of deadlocking.

use std::sync::Weak;

use tracing::{debug, trace};

use crate::model::{EdgeId, NodeId};
use crate::{Error, Result};

/// A listener registered with a substrate graph.
pub trait GraphObserver {
    /// Edges that have just been removed from the substrate.
    fn deleted_edges_update(&self, edges: &[EdgeId]);

    /// Nodes that have just been removed from the substrate.
    fn deleted_nodes_update(&self, nodes: &[NodeId]);
}

/// Registered observers, in registration order.
#[derive(Default)]
pub(crate) struct ObserverSet {
    observers: Vec<Weak<dyn GraphObserver>>,
}

impl ObserverSet {
    fn same(a: &Weak<dyn GraphObserver>, b: &Weak<dyn GraphObserver>) -> bool {
        std::ptr::addr_eq(a.as_ptr(), b.as_ptr())
    }

    pub(crate) fn len(&self) -> usize {
        self.observers.len()
    }

    pub(crate) fn contains(&self, observer: &Weak<dyn GraphObserver>) -> bool {
        self.observers.iter().any(|o| Self::same(o, observer))
    }

    pub(crate) fn register(&mut self, observer: Weak<dyn GraphObserver>) -> Result<()> {
        self.prune();
        if self.contains(&observer) {
            return Err(Error::ObserverError(format!(
                "observer {:p} is already registered",
                observer.as_ptr()
            )));
        }
        self.attach(observer);
        Ok(())
    }

    /// Add an observer known to be fresh.
    pub(crate) fn attach(&mut self, observer: Weak<dyn GraphObserver>) {
        self.observers.push(observer);
    }

    pub(crate) fn unregister(&mut self, observer: &Weak<dyn GraphObserver>) -> Result<()> {
        let pos = self
            .observers
            .iter()
            .position(|o| Self::same(o, observer))
            .ok_or_else(|| {
                Error::ObserverError(format!("observer {:p} is not registered", observer.as_ptr()))
            })?;
        self.observers.remove(pos);
        Ok(())
    }

    /// Drop observers whose owner is gone.
    pub(crate) fn prune(&mut self) {
        let before = self.observers.len();
        self.observers.retain(|o| o.strong_count() > 0);
        let pruned = before - self.observers.len();
        if pruned > 0 {
            debug!(pruned, "pruned dead graph observers");
        }
    }

    pub(crate) fn notify_edges(&self, edges: &[EdgeId]) {
        if edges.is_empty() {
            return;
        }
        for observer in self.observers.iter().filter_map(Weak::upgrade) {
            trace!(count = edges.len(), "notifying deleted edges");
            observer.deleted_edges_update(edges);
        }
    }

    pub(crate) fn notify_nodes(&self, nodes: &[NodeId]) {
        if nodes.is_empty() {
            return;
        }
        for observer in self.observers.iter().filter_map(Weak::upgrade) {
            trace!(count = nodes.len(), "notifying deleted nodes");
            observer.deleted_nodes_update(nodes);
        }
    }
}

impl std::fmt::Debug for ObserverSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverSet").field("len", &self.observers.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        edges: Mutex<Vec<EdgeId>>,
        nodes: Mutex<Vec<NodeId>>,
    }

    impl GraphObserver for Recorder {
        fn deleted_edges_update(&self, edges: &[EdgeId]) {
            self.edges.lock().extend_from_slice(edges);
        }

        fn deleted_nodes_update(&self, nodes: &[NodeId]) {
            self.nodes.lock().extend_from_slice(nodes);
        }
    }

    #[test]
    fn test_register_twice_fails() {
        let recorder = Arc::new(Recorder::default());
        let weak: Weak<dyn GraphObserver> = Arc::downgrade(&recorder) as Weak<dyn GraphObserver>;
        let mut set = ObserverSet::default();

        set.register(weak.clone()).unwrap();
        assert!(set.register(weak.clone()).is_err());
        set.unregister(&weak).unwrap();
        assert!(set.unregister(&weak).is_err());
    }

    #[test]
    fn test_notifications_reach_live_observers() {
        let recorder = Arc::new(Recorder::default());
        let mut set = ObserverSet::default();
        set.register(Arc::downgrade(&recorder) as Weak<dyn GraphObserver>).unwrap();

        set.notify_edges(&[EdgeId(3), EdgeId(4)]);
        set.notify_nodes(&[NodeId(1)]);

        assert_eq!(*recorder.edges.lock(), vec![EdgeId(3), EdgeId(4)]);
        assert_eq!(*recorder.nodes.lock(), vec![NodeId(1)]);
    }

    #[test]
    fn test_dead_observers_are_pruned() {
        let mut set = ObserverSet::default();
        {
            let recorder = Arc::new(Recorder::default());
            set.register(Arc::downgrade(&recorder) as Weak<dyn GraphObserver>).unwrap();
        }
        set.prune();
        assert_eq!(set.len(), 0);
    }
}
