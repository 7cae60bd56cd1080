//! Payload bindings.
//!
//! Client payloads are `Arc`s and are keyed by the identity of their shared
//! allocation, never by value. The maps hold a strong reference, so a bound
//! payload stays alive and its address cannot be reused while bound.

use std::collections::BTreeMap;
use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::RwLock;
use tracing::trace;

use crate::graph::GraphObserver;
use crate::model::{EdgeId, NodeId};
use crate::{Error, Result};

/// Identity of a payload allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct PayloadKey(usize);

impl PayloadKey {
    pub(crate) fn of<T>(payload: &Arc<T>) -> Self {
        Self(Arc::as_ptr(payload) as *const () as usize)
    }
}

/// Text used in error messages for a payload.
pub(crate) fn describe<T>(kind: &str, payload: &Arc<T>) -> String {
    format!("{kind} payload at {:p}", Arc::as_ptr(payload))
}

// ============================================================================
// IdBinding
// ============================================================================

/// Payload ↔ substrate id, both directions.
pub(crate) struct IdBinding<T, Id> {
    kind: &'static str,
    by_payload: HashMap<PayloadKey, Id>,
    by_id: BTreeMap<Id, Arc<T>>,
}

impl<T, Id> IdBinding<T, Id>
where
    Id: Copy + Ord + std::fmt::Display,
{
    fn new(kind: &'static str) -> Self {
        Self { kind, by_payload: HashMap::new(), by_id: BTreeMap::new() }
    }

    pub(crate) fn contains(&self, payload: &Arc<T>) -> bool {
        self.by_payload.contains_key(&PayloadKey::of(payload))
    }

    pub(crate) fn id_of(&self, payload: &Arc<T>) -> Option<Id> {
        self.by_payload.get(&PayloadKey::of(payload)).copied()
    }

    pub(crate) fn require_id(&self, payload: &Arc<T>) -> Result<Id> {
        self.id_of(payload)
            .ok_or_else(|| Error::PayloadNotBound(describe(self.kind, payload)))
    }

    pub(crate) fn payload_of(&self, id: Id) -> Option<&Arc<T>> {
        self.by_id.get(&id)
    }

    pub(crate) fn len(&self) -> usize {
        self.by_id.len()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (Id, &Arc<T>)> {
        self.by_id.iter().map(|(id, p)| (*id, p))
    }

    pub(crate) fn bind(&mut self, payload: &Arc<T>, id: Id) -> Result<()> {
        if let Some(bound) = self.id_of(payload) {
            return Err(Error::AlreadyBound(format!(
                "{} is already bound to {} {bound}",
                describe(self.kind, payload),
                self.kind
            )));
        }
        if self.by_id.contains_key(&id) {
            return Err(Error::AlreadyBound(format!(
                "{} {id} already carries a payload",
                self.kind
            )));
        }
        self.by_payload.insert(PayloadKey::of(payload), id);
        self.by_id.insert(id, Arc::clone(payload));
        trace!(kind = self.kind, %id, "bound payload");
        Ok(())
    }

    pub(crate) fn unbind_payload(&mut self, payload: &Arc<T>) -> Result<Id> {
        let id = self
            .by_payload
            .remove(&PayloadKey::of(payload))
            .ok_or_else(|| Error::PayloadNotBound(describe(self.kind, payload)))?;
        self.by_id.remove(&id);
        trace!(kind = self.kind, %id, "unbound payload");
        Ok(id)
    }

    pub(crate) fn unbind_id(&mut self, id: Id) -> Option<Arc<T>> {
        let payload = self.by_id.remove(&id)?;
        self.by_payload.remove(&PayloadKey::of(&payload));
        trace!(kind = self.kind, %id, "unbound id");
        Some(payload)
    }
}

// ============================================================================
// IndexBinding
// ============================================================================

/// Payload ↔ dense index. Freed indexes stay empty until reused.
pub(crate) struct IndexBinding<T> {
    kind: &'static str,
    by_payload: HashMap<PayloadKey, usize>,
    by_index: BTreeMap<usize, Arc<T>>,
}

impl<T> IndexBinding<T> {
    fn new(kind: &'static str) -> Self {
        Self { kind, by_payload: HashMap::new(), by_index: BTreeMap::new() }
    }

    pub(crate) fn index_of(&self, payload: &Arc<T>) -> Option<usize> {
        self.by_payload.get(&PayloadKey::of(payload)).copied()
    }

    pub(crate) fn payload_at(&self, index: usize) -> Option<&Arc<T>> {
        self.by_index.get(&index)
    }

    /// Bind `payload` to `index`; both must be free. Any index is accepted.
    pub(crate) fn set(&mut self, payload: &Arc<T>, index: usize) -> Result<()> {
        if let Some(current) = self.index_of(payload) {
            return Err(Error::AlreadyBound(format!(
                "{} already has index {current}",
                describe(self.kind, payload)
            )));
        }
        if self.by_index.contains_key(&index) {
            return Err(Error::AlreadyBound(format!("{} index {index} is taken", self.kind)));
        }
        self.by_index.insert(index, Arc::clone(payload));
        self.by_payload.insert(PayloadKey::of(payload), index);
        Ok(())
    }

    /// Bind `payload` to the lowest free index.
    pub(crate) fn add(&mut self, payload: &Arc<T>) -> Result<usize> {
        let index = self
            .by_index
            .keys()
            .enumerate()
            .find(|(expected, taken)| *expected != **taken)
            .map_or(self.by_index.len(), |(hole, _)| hole);
        self.set(payload, index)?;
        Ok(index)
    }

    pub(crate) fn remove(&mut self, payload: &Arc<T>) -> Option<usize> {
        let index = self.by_payload.remove(&PayloadKey::of(payload))?;
        self.by_index.remove(&index);
        Some(index)
    }
}

// ============================================================================
// Bindings (the registered observer)
// ============================================================================

pub(crate) struct BindingMaps<N, E> {
    pub(crate) nodes: IdBinding<N, NodeId>,
    pub(crate) edges: IdBinding<E, EdgeId>,
    pub(crate) node_indexes: IndexBinding<N>,
    pub(crate) edge_indexes: IndexBinding<E>,
}

impl<N, E> BindingMaps<N, E> {
    fn new() -> Self {
        Self {
            nodes: IdBinding::new("node"),
            edges: IdBinding::new("edge"),
            node_indexes: IndexBinding::new("node"),
            edge_indexes: IndexBinding::new("edge"),
        }
    }

    pub(crate) fn dissociate_node(&mut self, payload: &Arc<N>) -> Result<NodeId> {
        let id = self.nodes.unbind_payload(payload)?;
        self.node_indexes.remove(payload);
        Ok(id)
    }

    pub(crate) fn dissociate_edge(&mut self, payload: &Arc<E>) -> Result<EdgeId> {
        let id = self.edges.unbind_payload(payload)?;
        self.edge_indexes.remove(payload);
        Ok(id)
    }

    /// Drop whatever payload `id` carries; nothing if it carries none.
    fn forget_node(&mut self, id: NodeId) {
        if let Some(payload) = self.nodes.unbind_id(id) {
            self.node_indexes.remove(&payload);
        }
    }

    fn forget_edge(&mut self, id: EdgeId) {
        if let Some(payload) = self.edges.unbind_id(id) {
            self.edge_indexes.remove(&payload);
        }
    }
}

/// The association layer's state, registered with the substrate.
pub(crate) struct Bindings<N, E> {
    pub(crate) maps: RwLock<BindingMaps<N, E>>,
}

impl<N, E> Bindings<N, E> {
    pub(crate) fn new() -> Self {
        Self { maps: RwLock::new(BindingMaps::new()) }
    }
}

impl<N, E> GraphObserver for Bindings<N, E> {
    fn deleted_edges_update(&self, edges: &[EdgeId]) {
        let mut maps = self.maps.write();
        for &edge in edges {
            maps.forget_edge(edge);
        }
    }

    fn deleted_nodes_update(&self, nodes: &[NodeId]) {
        let mut maps = self.maps.write();
        for &node in nodes {
            maps.forget_node(node);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_not_value() {
        let mut nodes: IdBinding<String, NodeId> = IdBinding::new("node");
        let a = Arc::new("same".to_string());
        let b = Arc::new("same".to_string());
        nodes.bind(&a, NodeId(0)).unwrap();

        assert!(nodes.contains(&a));
        assert!(!nodes.contains(&b));
        assert!(nodes.contains(&Arc::clone(&a)));
        assert!(matches!(nodes.bind(&a, NodeId(1)), Err(Error::AlreadyBound(_))));
        assert!(matches!(nodes.bind(&b, NodeId(0)), Err(Error::AlreadyBound(_))));
    }

    #[test]
    fn test_add_index_reuses_lowest_hole() {
        let mut indexes: IndexBinding<u8> = IndexBinding::new("node");
        let p: Vec<Arc<u8>> = (0..4).map(Arc::new).collect();
        for payload in &p[..3] {
            indexes.add(payload).unwrap();
        }
        assert_eq!(indexes.remove(&p[1]), Some(1));
        assert_eq!(indexes.add(&p[3]).unwrap(), 1);
        assert_eq!(indexes.add(&p[1]).unwrap(), 3);
    }

    #[test]
    fn test_set_index_conflicts() {
        let mut indexes: IndexBinding<u8> = IndexBinding::new("edge");
        let a = Arc::new(1);
        let b = Arc::new(2);
        indexes.set(&a, 5).unwrap();
        assert!(indexes.set(&b, 5).is_err());
        assert!(indexes.set(&a, 6).is_err());
        assert_eq!(indexes.add(&b).unwrap(), 0);
        assert!(Arc::ptr_eq(indexes.payload_at(5).unwrap(), &a));
    }

    #[test]
    fn test_extreme_index_is_accepted() {
        let mut indexes: IndexBinding<u8> = IndexBinding::new("node");
        let far = Arc::new(1);
        let near = Arc::new(2);
        indexes.set(&far, usize::MAX).unwrap();
        indexes.set(&near, 1 << 40).unwrap();

        assert!(Arc::ptr_eq(indexes.payload_at(usize::MAX).unwrap(), &far));
        assert_eq!(indexes.add(&Arc::new(3)).unwrap(), 0);
        assert_eq!(indexes.remove(&far), Some(usize::MAX));
        assert!(indexes.payload_at(usize::MAX).is_none());
    }

    #[test]
    fn test_notifications_tolerate_anonymous_ids() {
        let bindings: Bindings<u8, u8> = Bindings::new();
        let edge = Arc::new(7);
        {
            let mut maps = bindings.maps.write();
            maps.edges.bind(&edge, EdgeId(2)).unwrap();
            maps.edge_indexes.add(&edge).unwrap();
        }
        bindings.deleted_edges_update(&[EdgeId(1), EdgeId(2)]);

        let maps = bindings.maps.read();
        assert!(!maps.edges.contains(&edge));
        assert_eq!(maps.edge_indexes.index_of(&edge), None);
    }
}
