//! # Association Layer
//!
//! `AssociationGraph<N, E, G>` binds client payloads (`Arc<N>` nodes,
//! `Arc<E>` edges) to the ids of a shared substrate `G`, and separately to a
//! dense index space for array-backed client storage.
//!
//! The layer registers itself as an observer of the substrate and learns
//! about removals only through notifications. Queries are payload-centric:
//! substrate ids that carry no payload are skipped.
//!
//! DAG operations are available when `G: DirectedGraphOps`, tree operations
//! when `G: TreeOps`.

pub(crate) mod bindings;
mod dag;
mod tree;
pub mod iter;

use std::sync::{Arc, Weak};

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

use crate::config::GraphConfig;
use crate::graph::{DagGraph, Graph, GraphObserver, MutableGraph, TreeGraph};
use crate::model::{EdgeId, NodeId};
use crate::{Error, Result};
use bindings::{describe, BindingMaps, Bindings};

pub use iter::{EdgeIter, NodeIter, PayloadIter};

/// A substrate shared between association layers.
pub type SharedGraph<G = Graph> = Arc<RwLock<G>>;

pub type AssociationDagGraph<N, E> = AssociationGraph<N, E, DagGraph>;
pub type AssociationTreeGraph<N, E> = AssociationGraph<N, E, TreeGraph>;

fn busy() -> Error {
    Error::GraphBusy("substrate is locked by a mutation in progress".into())
}

// ============================================================================
// AssociationGraph
// ============================================================================

pub struct AssociationGraph<N: 'static, E: 'static, G: MutableGraph + 'static = Graph> {
    graph: SharedGraph<G>,
    bindings: Arc<Bindings<N, E>>,
}

impl<N: 'static, E: 'static, G: MutableGraph + 'static> AssociationGraph<N, E, G> {
    // ========================================================================
    // Construction
    // ========================================================================

    pub fn new(directed: bool) -> Self {
        Self::with_config(GraphConfig { directed, ..GraphConfig::default() })
    }

    pub fn with_config(config: GraphConfig) -> Self {
        Self::with_substrate(G::from_substrate(Graph::with_config(config)))
    }

    /// Own a fresh substrate.
    pub fn with_substrate(mut graph: G) -> Self {
        let bindings = Arc::new(Bindings::new());
        graph.substrate_mut().attach_observer(Self::as_observer(&bindings));
        Self { graph: Arc::new(RwLock::new(graph)), bindings }
    }

    /// Observe a substrate that other layers may share.
    pub fn observe(graph: SharedGraph<G>) -> Result<Self> {
        let bindings = Arc::new(Bindings::new());
        graph
            .try_write()
            .ok_or_else(busy)?
            .substrate_mut()
            .register_observer(Self::as_observer(&bindings))?;
        Ok(Self { graph, bindings })
    }

    fn as_observer(bindings: &Arc<Bindings<N, E>>) -> Weak<dyn GraphObserver> {
        Arc::downgrade(bindings) as Weak<dyn GraphObserver>
    }

    /// The substrate this layer observes.
    pub fn shared_graph(&self) -> SharedGraph<G> {
        Arc::clone(&self.graph)
    }

    pub(crate) fn read(&self) -> Result<RwLockReadGuard<'_, G>> {
        self.graph.try_read().ok_or_else(busy)
    }

    pub(crate) fn write(&self) -> Result<RwLockWriteGuard<'_, G>> {
        self.graph.try_write().ok_or_else(busy)
    }

    pub(crate) fn maps(&self) -> RwLockReadGuard<'_, BindingMaps<N, E>> {
        self.bindings.maps.read()
    }

    fn maps_mut(&self) -> RwLockWriteGuard<'_, BindingMaps<N, E>> {
        self.bindings.maps.write()
    }

    // ========================================================================
    // Copies
    // ========================================================================

    /// A new layer over a private copy of the substrate, with every payload
    /// converted and bound to the same ids and indexes.
    pub fn map_payloads<N2: 'static, E2: 'static>(
        &self,
        mut node_fn: impl FnMut(&N) -> N2,
        mut edge_fn: impl FnMut(&E) -> E2,
    ) -> Result<AssociationGraph<N2, E2, G>>
    where
        G: Clone,
    {
        let substrate = G::clone(&*self.read()?);
        let copy = AssociationGraph::<N2, E2, G>::with_substrate(substrate);
        {
            let maps = self.maps();
            let mut fresh = copy.maps_mut();
            for (id, payload) in maps.nodes.iter() {
                let converted = Arc::new(node_fn(payload));
                fresh.nodes.bind(&converted, id)?;
                if let Some(index) = maps.node_indexes.index_of(payload) {
                    fresh.node_indexes.set(&converted, index)?;
                }
            }
            for (id, payload) in maps.edges.iter() {
                let converted = Arc::new(edge_fn(payload));
                fresh.edges.bind(&converted, id)?;
                if let Some(index) = maps.edge_indexes.index_of(payload) {
                    fresh.edge_indexes.set(&converted, index)?;
                }
            }
        }
        Ok(copy)
    }

    /// Deep copy: cloned payloads over a private copy of the substrate.
    pub fn deep_copy(&self) -> Result<Self>
    where
        N: Clone,
        E: Clone,
        G: Clone,
    {
        self.map_payloads(N::clone, E::clone)
    }

    // ========================================================================
    // Bindings
    // ========================================================================

    pub fn has_node(&self, node: &Arc<N>) -> bool {
        self.maps().nodes.contains(node)
    }

    pub fn has_edge(&self, edge: &Arc<E>) -> bool {
        self.maps().edges.contains(edge)
    }

    pub fn associate_node(&self, node: &Arc<N>, id: NodeId) -> Result<()> {
        self.maps_mut().nodes.bind(node, id)
    }

    pub fn associate_edge(&self, edge: &Arc<E>, id: EdgeId) -> Result<()> {
        self.maps_mut().edges.bind(edge, id)
    }

    /// Forget a node payload and its index. Fails if it is not bound.
    pub fn dissociate_node(&self, node: &Arc<N>) -> Result<NodeId> {
        self.maps_mut().dissociate_node(node)
    }

    pub fn dissociate_edge(&self, edge: &Arc<E>) -> Result<EdgeId> {
        self.maps_mut().dissociate_edge(edge)
    }

    pub fn node_graph_id(&self, node: &Arc<N>) -> Result<NodeId> {
        self.maps().nodes.require_id(node)
    }

    pub fn edge_graph_id(&self, edge: &Arc<E>) -> Result<EdgeId> {
        self.maps().edges.require_id(edge)
    }

    pub fn node_graph_ids(&self, nodes: &[Arc<N>]) -> Result<Vec<NodeId>> {
        let maps = self.maps();
        nodes.iter().map(|n| maps.nodes.require_id(n)).collect()
    }

    pub fn node_from_graph_id(&self, id: NodeId) -> Option<Arc<N>> {
        self.maps().nodes.payload_of(id).cloned()
    }

    pub fn edge_from_graph_id(&self, id: EdgeId) -> Option<Arc<E>> {
        self.maps().edges.payload_of(id).cloned()
    }

    /// Payloads of `ids`, skipping ids without one.
    pub fn nodes_from_graph_ids(&self, ids: &[NodeId]) -> Vec<Arc<N>> {
        let maps = self.maps();
        ids.iter().filter_map(|id| maps.nodes.payload_of(*id).cloned()).collect()
    }

    pub fn edges_from_graph_ids(&self, ids: &[EdgeId]) -> Vec<Arc<E>> {
        let maps = self.maps();
        ids.iter().filter_map(|id| maps.edges.payload_of(*id).cloned()).collect()
    }

    fn node_payload(&self, id: NodeId) -> Result<Arc<N>> {
        self.node_from_graph_id(id)
            .ok_or_else(|| Error::PayloadNotBound(format!("node {id} carries no payload")))
    }

    // ========================================================================
    // Dense indexes
    // ========================================================================

    pub fn has_node_index(&self, node: &Arc<N>) -> bool {
        self.maps().node_indexes.index_of(node).is_some()
    }

    pub fn has_edge_index(&self, edge: &Arc<E>) -> bool {
        self.maps().edge_indexes.index_of(edge).is_some()
    }

    pub fn node_index(&self, node: &Arc<N>) -> Result<usize> {
        self.maps()
            .node_indexes
            .index_of(node)
            .ok_or_else(|| Error::PayloadNotBound(format!("{} has no index", describe("node", node))))
    }

    pub fn edge_index(&self, edge: &Arc<E>) -> Result<usize> {
        self.maps()
            .edge_indexes
            .index_of(edge)
            .ok_or_else(|| Error::PayloadNotBound(format!("{} has no index", describe("edge", edge))))
    }

    pub fn node_indexes(&self, nodes: &[Arc<N>]) -> Result<Vec<usize>> {
        nodes.iter().map(|n| self.node_index(n)).collect()
    }

    pub fn edge_indexes(&self, edges: &[Arc<E>]) -> Result<Vec<usize>> {
        edges.iter().map(|e| self.edge_index(e)).collect()
    }

    /// Give a bound node a chosen index. The index and the node must both
    /// be free of any index binding.
    pub fn set_node_index(&self, node: &Arc<N>, index: usize) -> Result<()> {
        let mut maps = self.maps_mut();
        maps.nodes.require_id(node)?;
        maps.node_indexes.set(node, index)
    }

    pub fn set_edge_index(&self, edge: &Arc<E>, index: usize) -> Result<()> {
        let mut maps = self.maps_mut();
        maps.edges.require_id(edge)?;
        maps.edge_indexes.set(edge, index)
    }

    /// Give a bound node the lowest free index.
    pub fn add_node_index(&self, node: &Arc<N>) -> Result<usize> {
        let mut maps = self.maps_mut();
        maps.nodes.require_id(node)?;
        maps.node_indexes.add(node)
    }

    pub fn add_edge_index(&self, edge: &Arc<E>) -> Result<usize> {
        let mut maps = self.maps_mut();
        maps.edges.require_id(edge)?;
        maps.edge_indexes.add(edge)
    }

    pub fn node_at_index(&self, index: usize) -> Result<Arc<N>> {
        self.maps()
            .node_indexes
            .payload_at(index)
            .cloned()
            .ok_or_else(|| Error::PayloadNotBound(format!("no node at index {index}")))
    }

    pub fn edge_at_index(&self, index: usize) -> Result<Arc<E>> {
        self.maps()
            .edge_indexes
            .payload_at(index)
            .cloned()
            .ok_or_else(|| Error::PayloadNotBound(format!("no edge at index {index}")))
    }

    // ========================================================================
    // Structure
    // ========================================================================

    /// Create a substrate node for `node`.
    pub fn create_node(&self, node: &Arc<N>) -> Result<()> {
        if let Some(id) = self.maps().nodes.id_of(node) {
            return Err(Error::AlreadyBound(format!(
                "{} is already bound to node {id}",
                describe("node", node)
            )));
        }
        let id = self.write()?.create_node();
        self.associate_node(node, id)
    }

    /// Create `node` and link `origin → node`.
    pub fn create_node_from(&self, origin: &Arc<N>, node: &Arc<N>, edge: Option<&Arc<E>>) -> Result<()> {
        self.node_graph_id(origin)?;
        self.require_unbound_edge(edge)?;
        self.create_node(node)?;
        self.link(origin, node, edge)
    }

    fn require_unbound_edge(&self, edge: Option<&Arc<E>>) -> Result<()> {
        let Some(edge) = edge else { return Ok(()) };
        match self.maps().edges.id_of(edge) {
            Some(bound) => Err(Error::EdgeInUse(format!(
                "{} is already bound to edge {bound}",
                describe("edge", edge)
            ))),
            None => Ok(()),
        }
    }

    /// Link `a → b`, binding `edge` to the new substrate edge if given.
    pub fn link(&self, a: &Arc<N>, b: &Arc<N>, edge: Option<&Arc<E>>) -> Result<()> {
        let tail = self.node_graph_id(a)?;
        let head = self.node_graph_id(b)?;
        self.require_unbound_edge(edge)?;
        let id = self.write()?.link(tail, head)?;
        if let Some(edge) = edge {
            self.associate_edge(edge, id)?;
        }
        Ok(())
    }

    /// Remove the edge `a → b`. Its payload, if any, is released by the
    /// substrate notification.
    pub fn unlink(&self, a: &Arc<N>, b: &Arc<N>) -> Result<()> {
        let tail = self.node_graph_id(a)?;
        let head = self.node_graph_id(b)?;
        self.write()?.unlink(tail, head)?;
        Ok(())
    }

    /// Delete `node` with all its edges.
    pub fn delete_node(&self, node: &Arc<N>) -> Result<()> {
        let id = self.node_graph_id(node)?;
        self.write()?.delete_node(id)?;
        if self.has_node(node) {
            self.dissociate_node(node)?;
        }
        debug!(node = %id, "deleted node payload");
        Ok(())
    }

    pub fn edge_linking(&self, a: &Arc<N>, b: &Arc<N>) -> Result<Option<Arc<E>>> {
        let tail = self.node_graph_id(a)?;
        let head = self.node_graph_id(b)?;
        let id = self.read()?.substrate().edge_between(tail, head)?;
        Ok(self.edge_from_graph_id(id))
    }

    /// Bind `edge` to the existing edge `a → b`.
    pub fn set_edge_linking(&self, a: &Arc<N>, b: &Arc<N>, edge: &Arc<E>) -> Result<()> {
        let tail = self.node_graph_id(a)?;
        let head = self.node_graph_id(b)?;
        let id = self.read()?.substrate().edge_between(tail, head)?;
        self.associate_edge(edge, id)
    }

    /// (top, bottom) payloads of an edge.
    pub fn endpoints(&self, edge: &Arc<E>) -> Result<(Arc<N>, Arc<N>)> {
        let id = self.edge_graph_id(edge)?;
        let (tail, head) = self.read()?.substrate().endpoints(id)?;
        Ok((self.node_payload(tail)?, self.node_payload(head)?))
    }

    pub fn top(&self, edge: &Arc<E>) -> Result<Arc<N>> {
        self.endpoints(edge).map(|(top, _)| top)
    }

    pub fn bottom(&self, edge: &Arc<E>) -> Result<Arc<N>> {
        self.endpoints(edge).map(|(_, bottom)| bottom)
    }

    pub fn root(&self) -> Result<Arc<N>> {
        let id = self.read()?.substrate().root()?;
        self.node_payload(id)
    }

    pub fn set_root(&self, node: &Arc<N>) -> Result<()> {
        let id = self.node_graph_id(node)?;
        self.write()?.set_root(id)
    }

    pub fn is_directed(&self) -> Result<bool> {
        Ok(self.read()?.substrate().is_directed())
    }

    pub fn make_directed(&self) -> Result<()> {
        self.write()?.make_directed();
        Ok(())
    }

    pub fn make_undirected(&self) -> Result<()> {
        self.write()?.make_undirected()
    }

    // ========================================================================
    // Traversal
    // ========================================================================

    pub(crate) fn query_nodes(
        &self,
        node: &Arc<N>,
        query: impl FnOnce(&G, NodeId) -> Result<Vec<NodeId>>,
    ) -> Result<Vec<Arc<N>>> {
        let id = self.node_graph_id(node)?;
        let ids = query(&*self.read()?, id)?;
        Ok(self.nodes_from_graph_ids(&ids))
    }

    pub(crate) fn query_edges(
        &self,
        node: &Arc<N>,
        query: impl FnOnce(&G, NodeId) -> Result<Vec<EdgeId>>,
    ) -> Result<Vec<Arc<E>>> {
        let id = self.node_graph_id(node)?;
        let ids = query(&*self.read()?, id)?;
        Ok(self.edges_from_graph_ids(&ids))
    }

    pub fn neighbors(&self, node: &Arc<N>) -> Result<Vec<Arc<N>>> {
        self.query_nodes(node, |g, id| g.substrate().neighbors(id))
    }

    pub fn outgoing_neighbors(&self, node: &Arc<N>) -> Result<Vec<Arc<N>>> {
        self.query_nodes(node, |g, id| g.substrate().outgoing_neighbors(id))
    }

    pub fn incoming_neighbors(&self, node: &Arc<N>) -> Result<Vec<Arc<N>>> {
        self.query_nodes(node, |g, id| g.substrate().incoming_neighbors(id))
    }

    pub fn edges(&self, node: &Arc<N>) -> Result<Vec<Arc<E>>> {
        self.query_edges(node, |g, id| g.substrate().edges(id))
    }

    pub fn outgoing_edges(&self, node: &Arc<N>) -> Result<Vec<Arc<E>>> {
        self.query_edges(node, |g, id| g.substrate().outgoing_edges(id))
    }

    pub fn incoming_edges(&self, node: &Arc<N>) -> Result<Vec<Arc<E>>> {
        self.query_edges(node, |g, id| g.substrate().incoming_edges(id))
    }

    pub fn leaves_from_node(&self, node: &Arc<N>, max_depth: Option<usize>) -> Result<Vec<Arc<N>>> {
        self.query_nodes(node, |g, id| g.substrate().leaves_from_node(id, max_depth))
    }

    pub fn is_leaf(&self, node: &Arc<N>) -> Result<bool> {
        let id = self.node_graph_id(node)?;
        self.read()?.substrate().is_leaf(id)
    }

    pub fn degree(&self, node: &Arc<N>) -> Result<usize> {
        let id = self.node_graph_id(node)?;
        self.read()?.substrate().degree(id)
    }

    pub fn all_nodes(&self) -> Result<Vec<Arc<N>>> {
        let ids = self.read()?.substrate().all_nodes();
        Ok(self.nodes_from_graph_ids(&ids))
    }

    pub fn all_edges(&self) -> Result<Vec<Arc<E>>> {
        let ids = self.read()?.substrate().all_edges();
        Ok(self.edges_from_graph_ids(&ids))
    }

    pub fn all_leaves(&self) -> Result<Vec<Arc<N>>> {
        let ids = self.read()?.substrate().all_leaves();
        Ok(self.nodes_from_graph_ids(&ids))
    }

    pub fn all_inner_nodes(&self) -> Result<Vec<Arc<N>>> {
        let ids = self.read()?.substrate().all_inner_nodes();
        Ok(self.nodes_from_graph_ids(&ids))
    }

    /// Number of bound node payloads.
    pub fn number_of_nodes(&self) -> usize {
        self.maps().nodes.len()
    }

    pub fn number_of_edges(&self) -> usize {
        self.maps().edges.len()
    }

    pub fn number_of_leaves(&self) -> Result<usize> {
        self.all_leaves().map(|leaves| leaves.len())
    }

    // ========================================================================
    // Iterators
    // ========================================================================

    fn node_iter(&self, ids: Vec<NodeId>) -> NodeIter<N> {
        let bindings = Arc::clone(&self.bindings);
        PayloadIter::new(ids, move |id| bindings.maps.read().nodes.payload_of(id).cloned())
    }

    fn edge_iter(&self, ids: Vec<EdgeId>) -> EdgeIter<E> {
        let bindings = Arc::clone(&self.bindings);
        PayloadIter::new(ids, move |id| bindings.maps.read().edges.payload_of(id).cloned())
    }

    pub fn nodes_iter(&self) -> Result<NodeIter<N>> {
        let ids = self.read()?.substrate().all_nodes();
        Ok(self.node_iter(ids))
    }

    pub fn edges_iter(&self) -> Result<EdgeIter<E>> {
        let ids = self.read()?.substrate().all_edges();
        Ok(self.edge_iter(ids))
    }

    pub fn outgoing_neighbors_iter(&self, node: &Arc<N>) -> Result<NodeIter<N>> {
        let id = self.node_graph_id(node)?;
        let ids = self.read()?.substrate().outgoing_neighbors(id)?;
        Ok(self.node_iter(ids))
    }

    pub fn incoming_neighbors_iter(&self, node: &Arc<N>) -> Result<NodeIter<N>> {
        let id = self.node_graph_id(node)?;
        let ids = self.read()?.substrate().incoming_neighbors(id)?;
        Ok(self.node_iter(ids))
    }

    pub fn outgoing_edges_iter(&self, node: &Arc<N>) -> Result<EdgeIter<E>> {
        let id = self.node_graph_id(node)?;
        let ids = self.read()?.substrate().outgoing_edges(id)?;
        Ok(self.edge_iter(ids))
    }

    pub fn incoming_edges_iter(&self, node: &Arc<N>) -> Result<EdgeIter<E>> {
        let id = self.node_graph_id(node)?;
        let ids = self.read()?.substrate().incoming_edges(id)?;
        Ok(self.edge_iter(ids))
    }

    // ========================================================================
    // Output
    // ========================================================================

    pub fn output_to_dot(&self, writer: &mut dyn std::io::Write, name: &str) -> Result<()> {
        crate::export::output_to_dot(self, writer, name)
    }

    pub fn to_dot(&self, name: &str) -> Result<String> {
        let mut buf = Vec::new();
        self.output_to_dot(&mut buf, name)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

impl<N: 'static, E: 'static, G: MutableGraph + 'static> Drop for AssociationGraph<N, E, G> {
    fn drop(&mut self) {
        let observer = Self::as_observer(&self.bindings);
        let Some(mut graph) = self.graph.try_write() else {
            debug!("substrate busy, observer left for pruning");
            return;
        };
        if let Err(err) = graph.substrate_mut().unregister_observer(&observer) {
            debug!(%err, "observer was not registered");
        }
    }
}

impl<N: 'static, E: 'static, G: MutableGraph + 'static> std::fmt::Debug for AssociationGraph<N, E, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let maps = self.maps();
        f.debug_struct("AssociationGraph")
            .field("nodes", &maps.nodes.len())
            .field("edges", &maps.edges.len())
            .finish()
    }
}
