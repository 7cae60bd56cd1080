//! Directed acyclic graph layer.
//!
//! Validity and rootedness are caches over the substrate, never independent
//! truth. Every structural mutation clears both; the next query recomputes
//! and stores the fresh answer. A cleared cache reads the same as a stored
//! `false`, so a query right after a mutation always pays for one check.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

use crate::model::{EdgeId, NodeId};
use crate::{Error, Result};
use super::{Graph, MutableGraph};

// ============================================================================
// ValidityCache
// ============================================================================

/// Cached `is_valid` / `is_rooted` answers.
#[derive(Debug, Default)]
pub struct ValidityCache {
    valid: AtomicBool,
    rooted: AtomicBool,
}

impl ValidityCache {
    pub fn invalidate(&self) {
        self.valid.store(false, Ordering::Relaxed);
        self.rooted.store(false, Ordering::Relaxed);
    }

    pub fn valid(&self) -> bool {
        self.valid.load(Ordering::Relaxed)
    }

    pub fn rooted(&self) -> bool {
        self.rooted.load(Ordering::Relaxed)
    }

    fn store_valid(&self, valid: bool) {
        self.valid.store(valid, Ordering::Relaxed);
    }

    fn store_rooted(&self, rooted: bool) {
        self.rooted.store(rooted, Ordering::Relaxed);
    }
}

impl Clone for ValidityCache {
    fn clone(&self) -> Self {
        Self {
            valid: AtomicBool::new(self.valid()),
            rooted: AtomicBool::new(self.rooted()),
        }
    }
}

// ============================================================================
// DirectedGraphOps Trait
// ============================================================================

/// Father/son semantics over a `MutableGraph`.
///
/// Implementors supply the cache and the uncached validity check; all
/// other operations are provided in terms of `MutableGraph`.
pub trait DirectedGraphOps: MutableGraph {
    fn cache(&self) -> &ValidityCache;

    /// Uncached structural check for this layer.
    fn validate(&self) -> bool;

    /// Whether a node may have at most one father.
    fn single_father(&self) -> bool {
        false
    }

    /// Uncached rootedness check: directed, with exactly one node that has
    /// no incoming edge.
    fn check_rooted(&self) -> bool {
        let graph = self.substrate();
        if !graph.is_directed() {
            return false;
        }
        let mut sources = 0;
        for node in graph.all_nodes() {
            if graph.number_of_incoming_edges(node).unwrap_or(0) == 0 {
                sources += 1;
                if sources > 1 {
                    return false;
                }
            }
        }
        sources == 1
    }

    fn is_valid(&self) -> bool {
        let cache = self.cache();
        if cache.valid() {
            return true;
        }
        let valid = self.validate();
        cache.store_valid(valid);
        valid
    }

    fn is_rooted(&self) -> bool {
        let cache = self.cache();
        if cache.rooted() {
            return true;
        }
        let rooted = self.check_rooted();
        if rooted {
            cache.store_rooted(true);
        }
        rooted
    }

    fn require_valid(&self, what: &str) -> Result<()> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(Error::Precondition(format!("{what}: graph is not valid")))
        }
    }

    // ========================================================================
    // Fathers
    // ========================================================================

    fn has_father(&self, node: NodeId) -> Result<bool> {
        Ok(self.substrate().number_of_incoming_edges(node)? > 0)
    }

    fn fathers(&self, node: NodeId) -> Result<Vec<NodeId>> {
        self.substrate().incoming_neighbors(node)
    }

    fn number_of_fathers(&self, node: NodeId) -> Result<usize> {
        self.substrate().number_of_incoming_neighbors(node)
    }

    /// Link `father → node`, optionally with an explicit edge id.
    fn add_father(&mut self, node: NodeId, father: NodeId, edge: Option<EdgeId>) -> Result<EdgeId> {
        if self.single_father() && self.has_father(node)? {
            return Err(Error::Precondition(format!("node {node} already has a father")));
        }
        match edge {
            Some(edge) => {
                self.link_with(father, node, edge)?;
                Ok(edge)
            }
            None => self.link(father, node),
        }
    }

    fn remove_father(&mut self, node: NodeId, father: NodeId) -> Result<EdgeId> {
        self.unlink(father, node)
    }

    /// Remove every edge arriving at `node`; returns the former fathers.
    fn remove_fathers(&mut self, node: NodeId) -> Result<Vec<NodeId>> {
        let fathers = self.fathers(node)?;
        for edge in self.substrate().incoming_edges(node)? {
            let father = self.substrate().top(edge)?;
            self.unlink(father, node)?;
        }
        Ok(fathers)
    }

    // ========================================================================
    // Sons
    // ========================================================================

    fn sons(&self, node: NodeId) -> Result<Vec<NodeId>> {
        self.substrate().outgoing_neighbors(node)
    }

    fn number_of_sons(&self, node: NodeId) -> Result<usize> {
        self.substrate().number_of_outgoing_neighbors(node)
    }

    /// Link `node → son`, optionally with an explicit edge id.
    fn add_son(&mut self, node: NodeId, son: NodeId, edge: Option<EdgeId>) -> Result<EdgeId> {
        self.add_father(son, node, edge)
    }

    fn remove_son(&mut self, node: NodeId, son: NodeId) -> Result<EdgeId> {
        self.unlink(node, son)
    }

    /// Remove every edge leaving `node`; returns the former sons.
    fn remove_sons(&mut self, node: NodeId) -> Result<Vec<NodeId>> {
        let sons = self.sons(node)?;
        for (son, _) in self.substrate().outgoing_links(node)? {
            self.unlink(node, son)?;
        }
        Ok(sons)
    }

    // ========================================================================
    // Below a node
    // ========================================================================

    /// `node` and every node reachable from it, in depth-first pre-order,
    /// each listed once.
    fn below_nodes(&self, node: NodeId) -> Result<Vec<NodeId>> {
        self.require_valid("below_nodes")?;
        let graph = self.substrate();
        let mut met = BTreeSet::new();
        let mut order = Vec::new();
        let mut stack = vec![node];

        while let Some(current) = stack.pop() {
            if !met.insert(current) {
                continue;
            }
            order.push(current);
            for son in graph.outgoing_neighbors(current)?.into_iter().rev() {
                stack.push(son);
            }
        }
        Ok(order)
    }

    /// Every edge leaving a node of `below_nodes(node)`.
    fn below_edges(&self, node: NodeId) -> Result<Vec<EdgeId>> {
        let graph = self.substrate();
        let mut edges = Vec::new();
        for below in self.below_nodes(node)? {
            edges.extend(graph.outgoing_edges(below)?);
        }
        Ok(edges)
    }

    /// Nodes without sons in `below_nodes(node)`.
    fn leaves_under_node(&self, node: NodeId) -> Result<Vec<NodeId>> {
        let graph = self.substrate();
        let mut leaves = Vec::new();
        for below in self.below_nodes(node)? {
            if graph.number_of_outgoing_edges(below)? == 0 {
                leaves.push(below);
            }
        }
        Ok(leaves)
    }

    // ========================================================================
    // Rooting
    // ========================================================================

    /// Make `new_root` the root.
    ///
    /// A graph that was valid and rooted before the call keeps its edges
    /// and only has the father chains above `new_root` turned around.
    /// Otherwise the whole graph is re-orientated from `new_root`.
    fn root_at(&mut self, new_root: NodeId) -> Result<()> {
        self.reroot(new_root)
    }

    fn reroot(&mut self, new_root: NodeId) -> Result<()> {
        let keep_edges = self.is_valid() && self.is_rooted();
        self.set_root(new_root)?;
        if keep_edges {
            self.propagate_direction(new_root)
        } else {
            self.orientate()
        }
    }

    /// Turn around every edge arriving at `node` or at one of its
    /// ancestors. The ancestors are collected first, with an explicit
    /// stack, so no edge is switched twice.
    fn propagate_direction(&mut self, node: NodeId) -> Result<()> {
        let mut stack = vec![node];
        let mut met = BTreeSet::from([node]);
        let mut father_edges = Vec::new();

        while let Some(current) = stack.pop() {
            for edge in self.substrate().incoming_edges(current)? {
                let father = self.substrate().top(edge)?;
                father_edges.push((father, current));
                if met.insert(father) {
                    stack.push(father);
                }
            }
        }
        for &(father, son) in &father_edges {
            self.switch_nodes(father, son)?;
        }
        debug!(%node, switched = father_edges.len(), "propagated direction from new root");
        Ok(())
    }
}

// ============================================================================
// DagGraph
// ============================================================================

/// Substrate with DAG semantics.
///
/// Valid means directed, acyclic and, when there is more than one node,
/// without isolated nodes.
#[derive(Debug, Clone)]
pub struct DagGraph {
    graph: Graph,
    cache: ValidityCache,
}

impl DagGraph {
    pub fn new() -> Self {
        Self::from_substrate(Graph::new(true))
    }
}

impl Default for DagGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl MutableGraph for DagGraph {
    fn from_substrate(graph: Graph) -> Self {
        Self { graph, cache: ValidityCache::default() }
    }

    fn substrate(&self) -> &Graph {
        &self.graph
    }

    fn substrate_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }

    fn structure_changed(&self) {
        self.cache.invalidate();
    }
}

impl DirectedGraphOps for DagGraph {
    fn cache(&self) -> &ValidityCache {
        &self.cache
    }

    fn validate(&self) -> bool {
        let graph = &self.graph;
        if !graph.is_directed() || !graph.is_da() {
            return false;
        }
        graph.number_of_nodes() <= 1
            || graph
                .all_nodes()
                .into_iter()
                .all(|n| graph.degree(n).unwrap_or(0) > 0)
    }
}
