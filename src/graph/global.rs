//! Substrate graph.
//!
//! Nodes and edges are bare integer ids; there is no payload here. The
//! graph is a multigraph: several edges may join the same ordered pair, in
//! which case the most recently linked one is the one `unlink` removes.
//!
//! Undirected graphs record every link on both sides, so for any node the
//! outgoing and incoming adjacency are identical.
//!
//! ## Ordering
//!
//! Adjacency and enumerations are kept in id order. Ids come from
//! monotonic counters, so every enumeration is deterministic for a given
//! sequence of operations.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Weak;

use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::config::GraphConfig;
use crate::model::{Direction, EdgeId, NodeId};
use crate::{Error, Result};
use super::observer::{GraphObserver, ObserverSet};

/// Edges joining one ordered pair, oldest first.
type EdgeBundle = SmallVec<[EdgeId; 1]>;

#[derive(Debug, Clone, Default)]
struct Adjacency {
    /// neighbor → edges leaving this node towards it
    outgoing: BTreeMap<NodeId, EdgeBundle>,
    /// neighbor → edges arriving at this node from it
    incoming: BTreeMap<NodeId, EdgeBundle>,
}

impl Adjacency {
    fn side(&self, dir: Direction) -> &BTreeMap<NodeId, EdgeBundle> {
        match dir {
            Direction::Incoming => &self.incoming,
            Direction::Outgoing | Direction::Both => &self.outgoing,
        }
    }

    fn side_mut(&mut self, dir: Direction) -> &mut BTreeMap<NodeId, EdgeBundle> {
        match dir {
            Direction::Incoming => &mut self.incoming,
            Direction::Outgoing | Direction::Both => &mut self.outgoing,
        }
    }
}

fn edge_count(side: &BTreeMap<NodeId, EdgeBundle>) -> usize {
    side.values().map(|b| b.len()).sum()
}

// ============================================================================
// Graph
// ============================================================================

/// The mutable substrate shared by every observer layer.
#[derive(Debug)]
pub struct Graph {
    directed: bool,
    auto_root: bool,
    nodes: BTreeMap<NodeId, Adjacency>,
    /// edge → (tail, head)
    edges: BTreeMap<EdgeId, (NodeId, NodeId)>,
    root: Option<NodeId>,
    next_node_id: u64,
    next_edge_id: u64,
    observers: ObserverSet,
}

/// Copies structure, ids, counters and root. Observers are not copied: a
/// copy starts unobserved.
impl Clone for Graph {
    fn clone(&self) -> Self {
        Self {
            directed: self.directed,
            auto_root: self.auto_root,
            nodes: self.nodes.clone(),
            edges: self.edges.clone(),
            root: self.root,
            next_node_id: self.next_node_id,
            next_edge_id: self.next_edge_id,
            observers: ObserverSet::default(),
        }
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::with_config(GraphConfig::default())
    }
}

impl Graph {
    pub fn new(directed: bool) -> Self {
        Self::with_config(GraphConfig { directed, ..GraphConfig::default() })
    }

    pub fn with_config(config: GraphConfig) -> Self {
        Self {
            directed: config.directed,
            auto_root: config.auto_root,
            nodes: BTreeMap::new(),
            edges: BTreeMap::new(),
            root: None,
            next_node_id: 0,
            next_edge_id: 0,
            observers: ObserverSet::default(),
        }
    }

    pub fn is_directed(&self) -> bool {
        self.directed
    }

    // ========================================================================
    // Observers
    // ========================================================================

    /// Register an observer. Fails if it is already registered.
    pub fn register_observer(&mut self, observer: Weak<dyn GraphObserver>) -> Result<()> {
        self.observers.register(observer)
    }

    /// Register an observer that was created for this graph alone.
    pub(crate) fn attach_observer(&mut self, observer: Weak<dyn GraphObserver>) {
        self.observers.attach(observer);
    }

    /// Unregister an observer. Fails if it is not registered.
    pub fn unregister_observer(&mut self, observer: &Weak<dyn GraphObserver>) -> Result<()> {
        self.observers.unregister(observer)
    }

    pub fn is_observed_by(&self, observer: &Weak<dyn GraphObserver>) -> bool {
        self.observers.contains(observer)
    }

    pub fn number_of_observers(&self) -> usize {
        self.observers.len()
    }

    // ========================================================================
    // Lookups
    // ========================================================================

    fn adjacency(&self, node: NodeId) -> Result<&Adjacency> {
        self.nodes
            .get(&node)
            .ok_or_else(|| Error::NodeNotFound(format!("node {node}")))
    }

    fn require_node(&self, node: NodeId) -> Result<()> {
        self.adjacency(node).map(|_| ())
    }

    pub fn has_node(&self, node: NodeId) -> bool {
        self.nodes.contains_key(&node)
    }

    pub fn has_edge(&self, edge: EdgeId) -> bool {
        self.edges.contains_key(&edge)
    }

    /// (tail, head) of an edge. For undirected graphs the order is the one
    /// given at link time.
    pub fn endpoints(&self, edge: EdgeId) -> Result<(NodeId, NodeId)> {
        self.edges
            .get(&edge)
            .copied()
            .ok_or_else(|| Error::EdgeNotFound(format!("edge {edge}")))
    }

    pub fn top(&self, edge: EdgeId) -> Result<NodeId> {
        self.endpoints(edge).map(|(tail, _)| tail)
    }

    pub fn bottom(&self, edge: EdgeId) -> Result<NodeId> {
        self.endpoints(edge).map(|(_, head)| head)
    }

    /// The most recently linked edge going from `tail` to `head`.
    pub fn edge_between(&self, tail: NodeId, head: NodeId) -> Result<EdgeId> {
        self.adjacency(tail)?
            .outgoing
            .get(&head)
            .and_then(|bundle| bundle.last().copied())
            .ok_or_else(|| Error::EdgeNotFound(format!("no edge from node {tail} to node {head}")))
    }

    pub fn has_edge_between(&self, tail: NodeId, head: NodeId) -> bool {
        self.nodes
            .get(&tail)
            .is_some_and(|adj| adj.outgoing.contains_key(&head))
    }

    // ========================================================================
    // Neighborhood
    // ========================================================================

    /// Neighbors in the given direction, each listed once.
    pub fn neighbors_in(&self, node: NodeId, dir: Direction) -> Result<Vec<NodeId>> {
        let adj = self.adjacency(node)?;
        if dir != Direction::Both || !self.directed {
            return Ok(adj.side(dir).keys().copied().collect());
        }
        let mut seen = BTreeSet::new();
        Ok(adj
            .outgoing
            .keys()
            .chain(adj.incoming.keys())
            .copied()
            .filter(|n| seen.insert(*n))
            .collect())
    }

    /// Edges in the given direction; parallel edges are all listed.
    pub fn edges_in(&self, node: NodeId, dir: Direction) -> Result<Vec<EdgeId>> {
        let adj = self.adjacency(node)?;
        if dir != Direction::Both || !self.directed {
            return Ok(adj.side(dir).values().flatten().copied().collect());
        }
        let mut seen = BTreeSet::new();
        Ok(adj
            .outgoing
            .values()
            .chain(adj.incoming.values())
            .flatten()
            .copied()
            .filter(|e| seen.insert(*e))
            .collect())
    }

    /// (neighbor, edge) pairs leaving `node`.
    pub fn outgoing_links(&self, node: NodeId) -> Result<Vec<(NodeId, EdgeId)>> {
        Ok(self
            .adjacency(node)?
            .outgoing
            .iter()
            .flat_map(|(n, bundle)| bundle.iter().map(move |e| (*n, *e)))
            .collect())
    }

    pub fn outgoing_neighbors(&self, node: NodeId) -> Result<Vec<NodeId>> {
        self.neighbors_in(node, Direction::Outgoing)
    }

    pub fn incoming_neighbors(&self, node: NodeId) -> Result<Vec<NodeId>> {
        self.neighbors_in(node, Direction::Incoming)
    }

    pub fn neighbors(&self, node: NodeId) -> Result<Vec<NodeId>> {
        self.neighbors_in(node, Direction::Both)
    }

    pub fn outgoing_edges(&self, node: NodeId) -> Result<Vec<EdgeId>> {
        self.edges_in(node, Direction::Outgoing)
    }

    pub fn incoming_edges(&self, node: NodeId) -> Result<Vec<EdgeId>> {
        self.edges_in(node, Direction::Incoming)
    }

    pub fn edges(&self, node: NodeId) -> Result<Vec<EdgeId>> {
        self.edges_in(node, Direction::Both)
    }

    pub fn number_of_outgoing_neighbors(&self, node: NodeId) -> Result<usize> {
        Ok(self.adjacency(node)?.outgoing.len())
    }

    pub fn number_of_incoming_neighbors(&self, node: NodeId) -> Result<usize> {
        Ok(self.adjacency(node)?.incoming.len())
    }

    pub fn number_of_neighbors(&self, node: NodeId) -> Result<usize> {
        self.neighbors(node).map(|n| n.len())
    }

    pub fn number_of_incoming_edges(&self, node: NodeId) -> Result<usize> {
        Ok(edge_count(&self.adjacency(node)?.incoming))
    }

    pub fn number_of_outgoing_edges(&self, node: NodeId) -> Result<usize> {
        Ok(edge_count(&self.adjacency(node)?.outgoing))
    }

    /// Number of incident edges.
    pub fn degree(&self, node: NodeId) -> Result<usize> {
        self.edges(node).map(|e| e.len())
    }

    /// True when the node has at most one incident edge. In a directed
    /// graph a single reciprocal pair with one neighbor also counts as a
    /// leaf.
    pub fn is_leaf(&self, node: NodeId) -> Result<bool> {
        let adj = self.adjacency(node)?;
        let out = edge_count(&adj.outgoing);
        if !self.directed {
            return Ok(out <= 1);
        }
        let inc = edge_count(&adj.incoming);
        Ok(out + inc <= 1
            || (out == 1 && inc == 1 && adj.outgoing.keys().next() == adj.incoming.keys().next()))
    }

    // ========================================================================
    // Enumerations
    // ========================================================================

    pub fn all_nodes(&self) -> Vec<NodeId> {
        self.nodes.keys().copied().collect()
    }

    pub fn all_edges(&self) -> Vec<EdgeId> {
        self.edges.keys().copied().collect()
    }

    pub fn all_leaves(&self) -> Vec<NodeId> {
        self.nodes
            .keys()
            .copied()
            .filter(|n| self.is_leaf(*n).unwrap_or(false))
            .collect()
    }

    pub fn all_inner_nodes(&self) -> Vec<NodeId> {
        self.nodes
            .keys()
            .copied()
            .filter(|n| !self.is_leaf(*n).unwrap_or(true))
            .collect()
    }

    pub fn number_of_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn number_of_edges(&self) -> usize {
        self.edges.len()
    }

    /// Leaves reachable from `start` through neighbors, never stepping
    /// straight back to the node just left. A node with more than one
    /// neighbor is expanded while hops remain; `None` means unbounded.
    pub fn leaves_from_node(&self, start: NodeId, max_depth: Option<usize>) -> Result<Vec<NodeId>> {
        self.require_node(start)?;
        let mut leaves = Vec::new();
        let mut visited = BTreeSet::new();
        let mut stack = vec![(start, start, max_depth)];

        while let Some((node, origin, remaining)) = stack.pop() {
            if !visited.insert(node) {
                continue;
            }
            let neighbors = self.neighbors(node)?;
            if neighbors.len() <= 1 {
                leaves.push(node);
                continue;
            }
            let next_depth = match remaining {
                Some(0) => continue,
                Some(d) => Some(d - 1),
                None => None,
            };
            for next in neighbors.into_iter().rev() {
                if next != origin {
                    stack.push((next, node, next_depth));
                }
            }
        }
        Ok(leaves)
    }

    // ========================================================================
    // Root
    // ========================================================================

    pub fn root(&self) -> Result<NodeId> {
        self.root
            .ok_or_else(|| Error::NodeNotFound("graph has no root".into()))
    }

    pub fn set_root(&mut self, node: NodeId) -> Result<()> {
        self.require_node(node)?;
        self.root = Some(node);
        Ok(())
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    /// Create an isolated node. Not notified.
    pub fn create_node(&mut self) -> NodeId {
        let id = NodeId(self.next_node_id);
        self.next_node_id += 1;
        self.nodes.insert(id, Adjacency::default());
        if self.auto_root && self.root.is_none() {
            self.root = Some(id);
        }
        trace!(node = %id, "created node");
        id
    }

    /// Link `tail` to `head` with a fresh edge id.
    pub fn link(&mut self, tail: NodeId, head: NodeId) -> Result<EdgeId> {
        self.require_node(tail)?;
        self.require_node(head)?;
        let edge = EdgeId(self.next_edge_id);
        self.next_edge_id = edge.0.checked_add(1).ok_or_else(|| {
            Error::Precondition(format!("edge id {edge} leaves no id for later links"))
        })?;
        self.insert_link(tail, head, edge);
        self.edges.insert(edge, (tail, head));
        debug!(%tail, %head, %edge, "linked");
        Ok(edge)
    }

    /// Link `tail` to `head` with a caller-chosen edge id.
    pub fn link_with(&mut self, tail: NodeId, head: NodeId, edge: EdgeId) -> Result<()> {
        self.require_node(tail)?;
        self.require_node(head)?;
        if self.edges.contains_key(&edge) {
            return Err(Error::EdgeInUse(format!("edge {edge}")));
        }
        let after = edge.0.checked_add(1).ok_or_else(|| {
            Error::Precondition(format!("edge id {edge} leaves no id for later links"))
        })?;
        self.next_edge_id = self.next_edge_id.max(after);
        self.insert_link(tail, head, edge);
        self.edges.insert(edge, (tail, head));
        debug!(%tail, %head, %edge, "linked with explicit id");
        Ok(())
    }

    /// Remove the most recently linked edge from `tail` to `head` and
    /// notify observers.
    pub fn unlink(&mut self, tail: NodeId, head: NodeId) -> Result<EdgeId> {
        let edge = self.edge_between(tail, head)?;
        self.detach(tail, head, edge);
        self.edges.remove(&edge);
        debug!(%tail, %head, %edge, "unlinked");
        self.observers.notify_edges(&[edge]);
        Ok(edge)
    }

    /// Isolate a node, then remove it. Observers are told about the
    /// removed edges first, then about the node.
    pub fn delete_node(&mut self, node: NodeId) -> Result<()> {
        let adj = self.adjacency(node)?;
        let mut incident: BTreeMap<EdgeId, (NodeId, NodeId)> = BTreeMap::new();
        for (&next, bundle) in &adj.outgoing {
            for &edge in bundle {
                incident.insert(edge, (node, next));
            }
        }
        if self.directed {
            for (&prev, bundle) in &adj.incoming {
                for &edge in bundle {
                    incident.entry(edge).or_insert((prev, node));
                }
            }
        }

        for (&edge, &(tail, head)) in &incident {
            self.detach(tail, head, edge);
            self.edges.remove(&edge);
        }
        self.nodes.remove(&node);
        if self.root == Some(node) {
            self.root = None;
        }
        debug!(%node, edges = incident.len(), "deleted node");

        let removed: Vec<EdgeId> = incident.into_keys().collect();
        self.observers.notify_edges(&removed);
        self.observers.notify_nodes(&[node]);
        Ok(())
    }

    /// Reverse the edge joining `a` and `b` (an `a → b` edge is preferred
    /// over a `b → a` one).
    pub fn switch_nodes(&mut self, a: NodeId, b: NodeId) -> Result<()> {
        self.require_node(a)?;
        self.require_node(b)?;
        let edge = self
            .edge_between(a, b)
            .or_else(|_| self.edge_between(b, a))
            .map_err(|_| Error::EdgeNotFound(format!("no edge between nodes {a} and {b}")))?;
        self.reverse_edge(edge)
    }

    fn reverse_edge(&mut self, edge: EdgeId) -> Result<()> {
        let (tail, head) = self.endpoints(edge)?;
        if self.directed {
            self.detach(tail, head, edge);
            self.insert_link(head, tail, edge);
        }
        self.edges.insert(edge, (head, tail));
        trace!(%edge, from = %head, to = %tail, "reversed edge");
        Ok(())
    }

    /// Convert to a directed graph, keeping each edge oriented as its
    /// recorded (tail, head) pair.
    pub fn make_directed(&mut self) {
        if self.directed {
            return;
        }
        self.directed = true;
        self.rebuild_adjacency();
        debug!("graph made directed");
    }

    /// Convert to an undirected graph. Fails when two nodes are linked in
    /// both directions, since that cannot be collapsed.
    pub fn make_undirected(&mut self) -> Result<()> {
        if !self.directed {
            return Ok(());
        }
        for (&node, adj) in &self.nodes {
            if let Some(&other) = adj
                .outgoing
                .keys()
                .find(|n| **n != node && adj.incoming.contains_key(*n))
            {
                return Err(Error::StructuralContradiction(format!(
                    "nodes {node} and {other} are linked in both directions"
                )));
            }
        }
        self.directed = false;
        self.rebuild_adjacency();
        debug!("graph made undirected");
        Ok(())
    }

    fn rebuild_adjacency(&mut self) {
        for adj in self.nodes.values_mut() {
            adj.outgoing.clear();
            adj.incoming.clear();
        }
        let links: Vec<(EdgeId, (NodeId, NodeId))> =
            self.edges.iter().map(|(e, ends)| (*e, *ends)).collect();
        for (edge, (tail, head)) in links {
            self.insert_link(tail, head, edge);
        }
    }

    fn insert_link(&mut self, tail: NodeId, head: NodeId, edge: EdgeId) {
        self.push_side(tail, Direction::Outgoing, head, edge);
        self.push_side(head, Direction::Incoming, tail, edge);
        if !self.directed && tail != head {
            self.push_side(head, Direction::Outgoing, tail, edge);
            self.push_side(tail, Direction::Incoming, head, edge);
        }
    }

    fn detach(&mut self, tail: NodeId, head: NodeId, edge: EdgeId) {
        self.pull_side(tail, Direction::Outgoing, head, edge);
        self.pull_side(head, Direction::Incoming, tail, edge);
        if !self.directed && tail != head {
            self.pull_side(head, Direction::Outgoing, tail, edge);
            self.pull_side(tail, Direction::Incoming, head, edge);
        }
    }

    fn push_side(&mut self, node: NodeId, dir: Direction, other: NodeId, edge: EdgeId) {
        if let Some(adj) = self.nodes.get_mut(&node) {
            adj.side_mut(dir).entry(other).or_default().push(edge);
        }
    }

    fn pull_side(&mut self, node: NodeId, dir: Direction, other: NodeId, edge: EdgeId) {
        let Some(adj) = self.nodes.get_mut(&node) else { return };
        let side = adj.side_mut(dir);
        if let Some(bundle) = side.get_mut(&other) {
            bundle.retain(|e| *e != edge);
            if bundle.is_empty() {
                side.remove(&other);
            }
        }
    }

    // ========================================================================
    // Structure checks
    // ========================================================================

    /// True when no directed cycle exists: repeatedly stripping nodes with
    /// no outgoing edge empties the graph. Works on scratch out-degree
    /// counts, so disconnected components are handled.
    pub fn is_da(&self) -> bool {
        let mut out_degree: BTreeMap<NodeId, usize> = self
            .nodes
            .iter()
            .map(|(n, adj)| (*n, edge_count(&adj.outgoing)))
            .collect();
        let mut sinks: Vec<NodeId> = out_degree
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(n, _)| *n)
            .collect();
        let mut stripped = 0;

        while let Some(sink) = sinks.pop() {
            stripped += 1;
            let Some(adj) = self.nodes.get(&sink) else { continue };
            for (prev, bundle) in &adj.incoming {
                if let Some(d) = out_degree.get_mut(prev) {
                    *d = d.saturating_sub(bundle.len());
                    if *d == 0 && *prev != sink {
                        sinks.push(*prev);
                    }
                }
            }
        }
        stripped == self.nodes.len()
    }

    /// True when a walk from the root along outgoing edges meets every
    /// node exactly once. The edge just followed is never walked back.
    pub fn is_tree(&self) -> bool {
        let Some(root) = self.root else {
            return self.nodes.is_empty();
        };
        let mut met = BTreeSet::new();
        let mut stack: Vec<(NodeId, Option<EdgeId>)> = vec![(root, None)];

        while let Some((node, via)) = stack.pop() {
            if !met.insert(node) {
                return false;
            }
            let Some(adj) = self.nodes.get(&node) else { return false };
            for (&next, bundle) in &adj.outgoing {
                for &edge in bundle {
                    if Some(edge) != via {
                        stack.push((next, Some(edge)));
                    }
                }
            }
        }
        met.len() == self.nodes.len()
    }

    /// Direct every edge away from the root.
    ///
    /// Nodes are placed one at a time from a frontier that starts at the
    /// root: a frontier node with at most one unplaced neighbor goes first,
    /// otherwise the one with the fewest edges arriving from unplaced
    /// nodes. Every edge to an unplaced node is turned to point away from
    /// the node being placed. The placement order is therefore a
    /// topological order, and every placed node is reachable from the
    /// root. Nodes in components without the root are left untouched.
    pub fn orientate(&mut self) -> Result<()> {
        if self.nodes.is_empty() {
            return Ok(());
        }
        let root = self.root()?;
        self.make_directed();

        let mut unplaced: BTreeSet<NodeId> = self.nodes.keys().copied().collect();
        let mut frontier: BTreeSet<NodeId> = BTreeSet::from([root]);

        while let Some(node) = self.next_to_place(&frontier, &unplaced)? {
            frontier.remove(&node);
            unplaced.remove(&node);

            for edge in self.edges(node)? {
                let (tail, head) = self.endpoints(edge)?;
                let other = if tail == node { head } else { tail };
                if !unplaced.contains(&other) {
                    continue;
                }
                if head == node {
                    self.reverse_edge(edge)?;
                }
                frontier.insert(other);
            }
        }

        if !unplaced.is_empty() {
            debug!(unreached = unplaced.len(), "orientate left nodes unreachable from root");
        }
        debug!(%root, "graph orientated");
        Ok(())
    }

    fn next_to_place(
        &self,
        frontier: &BTreeSet<NodeId>,
        unplaced: &BTreeSet<NodeId>,
    ) -> Result<Option<NodeId>> {
        let mut best: Option<(NodeId, usize)> = None;
        for &node in frontier {
            let open = self
                .neighbors(node)?
                .into_iter()
                .filter(|n| unplaced.contains(n))
                .count();
            if open <= 1 {
                return Ok(Some(node));
            }
            let arriving = self
                .adjacency(node)?
                .incoming
                .iter()
                .filter(|(n, _)| unplaced.contains(*n))
                .map(|(_, bundle)| bundle.len())
                .sum::<usize>();
            if best.is_none_or(|(_, fewest)| arriving < fewest) {
                best = Some((node, arriving));
            }
        }
        Ok(best.map(|(node, _)| node))
    }
}

// ============================================================================
// Tests
// ============================================================================
