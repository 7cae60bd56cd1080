//! Tree layer.
//!
//! A tree is valid when a walk from the root meets every node exactly once,
//! and rooted when it is directed with a single source. Unlike a DAG, a
//! node never gets a second father.

use std::collections::BTreeSet;

use tracing::debug;

use crate::model::{EdgeId, NodeId};
use crate::{Error, Result};
use super::{DirectedGraphOps, Graph, MutableGraph, ValidityCache};

// ============================================================================
// TreeOps Trait
// ============================================================================

pub trait TreeOps: DirectedGraphOps {
    /// The edge arriving at `node`. Requires a rooted (directed) tree and
    /// exactly one incoming edge.
    fn edge_to_father(&self, node: NodeId) -> Result<EdgeId> {
        let graph = self.substrate();
        if !graph.is_directed() {
            return Err(Error::Precondition(format!(
                "tree is not rooted, node {node} has no defined father"
            )));
        }
        match graph.incoming_edges(node)?.as_slice() {
            [] => Err(Error::NoFather(format!("node {node}"))),
            [edge] => Ok(*edge),
            many => Err(Error::AmbiguousFather(format!("node {node} has {} fathers", many.len()))),
        }
    }

    fn father(&self, node: NodeId) -> Result<NodeId> {
        let edge = self.edge_to_father(node)?;
        self.substrate().top(edge)
    }

    /// `node`, its father, and so on up to the root.
    fn ancestors(&self, node: NodeId) -> Result<Vec<NodeId>> {
        let mut line = vec![node];
        let mut current = node;
        while self.has_father(current)? {
            current = self.father(current)?;
            line.push(current);
        }
        Ok(line)
    }

    /// Most recent common ancestor of a set of nodes. A node counts as its
    /// own ancestor.
    fn mrca(&self, nodes: &[NodeId]) -> Result<NodeId> {
        self.require_valid("mrca")?;
        let (first, rest) = nodes
            .split_first()
            .ok_or_else(|| Error::Precondition("mrca of an empty node set".into()))?;
        let mut common = self.ancestors(*first)?;
        for node in rest {
            let line: BTreeSet<NodeId> = self.ancestors(*node)?.into_iter().collect();
            common.retain(|n| line.contains(n));
        }
        common
            .first()
            .copied()
            .ok_or_else(|| Error::Precondition("nodes share no ancestor".into()))
    }

    /// Nodes on the tree path from `a` to `b`, both always included. A
    /// common ancestor strictly between them is kept only if
    /// `include_ancestor` is set. `node_path(a, a, _)` is `[a]`.
    fn node_path(&self, a: NodeId, b: NodeId, include_ancestor: bool) -> Result<Vec<NodeId>> {
        let (mut path, mrca, down) = path_halves(self, a, b)?;
        if include_ancestor || mrca == a || mrca == b {
            path.push(mrca);
        }
        path.extend(down.into_iter().rev());
        Ok(path)
    }

    /// Edges on the tree path from `a` to `b`.
    fn edge_path(&self, a: NodeId, b: NodeId) -> Result<Vec<EdgeId>> {
        let (up, _, down) = path_halves(self, a, b)?;
        up.iter()
            .chain(down.iter().rev())
            .map(|n| self.edge_to_father(*n))
            .collect()
    }

    fn subtree_nodes(&self, local_root: NodeId) -> Result<Vec<NodeId>> {
        self.below_nodes(local_root)
    }

    fn subtree_edges(&self, local_root: NodeId) -> Result<Vec<EdgeId>> {
        self.below_edges(local_root)
    }

    /// Make the tree undirected. With `join_root_sons`, the root must have
    /// exactly two sons: they are linked to each other, the first becomes
    /// the root and the old root is deleted.
    fn un_root(&mut self, join_root_sons: bool) -> Result<()> {
        if join_root_sons {
            let root = self.substrate().root()?;
            let sons = self.sons(root)?;
            let &[left, right] = sons.as_slice() else {
                return Err(Error::Precondition(format!(
                    "root {root} has {} sons, joining them needs exactly two",
                    sons.len()
                )));
            };
            self.unlink(root, left)?;
            self.unlink(root, right)?;
            self.link(left, right)?;
            self.set_root(left)?;
            self.delete_node(root)?;
            debug!(old_root = %root, new_root = %left, "joined root sons");
        }
        self.make_undirected()
    }

    /// Split the edge above `outgroup` with a new node and root the tree
    /// there. Returns the new root.
    fn new_outgroup(&mut self, outgroup: NodeId) -> Result<NodeId> {
        let father = self.father(outgroup)?;
        let new_root = self.create_node();
        self.unlink(father, outgroup)?;
        self.link(new_root, outgroup)?;
        self.link(father, new_root)?;
        self.root_at(new_root)?;
        Ok(new_root)
    }
}

/// (`a` up to the common ancestor, the ancestor, `b` up to the ancestor);
/// both halves exclude the ancestor.
fn path_halves<T: TreeOps + ?Sized>(
    tree: &T,
    a: NodeId,
    b: NodeId,
) -> Result<(Vec<NodeId>, NodeId, Vec<NodeId>)> {
    tree.require_valid("path between two nodes")?;
    let up_a = tree.ancestors(a)?;
    let up_b = tree.ancestors(b)?;
    let on_b: BTreeSet<NodeId> = up_b.iter().copied().collect();

    let no_ancestor = || Error::Precondition(format!("nodes {a} and {b} share no ancestor"));
    let pos_a = up_a.iter().position(|n| on_b.contains(n)).ok_or_else(no_ancestor)?;
    let mrca = up_a[pos_a];
    let pos_b = up_b.iter().position(|n| *n == mrca).ok_or_else(no_ancestor)?;

    Ok((up_a[..pos_a].to_vec(), mrca, up_b[..pos_b].to_vec()))
}

// ============================================================================
// TreeGraph
// ============================================================================

/// Substrate with tree semantics.
#[derive(Debug, Clone)]
pub struct TreeGraph {
    graph: Graph,
    cache: ValidityCache,
}

impl TreeGraph {
    /// An empty rooted (directed) tree.
    pub fn new() -> Self {
        Self::from_substrate(Graph::new(true))
    }

    /// An empty unrooted (undirected) tree.
    pub fn unrooted() -> Self {
        Self::from_substrate(Graph::new(false))
    }
}

impl Default for TreeGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl MutableGraph for TreeGraph {
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

impl DirectedGraphOps for TreeGraph {
    fn cache(&self) -> &ValidityCache {
        &self.cache
    }

    fn validate(&self) -> bool {
        self.graph.is_tree()
    }

    fn single_father(&self) -> bool {
        true
    }

    /// Only a valid tree can be re-rooted.
    fn root_at(&mut self, new_root: NodeId) -> Result<()> {
        self.require_valid("root_at")?;
        self.reroot(new_root)
    }
}

impl TreeOps for TreeGraph {}
