//! Tree operations over payloads.

use std::sync::Arc;

use crate::graph::TreeOps;
use crate::{Error, Result};
use super::bindings::describe;
use super::AssociationGraph;

impl<N: 'static, E: 'static, G: TreeOps + 'static> AssociationGraph<N, E, G> {
    pub fn father(&self, node: &Arc<N>) -> Result<Arc<N>> {
        let id = self.node_graph_id(node)?;
        let father = self.read()?.father(id)?;
        self.node_from_graph_id(father)
            .ok_or_else(|| Error::PayloadNotBound(format!("father {father} carries no payload")))
    }

    /// The payload of the edge arriving at `node`, if it carries one.
    pub fn edge_to_father(&self, node: &Arc<N>) -> Result<Option<Arc<E>>> {
        let id = self.node_graph_id(node)?;
        let edge = self.read()?.edge_to_father(id)?;
        Ok(self.edge_from_graph_id(edge))
    }

    pub fn mrca(&self, nodes: &[Arc<N>]) -> Result<Arc<N>> {
        let ids = self.node_graph_ids(nodes)?;
        let mrca = self.read()?.mrca(&ids)?;
        self.node_from_graph_id(mrca)
            .ok_or_else(|| Error::PayloadNotBound(format!("common ancestor {mrca} carries no payload")))
    }

    pub fn node_path(&self, a: &Arc<N>, b: &Arc<N>, include_ancestor: bool) -> Result<Vec<Arc<N>>> {
        let b = self.node_graph_id(b)?;
        self.query_nodes(a, |g, a| g.node_path(a, b, include_ancestor))
    }

    pub fn edge_path(&self, a: &Arc<N>, b: &Arc<N>) -> Result<Vec<Arc<E>>> {
        let b = self.node_graph_id(b)?;
        self.query_edges(a, |g, a| g.edge_path(a, b))
    }

    pub fn subtree_nodes(&self, local_root: &Arc<N>) -> Result<Vec<Arc<N>>> {
        self.query_nodes(local_root, |g, id| g.subtree_nodes(id))
    }

    pub fn subtree_edges(&self, local_root: &Arc<N>) -> Result<Vec<Arc<E>>> {
        self.query_edges(local_root, |g, id| g.subtree_edges(id))
    }

    /// Make the tree undirected; see [`TreeOps::un_root`]. A deleted root
    /// loses its payload.
    pub fn un_root(&self, join_root_sons: bool) -> Result<()> {
        self.write()?.un_root(join_root_sons)
    }

    /// Root the tree on a new node splitting the edge above `outgroup`,
    /// binding `new_root` to it when given.
    pub fn new_outgroup(&self, outgroup: &Arc<N>, new_root: Option<&Arc<N>>) -> Result<()> {
        let id = self.node_graph_id(outgroup)?;
        if let Some(root) = new_root {
            if let Some(bound) = self.maps().nodes.id_of(root) {
                return Err(Error::AlreadyBound(format!(
                    "{} is already bound to node {bound}",
                    describe("node", root)
                )));
            }
        }
        let created = self.write()?.new_outgroup(id)?;
        if let Some(root) = new_root {
            self.associate_node(root, created)?;
        }
        Ok(())
    }
}
