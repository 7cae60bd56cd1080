//! DAG operations over payloads, for layers whose substrate is a
//! [`DirectedGraphOps`] graph.

use std::sync::Arc;

use crate::graph::DirectedGraphOps;
use crate::model::EdgeId;
use crate::{Error, Result};
use super::AssociationGraph;

impl<N: 'static, E: 'static, G: DirectedGraphOps + 'static> AssociationGraph<N, E, G> {
    pub fn is_valid(&self) -> Result<bool> {
        Ok(self.read()?.is_valid())
    }

    pub fn is_rooted(&self) -> Result<bool> {
        Ok(self.read()?.is_rooted())
    }

    pub fn root_at(&self, node: &Arc<N>) -> Result<()> {
        let id = self.node_graph_id(node)?;
        self.write()?.root_at(id)
    }

    pub fn has_father(&self, node: &Arc<N>) -> Result<bool> {
        let id = self.node_graph_id(node)?;
        self.read()?.has_father(id)
    }

    pub fn fathers(&self, node: &Arc<N>) -> Result<Vec<Arc<N>>> {
        self.query_nodes(node, |g, id| g.fathers(id))
    }

    pub fn number_of_fathers(&self, node: &Arc<N>) -> Result<usize> {
        let id = self.node_graph_id(node)?;
        self.read()?.number_of_fathers(id)
    }

    /// Link `father → node`. A bound `edge` is relinked under its own id; an
    /// unbound one is bound to the new edge.
    pub fn add_father(&self, node: &Arc<N>, father: &Arc<N>, edge: Option<&Arc<E>>) -> Result<()> {
        let node_id = self.node_graph_id(node)?;
        let father_id = self.node_graph_id(father)?;
        self.relate(edge, |g, e| g.add_father(node_id, father_id, e))
    }

    pub fn add_son(&self, node: &Arc<N>, son: &Arc<N>, edge: Option<&Arc<E>>) -> Result<()> {
        let node_id = self.node_graph_id(node)?;
        let son_id = self.node_graph_id(son)?;
        self.relate(edge, |g, e| g.add_son(node_id, son_id, e))
    }

    fn relate(
        &self,
        edge: Option<&Arc<E>>,
        op: impl FnOnce(&mut G, Option<EdgeId>) -> Result<EdgeId>,
    ) -> Result<()> {
        let Some(edge) = edge else {
            op(&mut *self.write()?, None)?;
            return Ok(());
        };
        match self.edge_graph_id(edge) {
            Ok(id) => {
                op(&mut *self.write()?, Some(id))?;
                Ok(())
            }
            Err(Error::PayloadNotBound(_)) => {
                let id = op(&mut *self.write()?, None)?;
                self.associate_edge(edge, id)
            }
            Err(err) => Err(err),
        }
    }

    pub fn remove_father(&self, node: &Arc<N>, father: &Arc<N>) -> Result<()> {
        let node_id = self.node_graph_id(node)?;
        let father_id = self.node_graph_id(father)?;
        self.write()?.remove_father(node_id, father_id)?;
        Ok(())
    }

    /// Unlink every father of `node`, returning them.
    pub fn remove_fathers(&self, node: &Arc<N>) -> Result<Vec<Arc<N>>> {
        let id = self.node_graph_id(node)?;
        let former = self.write()?.remove_fathers(id)?;
        Ok(self.nodes_from_graph_ids(&former))
    }

    pub fn sons(&self, node: &Arc<N>) -> Result<Vec<Arc<N>>> {
        self.query_nodes(node, |g, id| g.sons(id))
    }

    pub fn number_of_sons(&self, node: &Arc<N>) -> Result<usize> {
        let id = self.node_graph_id(node)?;
        self.read()?.number_of_sons(id)
    }

    pub fn remove_son(&self, node: &Arc<N>, son: &Arc<N>) -> Result<()> {
        let node_id = self.node_graph_id(node)?;
        let son_id = self.node_graph_id(son)?;
        self.write()?.remove_son(node_id, son_id)?;
        Ok(())
    }

    pub fn remove_sons(&self, node: &Arc<N>) -> Result<Vec<Arc<N>>> {
        let id = self.node_graph_id(node)?;
        let former = self.write()?.remove_sons(id)?;
        Ok(self.nodes_from_graph_ids(&former))
    }

    /// `node` and everything reachable below it, each once.
    pub fn below_nodes(&self, node: &Arc<N>) -> Result<Vec<Arc<N>>> {
        self.query_nodes(node, |g, id| g.below_nodes(id))
    }

    pub fn below_edges(&self, node: &Arc<N>) -> Result<Vec<Arc<E>>> {
        self.query_edges(node, |g, id| g.below_edges(id))
    }

    pub fn leaves_under_node(&self, node: &Arc<N>) -> Result<Vec<Arc<N>>> {
        self.query_nodes(node, |g, id| g.leaves_under_node(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AssociationDagGraph;

    fn named(names: &[&str]) -> Vec<Arc<String>> {
        names.iter().map(|n| Arc::new(n.to_string())).collect()
    }

    #[test]
    fn test_add_father_binds_fresh_edge() {
        let dag: AssociationDagGraph<String, u32> = AssociationDagGraph::new(true);
        let n = named(&["r", "a"]);
        dag.create_node(&n[0]).unwrap();
        dag.create_node(&n[1]).unwrap();
        let edge = Arc::new(1);
        dag.add_father(&n[1], &n[0], Some(&edge)).unwrap();

        assert!(dag.has_edge(&edge));
        assert_eq!(dag.fathers(&n[1]).unwrap(), vec![Arc::clone(&n[0])]);
        assert!(dag.is_valid().unwrap());
    }

    #[test]
    fn test_add_father_relinks_bound_edge() {
        let dag: AssociationDagGraph<String, u32> = AssociationDagGraph::new(true);
        let n = named(&["r", "a", "b"]);
        for node in &n {
            dag.create_node(node).unwrap();
        }
        let edge = Arc::new(1);
        dag.link(&n[0], &n[1], Some(&edge)).unwrap();
        let id = dag.edge_graph_id(&edge).unwrap();

        // unlinking releases the payload, so rebind it to a dangling id first
        dag.remove_son(&n[0], &n[1]).unwrap();
        assert!(!dag.has_edge(&edge));
        dag.associate_edge(&edge, id).unwrap();
        dag.add_son(&n[0], &n[2], Some(&edge)).unwrap();

        assert_eq!(dag.edge_graph_id(&edge).unwrap(), id);
        assert_eq!(dag.edge_linking(&n[0], &n[2]).unwrap(), Some(edge));
    }

    #[test]
    fn test_remove_sons_returns_payloads() {
        let dag: AssociationDagGraph<String, u32> = AssociationDagGraph::new(true);
        let n = named(&["r", "a", "b"]);
        dag.create_node(&n[0]).unwrap();
        dag.create_node_from(&n[0], &n[1], None).unwrap();
        dag.create_node_from(&n[0], &n[2], None).unwrap();

        let former = dag.remove_sons(&n[0]).unwrap();
        assert_eq!(former.len(), 2);
        assert_eq!(dag.number_of_sons(&n[0]).unwrap(), 0);
        assert!(!dag.is_valid().unwrap());
    }
}
