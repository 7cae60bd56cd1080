//! # Substrate Graph and Capability Traits
//!
//! `Graph` is the one concrete substrate. `DagGraph` and `TreeGraph` wrap
//! it with cached validity and their own structural rules. Everything above
//! the substrate talks to it through three traits:
//!
//! | Trait | Adds |
//! |-------|------|
//! | `MutableGraph` | Substrate access, mutations that report structure changes |
//! | `DirectedGraphOps` | Fathers/sons, validity and rootedness caches, re-rooting |
//! | `TreeOps` | Single father, MRCA, paths, unrooting, outgroups |

pub mod global;
pub mod observer;
pub mod dag;
pub mod tree;

pub use global::Graph;
pub use observer::GraphObserver;
pub use dag::{DagGraph, DirectedGraphOps, ValidityCache};
pub use tree::{TreeGraph, TreeOps};

use crate::model::{EdgeId, NodeId};
use crate::Result;

// ============================================================================
// MutableGraph Trait
// ============================================================================

/// A type that owns a substrate graph.
///
/// Read queries go through `substrate()`. Mutations should go through the
/// provided methods, which call `structure_changed` so that wrappers can
/// drop their caches. Mutating through `substrate_mut()` directly skips
/// that hook.
pub trait MutableGraph {
    /// Wrap an existing substrate.
    fn from_substrate(graph: Graph) -> Self
    where
        Self: Sized;

    fn substrate(&self) -> &Graph;

    fn substrate_mut(&mut self) -> &mut Graph;

    /// Called after every structural mutation made through this trait.
    fn structure_changed(&self) {}

    fn create_node(&mut self) -> NodeId {
        let node = self.substrate_mut().create_node();
        self.structure_changed();
        node
    }

    fn link(&mut self, tail: NodeId, head: NodeId) -> Result<EdgeId> {
        let edge = self.substrate_mut().link(tail, head)?;
        self.structure_changed();
        Ok(edge)
    }

    fn link_with(&mut self, tail: NodeId, head: NodeId, edge: EdgeId) -> Result<()> {
        self.substrate_mut().link_with(tail, head, edge)?;
        self.structure_changed();
        Ok(())
    }

    fn unlink(&mut self, tail: NodeId, head: NodeId) -> Result<EdgeId> {
        let edge = self.substrate_mut().unlink(tail, head)?;
        self.structure_changed();
        Ok(edge)
    }

    fn delete_node(&mut self, node: NodeId) -> Result<()> {
        self.substrate_mut().delete_node(node)?;
        self.structure_changed();
        Ok(())
    }

    fn switch_nodes(&mut self, a: NodeId, b: NodeId) -> Result<()> {
        self.substrate_mut().switch_nodes(a, b)?;
        self.structure_changed();
        Ok(())
    }

    fn set_root(&mut self, node: NodeId) -> Result<()> {
        self.substrate_mut().set_root(node)?;
        self.structure_changed();
        Ok(())
    }

    fn make_directed(&mut self) {
        self.substrate_mut().make_directed();
        self.structure_changed();
    }

    fn make_undirected(&mut self) -> Result<()> {
        self.substrate_mut().make_undirected()?;
        self.structure_changed();
        Ok(())
    }

    fn orientate(&mut self) -> Result<()> {
        self.substrate_mut().orientate()?;
        self.structure_changed();
        Ok(())
    }
}

impl MutableGraph for Graph {
    fn from_substrate(graph: Graph) -> Self {
        graph
    }

    fn substrate(&self) -> &Graph {
        self
    }

    fn substrate_mut(&mut self) -> &mut Graph {
        self
    }
}
