//! # assoc-graph: Observer-Based Graph, DAG and Tree Layers
//!
//! A mutable multigraph substrate that knows nothing but integer ids, and
//! typed association layers that bind client payloads onto those ids and
//! stay consistent with every structural change through synchronous
//! observer notifications.
//!
//! ## Design Principles
//!
//! 1. **Substrate owns structure**: `Graph` stores adjacency only, no payload
//! 2. **Observers own meaning**: `AssociationGraph` maps `Arc<N>` / `Arc<E>`
//!    payloads to substrate ids and learns about removals only through
//!    `GraphObserver` notifications
//! 3. **Capabilities, not inheritance**: DAG and tree semantics are the
//!    `DirectedGraphOps` and `TreeOps` traits layered on `MutableGraph`
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use assoc_graph::AssociationTreeGraph;
//!
//! # fn example() -> assoc_graph::Result<()> {
//! let tree: AssociationTreeGraph<String, f64> = AssociationTreeGraph::new(true);
//!
//! let root = Arc::new("root".to_string());
//! let left = Arc::new("left".to_string());
//! let right = Arc::new("right".to_string());
//!
//! tree.create_node(&root)?;
//! tree.create_node_from(&root, &left, Some(&Arc::new(0.1)))?;
//! tree.create_node_from(&root, &right, Some(&Arc::new(0.2)))?;
//!
//! assert!(tree.is_valid()?);
//! assert!(Arc::ptr_eq(&tree.mrca(&[left, right])?, &root));
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```
//!
//! ## Layers
//!
//! | Layer | Type | Description |
//! |-------|------|-------------|
//! | Substrate | `Graph` | Integer ids, adjacency, observer list |
//! | DAG | `DagGraph` | Cached validity / rootedness, re-rooting |
//! | Tree | `TreeGraph` | Single father, MRCA, paths, outgroups |
//! | Association | `AssociationGraph<N, E, G>` | Payload ↔ id and payload ↔ index |

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod config;
pub mod graph;
pub mod association;
pub mod export;

// ============================================================================
// Re-exports: Model
// ============================================================================

pub use model::{NodeId, EdgeId, Direction};

// ============================================================================
// Re-exports: Substrate and capability traits
// ============================================================================

pub use config::GraphConfig;
pub use graph::{
    Graph, GraphObserver, MutableGraph,
    DagGraph, DirectedGraphOps, ValidityCache,
    TreeGraph, TreeOps,
};

// ============================================================================
// Re-exports: Association layer
// ============================================================================

pub use association::{
    AssociationGraph, AssociationDagGraph, AssociationTreeGraph,
    SharedGraph, NodeIter, EdgeIter, PayloadIter,
};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Edge not found: {0}")]
    EdgeNotFound(String),

    #[error("Payload not bound: {0}")]
    PayloadNotBound(String),

    #[error("Already bound: {0}")]
    AlreadyBound(String),

    #[error("Edge already in use: {0}")]
    EdgeInUse(String),

    #[error("Precondition violation: {0}")]
    Precondition(String),

    #[error("No father: {0}")]
    NoFather(String),

    #[error("Ambiguous father: {0}")]
    AmbiguousFather(String),

    #[error("Structural contradiction: {0}")]
    StructuralContradiction(String),

    #[error("Observer error: {0}")]
    ObserverError(String),

    #[error("Graph busy: {0}")]
    GraphBusy(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
