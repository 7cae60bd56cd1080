//! Node identifier in the substrate graph.

use serde::{Deserialize, Serialize};

/// Opaque node identifier.
///
/// Assigned from a per-graph counter and never reused after deletion.
/// Meaningless outside the graph instance that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
