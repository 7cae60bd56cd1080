//! Substrate configuration.

use serde::{Deserialize, Serialize};

/// How a fresh substrate graph behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Directed graphs keep separate outgoing and incoming adjacency.
    pub directed: bool,
    /// The first node created while no root is set becomes the root.
    pub auto_root: bool,
}

impl GraphConfig {
    pub fn directed() -> Self {
        Self { directed: true, ..Self::default() }
    }

    pub fn undirected() -> Self {
        Self { directed: false, ..Self::default() }
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self { directed: false, auto_root: true }
    }
}
