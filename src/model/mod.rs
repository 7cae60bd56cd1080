//! # Graph Model
//!
//! Identifier types shared by the substrate and every layer above it.
//! These types are pure data: no I/O, no state, no locking.

pub mod node;
pub mod edge;

pub use node::NodeId;
pub use edge::{EdgeId, Direction};
