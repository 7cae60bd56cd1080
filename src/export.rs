//! Graphviz DOT export of an association layer.
//!
//! Only substrate nodes bound to a payload are drawn, and every edge
//! between two of them becomes one line. Node names combine the payload's
//! dense index (empty when it has none) with the substrate id. Edges
//! carrying a payload are labelled the same way, the others are dotted.
//!
//! ```text
//! digraph tree {
//!     n0_0 -> n1_1 [label = e0_0];
//!     n0_0 -> n_2 [style = dotted];
//! }
//! ```

use std::collections::BTreeSet;
use std::io::Write;

use crate::association::AssociationGraph;
use crate::association::bindings::BindingMaps;
use crate::graph::MutableGraph;
use crate::model::NodeId;
use crate::Result;

/// Write the graph observed by `graph` as a DOT document named `name`.
pub fn output_to_dot<N, E, G>(
    graph: &AssociationGraph<N, E, G>,
    writer: &mut dyn Write,
    name: &str,
) -> Result<()>
where
    N: 'static,
    E: 'static,
    G: MutableGraph + 'static,
{
    let guard = graph.read()?;
    let substrate = guard.substrate();
    let maps = graph.maps();
    let (kind, arrow) = if substrate.is_directed() { ("digraph", "->") } else { ("graph", "--") };

    writeln!(writer, "{kind} {name} {{")?;
    let mut drawn = BTreeSet::new();
    for (node, _) in maps.nodes.iter() {
        for (other, edge) in substrate.outgoing_links(node)? {
            if maps.nodes.payload_of(other).is_none() {
                continue;
            }
            // undirected edges show up at both ends
            if !drawn.insert(edge) {
                continue;
            }
            let attributes = match maps.edges.payload_of(edge) {
                Some(payload) => {
                    format!("[label = e{}_{edge}]", index_text(maps.edge_indexes.index_of(payload)))
                }
                None => "[style = dotted]".to_string(),
            };
            writeln!(
                writer,
                "    {} {arrow} {} {attributes};",
                node_name(&maps, node),
                node_name(&maps, other)
            )?;
        }
    }
    writeln!(writer, "}}")?;
    Ok(())
}

fn node_name<N, E>(maps: &BindingMaps<N, E>, node: NodeId) -> String {
    let index = maps.nodes.payload_of(node).and_then(|p| maps.node_indexes.index_of(p));
    format!("n{}_{node}", index_text(index))
}

fn index_text(index: Option<usize>) -> String {
    index.map(|i| i.to_string()).unwrap_or_default()
}
