//! End-to-end tests for the association layer: payload bindings, dense
//! indexes, iterators and copies.

use std::sync::Arc;

use pretty_assertions::assert_eq;

use assoc_graph::{AssociationDagGraph, AssociationGraph, Error, GraphConfig, NodeId};

fn names(list: &[&str]) -> Vec<Arc<String>> {
    list.iter().map(|n| Arc::new(n.to_string())).collect()
}

// ============================================================================
// 1. Basic scenario
// ============================================================================

#[test]
fn test_basic_scenario() {
    let graph: AssociationDagGraph<String, String> = AssociationDagGraph::new(true);
    let n = names(&["zero", "one", "two", "three"]);
    let [zero, one, two, three] = [&n[0], &n[1], &n[2], &n[3]];

    graph.create_node(zero).unwrap();
    graph.create_node_from(zero, one, None).unwrap();
    graph.create_node_from(one, two, None).unwrap();
    graph.create_node_from(one, three, None).unwrap();
    graph.link(two, zero, Some(&Arc::new("two-zero".to_string()))).unwrap();
    graph.link(three, zero, None).unwrap();

    assert!(graph.outgoing_neighbors(zero).unwrap().contains(one));
    assert!(graph.outgoing_neighbors(two).unwrap().contains(zero));
    assert!(!graph.is_valid().unwrap());

    graph.unlink(two, zero).unwrap();
    graph.unlink(three, zero).unwrap();
    assert!(graph.is_valid().unwrap());
    assert_eq!(graph.number_of_edges(), 0);

    graph.link(three, two, None).unwrap();
    assert!(graph.is_valid().unwrap());
    assert_eq!(graph.incoming_neighbors(two).unwrap(), vec![Arc::clone(one), Arc::clone(three)]);
}

// ============================================================================
// 2. Bindings
// ============================================================================

#[test]
fn test_round_trip_until_dissociated() {
    let graph: AssociationGraph<String, u8> = AssociationGraph::new(false);
    let node = Arc::new("payload".to_string());
    graph.create_node(&node).unwrap();

    let id = graph.node_graph_id(&node).unwrap();
    assert!(Arc::ptr_eq(&graph.node_from_graph_id(id).unwrap(), &node));

    assert_eq!(graph.dissociate_node(&node).unwrap(), id);
    assert_eq!(graph.node_from_graph_id(id), None);
    assert!(matches!(graph.node_graph_id(&node), Err(Error::PayloadNotBound(_))));
    assert!(matches!(graph.dissociate_node(&node), Err(Error::PayloadNotBound(_))));
}

#[test]
fn test_equal_values_are_distinct_payloads() {
    let graph: AssociationGraph<String, u8> = AssociationGraph::new(false);
    let first = Arc::new("same".to_string());
    let second = Arc::new("same".to_string());
    graph.create_node(&first).unwrap();

    assert!(graph.has_node(&first));
    assert!(!graph.has_node(&second));
    assert!(matches!(graph.create_node(&first), Err(Error::AlreadyBound(_))));
    graph.create_node(&second).unwrap();
    assert_eq!(graph.number_of_nodes(), 2);
}

#[test]
fn test_bound_edge_cannot_link_twice() {
    let graph: AssociationGraph<String, u8> = AssociationGraph::new(true);
    let n = names(&["a", "b", "c"]);
    for node in &n {
        graph.create_node(node).unwrap();
    }
    let edge = Arc::new(1);
    graph.link(&n[0], &n[1], Some(&edge)).unwrap();

    assert!(matches!(graph.link(&n[1], &n[2], Some(&edge)), Err(Error::EdgeInUse(_))));
    assert!(matches!(
        graph.create_node_from(&n[0], &Arc::new("d".to_string()), Some(&edge)),
        Err(Error::EdgeInUse(_))
    ));
    assert_eq!(graph.number_of_nodes(), 3);
    assert_eq!(graph.edge_linking(&n[0], &n[1]).unwrap(), Some(edge));
    assert!(matches!(graph.edge_linking(&n[1], &n[2]), Err(Error::EdgeNotFound(_))));
}

#[test]
fn test_set_edge_linking_binds_anonymous_edge() {
    let graph: AssociationGraph<String, u8> = AssociationGraph::new(true);
    let n = names(&["a", "b"]);
    graph.create_node(&n[0]).unwrap();
    graph.create_node_from(&n[0], &n[1], None).unwrap();
    assert_eq!(graph.edge_linking(&n[0], &n[1]).unwrap(), None);
    assert!(graph.outgoing_edges(&n[0]).unwrap().is_empty());

    let edge = Arc::new(9);
    graph.set_edge_linking(&n[0], &n[1], &edge).unwrap();
    let (top, bottom) = graph.endpoints(&edge).unwrap();
    assert!(Arc::ptr_eq(&top, &n[0]));
    assert!(Arc::ptr_eq(&bottom, &n[1]));
    assert!(Arc::ptr_eq(&graph.top(&edge).unwrap(), &n[0]));
}

#[test]
fn test_root_follows_auto_root_and_deletion() {
    let graph: AssociationGraph<String, u8> = AssociationGraph::new(true);
    let n = names(&["first", "second"]);
    graph.create_node(&n[0]).unwrap();
    graph.create_node(&n[1]).unwrap();
    assert!(Arc::ptr_eq(&graph.root().unwrap(), &n[0]));

    graph.set_root(&n[1]).unwrap();
    graph.delete_node(&n[1]).unwrap();
    assert!(matches!(graph.root(), Err(Error::NodeNotFound(_))));

    let manual: AssociationGraph<String, u8> =
        AssociationGraph::with_config(GraphConfig { directed: true, auto_root: false });
    manual.create_node(&n[0]).unwrap();
    assert!(manual.root().is_err());
}

// ============================================================================
// 3. Dense indexes
// ============================================================================

#[test]
fn test_indexes_keep_holes() {
    let graph: AssociationGraph<String, u8> = AssociationGraph::new(false);
    let n = names(&["a", "b", "c", "d"]);
    for node in &n[..3] {
        graph.create_node(node).unwrap();
        graph.add_node_index(node).unwrap();
    }
    assert_eq!(graph.node_indexes(&n[..3]).unwrap(), vec![0, 1, 2]);

    graph.delete_node(&n[1]).unwrap();
    assert!(matches!(graph.node_at_index(1), Err(Error::PayloadNotBound(_))));
    assert!(Arc::ptr_eq(&graph.node_at_index(2).unwrap(), &n[2]));

    graph.create_node(&n[3]).unwrap();
    assert_eq!(graph.add_node_index(&n[3]).unwrap(), 1);
}

#[test]
fn test_index_requires_bound_payload() {
    let graph: AssociationGraph<String, u8> = AssociationGraph::new(false);
    let stray = Arc::new("stray".to_string());
    assert!(matches!(graph.add_node_index(&stray), Err(Error::PayloadNotBound(_))));
    assert!(matches!(graph.set_node_index(&stray, 3), Err(Error::PayloadNotBound(_))));
    assert!(!graph.has_node_index(&stray));

    let node = Arc::new("node".to_string());
    graph.create_node(&node).unwrap();
    graph.set_node_index(&node, 3).unwrap();
    assert_eq!(graph.node_index(&node).unwrap(), 3);
    assert!(matches!(graph.set_node_index(&node, 4), Err(Error::AlreadyBound(_))));
}

#[test]
fn test_largest_index_is_usable() {
    let graph: AssociationGraph<String, u8> = AssociationGraph::new(false);
    let far = Arc::new("far".to_string());
    let near = Arc::new("near".to_string());
    graph.create_node(&far).unwrap();
    graph.create_node(&near).unwrap();

    graph.set_node_index(&far, usize::MAX).unwrap();
    assert!(Arc::ptr_eq(&graph.node_at_index(usize::MAX).unwrap(), &far));
    assert_eq!(graph.add_node_index(&near).unwrap(), 0);

    graph.delete_node(&far).unwrap();
    assert!(graph.node_at_index(usize::MAX).is_err());
}

#[test]
fn test_edge_indexes_cleared_by_unlink() {
    let graph: AssociationGraph<String, u8> = AssociationGraph::new(true);
    let n = names(&["a", "b"]);
    let edge = Arc::new(5);
    graph.create_node(&n[0]).unwrap();
    graph.create_node_from(&n[0], &n[1], Some(&edge)).unwrap();
    graph.set_edge_index(&edge, 0).unwrap();
    assert!(Arc::ptr_eq(&graph.edge_at_index(0).unwrap(), &edge));

    graph.unlink(&n[0], &n[1]).unwrap();
    assert!(!graph.has_edge_index(&edge));
    assert!(graph.edge_at_index(0).is_err());
}

// ============================================================================
// 4. Traversal and iterators
// ============================================================================

#[test]
fn test_queries_skip_anonymous_ids() {
    let graph: AssociationGraph<String, u8> = AssociationGraph::new(true);
    let n = names(&["hub", "named"]);
    graph.create_node(&n[0]).unwrap();
    graph.create_node_from(&n[0], &n[1], None).unwrap();
    let anonymous = graph.shared_graph().write().create_node();
    graph.shared_graph().write().link(graph.node_graph_id(&n[0]).unwrap(), anonymous).unwrap();

    assert_eq!(graph.outgoing_neighbors(&n[0]).unwrap(), vec![Arc::clone(&n[1])]);
    assert_eq!(graph.all_nodes().unwrap().len(), 2);
    assert_eq!(graph.degree(&n[0]).unwrap(), 2);
    assert_eq!(graph.nodes_iter().unwrap().count(), 2);
    assert_eq!(graph.nodes_from_graph_ids(&[anonymous, NodeId(77)]), Vec::new());
}

#[test]
fn test_iterators_resolve_lazily() {
    let graph: AssociationGraph<String, u8> = AssociationGraph::new(true);
    let n = names(&["a", "b", "c"]);
    graph.create_node(&n[0]).unwrap();
    graph.create_node_from(&n[0], &n[1], Some(&Arc::new(1))).unwrap();
    graph.create_node_from(&n[0], &n[2], Some(&Arc::new(2))).unwrap();

    let mut sons = graph.outgoing_neighbors_iter(&n[0]).unwrap();
    assert!(Arc::ptr_eq(&sons.next().unwrap(), &n[1]));
    graph.delete_node(&n[2]).unwrap();
    assert_eq!(sons.next(), None);

    let weights: Vec<u8> = graph.outgoing_edges_iter(&n[0]).unwrap().map(|e| *e).collect();
    assert_eq!(weights, vec![1]);
    assert_eq!(graph.incoming_edges_iter(&n[1]).unwrap().count(), 1);
    assert_eq!(graph.incoming_neighbors_iter(&n[1]).unwrap().count(), 1);
    assert_eq!(graph.edges_iter().unwrap().count(), 1);
}

#[test]
fn test_leaves_and_inner_nodes() {
    let graph: AssociationGraph<String, u8> = AssociationGraph::new(true);
    let n = names(&["r", "a", "b", "c", "d"]);
    graph.create_node(&n[0]).unwrap();
    graph.create_node_from(&n[0], &n[1], None).unwrap();
    graph.create_node_from(&n[1], &n[2], None).unwrap();
    graph.create_node_from(&n[1], &n[3], None).unwrap();
    graph.create_node_from(&n[0], &n[4], None).unwrap();

    assert_eq!(
        graph.all_leaves().unwrap(),
        vec![Arc::clone(&n[2]), Arc::clone(&n[3]), Arc::clone(&n[4])]
    );
    assert_eq!(graph.number_of_leaves().unwrap(), 3);
    assert_eq!(graph.all_inner_nodes().unwrap(), vec![Arc::clone(&n[0]), Arc::clone(&n[1])]);
    assert!(graph.is_leaf(&n[3]).unwrap());
    assert_eq!(graph.leaves_from_node(&n[0], None).unwrap().len(), 3);
    assert_eq!(graph.leaves_from_node(&n[0], Some(1)).unwrap(), vec![Arc::clone(&n[4])]);
    assert!(graph.leaves_from_node(&n[0], Some(0)).unwrap().is_empty());
}

// ============================================================================
// 5. Direction and copies
// ============================================================================

#[test]
fn test_make_undirected_then_directed() {
    let graph: AssociationGraph<String, u8> = AssociationGraph::new(true);
    let n = names(&["a", "b"]);
    graph.create_node(&n[0]).unwrap();
    graph.create_node_from(&n[0], &n[1], None).unwrap();

    graph.make_undirected().unwrap();
    assert!(!graph.is_directed().unwrap());
    assert_eq!(graph.neighbors(&n[1]).unwrap(), vec![Arc::clone(&n[0])]);

    graph.make_directed().unwrap();
    assert!(graph.is_directed().unwrap());
    assert!(graph.incoming_neighbors(&n[0]).unwrap().is_empty());

    graph.link(&n[1], &n[0], None).unwrap();
    assert!(matches!(graph.make_undirected(), Err(Error::StructuralContradiction(_))));
}

#[test]
fn test_deep_copy_is_independent() {
    let graph: AssociationGraph<String, u8> = AssociationGraph::new(true);
    let n = names(&["a", "b"]);
    graph.create_node(&n[0]).unwrap();
    graph.create_node_from(&n[0], &n[1], Some(&Arc::new(4))).unwrap();
    graph.add_node_index(&n[1]).unwrap();

    let copy = graph.deep_copy().unwrap();
    let copied_b = copy.node_at_index(0).unwrap();
    assert_eq!(*copied_b, "b");
    assert!(!Arc::ptr_eq(&copied_b, &n[1]));
    assert!(!copy.has_node(&n[1]));

    copy.delete_node(&copied_b).unwrap();
    assert_eq!(copy.number_of_nodes(), 1);
    assert_eq!(graph.number_of_nodes(), 2);
    assert_eq!(graph.number_of_edges(), 1);
}

#[test]
fn test_map_payloads_converts_types() {
    let graph: AssociationGraph<String, u8> = AssociationGraph::new(false);
    let n = names(&["ab", "cde"]);
    graph.create_node(&n[0]).unwrap();
    graph.create_node_from(&n[0], &n[1], Some(&Arc::new(7))).unwrap();

    let lengths = graph.map_payloads(|s| s.len(), |w| f64::from(*w)).unwrap();
    let mut sizes: Vec<usize> = lengths.all_nodes().unwrap().iter().map(|n| **n).collect();
    sizes.sort();
    assert_eq!(sizes, vec![2, 3]);
    assert_eq!(lengths.all_edges().unwrap(), vec![Arc::new(7.0)]);
}
