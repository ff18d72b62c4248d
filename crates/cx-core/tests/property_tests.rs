//! # Property-Based Tests
//!
//! Verification tests using proptest.
//!
//! These tests ensure determinism, round-trip fidelity, and the
//! reference-count invariant of the annotation registry.

use cx_core::{AttrValue, CxGraph, EdgeId, NodeId, PropertyBag};
use proptest::collection::vec;
use proptest::prelude::*;
use serde_json::json;
use std::collections::BTreeSet;

fn attr_value() -> impl Strategy<Value = AttrValue> {
    prop_oneof![
        any::<bool>().prop_map(AttrValue::Bool),
        any::<i64>().prop_map(AttrValue::Integer),
        (-1.0e6f64..1.0e6).prop_map(AttrValue::Double),
        "[a-z]{1,12}".prop_map(AttrValue::Str),
        vec(any::<i64>(), 1..5).prop_map(AttrValue::IntegerList),
        vec("[a-z]{1,8}", 1..5).prop_map(AttrValue::StrList),
    ]
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// Adding N nodes with no explicit id to an empty graph yields ids 1..N
    /// in insertion order.
    #[test]
    fn minted_ids_are_sequential(count in 1usize..60) {
        let mut graph = CxGraph::new();
        for expected in 1..=count {
            let id = graph.add_node(None, None, None);
            prop_assert_eq!(id, NodeId(expected as i64));
        }
        prop_assert_eq!(graph.node_count(), count);
    }

    /// Serializing the same graph twice produces identical byte buffers.
    #[test]
    fn serialization_is_deterministic(names in vec("[a-z]{1,10}", 1..20)) {
        let mut graph = CxGraph::new();
        let mut previous = None;
        for name in &names {
            let node = graph.add_node(None, Some(name), None);
            if let Some(prev) = previous {
                graph.add_edge(prev, node, None, None).expect("edge");
            }
            previous = Some(node);
        }

        let first = graph.to_cx_bytes().expect("serialize");
        let second = graph.to_cx_bytes().expect("serialize");
        prop_assert_eq!(first, second);
    }

    /// A graph built through the public API survives a parse/serialize
    /// cycle with identical node set, edge set, and attribute values.
    #[test]
    fn roundtrip_preserves_graph(
        node_count in 2usize..15,
        edge_pairs in vec((0usize..15, 0usize..15), 0..25),
        value in attr_value()
    ) {
        let mut graph = CxGraph::new();
        let nodes: Vec<NodeId> = (0..node_count)
            .map(|i| graph.add_node(None, Some(&format!("n{i}")), None))
            .collect();
        for (s, t) in &edge_pairs {
            let source = nodes[s % node_count];
            let target = nodes[t % node_count];
            graph.add_edge(source, target, None, Some("binds")).expect("edge");
        }
        graph
            .set_node_attribute(nodes[0], "payload", value.clone(), None)
            .expect("set");

        let bytes = graph.to_cx_bytes().expect("serialize");
        let reparsed = CxGraph::from_cx(&bytes).expect("parse");

        let original_nodes: BTreeSet<NodeId> = graph.nodes().map(|(id, _)| id).collect();
        let reparsed_nodes: BTreeSet<NodeId> = reparsed.nodes().map(|(id, _)| id).collect();
        prop_assert_eq!(original_nodes, reparsed_nodes);

        for (id, record) in graph.edges() {
            let endpoints = reparsed.edge_endpoints(id);
            prop_assert_eq!(endpoints, Some((record.source, record.target)));
        }
        prop_assert_eq!(graph.edge_count(), reparsed.edge_count());
        prop_assert_eq!(
            reparsed.node_attribute(nodes[0], "payload").expect("node"),
            Some(&value)
        );
    }

    /// Multiple edges between the same ordered pair persist independently
    /// and are independently removable.
    #[test]
    fn parallel_edges_are_independent(edge_count in 2usize..10) {
        let mut graph = CxGraph::new();
        let a = graph.add_node(None, None, None);
        let b = graph.add_node(None, None, None);

        let ids: Vec<EdgeId> = (0..edge_count)
            .map(|_| graph.add_edge(a, b, None, None).expect("edge"))
            .collect();
        prop_assert_eq!(graph.edges_between(a, b).len(), edge_count);

        for (i, id) in ids.iter().enumerate() {
            graph.remove_edge(*id).expect("remove");
            prop_assert_eq!(graph.edges_between(a, b).len(), edge_count - i - 1);
        }
    }

    /// Reference counts always equal the number of entities currently
    /// listing a record, and the record disappears at zero.
    #[test]
    fn reference_count_matches_referencers(referencing in vec(any::<bool>(), 1..12)) {
        let mut graph = CxGraph::new();
        let nodes: Vec<NodeId> = referencing
            .iter()
            .map(|_| graph.add_node(None, None, None))
            .collect();

        let mut bag = PropertyBag::new();
        bag.insert("dc:title".to_string(), json!("shared"));
        let citation = graph.add_citation(bag);

        let referencers: Vec<NodeId> = nodes
            .iter()
            .zip(&referencing)
            .filter(|(_, refs)| **refs)
            .map(|(node, _)| *node)
            .collect();
        for node in &referencers {
            graph.add_node_citation(*node, citation).expect("cite");
        }
        prop_assert_eq!(
            graph.annotations().citation_ref_count(citation),
            Some(referencers.len() as u64)
        );

        for node in &referencers {
            graph.remove_node(*node).expect("remove");
        }
        if referencers.is_empty() {
            // Never referenced: the record persists.
            prop_assert!(graph.annotations().citation(citation).is_some());
        } else {
            prop_assert!(graph.annotations().citation(citation).is_none());
        }
    }

    /// Removing a node never leaves its edges behind in the id index.
    #[test]
    fn node_removal_leaves_no_dangling_edges(
        node_count in 2usize..10,
        edge_pairs in vec((0usize..10, 0usize..10), 1..20),
        victim in 0usize..10
    ) {
        let mut graph = CxGraph::new();
        let nodes: Vec<NodeId> = (0..node_count)
            .map(|_| graph.add_node(None, None, None))
            .collect();
        for (s, t) in &edge_pairs {
            graph
                .add_edge(nodes[s % node_count], nodes[t % node_count], None, None)
                .expect("edge");
        }

        let victim = nodes[victim % node_count];
        graph.remove_node(victim).expect("remove");

        for (_, record) in graph.edges() {
            prop_assert_ne!(record.source, victim);
            prop_assert_ne!(record.target, victim);
        }
    }
}
