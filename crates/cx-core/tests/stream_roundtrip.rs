//! # Stream Round-Trip Tests
//!
//! End-to-end tests over a realistic CX document: parse, inspect, mutate,
//! and serialize, asserting the behaviors a downstream toolchain relies on.

use cx_core::{AttrValue, CitationId, CxError, CxGraph, EdgeId, Fragment, NodeId, aspect};
use serde_json::{Value, json};

/// A small signaling network in the shape real exports have: shuffled
/// fragment order, tagged and untagged attributes, annotations, a
/// subnetwork/view pair, and a visual-properties aspect the model passes
/// through.
fn signaling_network() -> Vec<u8> {
    let doc = json!([
        {"numberVerification": [{"longNumber": 281_474_976_710_655i64}]},
        {"metaData": [
            {"name": "nodes", "elementCount": 3, "idCounter": 3, "consistencyGroup": 2},
            {"name": "edges", "elementCount": 3, "idCounter": 12, "consistencyGroup": 2},
        ]},
        {"@context": [{"hgnc": "https://identifiers.org/hgnc/", "uniprot": "https://identifiers.org/uniprot/"}]},
        {"subNetworks": [{"@id": 100}]},
        {"cyViews": [{"@id": 200, "s": 100}]},
        {"edges": [
            {"@id": 10, "s": 1, "t": 2, "i": "phosphorylates"},
            {"@id": 11, "s": 1, "t": 2, "i": "binds"},
            {"@id": 12, "s": 2, "t": 3}
        ]},
        {"nodes": [
            {"@id": 1, "n": "TP53", "r": "hgnc:11998"},
            {"@id": 2, "n": "MDM2", "r": "hgnc:6973"},
            {"@id": 3, "n": "CDKN1A"}
        ]},
        {"networkAttributes": [
            {"n": "name", "v": "p53 signaling"},
            {"n": "version", "v": "2", "d": "integer"}
        ]},
        {"nodeAttributes": [
            {"po": 1, "n": "degree", "v": "2", "d": "integer"},
            {"po": 1, "n": "aliases", "v": "[p53,LFS1]", "d": "list_of_string"},
            {"po": 2, "n": "essential", "v": "true", "d": "boolean"}
        ]},
        {"edgeAttributes": [
            {"po": 10, "n": "confidence", "v": "0.93", "d": "double"},
            {"po": 10, "n": "confidence", "v": "0.5", "d": "double", "s": 100}
        ]},
        {"cartesianLayout": [
            {"node": 1, "view": 200, "x": 10.0, "y": 20.0},
            {"node": 2, "view": 200, "x": 30.0, "y": 40.0}
        ]},
        {"citations": [
            {"@id": 1, "dc:title": "Mdm2 promotes the rapid degradation of p53", "dc:identifier": "pmid:9153395"}
        ]},
        {"nodeCitations": [{"po": [1, 2], "citations": [1]}]},
        {"edgeCitations": [{"po": [10], "citations": [1]}]},
        {"supports": [{"@id": 1, "text": "figure 2b"}]},
        {"edgeSupports": [{"po": [10], "supports": [1]}]},
        {"cyVisualProperties": [{"properties_of": "nodes:default", "properties": {"NODE_FILL_COLOR": "#CCCCCC"}}]},
        {"status": [{"error": "", "success": true}]}
    ]);
    serde_json::to_vec(&doc).expect("encode")
}

fn fragment<'a>(cx: &'a [Fragment], name: &str) -> Option<&'a Vec<Value>> {
    cx.iter().find(|f| f.is(name)).and_then(Fragment::elements)
}

#[test]
fn parse_classifies_every_aspect() {
    let graph = CxGraph::from_cx(&signaling_network()).expect("parse");

    assert_eq!(graph.node_count(), 3);
    assert_eq!(graph.edge_count(), 3);
    assert_eq!(graph.name(), Some("p53 signaling"));
    assert_eq!(graph.network_attribute("version"), Some(&AttrValue::Integer(2)));
    assert_eq!(graph.subnetwork_id(), Some(100));
    assert_eq!(graph.view_id(), Some(200));
    assert_eq!(graph.position(NodeId(1)), Some((10.0, 20.0)));
    assert!(graph.namespaces().is_some());

    // Both parallel edges between TP53 and MDM2 survive.
    assert_eq!(
        graph.edges_between(NodeId(1), NodeId(2)),
        vec![EdgeId(10), EdgeId(11)]
    );

    // Typed attribute decoding.
    assert_eq!(
        graph.node_attribute(NodeId(1), "degree").expect("node"),
        Some(&AttrValue::Integer(2))
    );
    assert_eq!(
        graph.node_attribute(NodeId(1), "aliases").expect("node"),
        Some(&AttrValue::StrList(vec!["p53".to_string(), "LFS1".to_string()]))
    );
    assert_eq!(
        graph.node_attribute(NodeId(2), "essential").expect("node"),
        Some(&AttrValue::Bool(true))
    );

    // Scoped and unscoped entries for the same edge attribute coexist.
    let record = graph.edge(EdgeId(10)).expect("edge");
    assert_eq!(
        record.attrs.get("confidence", None),
        Some(&AttrValue::Double(0.93))
    );
    assert_eq!(
        record.attrs.get("confidence", Some(100)),
        Some(&AttrValue::Double(0.5))
    );

    // The shared citation is referenced by two nodes and one edge.
    assert_eq!(
        graph.annotations().citation_ref_count(CitationId(1)),
        Some(3)
    );
}

#[test]
fn serialized_output_reflects_live_state_after_mutation() {
    let mut graph = CxGraph::from_cx(&signaling_network()).expect("parse");

    // Dropping MDM2 cascades: both parallel edges, its citation reference,
    // and the edge-owned annotation references disappear.
    graph.remove_node(NodeId(2)).expect("remove");

    let cx = graph.to_cx().expect("serialize");
    let nodes = fragment(&cx, aspect::NODES).expect("nodes");
    assert_eq!(nodes.len(), 2);
    let edges = fragment(&cx, aspect::EDGES).expect("edges");
    assert!(edges.is_empty());

    // The citation is still held by TP53.
    let citations = fragment(&cx, aspect::CITATIONS).expect("citations");
    assert_eq!(citations.len(), 1);
    let node_citations = fragment(&cx, aspect::NODE_CITATIONS).expect("links");
    assert_eq!(node_citations[0]["po"], json!([1]));

    // The support was only held by edge 10 and is gone with it.
    assert!(fragment(&cx, aspect::SUPPORTS).is_none());
    assert!(fragment(&cx, aspect::EDGE_SUPPORTS).is_none());

    // Metadata is recomputed from live state, with a bumped group.
    let metadata = fragment(&cx, aspect::METADATA).expect("metadata");
    let nodes_entry = metadata
        .iter()
        .find(|e| e["name"] == json!("nodes"))
        .expect("entry");
    assert_eq!(nodes_entry["elementCount"], json!(2));
    assert_eq!(nodes_entry["consistencyGroup"], json!(3));
}

#[test]
fn passthrough_aspects_survive_untouched() {
    let graph = CxGraph::from_cx(&signaling_network()).expect("parse");
    let cx = graph.to_cx().expect("serialize");

    let visual = fragment(&cx, aspect::CY_VISUAL_PROPERTIES).expect("visual");
    assert_eq!(visual[0]["properties_of"], json!("nodes:default"));
    assert_eq!(
        visual[0]["properties"]["NODE_FILL_COLOR"],
        json!("#CCCCCC")
    );
}

#[test]
fn double_roundtrip_is_stable() {
    let graph = CxGraph::from_cx(&signaling_network()).expect("parse");
    let first = graph.to_cx_bytes().expect("serialize");

    let graph2 = CxGraph::from_cx(&first).expect("reparse");
    assert_eq!(graph2.node_count(), 3);
    assert_eq!(graph2.edge_count(), 3);
    assert_eq!(
        graph2.node_attribute(NodeId(1), "degree").expect("node"),
        Some(&AttrValue::Integer(2))
    );
    assert_eq!(
        graph2.annotations().citation_ref_count(CitationId(1)),
        Some(3)
    );
    assert_eq!(graph2.position(NodeId(2)), Some((30.0, 40.0)));
}

#[test]
fn scenario_removing_endpoint_clears_edge_index() {
    let mut graph = CxGraph::new();
    let one = graph.add_node(Some(NodeId(1)), None, None);
    graph.add_node(Some(NodeId(2)), None, None);
    graph
        .add_edge(NodeId(1), NodeId(2), Some(EdgeId(10)), None)
        .expect("add");

    graph.remove_node(one).expect("remove");

    assert!(!graph.contains_edge(EdgeId(10)));
    assert!(graph.edge_endpoints(EdgeId(10)).is_none());
}

#[test]
fn truncated_document_aborts_without_partial_graph() {
    let bytes = &signaling_network()[..100];
    assert!(matches!(
        CxGraph::from_cx(bytes),
        Err(CxError::Serialization(_))
    ));
}
