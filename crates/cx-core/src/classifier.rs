//! # Aspect Classifier
//!
//! Routes parsed fragments into the graph store in staged passes.
//!
//! Fragment order in a CX stream is arbitrary and an aspect may be split
//! across several fragments, so classification buckets all elements by
//! aspect kind first and then runs the passes in dependency order:
//! document-level checks, collection declarations, graph structure,
//! attributes, layout, annotation records, annotation links. Anything the
//! model does not interpret is retained as passthrough in original order.
//!
//! Any failure aborts the whole build; callers never observe a partially
//! classified graph.

use crate::aspect::{
    self, AttributeElement, CitationLinkElement, EdgeElement, Fragment, IdElement, LayoutElement,
    NodeElement, SupportLinkElement,
};
use crate::graph::CxGraph;
use crate::registry::PropertyBag;
use crate::{CitationId, CxError, EdgeId, EntityRef, NodeId, SupportId, codec};
use serde_json::Value;
use std::collections::BTreeMap;

/// Aspect kinds the classifier consumes. Everything else is passthrough.
const HANDLED: &[&str] = &[
    aspect::NUMBER_VERIFICATION,
    aspect::METADATA,
    aspect::STATUS,
    aspect::SUB_NETWORKS,
    aspect::CY_VIEWS,
    aspect::CONTEXT,
    aspect::PROVENANCE_HISTORY,
    aspect::NODES,
    aspect::EDGES,
    aspect::NETWORK_ATTRIBUTES,
    aspect::NODE_ATTRIBUTES,
    aspect::EDGE_ATTRIBUTES,
    aspect::CARTESIAN_LAYOUT,
    aspect::CITATIONS,
    aspect::NODE_CITATIONS,
    aspect::EDGE_CITATIONS,
    aspect::SUPPORTS,
    aspect::NODE_SUPPORTS,
    aspect::EDGE_SUPPORTS,
    aspect::FUNCTION_TERMS,
    aspect::REIFIED_EDGES,
];

// =============================================================================
// ENTRY POINT
// =============================================================================

/// Build a graph from an ordered fragment list.
pub fn build_graph(fragments: Vec<Fragment>) -> Result<CxGraph, CxError> {
    let mut buckets = Buckets::collect(fragments)?;
    let mut graph = CxGraph::new();

    // Pass 1: document-level aspects.
    check_status(buckets.take(aspect::STATUS))?;
    buckets.take(aspect::NUMBER_VERIFICATION);
    let metadata = buckets.take(aspect::METADATA);
    if !metadata.is_empty() {
        graph.set_metadata_original(metadata);
    }

    // Pass 2: collection declarations. A single-network document may carry
    // at most one subnetwork and one view.
    if let Some(id) = take_single_id(&mut buckets, aspect::SUB_NETWORKS)? {
        graph.set_subnetwork_id(Some(id));
    }
    if let Some(id) = take_single_id(&mut buckets, aspect::CY_VIEWS)? {
        graph.set_view_id(Some(id));
    }
    if let Some(provenance) = take_single(&mut buckets, aspect::PROVENANCE_HISTORY)? {
        graph.set_provenance(provenance);
    }
    if let Some(context) = take_single(&mut buckets, aspect::CONTEXT)? {
        graph.set_namespaces(context);
    }

    // Pass 3: graph structure. Edges need the node table; attribute and
    // annotation passes need the edge index.
    classify_nodes(&mut graph, buckets.take(aspect::NODES))?;
    classify_edges(&mut graph, buckets.take(aspect::EDGES))?;

    // Pass 4: attributes and layout.
    classify_network_attributes(&mut graph, buckets.take(aspect::NETWORK_ATTRIBUTES))?;
    classify_node_attributes(&mut graph, buckets.take(aspect::NODE_ATTRIBUTES))?;
    classify_edge_attributes(&mut graph, buckets.take(aspect::EDGE_ATTRIBUTES))?;
    classify_layout(&mut graph, buckets.take(aspect::CARTESIAN_LAYOUT))?;

    // Pass 5: annotation records, then the links that reference them.
    classify_citations(&mut graph, buckets.take(aspect::CITATIONS))?;
    classify_supports(&mut graph, buckets.take(aspect::SUPPORTS))?;
    classify_citation_links(&mut graph, buckets.take(aspect::NODE_CITATIONS), true)?;
    classify_citation_links(&mut graph, buckets.take(aspect::EDGE_CITATIONS), false)?;
    classify_support_links(&mut graph, buckets.take(aspect::NODE_SUPPORTS), true)?;
    classify_support_links(&mut graph, buckets.take(aspect::EDGE_SUPPORTS), false)?;

    // Pass 6: node-anchored payload aspects.
    classify_function_terms(&mut graph, buckets.take(aspect::FUNCTION_TERMS))?;
    classify_reified_edges(&mut graph, buckets.take(aspect::REIFIED_EDGES))?;

    for fragment in buckets.passthrough {
        graph.push_passthrough(fragment);
    }
    Ok(graph)
}

// =============================================================================
// BUCKETS
// =============================================================================

/// Elements grouped by aspect kind. An aspect split across several
/// fragments is concatenated in stream order.
struct Buckets {
    elements: BTreeMap<&'static str, Vec<Value>>,
    passthrough: Vec<Fragment>,
}

impl Buckets {
    fn collect(fragments: Vec<Fragment>) -> Result<Self, CxError> {
        let mut elements: BTreeMap<&'static str, Vec<Value>> = BTreeMap::new();
        let mut passthrough = Vec::new();

        for mut fragment in fragments {
            let Some(name) = fragment.name().map(ToString::to_string) else {
                return Err(CxError::MalformedStream(
                    "fragment without an aspect name".to_string(),
                ));
            };
            let Some(handled) = HANDLED.iter().find(|known| **known == name).copied() else {
                passthrough.push(fragment);
                continue;
            };
            match fragment.0.remove(&name) {
                Some(Value::Array(list)) => {
                    elements.entry(handled).or_default().extend(list);
                }
                _ => {
                    return Err(CxError::MalformedStream(format!(
                        "aspect '{name}' value is not an array"
                    )));
                }
            }
        }
        Ok(Self {
            elements,
            passthrough,
        })
    }

    fn take(&mut self, name: &str) -> Vec<Value> {
        self.elements.remove(name).unwrap_or_default()
    }
}

/// Consume a declaration aspect that may hold at most one element.
fn take_single(buckets: &mut Buckets, name: &str) -> Result<Option<Value>, CxError> {
    let mut elements = buckets.take(name);
    if elements.len() > 1 {
        return Err(CxError::MalformedStream(format!(
            "aspect '{name}' declares {} elements; collections are not supported",
            elements.len()
        )));
    }
    Ok(elements.pop())
}

/// Consume a declaration aspect holding at most one `{@id}` element.
fn take_single_id(buckets: &mut Buckets, name: &str) -> Result<Option<i64>, CxError> {
    let Some(element) = take_single(buckets, name)? else {
        return Ok(None);
    };
    let decoded: IdElement = serde_json::from_value(element)
        .map_err(|err| CxError::MalformedStream(format!("bad '{name}' element: {err}")))?;
    Ok(Some(decoded.id))
}

// =============================================================================
// PASSES
// =============================================================================

/// A status fragment reporting failure aborts the build.
fn check_status(elements: Vec<Value>) -> Result<(), CxError> {
    for element in elements {
        if element.get("success").and_then(Value::as_bool) == Some(false) {
            let message = element
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unspecified error")
                .to_string();
            return Err(CxError::MalformedStream(format!(
                "stream reports failed status: {message}"
            )));
        }
    }
    Ok(())
}

fn classify_nodes(graph: &mut CxGraph, elements: Vec<Value>) -> Result<(), CxError> {
    for element in elements {
        let node: NodeElement = serde_json::from_value(element)
            .map_err(|err| CxError::MalformedStream(format!("bad node element: {err}")))?;
        graph.add_node(
            Some(NodeId(node.id)),
            node.name.as_deref(),
            node.represents.as_deref(),
        );
    }
    Ok(())
}

fn classify_edges(graph: &mut CxGraph, elements: Vec<Value>) -> Result<(), CxError> {
    for element in elements {
        let edge: EdgeElement = serde_json::from_value(element)
            .map_err(|err| CxError::MalformedStream(format!("bad edge element: {err}")))?;
        graph
            .add_edge(
                NodeId(edge.source),
                NodeId(edge.target),
                Some(EdgeId(edge.id)),
                edge.interaction.as_deref(),
            )
            .map_err(|err| match err {
                CxError::NodeNotFound(node) => CxError::MalformedStream(format!(
                    "edge {} references undeclared node {}",
                    edge.id, node.0
                )),
                CxError::Consistency(_) => {
                    CxError::MalformedStream(format!("duplicate edge id {}", edge.id))
                }
                other => other,
            })?;
    }
    Ok(())
}

fn decode_attribute(element: Value, kind: &str) -> Result<Option<AttributeDecode>, CxError> {
    let attr: AttributeElement = serde_json::from_value(element)
        .map_err(|err| CxError::MalformedStream(format!("bad {kind} element: {err}")))?;
    // Null-valued entries carry no information and are dropped.
    if attr.value.is_null() {
        return Ok(None);
    }
    let value = codec::decode(&attr.value, attr.data_type.as_deref())?;
    Ok(Some(AttributeDecode {
        owner: attr.owner,
        name: attr.name,
        value,
        scope: attr.subnetwork,
    }))
}

struct AttributeDecode {
    owner: Option<i64>,
    name: String,
    value: codec::AttrValue,
    scope: Option<i64>,
}

fn classify_network_attributes(graph: &mut CxGraph, elements: Vec<Value>) -> Result<(), CxError> {
    for element in elements {
        let Some(attr) = decode_attribute(element, "network attribute")? else {
            continue;
        };
        graph.set_network_attribute(&attr.name, attr.value, attr.scope);
    }
    Ok(())
}

fn classify_node_attributes(graph: &mut CxGraph, elements: Vec<Value>) -> Result<(), CxError> {
    for element in elements {
        let Some(attr) = decode_attribute(element, "node attribute")? else {
            continue;
        };
        let owner = attr.owner.ok_or_else(|| {
            CxError::MalformedStream(format!("node attribute '{}' without an owner", attr.name))
        })?;
        graph
            .set_node_attribute(NodeId(owner), &attr.name, attr.value, attr.scope)
            .map_err(|_| {
                CxError::MalformedStream(format!(
                    "node attribute '{}' references undeclared node {owner}",
                    attr.name
                ))
            })?;
    }
    Ok(())
}

fn classify_edge_attributes(graph: &mut CxGraph, elements: Vec<Value>) -> Result<(), CxError> {
    for element in elements {
        let Some(attr) = decode_attribute(element, "edge attribute")? else {
            continue;
        };
        let owner = attr.owner.ok_or_else(|| {
            CxError::MalformedStream(format!("edge attribute '{}' without an owner", attr.name))
        })?;
        graph
            .set_edge_attribute(EdgeId(owner), &attr.name, attr.value, attr.scope)
            .map_err(|_| {
                CxError::MalformedStream(format!(
                    "edge attribute '{}' references unknown edge {owner}",
                    attr.name
                ))
            })?;
    }
    Ok(())
}

fn classify_layout(graph: &mut CxGraph, elements: Vec<Value>) -> Result<(), CxError> {
    for element in elements {
        let entry: LayoutElement = serde_json::from_value(element)
            .map_err(|err| CxError::MalformedStream(format!("bad layout element: {err}")))?;
        graph.set_position(NodeId(entry.node), entry.x, entry.y).map_err(|_| {
            CxError::MalformedStream(format!(
                "layout entry references undeclared node {}",
                entry.node
            ))
        })?;
    }
    Ok(())
}

/// Split an annotation record element into its `@id` and the rest of its
/// properties.
fn split_record(element: Value, kind: &str) -> Result<(i64, PropertyBag), CxError> {
    let Value::Object(mut properties) = element else {
        return Err(CxError::MalformedStream(format!(
            "{kind} element is not an object"
        )));
    };
    let id = properties
        .remove("@id")
        .and_then(|id| id.as_i64())
        .ok_or_else(|| CxError::MalformedStream(format!("{kind} element without an @id")))?;
    Ok((id, properties))
}

fn classify_citations(graph: &mut CxGraph, elements: Vec<Value>) -> Result<(), CxError> {
    for element in elements {
        let (id, properties) = split_record(element, "citation")?;
        graph
            .annotations_mut()
            .insert_citation(CitationId(id), properties);
    }
    Ok(())
}

fn classify_supports(graph: &mut CxGraph, elements: Vec<Value>) -> Result<(), CxError> {
    for element in elements {
        let (id, properties) = split_record(element, "support")?;
        graph
            .annotations_mut()
            .insert_support(SupportId(id), properties);
    }
    Ok(())
}

fn classify_citation_links(
    graph: &mut CxGraph,
    elements: Vec<Value>,
    node_owned: bool,
) -> Result<(), CxError> {
    for element in elements {
        let link: CitationLinkElement = serde_json::from_value(element)
            .map_err(|err| CxError::MalformedStream(format!("bad citation link: {err}")))?;
        for owner in &link.owners {
            let entity = resolve_owner(graph, *owner, node_owned, "citation link")?;
            for citation in &link.citations {
                graph
                    .annotations_mut()
                    .reference_citation(entity, CitationId(*citation));
            }
        }
    }
    Ok(())
}

fn classify_support_links(
    graph: &mut CxGraph,
    elements: Vec<Value>,
    node_owned: bool,
) -> Result<(), CxError> {
    for element in elements {
        let link: SupportLinkElement = serde_json::from_value(element)
            .map_err(|err| CxError::MalformedStream(format!("bad support link: {err}")))?;
        for owner in &link.owners {
            let entity = resolve_owner(graph, *owner, node_owned, "support link")?;
            for support in &link.supports {
                graph
                    .annotations_mut()
                    .reference_support(entity, SupportId(*support));
            }
        }
    }
    Ok(())
}

fn resolve_owner(
    graph: &CxGraph,
    owner: i64,
    node_owned: bool,
    kind: &str,
) -> Result<EntityRef, CxError> {
    if node_owned {
        let node = NodeId(owner);
        if !graph.contains_node(node) {
            return Err(CxError::MalformedStream(format!(
                "{kind} references undeclared node {owner}"
            )));
        }
        Ok(EntityRef::Node(node))
    } else {
        let edge = EdgeId(owner);
        if !graph.contains_edge(edge) {
            return Err(CxError::MalformedStream(format!(
                "{kind} references unknown edge {owner}"
            )));
        }
        Ok(EntityRef::Edge(edge))
    }
}

fn classify_function_terms(graph: &mut CxGraph, elements: Vec<Value>) -> Result<(), CxError> {
    for element in elements {
        let owner = element
            .get("po")
            .and_then(Value::as_i64)
            .ok_or_else(|| CxError::MalformedStream("function term without a po".to_string()))?;
        graph.set_function_term(NodeId(owner), element).map_err(|_| {
            CxError::MalformedStream(format!(
                "function term references undeclared node {owner}"
            ))
        })?;
    }
    Ok(())
}

fn classify_reified_edges(graph: &mut CxGraph, elements: Vec<Value>) -> Result<(), CxError> {
    for element in elements {
        let node = element
            .get("node")
            .and_then(Value::as_i64)
            .ok_or_else(|| CxError::MalformedStream("reified edge without a node".to_string()))?;
        let edge = element
            .get("edge")
            .and_then(Value::as_i64)
            .ok_or_else(|| CxError::MalformedStream("reified edge without an edge".to_string()))?;
        graph
            .add_reified_edge(NodeId(node), EdgeId(edge))
            .map_err(|_| {
                CxError::MalformedStream(format!(
                    "reified edge references unknown node {node} or edge {edge}"
                ))
            })?;
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::AttrValue;
    use serde_json::json;

    fn build(doc: Value) -> Result<CxGraph, CxError> {
        let bytes = serde_json::to_vec(&doc).expect("encode");
        CxGraph::from_cx(&bytes)
    }

    #[test]
    fn fragment_order_does_not_matter() {
        // Attributes and edges arrive before the nodes they reference.
        let graph = build(json!([
            {"edgeAttributes": [{"po": 10, "n": "weight", "v": "2", "d": "integer"}]},
            {"edges": [{"@id": 10, "s": 1, "t": 2, "i": "binds"}]},
            {"nodes": [{"@id": 1, "n": "a"}, {"@id": 2, "n": "b"}]},
        ]))
        .expect("build");

        assert_eq!(graph.node_count(), 2);
        assert_eq!(
            graph.edge_attribute(EdgeId(10), "weight").expect("edge"),
            Some(&AttrValue::Integer(2))
        );
    }

    #[test]
    fn split_aspect_fragments_are_concatenated() {
        let graph = build(json!([
            {"nodes": [{"@id": 1}]},
            {"nodes": [{"@id": 2}]},
        ]))
        .expect("build");
        assert_eq!(graph.node_count(), 2);
    }

    #[test]
    fn failed_status_aborts_the_build() {
        let result = build(json!([
            {"nodes": [{"@id": 1}]},
            {"status": [{"error": "upstream timeout", "success": false}]},
        ]));
        let err = result.expect_err("status failure");
        assert!(err.to_string().contains("upstream timeout"));
    }

    #[test]
    fn multiple_subnetworks_are_rejected() {
        let result = build(json!([
            {"subNetworks": [{"@id": 1}, {"@id": 2}]},
        ]));
        assert!(matches!(result, Err(CxError::MalformedStream(_))));
    }

    #[test]
    fn edge_to_undeclared_node_is_rejected() {
        let result = build(json!([
            {"nodes": [{"@id": 1}]},
            {"edges": [{"@id": 5, "s": 1, "t": 9}]},
        ]));
        assert!(matches!(result, Err(CxError::MalformedStream(_))));
    }

    #[test]
    fn attribute_with_unknown_owner_is_rejected() {
        let result = build(json!([
            {"nodes": [{"@id": 1}]},
            {"nodeAttributes": [{"po": 42, "n": "k", "v": "x"}]},
        ]));
        assert!(matches!(result, Err(CxError::MalformedStream(_))));
    }

    #[test]
    fn edge_attribute_with_unknown_edge_is_rejected() {
        let result = build(json!([
            {"nodes": [{"@id": 1}, {"@id": 2}]},
            {"edges": [{"@id": 10, "s": 1, "t": 2}]},
            {"edgeAttributes": [{"po": 99, "n": "weight", "v": "2", "d": "integer"}]},
        ]));
        assert!(matches!(result, Err(CxError::MalformedStream(_))));
    }

    #[test]
    fn null_attribute_values_are_dropped() {
        let graph = build(json!([
            {"nodes": [{"@id": 1}]},
            {"nodeAttributes": [{"po": 1, "n": "k", "v": null}]},
        ]))
        .expect("build");
        assert!(graph.node_attribute(NodeId(1), "k").expect("node").is_none());
    }

    #[test]
    fn citation_links_raise_reference_counts() {
        let graph = build(json!([
            {"nodes": [{"@id": 1}, {"@id": 2}]},
            {"edges": [{"@id": 7, "s": 1, "t": 2}]},
            {"citations": [{"@id": 3, "dc:title": "shared"}]},
            {"nodeCitations": [{"po": [1, 2], "citations": [3]}]},
            {"edgeCitations": [{"po": [7], "citations": [3]}]},
        ]))
        .expect("build");

        assert_eq!(
            graph.annotations().citation_ref_count(CitationId(3)),
            Some(3)
        );
    }

    #[test]
    fn unreferenced_records_are_kept() {
        let graph = build(json!([
            {"supports": [{"@id": 4, "text": "standalone"}]},
        ]))
        .expect("build");
        assert!(graph.annotations().support(SupportId(4)).is_some());
        assert_eq!(
            graph.annotations().support_ref_count(SupportId(4)),
            Some(0)
        );
    }

    #[test]
    fn unknown_aspects_are_retained_in_order() {
        let graph = build(json!([
            {"mysteryA": [{"k": 1}]},
            {"nodes": [{"@id": 1}]},
            {"mysteryB": [{"k": 2}]},
        ]))
        .expect("build");

        let names: Vec<_> = graph
            .passthrough()
            .iter()
            .filter_map(Fragment::name)
            .collect();
        assert_eq!(names, vec!["mysteryA", "mysteryB"]);
    }

    #[test]
    fn untagged_values_keep_json_native_types() {
        let graph = build(json!([
            {"networkAttributes": [
                {"n": "flag", "v": true},
                {"n": "count", "v": 3},
                {"n": "label", "v": "plain"},
            ]},
        ]))
        .expect("build");

        assert_eq!(graph.network_attribute("flag"), Some(&AttrValue::Bool(true)));
        assert_eq!(
            graph.network_attribute("count"),
            Some(&AttrValue::Integer(3))
        );
        assert_eq!(
            graph.network_attribute("label"),
            Some(&AttrValue::Str("plain".to_string()))
        );
    }

    #[test]
    fn function_terms_and_reified_edges_land_on_their_nodes() {
        let graph = build(json!([
            {"nodes": [{"@id": 1}, {"@id": 2}, {"@id": 3}]},
            {"edges": [{"@id": 9, "s": 1, "t": 2}]},
            {"functionTerms": [{"po": 1, "f": "bel:proteinAbundance", "args": ["hgnc:TP53"]}]},
            {"reifiedEdges": [{"node": 3, "edge": 9}]},
        ]))
        .expect("build");

        assert!(graph.function_term(NodeId(1)).is_some());
        assert_eq!(graph.reified_edge(NodeId(3)), Some(EdgeId(9)));
    }
}
