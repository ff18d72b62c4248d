//! # Metadata Generator / Serializer
//!
//! Walks a graph and emits the canonical aspect stream: a number
//! verification marker, a freshly generated metadata aspect, the model
//! aspects in fixed order, retained passthrough fragments, and a trailing
//! status marker.
//!
//! Metadata element counts are recomputed from live graph contents on every
//! call, never cached. The consistency group is one greater than the
//! maximum group seen in metadata retained from an input stream, so a
//! parse/serialize cycle always stamps a strictly newer generation.

use crate::aspect::{
    self, AttributeElement, CitationLinkElement, EdgeElement, Fragment, LayoutElement,
    MetadataEntry, NodeElement, SupportLinkElement,
};
use crate::codec::{self, AttrValue};
use crate::graph::CxGraph;
use crate::{CxError, codec::DataType};
use serde_json::{Value, json};

// =============================================================================
// ENTRY POINTS
// =============================================================================

/// Serialize a graph into its canonical ordered fragment list.
pub fn to_cx(graph: &CxGraph) -> Result<Vec<Fragment>, CxError> {
    check_pairing(graph)?;

    let mut cx = Vec::new();
    cx.push(Fragment::new(
        aspect::NUMBER_VERIFICATION,
        vec![json!({"longNumber": aspect::LONG_NUMBER_MARKER})],
    ));
    cx.push(metadata_fragment(graph)?);

    if let Some(namespaces) = graph.namespaces() {
        cx.push(Fragment::new(aspect::CONTEXT, vec![namespaces.clone()]));
    }

    cx.push(network_attributes_fragment(graph)?);

    if let (Some(subnetwork), Some(view)) = (graph.subnetwork_id(), graph.view_id()) {
        cx.extend(subnetwork_fragments(graph, subnetwork, view));
    }

    cx.push(nodes_fragment(graph)?);
    cx.push(edges_fragment(graph)?);
    if let Some(fragment) = node_attributes_fragment(graph)? {
        cx.push(fragment);
    }
    if let Some(fragment) = edge_attributes_fragment(graph)? {
        cx.push(fragment);
    }
    if let Some(fragment) = layout_fragment(graph)? {
        cx.push(fragment);
    }

    cx.extend(annotation_fragments(graph)?);

    if graph.function_terms().next().is_some() {
        let elements: Vec<Value> = graph.function_terms().map(|(_, term)| term.clone()).collect();
        cx.push(Fragment::new(aspect::FUNCTION_TERMS, elements));
    }
    if graph.reified_edges().next().is_some() {
        let elements: Vec<Value> = graph
            .reified_edges()
            .map(|(node, edge)| json!({"node": node.0, "edge": edge.0}))
            .collect();
        cx.push(Fragment::new(aspect::REIFIED_EDGES, elements));
    }
    if let Some(provenance) = graph.provenance() {
        cx.push(Fragment::new(
            aspect::PROVENANCE_HISTORY,
            vec![provenance.clone()],
        ));
    }

    // The relation fragment is regenerated above, so a retained copy would
    // be redundant.
    for fragment in graph.passthrough() {
        if !fragment.is(aspect::NETWORK_RELATIONS) {
            cx.push(fragment.clone());
        }
    }

    cx.push(Fragment::new(
        aspect::STATUS,
        vec![json!({"error": "", "success": true})],
    ));
    Ok(cx)
}

/// Serialize a graph into a CX byte buffer.
pub fn to_cx_bytes(graph: &CxGraph) -> Result<Vec<u8>, CxError> {
    aspect::emit_fragments(&to_cx(graph)?)
}

/// A declared subnetwork without a view (or the reverse) cannot be
/// expressed on the wire.
fn check_pairing(graph: &CxGraph) -> Result<(), CxError> {
    match (graph.subnetwork_id(), graph.view_id()) {
        (Some(subnetwork), None) => Err(CxError::MalformedStream(format!(
            "subnetwork id {subnetwork} set without a view id"
        ))),
        (None, Some(view)) => Err(CxError::MalformedStream(format!(
            "view id {view} set without a subnetwork id"
        ))),
        _ => Ok(()),
    }
}

// =============================================================================
// STRUCTURAL FRAGMENTS
// =============================================================================

fn nodes_fragment(graph: &CxGraph) -> Result<Fragment, CxError> {
    let mut elements = Vec::with_capacity(graph.node_count());
    for (id, record) in graph.nodes() {
        let element = NodeElement {
            id: id.0,
            name: record.name.clone(),
            represents: record.represents.clone(),
        };
        elements.push(serde_json::to_value(element)?);
    }
    Ok(Fragment::new(aspect::NODES, elements))
}

fn edges_fragment(graph: &CxGraph) -> Result<Fragment, CxError> {
    let mut elements = Vec::with_capacity(graph.edge_count());
    for (id, record) in graph.edges() {
        let element = EdgeElement {
            id: id.0,
            source: record.source.0,
            target: record.target.0,
            interaction: record.interaction.clone(),
        };
        elements.push(serde_json::to_value(element)?);
    }
    Ok(Fragment::new(aspect::EDGES, elements))
}

fn attribute_element(
    owner: Option<i64>,
    name: &str,
    value: &AttrValue,
    scope: Option<i64>,
) -> Result<Value, CxError> {
    let (text, data_type) = codec::encode(value);
    let element = AttributeElement {
        owner,
        name: name.to_string(),
        value: Value::String(text),
        data_type: data_type.map(DataType::tag),
        subnetwork: scope,
    };
    serde_json::to_value(element).map_err(CxError::from)
}

fn network_attributes_fragment(graph: &CxGraph) -> Result<Fragment, CxError> {
    let mut elements = Vec::new();
    for (name, scope, value) in graph.network_attributes() {
        elements.push(attribute_element(None, name, value, scope)?);
    }
    Ok(Fragment::new(aspect::NETWORK_ATTRIBUTES, elements))
}

fn node_attributes_fragment(graph: &CxGraph) -> Result<Option<Fragment>, CxError> {
    let mut elements = Vec::new();
    for (id, record) in graph.nodes() {
        for (name, scope, value) in record.attrs.iter() {
            elements.push(attribute_element(Some(id.0), name, value, scope)?);
        }
    }
    if elements.is_empty() {
        return Ok(None);
    }
    Ok(Some(Fragment::new(aspect::NODE_ATTRIBUTES, elements)))
}

fn edge_attributes_fragment(graph: &CxGraph) -> Result<Option<Fragment>, CxError> {
    let mut elements = Vec::new();
    for (id, record) in graph.edges() {
        for (name, scope, value) in record.attrs.iter() {
            elements.push(attribute_element(Some(id.0), name, value, scope)?);
        }
    }
    if elements.is_empty() {
        return Ok(None);
    }
    Ok(Some(Fragment::new(aspect::EDGE_ATTRIBUTES, elements)))
}

/// Subnetwork declaration, view declaration, and the relation fragment
/// tying them together. Only emitted when both ids are set.
fn subnetwork_fragments(graph: &CxGraph, subnetwork: i64, view: i64) -> Vec<Fragment> {
    let node_ids: Vec<i64> = graph.nodes().map(|(id, _)| id.0).collect();
    let edge_ids: Vec<i64> = graph.edges().map(|(id, _)| id.0).collect();
    let name = graph.name().unwrap_or_default().to_string();

    vec![
        Fragment::new(
            aspect::SUB_NETWORKS,
            vec![json!({"@id": subnetwork, "nodes": node_ids, "edges": edge_ids})],
        ),
        Fragment::new(aspect::CY_VIEWS, vec![json!({"s": subnetwork, "@id": view})]),
        Fragment::new(
            aspect::NETWORK_RELATIONS,
            vec![
                json!({
                    "p": subnetwork,
                    "c": view,
                    "r": "view",
                    "name": format!("{name} view"),
                }),
                json!({
                    "c": subnetwork,
                    "r": "subnetwork",
                    "name": name,
                    // Bogus parent id kept for importer compatibility.
                    "p": 10000,
                }),
            ],
        ),
    ]
}

fn layout_fragment(graph: &CxGraph) -> Result<Option<Fragment>, CxError> {
    if graph.position_count() == 0 {
        return Ok(None);
    }
    let Some(view) = graph.view_id() else {
        return Err(CxError::Consistency(
            "positions set without subnetwork and view ids".to_string(),
        ));
    };
    let mut elements = Vec::with_capacity(graph.position_count());
    for (node, (x, y)) in graph.positions() {
        let element = LayoutElement {
            node: node.0,
            view: Some(view),
            x,
            y,
        };
        elements.push(serde_json::to_value(element)?);
    }
    Ok(Some(Fragment::new(aspect::CARTESIAN_LAYOUT, elements)))
}

// =============================================================================
// ANNOTATION FRAGMENTS
// =============================================================================

fn annotation_fragments(graph: &CxGraph) -> Result<Vec<Fragment>, CxError> {
    let registry = graph.annotations();
    let mut fragments = Vec::new();

    if registry.citation_count() > 0 {
        let mut elements = Vec::with_capacity(registry.citation_count());
        for (id, properties) in registry.citations() {
            let mut record = properties.clone();
            record.insert("@id".to_string(), json!(id.0));
            elements.push(Value::Object(record));
        }
        fragments.push(Fragment::new(aspect::CITATIONS, elements));
    }
    if registry.node_citation_link_count() > 0 {
        let mut elements = Vec::new();
        for (node, citations) in registry.node_citation_links() {
            let element = CitationLinkElement {
                owners: vec![node.0],
                citations: citations.iter().map(|c| c.0).collect(),
            };
            elements.push(serde_json::to_value(element)?);
        }
        fragments.push(Fragment::new(aspect::NODE_CITATIONS, elements));
    }
    if registry.edge_citation_link_count() > 0 {
        let mut elements = Vec::new();
        for (edge, citations) in registry.edge_citation_links() {
            let element = CitationLinkElement {
                owners: vec![edge.0],
                citations: citations.iter().map(|c| c.0).collect(),
            };
            elements.push(serde_json::to_value(element)?);
        }
        fragments.push(Fragment::new(aspect::EDGE_CITATIONS, elements));
    }

    if registry.support_count() > 0 {
        let mut elements = Vec::with_capacity(registry.support_count());
        for (id, properties) in registry.supports() {
            let mut record = properties.clone();
            record.insert("@id".to_string(), json!(id.0));
            elements.push(Value::Object(record));
        }
        fragments.push(Fragment::new(aspect::SUPPORTS, elements));
    }
    if registry.node_support_link_count() > 0 {
        let mut elements = Vec::new();
        for (node, supports) in registry.node_support_links() {
            let element = SupportLinkElement {
                owners: vec![node.0],
                supports: supports.iter().map(|s| s.0).collect(),
            };
            elements.push(serde_json::to_value(element)?);
        }
        fragments.push(Fragment::new(aspect::NODE_SUPPORTS, elements));
    }
    if registry.edge_support_link_count() > 0 {
        let mut elements = Vec::new();
        for (edge, supports) in registry.edge_support_links() {
            let element = SupportLinkElement {
                owners: vec![edge.0],
                supports: supports.iter().map(|s| s.0).collect(),
            };
            elements.push(serde_json::to_value(element)?);
        }
        fragments.push(Fragment::new(aspect::EDGE_SUPPORTS, elements));
    }

    Ok(fragments)
}

// =============================================================================
// METADATA
// =============================================================================

fn metadata_fragment(graph: &CxGraph) -> Result<Fragment, CxError> {
    let mut elements = Vec::new();
    for entry in generate_metadata(graph) {
        elements.push(serde_json::to_value(entry)?);
    }
    Ok(Fragment::new(aspect::METADATA, elements))
}

/// The consistency group for the next serialization: one greater than the
/// maximum group seen in retained input metadata, or 1 for a graph that
/// never carried metadata.
fn next_consistency_group(graph: &CxGraph) -> i64 {
    match graph.metadata_original() {
        None => 1,
        Some(entries) => {
            let seen = entries
                .iter()
                .filter_map(|entry| entry.get("consistencyGroup"))
                .filter_map(Value::as_i64)
                .fold(1, i64::max);
            seen.saturating_add(1)
        }
    }
}

/// Generate the metadata aspect from live graph contents.
///
/// Id counters report the current maximum id in use for an aspect kind; an
/// empty kind reports count 0 and counter 0 rather than a placeholder
/// element.
#[must_use]
pub fn generate_metadata(graph: &CxGraph) -> Vec<MetadataEntry> {
    let group = next_consistency_group(graph);
    let registry = graph.annotations();
    let mut entries = Vec::new();

    if graph.namespaces().is_some() {
        entries.push(MetadataEntry::new(aspect::CONTEXT, 1, group));
    }

    let max_node_id = graph.nodes().map(|(id, _)| id.0).max().unwrap_or(0);
    entries.push(
        MetadataEntry::new(aspect::NODES, graph.node_count() as i64, group)
            .with_id_counter(max_node_id),
    );
    let max_edge_id = graph.edges().map(|(id, _)| id.0).max().unwrap_or(0);
    entries.push(
        MetadataEntry::new(aspect::EDGES, graph.edge_count() as i64, group)
            .with_id_counter(max_edge_id),
    );

    if graph.network_attribute_count() > 0 {
        entries.push(MetadataEntry::new(
            aspect::NETWORK_ATTRIBUTES,
            graph.network_attribute_count() as i64,
            group,
        ));
    }
    if graph.node_attribute_count() > 0 {
        entries.push(MetadataEntry::new(
            aspect::NODE_ATTRIBUTES,
            graph.node_attribute_count() as i64,
            group,
        ));
    }
    if graph.edge_attribute_count() > 0 {
        entries.push(MetadataEntry::new(
            aspect::EDGE_ATTRIBUTES,
            graph.edge_attribute_count() as i64,
            group,
        ));
    }

    if graph.view_id().is_some() {
        entries.push(MetadataEntry::new(aspect::CY_VIEWS, 1, group).without_version());
    }
    if graph.subnetwork_id().is_some() {
        entries.push(MetadataEntry::new(aspect::SUB_NETWORKS, 1, group).without_version());
    }
    if graph.subnetwork_id().is_some() && graph.view_id().is_some() {
        entries.push(MetadataEntry::new(aspect::NETWORK_RELATIONS, 2, group).without_version());
    }

    if registry.support_count() > 0 {
        let max_id = registry.supports().map(|(id, _)| id.0).max().unwrap_or(0);
        entries.push(
            MetadataEntry::new(aspect::SUPPORTS, registry.support_count() as i64, group)
                .with_id_counter(max_id)
                .without_version(),
        );
    }
    if registry.node_support_link_count() > 0 {
        entries.push(
            MetadataEntry::new(
                aspect::NODE_SUPPORTS,
                registry.node_support_link_count() as i64,
                group,
            )
            .without_version(),
        );
    }
    if registry.edge_support_link_count() > 0 {
        entries.push(
            MetadataEntry::new(
                aspect::EDGE_SUPPORTS,
                registry.edge_support_link_count() as i64,
                group,
            )
            .without_version(),
        );
    }
    if registry.citation_count() > 0 {
        let max_id = registry.citations().map(|(id, _)| id.0).max().unwrap_or(0);
        entries.push(
            MetadataEntry::new(aspect::CITATIONS, registry.citation_count() as i64, group)
                .with_id_counter(max_id)
                .without_version(),
        );
    }
    if registry.node_citation_link_count() > 0 {
        entries.push(
            MetadataEntry::new(
                aspect::NODE_CITATIONS,
                registry.node_citation_link_count() as i64,
                group,
            )
            .without_version(),
        );
    }
    if registry.edge_citation_link_count() > 0 {
        entries.push(
            MetadataEntry::new(
                aspect::EDGE_CITATIONS,
                registry.edge_citation_link_count() as i64,
                group,
            )
            .without_version(),
        );
    }

    if graph.function_terms().next().is_some() {
        let count = graph.function_terms().count() as i64;
        entries.push(MetadataEntry::new(aspect::FUNCTION_TERMS, count, group).without_version());
    }
    if graph.reified_edges().next().is_some() {
        let count = graph.reified_edges().count() as i64;
        entries.push(MetadataEntry::new(aspect::REIFIED_EDGES, count, group).without_version());
    }

    if graph.position_count() > 0 {
        entries.push(MetadataEntry::new(
            aspect::CARTESIAN_LAYOUT,
            graph.position_count() as i64,
            group,
        ));
    }

    // Visual-property aspects pass through the model untouched but still
    // deserve a metadata entry so downstream consumers can find them.
    for fragment in graph.passthrough() {
        let Some(name) = fragment.name() else {
            continue;
        };
        if name != aspect::VISUAL_PROPERTIES && name != aspect::CY_VISUAL_PROPERTIES {
            continue;
        }
        let count = fragment.elements().map_or(0, Vec::len) as i64;
        entries.push(MetadataEntry::new(name, count, group).without_version());
    }

    entries
}

// =============================================================================
// TESTS
// =============================================================================
