//! # Aspect Fragments
//!
//! The wire model of a CX stream: an ordered JSON array of single-key
//! fragments. Each fragment's key names one aspect kind and its value is a
//! list of kind-specific elements.
//!
//! This module owns the byte-level contract only - fragment parsing and
//! emission are pure transformations with no file or network I/O - plus the
//! serde element shapes shared by the classifier and the serializer.

use crate::CxError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// =============================================================================
// ASPECT NAMES
// =============================================================================

pub const NUMBER_VERIFICATION: &str = "numberVerification";
pub const METADATA: &str = "metaData";
pub const STATUS: &str = "status";
pub const SUB_NETWORKS: &str = "subNetworks";
pub const CY_VIEWS: &str = "cyViews";
pub const CONTEXT: &str = "@context";
pub const PROVENANCE_HISTORY: &str = "provenanceHistory";
pub const NODES: &str = "nodes";
pub const EDGES: &str = "edges";
pub const NETWORK_ATTRIBUTES: &str = "networkAttributes";
pub const NODE_ATTRIBUTES: &str = "nodeAttributes";
pub const EDGE_ATTRIBUTES: &str = "edgeAttributes";
pub const CARTESIAN_LAYOUT: &str = "cartesianLayout";
pub const CITATIONS: &str = "citations";
pub const NODE_CITATIONS: &str = "nodeCitations";
pub const EDGE_CITATIONS: &str = "edgeCitations";
pub const SUPPORTS: &str = "supports";
pub const NODE_SUPPORTS: &str = "nodeSupports";
pub const EDGE_SUPPORTS: &str = "edgeSupports";
pub const FUNCTION_TERMS: &str = "functionTerms";
pub const REIFIED_EDGES: &str = "reifiedEdges";
pub const NETWORK_RELATIONS: &str = "networkRelations";
pub const VISUAL_PROPERTIES: &str = "visualProperties";
pub const CY_VISUAL_PROPERTIES: &str = "cyVisualProperties";

/// The fixed marker value of the number-verification fragment.
pub const LONG_NUMBER_MARKER: i64 = 281_474_976_710_655;

// =============================================================================
// FRAGMENT
// =============================================================================

/// One fragment of the aspect stream: a JSON object whose first key names
/// the aspect kind.
///
/// Unrecognized fragments are retained verbatim (key order included, via
/// `serde_json`'s preserved map order) so passthrough aspects round-trip
/// byte-for-byte in relative order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fragment(pub Map<String, Value>);

impl Fragment {
    /// Build a fragment from an aspect name and its element list.
    #[must_use]
    pub fn new(name: &str, elements: Vec<Value>) -> Self {
        let mut map = Map::new();
        map.insert(name.to_string(), Value::Array(elements));
        Self(map)
    }

    /// The aspect kind this fragment declares (its first key).
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.0.keys().next().map(String::as_str)
    }

    /// Whether this fragment declares the given aspect kind.
    #[must_use]
    pub fn is(&self, name: &str) -> bool {
        self.name() == Some(name)
    }

    /// The element list of this fragment, if its value is an array.
    #[must_use]
    pub fn elements(&self) -> Option<&Vec<Value>> {
        let name = self.name()?;
        self.0.get(name)?.as_array()
    }
}

/// Parse a CX byte buffer into its ordered fragment list.
pub fn parse_fragments(bytes: &[u8]) -> Result<Vec<Fragment>, CxError> {
    serde_json::from_slice(bytes).map_err(CxError::from)
}

/// Emit an ordered fragment list as a CX byte buffer.
pub fn emit_fragments(fragments: &[Fragment]) -> Result<Vec<u8>, CxError> {
    serde_json::to_vec(fragments).map_err(CxError::from)
}

// =============================================================================
// ELEMENT SHAPES
// =============================================================================

/// A node declaration: `{@id, n?, r?}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeElement {
    #[serde(rename = "@id")]
    pub id: i64,
    #[serde(rename = "n", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "r", skip_serializing_if = "Option::is_none")]
    pub represents: Option<String>,
}

/// An edge declaration: `{@id, s, t, i?}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeElement {
    #[serde(rename = "@id")]
    pub id: i64,
    #[serde(rename = "s")]
    pub source: i64,
    #[serde(rename = "t")]
    pub target: i64,
    #[serde(rename = "i", skip_serializing_if = "Option::is_none")]
    pub interaction: Option<String>,
}

/// An attribute entry: `{po?, n, v, d?, s?}`.
///
/// `po` is absent for network-level attributes; `d` is the optional type
/// tag; `s` is the optional subnetwork scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeElement {
    #[serde(rename = "po", skip_serializing_if = "Option::is_none")]
    pub owner: Option<i64>,
    #[serde(rename = "n")]
    pub name: String,
    #[serde(rename = "v")]
    pub value: Value,
    #[serde(rename = "d", skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
    #[serde(rename = "s", skip_serializing_if = "Option::is_none")]
    pub subnetwork: Option<i64>,
}

/// A cartesian layout entry: `{node, view?, x, y}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutElement {
    pub node: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view: Option<i64>,
    pub x: f64,
    pub y: f64,
}

/// A node/edge-to-citation linking entry: `{po: [...], citations: [...]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationLinkElement {
    #[serde(rename = "po")]
    pub owners: Vec<i64>,
    pub citations: Vec<i64>,
}

/// A node/edge-to-support linking entry: `{po: [...], supports: [...]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportLinkElement {
    #[serde(rename = "po")]
    pub owners: Vec<i64>,
    pub supports: Vec<i64>,
}

/// An element carrying only an `@id`, as in subnetwork and view
/// declarations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct IdElement {
    #[serde(rename = "@id")]
    pub id: i64,
}

/// One entry of the generated metadata aspect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetadataEntry {
    #[serde(rename = "consistencyGroup")]
    pub consistency_group: i64,
    #[serde(rename = "elementCount")]
    pub element_count: i64,
    #[serde(rename = "idCounter", skip_serializing_if = "Option::is_none")]
    pub id_counter: Option<i64>,
    pub name: String,
    pub properties: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl MetadataEntry {
    /// A metadata entry without an id counter, versioned "1.0".
    #[must_use]
    pub fn new(name: &str, element_count: i64, consistency_group: i64) -> Self {
        Self {
            consistency_group,
            element_count,
            id_counter: None,
            name: name.to_string(),
            properties: Vec::new(),
            version: Some("1.0".to_string()),
        }
    }

    /// Attach the current maximum id in use for this aspect kind.
    #[must_use]
    pub fn with_id_counter(mut self, id_counter: i64) -> Self {
        self.id_counter = Some(id_counter);
        self
    }

    /// Drop the version field; some entries historically carry none.
    #[must_use]
    pub fn without_version(mut self) -> Self {
        self.version = None;
        self
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fragment_name_is_first_key() {
        let fragment = Fragment::new(NODES, vec![json!({"@id": 1})]);
        assert_eq!(fragment.name(), Some(NODES));
        assert!(fragment.is(NODES));
        assert!(!fragment.is(EDGES));
    }

    #[test]
    fn parse_and_emit_preserve_fragment_order() {
        let bytes = br#"[{"nodes":[{"@id":1}]},{"mystery":[{"k":"v"}]}]"#;
        let fragments = parse_fragments(bytes).expect("parse");
        assert_eq!(fragments.len(), 2);
        assert_eq!(fragments[1].name(), Some("mystery"));

        let emitted = emit_fragments(&fragments).expect("emit");
        let reparsed = parse_fragments(&emitted).expect("reparse");
        assert_eq!(fragments, reparsed);
    }

    #[test]
    fn node_element_roundtrip_without_optionals() {
        let element: NodeElement = serde_json::from_value(json!({"@id": 3})).expect("decode");
        assert_eq!(element.id, 3);
        assert!(element.name.is_none());

        let value = serde_json::to_value(&element).expect("encode");
        assert_eq!(value, json!({"@id": 3}));
    }

    #[test]
    fn edge_element_reads_wire_field_names() {
        let element: EdgeElement =
            serde_json::from_value(json!({"@id": 10, "s": 1, "t": 2, "i": "binds"}))
                .expect("decode");
        assert_eq!(element.source, 1);
        assert_eq!(element.target, 2);
        assert_eq!(element.interaction.as_deref(), Some("binds"));
    }

    #[test]
    fn metadata_entry_skips_absent_id_counter() {
        let entry = MetadataEntry::new("nodeAttributes", 4, 2);
        let value = serde_json::to_value(&entry).expect("encode");
        assert!(value.get("idCounter").is_none());
        assert_eq!(value["elementCount"], json!(4));
    }

    #[test]
    fn invalid_json_fails_to_parse() {
        assert!(parse_fragments(b"{not a stream").is_err());
    }
}
