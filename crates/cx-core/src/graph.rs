//! # Graph Store
//!
//! The in-memory CX multigraph.
//!
//! `CxGraph` owns its adjacency and attribute structures directly
//! (composition, not inheritance from a general-purpose graph type) and
//! exposes only the operations the interchange model needs. All tables are
//! `BTreeMap`/`BTreeSet` so iteration - and therefore serialization - is
//! deterministic.
//!
//! ## Invariants
//!
//! - Every edge id maps to exactly one `(source, target)` pair in the edge
//!   table, which doubles as the id→pair index; the adjacency structure is
//!   mutated in the same operation on every insert and remove.
//! - Ids are minted monotonically (max seen + 1) and never reused within a
//!   session.
//! - The subnetwork/view pairing and the position-table precondition are
//!   checked at serialize time, not on every mutation; incremental
//!   construction may pass through unpaired states.

use crate::aspect::Fragment;
use crate::codec::AttrValue;
use crate::registry::{AnnotationRegistry, PropertyBag};
use crate::{CitationId, CxError, EdgeId, EntityRef, NodeId, SupportId};
use serde_json::{Value, json};
use std::collections::{BTreeMap, BTreeSet};
use std::time::{SystemTime, UNIX_EPOCH};

// =============================================================================
// ATTRIBUTE TABLE
// =============================================================================

/// Scoped attribute map for one entity.
///
/// Keys are `(name, optional subnetwork scope)`. The write rule is the
/// format's historical one and is preserved exactly: an unscoped write
/// lands only while no unscoped entry for that name exists; a scoped write
/// always lands for its `(name, scope)` slot. An unscoped and a scoped
/// entry for the same name coexist.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttrTable {
    entries: BTreeMap<(String, Option<i64>), AttrValue>,
}

impl AttrTable {
    /// Write an attribute under the first-unscoped-wins / scoped-always-wins
    /// rule.
    pub fn set(&mut self, name: &str, value: AttrValue, scope: Option<i64>) {
        let key = (name.to_string(), scope);
        if scope.is_some() {
            self.entries.insert(key, value);
        } else {
            self.entries.entry(key).or_insert(value);
        }
    }

    /// Look up the entry for an exact `(name, scope)` key.
    #[must_use]
    pub fn get(&self, name: &str, scope: Option<i64>) -> Option<&AttrValue> {
        self.entries.get(&(name.to_string(), scope))
    }

    /// Look up an attribute by name, preferring the unscoped entry.
    #[must_use]
    pub fn get_any(&self, name: &str) -> Option<&AttrValue> {
        self.entries
            .range((name.to_string(), None)..=(name.to_string(), Some(i64::MAX)))
            .map(|(_, value)| value)
            .next()
    }

    /// Remove the entry for an exact `(name, scope)` key.
    pub fn remove(&mut self, name: &str, scope: Option<i64>) -> Option<AttrValue> {
        self.entries.remove(&(name.to_string(), scope))
    }

    /// All entries in `(name, scope)` order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<i64>, &AttrValue)> {
        self.entries
            .iter()
            .map(|((name, scope), value)| (name.as_str(), *scope, value))
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// =============================================================================
// RECORDS
// =============================================================================

/// A node: optional reserved `name`/`represents` attributes plus the open
/// attribute map. The reserved pair is excluded from generic attribute
/// serialization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeRecord {
    pub name: Option<String>,
    pub represents: Option<String>,
    pub attrs: AttrTable,
}

/// A directed edge: ordered endpoint pair, optional reserved `interaction`
/// attribute, open attribute map.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeRecord {
    pub source: NodeId,
    pub target: NodeId,
    pub interaction: Option<String>,
    pub attrs: AttrTable,
}

// =============================================================================
// GRAPH
// =============================================================================

/// The CX multigraph.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CxGraph {
    nodes: BTreeMap<NodeId, NodeRecord>,
    /// source -> target -> edge ids; multiple edges per ordered pair.
    adjacency: BTreeMap<NodeId, BTreeMap<NodeId, BTreeSet<EdgeId>>>,
    /// Edge table, which is also the edge-id→pair index.
    edges: BTreeMap<EdgeId, EdgeRecord>,
    network_attrs: AttrTable,
    pos: BTreeMap<NodeId, (f64, f64)>,
    subnetwork_id: Option<i64>,
    view_id: Option<i64>,
    annotations: AnnotationRegistry,
    /// Function-term formula payloads keyed by the owning node.
    function_terms: BTreeMap<NodeId, Value>,
    /// Reified stand-in node -> the edge it stands in for.
    reified_edges: BTreeMap<NodeId, EdgeId>,
    provenance: Option<Value>,
    namespaces: Option<Value>,
    /// Metadata aspect retained verbatim from an input stream.
    metadata_original: Option<Vec<Value>>,
    /// Unclassified fragments, in original order.
    passthrough: Vec<Fragment>,
    /// Monotonic id watermarks; minted ids are never reused.
    max_node_id: i64,
    max_edge_id: i64,
}

impl CxGraph {
    /// Create an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a CX byte buffer into a graph.
    ///
    /// Any classification failure aborts the whole parse; a partially
    /// constructed graph is never returned.
    pub fn from_cx(bytes: &[u8]) -> Result<Self, CxError> {
        let fragments = crate::aspect::parse_fragments(bytes)?;
        crate::classifier::build_graph(fragments)
    }

    /// Serialize this graph into its canonical ordered fragment list.
    pub fn to_cx(&self) -> Result<Vec<Fragment>, CxError> {
        crate::serializer::to_cx(self)
    }

    /// Serialize this graph into a CX byte buffer.
    pub fn to_cx_bytes(&self) -> Result<Vec<u8>, CxError> {
        crate::serializer::to_cx_bytes(self)
    }

    /// Reset to an empty graph, dropping all data and watermarks.
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    // -------------------------------------------------------------------------
    // Nodes
    // -------------------------------------------------------------------------

    /// Add a node, minting an id (max seen + 1, or 1 when empty) if none is
    /// given. Adding an existing id merges `name`/`represents`.
    pub fn add_node(
        &mut self,
        id: Option<NodeId>,
        name: Option<&str>,
        represents: Option<&str>,
    ) -> NodeId {
        let id = id.unwrap_or(NodeId(self.max_node_id.saturating_add(1)));
        self.max_node_id = self.max_node_id.max(id.0);

        let record = self.nodes.entry(id).or_default();
        if let Some(name) = name {
            record.name = Some(name.to_string());
        }
        if let Some(represents) = represents {
            record.represents = Some(represents.to_string());
        }
        id
    }

    /// Remove a node, cascading to incident edges, its position entry, its
    /// function term, its reified stand-in entry, and its annotation
    /// references.
    pub fn remove_node(&mut self, id: NodeId) -> Result<(), CxError> {
        if !self.nodes.contains_key(&id) {
            return Err(CxError::NodeNotFound(id));
        }

        let incident: Vec<EdgeId> = self
            .edges
            .iter()
            .filter(|(_, record)| record.source == id || record.target == id)
            .map(|(edge, _)| *edge)
            .collect();
        for edge in incident {
            self.remove_edge(edge)?;
        }

        self.pos.remove(&id);
        self.function_terms.remove(&id);
        self.reified_edges.remove(&id);
        self.annotations.release_all_for(EntityRef::Node(id));
        self.adjacency.remove(&id);
        self.nodes.remove(&id);
        Ok(())
    }

    /// Look up a node record.
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&NodeRecord> {
        self.nodes.get(&id)
    }

    /// Whether the node id is present.
    #[must_use]
    pub fn contains_node(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// All nodes in id order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &NodeRecord)> {
        self.nodes.iter().map(|(id, record)| (*id, record))
    }

    /// Number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Ids of all nodes whose attribute `key` equals `value`. The reserved
    /// names `name` and `represents` match their dedicated fields.
    #[must_use]
    pub fn find_nodes(&self, key: &str, value: &AttrValue) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|(_, record)| match key {
                "name" => matches!((value, &record.name), (AttrValue::Str(s), Some(n)) if s == n),
                "represents" => {
                    matches!((value, &record.represents), (AttrValue::Str(s), Some(r)) if s == r)
                }
                _ => record.attrs.get_any(key) == Some(value),
            })
            .map(|(id, _)| *id)
            .collect()
    }

    /// Remove every node with no incident edge, cascading as
    /// [`remove_node`](Self::remove_node) does. Returns the number of nodes
    /// dropped.
    pub fn remove_orphan_nodes(&mut self) -> Result<usize, CxError> {
        let connected: BTreeSet<NodeId> = self
            .edges
            .values()
            .flat_map(|record| [record.source, record.target])
            .collect();
        let orphans: Vec<NodeId> = self
            .nodes
            .keys()
            .filter(|id| !connected.contains(id))
            .copied()
            .collect();
        let count = orphans.len();
        for id in orphans {
            self.remove_node(id)?;
        }
        Ok(count)
    }

    /// Rebuild the graph from `(source name, target name)` pairs. All
    /// existing data is cleared first. Each distinct name becomes one node,
    /// and every edge carries the given interaction. Repeated pairs produce
    /// parallel edges.
    pub fn create_from_edge_list(
        &mut self,
        pairs: &[(&str, &str)],
        interaction: &str,
    ) -> Result<(), CxError> {
        self.clear();
        let mut by_name: BTreeMap<String, NodeId> = BTreeMap::new();
        for (source, target) in pairs {
            let source = self.intern_named_node(&mut by_name, source);
            let target = self.intern_named_node(&mut by_name, target);
            self.add_edge(source, target, None, Some(interaction))?;
        }
        Ok(())
    }

    fn intern_named_node(&mut self, by_name: &mut BTreeMap<String, NodeId>, name: &str) -> NodeId {
        if let Some(id) = by_name.get(name) {
            return *id;
        }
        let id = self.add_node(None, Some(name), None);
        by_name.insert(name.to_string(), id);
        id
    }

    // -------------------------------------------------------------------------
    // Edges
    // -------------------------------------------------------------------------

    /// Add a directed edge, minting an id if none is given. Both endpoints
    /// must exist. An explicit id that is already in use is rejected: ids
    /// are never reused, so silent replacement is treated as caller error.
    pub fn add_edge(
        &mut self,
        source: NodeId,
        target: NodeId,
        id: Option<EdgeId>,
        interaction: Option<&str>,
    ) -> Result<EdgeId, CxError> {
        if !self.nodes.contains_key(&source) {
            return Err(CxError::NodeNotFound(source));
        }
        if !self.nodes.contains_key(&target) {
            return Err(CxError::NodeNotFound(target));
        }
        let id = match id {
            Some(id) => {
                if self.edges.contains_key(&id) {
                    return Err(CxError::Consistency(format!(
                        "edge id {} already in use",
                        id.0
                    )));
                }
                id
            }
            None => EdgeId(self.max_edge_id.saturating_add(1)),
        };
        self.max_edge_id = self.max_edge_id.max(id.0);

        // Index and adjacency are updated together.
        self.adjacency
            .entry(source)
            .or_default()
            .entry(target)
            .or_default()
            .insert(id);
        self.edges.insert(
            id,
            EdgeRecord {
                source,
                target,
                interaction: interaction.map(ToString::to_string),
                attrs: AttrTable::default(),
            },
        );
        Ok(id)
    }

    /// Remove an edge, cascading to reified stand-in entries that reference
    /// it and to its annotation references.
    pub fn remove_edge(&mut self, id: EdgeId) -> Result<(), CxError> {
        let record = self.edges.remove(&id).ok_or(CxError::EdgeNotFound(id))?;

        if let Some(targets) = self.adjacency.get_mut(&record.source) {
            if let Some(ids) = targets.get_mut(&record.target) {
                ids.remove(&id);
                if ids.is_empty() {
                    targets.remove(&record.target);
                }
            }
            if targets.is_empty() {
                self.adjacency.remove(&record.source);
            }
        }

        let stand_ins: Vec<NodeId> = self
            .reified_edges
            .iter()
            .filter(|(_, edge)| **edge == id)
            .map(|(node, _)| *node)
            .collect();
        for node in stand_ins {
            self.reified_edges.remove(&node);
        }

        self.annotations.release_all_for(EntityRef::Edge(id));
        Ok(())
    }

    /// Look up an edge record.
    #[must_use]
    pub fn edge(&self, id: EdgeId) -> Option<&EdgeRecord> {
        self.edges.get(&id)
    }

    /// Whether the edge id is present in the index.
    #[must_use]
    pub fn contains_edge(&self, id: EdgeId) -> bool {
        self.edges.contains_key(&id)
    }

    /// The `(source, target)` pair of an edge.
    #[must_use]
    pub fn edge_endpoints(&self, id: EdgeId) -> Option<(NodeId, NodeId)> {
        self.edges
            .get(&id)
            .map(|record| (record.source, record.target))
    }

    /// All edge ids between an ordered node pair, in id order.
    #[must_use]
    pub fn edges_between(&self, source: NodeId, target: NodeId) -> Vec<EdgeId> {
        self.adjacency
            .get(&source)
            .and_then(|targets| targets.get(&target))
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    /// All edges in id order.
    pub fn edges(&self) -> impl Iterator<Item = (EdgeId, &EdgeRecord)> {
        self.edges.iter().map(|(id, record)| (*id, record))
    }

    /// Number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    // -------------------------------------------------------------------------
    // Attributes
    // -------------------------------------------------------------------------

    /// Write a network-level attribute (first-unscoped-wins /
    /// scoped-always-wins).
    pub fn set_network_attribute(&mut self, name: &str, value: AttrValue, scope: Option<i64>) {
        self.network_attrs.set(name, value, scope);
    }

    /// Read a network-level attribute, preferring the unscoped entry.
    #[must_use]
    pub fn network_attribute(&self, name: &str) -> Option<&AttrValue> {
        self.network_attrs.get_any(name)
    }

    /// All network-level attributes in `(name, scope)` order.
    pub fn network_attributes(&self) -> impl Iterator<Item = (&str, Option<i64>, &AttrValue)> {
        self.network_attrs.iter()
    }

    /// Number of network-level attribute entries.
    #[must_use]
    pub fn network_attribute_count(&self) -> usize {
        self.network_attrs.len()
    }

    /// Set the network's descriptive name.
    pub fn set_name(&mut self, name: &str) {
        self.network_attrs
            .set("name", AttrValue::Str(name.to_string()), None);
    }

    /// The network's descriptive name, if set.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match self.network_attrs.get_any("name") {
            Some(AttrValue::Str(name)) => Some(name.as_str()),
            _ => None,
        }
    }

    /// Write a node attribute. Fails if the node is unknown.
    pub fn set_node_attribute(
        &mut self,
        id: NodeId,
        name: &str,
        value: AttrValue,
        scope: Option<i64>,
    ) -> Result<(), CxError> {
        let record = self.nodes.get_mut(&id).ok_or(CxError::NodeNotFound(id))?;
        record.attrs.set(name, value, scope);
        Ok(())
    }

    /// Read a node attribute. `Ok(None)` signals an absent key; an unknown
    /// node is an error.
    pub fn node_attribute(&self, id: NodeId, name: &str) -> Result<Option<&AttrValue>, CxError> {
        let record = self.nodes.get(&id).ok_or(CxError::NodeNotFound(id))?;
        Ok(record.attrs.get_any(name))
    }

    /// Total node attribute entries across the graph, excluding the
    /// reserved `name`/`represents` pair (they live on the node records).
    #[must_use]
    pub fn node_attribute_count(&self) -> usize {
        self.nodes.values().map(|record| record.attrs.len()).sum()
    }

    /// Write an edge attribute. Fails if the edge is unknown.
    pub fn set_edge_attribute(
        &mut self,
        id: EdgeId,
        name: &str,
        value: AttrValue,
        scope: Option<i64>,
    ) -> Result<(), CxError> {
        let record = self.edges.get_mut(&id).ok_or(CxError::EdgeNotFound(id))?;
        record.attrs.set(name, value, scope);
        Ok(())
    }

    /// Read an edge attribute. `Ok(None)` signals an absent key; an unknown
    /// edge is an error.
    pub fn edge_attribute(&self, id: EdgeId, name: &str) -> Result<Option<&AttrValue>, CxError> {
        let record = self.edges.get(&id).ok_or(CxError::EdgeNotFound(id))?;
        Ok(record.attrs.get_any(name))
    }

    /// Total edge attribute entries across the graph, excluding the
    /// reserved `interaction` attribute.
    #[must_use]
    pub fn edge_attribute_count(&self) -> usize {
        self.edges.values().map(|record| record.attrs.len()).sum()
    }

    // -------------------------------------------------------------------------
    // Positions
    // -------------------------------------------------------------------------

    /// Store the layout position of a node.
    pub fn set_position(&mut self, id: NodeId, x: f64, y: f64) -> Result<(), CxError> {
        if !self.nodes.contains_key(&id) {
            return Err(CxError::NodeNotFound(id));
        }
        self.pos.insert(id, (x, y));
        Ok(())
    }

    /// The stored position of a node, if any.
    #[must_use]
    pub fn position(&self, id: NodeId) -> Option<(f64, f64)> {
        self.pos.get(&id).copied()
    }

    /// All positions in node-id order.
    pub fn positions(&self) -> impl Iterator<Item = (NodeId, (f64, f64))> + '_ {
        self.pos.iter().map(|(id, xy)| (*id, *xy))
    }

    /// Number of position entries.
    #[must_use]
    pub fn position_count(&self) -> usize {
        self.pos.len()
    }

    // -------------------------------------------------------------------------
    // Subnetwork / view
    // -------------------------------------------------------------------------

    /// Declare the single subnetwork id. The pairing with the view id is
    /// validated at serialize time.
    pub fn set_subnetwork_id(&mut self, id: Option<i64>) {
        self.subnetwork_id = id;
    }

    /// The declared subnetwork id, if any.
    #[must_use]
    pub fn subnetwork_id(&self) -> Option<i64> {
        self.subnetwork_id
    }

    /// Declare the single view id.
    pub fn set_view_id(&mut self, id: Option<i64>) {
        self.view_id = id;
    }

    /// The declared view id, if any.
    #[must_use]
    pub fn view_id(&self) -> Option<i64> {
        self.view_id
    }

    // -------------------------------------------------------------------------
    // Annotations
    // -------------------------------------------------------------------------

    /// Read access to the annotation registry.
    #[must_use]
    pub fn annotations(&self) -> &AnnotationRegistry {
        &self.annotations
    }

    pub(crate) fn annotations_mut(&mut self) -> &mut AnnotationRegistry {
        &mut self.annotations
    }

    /// Add a citation record and return its minted id.
    pub fn add_citation(&mut self, properties: PropertyBag) -> CitationId {
        self.annotations.add_citation(properties)
    }

    /// Add a support record and return its minted id.
    pub fn add_support(&mut self, properties: PropertyBag) -> SupportId {
        self.annotations.add_support(properties)
    }

    /// Reference a citation from a node.
    pub fn add_node_citation(&mut self, node: NodeId, id: CitationId) -> Result<(), CxError> {
        if !self.nodes.contains_key(&node) {
            return Err(CxError::NodeNotFound(node));
        }
        self.annotations
            .reference_citation(EntityRef::Node(node), id);
        Ok(())
    }

    /// Reference a citation from an edge.
    pub fn add_edge_citation(&mut self, edge: EdgeId, id: CitationId) -> Result<(), CxError> {
        if !self.edges.contains_key(&edge) {
            return Err(CxError::EdgeNotFound(edge));
        }
        self.annotations
            .reference_citation(EntityRef::Edge(edge), id);
        Ok(())
    }

    /// Reference a support from a node.
    pub fn add_node_support(&mut self, node: NodeId, id: SupportId) -> Result<(), CxError> {
        if !self.nodes.contains_key(&node) {
            return Err(CxError::NodeNotFound(node));
        }
        self.annotations.reference_support(EntityRef::Node(node), id);
        Ok(())
    }

    /// Reference a support from an edge.
    pub fn add_edge_support(&mut self, edge: EdgeId, id: SupportId) -> Result<(), CxError> {
        if !self.edges.contains_key(&edge) {
            return Err(CxError::EdgeNotFound(edge));
        }
        self.annotations.reference_support(EntityRef::Edge(edge), id);
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Function terms / reified edges
    // -------------------------------------------------------------------------

    /// Attach a function-term formula to a node.
    pub fn set_function_term(&mut self, node: NodeId, term: Value) -> Result<(), CxError> {
        if !self.nodes.contains_key(&node) {
            return Err(CxError::NodeNotFound(node));
        }
        self.function_terms.insert(node, term);
        Ok(())
    }

    /// The function term attached to a node, if any.
    #[must_use]
    pub fn function_term(&self, node: NodeId) -> Option<&Value> {
        self.function_terms.get(&node)
    }

    /// All function terms in node-id order.
    pub fn function_terms(&self) -> impl Iterator<Item = (NodeId, &Value)> {
        self.function_terms.iter().map(|(id, term)| (*id, term))
    }

    /// Declare that a node stands in for an edge.
    pub fn add_reified_edge(&mut self, node: NodeId, edge: EdgeId) -> Result<(), CxError> {
        if !self.nodes.contains_key(&node) {
            return Err(CxError::NodeNotFound(node));
        }
        if !self.edges.contains_key(&edge) {
            return Err(CxError::EdgeNotFound(edge));
        }
        self.reified_edges.insert(node, edge);
        Ok(())
    }

    /// The edge a reified node stands in for, if any.
    #[must_use]
    pub fn reified_edge(&self, node: NodeId) -> Option<EdgeId> {
        self.reified_edges.get(&node).copied()
    }

    /// All reified stand-in entries in node-id order.
    pub fn reified_edges(&self) -> impl Iterator<Item = (NodeId, EdgeId)> + '_ {
        self.reified_edges.iter().map(|(node, edge)| (*node, *edge))
    }

    // -------------------------------------------------------------------------
    // Provenance / namespaces / retained metadata / passthrough
    // -------------------------------------------------------------------------

    /// The provenance history entity, if any.
    #[must_use]
    pub fn provenance(&self) -> Option<&Value> {
        self.provenance.as_ref()
    }

    /// Replace the provenance history entity.
    pub fn set_provenance(&mut self, provenance: Value) {
        self.provenance = Some(provenance);
    }

    /// Chain a new creation event onto the provenance history. The previous
    /// entity, if any, becomes the event's input.
    pub fn update_provenance(&mut self, event_type: &str, entity_props: Option<Value>) {
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);

        let mut event = json!({
            "startedAtTime": now_ms,
            "endedAtTime": now_ms,
            "eventType": event_type,
        });
        if let Some(old) = self.provenance.take()
            && let Some(old_entity) = old.get("entity")
        {
            event["inputs"] = json!([old_entity.clone()]);
        }

        let mut entity = json!({ "creationEvent": event });
        if let Some(props) = entity_props {
            entity["properties"] = props;
        }
        self.provenance = Some(json!({ "entity": entity }));
    }

    /// The namespace context element, if any.
    #[must_use]
    pub fn namespaces(&self) -> Option<&Value> {
        self.namespaces.as_ref()
    }

    /// Replace the namespace context element.
    pub fn set_namespaces(&mut self, namespaces: Value) {
        self.namespaces = Some(namespaces);
    }

    /// The metadata aspect retained from the input stream, if any.
    #[must_use]
    pub fn metadata_original(&self) -> Option<&[Value]> {
        self.metadata_original.as_deref()
    }

    pub(crate) fn set_metadata_original(&mut self, metadata: Vec<Value>) {
        self.metadata_original = Some(metadata);
    }

    /// Fragments the model does not interpret, in original order.
    #[must_use]
    pub fn passthrough(&self) -> &[Fragment] {
        &self.passthrough
    }

    pub(crate) fn push_passthrough(&mut self, fragment: Fragment) {
        self.passthrough.push(fragment);
    }

    // -------------------------------------------------------------------------
    // Id watermarks
    // -------------------------------------------------------------------------

    /// The highest node id ever in use.
    #[must_use]
    pub fn max_node_id(&self) -> i64 {
        self.max_node_id
    }

    /// The highest edge id ever in use.
    #[must_use]
    pub fn max_edge_id(&self) -> i64 {
        self.max_edge_id
    }

    // -------------------------------------------------------------------------
    // Subgraph
    // -------------------------------------------------------------------------

    /// The induced subgraph over the given nodes: every listed node that
    /// exists, every edge whose endpoints are both included (with a faithful
    /// id→pair index), their attributes and positions, and annotation
    /// records re-referenced so reference counts match the retained
    /// entities.
    #[must_use]
    pub fn subgraph(&self, node_ids: &[NodeId]) -> Self {
        let keep: BTreeSet<NodeId> = node_ids
            .iter()
            .copied()
            .filter(|id| self.nodes.contains_key(id))
            .collect();

        let mut sub = Self {
            subnetwork_id: self.subnetwork_id,
            view_id: self.view_id,
            namespaces: self.namespaces.clone(),
            max_node_id: self.max_node_id,
            max_edge_id: self.max_edge_id,
            network_attrs: self.network_attrs.clone(),
            ..Self::default()
        };

        for id in &keep {
            if let Some(record) = self.nodes.get(id) {
                sub.nodes.insert(*id, record.clone());
            }
            if let Some(xy) = self.pos.get(id) {
                sub.pos.insert(*id, *xy);
            }
            if let Some(term) = self.function_terms.get(id) {
                sub.function_terms.insert(*id, term.clone());
            }
        }

        for (id, record) in &self.edges {
            if keep.contains(&record.source) && keep.contains(&record.target) {
                sub.adjacency
                    .entry(record.source)
                    .or_default()
                    .entry(record.target)
                    .or_default()
                    .insert(*id);
                sub.edges.insert(*id, record.clone());
            }
        }

        for (node, edge) in &self.reified_edges {
            if keep.contains(node) && sub.edges.contains_key(edge) {
                sub.reified_edges.insert(*node, *edge);
            }
        }

        self.copy_annotations_into(&mut sub, &keep);
        sub
    }

    /// Re-add annotation records and references for the retained entities so
    /// the subgraph's reference counts are built incrementally, not copied.
    fn copy_annotations_into(&self, sub: &mut Self, keep: &BTreeSet<NodeId>) {
        let registry = &mut sub.annotations;

        for (node, citations) in self.annotations.node_citation_links() {
            if !keep.contains(&node) {
                continue;
            }
            for id in citations {
                if let Some(record) = self.annotations.citation(id) {
                    if registry.citation(id).is_none() {
                        registry.insert_citation(id, record.clone());
                    }
                    registry.reference_citation(EntityRef::Node(node), id);
                }
            }
        }
        for (edge, citations) in self.annotations.edge_citation_links() {
            if !sub.edges.contains_key(&edge) {
                continue;
            }
            for id in citations {
                if let Some(record) = self.annotations.citation(id) {
                    if registry.citation(id).is_none() {
                        registry.insert_citation(id, record.clone());
                    }
                    registry.reference_citation(EntityRef::Edge(edge), id);
                }
            }
        }
        for (node, supports) in self.annotations.node_support_links() {
            if !keep.contains(&node) {
                continue;
            }
            for id in supports {
                if let Some(record) = self.annotations.support(id) {
                    if registry.support(id).is_none() {
                        registry.insert_support(id, record.clone());
                    }
                    registry.reference_support(EntityRef::Node(node), id);
                }
            }
        }
        for (edge, supports) in self.annotations.edge_support_links() {
            if !sub.edges.contains_key(&edge) {
                continue;
            }
            for id in supports {
                if let Some(record) = self.annotations.support(id) {
                    if registry.support(id).is_none() {
                        registry.insert_support(id, record.clone());
                    }
                    registry.reference_support(EntityRef::Edge(edge), id);
                }
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
