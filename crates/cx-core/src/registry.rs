//! # Annotation Registry
//!
//! Reference-counted store for citation and support records.
//!
//! Records are free-form property bags keyed by locally minted integer ids
//! and shared between nodes and edges through reference lists. A record is
//! owned collectively by its referencers: the registry counts references
//! incrementally and drops a record the moment its count reaches zero.
//!
//! Counts are never recomputed by scanning - removal of an entity costs
//! O(number of references that entity held).

use crate::{CitationId, EdgeId, EntityRef, NodeId, SupportId};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// The free-form property bag of a citation or support record.
///
/// Key order is preserved so records round-trip as received.
pub type PropertyBag = Map<String, Value>;

// =============================================================================
// RECORD STORE
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
struct RecordEntry {
    properties: PropertyBag,
    refs: u64,
}

/// One family of records (citations or supports) with its reference maps.
///
/// Ids are raw here; the registry facade exposes the typed ids.
#[derive(Debug, Clone, Default, PartialEq)]
struct RecordStore {
    records: BTreeMap<i64, RecordEntry>,
    node_refs: BTreeMap<NodeId, Vec<i64>>,
    edge_refs: BTreeMap<EdgeId, Vec<i64>>,
    /// Monotonic id watermark; minted ids are never reused.
    max_id: i64,
}

impl RecordStore {
    fn insert(&mut self, id: i64, properties: PropertyBag) {
        self.max_id = self.max_id.max(id);
        self.records.insert(
            id,
            RecordEntry {
                properties,
                refs: 0,
            },
        );
    }

    fn add(&mut self, properties: PropertyBag) -> i64 {
        let id = self.max_id.saturating_add(1);
        self.insert(id, properties);
        id
    }

    /// Idempotent: re-adding the same (entity, record) reference does not
    /// double the count.
    fn reference(&mut self, entity: EntityRef, id: i64) {
        let list = match entity {
            EntityRef::Node(node) => self.node_refs.entry(node).or_default(),
            EntityRef::Edge(edge) => self.edge_refs.entry(edge).or_default(),
        };
        if list.contains(&id) {
            return;
        }
        list.push(id);
        if let Some(entry) = self.records.get_mut(&id) {
            entry.refs = entry.refs.saturating_add(1);
        }
    }

    /// Decrement the count of every record the entity referenced, dropping
    /// records that reach zero. Unknown record ids are a no-op; the store
    /// may hold stale ids during partial teardown.
    fn release_all_for(&mut self, entity: EntityRef) {
        let list = match entity {
            EntityRef::Node(node) => self.node_refs.remove(&node),
            EntityRef::Edge(edge) => self.edge_refs.remove(&edge),
        };
        let Some(list) = list else {
            return;
        };
        for id in list {
            let Some(entry) = self.records.get_mut(&id) else {
                continue;
            };
            debug_assert!(entry.refs > 0, "reference count underflow");
            entry.refs = entry.refs.saturating_sub(1);
            if entry.refs == 0 {
                self.records.remove(&id);
            }
        }
    }

    fn get(&self, id: i64) -> Option<&PropertyBag> {
        self.records.get(&id).map(|entry| &entry.properties)
    }

    fn ref_count(&self, id: i64) -> Option<u64> {
        self.records.get(&id).map(|entry| entry.refs)
    }
}

// =============================================================================
// ANNOTATION REGISTRY
// =============================================================================

/// The registry holding both record families and their reference maps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotationRegistry {
    citations: RecordStore,
    supports: RecordStore,
}

impl AnnotationRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Release every citation and support reference held by the entity.
    /// Called when the entity is removed from the graph.
    pub fn release_all_for(&mut self, entity: EntityRef) {
        self.citations.release_all_for(entity);
        self.supports.release_all_for(entity);
    }

    // -------------------------------------------------------------------------
    // Citations
    // -------------------------------------------------------------------------

    /// Add a citation record with a freshly minted id.
    pub fn add_citation(&mut self, properties: PropertyBag) -> CitationId {
        CitationId(self.citations.add(properties))
    }

    /// Insert a citation record under an externally assigned id (parse path).
    pub fn insert_citation(&mut self, id: CitationId, properties: PropertyBag) {
        self.citations.insert(id.0, properties);
    }

    /// Record that an entity references a citation. Idempotent.
    pub fn reference_citation(&mut self, entity: EntityRef, id: CitationId) {
        self.citations.reference(entity, id.0);
    }

    /// Look up a citation record.
    #[must_use]
    pub fn citation(&self, id: CitationId) -> Option<&PropertyBag> {
        self.citations.get(id.0)
    }

    /// Current reference count of a citation record.
    #[must_use]
    pub fn citation_ref_count(&self, id: CitationId) -> Option<u64> {
        self.citations.ref_count(id.0)
    }

    /// All citation records in id order.
    pub fn citations(&self) -> impl Iterator<Item = (CitationId, &PropertyBag)> {
        self.citations
            .records
            .iter()
            .map(|(id, entry)| (CitationId(*id), &entry.properties))
    }

    /// Node-to-citation reference lists in node-id order.
    pub fn node_citation_links(&self) -> impl Iterator<Item = (NodeId, Vec<CitationId>)> + '_ {
        self.citations
            .node_refs
            .iter()
            .map(|(node, ids)| (*node, ids.iter().map(|id| CitationId(*id)).collect()))
    }

    /// Edge-to-citation reference lists in edge-id order.
    pub fn edge_citation_links(&self) -> impl Iterator<Item = (EdgeId, Vec<CitationId>)> + '_ {
        self.citations
            .edge_refs
            .iter()
            .map(|(edge, ids)| (*edge, ids.iter().map(|id| CitationId(*id)).collect()))
    }

    /// Number of citation records currently held.
    #[must_use]
    pub fn citation_count(&self) -> usize {
        self.citations.records.len()
    }

    /// Number of nodes holding citation references.
    #[must_use]
    pub fn node_citation_link_count(&self) -> usize {
        self.citations.node_refs.len()
    }

    /// Number of edges holding citation references.
    #[must_use]
    pub fn edge_citation_link_count(&self) -> usize {
        self.citations.edge_refs.len()
    }

    /// The highest citation id ever in use.
    #[must_use]
    pub fn max_citation_id(&self) -> i64 {
        self.citations.max_id
    }

    // -------------------------------------------------------------------------
    // Supports
    // -------------------------------------------------------------------------

    /// Add a support record with a freshly minted id.
    pub fn add_support(&mut self, properties: PropertyBag) -> SupportId {
        SupportId(self.supports.add(properties))
    }

    /// Insert a support record under an externally assigned id (parse path).
    pub fn insert_support(&mut self, id: SupportId, properties: PropertyBag) {
        self.supports.insert(id.0, properties);
    }

    /// Record that an entity references a support. Idempotent.
    pub fn reference_support(&mut self, entity: EntityRef, id: SupportId) {
        self.supports.reference(entity, id.0);
    }

    /// Look up a support record.
    #[must_use]
    pub fn support(&self, id: SupportId) -> Option<&PropertyBag> {
        self.supports.get(id.0)
    }

    /// Current reference count of a support record.
    #[must_use]
    pub fn support_ref_count(&self, id: SupportId) -> Option<u64> {
        self.supports.ref_count(id.0)
    }

    /// All support records in id order.
    pub fn supports(&self) -> impl Iterator<Item = (SupportId, &PropertyBag)> {
        self.supports
            .records
            .iter()
            .map(|(id, entry)| (SupportId(*id), &entry.properties))
    }

    /// Node-to-support reference lists in node-id order.
    pub fn node_support_links(&self) -> impl Iterator<Item = (NodeId, Vec<SupportId>)> + '_ {
        self.supports
            .node_refs
            .iter()
            .map(|(node, ids)| (*node, ids.iter().map(|id| SupportId(*id)).collect()))
    }

    /// Edge-to-support reference lists in edge-id order.
    pub fn edge_support_links(&self) -> impl Iterator<Item = (EdgeId, Vec<SupportId>)> + '_ {
        self.supports
            .edge_refs
            .iter()
            .map(|(edge, ids)| (*edge, ids.iter().map(|id| SupportId(*id)).collect()))
    }

    /// Number of support records currently held.
    #[must_use]
    pub fn support_count(&self) -> usize {
        self.supports.records.len()
    }

    /// Number of nodes holding support references.
    #[must_use]
    pub fn node_support_link_count(&self) -> usize {
        self.supports.node_refs.len()
    }

    /// Number of edges holding support references.
    #[must_use]
    pub fn edge_support_link_count(&self) -> usize {
        self.supports.edge_refs.len()
    }

    /// The highest support id ever in use.
    #[must_use]
    pub fn max_support_id(&self) -> i64 {
        self.supports.max_id
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn bag(key: &str, value: &str) -> PropertyBag {
        let mut map = PropertyBag::new();
        map.insert(key.to_string(), Value::String(value.to_string()));
        map
    }

    #[test]
    fn minted_ids_start_at_one_and_increase() {
        let mut registry = AnnotationRegistry::new();
        let first = registry.add_citation(bag("dc:title", "a"));
        let second = registry.add_citation(bag("dc:title", "b"));

        assert_eq!(first, CitationId(1));
        assert_eq!(second, CitationId(2));
    }

    #[test]
    fn minting_continues_past_inserted_ids() {
        let mut registry = AnnotationRegistry::new();
        registry.insert_support(SupportId(40), bag("text", "x"));
        let minted = registry.add_support(bag("text", "y"));
        assert_eq!(minted, SupportId(41));
    }

    #[test]
    fn reference_is_idempotent() {
        let mut registry = AnnotationRegistry::new();
        let id = registry.add_citation(bag("dc:title", "a"));
        let node = EntityRef::Node(NodeId(1));

        registry.reference_citation(node, id);
        registry.reference_citation(node, id);

        assert_eq!(registry.citation_ref_count(id), Some(1));
    }

    #[test]
    fn release_drops_record_at_zero() {
        let mut registry = AnnotationRegistry::new();
        let id = registry.add_citation(bag("dc:title", "a"));
        let node = EntityRef::Node(NodeId(1));
        let edge = EntityRef::Edge(EdgeId(10));

        registry.reference_citation(node, id);
        registry.reference_citation(edge, id);
        assert_eq!(registry.citation_ref_count(id), Some(2));

        registry.release_all_for(node);
        assert_eq!(registry.citation_ref_count(id), Some(1));
        assert!(registry.citation(id).is_some());

        registry.release_all_for(edge);
        assert!(registry.citation(id).is_none());
        assert_eq!(registry.citation_count(), 0);
    }

    #[test]
    fn unreferenced_record_survives_releases() {
        let mut registry = AnnotationRegistry::new();
        let id = registry.add_support(bag("text", "standalone"));

        registry.release_all_for(EntityRef::Node(NodeId(1)));
        assert!(registry.support(id).is_some());
    }

    #[test]
    fn release_with_stale_id_is_noop() {
        let mut registry = AnnotationRegistry::new();
        let node = EntityRef::Node(NodeId(1));
        // Reference a record that was never added.
        registry.reference_citation(node, CitationId(99));
        registry.release_all_for(node);
        assert_eq!(registry.citation_count(), 0);
    }

    #[test]
    fn citation_and_support_families_are_independent() {
        let mut registry = AnnotationRegistry::new();
        let citation = registry.add_citation(bag("dc:title", "a"));
        let support = registry.add_support(bag("text", "b"));

        assert_eq!(citation.0, support.0);
        assert_eq!(registry.citation_count(), 1);
        assert_eq!(registry.support_count(), 1);
    }

    #[test]
    fn link_iterators_report_reference_lists() {
        let mut registry = AnnotationRegistry::new();
        let a = registry.add_citation(bag("dc:title", "a"));
        let b = registry.add_citation(bag("dc:title", "b"));
        registry.reference_citation(EntityRef::Node(NodeId(5)), a);
        registry.reference_citation(EntityRef::Node(NodeId(5)), b);

        let links: Vec<_> = registry.node_citation_links().collect();
        assert_eq!(links, vec![(NodeId(5), vec![a, b])]);
    }
}
