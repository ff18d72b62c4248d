//! # Core Type Definitions
//!
//! Identifiers and the error type shared by every module of the CX model:
//! - Graph identifiers (`NodeId`, `EdgeId`)
//! - Annotation identifiers (`CitationId`, `SupportId`)
//! - `EntityRef`, the node-or-edge discriminator used by annotation
//!   reference maps
//! - Error type (`CxError`)
//!
//! ## Determinism Guarantees
//!
//! All identifier types implement `Ord` so they can key `BTreeMap`/`BTreeSet`
//! with fully deterministic iteration order.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// GRAPH IDENTIFIERS
// =============================================================================

/// Identifier of a node in the graph.
///
/// CX element ids are JSON longs; they are either assigned by the stream
/// being parsed or minted locally, and are never reused within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub i64);

/// Identifier of an edge, unique across the whole graph (not per node pair).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(pub i64);

// =============================================================================
// ANNOTATION IDENTIFIERS
// =============================================================================

/// Identifier of a citation record in the annotation registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CitationId(pub i64);

/// Identifier of a support record in the annotation registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SupportId(pub i64);

// =============================================================================
// ENTITY REFERENCE
// =============================================================================

/// A reference to either a node or an edge.
///
/// Citation and support records are shared between entities of both kinds;
/// the registry keys its reference maps on this discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EntityRef {
    /// A node entity.
    Node(NodeId),
    /// An edge entity.
    Edge(EdgeId),
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors surfaced by the CX model.
///
/// All errors are local and synchronous; nothing is retried internally.
/// A parse failure aborts the whole parse so a partially constructed graph
/// is never returned.
#[derive(Debug, Error)]
pub enum CxError {
    /// The aspect stream is structurally invalid: an unknown node/edge
    /// reference, a duplicate collection-level fragment, or a mismatched
    /// subnetwork/view pairing at serialize time.
    #[error("malformed CX stream: {0}")]
    MalformedStream(String),

    /// A typed value could not be decoded: unrecognized type tag or
    /// non-convertible text.
    #[error("value codec error: {0}")]
    Codec(String),

    /// A mutation referenced a node id that is not in the graph.
    #[error("node not found: {0:?}")]
    NodeNotFound(NodeId),

    /// A mutation referenced an edge id that is not in the edge index.
    #[error("edge not found: {0:?}")]
    EdgeNotFound(EdgeId),

    /// Internal state violates a structural invariant, e.g. a populated
    /// position table without both subnetwork and view ids set.
    #[error("inconsistent state: {0}")]
    Consistency(String),

    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The transport collaborator failed to fetch or store a stream.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Errors raised by a transport collaborator.
///
/// Kept separate from [`CxError`] so transports can be implemented without
/// depending on the model's error vocabulary.
#[derive(Debug, Error)]
pub enum TransportError {
    /// No stream exists under the requested locator.
    #[error("locator not found: {0}")]
    NotFound(String),

    /// The underlying channel failed.
    #[error("transport I/O failure: {0}")]
    Io(String),
}

impl From<serde_json::Error> for CxError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn ids_order_deterministically() {
        let mut set = BTreeSet::new();
        set.insert(NodeId(3));
        set.insert(NodeId(1));
        set.insert(NodeId(2));

        let ids: Vec<_> = set.into_iter().collect();
        assert_eq!(ids, vec![NodeId(1), NodeId(2), NodeId(3)]);
    }

    #[test]
    fn entity_refs_of_different_kinds_are_distinct() {
        assert_ne!(EntityRef::Node(NodeId(1)), EntityRef::Edge(EdgeId(1)));
    }

    #[test]
    fn node_id_serializes_transparently() {
        let json = serde_json::to_string(&NodeId(42)).expect("serialize");
        assert_eq!(json, "42");
    }

    #[test]
    fn error_messages_name_the_entity() {
        let err = CxError::NodeNotFound(NodeId(7));
        assert!(err.to_string().contains("NodeId(7)"));
    }
}
