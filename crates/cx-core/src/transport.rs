//! # Transport Collaborator
//!
//! The seam for moving CX byte buffers in and out of the core. The core
//! never opens a connection itself; a transport resolves a locator to a
//! fully materialized buffer and stores a buffer under a new locator.

use crate::graph::CxGraph;
use crate::{CxError, types::TransportError};

/// A blocking byte-buffer transport.
pub trait CxTransport {
    /// Resolve a locator to a complete CX byte buffer.
    fn fetch(&self, locator: &str) -> Result<Vec<u8>, TransportError>;

    /// Store a complete CX byte buffer, returning its new locator.
    fn store(&mut self, bytes: &[u8]) -> Result<String, TransportError>;
}

/// Fetch and parse a graph through a transport.
pub fn fetch_graph<T: CxTransport + ?Sized>(
    transport: &T,
    locator: &str,
) -> Result<CxGraph, CxError> {
    let bytes = transport.fetch(locator).map_err(CxError::Transport)?;
    CxGraph::from_cx(&bytes)
}

/// Serialize and store a graph through a transport, returning its locator.
pub fn store_graph<T: CxTransport + ?Sized>(
    transport: &mut T,
    graph: &CxGraph,
) -> Result<String, CxError> {
    let bytes = graph.to_cx_bytes()?;
    transport.store(&bytes).map_err(CxError::Transport)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    /// In-memory transport keyed by sequential locators.
    #[derive(Default)]
    struct MemoryTransport {
        buffers: BTreeMap<String, Vec<u8>>,
    }

    impl CxTransport for MemoryTransport {
        fn fetch(&self, locator: &str) -> Result<Vec<u8>, TransportError> {
            self.buffers
                .get(locator)
                .cloned()
                .ok_or_else(|| TransportError::NotFound(locator.to_string()))
        }

        fn store(&mut self, bytes: &[u8]) -> Result<String, TransportError> {
            let locator = format!("mem:{}", self.buffers.len());
            self.buffers.insert(locator.clone(), bytes.to_vec());
            Ok(locator)
        }
    }

    #[test]
    fn store_then_fetch_roundtrips_a_graph() {
        let mut graph = CxGraph::new();
        let a = graph.add_node(None, Some("a"), None);
        let b = graph.add_node(None, Some("b"), None);
        graph.add_edge(a, b, None, Some("binds")).expect("add");

        let mut transport = MemoryTransport::default();
        let locator = store_graph(&mut transport, &graph).expect("store");
        let fetched = fetch_graph(&transport, &locator).expect("fetch");

        assert_eq!(fetched.node_count(), 2);
        assert_eq!(fetched.edge_count(), 1);
    }

    #[test]
    fn missing_locator_surfaces_transport_error() {
        let transport = MemoryTransport::default();
        let result = fetch_graph(&transport, "mem:missing");
        assert!(matches!(result, Err(CxError::Transport(_))));
    }
}
