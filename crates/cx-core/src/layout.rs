//! # Layout Collaborator
//!
//! The seam for external layout engines. The core never computes
//! coordinates itself; a provider receives a read view of the graph, the
//! set of pinned nodes, and the current positions, and returns a full
//! assignment which the graph then stores.

use crate::graph::CxGraph;
use crate::{CxError, NodeId};
use std::collections::BTreeMap;

/// Position assignment returned by a layout provider.
pub type PositionMap = BTreeMap<NodeId, (f64, f64)>;

/// A synchronous layout engine.
///
/// Implementations must return a position for every node they want placed;
/// nodes absent from the returned map keep their current position.
pub trait LayoutProvider {
    fn compute(
        &self,
        graph: &CxGraph,
        fixed: &[NodeId],
        initial: &PositionMap,
    ) -> Result<PositionMap, CxError>;
}

impl CxGraph {
    /// Run a layout provider and store its assignment. Pinned nodes keep
    /// their current position regardless of what the provider returns.
    pub fn apply_layout(
        &mut self,
        provider: &dyn LayoutProvider,
        fixed: &[NodeId],
    ) -> Result<(), CxError> {
        let initial: PositionMap = self.positions().collect();
        let computed = provider.compute(self, fixed, &initial)?;
        // Reject the whole assignment before storing any of it, so a bad
        // provider cannot leave a half-applied layout behind.
        for node in computed.keys() {
            if !self.contains_node(*node) {
                return Err(CxError::NodeNotFound(*node));
            }
        }
        for (node, (x, y)) in computed {
            if fixed.contains(&node) {
                continue;
            }
            self.set_position(node, x, y)?;
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
