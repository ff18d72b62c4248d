//! # cx-core
//!
//! The in-memory model for the CX biological-network interchange format -
//! THE MODEL.
//!
//! This crate implements the pure core of a CX toolchain: parsing an aspect
//! stream into a typed multigraph, mutating it through an explicit API, and
//! serializing it back with regenerated metadata. A CX document is an
//! ordered JSON array of single-key fragments; everything the model does
//! not interpret passes through untouched.
//!
//! ## Architectural Constraints
//!
//! The core:
//! - Is synchronous, single-threaded, and in-memory; no operation blocks
//!   on I/O
//! - Never opens a connection; transports hand it fully materialized byte
//!   buffers
//! - Never computes coordinates; layout engines are external collaborators
//! - Is deterministic: all tables are ordered, so identical graphs
//!   serialize identically
//! - Aborts a parse completely on the first failure; a partially built
//!   graph is never observable

// =============================================================================
// MODULES
// =============================================================================

pub mod aspect;
pub mod classifier;
pub mod codec;
pub mod graph;
pub mod layout;
pub mod registry;
pub mod serializer;
pub mod transport;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{CitationId, CxError, EdgeId, EntityRef, NodeId, SupportId, TransportError};

// =============================================================================
// RE-EXPORTS: Model
// =============================================================================

pub use aspect::{Fragment, MetadataEntry, emit_fragments, parse_fragments};
pub use classifier::build_graph;
pub use codec::{AttrValue, DataType, ScalarType};
pub use graph::{AttrTable, CxGraph, EdgeRecord, NodeRecord};
pub use registry::{AnnotationRegistry, PropertyBag};
pub use serializer::generate_metadata;

// =============================================================================
// RE-EXPORTS: Collaborator Seams
// =============================================================================

pub use layout::{LayoutProvider, PositionMap};
pub use transport::{CxTransport, fetch_graph, store_graph};
