//! Domain layer: Core types and pure logic.
//!
//! Taxonomy, attribute resolution, range matching and classification live
//! here, together with the graph types the builders produce. Nothing in this
//! layer performs I/O except taxonomy loading.

mod attribute;
mod classifier;
mod graph;
pub mod keys;
mod patient;
mod range;
mod taxonomy;

pub use attribute::{resolve_container, Attribute};
pub use classifier::{Classifier, MappingStats, Observation, EGFR_THRESHOLD};
pub use graph::{
    ChainNode, ChainNodeKind, FlatNode, FlatNodeKind, Graph, GraphAssembler, GraphEdge, GraphNode,
    TreeNode, TreeNodeKind,
};
pub use patient::{PatientDataset, PatientRecord, RawValue, ID_FIELD};
pub use range::{match_range, Comparison, RangeParseError, RangePredicate};
pub use taxonomy::{Container, Taxonomy, TaxonomyError};
