//! Adapters layer: Concrete implementations of ports.
//!
//! - `bipartite`: flat patient/value graph
//! - `hierarchy`: gender/age-group clustering tree
//! - `chain`: per-patient attribute chains
//! - `ingest`: JSON, YAML, CSV and TSV patient files
//! - `sanitize`: identifier filtering for logs

pub mod bipartite;
pub mod chain;
pub mod hierarchy;
pub mod ingest;
pub mod sanitize;

pub use bipartite::FlatBuilder;
pub use chain::ChainBuilder;
pub use hierarchy::HierarchyBuilder;
pub use ingest::{FileSource, IngestError, IngestFormat, IngestLimits};
