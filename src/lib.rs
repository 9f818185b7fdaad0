//! # Cohortgraph
//!
//! Categorical encoding of clinical patient datasets and graph construction
//! over that encoding.
//!
//! Raw patient attributes (numeric ranges, binary flags, ordinal stages) are
//! classified into a fixed taxonomy of containers and labels. Three graph
//! views are built from the resulting observations:
//! - flat: patients linked to shared value nodes
//! - hierarchy: root, gender, age group and attribute nodes, clustering
//!   similar patients
//! - chain: one private attribute path per patient
//!
//! ## Architecture
//!
//! The crate follows Hexagonal Architecture:
//! - `domain`: taxonomy, classifier, patient records, graph types
//! - `ports`: graph-builder and patient-source traits
//! - `adapters`: the three builders, file ingestion, log sanitization
//! - `application`: graph service, dataset summary, configuration

pub mod adapters;
pub mod application;
pub mod domain;
pub mod ports;

pub use application::{GraphFilter, GraphOutput, GraphService, GraphView, WorkspaceConfig};
pub use domain::{Classifier, Container, PatientDataset, PatientRecord, Taxonomy};

/// Result type for cohortgraph operations
pub type Result<T> = std::result::Result<T, CohortGraphError>;

/// Main error type for cohortgraph
#[derive(Debug, thiserror::Error)]
pub enum CohortGraphError {
    #[error("Taxonomy error: {0}")]
    Taxonomy(#[from] domain::TaxonomyError),

    #[error("Ingestion failed: {0}")]
    Ingest(#[from] adapters::IngestError),

    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    #[error("Unknown graph view {0:?}: expected flat, hierarchy or chain")]
    UnknownView(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
