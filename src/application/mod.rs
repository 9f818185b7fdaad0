//! Application layer: Use cases and services.
//!
//! Ties configuration, ingestion and the graph builders together behind
//! [`GraphService`].

mod analytics;
mod config;
mod graph;

pub use analytics::{summarize, DatasetSummary, PatientSummary};
pub use config::WorkspaceConfig;
pub use graph::{BuildReport, GraphFilter, GraphOutput, GraphService, GraphView};
