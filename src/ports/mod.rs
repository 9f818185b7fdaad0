//! Ports layer: Trait definitions at the edges of the core.
//!
//! Graph builders and patient sources are the two seams: the application
//! layer depends on these traits, adapters implement them.

mod graph_builder;
mod patient_source;

pub use graph_builder::GraphBuilder;
pub use patient_source::PatientSource;
