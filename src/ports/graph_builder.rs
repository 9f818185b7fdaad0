//! Graph builder port: one trait per graph topology.
//!
//! Builders are pure. Each call receives a complete dataset and returns a
//! fresh graph; nothing is cached between calls.

use serde::Serialize;

use crate::domain::{Graph, GraphNode, MappingStats, PatientDataset};

/// A strategy turning patient records into a node/edge collection.
pub trait GraphBuilder {
    /// Node flavour produced by this builder.
    type Node: GraphNode + Serialize + Clone;

    /// Short name of the view (`flat`, `hierarchy`, `chain`).
    fn view_name(&self) -> &'static str;

    /// Build the graph for `dataset`, adding classification counters to
    /// `stats`.
    ///
    /// Data that does not classify is dropped, never reported as an error.
    fn build_with_stats(
        &self,
        dataset: &PatientDataset,
        stats: &mut MappingStats,
    ) -> Graph<Self::Node>;

    /// Build the graph for `dataset`, discarding the counters.
    fn build(&self, dataset: &PatientDataset) -> Graph<Self::Node> {
        let mut stats = MappingStats::default();
        self.build_with_stats(dataset, &mut stats)
    }
}
