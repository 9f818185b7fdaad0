//! Flat (bipartite) graph builder.
//!
//! One node per patient, one node per distinct (container, label) pair, and
//! one edge per distinct (patient, container, label) observation. Patients
//! only ever connect to values, so the graph is acyclic by construction.

use crate::domain::{
    keys, Classifier, FlatNode, FlatNodeKind, Graph, GraphAssembler, GraphEdge, MappingStats,
    PatientDataset, Taxonomy,
};
use crate::ports::GraphBuilder;

/// Builds the flat patient/value view.
#[derive(Debug, Clone, Copy)]
pub struct FlatBuilder<'t> {
    classifier: Classifier<'t>,
}

impl<'t> FlatBuilder<'t> {
    #[must_use]
    pub fn new(taxonomy: &'t Taxonomy) -> Self {
        Self {
            classifier: Classifier::new(taxonomy),
        }
    }
}

impl GraphBuilder for FlatBuilder<'_> {
    type Node = FlatNode;

    fn view_name(&self) -> &'static str {
        "flat"
    }

    fn build_with_stats(
        &self,
        dataset: &PatientDataset,
        stats: &mut MappingStats,
    ) -> Graph<FlatNode> {
        let mut asm = GraphAssembler::new();

        for record in dataset.records() {
            let patient_node = keys::flat_patient_id(&record.patient_id);
            asm.ensure_node(FlatNode {
                id: patient_node.clone(),
                display_name: record.patient_id.clone(),
                kind: FlatNodeKind::Patient,
                container: None,
                size: 0,
            });

            for obs in self.classifier.observe(record, stats) {
                let value_node = keys::flat_value_id(obs.container, &obs.label);
                asm.ensure_node(FlatNode {
                    id: value_node.clone(),
                    display_name: obs.label.clone(),
                    kind: FlatNodeKind::Value,
                    container: Some(obs.container),
                    size: 0,
                });

                let edge = GraphEdge::new(
                    &patient_node,
                    &value_node,
                    keys::has_relationship(obs.container),
                )
                .for_patient(&record.patient_id);

                if asm.add_edge(edge) {
                    for id in [&patient_node, &value_node] {
                        if let Some(node) = asm.node_mut(id) {
                            node.size += 1;
                        }
                    }
                }
            }
        }

        let graph = asm.finish();
        tracing::info!(
            view = self.view_name(),
            patients = dataset.len(),
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            dropped = stats.dropped(),
            "Built graph"
        );
        graph
    }
}
