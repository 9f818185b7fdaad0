//! Chain graph builder.
//!
//! Every patient gets a private path from the shared root through a fixed
//! attribute order. Nodes are never shared between patients, even when the
//! labels are identical. Steps that do not classify are skipped and the
//! next successful step links to the last node placed.

use crate::domain::{
    keys, ChainNode, ChainNodeKind, Classifier, Container, Graph, GraphAssembler, GraphEdge,
    MappingStats, PatientDataset, Taxonomy,
};
use crate::ports::GraphBuilder;

/// Containers walked for every patient, in order.
pub const CHAIN_ORDER: [Container; 6] = [
    Container::Gender,
    Container::AgeGroup,
    Container::DurationOfDiabetes,
    Container::Hba,
    Container::Hb,
    Container::Egfr,
];

/// Default number of patient-id characters kept inside node ids.
pub const DEFAULT_ID_MAX_LEN: usize = 20;

/// Builds one independent chain per patient.
#[derive(Debug, Clone, Copy)]
pub struct ChainBuilder<'t> {
    classifier: Classifier<'t>,
    id_max_len: usize,
}

impl<'t> ChainBuilder<'t> {
    #[must_use]
    pub fn new(taxonomy: &'t Taxonomy) -> Self {
        Self {
            classifier: Classifier::new(taxonomy),
            id_max_len: DEFAULT_ID_MAX_LEN,
        }
    }

    /// Override how many patient-id characters go into node ids.
    #[must_use]
    pub fn with_id_max_len(mut self, id_max_len: usize) -> Self {
        self.id_max_len = id_max_len;
        self
    }
}

impl GraphBuilder for ChainBuilder<'_> {
    type Node = ChainNode;

    fn view_name(&self) -> &'static str {
        "chain"
    }

    fn build_with_stats(
        &self,
        dataset: &PatientDataset,
        stats: &mut MappingStats,
    ) -> Graph<ChainNode> {
        let mut asm = GraphAssembler::new();

        asm.ensure_node(ChainNode {
            id: keys::CHAIN_ROOT_ID.to_string(),
            kind: ChainNodeKind::Root,
            label: "Patient".to_string(),
            container: None,
            patient_id: None,
        });

        for (index, record) in dataset.records().iter().enumerate() {
            let observations = self.classifier.observe(record, stats);

            let mut previous: Option<(String, Container)> = None;
            for container in CHAIN_ORDER {
                // First alias that classified wins.
                let Some(obs) = observations.iter().find(|o| o.container == container) else {
                    continue;
                };

                let id = keys::chain_node_id(
                    container,
                    &obs.label,
                    &record.patient_id,
                    index,
                    self.id_max_len,
                );
                asm.ensure_node(ChainNode {
                    id: id.clone(),
                    kind: ChainNodeKind::Attribute,
                    label: obs.label.clone(),
                    container: Some(container),
                    patient_id: Some(record.patient_id.clone()),
                });

                let (source, prev_container) = match &previous {
                    Some((prev_id, prev_container)) => (prev_id.as_str(), Some(*prev_container)),
                    None => (keys::CHAIN_ROOT_ID, None),
                };
                asm.add_edge(
                    GraphEdge::new(
                        source,
                        &id,
                        keys::chain_relationship(prev_container, container),
                    )
                    .for_patient(&record.patient_id),
                );

                previous = Some((id, container));
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
