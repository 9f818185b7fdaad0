//! Hierarchical tree builder.
//!
//! Root -> gender -> age group -> attribute, with leaf edges from each
//! attribute node to the patients that carry it. Patients sharing gender,
//! age group and attribute converge on one attribute node.
//!
//! Gender is mandatory: patients without a mappable gender are left out of
//! the tree. A patient without a mappable age group hangs directly off its
//! gender node, and its attributes form a gender-level layer keyed
//! `patient-{gender}-{container}-{label}` that a strict gender/age tree
//! would not have.

use crate::domain::{
    keys, Classifier, Container, Graph, GraphAssembler, GraphEdge, MappingStats, Observation,
    PatientDataset, Taxonomy, TreeNode, TreeNodeKind,
};
use crate::ports::GraphBuilder;

pub const HAS_GENDER: &str = "HAS_GENDER";
pub const HAS_AGE_GROUP: &str = "HAS_AGE_GROUP";
pub const HAS_ATTRIBUTE: &str = "HAS_ATTRIBUTE";
pub const OBSERVED_IN: &str = "OBSERVED_IN";

/// Builds the gender/age-group clustering tree.
#[derive(Debug, Clone, Copy)]
pub struct HierarchyBuilder<'t> {
    classifier: Classifier<'t>,
}

impl<'t> HierarchyBuilder<'t> {
    #[must_use]
    pub fn new(taxonomy: &'t Taxonomy) -> Self {
        Self {
            classifier: Classifier::new(taxonomy),
        }
    }
}

fn structural(
    id: String,
    display_name: &str,
    kind: TreeNodeKind,
    parent_id: Option<&str>,
    container: Option<Container>,
) -> TreeNode {
    TreeNode {
        id,
        display_name: display_name.to_string(),
        kind,
        parent_id: parent_id.map(str::to_string),
        container,
    }
}

fn label_of(observations: &[Observation], container: Container) -> Option<&str> {
    observations
        .iter()
        .find(|o| o.container == container)
        .map(|o| o.label.as_str())
}

impl GraphBuilder for HierarchyBuilder<'_> {
    type Node = TreeNode;

    fn view_name(&self) -> &'static str {
        "hierarchy"
    }

    fn build_with_stats(
        &self,
        dataset: &PatientDataset,
        stats: &mut MappingStats,
    ) -> Graph<TreeNode> {
        let mut asm = GraphAssembler::new();
        let mut excluded = 0usize;

        asm.ensure_node(structural(
            keys::TREE_ROOT_ID.to_string(),
            "Patient",
            TreeNodeKind::Root,
            None,
            None,
        ));

        for record in dataset.records() {
            let observations = self.classifier.observe(record, stats);

            let Some(gender) = label_of(&observations, Container::Gender) else {
                excluded += 1;
                continue;
            };
            let age_group = label_of(&observations, Container::AgeGroup);

            let gender_id = keys::tree_gender_id(gender);
            asm.ensure_node(structural(
                gender_id.clone(),
                gender,
                TreeNodeKind::Gender,
                Some(keys::TREE_ROOT_ID),
                Some(Container::Gender),
            ));
            asm.add_edge(GraphEdge::new(keys::TREE_ROOT_ID, &gender_id, HAS_GENDER));

            let spine_id = match age_group {
                Some(age) => {
                    let age_id = keys::tree_age_id(gender, age);
                    asm.ensure_node(structural(
                        age_id.clone(),
                        age,
                        TreeNodeKind::AgeGroup,
                        Some(gender_id.as_str()),
                        Some(Container::AgeGroup),
                    ));
                    asm.add_edge(GraphEdge::new(&gender_id, &age_id, HAS_AGE_GROUP));
                    age_id
                }
                None => gender_id,
            };

            let patient_id = keys::flat_patient_id(&record.patient_id);
            asm.ensure_node(TreeNode {
                id: patient_id.clone(),
                display_name: record.patient_id.clone(),
                kind: TreeNodeKind::Patient,
                parent_id: None,
                container: None,
            });

            let mut attached = false;
            for obs in observations
                .iter()
                .filter(|o| !matches!(o.container, Container::Gender | Container::AgeGroup))
            {
                let attribute_id =
                    keys::tree_attribute_id(gender, age_group, obs.container, &obs.label);
                asm.ensure_node(structural(
                    attribute_id.clone(),
                    &obs.label,
                    TreeNodeKind::Attribute,
                    Some(spine_id.as_str()),
                    Some(obs.container),
                ));
                asm.add_edge(GraphEdge::new(&spine_id, &attribute_id, HAS_ATTRIBUTE));
                asm.add_edge(
                    GraphEdge::new(&attribute_id, &patient_id, OBSERVED_IN)
                        .for_patient(&record.patient_id),
                );
                attached = true;
            }

            if !attached {
                asm.add_edge(
                    GraphEdge::new(&spine_id, &patient_id, OBSERVED_IN)
                        .for_patient(&record.patient_id),
                );
            }
        }

        if excluded > 0 {
            tracing::debug!(excluded, "Patients without a mappable gender left out of the tree");
        }

        let graph = asm.finish();
        tracing::info!(
            view = self.view_name(),
            patients = dataset.len() - excluded,
            excluded,
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            dropped = stats.dropped(),
            "Built graph"
        );
        graph
    }
}
