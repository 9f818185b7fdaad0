//! Graph service: filter a dataset, build the requested view, report.
//!
//! Every call recomputes from the dataset it is given. The service holds
//! only the taxonomy and build settings, never results.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::adapters::{ChainBuilder, FlatBuilder, HierarchyBuilder};
use crate::domain::{
    resolve_container, ChainNode, Container, FlatNode, Graph, GraphEdge, MappingStats,
    PatientDataset, Taxonomy, TreeNode,
};
use crate::ports::GraphBuilder;
use crate::{CohortGraphError, Result};

use super::analytics::{summarize, DatasetSummary};
use super::config::WorkspaceConfig;

/// The three graph topologies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphView {
    Flat,
    Hierarchy,
    Chain,
}

impl GraphView {
    pub const ALL: [GraphView; 3] = [Self::Flat, Self::Hierarchy, Self::Chain];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Flat => "flat",
            Self::Hierarchy => "hierarchy",
            Self::Chain => "chain",
        }
    }

    /// Whether the view needs gender and age attributes as its spine.
    fn has_spine(self) -> bool {
        matches!(self, Self::Hierarchy | Self::Chain)
    }
}

impl fmt::Display for GraphView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GraphView {
    type Err = CohortGraphError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "flat" | "bipartite" => Ok(Self::Flat),
            "hierarchy" | "tree" => Ok(Self::Hierarchy),
            "chain" => Ok(Self::Chain),
            other => Err(CohortGraphError::UnknownView(other.to_string())),
        }
    }
}

/// Restrictions applied to the dataset before a build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphFilter {
    /// Keep only this patient
    pub patient: Option<String>,

    /// Keep only attributes feeding this container
    pub container: Option<Container>,
}

impl GraphFilter {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patient.is_none() && self.container.is_none()
    }

    /// Apply the filter for `view`.
    ///
    /// The container filter keeps gender and age attributes for views that
    /// hang everything off them.
    ///
    /// # Errors
    /// Returns `InvalidFilter` if the patient is not in the dataset.
    pub fn apply(&self, dataset: &PatientDataset, view: GraphView) -> Result<PatientDataset> {
        let mut filtered = dataset.clone();

        if let Some(patient) = &self.patient {
            if dataset.get(patient).is_none() {
                return Err(CohortGraphError::InvalidFilter(format!(
                    "patient {patient:?} is not in the dataset"
                )));
            }
            filtered = filtered.retain_records(|r| &r.patient_id == patient);
        }

        if let Some(container) = self.container {
            filtered = filtered.retain_attributes(|key| match resolve_container(key) {
                Some(c) if c == container => true,
                Some(Container::Gender | Container::AgeGroup) => view.has_spine(),
                _ => false,
            });
        }

        Ok(filtered)
    }
}

/// A built graph, tagged with its view.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "view", rename_all = "lowercase")]
pub enum GraphOutput {
    Flat(Graph<FlatNode>),
    Hierarchy(Graph<TreeNode>),
    Chain(Graph<ChainNode>),
}

impl GraphOutput {
    #[must_use]
    pub fn view(&self) -> GraphView {
        match self {
            Self::Flat(_) => GraphView::Flat,
            Self::Hierarchy(_) => GraphView::Hierarchy,
            Self::Chain(_) => GraphView::Chain,
        }
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        match self {
            Self::Flat(g) => g.nodes.len(),
            Self::Hierarchy(g) => g.nodes.len(),
            Self::Chain(g) => g.nodes.len(),
        }
    }

    #[must_use]
    pub fn edges(&self) -> &[GraphEdge] {
        match self {
            Self::Flat(g) => &g.edges,
            Self::Hierarchy(g) => &g.edges,
            Self::Chain(g) => &g.edges,
        }
    }

    /// Edges pointing at ids outside the node set. Always zero for graphs
    /// produced by the builders.
    #[must_use]
    pub fn dangling_edge_count(&self) -> usize {
        match self {
            Self::Flat(g) => g.dangling_edges().len(),
            Self::Hierarchy(g) => g.dangling_edges().len(),
            Self::Chain(g) => g.dangling_edges().len(),
        }
    }
}

/// What a build consumed and produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildReport {
    pub view: GraphView,
    pub patients: usize,
    pub nodes: usize,
    pub edges: usize,
    pub mapping: MappingStats,
    pub built_at: DateTime<Utc>,
}

/// Builds graphs against one taxonomy.
#[derive(Debug, Clone)]
pub struct GraphService {
    taxonomy: Taxonomy,
    chain_id_max_len: usize,
}

impl GraphService {
    #[must_use]
    pub fn new(taxonomy: Taxonomy) -> Self {
        Self {
            taxonomy,
            chain_id_max_len: crate::adapters::chain::DEFAULT_ID_MAX_LEN,
        }
    }

    /// Create a service from workspace configuration.
    ///
    /// # Errors
    /// Returns error if the configured taxonomy cannot be loaded.
    pub fn from_config(config: &WorkspaceConfig) -> Result<Self> {
        Ok(Self {
            taxonomy: config.load_taxonomy()?,
            chain_id_max_len: config.chain_id_max_len,
        })
    }

    /// Filter `dataset` and build `view` from scratch.
    ///
    /// # Errors
    /// Returns `InvalidFilter` if the filter names an unknown patient.
    pub fn build(
        &self,
        view: GraphView,
        dataset: &PatientDataset,
        filter: &GraphFilter,
    ) -> Result<(GraphOutput, BuildReport)> {
        let dataset = filter.apply(dataset, view)?;
        let mut mapping = MappingStats::default();

        let output = match view {
            GraphView::Flat => GraphOutput::Flat(
                FlatBuilder::new(&self.taxonomy).build_with_stats(&dataset, &mut mapping),
            ),
            GraphView::Hierarchy => GraphOutput::Hierarchy(
                HierarchyBuilder::new(&self.taxonomy).build_with_stats(&dataset, &mut mapping),
            ),
            GraphView::Chain => GraphOutput::Chain(
                ChainBuilder::new(&self.taxonomy)
                    .with_id_max_len(self.chain_id_max_len)
                    .build_with_stats(&dataset, &mut mapping),
            ),
        };

        let report = BuildReport {
            view,
            patients: dataset.len(),
            nodes: output.node_count(),
            edges: output.edges().len(),
            mapping,
            built_at: Utc::now(),
        };

        if mapping.dropped() > 0 {
            tracing::debug!(
                view = %view,
                empty = mapping.empty_values,
                unknown = mapping.unknown_attributes,
                unmapped_attributes = mapping.unmapped_attributes,
                unmapped_values = mapping.unmapped_values,
                outside_taxonomy = mapping.outside_taxonomy,
                "Fields dropped during classification"
            );
        }

        Ok((output, report))
    }

    /// Summary metrics for `dataset`.
    #[must_use]
    pub fn summarize(&self, dataset: &PatientDataset) -> DatasetSummary {
        summarize(&self.taxonomy, dataset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PatientRecord;

    fn dataset() -> PatientDataset {
        PatientDataset::from_records(vec![
            PatientRecord::new("P1")
                .with("gender", "1")
                .with("age", "45")
                .with("HB", "10")
                .with("EGFR", "85"),
            PatientRecord::new("P2")
                .with("gender", "0")
                .with("age", "61")
                .with("HB", "14")
                .with("BMI", "30"),
        ])
    }

    #[test]
    fn test_view_parsing() {
        assert_eq!("flat".parse::<GraphView>().ok(), Some(GraphView::Flat));
        assert_eq!(" Tree ".parse::<GraphView>().ok(), Some(GraphView::Hierarchy));
        assert_eq!("CHAIN".parse::<GraphView>().ok(), Some(GraphView::Chain));
        assert!(matches!(
            "radial".parse::<GraphView>(),
            Err(CohortGraphError::UnknownView(v)) if v == "radial"
        ));
        for view in GraphView::ALL {
            assert_eq!(view.to_string().parse::<GraphView>().ok(), Some(view));
        }
    }

    #[test]
    fn test_build_every_view() {
        let service = GraphService::new(Taxonomy::builtin());
        let data = dataset();
        for view in GraphView::ALL {
            let (output, report) = service
                .build(view, &data, &GraphFilter::default())
                .expect("Should build");
            assert_eq!(output.view(), view);
            assert_eq!(report.patients, 2);
            assert_eq!(report.nodes, output.node_count());
            assert_eq!(output.dangling_edge_count(), 0);
            assert_eq!(report.mapping.observations, 7);
            assert_eq!(report.mapping.unmapped_attributes, 1);
        }
    }

    #[test]
    fn test_builder_names_match_views() {
        let taxonomy = Taxonomy::builtin();
        assert_eq!(FlatBuilder::new(&taxonomy).view_name(), GraphView::Flat.as_str());
        assert_eq!(
            HierarchyBuilder::new(&taxonomy).view_name(),
            GraphView::Hierarchy.as_str()
        );
        assert_eq!(ChainBuilder::new(&taxonomy).view_name(), GraphView::Chain.as_str());
    }

    #[test]
    fn test_report_counts_each_field_once() {
        let service = GraphService::new(Taxonomy::builtin());
        let data = dataset();
        for view in GraphView::ALL {
            let (_, report) = service
                .build(view, &data, &GraphFilter::default())
                .expect("Should build");
            assert_eq!(report.mapping.fields_seen, 8);
            assert_eq!(report.mapping.dropped(), 1);
        }
    }

    #[test]
    fn test_builds_are_idempotent() {
        let service = GraphService::new(Taxonomy::builtin());
        let data = dataset();
        for view in GraphView::ALL {
            let (a, _) = service.build(view, &data, &GraphFilter::default()).expect("Build");
            let (b, _) = service.build(view, &data, &GraphFilter::default()).expect("Build");
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_patient_filter() {
        let service = GraphService::new(Taxonomy::builtin());
        let filter = GraphFilter {
            patient: Some("P2".to_string()),
            container: None,
        };
        let (output, report) = service
            .build(GraphView::Flat, &dataset(), &filter)
            .expect("Should build");
        assert_eq!(report.patients, 1);
        assert!(output.edges().iter().all(|e| e.patient_id.as_deref() == Some("P2")));

        let unknown = GraphFilter {
            patient: Some("P404".to_string()),
            container: None,
        };
        assert!(matches!(
            service.build(GraphView::Flat, &dataset(), &unknown),
            Err(CohortGraphError::InvalidFilter(_))
        ));
    }

    #[test]
    fn test_container_filter_keeps_spine_for_tree_views() {
        let service = GraphService::new(Taxonomy::builtin());
        let filter = GraphFilter {
            patient: None,
            container: Some(Container::Hb),
        };

        let (flat, _) = service.build(GraphView::Flat, &dataset(), &filter).expect("Build");
        assert!(flat
            .edges()
            .iter()
            .all(|e| e.relationship_kind == "HAS_HB"));
        assert_eq!(flat.edges().len(), 2);

        let (tree, _) = service
            .build(GraphView::Hierarchy, &dataset(), &filter)
            .expect("Build");
        let GraphOutput::Hierarchy(graph) = tree else {
            panic!("Expected hierarchy output");
        };
        assert!(graph.node("patient-root-male").is_some());
        assert!(graph.nodes.iter().all(|n| n.container != Some(Container::Egfr)));
    }

    #[test]
    fn test_output_serialization_shape() {
        let service = GraphService::new(Taxonomy::builtin());
        let (output, report) = service
            .build(GraphView::Chain, &dataset(), &GraphFilter::default())
            .expect("Build");
        let json = serde_json::to_value(&output).expect("Serialize");
        assert_eq!(json["view"], "chain");
        assert!(json["nodes"].is_array());
        assert!(json["edges"][0]["sourceNodeId"].is_string());

        let report = serde_json::to_value(&report).expect("Serialize");
        assert_eq!(report["view"], "chain");
        assert!(report["builtAt"].is_string());
        assert_eq!(report["mapping"]["fieldsSeen"], 8);
    }
}
