//! Dataset summary: the metrics shown next to a graph.
//!
//! Counts are derived from classified observations, so they agree with what
//! the flat view draws (one edge per observation).

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::domain::{Classifier, Container, MappingStats, PatientDataset, Taxonomy};

/// Observation count for one patient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientSummary {
    pub patient_id: String,
    pub observations: usize,
}

/// Aggregate metrics over a dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetSummary {
    /// Number of patients
    pub patients: usize,

    /// Distinct (patient, container, label) observations
    pub observations: usize,

    /// Containers with at least one observation, in canonical order
    pub containers: Vec<Container>,

    /// Per-patient observation counts, in dataset order
    pub per_patient: Vec<PatientSummary>,

    /// How many patients carry each label
    pub label_counts: BTreeMap<Container, BTreeMap<String, usize>>,

    /// Classification counters
    pub mapping: MappingStats,
}

/// Summarize `dataset` against `taxonomy`.
#[must_use]
pub fn summarize(taxonomy: &Taxonomy, dataset: &PatientDataset) -> DatasetSummary {
    let classifier = Classifier::new(taxonomy);
    let mut mapping = MappingStats::default();
    let mut containers = BTreeSet::new();
    let mut per_patient = Vec::with_capacity(dataset.len());
    let mut label_counts: BTreeMap<Container, BTreeMap<String, usize>> = BTreeMap::new();
    let mut observations = 0usize;

    for record in dataset.records() {
        let distinct: BTreeSet<(Container, String)> = classifier
            .observe(record, &mut mapping)
            .into_iter()
            .map(|o| (o.container, o.label))
            .collect();

        for (container, label) in &distinct {
            containers.insert(*container);
            *label_counts
                .entry(*container)
                .or_default()
                .entry(label.clone())
                .or_default() += 1;
        }

        observations += distinct.len();
        per_patient.push(PatientSummary {
            patient_id: record.patient_id.clone(),
            observations: distinct.len(),
        });
    }

    tracing::info!(
        patients = dataset.len(),
        observations,
        containers = containers.len(),
        "Summarized dataset"
    );

    DatasetSummary {
        patients: dataset.len(),
        observations,
        containers: containers.into_iter().collect(),
        per_patient,
        label_counts,
        mapping,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PatientRecord;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_summary_counts() {
        let dataset = PatientDataset::from_records(vec![
            PatientRecord::new("P1")
                .with("gender", "1")
                .with("HTN", "1")
                .with("Hypertension", "1"),
            PatientRecord::new("P2").with("gender", "1").with("HB", "20"),
            PatientRecord::new("P3").with("CHO", "200"),
        ]);
        let summary = summarize(&Taxonomy::builtin(), &dataset);

        assert_eq!(summary.patients, 3);
        assert_eq!(summary.observations, 4);
        assert_eq!(
            summary.containers,
            vec![Container::Gender, Container::Htn, Container::Hb]
        );
        assert_eq!(
            summary.per_patient.iter().map(|p| p.observations).collect::<Vec<_>>(),
            vec![2, 2, 0]
        );
        assert_eq!(summary.label_counts[&Container::Gender]["Male"], 2);
        assert_eq!(summary.label_counts[&Container::Hb]["HB > 18"], 1);
        assert_eq!(summary.mapping.unmapped_attributes, 1);
    }

    #[test]
    fn test_empty_dataset() {
        let summary = summarize(&Taxonomy::builtin(), &PatientDataset::default());
        assert_eq!(summary.patients, 0);
        assert_eq!(summary.observations, 0);
        assert!(summary.containers.is_empty());
    }
}
