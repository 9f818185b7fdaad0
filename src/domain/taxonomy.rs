//! Categorical taxonomy: the closed set of containers and their ordered labels.
//!
//! The taxonomy is the ground truth for "does this value map to a known
//! bucket". Labels inside a container are checked in order and the first
//! matching label wins.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Error type for taxonomy loading.
#[derive(Debug, thiserror::Error)]
pub enum TaxonomyError {
    #[error("Unknown container: {0}")]
    UnknownContainer(String),

    #[error("Container {0} contains an empty label")]
    EmptyLabel(Container),

    #[error("Container {container} lists label {label:?} more than once")]
    DuplicateLabel { container: Container, label: String },

    #[error("Taxonomy parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A named category of patient attribute.
///
/// Declaration order is the canonical container order used for iteration
/// and serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Container {
    #[serde(rename = "Gender")]
    Gender,
    #[serde(rename = "Age_Group")]
    AgeGroup,
    #[serde(rename = "DR")]
    Dr,
    #[serde(rename = "HTN")]
    Htn,
    #[serde(rename = "Duration_of_Diabetes")]
    DurationOfDiabetes,
    #[serde(rename = "HB")]
    Hb,
    #[serde(rename = "HBA")]
    Hba,
    #[serde(rename = "DR_Severity_OD")]
    DrSeverityOd,
    #[serde(rename = "DR_Severity_OS")]
    DrSeverityOs,
    #[serde(rename = "EGFR")]
    Egfr,
}

impl Container {
    /// Every container, in canonical order.
    pub const ALL: [Container; 10] = [
        Self::Gender,
        Self::AgeGroup,
        Self::Dr,
        Self::Htn,
        Self::DurationOfDiabetes,
        Self::Hb,
        Self::Hba,
        Self::DrSeverityOd,
        Self::DrSeverityOs,
        Self::Egfr,
    ];

    /// The container name as it appears in taxonomy files.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Gender => "Gender",
            Self::AgeGroup => "Age_Group",
            Self::Dr => "DR",
            Self::Htn => "HTN",
            Self::DurationOfDiabetes => "Duration_of_Diabetes",
            Self::Hb => "HB",
            Self::Hba => "HBA",
            Self::DrSeverityOd => "DR_Severity_OD",
            Self::DrSeverityOs => "DR_Severity_OS",
            Self::Egfr => "EGFR",
        }
    }
}

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Container {
    type Err = TaxonomyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.name() == s)
            .ok_or_else(|| TaxonomyError::UnknownContainer(s.to_string()))
    }
}

const GENDER: &[&str] = &["Male", "Female"];

const AGE_GROUP: &[&str] = &[
    "Age < 40",
    "Age == 40",
    "40 < Age <= 45",
    "45 < Age <= 50",
    "50 < Age <= 55",
    "55 < Age <= 60",
    "60 < Age <= 65",
    "65 < Age <= 70",
    "70 < Age <= 75",
    "75 < Age <= 78",
    "Age > 78",
];

const DR: &[&str] = &["Non_DR_OD", "DR_OD", "Non_DR_OS", "DR_OS"];

const HTN: &[&str] = &["No_HTN", "HTN"];

const DURATION_OF_DIABETES: &[&str] = &[
    "DD <= 5",
    "5 < DD <= 10",
    "10 < DD <= 15",
    "15 < DD <= 20",
    "20 < DD <= 25",
    "25 < DD <= 30",
    "30 < DD <= 35",
    "35 < DD <= 40",
    "DD > 40",
];

const HB: &[&str] = &["HB <= 9", "9 < HB <= 12", "12 < HB <= 15", "15 < HB <= 18", "HB > 18"];

const HBA: &[&str] = &["HBA <= 5", "5 < HBA <= 10", "10 < HBA <= 15", "HBA > 15"];

const SEVERITY: &[&str] = &["Stage 1", "Stage 2", "Stage 3", "Stage 4", "Stage 5"];

const EGFR: &[&str] = &["EGFR >= 90", "EGFR < 90"];

/// Immutable mapping from container to its ordered label list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Taxonomy {
    containers: BTreeMap<Container, Vec<String>>,
}

impl Taxonomy {
    /// The taxonomy shipped with the workspace.
    #[must_use]
    pub fn builtin() -> Self {
        let table: [(Container, &[&str]); 10] = [
            (Container::Gender, GENDER),
            (Container::AgeGroup, AGE_GROUP),
            (Container::Dr, DR),
            (Container::Htn, HTN),
            (Container::DurationOfDiabetes, DURATION_OF_DIABETES),
            (Container::Hb, HB),
            (Container::Hba, HBA),
            (Container::DrSeverityOd, SEVERITY),
            (Container::DrSeverityOs, SEVERITY),
            (Container::Egfr, EGFR),
        ];

        let containers = table
            .into_iter()
            .map(|(container, labels)| {
                (container, labels.iter().map(|l| (*l).to_string()).collect())
            })
            .collect();

        Self { containers }
    }

    /// Build a taxonomy from explicit container label lists.
    ///
    /// Containers that are not listed have no labels, so nothing maps to them.
    ///
    /// # Errors
    /// Returns error on empty or duplicated labels.
    pub fn from_containers(
        containers: impl IntoIterator<Item = (Container, Vec<String>)>,
    ) -> Result<Self, TaxonomyError> {
        let containers: BTreeMap<Container, Vec<String>> = containers.into_iter().collect();

        for (container, labels) in &containers {
            let mut seen = std::collections::HashSet::new();
            for label in labels {
                if label.trim().is_empty() {
                    return Err(TaxonomyError::EmptyLabel(*container));
                }
                if !seen.insert(label.as_str()) {
                    return Err(TaxonomyError::DuplicateLabel {
                        container: *container,
                        label: label.clone(),
                    });
                }
            }
        }

        Ok(Self { containers })
    }

    /// Parse a taxonomy from its JSON form (`{"Container": ["label", ...]}`).
    ///
    /// # Errors
    /// Returns error on malformed JSON, unknown container names or invalid labels.
    pub fn from_json_str(json: &str) -> Result<Self, TaxonomyError> {
        let raw: BTreeMap<String, Vec<String>> = serde_json::from_str(json)?;
        let containers = raw
            .into_iter()
            .map(|(name, labels)| Ok((name.parse::<Container>()?, labels)))
            .collect::<Result<Vec<_>, TaxonomyError>>()?;
        Self::from_containers(containers)
    }

    /// Load a taxonomy JSON file.
    ///
    /// # Errors
    /// Returns error if the file cannot be read or is not a valid taxonomy.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, TaxonomyError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Ordered labels of a container (empty if the container has none).
    #[must_use]
    pub fn labels(&self, container: Container) -> &[String] {
        self.containers
            .get(&container)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Whether `label` is a member of `container`.
    #[must_use]
    pub fn contains(&self, container: Container, label: &str) -> bool {
        self.labels(container).iter().any(|l| l == label)
    }

    /// Iterate containers and their labels in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (Container, &[String])> {
        self.containers.iter().map(|(c, l)| (*c, l.as_slice()))
    }

    /// Render the taxonomy as pretty JSON.
    ///
    /// # Errors
    /// Returns error if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String, TaxonomyError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl Default for Taxonomy {
    fn default() -> Self {
        Self::builtin()
    }
}
