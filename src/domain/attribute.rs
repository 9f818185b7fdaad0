//! Patient attributes and their resolution to taxonomy containers.
//!
//! Raw attribute keys come in several historical spellings
//! (`Durationofdiabetes` / `Duration_of_Diabetes`, `Hypertension` / `HTN`, ...).
//! Each spelling resolves to one [`Attribute`], and each attribute resolves to
//! at most one [`Container`].

use std::fmt;

use serde::Serialize;

use super::taxonomy::Container;

/// The closed set of attributes the classifier understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Attribute {
    Gender,
    Age,
    DurationOfDiabetes,
    Bmi,
    Hba,
    Hb,
    Egfr,
    Hypertension,
    Oha,
    Insulin,
    Cho,
    Tri,
    DrOd,
    DrOs,
    DrSeverityOd,
    DrSeverityOs,
}

/// Recognized raw keys. Matching is exact and case-sensitive.
const ALIASES: &[(&str, Attribute)] = &[
    ("gender", Attribute::Gender),
    ("age", Attribute::Age),
    ("Durationofdiabetes", Attribute::DurationOfDiabetes),
    ("Duration_of_Diabetes", Attribute::DurationOfDiabetes),
    ("BMI", Attribute::Bmi),
    ("HBA", Attribute::Hba),
    ("HB", Attribute::Hb),
    ("EGFR", Attribute::Egfr),
    ("Hypertension", Attribute::Hypertension),
    ("HTN", Attribute::Hypertension),
    ("OHA", Attribute::Oha),
    ("INSULIN", Attribute::Insulin),
    ("CHO", Attribute::Cho),
    ("TRI", Attribute::Tri),
    ("DR_OD", Attribute::DrOd),
    ("DR_OS", Attribute::DrOs),
    ("DR_SEVERITY_OD", Attribute::DrSeverityOd),
    ("DR_Severity_OD", Attribute::DrSeverityOd),
    ("DR_SEVERITY_OS", Attribute::DrSeverityOs),
    ("DR_Severity_OS", Attribute::DrSeverityOs),
];

impl Attribute {
    /// Look up the attribute for a raw key.
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        ALIASES
            .iter()
            .find(|(alias, _)| *alias == key)
            .map(|(_, attribute)| *attribute)
    }

    /// The taxonomy container this attribute feeds.
    ///
    /// `None` for known-but-unmapped attributes (BMI, CHO, TRI, OHA, INSULIN).
    #[must_use]
    pub fn container(self) -> Option<Container> {
        match self {
            Self::Gender => Some(Container::Gender),
            Self::Age => Some(Container::AgeGroup),
            Self::DurationOfDiabetes => Some(Container::DurationOfDiabetes),
            Self::Hba => Some(Container::Hba),
            Self::Hb => Some(Container::Hb),
            Self::Egfr => Some(Container::Egfr),
            Self::Hypertension => Some(Container::Htn),
            Self::DrOd | Self::DrOs => Some(Container::Dr),
            Self::DrSeverityOd => Some(Container::DrSeverityOd),
            Self::DrSeverityOs => Some(Container::DrSeverityOs),
            Self::Bmi | Self::Oha | Self::Insulin | Self::Cho | Self::Tri => None,
        }
    }

    /// Canonical key for the attribute (the first alias listed).
    #[must_use]
    pub fn canonical_key(self) -> &'static str {
        ALIASES
            .iter()
            .find(|(_, attribute)| *attribute == self)
            .map(|(alias, _)| *alias)
            .unwrap_or("unknown")
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_key())
    }
}

/// Resolve a raw attribute key straight to its taxonomy container.
///
/// Returns `None` both for unknown keys and for known attributes that have
/// no container.
#[must_use]
pub fn resolve_container(key: &str) -> Option<Container> {
    Attribute::from_key(key).and_then(Attribute::container)
}
