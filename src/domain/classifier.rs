//! Attribute classifier: raw values -> taxonomy labels.
//!
//! Every attribute has a pure classification rule. A rule either yields a
//! label or `None`; absence of a mapping is never an error.

use serde::Serialize;

use super::attribute::Attribute;
use super::patient::PatientRecord;
use super::range::match_range;
use super::taxonomy::{Container, Taxonomy};

/// EGFR threshold separating the two EGFR labels.
pub const EGFR_THRESHOLD: f64 = 90.0;

/// A validated (patient, container, label) triple derived from one raw value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    pub patient_id: String,
    pub container: Container,
    pub label: String,
    pub source_attribute: String,
    pub raw_value: String,
}

/// Counters for fields that did or did not become observations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingStats {
    /// Attribute fields inspected
    pub fields_seen: usize,
    /// Observations emitted
    pub observations: usize,
    /// Fields whose value was empty or missing
    pub empty_values: usize,
    /// Fields whose key is not a known attribute
    pub unknown_attributes: usize,
    /// Known attributes with no taxonomy container (BMI, CHO, ...)
    pub unmapped_attributes: usize,
    /// Values that did not classify
    pub unmapped_values: usize,
    /// Labels produced by a rule but absent from the taxonomy
    pub outside_taxonomy: usize,
}

impl MappingStats {
    /// Fields that did not produce an observation.
    #[must_use]
    pub fn dropped(&self) -> usize {
        self.fields_seen - self.observations
    }
}

/// Classifies raw attribute values against a taxonomy.
#[derive(Debug, Clone, Copy)]
pub struct Classifier<'t> {
    taxonomy: &'t Taxonomy,
}

impl<'t> Classifier<'t> {
    #[must_use]
    pub fn new(taxonomy: &'t Taxonomy) -> Self {
        Self { taxonomy }
    }

    /// Classify a raw value for a raw attribute key.
    #[must_use]
    pub fn classify_key(&self, key: &str, raw: &str) -> Option<String> {
        Attribute::from_key(key).and_then(|attribute| self.classify(attribute, raw))
    }

    /// Classify a raw value for an attribute.
    ///
    /// The returned label is not yet checked against the taxonomy; use
    /// [`Classifier::observe_field`] for validated output.
    #[must_use]
    pub fn classify(&self, attribute: Attribute, raw: &str) -> Option<String> {
        let raw = raw.trim();
        match attribute {
            Attribute::Gender => binary(raw, "Male", Some("Female"), false),
            Attribute::Hypertension => binary(raw, "HTN", Some("No_HTN"), true),
            Attribute::DrOd => binary(raw, "DR_OD", Some("Non_DR_OD"), true),
            Attribute::DrOs => binary(raw, "DR_OS", Some("Non_DR_OS"), true),
            Attribute::Oha => binary(raw, "OHA", None, false),
            Attribute::Insulin => binary(raw, "INSULIN", None, false),
            Attribute::Age
            | Attribute::DurationOfDiabetes
            | Attribute::Hba
            | Attribute::Hb => {
                let container = attribute.container()?;
                let value = parse_number(raw)?;
                match_range(value, self.taxonomy.labels(container)).map(str::to_string)
            }
            Attribute::Egfr => {
                let value = parse_number(raw)?;
                Some(egfr_label(value).to_string())
            }
            Attribute::DrSeverityOd | Attribute::DrSeverityOs => {
                let container = attribute.container()?;
                severity_label(raw, self.taxonomy.labels(container))
            }
            Attribute::Bmi | Attribute::Cho | Attribute::Tri => None,
        }
    }

    /// Turn one raw field into a validated observation, recording why it
    /// was dropped otherwise.
    pub fn observe_field(
        &self,
        patient_id: &str,
        key: &str,
        raw: &str,
        stats: &mut MappingStats,
    ) -> Option<Observation> {
        stats.fields_seen += 1;

        let raw = raw.trim();
        if raw.is_empty() {
            stats.empty_values += 1;
            return None;
        }

        let Some(attribute) = Attribute::from_key(key) else {
            stats.unknown_attributes += 1;
            return None;
        };

        let Some(container) = attribute.container() else {
            stats.unmapped_attributes += 1;
            return None;
        };

        let Some(label) = self.classify(attribute, raw) else {
            stats.unmapped_values += 1;
            return None;
        };

        if !self.taxonomy.contains(container, &label) {
            stats.outside_taxonomy += 1;
            return None;
        }

        stats.observations += 1;
        Some(Observation {
            patient_id: patient_id.to_string(),
            container,
            label,
            source_attribute: key.to_string(),
            raw_value: raw.to_string(),
        })
    }

    /// All observations for one patient, in attribute-key order.
    pub fn observe(&self, record: &PatientRecord, stats: &mut MappingStats) -> Vec<Observation> {
        let dropped_before = stats.dropped();
        let observations: Vec<Observation> = record
            .attributes
            .iter()
            .filter_map(|(key, value)| {
                self.observe_field(&record.patient_id, key, &value.as_text(), stats)
            })
            .collect();

        let dropped = stats.dropped() - dropped_before;
        if dropped > 0 {
            tracing::debug!(
                dropped,
                observations = observations.len(),
                "Patient fields without a categorical mapping"
            );
        }
        observations
    }
}

/// `"1"` maps to the positive label; `"0"` (and the empty string when
/// `empty_is_negative`) maps to the negative label.
fn binary(
    raw: &str,
    positive: &str,
    negative: Option<&str>,
    empty_is_negative: bool,
) -> Option<String> {
    match raw {
        "1" => Some(positive.to_string()),
        "0" => negative.map(str::to_string),
        "" if empty_is_negative => negative.map(str::to_string),
        _ => None,
    }
}

/// Length of the leading run of ASCII digits in `bytes`.
fn digit_run(bytes: &[u8]) -> usize {
    bytes.iter().take_while(|b| b.is_ascii_digit()).count()
}

/// Length of an optional leading `+` or `-`.
fn sign_len(bytes: &[u8]) -> usize {
    usize::from(matches!(bytes.first(), Some(b'+' | b'-')))
}

/// Parse the longest leading decimal number and ignore what follows, so
/// `"8.5%"` reads as 8.5 and `"45 years"` as 45.
fn parse_number(raw: &str) -> Option<f64> {
    let bytes = raw.as_bytes();
    let mut end = sign_len(bytes);
    let int_digits = digit_run(&bytes[end..]);
    end += int_digits;

    let mut frac_digits = 0;
    if bytes.get(end) == Some(&b'.') {
        frac_digits = digit_run(&bytes[end + 1..]);
        if int_digits > 0 || frac_digits > 0 {
            end += 1 + frac_digits;
        }
    }
    if int_digits == 0 && frac_digits == 0 {
        return None;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let exp_start = end + 1;
        let exp_sign = sign_len(&bytes[exp_start..]);
        let exp_digits = digit_run(&bytes[exp_start + exp_sign..]);
        if exp_digits > 0 {
            end = exp_start + exp_sign + exp_digits;
        }
    }

    raw[..end].parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse the leading integer and ignore what follows (`"3 (moderate)"` -> 3).
fn parse_leading_integer(raw: &str) -> Option<i64> {
    let bytes = raw.as_bytes();
    let sign = sign_len(bytes);
    let digits = digit_run(&bytes[sign..]);
    if digits == 0 {
        return None;
    }
    raw[..sign + digits].parse::<i64>().ok()
}

fn egfr_label(value: f64) -> &'static str {
    if value >= EGFR_THRESHOLD {
        "EGFR >= 90"
    } else {
        "EGFR < 90"
    }
}

/// Treat the value as a 1-based stage index into the container's labels.
/// Only the leading integer counts (`"3.7"` -> stage 3).
fn severity_label(raw: &str, labels: &[String]) -> Option<String> {
    let stage = parse_leading_integer(raw)?;
    if stage < 1 {
        return None;
    }
    let index = usize::try_from(stage - 1).ok()?;
    labels.get(index).cloned()
}
