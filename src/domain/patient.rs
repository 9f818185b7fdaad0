//! Patient records in the normalized input shape:
//! patient id -> attribute key -> scalar value.
//!
//! Records are supplied wholesale per session. A dataset keeps records in a
//! fixed order, which is what the builders iterate.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

/// Attribute key that carries the patient identity in row-shaped input.
pub const ID_FIELD: &str = "ID";

/// A raw scalar attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Number(f64),
    Text(String),
    Flag(bool),
    Missing,
}

impl RawValue {
    /// The value as trimmed text. Integral numbers render without a fraction
    /// (`45.0` -> `"45"`); missing values render as the empty string.
    #[must_use]
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            Self::Text(s) => Cow::Borrowed(s.trim()),
            Self::Number(n) if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 => {
                Cow::Owned(format!("{}", *n as i64))
            }
            Self::Number(n) => Cow::Owned(n.to_string()),
            Self::Flag(b) => Cow::Owned(b.to_string()),
            Self::Missing => Cow::Borrowed(""),
        }
    }

    /// Whether the value is absent or blank.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.as_text().is_empty()
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for RawValue {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

/// One patient and their raw attributes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatientRecord {
    /// Patient identifier
    pub patient_id: String,

    /// Raw attributes, keyed by the attribute key as supplied
    pub attributes: BTreeMap<String, RawValue>,
}

impl PatientRecord {
    /// Create an empty record.
    #[must_use]
    pub fn new(patient_id: impl Into<String>) -> Self {
        Self {
            patient_id: patient_id.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Builder-style attribute insertion.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<RawValue>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Look up a raw attribute by its exact key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&RawValue> {
        self.attributes.get(key)
    }
}

/// An ordered collection of patient records with unique ids.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct PatientDataset {
    records: Vec<PatientRecord>,
}

impl PatientDataset {
    /// Build from records. A later record with an id already seen replaces
    /// the earlier one but keeps its position.
    #[must_use]
    pub fn from_records(records: impl IntoIterator<Item = PatientRecord>) -> Self {
        let mut out: Vec<PatientRecord> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for record in records {
            match index.get(&record.patient_id) {
                Some(&pos) => out[pos] = record,
                None => {
                    index.insert(record.patient_id.clone(), out.len());
                    out.push(record);
                }
            }
        }

        Self { records: out }
    }

    /// Build from the keyed shape. Records are ordered by patient id.
    #[must_use]
    pub fn from_map(map: BTreeMap<String, BTreeMap<String, RawValue>>) -> Self {
        Self::from_records(map.into_iter().map(|(patient_id, attributes)| PatientRecord {
            patient_id,
            attributes,
        }))
    }

    /// Build from row-shaped input. Identity comes from the `ID` field when it
    /// is present and non-empty, otherwise `Patient_{index}` by position. The
    /// `ID` field itself is not kept as an attribute.
    #[must_use]
    pub fn from_rows(rows: Vec<BTreeMap<String, RawValue>>) -> Self {
        Self::from_records(rows.into_iter().enumerate().map(|(index, mut attributes)| {
            let patient_id = attributes
                .remove(ID_FIELD)
                .map(|v| v.as_text().into_owned())
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| format!("Patient_{index}"));
            PatientRecord {
                patient_id,
                attributes,
            }
        }))
    }

    /// Build from manual-entry form data: `(id, [(key, value)])`.
    ///
    /// Blank ids and blank keys are skipped, as are entries left with no
    /// properties.
    #[must_use]
    pub fn from_entries<I, P, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, P)>,
        P: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::from_records(entries.into_iter().filter_map(|(id, properties)| {
            let id = id.trim().to_string();
            if id.is_empty() {
                return None;
            }
            let mut attributes = BTreeMap::new();
            for (key, value) in properties {
                let key: String = key.into();
                if !key.trim().is_empty() {
                    attributes.insert(key, RawValue::Text(value.into()));
                }
            }
            if attributes.is_empty() {
                return None;
            }
            Some(PatientRecord {
                patient_id: id,
                attributes,
            })
        }))
    }

    /// Records in dataset order.
    #[must_use]
    pub fn records(&self) -> &[PatientRecord] {
        &self.records
    }

    /// Find a record by patient id.
    #[must_use]
    pub fn get(&self, patient_id: &str) -> Option<&PatientRecord> {
        self.records.iter().find(|r| r.patient_id == patient_id)
    }

    /// Number of patients.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the dataset has no patients.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Keep only records matching the predicate.
    #[must_use]
    pub fn retain_records(mut self, mut keep: impl FnMut(&PatientRecord) -> bool) -> Self {
        self.records.retain(|r| keep(r));
        self
    }

    /// Keep only attributes matching the predicate, in every record.
    #[must_use]
    pub fn retain_attributes(mut self, mut keep: impl FnMut(&str) -> bool) -> Self {
        for record in &mut self.records {
            record.attributes.retain(|k, _| keep(k));
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_value_text() {
        assert_eq!(RawValue::Number(45.0).as_text(), "45");
        assert_eq!(RawValue::Number(7.25).as_text(), "7.25");
        assert_eq!(RawValue::from("  12 ").as_text(), "12");
        assert_eq!(RawValue::Flag(true).as_text(), "true");
        assert!(RawValue::Missing.is_empty());
        assert!(RawValue::from("   ").is_empty());
    }

    #[test]
    fn test_raw_value_deserialize() {
        let parsed: BTreeMap<String, RawValue> =
            serde_json::from_str(r#"{"a": 1, "b": "x", "c": null, "d": false}"#)
                .expect("Should parse");
        assert_eq!(parsed["a"], RawValue::Number(1.0));
        assert_eq!(parsed["b"], RawValue::Text("x".to_string()));
        assert_eq!(parsed["c"], RawValue::Missing);
        assert_eq!(parsed["d"], RawValue::Flag(false));
    }

    #[test]
    fn test_from_rows_identity() {
        let mut with_id = BTreeMap::new();
        with_id.insert(ID_FIELD.to_string(), RawValue::from("P7"));
        with_id.insert("age".to_string(), RawValue::from(50_i64));
        let mut without_id = BTreeMap::new();
        without_id.insert("age".to_string(), RawValue::from(60_i64));

        let dataset = PatientDataset::from_rows(vec![with_id, without_id]);
        let ids: Vec<_> = dataset.records().iter().map(|r| r.patient_id.as_str()).collect();
        assert_eq!(ids, vec!["P7", "Patient_1"]);
        assert!(dataset.records()[0].get(ID_FIELD).is_none());
    }

    #[test]
    fn test_duplicate_ids_keep_first_position() {
        let dataset = PatientDataset::from_records(vec![
            PatientRecord::new("A").with("age", "40"),
            PatientRecord::new("B"),
            PatientRecord::new("A").with("age", "50"),
        ]);
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.records()[0].patient_id, "A");
        assert_eq!(dataset.records()[0].get("age"), Some(&RawValue::from("50")));
    }

    #[test]
    fn test_from_entries_skips_blanks() {
        let dataset = PatientDataset::from_entries(vec![
            ("P1".to_string(), vec![("gender", "1"), (" ", "ignored")]),
            ("  ".to_string(), vec![("gender", "0")]),
            ("P2".to_string(), vec![("", "x")]),
        ]);
        assert_eq!(dataset.len(), 1);
        let p1 = dataset.get("P1").expect("P1 kept");
        assert_eq!(p1.attributes.len(), 1);
    }

    #[test]
    fn test_retain_helpers() {
        let dataset = PatientDataset::from_records(vec![
            PatientRecord::new("A").with("age", "40").with("HB", "10"),
            PatientRecord::new("B").with("age", "41"),
        ]);
        let only_a = dataset.clone().retain_records(|r| r.patient_id == "A");
        assert_eq!(only_a.len(), 1);

        let only_age = dataset.retain_attributes(|k| k == "age");
        assert!(only_age.records().iter().all(|r| r.attributes.len() == 1));
    }
}
