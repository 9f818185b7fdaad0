//! Node-id and relationship-kind construction.
//!
//! Every builder derives its ids through these functions, so identity is a
//! pure function from a tuple to a string and never depends on build order.

use super::taxonomy::Container;

/// Id of the hierarchy root.
pub const TREE_ROOT_ID: &str = "patient-root";

/// Id of the chain root.
pub const CHAIN_ROOT_ID: &str = "PATIENT_ROOT";

/// Flat patient node: `Patient:{patient_id}`.
#[must_use]
pub fn flat_patient_id(patient_id: &str) -> String {
    format!("Patient:{patient_id}")
}

/// Flat value node: `Value:{container}/{label without whitespace}`.
#[must_use]
pub fn flat_value_id(container: Container, label: &str) -> String {
    let compact: String = label.chars().filter(|c| !c.is_whitespace()).collect();
    format!("Value:{container}/{compact}")
}

/// Relationship from a patient to one of its values: `HAS_{CONTAINER}`.
#[must_use]
pub fn has_relationship(container: Container) -> String {
    format!("HAS_{}", container.name().to_uppercase())
}

/// Lowercase slug with comparison operators spelled out, so that
/// `"Age < 40"` and `"Age == 40"` stay distinct.
#[must_use]
pub fn slug(text: &str) -> String {
    let spelled = text
        .replace("<=", " le ")
        .replace(">=", " ge ")
        .replace("==", " eq ")
        .replace('<', " lt ")
        .replace('>', " gt ");

    let mut out = String::with_capacity(spelled.len());
    let mut pending_dash = false;
    for c in spelled.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    out
}

/// Hierarchy gender node: `patient-root-{gender}`.
#[must_use]
pub fn tree_gender_id(gender: &str) -> String {
    format!("{TREE_ROOT_ID}-{}", slug(gender))
}

/// Hierarchy age-group node: `patient-{gender}-{age}`.
#[must_use]
pub fn tree_age_id(gender: &str, age_group: &str) -> String {
    format!("patient-{}-{}", slug(gender), slug(age_group))
}

/// Hierarchy attribute node: `patient-{gender}-{age}-{container}-{label}`,
/// or `patient-{gender}-{container}-{label}` for patients without an age
/// group.
#[must_use]
pub fn tree_attribute_id(
    gender: &str,
    age_group: Option<&str>,
    container: Container,
    label: &str,
) -> String {
    let parent = match age_group {
        Some(age) => format!("patient-{}-{}", slug(gender), slug(age)),
        None => format!("patient-{}", slug(gender)),
    };
    format!("{parent}-{}-{}", slug(container.name()), slug(label))
}

/// Chain attribute node:
/// `{CONTAINER}_{label with '_' for spaces}_{patient prefix}_P{index}`.
///
/// The patient prefix keeps at most `max_len` characters, each
/// non-alphanumeric character replaced by `_`. The index keeps ids unique
/// even when two prefixes coincide.
#[must_use]
pub fn chain_node_id(
    container: Container,
    label: &str,
    patient_id: &str,
    patient_index: usize,
    max_len: usize,
) -> String {
    let prefix: String = patient_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .take(max_len)
        .collect();
    format!(
        "{}_{}_{}_P{}",
        container.name().to_uppercase(),
        label.replace(' ', "_"),
        prefix,
        patient_index
    )
}

fn chain_step_name(container: Container) -> String {
    match container {
        Container::Gender => "GENDER".to_string(),
        Container::AgeGroup => "AGE".to_string(),
        Container::DurationOfDiabetes => "DURATION".to_string(),
        other => other.name().to_uppercase(),
    }
}

/// Chain transition kind: `PATIENT_HAS_{CUR}` from the root, otherwise
/// `{PREV}_TO_{CUR}`.
#[must_use]
pub fn chain_relationship(previous: Option<Container>, current: Container) -> String {
    match previous {
        None => format!("PATIENT_HAS_{}", chain_step_name(current)),
        Some(prev) => format!("{}_TO_{}", chain_step_name(prev), chain_step_name(current)),
    }
}
