//! Patient source port: where normalized patient records come from.

use crate::domain::PatientDataset;

/// Loads a complete patient dataset in the normalized input shape.
pub trait PatientSource {
    /// Error type for loading.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load every record.
    ///
    /// # Errors
    /// Returns error if the source cannot be read or is not a patient
    /// mapping at all. Individual unmappable values are not errors.
    fn load(&self) -> Result<PatientDataset, Self::Error>;
}
