/// Patient-records lookup — the seam between the engine and the oncology
/// information system (OIS).
///
/// The engine only ever sees the three row sets defined here, keyed by MRN.
/// How they are produced (site-specific SQL, an export file, a test
/// fixture) is the provider implementation's business.
use chrono::NaiveDate;
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// One treatment field for a patient, as recorded in the OIS.
///
/// A patient typically has several of these — one per treated field. A
/// course of treatment is complete only when *every* field has delivered
/// as many fractions as were prescribed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreatmentFieldRow {
    pub mrn: CompactString,
    pub last_name: String,
    pub first_name: String,
    pub middle_name: String,
    pub prescribed_fractions: u32,
    pub delivered_fractions: u32,
    pub last_fraction_date: Option<NaiveDate>,
}

impl Default for TreatmentFieldRow {
    fn default() -> Self {
        Self {
            mrn: CompactString::default(),
            last_name: String::new(),
            first_name: String::new(),
            middle_name: String::new(),
            prescribed_fractions: 0,
            delivered_fractions: 0,
            last_fraction_date: None,
        }
    }
}

impl TreatmentFieldRow {
    /// The patient name as shown to operators.
    pub fn display_name(&self) -> String {
        format!("{} {} {}", self.last_name, self.first_name, self.middle_name)
    }
}

/// A membership/presence row carrying only patient identity — used for
/// both clinical-trial membership and 4D cone-beam presence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityRow {
    pub mrn: CompactString,
    pub last_name: String,
    pub first_name: String,
    pub middle_name: String,
}

impl IdentityRow {
    /// The patient name as shown to operators.
    pub fn display_name(&self) -> String {
        format!("{} {} {}", self.last_name, self.first_name, self.middle_name)
    }
}

/// The full response to one provider query: the three row sets the
/// classifier needs, each keyed by MRN.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatientRecords {
    pub treatment_fields: Vec<TreatmentFieldRow>,
    pub clinical_trials: Vec<IdentityRow>,
    pub four_d: Vec<IdentityRow>,
}

/// Provider failure. There is deliberately only one kind: either the
/// provider answered, or classification cannot proceed at all.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("patient records provider unavailable: {0}")]
    Unavailable(String),
}

/// The lookup seam. Implementations must be shareable across the worker
/// thread boundary.
pub trait PatientRecordsProvider: Send + Sync {
    /// Fetch the three row sets for the given MRNs.
    fn query(&self, mrns: &[CompactString]) -> Result<PatientRecords, ProviderError>;
}

/// The provider of a fresh install: no OIS connection has been configured,
/// so every query reports [`ProviderError::Unavailable`] and classification
/// leaves every record at its scan-time action.
pub struct UnconfiguredProvider;

impl PatientRecordsProvider for UnconfiguredProvider {
    fn query(&self, _mrns: &[CompactString]) -> Result<PatientRecords, ProviderError> {
        Err(ProviderError::Unavailable(
            "no OIS connection configured; check connection settings".into(),
        ))
    }
}

/// A provider backed by a fixed in-memory row set. Queries behave like the
/// real thing — only rows for the requested MRNs come back.
///
/// Used by the test suites and by rehearsal runs driven from an OIS export
/// file (see [`StaticProvider::from_json_file`]).
#[derive(Debug, Default)]
pub struct StaticProvider {
    records: PatientRecords,
}

impl StaticProvider {
    pub fn new(records: PatientRecords) -> Self {
        Self { records }
    }

    /// Load the row sets from a JSON file with the [`PatientRecords`]
    /// shape.
    pub fn from_json_file(path: &Path) -> Result<Self, ProviderError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            ProviderError::Unavailable(format!("cannot read records file {}: {e}", path.display()))
        })?;
        let records = serde_json::from_str(&text).map_err(|e| {
            ProviderError::Unavailable(format!("records file {} is invalid: {e}", path.display()))
        })?;
        Ok(Self::new(records))
    }
}

impl PatientRecordsProvider for StaticProvider {
    fn query(&self, mrns: &[CompactString]) -> Result<PatientRecords, ProviderError> {
        Ok(PatientRecords {
            treatment_fields: self
                .records
                .treatment_fields
                .iter()
                .filter(|row| mrns.contains(&row.mrn))
                .cloned()
                .collect(),
            clinical_trials: self
                .records
                .clinical_trials
                .iter()
                .filter(|row| mrns.contains(&row.mrn))
                .cloned()
                .collect(),
            four_d: self
                .records
                .four_d
                .iter()
                .filter(|row| mrns.contains(&row.mrn))
                .cloned()
                .collect(),
        })
    }
}
