/// One scanned patient-imaging directory and the action assigned to it.
///
/// Records are created by the scanner with `action = Keep` (or `Ignore`
/// straight away when the name does not parse), refined by the classifier,
/// and then only ever *read* by the action executor — the executor reports
/// the successfully-actioned subset and the owner of the set removes those
/// records itself.
use chrono::NaiveDate;
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// What the engine intends to do with a directory.
///
/// A closed enum: there is no fifth state, and free-text actions cannot
/// exist. `Keep` is the initial value for every parseable patient
/// directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    #[default]
    Keep,
    Archive,
    Delete,
    Ignore,
}

impl Action {
    /// Uppercase label for display and export.
    pub fn label(self) -> &'static str {
        match self {
            Self::Keep => "KEEP",
            Self::Archive => "ARCHIVE",
            Self::Delete => "DELETE",
            Self::Ignore => "IGNORE",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One scanned directory.
#[derive(Debug, Clone, Serialize)]
pub struct DirectoryRecord {
    /// Configured scan root this directory was found under.
    pub root_path: PathBuf,

    /// Directory name only (NOT the full path).
    pub dir_name: CompactString,

    /// Patient identifier parsed from `dir_name`; empty when this is not a
    /// patient directory.
    pub mrn: CompactString,

    /// Human name, resolved from the clinical lookup. Empty until the
    /// classifier runs.
    pub display_name: String,

    pub action: Action,

    pub finished_treatment: bool,
    pub clinical_trial: bool,
    pub has_4d: bool,

    /// Latest treatment-fraction date observed across the patient's
    /// treatment fields; only ever moves forward during classification.
    pub last_fraction_date: Option<NaiveDate>,

    /// Recursive size of the directory. 0 under a quick scan, where size
    /// computation is skipped entirely.
    pub dir_size_bytes: u64,
}

impl DirectoryRecord {
    /// Create a fresh record for a directory found during a scan.
    pub fn new(root_path: PathBuf, dir_name: CompactString) -> Self {
        Self {
            root_path,
            dir_name,
            mrn: CompactString::default(),
            display_name: String::new(),
            action: Action::Keep,
            finished_treatment: false,
            clinical_trial: false,
            has_4d: false,
            last_fraction_date: None,
            dir_size_bytes: 0,
        }
    }

    /// Absolute location of the directory on disk.
    pub fn full_path(&self) -> PathBuf {
        self.root_path.join(self.dir_name.as_str())
    }

    /// Whether the directory name parsed as a patient directory.
    pub fn is_patient(&self) -> bool {
        !self.mrn.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_record_defaults_to_keep() {
        let record = DirectoryRecord::new(
            PathBuf::from("/mnt/linac1"),
            CompactString::new("Patient_1234567"),
        );
        assert_eq!(record.action, Action::Keep);
        assert!(!record.finished_treatment);
        assert!(!record.clinical_trial);
        assert!(!record.has_4d);
        assert_eq!(record.last_fraction_date, None);
        assert_eq!(record.dir_size_bytes, 0);
        assert!(!record.is_patient(), "mrn is unset until the name parses");
    }

    #[test]
    fn full_path_joins_root_and_name() {
        let record = DirectoryRecord::new(
            PathBuf::from("/mnt/linac1"),
            CompactString::new("Patient_1234567"),
        );
        assert_eq!(
            record.full_path(),
            PathBuf::from("/mnt/linac1/Patient_1234567")
        );
    }

    #[test]
    fn action_labels_round_trip_through_serde() {
        for action in [Action::Keep, Action::Archive, Action::Delete, Action::Ignore] {
            let json = serde_json::to_string(&action).unwrap();
            assert_eq!(json, format!("\"{}\"", action.label()));
            let back: Action = serde_json::from_str(&json).unwrap();
            assert_eq!(back, action);
        }
    }
}
