/// Operator settings, persisted as a TOML file.
///
/// The engine itself never reads this: Scanner, Classifier, and Executor
/// take the specific values they need at construction. `Settings` exists
/// so the frontend has one place to load them from and hand them out.
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::errors::{EngineError, Result};

/// Connection parameters for the oncology information system. Only carried
/// here; actual connectivity is a provider implementation's concern.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub host: String,
    pub user: String,
    pub password: String,
    pub database: String,
    /// Optional path to a JSON export of the three row sets, used to drive
    /// classification without a live connection (rehearsals, site
    /// migration checks).
    pub records_file: Option<PathBuf>,
}

impl ProviderSettings {
    pub fn is_configured(&self) -> bool {
        !self.host.is_empty() || self.records_file.is_some()
    }
}

/// The full settings file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Locations to scan for patient directories.
    pub scan_roots: Vec<PathBuf>,
    /// Destination root for archive copies and database backups.
    pub archive_root: PathBuf,
    /// MRNs excluded from lifecycle management.
    pub ignore_mrns: Vec<CompactString>,
    /// Location of the persisted audit log.
    pub audit_path: PathBuf,
    /// Image name of the clinical console; an action job must not start
    /// while this process is running.
    pub console_process: String,
    pub provider: ProviderSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            scan_roots: Vec::new(),
            archive_root: PathBuf::new(),
            ignore_mrns: Vec::new(),
            audit_path: PathBuf::from("actioned.json"),
            console_process: "SRI.exe".to_string(),
            provider: ProviderSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from `path`. A missing file yields the defaults — a
    /// fresh install starts with empty values, it does not fail.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => Ok(toml::from_str(&text)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(EngineError::io(path, err)),
        }
    }

    /// Persist settings to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        let text = toml::to_string_pretty(self)?;
        std::fs::write(path, text).map_err(|e| EngineError::io(path, e))
    }
}
