/// Engine error types.
///
/// [`EngineError`] is the fallible-operation error for the filesystem
/// adapter and the persistence layers. [`ErrorKind`] is the closed taxonomy
/// carried on error messages sent through the task channel — it names what
/// went wrong in operator terms, while the accompanying text names the
/// directory and the resulting state of the data.
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the engine.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors raised by the filesystem adapter and persistence layers.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A configured location could not be enumerated at all (bad network
    /// mount, missing drive). Never fatal to a scan — the root is skipped.
    #[error("location unreachable: {path}: {source}")]
    Unreachable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The copy destination already exists. The copy is refused rather than
    /// merged, so a half-finished earlier archive attempt is never silently
    /// completed on top of.
    #[error("destination already exists: {path}")]
    AlreadyExists { path: PathBuf },

    #[error("io failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("settings parse failure: {0}")]
    SettingsParse(#[from] toml::de::Error),

    #[error("settings encode failure: {0}")]
    SettingsEncode(#[from] toml::ser::Error),

    #[error("audit log serialization failure: {0}")]
    AuditSerde(#[from] serde_json::Error),

    #[error("export failure: {0}")]
    Export(#[from] csv::Error),
}

impl EngineError {
    /// Convenience constructor for IO errors with a known path.
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

/// Operator-facing failure taxonomy for task error messages.
///
/// Per-root and per-directory kinds (`ScanUnreachable`, `CopyFailure`,
/// `SizeMismatch`, `DeleteFailure`) are reported and skipped; the job keeps
/// running. `ProviderUnavailable` aborts classification as a whole, and
/// `CancelledByUser` ends a job early. All of them still end in the job's
/// terminal `Result` message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ScanUnreachable,
    ProviderUnavailable,
    CopyFailure,
    SizeMismatch,
    DeleteFailure,
    CancelledByUser,
}

impl ErrorKind {
    /// Stable label for display and logs.
    pub fn label(self) -> &'static str {
        match self {
            Self::ScanUnreachable => "scan-unreachable",
            Self::ProviderUnavailable => "provider-unavailable",
            Self::CopyFailure => "copy-failure",
            Self::SizeMismatch => "size-mismatch",
            Self::DeleteFailure => "delete-failure",
            Self::CancelledByUser => "cancelled-by-user",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
