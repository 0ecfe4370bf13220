/// Append-only audit log of every directory removed from its original
/// location.
///
/// The log is the permanent record: entries survive even after the
/// archived copies are purged by a later retention policy, so it is never
/// rewritten destructively. On-disk shape is a JSON object with two named
/// ordered lists, `ARCHIVED` and `DELETED`, each holding free-text
/// `"<MRN> on <YYYY-MM-DD>"` tokens.
use chrono::NaiveDate;
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::warn;

use crate::errors::{EngineError, Result};

/// Date rendering used in audit tokens.
pub const AUDIT_DATE_FORMAT: &str = "%Y-%m-%d";

/// What happened to a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditOutcome {
    Archived,
    Deleted,
}

/// One completed action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEntry {
    pub mrn: CompactString,
    pub outcome: AuditOutcome,
    pub date: NaiveDate,
}

impl AuditEntry {
    /// The free-text token persisted in the log.
    pub fn token(&self) -> String {
        format!("{} on {}", self.mrn, self.date.format(AUDIT_DATE_FORMAT))
    }
}

/// The two persisted lists, in append order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditLists {
    #[serde(rename = "ARCHIVED", default)]
    pub archived: Vec<String>,
    #[serde(rename = "DELETED", default)]
    pub deleted: Vec<String>,
}

/// Handle on the persisted audit file.
///
/// Each append is a full read-modify-write: existing entries are loaded,
/// preserved verbatim, and rewritten together with the new token. The
/// rewrite goes through a sibling temp file and a rename, so a crash
/// mid-write loses at most the entry being appended, never what was
/// already on disk.
#[derive(Debug, Clone)]
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load the persisted lists. A missing or unreadable file means "no
    /// prior entries" — never a fatal error, because the log must not be
    /// able to block an action job.
    pub fn load(&self) -> AuditLists {
        match fs::read_to_string(&self.path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|err| {
                warn!(
                    "Audit log {} is unreadable ({err}); starting a fresh list",
                    self.path.display()
                );
                AuditLists::default()
            }),
            Err(_) => AuditLists::default(),
        }
    }

    /// Append one entry, preserving everything already persisted.
    pub fn append(&self, entry: &AuditEntry) -> Result<()> {
        let mut lists = self.load();
        match entry.outcome {
            AuditOutcome::Archived => lists.archived.push(entry.token()),
            AuditOutcome::Deleted => lists.deleted.push(entry.token()),
        }
        self.write(&lists)
    }

    fn write(&self, lists: &AuditLists) -> Result<()> {
        let text = serde_json::to_string_pretty(lists)?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, text).map_err(|e| EngineError::io(&tmp, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| EngineError::io(&self.path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(mrn: &str, outcome: AuditOutcome, date: &str) -> AuditEntry {
        AuditEntry {
            mrn: CompactString::new(mrn),
            outcome,
            date: date.parse().unwrap(),
        }
    }

    #[test]
    fn token_format_is_mrn_on_date() {
        let e = entry("1234567", AuditOutcome::Archived, "2024-06-15");
        assert_eq!(e.token(), "1234567 on 2024-06-15");
    }

    #[test]
    fn missing_file_reads_as_empty() {
        let tmp = TempDir::new().unwrap();
        let log = AuditLog::new(tmp.path().join("actioned.json"));
        assert_eq!(log.load(), AuditLists::default());
    }

    #[test]
    fn corrupt_file_reads_as_empty() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("actioned.json");
        fs::write(&path, "{ not json at all").unwrap();
        let log = AuditLog::new(&path);
        assert_eq!(log.load(), AuditLists::default());
    }

    #[test]
    fn append_preserves_order_across_reloads() {
        let tmp = TempDir::new().unwrap();
        let log = AuditLog::new(tmp.path().join("actioned.json"));

        log.append(&entry("1111111", AuditOutcome::Archived, "2024-06-01"))
            .unwrap();
        log.append(&entry("2222222", AuditOutcome::Deleted, "2024-06-02"))
            .unwrap();
        log.append(&entry("3333333", AuditOutcome::Archived, "2024-06-03"))
            .unwrap();

        // A fresh handle sees everything in append order.
        let reloaded = AuditLog::new(tmp.path().join("actioned.json")).load();
        assert_eq!(
            reloaded.archived,
            vec!["1111111 on 2024-06-01", "3333333 on 2024-06-03"]
        );
        assert_eq!(reloaded.deleted, vec!["2222222 on 2024-06-02"]);
    }

    #[test]
    fn append_preserves_preexisting_entries_verbatim() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("actioned.json");
        fs::write(
            &path,
            r#"{"ARCHIVED": ["0000001 on 2020-01-01"], "DELETED": []}"#,
        )
        .unwrap();

        let log = AuditLog::new(&path);
        log.append(&entry("1234567", AuditOutcome::Archived, "2024-06-15"))
            .unwrap();

        let lists = log.load();
        assert_eq!(
            lists.archived,
            vec!["0000001 on 2020-01-01", "1234567 on 2024-06-15"]
        );
    }

    #[test]
    fn lists_with_a_missing_section_still_parse() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("actioned.json");
        fs::write(&path, r#"{"ARCHIVED": ["0000001 on 2020-01-01"]}"#).unwrap();
        let lists = AuditLog::new(&path).load();
        assert_eq!(lists.archived.len(), 1);
        assert!(lists.deleted.is_empty());
    }
}
