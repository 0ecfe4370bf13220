/// Pre-action backup of the live clinical database files.
///
/// Before any directory is archived or deleted, the loose database files
/// sitting in each scan root are copied into a dated subdirectory under
/// `<archive_root>/backup/`, and stale backup sets past the retention
/// window are pruned. The whole step is best-effort: every failure is
/// logged and the action job proceeds regardless.
use chrono::{DateTime, Duration, Local};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Extensions of the live database files worth preserving before the
/// store is mutated.
pub const DB_FILE_EXTENSIONS: &[&str] = &["mdf", "ldf"];

/// Backup sets older than this are pruned.
pub const BACKUP_RETENTION_DAYS: i64 = 60;

/// Naming of the dated backup subdirectory.
const BACKUP_STAMP_FORMAT: &str = "%Y-%m-%d_%H_%M_%S";

/// What the backup step managed to do; for the job log only.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct BackupReport {
    pub files_copied: usize,
    pub directories_pruned: usize,
}

/// Copy database files from each root into a fresh dated backup set, then
/// prune sets older than [`BACKUP_RETENTION_DAYS`].
pub fn backup_database_files(
    roots: &[PathBuf],
    archive_root: &Path,
    now: DateTime<Local>,
) -> BackupReport {
    let mut report = BackupReport::default();

    let backup_root = archive_root.join("backup");
    let dated = backup_root.join(now.format(BACKUP_STAMP_FORMAT).to_string());
    if let Err(err) = fs::create_dir_all(&dated) {
        warn!("Backup skipped: cannot create {}: {err}", dated.display());
        return report;
    }

    for root in roots {
        let entries = match fs::read_dir(root) {
            Ok(entries) => entries,
            Err(err) => {
                warn!("Backup: cannot read {}: {err}", root.display());
                continue;
            }
        };

        for entry in entries.flatten() {
            let source = entry.path();
            if !source.is_file() || !is_database_file(&source) {
                continue;
            }
            let target = dated.join(entry.file_name());
            match fs::copy(&source, &target) {
                Ok(_) => {
                    info!("{} backed up to {}", source.display(), target.display());
                    report.files_copied += 1;
                }
                Err(err) => {
                    warn!("Backup: copy {} failed: {err}", source.display());
                }
            }
        }
    }

    report.directories_pruned = prune_stale_backups(&backup_root, now);
    report
}

fn is_database_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            DB_FILE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

/// Remove backup sets whose modification time is past the retention
/// window. Returns how many were removed.
fn prune_stale_backups(backup_root: &Path, now: DateTime<Local>) -> usize {
    let cutoff = now - Duration::days(BACKUP_RETENTION_DAYS);

    let Ok(entries) = fs::read_dir(backup_root) else {
        return 0;
    };

    let mut pruned = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let Ok(meta) = path.metadata() else { continue };
        let Ok(modified) = meta.modified() else {
            continue;
        };
        let modified: DateTime<Local> = modified.into();
        if modified < cutoff {
            match fs::remove_dir_all(&path) {
                Ok(()) => {
                    info!("Pruned stale backup set {}", path.display());
                    pruned += 1;
                }
                Err(err) => warn!("Backup prune of {} failed: {err}", path.display()),
            }
        }
    }
    pruned
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn copies_only_database_files() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("linac1");
        let archive = tmp.path().join("archive");
        fs::create_dir_all(&root).unwrap();
        fs::create_dir_all(&archive).unwrap();

        fs::write(root.join("records.mdf"), b"primary").unwrap();
        fs::write(root.join("records.LDF"), b"log").unwrap();
        fs::write(root.join("frame.his"), b"imaging").unwrap();
        fs::write(root.join("notes.txt"), b"notes").unwrap();

        let report = backup_database_files(&[root], &archive, Local::now());
        assert_eq!(report.files_copied, 2, "mdf and ldf only, case-insensitive");

        let sets: Vec<_> = fs::read_dir(archive.join("backup"))
            .unwrap()
            .flatten()
            .collect();
        assert_eq!(sets.len(), 1);
        let set = sets[0].path();
        assert!(set.join("records.mdf").exists());
        assert!(set.join("records.LDF").exists());
        assert!(!set.join("frame.his").exists());
    }

    #[test]
    fn unreadable_root_is_skipped_not_fatal() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("archive");
        fs::create_dir_all(&archive).unwrap();

        let good = tmp.path().join("good");
        fs::create_dir_all(&good).unwrap();
        fs::write(good.join("records.mdf"), b"primary").unwrap();

        let report = backup_database_files(
            &[tmp.path().join("missing_mount"), good],
            &archive,
            Local::now(),
        );
        assert_eq!(report.files_copied, 1);
    }

    #[test]
    fn prunes_sets_past_the_retention_window() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("archive");
        let backup_root = archive.join("backup");

        let stale = backup_root.join("2019-01-01_00_00_00");
        let fresh = backup_root.join("recent");
        fs::create_dir_all(&stale).unwrap();
        fs::create_dir_all(&fresh).unwrap();

        // Age the stale set's mtime past the window.
        let old = filetime::FileTime::from_unix_time(
            (Local::now() - Duration::days(BACKUP_RETENTION_DAYS + 5)).timestamp(),
            0,
        );
        filetime::set_file_mtime(&stale, old).unwrap();

        let report = backup_database_files(&[], &archive, Local::now());
        assert_eq!(report.directories_pruned, 1);
        assert!(!stale.exists());
        assert!(fresh.exists());
    }
}
