/// Action executor — performs the irreversible archive or delete pass over
/// a classified directory subset.
///
/// Per directory the sequence is backup (once, up front) → copy →
/// size-verify → delete → audit. The invariant the whole module exists to
/// protect: a source directory is deleted if and only if the action is
/// `Delete`, or the action is `Archive` and its copy completed with
/// matching recursive sizes. Nothing is ever deleted before its archive
/// copy has been verified.
///
/// Per-directory failures are reported on the channel and skipped; the job
/// carries on with the remaining directories. Cancellation is honoured at
/// each directory boundary — completed directories stay actioned.
pub mod backup;

use chrono::Local;
use std::path::PathBuf;
use tracing::{error, info, warn};

use crate::audit::{AuditEntry, AuditLog, AuditOutcome};
use crate::errors::ErrorKind;
use crate::fsops;
use crate::model::{Action, DirectoryRecord};
use crate::task::{self, TaskContext, TaskHandle};

/// Everything the executor needs, threaded in explicitly.
#[derive(Debug, Clone)]
pub struct ActionConfig {
    /// The configured scan roots — only used for the database-file backup.
    pub scan_roots: Vec<PathBuf>,
    /// Destination root for archive copies; also hosts `backup/`.
    pub archive_root: PathBuf,
    /// Location of the persisted audit log.
    pub audit_path: PathBuf,
}

/// Terminal payload of an action job.
#[derive(Debug, Default)]
pub struct ActionOutput {
    /// Records whose directory was fully actioned (copied+verified+deleted
    /// for archive; deleted for delete), in processing order. The caller
    /// removes exactly these from its authoritative set.
    pub actioned: Vec<DirectoryRecord>,
    /// The audit entries written for those records, in the same order.
    pub audit_entries: Vec<AuditEntry>,
}

/// Start the action job on a background worker.
pub fn start_action(
    records: Vec<DirectoryRecord>,
    action: Action,
    config: ActionConfig,
) -> TaskHandle<ActionOutput> {
    task::spawn("oncosweep-executor", move |ctx| {
        execute(&records, action, &config, ctx)
    })
}

/// The job body. Runs synchronously on the calling thread;
/// [`start_action`] is the background wrapper.
pub fn execute(
    records: &[DirectoryRecord],
    action: Action,
    config: &ActionConfig,
    ctx: &TaskContext<ActionOutput>,
) -> ActionOutput {
    let mut output = ActionOutput::default();

    let outcome = match action {
        Action::Archive => AuditOutcome::Archived,
        Action::Delete => AuditOutcome::Deleted,
        Action::Keep | Action::Ignore => {
            error!("Refusing to execute non-action {action}");
            return output;
        }
    };

    // Re-validate against stale selections: only records still classified
    // for the requested action are touched, whatever the caller sent.
    let targets: Vec<&DirectoryRecord> =
        records.iter().filter(|r| r.action == action).collect();

    if !targets.is_empty() {
        let report = backup::backup_database_files(
            &config.scan_roots,
            &config.archive_root,
            Local::now(),
        );
        info!(
            "Database backup: {} files copied, {} stale sets pruned",
            report.files_copied, report.directories_pruned
        );
    }

    let audit_log = AuditLog::new(&config.audit_path);

    for record in targets {
        if ctx.is_cancelled() {
            info!(
                "Action cancelled; {} directories already actioned are retained",
                output.actioned.len()
            );
            break;
        }

        let src = record.full_path();
        let dst = config.archive_root.join(record.dir_name.as_str());

        if action == Action::Archive {
            if let Err(err) = fsops::copy_tree(&src, &dst) {
                error!(
                    "Copy of {} to {} failed: {err}",
                    src.display(),
                    dst.display()
                );
                ctx.error(
                    ErrorKind::CopyFailure,
                    format!(
                        "{} - {}: Error copying to {} - {err}. The patient directory has not been deleted.",
                        record.mrn,
                        record.display_name,
                        dst.display()
                    ),
                );
                continue;
            }
            info!("{} copied to {}", src.display(), dst.display());

            // Integrity gate: the recursive sizes must agree before the
            // source may be deleted.
            let src_size = fsops::directory_size(&src);
            let dst_size = fsops::directory_size(&dst);
            info!("Src {} is {src_size} bytes, dst {} is {dst_size} bytes", src.display(), dst.display());
            if src_size != dst_size {
                error!(
                    "Directory sizes do not match after copy from {} to {}",
                    src.display(),
                    dst.display()
                );
                ctx.error(
                    ErrorKind::SizeMismatch,
                    format!(
                        "{} - {}: Error: Src and Dst directory sizes do not match. The patient directory has not been deleted.",
                        record.mrn, record.display_name
                    ),
                );
                continue;
            }
        }

        if let Err(err) = fsops::delete_tree(&src) {
            error!("Deletion of {} failed: {err}", src.display());
            let copy_note = if action == Action::Archive {
                "; the copy to the archive destination succeeded"
            } else {
                ""
            };
            ctx.error(
                ErrorKind::DeleteFailure,
                format!(
                    "{} - {}: Error deleting {} - {err}. The directory may be partially deleted{copy_note}.",
                    record.mrn,
                    record.display_name,
                    src.display()
                ),
            );
            continue;
        }
        info!("{} has been deleted", src.display());

        match action {
            Action::Archive => ctx.progress(format!(
                "{} - {}: Successfully Archived to {}",
                record.mrn,
                record.display_name,
                dst.display()
            )),
            _ => ctx.progress(format!(
                "{} - {}: Successfully Deleted",
                record.mrn, record.display_name
            )),
        }

        let entry = AuditEntry {
            mrn: record.mrn.clone(),
            outcome,
            date: Local::now().date_naive(),
        };
        // The audit write must not undo an action that already happened;
        // a failure here is surfaced in the log and the entry still rides
        // out in the terminal result.
        if let Err(err) = audit_log.append(&entry) {
            warn!("Audit log append failed for {}: {err}", entry.mrn);
        }
        output.audit_entries.push(entry);
        output.actioned.push(record.clone());
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskContext;
    use compact_str::CompactString;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn patient_record(root: &Path, mrn: &str, action: Action) -> DirectoryRecord {
        let mut record = DirectoryRecord::new(
            root.to_path_buf(),
            CompactString::new(format!("Patient_{mrn}")),
        );
        record.mrn = CompactString::new(mrn);
        record.display_name = "Doe John A".to_string();
        record.action = action;
        record
    }

    fn make_patient_dir(root: &Path, mrn: &str, bytes: usize) {
        let dir = root.join(format!("Patient_{mrn}"));
        fs::create_dir_all(dir.join("CBCT")).unwrap();
        fs::write(dir.join("CBCT/frame.his"), vec![0u8; bytes]).unwrap();
    }

    fn config(tmp: &TempDir) -> ActionConfig {
        let archive = tmp.path().join("archive");
        fs::create_dir_all(&archive).unwrap();
        ActionConfig {
            scan_roots: Vec::new(),
            archive_root: archive,
            audit_path: tmp.path().join("actioned.json"),
        }
    }

    #[test]
    fn non_action_request_is_refused() {
        let tmp = TempDir::new().unwrap();
        let (ctx, rx) = TaskContext::detached();
        let output = execute(&[], Action::Keep, &config(&tmp), &ctx);
        assert!(output.actioned.is_empty());
        assert!(rx.try_recv().is_err(), "no messages for a refused request");
    }

    #[test]
    fn records_with_other_actions_are_filtered_out() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("linac1");
        fs::create_dir_all(&root).unwrap();
        make_patient_dir(&root, "1111111", 10);
        make_patient_dir(&root, "2222222", 10);

        let records = vec![
            patient_record(&root, "1111111", Action::Delete),
            // Stale selection: classified Keep, must not be touched.
            patient_record(&root, "2222222", Action::Keep),
        ];

        let (ctx, _rx) = TaskContext::detached();
        let output = execute(&records, Action::Delete, &config(&tmp), &ctx);

        assert_eq!(output.actioned.len(), 1);
        assert_eq!(output.actioned[0].mrn, "1111111");
        assert!(!root.join("Patient_1111111").exists());
        assert!(root.join("Patient_2222222").exists());
    }

    #[test]
    fn delete_appends_audit_entries_in_order() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("linac1");
        fs::create_dir_all(&root).unwrap();
        make_patient_dir(&root, "1111111", 10);
        make_patient_dir(&root, "2222222", 10);

        let records = vec![
            patient_record(&root, "1111111", Action::Delete),
            patient_record(&root, "2222222", Action::Delete),
        ];

        let cfg = config(&tmp);
        let (ctx, _rx) = TaskContext::detached();
        let output = execute(&records, Action::Delete, &cfg, &ctx);

        assert_eq!(output.audit_entries.len(), 2);
        assert!(output
            .audit_entries
            .iter()
            .all(|e| e.outcome == AuditOutcome::Deleted));

        let lists = AuditLog::new(&cfg.audit_path).load();
        assert_eq!(lists.deleted.len(), 2);
        assert!(lists.deleted[0].starts_with("1111111 on "));
        assert!(lists.deleted[1].starts_with("2222222 on "));
        assert!(lists.archived.is_empty());
    }

    #[test]
    fn backup_runs_only_when_there_is_work() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("linac1");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("records.mdf"), b"db").unwrap();

        let mut cfg = config(&tmp);
        cfg.scan_roots = vec![root.clone()];

        // Empty target set: no backup directory may appear.
        let (ctx, _rx) = TaskContext::detached();
        execute(&[], Action::Delete, &cfg, &ctx);
        assert!(!cfg.archive_root.join("backup").exists());

        // Non-empty target set: the database file gets backed up.
        make_patient_dir(&root, "1111111", 10);
        let records = vec![patient_record(&root, "1111111", Action::Delete)];
        let (ctx, _rx) = TaskContext::detached();
        execute(&records, Action::Delete, &cfg, &ctx);
        assert!(cfg.archive_root.join("backup").exists());
    }
}
