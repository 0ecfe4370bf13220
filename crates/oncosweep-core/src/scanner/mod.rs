/// Directory scanner — walks the configured locations, builds the
/// candidate directory set, and hands it to the classifier.
///
/// [`start_scan`] runs the whole scan → classify pipeline as one
/// cancellable background job and returns the handle to poll.
use chrono::Local;
use compact_str::CompactString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::classify;
use crate::errors::ErrorKind;
use crate::fsops;
use crate::model::{Action, DirectoryRecord};
use crate::provider::PatientRecordsProvider;
use crate::task::{self, TaskContext, TaskHandle};

/// An MRN is exactly this many characters; any other length in the second
/// name segment means the directory is not a patient directory.
pub const MRN_LENGTH: usize = 7;

/// Everything the scanner needs, threaded in explicitly — there is no
/// ambient settings store in the engine.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Locations to enumerate.
    pub roots: Vec<PathBuf>,
    /// MRNs the operator has excluded from lifecycle management.
    pub ignore_mrns: Vec<CompactString>,
    /// Quick scan: skip recursive size computation (sizes stay 0).
    pub quick: bool,
}

/// Terminal payload of the scan+classify job.
#[derive(Debug, Default)]
pub struct ScanOutput {
    /// Classified records, in scan order. Empty when cancelled.
    pub records: Vec<DirectoryRecord>,
    /// True when the job was cancelled — distinguishes "no usable result"
    /// from a genuine zero-directory scan.
    pub cancelled: bool,
}

/// Start the scan → classify job on a background worker.
pub fn start_scan(
    options: ScanOptions,
    provider: Arc<dyn PatientRecordsProvider>,
) -> TaskHandle<ScanOutput> {
    task::spawn("oncosweep-scanner", move |ctx| {
        run_scan_job(&options, provider.as_ref(), ctx)
    })
}

/// The job body: scan all roots, then classify the results.
///
/// Runs synchronously on the calling thread; [`start_scan`] is the
/// background wrapper.
pub fn run_scan_job(
    options: &ScanOptions,
    provider: &dyn PatientRecordsProvider,
    ctx: &TaskContext<ScanOutput>,
) -> ScanOutput {
    info!("Scanning {} configured locations", options.roots.len());
    let Some(mut records) = scan(options, ctx) else {
        return ScanOutput {
            records: Vec::new(),
            cancelled: true,
        };
    };

    info!("Fetching patient records for {} directories", records.len());
    let today = Local::now().date_naive();
    if let Err(err) = classify::classify(&mut records, provider, today) {
        // Classification aborts as a whole; scan-time actions are kept and
        // the operator is told why nothing was classified.
        ctx.error(ErrorKind::ProviderUnavailable, err.to_string());
    }

    if ctx.is_cancelled() {
        return ScanOutput {
            records: Vec::new(),
            cancelled: true,
        };
    }
    ScanOutput {
        records,
        cancelled: false,
    }
}

/// Enumerate all roots into fresh records.
///
/// Returns `None` when cancellation was observed — the partial record list
/// is discarded, per the "no usable result" rule. An unreachable root is
/// reported and skipped; the scan continues over the remaining roots.
fn scan(options: &ScanOptions, ctx: &TaskContext<ScanOutput>) -> Option<Vec<DirectoryRecord>> {
    let mut records = Vec::new();

    for root in &options.roots {
        let names = match fsops::list_subdirectories(root) {
            Ok(names) => names,
            Err(err) => {
                ctx.error(
                    ErrorKind::ScanUnreachable,
                    format!("{err}; continuing with the remaining locations"),
                );
                continue;
            }
        };

        for name in names {
            if ctx.is_cancelled() {
                info!("Location scan cancelled");
                return None;
            }
            records.push(build_record(root, &name, options));
        }
    }

    info!("Found {} directories", records.len());
    Some(records)
}

/// Build one record: size it (unless quick), parse the name, apply the
/// ignore list.
fn build_record(root: &Path, name: &str, options: &ScanOptions) -> DirectoryRecord {
    let mut record = DirectoryRecord::new(root.to_path_buf(), CompactString::new(name));

    if !options.quick {
        record.dir_size_bytes = fsops::directory_size(&record.full_path());
    }

    match parse_mrn(name) {
        Some(mrn) => {
            record.mrn = mrn;
            if options.ignore_mrns.contains(&record.mrn) {
                debug!("MRN {} is on the ignore list", record.mrn);
                record.action = Action::Ignore;
            }
        }
        None => {
            // Not a patient directory.
            record.action = Action::Ignore;
        }
    }

    record
}

/// Parse an MRN out of a directory name.
///
/// The naming convention is `patient_<mrn>`: the first `_`-separated
/// segment must equal "patient" case-insensitively and the second must be
/// exactly [`MRN_LENGTH`] characters. Trailing segments are permitted and
/// ignored.
pub fn parse_mrn(dir_name: &str) -> Option<CompactString> {
    let mut segments = dir_name.split('_');
    let prefix = segments.next()?;
    let mrn = segments.next()?;
    if prefix.eq_ignore_ascii_case("patient") && mrn.chars().count() == MRN_LENGTH {
        Some(CompactString::new(mrn))
    } else {
        None
    }
}
