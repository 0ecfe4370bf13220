/// Patient-status decision algorithm.
///
/// Merges the scanner's directory records with the three OIS row sets and
/// assigns each directory its action:
///
/// - treatment finished AND (clinical trial OR 4D data) → `Archive`
/// - treatment finished AND neither → `Delete`
/// - treatment not finished (or no rows at all) → stays `Keep`
///
/// "Finished" means: at least one treatment field exists, every field has
/// delivered exactly its prescribed fraction count, and the latest
/// fraction is older than the 14-day grace window.
///
/// `display_name` precedence is treatment-field → clinical-trial → 4D;
/// a later source overwrites an earlier one. This mirrors how the clinical
/// staff expect the name to resolve and must not be reordered.
use chrono::{Duration, NaiveDate};
use compact_str::CompactString;
use tracing::debug;

use crate::model::{Action, DirectoryRecord};
use crate::provider::{PatientRecords, PatientRecordsProvider, ProviderError};

/// Patients whose last fraction falls within this many days of "today" are
/// never eligible for action, even with a fully delivered course — imaging
/// may still be reviewed shortly after treatment ends.
pub const GRACE_PERIOD_DAYS: i64 = 14;

/// Classify `records` in place against the provider.
///
/// `Ignore` records are untouched. When no non-ignored MRN exists, the
/// provider is not queried at all. On [`ProviderError`], no record's
/// action is changed from its scan-time value and the error is returned to
/// the caller.
pub fn classify(
    records: &mut [DirectoryRecord],
    provider: &dyn PatientRecordsProvider,
    today: NaiveDate,
) -> Result<(), ProviderError> {
    let mut mrns: Vec<CompactString> = Vec::new();
    for record in records.iter() {
        if record.action != Action::Ignore
            && record.is_patient()
            && !mrns.contains(&record.mrn)
        {
            mrns.push(record.mrn.clone());
        }
    }
    if mrns.is_empty() {
        debug!("No patient directories to classify; skipping provider query");
        return Ok(());
    }

    let rows = provider.query(&mrns)?;
    debug!(
        "Provider returned {} treatment fields, {} trial rows, {} 4D rows",
        rows.treatment_fields.len(),
        rows.clinical_trials.len(),
        rows.four_d.len()
    );

    for record in records.iter_mut() {
        if record.action == Action::Ignore {
            continue;
        }
        apply_rows(record, &rows, today);
    }
    Ok(())
}

/// Apply the decision algorithm to one record.
fn apply_rows(record: &mut DirectoryRecord, rows: &PatientRecords, today: NaiveDate) {
    record.finished_treatment = false;

    // Treatment fields: any row at all means the patient is assumed
    // finished until a field proves otherwise.
    let mut has_fields = false;
    for field in rows.treatment_fields.iter().filter(|f| f.mrn == record.mrn) {
        if !has_fields {
            has_fields = true;
            record.finished_treatment = true;
        }

        record.display_name = field.display_name();

        if let Some(date) = field.last_fraction_date {
            record.last_fraction_date = Some(match record.last_fraction_date {
                Some(current) => current.max(date),
                None => date,
            });
        }

        // An undelivered fraction anywhere means the course is incomplete.
        if field.prescribed_fractions != field.delivered_fractions {
            record.finished_treatment = false;
        }
    }

    // Grace window: a recent last fraction overrides the field comparison.
    if let Some(last) = record.last_fraction_date {
        if today - Duration::days(GRACE_PERIOD_DAYS) <= last {
            record.finished_treatment = false;
        }
    }

    if let Some(trial) = rows
        .clinical_trials
        .iter()
        .find(|row| row.mrn == record.mrn)
    {
        record.clinical_trial = true;
        record.display_name = trial.display_name();
    }

    if let Some(four_d) = rows.four_d.iter().find(|row| row.mrn == record.mrn) {
        record.has_4d = true;
        record.display_name = four_d.display_name();
    }

    if record.finished_treatment {
        record.action = if record.clinical_trial || record.has_4d {
            Action::Archive
        } else {
            Action::Delete
        };
    }
}
