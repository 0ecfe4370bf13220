/// CSV export of a classified directory set.
///
/// One row per non-ignored record, every record field included, so the
/// export can stand in for the on-screen table in reports and
/// spreadsheets.
use serde::Serialize;
use std::io::Write;

use crate::audit::AUDIT_DATE_FORMAT;
use crate::errors::Result;
use crate::model::{Action, DirectoryRecord};

#[derive(Serialize)]
struct ExportRow<'a> {
    root_path: String,
    dir_name: &'a str,
    mrn: &'a str,
    display_name: &'a str,
    action: &'static str,
    finished_treatment: bool,
    clinical_trial: bool,
    has_4d: bool,
    last_fraction_date: String,
    dir_size_bytes: u64,
}

/// Write `records` as CSV. Records with action `Ignore` are excluded, as
/// they are from the on-screen list.
pub fn write_csv<W: Write>(records: &[DirectoryRecord], writer: W) -> Result<()> {
    let mut out = csv::Writer::from_writer(writer);
    for record in records.iter().filter(|r| r.action != Action::Ignore) {
        out.serialize(ExportRow {
            root_path: record.root_path.display().to_string(),
            dir_name: &record.dir_name,
            mrn: &record.mrn,
            display_name: &record.display_name,
            action: record.action.label(),
            finished_treatment: record.finished_treatment,
            clinical_trial: record.clinical_trial,
            has_4d: record.has_4d,
            last_fraction_date: record
                .last_fraction_date
                .map(|d| d.format(AUDIT_DATE_FORMAT).to_string())
                .unwrap_or_default(),
            dir_size_bytes: record.dir_size_bytes,
        })?;
    }
    out.flush().map_err(csv::Error::from)?;
    Ok(())
}
