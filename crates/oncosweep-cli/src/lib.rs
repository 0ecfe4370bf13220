//! Command-line frontend for the Oncosweep engine.
//!
//! Thin by design: it loads the settings file, starts engine jobs, polls
//! their handles at a fixed 100 ms interval, and prints what comes back.
//! All decisions live in `oncosweep-core`.
use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use std::fs::File;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use oncosweep_core::config::Settings;
use oncosweep_core::errors::ErrorKind;
use oncosweep_core::executor::{self, ActionConfig};
use oncosweep_core::export;
use oncosweep_core::model::{format_size, Action, DirectoryRecord};
use oncosweep_core::platform;
use oncosweep_core::provider::{
    PatientRecordsProvider, StaticProvider, UnconfiguredProvider,
};
use oncosweep_core::scanner::{self, ScanOptions, ScanOutput};
use oncosweep_core::task::{TaskHandle, TaskMessage};

/// How often job handles are polled. Short enough that progress feels
/// live, long enough that the polling thread costs nothing.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Parser)]
#[command(
    name = "oncosweep",
    version,
    about = "Lifecycle manager for linac imaging patient directories"
)]
struct Cli {
    /// Path to the TOML settings file.
    #[arg(long, default_value = "settings.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan and classify the configured locations without touching any
    /// data.
    Scan {
        /// Skip directory-size computation for a much faster scan.
        #[arg(long)]
        quick: bool,
        /// Write the classified set to a CSV file.
        #[arg(long, value_name = "FILE")]
        export: Option<PathBuf>,
    },
    /// Scan, classify, and perform the archive or delete action against
    /// the matching directories. Irreversible.
    Run {
        #[arg(value_enum)]
        action: ActionArg,
        /// Compute directory sizes during the scan (slower; sizes are not
        /// needed to perform the action).
        #[arg(long)]
        sizes: bool,
        /// Skip the interactive confirmation.
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ActionArg {
    Archive,
    Delete,
}

impl From<ActionArg> for Action {
    fn from(arg: ActionArg) -> Self {
        match arg {
            ActionArg::Archive => Action::Archive,
            ActionArg::Delete => Action::Delete,
        }
    }
}

/// Entry point called by the binary.
pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(&cli.config)
        .with_context(|| format!("loading settings from {}", cli.config.display()))?;

    match cli.command {
        Command::Scan { quick, export } => cmd_scan(&settings, quick, export),
        Command::Run { action, sizes, yes } => cmd_run(&settings, action.into(), !sizes, yes),
    }
}

/// Everything drained from one job: the terminal payload plus the error
/// kinds that were reported along the way.
struct Drained<T> {
    result: Option<T>,
    error_kinds: Vec<ErrorKind>,
}

/// Poll a handle until its terminal `Result` arrives, printing progress
/// and error lines as they come. Returns `None` in `result` only if the
/// worker died without one.
fn drain<T>(handle: &TaskHandle<T>) -> Drained<T> {
    let mut error_kinds = Vec::new();
    loop {
        for message in handle.poll() {
            match message {
                TaskMessage::Progress(text) => println!("{text}"),
                TaskMessage::Error { kind, message } => {
                    error_kinds.push(kind);
                    eprintln!("[{kind}] {message}");
                }
                TaskMessage::Result(result) => {
                    return Drained {
                        result: Some(result),
                        error_kinds,
                    }
                }
            }
        }
        if handle.is_finished() {
            // Catch anything sent between the last poll and thread exit.
            for message in handle.poll() {
                if let TaskMessage::Result(result) = message {
                    return Drained {
                        result: Some(result),
                        error_kinds,
                    };
                }
            }
            return Drained {
                result: None,
                error_kinds,
            };
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

fn build_provider(settings: &Settings) -> anyhow::Result<Arc<dyn PatientRecordsProvider>> {
    if let Some(path) = &settings.provider.records_file {
        let provider = StaticProvider::from_json_file(path)
            .with_context(|| format!("loading OIS records file {}", path.display()))?;
        return Ok(Arc::new(provider));
    }
    // Site-specific OIS connectivity plugs in here; without it a query
    // reports Unavailable, exactly like a fresh install.
    Ok(Arc::new(UnconfiguredProvider))
}

fn scan_and_classify(settings: &Settings, quick: bool) -> anyhow::Result<(ScanOutput, Vec<ErrorKind>)> {
    if settings.scan_roots.is_empty() {
        bail!("no scan locations configured; add scan_roots to the settings file");
    }

    let provider = build_provider(settings)?;
    let options = ScanOptions {
        roots: settings.scan_roots.clone(),
        ignore_mrns: settings.ignore_mrns.clone(),
        quick,
    };

    info!(
        "Starting {} scan of {} locations",
        if quick { "quick" } else { "full" },
        options.roots.len()
    );
    let handle = scanner::start_scan(options, provider);
    let drained = drain(&handle);
    let output = drained
        .result
        .context("scan worker exited without a result")?;
    Ok((output, drained.error_kinds))
}

fn summarize(records: &[DirectoryRecord]) {
    let count = |action: Action| records.iter().filter(|r| r.action == action).count();
    let bytes = |action: Action| -> u64 {
        records
            .iter()
            .filter(|r| r.action == action)
            .map(|r| r.dir_size_bytes)
            .sum()
    };

    println!("Scanned {} directories", records.len());
    println!("  KEEP:    {}", count(Action::Keep));
    println!(
        "  ARCHIVE: {} ({})",
        count(Action::Archive),
        format_size(bytes(Action::Archive))
    );
    println!(
        "  DELETE:  {} ({})",
        count(Action::Delete),
        format_size(bytes(Action::Delete))
    );
    println!("  IGNORE:  {}", count(Action::Ignore));
}

fn cmd_scan(settings: &Settings, quick: bool, export_path: Option<PathBuf>) -> anyhow::Result<()> {
    let (output, _errors) = scan_and_classify(settings, quick)?;
    if output.cancelled {
        bail!("scan was cancelled before producing a result");
    }

    summarize(&output.records);

    if let Some(path) = export_path {
        let file = File::create(&path)
            .with_context(|| format!("creating export file {}", path.display()))?;
        export::write_csv(&output.records, file)?;
        println!("Classified list exported to {}", path.display());
    }
    Ok(())
}

fn cmd_run(settings: &Settings, action: Action, quick: bool, yes: bool) -> anyhow::Result<()> {
    // Safety gate: never mutate the store while the console is using it.
    if !settings.console_process.is_empty()
        && platform::is_process_running(&settings.console_process)
    {
        bail!(
            "{} is running; close the clinical console before performing the {action} action",
            settings.console_process
        );
    }

    // The archive destination must exist up front — for delete too, since
    // the database backup lands under it.
    if settings.archive_root.as_os_str().is_empty() || !settings.archive_root.exists() {
        bail!(
            "archive destination '{}' is missing or unreachable; check the archive_root setting",
            settings.archive_root.display()
        );
    }

    let (output, error_kinds) = scan_and_classify(settings, quick)?;
    if output.cancelled {
        bail!("scan was cancelled before producing a result");
    }
    if error_kinds.contains(&ErrorKind::ProviderUnavailable) {
        bail!("classification was unavailable; no directories were actioned");
    }

    summarize(&output.records);

    let targets: Vec<DirectoryRecord> = output
        .records
        .iter()
        .filter(|r| r.action == action)
        .cloned()
        .collect();
    if targets.is_empty() {
        println!("No directories classified for {action}; nothing to do");
        return Ok(());
    }

    if !yes && !confirm(action, targets.len())? {
        bail!("aborted by operator");
    }

    let config = ActionConfig {
        scan_roots: settings.scan_roots.clone(),
        archive_root: settings.archive_root.clone(),
        audit_path: settings.audit_path.clone(),
    };

    info!("Starting {action} action over {} directories", targets.len());
    let handle = executor::start_action(targets, action, config);
    let drained = drain(&handle);
    let result = drained
        .result
        .context("action worker exited without a result")?;

    println!(
        "{} of {} directories actioned; audit log updated at {}",
        result.actioned.len(),
        count_matching(&output.records, action),
        settings.audit_path.display()
    );
    if !drained.error_kinds.is_empty() {
        bail!(
            "{} directories failed and were skipped; review the messages above",
            drained.error_kinds.len()
        );
    }
    Ok(())
}

fn count_matching(records: &[DirectoryRecord], action: Action) -> usize {
    records.iter().filter(|r| r.action == action).count()
}

fn confirm(action: Action, count: usize) -> anyhow::Result<bool> {
    print!("About to {action} {count} patient directories. This cannot be undone. Type 'yes' to continue: ");
    std::io::stdout().flush().ok();

    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("reading confirmation")?;
    Ok(line.trim().eq_ignore_ascii_case("yes"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn action_arg_maps_onto_engine_actions() {
        assert_eq!(Action::from(ActionArg::Archive), Action::Archive);
        assert_eq!(Action::from(ActionArg::Delete), Action::Delete);
    }

    #[test]
    fn scan_fails_without_configured_roots() {
        let settings = Settings::default();
        let err = scan_and_classify(&settings, true).unwrap_err();
        assert!(err.to_string().contains("no scan locations"), "{err}");
    }

    #[test]
    fn run_refuses_missing_archive_root() {
        let tmp = tempfile::TempDir::new().unwrap();
        let settings = Settings {
            scan_roots: vec![tmp.path().to_path_buf()],
            archive_root: tmp.path().join("not_mounted"),
            console_process: String::new(),
            ..Default::default()
        };
        let err = cmd_run(&settings, Action::Archive, true, true).unwrap_err();
        assert!(err.to_string().contains("archive destination"), "{err}");
    }
}
