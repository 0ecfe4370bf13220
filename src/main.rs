//! Oncosweep — lifecycle manager for linac imaging patient directories.
//!
//! Thin binary entry point. All logic lives in the `oncosweep-core`
//! and `oncosweep-cli` crates.

fn main() -> anyhow::Result<()> {
    // Initialise structured logging.
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    tracing::info!("Oncosweep starting");

    oncosweep_cli::run()
}
