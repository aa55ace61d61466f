mod bootstrap;
mod output;

use anyhow::Result;
use clap::Parser;
use tracker_core::settings::Settings;
use tracker_data::analysis::{analyze, View};
use tracker_runtime::data_manager::DataManager;
use tracker_runtime::source::DataSource;

use crate::output::OutputFormat;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let settings = Settings::parse();

    bootstrap::ensure_directories()?;
    bootstrap::setup_logging(settings.effective_log_level())?;

    tracing::info!("Job Tracker v{} starting", env!("CARGO_PKG_VERSION"));

    let view: View = settings.view.parse()?;
    let format: OutputFormat = settings.format.parse()?;
    let config = settings.resolve_config()?;
    let today = settings.reference_date()?;
    let source = DataSource::parse(&settings.source);

    tracing::info!(
        "Source: {}, Today: {}, Windows: {}, Rule: {:?}",
        source,
        today,
        config.windows.len(),
        config.match_rule
    );

    let manager = DataManager::new(source, &config)?;
    let load = manager.load().await?;
    for dropped in &load.dropped {
        tracing::debug!("line {} excluded: {}", dropped.line, dropped.reason);
    }

    let report = analyze(load, &config, today)?;
    let rendered = output::render(&report, view, format)?;
    output::write_output(&rendered, settings.out.as_deref())?;

    Ok(())
}
