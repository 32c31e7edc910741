//! Download and process a region set.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use console::style;
use indicatif::HumanBytes;
use tokio::sync::mpsc;

use osrm_prep::config::Settings;
use osrm_prep::regions::{self, RegionSet};
use osrm_prep::services::{BatchRunner, DockerToolchain, EventSender, Fetcher, PipelineEvent};

use crate::cli::progress::{format_delay, TransferProgress};

/// Exit code when the batch finished but some regions failed.
const EXIT_PARTIAL_FAILURE: u8 = 2;

/// Run the batch over `set`, or over `codes` when any are given.
pub async fn cmd_download(
    settings: &Settings,
    set: RegionSet,
    codes: &[String],
    show_progress: bool,
) -> anyhow::Result<ExitCode> {
    let toolchain = DockerToolchain::new(settings.toolchain.clone());
    let runner_path = toolchain.ensure_available()?;
    tracing::info!("Using container runner at {}", runner_path.display());

    let regions = if codes.is_empty() {
        set.regions()
    } else {
        regions::resolve(codes)
    };
    let policy = settings.retry_policy(set);
    let config = settings.pipeline_config(set);

    println!(
        "{} Processing {} regions into {}",
        style("→").cyan(),
        regions.len(),
        config.data_dir.display()
    );
    println!(
        "  {} up to {} attempts per download, {} between regions",
        style("→").dim(),
        policy.total_attempts(),
        format_delay(config.pacing)
    );

    let (event_tx, event_rx) = mpsc::channel::<PipelineEvent>(256);
    let events = EventSender::new(event_tx);

    let fetcher = Fetcher::new(policy)
        .context("Failed to build HTTP client")?
        .with_events(events.clone());
    let runner = BatchRunner::new(config, fetcher, Arc::new(toolchain)).with_events(events);

    let event_handler = tokio::spawn(handle_events(event_rx, show_progress));

    let result = runner.run_all(&regions).await;
    // Dropping the runner closes the channel and ends the handler.
    drop(runner);
    let _ = event_handler.await;

    let summary = result?;

    println!();
    println!(
        "{} Processed: {} | Skipped: {} | Failed: {}",
        style("✓").green(),
        summary.processed,
        summary.skipped,
        summary.failed
    );

    if summary.is_success() {
        println!(
            "  {} Run 'osrm-prep merge' to build the combined dataset",
            style("→").dim()
        );
        Ok(ExitCode::SUCCESS)
    } else {
        println!(
            "{} Failed regions: {}",
            style("!").yellow(),
            summary.failed_items.join(", ")
        );
        println!(
            "  {} Intermediate files were kept in {}; rerun to retry the failed regions",
            style("→").dim(),
            settings.scratch_dir.display()
        );
        Ok(ExitCode::from(EXIT_PARTIAL_FAILURE))
    }
}

/// Render pipeline events until the channel closes.
async fn handle_events(mut event_rx: mpsc::Receiver<PipelineEvent>, show_progress: bool) {
    let progress = TransferProgress::new(show_progress);

    while let Some(event) = event_rx.recv().await {
        match event {
            PipelineEvent::ItemStarted { index, total, name } => {
                progress.println(&format!(
                    "{} [{}/{}] {}",
                    style("→").cyan(),
                    index + 1,
                    total,
                    style(&name).bold()
                ));
            }
            PipelineEvent::ItemSkipped { .. } => {
                progress.println(&format!(
                    "  {} already processed, skipping",
                    style("✓").dim()
                ));
            }
            PipelineEvent::AttemptStarted {
                url,
                attempt,
                attempts,
            } => {
                if attempt > 1 {
                    progress.println(&format!(
                        "  {} attempt {}/{}",
                        style("→").dim(),
                        attempt,
                        attempts
                    ));
                }
                progress.start(&url);
            }
            PipelineEvent::Progress { bytes, total } => progress.update(bytes, total),
            PipelineEvent::AttemptFailed {
                attempt,
                error,
                retry_in,
            } => {
                progress.finish();
                let retry = retry_in
                    .map(|delay| format!(", retrying in {}", format_delay(delay)))
                    .unwrap_or_default();
                progress.println(&format!(
                    "  {} attempt {} failed: {}{}",
                    style("!").yellow(),
                    attempt,
                    error,
                    retry
                ));
            }
            PipelineEvent::Downloaded { bytes } => {
                progress.finish();
                progress.println(&format!(
                    "  {} downloaded {}",
                    style("✓").green(),
                    HumanBytes(bytes)
                ));
            }
            PipelineEvent::StepStarted { step, .. } => {
                progress.println(&format!("  {} running {}", style("→").dim(), step));
            }
            PipelineEvent::ItemProcessed { name, files_moved } => {
                progress.println(&format!(
                    "  {} {} ready ({} files)",
                    style("✓").green(),
                    name,
                    files_moved
                ));
            }
            PipelineEvent::ItemFailed { name, error } => {
                progress.finish();
                progress.println(&format!("  {} {}: {}", style("✗").red(), name, error));
            }
        }
    }

    progress.finish();
}
