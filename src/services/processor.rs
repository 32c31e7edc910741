//! Per-region processing: skip check, download, toolchain, relocation.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::error::{ItemError, ToolError};
use crate::models::{ProcessingResult, Region};
use crate::services::batch::PipelineConfig;
use crate::services::events::{EventSender, PipelineEvent};
use crate::services::fetch::Fetcher;
use crate::services::files;
use crate::services::toolchain::{ToolStep, Toolchain};

/// Processes one region at a time.
///
/// `process` never returns an error: every failure ends up as
/// [`ProcessingResult::Failed`].
pub struct ItemProcessor {
    config: PipelineConfig,
    fetcher: Fetcher,
    toolchain: Arc<dyn Toolchain>,
    events: EventSender,
}

impl ItemProcessor {
    pub fn new(config: PipelineConfig, fetcher: Fetcher, toolchain: Arc<dyn Toolchain>) -> Self {
        Self {
            config,
            fetcher,
            toolchain,
            events: EventSender::disabled(),
        }
    }

    /// Report progress of this processor and its fetcher to `events`.
    pub fn with_events(mut self, events: EventSender) -> Self {
        self.fetcher = self.fetcher.with_events(events.clone());
        self.events = events;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub async fn process(&self, region: &Region) -> ProcessingResult {
        match self.try_process(region).await {
            Ok(result) => result,
            Err(error) => {
                error!("Failed to process {}: {}", region.name, error);
                self.events
                    .send(PipelineEvent::ItemFailed {
                        name: region.name.clone(),
                        error: error.to_string(),
                    })
                    .await;
                ProcessingResult::Failed { error }
            }
        }
    }

    async fn try_process(&self, region: &Region) -> Result<ProcessingResult, ItemError> {
        if self.already_processed(region).await? {
            info!("{} already processed, skipping", region.name);
            self.events
                .send(PipelineEvent::ItemSkipped {
                    name: region.name.clone(),
                })
                .await;
            return Ok(ProcessingResult::Skipped);
        }

        let url = region.source_url(&self.config.base_url, &self.config.extension);
        let input = self.input_path(region);
        info!("Downloading {} from {}", region.name, url);
        if let Err(e) = self.fetcher.fetch(&url, &input).await {
            files::remove_quietly(&input).await;
            return Err(e.into());
        }

        // Graph files of a failed step stay in scratch; the extract does not.
        if let Err(e) = self.run_toolchain(region).await {
            files::remove_quietly(&input).await;
            return Err(e.into());
        }

        let files_moved = self.relocate(region).await;
        info!("{} processed ({} files moved)", region.name, files_moved);
        self.events
            .send(PipelineEvent::ItemProcessed {
                name: region.name.clone(),
                files_moved,
            })
            .await;

        if !self.config.pacing.is_zero() {
            tokio::time::sleep(self.config.pacing).await;
        }

        Ok(ProcessingResult::Processed { files_moved })
    }

    async fn run_toolchain(&self, region: &Region) -> Result<(), ToolError> {
        for step in ToolStep::REGION_PIPELINE {
            self.events
                .send(PipelineEvent::StepStarted {
                    name: region.name.clone(),
                    step,
                })
                .await;
            let target = self.step_input(step, region);
            self.toolchain
                .run(step, &self.config.scratch_dir, &target)
                .await?;
        }
        Ok(())
    }

    /// Any data-directory entry carrying the region prefix counts as done.
    async fn already_processed(&self, region: &Region) -> Result<bool, ItemError> {
        let existing = files::list_prefixed(&self.config.data_dir, &region.code)
            .await
            .map_err(|source| ItemError::ListDir {
                path: self.config.data_dir.clone(),
                source,
            })?;
        Ok(!existing.is_empty())
    }

    fn input_path(&self, region: &Region) -> PathBuf {
        self.config
            .scratch_dir
            .join(region.artifact_name(&self.config.extension))
    }

    fn step_input(&self, step: ToolStep, region: &Region) -> String {
        match step {
            ToolStep::Extract => region.artifact_name(&self.config.extension),
            _ => region.graph_name(),
        }
    }

    /// Move the region's toolchain output from scratch into the data directory.
    ///
    /// The downloaded extract stays in scratch. Failures are logged and the
    /// remaining files are still moved; returns the number moved.
    async fn relocate(&self, region: &Region) -> usize {
        let scratch = &self.config.scratch_dir;
        let input_name = region.artifact_name(&self.config.extension);

        let names = match files::list_files(scratch).await {
            Ok(names) => names,
            Err(e) => {
                warn!("Could not list {}: {}", scratch.display(), e);
                return 0;
            }
        };

        let mut moved = 0;
        for name in names
            .iter()
            .filter(|name| region.owns_file(name) && **name != input_name)
        {
            let from = scratch.join(name);
            let to = self.config.data_dir.join(name);
            match files::move_file(&from, &to).await {
                Ok(()) => moved += 1,
                Err(e) => warn!("Could not move {} to {}: {}", from.display(), to.display(), e),
            }
        }
        moved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::models::RetryPolicy;
    use crate::test_support::{test_config, StubToolchain};
    use async_trait::async_trait;
    use std::path::Path;
    use std::time::{Duration, Instant};
    use tempfile::tempdir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher() -> Fetcher {
        Fetcher::new(RetryPolicy {
            max_retries: 1,
            initial_delay_ms: 10,
            backoff_multiplier: 2.0,
            timeout_ms: 5_000,
            connect_timeout_ms: 2_000,
        })
        .unwrap()
    }

    async fn serve_extract(server: &MockServer, code: &str, expected_calls: u64) {
        Mock::given(method("GET"))
            .and(path(format!("/{}-latest.osm.pbf", code)))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"pbf".to_vec()))
            .expect(expected_calls)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_existing_output_is_skipped_without_side_effects() {
        let server = MockServer::start().await;
        serve_extract(&server, "tr", 0).await;
        let dir = tempdir().unwrap();
        let config = test_config(dir.path(), &server.uri());
        std::fs::write(config.data_dir.join("tr.osrm"), b"done").unwrap();

        let stub = Arc::new(StubToolchain::new());
        let processor = ItemProcessor::new(config.clone(), fetcher(), stub.clone());

        let result = processor.process(&Region::new("testregion", "tr")).await;

        assert!(matches!(result, ProcessingResult::Skipped));
        assert!(stub.calls().is_empty());
        assert!(files::list_files(&config.scratch_dir).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_processed_region_is_relocated() {
        let server = MockServer::start().await;
        serve_extract(&server, "tr", 1).await;
        let dir = tempdir().unwrap();
        let config = test_config(dir.path(), &server.uri());

        let stub = Arc::new(StubToolchain::new());
        let processor = ItemProcessor::new(config.clone(), fetcher(), stub.clone());

        let result = processor.process(&Region::new("testregion", "tr")).await;

        assert!(matches!(result, ProcessingResult::Processed { files_moved: 2 }));
        assert_eq!(
            stub.calls(),
            vec![
                (ToolStep::Extract, "tr.osm.pbf".to_string()),
                (ToolStep::Partition, "tr.osrm".to_string()),
                (ToolStep::Customize, "tr.osrm".to_string()),
            ]
        );
        assert_eq!(
            files::list_files(&config.data_dir).await.unwrap(),
            vec!["tr.osrm", "tr.osrm.nodes"]
        );
        // The extract waits in scratch for end-of-run cleanup.
        assert_eq!(
            files::list_files(&config.scratch_dir).await.unwrap(),
            vec!["tr.osm.pbf"]
        );
    }

    /// Occupies one destination name in the data directory with a
    /// non-empty directory once extraction starts.
    struct OccupiedDestination {
        inner: StubToolchain,
        occupied: PathBuf,
    }

    #[async_trait]
    impl Toolchain for OccupiedDestination {
        async fn run(&self, step: ToolStep, workdir: &Path, input: &str) -> Result<(), ToolError> {
            if step == ToolStep::Extract {
                std::fs::create_dir_all(&self.occupied).unwrap();
                std::fs::write(self.occupied.join("occupied"), b"x").unwrap();
            }
            self.inner.run(step, workdir, input).await
        }
    }

    #[tokio::test]
    async fn test_failed_move_still_counts_as_processed() {
        let server = MockServer::start().await;
        serve_extract(&server, "tr", 1).await;
        let dir = tempdir().unwrap();
        let config = test_config(dir.path(), &server.uri());

        let toolchain = Arc::new(OccupiedDestination {
            inner: StubToolchain::new(),
            occupied: config.data_dir.join("tr.osrm.nodes"),
        });
        let processor = ItemProcessor::new(config.clone(), fetcher(), toolchain);

        let result = processor.process(&Region::new("testregion", "tr")).await;

        assert!(matches!(result, ProcessingResult::Processed { files_moved: 1 }));
        assert_eq!(
            std::fs::read(config.data_dir.join("tr.osrm")).unwrap(),
            b"graph"
        );
        // The file that could not be moved stays in scratch.
        assert_eq!(
            files::list_files(&config.scratch_dir).await.unwrap(),
            vec!["tr.osm.pbf", "tr.osrm.nodes"]
        );
    }

    #[tokio::test]
    async fn test_pacing_delay_follows_processed_region() {
        let server = MockServer::start().await;
        serve_extract(&server, "tr", 1).await;
        let dir = tempdir().unwrap();
        let mut config = test_config(dir.path(), &server.uri());
        config.pacing = Duration::from_millis(300);

        let processor = ItemProcessor::new(config, fetcher(), Arc::new(StubToolchain::new()));

        let started = Instant::now();
        let result = processor.process(&Region::new("testregion", "tr")).await;

        assert!(matches!(result, ProcessingResult::Processed { .. }));
        assert!(started.elapsed() >= Duration::from_millis(300));
    }

    #[tokio::test]
    async fn test_failed_second_step_relocates_nothing() {
        let server = MockServer::start().await;
        serve_extract(&server, "tr", 1).await;
        let dir = tempdir().unwrap();
        let config = test_config(dir.path(), &server.uri());

        let stub = Arc::new(StubToolchain::failing_at(ToolStep::Partition));
        let processor = ItemProcessor::new(config.clone(), fetcher(), stub.clone());

        let result = processor.process(&Region::new("testregion", "tr")).await;

        match result {
            ProcessingResult::Failed {
                error: ItemError::Tool(ToolError::Exit { step, .. }),
            } => assert_eq!(step, ToolStep::Partition),
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(stub.calls().len(), 2);
        assert!(files::list_files(&config.data_dir).await.unwrap().is_empty());
        // The extract is removed, the partial graph files stay.
        assert!(!config.scratch_dir.join("tr.osm.pbf").exists());
        assert!(config.scratch_dir.join("tr.osrm").exists());
    }

    #[tokio::test]
    async fn test_download_failure_leaves_no_artifact() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(2)
            .mount(&server)
            .await;
        let dir = tempdir().unwrap();
        let config = test_config(dir.path(), &server.uri());

        let stub = Arc::new(StubToolchain::new());
        let processor = ItemProcessor::new(config.clone(), fetcher(), stub.clone());

        let result = processor.process(&Region::new("testregion", "tr")).await;

        assert!(matches!(
            result,
            ProcessingResult::Failed {
                error: ItemError::Fetch(FetchError::Exhausted { attempts: 2, .. })
            }
        ));
        assert!(stub.calls().is_empty());
        assert!(files::list_files(&config.scratch_dir).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_data_dir_fails_item() {
        let dir = tempdir().unwrap();
        let mut config = test_config(dir.path(), "http://127.0.0.1:9");
        config.data_dir = dir.path().join("missing");

        let processor = ItemProcessor::new(config, fetcher(), Arc::new(StubToolchain::new()));
        let result = processor.process(&Region::new("testregion", "tr")).await;

        assert!(matches!(
            result,
            ProcessingResult::Failed {
                error: ItemError::ListDir { .. }
            }
        ));
    }
}
