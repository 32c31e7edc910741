//! Sequential batch runner.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::error::PipelineError;
use crate::models::{Region, RunSummary};
use crate::services::events::{EventSender, PipelineEvent};
use crate::services::fetch::Fetcher;
use crate::services::files;
use crate::services::processor::ItemProcessor;
use crate::services::toolchain::Toolchain;

/// Directories and remote source used by one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Final home of every region's graph files.
    pub data_dir: PathBuf,
    /// Downloads and in-progress toolchain output.
    pub scratch_dir: PathBuf,
    /// Base URL the region extracts are fetched from.
    pub base_url: String,
    /// Extension of the remote extracts, e.g. `osm.pbf`.
    pub extension: String,
    /// Pause after every processed region.
    pub pacing: Duration,
}

/// Runs regions strictly one after another and summarizes the outcome.
pub struct BatchRunner {
    processor: ItemProcessor,
    events: EventSender,
}

impl BatchRunner {
    pub fn new(config: PipelineConfig, fetcher: Fetcher, toolchain: Arc<dyn Toolchain>) -> Self {
        Self {
            processor: ItemProcessor::new(config, fetcher, toolchain),
            events: EventSender::disabled(),
        }
    }

    pub fn with_events(mut self, events: EventSender) -> Self {
        self.processor = self.processor.with_events(events.clone());
        self.events = events;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        self.processor.config()
    }

    /// Process every region in order.
    ///
    /// Individual failures are recorded in the summary. The scratch directory
    /// is emptied only when nothing failed, so a rerun can pick up where this
    /// one stopped. Only unusable directories abort the run.
    pub async fn run_all(&self, regions: &[Region]) -> Result<RunSummary, PipelineError> {
        let config = self.config();
        prepare_dir(&config.data_dir).await?;
        prepare_dir(&config.scratch_dir).await?;

        let total = regions.len();
        let mut summary = RunSummary::default();

        for (index, region) in regions.iter().enumerate() {
            info!("[{}/{}] Processing {}", index + 1, total, region.name);
            self.events
                .send(PipelineEvent::ItemStarted {
                    index,
                    total,
                    name: region.name.clone(),
                })
                .await;

            let result = self.processor.process(region).await;
            summary.record(region, &result);
        }

        if summary.is_success() {
            match files::clear_dir(&config.scratch_dir).await {
                Ok(removed) => info!("Removed {} scratch files", removed),
                Err(e) => warn!(
                    "Could not clean scratch directory {}: {}",
                    config.scratch_dir.display(),
                    e
                ),
            }
        } else {
            info!(
                "{} regions failed, keeping scratch files in {}",
                summary.failed,
                config.scratch_dir.display()
            );
        }

        Ok(summary)
    }
}

/// Create `dir` if needed and make sure it can be listed.
async fn prepare_dir(dir: &Path) -> Result<(), PipelineError> {
    let to_error = |source| PipelineError::Directory {
        path: dir.to_path_buf(),
        source,
    };
    tokio::fs::create_dir_all(dir).await.map_err(to_error)?;
    let _entries = tokio::fs::read_dir(dir).await.map_err(to_error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RetryPolicy;
    use crate::services::toolchain::ToolStep;
    use crate::test_support::{test_config, StubToolchain};
    use tempfile::tempdir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher() -> Fetcher {
        Fetcher::new(RetryPolicy {
            max_retries: 0,
            initial_delay_ms: 10,
            backoff_multiplier: 2.0,
            timeout_ms: 5_000,
            connect_timeout_ms: 2_000,
        })
        .unwrap()
    }

    async fn serve(server: &MockServer, code: &str, status: u16) {
        Mock::given(method("GET"))
            .and(path(format!("/{}-latest.osm.pbf", code)))
            .respond_with(ResponseTemplate::new(status).set_body_bytes(b"pbf".to_vec()))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_successful_run_clears_scratch() {
        let server = MockServer::start().await;
        serve(&server, "aa", 200).await;
        serve(&server, "bb", 200).await;
        let dir = tempdir().unwrap();
        let config = test_config(dir.path(), &server.uri());
        std::fs::write(config.scratch_dir.join("leftover.osm.pbf"), b"old").unwrap();

        let runner = BatchRunner::new(config.clone(), fetcher(), Arc::new(StubToolchain::new()));
        let summary = runner
            .run_all(&[Region::new("a", "aa"), Region::new("b", "bb")])
            .await
            .unwrap();

        assert_eq!(summary.processed, 2);
        assert!(summary.is_success());
        assert!(files::list_files(&config.scratch_dir).await.unwrap().is_empty());
        assert_eq!(
            files::list_files(&config.data_dir).await.unwrap(),
            vec!["aa.osrm", "aa.osrm.nodes", "bb.osrm", "bb.osrm.nodes"]
        );
    }

    #[tokio::test]
    async fn test_failure_keeps_scratch_and_continues() {
        let server = MockServer::start().await;
        serve(&server, "aa", 404).await;
        serve(&server, "bb", 200).await;
        let dir = tempdir().unwrap();
        let config = test_config(dir.path(), &server.uri());

        let stub = Arc::new(StubToolchain::failing_at(ToolStep::Customize));
        let runner = BatchRunner::new(config.clone(), fetcher(), stub);
        let summary = runner
            .run_all(&[Region::new("a", "aa"), Region::new("b", "bb")])
            .await
            .unwrap();

        assert_eq!(summary.failed, 2);
        assert_eq!(summary.failed_items, vec!["a", "b"]);
        // The second region got as far as customize; its graph files are kept.
        let scratch = files::list_files(&config.scratch_dir).await.unwrap();
        assert_eq!(scratch, vec!["bb.osrm", "bb.osrm.nodes"]);
    }

    #[tokio::test]
    async fn test_regions_run_in_order() {
        let server = MockServer::start().await;
        for code in ["cc", "aa", "bb"] {
            serve(&server, code, 200).await;
        }
        let dir = tempdir().unwrap();
        let config = test_config(dir.path(), &server.uri());
        let (tx, mut rx) = tokio::sync::mpsc::channel(256);

        let runner = BatchRunner::new(config, fetcher(), Arc::new(StubToolchain::new()))
            .with_events(EventSender::new(tx));
        runner
            .run_all(&[
                Region::new("c", "cc"),
                Region::new("a", "aa"),
                Region::new("b", "bb"),
            ])
            .await
            .unwrap();
        drop(runner);

        let mut started = Vec::new();
        while let Some(event) = rx.recv().await {
            if let PipelineEvent::ItemStarted { name, index, total } = event {
                assert_eq!(total, 3);
                started.push((index, name));
            }
        }
        assert_eq!(
            started,
            vec![
                (0, "c".to_string()),
                (1, "a".to_string()),
                (2, "b".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn test_unusable_data_dir_is_fatal() {
        let dir = tempdir().unwrap();
        let mut config = test_config(dir.path(), "http://127.0.0.1:9");
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"file").unwrap();
        config.data_dir = blocker;

        let runner = BatchRunner::new(config, fetcher(), Arc::new(StubToolchain::new()));
        let err = runner
            .run_all(&[Region::new("a", "aa")])
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Directory { .. }));
    }
}
